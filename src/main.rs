use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;

use pixgrid::index::{validate_templates, GridState};
use pixgrid::query::GridServer;
use pixgrid::template::matcher::FieldTypes;
use pixgrid::template::{CompiledTemplate, FieldType};

#[derive(Parser)]
#[command(name = "pixgrid", version, about = "Serve a directory of images as a grid keyed by filename patterns")]
struct Args {
    /// Path to the image directory
    #[arg(long)]
    image_directory: PathBuf,

    /// Filename pattern with {name} placeholders; one per grid column, repeatable
    #[arg(long = "pattern", required = true)]
    patterns: Vec<String>,

    /// Shared placeholder to sort each column by, descending
    #[arg(long)]
    sort_key: Option<String>,

    /// Target type applied to every placeholder
    #[arg(long, value_enum, default_value_t = CliFieldType::Int)]
    field_type: CliFieldType,

    /// Seconds between background index refreshes
    #[arg(long, default_value_t = 600)]
    refresh_secs: u64,

    /// Port to serve on
    #[arg(long, default_value_t = 5000)]
    port: u16,

    /// Host to bind
    #[arg(long, default_value = "localhost")]
    host: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliFieldType {
    Int,
    Str,
}

impl From<CliFieldType> for FieldType {
    fn from(t: CliFieldType) -> Self {
        match t {
            CliFieldType::Int => FieldType::Int,
            CliFieldType::Str => FieldType::Str,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    // 配置期校验：模板编译失败 / 占位符集合不一致 / 未知排序键 都直接拒绝启动
    let templates = args
        .patterns
        .iter()
        .map(|p| CompiledTemplate::compile(p))
        .collect::<Result<Vec<_>, _>>()?;
    validate_templates(&templates, args.sort_key.as_deref())?;

    let state = Arc::new(GridState::new(
        args.image_directory.clone(),
        templates,
        FieldTypes::Uniform(args.field_type.into()),
        args.sort_key.clone(),
    ));

    // 初始构建同步执行：目录此刻必须可读，否则启动失败
    state
        .rebuild_now()
        .with_context(|| format!("initial index build failed for {:?}", args.image_directory))?;

    let refresh_handle = state.spawn_refresh(Duration::from_secs(args.refresh_secs));

    info!(
        "pixgrid ready: {} columns over {:?}, refresh every {}s",
        args.patterns.len(),
        args.image_directory,
        args.refresh_secs
    );

    let server = GridServer::new(state.clone());
    tokio::select! {
        res = server.run(&args.host, args.port) => res?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    refresh_handle.abort();
    Ok(())
}
