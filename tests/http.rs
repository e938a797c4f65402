use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use pixgrid::index::GridState;
use pixgrid::query::GridServer;
use pixgrid::template::matcher::FieldTypes;
use pixgrid::template::{CompiledTemplate, FieldType};

fn unique_tmp_dir(tag: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("pixgrid-http-{}-{}", tag, nanos))
}

fn grid_state(dir: PathBuf, patterns: &[&str], sort_key: Option<&str>) -> Arc<GridState> {
    let templates = patterns
        .iter()
        .map(|p| CompiledTemplate::compile(p).unwrap())
        .collect();
    Arc::new(GridState::new(
        dir,
        templates,
        FieldTypes::Uniform(FieldType::Int),
        sort_key.map(str::to_string),
    ))
}

/// 在随机端口拉起服务，返回基地址。
async fn serve(state: Arc<GridState>) -> SocketAddr {
    let app = GridServer::new(state).router();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn load_more_images_returns_rows_then_empty() {
    let root = unique_tmp_dir("rows");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("img_0_4.png"), b"a").unwrap();
    std::fs::write(root.join("img_1_2.png"), b"b").unwrap();
    std::fs::write(root.join("img_bad.png"), b"c").unwrap();

    let state = grid_state(root, &["img_{epoch}_{step}.png"], Some("epoch"));
    state.rebuild_now().unwrap();
    let addr = serve(state).await;

    let row0: Vec<String> = reqwest::get(format!("http://{}/load_more_images?row_id=0", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(row0, vec!["epoch:1\nstep:2", "/images/img_1_2.png"]);

    let row1: Vec<String> = reqwest::get(format!("http://{}/load_more_images?row_id=1", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(row1, vec!["epoch:0\nstep:4", "/images/img_0_4.png"]);

    // 越界与负数都以空数组收尾，不报错
    for bad in ["2", "-1"] {
        let empty: Vec<String> =
            reqwest::get(format!("http://{}/load_more_images?row_id={}", addr, bad))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
        assert!(empty.is_empty());
    }
}

#[tokio::test]
async fn images_endpoint_streams_bytes_and_contains_traversal() {
    let root = unique_tmp_dir("images");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("img_1.png"), b"png-bytes").unwrap();

    let state = grid_state(root, &["img_{n}.png"], None);
    state.rebuild_now().unwrap();
    let addr = serve(state).await;

    let resp = reqwest::get(format!("http://{}/images/img_1.png", addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "image/png"
    );
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"png-bytes");

    let missing = reqwest::get(format!("http://{}/images/nope.png", addr))
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    // 路径穿越必须被拦下（percent-encoded，绕过客户端规范化）
    let traversal = reqwest::get(format!("http://{}/images/%2e%2e%2fCargo.toml", addr))
        .await
        .unwrap();
    assert_eq!(traversal.status(), 404);
}

#[tokio::test]
async fn index_page_renders_column_headers() {
    let root = unique_tmp_dir("page");
    std::fs::create_dir_all(&root).unwrap();

    let state = grid_state(root, &["left_{n}.png", "right_{n}.png"], Some("n"));
    state.rebuild_now().unwrap();
    let addr = serve(state).await;

    let body = reqwest::get(format!("http://{}/", addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("left_{n}.png"));
    assert!(body.contains("right_{n}.png"));
    assert!(body.contains("/load_more_images"));
}

#[tokio::test]
async fn status_tracks_refresh_generations() {
    let root = unique_tmp_dir("status");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("img_1.png"), b"a").unwrap();

    let state = grid_state(root.clone(), &["img_{n}.png"], Some("n"));
    state.rebuild_now().unwrap();
    let addr = serve(state.clone()).await;

    let status: serde_json::Value = reqwest::get(format!("http://{}/status", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["columns"], 1);
    assert_eq!(status["rows"], 1);
    assert_eq!(status["generation"], 1);

    // 新文件落盘 + 手动刷新：行数与代数同步推进
    std::fs::write(root.join("img_2.png"), b"b").unwrap();
    state.rebuild_now().unwrap();

    let status: serde_json::Value = reqwest::get(format!("http://{}/status", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["rows"], 2);
    assert_eq!(status["generation"], 2);
}
