use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::task::JoinHandle;

use crate::index::builder::{self, GridIndex, RowView};
use crate::template::matcher::FieldTypes;
use crate::template::CompiledTemplate;

/// 进程级网格状态：当前一代索引 + 重建所需的全部配置。
///
/// 发布走 ArcSwap 原子切换：重建在未发布的新索引对象上进行，读者在任意时刻
/// load 到的都是完整一代（全旧或全新），绝不会看到半成品。持有旧代引用的
/// 在途读者继续读到一致（可能过期）的视图，直至其引用释放。
pub struct GridState {
    index: ArcSwap<GridIndex>,
    generation: AtomicU64,
    image_dir: PathBuf,
    templates: Vec<CompiledTemplate>,
    types: FieldTypes,
    sort_key: Option<String>,
}

impl GridState {
    /// 以空索引创建；调用方通常紧接着执行一次同步初始构建。
    pub fn new(
        image_dir: PathBuf,
        templates: Vec<CompiledTemplate>,
        types: FieldTypes,
        sort_key: Option<String>,
    ) -> Self {
        Self {
            index: ArcSwap::from_pointee(GridIndex::empty()),
            generation: AtomicU64::new(0),
            image_dir,
            templates,
            types,
            sort_key,
        }
    }

    pub fn image_dir(&self) -> &PathBuf {
        &self.image_dir
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    /// 当前已发布的一代（供 handler 在一次请求内持有）。
    pub fn snapshot(&self) -> Arc<GridIndex> {
        self.index.load_full()
    }

    /// 读路径：无锁、无 I/O，不会阻塞。
    pub fn lookup(&self, row_id: usize) -> Option<RowView> {
        self.index.load().lookup(row_id)
    }

    fn list_directory(&self) -> std::io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.image_dir)? {
            let entry = entry?;
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => {
                    // 非 UTF-8 文件名无法进入模板匹配，跳过
                    tracing::debug!("skipping non-utf8 entry {:?}", raw);
                }
            }
        }
        Ok(names)
    }

    /// 列目录 -> 构建 -> 原子发布。失败时旧索引原样保留。
    pub fn rebuild_now(&self) -> std::io::Result<()> {
        let files = self.list_directory()?;
        let next = builder::build(
            &files,
            &self.templates,
            &self.types,
            self.sort_key.as_deref(),
        );
        let rows = next.row_count();
        self.index.store(Arc::new(next));
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            "published index generation {}: {} rows from {} files",
            generation,
            rows,
            files.len()
        );
        Ok(())
    }

    /// 周期刷新任务。返回显式 JoinHandle，由进程生命周期持有，
    /// 需要时可以有序停机（不做 spawn-and-forget）。
    ///
    /// 单轮失败（目录不可读等）只告警并保留上一代，循环永不退出。
    pub fn spawn_refresh(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if let Err(e) = state.rebuild_now() {
                    tracing::warn!(
                        "refresh failed for {:?}, keeping previous index: {}",
                        state.image_dir,
                        e
                    );
                }
            }
        })
    }
}
