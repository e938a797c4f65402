use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::index::GridState;

/// 首页外壳：表头由当前一代索引填充，行数据由内嵌 JS 按 row_id 递增拉取，
/// 拉到空数组即停。
const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>pixgrid</title>
<style>
table { border-collapse: collapse; }
td, th { border: 1px solid #ccc; padding: 4px 8px; vertical-align: top; }
td pre { margin: 0; font-size: 12px; }
img { max-width: 320px; display: block; }
</style>
</head>
<body>
<table>
<thead><tr><!--HEADERS--></tr></thead>
<tbody id="grid"></tbody>
</table>
<script>
let row = 0;
let busy = false;
async function loadMore() {
  if (busy) return;
  busy = true;
  for (;;) {
    const resp = await fetch('/load_more_images?row_id=' + row);
    const cells = await resp.json();
    if (cells.length === 0) break;
    const tr = document.createElement('tr');
    const params = document.createElement('td');
    const pre = document.createElement('pre');
    pre.textContent = cells[0];
    params.appendChild(pre);
    tr.appendChild(params);
    for (const url of cells.slice(1)) {
      const td = document.createElement('td');
      const img = document.createElement('img');
      img.loading = 'lazy';
      img.src = url;
      td.appendChild(img);
      tr.appendChild(td);
    }
    document.getElementById('grid').appendChild(tr);
    row += 1;
    if (row % 20 === 0) break;
  }
  busy = false;
}
window.addEventListener('scroll', () => {
  if (window.innerHeight + window.scrollY >= document.body.offsetHeight - 200) loadMore();
});
loadMore();
</script>
</body>
</html>
"#;

#[derive(Deserialize)]
pub struct RowParams {
    pub row_id: Option<i64>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub columns: usize,
    pub rows: usize,
    pub generation: u64,
}

pub struct GridServer {
    pub state: Arc<GridState>,
}

impl GridServer {
    pub fn new(state: Arc<GridState>) -> Self {
        Self { state }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(index_handler))
            .route("/load_more_images", get(load_more_handler))
            .route("/images/:filename", get(serve_image_handler))
            .route("/status", get(status_handler))
            .with_state(self.state.clone())
    }

    pub async fn run(self, host: &str, port: u16) -> anyhow::Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
        tracing::info!("HTTP grid server listening on {}:{}", host, port);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn index_handler(State(state): State<Arc<GridState>>) -> Html<String> {
    let index = state.snapshot();
    // 首列留空：对应每行行首的字段摘要单元格
    let mut headers = String::from("<th></th>");
    for h in &index.headers {
        headers.push_str("<th>");
        headers.push_str(&escape_html(h));
        headers.push_str("</th>");
    }
    Html(INDEX_HTML.replace("<!--HEADERS-->", &headers))
}

/// 一行的数据：[字段摘要, /images/<name>, ...]。越界/缺参返回空数组而非错误，
/// 前端以空数组为终止信号。
async fn load_more_handler(
    Query(params): Query<RowParams>,
    State(state): State<Arc<GridState>>,
) -> Json<Vec<String>> {
    let row = match params.row_id {
        Some(id) if id >= 0 => id as usize,
        _ => return Json(Vec::new()),
    };

    match state.lookup(row) {
        Some(view) => {
            let mut cells = Vec::with_capacity(1 + view.images.len());
            cells.push(view.summary);
            cells.extend(
                view.images
                    .into_iter()
                    .map(|name| format!("/images/{}", name)),
            );
            Json(cells)
        }
        None => Json(Vec::new()),
    }
}

async fn serve_image_handler(
    Path(filename): Path<String>,
    State(state): State<Arc<GridState>>,
) -> Response {
    // 只允许目录内的裸文件名
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return StatusCode::NOT_FOUND.into_response();
    }

    let path = state.image_dir().join(&filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type_for(&filename))],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::debug!("image read failed for {:?}: {}", path, e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn status_handler(State(state): State<Arc<GridState>>) -> Json<StatusResponse> {
    let index = state.snapshot();
    Json(StatusResponse {
        columns: index.headers.len(),
        rows: index.row_count(),
        generation: state.generation(),
    })
}

fn content_type_for(filename: &str) -> &'static str {
    let ext = filename.rsplit('.').next().unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
