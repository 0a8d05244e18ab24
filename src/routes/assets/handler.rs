use std::path::{Component, Path as FilePath};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use tracing::error;

use crate::{
    AppState,
    utils::{http_date, parse_http_date},
};

/// 允许对外提供的扩展名与对应的 Content-Type
const ALLOWED_EXTS: &[(&str, &str)] = &[
    ("js", "application/x-javascript"),
    ("css", "text/css"),
    ("png", "image/png"),
];

/// 静态资源处理器：只认白名单扩展名，支持 If-Modified-Since 协商缓存
#[axum::debug_handler]
pub async fn serve(
    State(state): State<AppState>,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Response {
    let ext = file.rsplit('.').next().unwrap_or("");
    let Some(content_type) = content_type_for(ext) else {
        error!("Not an allowed file extension: {}", ext);
        return StatusCode::NOT_FOUND.into_response();
    };

    // 越界检查先于存在性检查，不给探测资源根之外文件的机会
    let relative = FilePath::new(&file);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        error!("Path escapes the resource root: '{}'", file);
        return StatusCode::FORBIDDEN.into_response();
    }

    let resource_path = state.config.static_dir.join(relative);
    let metadata = match tokio::fs::metadata(&resource_path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => {
            error!("Not an existing file: '{}'", resource_path.display());
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    // 符号链接仍可能指到根外面，按真实路径再把一道关
    if !contained_in_root(&state.config.static_dir, &resource_path).await {
        error!(
            "Not contained in the resource root: '{}'",
            resource_path.display()
        );
        return StatusCode::FORBIDDEN.into_response();
    }

    let last_modified = match metadata.modified() {
        Ok(time) => truncate_to_seconds(DateTime::<Utc>::from(time)),
        Err(e) => {
            error!(
                "Failed to read mtime of '{}': {}",
                resource_path.display(),
                e
            );
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    if let Some(cached_at) = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_http_date)
    {
        // 缓存副本不旧于文件就直接 304
        if cached_at >= last_modified {
            return StatusCode::NOT_MODIFIED.into_response();
        }
    }

    output_file(&resource_path, content_type, last_modified).await
}

fn content_type_for(ext: &str) -> Option<&'static str> {
    ALLOWED_EXTS
        .iter()
        .find(|(allowed, _)| *allowed == ext)
        .map(|(_, content_type)| *content_type)
}

/// mtime 带纳秒，而 HTTP 日期只有秒，比较前先抹掉亚秒部分
fn truncate_to_seconds(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or(time)
}

async fn contained_in_root(root: &FilePath, path: &FilePath) -> bool {
    let (Ok(root), Ok(path)) = (
        tokio::fs::canonicalize(root).await,
        tokio::fs::canonicalize(path).await,
    ) else {
        return false;
    };
    path.starts_with(&root)
}

async fn output_file(
    path: &FilePath,
    content_type: &'static str,
    last_modified: DateTime<Utc>,
) -> Response {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to output file: {}", e);
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let expires = last_modified + Duration::days(365);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CACHE_CONTROL,
                "public, max-age=31536000".to_string(),
            ),
            (header::LAST_MODIFIED, http_date(last_modified)),
            (header::EXPIRES, http_date(expires)),
        ],
        bytes,
    )
        .into_response()
}
