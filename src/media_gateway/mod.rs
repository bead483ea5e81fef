//! MediaGateway - Recorded Video Serving
//!
//! ## Responsibilities
//!
//! - Range-capable playback of recorded clips under a fixed media root
//! - Rejection of any path escaping that root
//! - Health endpoint reporting backend reachability
//!
//! Requests name a file relative to the configured media directory; the
//! resolved path must stay inside it or the request is rejected with a
//! 400-class response.

use crate::error::{Error, Result};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// Create the console's HTTP router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/media", get(serve_media))
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let backend_ok = state.api.health_check().await.unwrap_or(false);
    let connection = state.live.connection().await;

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "backend_connected": backend_ok,
        "stream_connected": connection.is_connected,
    }))
}

#[derive(Debug, Deserialize)]
struct MediaQuery {
    file: String,
}

/// Resolve a requested file against the media root. Only plain path
/// segments are accepted; `..`, absolute paths and drive prefixes are
/// rejected before the filesystem is touched.
pub fn resolve_media_path(root: &Path, file: &str) -> Result<PathBuf> {
    let mut resolved = root.to_path_buf();
    for component in Path::new(file).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return Err(Error::Validation("invalid file path".to_string())),
        }
    }
    if !resolved.starts_with(root) {
        return Err(Error::Validation("invalid file path".to_string()));
    }
    Ok(resolved)
}

/// Parse a `bytes=a-b` range header against the file size
fn parse_range(value: &str, size: u64) -> Option<(u64, u64)> {
    let rest = value.strip_prefix("bytes=")?;
    let (start_str, end_str) = rest.split_once('-')?;
    let start: u64 = start_str.trim().parse().ok()?;
    let end: u64 = if end_str.trim().is_empty() {
        size.checked_sub(1)?
    } else {
        end_str.trim().parse().ok()?
    };
    if start > end || end >= size {
        return None;
    }
    Some((start, end))
}

/// Serve a recorded clip, honoring single byte ranges
async fn serve_media(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    let path = resolve_media_path(&state.config.media_dir, &query.file)?;

    let meta = tokio::fs::metadata(&path)
        .await
        .map_err(|_| Error::NotFound(query.file.clone()))?;
    if !meta.is_file() {
        return Err(Error::NotFound(query.file.clone()));
    }
    let size = meta.len();

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_range(v, size));

    let mut file = tokio::fs::File::open(&path).await?;

    if let Some((start, end)) = range {
        let len = end - start + 1;
        file.seek(std::io::SeekFrom::Start(start)).await?;
        let body = Body::from_stream(ReaderStream::new(file.take(len)));

        let response = Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_TYPE, "video/mp4")
            .header(header::CONTENT_LENGTH, len)
            .header(header::ACCEPT_RANGES, "bytes")
            .header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, end, size),
            )
            .body(body)
            .map_err(|e| Error::Internal(e.to_string()))?;
        return Ok(response);
    }

    let body = Body::from_stream(ReaderStream::new(file));
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, size)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CACHE_CONTROL, "public, max-age=60")
        .body(body)
        .map_err(|e| Error::Internal(e.to_string()))?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_accepts_nested_relative_paths() {
        let root = Path::new("/var/lib/railguard/videos");
        assert_eq!(
            resolve_media_path(root, "clips/JPL-102/cam1.mp4").unwrap(),
            PathBuf::from("/var/lib/railguard/videos/clips/JPL-102/cam1.mp4")
        );
        assert_eq!(
            resolve_media_path(root, "./cam1.mp4").unwrap(),
            PathBuf::from("/var/lib/railguard/videos/cam1.mp4")
        );
    }

    #[test]
    fn resolve_rejects_traversal() {
        let root = Path::new("/var/lib/railguard/videos");
        assert!(resolve_media_path(root, "../etc/passwd").is_err());
        assert!(resolve_media_path(root, "clips/../../secret.mp4").is_err());
        assert!(resolve_media_path(root, "/etc/passwd").is_err());
    }

    #[test]
    fn parse_range_variants() {
        assert_eq!(parse_range("bytes=0-99", 1000), Some((0, 99)));
        assert_eq!(parse_range("bytes=500-", 1000), Some((500, 999)));
        assert_eq!(parse_range("bytes=0-", 1000), Some((0, 999)));

        // Out of bounds or malformed.
        assert_eq!(parse_range("bytes=900-1000", 1000), None);
        assert_eq!(parse_range("bytes=9-5", 1000), None);
        assert_eq!(parse_range("bytes=abc-", 1000), None);
        assert_eq!(parse_range("0-99", 1000), None);
        assert_eq!(parse_range("bytes=0-", 0), None);
    }
}
