//! Static file serving module
//!
//! Resolves request paths to files under the served root with SPA fallback,
//! then encodes the file and attaches cache headers.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::ACCEPT_ENCODING;
use hyper::http::request::Parts;
use hyper::Response;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::AppState;
use crate::error::ServeError;
use crate::http::{mime, response};
use crate::logger;

/// A file picked for the response, read fully into memory
#[derive(Debug)]
pub struct ResolvedAsset {
    pub path: PathBuf,
    pub content: Vec<u8>,
    /// Lowercased extension
    pub extension: Option<String>,
}

/// Serve a GET request from the static root
pub async fn serve(parts: &Parts, state: &AppState) -> Result<Response<Full<Bytes>>, ServeError> {
    let asset = resolve(&state.root, &state.config.assets.index_file, parts.uri.path()).await?;
    let extension = asset.extension.as_deref();

    let cache = state.cache_rules.headers_for(extension);
    let content_type = mime::get_content_type(extension);
    let accept_encoding = parts
        .headers
        .get(ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok());

    let original_len = asset.content.len();
    let encoded = state
        .compression
        .encode(asset.content, extension, accept_encoding);

    logger::log_debug(&format!(
        "Serving {} ({original_len} -> {} bytes, encoding: {})",
        asset.path.display(),
        encoded.body.len(),
        encoded.encoding.unwrap_or("identity"),
    ));

    Ok(response::build_asset_response(
        encoded.body,
        content_type,
        encoded.encoding,
        encoded.compressible,
        &cache,
    ))
}

/// Resolve a request path and read the file
///
/// Fails with `NotFound` only when the chosen target cannot be read, which
/// happens when the index document itself is missing.
pub async fn resolve(
    root: &Path,
    index_file: &str,
    request_path: &str,
) -> Result<ResolvedAsset, ServeError> {
    let path = resolve_target(root, index_file, request_path).await;

    let content = fs::read(&path).await.map_err(|e| {
        logger::log_error(&format!("Failed to read '{}': {e}", path.display()));
        ServeError::NotFound(request_path.to_string())
    })?;

    Ok(ResolvedAsset {
        extension: mime::extension_of(&path),
        path,
        content,
    })
}

/// Pick the file for a request path, first match wins:
/// 1. `/` -> root index
/// 2. existing regular file
/// 3. existing directory holding an index document
/// 4. root index (SPA fallback)
pub async fn resolve_target(root: &Path, index_file: &str, request_path: &str) -> PathBuf {
    let root_index = root.join(index_file);

    let segments = normalize_path(request_path);
    if segments.is_empty() {
        return root_index;
    }

    let candidate = segments.iter().fold(root.to_path_buf(), |acc, s| acc.join(s));
    let Ok(meta) = fs::metadata(&candidate).await else {
        return root_index;
    };

    let target = if meta.is_file() {
        candidate
    } else if meta.is_dir() {
        let dir_index = candidate.join(index_file);
        match fs::metadata(&dir_index).await {
            Ok(m) if m.is_file() => dir_index,
            _ => return root_index,
        }
    } else {
        return root_index;
    };

    if is_within_root(root, &target).await {
        target
    } else {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {request_path} -> {}",
            target.display()
        ));
        root_index
    }
}

/// Split a request path into safe relative segments.
///
/// The query string is dropped and the path percent-decoded before `.`/`..`
/// are collapsed; `..` never climbs above the root.
pub fn normalize_path(request_path: &str) -> Vec<String> {
    let path = request_path.split(['?', '#']).next().unwrap_or("");
    let decoded = percent_decode_str(path).decode_utf8_lossy();

    let mut segments: Vec<String> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s if s.contains(['\0', '\\']) => {}
            s => segments.push(s.to_string()),
        }
    }
    segments
}

/// Symlink guard: the canonical target must stay under the canonical root
async fn is_within_root(root: &Path, target: &Path) -> bool {
    let (Ok(root), Ok(target)) = (fs::canonicalize(root).await, fs::canonicalize(target).await)
    else {
        return false;
    };
    target.starts_with(root)
}
