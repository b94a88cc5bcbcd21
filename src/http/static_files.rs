//! Static file fallback for hosts without proxy rules.
//!
//! Files are served by `tower_http::services::ServeDir`; `mime:` rules
//! override the guessed `Content-Type` by file extension.

use std::collections::HashMap;
use std::convert::Infallible;
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Request};
use axum::response::Response;
use tower::ServiceExt;
use tower_http::services::ServeDir;

/// Document root plus extension → MIME overrides.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    mime: HashMap<String, HeaderValue>,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mime: HashMap::new(),
        }
    }

    /// Register an override; invalid header values are skipped.
    pub fn with_mime(mut self, extension: &str, mime: &str) -> Self {
        match HeaderValue::from_str(mime) {
            Ok(value) => {
                self.mime.insert(extension.to_ascii_lowercase(), value);
            }
            Err(_) => tracing::warn!(extension, mime, "Ignoring unusable MIME type"),
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn serve(&self, request: Request<Body>) -> Response {
        let extension = extension_of(request.uri().path());
        let result: Result<_, Infallible> = ServeDir::new(&self.root).oneshot(request).await;
        let mut response = match result {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        };

        if response.status().is_success() {
            if let Some(mime) = extension.and_then(|ext| self.mime.get(&ext)) {
                response.headers_mut().insert(CONTENT_TYPE, mime.clone());
            }
        }
        response
    }
}

fn extension_of(path: &str) -> Option<String> {
    let file = path.rsplit('/').next()?;
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
