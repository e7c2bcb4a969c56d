//! Cover-art lookup in the host image cache.

use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Read-only view over the host's per-game image cache.
#[derive(Debug, Clone)]
pub struct ImageCache {
    root: PathBuf,
}

impl ImageCache {
    /// Cache rooted at `root`, laid out as `<root>/<app_id>/<file_name>`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Encode a cached image as a `data:` URL, or `None` when it is not cached.
    pub fn data_url(&self, app_id: &str, file_name: &str) -> Result<Option<String>> {
        let Some(path) = self.resolve(app_id, file_name) else {
            debug!("refusing image path {app_id}/{file_name}");
            return Ok(None);
        };
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("image not cached: {}", path.display());
                return Ok(None);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        Ok(Some(format!(
            "data:{};base64,{}",
            mime_type(&path),
            STANDARD.encode(bytes)
        )))
    }

    fn resolve(&self, app_id: &str, file_name: &str) -> Option<PathBuf> {
        if !is_plain_component(app_id) || !is_plain_component(file_name) {
            return None;
        }
        Some(self.root.join(app_id).join(file_name))
    }
}

fn is_plain_component(value: &str) -> bool {
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
