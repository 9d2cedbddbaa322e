use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use rilievo_core::errors::{Error, Result};
use rilievo_core::sync::BlobStoreTrait;

const ATTACHMENTS_DIR: &str = "attachments";

/// Keeps `[A-Za-z0-9._-]`, replaces the rest with `_` and refuses names that
/// would escape their directory.
fn sanitize_component(value: &str, what: &str) -> Result<String> {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return Err(Error::validation(format!("Invalid {} '{}'", what, value)));
    }
    Ok(cleaned)
}

/// Attachment storage on the local filesystem, one directory per device.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: data_dir.into().join(ATTACHMENTS_DIR),
        }
    }
}

#[async_trait]
impl BlobStoreTrait for LocalBlobStore {
    async fn store(&self, device_id: &str, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        let dir = self.root.join(sanitize_component(device_id, "device id")?);
        let path = dir.join(sanitize_component(file_name, "file name")?);

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::Unexpected(format!("Failed to create {}: {}", dir.display(), e)))?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| Error::Unexpected(format!("Failed to write {}: {}", path.display(), e)))?;

        debug!("Stored {} byte(s) at {}", bytes.len(), path.display());
        Ok(path.to_string_lossy().to_string())
    }
}
