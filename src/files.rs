use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("failed to write file: {0}")]
    Io(#[from] std::io::Error),
    #[error("file store operation timed out")]
    Timeout,
}

/// Durable blob storage. Returns a public URL the stored file can be fetched
/// from later.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn store(&self, bytes: Bytes, original_name: &str) -> Result<String, FileStoreError>;
}

/// Stores uploads on the local disk under server-assigned names; the HTTP
/// server serves them back under `/files/`.
pub struct DiskFileStore {
    dir: PathBuf,
    public_base_url: String,
}

impl DiskFileStore {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FileStore for DiskFileStore {
    async fn store(&self, bytes: Bytes, original_name: &str) -> Result<String, FileStoreError> {
        let stored_name = match sanitized_extension(original_name) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        let path = self.dir.join(&stored_name);

        let write = tokio::fs::write(&path, &bytes);
        tokio::time::timeout(WRITE_TIMEOUT, write)
            .await
            .map_err(|_| FileStoreError::Timeout)??;

        info!("stored upload {} as {}", original_name, stored_name);
        Ok(format!("{}/files/{}", self.public_base_url, stored_name))
    }
}

/// Extension of the client-supplied filename, kept only if short and purely
/// alphanumeric. The stored name must never reproduce client-controlled path
/// characters.
fn sanitized_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    if ext.len() <= 16 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext.to_ascii_lowercase())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_writes_bytes_and_returns_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFileStore::new(dir.path(), "http://localhost:3000/");

        let url = store
            .store(Bytes::from_static(b"file contents"), "notes.txt")
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:3000/files/"));
        assert!(url.ends_with(".txt"));

        let stored_name = url.rsplit('/').next().unwrap();
        let on_disk = std::fs::read(dir.path().join(stored_name)).unwrap();
        assert_eq!(on_disk, b"file contents");
    }

    #[tokio::test]
    async fn test_stored_name_ignores_client_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFileStore::new(dir.path(), "http://localhost:3000");

        let url = store
            .store(Bytes::from_static(b"x"), "../../etc/passwd")
            .await
            .unwrap();

        let stored_name = url.rsplit('/').next().unwrap();
        assert!(!stored_name.contains(".."));
        assert!(dir.path().join(stored_name).exists());
    }

    #[test]
    fn test_sanitized_extension() {
        assert_eq!(sanitized_extension("cat.PNG"), Some("png".to_string()));
        assert_eq!(sanitized_extension("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(sanitized_extension("no_extension"), None);
        assert_eq!(sanitized_extension("weird.p/ng"), None);
        assert_eq!(
            sanitized_extension("long.extensionthatgoesonforever"),
            None
        );
    }
}
