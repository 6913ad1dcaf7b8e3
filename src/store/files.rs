use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

/// Destination for output files. A `put` overwrites any previous object
/// with the same name.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn put(&self, name: &str, body: &[u8]) -> Result<String>;
}

/// Writes files under a local directory.
pub struct LocalFileStore {
    dir: PathBuf,
}

impl LocalFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    /// Returns the path written.
    async fn put(&self, name: &str, body: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        let path = self.dir.join(name);
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        debug!(path = %path.display(), bytes = body.len(), "File written");
        Ok(path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_creates_dir_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().join("nested"));

        store.put("a.csv", b"first").await.unwrap();
        let path = store.put("a.csv", b"second").await.unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "second");
    }
}
