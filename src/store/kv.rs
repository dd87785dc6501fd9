//! Key-value backends
//!
//! `MemoryKv` for tests and ephemeral deployments, `FileKv` keeps one JSON
//! file per key in a directory.

use async_trait::async_trait;
use eyre::{eyre, Result};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, trace};

/// Get/put of opaque string blobs by key
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: String) -> Result<()>;
}

// ============================================
// IN-MEMORY
// ============================================

#[derive(Debug, Default)]
pub struct MemoryKv {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

// ============================================
// FILE-BACKED
// ============================================

/// One `<key>.json` file per key under a root directory
#[derive(Debug, Clone)]
pub struct FileKv {
    root: PathBuf,
}

impl FileKv {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{}.json", file_name))
    }
}

#[async_trait]
impl KvStore for FileKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                trace!("KV read {} ({} bytes)", path.display(), content.len());
                Ok(Some(content))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(eyre!("Failed to read {}: {}", path.display(), e)),
        }
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| eyre!("Failed to create {}: {}", self.root.display(), e))?;

        // Write then rename so readers never see a half-written blob
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value.as_bytes())
            .await
            .map_err(|e| eyre!("Failed to write {}: {}", tmp.display(), e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| eyre!("Failed to replace {}: {}", path.display(), e))?;

        debug!("KV wrote {} ({} bytes)", path.display(), value.len());
        Ok(())
    }
}
