use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Key-value store for the last good snapshot of each adapter's bundles
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<Value>>;
    /// Overwrites the whole value under `key`
    async fn set_item(&self, key: &str, value: Value) -> Result<()>;
}

/// In-memory cache implementation for development/testing
#[derive(Default, Clone)]
pub struct InMemoryCache {
    items: Arc<Mutex<HashMap<String, Value>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> ScraperError {
    ScraperError::Cache("cache lock poisoned".to_string())
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get_item(&self, key: &str) -> Result<Option<Value>> {
        let items = self.items.lock().map_err(poisoned)?;
        Ok(items.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: Value) -> Result<()> {
        let mut items = self.items.lock().map_err(poisoned)?;
        items.insert(key.to_string(), value);
        debug!("Cached {} in memory", key);
        Ok(())
    }
}

/// One JSON file per key under a directory
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl CacheStore for FileCache {
    async fn get_item(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_item(&self, key: &str, value: Value) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        let bytes = serde_json::to_vec_pretty(&value)?;

        // Readers never see a half-written snapshot
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Cached {} at {}", key, path.display());
        Ok(())
    }
}
