//! On-disk cache for model responses.
//!
//! Entries are JSON files named by a SHA-256 key and expire after a TTL.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

#[derive(Serialize, Deserialize)]
struct CacheEntry<T> {
    created_at: DateTime<Utc>,
    value: T,
}

/// Response cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    /// Key over the given parts. Parts are length-delimited so that
    /// `["ab", "c"]` and `["a", "bc"]` differ.
    pub fn key(parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Fresh cached value for `key`, if any. Expired or unreadable entries are removed.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        let content = tokio::fs::read_to_string(&path).await.ok()?;

        let entry: CacheEntry<T> = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Discarding unreadable cache entry {}: {}", key, e);
                let _ = tokio::fs::remove_file(&path).await;
                return None;
            }
        };

        let age = Utc::now()
            .signed_duration_since(entry.created_at)
            .to_std()
            .unwrap_or_default();
        if age > self.ttl {
            debug!("Cache entry {} expired", key);
            let _ = tokio::fs::remove_file(&path).await;
            return None;
        }

        debug!("Cache hit for {}", key);
        Some(entry.value)
    }

    /// Store `value` under `key`.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let entry = CacheEntry {
            created_at: Utc::now(),
            value,
        };
        let content = serde_json::to_string(&entry)?;
        tokio::fs::write(self.path_for(key), content).await?;
        Ok(())
    }
}
