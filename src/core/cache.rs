//! Cross-run incremental cache.
//!
//! Keyed by per-file content hash with a time-based expiry. A hit
//! short-circuits re-scanning a file entirely, but the hash is always
//! recomputed from live content, so staleness never silently persists.
//! The cache is best-effort: a missing, corrupt, or version-skewed file
//! simply starts empty.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::extract::ExtractedQuery;

pub const CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry {
    content_hash: String,
    timestamp_secs: u64,
    queries: Vec<ExtractedQuery>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheFile {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug)]
pub struct PersistentCache {
    path: PathBuf,
    max_age_secs: u64,
    entries: HashMap<String, CacheEntry>,
}

impl PersistentCache {
    /// Load the cache file, dropping it entirely on version mismatch and
    /// pruning expired entries.
    pub fn load(path: &Path, max_age_secs: u64) -> Self {
        let entries = fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str::<CacheFile>(&content).ok())
            .filter(|cache| cache.version == CACHE_VERSION)
            .map(|cache| cache.entries)
            .unwrap_or_default();

        let mut cache = Self {
            path: path.to_path_buf(),
            max_age_secs,
            entries,
        };
        cache.prune_expired();
        cache
    }

    /// Cached queries for a file, if its live content still matches and the
    /// entry has not expired.
    pub fn lookup(&self, file_path: &str, content: &str) -> Option<Vec<ExtractedQuery>> {
        let entry = self.entries.get(file_path)?;
        if entry.content_hash != content_hash(content) {
            return None;
        }
        if self.is_expired(entry) {
            return None;
        }
        Some(entry.queries.clone())
    }

    pub fn store(&mut self, file_path: &str, content: &str, queries: Vec<ExtractedQuery>) {
        self.entries.insert(
            file_path.to_string(),
            CacheEntry {
                content_hash: content_hash(content),
                timestamp_secs: now_secs(),
                queries,
            },
        );
    }

    pub fn save(&self) -> Result<()> {
        let file = CacheFile {
            version: CACHE_VERSION,
            entries: self.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&file).context("Failed to serialize cache")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write cache file: {:?}", self.path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn prune_expired(&mut self) {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired_at(entry, now_secs()))
            .map(|(path, _)| path.clone())
            .collect();
        for path in expired {
            self.entries.remove(&path);
        }
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.is_expired_at(entry, now_secs())
    }

    fn is_expired_at(&self, entry: &CacheEntry, now: u64) -> bool {
        now.saturating_sub(entry.timestamp_secs) > self.max_age_secs
    }
}

/// Full SHA-256 of a file's content, as lowercase hex.
pub fn content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::core::extract::{OperationType, SourceLocation};

    fn query(id: &str) -> ExtractedQuery {
        ExtractedQuery {
            id: id.to_string(),
            file_path: "src/app.ts".to_string(),
            content: "query Q { a }".to_string(),
            operation_type: OperationType::Query,
            name: Some("Q".to_string()),
            location: SourceLocation::new(1, 0),
            needs_resolution: false,
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".gqlex-cache.json");

        let mut cache = PersistentCache::load(&path, 3600);
        assert!(cache.is_empty());
        cache.store("src/app.ts", "content", vec![query("src/app.ts:0")]);
        cache.save().unwrap();

        let reloaded = PersistentCache::load(&path, 3600);
        let hit = reloaded.lookup("src/app.ts", "content").unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].id, "src/app.ts:0");
    }

    #[test]
    fn test_content_change_misses() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".gqlex-cache.json");

        let mut cache = PersistentCache::load(&path, 3600);
        cache.store("src/app.ts", "old content", vec![query("src/app.ts:0")]);
        assert!(cache.lookup("src/app.ts", "new content").is_none());
    }

    #[test]
    fn test_corrupt_cache_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".gqlex-cache.json");
        fs::write(&path, "not json at all").unwrap();

        let cache = PersistentCache::load(&path, 3600);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_version_skew_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".gqlex-cache.json");
        fs::write(&path, r#"{ "version": 999, "entries": {} }"#).unwrap();

        let cache = PersistentCache::load(&path, 3600);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entry_misses() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".gqlex-cache.json");

        let mut cache = PersistentCache::load(&path, 0);
        cache.store("src/app.ts", "content", vec![query("src/app.ts:0")]);
        // Zero max age: anything older than "this instant" is expired; force
        // the entry into the past.
        cache.entries.get_mut("src/app.ts").unwrap().timestamp_secs -= 10;
        assert!(cache.lookup("src/app.ts", "content").is_none());
    }

    #[test]
    fn test_content_hash_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
    }
}
