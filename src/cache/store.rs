//! Cache storage backends
//!
//! A store keeps one directory snapshot per key. Restoring accepts the
//! primary key or any key starting with one of the restore prefixes, newest
//! first.

use crate::error::{DockhandError, DockhandResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

const INDEX_FILE: &str = "index.json";

/// Where cache snapshots live between jobs
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Restore a snapshot into `path`, returning the key that matched
    async fn restore(
        &self,
        path: &Path,
        primary_key: &str,
        restore_keys: &[String],
    ) -> DockhandResult<Option<String>>;

    /// Save the contents of `path` under `key`
    async fn save(&self, path: &Path, key: &str) -> DockhandResult<()>;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheIndex {
    /// Archive file name to entry
    entries: BTreeMap<String, IndexEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    key: String,
    saved_at: DateTime<Utc>,
}

impl CacheIndex {
    /// Archive for the primary key, else the newest archive matching the
    /// first restore prefix that matches anything
    fn lookup(&self, primary_key: &str, restore_keys: &[String]) -> Option<(&str, &IndexEntry)> {
        if let Some(found) = self.entries.iter().find(|(_, e)| e.key == primary_key) {
            return Some((found.0.as_str(), found.1));
        }

        restore_keys.iter().find_map(|prefix| {
            self.entries
                .iter()
                .filter(|(_, e)| e.key.starts_with(prefix.as_str()))
                .max_by_key(|(_, e)| e.saved_at)
                .map(|(name, e)| (name.as_str(), e))
        })
    }
}

impl CacheIndex {
    /// Drop all but the newest `keep` entries sharing `key`'s prefix
    /// (everything up to its last `-`), returning the removed archive names
    fn prune(&mut self, key: &str, keep: usize) -> Vec<String> {
        let Some((prefix, _)) = key.rsplit_once('-') else {
            return Vec::new();
        };
        let prefix = format!("{}-", prefix);

        let mut family: Vec<(&String, &IndexEntry)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.key.starts_with(&prefix))
            .collect();
        family.sort_by(|a, b| b.1.saved_at.cmp(&a.1.saved_at));

        let stale: Vec<String> = family
            .into_iter()
            .filter(|(_, e)| e.key != key)
            .skip(keep.saturating_sub(1))
            .map(|(name, _)| name.clone())
            .collect();
        for name in &stale {
            self.entries.remove(name);
        }
        stale
    }
}

/// Archive file name for a key: SHA-256 of the key
pub fn archive_name(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{}.tar.gz", hex::encode(hasher.finalize()))
}

fn cache_io(context: String) -> impl FnOnce(std::io::Error) -> DockhandError {
    move |e| DockhandError::Cache(format!("{}: {}", context, e))
}

async fn blocking<F, T>(task: F) -> DockhandResult<T>
where
    F: FnOnce() -> DockhandResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| DockhandError::Cache(format!("cache task failed: {}", e)))?
}

/// Gzip-compressed tar archives in a runner-local directory.
///
/// Each save keeps the newest `keep` archives of its key prefix and
/// deletes the rest.
#[derive(Debug, Clone)]
pub struct LocalCacheStore {
    dir: PathBuf,
    keep: usize,
}

impl LocalCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            keep: 1,
        }
    }

    /// Archives kept per key prefix, never fewer than one
    pub fn with_keep(mut self, keep: usize) -> Self {
        self.keep = keep.max(1);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load_index(dir: &Path) -> DockhandResult<CacheIndex> {
        let path = dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(CacheIndex::default());
        }

        let content =
            fs::read_to_string(&path).map_err(cache_io(format!("reading {}", path.display())))?;
        serde_json::from_str(&content).map_err(|e| {
            DockhandError::Cache(format!("corrupt cache index {}: {}", path.display(), e))
        })
    }

    fn write_index(dir: &Path, index: &CacheIndex) -> DockhandResult<()> {
        let path = dir.join(INDEX_FILE);
        let tmp = dir.join(format!("{}.tmp", INDEX_FILE));
        let content = serde_json::to_string_pretty(index)
            .map_err(|e| DockhandError::Cache(format!("encoding cache index: {}", e)))?;
        fs::write(&tmp, content).map_err(cache_io(format!("writing {}", tmp.display())))?;
        fs::rename(&tmp, &path).map_err(cache_io(format!("replacing {}", path.display())))
    }
}

#[async_trait]
impl CacheStore for LocalCacheStore {
    async fn restore(
        &self,
        path: &Path,
        primary_key: &str,
        restore_keys: &[String],
    ) -> DockhandResult<Option<String>> {
        let dir = self.dir.clone();
        let target = path.to_path_buf();
        let primary_key = primary_key.to_string();
        let restore_keys = restore_keys.to_vec();

        blocking(move || {
            let index = Self::load_index(&dir)?;
            let Some((name, entry)) = index.lookup(&primary_key, &restore_keys) else {
                return Ok(None);
            };

            let archive_path = dir.join(name);
            debug!("Unpacking {} into {}", archive_path.display(), target.display());

            fs::create_dir_all(&target)
                .map_err(cache_io(format!("creating {}", target.display())))?;
            let file = File::open(&archive_path)
                .map_err(cache_io(format!("opening {}", archive_path.display())))?;
            tar::Archive::new(GzDecoder::new(file))
                .unpack(&target)
                .map_err(cache_io(format!("unpacking {}", archive_path.display())))?;

            Ok(Some(entry.key.clone()))
        })
        .await
    }

    async fn save(&self, path: &Path, key: &str) -> DockhandResult<()> {
        if !path.is_dir() {
            return Err(DockhandError::Cache(format!(
                "nothing to save, {} does not exist",
                path.display()
            )));
        }

        let dir = self.dir.clone();
        let source = path.to_path_buf();
        let key = key.to_string();
        let keep = self.keep;

        blocking(move || {
            fs::create_dir_all(&dir).map_err(cache_io(format!("creating {}", dir.display())))?;

            let name = archive_name(&key);
            let archive_path = dir.join(&name);
            let tmp = dir.join(format!("{}.tmp", name));
            debug!("Packing {} into {}", source.display(), archive_path.display());

            let file =
                File::create(&tmp).map_err(cache_io(format!("creating {}", tmp.display())))?;
            let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
            builder
                .append_dir_all(".", &source)
                .map_err(cache_io(format!("archiving {}", source.display())))?;
            builder
                .into_inner()
                .and_then(|encoder| encoder.finish())
                .map_err(cache_io(format!("finishing {}", tmp.display())))?;
            fs::rename(&tmp, &archive_path)
                .map_err(cache_io(format!("replacing {}", archive_path.display())))?;

            let mut index = Self::load_index(&dir)?;
            let stale = index.prune(&key, keep);
            index.entries.insert(
                name,
                IndexEntry {
                    key,
                    saved_at: Utc::now(),
                },
            );
            Self::write_index(&dir, &index)?;

            for name in stale {
                let path = dir.join(&name);
                match fs::remove_file(&path) {
                    Ok(()) => debug!("Evicted {}", path.display()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(cache_io(format!("removing {}", path.display()))(e)),
                }
            }
            Ok(())
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use std::sync::Mutex;

    /// In-process store that only tracks keys
    pub(crate) struct MemoryCacheStore {
        available: Vec<String>,
        saved: Mutex<Vec<String>>,
        unreachable: bool,
    }

    impl MemoryCacheStore {
        pub fn new() -> Self {
            Self {
                available: Vec::new(),
                saved: Mutex::new(Vec::new()),
                unreachable: false,
            }
        }

        /// Every operation fails
        pub fn unreachable() -> Self {
            Self {
                unreachable: true,
                ..Self::new()
            }
        }

        pub fn with_entry(mut self, key: &str) -> Self {
            self.available.push(key.to_string());
            self
        }

        pub fn saved(&self) -> Vec<String> {
            self.saved.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CacheStore for MemoryCacheStore {
        async fn restore(
            &self,
            _path: &Path,
            primary_key: &str,
            restore_keys: &[String],
        ) -> DockhandResult<Option<String>> {
            if self.unreachable {
                return Err(DockhandError::Cache("store unreachable".to_string()));
            }
            if let Some(key) = self.available.iter().find(|k| k.as_str() == primary_key) {
                return Ok(Some(key.clone()));
            }
            Ok(restore_keys.iter().find_map(|prefix| {
                self.available
                    .iter()
                    .rev()
                    .find(|k| k.starts_with(prefix.as_str()))
                    .cloned()
            }))
        }

        async fn save(&self, _path: &Path, key: &str) -> DockhandResult<()> {
            if self.unreachable {
                return Err(DockhandError::Cache("store unreachable".to_string()));
            }
            self.saved.lock().unwrap().push(key.to_string());
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "memory"
        }
    }
}
