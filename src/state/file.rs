//! JSON file implementation of [`KeyValueStore`].

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::time::unix_seconds;

use super::{KeyValueStore, LoadResult, StateError};

/// Current state file format version.
///
/// Increment this when making breaking changes to the format.
pub const STATE_FILE_VERSION: u32 = 1;

/// On-disk state file format.
///
/// Incompatible versions are treated as corrupted (no migrations).
#[derive(Debug, Serialize, Deserialize)]
struct StateFile<E> {
    /// Format version.
    version: u32,

    /// Unix timestamp when the file was written. Debugging aid only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<u64>,

    entries: E,
}

/// Identifies one version of the state file without reading it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
    /// Every write renames a new file into place, so the inode changes too.
    #[cfg(unix)]
    inode: u64,
}

impl FileStamp {
    /// Returns `None` if the file does not exist or has no mtime.
    fn of(path: &Path) -> Option<Self> {
        let metadata = std::fs::metadata(path).ok()?;
        Some(Self {
            modified: metadata.modified().ok()?,
            len: metadata.len(),
            #[cfg(unix)]
            inode: std::os::unix::fs::MetadataExt::ino(&metadata),
        })
    }
}

/// In-memory copy of the file and the version it was read from.
#[derive(Debug)]
struct Cached<V> {
    entries: BTreeMap<String, V>,
    stamp: Option<FileStamp>,
}

/// A [`KeyValueStore`] persisted as a single JSON file.
///
/// The file may be shared by several processes (the poller and the
/// management commands):
/// - Reads are served from memory, after re-reading the file if its
///   modification time, size or inode changed.
/// - `put` and `remove` hold an advisory lock on `{path}.lock`, apply the
///   change to the entries currently on disk and replace the file:
///   1. Write and fsync `{path}.tmp`
///   2. Rename `{path}.tmp` to `{path}` and fsync the directory
///
/// The in-memory map is only updated after the rename succeeded, so readers
/// never observe a value that is not on disk.
#[derive(Debug)]
pub struct JsonFileStore<V> {
    path: PathBuf,
    cache: RwLock<Cached<V>>,
    write_gate: Mutex<()>,
}

impl<V> JsonFileStore<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Opens the store at `path`, loading any previously saved entries.
    ///
    /// A missing file yields an empty store. A corrupted file is logged and
    /// also yields an empty store; it is overwritten by the next write.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stamp = FileStamp::of(&path);
        let entries = match Self::load(&path) {
            LoadResult::Loaded(entries) => {
                tracing::debug!(path = %path.display(), count = entries.len(), "Loaded state");
                entries
            }
            LoadResult::NotFound => {
                tracing::debug!(path = %path.display(), "No state file, starting empty");
                BTreeMap::new()
            }
            LoadResult::Corrupted { reason } => {
                tracing::warn!(path = %path.display(), %reason, "State file corrupted, starting empty");
                BTreeMap::new()
            }
        };

        Self {
            path,
            cache: RwLock::new(Cached { entries, stamp }),
            write_gate: Mutex::new(()),
        }
    }

    /// Reads the state file at `path` without opening a store.
    #[must_use]
    pub fn load(path: &Path) -> LoadResult<V> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return LoadResult::NotFound,
            Err(e) => {
                return LoadResult::Corrupted {
                    reason: format!("Failed to read file: {e}"),
                };
            }
        };

        match serde_json::from_str::<StateFile<BTreeMap<String, V>>>(&content) {
            Ok(state) if state.version != STATE_FILE_VERSION => LoadResult::Corrupted {
                reason: format!(
                    "Incompatible version: expected {STATE_FILE_VERSION}, got {}",
                    state.version
                ),
            },
            Ok(state) => LoadResult::Loaded(state.entries),
            Err(e) => LoadResult::Corrupted {
                reason: format!("Invalid JSON: {e}"),
            },
        }
    }

    /// Returns the path to the state file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the file if another writer replaced it since the last read.
    ///
    /// A corrupted file keeps the previous entries.
    fn refresh(&self) {
        let stamp = FileStamp::of(&self.path);
        let cached_stamp = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .stamp;
        if stamp == cached_stamp {
            return;
        }

        let loaded = match Self::load(&self.path) {
            LoadResult::Loaded(entries) => Some(entries),
            LoadResult::NotFound => Some(BTreeMap::new()),
            LoadResult::Corrupted { reason } => {
                tracing::warn!(path = %self.path.display(), %reason, "State file corrupted, keeping previous entries");
                None
            }
        };

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entries) = loaded {
            tracing::debug!(path = %self.path.display(), count = entries.len(), "State file changed, reloaded");
            cache.entries = entries;
        }
        cache.stamp = stamp;
    }

    /// Applies `mutate` to the entries on disk under the file lock.
    ///
    /// `mutate` returns its result and whether the entries changed; the
    /// file is only rewritten for a change.
    async fn modify<R, F>(&self, mutate: F) -> Result<R, StateError>
    where
        R: Send + 'static,
        F: FnOnce(&mut BTreeMap<String, V>) -> (R, bool) + Send + 'static,
    {
        let _gate = self.write_gate.lock().await;

        let path = self.path.clone();
        let (result, cached) = tokio::task::spawn_blocking(move || {
            let _lock = acquire_lock(&path)?;

            let mut entries = match Self::load(&path) {
                LoadResult::Loaded(entries) => entries,
                LoadResult::NotFound => BTreeMap::new(),
                LoadResult::Corrupted { reason } => {
                    tracing::warn!(path = %path.display(), %reason, "Overwriting corrupted state file");
                    BTreeMap::new()
                }
            };

            let (result, changed) = mutate(&mut entries);
            if changed {
                write_entries(&path, &entries)?;
            }

            let stamp = FileStamp::of(&path);
            Ok::<_, StateError>((result, Cached { entries, stamp }))
        })
        .await
        .map_err(|e| StateError::Task(e.to_string()))??;

        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = cached;
        Ok(result)
    }
}

fn lock_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.lock", path.display()))
}

/// Blocks until the exclusive lock for `path` is held.
///
/// The lock is released when the returned file is dropped.
fn acquire_lock(path: &Path) -> Result<File, StateError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(StateError::Write)?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path(path))
        .map_err(StateError::Lock)?;
    file.lock().map_err(StateError::Lock)?;
    Ok(file)
}

fn write_entries<V: Serialize>(path: &Path, entries: &BTreeMap<String, V>) -> Result<(), StateError> {
    let state = StateFile {
        version: STATE_FILE_VERSION,
        saved_at: Some(unix_seconds(SystemTime::now())),
        entries,
    };
    let content = serde_json::to_string_pretty(&state).map_err(StateError::Serialize)?;
    write_atomic(path, &content)
}

/// Replaces the file at `path` with `content` via a synced temp file and rename.
fn write_atomic(path: &Path, content: &str) -> Result<(), StateError> {
    // state.json -> state.json.tmp, not state.tmp
    let temp_path = PathBuf::from(format!("{}.tmp", path.display()));

    let mut file = File::create(&temp_path).map_err(StateError::Write)?;
    file.write_all(content.as_bytes())
        .map_err(StateError::Write)?;
    file.sync_all().map_err(StateError::Write)?;
    drop(file);

    std::fs::rename(&temp_path, path).map_err(StateError::Write)?;
    sync_parent(path).map_err(StateError::Write)
}

/// Makes the rename itself durable.
#[cfg(unix)]
fn sync_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => File::open(parent)?.sync_all(),
        _ => File::open(".")?.sync_all(),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl<V> KeyValueStore<V> for JsonFileStore<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn get(&self, key: &str) -> Option<V> {
        self.refresh();
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(key)
            .cloned()
    }

    fn entries(&self) -> Vec<(String, V)> {
        self.refresh();
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    async fn put(&self, key: &str, value: V) -> Result<(), StateError> {
        let key = key.to_string();
        self.modify(move |entries| {
            entries.insert(key, value);
            ((), true)
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<bool, StateError> {
        let key = key.to_string();
        self.modify(move |entries| {
            let removed = entries.remove(&key).is_some();
            (removed, removed)
        })
        .await
    }
}
