//! In-memory VFS implementation.
//!
//! `MemoryVfs` stores file contents in a map keyed by normalized absolute
//! path. Directories are implicit: a path is a directory exactly when some
//! stored file lives beneath it. Mutations fire change events to every watch
//! subscriber.

use crate::watch::{ChangeKind, FileChange, WatchRegistry, WatchReceiver};
use crate::{Vfs, VfsError, VfsResult};
use parking_lot::RwLock;
use path_clean::PathClean;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// In-memory filesystem.
///
/// Paths are normalized before storage so `/project/./pages/index.jsx` and
/// `/project/pages/index.jsx` refer to the same entry. Relative paths are
/// resolved against `/`.
#[derive(Debug, Default)]
pub struct MemoryVfs {
    /// File contents keyed by normalized absolute path
    files: RwLock<FxHashMap<PathBuf, Vec<u8>>>,
    /// Watch subscribers
    watchers: RwLock<WatchRegistry>,
}

impl MemoryVfs {
    /// Create an empty in-memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a filesystem pre-populated with `(path, content)` pairs.
    pub fn with_files<P, C, I>(files: I) -> Self
    where
        P: Into<PathBuf>,
        C: Into<Vec<u8>>,
        I: IntoIterator<Item = (P, C)>,
    {
        let vfs = Self::new();
        {
            let mut store = vfs.files.write();
            for (path, content) in files {
                store.insert(normalize(&path.into()), content.into());
            }
        }
        vfs
    }

    /// Write a file, creating or overwriting it, and notify watchers.
    pub fn write(&self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        let normalized = normalize(&path.into());
        let kind = {
            let mut store = self.files.write();
            let existed = store.insert(normalized.clone(), content.into()).is_some();
            if existed {
                ChangeKind::Modified
            } else {
                ChangeKind::Created
            }
        };
        tracing::trace!(path = %normalized.display(), ?kind, "vfs write");
        self.watchers.write().broadcast(FileChange {
            kind,
            path: normalized,
        });
    }

    /// Remove a file and notify watchers.
    ///
    /// Removing a missing file is a no-op and emits no event.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let normalized = normalize(path.as_ref());
        let removed = self.files.write().remove(&normalized).is_some();
        if removed {
            tracing::trace!(path = %normalized.display(), "vfs remove");
            self.watchers.write().broadcast(FileChange {
                kind: ChangeKind::Removed,
                path: normalized,
            });
        }
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    /// Check whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl Vfs for MemoryVfs {
    fn exists(&self, path: &Path) -> bool {
        let normalized = normalize(path);
        if self.files.read().contains_key(&normalized) {
            return true;
        }
        self.is_dir(&normalized)
    }

    fn is_dir(&self, path: &Path) -> bool {
        let normalized = normalize(path);
        if normalized == Path::new("/") {
            return true;
        }
        let store = self.files.read();
        store
            .keys()
            .any(|key| key != &normalized && key.starts_with(&normalized))
    }

    fn read_to_string(&self, path: &Path) -> VfsResult<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|_| VfsError::NotUtf8(normalize(path)))
    }

    fn read(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let normalized = normalize(path);
        self.files
            .read()
            .get(&normalized)
            .cloned()
            .ok_or(VfsError::NotFound(normalized))
    }

    fn read_dir(&self, path: &Path) -> VfsResult<Vec<String>> {
        let normalized = normalize(path);
        if !self.is_dir(&normalized) {
            return Err(if self.files.read().contains_key(&normalized) {
                VfsError::NotADirectory(normalized)
            } else {
                VfsError::NotFound(normalized)
            });
        }

        // BTreeSet gives sorted, deduplicated entry names; resolvers rely on
        // this ordering for deterministic candidate selection.
        let mut entries = BTreeSet::new();
        let store = self.files.read();
        for key in store.keys() {
            if let Ok(rest) = key.strip_prefix(&normalized) {
                if let Some(Component::Normal(first)) = rest.components().next() {
                    if let Some(name) = first.to_str() {
                        entries.insert(name.to_string());
                    }
                }
            }
        }
        Ok(entries.into_iter().collect())
    }

    fn watch(&self) -> WatchReceiver {
        self.watchers.write().subscribe()
    }
}

/// Normalize a path for storage and lookup.
///
/// Relative paths resolve against `/`; redundant components are cleaned.
fn normalize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.clean()
    } else {
        Path::new("/").join(path).clean()
    }
}
