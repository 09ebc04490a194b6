//! Content-addressed transform cache.
//!
//! Compilation is delegated to the injected [`Transformer`]; this module
//! only decides when to invoke it. Entries are keyed by absolute source path
//! and validated by a blake3 hash of the file content, so a revert to prior
//! content is a cache hit and staleness can never be a clock problem.

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::DEFAULT_CACHE_CAPACITY;

/// Compiler collaborator failure.
#[derive(Debug, Clone, Error)]
#[error("Transform error in {}: {message}", .file.display())]
pub struct TransformError {
    /// File that failed to compile
    pub file: PathBuf,
    /// Compiler message
    pub message: String,
}

impl TransformError {
    /// Create an error for `file` with the given compiler message.
    pub fn new(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            message: message.into(),
        }
    }
}

/// Compiler collaborator: source text in, browser-loadable module text out.
pub trait Transformer: Send + Sync {
    /// Compile one source file.
    fn transform(&self, source: &str, file: &Path) -> Result<String, TransformError>;
}

/// One cached compilation.
#[derive(Debug, Clone)]
struct TransformCacheEntry {
    /// blake3 hex digest of the source content this entry was compiled from
    source_hash: String,
    /// Compiled module text
    compiled: String,
}

/// Bounded, content-addressed compilation cache.
///
/// Owned by the server instance and shared across in-flight requests. The
/// bound is enforced by evicting the oldest-inserted entry, not the least
/// recently used one; churn under the bound is rare enough that the simpler
/// policy wins.
#[derive(Debug)]
pub struct TransformCache {
    entries: RwLock<IndexMap<PathBuf, TransformCacheEntry>>,
    capacity: usize,
}

impl TransformCache {
    /// Create a cache bounded to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            capacity,
        }
    }

    /// Look up the compilation of `path` for `content`, invoking `compute`
    /// only on a miss.
    ///
    /// A stored entry whose hash matches the current content is returned
    /// as-is; otherwise `compute` runs (with no lock held) and its output
    /// overwrites the entry. Overwriting keeps the entry's original
    /// insertion slot, so eviction age is first-insertion age.
    pub fn get_or_compute(
        &self,
        path: &Path,
        content: &str,
        compute: impl FnOnce(&str) -> Result<String, TransformError>,
    ) -> Result<String, TransformError> {
        let hash = blake3::hash(content.as_bytes()).to_hex().to_string();

        if let Some(entry) = self.entries.read().get(path) {
            if entry.source_hash == hash {
                tracing::debug!(path = %path.display(), "transform cache hit");
                return Ok(entry.compiled.clone());
            }
        }

        let compiled = compute(content)?;

        let mut entries = self.entries.write();
        entries.insert(
            path.to_path_buf(),
            TransformCacheEntry {
                source_hash: hash,
                compiled: compiled.clone(),
            },
        );
        while entries.len() > self.capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                tracing::debug!(path = %evicted.display(), "transform cache evicted");
            }
        }

        Ok(compiled)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for TransformCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// Substitute module body for a failed transform.
///
/// Served with a success status so the importing page keeps its module graph
/// intact; the error surfaces in the consumer's console instead of as a
/// cascade of failed imports.
pub fn error_script(file: &Path, message: &str) -> String {
    let text = format!("Failed to compile {}: {}", file.display(), message);
    // serde_json handles quoting and escaping for the embedded string
    let escaped = serde_json::to_string(&text).unwrap_or_else(|_| "\"compile error\"".to_string());
    format!("console.error({escaped});\nexport default undefined;\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counted<'a>(
        calls: &'a AtomicUsize,
    ) -> impl Fn(&str) -> Result<String, TransformError> + 'a {
        move |src| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("compiled:{src}"))
        }
    }

    #[test]
    fn repeat_content_invokes_compute_once() {
        let cache = TransformCache::new(10);
        let calls = AtomicUsize::new(0);
        let path = Path::new("/app/page.tsx");

        let first = cache.get_or_compute(path, "source", counted(&calls)).unwrap();
        let second = cache.get_or_compute(path, "source", counted(&calls)).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn changed_content_recomputes() {
        let cache = TransformCache::new(10);
        let calls = AtomicUsize::new(0);
        let path = Path::new("/app/page.tsx");

        cache.get_or_compute(path, "v1", counted(&calls)).unwrap();
        cache.get_or_compute(path, "v2", counted(&calls)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reverted_content_is_a_hit() {
        let cache = TransformCache::new(10);
        let calls = AtomicUsize::new(0);
        let path = Path::new("/app/page.tsx");

        cache.get_or_compute(path, "v1", counted(&calls)).unwrap();
        cache.get_or_compute(path, "v2", counted(&calls)).unwrap();
        // Same path, original content: only the stored v2 entry exists, so
        // this recomputes; but an immediate repeat of v1 then hits.
        cache.get_or_compute(path, "v1", counted(&calls)).unwrap();
        cache.get_or_compute(path, "v1", counted(&calls)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn eviction_removes_oldest_inserted() {
        let cache = TransformCache::new(2);
        let ok = |src: &str| Ok(src.to_string());

        cache.get_or_compute(Path::new("/a.ts"), "a", ok).unwrap();
        cache.get_or_compute(Path::new("/b.ts"), "b", ok).unwrap();

        // Touch /a.ts with a hit; FIFO eviction must ignore the access
        cache.get_or_compute(Path::new("/a.ts"), "a", ok).unwrap();

        cache.get_or_compute(Path::new("/c.ts"), "c", ok).unwrap();
        assert_eq!(cache.len(), 2);

        // /a.ts was inserted first, so it is the one evicted
        let calls = AtomicUsize::new(0);
        cache
            .get_or_compute(Path::new("/a.ts"), "a", counted(&calls))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transform_failure_propagates_and_caches_nothing() {
        let cache = TransformCache::new(10);
        let path = Path::new("/broken.tsx");
        let err = cache
            .get_or_compute(path, "bad", |_| {
                Err(TransformError::new(path, "unexpected token"))
            })
            .unwrap_err();
        assert!(err.to_string().contains("unexpected token"));
        assert!(cache.is_empty());
    }

    #[test]
    fn error_script_embeds_escaped_message() {
        let script = error_script(Path::new("/app/page.tsx"), "unexpected \"token\"");
        assert!(script.starts_with("console.error("));
        assert!(script.contains("unexpected \\\"token\\\""));
    }
}
