//! Filesystem collaborator interface for the plinth dev server.
//!
//! The server never touches the host filesystem directly. Everything goes
//! through the [`Vfs`] trait: existence checks, directory listings, file
//! reads, and change subscription. The canonical implementation is
//! [`MemoryVfs`], an in-memory tree suitable for hosted runtimes and tests;
//! embedders can provide their own backing store by implementing the trait.

pub mod memory;
pub mod watch;

pub use memory::MemoryVfs;
pub use watch::{ChangeKind, FileChange, WatchReceiver};

use std::fmt;
use std::path::{Path, PathBuf};

/// Result type for VFS operations.
pub type VfsResult<T> = Result<T, VfsError>;

/// Errors that can occur during VFS operations.
#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    /// File not found
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// File content is not valid UTF-8
    #[error("File is not valid UTF-8: {0}")]
    NotUtf8(PathBuf),

    /// Other I/O failure from the backing store
    #[error("I/O error: {0}")]
    Io(String),
}

/// Filesystem collaborator trait.
///
/// All methods are synchronous: route resolution is pure tree-walking and the
/// in-memory store has no suspension points. Implementations backed by real
/// I/O should keep these calls cheap (resolvers probe many candidate paths
/// per request and treat failures as "no match").
pub trait Vfs: Send + Sync + fmt::Debug {
    /// Check whether a path exists (file or directory).
    fn exists(&self, path: &Path) -> bool;

    /// Check whether a path is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Read a file as UTF-8 text.
    fn read_to_string(&self, path: &Path) -> VfsResult<String>;

    /// Read a file as raw bytes.
    fn read(&self, path: &Path) -> VfsResult<Vec<u8>>;

    /// List the child entry names of a directory.
    ///
    /// Entry names are returned in a deterministic (sorted) order so that
    /// resolution is stable across repeated calls.
    fn read_dir(&self, path: &Path) -> VfsResult<Vec<String>>;

    /// Subscribe to raw change events from this filesystem.
    ///
    /// Each mutation yields one [`FileChange`]; no debouncing or
    /// deduplication happens at this layer.
    fn watch(&self) -> WatchReceiver;
}
