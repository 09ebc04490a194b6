//! Change subscription primitive for VFS implementations.
//!
//! A watcher receives one [`FileChange`] per mutation, in the order the
//! mutations happened. Classification into hot-update vs full-reload is the
//! server's job; this layer only reports what changed.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Kind of raw filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// File was created
    Created,
    /// File was modified
    Modified,
    /// File was removed
    Removed,
}

/// A raw file change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// What happened
    pub kind: ChangeKind,
    /// Affected path
    pub path: PathBuf,
}

impl FileChange {
    /// Get the path affected by this change.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Receiver half of a watch subscription.
pub type WatchReceiver = mpsc::UnboundedReceiver<FileChange>;

/// Registry of watch subscribers.
///
/// Senders that fail (receiver dropped) are pruned during broadcast rather
/// than eagerly, matching the send-and-sweep pattern used for reload
/// subscribers on the server side.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    senders: Vec<mpsc::UnboundedSender<FileChange>>,
}

impl WatchRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its receiver.
    pub fn subscribe(&mut self) -> WatchReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        rx
    }

    /// Broadcast a change to every live subscriber.
    pub fn broadcast(&mut self, change: FileChange) {
        self.senders.retain(|tx| tx.send(change.clone()).is_ok());
    }

    /// Number of live subscribers.
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    /// Check whether the registry has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers() {
        let mut registry = WatchRegistry::new();
        let mut rx1 = registry.subscribe();
        let mut rx2 = registry.subscribe();

        registry.broadcast(FileChange {
            kind: ChangeKind::Modified,
            path: PathBuf::from("/app/page.tsx"),
        });

        let a = rx1.recv().await.unwrap();
        let b = rx2.recv().await.unwrap();
        assert_eq!(a.kind, ChangeKind::Modified);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn dead_subscribers_are_pruned() {
        let mut registry = WatchRegistry::new();
        let rx = registry.subscribe();
        let _rx2 = registry.subscribe();
        assert_eq!(registry.len(), 2);

        drop(rx);
        registry.broadcast(FileChange {
            kind: ChangeKind::Created,
            path: PathBuf::from("/styles.css"),
        });
        assert_eq!(registry.len(), 1);
    }
}
