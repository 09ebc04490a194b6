//! Change classification and reload notification.
//!
//! Raw filesystem changes become classified [`ChangeEvent`]s: source and
//! stylesheet edits can be applied as hot updates, anything else needs a
//! full reload. One raw change yields exactly one event; bursts are not
//! deduplicated here.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

/// Extensions whose changes can be hot-applied without a full reload.
const UPDATE_EXTENSIONS: &[&str] = &[
    "css", "scss", "sass", "js", "jsx", "ts", "tsx", "mdx", "html",
];

/// How subscribers should react to a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReloadKind {
    /// Stylesheet or script/markup source changed; hot update suffices
    Update,
    /// Anything else (static asset, config file); reload the page
    FullReload,
}

/// A classified change event.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    /// Reload strategy for this change
    pub kind: ReloadKind,
    /// Affected path
    pub path: PathBuf,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: u64,
}

/// Publishes classified change events to reload subscribers.
#[derive(Debug, Default)]
pub struct ChangeNotifier {
    subscribers: RwLock<HashMap<usize, mpsc::UnboundedSender<ChangeEvent>>>,
    next_id: RwLock<usize>,
}

impl ChangeNotifier {
    /// Create a notifier with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a changed path.
    pub fn classify(&self, path: &Path) -> ReloadKind {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if UPDATE_EXTENSIONS.contains(&ext) {
            ReloadKind::Update
        } else {
            ReloadKind::FullReload
        }
    }

    /// Register a subscriber.
    pub fn subscribe(&self) -> (usize, mpsc::UnboundedReceiver<ChangeEvent>) {
        let id = {
            let mut next_id = self.next_id.write();
            let id = *next_id;
            *next_id += 1;
            id
        };
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().insert(id, tx);
        (id, rx)
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, id: usize) {
        self.subscribers.write().remove(&id);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Classify a raw change and publish it to every subscriber.
    ///
    /// Subscribers whose receiver is gone are removed after the broadcast.
    pub fn notify(&self, path: &Path) -> ChangeEvent {
        let event = ChangeEvent {
            kind: self.classify(path),
            path: path.to_path_buf(),
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        };
        tracing::debug!(path = %path.display(), kind = ?event.kind, "change event");

        let mut failed = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for (id, tx) in subscribers.iter() {
                if tx.send(event.clone()).is_err() {
                    failed.push(*id);
                }
            }
        }
        if !failed.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in failed {
                subscribers.remove(&id);
            }
        }

        event
    }
}
