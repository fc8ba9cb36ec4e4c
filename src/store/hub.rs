use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::store::{CollectionPath, Document, Snapshot, SnapshotEvent, StoreError};

/// Fan-out registry for collection snapshots.
#[derive(Default)]
pub struct SnapshotHub {
    subscribers: Mutex<HashMap<CollectionPath, Vec<Sender<SnapshotEvent>>>>,
}

impl SnapshotHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, initial: Snapshot) -> Subscription {
        let (tx, rx) = mpsc::channel();
        let path = initial.path.clone();
        // The receiver is alive, so the first send cannot fail.
        let _ = tx.send(Ok(initial));
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.entry(path.clone()).or_default().push(tx);
        debug!(path = %path, "subscription opened");
        Subscription { path, rx }
    }

    /// Register a subscriber whose first snapshot comes from `list`. The
    /// registry stays locked while listing, so a write that lands after the
    /// listing always finds this subscriber when it notifies.
    pub fn register_with<F>(&self, path: &CollectionPath, list: F) -> Result<Subscription, StoreError>
    where
        F: FnOnce() -> Result<Vec<Document>, StoreError>,
    {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let documents = list()?;
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(Ok(Snapshot {
            path: path.clone(),
            documents,
        }));
        subscribers.entry(path.clone()).or_default().push(tx);
        debug!(path = %path, "subscription opened");
        Ok(Subscription {
            path: path.clone(),
            rx,
        })
    }

    /// Deliver `event` to every live subscriber of `path`, dropping the ones
    /// whose receiving end has gone away.
    pub fn publish(&self, path: &CollectionPath, event: SnapshotEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(senders) = subscribers.get_mut(path) {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
            if senders.is_empty() {
                subscribers.remove(path);
                debug!(path = %path, "last subscription closed");
            }
        }
    }

    pub fn has_subscribers(&self, path: &CollectionPath) -> bool {
        self.subscriber_count(path) > 0
    }

    pub fn subscriber_count(&self, path: &CollectionPath) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .map_or(0, Vec::len)
    }
}

/// Stream of snapshots for one collection. Iterating blocks until the next
/// snapshot; dropping it unsubscribes.
pub struct Subscription {
    path: CollectionPath,
    rx: Receiver<SnapshotEvent>,
}

impl Subscription {
    pub fn path(&self) -> &CollectionPath {
        &self.path
    }

    pub fn try_next(&self) -> Option<SnapshotEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<SnapshotEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn unsubscribe(self) {}
}

impl Iterator for Subscription {
    type Item = SnapshotEvent;

    fn next(&mut self) -> Option<SnapshotEvent> {
        self.rx.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn snapshot(path: &CollectionPath, ids: &[&str]) -> Snapshot {
        Snapshot {
            path: path.clone(),
            documents: ids
                .iter()
                .map(|id| Document {
                    id: id.to_string(),
                    data: serde_json::json!({}),
                    create_time: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_initial_snapshot_is_delivered_first() {
        let hub = SnapshotHub::new();
        let path = CollectionPath::user("app", "u", "c");
        let sub = hub.register(snapshot(&path, &["a"]));
        let first = sub.try_next().unwrap().unwrap();
        assert_eq!(first.documents.len(), 1);
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let hub = SnapshotHub::new();
        let path = CollectionPath::user("app", "u", "c");
        let a = hub.register(snapshot(&path, &[]));
        let b = hub.register(snapshot(&path, &[]));
        hub.publish(&path, Ok(snapshot(&path, &["x", "y"])));

        for sub in [&a, &b] {
            sub.try_next().unwrap().unwrap();
            let update = sub.try_next().unwrap().unwrap();
            assert_eq!(update.documents.len(), 2);
        }
    }

    #[test]
    fn test_write_during_listing_is_not_missed() {
        let hub = Arc::new(SnapshotHub::new());
        let path = CollectionPath::user("app", "u", "c");

        let mut writer = None;
        let sub = hub
            .register_with(&path, || {
                // A write lands while the listing is in flight and notifies
                // the way a store does.
                let hub = hub.clone();
                let writer_path = path.clone();
                writer = Some(thread::spawn(move || {
                    if hub.has_subscribers(&writer_path) {
                        hub.publish(&writer_path, Ok(snapshot(&writer_path, &["a", "b"])));
                    }
                }));
                thread::sleep(Duration::from_millis(20));
                Ok(snapshot(&path, &["a"]).documents)
            })
            .unwrap();
        writer.unwrap().join().unwrap();

        assert_eq!(sub.try_next().unwrap().unwrap().documents.len(), 1);
        assert_eq!(sub.try_next().unwrap().unwrap().documents.len(), 2);
    }

    #[test]
    fn test_failed_listing_registers_nothing() {
        let hub = SnapshotHub::new();
        let path = CollectionPath::user("app", "u", "c");
        let result = hub.register_with(&path, || Err(StoreError::Network("offline".to_string())));
        assert!(result.is_err());
        assert!(!hub.has_subscribers(&path));
    }

    #[test]
    fn test_errors_are_forwarded() {
        let hub = SnapshotHub::new();
        let path = CollectionPath::user("app", "u", "c");
        let sub = hub.register(snapshot(&path, &[]));
        hub.publish(&path, Err(StoreError::Network("offline".to_string())));
        sub.try_next().unwrap().unwrap();
        assert!(matches!(sub.try_next(), Some(Err(StoreError::Network(_)))));
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let hub = SnapshotHub::new();
        let path = CollectionPath::user("app", "u", "c");
        let keep = hub.register(snapshot(&path, &[]));
        let gone = hub.register(snapshot(&path, &[]));
        assert_eq!(hub.subscriber_count(&path), 2);

        gone.unsubscribe();
        hub.publish(&path, Ok(snapshot(&path, &[])));
        assert_eq!(hub.subscriber_count(&path), 1);

        drop(keep);
        hub.publish(&path, Ok(snapshot(&path, &[])));
        assert!(!hub.has_subscribers(&path));
    }

    #[test]
    fn test_other_collections_are_isolated() {
        let hub = SnapshotHub::new();
        let history = CollectionPath::user("app", "u", "history");
        let generated = CollectionPath::user("app", "u", "generated");
        let sub = hub.register(snapshot(&history, &[]));
        sub.try_next();
        hub.publish(&generated, Ok(snapshot(&generated, &["g"])));
        assert!(sub.try_next().is_none());
    }
}
