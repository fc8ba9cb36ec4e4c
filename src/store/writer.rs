use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use serde_json::Value;
use tracing::{debug, warn};

use crate::session::history::{HistorySink, NewHistoryEntry};
use crate::store::{CollectionPath, DocumentId, DocumentStore, StoreError};

enum WriteJob {
    Put {
        path: CollectionPath,
        id: DocumentId,
        data: Value,
    },
    Stop,
}

/// Background writer. Writes are applied one at a time in the order they
/// were enqueued; callers never wait for them. A failed write is reported
/// through the error callback and dropped.
pub struct WriteQueue {
    tx: Sender<WriteJob>,
    worker: Option<JoinHandle<()>>,
}

impl WriteQueue {
    pub fn spawn<F>(store: Arc<dyn DocumentStore>, on_error: F) -> Self
    where
        F: Fn(StoreError) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<WriteJob>();
        let worker = thread::spawn(move || {
            for job in rx {
                match job {
                    WriteJob::Put { path, id, data } => match store.put(&path, id, data) {
                        Ok(id) => debug!(path = %path, id = %id, "queued write applied"),
                        Err(e) => {
                            warn!(path = %path, error = %e, "queued write failed");
                            on_error(e);
                        }
                    },
                    WriteJob::Stop => break,
                }
            }
        });
        Self {
            tx,
            worker: Some(worker),
        }
    }

    pub fn enqueue(&self, path: CollectionPath, id: DocumentId, data: Value) {
        if self.tx.send(WriteJob::Put { path, id, data }).is_err() {
            warn!("write queue worker is gone; write dropped");
        }
    }

    /// A sink that appends history entries to `path` through this queue.
    pub fn history_sink(&self, path: CollectionPath) -> QueueHistorySink {
        QueueHistorySink {
            tx: self.tx.clone(),
            path,
        }
    }

    /// Apply everything already enqueued, then stop the worker.
    pub fn shutdown(mut self) {
        let _ = self.tx.send(WriteJob::Stop);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

pub struct QueueHistorySink {
    tx: Sender<WriteJob>,
    path: CollectionPath,
}

impl HistorySink for QueueHistorySink {
    fn record(&self, entry: NewHistoryEntry) {
        let data = match serde_json::to_value(&entry) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "could not encode history entry");
                return;
            }
        };
        let job = WriteJob::Put {
            path: self.path.clone(),
            id: DocumentId::Auto,
            data,
        };
        if self.tx.send(job).is_err() {
            warn!("write queue worker is gone; history entry dropped");
        }
    }
}
