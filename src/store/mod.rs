#[cfg(feature = "network")]
pub mod firestore;
pub mod firestore_value;
pub mod hub;
pub mod json_store;
pub mod writer;

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::store::hub::{SnapshotHub, Subscription};

pub const HISTORY_COLLECTION: &str = "quizHistory";
pub const GENERATED_COLLECTION: &str = "generatedQuestions";

const AUTO_ID_LEN: usize = 20;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(String),
    #[error("network request failed: {0}")]
    Network(String),
    #[error("store returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed document: {0}")]
    Malformed(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Malformed(e.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Partition {
    User(String),
    Public,
}

/// Location of a collection: `artifacts/{app}/users/{uid}/{collection}` for
/// per-user data, `artifacts/{app}/public/data/{collection}` for shared data.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    pub app_id: String,
    pub partition: Partition,
    pub collection: String,
}

impl CollectionPath {
    pub fn user(app_id: &str, user_id: &str, collection: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            partition: Partition::User(user_id.to_string()),
            collection: collection.to_string(),
        }
    }

    pub fn public(app_id: &str, collection: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            partition: Partition::Public,
            collection: collection.to_string(),
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.partition {
            Partition::User(uid) => write!(
                f,
                "artifacts/{}/users/{}/{}",
                self.app_id, uid, self.collection
            ),
            Partition::Public => write!(f, "artifacts/{}/public/data/{}", self.app_id, self.collection),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentId {
    /// Let the store pick the id; `put` returns it.
    Auto,
    Named(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
    /// Assigned by the store on first write.
    pub create_time: Option<DateTime<Utc>>,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| StoreError::Malformed(format!("{}: {e}", self.id)))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub path: CollectionPath,
    pub documents: Vec<Document>,
}

pub type SnapshotEvent = Result<Snapshot, StoreError>;

pub trait DocumentStore: Send + Sync {
    /// Insert or overwrite a document and return its id.
    fn put(&self, path: &CollectionPath, id: DocumentId, data: Value) -> Result<String, StoreError>;

    fn get(&self, path: &CollectionPath, id: &str) -> Result<Option<Document>, StoreError>;

    fn list(&self, path: &CollectionPath) -> Result<Vec<Document>, StoreError>;

    fn hub(&self) -> &SnapshotHub;

    /// Live query. The first event carries the current contents; each later
    /// write through this store pushes a fresh snapshot until the returned
    /// subscription is dropped.
    fn subscribe(&self, path: &CollectionPath) -> Result<Subscription, StoreError> {
        self.hub().register_with(path, || self.list(path))
    }

    fn notify(&self, path: &CollectionPath) {
        if !self.hub().has_subscribers(path) {
            return;
        }
        let event = self.list(path).map(|documents| Snapshot {
            path: path.clone(),
            documents,
        });
        self.hub().publish(path, event);
    }
}

pub fn new_document_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}
