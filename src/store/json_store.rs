use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::hub::SnapshotHub;
use crate::store::{
    CollectionPath, Document, DocumentId, DocumentStore, StoreError, new_document_id,
};

const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredDocument {
    data: Value,
    create_time: DateTime<Utc>,
    update_time: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct CollectionFile {
    schema_version: u32,
    documents: BTreeMap<String, StoredDocument>,
}

impl Default for CollectionFile {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            documents: BTreeMap::new(),
        }
    }
}

/// Document store kept on local disk, one JSON file per collection.
pub struct JsonStore {
    base_dir: PathBuf,
    write_lock: Mutex<()>,
    hub: SnapshotHub,
}

impl JsonStore {
    pub fn with_base_dir(base_dir: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            write_lock: Mutex::new(()),
            hub: SnapshotHub::new(),
        })
    }

    fn file_path(&self, path: &CollectionPath) -> PathBuf {
        let name: String = path
            .to_string()
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.base_dir.join(format!("{name}.json"))
    }

    fn load(&self, path: &CollectionPath) -> Result<CollectionFile, StoreError> {
        let file = self.file_path(path);
        if !file.exists() {
            return Ok(CollectionFile::default());
        }
        let content = fs::read_to_string(&file)?;
        serde_json::from_str(&content)
            .map_err(|e| StoreError::Malformed(format!("{}: {e}", file.display())))
    }

    fn save(&self, path: &CollectionPath, data: &CollectionFile) -> Result<(), StoreError> {
        let file_path = self.file_path(path);
        let tmp_path = file_path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(data)?;
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        fs::rename(&tmp_path, &file_path)?;
        Ok(())
    }
}

impl DocumentStore for JsonStore {
    fn put(&self, path: &CollectionPath, id: DocumentId, data: Value) -> Result<String, StoreError> {
        let id = {
            let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let mut file = self.load(path)?;
            let id = match id {
                DocumentId::Auto => new_document_id(),
                DocumentId::Named(id) => id,
            };
            let now = Utc::now();
            let create_time = file
                .documents
                .get(&id)
                .map_or(now, |existing| existing.create_time);
            file.documents.insert(
                id.clone(),
                StoredDocument {
                    data,
                    create_time,
                    update_time: now,
                },
            );
            self.save(path, &file)?;
            id
        };
        self.notify(path);
        Ok(id)
    }

    fn get(&self, path: &CollectionPath, id: &str) -> Result<Option<Document>, StoreError> {
        let file = self.load(path)?;
        Ok(file.documents.get(id).map(|stored| Document {
            id: id.to_string(),
            data: stored.data.clone(),
            create_time: Some(stored.create_time),
        }))
    }

    fn list(&self, path: &CollectionPath) -> Result<Vec<Document>, StoreError> {
        let file = self.load(path)?;
        Ok(file
            .documents
            .into_iter()
            .map(|(id, stored)| Document {
                id,
                data: stored.data,
                create_time: Some(stored.create_time),
            })
            .collect())
    }

    fn hub(&self) -> &SnapshotHub {
        &self.hub
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn make_test_store() -> (TempDir, JsonStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    fn history_path() -> CollectionPath {
        CollectionPath::user("app", "u1", "quizHistory")
    }

    #[test]
    fn test_auto_id_put_then_get() {
        let (_dir, store) = make_test_store();
        let id = store
            .put(&history_path(), DocumentId::Auto, json!({"isCorrect": true}))
            .unwrap();
        let doc = store.get(&history_path(), &id).unwrap().unwrap();
        assert_eq!(doc.data["isCorrect"], json!(true));
        assert!(doc.create_time.is_some());
    }

    #[test]
    fn test_missing_document_is_none() {
        let (_dir, store) = make_test_store();
        assert!(store.get(&history_path(), "nope").unwrap().is_none());
        assert!(store.list(&history_path()).unwrap().is_empty());
    }

    #[test]
    fn test_named_put_upserts_and_keeps_create_time() {
        let (_dir, store) = make_test_store();
        let path = CollectionPath::user("app", "u1", "generatedQuestions");
        store
            .put(&path, DocumentId::Named("MTabc".into()), json!({"v": 1}))
            .unwrap();
        let first = store.get(&path, "MTabc").unwrap().unwrap();
        store
            .put(&path, DocumentId::Named("MTabc".into()), json!({"v": 2}))
            .unwrap();
        let second = store.get(&path, "MTabc").unwrap().unwrap();
        assert_eq!(second.data["v"], json!(2));
        assert_eq!(first.create_time, second.create_time);
        assert_eq!(store.list(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_users_are_partitioned() {
        let (_dir, store) = make_test_store();
        store
            .put(&history_path(), DocumentId::Auto, json!({}))
            .unwrap();
        let other = CollectionPath::user("app", "u2", "quizHistory");
        assert!(store.list(&other).unwrap().is_empty());
    }

    #[test]
    fn test_subscribe_sees_initial_and_later_writes() {
        let (_dir, store) = make_test_store();
        store
            .put(&history_path(), DocumentId::Auto, json!({"n": 1}))
            .unwrap();

        let sub = store.subscribe(&history_path()).unwrap();
        let initial = sub.try_next().unwrap().unwrap();
        assert_eq!(initial.documents.len(), 1);

        store
            .put(&history_path(), DocumentId::Auto, json!({"n": 2}))
            .unwrap();
        let update = sub.try_next().unwrap().unwrap();
        assert_eq!(update.documents.len(), 2);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let (_dir, store) = make_test_store();
        fs::write(store.file_path(&history_path()), "not json").unwrap();
        assert!(matches!(
            store.list(&history_path()),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_no_tmp_files_left_behind() {
        let (dir, store) = make_test_store();
        store
            .put(&history_path(), DocumentId::Auto, json!({}))
            .unwrap();
        let tmp_files: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
            .collect();
        assert!(tmp_files.is_empty(), "no residual .tmp files");
    }
}
