use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::store::{CollectionPath, Document, Snapshot};

const GENERATED_IDS_KEY: &str = "generated_ids.json";

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedDocument {
    id: String,
    data: Value,
    #[serde(default)]
    create_time: Option<DateTime<Utc>>,
}

/// Last known contents of store collections, kept on disk so the bank can be
/// seeded before the store answers.
pub struct OfflineCache {
    base_dir: PathBuf,
}

impl OfflineCache {
    pub fn new(base_dir: PathBuf) -> Option<Self> {
        fs::create_dir_all(&base_dir).ok()?;
        Some(Self { base_dir })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let path = self.base_dir.join(Self::sanitize_key(key));
        fs::read_to_string(path).ok()
    }

    pub fn put(&self, key: &str, content: &str) -> bool {
        let path = self.base_dir.join(Self::sanitize_key(key));
        fs::write(path, content).is_ok()
    }

    fn snapshot_key(path: &CollectionPath) -> String {
        format!("{path}.json")
    }

    pub fn load_snapshot(&self, path: &CollectionPath) -> Option<Vec<Document>> {
        let raw = self.get(&Self::snapshot_key(path))?;
        let cached: Vec<CachedDocument> = match serde_json::from_str(&raw) {
            Ok(cached) => cached,
            Err(e) => {
                warn!(path = %path, error = %e, "ignoring unreadable cached snapshot");
                return None;
            }
        };
        Some(
            cached
                .into_iter()
                .map(|c| Document {
                    id: c.id,
                    data: c.data,
                    create_time: c.create_time,
                })
                .collect(),
        )
    }

    pub fn store_snapshot(&self, snapshot: &Snapshot) -> bool {
        let cached: Vec<CachedDocument> = snapshot
            .documents
            .iter()
            .map(|d| CachedDocument {
                id: d.id.clone(),
                data: d.data.clone(),
                create_time: d.create_time,
            })
            .collect();
        let stored = serde_json::to_string(&cached)
            .map(|json| self.put(&Self::snapshot_key(&snapshot.path), &json))
            .unwrap_or(false);
        debug!(path = %snapshot.path, documents = cached.len(), stored, "snapshot cached");
        stored
    }

    pub fn generated_ids(&self) -> Vec<String> {
        self.get(GENERATED_IDS_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    /// Remember ids of freshly generated questions.
    pub fn note_generated(&self, ids: &[String]) -> bool {
        let mut known = self.generated_ids();
        for id in ids {
            if !known.contains(id) {
                known.push(id.clone());
            }
        }
        serde_json::to_string(&known)
            .map(|json| self.put(GENERATED_IDS_KEY, &json))
            .unwrap_or(false)
    }

    fn sanitize_key(key: &str) -> String {
        key.chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = OfflineCache::new(dir.path().join("cache")).unwrap();
        let path = CollectionPath::user("app", "u1", "generatedQuestions");
        assert!(cache.load_snapshot(&path).is_none());

        let snapshot = Snapshot {
            path: path.clone(),
            documents: vec![Document {
                id: "MTabcdefg".to_string(),
                data: json!({ "type": "theory" }),
                create_time: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            }],
        };
        assert!(cache.store_snapshot(&snapshot));
        assert_eq!(cache.load_snapshot(&path).unwrap(), snapshot.documents);
    }

    #[test]
    fn test_note_generated_deduplicates() {
        let dir = TempDir::new().unwrap();
        let cache = OfflineCache::new(dir.path().to_path_buf()).unwrap();
        cache.note_generated(&["a".to_string(), "b".to_string()]);
        cache.note_generated(&["b".to_string(), "c".to_string()]);
        assert_eq!(cache.generated_ids(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_keys_are_sanitized() {
        assert_eq!(
            OfflineCache::sanitize_key("artifacts/app/users/u1/x.json"),
            "artifacts_app_users_u1_x.json"
        );
    }

    #[test]
    fn test_corrupt_snapshot_is_ignored() {
        let dir = TempDir::new().unwrap();
        let cache = OfflineCache::new(dir.path().to_path_buf()).unwrap();
        let path = CollectionPath::public("app", "generatedQuestions");
        cache.put(&format!("{path}.json"), "{not json");
        assert!(cache.load_snapshot(&path).is_none());
    }
}
