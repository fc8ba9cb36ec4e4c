use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde_json::{Value, json};
use tracing::debug;

use crate::store::firestore_value::{decode_document, encode_fields};
use crate::store::hub::SnapshotHub;
use crate::store::{CollectionPath, Document, DocumentId, DocumentStore, StoreError};

const PAGE_SIZE: &str = "300";

/// Cloud Firestore over the v1 REST documents API.
pub struct FirestoreStore {
    client: Client,
    base_url: String,
    api_key: String,
    id_token: Option<String>,
    hub: SnapshotHub,
}

impl FirestoreStore {
    pub fn new(
        project_id: &str,
        api_key: &str,
        id_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let base_url = format!(
            "https://firestore.googleapis.com/v1/projects/{project_id}/databases/(default)/documents"
        );
        Self::with_base_url(base_url, api_key, id_token, timeout)
    }

    /// Point the client at an arbitrary documents root, e.g. a local emulator.
    pub fn with_base_url(
        base_url: String,
        api_key: &str,
        id_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            id_token,
            hub: SnapshotHub::new(),
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut req = self.client.request(method, url);
        if !self.api_key.is_empty() {
            req = req.query(&[("key", self.api_key.as_str())]);
        }
        if let Some(token) = &self.id_token {
            req = req.bearer_auth(token);
        }
        req
    }

    fn collection_url(&self, path: &CollectionPath) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn send(&self, req: RequestBuilder) -> Result<Response, StoreError> {
        let resp = req.send().map_err(|e| StoreError::Network(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let message = resp.text().unwrap_or_default();
            Err(StoreError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }

    fn read_json(resp: Response) -> Result<Value, StoreError> {
        resp.json::<Value>()
            .map_err(|e| StoreError::Malformed(e.to_string()))
    }
}

impl DocumentStore for FirestoreStore {
    fn put(&self, path: &CollectionPath, id: DocumentId, data: Value) -> Result<String, StoreError> {
        let body = json!({ "fields": encode_fields(&data)? });
        let req = match &id {
            DocumentId::Auto => self
                .request(Method::POST, &self.collection_url(path))
                .json(&body),
            DocumentId::Named(name) => self
                .request(Method::PATCH, &format!("{}/{name}", self.collection_url(path)))
                .json(&body),
        };
        let resource = Self::read_json(self.send(req)?)?;
        let doc = decode_document(&resource)?;
        debug!(path = %path, id = %doc.id, "document written");
        self.notify(path);
        Ok(doc.id)
    }

    fn get(&self, path: &CollectionPath, id: &str) -> Result<Option<Document>, StoreError> {
        let url = format!("{}/{id}", self.collection_url(path));
        match self.send(self.request(Method::GET, &url)) {
            Ok(resp) => decode_document(&Self::read_json(resp)?).map(Some),
            Err(StoreError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn list(&self, path: &CollectionPath) -> Result<Vec<Document>, StoreError> {
        let url = self.collection_url(path);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self
                .request(Method::GET, &url)
                .query(&[("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }
            let page = Self::read_json(self.send(req)?)?;
            if let Some(Value::Array(items)) = page.get("documents") {
                for item in items {
                    documents.push(decode_document(item)?);
                }
            }
            page_token = page
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }
        Ok(documents)
    }

    fn hub(&self) -> &SnapshotHub {
        &self.hub
    }
}
