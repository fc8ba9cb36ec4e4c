use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// User id used when sign-in failed.
pub const FALLBACK_USER_ID: &str = "anonymous";

const USER_ID_FILE: &str = "user_id";
const REFRESH_TOKEN_FILE: &str = "refresh_token";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignInMethod {
    CustomToken,
    Anonymous,
    Local,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    /// Bearer token for the remote store, when the provider issued one.
    pub id_token: Option<String>,
    pub method: SignInMethod,
}

impl Identity {
    pub fn fallback() -> Self {
        Self {
            user_id: FALLBACK_USER_ID.to_string(),
            id_token: None,
            method: SignInMethod::Anonymous,
        }
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity storage failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("sign-in request failed: {0}")]
    Network(String),
    #[error("sign-in rejected with HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected sign-in response: {0}")]
    Malformed(String),
    #[error("remote sign-in unavailable: {0}")]
    Unavailable(String),
}

pub trait IdentityProvider: Send + Sync {
    fn sign_in(&self) -> Result<Identity, IdentityError>;
}

/// A random id kept in the data directory, stable across runs.
pub struct LocalIdentity {
    base_dir: PathBuf,
}

impl LocalIdentity {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }
}

impl IdentityProvider for LocalIdentity {
    fn sign_in(&self) -> Result<Identity, IdentityError> {
        let path = self.base_dir.join(USER_ID_FILE);
        let existing = match fs::read_to_string(&path) {
            Ok(content) => Some(content.trim().to_string()).filter(|id| !id.is_empty()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        let user_id = match existing {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                fs::create_dir_all(&self.base_dir)?;
                fs::write(&path, &id)?;
                info!(user = %id, "created local user id");
                id
            }
        };
        Ok(Identity {
            user_id,
            id_token: None,
            method: SignInMethod::Local,
        })
    }
}

fn str_field<'a>(body: &'a Value, field: &str) -> Result<&'a str, IdentityError> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| IdentityError::Malformed(format!("missing {field}")))
}

/// Tokens for an anonymous Firebase user. The refresh token is what keeps
/// the same uid across runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnonymousSession {
    pub user_id: String,
    pub id_token: String,
    pub refresh_token: String,
}

/// Session from an `accounts:signUp` response.
pub fn parse_sign_up(body: &Value) -> Result<AnonymousSession, IdentityError> {
    Ok(AnonymousSession {
        user_id: str_field(body, "localId")?.to_string(),
        id_token: str_field(body, "idToken")?.to_string(),
        refresh_token: str_field(body, "refreshToken")?.to_string(),
    })
}

/// Session from a secure token `grant_type=refresh_token` response, which
/// uses snake_case field names.
pub fn parse_refresh(body: &Value) -> Result<AnonymousSession, IdentityError> {
    Ok(AnonymousSession {
        user_id: str_field(body, "user_id")?.to_string(),
        id_token: str_field(body, "id_token")?.to_string(),
        refresh_token: str_field(body, "refresh_token")?.to_string(),
    })
}

/// Saved refresh token of the anonymous user, if any.
pub fn load_refresh_token(base_dir: &Path) -> Result<Option<String>, IdentityError> {
    match fs::read_to_string(base_dir.join(REFRESH_TOKEN_FILE)) {
        Ok(content) => Ok(Some(content.trim().to_string()).filter(|t| !t.is_empty())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_refresh_token(base_dir: &Path, token: &str) -> Result<(), IdentityError> {
    fs::create_dir_all(base_dir)?;
    fs::write(base_dir.join(REFRESH_TOKEN_FILE), token)?;
    Ok(())
}

/// `idToken` from an `accounts:signInWithCustomToken` response.
pub fn parse_custom_token(body: &Value) -> Result<String, IdentityError> {
    Ok(str_field(body, "idToken")?.to_string())
}

/// First user's `localId` from an `accounts:lookup` response.
pub fn parse_lookup(body: &Value) -> Result<String, IdentityError> {
    let user = body
        .get("users")
        .and_then(Value::as_array)
        .and_then(|users| users.first())
        .ok_or_else(|| IdentityError::Malformed("lookup returned no users".to_string()))?;
    Ok(str_field(user, "localId")?.to_string())
}

#[cfg(feature = "network")]
pub use remote::FirebaseIdentity;

#[cfg(feature = "network")]
mod remote {
    use std::path::PathBuf;
    use std::time::Duration;

    use reqwest::blocking::Client;
    use serde_json::{Value, json};
    use tracing::{info, warn};

    use super::{
        AnonymousSession, Identity, IdentityError, IdentityProvider, SignInMethod,
        load_refresh_token, parse_custom_token, parse_lookup, parse_refresh, parse_sign_up,
        save_refresh_token,
    };

    const IDENTITY_TOOLKIT: &str = "https://identitytoolkit.googleapis.com/v1";
    const SECURE_TOKEN: &str = "https://securetoken.googleapis.com/v1/token";

    /// Firebase Authentication over the Identity Toolkit REST API.
    pub struct FirebaseIdentity {
        client: Client,
        base_url: String,
        api_key: String,
        custom_token: Option<String>,
        /// Where the anonymous user's refresh token is kept.
        base_dir: PathBuf,
    }

    impl FirebaseIdentity {
        pub fn new(
            api_key: &str,
            custom_token: Option<String>,
            base_dir: PathBuf,
            timeout: Duration,
        ) -> Result<Self, IdentityError> {
            let client = Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| IdentityError::Network(e.to_string()))?;
            Ok(Self {
                client,
                base_url: IDENTITY_TOOLKIT.to_string(),
                api_key: api_key.to_string(),
                custom_token: custom_token.filter(|t| !t.is_empty()),
                base_dir,
            })
        }

        fn call(&self, method: &str, body: Value) -> Result<Value, IdentityError> {
            let url = format!("{}/accounts:{method}", self.base_url);
            self.post(&url, body)
        }

        fn post(&self, url: &str, body: Value) -> Result<Value, IdentityError> {
            let resp = self
                .client
                .post(url)
                .query(&[("key", self.api_key.as_str())])
                .json(&body)
                .send()
                .map_err(|e| IdentityError::Network(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(IdentityError::Status {
                    status: status.as_u16(),
                    message: resp.text().unwrap_or_default(),
                });
            }
            resp.json::<Value>()
                .map_err(|e| IdentityError::Malformed(e.to_string()))
        }

        /// Reuse the saved anonymous user when its refresh token still works.
        /// A rejected token means a new anonymous user.
        fn anonymous_session(&self) -> Result<AnonymousSession, IdentityError> {
            if let Some(refresh_token) = load_refresh_token(&self.base_dir)? {
                let body = json!({
                    "grant_type": "refresh_token",
                    "refresh_token": refresh_token,
                });
                match self.post(SECURE_TOKEN, body).and_then(|b| parse_refresh(&b)) {
                    Ok(session) => return Ok(session),
                    Err(e @ (IdentityError::Status { .. } | IdentityError::Malformed(_))) => {
                        warn!(error = %e, "saved anonymous session rejected; signing up again");
                    }
                    // Unreachable service: the saved user stays for the next run.
                    Err(e) => return Err(e),
                }
            }
            parse_sign_up(&self.call("signUp", json!({ "returnSecureToken": true }))?)
        }
    }

    impl IdentityProvider for FirebaseIdentity {
        fn sign_in(&self) -> Result<Identity, IdentityError> {
            if self.api_key.is_empty() {
                return Err(IdentityError::Unavailable("no Firebase API key".to_string()));
            }
            match &self.custom_token {
                Some(token) => {
                    let body = self.call(
                        "signInWithCustomToken",
                        json!({ "token": token, "returnSecureToken": true }),
                    )?;
                    let id_token = parse_custom_token(&body)?;
                    let user_id = parse_lookup(&self.call("lookup", json!({ "idToken": id_token }))?)?;
                    info!(user = %user_id, "signed in with custom token");
                    Ok(Identity {
                        user_id,
                        id_token: Some(id_token),
                        method: SignInMethod::CustomToken,
                    })
                }
                None => {
                    let session = self.anonymous_session()?;
                    if let Err(e) = save_refresh_token(&self.base_dir, &session.refresh_token) {
                        warn!(error = %e, "could not save anonymous session");
                    }
                    info!(user = %session.user_id, "signed in anonymously");
                    Ok(Identity {
                        user_id: session.user_id,
                        id_token: Some(session.id_token),
                        method: SignInMethod::Anonymous,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_local_identity_is_stable() {
        let dir = TempDir::new().unwrap();
        let provider = LocalIdentity::new(dir.path().join("nested"));
        let first = provider.sign_in().unwrap();
        let second = provider.sign_in().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.method, SignInMethod::Local);
        assert!(Uuid::parse_str(&first.user_id).is_ok());
    }

    #[test]
    fn test_local_identity_reuses_existing_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(USER_ID_FILE), "user-42\n").unwrap();
        let identity = LocalIdentity::new(dir.path().to_path_buf()).sign_in().unwrap();
        assert_eq!(identity.user_id, "user-42");
    }

    #[test]
    fn test_parse_sign_up() {
        let body = json!({
            "localId": "abc",
            "idToken": "tok",
            "refreshToken": "ref",
            "expiresIn": "3600"
        });
        let session = parse_sign_up(&body).unwrap();
        assert_eq!(session.user_id, "abc");
        assert_eq!(session.id_token, "tok");
        assert_eq!(session.refresh_token, "ref");
        assert!(parse_sign_up(&json!({ "idToken": "tok" })).is_err());
    }

    #[test]
    fn test_parse_refresh_keeps_user() {
        let body = json!({
            "access_token": "acc",
            "expires_in": "3600",
            "token_type": "Bearer",
            "refresh_token": "ref2",
            "id_token": "tok2",
            "user_id": "abc",
            "project_id": "123"
        });
        let session = parse_refresh(&body).unwrap();
        assert_eq!(session.user_id, "abc");
        assert_eq!(session.id_token, "tok2");
        assert_eq!(session.refresh_token, "ref2");
        assert!(matches!(
            parse_refresh(&json!({ "localId": "abc", "idToken": "t", "refreshToken": "r" })),
            Err(IdentityError::Malformed(_))
        ));
    }

    #[test]
    fn test_refresh_token_persists() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("data");
        assert_eq!(load_refresh_token(&base).unwrap(), None);
        save_refresh_token(&base, "ref").unwrap();
        assert_eq!(load_refresh_token(&base).unwrap().as_deref(), Some("ref"));
        save_refresh_token(&base, "rotated").unwrap();
        assert_eq!(load_refresh_token(&base).unwrap().as_deref(), Some("rotated"));
    }

    #[test]
    fn test_parse_lookup() {
        let body = json!({ "users": [{ "localId": "u9" }] });
        assert_eq!(parse_lookup(&body).unwrap(), "u9");
        assert!(matches!(
            parse_lookup(&json!({ "users": [] })),
            Err(IdentityError::Malformed(_))
        ));
        assert_eq!(parse_custom_token(&json!({ "idToken": "t" })).unwrap(), "t");
    }

    #[test]
    fn test_fallback_identity() {
        let identity = Identity::fallback();
        assert_eq!(identity.user_id, FALLBACK_USER_ID);
        assert!(identity.id_token.is_none());
    }
}
