use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::question::Difficulty;

pub const MAX_QUIZ_SIZE: usize = 100;
pub const MAX_GENERATE_COUNT: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// JSON files under the data directory.
    Local,
    Firestore,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Local => f.write_str("local"),
            Backend::Firestore => f.write_str("firestore"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Backend::Local),
            "firestore" => Ok(Backend::Firestore),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_app_id")]
    pub app_id: String,
    #[serde(default = "default_backend")]
    pub backend: Backend,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub firebase_project_id: String,
    #[serde(default)]
    pub firebase_api_key: String,
    #[serde(default)]
    pub custom_auth_token: String,
    #[serde(default)]
    pub generation_api_key: String,
    #[serde(default = "default_generation_endpoint")]
    pub generation_endpoint: String,
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_quiz_size")]
    pub quiz_size: usize,
    #[serde(default = "default_generate_count")]
    pub generate_count: usize,
    #[serde(default = "default_generate_difficulty")]
    pub generate_difficulty: Difficulty,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default = "default_theme")]
    pub theme: String,
}

fn default_app_id() -> String {
    "default-app-id".to_string()
}
fn default_backend() -> Backend {
    Backend::Local
}
fn default_data_dir() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cquiz")
        .to_string_lossy()
        .to_string()
}
fn default_generation_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_generation_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_quiz_size() -> usize {
    20
}
fn default_generate_count() -> usize {
    20
}
fn default_generate_difficulty() -> Difficulty {
    Difficulty::Medium
}
fn default_log_filter() -> String {
    "info".to_string()
}
fn default_theme() -> String {
    "default".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            backend: default_backend(),
            data_dir: default_data_dir(),
            firebase_project_id: String::new(),
            firebase_api_key: String::new(),
            custom_auth_token: String::new(),
            generation_api_key: String::new(),
            generation_endpoint: default_generation_endpoint(),
            generation_model: default_generation_model(),
            request_timeout_secs: default_request_timeout_secs(),
            quiz_size: default_quiz_size(),
            generate_count: default_generate_count(),
            generate_difficulty: default_generate_difficulty(),
            log_filter: default_log_filter(),
            theme: default_theme(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let mut config: Config = toml::from_str(&content)?;
            config.validate();
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cquiz")
            .join("config.toml")
    }

    /// Clamp numeric settings into range and restore blank required strings.
    pub fn validate(&mut self) {
        self.quiz_size = self.quiz_size.clamp(1, MAX_QUIZ_SIZE);
        self.generate_count = self.generate_count.clamp(1, MAX_GENERATE_COUNT);
        self.request_timeout_secs = self.request_timeout_secs.clamp(1, 600);
        if self.app_id.trim().is_empty() {
            self.app_id = default_app_id();
        }
        if self.data_dir.trim().is_empty() {
            self.data_dir = default_data_dir();
        }
        if self.generation_endpoint.trim().is_empty() {
            self.generation_endpoint = default_generation_endpoint();
        }
        if self.generation_model.trim().is_empty() {
            self.generation_model = default_generation_model();
        }
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn custom_token(&self) -> Option<String> {
        Some(self.custom_auth_token.clone()).filter(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_config_serde_defaults_from_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.app_id, "default-app-id");
        assert_eq!(config.backend, Backend::Local);
        assert_eq!(config.quiz_size, 20);
        assert_eq!(config.generate_count, 20);
        assert_eq!(config.generate_difficulty, Difficulty::Medium);
        assert_eq!(config.generation_model, "gemini-2.0-flash");
        assert!(config.data_dir.contains("cquiz"));
    }

    #[test]
    fn test_config_partial_file() {
        let toml_str = r#"
backend = "firestore"
firebase_project_id = "demo"
generate_difficulty = "hard"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend, Backend::Firestore);
        assert_eq!(config.firebase_project_id, "demo");
        assert_eq!(config.generate_difficulty, Difficulty::Hard);
        assert_eq!(config.quiz_size, 20);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config.data_dir, deserialized.data_dir);
        assert_eq!(config.backend, deserialized.backend);
        assert_eq!(config.generation_endpoint, deserialized.generation_endpoint);
    }

    #[test]
    fn test_validate_clamps_sizes() {
        let mut config = Config::default();
        config.quiz_size = 0;
        config.generate_count = 500;
        config.app_id = "  ".to_string();
        config.validate();
        assert_eq!(config.quiz_size, 1);
        assert_eq!(config.generate_count, MAX_GENERATE_COUNT);
        assert_eq!(config.app_id, "default-app-id");
    }

    #[test]
    fn test_load_from_missing_and_present_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(Config::load_from(&path).unwrap().quiz_size, 20);

        fs::write(&path, "quiz_size = 250\ncustom_auth_token = \"tok\"\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.quiz_size, MAX_QUIZ_SIZE);
        assert_eq!(config.custom_token().as_deref(), Some("tok"));
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("Firestore".parse::<Backend>(), Ok(Backend::Firestore));
        assert!("sqlite".parse::<Backend>().is_err());
    }
}
