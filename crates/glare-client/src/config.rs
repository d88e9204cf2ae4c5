use crate::GlareError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub endpoint: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ClientConfig {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            auth_token: None,
            timeout_secs: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_owned());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Load config from `~/.config/glare/client.json`.
    pub fn load_default() -> Result<Self, GlareError> {
        let path = default_config_path()?;
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Self, GlareError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&content)
            .map_err(|e| GlareError::Config(format!("invalid client config: {e}")))?;
        config.endpoint = config.endpoint.trim_end_matches('/').to_owned();
        if config.endpoint.is_empty() {
            return Err(GlareError::Config(format!(
                "{} does not name an endpoint",
                path.display()
            )));
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), GlareError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| GlareError::Serialization(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

pub fn default_config_path() -> Result<PathBuf, GlareError> {
    let home = std::env::var("HOME").map_err(|_| GlareError::Config("HOME not set".to_owned()))?;
    Ok(PathBuf::from(home).join(".config/glare/client.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");

        let config = ClientConfig::new("https://glare.example.com:9494")
            .with_token("secret123")
            .with_timeout(30);
        config.save(&path).unwrap();

        let loaded = ClientConfig::load(&path).unwrap();
        assert_eq!(loaded.endpoint, "https://glare.example.com:9494");
        assert_eq!(loaded.auth_token.as_deref(), Some("secret123"));
        assert_eq!(loaded.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn config_strips_trailing_slash() {
        let config = ClientConfig::new("https://example.com/");
        assert_eq!(config.endpoint, "https://example.com");
    }

    #[test]
    fn config_without_optional_fields_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(&path, r#"{"endpoint": "http://localhost:9494/"}"#).unwrap();

        let loaded = ClientConfig::load(&path).unwrap();
        assert_eq!(loaded.endpoint, "http://localhost:9494");
        assert!(loaded.auth_token.is_none());
        assert!(loaded.timeout().is_none());
    }

    #[test]
    fn config_with_empty_endpoint_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(&path, r#"{"endpoint": ""}"#).unwrap();

        let err = ClientConfig::load(&path).unwrap_err();
        assert!(matches!(err, GlareError::Config(_)));
    }

    #[test]
    fn config_invalid_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(&path, "not json").unwrap();

        let err = ClientConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("invalid client config"));
    }
}
