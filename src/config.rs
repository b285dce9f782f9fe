//! Application configuration
//!
//! Read from an optional TOML file, then overridden from the environment.
//! The bearer token is never compiled in; without a file or
//! `MULTIREC_UPLOAD_TOKEN` it stays empty.

use crate::{MultirecError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Path to the config file, overriding the default location
pub const CONFIG_PATH_ENV: &str = "MULTIREC_CONFIG";
/// Overrides `upload_url`
pub const UPLOAD_URL_ENV: &str = "MULTIREC_UPLOAD_URL";
/// Overrides `auth_token`
pub const UPLOAD_TOKEN_ENV: &str = "MULTIREC_UPLOAD_TOKEN";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Initial contents of the URL field
    pub upload_url: String,

    /// Sent as `Authorization: Bearer {auth_token}`
    pub auth_token: String,

    /// Per-request timeout for uploads
    pub request_timeout_secs: u64,

    /// Ask for microphone access before listing devices
    pub request_permission_on_start: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upload_url: String::new(),
            auth_token: String::new(),
            request_timeout_secs: 30,
            request_permission_on_start: true,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("upload_url", &self.upload_url)
            .field("auth_token", &if self.auth_token.is_empty() { "<empty>" } else { "<redacted>" })
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("request_permission_on_start", &self.request_permission_on_start)
            .finish()
    }
}

impl AppConfig {
    /// `<config dir>/multirec/config.toml`, when the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("multirec").join("config.toml"))
    }

    /// Parse a TOML config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            MultirecError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            MultirecError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Load the config the application starts with
    ///
    /// An explicit `MULTIREC_CONFIG` path must exist; the default location is
    /// optional. Environment overrides are applied last.
    pub fn load() -> Result<Self> {
        let config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => {
                info!("Loading config from {:?}", path);
                Self::from_file(PathBuf::from(path))?
            }
            None => match Self::default_path() {
                Some(path) if path.exists() => {
                    info!("Loading config from {}", path.display());
                    Self::from_file(&path)?
                }
                _ => {
                    debug!("No config file, using defaults");
                    Self::default()
                }
            },
        };

        Ok(config.apply_overrides(
            std::env::var(UPLOAD_URL_ENV).ok(),
            std::env::var(UPLOAD_TOKEN_ENV).ok(),
        ))
    }

    /// Replace the URL and token when an override is present
    pub fn apply_overrides(mut self, upload_url: Option<String>, auth_token: Option<String>) -> Self {
        if let Some(url) = upload_url {
            debug!("Upload URL overridden from environment");
            self.upload_url = url;
        }
        if let Some(token) = auth_token {
            debug!("Upload token overridden from environment");
            self.auth_token = token;
        }
        self
    }

    pub fn with_upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = url.into();
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = token.into();
        self
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Skip the permission request at startup
    pub fn without_permission_request(mut self) -> Self {
        self.request_permission_on_start = false;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than zero".to_string());
        }

        // The token goes verbatim into a header value
        if self.auth_token.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err("auth_token must not contain whitespace".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.upload_url.is_empty());
        assert!(config.auth_token.is_empty());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.request_permission_on_start);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = AppConfig::default()
            .with_upload_url("https://example.test/upload")
            .with_auth_token("abc123")
            .with_request_timeout(5)
            .without_permission_request();

        assert_eq!(config.upload_url, "https://example.test/upload");
        assert_eq!(config.auth_token, "abc123");
        assert_eq!(config.request_timeout_secs, 5);
        assert!(!config.request_permission_on_start);
    }

    #[test]
    fn test_from_file_fills_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "upload_url = \"https://example.test/upload\"").unwrap();
        writeln!(file, "request_timeout_secs = 10").unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();

        assert_eq!(config.upload_url, "https://example.test/upload");
        assert_eq!(config.request_timeout_secs, 10);
        assert!(config.auth_token.is_empty());
        assert!(config.request_permission_on_start);
    }

    #[test]
    fn test_from_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = AppConfig::from_file(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(MultirecError::ConfigError(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "request_timeout_secs = \"soon\"").unwrap();
        let invalid = AppConfig::from_file(file.path());
        assert!(matches!(invalid, Err(MultirecError::ConfigError(_))));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::default()
            .with_upload_url("https://file.test")
            .apply_overrides(Some("https://env.test".into()), None);
        assert_eq!(config.upload_url, "https://env.test");
        assert!(config.auth_token.is_empty());

        let config = config.apply_overrides(None, Some("env-token".into()));
        assert_eq!(config.upload_url, "https://env.test");
        assert_eq!(config.auth_token, "env-token");
    }

    #[test]
    fn test_validate() {
        assert!(AppConfig::default().with_request_timeout(0).validate().is_err());
        assert!(AppConfig::default().with_auth_token("two words").validate().is_err());
        assert!(AppConfig::default().with_auth_token("line\nbreak").validate().is_err());
        assert!(AppConfig::default().with_auth_token("ok-token").validate().is_ok());
    }

    #[test]
    fn test_debug_hides_token() {
        let rendered = format!("{:?}", AppConfig::default().with_auth_token("s3cret"));
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }
}
