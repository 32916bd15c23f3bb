//! Configuration management for r2kit

use crate::error::{Error, Result};
use dirs::home_dir;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration directory name
const CONFIG_DIR: &str = "r2kit";

/// Configuration file name
const CONFIG_FILE: &str = "config.toml";

/// Presigned URL expiry when none is configured
pub const DEFAULT_PRESIGNED_EXPIRY_MINUTES: u64 = 15;

/// S3 presigning refuses anything longer than 7 days
const MAX_PRESIGNED_EXPIRY_MINUTES: u64 = 7 * 24 * 60;

/// Main configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub cloudflare_r2: R2Options,
    pub logging: Option<LoggingConfig>,
}

/// Connection settings shared by every client built from them.
///
/// Nothing is checked when this is built or deserialized; call
/// [`R2Options::validate`] (the factory does on every construction).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct R2Options {
    #[serde(default = "default_api_base_uri")]
    pub api_base_uri: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,

    /// S3-compatible endpoint used for presigning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presigned_url_expiry_minutes: Option<u64>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_bucket: Option<String>,
}

impl Default for R2Options {
    fn default() -> Self {
        Self {
            api_base_uri: default_api_base_uri(),
            account_id: String::new(),
            api_token: String::new(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            s3_endpoint: None,
            presigned_url_expiry_minutes: None,
            timeout: default_timeout(),
            default_bucket: None,
        }
    }
}

impl R2Options {
    /// Check that everything a client needs is present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("api_base_uri", &self.api_base_uri),
            ("account_id", &self.account_id),
            ("api_token", &self.api_token),
            ("access_key_id", &self.access_key_id),
            ("secret_access_key", &self.secret_access_key),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        self.base_url()?;

        if let Some(endpoint) = &self.s3_endpoint {
            Url::parse(endpoint)
                .map_err(|e| Error::Config(format!("Invalid s3_endpoint '{}': {}", endpoint, e)))?;
        }

        if self.timeout == 0 {
            return Err(Error::Config("timeout must be at least 1 second".to_string()));
        }

        match self.presigned_url_expiry_minutes {
            Some(0) => Err(Error::Config(
                "presigned_url_expiry_minutes must be at least 1".to_string(),
            )),
            Some(minutes) if minutes > MAX_PRESIGNED_EXPIRY_MINUTES => Err(Error::Config(format!(
                "presigned_url_expiry_minutes cannot exceed 7 days ({} minutes)",
                MAX_PRESIGNED_EXPIRY_MINUTES
            ))),
            _ => Ok(()),
        }
    }

    /// Parsed API base URI
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(self.api_base_uri.trim())
            .map_err(|e| Error::Config(format!("Invalid api_base_uri '{}': {}", self.api_base_uri, e)))?;

        if url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "api_base_uri '{}' cannot carry a path",
                self.api_base_uri
            )));
        }

        Ok(url)
    }

    /// S3 endpoint, derived from the account id when not set
    pub fn s3_endpoint(&self) -> String {
        self.s3_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.r2.cloudflarestorage.com", self.account_id))
    }

    pub fn presigned_url_expiry(&self) -> Duration {
        let minutes = self
            .presigned_url_expiry_minutes
            .unwrap_or(DEFAULT_PRESIGNED_EXPIRY_MINUTES);
        Duration::from_secs(minutes.saturating_mul(60))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default values
fn default_api_base_uri() -> String {
    "https://api.cloudflare.com/client/v4/accounts".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let home = home_dir().ok_or_else(|| Error::Config("Cannot determine home directory".to_string()))?;
    Ok(home.join(".config").join(CONFIG_DIR))
}

/// Get the configuration file path
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE))
}

/// Load configuration from the default location
pub fn load_config() -> Result<ConfigFile> {
    load_config_from(&get_config_path()?)
}

/// Load configuration from an explicit path
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Err(Error::ConfigNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|e| {
        Error::InvalidConfig(format!("Failed to read config file: {}", e))
    })?;

    let config: ConfigFile = toml::from_str(&content).map_err(|e| {
        Error::InvalidConfig(format!("Failed to parse config file: {}", e))
    })?;

    Ok(config)
}

/// Save configuration to a path, creating parent directories
pub fn save_config_to(config: &ConfigFile, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
    }

    let content = toml::to_string_pretty(config)?;

    fs::write(path, content).map_err(|e| {
        Error::Config(format!("Failed to write config file: {}", e))
    })?;

    // Credentials live in this file: owner read/write only
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_valid_options() -> R2Options {
        R2Options {
            account_id: "0123456789abcdef0123456789abcdef".to_string(),
            api_token: "test_token".to_string(),
            access_key_id: "test_key_id".to_string(),
            secret_access_key: "test_secret".to_string(),
            ..R2Options::default()
        }
    }

    #[test]
    fn test_validate_options_valid() {
        assert!(make_valid_options().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_each_missing_field() {
        let clear: [fn(&mut R2Options); 5] = [
            |o| o.api_base_uri.clear(),
            |o| o.account_id.clear(),
            |o| o.api_token.clear(),
            |o| o.access_key_id.clear(),
            |o| o.secret_access_key = "   ".to_string(),
        ];

        for clear_field in clear {
            let mut options = make_valid_options();
            clear_field(&mut options);
            assert!(matches!(options.validate(), Err(Error::Config(_))));
        }
    }

    #[test]
    fn test_validate_lists_all_missing_fields() {
        let err = R2Options::default().validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("account_id"));
        assert!(message.contains("api_token"));
        assert!(message.contains("access_key_id"));
        assert!(message.contains("secret_access_key"));
        assert!(!message.contains("api_base_uri"));
    }

    #[test]
    fn test_validate_rejects_bad_base_uri() {
        let mut options = make_valid_options();
        options.api_base_uri = "not a url".to_string();
        assert!(matches!(options.validate(), Err(Error::Config(_))));

        options.api_base_uri = "mailto:ops@example.com".to_string();
        assert!(matches!(options.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_expiry_bounds() {
        let mut options = make_valid_options();
        options.presigned_url_expiry_minutes = Some(0);
        assert!(options.validate().is_err());

        options.presigned_url_expiry_minutes = Some(MAX_PRESIGNED_EXPIRY_MINUTES);
        assert!(options.validate().is_ok());

        options.presigned_url_expiry_minutes = Some(MAX_PRESIGNED_EXPIRY_MINUTES + 1);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut options = make_valid_options();
        options.timeout = 0;

        assert!(matches!(options.validate(), Err(Error::Config(msg)) if msg.contains("timeout")));
    }

    #[test]
    fn test_huge_expiry_does_not_overflow() {
        let mut options = make_valid_options();
        options.presigned_url_expiry_minutes = Some(u64::MAX / 2);

        assert_eq!(options.presigned_url_expiry(), Duration::from_secs(u64::MAX));
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_defaults() {
        let options = make_valid_options();
        assert_eq!(options.presigned_url_expiry(), Duration::from_secs(15 * 60));
        assert_eq!(options.request_timeout(), Duration::from_secs(30));
        assert_eq!(
            options.s3_endpoint(),
            "https://0123456789abcdef0123456789abcdef.r2.cloudflarestorage.com"
        );
    }

    #[test]
    fn test_config_file_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = ConfigFile {
            cloudflare_r2: R2Options {
                default_bucket: Some("media".to_string()),
                presigned_url_expiry_minutes: Some(60),
                ..make_valid_options()
            },
            logging: Some(LoggingConfig::default()),
        };

        save_config_to(&config, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        assert_eq!(loaded.cloudflare_r2, config.cloudflare_r2);
        assert_eq!(loaded.logging.unwrap().level, "info");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(load_config_from(&path), Err(Error::ConfigNotFound(_))));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let raw = r#"
            [cloudflare_r2]
            account_id = "acct"
            api_token = "token"
        "#;
        let config: ConfigFile = toml::from_str(raw).unwrap();

        assert_eq!(config.cloudflare_r2.api_base_uri, "https://api.cloudflare.com/client/v4/accounts");
        assert_eq!(config.cloudflare_r2.timeout, 30);
        assert!(config.cloudflare_r2.access_key_id.is_empty());
        assert!(config.logging.is_none());
    }
}
