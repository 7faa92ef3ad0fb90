use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

// Default configuration
pub const DEFAULT_MESSAGES_PATH: &str = "messages";
pub const DEFAULT_STORAGE_BUCKET: &str = "friendlychat.appspot.com";
pub const DEFAULT_MESSAGE_LENGTH: usize = 10;
pub const DEFAULT_LOG_FILTER: &str = "friendlychat_client=debug,warn";

/// Remote config cache lifetime outside developer mode
pub const CONFIG_EXPIRATION: Duration = Duration::from_secs(3600);

/// Client settings persisted as JSON in the platform config directory
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Realtime database path holding the message records
    pub messages_path: String,
    /// Bucket used by the blob store for uploaded images
    pub storage_bucket: String,
    /// Developer mode fetches remote config without caching
    pub developer_mode: bool,
    /// Message length limit until remote config says otherwise
    pub default_message_length: usize,
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Timeout for direct image fetches
    pub fetch_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            messages_path: DEFAULT_MESSAGES_PATH.to_string(),
            storage_bucket: DEFAULT_STORAGE_BUCKET.to_string(),
            developer_mode: true,
            default_message_length: DEFAULT_MESSAGE_LENGTH,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            fetch_timeout_secs: 10,
        }
    }
}

impl Settings {
    /// Cache expiration for remote config fetches.
    pub fn fetch_expiration(&self) -> Duration {
        if self.developer_mode {
            Duration::ZERO
        } else {
            CONFIG_EXPIRATION
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

pub fn settings_path() -> Result<PathBuf, ConfigError> {
    let proj = ProjectDirs::from("com", "friendlychat", "friendlychat-client")
        .ok_or(ConfigError::NoConfigDir)?;
    let dir = proj.config_dir();
    fs::create_dir_all(dir)?;
    Ok(dir.join("settings.json"))
}

/// Load settings, falling back to defaults when no file exists yet.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(&settings_path()?)
}

pub fn load_settings_from(path: &std::path::Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_settings(settings: &Settings) -> Result<(), ConfigError> {
    save_settings_to(&settings_path()?, settings)
}

pub fn save_settings_to(path: &std::path::Path, settings: &Settings) -> Result<(), ConfigError> {
    let data = serde_json::to_string_pretty(settings)?;
    let mut file = fs::File::create(path)?;
    file.write_all(data.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "friendlychat-{}-{}.json",
            name,
            std::process::id()
        ))
    }

    #[test]
    fn test_fetch_expiration() {
        let mut settings = Settings::default();
        assert_eq!(settings.fetch_expiration(), Duration::ZERO);
        settings.developer_mode = false;
        assert_eq!(settings.fetch_expiration(), Duration::from_secs(3600));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = temp_path("missing");
        let _ = fs::remove_file(&path);
        assert_eq!(load_settings_from(&path).unwrap(), Settings::default());
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("roundtrip");
        let settings = Settings {
            messages_path: "rooms/general".into(),
            default_message_length: 140,
            ..Settings::default()
        };
        save_settings_to(&path, &settings).unwrap();
        let loaded = load_settings_from(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_path("partial");
        fs::write(&path, r#"{ "developer_mode": false }"#).unwrap();
        let loaded = load_settings_from(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert!(!loaded.developer_mode);
        assert_eq!(loaded.messages_path, DEFAULT_MESSAGES_PATH);
        assert_eq!(loaded.default_message_length, DEFAULT_MESSAGE_LENGTH);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = temp_path("malformed");
        fs::write(&path, "not json").unwrap();
        let result = load_settings_from(&path);
        let _ = fs::remove_file(&path);
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }
}
