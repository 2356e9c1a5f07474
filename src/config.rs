//! Configuration management for crosscast

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub engagement: EngagementConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum post body length in characters.
    pub max_content_length: usize,
    /// Maximum number of retries per post result.
    pub max_retries: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_content_length: 5000,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Publish operations allowed per identifier per window.
    pub max_per_window: u32,
    /// Fixed window length in seconds.
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_window: 10,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementConfig {
    /// Delay between a successful publish and the first scheduled
    /// metrics/comments refresh.
    pub refresh_delay_secs: u64,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            refresh_delay_secs: 300,
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/crosscast/crosscast.db".to_string(),
            },
            limits: LimitsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            engagement: EngagementConfig::default(),
        }
    }

    /// Database path with `~` expanded.
    pub fn database_path(&self) -> String {
        shellexpand::tilde(&self.database.path).to_string()
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CROSSCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("crosscast").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir =
        dirs::data_dir().ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("crosscast"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_full_config() {
        let toml = r#"
            [database]
            path = "/tmp/crosscast-test.db"

            [limits]
            max_content_length = 2000
            max_retries = 5

            [rate_limit]
            max_per_window = 3
            window_secs = 30

            [engagement]
            refresh_delay_secs = 60
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database.path, "/tmp/crosscast-test.db");
        assert_eq!(config.limits.max_content_length, 2000);
        assert_eq!(config.limits.max_retries, 5);
        assert_eq!(config.rate_limit.max_per_window, 3);
        assert_eq!(config.rate_limit.window_secs, 30);
        assert_eq!(config.engagement.refresh_delay_secs, 60);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let toml = r#"
            [database]
            path = "/tmp/crosscast-test.db"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.limits.max_content_length, 5000);
        assert_eq!(config.limits.max_retries, 3);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.engagement.refresh_delay_secs, 300);
    }

    #[test]
    fn load_from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[database]\npath = \"/tmp/from-file.db\"").unwrap();

        let config = Config::load_from_path(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.database.path, "/tmp/from-file.db");
    }

    #[test]
    fn load_from_missing_path_is_config_error() {
        let result = Config::load_from_path(&PathBuf::from("/nonexistent/crosscast.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn default_config_round_trips() {
        let config = Config::default_config();
        let serialized = toml::to_string(&config).unwrap();
        let reparsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(reparsed.database.path, config.database.path);
        assert_eq!(reparsed.limits.max_retries, 3);
    }
}
