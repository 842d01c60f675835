//! Configuration management
//!
//! This module handles loading and parsing configuration for the portal.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! The same file carries the portal definition (`catalog`), which is
//! validated while loading. Missing optional values are filled with defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::Catalog;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Search behaviour shared by all search configurations
    #[serde(default)]
    pub search: SearchSettings,
    /// APIs, search fields and searches
    #[serde(default)]
    pub catalog: Catalog,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/ndr_core.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Mysql,
}

/// Search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Render template errors as alert boxes
    #[serde(default)]
    pub show_errors: bool,
    /// Offer a JSON download of single records
    #[serde(default = "default_true")]
    pub allow_download_single: bool,
    /// Let visitors mark records as incorrect
    #[serde(default)]
    pub correction_feature: bool,
    /// Log executed searches
    #[serde(default = "default_true")]
    pub statistics_feature: bool,
    #[serde(default = "default_language")]
    pub default_language: String,
    /// Separator for list values in rendered fields
    #[serde(default = "default_list_separator")]
    pub list_separator: String,
    /// Page showing a manifest viewer; result links append
    /// `?manifest=..&page=..`
    #[serde(default)]
    pub manifest_viewer_url: Option<String>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            show_errors: false,
            allow_download_single: true,
            correction_feature: false,
            statistics_feature: true,
            default_language: default_language(),
            list_separator: default_list_separator(),
            manifest_viewer_url: None,
        }
    }
}

impl SearchSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

fn default_connect_timeout() -> u64 {
    2
}

fn default_read_timeout() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_language() -> String {
    "en".to_string()
}

fn default_list_separator() -> String {
    ", ".to_string()
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the default configuration. Invalid YAML
    /// and an inconsistent catalog are errors.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - NDR_CORE_SERVER_HOST, NDR_CORE_SERVER_PORT, NDR_CORE_SERVER_CORS_ORIGIN
    /// - NDR_CORE_DATABASE_DRIVER, NDR_CORE_DATABASE_URL
    /// - NDR_CORE_SEARCH_CONNECT_TIMEOUT, NDR_CORE_SEARCH_READ_TIMEOUT
    /// - NDR_CORE_SEARCH_SHOW_ERRORS, NDR_CORE_SEARCH_DEFAULT_LANGUAGE
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Check settings and the catalog's references
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.search.connect_timeout_secs == 0 || self.search.read_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "search timeouts must be at least one second".to_string(),
            ));
        }
        self.catalog
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("NDR_CORE_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("NDR_CORE_SERVER_PORT") {
            self.server.port = port;
        }
        if let Ok(cors_origin) = std::env::var("NDR_CORE_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(driver) = std::env::var("NDR_CORE_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("NDR_CORE_DATABASE_URL") {
            self.database.url = url;
        }

        if let Some(secs) = env_parse::<u64>("NDR_CORE_SEARCH_CONNECT_TIMEOUT").filter(|s| *s > 0) {
            self.search.connect_timeout_secs = secs;
        }
        if let Some(secs) = env_parse::<u64>("NDR_CORE_SEARCH_READ_TIMEOUT").filter(|s| *s > 0) {
            self.search.read_timeout_secs = secs;
        }
        if let Some(show) = env_parse::<bool>("NDR_CORE_SEARCH_SHOW_ERRORS") {
            self.search.show_errors = show;
        }
        if let Ok(language) = std::env::var("NDR_CORE_SEARCH_DEFAULT_LANGUAGE") {
            if !language.is_empty() {
                self.search.default_language = language;
            }
        }
    }
}

/// Parsed value of an environment variable; unset or invalid is `None`
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

/// Format YAML parsing error with location
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!("at line {}, column {}: {}", location.line(), location.column(), e)
    } else {
        e.to_string()
    }
}

/// Default configuration file written by `ndr-core init`
pub fn default_config_yaml() -> String {
    r#"server:
  host: "0.0.0.0"
  port: 8080
  cors_origin: "http://localhost:3000"
database:
  driver: sqlite
  url: "data/ndr_core.db"
search:
  connect_timeout_secs: 2
  read_timeout_secs: 5
  show_errors: false
  allow_download_single: true
  correction_feature: false
  statistics_feature: true
  default_language: en
  list_separator: ", "
catalog:
  apis: []
  search_fields: []
  searches: []
"#
    .to_string()
}

// Shared by every test that touches NDR_CORE_* variables
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "NDR_CORE_SERVER_HOST",
    "NDR_CORE_SERVER_PORT",
    "NDR_CORE_SERVER_CORS_ORIGIN",
    "NDR_CORE_DATABASE_DRIVER",
    "NDR_CORE_DATABASE_URL",
    "NDR_CORE_SEARCH_CONNECT_TIMEOUT",
    "NDR_CORE_SEARCH_READ_TIMEOUT",
    "NDR_CORE_SEARCH_SHOW_ERRORS",
    "NDR_CORE_SEARCH_DEFAULT_LANGUAGE",
];

#[cfg(test)]
fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

#[cfg(test)]
fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    let guard = CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_example_config_is_valid() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config.example.yml");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.catalog.apis.len(), 2);
        assert_eq!(config.catalog.searches.len(), 2);
        assert!(config.search.correction_feature);
        assert!(config.catalog.search("letters").is_some());
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let config = Config::load(std::path::Path::new("nonexistent_config.yml")).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(config.database.url, "data/ndr_core.db");
        assert_eq!(config.search, SearchSettings::default());
        assert_eq!(config.search.connect_timeout(), Duration::from_secs(2));
        assert_eq!(config.search.read_timeout(), Duration::from_secs(5));
        assert!(config.catalog.searches().is_empty());
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let file = config_file("");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let file = config_file("search:\n  show_errors: true\n");
        let config = Config::load(file.path()).unwrap();

        assert!(config.search.show_errors);
        assert!(config.search.allow_download_single);
        assert!(config.search.statistics_feature);
        assert_eq!(config.search.list_separator, ", ");
    }

    #[test]
    fn test_load_catalog() {
        let file = config_file(
            r#"
catalog:
  apis:
    - name: archive
      label: Letter Archive
      protocol: https
      host: api.example.org
      port: 443
      path: v1/
  search_fields:
    - field_name: author
      field_label: Author
      field_type: string
  searches:
    - conf_name: letters
      api: archive
      form_fields:
        - { field: author, row: 1, column: 1, size: 12 }
"#,
        );
        let config = Config::load(file.path()).unwrap();

        let search = config.catalog.search("letters").unwrap();
        assert_eq!(search.api, "archive");
        assert_eq!(config.catalog.api("archive").unwrap().connection_url(), "https://api.example.org:443/v1/");
        assert_eq!(config.catalog.fields_of(search).len(), 1);
    }

    #[test]
    fn test_load_catalog_with_unknown_api_fails() {
        let file = config_file("catalog:\n  searches:\n    - conf_name: letters\n      api: missing\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"), "{}", err);
    }

    #[test]
    fn test_load_invalid_yaml_reports_location() {
        let file = config_file("server:\n  port: not_a_number\n");
        let err = Config::load(file.path()).unwrap_err().to_string();
        assert!(err.contains("parse"));
        assert!(err.contains("line 2"), "{}", err);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let file = config_file("search:\n  read_timeout_secs: 0\n");
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_default_config_yaml_loads() {
        let file = config_file(&default_config_yaml());
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.search, SearchSettings::default());
        assert_eq!(config.database.url, "data/ndr_core.db");
    }

    #[test]
    fn test_env_override_server_and_database() {
        let _guard = lock_env();
        let file = config_file("server:\n  port: 8080\n");

        std::env::set_var("NDR_CORE_SERVER_HOST", "127.0.0.1");
        std::env::set_var("NDR_CORE_SERVER_PORT", "4000");
        std::env::set_var("NDR_CORE_DATABASE_DRIVER", "MySQL");
        std::env::set_var("NDR_CORE_DATABASE_URL", "mysql://ndr@localhost/ndr");

        let config = Config::load_with_env(file.path()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.database.driver, DatabaseDriver::Mysql);
        assert_eq!(config.database.url, "mysql://ndr@localhost/ndr");

        clear_env();
    }

    #[test]
    fn test_env_override_search_settings() {
        let _guard = lock_env();
        let file = config_file("");

        std::env::set_var("NDR_CORE_SEARCH_CONNECT_TIMEOUT", "3");
        std::env::set_var("NDR_CORE_SEARCH_READ_TIMEOUT", "10");
        std::env::set_var("NDR_CORE_SEARCH_SHOW_ERRORS", "true");
        std::env::set_var("NDR_CORE_SEARCH_DEFAULT_LANGUAGE", "de");

        let config = Config::load_with_env(file.path()).unwrap();
        assert_eq!(config.search.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.search.read_timeout(), Duration::from_secs(10));
        assert!(config.search.show_errors);
        assert_eq!(config.search.default_language, "de");

        clear_env();
    }

    #[test]
    fn test_env_override_invalid_values_ignored() {
        let _guard = lock_env();
        let file = config_file("server:\n  port: 8081\n");

        std::env::set_var("NDR_CORE_SERVER_PORT", "not_a_number");
        std::env::set_var("NDR_CORE_DATABASE_DRIVER", "postgres");
        std::env::set_var("NDR_CORE_SEARCH_READ_TIMEOUT", "0");
        std::env::set_var("NDR_CORE_SEARCH_SHOW_ERRORS", "maybe");

        let config = Config::load_with_env(file.path()).unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(config.search.read_timeout_secs, 5);
        assert!(!config.search.show_errors);

        clear_env();
    }
}
