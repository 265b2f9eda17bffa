//! Filegate Configuration
//!
//! Configuration is read from an optional TOML file and then overridden
//! from the environment (`SUPABASE_URL`, `SUPABASE_KEY`, `FILEGATE_BIND`).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable holding the storage endpoint URL
pub const ENV_STORAGE_URL: &str = "SUPABASE_URL";

/// Environment variable holding the storage API key
pub const ENV_STORAGE_KEY: &str = "SUPABASE_KEY";

/// Environment variable overriding the HTTP bind address
pub const ENV_BIND_ADDRESS: &str = "FILEGATE_BIND";

/// Largest accepted `server.max_upload_mb`
pub const MAX_UPLOAD_MB_LIMIT: usize = 4096;

/// Main Filegate configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilegateConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// API behaviour configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Maximum accepted upload size in megabytes
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Project URL of the storage service (e.g. https://xyz.supabase.co)
    #[serde(default)]
    pub url: String,

    /// Service API key
    #[serde(default)]
    pub key: String,

    /// Page size used when listing a folder
    #[serde(default = "default_list_limit")]
    pub list_limit: u32,

    /// Maximum number of entries removed by a single folder delete
    #[serde(default = "default_folder_delete_limit")]
    pub folder_delete_limit: u32,

    /// Validity of generated download links in seconds
    #[serde(default = "default_signed_url_ttl_secs")]
    pub signed_url_ttl_secs: u64,

    /// Backend request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// API behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Bucket listed when the `bucket` query parameter is omitted
    #[serde(default = "default_bucket")]
    pub default_bucket: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_max_upload_mb() -> usize {
    50
}

fn default_list_limit() -> u32 {
    100
}

fn default_folder_delete_limit() -> u32 {
    1000
}

fn default_signed_url_ttl_secs() -> u64 {
    3600
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://127.0.0.1:5500".to_string(),
        "http://localhost:5500".to_string(),
    ]
}

fn default_bucket() -> String {
    "Bucket1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            key: String::new(),
            list_limit: default_list_limit(),
            folder_delete_limit: default_folder_delete_limit(),
            signed_url_ttl_secs: default_signed_url_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: default_cors_origins(),
            default_bucket: default_bucket(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl FilegateConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string without validating it
    pub fn parse(content: &str) -> crate::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration for a running server.
    ///
    /// The file is optional: when it does not exist the defaults are used.
    /// Environment overrides are applied on top. Callers validate the
    /// result before connecting to a remote backend.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("No config file at {:?}, using defaults", path);
            Self::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_STORAGE_URL).filter(|v| !v.is_empty()) {
            self.storage.url = url;
        }
        if let Some(key) = lookup(ENV_STORAGE_KEY).filter(|v| !v.is_empty()) {
            self.storage.key = key;
        }
        if let Some(bind) = lookup(ENV_BIND_ADDRESS).filter(|v| !v.is_empty()) {
            self.server.bind_address = bind;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.storage.url.is_empty() {
            return Err(crate::Error::Config(format!(
                "storage.url cannot be empty (set it in the config file or {})",
                ENV_STORAGE_URL
            )));
        }

        if !self.storage.url.starts_with("http://") && !self.storage.url.starts_with("https://") {
            return Err(crate::Error::Config(format!(
                "storage.url must be an http(s) URL, got '{}'",
                self.storage.url
            )));
        }

        if self.storage.key.is_empty() {
            return Err(crate::Error::Config(format!(
                "storage.key cannot be empty (set it in the config file or {})",
                ENV_STORAGE_KEY
            )));
        }

        if self.server.bind_address.is_empty() {
            return Err(crate::Error::Config("server.bind_address cannot be empty".into()));
        }

        if self.server.max_upload_mb == 0 || self.server.max_upload_mb > MAX_UPLOAD_MB_LIMIT {
            return Err(crate::Error::Config(format!(
                "server.max_upload_mb must be between 1 and {}",
                MAX_UPLOAD_MB_LIMIT
            )));
        }

        if self.storage.list_limit == 0 || self.storage.folder_delete_limit == 0 {
            return Err(crate::Error::Config("storage list limits must be positive".into()));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get backend request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.storage.request_timeout_secs)
    }

    /// Get the upload body limit in bytes
    pub fn max_upload_bytes(&self) -> usize {
        self.server.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
bind_address = "127.0.0.1:9000"

[storage]
url = "https://project.supabase.co"
key = "service-key"
list_limit = 50

[api]
cors_origins = ["http://localhost:3000"]
"#;

        let config = FilegateConfig::parse(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:9000");
        assert_eq!(config.storage.list_limit, 50);
        assert_eq!(config.storage.folder_delete_limit, 1000);
        assert_eq!(config.storage.signed_url_ttl_secs, 3600);
        assert_eq!(config.api.cors_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.api.default_bucket, "Bucket1");
    }

    #[test]
    fn test_defaults_need_credentials() {
        let config = FilegateConfig::default();
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_STORAGE_URL, "https://env.supabase.co"),
            (ENV_STORAGE_KEY, "env-key"),
            (ENV_BIND_ADDRESS, ""),
        ]
        .into_iter()
        .collect();

        let mut config = FilegateConfig::default();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.storage.url, "https://env.supabase.co");
        assert_eq!(config.storage.key, "env-key");
        // Empty values do not clobber the configured address
        assert_eq!(config.server.bind_address, "0.0.0.0:8000");
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_non_http_url() {
        let mut config = FilegateConfig::default();
        config.storage.url = "ftp://example.com".into();
        config.storage.key = "k".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_upload_limit_bounds() {
        let mut config = FilegateConfig::default();
        config.storage.url = "https://project.supabase.co".into();
        config.storage.key = "k".into();

        config.server.max_upload_mb = usize::MAX;
        assert_eq!(config.max_upload_bytes(), usize::MAX);
        assert!(config.validate().is_err());

        config.server.max_upload_mb = 0;
        assert!(config.validate().is_err());

        config.server.max_upload_mb = MAX_UPLOAD_MB_LIMIT;
        config.validate().unwrap();
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filegate.toml");

        let mut config = FilegateConfig::default();
        config.storage.url = "http://localhost:54321".into();
        config.storage.key = "local".into();
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        let loaded = FilegateConfig::from_file(&path).unwrap();
        assert_eq!(loaded.storage.url, "http://localhost:54321");
        assert_eq!(loaded.max_upload_bytes(), 50 * 1024 * 1024);
    }
}
