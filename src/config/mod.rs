use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Full sqlx URL; overrides `data_dir/sharebnb.db` when set
    pub database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing JWTs
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    /// Admin account created at startup if both are set
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: default_secret_key(),
            token_ttl_hours: default_token_ttl_hours(),
            admin_username: None,
            admin_password: None,
        }
    }
}

fn default_secret_key() -> String {
    "secret-dev".to_string()
}

fn default_token_ttl_hours() -> i64 {
    24
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// AWS S3 or an S3-compatible endpoint
    S3,
    /// Process memory; objects vanish on restart
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, R2, ...)
    pub endpoint: Option<String>,
    /// Static credentials; the AWS default provider chain is used when unset
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Maximum number of images per property upload
    #[serde(default = "default_max_images")]
    pub max_images: usize,
    /// Maximum request body size for uploads, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            bucket: default_bucket(),
            region: default_region(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            max_images: default_max_images(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Memory
}

fn default_bucket() -> String {
    "sharebnb".to_string()
}

fn default_region() -> String {
    "us-west-1".to_string()
}

fn default_max_images() -> usize {
    5
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    /// Admin credentials to seed, if both are configured
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (&self.auth.admin_username, &self.auth.admin_password) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Some((user.as_str(), pass.as_str()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.max_connections, 5);
        assert_eq!(config.auth.secret_key, "secret-dev");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.max_images, 5);
        assert_eq!(config.logging.level, "info");
        assert!(config.admin_credentials().is_none());
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::parse(
            r#"
[server]
port = 8080
database_url = "sqlite::memory:"

[auth]
secret_key = "s3cr3t"
admin_username = "admin"
admin_password = "change-me-please"

[storage]
backend = "s3"
bucket = "sharebnb-images"
endpoint = "http://localhost:9000"
"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.database_url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.region, "us-west-1");
        assert_eq!(
            config.admin_credentials(),
            Some(("admin", "change-me-please"))
        );
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/sharebnb.toml")).unwrap();
        assert_eq!(config.server.port, 3001);
    }

    #[test]
    fn test_invalid_backend_is_rejected() {
        assert!(Config::parse("[storage]\nbackend = \"ftp\"\n").is_err());
    }
}
