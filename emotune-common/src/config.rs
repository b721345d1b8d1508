//! Bootstrap configuration
//!
//! Resolution order, highest priority first:
//! 1. Command-line arguments (applied by the binary via [`ConfigOverrides`])
//! 2. Environment variables (secrets and credentials)
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! A missing config file is not an error: a warning is logged and defaults
//! are used. An empty token signing secret is rejected by [`TomlConfig::validate`].

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

pub const ENV_JWT_SECRET: &str = "EMOTUNE_JWT_SECRET";
pub const ENV_STORAGE_CLOUD_NAME: &str = "EMOTUNE_STORAGE_CLOUD_NAME";
pub const ENV_STORAGE_API_KEY: &str = "EMOTUNE_STORAGE_API_KEY";
pub const ENV_STORAGE_API_SECRET: &str = "EMOTUNE_STORAGE_API_SECRET";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Interface to bind the HTTP server to
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to the SQLite catalog database
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub cors: CorsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Token signing and password hashing
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret; usually supplied via `EMOTUNE_JWT_SECRET`
    #[serde(default)]
    pub jwt_secret: String,

    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,

    /// bcrypt cost factor
    #[serde(default = "default_password_cost")]
    pub password_cost: u32,
}

impl AuthConfig {
    /// Token lifetime; `None` when the hour count does not fit a `Duration`
    pub fn token_ttl(&self) -> Option<chrono::Duration> {
        chrono::Duration::try_hours(self.token_ttl_hours)
    }
}

/// Tensor layout the exported model expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `(1, H, W, 1)`, channels-last
    #[default]
    Nhwc,
    /// `(1, H, W)`
    Nhw,
}

/// Emotion classifier artifact
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// ONNX model file
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Name of the model's image input
    #[serde(default = "default_input_name")]
    pub input_name: String,

    #[serde(default)]
    pub layout: TensorLayout,

    /// Threads ONNX Runtime may use within one inference
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

/// External media storage (Cloudinary-compatible API)
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub cloud_name: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
}

impl StorageConfig {
    /// All three credentials are present and non-empty
    pub fn is_configured(&self) -> bool {
        [&self.cloud_name, &self.api_key, &self.api_secret]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

/// Allowed browser origins
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("emotune").join("emotune.db"))
        .unwrap_or_else(|| PathBuf::from("./emotune.db"))
}

fn default_token_ttl_hours() -> i64 {
    24
}

/// Longest accepted token lifetime (ten years)
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 366 * 10;

fn default_password_cost() -> u32 {
    12
}

fn default_model_path() -> PathBuf {
    PathBuf::from("model.onnx")
}

fn default_input_name() -> String {
    "input".to_string()
}

fn default_intra_threads() -> usize {
    1
}

fn default_storage_base_url() -> String {
    "https://api.cloudinary.com".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: default_token_ttl_hours(),
            password_cost: default_password_cost(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            input_name: default_input_name(),
            layout: TensorLayout::default(),
            intra_threads: default_intra_threads(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: default_storage_base_url(),
            cloud_name: None,
            api_key: None,
            api_secret: None,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: default_database_path(),
            auth: AuthConfig::default(),
            classifier: ClassifierConfig::default(),
            storage: StorageConfig::default(),
            cors: CorsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
}

impl TomlConfig {
    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from `path`, or from the first default location that exists
    ///
    /// An explicitly given path must exist. Without one, a missing file
    /// falls back to compiled defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_source(path).map(|(config, _)| config)
    }

    /// Like [`TomlConfig::load`], also returning the file that was read
    ///
    /// Nothing is logged here: the caller usually has not installed a
    /// subscriber yet, since the log level itself comes from this file.
    pub fn load_with_source(path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let source = match path {
            Some(path) if !path.exists() => {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            Some(path) => Some(path.to_path_buf()),
            None => default_config_paths().into_iter().find(|p| p.exists()),
        };

        let config = match &source {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok((config, source))
    }

    /// Overlay secrets and credentials from the environment
    pub fn apply_env(&mut self) {
        if let Some(secret) = non_empty_env(ENV_JWT_SECRET) {
            self.auth.jwt_secret = secret;
        }
        if let Some(name) = non_empty_env(ENV_STORAGE_CLOUD_NAME) {
            self.storage.cloud_name = Some(name);
        }
        if let Some(key) = non_empty_env(ENV_STORAGE_API_KEY) {
            self.storage.api_key = Some(key);
        }
        if let Some(secret) = non_empty_env(ENV_STORAGE_API_SECRET) {
            self.storage.api_secret = Some(secret);
        }
    }

    /// Overlay command-line values
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(path) = overrides.database_path {
            self.database_path = path;
        }
        if let Some(path) = overrides.model_path {
            self.classifier.model_path = path;
        }
    }

    /// Reject configurations the server cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(Error::Config(format!(
                "Token signing secret not configured. Set {} or [auth] jwt_secret",
                ENV_JWT_SECRET
            )));
        }
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&self.auth.token_ttl_hours) {
            return Err(Error::Config(format!(
                "[auth] token_ttl_hours must be between 1 and {}",
                MAX_TOKEN_TTL_HOURS
            )));
        }
        if !(4..=31).contains(&self.auth.password_cost) {
            return Err(Error::Config(
                "[auth] password_cost must be between 4 and 31".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Platform config file locations, in search order
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("emotune").join("config.toml"));
    }
    if cfg!(unix) {
        paths.push(PathBuf::from("/etc/emotune/config.toml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config.port, 5780);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert_eq!(config.classifier.layout, TensorLayout::Nhwc);
        assert_eq!(config.cors.allowed_origins, vec!["http://localhost:5173"]);
        assert!(!config.storage.is_configured());
    }

    #[test]
    fn test_nested_sections_parse() {
        let config = TomlConfig::from_toml_str(
            r#"
            port = 9000

            [classifier]
            model_path = "/opt/models/emotion.onnx"
            layout = "nhw"

            [storage]
            cloud_name = "demo"
            api_key = "key"
            api_secret = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.classifier.layout, TensorLayout::Nhw);
        assert_eq!(config.classifier.input_name, "input");
        assert!(config.storage.is_configured());
    }

    #[test]
    fn test_unknown_layout_rejected() {
        let result = TomlConfig::from_toml_str("[classifier]\nlayout = \"nchw\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_requires_secret() {
        let mut config = TomlConfig::default();
        assert!(config.validate().is_err());

        config.auth.jwt_secret = "s3cret".to_string();
        assert!(config.validate().is_ok());

        config.auth.password_cost = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_token_ttl() {
        let mut config = TomlConfig::default();
        config.auth.jwt_secret = "s3cret".to_string();

        for hours in [0, -1, MAX_TOKEN_TTL_HOURS + 1, 1_000_000_000_000, i64::MAX] {
            config.auth.token_ttl_hours = hours;
            assert!(
                matches!(config.validate(), Err(Error::Config(_))),
                "{} hours accepted",
                hours
            );
        }

        config.auth.token_ttl_hours = MAX_TOKEN_TTL_HOURS;
        assert!(config.validate().is_ok());
        assert!(config.auth.token_ttl().is_some());
    }

    #[test]
    fn test_overrides_replace_only_given_values() {
        let mut config = TomlConfig::from_toml_str("port = 9000\nhost = \"0.0.0.0\"\n").unwrap();
        config.apply_overrides(ConfigOverrides {
            port: Some(7000),
            ..Default::default()
        });

        assert_eq!(config.port, 7000);
        assert_eq!(config.host, "0.0.0.0");
    }
}
