//! Configuration for the license activation client.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `fla.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `FLA_API_BASE_URL` - Licensing service base URL
//! - `FLA_PLUGIN_ID` - Numeric plugin (product) id on the licensing service
//! - `FLA_PLUGIN_SLUG` - Plugin slug used by update checks
//! - `FLA_PLUGIN_VERSION` - Installed plugin version
//! - `FLA_OPTION_NAME` - Store key holding the activation record
//! - `FLA_SITE_URL` - Site URL the license is bound to
//! - `FLA_BLOG_ID` - Numeric site id (multisite installations)
//! - `FLA_STORAGE_BACKEND` - `secure` or `memory`
//! - `FLA_STORAGE_DIR` - Directory for the file fallback of the secure store
//! - `FLA_UPDATE_CACHE_TTL_SECS` - Lifetime of cached update metadata
//! - `FLA_LOGGING_ENABLED` - Enable the tracing subscriber
//! - `FLA_LOG_LEVEL` - Log level (trace, debug, info, warn, error)
//!
//! The loaded value is owned by the caller and passed down explicitly; there
//! is no process-wide configuration singleton.

use config::Config;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{LicenseError, LicenseResult};

/// Default licensing service base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.freemius.com";

/// Default store key for the activation record.
pub const DEFAULT_OPTION_NAME: &str = "wpi_activation_data";

/// One day, the lifetime of cached update metadata.
pub const DEFAULT_UPDATE_CACHE_TTL_SECS: u64 = 86_400;

/// Config file base name (extension resolved by the `config` crate).
const CONFIG_FILE: &str = "fla";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FlaConfig {
    /// Licensing service connection settings
    pub api: ApiConfig,
    /// The plugin being licensed
    pub plugin: PluginConfig,
    /// The site the license is bound to
    pub site: SiteConfig,
    /// Where the activation record lives
    pub storage: StorageConfig,
    /// Update metadata caching
    pub updates: UpdatesConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Licensing service connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    pub max_redirects: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            connect_timeout_secs: 10,
            timeout_secs: 60,
            max_redirects: 5,
        }
    }
}

impl ApiConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// The plugin being licensed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Product id on the licensing service
    pub plugin_id: String,
    /// Plugin slug as known to the host's update machinery
    pub slug: String,
    /// Plugin file path relative to the plugins directory
    pub basename: String,
    /// Display name
    pub name: String,
    /// Author shown in plugin information
    pub author: String,
    /// Installed version
    pub version: String,
    /// Store key holding the activation record
    pub option_name: String,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            plugin_id: String::new(),
            slug: String::new(),
            basename: String::new(),
            name: String::new(),
            author: String::new(),
            version: "1.0.0".to_string(),
            option_name: DEFAULT_OPTION_NAME.to_string(),
        }
    }
}

/// The site the license is bound to.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub url: String,
    pub blog_id: u64,
    /// Host platform name used in the user agent
    pub platform: String,
    /// Host platform version, compared against release requirements
    pub platform_version: String,
    /// Runtime language version, compared against release requirements
    pub language_version: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost".to_string(),
            blog_id: 1,
            platform: "WordPress".to_string(),
            platform_version: "6.5".to_string(),
            language_version: "8.2".to_string(),
        }
    }
}

impl SiteConfig {
    /// User agent sent with every request.
    pub fn user_agent(&self) -> String {
        format!(
            "{}/{}; {}/",
            self.platform,
            self.platform_version,
            self.url.trim_end_matches('/')
        )
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `secure` (keyring with encrypted file fallback) or `memory`
    pub backend: String,
    /// Keyring service name
    pub keyring_service: String,
    /// Use the OS keyring before the file fallback
    pub use_keyring: bool,
    /// Directory for encrypted files; defaults to the platform data dir
    pub dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "secure".to_string(),
            keyring_service: "fla".to_string(),
            use_keyring: true,
            dir: None,
        }
    }
}

/// Update metadata caching.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpdatesConfig {
    pub cache_ttl_secs: u64,
}

impl Default for UpdatesConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_UPDATE_CACHE_TTL_SECS,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "info".to_string(),
        }
    }
}

fn config_err(e: config::ConfigError) -> LicenseError {
    LicenseError::ConfigError(e.to_string())
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

impl FlaConfig {
    /// Load configuration from `fla.toml` (optional) and the environment,
    /// then validate it.
    pub fn load() -> LicenseResult<Self> {
        let config = Self::load_from(CONFIG_FILE)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration using `file` as the config file base name.
    ///
    /// Validation is left to the caller.
    pub fn load_from(file: &str) -> LicenseResult<Self> {
        let api = ApiConfig::default();
        let plugin = PluginConfig::default();
        let site = SiteConfig::default();
        let storage = StorageConfig::default();
        let logging = LoggingConfig::default();

        let builder = Config::builder()
            // Start with defaults
            .set_default("api.base_url", api.base_url)
            .map_err(config_err)?
            .set_default("api.connect_timeout_secs", api.connect_timeout_secs)
            .map_err(config_err)?
            .set_default("api.timeout_secs", api.timeout_secs)
            .map_err(config_err)?
            .set_default("api.max_redirects", api.max_redirects as u64)
            .map_err(config_err)?
            .set_default("plugin.version", plugin.version)
            .map_err(config_err)?
            .set_default("plugin.option_name", plugin.option_name)
            .map_err(config_err)?
            .set_default("site.url", site.url)
            .map_err(config_err)?
            .set_default("site.blog_id", site.blog_id)
            .map_err(config_err)?
            .set_default("site.platform", site.platform)
            .map_err(config_err)?
            .set_default("site.platform_version", site.platform_version)
            .map_err(config_err)?
            .set_default("site.language_version", site.language_version)
            .map_err(config_err)?
            .set_default("storage.backend", storage.backend)
            .map_err(config_err)?
            .set_default("storage.keyring_service", storage.keyring_service)
            .map_err(config_err)?
            .set_default("storage.use_keyring", storage.use_keyring)
            .map_err(config_err)?
            .set_default("updates.cache_ttl_secs", DEFAULT_UPDATE_CACHE_TTL_SECS)
            .map_err(config_err)?
            .set_default("logging.enabled", logging.enabled)
            .map_err(config_err)?
            .set_default("logging.level", logging.level)
            .map_err(config_err)?
            // Load from fla.toml (optional)
            .add_source(config::File::with_name(file).required(false))
            // Override with environment variables
            .set_override_option("api.base_url", env::var("FLA_API_BASE_URL").ok())
            .map_err(config_err)?
            .set_override_option("plugin.plugin_id", env::var("FLA_PLUGIN_ID").ok())
            .map_err(config_err)?
            .set_override_option("plugin.slug", env::var("FLA_PLUGIN_SLUG").ok())
            .map_err(config_err)?
            .set_override_option("plugin.version", env::var("FLA_PLUGIN_VERSION").ok())
            .map_err(config_err)?
            .set_override_option("plugin.option_name", env::var("FLA_OPTION_NAME").ok())
            .map_err(config_err)?
            .set_override_option("site.url", env::var("FLA_SITE_URL").ok())
            .map_err(config_err)?
            .set_override_option("site.blog_id", env_parsed::<u64>("FLA_BLOG_ID"))
            .map_err(config_err)?
            .set_override_option("storage.backend", env::var("FLA_STORAGE_BACKEND").ok())
            .map_err(config_err)?
            .set_override_option("storage.dir", env::var("FLA_STORAGE_DIR").ok())
            .map_err(config_err)?
            .set_override_option(
                "updates.cache_ttl_secs",
                env_parsed::<u64>("FLA_UPDATE_CACHE_TTL_SECS"),
            )
            .map_err(config_err)?
            .set_override_option("logging.enabled", env_parsed::<bool>("FLA_LOGGING_ENABLED"))
            .map_err(config_err)?
            .set_override_option("logging.level", env::var("FLA_LOG_LEVEL").ok())
            .map_err(config_err)?;

        let settings = builder
            .build()
            .map_err(|e| LicenseError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| LicenseError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> LicenseResult<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(LicenseError::ConfigError(
                "api.base_url cannot be empty".to_string(),
            ));
        }
        if self.api.connect_timeout_secs == 0 || self.api.timeout_secs == 0 {
            return Err(LicenseError::ConfigError(
                "api timeouts must be greater than 0".to_string(),
            ));
        }

        if self.plugin.plugin_id.trim().is_empty() {
            return Err(LicenseError::ConfigError(
                "plugin.plugin_id cannot be empty".to_string(),
            ));
        }
        if self.plugin.slug.trim().is_empty() {
            return Err(LicenseError::ConfigError(
                "plugin.slug cannot be empty".to_string(),
            ));
        }
        if self.plugin.option_name.trim().is_empty() {
            return Err(LicenseError::ConfigError(
                "plugin.option_name cannot be empty".to_string(),
            ));
        }

        match self.storage.backend.as_str() {
            "secure" | "memory" => {}
            other => {
                return Err(LicenseError::ConfigError(format!(
                    "storage.backend must be 'secure' or 'memory', got '{other}'"
                )));
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(LicenseError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }
}
