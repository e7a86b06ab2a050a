// Configuration File Support
//
// This module provides configuration file parsing for the Scrapegate proxy.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from the platform config directory
// (~/.config/scrapegate/config.toml on Linux) unless a path is given.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cfaccessor::client::{ConnectionSettings, Credentials, ProxySettings};
use crate::cfaccessor::RequestTimeouts;
use crate::discovery::Target;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Ask the platform for its API version before the first scan
    pub precheck_api_version: bool,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Control plane configuration
    pub cf: CfConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,

    /// Scrape targets
    pub targets: Vec<Target>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Control plane configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CfConfig {
    /// API hostname, without scheme
    pub api_host: String,

    /// Accept invalid TLS certificates
    pub skip_ssl_validation: bool,

    /// Bearer token for the control plane
    pub token: Option<String>,

    /// Password grant credentials, used when no token is set
    pub username: Option<String>,
    pub password: Option<String>,

    /// HTTP proxy for control plane requests
    pub proxy: ProxyConfig,

    /// Deprecated spelling of `proxy.host`
    #[serde(alias = "proxyHost", skip_serializing_if = "Option::is_none")]
    pub proxy_host: Option<String>,

    /// Deprecated spelling of `proxy.port`
    #[serde(alias = "proxyPort", skip_serializing_if = "Option::is_none")]
    pub proxy_port: Option<u16>,

    /// Connection pool settings
    #[serde(alias = "connectionPool")]
    pub connection_pool: ConnectionPoolConfig,

    /// Outbound request settings
    pub request: RequestConfig,
}

/// HTTP proxy settings; both fields are needed to use a proxy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Hostname or IP address, without scheme
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ConnectionPoolConfig {
    /// Idle connections kept per host; client default when unset
    pub size: Option<usize>,
}

/// Outbound request settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RequestConfig {
    /// Requests per second across all lookups; 0 or below means unlimited
    pub rate_limit: f64,

    /// Longest a request waits for a rate permit, in milliseconds
    pub backoff_ms: u64,

    /// Per-lookup timeouts
    pub timeout: TimeoutConfig,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            rate_limit: 0.0,
            backoff_ms: 500,
            timeout: TimeoutConfig::default(),
        }
    }
}

/// Per-lookup timeouts in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub org_ms: u64,
    pub space_ms: u64,
    pub app_in_space_ms: u64,
    pub app_summary_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            org_ms: 2500,
            space_ms: 2500,
            app_in_space_ms: 2500,
            app_summary_ms: 4000,
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to serve internal metrics
    pub enabled: bool,

    /// Port for metrics server
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            precheck_api_version: true,
            logging: LoggingConfig::default(),
            cf: CfConfig::default(),
            metrics: MetricsConfig::default(),
            targets: Vec::new(),
        }
    }
}

impl RequestConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl TimeoutConfig {
    pub fn request_timeouts(&self) -> RequestTimeouts {
        RequestTimeouts {
            org: Duration::from_millis(self.org_ms),
            space: Duration::from_millis(self.space_ms),
            app_in_space: Duration::from_millis(self.app_in_space_ms),
            app_summary: Duration::from_millis(self.app_summary_ms),
        }
    }
}

impl CfConfig {
    /// Proxy in effect: `proxy.host`/`proxy.port` when both are set, the
    /// deprecated `proxy_host`/`proxy_port` pair otherwise
    pub fn effective_proxy(&self) -> Option<ProxySettings> {
        let current = match (&self.proxy.host, self.proxy.port) {
            (Some(host), Some(port)) if !host.is_empty() && port != 0 => Some((host, port)),
            _ => None,
        };
        let deprecated = match (&self.proxy_host, self.proxy_port) {
            (Some(host), Some(port)) if !host.is_empty() && port != 0 => Some((host, port)),
            _ => None,
        };

        current.or(deprecated).map(|(host, port)| ProxySettings {
            host: host.clone(),
            port,
        })
    }

    /// Credentials in effect: a token wins over username and password
    pub fn credentials(&self) -> Credentials {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Credentials::Token(token.clone());
        }

        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Credentials::Password {
                username: username.clone(),
                password: password.clone(),
            },
            _ => Credentials::Anonymous,
        }
    }

    /// Settings for the HTTP control plane transport
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            api_host: self.api_host.clone(),
            skip_ssl_validation: self.skip_ssl_validation,
            proxy: self.effective_proxy(),
            connection_pool_size: self.connection_pool.size,
            credentials: self.credentials(),
        }
    }
}

fn has_http_prefix(host: &str) -> bool {
    let lower = host.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

impl Config {
    /// Load configuration from the default config directory
    ///
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation. If the config file does not exist, returns default
    /// configuration.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default().apply_env_overrides());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file from {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file from {:?}", path))?;

        // Apply environment variable overrides
        let config = config.apply_env_overrides();

        // Validate configuration
        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/scrapegate/config.toml` on Linux, the platform
    /// config directory elsewhere
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "scrapegate", "Scrapegate") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            // Fallback if XDG dirs cannot be determined
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("scrapegate")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - SCRAPEGATE_LOG_LEVEL
    /// - SCRAPEGATE_LOG_FORMAT
    /// - SCRAPEGATE_API_HOST
    /// - SCRAPEGATE_CF_TOKEN
    /// - SCRAPEGATE_CF_USERNAME
    /// - SCRAPEGATE_CF_PASSWORD
    /// - SCRAPEGATE_RATE_LIMIT
    /// - SCRAPEGATE_BACKOFF_MS
    /// - SCRAPEGATE_METRICS_ENABLED
    /// - SCRAPEGATE_METRICS_PORT
    fn apply_env_overrides(mut self) -> Self {
        // Logging overrides
        if let Ok(level) = std::env::var("SCRAPEGATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SCRAPEGATE_LOG_FORMAT") {
            self.logging.format = format;
        }

        // Control plane overrides
        if let Ok(host) = std::env::var("SCRAPEGATE_API_HOST") {
            self.cf.api_host = host;
        }
        if let Ok(token) = std::env::var("SCRAPEGATE_CF_TOKEN") {
            if !token.is_empty() {
                self.cf.token = Some(token);
            }
        }
        if let Ok(username) = std::env::var("SCRAPEGATE_CF_USERNAME") {
            if !username.is_empty() {
                self.cf.username = Some(username);
            }
        }
        if let Ok(password) = std::env::var("SCRAPEGATE_CF_PASSWORD") {
            if !password.is_empty() {
                self.cf.password = Some(password);
            }
        }
        if let Ok(rate) = std::env::var("SCRAPEGATE_RATE_LIMIT") {
            if let Ok(rate) = rate.parse::<f64>() {
                self.cf.request.rate_limit = rate;
            }
        }
        if let Ok(backoff) = std::env::var("SCRAPEGATE_BACKOFF_MS") {
            if let Ok(backoff) = backoff.parse::<u64>() {
                self.cf.request.backoff_ms = backoff;
            }
        }

        // Metrics overrides
        if let Ok(enabled) = std::env::var("SCRAPEGATE_METRICS_ENABLED") {
            self.metrics.enabled = enabled.parse().unwrap_or(self.metrics.enabled);
        }
        if let Ok(port) = std::env::var("SCRAPEGATE_METRICS_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.metrics.port = port;
            }
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        // Validate logging format
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        // Validate control plane configuration
        if has_http_prefix(&self.cf.api_host) {
            anyhow::bail!(
                "cf.api_host must not contain an http(s)://-like prefix; specify the hostname only"
            );
        }
        for host in [&self.cf.proxy.host, &self.cf.proxy_host].into_iter().flatten() {
            if has_http_prefix(host) {
                anyhow::bail!(
                    "cf.proxy_host or cf.proxy.host must not contain an http(s)://-like prefix; specify the hostname only"
                );
            }
        }
        if self.cf.username.is_some() != self.cf.password.is_some() {
            anyhow::bail!("cf.username and cf.password must be configured together");
        }
        if self.cf.connection_pool.size == Some(0) {
            anyhow::bail!("cf.connection_pool.size must be > 0");
        }
        if self.cf.request.rate_limit.is_nan() {
            anyhow::bail!("cf.request.rate_limit must be a number");
        }

        let timeout = &self.cf.request.timeout;
        if timeout.org_ms == 0
            || timeout.space_ms == 0
            || timeout.app_in_space_ms == 0
            || timeout.app_summary_ms == 0
        {
            anyhow::bail!("Request timeouts must be > 0");
        }

        // Validate metrics configuration
        if self.metrics.port == 0 {
            anyhow::bail!("Metrics port must be > 0");
        }

        // Validate targets
        for (i, target) in self.targets.iter().enumerate() {
            if target.org_name.is_empty() {
                anyhow::bail!("Target #{} has an empty org_name", i);
            }
        }

        Ok(())
    }

    /// The API host, failing when none is configured
    pub fn require_api_host(&self) -> Result<&str> {
        if self.cf.api_host.is_empty() {
            anyhow::bail!("cf.api_host is not configured");
        }
        Ok(&self.cf.api_host)
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.cf.request.rate_limit, 0.0);
        assert_eq!(config.cf.request.backoff_ms, 500);
        assert_eq!(config.cf.request.timeout.app_summary_ms, 4000);
        assert!(config.precheck_api_version);
        assert!(!config.metrics.enabled);
        assert_eq!(config.metrics.port, 9090);
    }

    #[test]
    fn test_config_validation_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_scheme_in_api_host() {
        let mut config = Config::default();
        config.cf.api_host = "https://api.example.com".to_string();
        assert!(config.validate().is_err());

        config.cf.api_host = "HTTP://api.example.com".to_string();
        assert!(config.validate().is_err());

        config.cf.api_host = "api.example.com".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_rejects_scheme_in_proxy_host() {
        let mut config = Config::default();
        config.cf.proxy.host = Some("http://proxy.example.com".to_string());
        config.cf.proxy.port = Some(3128);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cf.proxy_host = Some("HTTPS://proxy.example.com".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_username_without_password() {
        let mut config = Config::default();
        config.cf.username = Some("admin".to_string());
        assert!(config.validate().is_err());

        config.cf.password = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_effective_proxy_prefers_current_keys() {
        let mut cf = CfConfig::default();
        assert_eq!(cf.effective_proxy(), None);

        cf.proxy_host = Some("old.example.com".to_string());
        cf.proxy_port = Some(8080);
        assert_eq!(
            cf.effective_proxy(),
            Some(ProxySettings {
                host: "old.example.com".to_string(),
                port: 8080
            })
        );

        // Host without port does not count as configured
        cf.proxy.host = Some("new.example.com".to_string());
        assert_eq!(cf.effective_proxy().unwrap().host, "old.example.com");

        cf.proxy.port = Some(3128);
        assert_eq!(
            cf.effective_proxy(),
            Some(ProxySettings {
                host: "new.example.com".to_string(),
                port: 3128
            })
        );
    }

    #[test]
    fn test_credentials_selection() {
        let mut cf = CfConfig::default();
        assert_eq!(cf.credentials(), Credentials::Anonymous);

        cf.username = Some("admin".to_string());
        cf.password = Some("secret".to_string());
        assert_eq!(
            cf.credentials(),
            Credentials::Password {
                username: "admin".to_string(),
                password: "secret".to_string()
            }
        );

        cf.token = Some("tok".to_string());
        assert_eq!(cf.credentials(), Credentials::Token("tok".to_string()));
    }

    #[test]
    fn test_connection_settings() {
        let mut cf = CfConfig::default();
        cf.api_host = "api.example.com".to_string();
        cf.skip_ssl_validation = true;
        cf.connection_pool.size = Some(8);

        let settings = cf.connection_settings();
        assert_eq!(settings.api_host, "api.example.com");
        assert!(settings.skip_ssl_validation);
        assert_eq!(settings.connection_pool_size, Some(8));
        assert_eq!(settings.proxy, None);
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = Config::default();
        config.cf.request.timeout.space_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_target_org() {
        let mut config = Config::default();
        config.targets.push(Target::org(""));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_rate_limit_is_valid() {
        let mut config = Config::default();
        config.cf.request.rate_limit = -1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_require_api_host() {
        let mut config = Config::default();
        assert!(config.require_api_host().is_err());

        config.cf.api_host = "api.example.com".to_string();
        assert_eq!(config.require_api_host().unwrap(), "api.example.com");
    }

    #[test]
    fn test_request_timeouts_conversion() {
        let timeouts = TimeoutConfig::default().request_timeouts();
        assert_eq!(timeouts, RequestTimeouts::default());
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension(".nonexistent");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_load_valid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
precheck_api_version = false

[logging]
level = "debug"
format = "json"

[cf]
api_host = "api.example.com"
skip_ssl_validation = true

proxyHost = "10.0.0.9"
proxyPort = 8080

[cf.proxy]
host = "proxy.example.com"
port = 3128

[cf.connectionPool]
size = 16

[cf.request]
rate_limit = 12.5

[cf.request.timeout]
org_ms = 1000
app_summary_ms = 6000

[metrics]
enabled = true
port = 8080

[[targets]]
org_name = "acme"
space_name = "prod"

[[targets]]
org_name = "globex"
application_name = "billing"
"#;

        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert!(!config.precheck_api_version);
        assert_eq!(config.logging.format, "json");
        assert!(config.cf.skip_ssl_validation);
        assert_eq!(config.cf.proxy_host.as_deref(), Some("10.0.0.9"));
        assert_eq!(config.cf.effective_proxy().unwrap().host, "proxy.example.com");
        assert_eq!(config.cf.connection_pool.size, Some(16));
        assert_eq!(config.cf.request.timeout.org_ms, 1000);
        assert_eq!(config.cf.request.timeout.space_ms, 2500);
        assert_eq!(config.cf.request.timeout.app_summary_ms, 6000);
        assert_eq!(config.metrics.port, 8080);
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[0], Target::org("acme").space("prod"));
        assert_eq!(config.targets[1].application_name.as_deref(), Some("billing"));
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging
level = "debug"
"#; // Invalid TOML

        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path());
        assert!(config.is_err());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(
            temp_file.path(),
            r#"
[cf]
api_host = "https://api.example.com"
"#,
        )
        .unwrap();

        let err = Config::load_from_path(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("api_host"));
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("SCRAPEGATE_RATE_LIMIT", "7.5");
        std::env::set_var("SCRAPEGATE_BACKOFF_MS", "250");
        std::env::set_var("SCRAPEGATE_CF_TOKEN", "secret");

        let config = Config::default().apply_env_overrides();

        assert_eq!(config.cf.request.rate_limit, 7.5);
        assert_eq!(config.cf.request.backoff(), Duration::from_millis(250));
        assert_eq!(config.cf.token.as_deref(), Some("secret"));

        // Clean up
        std::env::remove_var("SCRAPEGATE_RATE_LIMIT");
        std::env::remove_var("SCRAPEGATE_BACKOFF_MS");
        std::env::remove_var("SCRAPEGATE_CF_TOKEN");
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.ends_with("config.toml"));
        assert!(path.to_string_lossy().to_lowercase().contains("scrapegate"));
    }

    #[test]
    fn test_log_level_parsing() {
        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::DEBUG);

        config.logging.level = "WARN".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::WARN);
    }

    #[test]
    fn test_log_level_parsing_invalid() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        assert!(config.log_level().is_err());
    }
}
