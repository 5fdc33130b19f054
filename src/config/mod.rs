//! Configuration for the gateway.
//!
//! Loaded once at startup from a YAML file (`config.yaml` in the working
//! directory unless overridden with `--config`). The file names the listen
//! address, the upstream target, the identity headers injected by the SSO
//! proxy, and the per-group whitelists.
//!
//! # Example
//!
//! ```yaml
//! listen_interface: 127.0.0.1
//! listen_port: 8080
//! target: http://localhost:9200
//! rbac:
//!   groups:
//!     analysts:
//!       whitelisted_indices:
//!         - name: logs-*
//!           rest_verbs: [GET]
//! ```

mod rbac;

use std::path::Path;

pub use rbac::{AccessRule, Permissions, RbacConfig};
use serde::{Deserialize, Serialize};

/// Root configuration.
///
/// Everything except `target` has a default, so a minimal deployment only
/// needs the upstream URL and an `rbac` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Address the listening socket binds to.
    #[serde(default = "default_listen_interface")]
    pub listen_interface: String,

    /// Port the listening socket binds to.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Upstream origin every allowed request is forwarded to.
    pub target: String,

    /// Group assigned when the group header is absent or its format is not
    /// recognized.
    #[serde(default = "default_anonymous_group")]
    pub anonymous_group: String,

    /// Header carrying the authenticated user name.
    #[serde(default = "default_user_header_name")]
    pub user_header_name: String,

    /// Header carrying the authenticated user's groups.
    #[serde(default = "default_group_header_name")]
    pub group_header_name: String,

    /// Format of the group header: `AD` or `space-delimited`. Any other
    /// value maps every caller to the anonymous group.
    #[serde(default = "default_group_header_type")]
    pub group_header_type: String,

    /// Rewrite `_all`, bare `_search`, and `*` requests against the
    /// caller's whitelisted indices so dashboard tooling keeps working.
    /// Disable for strict deployments that should reject catch-alls.
    #[serde(default = "default_true")]
    pub rewrite_catch_all: bool,

    /// Maximum request body size the gateway will buffer for inspection.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-group access rules.
    #[serde(default)]
    pub rbac: RbacConfig,
}

impl GatewayConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let config: GatewayConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_port == 0 {
            return Err(ConfigError::Validation(
                "listen_port must be non-zero".into(),
            ));
        }

        match self.target.parse::<reqwest::Url>() {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => {
                return Err(ConfigError::Validation(format!(
                    "target must be an http or https URL, got scheme {:?}",
                    url.scheme()
                )));
            }
            Err(err) => {
                return Err(ConfigError::Validation(format!(
                    "target is not a valid URL: {err}"
                )));
            }
        }

        if self.user_header_name.is_empty() || self.group_header_name.is_empty() {
            return Err(ConfigError::Validation(
                "user_header_name and group_header_name must not be empty".into(),
            ));
        }

        self.rbac.validate()
    }

    /// Address string the listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_interface, self.listen_port)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Output format. `json` emits one object per record to stderr, which
    /// is what downstream trace aggregation expects.
    #[serde(default)]
    pub format: LogFormat,

    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_log_level(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("configuration validation error: {0}")]
    Validation(String),
}

fn default_listen_interface() -> String {
    "127.0.0.1".to_string()
}

fn default_listen_port() -> u16 {
    8080
}

fn default_anonymous_group() -> String {
    "anonymous".to_string()
}

fn default_user_header_name() -> String {
    "X-Remote-User".to_string()
}

fn default_group_header_name() -> String {
    "X-Remote-Groups".to_string()
}

fn default_group_header_type() -> String {
    "AD".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}
