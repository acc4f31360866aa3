//! Configuration file support
//!
//! Handles parsing of `.edd-export.toml` configuration files and
//! environment variable overrides. Passwords are never read from either.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::ClientOptions;
use crate::endpoint::DEFAULT_SERVER;
use crate::error::{ExportError, ExportResult};
use crate::export::DEFAULT_BATCH_SIZE;

/// Default configuration filename
pub const CONFIG_FILENAME: &str = ".edd-export.toml";

/// Environment variable for the server host or URL
pub const ENV_SERVER: &str = "EDD_EXPORT_SERVER";

/// Environment variable for the batch size
pub const ENV_BATCH_SIZE: &str = "EDD_EXPORT_BATCH_SIZE";

/// Environment variable for the output directory
pub const ENV_OUTPUT_DIR: &str = "EDD_EXPORT_OUTPUT_DIR";

/// Environment variables consulted, in order, for the current OS user
const OS_USER_VARS: &[&str] = &["LOGNAME", "USER", "LNAME", "USERNAME"];

/// Server configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Host name or base URL of the EDD instance
    #[serde(default = "default_host")]
    pub host: String,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: Option<u64>,

    /// Overall request timeout in seconds (unset: no limit)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_host() -> String {
    DEFAULT_SERVER.to_string()
}

fn default_connect_timeout() -> Option<u64> {
    Some(30)
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: None,
        }
    }
}

/// Authentication configuration section
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthSection {
    /// Login name; falls back to the current OS user
    #[serde(default)]
    pub username: Option<String>,
}

/// Export configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSection {
    /// Data lines parsed per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Directory the `<slug>.csv` file is written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Write a leading row-number column
    #[serde(default = "default_true")]
    pub include_index: bool,

    /// Show a progress bar while downloading
    #[serde(default = "default_true")]
    pub progress: bool,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            output_dir: default_output_dir(),
            include_index: true,
            progress: true,
        }
    }
}

/// Main configuration structure
///
/// Represents the `.edd-export.toml` configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExportConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub auth: AuthSection,

    #[serde(default)]
    pub export: ExportSection,
}

impl ExportConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from `dir`.
    ///
    /// Looks for `.edd-export.toml` in the directory and falls back to
    /// defaults if it is absent. Environment overrides are applied.
    pub fn load(dir: &Path) -> ExportResult<Self> {
        let config_path = dir.join(CONFIG_FILENAME);
        let mut config = if config_path.exists() {
            Self::read(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load an explicitly named configuration file, which must exist
    pub fn load_file(path: &Path) -> ExportResult<Self> {
        let mut config = Self::read(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> ExportResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExportError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> ExportResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ExportError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> ExportResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ExportError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> ExportResult<()> {
        if let Ok(server) = std::env::var(ENV_SERVER)
            && !server.trim().is_empty()
        {
            self.server.host = server;
        }

        if let Ok(size) = std::env::var(ENV_BATCH_SIZE) {
            self.export.batch_size = size.trim().parse().map_err(|_| {
                ExportError::Config(format!(
                    "{} must be a positive integer, got '{}'",
                    ENV_BATCH_SIZE, size
                ))
            })?;
        }

        if let Ok(dir) = std::env::var(ENV_OUTPUT_DIR) {
            self.export.output_dir = PathBuf::from(dir);
        }

        Ok(())
    }

    fn validate(&self) -> ExportResult<()> {
        if self.export.batch_size == 0 {
            return Err(ExportError::Config(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Transport settings for the session client
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            connect_timeout: self.server.connect_timeout_secs.map(Duration::from_secs),
            timeout: self.server.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Username to log in with: `explicit`, then the configured one, then
    /// the current OS user. Resolved on every call.
    ///
    /// An explicit empty name is an error rather than a request for the
    /// fallback.
    pub fn resolve_username(&self, explicit: Option<&str>) -> ExportResult<String> {
        if let Some(username) = explicit {
            if username.trim().is_empty() {
                return Err(ExportError::InvalidArgument(
                    "Username must not be empty".to_string(),
                ));
            }
            return Ok(username.to_string());
        }

        self.auth
            .username
            .clone()
            .filter(|u| !u.trim().is_empty())
            .or_else(current_os_user)
            .ok_or_else(|| {
                ExportError::InvalidArgument(
                    "Could not determine the current user; pass --username".to_string(),
                )
            })
    }
}

/// Current OS user name from the environment
pub fn current_os_user() -> Option<String> {
    OS_USER_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|user| !user.trim().is_empty())
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# edd-export configuration

[server]
# Host name (served over HTTPS) or full base URL of the EDD instance
host = "edd.jbei.org"

# Seconds to wait for a connection
connect_timeout_secs = 30

# Overall per-request timeout in seconds; leave unset for large studies
# timeout_secs = 3600

[auth]
# Login name; defaults to the current OS user
# username = "jdoe"

[export]
# Data lines parsed per batch
batch_size = 10000

# Directory the <slug>.csv file is written to
output_dir = "."

# Write a leading row-number column
include_index = true

# Show a progress bar while downloading
progress = true
"#
}
