//! Configuration management for the Autolab client
//!
//! Configuration is read from a YAML file, then overridden by `AUTOLAB_*`
//! environment variables. Every field has a default so a missing file is
//! not an error, but the server credentials must be supplied one way or
//! another before [`Config::validate`] accepts the result.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{AutolabError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Service location and application credentials
    #[serde(default)]
    pub server: ServerConfig,
    /// Device-flow and token storage settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,
}

/// Service location and OAuth application credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URI of the service, without a trailing slash
    #[serde(default = "default_base_uri")]
    pub base_uri: String,

    /// OAuth client id issued when registering the application
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret issued when registering the application
    #[serde(default)]
    pub client_secret: String,

    /// Redirect URI registered for the application
    ///
    /// Defaults to `<base_uri>/device_flow_auth_cb`, which is what device
    /// flow clients register.
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

fn default_base_uri() -> String {
    "https://autolab.andrew.cmu.edu".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_uri: default_base_uri(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: None,
        }
    }
}

impl ServerConfig {
    /// Configured redirect URI, or the device-flow callback of the base URI
    pub fn redirect_uri(&self) -> String {
        self.redirect_uri.clone().unwrap_or_else(|| {
            format!(
                "{}/device_flow_auth_cb",
                self.base_uri.trim_end_matches('/')
            )
        })
    }
}

/// Where tokens are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    /// OS native keyring
    #[default]
    Keyring,
    /// JSON file in the user's data directory
    File,
}

impl std::str::FromStr for TokenStoreKind {
    type Err = AutolabError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keyring" => Ok(Self::Keyring),
            "file" => Ok(Self::File),
            other => Err(AutolabError::Config(format!(
                "Invalid token store: {}. Must be one of: keyring, file",
                other
            ))),
        }
    }
}

/// Device flow settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// How long `setup` waits for the user to authorize (seconds)
    #[serde(default = "default_authorize_timeout")]
    pub authorize_timeout_seconds: u64,

    /// Delay between authorization polls (seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,

    /// Token persistence backend
    #[serde(default)]
    pub token_store: TokenStoreKind,
}

fn default_authorize_timeout() -> u64 {
    300
}

fn default_poll_interval() -> u64 {
    5
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            authorize_timeout_seconds: default_authorize_timeout(),
            poll_interval_seconds: default_poll_interval(),
            token_store: TokenStoreKind::default(),
        }
    }
}

impl AuthConfig {
    /// Authorization timeout as a [`Duration`]
    pub fn authorize_timeout(&self) -> Duration {
        Duration::from_secs(self.authorize_timeout_seconds)
    }

    /// Poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout for a single request (seconds)
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
}

fn default_http_timeout() -> u64 {
    60
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_http_timeout(),
        }
    }
}

impl HttpConfig {
    /// Request timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Config {
    /// Default location of the configuration file
    ///
    /// `config.yaml` in the platform configuration directory, e.g.
    /// `~/.config/autolab/config.yaml` on Linux.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("edu", "autolab", "autolab").map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Load configuration from file and environment variables
    ///
    /// # Arguments
    ///
    /// * `path` - Explicit configuration file; must exist when given. When
    ///   `None`, the default path is used if present, otherwise defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_vars();
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AutolabError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        serde_yaml::from_str(&contents)
            .map_err(|e| AutolabError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_uri) = std::env::var("AUTOLAB_BASE_URI") {
            self.server.base_uri = base_uri;
        }

        if let Ok(client_id) = std::env::var("AUTOLAB_CLIENT_ID") {
            self.server.client_id = client_id;
        }

        if let Ok(client_secret) = std::env::var("AUTOLAB_CLIENT_SECRET") {
            self.server.client_secret = client_secret;
        }

        if let Ok(redirect_uri) = std::env::var("AUTOLAB_REDIRECT_URI") {
            self.server.redirect_uri = Some(redirect_uri);
        }

        if let Ok(timeout) = std::env::var("AUTOLAB_AUTHORIZE_TIMEOUT") {
            if let Ok(value) = timeout.parse() {
                self.auth.authorize_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid AUTOLAB_AUTHORIZE_TIMEOUT: {}", timeout);
            }
        }

        if let Ok(store) = std::env::var("AUTOLAB_TOKEN_STORE") {
            match store.parse() {
                Ok(kind) => self.auth.token_store = kind,
                Err(e) => tracing::warn!("{}", e),
            }
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`AutolabError::Config`] naming the first invalid field
    pub fn validate(&self) -> Result<()> {
        let base = url::Url::parse(&self.server.base_uri).map_err(|e| {
            AutolabError::Config(format!(
                "server.base_uri is not a valid URL ({}): {}",
                self.server.base_uri, e
            ))
        })?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(AutolabError::Config(format!(
                "server.base_uri must use http or https, got {}",
                base.scheme()
            ))
            .into());
        }

        if self.server.client_id.is_empty() {
            return Err(AutolabError::Config(
                "server.client_id is not set (config file or AUTOLAB_CLIENT_ID)".to_string(),
            )
            .into());
        }

        if self.server.client_secret.is_empty() {
            return Err(AutolabError::Config(
                "server.client_secret is not set (config file or AUTOLAB_CLIENT_SECRET)"
                    .to_string(),
            )
            .into());
        }

        if self.auth.authorize_timeout_seconds == 0 {
            return Err(AutolabError::Config(
                "auth.authorize_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.auth.poll_interval_seconds == 0 {
            return Err(AutolabError::Config(
                "auth.poll_interval_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.http.timeout_seconds == 0 {
            return Err(
                AutolabError::Config("http.timeout_seconds must be greater than 0".to_string())
                    .into(),
            );
        }

        Ok(())
    }
}
