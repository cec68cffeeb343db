//! Audit configuration
//!
//! [`AuditConfig::load()`] reads `config/indexguard.toml` (optional) and
//! `INDEXGUARD__*` environment variables, e.g. `INDEXGUARD__DATABASE__HOST` or
//! `INDEXGUARD__AUDIT__THRESHOLD_BYTES`. Command-line flags are layered on top
//! by the CLI.

use crate::connection::ConnectionParams;
use crate::runner::AuditOptions;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "config/indexguard.toml";
const ENV_PREFIX: &str = "INDEXGUARD";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Full connection string; takes precedence over the discrete parameters
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub dbname: Option<String>,
}

impl DatabaseSettings {
    pub fn params(&self) -> ConnectionParams {
        ConnectionParams {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            dbname: self.dbname.clone(),
        }
    }

    /// The connection string to hand to [`connect`](crate::connection::connect)
    ///
    /// Falls back to `host=localhost` when nothing at all was configured.
    pub fn connection_string(&self) -> String {
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            return url.to_string();
        }
        let rendered = self.params().to_connection_string();
        if rendered.is_empty() {
            "host=localhost".to_string()
        } else {
            rendered
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuditSettings {
    #[serde(default)]
    pub threshold_bytes: u64,
    #[serde(default)]
    pub stop_on_failure: bool,
    #[serde(default = "default_inspect_plan")]
    pub inspect_plan: bool,
    #[serde(default)]
    pub table: Option<String>,
}

fn default_inspect_plan() -> bool {
    true
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            threshold_bytes: 0,
            stop_on_failure: false,
            inspect_plan: default_inspect_plan(),
            table: None,
        }
    }
}

impl From<&AuditSettings> for AuditOptions {
    fn from(settings: &AuditSettings) -> Self {
        AuditOptions {
            stop_on_failure: settings.stop_on_failure,
            inspect_plan: settings.inspect_plan,
            threshold_bytes: settings.threshold_bytes,
            table: settings.table.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub audit: AuditSettings,
}

impl AuditConfig {
    /// Load the configuration from `config/indexguard.toml`, falling back to env vars.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                // File present but unreadable; retry with env only
                if std::path::Path::new(CONFIG_FILE).exists() {
                    log::warn!("failed to load {CONFIG_FILE}, falling back to env: {err}");
                }
                Config::builder()
                    .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        Self::from_config(&settings)
    }

    /// Deserialize from an already built [`Config`]
    pub fn from_config(settings: &Config) -> Result<Self, ConfigError> {
        settings.clone().try_deserialize::<AuditConfig>().map_err(|e| {
            ConfigError::Message(format!("Audit configuration could not be loaded: {e}"))
        })
    }

    pub fn audit_options(&self) -> AuditOptions {
        AuditOptions::from(&self.audit)
    }
}
