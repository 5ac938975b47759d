//! Configuration types for zonesync
//!
//! The configuration is a YAML document:
//!
//! ```yaml
//! default_provider: bind
//! dns_providers:
//!   bind:
//!     nameserver: 127.0.0.1
//!     key_file: /etc/bind/keys/zonesync.key
//!     key_name: zonesync-key
//!   mock:
//!     records:
//!       - { fqdn: host1.example.com, ip: 10.0.0.1 }
//! engine:
//!   concurrency: 4
//! logging:
//!   level: info
//! ```
//!
//! Provider settings stay untyped here; each backend factory deserializes its
//! own section through [`ProviderConfig::settings_as`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::backend::MOCK_PROVIDER;
use crate::error::{Error, Result};
use crate::plan::DiffPolicy;

/// Log levels accepted in `logging.level`
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main zonesync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZonesyncConfig {
    /// Key into `dns_providers` selecting the backend
    pub default_provider: String,

    /// Per-provider settings, keyed by provider name
    #[serde(default)]
    pub dns_providers: BTreeMap<String, serde_json::Value>,

    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ZonesyncConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&text)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load `path`, falling back to defaults when an implicit path is missing
    ///
    /// A missing file the operator named explicitly is an error.
    pub fn load_or_default(path: &Path, explicit: bool) -> Result<Self> {
        if !explicit && !path.exists() {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.default_provider.trim().is_empty() {
            return Err(Error::config("default_provider cannot be empty"));
        }

        if !self.dns_providers.contains_key(&self.default_provider)
            && self.default_provider != MOCK_PROVIDER
        {
            return Err(Error::config(format!(
                "default_provider '{}' has no entry under dns_providers",
                self.default_provider
            )));
        }

        self.engine.validate()?;
        self.logging.validate()?;

        Ok(())
    }

    /// Settings of the selected provider
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        self.provider_config_for(&self.default_provider)
    }

    /// Settings of a named provider
    pub fn provider_config_for(&self, name: &str) -> Result<ProviderConfig> {
        let empty = || serde_json::Value::Object(Default::default());
        let settings = match self.dns_providers.get(name) {
            Some(serde_json::Value::Null) => empty(),
            Some(value) => value.clone(),
            None if name == MOCK_PROVIDER => empty(),
            None => {
                return Err(Error::config(format!(
                    "no settings for provider '{}'",
                    name
                )));
            }
        };

        Ok(ProviderConfig {
            provider: name.to_string(),
            settings,
        })
    }
}

impl Default for ZonesyncConfig {
    fn default() -> Self {
        let mut dns_providers = BTreeMap::new();
        dns_providers.insert(
            "bind".to_string(),
            serde_json::Value::Object(Default::default()),
        );

        Self {
            default_provider: "bind".to_string(),
            dns_providers,
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Settings for one backend, as handed to its factory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name used for registry lookup
    pub provider: String,

    /// Provider-specific settings
    pub settings: serde_json::Value,
}

impl ProviderConfig {
    /// Deserialize the settings into a backend's typed settings struct
    pub fn settings_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.settings.clone()).map_err(|e| {
            Error::config(format!(
                "invalid settings for provider '{}': {}",
                self.provider, e
            ))
        })
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Concurrent backend calls within one phase (1 = sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Deadline for enumerating the zone (in seconds)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Deadline for each mutation and each read-back (in seconds)
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: u64,

    /// Read every created or updated record back after applying it
    #[serde(default = "default_verify_after_apply")]
    pub verify_after_apply: bool,

    /// TTL sent for records that do not carry one
    #[serde(default = "default_ttl")]
    pub default_ttl: u32,

    /// Treat a TTL difference as a change
    #[serde(default)]
    pub compare_ttl: bool,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine settings
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::config("engine.concurrency must be > 0"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(Error::config("engine.fetch_timeout_secs must be > 0"));
        }
        if self.action_timeout_secs == 0 {
            return Err(Error::config("engine.action_timeout_secs must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::config("engine.event_channel_capacity must be > 0"));
        }
        Ok(())
    }

    /// Fetch deadline
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Per-call deadline during execution
    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }

    /// Diff policy derived from these settings
    pub fn diff_policy(&self) -> DiffPolicy {
        DiffPolicy {
            compare_ttl: self.compare_ttl,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            action_timeout_secs: default_action_timeout_secs(),
            verify_after_apply: default_verify_after_apply(),
            default_ttl: default_ttl(),
            compare_ttl: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

fn default_action_timeout_secs() -> u64 {
    30
}

fn default_verify_after_apply() -> bool {
    true
}

fn default_ttl() -> u32 {
    300
}

fn default_event_channel_capacity() -> usize {
    1000
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also append log output to this file
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Validate the logging settings
    pub fn validate(&self) -> Result<()> {
        let level = self.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(Error::config(format!(
                "unknown log level '{}' (expected one of: {})",
                self.level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
