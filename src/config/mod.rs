//! Bridge configuration
//!
//! Configuration comes from .env files, environment variables, an optional YAML
//! file and command-line flags. Priority: CLI flags > YAML > ENV vars > .env
//! values > defaults.
//!
//! # Modules
//! - `env`: Environment variable loading
//! - `yaml`: YAML configuration file loading
//!
//! # Example
//! ```rust,no_run
//! use realtime_bridge::config::BridgeConfig;
//! use realtime_bridge::core::session::Direction;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Environment only
//! let config = BridgeConfig::from_env(Direction::Asr)?;
//!
//! // YAML file over the environment
//! let config = BridgeConfig::from_file(Direction::Tts, Path::new("bridge.yaml"))?;
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

mod env;
mod yaml;

pub use yaml::{ProviderYaml, TimeoutsYaml, YamlConfig};

use crate::core::gate::DEFAULT_GATE_TIMEOUT;
use crate::core::session::{
    DEFAULT_FINISH_TIMEOUT, Direction, ParamsUpdate, SessionParams, SessionSettings,
};
use crate::core::transport::{DEFAULT_CONNECT_TIMEOUT, EndpointSet};
use crate::errors::{BridgeError, BridgeResult};

/// Values supplied on the command line. `None` leaves the loaded value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Comma-separated endpoint list
    pub ws_url: Option<String>,
    pub model: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub gate_timeout_ms: Option<u64>,
    pub finish_timeout_ms: Option<u64>,
    pub forward_raw: Option<bool>,
    pub params: ParamsUpdate,
}

/// Complete configuration for one bridge process.
#[derive(Clone)]
pub struct BridgeConfig {
    pub direction: Direction,

    /// DashScope credential
    pub api_key: String,
    pub model: String,

    /// Endpoint candidates in priority order
    pub endpoints: EndpointSet,

    pub connect_timeout: Duration,
    pub gate_timeout: Duration,
    pub finish_timeout: Duration,

    /// Forward every provider frame as a `provider` event
    pub forward_raw: bool,

    /// Initial session parameters; a caller `config` line may still change them
    pub params: SessionParams,
}

impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("direction", &self.direction)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("endpoints", &self.endpoints)
            .field("connect_timeout", &self.connect_timeout)
            .field("gate_timeout", &self.gate_timeout)
            .field("finish_timeout", &self.finish_timeout)
            .field("forward_raw", &self.forward_raw)
            .field("params", &self.params)
            .finish()
    }
}

/// Zeroize the credential when the configuration is dropped.
impl Drop for BridgeConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.api_key.zeroize();
    }
}

impl BridgeConfig {
    /// Defaults for a direction, with no credential.
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            api_key: String::new(),
            model: direction.default_model().to_string(),
            endpoints: EndpointSet::dashscope_defaults(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            gate_timeout: DEFAULT_GATE_TIMEOUT,
            finish_timeout: DEFAULT_FINISH_TIMEOUT,
            forward_raw: false,
            params: SessionParams::for_direction(direction),
        }
    }

    /// Load configuration from environment variables over the defaults.
    ///
    /// The credential is not required here; see [`BridgeConfig::validate`].
    pub fn from_env(direction: Direction) -> BridgeResult<Self> {
        let mut config = Self::new(direction);

        if let Some(key) = env::var(env::API_KEY_VAR) {
            config.api_key = key;
        }

        let endpoint_var = direction.endpoint_env_var();
        if let Some(list) = env::var(endpoint_var) {
            config.endpoints = EndpointSet::parse_list(&list)
                .map_err(|e| BridgeError::InvalidConfig(format!("{endpoint_var}: {e}")))?;
        }

        if let Some(timeout) = env::duration_ms(env::CONNECT_TIMEOUT_VAR)? {
            config.connect_timeout = timeout;
        }
        if let Some(timeout) = env::duration_ms(env::GATE_TIMEOUT_VAR)? {
            config.gate_timeout = timeout;
        }
        if let Some(timeout) = env::duration_ms(env::FINISH_TIMEOUT_VAR)? {
            config.finish_timeout = timeout;
        }
        if let Some(raw) = env::flag(env::FORWARD_RAW_VAR)? {
            config.forward_raw = raw;
        }

        Ok(config)
    }

    /// Load configuration from a YAML file layered over the environment.
    pub fn from_file(direction: Direction, path: &Path) -> BridgeResult<Self> {
        let yaml_config = YamlConfig::from_file(path)?;
        let mut config = Self::from_env(direction)?;
        config.merge_yaml(yaml_config)?;
        Ok(config)
    }

    fn merge_yaml(&mut self, yaml: YamlConfig) -> BridgeResult<()> {
        if let Some(provider) = yaml.provider {
            if let Some(key) = provider.api_key.filter(|k| !k.trim().is_empty()) {
                self.api_key = key;
            }
            if let Some(model) = provider.model {
                self.model = model;
            }
            if let Some(endpoints) = provider.endpoints {
                self.endpoints = EndpointSet::from_addresses(&endpoints)
                    .map_err(|e| BridgeError::InvalidConfig(format!("provider.endpoints: {e}")))?;
            }
        }

        if let Some(timeouts) = yaml.timeouts {
            if let Some(ms) = timeouts.connect_ms {
                self.connect_timeout = Duration::from_millis(ms);
            }
            if let Some(ms) = timeouts.gate_ms {
                self.gate_timeout = Duration::from_millis(ms);
            }
            if let Some(ms) = timeouts.finish_ms {
                self.finish_timeout = Duration::from_millis(ms);
            }
        }

        if let Some(ref session) = yaml.session {
            self.params.apply(session);
        }
        if let Some(raw) = yaml.forward_raw {
            self.forward_raw = raw;
        }
        Ok(())
    }

    /// Apply command-line values, which take priority over everything else.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) -> BridgeResult<()> {
        if let Some(ref list) = overrides.ws_url {
            self.endpoints = EndpointSet::parse_list(list)
                .map_err(|e| BridgeError::InvalidConfig(format!("--ws-url: {e}")))?;
        }
        if let Some(ref model) = overrides.model {
            self.model = model.clone();
        }
        if let Some(ms) = overrides.connect_timeout_ms {
            self.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.gate_timeout_ms {
            self.gate_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.finish_timeout_ms {
            self.finish_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = overrides.forward_raw {
            self.forward_raw = raw;
        }
        self.params.apply(&overrides.params);
        Ok(())
    }

    /// Check that the configuration can start a session.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(BridgeError::MissingCredential(env::API_KEY_VAR.to_string()));
        }
        if self.endpoints.is_empty() {
            return Err(BridgeError::InvalidConfig(
                "no endpoint candidates configured".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(BridgeError::InvalidConfig("model must not be empty".to_string()));
        }
        if self.params.sample_rate == 0 {
            return Err(BridgeError::InvalidConfig(
                "sample_rate must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings handed to the session controller.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            direction: self.direction,
            params: self.params.clone(),
            endpoints: self.endpoints.clone(),
            connect_timeout: self.connect_timeout,
            finish_timeout: self.finish_timeout,
            forward_raw: self.forward_raw,
        }
    }
}
