use serde::Deserialize;
use std::path::Path;

use crate::core::session::ParamsUpdate;
use crate::errors::{BridgeError, BridgeResult};

/// YAML configuration file.
///
/// Every field is optional; values present here override the environment.
///
/// # Example YAML structure
/// ```yaml
/// provider:
///   api_key: "sk-..."
///   model: "qwen3-asr-flash-realtime"
///   endpoints:
///     - "wss://dashscope.aliyuncs.com/api-ws/v1/realtime"
///     - "wss://dashscope-intl.aliyuncs.com/api-ws/v1/realtime"
///
/// timeouts:
///   connect_ms: 10000
///   gate_ms: 5000
///   finish_ms: 15000
///
/// session:
///   language: "en"
///   sample_rate: 16000
///   enable_turn_detection: true
///   turn_detection_silence_ms: 800
///   voice: "Cherry"
///   mode: "server_commit"
///
/// forward_raw: false
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub provider: Option<ProviderYaml>,
    pub timeouts: Option<TimeoutsYaml>,
    pub session: Option<ParamsUpdate>,
    pub forward_raw: Option<bool>,
}

/// Provider credentials and endpoints
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProviderYaml {
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Endpoint candidates in priority order
    pub endpoints: Option<Vec<String>>,
}

/// Timeouts in milliseconds
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TimeoutsYaml {
    pub connect_ms: Option<u64>,
    pub gate_ms: Option<u64>,
    pub finish_ms: Option<u64>,
}

impl YamlConfig {
    pub fn from_file(path: &Path) -> BridgeResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::InvalidConfig(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| BridgeError::InvalidConfig(format!("Failed to parse YAML config: {e}")))?;

        Ok(config)
    }
}
