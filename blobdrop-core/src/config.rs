//! Bridge configuration, parsed from TOML text handed over by the embedding page.

use serde::Deserialize;

use crate::waveform::WaveformParams;

/// Bridge configuration. Every field has a default; an empty document is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// `tracing` filter directive for the host's log output (default `info`).
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Waveform exporter parameters.
    #[serde(default)]
    pub waveform: WaveformParams,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            waveform: WaveformParams::default(),
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}

/// Error parsing bridge configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
