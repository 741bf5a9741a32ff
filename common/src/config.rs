use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, reader::RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub attempts: u32,
    pub retry_pause_secs: u64,
    pub scan_timeout_secs: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            attempts: retry.attempts,
            retry_pause_secs: retry.pause.as_secs(),
            scan_timeout_secs: 4,
        }
    }
}

impl SensorConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            pause: Duration::from_secs(self.retry_pause_secs),
        }
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}

fn default_kasa_binary() -> String {
    "kasa".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub ruuvitag_mac_address: String,
    pub kasa_plug_alias: String,
    /// IANA zone used to pick the current hour. Falls back to system local time.
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default = "default_kasa_binary")]
    pub kasa_binary: String,
    #[serde(default)]
    pub dry_run: bool,
}

impl ControllerConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ruuvitag_mac_address.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "ruuvitag_mac_address must not be empty".to_string(),
            ));
        }
        if self.kasa_plug_alias.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "kasa_plug_alias must not be empty".to_string(),
            ));
        }
        if self.sensor.attempts == 0 {
            return Err(ConfigError::Invalid(
                "sensor.attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
