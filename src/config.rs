//! Link configuration.
//!
//! Loaded from a JSON file when present, otherwise every field falls back
//! to its default, so a missing or partial file never blocks startup.

use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::link::RangingParams;

/// Settings for the BLE transport adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// UART-style service exposed by the arm's controller board.
    pub service_uuid: String,
    /// The single write characteristic inside that service.
    pub write_char_uuid: String,
    /// Substring filter applied to advertised names; `None` keeps every
    /// peripheral the scan sees.
    pub name_filter: Option<String>,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            service_uuid: "0000ffe0-0000-1000-8000-00805f9b34fb".to_string(),
            write_char_uuid: "0000ffe1-0000-1000-8000-00805f9b34fb".to_string(),
            name_filter: Some("Dolphin".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Length of one discovery window, in seconds.
    pub scan_duration_secs: u32,
    /// Bound on a single connection attempt, in seconds.
    pub connect_timeout_secs: u64,
    /// Cadence of the continuous jog stream, in milliseconds.
    pub jog_period_ms: u64,
    pub ranging: RangingParams,
    pub ble: BleConfig,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            scan_duration_secs: 10,
            connect_timeout_secs: 8,
            jog_period_ms: 100,
            ranging: RangingParams::default(),
            ble: BleConfig::default(),
        }
    }
}

impl LinkConfig {
    /// Loads the config, falling back to defaults when the file is missing
    /// or unreadable.
    pub async fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config file not found at {path:?}, using defaults");
            return Self::default();
        }
        match fs::read_to_string(path).await {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {path:?}");
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config at {path:?}: {e}, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read config at {path:?}: {e}, using defaults");
                Self::default()
            }
        }
    }

    /// Writes the config as pretty JSON, creating parent directories as
    /// needed.
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents).await?;
        info!("Saved config to {path:?}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_constants() {
        let config = LinkConfig::default();
        assert_eq!(config.scan_duration_secs, 10);
        assert_eq!(config.connect_timeout_secs, 8);
        assert_eq!(config.jog_period_ms, 100);
    }

    #[test]
    fn partial_json_fills_missing_fields_with_defaults() {
        let config: LinkConfig = serde_json::from_str(r#"{"jog_period_ms": 50}"#).unwrap();
        assert_eq!(config.jog_period_ms, 50);
        assert_eq!(config.scan_duration_secs, 10);
        assert_eq!(
            config.ble.service_uuid,
            "0000ffe0-0000-1000-8000-00805f9b34fb"
        );
    }

    #[tokio::test]
    async fn a_missing_file_yields_defaults() {
        let config = LinkConfig::load("/nonexistent/arm-link.json").await;
        assert_eq!(config.scan_duration_secs, 10);
    }
}
