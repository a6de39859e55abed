//! Camera configuration records and YAML persistence
//!
//! A `Configuration` mirrors what the camera services accept and report.
//! Every field is optional: absence means "unspecified", never zero. Records
//! are built fresh per request and never mutated after sending.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Mapping persisted to the configuration file, keyed by camera name.
pub type CameraConfigurations = BTreeMap<String, Configuration>;

/// Exposure setting. `value` is in EV, unused when `auto_mode` is on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_mode: Option<bool>,
}

/// Shutter setting. `ms` is device-reported only; the tools set `percent`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shutter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ms: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_mode: Option<bool>,
}

/// Gain setting. `db` is device-reported only; the tools set `percent`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gain {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_mode: Option<bool>,
}

/// White balance. The red and blue channels share one auto-mode flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhiteBalance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub red: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blue: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_mode: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Sampling rate. `period` (ms) is device-reported only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingRate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<u32>,
}

/// Image type requested from the camera, e.g. "rgb" or "gray".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageType {
    pub value: String,
}

/// Per-camera configuration record exchanged with the camera services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure: Option<Exposure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutter: Option<Shutter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain: Option<Gain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_balance: Option<WhiteBalance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_rate: Option<SamplingRate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_type: Option<ImageType>,
}

/// Body of the `is.sync` request: which entities to align and at what rate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub entities: Vec<String>,
    pub sampling_rate: SamplingRate,
}

/// Writes a camera → configuration mapping to a YAML file.
pub fn save_configurations<P: AsRef<Path>>(
    path: P,
    configurations: &CameraConfigurations,
) -> Result<(), ConfigError> {
    let content = serde_yaml::to_string(configurations)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Reads a camera → configuration mapping back from a YAML file.
pub fn load_configurations<P: AsRef<Path>>(path: P) -> Result<CameraConfigurations, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let configurations = serde_yaml::from_str(&content)?;
    Ok(configurations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_fully_unspecified() {
        let config = Configuration::default();
        assert!(config.brightness.is_none());
        assert!(config.exposure.is_none());
        assert!(config.white_balance.is_none());
    }

    #[test]
    fn test_absent_fields_are_not_serialized() {
        let config = Configuration {
            brightness: Some(3.5),
            ..Default::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"brightness":3.5}"#);
    }

    #[test]
    fn test_partial_record_round_trips() {
        let config = Configuration {
            gain: Some(Gain {
                auto_mode: Some(true),
                ..Default::default()
            }),
            resolution: Some(Resolution {
                width: 1288,
                height: 728,
            }),
            ..Default::default()
        };

        let json = serde_json::to_vec(&config).unwrap();
        let parsed: Configuration = serde_json::from_slice(&json).unwrap();

        assert_eq!(parsed, config);
        let gain = parsed.gain.unwrap();
        assert_eq!(gain.auto_mode, Some(true));
        assert!(gain.percent.is_none());
    }

    #[test]
    fn test_yaml_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configuration.yaml");

        let mut configurations = CameraConfigurations::new();
        configurations.insert(
            "ptgrey.0".to_string(),
            Configuration {
                brightness: Some(4.2),
                shutter: Some(Shutter {
                    percent: Some(30.0),
                    ms: Some(12.5),
                    auto_mode: Some(false),
                }),
                ..Default::default()
            },
        );
        configurations.insert("ptgrey.1".to_string(), Configuration::default());

        save_configurations(&path, &configurations).unwrap();
        let loaded = load_configurations(&path).unwrap();

        assert_eq!(loaded, configurations);
        assert!(loaded["ptgrey.1"].shutter.is_none());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = load_configurations("/nonexistent/configuration.yaml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
