//! Scanner settings, loadable from a JSON file.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::classify::{ClassifierSettings, FailurePolicy, DEFAULT_THRESHOLD};
use crate::error::ScanError;
use crate::extract::{ExtractConfig, SectionPolicy, GRID_DIM};

const DEFAULT_MALICIOUS_PAUSE_MS: u64 = 5_000;

/// Every field is optional in the file; missing ones take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanSettings {
    pub grid_width: u32,
    pub grid_height: u32,
    /// Size of the extracted image and of the model input.
    pub image_width: u32,
    pub image_height: u32,
    pub threshold: f32,
    pub on_inference_error: FailurePolicy,
    pub sections: SectionPolicy,
    /// How long a malicious verdict stays on display before the scan returns.
    pub malicious_pause_ms: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            grid_width: GRID_DIM,
            grid_height: GRID_DIM,
            image_width: GRID_DIM,
            image_height: GRID_DIM,
            threshold: DEFAULT_THRESHOLD,
            on_inference_error: FailurePolicy::Benign,
            sections: SectionPolicy::First,
            malicious_pause_ms: DEFAULT_MALICIOUS_PAUSE_MS,
        }
    }
}

impl ScanSettings {
    pub fn validate(&self) -> std::result::Result<(), ScanError> {
        let dims = [
            self.grid_width,
            self.grid_height,
            self.image_width,
            self.image_height,
        ];
        if dims.contains(&0) {
            return Err(ScanError::Config("grid and image dimensions must be non-zero".into()));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ScanError::Config(format!(
                "threshold {} is outside [0, 1]",
                self.threshold
            )));
        }
        Ok(())
    }

    pub fn extract_config(&self) -> ExtractConfig {
        ExtractConfig {
            grid_width: self.grid_width,
            grid_height: self.grid_height,
            image_width: self.image_width,
            image_height: self.image_height,
            sections: self.sections,
        }
    }

    pub fn classifier_settings(&self) -> ClassifierSettings {
        ClassifierSettings {
            input_width: self.image_width,
            input_height: self.image_height,
            threshold: self.threshold,
            on_error: self.on_inference_error,
        }
    }

    pub fn malicious_pause(&self) -> Duration {
        Duration::from_millis(self.malicious_pause_ms)
    }
}

pub fn load_scan_settings(path: &Path) -> Result<ScanSettings> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    let settings: ScanSettings = serde_json::from_str(&data)
        .with_context(|| format!("parsing settings in {}", path.display()))?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_model_shape() {
        let settings = ScanSettings::default();
        assert_eq!(settings.extract_config(), ExtractConfig::default());
        assert_eq!(settings.classifier_settings().input_len(), 196608);
        assert_eq!(settings.malicious_pause(), Duration::from_secs(5));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanner.json");
        fs::write(
            &path,
            r#"{ "threshold": 0.7, "sections": "all", "on_inference_error": "malicious" }"#,
        )
        .unwrap();

        let settings = load_scan_settings(&path).unwrap();
        assert_eq!(settings.threshold, 0.7);
        assert_eq!(settings.sections, SectionPolicy::All);
        assert_eq!(settings.on_inference_error, FailurePolicy::Malicious);
        assert_eq!(settings.grid_width, 256);
        assert_eq!(settings.malicious_pause_ms, 5_000);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanner.json");

        fs::write(&path, r#"{ "grid_width": 0 }"#).unwrap();
        assert!(load_scan_settings(&path).is_err());

        fs::write(&path, r#"{ "threshold": 1.5 }"#).unwrap();
        assert!(load_scan_settings(&path).is_err());

        fs::write(&path, r#"{ "bogus": true }"#).unwrap();
        assert!(load_scan_settings(&path).is_err());
    }
}
