//! Config file loading
//!
//! Format is chosen from the file extension, TOML or JSON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::settings::HmdSettings;
use crate::constants::present::*;
use crate::rhi::TextureFormat;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Unknown configuration format: {}", .0.display())]
    UnknownFormat(PathBuf),
}

/// Supported config file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Some(ConfigFormat::Toml),
            Some("json") => Some(ConfigFormat::Json),
            _ => None,
        }
    }
}

/// Layer manager limits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Caps the runtime-reported layer budget when set
    pub max_layers_override: Option<u32>,
}

impl LayerConfig {
    /// Effective budget given what the runtime supports.
    pub fn max_layers(&self, runtime_max: u32) -> u32 {
        match self.max_layers_override {
            Some(limit) => limit.min(runtime_max),
            None => runtime_max,
        }
    }
}

/// Present path configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentConfig {
    pub texture_set_length: usize,
    pub eye_buffer_format: TextureFormat,
    pub buffer_quantization: u32,
    /// Multiplier on the runtime's recommended eye size
    pub pixel_density: f32,
    pub frame_stats_window: usize,
}

impl Default for PresentConfig {
    fn default() -> Self {
        Self {
            texture_set_length: DEFAULT_TEXTURE_SET_LENGTH,
            eye_buffer_format: TextureFormat::Rgba8Srgb,
            buffer_quantization: DEFAULT_BUFFER_QUANTIZATION,
            pixel_density: 1.0,
            frame_stats_window: DEFAULT_FRAME_STATS_WINDOW,
        }
    }
}

/// Top-level config document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HmdConfig {
    pub settings: HmdSettings,
    pub layers: LayerConfig,
    pub present: PresentConfig,
}

impl HmdConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let format =
            ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnknownFormat(path.to_path_buf()))?;
        let raw = fs::read_to_string(path)?;

        let config = match format {
            ConfigFormat::Toml => Self::from_toml_str(&raw)?,
            ConfigFormat::Json => {
                serde_json::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
        };

        log::info!("[Config] Loaded HMD config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let format =
            ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnknownFormat(path.to_path_buf()))?;

        let raw = match format {
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            ConfigFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };

        fs::write(path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let raw = r#"
            [settings]
            interpupillary_distance = 0.07
            world_to_meters_scale = 50.0

            [settings.flags]
            update_on_rt = false

            [layers]
            max_layers_override = 8
        "#;

        let config = HmdConfig::from_toml_str(raw).expect("valid toml");
        assert_eq!(config.settings.interpupillary_distance, 0.07);
        assert_eq!(config.settings.world_to_meters_scale, 50.0);
        assert!(!config.settings.flags.update_on_rt);
        assert!(config.settings.flags.hmd_enabled);
        assert_eq!(config.layers.max_layers(16), 8);
        assert_eq!(config.present, PresentConfig::default());
    }

    #[test]
    fn test_runtime_state_is_not_persisted() {
        let raw = r#"
            [settings.flags]
            stereo_enabled = true
        "#;
        let config = HmdConfig::from_toml_str(raw).expect("valid toml");
        assert!(!config.settings.flags.stereo_enabled);
    }

    #[test]
    fn test_max_layers_never_exceeds_runtime() {
        let config = LayerConfig {
            max_layers_override: Some(64),
        };
        assert_eq!(config.max_layers(16), 16);
        assert_eq!(LayerConfig::default().max_layers(16), 16);
    }

    #[test]
    fn test_save_and_load_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hmd.json");

        let mut config = HmdConfig::default();
        config.settings.screen_percentage = 140.0;
        config.present.texture_set_length = 2;
        config.save(&path).expect("save");

        let loaded = HmdConfig::load(&path).expect("load");
        assert_eq!(loaded.settings.screen_percentage, 140.0);
        assert_eq!(loaded.present.texture_set_length, 2);
    }

    #[test]
    fn test_unknown_extension() {
        let result = HmdConfig::load(Path::new("DefaultEngine.ini"));
        assert!(matches!(result, Err(ConfigError::UnknownFormat(_))));
    }
}
