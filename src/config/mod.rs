/// HMD configuration
///
/// Settings snapshot cloned into each frame, plus the on-disk document
/// that seeds it.

pub mod loader;
pub mod settings;

pub use loader::{ConfigError, ConfigFormat, HmdConfig, LayerConfig, PresentConfig};
pub use settings::{clamp_screen_percentage, HmdSettings, SettingsFlags};
