//! Crate-wide error type
//!
//! Subsystems wrap this through their own `error.rs` aliases and context
//! traits. Capacity limits and unknown layer ids are not errors; those come
//! back as `Option`.

use crate::config::ConfigError;

/// Errors raised by the compositor core and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum HmdError {
    #[error("Texture allocation failed ({width}x{height}): {reason}")]
    TextureAllocationFailed {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("Texture set {id} has already been released")]
    TextureSetReleased { id: u64 },

    #[error("HMD display lost")]
    DeviceLost,

    #[error("No HMD connected")]
    NoHmd,

    #[error("Render thread error in {context}: {error}")]
    RenderThread { context: String, error: String },

    #[error("System error in {component}: {error}")]
    SystemError { component: String, error: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result alias used across the crate.
pub type HmdResult<T> = Result<T, HmdError>;
