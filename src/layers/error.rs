//! Layer subsystem error handling
//!
//! Type aliases and helpers for texture set and layer operations.

use crate::error::{HmdError, HmdResult};

/// Type alias for layer operation results
pub type LayerResult<T> = HmdResult<T>;

/// Helper trait for layer error contexts
pub trait LayerErrorContext<T> {
    fn layer_context(self, context: &str) -> LayerResult<T>;
}

impl<T, E> LayerErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn layer_context(self, context: &str) -> LayerResult<T> {
        self.map_err(|e| HmdError::SystemError {
            component: "layers".to_string(),
            error: format!("{}: {}", context, e),
        })
    }
}

/// Create a texture set allocation error
pub fn texture_set_allocation_error(width: u32, height: u32, reason: impl std::fmt::Display) -> HmdError {
    HmdError::TextureAllocationFailed {
        width,
        height,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_context_wraps_message() {
        let result: Result<(), String> = Err("copy queue full".to_string());
        let err = result.layer_context("quad 3 texture copy").unwrap_err();
        match err {
            HmdError::SystemError { component, error } => {
                assert_eq!(component, "layers");
                assert_eq!(error, "quad 3 texture copy: copy queue full");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
