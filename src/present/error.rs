//! Present subsystem error handling
//!
//! Type aliases and helpers for the present bridge and render thread.

use crate::error::{HmdError, HmdResult};

/// Type alias for present operation results
pub type PresentResult<T> = HmdResult<T>;

/// Helper trait for present error contexts
pub trait PresentErrorContext<T> {
    fn render_thread_context(self, context: &str) -> PresentResult<T>;
}

impl<T, E> PresentErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn render_thread_context(self, context: &str) -> PresentResult<T> {
        self.map_err(|e| render_thread_error(context, e))
    }
}

/// Create a render thread error
pub fn render_thread_error(context: &str, error: impl std::fmt::Display) -> HmdError {
    HmdError::RenderThread {
        context: context.to_string(),
        error: error.to_string(),
    }
}
