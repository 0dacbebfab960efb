/// Present path
///
/// Render-thread submission of composed frames to the VR runtime, the
/// render thread itself, and frame timing.

pub mod bridge;
pub mod error;
pub mod frame_stats;
pub mod render_thread;

pub use bridge::PresentBridge;
pub use error::{PresentErrorContext, PresentResult};
pub use frame_stats::FrameStats;
pub use render_thread::RenderThread;
