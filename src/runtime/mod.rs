/// VR runtime boundary
///
/// The native SDK is an opaque service: pose prediction, frame submission
/// and swap texture allocation. Everything the compositor needs from it goes
/// through `VrRuntime`, passed around as `Arc<dyn VrRuntime>` by the device
/// object that owns the session.

pub mod mock;

use glam::{UVec2, Vec2};

use crate::error::{HmdError, HmdResult};
use crate::layers::{LayerId, LayerOrigin};
use crate::math::{Pose, UvRect, ViewRect};
use crate::rhi::{TextureDesc, TextureHandle};

pub use mock::MockRuntime;

/// What the connected headset supports.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeCapabilities {
    pub product_name: String,
    pub runtime_version: String,
    pub max_layers: u32,
    /// Per-eye render size at pixel density 1.0
    pub recommended_eye_size: UVec2,
    pub hfov_degrees: f32,
    pub vfov_degrees: f32,
    pub position_tracking: bool,
}

impl Default for RuntimeCapabilities {
    fn default() -> Self {
        Self {
            product_name: "Generic HMD".to_string(),
            runtime_version: "0.0.0".to_string(),
            max_layers: crate::constants::layer::DEFAULT_MAX_LAYERS,
            recommended_eye_size: UVec2::new(1182, 1464),
            hfov_degrees: 90.0,
            vfov_degrees: 90.0,
            position_tracking: true,
        }
    }
}

/// Sampled head and eye poses, metres in tracking space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingState {
    pub head_pose: Pose,
    pub eye_poses: [Pose; 2],
    pub orientation_tracked: bool,
    pub position_tracked: bool,
}

impl Default for TrackingState {
    fn default() -> Self {
        Self {
            head_pose: Pose::IDENTITY,
            eye_poses: [Pose::IDENTITY; 2],
            orientation_tracked: false,
            position_tracked: false,
        }
    }
}

/// Result of handing a composed frame to the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitStatus {
    Success,
    DisplayLost,
    NoHmd,
    Error(String),
}

impl SubmitStatus {
    /// The device is gone and must be torn down.
    pub fn is_device_lost(&self) -> bool {
        matches!(self, SubmitStatus::DisplayLost | SubmitStatus::NoHmd)
    }

    pub fn to_result(&self) -> HmdResult<()> {
        match self {
            SubmitStatus::Success => Ok(()),
            SubmitStatus::DisplayLost => Err(HmdError::DeviceLost),
            SubmitStatus::NoHmd => Err(HmdError::NoHmd),
            SubmitStatus::Error(reason) => Err(HmdError::SystemError {
                component: "runtime".to_string(),
                error: reason.clone(),
            }),
        }
    }
}

/// Layer payload as the runtime sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerContent {
    /// Stereo eye buffer, both eyes packed in one texture
    Eye {
        viewports: [ViewRect; 2],
        render_poses: [Pose; 2],
    },
    /// Flat quad, pose and size in metres
    Quad {
        origin: LayerOrigin,
        pose: Pose,
        size: Vec2,
        uv_rect: UvRect,
    },
}

/// One entry of the composed frame, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionLayer {
    pub id: LayerId,
    pub texture: TextureHandle,
    pub high_quality: bool,
    pub content: LayerContent,
}

/// Native VR runtime session.
pub trait VrRuntime: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Connected and the application has focus.
    fn is_active(&self) -> bool;

    fn capabilities(&self) -> RuntimeCapabilities;

    /// Seconds, on the runtime's clock.
    fn predicted_display_time(&self, frame_number: u64) -> f64;

    fn tracking_state(&self, frame_number: u64) -> TrackingState;

    fn submit_frame(&self, frame_number: u64, layers: &[CompositionLayer]) -> SubmitStatus;

    fn allocate_swap_texture(&self, desc: &TextureDesc) -> HmdResult<TextureHandle>;

    fn release_swap_texture(&self, texture: TextureHandle);

    /// Hand pending writes on `texture` to the compositor.
    fn commit_swap_texture(&self, texture: TextureHandle) -> HmdResult<()>;

    fn recenter_tracking_origin(&self);
}
