pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod hmd;
pub mod layers;
pub mod math;
pub mod present;
pub mod rhi;
pub mod runtime;

pub use config::{ConfigError, HmdConfig, HmdSettings, PresentConfig};
pub use error::{HmdError, HmdResult};
pub use frame::{FrameCounter, FrameState, GameFrame, RenderContext, WorldContext, WorldKind};
pub use hmd::{DeviceStatus, HeadMountedDisplay, HmdCommand, StereoLayerDesc, StereoLayerType};
pub use layers::{LayerDesc, LayerId, LayerKind, LayerManager, LayerOrigin, TextureSetFactory, TextureSetProxy};
pub use math::{Pose, Transform, UvRect, ViewRect};
pub use present::{FrameStats, PresentBridge, RenderThread};
pub use rhi::{RenderDevice, TextureDesc, TextureFormat, TextureHandle};
pub use runtime::{CompositionLayer, SubmitStatus, TrackingState, VrRuntime};
