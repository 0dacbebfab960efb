// HMD Compositor Constants
//
// Shared limits, tags and defaults used by the layer manager, the HMD core
// and the present bridge. Keep them here so the game and render sides agree.

/// Layer id encoding
pub mod layer {
    /// Type tag occupying the high bits of a layer id.
    pub const EYE_TAG: u32 = 0x0000_0000;
    pub const QUAD_TAG: u32 = 0x8000_0000;
    pub const DEBUG_TAG: u32 = 0x4000_0000;

    pub const TYPE_MASK: u32 = EYE_TAG | QUAD_TAG | DEBUG_TAG;
    pub const ID_MASK: u32 = !TYPE_MASK;

    /// Layer budget when the runtime does not report one.
    pub const DEFAULT_MAX_LAYERS: u32 = 16;

    /// Quad aspect used when a texture reports zero height.
    pub const DEFAULT_TEXTURE_ASPECT: f32 = 1280.0 / 720.0;

    /// Tolerance for transform equality when diffing descriptors.
    pub const TRANSFORM_TOLERANCE: f32 = 1.0e-4;
}

/// Settings defaults
pub mod settings {
    pub const DEFAULT_IPD: f32 = 0.064;
    pub const DEFAULT_WORLD_TO_METERS: f32 = 100.0;
    pub const DEFAULT_FOV_DEGREES: f32 = 90.0;
    pub const DEFAULT_SCREEN_PERCENTAGE: f32 = 100.0;

    pub const MIN_SCREEN_PERCENTAGE: f32 = 30.0;
    pub const MAX_SCREEN_PERCENTAGE: f32 = 300.0;
}

/// Present path defaults
pub mod present {
    /// Number of textures in an eye buffer swap ring.
    pub const DEFAULT_TEXTURE_SET_LENGTH: usize = 3;

    /// Eye buffer dimensions are rounded up to a multiple of this.
    pub const DEFAULT_BUFFER_QUANTIZATION: u32 = 16;

    /// Frames kept in the rolling timing window.
    pub const DEFAULT_FRAME_STATS_WINDOW: usize = 120;
}

/// Frame counter
pub mod frame {
    /// First frame number handed out by the counter.
    pub const FIRST_FRAME_NUMBER: u64 = 1;
}
