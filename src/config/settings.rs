//! Per-HMD settings snapshot
//!
//! `HmdSettings` is cloned by value into every `GameFrame`, so the game
//! thread may keep editing its copy while the render thread reads a frozen one.

use glam::{Quat, UVec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::constants::settings::*;
use crate::math::ViewRect;

/// Feature and state flags.
///
/// Runtime state (stereo on/off, enforcement, distortion) is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsFlags {
    /// HMD may be used at all
    pub hmd_enabled: bool,
    #[serde(skip)]
    pub stereo_enabled: bool,
    /// Stereo forced on from the command line or console
    #[serde(skip)]
    pub stereo_enforced: bool,
    /// Head tracking runs even with stereo off
    #[serde(skip)]
    pub head_tracking_enforced: bool,
    #[serde(skip)]
    pub hmd_distortion: bool,

    pub override_vsync: bool,
    pub vsync: bool,
    #[serde(skip)]
    pub saved_vsync: bool,

    pub override_screen_percentage: bool,
    pub override_ipd: bool,
    pub override_stereo: bool,
    pub world_to_meters_override: bool,
    pub camera_scale_override: bool,
    pub clipping_planes_override: bool,

    pub allow_finish_current_frame: bool,
    pub chroma_ab_correction: bool,
    pub yaw_drift_correction: bool,
    pub low_persistence: bool,
    /// Resample poses on the render thread right before submission
    pub update_on_rt: bool,
    pub mirror_to_window: bool,
    pub time_warp: bool,
    pub hmd_pos_tracking: bool,

    pub dev_settings_enabled: bool,
    pub draw_sensor_frustum: bool,
}

impl Default for SettingsFlags {
    fn default() -> Self {
        Self {
            hmd_enabled: true,
            stereo_enabled: false,
            stereo_enforced: false,
            head_tracking_enforced: false,
            hmd_distortion: true,
            override_vsync: true,
            vsync: true,
            saved_vsync: false,
            override_screen_percentage: false,
            override_ipd: false,
            override_stereo: false,
            world_to_meters_override: false,
            camera_scale_override: false,
            clipping_planes_override: false,
            allow_finish_current_frame: true,
            chroma_ab_correction: true,
            yaw_drift_correction: true,
            low_persistence: true,
            update_on_rt: true,
            mirror_to_window: true,
            time_warp: true,
            hmd_pos_tracking: true,
            dev_settings_enabled: false,
            draw_sensor_frustum: false,
        }
    }
}

/// Settings for one HMD instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HmdSettings {
    /// Metres
    pub interpupillary_distance: f32,
    /// Radians
    pub hfov: f32,
    pub vfov: f32,
    /// Zero means "use the runtime default"
    pub near_clipping_plane: f32,
    pub far_clipping_plane: f32,
    pub world_to_meters_scale: f32,
    pub screen_percentage: f32,
    pub ideal_screen_percentage: f32,
    pub camera_scale: Vec3,
    pub position_scale: Vec3,
    /// Metres, in tracking space
    pub base_offset: Vec3,
    pub base_orientation: Quat,
    /// World units, added after scaling
    pub position_offset: Vec3,
    pub eye_render_viewport: [ViewRect; 2],
    pub flags: SettingsFlags,
}

impl Default for HmdSettings {
    fn default() -> Self {
        Self {
            interpupillary_distance: DEFAULT_IPD,
            hfov: DEFAULT_FOV_DEGREES.to_radians(),
            vfov: DEFAULT_FOV_DEGREES.to_radians(),
            near_clipping_plane: 0.0,
            far_clipping_plane: 0.0,
            world_to_meters_scale: DEFAULT_WORLD_TO_METERS,
            screen_percentage: DEFAULT_SCREEN_PERCENTAGE,
            ideal_screen_percentage: DEFAULT_SCREEN_PERCENTAGE,
            camera_scale: Vec3::ONE,
            position_scale: Vec3::ONE,
            base_offset: Vec3::ZERO,
            base_orientation: Quat::IDENTITY,
            position_offset: Vec3::ZERO,
            eye_render_viewport: [ViewRect::default(); 2],
            flags: SettingsFlags::default(),
        }
    }
}

impl HmdSettings {
    pub fn is_stereo_enabled(&self) -> bool {
        self.flags.stereo_enabled && self.flags.hmd_enabled
    }

    /// Override when set, otherwise the runtime's ideal value.
    pub fn actual_screen_percentage(&self) -> f32 {
        if self.flags.override_screen_percentage {
            self.screen_percentage
        } else {
            self.ideal_screen_percentage
        }
    }

    /// Lay out both eyes side by side in a `2w x h` target.
    pub fn set_eye_render_viewport(&mut self, eye_width: u32, eye_height: u32) {
        self.eye_render_viewport[0] = ViewRect::new(UVec2::ZERO, UVec2::new(eye_width, eye_height));
        self.eye_render_viewport[1] = ViewRect::new(
            UVec2::new(eye_width, 0),
            UVec2::new(eye_width * 2, eye_height),
        );
    }

    /// Render target size implied by the eye viewports.
    pub fn texture_size(&self) -> UVec2 {
        self.eye_render_viewport[1].max
    }

    pub fn field_of_view_degrees(&self) -> (f32, f32) {
        (self.hfov.to_degrees(), self.vfov.to_degrees())
    }
}

/// Clamp a requested screen percentage into the supported range.
pub fn clamp_screen_percentage(percentage: f32) -> f32 {
    percentage.clamp(MIN_SCREEN_PERCENTAGE, MAX_SCREEN_PERCENTAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = HmdSettings::default();
        assert_eq!(settings.interpupillary_distance, 0.064);
        assert_eq!(settings.world_to_meters_scale, 100.0);
        assert!((settings.hfov.to_degrees() - 90.0).abs() < 1.0e-3);
        assert!(settings.flags.hmd_enabled);
        assert!(settings.flags.update_on_rt);
        assert!(!settings.flags.stereo_enabled);
        assert!(!settings.is_stereo_enabled());
    }

    #[test]
    fn test_stereo_requires_hmd_enabled() {
        let mut settings = HmdSettings::default();
        settings.flags.stereo_enabled = true;
        assert!(settings.is_stereo_enabled());

        settings.flags.hmd_enabled = false;
        assert!(!settings.is_stereo_enabled());
    }

    #[test]
    fn test_eye_render_viewport_layout() {
        let mut settings = HmdSettings::default();
        settings.set_eye_render_viewport(960, 1080);

        assert_eq!(settings.eye_render_viewport[0].min, UVec2::ZERO);
        assert_eq!(settings.eye_render_viewport[1].min, UVec2::new(960, 0));
        assert_eq!(settings.texture_size(), UVec2::new(1920, 1080));
    }

    #[test]
    fn test_screen_percentage_override() {
        let mut settings = HmdSettings::default();
        settings.ideal_screen_percentage = 130.0;
        settings.screen_percentage = 80.0;
        assert_eq!(settings.actual_screen_percentage(), 130.0);

        settings.flags.override_screen_percentage = true;
        assert_eq!(settings.actual_screen_percentage(), 80.0);
    }

    #[test]
    fn test_clamp_screen_percentage() {
        assert_eq!(clamp_screen_percentage(10.0), 30.0);
        assert_eq!(clamp_screen_percentage(500.0), 300.0);
        assert_eq!(clamp_screen_percentage(150.0), 150.0);
    }
}
