/// Head-mounted display core
///
/// Coordinates stereo enable/disable, the per-tick frame lifecycle and pose
/// bookkeeping, and fronts the layer manager for game code. Game-thread
/// state lives behind one mutex; anything the render thread reports back
/// arrives through the sticky flags in `DeviceStatus`.

pub mod console;
pub mod device_status;
pub mod stereo_layers;

use std::sync::Arc;

use glam::{Quat, UVec2, Vec3};
use parking_lot::Mutex;

use crate::config::{clamp_screen_percentage, HmdConfig, HmdSettings, PresentConfig};
use crate::constants::settings::DEFAULT_IPD;
use crate::error::HmdResult;
use crate::frame::{FrameCounter, FrameState, GameFrame, RenderContext, WorldContext};
use crate::layers::{LayerId, LayerKind, LayerManager, LayerOrigin, RuntimeTextureSetFactory, TextureSetFactory};
use crate::math::quantize_buffer_size;
use crate::present::RenderThread;
use crate::runtime::{RuntimeCapabilities, VrRuntime};

pub use console::{parse_command, CommandError, HmdCommand, StereoParam, Switch};
pub use device_status::DeviceStatus;
pub use stereo_layers::{StereoLayerDesc, StereoLayerType};

#[derive(Debug, Default)]
struct HmdFlags {
    need_enable_stereo: bool,
    need_disable_stereo: bool,
    frame_started: bool,
    need_update_stereo_rendering_params: bool,
    apply_system_overrides_on_stereo: bool,
    had_vision_tracking: bool,
}

struct HmdState {
    settings: HmdSettings,
    flags: HmdFlags,
    /// Game thread's frame
    frame: Option<Arc<GameFrame>>,
    /// Published candidate waiting for the render thread
    render_frame: Option<Arc<GameFrame>>,
    frame_state: FrameState,
}

/// HMD device core.
pub struct HeadMountedDisplay {
    runtime: Arc<dyn VrRuntime>,
    capabilities: RuntimeCapabilities,
    layers: Arc<LayerManager>,
    status: Arc<DeviceStatus>,
    frame_counter: Arc<FrameCounter>,
    present_config: PresentConfig,
    eye_layer_id: LayerId,
    state: Mutex<HmdState>,
}

impl HeadMountedDisplay {
    /// Device backed by runtime swap textures.
    pub fn new(runtime: Arc<dyn VrRuntime>, config: &HmdConfig) -> Self {
        let factory: Arc<dyn TextureSetFactory> = Arc::new(RuntimeTextureSetFactory::new(runtime.clone()));
        Self::with_factory(runtime, config, factory)
    }

    pub fn with_factory(
        runtime: Arc<dyn VrRuntime>,
        config: &HmdConfig,
        factory: Arc<dyn TextureSetFactory>,
    ) -> Self {
        let capabilities = runtime.capabilities();
        let max_layers = config.layers.max_layers(capabilities.max_layers);
        let layers = Arc::new(LayerManager::new(factory, max_layers));

        // The eye buffer is always present
        let eye_layer_id = layers
            .add_layer(LayerKind::Eye, 0, LayerOrigin::HeadLocked)
            .map(|desc| desc.id())
            .unwrap_or(LayerId::NONE);

        let mut settings = config.settings.clone();
        settings.ideal_screen_percentage = config.present.pixel_density * 100.0;

        log::info!(
            "[HMD] {} (runtime {}), {} layers",
            capabilities.product_name,
            capabilities.runtime_version,
            max_layers
        );

        let hmd = Self {
            runtime,
            capabilities,
            layers,
            status: Arc::new(DeviceStatus::new()),
            frame_counter: Arc::new(FrameCounter::new()),
            present_config: config.present.clone(),
            eye_layer_id,
            state: Mutex::new(HmdState {
                settings,
                flags: HmdFlags::default(),
                frame: None,
                render_frame: None,
                frame_state: FrameState::Idle,
            }),
        };
        {
            let mut state = hmd.state.lock();
            hmd.update_stereo_rendering_params(&mut state);
        }
        hmd
    }

    /// Share a frame counter with other devices ticking the same process.
    pub fn with_frame_counter(mut self, counter: Arc<FrameCounter>) -> Self {
        self.frame_counter = counter;
        self
    }

    pub fn runtime(&self) -> &Arc<dyn VrRuntime> {
        &self.runtime
    }

    pub fn capabilities(&self) -> &RuntimeCapabilities {
        &self.capabilities
    }

    pub fn layer_manager(&self) -> &Arc<LayerManager> {
        &self.layers
    }

    pub fn device_status(&self) -> &Arc<DeviceStatus> {
        &self.status
    }

    pub fn frame_counter(&self) -> &Arc<FrameCounter> {
        &self.frame_counter
    }

    pub fn present_config(&self) -> &PresentConfig {
        &self.present_config
    }

    pub fn eye_layer_id(&self) -> LayerId {
        self.eye_layer_id
    }

    /// Copy of the live (game-thread) settings.
    pub fn settings(&self) -> HmdSettings {
        self.state.lock().settings.clone()
    }

    pub fn frame_state(&self) -> FrameState {
        self.state.lock().frame_state
    }

    // ---- Frame lifecycle ----

    /// Begin a game tick. Returns false when there is no VR work this frame.
    pub fn on_start_game_frame(&self, world: &WorldContext) -> bool {
        if !world.is_valid() {
            return false;
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.frame = None;
        state.flags.frame_started = true;
        state.frame_state = FrameState::FrameStarted;

        if self.status.needs_to_kill_hmd() && state.settings.flags.stereo_enabled {
            log::warn!("[HMD] Device lost, falling back to mono rendering");
            self.do_enable_stereo(state, false);
            state.flags.need_enable_stereo = true;
        }

        let stereo_enabled = state.settings.flags.stereo_enabled;
        let mut stereo_desired = stereo_enabled || state.flags.need_enable_stereo;
        if stereo_desired && (state.flags.need_disable_stereo || !state.settings.flags.hmd_enabled) {
            stereo_desired = false;
        }
        let device_ready = if stereo_enabled {
            self.runtime.is_active()
        } else {
            self.runtime.is_connected()
        };
        let stereo_possible = stereo_desired && device_ready;

        state.flags.need_enable_stereo = false;
        state.flags.need_disable_stereo = false;

        if stereo_enabled != stereo_possible {
            self.do_enable_stereo(state, stereo_possible);
        }
        // Keep asking until the device comes up
        state.flags.need_enable_stereo = stereo_desired && !state.settings.flags.stereo_enabled;

        if !state.settings.is_stereo_enabled() && !state.settings.flags.head_tracking_enforced {
            state.frame_state = FrameState::Idle;
            return false;
        }

        if state.flags.need_update_stereo_rendering_params {
            self.update_stereo_rendering_params(state);
        }
        if state.flags.apply_system_overrides_on_stereo {
            self.apply_system_overrides(state);
        }

        let frame = self.create_game_frame(state, world);
        state.frame = Some(Arc::new(frame));
        true
    }

    fn create_game_frame(&self, state: &mut HmdState, world: &WorldContext) -> GameFrame {
        let settings = &state.settings;
        let frame_number = self.frame_counter.increment();
        let mut frame = GameFrame::new(frame_number, settings.clone());

        frame.set_world_to_meters(if settings.flags.world_to_meters_override {
            settings.world_to_meters_scale
        } else {
            world.world_to_meters
        });
        frame.set_camera_scale(if settings.flags.camera_scale_override {
            settings.camera_scale
        } else {
            Vec3::ONE
        });

        let tracking = self.runtime.tracking_state(frame_number);
        frame.set_poses(tracking.head_pose, tracking.eye_poses);
        frame.set_vision_tracking(tracking.position_tracked);

        if tracking.position_tracked != state.flags.had_vision_tracking {
            if tracking.position_tracked {
                log::info!("[HMD] Vision tracking acquired");
            } else {
                log::warn!("[HMD] Vision tracking lost");
            }
            state.flags.had_vision_tracking = tracking.position_tracked;
        }

        frame
    }

    /// Finish a game tick and publish the frame if it is still current.
    pub fn on_end_game_frame(&self, world: &WorldContext) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.flags.frame_started = false;

        let Some(frame) = state.frame.as_mut() else {
            return false;
        };
        if !world.is_valid() {
            return false;
        }

        Arc::make_mut(frame).mark_out_of_frame();

        let settings = frame.settings();
        if !settings.is_stereo_enabled() && !settings.flags.head_tracking_enforced {
            state.frame_state = FrameState::Idle;
            return false;
        }

        if frame.frame_number() == self.frame_counter.get() {
            state.render_frame = Some(Arc::clone(frame));
            state.frame_state = FrameState::FrameEndedPendingRender;
        } else {
            // Another world advanced the counter mid-frame
            log::debug!(
                "[HMD] Frame {} superseded by {}, not publishing",
                frame.frame_number(),
                self.frame_counter.get()
            );
            state.render_frame = None;
            state.frame_state = FrameState::Idle;
        }
        true
    }

    /// Hand the published frame to the caller. At most once per frame.
    pub fn pass_render_frame_ownership(&self) -> Option<Arc<GameFrame>> {
        self.state.lock().render_frame.take()
    }

    /// Package the published frame for the render thread.
    pub fn begin_render_view_family(&self, show_flags_rendering: bool) -> Option<RenderContext> {
        self.pass_render_frame_ownership()
            .map(|frame| RenderContext::new(frame, show_flags_rendering))
    }

    /// Frame to use for queries right now.
    ///
    /// Between the end of a tick and the start of rendering this is the
    /// published frame. Calls made outside the normal window (a fullscreen
    /// toggle, say) may get the previous frame back.
    pub fn current_frame(&self) -> Option<Arc<GameFrame>> {
        let state = self.state.lock();
        let frame = state.frame.as_ref()?;

        if frame.is_out_of_frame() {
            if let Some(render_frame) = state.render_frame.as_ref().filter(|f| f.is_out_of_frame()) {
                return Some(Arc::clone(render_frame));
            }
        }
        if frame.frame_number() == self.frame_counter.get() || frame.is_out_of_frame() {
            return Some(Arc::clone(frame));
        }
        None
    }

    pub fn current_frame_number(&self) -> u64 {
        self.frame_counter.get()
    }

    // ---- Stereo ----

    fn do_enable_stereo(&self, state: &mut HmdState, stereo: bool) -> bool {
        let enable = state.settings.flags.hmd_enabled && stereo;
        if enable == state.settings.flags.stereo_enabled {
            return enable;
        }

        if enable {
            if self.status.needs_to_kill_hmd() {
                log::warn!("[HMD] Device needs reinitialising, stereo stays off");
                return false;
            }
            if !self.runtime.is_connected() {
                log::debug!("[HMD] No HMD connected, stereo stays off");
                return false;
            }
        }

        state.settings.flags.stereo_enabled = enable;
        state.settings.flags.hmd_distortion = enable;
        if enable {
            state.flags.apply_system_overrides_on_stereo = true;
            state.flags.need_update_stereo_rendering_params = true;
            log::info!("[HMD] Stereo enabled");
        } else {
            log::info!("[HMD] Stereo disabled");
        }
        enable
    }

    /// Request stereo on or off. Takes effect with the next frame.
    pub fn enable_stereo(&self, stereo: bool) -> bool {
        let mut state = self.state.lock();
        state.settings.flags.stereo_enforced = false;
        self.do_enable_stereo(&mut state, stereo)
    }

    /// Force stereo on and keep it that way through later requests.
    pub(crate) fn enforce_stereo(&self) -> bool {
        let mut state = self.state.lock();
        let enabled = self.do_enable_stereo(&mut state, true);
        state.settings.flags.stereo_enforced = true;
        if !enabled {
            state.flags.need_enable_stereo = true;
        }
        enabled
    }

    /// Stereo state of the frame being rendered or ticked.
    pub fn is_stereo_enabled(&self) -> bool {
        if self.status.needs_to_kill_hmd() {
            return false;
        }
        self.current_frame()
            .map_or(false, |frame| frame.settings().is_stereo_enabled())
    }

    pub fn is_stereo_enabled_on_next_frame(&self) -> bool {
        let state = self.state.lock();
        let requested = state.settings.flags.stereo_enabled || state.flags.need_enable_stereo;
        requested && state.settings.flags.hmd_enabled && !state.flags.need_disable_stereo
    }

    pub fn enable_hmd(&self, enable: bool) {
        let mut state = self.state.lock();
        state.settings.flags.hmd_enabled = enable;
        if !enable {
            self.do_enable_stereo(&mut state, false);
        }
    }

    pub fn is_hmd_enabled(&self) -> bool {
        self.state.lock().settings.flags.hmd_enabled
    }

    pub fn is_hmd_connected(&self) -> bool {
        self.state.lock().settings.flags.hmd_enabled && self.runtime.is_connected()
    }

    /// Out-of-band device reset after a lost display.
    pub fn reinitialize_device(&self) {
        self.status.clear_device_lost();
        self.status.request_texture_reallocation();
        log::info!("[HMD] Device reinitialised");
    }

    fn update_stereo_rendering_params(&self, state: &mut HmdState) {
        let settings = &mut state.settings;
        if !settings.flags.override_stereo {
            settings.hfov = self.capabilities.hfov_degrees.to_radians();
            settings.vfov = self.capabilities.vfov_degrees.to_radians();
        }
        if !settings.flags.override_ipd {
            settings.interpupillary_distance = DEFAULT_IPD;
        }

        let scale = settings.actual_screen_percentage() / 100.0;
        let eye_size = (self.capabilities.recommended_eye_size.as_vec2() * scale).as_uvec2();
        let quantization = self.present_config.buffer_quantization.max(1).next_power_of_two();
        let eye_size = UVec2::new(
            quantize_buffer_size(eye_size.x.max(1), quantization),
            quantize_buffer_size(eye_size.y.max(1), quantization),
        );
        settings.set_eye_render_viewport(eye_size.x, eye_size.y);

        state.flags.need_update_stereo_rendering_params = false;
        log::debug!(
            "[HMD] Eye buffer {}x{} at {}% screen percentage",
            eye_size.x,
            eye_size.y,
            settings.actual_screen_percentage()
        );
    }

    fn apply_system_overrides(&self, state: &mut HmdState) {
        if state.settings.flags.override_vsync {
            log::debug!("[HMD] Forcing vsync {}", if state.settings.flags.vsync { "on" } else { "off" });
        }
        state.flags.apply_system_overrides_on_stereo = false;
    }

    /// Return IPD, clip planes, scale overrides and FOV to their defaults.
    pub fn reset_stereo_rendering_params(&self) {
        let mut state = self.state.lock();
        let flags = &mut state.settings.flags;
        flags.override_ipd = false;
        flags.clipping_planes_override = false;
        flags.world_to_meters_override = false;
        flags.camera_scale_override = false;
        flags.override_stereo = false;
        state.settings.near_clipping_plane = 0.0;
        state.settings.far_clipping_plane = 0.0;
        state.flags.need_update_stereo_rendering_params = true;
    }

    // ---- Settings ----

    fn update_settings<R>(&self, f: impl FnOnce(&mut HmdSettings) -> R) -> R {
        f(&mut self.state.lock().settings)
    }

    pub fn set_interpupillary_distance(&self, distance: f32) {
        self.update_settings(|settings| {
            settings.interpupillary_distance = distance;
            settings.flags.override_ipd = true;
        });
    }

    pub fn interpupillary_distance(&self) -> f32 {
        self.state.lock().settings.interpupillary_distance
    }

    /// Horizontal and vertical FOV in degrees, if a frame is available.
    pub fn field_of_view(&self) -> Option<(f32, f32)> {
        self.current_frame()
            .map(|frame| frame.settings().field_of_view_degrees())
    }

    pub fn set_clipping_planes(&self, near: f32, far: f32) {
        self.update_settings(|settings| {
            settings.near_clipping_plane = near;
            settings.far_clipping_plane = far;
            settings.flags.clipping_planes_override = true;
        });
    }

    pub fn set_world_to_meters_override(&self, world_to_meters: Option<f32>) {
        self.update_settings(|settings| match world_to_meters {
            Some(scale) => {
                settings.world_to_meters_scale = scale;
                settings.flags.world_to_meters_override = true;
            }
            None => settings.flags.world_to_meters_override = false,
        });
    }

    pub fn set_camera_scale_override(&self, scale: Option<Vec3>) {
        self.update_settings(|settings| match scale {
            Some(scale) => {
                settings.camera_scale = scale;
                settings.flags.camera_scale_override = true;
            }
            None => settings.flags.camera_scale_override = false,
        });
    }

    /// Zero clears the override; anything else is clamped to 30..=300.
    pub fn set_screen_percentage(&self, percentage: f32) {
        let mut state = self.state.lock();
        if percentage == 0.0 {
            state.settings.flags.override_screen_percentage = false;
        } else {
            state.settings.flags.override_screen_percentage = true;
            state.settings.screen_percentage = clamp_screen_percentage(percentage);
        }
        state.flags.need_update_stereo_rendering_params = true;
    }

    pub fn screen_percentage(&self) -> f32 {
        self.state.lock().settings.actual_screen_percentage()
    }

    pub fn set_base_rotation(&self, yaw_degrees: f32) {
        self.set_base_orientation(Quat::from_rotation_z(yaw_degrees.to_radians()));
    }

    pub fn set_base_orientation(&self, orientation: Quat) {
        self.update_settings(|settings| settings.base_orientation = orientation);
    }

    pub fn base_orientation(&self) -> Quat {
        self.state.lock().settings.base_orientation
    }

    pub fn set_base_offset_in_meters(&self, offset: Vec3) {
        self.update_settings(|settings| settings.base_offset = offset);
    }

    pub fn base_offset_in_meters(&self) -> Vec3 {
        self.state.lock().settings.base_offset
    }

    pub fn set_position_scale(&self, scale: Vec3) {
        self.update_settings(|settings| settings.position_scale = scale);
    }

    pub fn enable_positional_tracking(&self, enable: bool) -> bool {
        self.update_settings(|settings| settings.flags.hmd_pos_tracking = enable);
        self.is_positional_tracking_enabled()
    }

    pub fn is_positional_tracking_enabled(&self) -> bool {
        let enabled = match self.current_frame() {
            Some(frame) => frame.settings().flags.hmd_pos_tracking,
            None => self.state.lock().settings.flags.hmd_pos_tracking,
        };
        enabled && self.capabilities.position_tracking
    }

    pub fn enable_low_persistence_mode(&self, enable: bool) {
        self.update_settings(|settings| settings.flags.low_persistence = enable);
    }

    pub fn is_in_low_persistence_mode(&self) -> bool {
        self.current_frame()
            .map_or(false, |frame| frame.settings().flags.low_persistence)
    }

    pub fn is_chroma_ab_correction_enabled(&self) -> bool {
        self.current_frame()
            .map_or(false, |frame| frame.settings().flags.chroma_ab_correction)
    }

    pub fn is_head_tracking_allowed(&self) -> bool {
        self.current_frame().map_or(false, |frame| {
            frame.settings().is_stereo_enabled() || frame.settings().flags.head_tracking_enforced
        })
    }

    pub fn set_head_tracking_enforced(&self, enforced: bool) {
        self.update_settings(|settings| settings.flags.head_tracking_enforced = enforced);
    }

    // ---- Poses ----

    /// HMD pose for the current frame in engine space.
    pub fn get_current_orientation_and_position(&self) -> (Quat, Vec3) {
        match self.current_frame() {
            Some(frame) => frame.pose_to_orientation_and_position(&frame.head_pose()),
            None => (Quat::IDENTITY, Vec3::ZERO),
        }
    }

    /// Pose applied to the camera this frame; marks which parts were used.
    pub fn get_current_hmd_pose(&self, use_orientation: bool, use_position: bool) -> (Quat, Vec3) {
        let mut state = self.state.lock();
        let Some(frame) = state.frame.as_mut().filter(|frame| !frame.is_out_of_frame()) else {
            return (Quat::IDENTITY, Vec3::ZERO);
        };

        let (orientation, position) = frame.pose_to_orientation_and_position(&frame.head_pose());
        Arc::make_mut(frame).record_hmd_pose(
            use_orientation.then_some(orientation),
            use_position.then_some(position),
        );
        (orientation, position)
    }

    /// Player camera used to place world-locked layers this frame.
    pub fn set_player_camera(&self, orientation: Quat, location: Vec3) {
        let mut state = self.state.lock();
        if let Some(frame) = state.frame.as_mut().filter(|frame| !frame.is_out_of_frame()) {
            Arc::make_mut(frame).set_player_camera(orientation, location);
        }
    }

    pub fn reset_orientation_and_position(&self, yaw_degrees: f32) {
        self.runtime.recenter_tracking_origin();
        self.update_settings(|settings| {
            settings.base_orientation = Quat::from_rotation_z(yaw_degrees.to_radians());
            settings.base_offset = Vec3::ZERO;
        });
    }

    pub fn reset_orientation(&self, yaw_degrees: f32) {
        self.runtime.recenter_tracking_origin();
        self.set_base_rotation(yaw_degrees);
    }

    pub fn reset_position(&self) {
        self.runtime.recenter_tracking_origin();
        self.set_base_offset_in_meters(Vec3::ZERO);
    }

    // ---- Teardown ----

    /// Drop all frames and release every layer resource on the render thread.
    pub fn shutdown(&self, render_thread: &RenderThread) -> HmdResult<()> {
        {
            let mut state = self.state.lock();
            state.frame = None;
            state.render_frame = None;
            state.frame_state = FrameState::Idle;
        }

        let layers = Arc::clone(&self.layers);
        render_thread.enqueue(move || layers.shutdown())?;
        render_thread.flush()?;
        log::info!("[HMD] Shut down");
        Ok(())
    }
}
