use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Quat, Vec3};

use crate::config::HmdSettings;
use crate::constants::frame::FIRST_FRAME_NUMBER;
use crate::math::{Pose, Transform};

/// Per-frame state bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags {
    /// The game thread is done with this frame
    pub out_of_frame: bool,
    /// Game code applied HMD orientation to the camera this frame
    pub orientation_changed: bool,
    /// Game code applied HMD position to the camera this frame
    pub position_changed: bool,
    pub have_vision_tracking: bool,
}

/// Monotonic frame number source shared by every world driving the HMD.
#[derive(Debug)]
pub struct FrameCounter(AtomicU64);

impl FrameCounter {
    pub fn new() -> Self {
        Self(AtomicU64::new(FIRST_FRAME_NUMBER))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Bump and return the new value.
    pub fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of one game tick: settings, poses and scale.
///
/// Mutable only while the game thread is inside the frame. Once marked out
/// of frame it is published to the render thread and never written again.
#[derive(Debug, Clone)]
pub struct GameFrame {
    frame_number: u64,
    settings: HmdSettings,
    /// Metres, tracking space
    head_pose: Pose,
    eye_render_poses: [Pose; 2],
    world_to_meters: f32,
    camera_scale: Vec3,
    player_location: Vec3,
    player_orientation: Quat,
    last_hmd_orientation: Quat,
    last_hmd_position: Vec3,
    flags: FrameFlags,
}

impl GameFrame {
    pub fn new(frame_number: u64, settings: HmdSettings) -> Self {
        Self {
            frame_number,
            world_to_meters: settings.world_to_meters_scale,
            camera_scale: Vec3::ONE,
            settings,
            head_pose: Pose::IDENTITY,
            eye_render_poses: [Pose::IDENTITY; 2],
            player_location: Vec3::ZERO,
            player_orientation: Quat::IDENTITY,
            last_hmd_orientation: Quat::IDENTITY,
            last_hmd_position: Vec3::ZERO,
            flags: FrameFlags::default(),
        }
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn settings(&self) -> &HmdSettings {
        &self.settings
    }

    pub fn head_pose(&self) -> Pose {
        self.head_pose
    }

    pub fn eye_render_poses(&self) -> [Pose; 2] {
        self.eye_render_poses
    }

    pub fn world_to_meters(&self) -> f32 {
        self.world_to_meters
    }

    pub fn camera_scale(&self) -> Vec3 {
        self.camera_scale
    }

    pub fn player_transform(&self) -> Transform {
        Transform::from_rotation_translation(self.player_orientation, self.player_location)
    }

    pub fn last_hmd_orientation(&self) -> Quat {
        self.last_hmd_orientation
    }

    pub fn last_hmd_position(&self) -> Vec3 {
        self.last_hmd_position
    }

    pub fn flags(&self) -> FrameFlags {
        self.flags
    }

    pub fn is_out_of_frame(&self) -> bool {
        self.flags.out_of_frame
    }

    /// Map a tracking-space pose to engine orientation and position.
    pub fn pose_to_orientation_and_position(&self, pose: &Pose) -> (Quat, Vec3) {
        let settings = &self.settings;
        let orientation = settings.base_orientation * pose.orientation;

        let position = if settings.flags.hmd_pos_tracking {
            let tracked = settings.base_orientation * (pose.position - settings.base_offset);
            tracked * self.world_to_meters * settings.position_scale + settings.position_offset
        } else {
            settings.position_offset
        };

        (orientation, position)
    }

    pub(crate) fn set_world_to_meters(&mut self, world_to_meters: f32) {
        self.world_to_meters = world_to_meters;
    }

    pub(crate) fn set_camera_scale(&mut self, camera_scale: Vec3) {
        self.camera_scale = camera_scale;
    }

    pub(crate) fn set_poses(&mut self, head_pose: Pose, eye_render_poses: [Pose; 2]) {
        self.head_pose = head_pose;
        self.eye_render_poses = eye_render_poses;
    }

    pub(crate) fn set_player_camera(&mut self, orientation: Quat, location: Vec3) {
        self.player_orientation = orientation;
        self.player_location = location;
    }

    pub(crate) fn record_hmd_pose(&mut self, orientation: Option<Quat>, position: Option<Vec3>) {
        if let Some(orientation) = orientation {
            self.last_hmd_orientation = orientation;
            self.flags.orientation_changed = true;
        }
        if let Some(position) = position {
            self.last_hmd_position = position;
            self.flags.position_changed = true;
        }
    }

    pub(crate) fn set_vision_tracking(&mut self, tracked: bool) {
        self.flags.have_vision_tracking = tracked;
    }

    pub(crate) fn mark_out_of_frame(&mut self) {
        self.flags.out_of_frame = true;
    }
}
