use std::sync::Arc;

use super::GameFrame;
use crate::math::{Pose, ViewRect};

/// Render-thread view of one published frame.
///
/// Built on the game thread when the view family begins rendering, then
/// moved to the render thread, which owns it until `finish_rendering`.
#[derive(Debug, Clone)]
pub struct RenderContext {
    frame: Arc<GameFrame>,
    show_flags_rendering: bool,
    frame_begun: bool,
    predicted_display_time: f64,
    head_pose: Pose,
    eye_render_poses: [Pose; 2],
    eye_viewports: [ViewRect; 2],
}

impl RenderContext {
    pub fn new(frame: Arc<GameFrame>, show_flags_rendering: bool) -> Self {
        let head_pose = frame.head_pose();
        let eye_render_poses = frame.eye_render_poses();
        let eye_viewports = frame.settings().eye_render_viewport;
        Self {
            frame,
            show_flags_rendering,
            frame_begun: false,
            predicted_display_time: 0.0,
            head_pose,
            eye_render_poses,
            eye_viewports,
        }
    }

    pub fn frame(&self) -> &GameFrame {
        &self.frame
    }

    pub fn frame_number(&self) -> u64 {
        self.frame.frame_number()
    }

    pub fn show_flags_rendering(&self) -> bool {
        self.show_flags_rendering
    }

    pub fn is_frame_begun(&self) -> bool {
        self.frame_begun
    }

    pub fn predicted_display_time(&self) -> f64 {
        self.predicted_display_time
    }

    pub fn head_pose(&self) -> Pose {
        self.head_pose
    }

    pub fn eye_render_poses(&self) -> [Pose; 2] {
        self.eye_render_poses
    }

    pub fn eye_viewports(&self) -> [ViewRect; 2] {
        self.eye_viewports
    }

    pub(crate) fn begin(&mut self, predicted_display_time: f64) {
        self.predicted_display_time = predicted_display_time;
        self.frame_begun = true;
    }

    pub(crate) fn set_poses(&mut self, head_pose: Pose, eye_render_poses: [Pose; 2]) {
        self.head_pose = head_pose;
        self.eye_render_poses = eye_render_poses;
    }

    pub(crate) fn set_eye_viewports(&mut self, viewports: [ViewRect; 2]) {
        self.eye_viewports = viewports;
    }
}
