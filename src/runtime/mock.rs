use std::collections::{HashSet, VecDeque};

use glam::{Quat, Vec3};
use parking_lot::Mutex;

use super::{CompositionLayer, RuntimeCapabilities, SubmitStatus, TrackingState, VrRuntime};
use crate::constants::settings::DEFAULT_IPD;
use crate::error::{HmdError, HmdResult};
use crate::math::Pose;
use crate::rhi::{next_texture_id, TextureDesc, TextureHandle};

const MOCK_REFRESH_RATE: f64 = 90.0;

/// Swap texture traffic recorded by the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapTextureEvent {
    Allocated(TextureHandle),
    Released(TextureHandle),
    Committed(TextureHandle),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedFrame {
    pub frame_number: u64,
    pub layers: Vec<CompositionLayer>,
}

struct MockState {
    connected: bool,
    active: bool,
    position_tracked: bool,
    head_pose: Option<Pose>,
    scripted_results: VecDeque<SubmitStatus>,
    fail_allocations: bool,
    submissions: Vec<SubmittedFrame>,
    events: Vec<SwapTextureEvent>,
    live_textures: HashSet<u64>,
    recenter_count: u32,
}

/// In-process runtime standing in for a real headset.
///
/// Simulates a connected, focused HMD whose head slowly yaws. Tests script
/// submit results and inspect every allocation, release and submission.
pub struct MockRuntime {
    capabilities: RuntimeCapabilities,
    state: Mutex<MockState>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::with_capabilities(RuntimeCapabilities {
            product_name: "Mock HMD".to_string(),
            runtime_version: "mock-1.0".to_string(),
            ..RuntimeCapabilities::default()
        })
    }

    pub fn with_capabilities(capabilities: RuntimeCapabilities) -> Self {
        Self {
            capabilities,
            state: Mutex::new(MockState {
                connected: true,
                active: true,
                position_tracked: true,
                head_pose: None,
                scripted_results: VecDeque::new(),
                fail_allocations: false,
                submissions: Vec::new(),
                events: Vec::new(),
                live_textures: HashSet::new(),
                recenter_count: 0,
            }),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }

    pub fn set_active(&self, active: bool) {
        self.state.lock().active = active;
    }

    pub fn set_position_tracked(&self, tracked: bool) {
        self.state.lock().position_tracked = tracked;
    }

    /// Pin the head pose instead of animating it.
    pub fn set_head_pose(&self, pose: Pose) {
        self.state.lock().head_pose = Some(pose);
    }

    /// Queue the result of an upcoming `submit_frame`.
    pub fn push_submit_result(&self, status: SubmitStatus) {
        self.state.lock().scripted_results.push_back(status);
    }

    pub fn set_fail_allocations(&self, fail: bool) {
        self.state.lock().fail_allocations = fail;
    }

    pub fn submissions(&self) -> Vec<SubmittedFrame> {
        self.state.lock().submissions.clone()
    }

    pub fn last_submission(&self) -> Option<SubmittedFrame> {
        self.state.lock().submissions.last().cloned()
    }

    pub fn events(&self) -> Vec<SwapTextureEvent> {
        self.state.lock().events.clone()
    }

    /// How many times `texture` was handed back.
    pub fn release_count(&self, texture: TextureHandle) -> usize {
        self.state
            .lock()
            .events
            .iter()
            .filter(|event| **event == SwapTextureEvent::Released(texture))
            .count()
    }

    pub fn live_texture_count(&self) -> usize {
        self.state.lock().live_textures.len()
    }

    pub fn recenter_count(&self) -> u32 {
        self.state.lock().recenter_count
    }

    fn animated_head_pose(frame_number: u64) -> Pose {
        let yaw = (frame_number as f32 * 0.01).sin() * 0.5;
        Pose::new(Quat::from_rotation_z(yaw), Vec3::new(0.0, 0.0, 0.05 * yaw))
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl VrRuntime for MockRuntime {
    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn is_active(&self) -> bool {
        let state = self.state.lock();
        state.connected && state.active
    }

    fn capabilities(&self) -> RuntimeCapabilities {
        self.capabilities.clone()
    }

    fn predicted_display_time(&self, frame_number: u64) -> f64 {
        (frame_number + 1) as f64 / MOCK_REFRESH_RATE
    }

    fn tracking_state(&self, frame_number: u64) -> TrackingState {
        let state = self.state.lock();
        let head_pose = state
            .head_pose
            .unwrap_or_else(|| Self::animated_head_pose(frame_number));

        let half_ipd = head_pose.orientation * Vec3::new(0.0, DEFAULT_IPD * 0.5, 0.0);
        let eye_poses = [
            Pose::new(head_pose.orientation, head_pose.position - half_ipd),
            Pose::new(head_pose.orientation, head_pose.position + half_ipd),
        ];

        TrackingState {
            head_pose,
            eye_poses,
            orientation_tracked: state.connected,
            position_tracked: state.connected && state.position_tracked,
        }
    }

    fn submit_frame(&self, frame_number: u64, layers: &[CompositionLayer]) -> SubmitStatus {
        let mut state = self.state.lock();
        if !state.connected {
            return SubmitStatus::NoHmd;
        }

        let status = state.scripted_results.pop_front().unwrap_or(SubmitStatus::Success);
        if status == SubmitStatus::Success {
            state.submissions.push(SubmittedFrame {
                frame_number,
                layers: layers.to_vec(),
            });
        }
        status
    }

    fn allocate_swap_texture(&self, desc: &TextureDesc) -> HmdResult<TextureHandle> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(HmdError::NoHmd);
        }
        if state.fail_allocations {
            return Err(HmdError::TextureAllocationFailed {
                width: desc.width,
                height: desc.height,
                reason: "mock runtime refused allocation".to_string(),
            });
        }

        let texture = TextureHandle::new(next_texture_id(), desc);
        state.live_textures.insert(texture.id());
        state.events.push(SwapTextureEvent::Allocated(texture));
        Ok(texture)
    }

    fn release_swap_texture(&self, texture: TextureHandle) {
        let mut state = self.state.lock();
        state.live_textures.remove(&texture.id());
        state.events.push(SwapTextureEvent::Released(texture));
    }

    fn commit_swap_texture(&self, texture: TextureHandle) -> HmdResult<()> {
        let mut state = self.state.lock();
        if !state.live_textures.contains(&texture.id()) {
            return Err(HmdError::SystemError {
                component: "mock_runtime".to_string(),
                error: format!("commit of unknown swap texture {}", texture.id()),
            });
        }
        state.events.push(SwapTextureEvent::Committed(texture));
        Ok(())
    }

    fn recenter_tracking_origin(&self) {
        self.state.lock().recenter_count += 1;
    }
}
