use std::sync::Arc;

use glam::{Quat, Vec2, Vec3};
use hmd_compositor::config::HmdConfig;
use hmd_compositor::frame::{RenderContext, WorldContext};
use hmd_compositor::math::{Pose, Transform};
use hmd_compositor::rhi::{next_texture_id, HeadlessDevice, TextureDesc, TextureFormat, TextureHandle};
use hmd_compositor::runtime::mock::SwapTextureEvent;
use hmd_compositor::runtime::{LayerContent, MockRuntime, SubmitStatus};
use hmd_compositor::{HeadMountedDisplay, LayerKind, PresentBridge, StereoLayerDesc};

struct Harness {
    runtime: Arc<MockRuntime>,
    device: Arc<HeadlessDevice>,
    hmd: HeadMountedDisplay,
    bridge: PresentBridge,
}

impl Harness {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let runtime = Arc::new(MockRuntime::new());
        let device = Arc::new(HeadlessDevice::new());
        let hmd = HeadMountedDisplay::new(runtime.clone(), &HmdConfig::default());
        let bridge = PresentBridge::new(&hmd, device.clone());
        assert!(hmd.enable_stereo(true));
        Self {
            runtime,
            device,
            hmd,
            bridge,
        }
    }

    fn publish(&self) -> RenderContext {
        let world = WorldContext::default();
        assert!(self.hmd.on_start_game_frame(&world));
        assert!(self.hmd.on_end_game_frame(&world));
        self.hmd.begin_render_view_family(true).unwrap()
    }

    fn allocate_eye_buffer(&mut self) {
        let size = self.hmd.settings().texture_size();
        assert!(self.bridge.allocate_render_target_texture(size.x, size.y, false));
    }

    fn render(&mut self, context: RenderContext) -> Option<SubmitStatus> {
        let target = self.bridge.current_render_target();
        self.bridge.begin_rendering(context, target);
        self.bridge.finish_rendering()
    }
}

fn position_of(events: &[SwapTextureEvent], wanted: &SwapTextureEvent) -> usize {
    events.iter().position(|event| event == wanted).unwrap()
}

#[test]
fn test_display_lost_forces_reallocation() {
    let mut h = Harness::new();
    h.allocate_eye_buffer();
    let old = h.bridge.eye_texture_set().unwrap().clone();
    let old_textures = old.textures().to_vec();

    h.runtime.push_submit_result(SubmitStatus::DisplayLost);
    let context = h.publish();
    assert_eq!(h.render(context), Some(SubmitStatus::DisplayLost));

    let status = h.hmd.device_status().clone();
    assert!(status.needs_to_kill_hmd());
    assert!(status.needs_texture_reallocation());
    assert!(!h.hmd.is_stereo_enabled());

    // Same size and quality, but the flag forces a fresh ring
    h.allocate_eye_buffer();
    let new = h.bridge.eye_texture_set().unwrap().clone();
    assert_ne!(new, old);
    assert!(old.is_released());
    assert!(!status.needs_texture_reallocation());

    let events = h.runtime.events();
    let first_new = position_of(&events, &SwapTextureEvent::Allocated(new.textures()[0]));
    for texture in &old_textures {
        assert!(position_of(&events, &SwapTextureEvent::Released(*texture)) < first_new);
        assert_eq!(h.runtime.release_count(*texture), 1);
    }
}

#[test]
fn test_device_lost_blocks_stereo_until_reinitialised() {
    let mut h = Harness::new();
    h.allocate_eye_buffer();
    h.runtime.push_submit_result(SubmitStatus::NoHmd);
    let context = h.publish();
    h.render(context);

    let world = WorldContext::default();
    assert!(!h.hmd.on_start_game_frame(&world));
    assert!(!h.hmd.settings().flags.stereo_enabled);

    h.hmd.reinitialize_device();
    assert!(h.hmd.on_start_game_frame(&world));
    assert!(h.hmd.on_end_game_frame(&world));
    h.allocate_eye_buffer();
    let context = h.hmd.begin_render_view_family(true).unwrap();
    assert_eq!(h.render(context), Some(SubmitStatus::Success));
}

#[test]
fn test_other_submit_errors_are_not_fatal() {
    let mut h = Harness::new();
    h.allocate_eye_buffer();
    h.runtime
        .push_submit_result(SubmitStatus::Error("compositor busy".to_string()));
    let context = h.publish();

    assert_eq!(h.render(context), Some(SubmitStatus::Error("compositor busy".to_string())));
    assert!(!h.hmd.device_status().needs_to_kill_hmd());
    assert_eq!(h.bridge.stats().frames_dropped(), 1);
}

#[test]
fn test_finish_without_begin_skips_frame() {
    let mut h = Harness::new();
    h.allocate_eye_buffer();

    assert_eq!(h.bridge.finish_rendering(), None);
    assert_eq!(h.bridge.stats().frames_dropped(), 1);
    assert!(h.runtime.submissions().is_empty());

    // Not begun because no render target was supplied
    let context = h.publish();
    assert!(!h.bridge.begin_rendering(context, None));
    assert_eq!(h.bridge.finish_rendering(), None);
    assert!(h.bridge.render_context().is_none());
    assert!(h.runtime.submissions().is_empty());
}

#[test]
fn test_second_begin_is_refused() {
    let mut h = Harness::new();
    h.allocate_eye_buffer();
    let first = h.publish();
    let second = h.publish();
    let first_number = first.frame_number();
    let target = h.bridge.current_render_target();

    assert!(h.bridge.begin_rendering(first, target));
    assert!(!h.bridge.begin_rendering(second, target));
    assert_eq!(h.bridge.render_context().unwrap().frame_number(), first_number);

    assert_eq!(h.bridge.finish_rendering(), Some(SubmitStatus::Success));
    assert!(!h.bridge.is_frame_begun());
    assert_eq!(h.runtime.last_submission().unwrap().frame_number, first_number);
}

#[test]
fn test_begin_records_predicted_display_time() {
    let mut h = Harness::new();
    h.allocate_eye_buffer();
    let context = h.publish();
    let number = context.frame_number();
    let target = h.bridge.current_render_target();

    assert!(h.bridge.begin_rendering(context, target));
    let expected = {
        use hmd_compositor::VrRuntime;
        h.runtime.predicted_display_time(number)
    };
    assert_eq!(h.bridge.render_context().unwrap().predicted_display_time(), expected);
    assert_eq!(h.bridge.stats().last_predicted_display_time(), expected);
}

#[test]
fn test_pose_source_selection() {
    let game_pose = Pose::new(Quat::from_rotation_z(0.1), Vec3::new(0.0, 0.0, 1.0));
    let late_pose = Pose::new(Quat::from_rotation_z(0.4), Vec3::new(0.0, 0.0, 1.2));

    let mut h = Harness::new();
    h.allocate_eye_buffer();
    h.hmd.exec("HMD UPDATEONRT OFF").unwrap();
    let world = WorldContext::default();

    // Game thread applied the pose to the camera: keep it
    h.runtime.set_head_pose(game_pose);
    h.hmd.on_start_game_frame(&world);
    h.hmd.get_current_hmd_pose(true, true);
    h.hmd.on_end_game_frame(&world);
    let context = h.hmd.begin_render_view_family(true).unwrap();
    h.runtime.set_head_pose(late_pose);
    let target = h.bridge.current_render_target();
    h.bridge.begin_rendering(context, target);
    assert_eq!(h.bridge.render_context().unwrap().head_pose(), game_pose);
    h.bridge.finish_rendering();

    // Pose never used by the game: sample fresh
    h.runtime.set_head_pose(game_pose);
    h.hmd.on_start_game_frame(&world);
    h.hmd.on_end_game_frame(&world);
    let context = h.hmd.begin_render_view_family(true).unwrap();
    h.runtime.set_head_pose(late_pose);
    h.bridge.begin_rendering(context, target);
    assert_eq!(h.bridge.render_context().unwrap().head_pose(), late_pose);
    h.bridge.finish_rendering();

    // Update on render thread always samples fresh
    h.hmd.exec("HMD UPDATEONRT ON").unwrap();
    h.runtime.set_head_pose(game_pose);
    h.hmd.on_start_game_frame(&world);
    h.hmd.get_current_hmd_pose(true, true);
    h.hmd.on_end_game_frame(&world);
    let context = h.hmd.begin_render_view_family(true).unwrap();
    h.runtime.set_head_pose(late_pose);
    h.bridge.begin_rendering(context, target);
    assert_eq!(h.bridge.render_context().unwrap().head_pose(), late_pose);
    h.bridge.finish_rendering();
}

#[test]
fn test_quad_layer_is_copied_and_composed() {
    let mut h = Harness::new();
    h.allocate_eye_buffer();
    let panel = TextureHandle::new(next_texture_id(), &TextureDesc::new(256, 128, TextureFormat::Rgba8));
    let id = h
        .hmd
        .create_layer(&StereoLayerDesc::new(
            panel,
            Transform::from_translation(Vec3::new(200.0, 0.0, 0.0)),
            Vec2::new(100.0, 50.0),
        ))
        .unwrap();

    let context = h.publish();
    assert_eq!(h.render(context), Some(SubmitStatus::Success));
    assert_eq!(h.device.copy_count(), 1);

    let submitted = h.runtime.last_submission().unwrap();
    assert_eq!(submitted.layers.len(), 2);
    assert_eq!(submitted.layers[0].id, h.hmd.eye_layer_id());
    assert!(matches!(submitted.layers[0].content, LayerContent::Eye { .. }));
    assert_eq!(submitted.layers[1].id, id);
    match &submitted.layers[1].content {
        LayerContent::Quad { size, .. } => assert!(size.abs_diff_eq(Vec2::new(1.0, 0.5), 1.0e-5)),
        other => panic!("expected a quad layer, got {other:?}"),
    }

    // No change: no copy
    let context = h.publish();
    h.render(context);
    assert_eq!(h.device.copy_count(), 1);

    assert!(h.hmd.mark_texture_for_update(id));
    let context = h.publish();
    h.render(context);
    assert_eq!(h.device.copy_count(), 2);
}

#[test]
fn test_hidden_eye_layer_is_not_submitted() {
    let mut h = Harness::new();
    h.allocate_eye_buffer();
    let world = WorldContext::default();
    h.hmd.on_start_game_frame(&world);
    h.hmd.on_end_game_frame(&world);
    let context = h.hmd.begin_render_view_family(false).unwrap();

    assert_eq!(h.render(context), Some(SubmitStatus::Success));
    let submitted = h.runtime.last_submission().unwrap();
    assert!(submitted
        .layers
        .iter()
        .all(|layer| layer.id.kind() != Some(LayerKind::Eye)));
}

#[test]
fn test_eye_ring_advances_per_submitted_frame() {
    let mut h = Harness::new();
    h.allocate_eye_buffer();
    let mut seen = Vec::new();
    for _ in 0..4 {
        let context = h.publish();
        h.render(context);
        seen.push(h.runtime.last_submission().unwrap().layers[0].texture);
    }
    let ring = h.bridge.eye_texture_set().unwrap().textures().to_vec();
    assert_eq!(seen, vec![ring[0], ring[1], ring[2], ring[0]]);
}

#[test]
fn test_bridge_refers_to_the_eye_layer_ring() {
    let mut h = Harness::new();
    h.allocate_eye_buffer();
    let context = h.publish();
    assert_eq!(h.render(context), Some(SubmitStatus::Success));

    let manager = Arc::clone(h.hmd.layer_manager());
    let eye_id = h.hmd.eye_layer_id();
    let ring = h.bridge.eye_texture_set().unwrap().clone();
    assert!(manager.layer_desc(eye_id).unwrap().texture_set().is_none());
    manager.with_render_layers(|layers| {
        let eye = layers.iter().find(|layer| layer.id() == eye_id).unwrap();
        assert_eq!(eye.texture_set(), Some(&ring));
    });
    assert_eq!(h.runtime.live_texture_count(), ring.len());

    // A quality change swaps the ring the layer owns
    let size = h.hmd.settings().texture_size();
    assert!(h.bridge.allocate_render_target_texture(size.x, size.y, true));
    let context = h.publish();
    assert_eq!(h.render(context), Some(SubmitStatus::Success));

    let replacement = h.bridge.eye_texture_set().unwrap().clone();
    assert!(ring.is_released());
    assert!(replacement.is_high_quality());
    manager.with_render_layers(|layers| {
        let eye = layers.iter().find(|layer| layer.id() == eye_id).unwrap();
        assert!(eye.is_fully_setup());
        assert_eq!(eye.texture_set(), Some(&replacement));
    });
    assert_eq!(h.runtime.live_texture_count(), replacement.len());
}
