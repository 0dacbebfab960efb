use std::sync::Arc;
use std::thread;

use glam::{Vec2, Vec3};
use parking_lot::Mutex;

use hmd_compositor::config::HmdConfig;
use hmd_compositor::frame::WorldContext;
use hmd_compositor::math::Transform;
use hmd_compositor::rhi::{next_texture_id, HeadlessDevice, TextureDesc, TextureFormat, TextureHandle};
use hmd_compositor::runtime::MockRuntime;
use hmd_compositor::{HeadMountedDisplay, PresentBridge, RenderThread, StereoLayerDesc, SubmitStatus};

fn setup() -> (Arc<MockRuntime>, HeadMountedDisplay, Arc<Mutex<PresentBridge>>, RenderThread) {
    let _ = env_logger::builder().is_test(true).try_init();
    let runtime = Arc::new(MockRuntime::new());
    let hmd = HeadMountedDisplay::new(runtime.clone(), &HmdConfig::default());
    let bridge = Arc::new(Mutex::new(PresentBridge::new(&hmd, Arc::new(HeadlessDevice::new()))));
    let render_thread = RenderThread::spawn("test-render").unwrap();
    assert!(hmd.enable_stereo(true));
    (runtime, hmd, bridge, render_thread)
}

/// One game tick plus the render-thread half, returning what was enqueued.
fn tick(
    hmd: &HeadMountedDisplay,
    bridge: &Arc<Mutex<PresentBridge>>,
    render_thread: &RenderThread,
    results: &Arc<Mutex<Vec<(u64, Option<SubmitStatus>)>>>,
) -> Option<u64> {
    let world = WorldContext::default();
    if !hmd.on_start_game_frame(&world) {
        return None;
    }
    hmd.on_end_game_frame(&world);
    let context = hmd.begin_render_view_family(true)?;
    let frame_number = context.frame_number();
    let size = context.frame().settings().texture_size();

    let bridge = Arc::clone(bridge);
    let results = Arc::clone(results);
    render_thread
        .enqueue(move || {
            let mut bridge = bridge.lock();
            bridge.allocate_render_target_texture(size.x, size.y, false);
            let target = bridge.current_render_target();
            bridge.begin_rendering(context, target);
            let status = bridge.finish_rendering();
            results.lock().push((frame_number, status));
        })
        .unwrap();
    Some(frame_number)
}

#[test]
fn test_frames_hand_off_in_order() {
    let (runtime, hmd, bridge, render_thread) = setup();
    let results = Arc::new(Mutex::new(Vec::new()));

    let mut enqueued = Vec::new();
    for _ in 0..10 {
        enqueued.extend(tick(&hmd, &bridge, &render_thread, &results));
    }
    render_thread.flush().unwrap();

    let results = results.lock();
    assert_eq!(results.len(), 10);
    let rendered: Vec<u64> = results.iter().map(|(number, _)| *number).collect();
    assert_eq!(rendered, enqueued);
    assert!(results
        .iter()
        .all(|(_, status)| *status == Some(SubmitStatus::Success)));

    let submitted: Vec<u64> = runtime.submissions().iter().map(|frame| frame.frame_number).collect();
    assert_eq!(submitted, enqueued);
    assert!(!bridge.lock().is_frame_begun());
}

#[test]
fn test_flush_from_several_threads() {
    let render_thread = Arc::new(RenderThread::spawn("test-render").unwrap());
    let log = Arc::new(Mutex::new(Vec::new()));

    let producers: Vec<_> = (0..4)
        .map(|producer| {
            let render_thread = Arc::clone(&render_thread);
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for i in 0..25 {
                    let log = Arc::clone(&log);
                    render_thread.enqueue(move || log.lock().push((producer, i))).unwrap();
                }
                render_thread.flush().unwrap();
                // Everything this producer queued has run
                let seen = log.lock().iter().filter(|(p, _)| *p == producer).count();
                assert_eq!(seen, 25);
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let log = log.lock();
    assert_eq!(log.len(), 100);
    for producer in 0..4 {
        let order: Vec<i32> = log.iter().filter(|(p, _)| *p == producer).map(|(_, i)| *i).collect();
        assert_eq!(order, (0..25).collect::<Vec<_>>());
    }
}

#[test]
fn test_reset_and_flush_drops_in_flight_frame() {
    let (_, hmd, bridge, render_thread) = setup();
    let world = WorldContext::default();
    hmd.on_start_game_frame(&world);
    hmd.on_end_game_frame(&world);
    let context = hmd.begin_render_view_family(true).unwrap();
    {
        let mut bridge = bridge.lock();
        bridge.allocate_render_target_texture(256, 256, false);
        let target = bridge.current_render_target();
        assert!(bridge.begin_rendering(context, target));
    }

    PresentBridge::reset_and_flush(&bridge, &render_thread).unwrap();
    assert!(!bridge.lock().is_frame_begun());
    assert!(bridge.lock().render_context().is_none());
}

#[test]
fn test_shutdown_releases_every_swap_texture() {
    let (runtime, hmd, bridge, render_thread) = setup();
    let results = Arc::new(Mutex::new(Vec::new()));

    let panel = TextureHandle::new(next_texture_id(), &TextureDesc::new(128, 128, TextureFormat::Rgba8));
    hmd.create_layer(&StereoLayerDesc::new(
        panel,
        Transform::from_translation(Vec3::new(150.0, 0.0, 0.0)),
        Vec2::splat(50.0),
    ))
    .unwrap();

    for _ in 0..3 {
        tick(&hmd, &bridge, &render_thread, &results);
    }
    render_thread.flush().unwrap();
    assert!(runtime.live_texture_count() > 0);

    let release_bridge = Arc::clone(&bridge);
    render_thread
        .enqueue(move || release_bridge.lock().release_resources())
        .unwrap();
    hmd.shutdown(&render_thread).unwrap();

    assert_eq!(runtime.live_texture_count(), 0);
    assert_eq!(hmd.layer_manager().total_layers(), 0);
    assert_eq!(hmd.layer_manager().render_layer_count(), 0);
}
