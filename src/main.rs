/// Headless HMD compositor demo
/// Drives a mock headset through a few hundred frames: game thread ticks,
/// render thread submits, with a world-locked quad layer and some console
/// commands along the way. Pass a TOML or JSON config path to override defaults.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use glam::{Quat, Vec2, Vec3};
use parking_lot::Mutex;

use hmd_compositor::rhi::HeadlessDevice;
use hmd_compositor::runtime::MockRuntime;
use hmd_compositor::{
    HeadMountedDisplay, HmdConfig, PresentBridge, RenderThread, StereoLayerDesc, TextureDesc, TextureFormat,
    TextureHandle, Transform, WorldContext,
};

const DEMO_FRAMES: u64 = 240;

fn load_config() -> Result<HmdConfig> {
    match std::env::args().nth(1) {
        Some(path) => HmdConfig::load(Path::new(&path)).with_context(|| format!("loading config from {}", path)),
        None => Ok(HmdConfig::default()),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    let runtime = Arc::new(MockRuntime::new());
    let hmd = HeadMountedDisplay::new(runtime.clone(), &config);
    let bridge = Arc::new(Mutex::new(PresentBridge::new(&hmd, Arc::new(HeadlessDevice::new()))));
    let render_thread = RenderThread::spawn("hmd-render")?;

    hmd.exec("STEREO ON");
    if let Some(version) = hmd.exec("HMDVERSION") {
        log::info!("{}", version);
    }

    // A hud panel two metres in front of the player
    let panel = TextureHandle::new(
        hmd_compositor::rhi::next_texture_id(),
        &TextureDesc::new(1280, 720, TextureFormat::Rgba8Srgb),
    );
    let mut panel_desc = StereoLayerDesc::new(
        panel,
        Transform::from_translation(Vec3::new(200.0, 0.0, 0.0)),
        Vec2::new(160.0, 0.0),
    );
    panel_desc.preserve_texture_ratio = true;
    let panel_id = hmd.create_layer(&panel_desc);

    let world = WorldContext::default();
    for tick in 0..DEMO_FRAMES {
        if tick == DEMO_FRAMES / 2 {
            if let Some(message) = hmd.exec("HMD SP 130") {
                log::info!("{}", message);
            }
        }

        if !hmd.on_start_game_frame(&world) {
            continue;
        }
        hmd.get_current_hmd_pose(true, true);
        hmd.set_player_camera(Quat::IDENTITY, Vec3::ZERO);

        if let Some(id) = panel_id {
            if tick % 60 == 0 {
                hmd.mark_texture_for_update(id);
            }
        }
        hmd.on_end_game_frame(&world);

        let Some(context) = hmd.begin_render_view_family(true) else {
            continue;
        };
        let eye_size = context.frame().settings().texture_size();
        let bridge = Arc::clone(&bridge);
        render_thread.enqueue(move || {
            let mut bridge = bridge.lock();
            bridge.allocate_render_target_texture(eye_size.x, eye_size.y, false);
            let target = bridge.current_render_target();
            bridge.begin_rendering(context, target);
            bridge.finish_rendering();
        })?;
    }
    render_thread.flush()?;

    {
        let bridge = bridge.lock();
        let stats = bridge.stats();
        log::info!(
            "Submitted {} frames, dropped {}, average {:.3} ms",
            stats.frames_submitted(),
            stats.frames_dropped(),
            stats.average_frame_time().as_secs_f64() * 1000.0
        );
    }
    if let Some(last) = runtime.last_submission() {
        log::info!("Last frame {} carried {} layers", last.frame_number, last.layers.len());
    }

    PresentBridge::reset_and_flush(&bridge, &render_thread)?;
    let release_bridge = Arc::clone(&bridge);
    render_thread.enqueue(move || release_bridge.lock().release_resources())?;
    hmd.shutdown(&render_thread)?;
    log::info!("{} swap textures still live", runtime.live_texture_count());
    Ok(())
}
