/// Present bridge
///
/// Render-thread side of the frame handoff. `begin_rendering` takes
/// ownership of a published frame and fixes its poses; `finish_rendering`
/// reconciles the layer list, submits it to the runtime and always lets the
/// frame go. Device loss reported by the runtime is written back to the
/// shared `DeviceStatus` for the game thread to pick up.

use std::sync::Arc;

use parking_lot::Mutex;

use super::error::PresentResult;
use super::frame_stats::FrameStats;
use super::render_thread::RenderThread;
use crate::config::PresentConfig;
use crate::frame::RenderContext;
use crate::hmd::{DeviceStatus, HeadMountedDisplay};
use crate::layers::{LayerId, LayerManager, TextureSetDesc, TextureSetProxy};
use crate::rhi::{RenderDevice, TextureDesc, TextureHandle};
use crate::runtime::{SubmitStatus, VrRuntime};

pub struct PresentBridge {
    runtime: Arc<dyn VrRuntime>,
    device: Arc<dyn RenderDevice>,
    layers: Arc<LayerManager>,
    status: Arc<DeviceStatus>,
    eye_layer_id: LayerId,
    config: PresentConfig,
    /// Owned from `begin_rendering` until `finish_rendering`
    context: Option<RenderContext>,
    /// Non-owning reference to the ring the eye render layer owns once
    /// reconciled. Used for size and quality checks, and to release the ring
    /// before its replacement is allocated.
    eye_texture_set: Option<TextureSetProxy>,
    stats: FrameStats,
}

impl PresentBridge {
    pub fn new(hmd: &HeadMountedDisplay, device: Arc<dyn RenderDevice>) -> Self {
        let config = hmd.present_config().clone();
        Self {
            runtime: Arc::clone(hmd.runtime()),
            device,
            layers: Arc::clone(hmd.layer_manager()),
            status: Arc::clone(hmd.device_status()),
            eye_layer_id: hmd.eye_layer_id(),
            stats: FrameStats::new(config.frame_stats_window),
            config,
            context: None,
            eye_texture_set: None,
        }
    }

    pub fn is_frame_begun(&self) -> bool {
        self.context.as_ref().map_or(false, RenderContext::is_frame_begun)
    }

    pub fn render_context(&self) -> Option<&RenderContext> {
        self.context.as_ref()
    }

    /// Same ring as the eye layer's, not a second allocation.
    pub fn eye_texture_set(&self) -> Option<&TextureSetProxy> {
        self.eye_texture_set.as_ref()
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Take ownership of `context` and start the frame.
    ///
    /// Returns false, and leaves the frame unbegun, when stereo is off for
    /// this frame, no render target is bound or the device needs a reset.
    pub fn begin_rendering(&mut self, mut context: RenderContext, render_target: Option<TextureHandle>) -> bool {
        if self.is_frame_begun() {
            log::warn!(
                "[PresentBridge] Frame {} already begun, ignoring frame {}",
                self.context.as_ref().map_or(0, RenderContext::frame_number),
                context.frame_number()
            );
            return false;
        }

        let frame_number = context.frame_number();
        let settings = context.frame().settings();
        let stereo_enabled = settings.is_stereo_enabled();
        let update_on_rt = settings.flags.update_on_rt;
        let eye_viewports = settings.eye_render_viewport;
        let flags = context.frame().flags();

        if !stereo_enabled || render_target.is_none() || self.status.needs_to_kill_hmd() {
            log::debug!(
                "[PresentBridge] Not rendering frame {} (stereo {}, target {})",
                frame_number,
                stereo_enabled,
                render_target.is_some()
            );
            self.context = Some(context);
            return false;
        }

        let predicted_display_time = self.runtime.predicted_display_time(frame_number);

        // Poses the game thread already applied to the camera must be kept
        if update_on_rt || !(flags.orientation_changed || flags.position_changed) {
            let tracking = self.runtime.tracking_state(frame_number);
            context.set_poses(tracking.head_pose, tracking.eye_poses);
        }
        context.set_eye_viewports(eye_viewports);
        context.begin(predicted_display_time);

        self.stats.begin_frame(predicted_display_time);
        self.context = Some(context);
        true
    }

    /// Submit the owned frame, if it was begun, and release it.
    pub fn finish_rendering(&mut self) -> Option<SubmitStatus> {
        let Some(context) = self.context.take() else {
            log::warn!("[PresentBridge] Skipping frame: no render frame owned");
            self.stats.record_dropped();
            return None;
        };
        if !context.is_frame_begun() {
            log::warn!("[PresentBridge] Skipping frame {}: rendering never began", context.frame_number());
            self.stats.record_dropped();
            return None;
        }

        self.layers
            .pre_submit_update(context.frame(), context.show_flags_rendering());
        self.layers.update_textures(self.device.as_ref());
        let status = self
            .layers
            .submit_frame(self.runtime.as_ref(), self.device.as_ref(), &context);

        if let Err(e) = status.to_result() {
            if status.is_device_lost() {
                log::warn!(
                    "[PresentBridge] Frame {} submit failed: {}, HMD needs reinitialising",
                    context.frame_number(),
                    e
                );
                self.status.mark_device_lost();
            } else {
                log::warn!("[PresentBridge] Frame {} submit failed: {}", context.frame_number(), e);
            }
        }

        self.stats.end_frame(status == SubmitStatus::Success);
        Some(status)
    }

    /// Make sure an eye buffer of `width x height` is bound to the eye layer.
    ///
    /// Returns false when allocation failed; the caller must not render into
    /// the eye layer this frame.
    pub fn allocate_render_target_texture(&mut self, width: u32, height: u32, high_quality: bool) -> bool {
        let realloc_requested = self.status.take_texture_reallocation();
        let needs_allocation = match &self.eye_texture_set {
            None => true,
            Some(set) => {
                realloc_requested
                    || set.is_released()
                    || set.size().x != width
                    || set.size().y != height
                    || set.is_high_quality() != high_quality
            }
        };
        if !needs_allocation {
            return true;
        }

        // Free the old ring first so peak memory stays near one ring
        if let Some(old) = self.eye_texture_set.take() {
            old.release_resources();
        }

        match self.create_eye_texture_set(width, height, high_quality) {
            Ok(set) => {
                if let Some(mut desc) = self.layers.layer_desc(self.eye_layer_id) {
                    desc.set_texture_set(set.clone());
                    desc.set_high_quality(high_quality);
                    self.layers.update_layer(desc);
                }
                log::debug!(
                    "[PresentBridge] Eye buffer {}x{} allocated ({} textures{})",
                    width,
                    height,
                    set.len(),
                    if high_quality { ", high quality" } else { "" }
                );
                self.eye_texture_set = Some(set);
                true
            }
            Err(e) => {
                log::warn!("[PresentBridge] Eye buffer allocation failed: {}", e);
                // Try again next frame
                self.status.request_texture_reallocation();
                false
            }
        }
    }

    fn create_eye_texture_set(&self, width: u32, height: u32, high_quality: bool) -> PresentResult<TextureSetProxy> {
        let mip_count = if high_quality {
            TextureDesc::full_mip_count(width, height)
        } else {
            1
        };
        let desc = TextureSetDesc {
            width,
            height,
            format: self.config.eye_buffer_format,
            mip_count,
            length: self.config.texture_set_length,
            high_quality,
        };
        TextureSetProxy::allocate(Arc::clone(self.layers.texture_set_factory()), desc)
    }

    /// Texture the renderer should draw the eyes into this frame.
    pub fn current_render_target(&self) -> Option<TextureHandle> {
        self.eye_texture_set
            .as_ref()
            .filter(|set| !set.is_released())
            .and_then(TextureSetProxy::current_texture)
    }

    /// Drop any in-flight frame.
    pub fn reset(&mut self) {
        if self.context.take().is_some() {
            log::debug!("[PresentBridge] Reset dropped an in-flight frame");
        }
    }

    pub fn on_back_buffer_resize(&mut self) {
        log::debug!("[PresentBridge] Back buffer resized");
        self.reset();
    }

    /// Release the eye buffer. The next allocation starts from scratch.
    pub fn release_resources(&mut self) {
        self.reset();
        if let Some(set) = self.eye_texture_set.take() {
            set.release_resources();
        }
    }

    /// Reset `bridge` on the render thread and wait for it.
    pub fn reset_and_flush(bridge: &Arc<Mutex<PresentBridge>>, render_thread: &RenderThread) -> PresentResult<()> {
        let target = Arc::clone(bridge);
        render_thread.enqueue(move || target.lock().reset())?;
        render_thread.flush()
    }
}
