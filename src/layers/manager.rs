/// Layer manager
///
/// Single source of truth for the active layers. The game thread adds,
/// updates and removes descriptors; the render thread reconciles them into
/// a sorted `RenderLayer` list when something changed, then composes and
/// submits that list each frame. One mutex guards the handoff between the
/// two; the data on either side is single-writer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::descriptor::{LayerDesc, LayerId, LayerKind, LayerOrigin};
use super::render_layer::RenderLayer;
use super::texture_set::{TextureSetFactory, TextureSetProxy};
use crate::constants::layer::ID_MASK;
use crate::frame::{GameFrame, RenderContext};
use crate::rhi::RenderDevice;
use crate::runtime::{CompositionLayer, SubmitStatus, VrRuntime};

#[derive(Default)]
struct LayerState {
    eye_layers: Vec<LayerDesc>,
    quad_layers: Vec<LayerDesc>,
    debug_layers: Vec<LayerDesc>,
    /// Render thread only
    layers_to_render: Vec<RenderLayer>,
    next_sequence: u32,
    show_flags_rendering: bool,
}

impl LayerState {
    fn total(&self) -> usize {
        self.eye_layers.len() + self.quad_layers.len() + self.debug_layers.len()
    }

    fn list_mut(&mut self, kind: LayerKind) -> &mut Vec<LayerDesc> {
        match kind {
            LayerKind::Eye => &mut self.eye_layers,
            LayerKind::Quad => &mut self.quad_layers,
            LayerKind::Debug => &mut self.debug_layers,
        }
    }

    fn list(&self, kind: LayerKind) -> &Vec<LayerDesc> {
        match kind {
            LayerKind::Eye => &self.eye_layers,
            LayerKind::Quad => &self.quad_layers,
            LayerKind::Debug => &self.debug_layers,
        }
    }

    fn find(&self, id: LayerId) -> Option<&LayerDesc> {
        let kind = id.kind()?;
        self.list(kind).iter().find(|desc| desc.id() == id)
    }

    fn find_mut(&mut self, id: LayerId) -> Option<&mut LayerDesc> {
        let kind = id.kind()?;
        self.list_mut(kind).iter_mut().find(|desc| desc.id() == id)
    }

    fn allocate_sequence(&mut self) -> u32 {
        self.next_sequence = (self.next_sequence + 1) & ID_MASK;
        if self.next_sequence == 0 {
            self.next_sequence = 1;
        }
        self.next_sequence
    }
}

/// Owns the layer descriptors and their render-thread snapshot.
pub struct LayerManager {
    state: Mutex<LayerState>,
    dirty: AtomicBool,
    factory: Arc<dyn TextureSetFactory>,
    max_layers: u32,
}

impl LayerManager {
    pub fn new(factory: Arc<dyn TextureSetFactory>, max_layers: u32) -> Self {
        log::info!("[LayerManager] Created with a budget of {} layers", max_layers);
        Self {
            state: Mutex::new(LayerState {
                show_flags_rendering: true,
                ..LayerState::default()
            }),
            dirty: AtomicBool::new(false),
            factory,
            max_layers,
        }
    }

    pub fn max_layers(&self) -> u32 {
        self.max_layers
    }

    pub fn texture_set_factory(&self) -> &Arc<dyn TextureSetFactory> {
        &self.factory
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Total descriptors across every category.
    pub fn total_layers(&self) -> usize {
        self.state.lock().total()
    }

    /// Add a layer. `None` when the layer budget is used up.
    pub fn add_layer(&self, kind: LayerKind, priority: u32, origin: LayerOrigin) -> Option<LayerDesc> {
        let mut state = self.state.lock();
        if state.total() >= self.max_layers as usize {
            log::debug!(
                "[LayerManager] Layer budget of {} reached, refusing {:?} layer",
                self.max_layers,
                kind
            );
            return None;
        }

        let sequence = state.allocate_sequence();
        let desc = LayerDesc::new(LayerId::new(kind, sequence), kind, priority, origin);
        state.list_mut(kind).push(desc.clone());
        self.mark_dirty();

        log::debug!("[LayerManager] Added {:?} layer {}", kind, desc.id());
        Some(desc)
    }

    /// Remove a layer. Unknown ids are ignored.
    ///
    /// GPU resources are released by the next `pre_submit_update`.
    pub fn remove_layer(&self, id: LayerId) -> bool {
        let Some(kind) = id.kind() else {
            return false;
        };

        let mut state = self.state.lock();
        let list = state.list_mut(kind);
        let Some(index) = list.iter().position(|desc| desc.id() == id) else {
            return false;
        };
        list.remove(index);
        self.mark_dirty();

        log::debug!("[LayerManager] Removed layer {}", id);
        true
    }

    pub fn remove_all_layers(&self) {
        let mut state = self.state.lock();
        state.eye_layers.clear();
        state.quad_layers.clear();
        state.debug_layers.clear();
        self.mark_dirty();
    }

    /// Replace a layer by value. Unknown ids are ignored.
    pub fn update_layer(&self, desc: LayerDesc) -> bool {
        let mut state = self.state.lock();
        let Some(stored) = state.find_mut(desc.id()) else {
            return false;
        };
        stored.assign(desc);
        self.mark_dirty();
        true
    }

    pub fn layer_desc(&self, id: LayerId) -> Option<LayerDesc> {
        self.state.lock().find(id).cloned()
    }

    /// Force the layer's engine texture to be copied again.
    pub fn mark_texture_for_update(&self, id: LayerId) -> bool {
        let mut state = self.state.lock();
        let Some(stored) = state.find_mut(id) else {
            return false;
        };
        stored.mark_texture_changed();
        self.mark_dirty();
        true
    }

    /// Reconcile descriptors into the sorted render list. Render thread only.
    pub fn pre_submit_update(&self, frame: &GameFrame, show_flags_rendering: bool) {
        let mut state = self.state.lock();
        state.show_flags_rendering = show_flags_rendering;

        if !self.is_dirty() {
            return;
        }

        let LayerState {
            eye_layers,
            quad_layers,
            debug_layers,
            layers_to_render,
            ..
        } = &mut *state;

        let previous = std::mem::take(layers_to_render);
        let mut reconciled = Vec::with_capacity(eye_layers.len() + quad_layers.len() + debug_layers.len());

        for mut render_layer in previous {
            let id = render_layer.id();
            let desc = eye_layers
                .iter_mut()
                .chain(quad_layers.iter_mut())
                .chain(debug_layers.iter_mut())
                .find(|desc| desc.id() == id);

            match desc {
                Some(desc) if !desc.is_new() => {
                    if desc.is_texture_changed() {
                        render_layer.replace_texture(desc);
                    } else if desc.changes().texture_copy_pending {
                        render_layer.request_texture_copy();
                        desc.clear_texture_copy_pending();
                    }
                    if desc.is_transform_changed() {
                        render_layer.update_layout(desc);
                    }
                    desc.set_already_added();
                    reconciled.push(render_layer);
                }
                Some(desc) => {
                    reconciled.push(RenderLayer::rebuild(render_layer, desc));
                    desc.set_already_added();
                }
                None => {
                    log::debug!("[LayerManager] Releasing render layer {}", id);
                    render_layer.release_resources();
                }
            }
        }

        for desc in eye_layers
            .iter_mut()
            .chain(quad_layers.iter_mut())
            .chain(debug_layers.iter_mut())
        {
            if !desc.is_already_added() {
                reconciled.push(RenderLayer::new(desc));
            }
            desc.reset_changed_flags();
        }

        reconciled.sort_by_key(|layer| layer.sort_key());
        reconciled.truncate(eye_layers.len() + quad_layers.len() + debug_layers.len());
        *layers_to_render = reconciled;

        self.dirty.store(false, Ordering::Release);
        log::trace!(
            "[LayerManager] Frame {}: {} layers to render",
            frame.frame_number(),
            layers_to_render.len()
        );
    }

    /// Copy engine textures into their compositor rings. Render thread only.
    ///
    /// A layer whose update fails stays out of composition until it succeeds.
    pub fn update_textures(&self, device: &dyn RenderDevice) {
        let mut state = self.state.lock();
        for layer in state.layers_to_render.iter_mut() {
            if let Err(e) = layer.update_texture(&self.factory, device) {
                log::warn!("[LayerManager] Texture update for layer {} failed: {}", layer.id(), e);
                layer.release_resources();
            }
        }
    }

    /// Compose the render list and hand it to the runtime. Render thread only.
    pub fn submit_frame(
        &self,
        runtime: &dyn VrRuntime,
        device: &dyn RenderDevice,
        context: &RenderContext,
    ) -> SubmitStatus {
        let (composed, submitted_sets) = self.compose(device, context);
        let status = runtime.submit_frame(context.frame_number(), &composed);

        if status == SubmitStatus::Success {
            for set in &submitted_sets {
                set.advance();
            }
        }
        status
    }

    fn compose(
        &self,
        device: &dyn RenderDevice,
        context: &RenderContext,
    ) -> (Vec<CompositionLayer>, Vec<TextureSetProxy>) {
        let state = self.state.lock();
        let mut composed = Vec::with_capacity(state.layers_to_render.len());
        let mut submitted_sets = Vec::with_capacity(state.layers_to_render.len());

        for layer in &state.layers_to_render {
            if layer.kind() == LayerKind::Eye && !state.show_flags_rendering {
                continue;
            }
            let Some(set) = layer.texture_set().filter(|_| layer.is_fully_setup()) else {
                log::trace!("[LayerManager] Layer {} not set up, skipped", layer.id());
                continue;
            };
            let Some(texture) = set.current_texture() else {
                continue;
            };
            if let Err(e) = set.commit() {
                log::warn!("[LayerManager] Dropping layer {} from composition: {}", layer.id(), e);
                continue;
            }

            device.transition_for_present(texture);
            composed.push(layer.composition(
                texture,
                context.frame(),
                context.eye_viewports(),
                context.eye_render_poses(),
            ));
            submitted_sets.push(set.clone());
        }

        (composed, submitted_sets)
    }

    pub fn render_layer_count(&self) -> usize {
        self.state.lock().layers_to_render.len()
    }

    /// Ids of the render list, in composition order.
    pub fn render_layer_ids(&self) -> Vec<LayerId> {
        self.state.lock().layers_to_render.iter().map(|layer| layer.id()).collect()
    }

    /// Inspect the render list under the lock.
    pub fn with_render_layers<R>(&self, f: impl FnOnce(&[RenderLayer]) -> R) -> R {
        let state = self.state.lock();
        f(&state.layers_to_render)
    }

    /// Release every texture set, on descriptors and render layers alike.
    pub fn release_texture_sets(&self) {
        let mut state = self.state.lock();
        let LayerState {
            eye_layers,
            quad_layers,
            debug_layers,
            layers_to_render,
            ..
        } = &mut *state;

        for layer in layers_to_render.iter_mut() {
            layer.release_resources();
        }
        for desc in eye_layers
            .iter_mut()
            .chain(quad_layers.iter_mut())
            .chain(debug_layers.iter_mut())
        {
            if let Some(set) = desc.take_texture_set() {
                set.release_resources();
            }
        }
    }

    /// Drop every layer and free every resource. Render thread only.
    pub fn shutdown(&self) {
        self.release_texture_sets();
        let mut state = self.state.lock();
        state.eye_layers.clear();
        state.quad_layers.clear();
        state.debug_layers.clear();
        state.layers_to_render.clear();
        self.dirty.store(false, Ordering::Release);
        log::info!("[LayerManager] Shut down");
    }
}
