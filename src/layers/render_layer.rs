use std::sync::Arc;

use glam::Vec2;

use super::descriptor::{LayerDesc, LayerId, LayerKind, LayerOrigin};
use super::error::{LayerErrorContext, LayerResult};
use super::texture_set::{TextureSetDesc, TextureSetFactory, TextureSetProxy};
use crate::frame::GameFrame;
use crate::math::{Pose, ViewRect};
use crate::rhi::{RenderDevice, TextureDesc, TextureHandle};
use crate::runtime::{CompositionLayer, LayerContent};

/// Render-thread counterpart of a `LayerDesc`.
///
/// Holds a snapshot of the descriptor plus the texture set actually
/// submitted. Sets arriving from a descriptor are moved in; sets created here
/// to receive copies of an engine texture are owned outright.
#[derive(Debug)]
pub struct RenderLayer {
    desc: LayerDesc,
    texture_set: Option<TextureSetProxy>,
    /// `texture_set` was allocated here as a copy target
    owns_copy_target: bool,
    texture_copy_pending: bool,
}

impl RenderLayer {
    /// Build from `desc`, taking its texture set.
    pub(crate) fn new(desc: &mut LayerDesc) -> Self {
        let texture_set = desc.take_texture_set();
        let texture_copy_pending = desc.has_texture();
        Self {
            desc: desc.clone(),
            texture_set,
            owns_copy_target: false,
            texture_copy_pending,
        }
    }

    /// Rebuild for a descriptor whose priority, origin or quality changed.
    ///
    /// The existing set survives unless the descriptor brings a different one.
    pub(crate) fn rebuild(mut previous: RenderLayer, desc: &mut LayerDesc) -> Self {
        if desc.is_texture_changed() || desc.has_texture_set() {
            previous.replace_texture(desc);
        } else {
            previous.desc = desc.clone();
        }
        previous
    }

    pub fn id(&self) -> LayerId {
        self.desc.id()
    }

    pub fn kind(&self) -> LayerKind {
        self.desc.kind()
    }

    pub fn sort_key(&self) -> u32 {
        self.desc.sort_key()
    }

    pub fn layer_desc(&self) -> &LayerDesc {
        &self.desc
    }

    pub fn texture_set(&self) -> Option<&TextureSetProxy> {
        self.texture_set.as_ref()
    }

    /// A live texture set exists to submit from.
    pub fn is_fully_setup(&self) -> bool {
        self.texture_set.as_ref().map_or(false, |set| !set.is_released())
    }

    pub(crate) fn release_resources(&mut self) {
        if let Some(set) = self.texture_set.take() {
            set.release_resources();
        }
        self.owns_copy_target = false;
    }

    /// Pick up a texture change from `desc`.
    pub(crate) fn replace_texture(&mut self, desc: &mut LayerDesc) {
        match desc.take_texture_set() {
            Some(set) => {
                if self.texture_set.as_ref() != Some(&set) {
                    self.release_resources();
                    self.texture_set = Some(set);
                }
            }
            None if desc.has_texture() => {
                // A set inherited from a descriptor can't double as a copy target
                if !self.owns_copy_target {
                    self.release_resources();
                }
                self.texture_copy_pending = true;
            }
            None => self.release_resources(),
        }
        self.desc = desc.clone();
    }

    /// Pick up transform, size and viewport from `desc`.
    pub(crate) fn update_layout(&mut self, desc: &LayerDesc) {
        self.desc = desc.clone();
    }

    pub(crate) fn request_texture_copy(&mut self) {
        if self.desc.has_texture() {
            self.texture_copy_pending = true;
        }
    }

    /// Make sure an engine texture has a ring to live in and copy it over.
    pub(crate) fn update_texture(
        &mut self,
        factory: &Arc<dyn TextureSetFactory>,
        device: &dyn RenderDevice,
    ) -> LayerResult<()> {
        let Some(source) = self.desc.texture() else {
            return Ok(());
        };

        let high_quality = self.desc.is_high_quality();
        let compatible = self.texture_set.as_ref().map_or(false, |set| {
            !set.is_released() && set.size() == source.size() && set.is_high_quality() == high_quality
        });

        if !compatible {
            self.release_resources();
            let mip_count = if high_quality {
                TextureDesc::full_mip_count(source.width(), source.height())
            } else {
                1
            };
            let set = TextureSetProxy::allocate(
                Arc::clone(factory),
                TextureSetDesc {
                    width: source.width(),
                    height: source.height(),
                    format: source.format(),
                    mip_count,
                    length: 1,
                    high_quality,
                },
            )?;
            self.texture_set = Some(set);
            self.owns_copy_target = true;
            self.texture_copy_pending = true;
        }

        if self.texture_copy_pending {
            if let Some(target) = self.texture_set.as_ref().and_then(|set| set.current_texture()) {
                device
                    .copy_texture(source, target)
                    .layer_context(&format!("copy into layer {}", self.id()))?;
            }
            self.texture_copy_pending = false;
        }

        Ok(())
    }

    /// Describe this layer for the runtime.
    pub(crate) fn composition(
        &self,
        texture: TextureHandle,
        frame: &GameFrame,
        eye_viewports: [ViewRect; 2],
        eye_render_poses: [Pose; 2],
    ) -> CompositionLayer {
        let content = match self.kind() {
            LayerKind::Eye => LayerContent::Eye {
                viewports: eye_viewports,
                render_poses: eye_render_poses,
            },
            LayerKind::Quad | LayerKind::Debug => {
                let world_to_meters = frame.world_to_meters().max(f32::EPSILON);
                let transform = match self.desc.origin() {
                    LayerOrigin::WorldLocked => self.desc.transform().relative_to(&frame.player_transform()),
                    LayerOrigin::HeadLocked | LayerOrigin::TorsoLocked => *self.desc.transform(),
                };
                LayerContent::Quad {
                    origin: self.desc.origin(),
                    pose: Pose::new(transform.rotation, transform.translation / world_to_meters),
                    size: self.desc.quad_size() * Vec2::new(transform.scale.y, transform.scale.z) / world_to_meters,
                    uv_rect: self.desc.texture_viewport(),
                }
            }
        };

        CompositionLayer {
            id: self.id(),
            texture,
            high_quality: self.desc.is_high_quality(),
            content,
        }
    }
}
