/// Engine-facing stereo layer API
///
/// Game code deals in quad layers described by `StereoLayerDesc`; these are
/// translated into `LayerDesc`s owned by the layer manager.

use glam::Vec2;

use super::HeadMountedDisplay;
use crate::constants::layer::DEFAULT_TEXTURE_ASPECT;
use crate::layers::{LayerDesc, LayerId, LayerKind, LayerOrigin};
use crate::math::{Transform, UvRect};
use crate::rhi::TextureHandle;

/// How a stereo layer is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StereoLayerType {
    #[default]
    WorldLocked,
    TrackerLocked,
    FaceLocked,
}

impl StereoLayerType {
    fn origin(self) -> LayerOrigin {
        match self {
            StereoLayerType::WorldLocked => LayerOrigin::WorldLocked,
            StereoLayerType::TrackerLocked => LayerOrigin::TorsoLocked,
            StereoLayerType::FaceLocked => LayerOrigin::HeadLocked,
        }
    }

    fn from_origin(origin: LayerOrigin) -> Self {
        match origin {
            LayerOrigin::WorldLocked => StereoLayerType::WorldLocked,
            LayerOrigin::TorsoLocked => StereoLayerType::TrackerLocked,
            LayerOrigin::HeadLocked => StereoLayerType::FaceLocked,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StereoLayerDesc {
    pub priority: u32,
    /// Engine units
    pub transform: Transform,
    /// Engine units
    pub quad_size: Vec2,
    pub uv_rect: UvRect,
    pub texture: Option<TextureHandle>,
    pub kind: StereoLayerType,
    /// Derive the quad height from the texture aspect ratio
    pub preserve_texture_ratio: bool,
}

impl Default for StereoLayerDesc {
    fn default() -> Self {
        Self {
            priority: 0,
            transform: Transform::IDENTITY,
            quad_size: Vec2::new(500.0, 500.0),
            uv_rect: UvRect::FULL,
            texture: None,
            kind: StereoLayerType::default(),
            preserve_texture_ratio: false,
        }
    }
}

impl StereoLayerDesc {
    pub fn new(texture: TextureHandle, transform: Transform, quad_size: Vec2) -> Self {
        Self {
            transform,
            quad_size,
            texture: Some(texture),
            ..Self::default()
        }
    }
}

fn apply_stereo_desc(layer: &mut LayerDesc, desc: &StereoLayerDesc) {
    let mut quad_size = desc.quad_size;
    if desc.preserve_texture_ratio {
        let aspect = match desc.texture {
            Some(texture) if texture.height() > 0 => texture.width() as f32 / texture.height() as f32,
            _ => DEFAULT_TEXTURE_ASPECT,
        };
        quad_size.y = quad_size.x / aspect;
    }

    layer.set_transform(desc.transform);
    layer.set_quad_size(quad_size);
    layer.set_texture_viewport(desc.uv_rect);
    layer.set_priority(desc.priority);
    layer.set_origin(desc.kind.origin());
    layer.set_preserve_texture_ratio(desc.preserve_texture_ratio);
    match desc.texture {
        Some(texture) => layer.set_texture(texture),
        None => layer.clear_texture(),
    }
}

impl HeadMountedDisplay {
    /// Create a quad layer. `None` without a texture or when out of layers.
    pub fn create_layer(&self, desc: &StereoLayerDesc) -> Option<LayerId> {
        desc.texture?;

        let mut layer = self
            .layers
            .add_layer(LayerKind::Quad, desc.priority, desc.kind.origin())?;
        apply_stereo_desc(&mut layer, desc);
        let id = layer.id();
        self.layers.update_layer(layer);
        Some(id)
    }

    pub fn destroy_layer(&self, id: LayerId) -> bool {
        self.layers.remove_layer(id)
    }

    /// Replace a quad layer's description. Other layer kinds are ignored.
    pub fn set_layer_desc(&self, id: LayerId, desc: &StereoLayerDesc) -> bool {
        if id.kind() != Some(LayerKind::Quad) {
            return false;
        }
        let Some(mut layer) = self.layers.layer_desc(id) else {
            return false;
        };
        apply_stereo_desc(&mut layer, desc);
        self.layers.update_layer(layer)
    }

    pub fn get_layer_desc(&self, id: LayerId) -> Option<StereoLayerDesc> {
        if id.kind() != Some(LayerKind::Quad) {
            return None;
        }
        let layer = self.layers.layer_desc(id)?;
        Some(StereoLayerDesc {
            priority: layer.priority(),
            transform: *layer.transform(),
            quad_size: layer.quad_size(),
            uv_rect: layer.texture_viewport(),
            texture: layer.texture(),
            kind: StereoLayerType::from_origin(layer.origin()),
            preserve_texture_ratio: layer.preserves_texture_ratio(),
        })
    }

    /// Redo the copy of a layer's texture on the next submit.
    pub fn mark_texture_for_update(&self, id: LayerId) -> bool {
        self.layers.mark_texture_for_update(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HmdConfig;
    use crate::rhi::{next_texture_id, TextureDesc, TextureFormat};
    use crate::runtime::MockRuntime;
    use std::sync::Arc;

    fn hmd() -> HeadMountedDisplay {
        HeadMountedDisplay::new(Arc::new(MockRuntime::new()), &HmdConfig::default())
    }

    fn texture(width: u32, height: u32) -> TextureHandle {
        TextureHandle::new(next_texture_id(), &TextureDesc::new(width, height, TextureFormat::Rgba8))
    }

    #[test]
    fn test_create_requires_texture() {
        let hmd = hmd();
        assert!(hmd.create_layer(&StereoLayerDesc::default()).is_none());

        let id = hmd
            .create_layer(&StereoLayerDesc::new(texture(64, 64), Transform::IDENTITY, Vec2::splat(100.0)))
            .unwrap();
        assert_eq!(id.kind(), Some(LayerKind::Quad));
    }

    #[test]
    fn test_preserve_ratio() {
        let hmd = hmd();
        let mut desc = StereoLayerDesc::new(texture(200, 100), Transform::IDENTITY, Vec2::new(100.0, 7.0));
        desc.preserve_texture_ratio = true;
        let id = hmd.create_layer(&desc).unwrap();

        let stored = hmd.get_layer_desc(id).unwrap();
        assert_eq!(stored.quad_size, Vec2::new(100.0, 50.0));
        assert!(stored.preserve_texture_ratio);
    }

    #[test]
    fn test_preserve_ratio_zero_height_uses_default_aspect() {
        let hmd = hmd();
        let mut desc = StereoLayerDesc::new(texture(200, 0), Transform::IDENTITY, Vec2::new(1280.0, 1.0));
        desc.preserve_texture_ratio = true;
        let id = hmd.create_layer(&desc).unwrap();

        let stored = hmd.get_layer_desc(id).unwrap();
        assert!((stored.quad_size.y - 720.0).abs() < 1.0e-3);
    }

    #[test]
    fn test_eye_layer_hidden_from_stereo_api() {
        let hmd = hmd();
        let eye = hmd.eye_layer_id();
        assert!(hmd.get_layer_desc(eye).is_none());
        assert!(!hmd.set_layer_desc(eye, &StereoLayerDesc::default()));
    }

    #[test]
    fn test_layer_type_maps_to_origin() {
        let hmd = hmd();
        let mut desc = StereoLayerDesc::new(texture(8, 8), Transform::IDENTITY, Vec2::ONE);
        desc.kind = StereoLayerType::TrackerLocked;
        let id = hmd.create_layer(&desc).unwrap();

        let layer = hmd.layer_manager().layer_desc(id).unwrap();
        assert!(layer.is_torso_locked());
        assert_eq!(hmd.get_layer_desc(id).unwrap().kind, StereoLayerType::TrackerLocked);
    }
}
