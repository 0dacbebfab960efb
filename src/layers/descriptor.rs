/// Layer descriptors
///
/// A `LayerDesc` is the game-thread description of one compositable surface.
/// Ids carry the layer type in their high bits so that sorting by
/// `priority | type` partitions the composition order by type for free.

use glam::Vec2;

use super::texture_set::TextureSetProxy;
use crate::constants::layer::*;
use crate::math::{Transform, UvRect};
use crate::rhi::TextureHandle;

/// Layer category. The discriminant is the id type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Eye,
    Quad,
    Debug,
}

impl LayerKind {
    pub fn tag(self) -> u32 {
        match self {
            LayerKind::Eye => EYE_TAG,
            LayerKind::Quad => QUAD_TAG,
            LayerKind::Debug => DEBUG_TAG,
        }
    }

    pub fn from_tag(raw: u32) -> Option<Self> {
        match raw & TYPE_MASK {
            EYE_TAG => Some(LayerKind::Eye),
            QUAD_TAG => Some(LayerKind::Quad),
            DEBUG_TAG => Some(LayerKind::Debug),
            _ => None,
        }
    }
}

/// Type tag plus sequence number. Zero is never a live layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LayerId(u32);

impl LayerId {
    pub const NONE: LayerId = LayerId(0);

    pub fn new(kind: LayerKind, sequence: u32) -> Self {
        LayerId(kind.tag() | (sequence & ID_MASK))
    }

    pub fn from_raw(raw: u32) -> Self {
        LayerId(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn kind(self) -> Option<LayerKind> {
        if self.is_none() {
            return None;
        }
        LayerKind::from_tag(self.0)
    }

    pub fn sequence(self) -> u32 {
        self.0 & ID_MASK
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Space a layer transform is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayerOrigin {
    #[default]
    WorldLocked,
    HeadLocked,
    TorsoLocked,
}

/// Where a layer gets its pixels from. Only one kind at a time.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TextureSource {
    #[default]
    None,
    /// Engine texture, copied into a compositor-owned ring
    Texture(TextureHandle),
    /// Ring rendered into directly
    TextureSet(TextureSetProxy),
}

/// Change tracking consumed by the render-thread reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerChanges {
    pub texture_changed: bool,
    pub transform_changed: bool,
    pub is_new: bool,
    pub already_added: bool,
    /// Direct texture must be copied again
    pub texture_copy_pending: bool,
}

/// Description of one layer.
#[derive(Debug, Clone)]
pub struct LayerDesc {
    id: LayerId,
    kind: LayerKind,
    priority: u32,
    transform: Transform,
    quad_size: Vec2,
    source: TextureSource,
    texture_viewport: UvRect,
    origin: LayerOrigin,
    high_quality: bool,
    /// Derive quad height from the texture aspect
    preserve_texture_ratio: bool,
    changes: LayerChanges,
}

impl LayerDesc {
    pub(crate) fn new(id: LayerId, kind: LayerKind, priority: u32, origin: LayerOrigin) -> Self {
        Self {
            id,
            kind,
            priority: priority & ID_MASK,
            transform: Transform::IDENTITY,
            quad_size: Vec2::ZERO,
            source: TextureSource::None,
            texture_viewport: UvRect::FULL,
            origin,
            high_quality: false,
            preserve_texture_ratio: false,
            changes: LayerChanges {
                is_new: true,
                ..LayerChanges::default()
            },
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Composition order key, ascending.
    pub fn sort_key(&self) -> u32 {
        self.priority | self.kind.tag()
    }

    /// Takes effect as a rebuild once assigned through the manager.
    pub fn set_priority(&mut self, priority: u32) {
        self.priority = priority & ID_MASK;
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.changes.transform_changed = true;
    }

    pub fn quad_size(&self) -> Vec2 {
        self.quad_size
    }

    pub fn set_quad_size(&mut self, size: Vec2) {
        if self.quad_size == size {
            return;
        }
        self.quad_size = size;
        self.changes.transform_changed = true;
    }

    pub fn source(&self) -> &TextureSource {
        &self.source
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        match self.source {
            TextureSource::Texture(texture) => Some(texture),
            _ => None,
        }
    }

    pub fn texture_set(&self) -> Option<&TextureSetProxy> {
        match &self.source {
            TextureSource::TextureSet(set) => Some(set),
            _ => None,
        }
    }

    pub fn has_texture(&self) -> bool {
        matches!(self.source, TextureSource::Texture(_))
    }

    pub fn has_texture_set(&self) -> bool {
        matches!(self.source, TextureSource::TextureSet(_))
    }

    /// Use an engine texture. Replaces any texture set.
    pub fn set_texture(&mut self, texture: TextureHandle) {
        if self.texture() == Some(texture) {
            return;
        }
        self.source = TextureSource::Texture(texture);
        self.changes.texture_changed = true;
    }

    /// Render straight into `set`. Replaces any engine texture.
    pub fn set_texture_set(&mut self, set: TextureSetProxy) {
        self.source = TextureSource::TextureSet(set);
        self.changes.texture_changed = true;
    }

    pub fn clear_texture(&mut self) {
        if self.source == TextureSource::None {
            return;
        }
        self.source = TextureSource::None;
        self.changes.texture_changed = true;
    }

    /// Move the texture set out, leaving no source behind.
    pub(crate) fn take_texture_set(&mut self) -> Option<TextureSetProxy> {
        match std::mem::take(&mut self.source) {
            TextureSource::TextureSet(set) => Some(set),
            other => {
                self.source = other;
                None
            }
        }
    }

    pub fn texture_viewport(&self) -> UvRect {
        self.texture_viewport
    }

    /// Inverted rects are ignored.
    pub fn set_texture_viewport(&mut self, viewport: UvRect) {
        if !viewport.is_valid() || self.texture_viewport == viewport {
            return;
        }
        self.texture_viewport = viewport;
        self.changes.transform_changed = true;
    }

    pub fn origin(&self) -> LayerOrigin {
        self.origin
    }

    pub fn set_origin(&mut self, origin: LayerOrigin) {
        self.origin = origin;
    }

    pub fn is_head_locked(&self) -> bool {
        self.origin == LayerOrigin::HeadLocked
    }

    pub fn is_torso_locked(&self) -> bool {
        self.origin == LayerOrigin::TorsoLocked
    }

    pub fn is_high_quality(&self) -> bool {
        self.high_quality
    }

    pub fn set_high_quality(&mut self, high_quality: bool) {
        self.high_quality = high_quality;
    }

    pub fn preserves_texture_ratio(&self) -> bool {
        self.preserve_texture_ratio
    }

    pub fn set_preserve_texture_ratio(&mut self, preserve: bool) {
        self.preserve_texture_ratio = preserve;
    }

    pub fn changes(&self) -> LayerChanges {
        self.changes
    }

    pub fn is_new(&self) -> bool {
        self.changes.is_new
    }

    pub fn is_texture_changed(&self) -> bool {
        self.changes.texture_changed
    }

    pub fn is_transform_changed(&self) -> bool {
        self.changes.transform_changed
    }

    pub(crate) fn mark_texture_changed(&mut self) {
        self.changes.texture_changed = true;
    }

    pub(crate) fn is_already_added(&self) -> bool {
        self.changes.already_added
    }

    pub(crate) fn set_already_added(&mut self) {
        self.changes.already_added = true;
    }

    pub(crate) fn clear_texture_copy_pending(&mut self) {
        self.changes.texture_copy_pending = false;
    }

    /// Fold this pass's texture change into the copy request and clear the rest.
    pub(crate) fn reset_changed_flags(&mut self) {
        self.changes = LayerChanges {
            texture_copy_pending: self.changes.texture_copy_pending || self.changes.texture_changed,
            ..LayerChanges::default()
        };
    }

    /// Replace every field with `src`, recording what changed.
    ///
    /// The id is kept. Change flags accumulate until the next reset.
    pub(crate) fn assign(&mut self, src: LayerDesc) {
        if self.source != src.source {
            self.changes.texture_changed = true;
        }
        if self.texture_viewport != src.texture_viewport
            || self.quad_size != src.quad_size
            || !self.transform.equals(&src.transform, TRANSFORM_TOLERANCE)
        {
            self.changes.transform_changed = true;
        }
        if self.priority != src.priority
            || self.high_quality != src.high_quality
            || self.origin != src.origin
        {
            self.changes.is_new = true;
        }

        self.priority = src.priority;
        self.transform = src.transform;
        self.quad_size = src.quad_size;
        self.source = src.source;
        self.texture_viewport = src.texture_viewport;
        self.origin = src.origin;
        self.high_quality = src.high_quality;
        self.preserve_texture_ratio = src.preserve_texture_ratio;
    }
}

/// Observable fields only; change tracking is ignored.
impl PartialEq for LayerDesc {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.kind == other.kind
            && self.priority == other.priority
            && self.transform == other.transform
            && self.quad_size == other.quad_size
            && self.source == other.source
            && self.texture_viewport == other.texture_viewport
            && self.origin == other.origin
            && self.high_quality == other.high_quality
            && self.preserve_texture_ratio == other.preserve_texture_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::{TextureDesc, TextureFormat};
    use glam::Vec3;

    fn quad(priority: u32) -> LayerDesc {
        LayerDesc::new(LayerId::new(LayerKind::Quad, 7), LayerKind::Quad, priority, LayerOrigin::WorldLocked)
    }

    fn texture(id: u64) -> TextureHandle {
        TextureHandle::new(id, &TextureDesc::new(128, 128, TextureFormat::Rgba8))
    }

    #[test]
    fn test_id_encoding() {
        let id = LayerId::new(LayerKind::Quad, 42);
        assert_eq!(id.raw(), 0x8000_002a);
        assert_eq!(id.kind(), Some(LayerKind::Quad));
        assert_eq!(id.sequence(), 42);

        let debug = LayerId::new(LayerKind::Debug, 3);
        assert_eq!(debug.kind(), Some(LayerKind::Debug));
        assert_eq!(LayerId::new(LayerKind::Eye, 1).kind(), Some(LayerKind::Eye));
        assert_eq!(LayerId::NONE.kind(), None);
    }

    #[test]
    fn test_priority_is_masked_into_sort_key() {
        let desc = quad(0xC000_0005);
        assert_eq!(desc.priority(), 5);
        assert_eq!(desc.sort_key(), 0x8000_0005);
    }

    #[test]
    fn test_texture_sources_are_exclusive() {
        let mut desc = quad(0);
        desc.set_texture(texture(1));
        assert!(desc.has_texture());
        assert!(!desc.has_texture_set());
        assert!(desc.take_texture_set().is_none());
        assert!(desc.has_texture());

        desc.clear_texture();
        assert_eq!(desc.source(), &TextureSource::None);
    }

    #[test]
    fn test_setters_skip_unchanged_values() {
        let mut desc = quad(0);
        desc.reset_changed_flags();

        desc.set_quad_size(Vec2::ZERO);
        assert!(!desc.is_transform_changed());

        desc.set_quad_size(Vec2::new(100.0, 50.0));
        assert!(desc.is_transform_changed());

        let tex = texture(9);
        desc.set_texture(tex);
        desc.reset_changed_flags();
        desc.set_texture(tex);
        assert!(!desc.is_texture_changed());
    }

    #[test]
    fn test_invalid_viewport_is_ignored() {
        let mut desc = quad(0);
        desc.set_texture_viewport(UvRect::new(Vec2::new(0.8, 0.0), Vec2::new(0.2, 1.0)));
        assert_eq!(desc.texture_viewport(), UvRect::FULL);
    }

    #[test]
    fn test_assign_tracks_changes() {
        let mut stored = quad(1);
        stored.reset_changed_flags();

        let mut moved = stored.clone();
        moved.set_transform(Transform::from_translation(Vec3::new(0.0, 0.0, 50.0)));
        stored.assign(moved);
        assert!(stored.is_transform_changed());
        assert!(!stored.is_texture_changed());
        assert!(!stored.is_new());

        stored.reset_changed_flags();
        let mut retextured = stored.clone();
        retextured.set_texture(texture(5));
        stored.assign(retextured);
        assert!(stored.is_texture_changed());
        assert!(!stored.is_transform_changed());

        stored.reset_changed_flags();
        let mut reprioritised = stored.clone();
        reprioritised.set_priority(10);
        stored.assign(reprioritised);
        assert!(stored.is_new());
    }

    #[test]
    fn test_tiny_transform_drift_is_not_a_change() {
        let mut stored = quad(1);
        stored.reset_changed_flags();

        let mut nudged = stored.clone();
        nudged.transform.translation.x += 1.0e-6;
        stored.assign(nudged);
        assert!(!stored.is_transform_changed());
    }

    #[test]
    fn test_reset_folds_texture_change_into_copy_pending() {
        let mut desc = quad(0);
        desc.set_texture(texture(3));
        desc.set_already_added();
        desc.reset_changed_flags();

        let changes = desc.changes();
        assert!(changes.texture_copy_pending);
        assert!(!changes.texture_changed);
        assert!(!changes.already_added);
        assert!(!changes.is_new);
    }

    #[test]
    fn test_equality_ignores_change_flags() {
        let a = quad(2);
        let mut b = a.clone();
        b.reset_changed_flags();
        assert_eq!(a, b);
    }
}
