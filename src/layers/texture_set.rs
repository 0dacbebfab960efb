/// Texture sets: rings of textures backing one layer
///
/// A `TextureSetProxy` is a handle to a ring allocated through a
/// `TextureSetFactory`. The handle can be cloned for identity checks, but
/// only the holder of record (a descriptor before reconciliation, a render
/// layer after) advances, commits or releases it. Release happens exactly
/// once, explicitly or when the last handle drops.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use glam::UVec2;

use super::error::{texture_set_allocation_error, LayerResult};
use crate::error::HmdError;
use crate::rhi::{TextureDesc, TextureFormat, TextureHandle};
use crate::runtime::VrRuntime;

static NEXT_TEXTURE_SET_ID: AtomicU64 = AtomicU64::new(1);

/// Shape of a texture ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSetDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub mip_count: u32,
    /// Number of textures in the ring
    pub length: usize,
    pub high_quality: bool,
}

impl TextureSetDesc {
    pub fn texture_desc(&self) -> TextureDesc {
        TextureDesc::new(self.width, self.height, self.format).with_mips(self.mip_count)
    }
}

/// Backend that owns the actual texture memory behind a ring.
pub trait TextureSetFactory: Send + Sync {
    fn allocate(&self, desc: &TextureSetDesc) -> LayerResult<Vec<TextureHandle>>;

    fn release(&self, textures: &[TextureHandle]);

    /// Publish writes made to `texture`.
    fn commit(&self, texture: TextureHandle) -> LayerResult<()>;
}

/// Texture sets built from VR runtime swap textures.
pub struct RuntimeTextureSetFactory {
    runtime: Arc<dyn VrRuntime>,
}

impl RuntimeTextureSetFactory {
    pub fn new(runtime: Arc<dyn VrRuntime>) -> Self {
        Self { runtime }
    }
}

impl TextureSetFactory for RuntimeTextureSetFactory {
    fn allocate(&self, desc: &TextureSetDesc) -> LayerResult<Vec<TextureHandle>> {
        let texture_desc = desc.texture_desc();
        let mut textures = Vec::with_capacity(desc.length);

        for _ in 0..desc.length {
            match self.runtime.allocate_swap_texture(&texture_desc) {
                Ok(texture) => textures.push(texture),
                Err(e) => {
                    // Hand back whatever part of the ring was created
                    self.release(&textures);
                    return Err(e);
                }
            }
        }

        Ok(textures)
    }

    fn release(&self, textures: &[TextureHandle]) {
        for texture in textures {
            self.runtime.release_swap_texture(*texture);
        }
    }

    fn commit(&self, texture: TextureHandle) -> LayerResult<()> {
        self.runtime.commit_swap_texture(texture)
    }
}

struct TextureSetInner {
    id: u64,
    desc: TextureSetDesc,
    textures: Vec<TextureHandle>,
    current: AtomicUsize,
    released: AtomicBool,
    factory: Arc<dyn TextureSetFactory>,
}

impl TextureSetInner {
    fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.factory.release(&self.textures);
        log::debug!(
            "[TextureSet] Released set {} ({} x {}x{})",
            self.id,
            self.textures.len(),
            self.desc.width,
            self.desc.height
        );
        true
    }
}

impl Drop for TextureSetInner {
    fn drop(&mut self) {
        self.release();
    }
}

/// Handle to a texture ring. Equality is identity.
#[derive(Clone)]
pub struct TextureSetProxy {
    inner: Arc<TextureSetInner>,
}

impl TextureSetProxy {
    pub fn allocate(factory: Arc<dyn TextureSetFactory>, desc: TextureSetDesc) -> LayerResult<Self> {
        if desc.width == 0 || desc.height == 0 {
            return Err(texture_set_allocation_error(desc.width, desc.height, "zero-sized texture set"));
        }
        if desc.length == 0 {
            return Err(texture_set_allocation_error(desc.width, desc.height, "empty texture ring"));
        }

        let textures = factory.allocate(&desc)?;
        if textures.len() != desc.length {
            factory.release(&textures);
            return Err(texture_set_allocation_error(
                desc.width,
                desc.height,
                format!("factory returned {} of {} textures", textures.len(), desc.length),
            ));
        }

        let id = NEXT_TEXTURE_SET_ID.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "[TextureSet] Allocated set {} ({} x {}x{}, {} mips)",
            id,
            desc.length,
            desc.width,
            desc.height,
            desc.mip_count
        );

        Ok(Self {
            inner: Arc::new(TextureSetInner {
                id,
                desc,
                textures,
                current: AtomicUsize::new(0),
                released: AtomicBool::new(false),
                factory,
            }),
        })
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn desc(&self) -> &TextureSetDesc {
        &self.inner.desc
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.inner.desc.width, self.inner.desc.height)
    }

    pub fn is_high_quality(&self) -> bool {
        self.inner.desc.high_quality
    }

    pub fn len(&self) -> usize {
        self.inner.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.textures.is_empty()
    }

    pub fn textures(&self) -> &[TextureHandle] {
        &self.inner.textures
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    pub fn current_index(&self) -> usize {
        self.inner.current.load(Ordering::Acquire)
    }

    /// Texture to render into this frame. `None` once released.
    pub fn current_texture(&self) -> Option<TextureHandle> {
        if self.is_released() {
            return None;
        }
        self.inner.textures.get(self.current_index()).copied()
    }

    /// Move to the next element of the ring.
    pub(crate) fn advance(&self) {
        if self.is_released() {
            return;
        }
        let next = (self.current_index() + 1) % self.inner.textures.len();
        self.inner.current.store(next, Ordering::Release);
    }

    pub(crate) fn commit(&self) -> LayerResult<()> {
        let texture = self
            .current_texture()
            .ok_or(HmdError::TextureSetReleased { id: self.inner.id })?;
        self.inner.factory.commit(texture)
    }

    /// Returns true when this call did the release.
    pub(crate) fn release_resources(&self) -> bool {
        self.inner.release()
    }
}

impl PartialEq for TextureSetProxy {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for TextureSetProxy {}

impl fmt::Debug for TextureSetProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureSetProxy")
            .field("id", &self.inner.id)
            .field("desc", &self.inner.desc)
            .field("current", &self.current_index())
            .field("released", &self.is_released())
            .finish()
    }
}
