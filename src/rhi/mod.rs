/// Render hardware interface boundary
///
/// The compositor never talks to a GPU API directly. Textures are opaque
/// handles issued by a `RenderDevice` (engine textures) or by the VR runtime
/// (swap textures); both use the same handle type.

pub mod headless;

use std::sync::atomic::{AtomicU64, Ordering};

use glam::UVec2;
use serde::{Deserialize, Serialize};

use crate::error::HmdResult;

pub use headless::HeadlessDevice;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique texture id. Zero is never returned.
pub fn next_texture_id() -> u64 {
    NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFormat {
    Rgba8,
    Rgba8Srgb,
    Bgra8Srgb,
    Rgba16Float,
}

/// Creation parameters for a 2D texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub mip_count: u32,
    pub format: TextureFormat,
}

impl TextureDesc {
    pub fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            mip_count: 1,
            format,
        }
    }

    pub fn with_mips(mut self, mip_count: u32) -> Self {
        self.mip_count = mip_count.max(1);
        self
    }

    /// Full mip chain down to 1x1.
    pub fn full_mip_count(width: u32, height: u32) -> u32 {
        32 - width.max(height).max(1).leading_zeros()
    }
}

/// Opaque texture reference. Equality is identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    id: u64,
    width: u32,
    height: u32,
    mip_count: u32,
    format: TextureFormat,
}

impl TextureHandle {
    pub fn new(id: u64, desc: &TextureDesc) -> Self {
        Self {
            id,
            width: desc.width,
            height: desc.height,
            mip_count: desc.mip_count,
            format: desc.format,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    pub fn mip_count(&self) -> u32 {
        self.mip_count
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }
}

/// GPU operations the compositor needs from the engine's renderer.
pub trait RenderDevice: Send + Sync {
    fn create_texture_2d(&self, desc: &TextureDesc) -> HmdResult<TextureHandle>;

    fn release_texture(&self, texture: TextureHandle);

    /// Copy `src` into `dst`, scaling when the sizes differ.
    fn copy_texture(&self, src: TextureHandle, dst: TextureHandle) -> HmdResult<()>;

    /// Make `texture` readable by the compositor.
    fn transition_for_present(&self, texture: TextureHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_mip_count() {
        assert_eq!(TextureDesc::full_mip_count(1, 1), 1);
        assert_eq!(TextureDesc::full_mip_count(1024, 512), 11);
        assert_eq!(TextureDesc::full_mip_count(1000, 10), 10);
    }

    #[test]
    fn test_texture_ids_are_unique() {
        let a = next_texture_id();
        let b = next_texture_id();
        assert_ne!(a, 0);
        assert_ne!(a, b);
    }
}
