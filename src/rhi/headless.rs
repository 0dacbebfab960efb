use parking_lot::Mutex;

use super::{next_texture_id, RenderDevice, TextureDesc, TextureHandle};
use crate::error::HmdResult;

/// One recorded device call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCall {
    Create(TextureHandle),
    Release(TextureHandle),
    Copy { src: TextureHandle, dst: TextureHandle },
    Transition(TextureHandle),
}

/// Render device with no GPU behind it. Records every call so tests and
/// the demo can inspect what the compositor asked for.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    calls: Mutex<Vec<DeviceCall>>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().clone()
    }

    pub fn copy_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, DeviceCall::Copy { .. }))
            .count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl RenderDevice for HeadlessDevice {
    fn create_texture_2d(&self, desc: &TextureDesc) -> HmdResult<TextureHandle> {
        let texture = TextureHandle::new(next_texture_id(), desc);
        self.calls.lock().push(DeviceCall::Create(texture));
        Ok(texture)
    }

    fn release_texture(&self, texture: TextureHandle) {
        self.calls.lock().push(DeviceCall::Release(texture));
    }

    fn copy_texture(&self, src: TextureHandle, dst: TextureHandle) -> HmdResult<()> {
        self.calls.lock().push(DeviceCall::Copy { src, dst });
        Ok(())
    }

    fn transition_for_present(&self, texture: TextureHandle) {
        self.calls.lock().push(DeviceCall::Transition(texture));
    }
}
