use std::sync::atomic::{AtomicBool, Ordering};

/// Sticky device flags raised on the render thread and polled by the game thread.
#[derive(Debug, Default)]
pub struct DeviceStatus {
    need_to_kill_hmd: AtomicBool,
    need_reallocate_texture_set: AtomicBool,
}

impl DeviceStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// The runtime reported the display gone. Stays set until reinitialised.
    pub fn mark_device_lost(&self) {
        self.need_to_kill_hmd.store(true, Ordering::Release);
        self.need_reallocate_texture_set.store(true, Ordering::Release);
    }

    pub fn needs_to_kill_hmd(&self) -> bool {
        self.need_to_kill_hmd.load(Ordering::Acquire)
    }

    pub fn request_texture_reallocation(&self) {
        self.need_reallocate_texture_set.store(true, Ordering::Release);
    }

    pub fn needs_texture_reallocation(&self) -> bool {
        self.need_reallocate_texture_set.load(Ordering::Acquire)
    }

    /// Read and clear the reallocation request.
    pub(crate) fn take_texture_reallocation(&self) -> bool {
        self.need_reallocate_texture_set.swap(false, Ordering::AcqRel)
    }

    /// Out-of-band device reset finished.
    pub(crate) fn clear_device_lost(&self) {
        self.need_to_kill_hmd.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_lost_is_sticky() {
        let status = DeviceStatus::new();
        status.mark_device_lost();
        assert!(status.needs_to_kill_hmd());
        assert!(status.needs_to_kill_hmd());

        assert!(status.take_texture_reallocation());
        assert!(!status.needs_texture_reallocation());
        assert!(status.needs_to_kill_hmd());

        status.clear_device_lost();
        assert!(!status.needs_to_kill_hmd());
    }
}
