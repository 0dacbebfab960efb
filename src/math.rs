/// Spatial value types shared by layers, frames and the runtime boundary.
///
/// Engine space is X forward, Y right, Z up, in world units. The VR runtime
/// reports poses in metres in tracking space; conversion happens in the HMD
/// core using the frame's world-to-meters scale.

use glam::{Quat, UVec2, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Orientation and position of a tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub orientation: Quat,
    pub position: Vec3,
}

impl Pose {
    pub const IDENTITY: Self = Self {
        orientation: Quat::IDENTITY,
        position: Vec3::ZERO,
    };

    pub fn new(orientation: Quat, position: Vec3) -> Self {
        Self { orientation, position }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Translation, rotation and non-uniform scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation_translation(rotation: Quat, translation: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale: Vec3::ONE,
        }
    }

    /// Component-wise comparison within `tolerance`.
    pub fn equals(&self, other: &Transform, tolerance: f32) -> bool {
        self.translation.abs_diff_eq(other.translation, tolerance)
            && self.rotation.abs_diff_eq(other.rotation, tolerance)
            && self.scale.abs_diff_eq(other.scale, tolerance)
    }

    /// Express `self` in the space of `parent`.
    pub fn relative_to(&self, parent: &Transform) -> Transform {
        let inv_rotation = parent.rotation.inverse();
        let inv_scale = parent.scale.recip();
        Transform {
            translation: inv_rotation * (self.translation - parent.translation) * inv_scale,
            rotation: inv_rotation * self.rotation,
            scale: self.scale * inv_scale,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Normalised texture sub-rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UvRect {
    pub min: Vec2,
    pub max: Vec2,
}

impl UvRect {
    pub const FULL: Self = Self {
        min: Vec2::ZERO,
        max: Vec2::ONE,
    };

    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y
    }
}

impl Default for UvRect {
    fn default() -> Self {
        Self::FULL
    }
}

/// Pixel rectangle inside a render target, `max` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewRect {
    pub min: UVec2,
    pub max: UVec2,
}

impl ViewRect {
    pub fn new(min: UVec2, max: UVec2) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> u32 {
        self.max.x.saturating_sub(self.min.x)
    }

    pub fn height(&self) -> u32 {
        self.max.y.saturating_sub(self.min.y)
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width(), self.height())
    }
}

/// Round `value` up to a multiple of `divisible_by`, which must be a power of two.
pub fn quantize_buffer_size(value: u32, divisible_by: u32) -> u32 {
    debug_assert!(divisible_by.is_power_of_two());
    let mask = !(divisible_by - 1);
    (value + divisible_by - 1) & mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_buffer_size() {
        assert_eq!(quantize_buffer_size(1182, 16), 1184);
        assert_eq!(quantize_buffer_size(1184, 16), 1184);
        assert_eq!(quantize_buffer_size(1, 4), 4);
        assert_eq!(quantize_buffer_size(0, 8), 0);
    }

    #[test]
    fn test_transform_tolerance() {
        let a = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let mut b = a;
        b.translation.x += 5.0e-5;
        assert!(a.equals(&b, 1.0e-4));

        b.translation.x += 1.0e-2;
        assert!(!a.equals(&b, 1.0e-4));
    }

    #[test]
    fn test_relative_to_parent() {
        let parent = Transform::from_rotation_translation(
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::new(10.0, 0.0, 0.0),
        );
        let child = Transform::from_translation(Vec3::new(10.0, 5.0, 0.0));

        let local = child.relative_to(&parent);
        // +Y in world is +X in a frame yawed 90 degrees
        assert!(local.translation.abs_diff_eq(Vec3::new(5.0, 0.0, 0.0), 1.0e-4));
    }

    #[test]
    fn test_uv_rect_validity() {
        assert!(UvRect::FULL.is_valid());
        assert!(!UvRect::new(Vec2::new(0.5, 0.0), Vec2::new(0.25, 1.0)).is_valid());
    }

    #[test]
    fn test_view_rect_size() {
        let rect = ViewRect::new(UVec2::new(640, 0), UVec2::new(1280, 720));
        assert_eq!(rect.size(), UVec2::new(640, 720));
    }
}
