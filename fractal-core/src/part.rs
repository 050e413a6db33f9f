use std::f32::consts::FRAC_PI_2;

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Quat, Vec3};

/// One rigid-body node of the fractal tree.
///
/// `orientation`, `spin_velocity` and `max_sag_angle` are fixed when the part
/// is created; the remaining fields are rewritten every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FractalPart {
    /// Local rotation selecting one of the five canonical child directions.
    pub orientation: Quat,
    pub world_position: Vec3,
    pub world_rotation: Quat,
    /// Accumulated spin around the local up axis, in radians.
    pub spin_angle: f32,
    /// Signed spin speed, in radians per second.
    pub spin_velocity: f32,
    /// Maximum droop, in radians, reached when the part lies horizontal.
    pub max_sag_angle: f32,
}

impl Default for FractalPart {
    fn default() -> Self {
        Self {
            orientation: Quat::IDENTITY,
            world_position: Vec3::ZERO,
            world_rotation: Quat::IDENTITY,
            spin_angle: 0.0,
            spin_velocity: 0.0,
            max_sag_angle: 0.0,
        }
    }
}

/// Returns the canonical orientation for child slot `index`.
///
/// Slot 0 keeps the parent's up direction, slots 1 and 2 tip the child
/// sideways around Z, slots 3 and 4 tip it forward and back around X.
pub fn child_orientation(index: usize) -> Option<Quat> {
    let q = match index {
        0 => Quat::IDENTITY,
        1 => Quat::from_rotation_z(-FRAC_PI_2),
        2 => Quat::from_rotation_z(FRAC_PI_2),
        3 => Quat::from_rotation_x(FRAC_PI_2),
        4 => Quat::from_rotation_x(-FRAC_PI_2),
        _ => return None,
    };
    Some(q)
}

/// Compact per-instance matrix handed to instanced rendering.
///
/// Column-major 3x4: three rotation/scale columns followed by the
/// translation column, 12 floats with no padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceTransform {
    pub cols: [[f32; 3]; 4],
}

impl InstanceTransform {
    /// Size of one instance in a GPU buffer, in bytes.
    pub const STRIDE: usize = 12 * 4;

    /// Packs a rotation, a uniform scale and a translation.
    #[inline]
    pub fn from_rotation_translation(rotation: Quat, scale: f32, translation: Vec3) -> Self {
        let r = Mat3::from_quat(rotation) * scale;
        Self {
            cols: [
                r.x_axis.to_array(),
                r.y_axis.to_array(),
                r.z_axis.to_array(),
                translation.to_array(),
            ],
        }
    }

    #[inline]
    pub fn translation(&self) -> Vec3 {
        Vec3::from_array(self.cols[3])
    }

    /// The rotation/scale block as a [`Mat3`].
    #[inline]
    pub fn basis(&self) -> Mat3 {
        Mat3::from_cols(
            Vec3::from_array(self.cols[0]),
            Vec3::from_array(self.cols[1]),
            Vec3::from_array(self.cols[2]),
        )
    }
}
