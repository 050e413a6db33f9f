//! Per-frame transform math for fractal parts.
//!
//! The update of one level is a pure map: every element reads its own slot
//! plus its (already finished) parent and writes only its own slot. That is
//! what allows [`update_level_parallel`] and [`update_level_sequential`] to
//! produce bit-identical results.

use glam::{Quat, Vec3};
use rayon::prelude::*;

use crate::{
    part::{FractalPart, InstanceTransform},
    table::{Level, parent_index},
};

/// Offset of a child from its parent along the child's own up axis, in
/// units of the child's scale.
pub const BRANCH_LENGTH: f32 = 1.5;

/// Scale factor applied from one level to the next.
pub const LEVEL_SCALE_FACTOR: f32 = 0.5;

/// Smallest number of parts a rayon task is handed within one level.
const MIN_PARTS_PER_TASK: usize = 5;

/// World placement of the whole tree, sampled once per frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RootTransform {
    pub position: Vec3,
    pub rotation: Quat,
    /// Uniform scale of the root part.
    pub scale: f32,
}

impl Default for RootTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
        }
    }
}

/// Uniform scale of the parts at `level`: `root_scale * 0.5^level`.
#[inline]
pub fn level_scale(root_scale: f32, level: usize) -> f32 {
    (0..level).fold(root_scale, |s, _| s * LEVEL_SCALE_FACTOR)
}

/// Parent rotation with the droop of a child in slot `orientation` applied.
///
/// The droop angle is `max_sag_angle` scaled by how far the child's up
/// axis leans away from global up. Returns `parent_rotation` unchanged when
/// that axis points exactly up or exactly down; the sag axis is undefined
/// there and no division takes place.
#[inline]
pub fn sagged_base_rotation(parent_rotation: Quat, orientation: Quat, max_sag_angle: f32) -> Quat {
    let up_axis = (parent_rotation * orientation) * Vec3::Y;
    let sag_axis = Vec3::Y.cross(up_axis);
    let sag_magnitude = sag_axis.length();

    if sag_magnitude > 0.0 {
        let axis = sag_axis / sag_magnitude;
        let sag = Quat::from_axis_angle(axis, max_sag_angle * sag_magnitude);
        // Sag is applied before the parent rotation, not after it.
        sag * parent_rotation
    } else {
        parent_rotation
    }
}

/// Advances one non-root part by `dt` and returns its packed transform.
///
/// ### Parameters
/// - `part` - The part's slot; spin angle, world rotation and world
///   position are rewritten.
/// - `parent` - The parent part, already updated this frame.
/// - `scale` - Uniform scale of the part's level.
/// - `dt` - Frame time in seconds.
#[inline]
pub fn update_part(
    part: &mut FractalPart,
    parent: &FractalPart,
    scale: f32,
    dt: f32,
) -> InstanceTransform {
    part.spin_angle += part.spin_velocity * dt;

    let base = sagged_base_rotation(parent.world_rotation, part.orientation, part.max_sag_angle);
    part.world_rotation = base * (part.orientation * Quat::from_rotation_y(part.spin_angle));
    part.world_position =
        parent.world_position + part.world_rotation * Vec3::new(0.0, BRANCH_LENGTH * scale, 0.0);

    InstanceTransform::from_rotation_translation(part.world_rotation, scale, part.world_position)
}

/// Advances the root part, which has no parent: it is placed directly by
/// the tree's own world transform.
#[inline]
pub fn update_root(part: &mut FractalPart, root: &RootTransform, dt: f32) -> InstanceTransform {
    part.spin_angle += part.spin_velocity * dt;
    part.world_rotation =
        root.rotation * (part.orientation * Quat::from_rotation_y(part.spin_angle));
    part.world_position = root.position;

    InstanceTransform::from_rotation_translation(part.world_rotation, root.scale, part.world_position)
}

/// Updates every part of `level` on the calling thread.
pub fn update_level_sequential(level: &mut Level, parents: &Level, scale: f32, dt: f32) {
    let Level { parts, transforms } = level;
    for (i, (part, transform)) in parts.iter_mut().zip(transforms.iter_mut()).enumerate() {
        *transform = update_part(part, &parents.parts[parent_index(i)], scale, dt);
    }
}

/// Updates every part of `level` on the current rayon pool.
///
/// Returns only after every element has been written, which is the
/// barrier the next level waits on.
pub fn update_level_parallel(level: &mut Level, parents: &Level, scale: f32, dt: f32) {
    let Level { parts, transforms } = level;
    let parent_parts = parents.parts.as_slice();

    parts
        .par_iter_mut()
        .zip(transforms.par_iter_mut())
        .enumerate()
        .with_min_len(MIN_PARTS_PER_TASK)
        .for_each(|(i, (part, transform))| {
            *transform = update_part(part, &parent_parts[parent_index(i)], scale, dt);
        });
}
