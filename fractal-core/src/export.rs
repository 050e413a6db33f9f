//! Hand-off of finished transform buffers to an instanced renderer.
//!
//! The exporter owns nothing GPU-specific: it issues one [`DrawRequest`] per
//! level through the [`Renderer`] trait, which a backend implements.

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    config::ShadingConfig,
    kernel::RootTransform,
    part::InstanceTransform,
    table::PartTable,
};

pub type Rgba = [f32; 4];

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientKey {
    pub time: f32,
    pub color: Rgba,
}

/// Piecewise-linear color ramp over `[0, 1]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorGradient {
    keys: Vec<GradientKey>,
}

impl ColorGradient {
    /// Builds a gradient from keys in any order.
    pub fn new(mut keys: Vec<GradientKey>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    pub fn two_key(start: Rgba, end: Rgba) -> Self {
        Self::new(vec![
            GradientKey {
                time: 0.0,
                color: start,
            },
            GradientKey {
                time: 1.0,
                color: end,
            },
        ])
    }

    /// Samples the gradient; `t` outside the key range takes the nearest
    /// end color, an empty gradient is white.
    pub fn evaluate(&self, t: f32) -> Rgba {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return [1.0; 4];
        };
        if t <= first.time {
            return first.color;
        }
        if t >= last.time {
            return last.color;
        }

        for pair in self.keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.time {
                let span = b.time - a.time;
                let f = if span > 0.0 { (t - a.time) / span } else { 1.0 };
                return lerp_rgba(a.color, b.color, f);
            }
        }
        last.color
    }
}

#[inline]
fn lerp_rgba(a: Rgba, b: Rgba, t: f32) -> Rgba {
    std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
}

/// Which mesh a level is drawn with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshKind {
    Branch,
    /// Deepest level only.
    Leaf,
}

/// Axis-aligned box that encloses the whole tree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub center: Vec3,
    pub size: Vec3,
}

impl Bounds {
    /// The tree never reaches further than 1.5 root scales from the root.
    pub fn for_root(root: &RootTransform) -> Self {
        Self {
            center: root.position,
            size: Vec3::splat(3.0 * root.scale),
        }
    }
}

/// Per-level material parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadingParams {
    pub color_a: Rgba,
    pub color_b: Rgba,
    /// Per-level pseudo-random numbers the shader uses to vary instances.
    pub sequence: [f32; 4],
}

impl ShadingParams {
    /// Color of instance `index`, mixed the way the instanced shader does:
    /// rgb between `color_a` and `color_b` at `frac(i * seq.x + seq.y)`,
    /// alpha at `frac(i * seq.z + seq.w)`.
    pub fn instance_color(&self, index: usize) -> Rgba {
        let i = index as f32;
        let [sx, sy, sz, sw] = self.sequence;
        let rgb_t = (i * sx + sy).fract();
        let alpha_t = (i * sz + sw).fract();

        let mut c = lerp_rgba(self.color_a, self.color_b, rgb_t);
        c[3] = self.color_a[3] + (self.color_b[3] - self.color_a[3]) * alpha_t;
        c
    }
}

/// Everything a backend needs to issue one instanced draw.
#[derive(Clone, Copy, Debug)]
pub struct DrawRequest<'a> {
    pub level: usize,
    pub mesh: MeshKind,
    pub transforms: &'a [InstanceTransform],
    pub instance_count: usize,
    pub bounds: Bounds,
    pub shading: ShadingParams,
}

impl DrawRequest<'_> {
    /// The transform buffer as raw bytes, ready for upload.
    pub fn transform_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.transforms)
    }
}

/// Consumer of the per-level draw requests.
pub trait Renderer {
    fn draw_instanced(&mut self, request: DrawRequest<'_>);
}

/// Turns the per-level transform buffers of a [`PartTable`] into draw
/// requests.
#[derive(Clone, Debug)]
pub struct InstanceExporter {
    shading: ShadingConfig,
    sequences: Vec<[f32; 4]>,
}

impl InstanceExporter {
    /// Draws one sequence vector per level from `rng`.
    pub fn new(shading: ShadingConfig, level_count: usize, rng: &mut impl Rng) -> Self {
        let sequences = (0..level_count)
            .map(|_| std::array::from_fn(|_| rng.random::<f32>()))
            .collect();
        Self { shading, sequences }
    }

    pub fn level_count(&self) -> usize {
        self.sequences.len()
    }

    pub fn sequence(&self, level: usize) -> Option<[f32; 4]> {
        self.sequences.get(level).copied()
    }

    /// Mesh and material for `level`.
    ///
    /// Branch levels sample both gradients at `level / (level_count - 2)`,
    /// so the level just above the leaves gets the gradient end colors.
    pub fn shading_for_level(&self, level: usize) -> (MeshKind, ShadingParams) {
        let count = self.sequences.len();
        let sequence = self.sequence(level).unwrap_or_default();
        let leaf = count.saturating_sub(1);

        if level == leaf {
            return (
                MeshKind::Leaf,
                ShadingParams {
                    color_a: self.shading.leaf_color_a,
                    color_b: self.shading.leaf_color_b,
                    sequence,
                },
            );
        }

        let t = level as f32 / count.saturating_sub(2).max(1) as f32;
        (
            MeshKind::Branch,
            ShadingParams {
                color_a: self.shading.gradient_a.evaluate(t),
                color_b: self.shading.gradient_b.evaluate(t),
                sequence,
            },
        )
    }

    /// Submits one draw per level of `table`.
    ///
    /// Must only be called once the frame's update has finished for every
    /// level.
    pub fn export<R: Renderer + ?Sized>(
        &self,
        table: &PartTable,
        root: &RootTransform,
        renderer: &mut R,
    ) {
        let bounds = Bounds::for_root(root);
        for (li, level) in table.levels().iter().enumerate() {
            let (mesh, shading) = self.shading_for_level(li);
            renderer.draw_instanced(DrawRequest {
                level: li,
                mesh,
                transforms: &level.transforms,
                instance_count: level.transforms.len(),
                bounds,
                shading,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{SpawnRanges, populate};
    use rand::{SeedableRng, rngs::StdRng};

    #[derive(Default)]
    struct Recorder {
        draws: Vec<(usize, MeshKind, usize, usize, Bounds, ShadingParams)>,
    }

    impl Renderer for Recorder {
        fn draw_instanced(&mut self, r: DrawRequest<'_>) {
            assert_eq!(r.transform_bytes().len(), r.instance_count * InstanceTransform::STRIDE);
            self.draws
                .push((r.level, r.mesh, r.instance_count, r.transforms.len(), r.bounds, r.shading));
        }
    }

    fn shading() -> ShadingConfig {
        ShadingConfig {
            gradient_a: ColorGradient::two_key([0.0, 0.0, 0.0, 0.0], [1.0, 1.0, 1.0, 1.0]),
            gradient_b: ColorGradient::two_key([1.0, 0.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0]),
            leaf_color_a: [0.0, 1.0, 0.0, 1.0],
            leaf_color_b: [0.0, 0.5, 0.0, 1.0],
        }
    }

    #[test]
    fn gradient_clamps_and_interpolates() {
        let g = ColorGradient::new(vec![
            GradientKey {
                time: 1.0,
                color: [1.0, 1.0, 1.0, 1.0],
            },
            GradientKey {
                time: 0.0,
                color: [0.0, 0.0, 0.0, 1.0],
            },
            GradientKey {
                time: 0.5,
                color: [1.0, 0.0, 0.0, 1.0],
            },
        ]);

        assert_eq!(g.evaluate(-1.0), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(g.evaluate(2.0), [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(g.evaluate(0.25), [0.5, 0.0, 0.0, 1.0]);
        assert_eq!(g.evaluate(0.75), [1.0, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn empty_gradient_is_white() {
        assert_eq!(ColorGradient::new(Vec::new()).evaluate(0.3), [1.0; 4]);
    }

    #[test]
    fn export_issues_one_draw_per_level_with_leaf_last() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut table = PartTable::allocate(4).unwrap();
        populate(&mut table, &SpawnRanges::STILL, &mut rng).unwrap();

        let exporter = InstanceExporter::new(shading(), 4, &mut rng);
        let root = RootTransform {
            position: Vec3::new(1.0, 2.0, 3.0),
            scale: 2.0,
            ..RootTransform::default()
        };
        let mut rec = Recorder::default();
        exporter.export(&table, &root, &mut rec);

        assert_eq!(rec.draws.len(), 4);
        for (li, draw) in rec.draws.iter().enumerate() {
            let (level, mesh, count, len, bounds, _) = *draw;
            assert_eq!(level, li);
            assert_eq!(count, 5usize.pow(li as u32));
            assert_eq!(len, count);
            assert_eq!(bounds.center, root.position);
            assert_eq!(bounds.size, Vec3::splat(6.0));
            let expected = if li == 3 { MeshKind::Leaf } else { MeshKind::Branch };
            assert_eq!(mesh, expected);
        }
    }

    #[test]
    fn branch_levels_walk_the_gradient_and_leaves_use_leaf_colors() {
        let mut rng = StdRng::seed_from_u64(2);
        let exporter = InstanceExporter::new(shading(), 4, &mut rng);

        let (_, root) = exporter.shading_for_level(0);
        assert_eq!(root.color_a, [0.0, 0.0, 0.0, 0.0]);
        assert_eq!(root.color_b, [1.0, 0.0, 0.0, 1.0]);

        // Level 2 of 4 is the last branch level: t = 2 / 2.
        let (_, last_branch) = exporter.shading_for_level(2);
        assert_eq!(last_branch.color_a, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(last_branch.color_b, [0.0, 0.0, 1.0, 1.0]);

        let (mesh, leaf) = exporter.shading_for_level(3);
        assert_eq!(mesh, MeshKind::Leaf);
        assert_eq!(leaf.color_a, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(leaf.color_b, [0.0, 0.5, 0.0, 1.0]);
        assert_eq!(Some(leaf.sequence), exporter.sequence(3));
    }

    #[test]
    fn sequences_are_unit_interval_and_seeded() {
        let a = InstanceExporter::new(shading(), 6, &mut StdRng::seed_from_u64(5));
        let b = InstanceExporter::new(shading(), 6, &mut StdRng::seed_from_u64(5));
        for level in 0..6 {
            let s = a.sequence(level).unwrap();
            assert!(s.iter().all(|v| (0.0..1.0).contains(v)));
            assert_eq!(a.sequence(level), b.sequence(level));
        }
        assert_eq!(a.sequence(6), None);
    }

    #[test]
    fn instance_color_mixes_between_level_colors() {
        let params = ShadingParams {
            color_a: [0.0, 0.0, 0.0, 0.0],
            color_b: [1.0, 1.0, 1.0, 1.0],
            sequence: [0.25, 0.0, 0.5, 0.0],
        };
        assert_eq!(params.instance_color(0), [0.0, 0.0, 0.0, 0.0]);
        assert_eq!(params.instance_color(1), [0.25, 0.25, 0.25, 0.5]);
        assert_eq!(params.instance_color(3), [0.75, 0.75, 0.75, 0.5]);
        // Wraps back to color_a.
        assert_eq!(params.instance_color(4), [0.0, 0.0, 0.0, 0.0]);
    }
}
