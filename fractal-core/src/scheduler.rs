//! Frame driver: root first, then one parallel map per level.
//!
//! Level `i` only starts after every write of level `i - 1` has finished.
//! Within a level the element order is unobservable, so every
//! [`ExecutionStrategy`] produces the same transforms bit for bit.

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::trace;

use crate::{
    error::{FractalError, Result},
    kernel::{self, RootTransform},
    table::PartTable,
};

/// How the parts of one level are spread over threads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Every level on the calling thread.
    Sequential,
    /// rayon's global pool.
    #[default]
    Parallel,
    /// A dedicated pool with a fixed number of worker threads.
    Pool { threads: usize },
}

/// Drives the per-frame update of a [`PartTable`].
pub struct FractalScheduler {
    strategy: ExecutionStrategy,
    pool: Option<ThreadPool>,
}

impl std::fmt::Debug for FractalScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FractalScheduler")
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl Default for FractalScheduler {
    fn default() -> Self {
        Self {
            strategy: ExecutionStrategy::Parallel,
            pool: None,
        }
    }
}

impl FractalScheduler {
    /// Creates a scheduler, building the worker pool for
    /// [`ExecutionStrategy::Pool`].
    ///
    /// ### Errors
    /// [`FractalError::Configuration`] for a pool of zero threads,
    /// [`FractalError::Allocation`] if the pool cannot be started.
    pub fn new(strategy: ExecutionStrategy) -> Result<Self> {
        let pool = match strategy {
            ExecutionStrategy::Pool { threads: 0 } => {
                return Err(FractalError::config("worker pool needs at least one thread"));
            }
            ExecutionStrategy::Pool { threads } => Some(
                ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("fractal-level-{i}"))
                    .build()
                    .map_err(|e| FractalError::Allocation(format!("worker pool: {e}")))?,
            ),
            _ => None,
        };
        Ok(Self { strategy, pool })
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    /// Advances every part of `table` by `dt`.
    ///
    /// The root is placed by `root` directly; level `i >= 1` is updated with
    /// scale `root.scale * 0.5^i` from its parent level, which has already
    /// been written this frame. Returns once all levels are final.
    ///
    /// ### Errors
    /// [`FractalError::LifecycleMisuse`] if the table was released or never
    /// populated.
    pub fn update(&self, table: &mut PartTable, dt: f32, root: &RootTransform) -> Result<()> {
        if !table.is_allocated() {
            return Err(FractalError::misuse("update on a released part table"));
        }
        if !table.is_populated() {
            return Err(FractalError::misuse("update before populate"));
        }

        match &self.pool {
            Some(pool) => pool.install(|| self.run_levels(table, dt, root)),
            None => self.run_levels(table, dt, root),
        }
        Ok(())
    }

    fn run_levels(&self, table: &mut PartTable, dt: f32, root: &RootTransform) {
        if let Some(level) = table.level_mut(0) {
            let Some((part, transform)) = level.parts.first_mut().zip(level.transforms.first_mut())
            else {
                return;
            };
            *transform = kernel::update_root(part, root, dt);
        }

        for li in 1..table.level_count() {
            let scale = kernel::level_scale(root.scale, li);
            let (parents, level) = table.parent_and_level_mut(li);
            trace!(level = li, parts = level.len(), scale, "updating level");

            match self.strategy {
                ExecutionStrategy::Sequential => {
                    kernel::update_level_sequential(level, parents, scale, dt)
                }
                ExecutionStrategy::Parallel | ExecutionStrategy::Pool { .. } => {
                    kernel::update_level_parallel(level, parents, scale, dt)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{SpawnRanges, populate};
    use glam::{Quat, Vec3};
    use rand::{SeedableRng, rngs::StdRng};

    fn lively() -> SpawnRanges {
        SpawnRanges {
            sag_low: 15.0,
            sag_high: 25.0,
            spin_speed_low: 20.0,
            spin_speed_high: 25.0,
            reverse_spin_chance: 0.25,
        }
    }

    fn table(depth: usize, ranges: &SpawnRanges, seed: u64) -> PartTable {
        let mut t = PartTable::allocate(depth).unwrap();
        populate(&mut t, ranges, &mut StdRng::seed_from_u64(seed)).unwrap();
        t
    }

    fn root() -> RootTransform {
        RootTransform {
            position: Vec3::new(0.5, -1.0, 2.0),
            rotation: Quat::from_rotation_x(0.3),
            scale: 1.5,
        }
    }

    fn transform_bytes(t: &PartTable) -> Vec<u8> {
        t.levels()
            .iter()
            .flat_map(|l| bytemuck::cast_slice::<_, u8>(&l.transforms).to_vec())
            .collect()
    }

    #[test]
    fn end_to_end_still_tree_stacks_slot_zero_children() {
        let mut t = table(3, &SpawnRanges::STILL, 0);
        let scheduler = FractalScheduler::new(ExecutionStrategy::Sequential).unwrap();
        scheduler.update(&mut t, 0.0, &RootTransform::default()).unwrap();

        let eps = 1e-6;
        let l1 = t.level(1).unwrap().parts[0].world_position;
        let l2 = t.level(2).unwrap().parts[0].world_position;
        assert!(l1.abs_diff_eq(Vec3::new(0.0, 0.75, 0.0), eps), "got {l1:?}");
        assert!(l2.abs_diff_eq(Vec3::new(0.0, 1.125, 0.0), eps), "got {l2:?}");
    }

    #[test]
    fn end_to_end_root_scale_two_reaches_one_and_a_half() {
        let mut t = table(3, &SpawnRanges::STILL, 0);
        let scheduler = FractalScheduler::new(ExecutionStrategy::Parallel).unwrap();
        let root = RootTransform {
            scale: 2.0,
            ..RootTransform::default()
        };
        scheduler.update(&mut t, 0.0, &root).unwrap();

        let eps = 1e-6;
        let l1 = t.level(1).unwrap().parts[0].world_position;
        let l2 = t.level(2).unwrap().parts[0].world_position;
        assert!(l1.abs_diff_eq(Vec3::new(0.0, 1.5, 0.0), eps), "got {l1:?}");
        assert!(l2.abs_diff_eq(Vec3::new(0.0, 2.25, 0.0), eps), "got {l2:?}");
    }

    #[test]
    fn zero_dt_frames_are_idempotent() {
        let mut t = table(4, &lively(), 17);
        let scheduler = FractalScheduler::default();

        scheduler.update(&mut t, 0.0, &root()).unwrap();
        let first: Vec<_> = t.levels().iter().map(|l| l.parts.clone()).collect();
        let first_bytes = transform_bytes(&t);

        for _ in 0..3 {
            scheduler.update(&mut t, 0.0, &root()).unwrap();
        }
        let again: Vec<_> = t.levels().iter().map(|l| l.parts.clone()).collect();
        assert_eq!(first, again);
        assert_eq!(first_bytes, transform_bytes(&t));
    }

    #[test]
    fn every_strategy_produces_identical_transforms() {
        let strategies = [
            ExecutionStrategy::Sequential,
            ExecutionStrategy::Parallel,
            ExecutionStrategy::Pool { threads: 3 },
        ];
        let dts = [1.0 / 60.0, 1.0 / 30.0, 0.0, 1.0 / 144.0];

        let runs: Vec<Vec<u8>> = strategies
            .iter()
            .map(|&s| {
                let scheduler = FractalScheduler::new(s).unwrap();
                let mut t = table(5, &lively(), 99);
                for dt in dts {
                    scheduler.update(&mut t, dt, &root()).unwrap();
                }
                transform_bytes(&t)
            })
            .collect();

        assert_eq!(runs[0], runs[1]);
        assert_eq!(runs[0], runs[2]);
    }

    #[test]
    fn children_hang_off_their_parent_position() {
        let mut t = table(3, &lively(), 4);
        FractalScheduler::default()
            .update(&mut t, 0.1, &root())
            .unwrap();

        for li in 1..3 {
            let parents = &t.level(li - 1).unwrap().parts;
            let scale = kernel::level_scale(root().scale, li);
            for (i, part) in t.level(li).unwrap().parts.iter().enumerate() {
                let parent = parents[i / 5];
                let d = part.world_position.distance(parent.world_position);
                assert!((d - 1.5 * scale).abs() < 1e-4, "level {li} part {i}: {d}");
            }
        }
    }

    #[test]
    fn update_before_populate_is_misuse() {
        let mut t = PartTable::allocate(3).unwrap();
        let err = FractalScheduler::default()
            .update(&mut t, 0.0, &RootTransform::default())
            .unwrap_err();
        assert!(matches!(err, FractalError::LifecycleMisuse(_)));
    }

    #[test]
    fn update_after_release_is_misuse() {
        let mut t = table(3, &lively(), 1);
        t.release().unwrap();
        let err = FractalScheduler::default()
            .update(&mut t, 0.0, &RootTransform::default())
            .unwrap_err();
        assert!(matches!(err, FractalError::LifecycleMisuse(_)));
    }

    #[test]
    fn zero_thread_pool_is_rejected() {
        let err = FractalScheduler::new(ExecutionStrategy::Pool { threads: 0 }).unwrap_err();
        assert!(matches!(err, FractalError::Configuration(_)));
    }
}
