use tracing::debug;

use crate::{
    error::{FractalError, Result},
    part::{FractalPart, InstanceTransform},
    types::{FAN_OUT, LevelIndex, PartIndex},
};

/// Storage for one depth tier: its parts and their packed transforms.
///
/// Both arrays always have the same length, `5^level`.
#[derive(Debug, Default)]
pub struct Level {
    pub parts: Vec<FractalPart>,
    pub transforms: Vec<InstanceTransform>,
}

impl Level {
    fn try_with_len(len: usize) -> Result<Self> {
        let mut parts = Vec::new();
        parts
            .try_reserve_exact(len)
            .map_err(|e| FractalError::Allocation(format!("{len} parts: {e}")))?;
        let mut transforms = Vec::new();
        transforms
            .try_reserve_exact(len)
            .map_err(|e| FractalError::Allocation(format!("{len} transforms: {e}")))?;

        parts.resize(len, FractalPart::default());
        transforms.resize(len, InstanceTransform::default());
        Ok(Self { parts, transforms })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Flat per-level arena for every part of a fractal tree.
///
/// Level `i` holds `5^i` parts; element `j` of level `i` has element
/// `j / 5` of level `i - 1` as its parent. Nothing is stored as pointers,
/// so a whole level can be handed to a parallel map as one slice.
#[derive(Debug)]
pub struct PartTable {
    levels: Vec<Level>,
    depth: usize,
    released: bool,
    populated: bool,
}

/// Returns the parent offset of a part at level `>= 1`.
#[inline]
pub fn parent_index(child: PartIndex) -> PartIndex {
    child / FAN_OUT
}

/// Number of parts at `level`, or `None` on overflow.
#[inline]
pub fn level_len(level: LevelIndex) -> Option<usize> {
    u32::try_from(level)
        .ok()
        .and_then(|l| FAN_OUT.checked_pow(l))
}

/// Total part count of a tree with `depth` levels: `(5^depth - 1) / 4`.
pub fn total_parts_for_depth(depth: usize) -> Option<usize> {
    (0..depth).try_fold(0usize, |acc, level| acc.checked_add(level_len(level)?))
}

impl PartTable {
    /// Reserves storage for `depth` levels.
    ///
    /// Parts start out as defaults; they are not usable until
    /// [`crate::factory::populate`] has run.
    ///
    /// ### Errors
    /// [`FractalError::Allocation`] if `depth` is zero, if the part count
    /// overflows, or if memory cannot be reserved. No partial table is
    /// returned in that case.
    pub fn allocate(depth: usize) -> Result<Self> {
        if depth < 1 {
            return Err(FractalError::Allocation(format!(
                "depth must be at least 1, got {depth}"
            )));
        }

        let total = total_parts_for_depth(depth).ok_or_else(|| {
            FractalError::Allocation(format!("part count for depth {depth} overflows"))
        })?;

        let mut levels = Vec::new();
        levels
            .try_reserve_exact(depth)
            .map_err(|e| FractalError::Allocation(format!("{depth} levels: {e}")))?;

        for level in 0..depth {
            // Cannot fail: the total above already fit.
            let len = level_len(level).unwrap_or_default();
            levels.push(Level::try_with_len(len)?);
        }

        debug!(depth, parts = total, "allocated part table");

        Ok(Self {
            levels,
            depth,
            released: false,
            populated: false,
        })
    }

    /// Frees every level.
    ///
    /// ### Errors
    /// [`FractalError::LifecycleMisuse`] if the table was already released.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Err(FractalError::misuse("part table released twice"));
        }
        // Drop the buffers outright instead of clearing so the memory is returned.
        self.levels = Vec::new();
        self.released = true;
        self.populated = false;
        debug!(depth = self.depth, "released part table");
        Ok(())
    }

    /// Depth the table was allocated with.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of live levels; zero after [`PartTable::release`].
    #[inline]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Number of parts at `level`, zero for levels that do not exist.
    #[inline]
    pub fn part_count(&self, level: LevelIndex) -> usize {
        self.levels.get(level).map_or(0, Level::len)
    }

    /// Number of live parts over all levels.
    pub fn total_part_count(&self) -> usize {
        self.levels.iter().map(Level::len).sum()
    }

    #[inline]
    pub fn is_allocated(&self) -> bool {
        !self.released
    }

    #[inline]
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub(crate) fn mark_populated(&mut self) {
        self.populated = true;
    }

    #[inline]
    pub fn level(&self, level: LevelIndex) -> Option<&Level> {
        self.levels.get(level)
    }

    #[inline]
    pub fn level_mut(&mut self, level: LevelIndex) -> Option<&mut Level> {
        self.levels.get_mut(level)
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Splits the table at `level` (`>= 1`): the finished parent level is
    /// borrowed immutably, the level being updated mutably.
    ///
    /// ### Panics
    /// Panics if `level` is zero or not below [`PartTable::level_count`].
    pub fn parent_and_level_mut(&mut self, level: LevelIndex) -> (&Level, &mut Level) {
        assert!(level >= 1, "level 0 has no parent level");
        let (head, tail) = self.levels.split_at_mut(level);
        (&head[level - 1], &mut tail[0])
    }
}
