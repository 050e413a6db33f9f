/// Index of a part within its level.
///
/// This is an offset into one level's flat part and transform arrays, and
/// is only meaningful together with the level it was taken from.
pub type PartIndex = usize;

/// Depth tier of the tree; level 0 holds the single root part.
pub type LevelIndex = usize;

/// Number of children every non-leaf part owns.
pub const FAN_OUT: usize = 5;

/// Smallest and largest tree depth accepted by [`crate::config::FractalConfig`].
pub const MIN_DEPTH: usize = 3;
pub const MAX_DEPTH: usize = 8;
