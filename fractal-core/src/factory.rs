//! Construction of parts and initial population of a [`PartTable`].
//!
//! All randomness comes from the `rng` argument, so a seeded generator
//! reproduces the same tree.

use rand::Rng;
use tracing::debug;

use crate::{
    config::{FractalConfig, ValueRange},
    error::{FractalError, Result},
    part::{FractalPart, child_orientation},
    table::PartTable,
    types::FAN_OUT,
};

/// Ranges the construction-time attributes are drawn from.
///
/// Angles are in degrees, speeds in degrees per second.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnRanges {
    pub sag_low: f32,
    pub sag_high: f32,
    pub spin_speed_low: f32,
    pub spin_speed_high: f32,
    pub reverse_spin_chance: f32,
}

impl SpawnRanges {
    /// Ranges that produce motionless, perfectly rigid parts.
    pub const STILL: Self = Self {
        sag_low: 0.0,
        sag_high: 0.0,
        spin_speed_low: 0.0,
        spin_speed_high: 0.0,
        reverse_spin_chance: 0.0,
    };

    /// Checks that both ranges are finite, ordered and within
    /// `[0, FractalConfig::MAX_ANGLE_DEG]`, and that the reverse chance is a
    /// probability.
    ///
    /// ### Errors
    /// [`FractalError::Configuration`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        let max = FractalConfig::MAX_ANGLE_DEG;
        ValueRange::new(self.sag_low, self.sag_high).check("sag angle", 0.0, max)?;
        ValueRange::new(self.spin_speed_low, self.spin_speed_high)
            .check("spin speed", 0.0, max)?;
        if !(0.0..=1.0).contains(&self.reverse_spin_chance) {
            return Err(FractalError::config(format!(
                "reverse spin chance {} must be within [0, 1]",
                self.reverse_spin_chance
            )));
        }
        Ok(())
    }
}

/// Creates a part for child slot `child_index`.
///
/// The orientation is a fixed function of the slot. `max_sag_angle` and
/// the spin speed are drawn uniformly from their ranges; the spin is
/// reversed with probability `reverse_spin_chance`.
///
/// ### Errors
/// - [`FractalError::InvalidChildIndex`] if `child_index` is not in `0..=4`.
/// - [`FractalError::Configuration`] if `ranges` fails
///   [`SpawnRanges::validate`].
pub fn create_part(
    child_index: usize,
    ranges: &SpawnRanges,
    rng: &mut impl Rng,
) -> Result<FractalPart> {
    ranges.validate()?;
    let orientation =
        child_orientation(child_index).ok_or(FractalError::InvalidChildIndex(child_index))?;

    let sag_deg = rng.random_range(ranges.sag_low..=ranges.sag_high);
    let speed_deg = rng.random_range(ranges.spin_speed_low..=ranges.spin_speed_high);
    let reversed = rng.random::<f32>() < ranges.reverse_spin_chance;
    let sign = if reversed { -1.0 } else { 1.0 };

    Ok(FractalPart {
        orientation,
        max_sag_angle: sag_deg.to_radians(),
        spin_velocity: sign * speed_deg.to_radians(),
        ..FractalPart::default()
    })
}

/// Fills a freshly allocated table.
///
/// Level 0 gets a single slot-0 root; every deeper level is filled in
/// groups of five, one part per child slot.
///
/// ### Errors
/// - [`FractalError::LifecycleMisuse`] if the table was released or already
///   populated.
/// - [`FractalError::Configuration`] for invalid `ranges`; the table is left
///   untouched.
pub fn populate(table: &mut PartTable, ranges: &SpawnRanges, rng: &mut impl Rng) -> Result<()> {
    if !table.is_allocated() {
        return Err(FractalError::misuse("populate called on a released part table"));
    }
    if table.is_populated() {
        return Err(FractalError::misuse("part table populated twice"));
    }
    ranges.validate()?;

    for level in 0..table.level_count() {
        let Some(l) = table.level_mut(level) else {
            continue;
        };
        for (i, part) in l.parts.iter_mut().enumerate() {
            *part = create_part(i % FAN_OUT, ranges, rng)?;
        }
    }

    table.mark_populated();
    debug!(parts = table.total_part_count(), "populated part table");
    Ok(())
}
