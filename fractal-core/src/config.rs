use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    error::{FractalError, Result},
    export::ColorGradient,
    factory::SpawnRanges,
    types::{MAX_DEPTH, MIN_DEPTH},
};

/// Closed `[low, high]` interval used for the construction-time draws.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub low: f32,
    pub high: f32,
}

impl ValueRange {
    pub const fn new(low: f32, high: f32) -> Self {
        Self { low, high }
    }

    /// Rejects a range that is non-finite, inverted or outside `[min, max]`.
    pub(crate) fn check(&self, name: &str, min: f32, max: f32) -> Result<()> {
        let ok = self.low.is_finite()
            && self.high.is_finite()
            && self.low >= min
            && self.high <= max
            && self.low <= self.high;
        if ok {
            Ok(())
        } else {
            Err(FractalError::config(format!(
                "{name} range [{}, {}] must be ordered and within [{min}, {max}]",
                self.low, self.high
            )))
        }
    }
}

/// Colors the exporter hands to the renderer.
///
/// Non-leaf levels sample the two gradients; the deepest level uses the
/// fixed leaf colors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShadingConfig {
    pub gradient_a: ColorGradient,
    pub gradient_b: ColorGradient,
    pub leaf_color_a: [f32; 4],
    pub leaf_color_b: [f32; 4],
}

impl Default for ShadingConfig {
    fn default() -> Self {
        Self {
            gradient_a: ColorGradient::two_key([0.35, 0.22, 0.12, 1.0], [0.55, 0.42, 0.25, 1.0]),
            gradient_b: ColorGradient::two_key([0.28, 0.18, 0.10, 1.0], [0.62, 0.55, 0.33, 1.0]),
            leaf_color_a: [0.25, 0.62, 0.18, 1.0],
            leaf_color_b: [0.45, 0.78, 0.22, 1.0],
        }
    }
}

/// Host-facing configuration of a fractal tree.
///
/// Angles are in degrees and speeds in degrees per second; the factory
/// converts them to radians when parts are drawn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FractalConfig {
    pub depth: usize,
    pub sag_angle: ValueRange,
    pub spin_speed: ValueRange,
    pub reverse_spin_chance: f32,
    pub shading: ShadingConfig,
}

impl Default for FractalConfig {
    fn default() -> Self {
        Self {
            depth: 4,
            sag_angle: ValueRange::new(15.0, 25.0),
            spin_speed: ValueRange::new(20.0, 25.0),
            reverse_spin_chance: 0.25,
            shading: ShadingConfig::default(),
        }
    }
}

impl FractalConfig {
    /// Largest sag and spin values accepted, in degrees (per second).
    pub const MAX_ANGLE_DEG: f32 = 90.0;

    /// Checks every field against its valid bounds.
    ///
    /// Values are never clamped; anything out of range is rejected.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_DEPTH..=MAX_DEPTH).contains(&self.depth) {
            return Err(FractalError::config(format!(
                "depth {} must be within {MIN_DEPTH}..={MAX_DEPTH}",
                self.depth
            )));
        }
        self.spawn_ranges().validate()
    }

    /// The construction-time ranges handed to the part factory.
    pub fn spawn_ranges(&self) -> SpawnRanges {
        SpawnRanges {
            sag_low: self.sag_angle.low,
            sag_high: self.sag_angle.high,
            spin_speed_low: self.spin_speed.low,
            spin_speed_high: self.spin_speed.high,
            reverse_spin_chance: self.reverse_spin_chance,
        }
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(FractalConfig::default().validate().is_ok());
    }

    #[test]
    fn depth_outside_three_to_eight_is_rejected() {
        for depth in [0, 1, 2, 9, 20] {
            let cfg = FractalConfig {
                depth,
                ..FractalConfig::default()
            };
            let err = cfg.validate().unwrap_err();
            assert!(matches!(err, FractalError::Configuration(_)), "depth {depth}");
        }
        for depth in 3..=8 {
            let cfg = FractalConfig {
                depth,
                ..FractalConfig::default()
            };
            assert!(cfg.validate().is_ok(), "depth {depth}");
        }
    }

    #[test]
    fn reversed_or_out_of_bounds_ranges_are_rejected() {
        let mut cfg = FractalConfig::default();
        cfg.sag_angle = ValueRange::new(30.0, 10.0);
        assert!(cfg.validate().is_err());

        cfg.sag_angle = ValueRange::new(0.0, 120.0);
        assert!(cfg.validate().is_err());

        cfg.sag_angle = ValueRange::new(-1.0, 10.0);
        assert!(cfg.validate().is_err());

        cfg.sag_angle = ValueRange::new(0.0, 90.0);
        cfg.spin_speed = ValueRange::new(f32::NAN, 10.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn reverse_chance_must_be_a_probability() {
        let mut cfg = FractalConfig::default();
        for chance in [-0.1, 1.5, f32::NAN] {
            cfg.reverse_spin_chance = chance;
            assert!(cfg.validate().is_err(), "chance {chance}");
        }
        cfg.reverse_spin_chance = 1.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let cfg = FractalConfig::from_json_str(r#"{ "depth": 6, "reverse_spin_chance": 0.5 }"#)
            .unwrap();
        assert_eq!(cfg.depth, 6);
        assert_eq!(cfg.reverse_spin_chance, 0.5);
        assert_eq!(cfg.sag_angle, FractalConfig::default().sag_angle);
    }

    #[test]
    fn json_with_invalid_depth_fails_validation() {
        let err = FractalConfig::from_json_str(r#"{ "depth": 12 }"#).unwrap_err();
        assert!(matches!(err, FractalError::Configuration(_)));

        let err = FractalConfig::from_json_str("{ depth: ").unwrap_err();
        assert!(matches!(err, FractalError::ConfigParse(_)));
    }

    #[test]
    fn load_reports_missing_file_as_io_error() {
        let err = FractalConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, FractalError::Io(_)));
    }
}
