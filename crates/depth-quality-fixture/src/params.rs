use serde::{Deserialize, Serialize};

use crate::fiducial::FiducialTable;

/// Backplate thickness of the fabricated fixtures, in millimetres.
pub const BACKPLATE_THICKNESS: f64 = 6.35;
/// Pattern-plate thickness of the fabricated fixtures, in millimetres.
pub const PATTERN_PLATE_THICKNESS: f64 = 3.0;
/// Absolute tolerance for matching submesh extents against plate thicknesses.
pub const DEFAULT_CLASSIFICATION_TOLERANCE: f64 = 1e-6;

/// Physical description of a fixture.
///
/// Thicknesses are measured along the fixture's z axis; the backplate starts
/// at `z = 0` and the pattern plate sits directly on top of it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureSpec {
    pub backplate_thickness: f64,
    pub pattern_plate_thickness: f64,
    pub classification_tolerance: f64,
    pub fiducials: FiducialTable,
}

impl Default for FixtureSpec {
    fn default() -> Self {
        Self {
            backplate_thickness: BACKPLATE_THICKNESS,
            pattern_plate_thickness: PATTERN_PLATE_THICKNESS,
            classification_tolerance: DEFAULT_CLASSIFICATION_TOLERANCE,
            fiducials: FiducialTable::standard(),
        }
    }
}

impl FixtureSpec {
    pub fn with_thicknesses(backplate: f64, pattern_plate: f64) -> Self {
        Self {
            backplate_thickness: backplate,
            pattern_plate_thickness: pattern_plate,
            ..Self::default()
        }
    }

    /// Top face of the pattern plate.
    pub fn pattern_plate_top(&self) -> f64 {
        self.backplate_thickness + self.pattern_plate_thickness
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let spec: FixtureSpec =
            serde_json::from_str(r#"{ "classification_tolerance": 0.01 }"#).unwrap();
        assert_eq!(spec.backplate_thickness, BACKPLATE_THICKNESS);
        assert_eq!(spec.classification_tolerance, 0.01);
        assert_eq!(spec.fiducials.len(), 4);
        assert!((spec.pattern_plate_top() - 9.35).abs() < 1e-12);
    }
}
