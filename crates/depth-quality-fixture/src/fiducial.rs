//! Fiducial markers embedded in the fixture and their known corner positions.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::params::BACKPLATE_THICKNESS;

/// Named corner of a square marker face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CornerLocation {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl CornerLocation {
    pub const ALL: [CornerLocation; 4] = [
        CornerLocation::TopLeft,
        CornerLocation::TopRight,
        CornerLocation::BottomLeft,
        CornerLocation::BottomRight,
    ];

    /// Detectors report corners clockwise starting at the top-left one.
    pub const CLOCKWISE: [CornerLocation; 4] = [
        CornerLocation::TopLeft,
        CornerLocation::TopRight,
        CornerLocation::BottomRight,
        CornerLocation::BottomLeft,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CornerLocation::TopLeft => "top_left",
            CornerLocation::TopRight => "top_right",
            CornerLocation::BottomLeft => "bottom_left",
            CornerLocation::BottomRight => "bottom_right",
        }
    }
}

impl fmt::Display for CornerLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CornerLocation {
    type Err = FiducialLookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CornerLocation::ALL
            .into_iter()
            .find(|loc| loc.as_str() == s)
            .ok_or_else(|| FiducialLookupError::UnknownLocation(s.to_string()))
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FiducialLookupError {
    #[error("marker id {0} is not part of the fixture")]
    UnknownId(i32),
    #[error("unknown corner location {0:?}")]
    UnknownLocation(String),
}

/// Fixture-frame coordinates of one marker's four corners.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FiducialCorners {
    pub top_left: Point3<f64>,
    pub top_right: Point3<f64>,
    pub bottom_left: Point3<f64>,
    pub bottom_right: Point3<f64>,
}

impl FiducialCorners {
    pub fn get(&self, location: CornerLocation) -> Point3<f64> {
        match location {
            CornerLocation::TopLeft => self.top_left,
            CornerLocation::TopRight => self.top_right,
            CornerLocation::BottomLeft => self.bottom_left,
            CornerLocation::BottomRight => self.bottom_right,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fiducial {
    pub id: i32,
    pub corners: FiducialCorners,
}

/// The marker table of a fixture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FiducialTable {
    pub markers: Vec<Fiducial>,
}

impl Default for FiducialTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl FiducialTable {
    /// The four markers of the fabricated fixtures, one per quadrant, with
    /// every corner on the backplate's top face.
    pub fn standard() -> Self {
        let z = BACKPLATE_THICKNESS;
        let quadrant = |id: i32, sx: f64, sy: f64| Fiducial {
            id,
            corners: FiducialCorners {
                top_left: Point3::new(sx * 55.5625, sy * 28.575, z),
                top_right: Point3::new(sx * 75.5625, sy * 28.575, z),
                bottom_left: Point3::new(sx * 55.5625, sy * 48.575, z),
                bottom_right: Point3::new(sx * 75.5625, sy * 48.575, z),
            },
        };
        Self {
            markers: vec![
                quadrant(231, -1.0, 1.0),
                quadrant(123, 1.0, 1.0),
                quadrant(114, -1.0, -1.0),
                quadrant(141, 1.0, -1.0),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn get(&self, id: i32) -> Option<&Fiducial> {
        self.markers.iter().find(|m| m.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.markers.iter().map(|m| m.id)
    }

    pub fn coordinate(
        &self,
        id: i32,
        location: CornerLocation,
    ) -> Result<Point3<f64>, FiducialLookupError> {
        self.get(id)
            .map(|m| m.corners.get(location))
            .ok_or(FiducialLookupError::UnknownId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_matches_fabricated_layout() {
        let table = FiducialTable::standard();
        assert_eq!(table.ids().collect::<Vec<_>>(), vec![231, 123, 114, 141]);

        let p = table.coordinate(231, CornerLocation::TopRight).unwrap();
        assert_eq!(p, Point3::new(-75.5625, 28.575, 6.35));
        let p = table.coordinate(141, CornerLocation::BottomLeft).unwrap();
        assert_eq!(p, Point3::new(55.5625, -48.575, 6.35));
        let p = table.coordinate(114, CornerLocation::TopLeft).unwrap();
        assert_eq!(p, Point3::new(-55.5625, -28.575, 6.35));
    }

    #[test]
    fn unknown_id_and_location_fail() {
        let table = FiducialTable::standard();
        assert_eq!(
            table.coordinate(7, CornerLocation::TopLeft),
            Err(FiducialLookupError::UnknownId(7))
        );
        assert_eq!(
            "middle".parse::<CornerLocation>(),
            Err(FiducialLookupError::UnknownLocation("middle".into()))
        );
        assert_eq!(
            "bottom_right".parse::<CornerLocation>(),
            Ok(CornerLocation::BottomRight)
        );
    }

    #[test]
    fn table_serializes_as_list() {
        let json = serde_json::to_value(FiducialTable::standard()).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(4));
        assert_eq!(json[0]["id"], 231);
    }
}
