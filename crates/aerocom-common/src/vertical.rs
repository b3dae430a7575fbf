//! Vertical codes distinguishing surface, column and model-level data.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

/// Vertical code of a gridded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VerticalCode {
    Surface,
    Column,
    ModelLevel,
    SurfaceAtStations,
    ModelLevelAtStations,
}

impl VerticalCode {
    pub const ALL: [VerticalCode; 5] = [
        VerticalCode::Surface,
        VerticalCode::Column,
        VerticalCode::ModelLevel,
        VerticalCode::SurfaceAtStations,
        VerticalCode::ModelLevelAtStations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VerticalCode::Surface => "Surface",
            VerticalCode::Column => "Column",
            VerticalCode::ModelLevel => "ModelLevel",
            VerticalCode::SurfaceAtStations => "SurfaceAtStations",
            VerticalCode::ModelLevelAtStations => "ModelLevelAtStations",
        }
    }

    /// Data sampled at station locations rather than on the full grid.
    pub fn is_at_stations(&self) -> bool {
        matches!(
            self,
            VerticalCode::SurfaceAtStations | VerticalCode::ModelLevelAtStations
        )
    }

    /// Data that carries a vertical (model level) dimension.
    pub fn is_3d(&self) -> bool {
        matches!(
            self,
            VerticalCode::ModelLevel | VerticalCode::ModelLevelAtStations
        )
    }
}

impl fmt::Display for VerticalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerticalCode {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VerticalCode::ALL
            .iter()
            .copied()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CommonError::InvalidVerticalCode(s.to_string()))
    }
}
