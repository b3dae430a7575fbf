//! Structured dataset identifiers.
//!
//! Format: `<model>-<meteo>_<experiment>-<perturbation>`, where `<meteo>`
//! starts with [`METEO_PREFIX`]. Models may contain `-`, perturbations may
//! contain `-`; no part may contain `_`, and neither the meteo config nor
//! the experiment may contain `-`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GriddedError, Result};

/// Literal prefix of the meteorology configuration part.
pub const METEO_PREFIX: &str = "met";

const PART_DELIM: char = '_';
const SUB_DELIM: char = '-';

/// Parsed dataset identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataId {
    pub model: String,
    pub meteo: String,
    pub experiment: String,
    pub perturbation: String,
}

impl DataId {
    /// Build an identity from parts, validating that it renders to a string
    /// that parses back to the same parts.
    pub fn new(
        model: impl Into<String>,
        meteo: impl Into<String>,
        experiment: impl Into<String>,
        perturbation: impl Into<String>,
    ) -> Result<Self> {
        let id = Self {
            model: model.into(),
            meteo: meteo.into(),
            experiment: experiment.into(),
            perturbation: perturbation.into(),
        };
        id.validate()?;
        Ok(id)
    }

    fn validate(&self) -> Result<()> {
        let parts = [
            ("model", &self.model),
            ("meteo", &self.meteo),
            ("experiment", &self.experiment),
            ("perturbation", &self.perturbation),
        ];
        for (label, value) in parts {
            if value.is_empty() {
                return Err(GriddedError::config(format!("data id {} is empty", label)));
            }
            if value.contains(PART_DELIM) {
                return Err(GriddedError::config(format!(
                    "data id {} '{}' contains '{}'",
                    label, value, PART_DELIM
                )));
            }
        }
        if !self.meteo.starts_with(METEO_PREFIX) {
            return Err(GriddedError::config(format!(
                "meteo config '{}' must start with '{}'",
                self.meteo, METEO_PREFIX
            )));
        }
        if self.meteo.contains(SUB_DELIM) || self.experiment.contains(SUB_DELIM) {
            return Err(GriddedError::config(format!(
                "meteo config and experiment must not contain '{}'",
                SUB_DELIM
            )));
        }
        Ok(())
    }

    /// Render the identifier string.
    pub fn render(&self) -> String {
        format!(
            "{}{SUB_DELIM}{}{PART_DELIM}{}{SUB_DELIM}{}",
            self.model, self.meteo, self.experiment, self.perturbation
        )
    }
}

impl FromStr for DataId {
    type Err = GriddedError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || GriddedError::config(format!("invalid data id '{}'", s));

        if s.matches(PART_DELIM).count() != 1 {
            return Err(invalid());
        }
        let (left, right) = s.split_once(PART_DELIM).ok_or_else(invalid)?;
        let (model, meteo) = left.rsplit_once(SUB_DELIM).ok_or_else(invalid)?;
        let (experiment, perturbation) = right.split_once(SUB_DELIM).ok_or_else(invalid)?;

        DataId::new(model, meteo, experiment, perturbation)
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
