//! Boundary types for gridded data.
//!
//! Decoding files is delegated to a [`GridLoader`]. The reader only needs a
//! small in-memory representation to concatenate time chunks, crop to a
//! window, mask values and combine inputs of computed variables.

use std::collections::HashMap;
use std::path::Path;

use aerocom_common::{TimeWindow, TsType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GriddedError, Result};

/// A time series of 2-D fields.
///
/// Values are stored time-major, each step row-major over `(nlat, nlon)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GriddedData {
    /// Variable name (set to the requested name after reading).
    pub var_name: String,
    /// Physical units.
    pub units: String,
    /// Temporal resolution, if known.
    pub ts_type: Option<TsType>,
    /// Timestamps, one per step.
    pub times: Vec<DateTime<Utc>>,
    /// Grid shape (nlat, nlon).
    pub shape: (usize, usize),
    /// Values, `times.len() * nlat * nlon` long.
    pub values: Vec<f64>,
}

impl GriddedData {
    /// Create a new series, checking that the value count matches.
    pub fn new(
        var_name: impl Into<String>,
        units: impl Into<String>,
        times: Vec<DateTime<Utc>>,
        shape: (usize, usize),
        values: Vec<f64>,
    ) -> Result<Self> {
        let data = Self {
            var_name: var_name.into(),
            units: units.into(),
            ts_type: None,
            times,
            shape,
            values,
        };
        data.check_consistent()?;
        Ok(data)
    }

    /// Check that the value count matches `times.len() * nlat * nlon`.
    pub fn check_consistent(&self) -> Result<()> {
        let expected = self.times.len() * self.step_len();
        if self.values.len() != expected {
            return Err(GriddedError::grid_mismatch(format!(
                "{}: expected {} values for {} steps of {:?}, got {}",
                self.var_name,
                expected,
                self.times.len(),
                self.shape,
                self.values.len()
            )));
        }
        Ok(())
    }

    pub fn with_ts_type(mut self, ts_type: TsType) -> Self {
        self.ts_type = Some(ts_type);
        self
    }

    /// Number of grid points in one time step.
    pub fn step_len(&self) -> usize {
        self.shape.0 * self.shape.1
    }

    pub fn num_times(&self) -> usize {
        self.times.len()
    }

    /// Values of one time step.
    pub fn step(&self, index: usize) -> Option<&[f64]> {
        let n = self.step_len();
        self.values.get(index * n..(index + 1) * n)
    }

    /// Check that `other` has the same shape and timestamps.
    pub fn check_aligned(&self, other: &GriddedData) -> Result<()> {
        self.check_consistent()?;
        other.check_consistent()?;
        if self.shape != other.shape {
            return Err(GriddedError::grid_mismatch(format!(
                "{} has shape {:?} but {} has shape {:?}",
                self.var_name, self.shape, other.var_name, other.shape
            )));
        }
        if self.times != other.times {
            return Err(GriddedError::grid_mismatch(format!(
                "{} and {} do not share a time axis ({} vs {} steps)",
                self.var_name,
                other.var_name,
                self.times.len(),
                other.times.len()
            )));
        }
        Ok(())
    }

    /// Combine two aligned series point by point.
    pub fn zip_with(&self, other: &GriddedData, f: impl Fn(f64, f64) -> f64) -> Result<GriddedData> {
        self.check_aligned(other)?;
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| f(*a, *b))
            .collect();
        Ok(GriddedData {
            values,
            ..self.clone()
        })
    }

    /// Apply `f` to every value.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> GriddedData {
        GriddedData {
            values: self.values.iter().map(|v| f(*v)).collect(),
            ..self.clone()
        }
    }

    /// Keep only the time steps inside `window`.
    pub fn crop(self, window: &TimeWindow) -> GriddedData {
        if !window.is_bounded() {
            return self;
        }
        let n = self.step_len();
        let mut times = Vec::with_capacity(self.times.len());
        let mut values = Vec::with_capacity(self.values.len());
        for (i, t) in self.times.iter().enumerate() {
            if !window.contains(t) {
                continue;
            }
            if let Some(step) = self.values.get(i * n..(i + 1) * n) {
                times.push(*t);
                values.extend_from_slice(step);
            }
        }
        GriddedData {
            times,
            values,
            ..self
        }
    }

    /// Join time chunks of one logical series along the time axis.
    ///
    /// Chunks are ordered by their first timestamp. They must agree on shape
    /// and units, and their time axes must not overlap.
    pub fn concat_time(mut chunks: Vec<GriddedData>) -> Result<GriddedData> {
        chunks.retain(|c| !c.times.is_empty());
        chunks.sort_by_key(|c| c.times[0]);

        let mut iter = chunks.into_iter();
        let mut joined = match iter.next() {
            Some(first) => first,
            None => return Err(GriddedError::concatenation("no time steps to concatenate")),
        };
        joined.check_consistent()?;

        for chunk in iter {
            chunk.check_consistent()?;
            if chunk.shape != joined.shape {
                return Err(GriddedError::concatenation(format!(
                    "chunk starting {} has shape {:?}, expected {:?}",
                    chunk.times[0], chunk.shape, joined.shape
                )));
            }
            if chunk.units != joined.units {
                return Err(GriddedError::concatenation(format!(
                    "chunk starting {} has units '{}', expected '{}'",
                    chunk.times[0], chunk.units, joined.units
                )));
            }
            if let Some(last) = joined.times.last() {
                if chunk.times[0] <= *last {
                    return Err(GriddedError::concatenation(format!(
                        "chunk starting {} overlaps previous chunk ending {}",
                        chunk.times[0], last
                    )));
                }
            }
            joined.times.extend(chunk.times);
            joined.values.extend(chunk.values);
        }

        if joined.times.windows(2).any(|w| w[0] >= w[1]) {
            return Err(GriddedError::concatenation(format!(
                "time axis of {} is not strictly increasing",
                joined.var_name
            )));
        }
        Ok(joined)
    }
}

/// External grid I/O collaborator.
///
/// Implementations decode one file into a [`GriddedData`] for `var_name`.
pub trait GridLoader: Send + Sync {
    fn load(&self, path: &Path, var_name: &str) -> Result<GriddedData>;
}

/// Loader backed by grids held in memory, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    grids: HashMap<String, GriddedData>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the grid returned for `filename`.
    pub fn insert(&mut self, filename: impl Into<String>, data: GriddedData) {
        self.grids.insert(filename.into(), data);
    }

    pub fn with(mut self, filename: impl Into<String>, data: GriddedData) -> Self {
        self.insert(filename, data);
        self
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }
}

impl GridLoader for MemoryLoader {
    fn load(&self, path: &Path, var_name: &str) -> Result<GriddedData> {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let mut data = self
            .grids
            .get(name)
            .cloned()
            .ok_or_else(|| GriddedError::load(path.display().to_string(), "no grid registered"))?;
        data.var_name = var_name.to_string();
        Ok(data)
    }
}
