//! Shared helpers for gridded-reader integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gridded_reader::{GriddedData, GriddedReader, MemoryLoader, ReaderConfig};
use test_utils::{constant_values, monthly_times, CatalogDir};

/// Grid shape used by all synthetic data.
pub const SHAPE: (usize, usize) = (2, 3);

pub fn points() -> usize {
    SHAPE.0 * SHAPE.1
}

/// Series with one value per time step repeated over the grid.
pub fn series(units: &str, times: Vec<DateTime<Utc>>, per_step: &[f64]) -> GriddedData {
    assert_eq!(times.len(), per_step.len());
    let values = per_step
        .iter()
        .flat_map(|v| constant_values(points(), *v))
        .collect();
    GriddedData::new("raw", units, times, SHAPE, values).unwrap()
}

/// Twelve monthly steps of `year`, all equal to `value`.
pub fn monthly(units: &str, year: i32, value: f64) -> GriddedData {
    series(units, monthly_times(year), &[value; 12])
}

/// Open and index a reader over `dir` with `loader`.
pub fn indexed_reader(dir: &CatalogDir, loader: MemoryLoader) -> GriddedReader {
    let reader = GriddedReader::open(dir.path(), ReaderConfig::default())
        .unwrap()
        .with_loader(Arc::new(loader));
    reader.index().unwrap();
    reader
}
