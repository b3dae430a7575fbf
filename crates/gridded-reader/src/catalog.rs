//! In-memory file catalog for one data directory.
//!
//! The catalog is built once per directory scan and never mutated; a rescan
//! produces a new [`CatalogIndex`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use aerocom_common::{TsType, VerticalCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ReaderConfig;
use crate::data_id::DataId;
use crate::error::{GriddedError, Result};
use crate::naming::{self, mask_matches, NamingConvention};

/// One indexed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub var_name: String,
    pub year: i32,
    pub ts_type: TsType,
    pub vert_code: Option<VerticalCode>,
    pub data_id: Option<String>,
    /// Time-chunk label following the data id, if any.
    pub chunk: Option<String>,
    pub experiment: Option<String>,
    pub meteo: Option<String>,
    pub perturbation: Option<String>,
    pub is_at_stations: bool,
    pub is_3d: bool,
    pub filename: String,
}

impl FileRecord {
    /// True if both records describe the same dataset, experiment, vertical
    /// code and resolution (they may differ in year, chunk or filename).
    pub fn same_series(&self, other: &FileRecord) -> bool {
        self.var_name == other.var_name
            && self.ts_type == other.ts_type
            && self.vert_code == other.vert_code
            && self.data_id == other.data_id
            && self.experiment == other.experiment
            && self.meteo == other.meteo
            && self.perturbation == other.perturbation
    }
}

/// A file that was skipped during indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredFile {
    pub filename: String,
    pub reason: String,
}

/// Table of all files found in a data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogIndex {
    dir: PathBuf,
    convention: Option<NamingConvention>,
    records: Vec<FileRecord>,
    ignored: Vec<IgnoredFile>,
    vars_2d: BTreeSet<String>,
    vars_3d: BTreeSet<String>,
}

impl CatalogIndex {
    /// An index with no files.
    pub fn empty(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            convention: None,
            records: Vec::new(),
            ignored: Vec::new(),
            vars_2d: BTreeSet::new(),
            vars_3d: BTreeSet::new(),
        }
    }

    /// Scan `dir` and index every file with the configured suffix.
    pub fn build(dir: &Path, config: &ReaderConfig) -> Result<Self> {
        if !dir.is_dir() {
            return Err(GriddedError::DirectoryNotFound(dir.to_path_buf()));
        }

        let files = list_files(dir, &config.file_suffix)?;
        if files.is_empty() {
            warn!(dir = %dir.display(), suffix = %config.file_suffix, "No files found, catalog is empty");
            return Ok(Self::empty(dir));
        }

        let convention = files
            .iter()
            .find_map(|name| naming::identify(name, config).ok())
            .ok_or_else(|| {
                GriddedError::CatalogBuild(format!(
                    "none of the {} files in {} match a registered naming convention",
                    files.len(),
                    dir.display()
                ))
            })?;
        debug!(convention = %convention.name, dir = %dir.display(), "Detected naming convention");

        let mut index = Self {
            convention: Some(convention.clone()),
            ..Self::empty(dir)
        };

        for filename in files {
            match convention.extract(&filename, config) {
                Ok(info) => {
                    let parsed_id = info
                        .data_id
                        .as_deref()
                        .and_then(|id| id.parse::<DataId>().ok());
                    if info.is_3d {
                        index.vars_3d.insert(info.var_name.clone());
                    } else {
                        index.vars_2d.insert(info.var_name.clone());
                    }
                    index.records.push(FileRecord {
                        var_name: info.var_name,
                        year: info.year,
                        ts_type: info.ts_type,
                        vert_code: info.vert_code,
                        data_id: info.data_id,
                        chunk: info.chunk,
                        experiment: parsed_id.as_ref().map(|id| id.experiment.clone()),
                        meteo: parsed_id.as_ref().map(|id| id.meteo.clone()),
                        perturbation: parsed_id.map(|id| id.perturbation),
                        is_at_stations: info.is_at_stations,
                        is_3d: info.is_3d,
                        filename,
                    });
                }
                Err(e) => {
                    warn!(file = %filename, reason = %e, "Ignoring file");
                    index.ignored.push(IgnoredFile {
                        filename,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            dir = %dir.display(),
            convention = %convention.name,
            files = index.records.len(),
            ignored = index.ignored.len(),
            "Built catalog index"
        );
        Ok(index)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn convention(&self) -> Option<&NamingConvention> {
        self.convention.as_ref()
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn ignored(&self) -> &[IgnoredFile] {
        &self.ignored
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Full path of an indexed file.
    pub fn path_of(&self, record: &FileRecord) -> PathBuf {
        self.dir.join(&record.filename)
    }

    /// All variable names with at least one file.
    pub fn vars(&self) -> BTreeSet<String> {
        self.vars_2d.union(&self.vars_3d).cloned().collect()
    }

    pub fn vars_2d(&self) -> &BTreeSet<String> {
        &self.vars_2d
    }

    pub fn vars_3d(&self) -> &BTreeSet<String> {
        &self.vars_3d
    }

    pub fn has_file_var(&self, var_name: &str) -> bool {
        self.vars_2d.contains(var_name) || self.vars_3d.contains(var_name)
    }

    /// Records for one variable.
    pub fn records_for<'a>(&'a self, var_name: &'a str) -> impl Iterator<Item = &'a FileRecord> + 'a {
        self.records.iter().filter(move |r| r.var_name == var_name)
    }

    /// Resolutions available for a variable.
    pub fn ts_types(&self, var_name: &str) -> BTreeSet<TsType> {
        self.records_for(var_name).map(|r| r.ts_type).collect()
    }

    /// Years covered by a variable.
    pub fn years(&self, var_name: &str) -> BTreeSet<i32> {
        self.records_for(var_name).map(|r| r.year).collect()
    }

    pub fn experiments(&self) -> BTreeSet<String> {
        self.records.iter().filter_map(|r| r.experiment.clone()).collect()
    }

    pub fn vert_codes(&self) -> BTreeSet<VerticalCode> {
        self.records.iter().filter_map(|r| r.vert_code).collect()
    }

    /// The most common dataset id in the directory.
    pub fn data_id(&self) -> Option<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for id in self.records.iter().filter_map(|r| r.data_id.as_deref()) {
            *counts.entry(id).or_default() += 1;
        }
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))
            .map(|(id, _)| id.to_string())
    }

    /// Records whose filename matches the mask rendered for the given fields.
    pub fn find_matching(
        &self,
        var_name: &str,
        year: Option<i32>,
        ts_type: Option<TsType>,
    ) -> Vec<&FileRecord> {
        let Some(convention) = &self.convention else {
            return Vec::new();
        };
        let mask = convention.render_match_mask(var_name, year, ts_type);
        self.records
            .iter()
            .filter(|r| mask_matches(&mask, &r.filename))
            .collect()
    }
}

/// List file names in `dir` (not recursive) ending in `suffix`, sorted.
fn list_files(dir: &Path, suffix: &str) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            GriddedError::CatalogBuild(format!("failed to list {}: {}", dir.display(), e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(suffix) {
                files.push(name.to_string());
            }
        }
    }
    Ok(files)
}
