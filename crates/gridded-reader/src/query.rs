//! Read requests and narrowing the catalog to the files of one read.

use std::collections::{BTreeMap, BTreeSet};

use aerocom_common::{TimeWindow, TsType, VerticalCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{CatalogIndex, FileRecord};
use crate::config::ReaderConfig;
use crate::constraint::Constraint;
use crate::error::{GriddedError, Result};
use crate::frequency::TsPolicy;

fn default_true() -> bool {
    true
}

/// Parameters of one read.
///
/// # Example
///
/// ```
/// use gridded_reader::ReadRequest;
/// use aerocom_common::TsType;
///
/// let request = ReadRequest::new("od550aer")
///     .between("2010", "2011")
///     .unwrap()
///     .at_ts_type(TsType::Monthly)
///     .for_experiment("AP3");
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub var_name: String,
    #[serde(default)]
    pub window: TimeWindow,
    #[serde(default)]
    pub ts_type: Option<TsType>,
    #[serde(default)]
    pub experiment: Option<String>,
    #[serde(default)]
    pub vert_code: Option<VerticalCode>,
    /// Allow a resolution other than `ts_type` when it is unavailable.
    #[serde(default = "default_true")]
    pub flex_ts_type: bool,
    /// Prefer the resolution with the most files over the finest one.
    #[serde(default)]
    pub prefer_longer: bool,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl ReadRequest {
    pub fn new(var_name: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
            window: TimeWindow::unbounded(),
            ts_type: None,
            experiment: None,
            vert_code: None,
            flex_ts_type: true,
            prefer_longer: false,
            constraints: Vec::new(),
        }
    }

    /// Restrict to `[start, stop]`, each an ISO-8601 timestamp, date or year.
    pub fn between(mut self, start: &str, stop: &str) -> Result<Self> {
        self.window = TimeWindow::from_strs(Some(start), Some(stop))?;
        Ok(self)
    }

    pub fn in_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn at_ts_type(mut self, ts_type: TsType) -> Self {
        self.ts_type = Some(ts_type);
        self
    }

    pub fn for_experiment(mut self, experiment: impl Into<String>) -> Self {
        self.experiment = Some(experiment.into());
        self
    }

    pub fn at_vert_code(mut self, vert_code: VerticalCode) -> Self {
        self.vert_code = Some(vert_code);
        self
    }

    /// Fail instead of falling back to another resolution.
    pub fn strict(mut self) -> Self {
        self.flex_ts_type = false;
        self
    }

    pub fn prefer_longer(mut self) -> Self {
        self.prefer_longer = true;
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.var_name.trim().is_empty() {
            return Err(GriddedError::config("read request without a variable name"));
        }
        if matches!(&self.experiment, Some(e) if e.is_empty()) {
            return Err(GriddedError::config("experiment filter is empty"));
        }
        for c in &self.constraints {
            if !c.filter_val.is_finite() {
                return Err(GriddedError::config(format!(
                    "constraint filter_val must be finite, got {}",
                    c.filter_val
                )));
            }
        }
        Ok(())
    }

    pub fn policy(&self) -> TsPolicy {
        TsPolicy {
            requested: self.ts_type,
            strict: !self.flex_ts_type,
            prefer_longer: self.prefer_longer,
        }
    }

    /// Request for another variable sharing this window, experiment, vertical
    /// code and resolution.
    pub fn for_var(&self, var_name: &str, ts_type: TsType) -> ReadRequest {
        ReadRequest {
            var_name: var_name.to_string(),
            ts_type: Some(ts_type),
            flex_ts_type: false,
            prefer_longer: false,
            constraints: Vec::new(),
            ..self.clone()
        }
    }
}

/// Field filter over catalog rows. Unset fields pass everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFilter {
    pub var_name: String,
    pub ts_type: Option<TsType>,
    pub years: Option<(i32, i32)>,
    pub experiment: Option<String>,
    pub vert_code: Option<VerticalCode>,
}

impl FileFilter {
    pub fn for_var(var_name: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
            ..Self::default()
        }
    }

    /// Rows without a vertical code pass any vertical filter.
    pub fn matches(&self, record: &FileRecord) -> bool {
        record.var_name == self.var_name
            && self.ts_type.map_or(true, |ts| record.ts_type == ts)
            && self
                .years
                .map_or(true, |(first, last)| (first..=last).contains(&record.year))
            && self
                .experiment
                .as_deref()
                .map_or(true, |exp| record.experiment.as_deref() == Some(exp))
            && self
                .vert_code
                .map_or(true, |v| record.vert_code.map_or(true, |rv| rv == v))
    }

    pub fn apply<'c>(&self, catalog: &'c CatalogIndex) -> Vec<&'c FileRecord> {
        catalog.records().iter().filter(|r| self.matches(r)).collect()
    }
}

/// Rows of one variable that pass every filter except resolution.
#[derive(Debug, Clone)]
pub struct Candidates<'c> {
    pub var_name: String,
    pub rows: Vec<&'c FileRecord>,
}

impl<'c> Candidates<'c> {
    pub fn ts_types(&self) -> BTreeSet<TsType> {
        self.rows.iter().map(|r| r.ts_type).collect()
    }

    /// Number of files per available resolution.
    pub fn coverage(&self) -> BTreeMap<TsType, usize> {
        let mut counts = BTreeMap::new();
        for r in &self.rows {
            *counts.entry(r.ts_type).or_insert(0) += 1;
        }
        counts
    }

    /// Rows at `ts_type`, which must all belong to one experiment.
    pub fn at_ts_type(&self, ts_type: TsType) -> Result<Vec<&'c FileRecord>> {
        let rows: Vec<&'c FileRecord> = self
            .rows
            .iter()
            .copied()
            .filter(|r| r.ts_type == ts_type)
            .collect();

        let experiments: BTreeSet<&str> = rows.iter().filter_map(|r| r.experiment.as_deref()).collect();
        if experiments.len() > 1 {
            return Err(GriddedError::data_query(format!(
                "{} at {} is available for several experiments ({}), specify one",
                self.var_name,
                ts_type,
                experiments.into_iter().collect::<Vec<_>>().join(", ")
            )));
        }
        Ok(rows)
    }
}

/// Find the files of `var_name` matching `request`, apart from resolution.
///
/// Retries once with the configured vertical fallback when nothing matches,
/// drops climatology rows when calendar years are available, and rejects
/// queries left ambiguous by vertical code. Experiment ambiguity is checked
/// per resolution by [`Candidates::at_ts_type`].
pub fn candidates<'c>(
    catalog: &'c CatalogIndex,
    var_name: &str,
    request: &ReadRequest,
    config: &ReaderConfig,
) -> Result<Candidates<'c>> {
    let mut filter = FileFilter {
        var_name: var_name.to_string(),
        ts_type: None,
        years: request.window.year_range(config.min_year, config.max_year),
        experiment: request.experiment.clone(),
        vert_code: request.vert_code,
    };
    let mut rows = filter.apply(catalog);

    if rows.is_empty() {
        if let Some(fallback) = request
            .vert_code
            .and_then(|v| config.vert_fallbacks.get(&v).copied())
        {
            debug!(var = %var_name, from = ?request.vert_code, to = %fallback, "Retrying with vertical fallback");
            filter.vert_code = Some(fallback);
            rows = filter.apply(catalog);
        }
    }

    if rows.is_empty() {
        return Err(GriddedError::data_coverage(format!(
            "no files for {} in {} match {:?}",
            var_name,
            catalog.dir().display(),
            filter
        )));
    }

    if rows.iter().any(|r| r.year != config.climatology_year) {
        rows.retain(|r| r.year != config.climatology_year);
    }

    let vert_codes: BTreeSet<VerticalCode> = rows.iter().filter_map(|r| r.vert_code).collect();
    if vert_codes.len() > 1 {
        match config.default_vert_code.filter(|v| vert_codes.contains(v)) {
            Some(default) => {
                debug!(var = %var_name, vert_code = %default, "Using default vertical code");
                rows.retain(|r| r.vert_code.map_or(true, |v| v == default));
            }
            None => {
                return Err(GriddedError::data_query(format!(
                    "{} is available at several vertical codes ({}), specify one",
                    var_name,
                    vert_codes
                        .iter()
                        .map(|v| v.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )));
            }
        }
    }

    Ok(Candidates {
        var_name: var_name.to_string(),
        rows,
    })
}

/// Files of one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearFiles {
    pub year: i32,
    pub files: Vec<String>,
}

/// Group rows of one resolution by year.
///
/// Several rows in one year are only accepted as time chunks of a single
/// series at a finer-than-yearly resolution.
pub fn group_by_year(rows: &[&FileRecord]) -> Result<Vec<YearFiles>> {
    let mut by_year: BTreeMap<i32, Vec<&FileRecord>> = BTreeMap::new();
    for r in rows {
        by_year.entry(r.year).or_default().push(r);
    }

    let mut groups = Vec::with_capacity(by_year.len());
    for (year, records) in by_year {
        let names: Vec<String> = records.iter().map(|r| r.filename.clone()).collect();
        if let [first, rest @ ..] = records.as_slice() {
            let chunked = first.ts_type.is_sub_yearly() && rest.iter().all(|r| first.same_series(r));
            if !rest.is_empty() && !chunked {
                return Err(GriddedError::data_query(format!(
                    "{} files for {} in {} cannot be told apart: {}",
                    records.len(),
                    first.var_name,
                    year,
                    names.join(", ")
                )));
            }
        }
        groups.push(YearFiles { year, files: names });
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn catalog(files: &[&str]) -> (tempfile::TempDir, CatalogIndex) {
        let tmp = tempfile::tempdir().unwrap();
        for f in files {
            File::create(tmp.path().join(f)).unwrap();
        }
        let index = CatalogIndex::build(tmp.path(), &ReaderConfig::default()).unwrap();
        (tmp, index)
    }

    #[test]
    fn test_request_builder() {
        let req = ReadRequest::new("od550aer")
            .between("2010", "2011")
            .unwrap()
            .at_ts_type(TsType::Daily)
            .strict();
        assert_eq!(req.window.year_range(0, 3000), Some((2010, 2011)));
        assert!(req.policy().strict);
        assert!(req.validate().is_ok());

        assert!(ReadRequest::new("").validate().is_err());
        // strict without a requested resolution accepts whatever is negotiated
        assert!(ReadRequest::new("x").strict().validate().is_ok());
        assert!(ReadRequest::new("x").between("2011", "2010").is_err());
    }

    #[test]
    fn test_request_from_json() {
        let req: ReadRequest = serde_json::from_str(
            r#"{"var_name": "od550aer", "constraints": [{"operator": ">", "filter_val": 1}]}"#,
        )
        .unwrap();
        assert!(req.flex_ts_type);
        assert_eq!(req.constraints.len(), 1);
    }

    #[test]
    fn test_filter_years_and_climatology() {
        let (_tmp, index) = catalog(&[
            "aerocom3_M_od550aer_Column_2009_monthly.nc",
            "aerocom3_M_od550aer_Column_2010_monthly.nc",
            "aerocom3_M_od550aer_Column_9999_monthly.nc",
        ]);
        let config = ReaderConfig::default();

        let all = candidates(&index, "od550aer", &ReadRequest::new("od550aer"), &config).unwrap();
        assert_eq!(all.rows.len(), 2);

        let req = ReadRequest::new("od550aer").between("2010", "2010").unwrap();
        let c = candidates(&index, "od550aer", &req, &config).unwrap();
        assert_eq!(c.rows.len(), 1);
        assert_eq!(c.rows[0].year, 2010);

        let req = ReadRequest::new("od550aer").between("2015", "2016").unwrap();
        assert!(matches!(
            candidates(&index, "od550aer", &req, &config),
            Err(GriddedError::DataCoverage(_))
        ));
    }

    #[test]
    fn test_climatology_only() {
        let (_tmp, index) = catalog(&["aerocom3_M_od550aer_Column_9999_monthly.nc"]);
        let c = candidates(&index, "od550aer", &ReadRequest::new("od550aer"), &ReaderConfig::default())
            .unwrap();
        assert_eq!(c.rows[0].year, 9999);
    }

    #[test]
    fn test_vertical_fallback_and_default() {
        let (_tmp, index) = catalog(&[
            "aerocom3_M_concpm10_ModelLevel_2010_monthly.nc",
            "aerocom3_M_od550aer_Column_2010_monthly.nc",
            "aerocom3_M_od550aer_Surface_2010_monthly.nc",
        ]);
        let config = ReaderConfig::default();

        let req = ReadRequest::new("concpm10").at_vert_code(VerticalCode::Surface);
        let c = candidates(&index, "concpm10", &req, &config).unwrap();
        assert_eq!(c.rows[0].vert_code, Some(VerticalCode::ModelLevel));

        let c = candidates(&index, "od550aer", &ReadRequest::new("od550aer"), &config).unwrap();
        assert_eq!(c.rows.len(), 1);
        assert_eq!(c.rows[0].vert_code, Some(VerticalCode::Surface));

        let mut no_default = config.clone();
        no_default.default_vert_code = None;
        assert!(matches!(
            candidates(&index, "od550aer", &ReadRequest::new("od550aer"), &no_default),
            Err(GriddedError::DataQuery(_))
        ));
    }

    #[test]
    fn test_experiment_ambiguity() {
        let (_tmp, index) = catalog(&[
            "aerocom3_TM5-met2010_AP3-CTRL_od550aer_Column_2010_monthly.nc",
            "aerocom3_TM5-met2010_AP2-CTRL_od550aer_Column_2010_monthly.nc",
        ]);
        let config = ReaderConfig::default();
        let all = candidates(&index, "od550aer", &ReadRequest::new("od550aer"), &config).unwrap();
        assert!(matches!(
            all.at_ts_type(TsType::Monthly),
            Err(GriddedError::DataQuery(_))
        ));
        let req = ReadRequest::new("od550aer").for_experiment("AP3");
        let c = candidates(&index, "od550aer", &req, &config).unwrap();
        assert_eq!(c.at_ts_type(TsType::Monthly).unwrap().len(), 1);
    }

    #[test]
    fn test_experiments_at_different_resolutions() {
        let (_tmp, index) = catalog(&[
            "aerocom3_TM5-met2010_AP3-CTRL_od550aer_Column_2010_monthly.nc",
            "aerocom3_TM5-met2010_AP2-CTRL_od550aer_Column_2010_daily.nc",
        ]);
        let c = candidates(&index, "od550aer", &ReadRequest::new("od550aer"), &ReaderConfig::default())
            .unwrap();
        let monthly = c.at_ts_type(TsType::Monthly).unwrap();
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].experiment.as_deref(), Some("AP3"));
        assert_eq!(c.at_ts_type(TsType::Daily).unwrap().len(), 1);
        assert!(c.at_ts_type(TsType::Hourly).unwrap().is_empty());
    }

    #[test]
    fn test_group_by_year_chunks() {
        let (_tmp, index) = catalog(&[
            "aerocom3_TM5-met2010_AP3-CTRL_p01_od550aer_Surface_2010_hourly.nc",
            "aerocom3_TM5-met2010_AP3-CTRL_p02_od550aer_Surface_2010_hourly.nc",
            "aerocom3_TM5-met2010_AP3-CTRL_od550aer_Surface_2011_hourly.nc",
        ]);
        let rows: Vec<_> = index.records().iter().collect();
        let groups = group_by_year(&rows).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].files.len(), 2);
    }

    #[test]
    fn test_group_by_year_rejects_duplicates() {
        let (_tmp, index) = catalog(&[
            "aerocom3_ModelA_od550aer_Column_2010_monthly.nc",
            "aerocom3_ModelB_od550aer_Column_2010_monthly.nc",
        ]);
        let rows: Vec<_> = index.records().iter().collect();
        assert!(matches!(group_by_year(&rows), Err(GriddedError::DataQuery(_))));
    }
}
