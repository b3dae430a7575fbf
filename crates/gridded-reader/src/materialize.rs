//! Loading planned files into one time series.

use aerocom_common::{TimeWindow, TsType};
use tracing::{debug, instrument};

use crate::catalog::CatalogIndex;
use crate::error::{GriddedError, Result};
use crate::grid::{GridLoader, GriddedData};
use crate::query::YearFiles;

/// Loads files of one catalog through a [`GridLoader`].
pub struct Materializer<'a> {
    catalog: &'a CatalogIndex,
    loader: &'a dyn GridLoader,
}

impl<'a> Materializer<'a> {
    pub fn new(catalog: &'a CatalogIndex, loader: &'a dyn GridLoader) -> Self {
        Self { catalog, loader }
    }

    /// Load every year of `var_name` and join them along time.
    #[instrument(skip(self, groups), fields(years = groups.len()))]
    pub fn load(&self, var_name: &str, ts_type: TsType, groups: &[YearFiles]) -> Result<GriddedData> {
        let mut chunks = Vec::new();
        for group in groups {
            for filename in &group.files {
                let path = self.catalog.dir().join(filename);
                debug!(file = %filename, year = group.year, "Loading");
                let chunk = self.loader.load(&path, var_name)?;
                chunk
                    .check_consistent()
                    .map_err(|e| GriddedError::load(path.display().to_string(), e.to_string()))?;
                chunks.push(chunk);
            }
        }
        let mut data = if chunks.len() == 1 {
            chunks.remove(0)
        } else {
            GriddedData::concat_time(chunks)?
        };
        data.var_name = var_name.to_string();
        data.ts_type = Some(ts_type);
        Ok(data)
    }
}

/// Crop `data` to `window`, except climatologies which carry no calendar year.
pub fn crop_to_window(data: GriddedData, window: &TimeWindow, is_climatology: bool) -> GriddedData {
    if is_climatology {
        data
    } else {
        data.crop(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReaderConfig;
    use crate::grid::MemoryLoader;
    use crate::query::group_by_year;
    use chrono::{DateTime, TimeZone, Utc};
    use std::fs::File;

    fn day(y: i32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, 1, d, 0, 0, 0).unwrap()
    }

    fn grid(times: Vec<DateTime<Utc>>, v: f64) -> GriddedData {
        let n = times.len();
        GriddedData::new("raw", "1", times, (1, 1), vec![v; n]).unwrap()
    }

    #[test]
    fn test_load_concatenates_chunks_and_years() {
        let files = [
            "aerocom3_TM5-met2010_AP3-CTRL_p02_od550aer_Surface_2010_daily.nc",
            "aerocom3_TM5-met2010_AP3-CTRL_p01_od550aer_Surface_2010_daily.nc",
            "aerocom3_TM5-met2010_AP3-CTRL_od550aer_Surface_2011_daily.nc",
        ];
        let tmp = tempfile::tempdir().unwrap();
        for f in files {
            File::create(tmp.path().join(f)).unwrap();
        }
        let index = CatalogIndex::build(tmp.path(), &ReaderConfig::default()).unwrap();
        let loader = MemoryLoader::new()
            .with(files[0], grid(vec![day(2010, 3), day(2010, 4)], 2.0))
            .with(files[1], grid(vec![day(2010, 1), day(2010, 2)], 1.0))
            .with(files[2], grid(vec![day(2011, 1)], 3.0));

        let rows: Vec<_> = index.records().iter().collect();
        let groups = group_by_year(&rows).unwrap();
        let data = Materializer::new(&index, &loader)
            .load("od550aer", TsType::Daily, &groups)
            .unwrap();
        assert_eq!(data.var_name, "od550aer");
        assert_eq!(data.values, vec![1.0, 1.0, 2.0, 2.0, 3.0]);
        assert_eq!(data.ts_type, Some(TsType::Daily));

        let window = TimeWindow::new(Some(day(2010, 2)), Some(day(2010, 3))).unwrap();
        assert_eq!(crop_to_window(data.clone(), &window, false).num_times(), 2);
        assert_eq!(crop_to_window(data, &window, true).num_times(), 5);
    }

    #[test]
    fn test_load_overlapping_chunks_fail() {
        let files = [
            "aerocom3_TM5-met2010_AP3-CTRL_p01_od550aer_Surface_2010_daily.nc",
            "aerocom3_TM5-met2010_AP3-CTRL_p02_od550aer_Surface_2010_daily.nc",
        ];
        let tmp = tempfile::tempdir().unwrap();
        for f in files {
            File::create(tmp.path().join(f)).unwrap();
        }
        let index = CatalogIndex::build(tmp.path(), &ReaderConfig::default()).unwrap();
        let loader = MemoryLoader::new()
            .with(files[0], grid(vec![day(2010, 1), day(2010, 2)], 1.0))
            .with(files[1], grid(vec![day(2010, 2)], 2.0));
        let rows: Vec<_> = index.records().iter().collect();
        let groups = group_by_year(&rows).unwrap();
        let err = Materializer::new(&index, &loader)
            .load("od550aer", TsType::Daily, &groups)
            .unwrap_err();
        assert!(matches!(err, GriddedError::Concatenation(_)));
    }

    #[test]
    fn test_load_rejects_malformed_grid() {
        let file = "aerocom3_TM5-met2010_AP3-CTRL_od550aer_Column_2010_monthly.nc";
        let tmp = tempfile::tempdir().unwrap();
        File::create(tmp.path().join(file)).unwrap();
        let index = CatalogIndex::build(tmp.path(), &ReaderConfig::default()).unwrap();

        // two steps of a 2x2 grid need 8 values
        let bad = GriddedData {
            var_name: "raw".to_string(),
            units: "1".to_string(),
            ts_type: None,
            times: vec![day(2010, 1), day(2010, 2)],
            shape: (2, 2),
            values: vec![0.0; 5],
        };
        let loader = MemoryLoader::new().with(file, bad);
        let rows: Vec<_> = index.records().iter().collect();
        let groups = group_by_year(&rows).unwrap();
        let err = Materializer::new(&index, &loader)
            .load("od550aer", TsType::Monthly, &groups)
            .unwrap_err();
        match err {
            GriddedError::Load { path, .. } => assert!(path.ends_with(file)),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
