//! Filename conventions for gridded model output.
//!
//! Two delimiter-based conventions are registered:
//!
//! - `aerocom3`: `aerocom3_<data_id>[_<chunk>]_<var>_<vert>_<year>_<ts_type>.nc`
//! - `aerocom2`: `aerocom.<data_id>.<ts_type>.<var>.<year>.nc`
//!
//! Field positions are counted from the front when non-negative and from the
//! back when negative, after the file suffix has been stripped. The data id
//! spans every field between the leading prefix field and a terminating field,
//! so it may itself contain the delimiter (`TM5-met2010_AP3-CTRL`).

use aerocom_common::{TsType, VerticalCode};
use serde::{Deserialize, Serialize};

use crate::config::ReaderConfig;
use crate::data_id::DataId;
use crate::error::{GriddedError, Result};

/// Suffix marking a model-level variable in station-subset files.
const SUFFIX_3D: &str = "3d";

/// Number of delimiter-separated fields in a structured data id.
const DATA_ID_FIELDS: usize = 2;

/// A delimiter-based filename convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConvention {
    pub name: String,
    pub delimiter: char,
    pub min_fields: usize,
    pub year_pos: isize,
    pub var_pos: isize,
    pub ts_pos: isize,
    pub vert_pos: Option<isize>,
    /// The data id runs from field 1 up to (excluding) this position.
    pub data_id_end: isize,
    /// Fields after a structured data id are read as a time-chunk label.
    pub chunk_labels: bool,
    pub suffix: String,
}

/// Fields extracted from one filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub year: i32,
    pub var_name: String,
    pub ts_type: TsType,
    pub vert_code: Option<VerticalCode>,
    pub data_id: Option<String>,
    pub chunk: Option<String>,
    pub is_at_stations: bool,
    pub is_3d: bool,
}

impl NamingConvention {
    pub fn aerocom3(suffix: &str) -> Self {
        Self {
            name: "aerocom3".to_string(),
            delimiter: '_',
            min_fields: 4,
            year_pos: -2,
            var_pos: -4,
            ts_pos: -1,
            vert_pos: Some(-3),
            data_id_end: -4,
            chunk_labels: true,
            suffix: suffix.to_string(),
        }
    }

    pub fn aerocom2(suffix: &str) -> Self {
        Self {
            name: "aerocom2".to_string(),
            delimiter: '.',
            min_fields: 4,
            year_pos: -1,
            var_pos: -2,
            ts_pos: -3,
            vert_pos: None,
            data_id_end: -3,
            chunk_labels: false,
            suffix: suffix.to_string(),
        }
    }

    /// All registered conventions, in detection order.
    pub fn registered(suffix: &str) -> Vec<NamingConvention> {
        vec![Self::aerocom3(suffix), Self::aerocom2(suffix)]
    }

    fn fields<'a>(&self, filename: &'a str) -> Vec<&'a str> {
        filename
            .strip_suffix(self.suffix.as_str())
            .unwrap_or(filename)
            .split(self.delimiter)
            .collect()
    }

    /// True if `filename` has enough fields for this convention.
    pub fn matches_field_count(&self, filename: &str) -> bool {
        self.fields(filename).len() >= self.min_fields
    }

    /// Extract and validate `{year, variable, ts_type, ...}` from `filename`.
    pub fn extract(&self, filename: &str, config: &ReaderConfig) -> Result<FileInfo> {
        let fields = self.fields(filename);
        if fields.len() < self.min_fields {
            return Err(GriddedError::Convention(format!(
                "{}: {} expects at least {} '{}'-separated fields, found {}",
                filename,
                self.name,
                self.min_fields,
                self.delimiter,
                fields.len()
            )));
        }

        let ts_idx = self.index(&fields, self.ts_pos, filename)?;
        let year_idx = self.index(&fields, self.year_pos, filename)?;
        let var_idx = self.index(&fields, self.var_pos, filename)?;
        let vert_idx = self
            .vert_pos
            .map(|pos| self.index(&fields, pos, filename))
            .transpose()?;
        let id_end = self.index(&fields, self.data_id_end, filename)?;
        // field 0 is the prefix; the data id needs at least one field after it
        if id_end <= 1 {
            return Err(GriddedError::Convention(format!(
                "{}: no data id between prefix and variable under {}",
                filename, self.name
            )));
        }

        let ts_type: TsType = fields[ts_idx].parse().map_err(|_| {
            GriddedError::Convention(format!(
                "{}: invalid ts_type '{}'",
                filename, fields[ts_idx]
            ))
        })?;

        let year: i32 = fields[year_idx].parse().map_err(|_| {
            GriddedError::Convention(format!("{}: invalid year '{}'", filename, fields[year_idx]))
        })?;
        if !config.is_valid_year(year) {
            return Err(GriddedError::Convention(format!(
                "{}: year {} out of range",
                filename, year
            )));
        }

        let vert_code = match vert_idx {
            Some(idx) => Some(fields[idx].parse::<VerticalCode>().map_err(|_| {
                GriddedError::Convention(format!(
                    "{}: invalid vertical code '{}'",
                    filename, fields[idx]
                ))
            })?),
            None => None,
        };

        let mut var_name = fields[var_idx].to_string();
        let is_at_stations = vert_code.map_or(false, |v| v.is_at_stations());
        let mut is_3d = vert_code.map_or(false, |v| v.is_3d());
        if vert_code == Some(VerticalCode::ModelLevelAtStations) {
            if var_name.to_lowercase().ends_with(SUFFIX_3D) && var_name.len() > SUFFIX_3D.len() {
                var_name.truncate(var_name.len() - SUFFIX_3D.len());
            }
            is_3d = true;
        }
        if var_name.is_empty() {
            return Err(GriddedError::Convention(format!(
                "{}: empty variable name",
                filename
            )));
        }

        let (data_id, chunk) = self.split_data_id(&fields[1..id_end]);

        Ok(FileInfo {
            year,
            var_name,
            ts_type,
            vert_code,
            data_id,
            chunk,
            is_at_stations,
            is_3d,
        })
    }

    /// Split the data-id span into the id and an optional chunk label.
    ///
    /// A chunk label is only recognised when the leading fields form a
    /// structured [`DataId`]; otherwise the whole span is the id.
    fn split_data_id(&self, span: &[&str]) -> (Option<String>, Option<String>) {
        if span.is_empty() {
            return (None, None);
        }
        let delim = self.delimiter.to_string();
        if self.chunk_labels && span.len() > DATA_ID_FIELDS {
            let head = span[..DATA_ID_FIELDS].join(&delim);
            if head.parse::<DataId>().is_ok() {
                return (Some(head), Some(span[DATA_ID_FIELDS..].join(&delim)));
            }
        }
        (Some(span.join(&delim)), None)
    }

    /// Glob-like mask matching files of `var_name` for the given year and
    /// resolution. Unset fields become `*`.
    pub fn render_match_mask(
        &self,
        var_name: &str,
        year: Option<i32>,
        ts_type: Option<TsType>,
    ) -> String {
        let mut positions = vec![self.year_pos, self.var_pos, self.ts_pos, self.data_id_end];
        positions.extend(self.vert_pos);
        // prefix field plus at least one data-id field
        let front = 2;
        let back = positions
            .iter()
            .filter(|p| **p < 0)
            .map(|p| p.unsigned_abs())
            .max()
            .unwrap_or(0);
        let width = (front + back).max(self.min_fields);

        let mut fields = vec!["*".to_string(); width];
        let mut set = |pos: isize, value: String| {
            let idx = if pos < 0 {
                width - pos.unsigned_abs()
            } else {
                pos.unsigned_abs()
            };
            fields[idx] = value;
        };
        set(self.var_pos, var_name.to_string());
        if let Some(y) = year {
            set(self.year_pos, y.to_string());
        }
        if let Some(ts) = ts_type {
            set(self.ts_pos, ts.as_str().to_string());
        }

        format!(
            "{}{}",
            fields.join(&self.delimiter.to_string()),
            self.suffix
        )
    }

    fn index(&self, fields: &[&str], pos: isize, filename: &str) -> Result<usize> {
        let len = fields.len() as isize;
        let idx = if pos < 0 { len + pos } else { pos };
        if idx < 0 || idx >= len {
            return Err(GriddedError::Convention(format!(
                "{}: no field at position {} under {}",
                filename, pos, self.name
            )));
        }
        Ok(idx as usize)
    }
}

/// Identify the first registered convention that validates `filename`.
pub fn identify(filename: &str, config: &ReaderConfig) -> Result<NamingConvention> {
    for convention in NamingConvention::registered(&config.file_suffix) {
        if !convention.matches_field_count(filename) {
            continue;
        }
        if convention.extract(filename, config).is_ok() {
            return Ok(convention);
        }
    }
    Err(GriddedError::Convention(format!(
        "{}: no registered naming convention validates",
        filename
    )))
}

/// Match `name` against a mask where `*` matches any run of characters.
pub fn mask_matches(mask: &str, name: &str) -> bool {
    let parts: Vec<&str> = mask.split('*').collect();
    if parts.len() == 1 {
        return mask == name;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if name.len() < first.len() + last.len() || !name.starts_with(first) || !name.ends_with(last) {
        return false;
    }
    let mut rest = &name[first.len()..name.len() - last.len()];

    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ReaderConfig {
        ReaderConfig::default()
    }

    #[test]
    fn test_extract_aerocom3() {
        let conv = NamingConvention::aerocom3(".nc");
        let info = conv
            .extract("aerocom3_TM5-met2010_AP3-CTRL_od550aer_Column_2010_monthly.nc", &config())
            .unwrap();
        assert_eq!(info.var_name, "od550aer");
        assert_eq!(info.year, 2010);
        assert_eq!(info.ts_type, TsType::Monthly);
        assert_eq!(info.vert_code, Some(VerticalCode::Column));
        assert_eq!(info.data_id.as_deref(), Some("TM5-met2010_AP3-CTRL"));
        assert_eq!(info.chunk, None);
    }

    #[test]
    fn test_extract_aerocom3_chunk_label() {
        let conv = NamingConvention::aerocom3(".nc");
        let info = conv
            .extract("aerocom3_TM5-met2010_AP3-CTRL_p02_od550aer_Surface_2010_hourly.nc", &config())
            .unwrap();
        assert_eq!(info.data_id.as_deref(), Some("TM5-met2010_AP3-CTRL"));
        assert_eq!(info.chunk.as_deref(), Some("p02"));

        // unstructured ids keep every field
        let info = conv
            .extract("aerocom3_EMEP_rv4_od550aer_Surface_2010_hourly.nc", &config())
            .unwrap();
        assert_eq!(info.data_id.as_deref(), Some("EMEP_rv4"));
        assert_eq!(info.chunk, None);
    }

    #[test]
    fn test_extract_aerocom3_model_level_at_stations() {
        let conv = NamingConvention::aerocom3(".nc");
        let info = conv
            .extract("aerocom3_M_ec550aer3d_ModelLevelAtStations_2010_daily.nc", &config())
            .unwrap();
        assert_eq!(info.var_name, "ec550aer");
        assert!(info.is_3d);
        assert!(info.is_at_stations);
    }

    #[test]
    fn test_extract_aerocom2() {
        let conv = NamingConvention::aerocom2(".nc");
        let info = conv
            .extract("aerocom.CAM5.3-Oslo.daily.od550aer.2010.nc", &config())
            .unwrap();
        assert_eq!(info.var_name, "od550aer");
        assert_eq!(info.ts_type, TsType::Daily);
        assert_eq!(info.year, 2010);
        assert_eq!(info.data_id.as_deref(), Some("CAM5.3-Oslo"));
        assert_eq!(info.vert_code, None);
    }

    #[test]
    fn test_extract_rejects_bad_fields() {
        let conv = NamingConvention::aerocom3(".nc");
        assert!(conv
            .extract("aerocom3_M_od550aer_Column_2010_fortnightly.nc", &config())
            .is_err());
        assert!(conv
            .extract("aerocom3_M_od550aer_Column_4000_daily.nc", &config())
            .is_err());
        assert!(conv
            .extract("aerocom3_M_od550aer_Stratosphere_2010_daily.nc", &config())
            .is_err());
        assert!(conv.extract("a_b_c.nc", &config()).is_err());
        assert!(conv.extract("od550aer_Column_2010_daily.nc", &config()).is_err());
        assert!(conv.extract("aerocom3_od550aer_Column_2010_daily.nc", &config()).is_err());

        let conv = NamingConvention::aerocom2(".nc");
        assert!(conv.extract("aerocom.daily.od550aer.2010.nc", &config()).is_err());
    }

    #[test]
    fn test_climatology_year_accepted() {
        let conv = NamingConvention::aerocom3(".nc");
        let info = conv
            .extract("aerocom3_M_od550aer_Column_9999_monthly.nc", &config())
            .unwrap();
        assert_eq!(info.year, 9999);
    }

    #[test]
    fn test_identify() {
        let c = config();
        let conv = identify("aerocom3_M_od550aer_Column_2010_monthly.nc", &c).unwrap();
        assert_eq!(conv.name, "aerocom3");
        let conv = identify("aerocom.M.monthly.od550aer.2010.nc", &c).unwrap();
        assert_eq!(conv.name, "aerocom2");
        assert!(matches!(
            identify("readme.nc", &c),
            Err(GriddedError::Convention(_))
        ));
    }

    #[test]
    fn test_render_mask() {
        let conv = NamingConvention::aerocom3(".nc");
        let mask = conv.render_match_mask("od550aer", Some(2010), Some(TsType::Daily));
        assert_eq!(mask, "*_*_od550aer_*_2010_daily.nc");
        assert!(mask_matches(&mask, "aerocom3_M_od550aer_Column_2010_daily.nc"));
        assert!(mask_matches(&mask, "aerocom3_TM5-met2010_AP3-CTRL_od550aer_Column_2010_daily.nc"));
        assert!(!mask_matches(&mask, "aerocom3_M_od550aer_Column_2011_daily.nc"));

        let conv = NamingConvention::aerocom2(".nc");
        let mask = conv.render_match_mask("od550aer", None, Some(TsType::Monthly));
        assert_eq!(mask, "*.*.monthly.od550aer.*.nc");
        assert!(mask_matches(&mask, "aerocom.M.monthly.od550aer.2010.nc"));
    }

    #[test]
    fn test_mask_matches_literals() {
        assert!(mask_matches("abc", "abc"));
        assert!(!mask_matches("abc", "abd"));
        assert!(mask_matches("a*c", "abbbc"));
        assert!(!mask_matches("a*c*c", "ac"));
    }
}
