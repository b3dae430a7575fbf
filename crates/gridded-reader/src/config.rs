//! Configuration for the gridded reader.

use std::collections::BTreeMap;

use aerocom_common::{VerticalCode, CLIMATOLOGY_YEAR};
use serde::{Deserialize, Serialize};

/// Configuration for a [`GriddedReader`](crate::GriddedReader).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Suffix of the files to index (including the dot).
    pub file_suffix: String,

    /// Use `<dir>/renamed` instead of `<dir>` when it exists.
    pub use_renamed_subdir: bool,

    /// Maximum nesting of computed variables.
    pub max_aux_depth: usize,

    /// Vertical code to retry with when a query for the key matches nothing.
    pub vert_fallbacks: BTreeMap<VerticalCode, VerticalCode>,

    /// Vertical code chosen when files for several codes match a query
    /// that did not name one.
    pub default_vert_code: Option<VerticalCode>,

    /// Year value marking climatology files.
    pub climatology_year: i32,

    /// Lowest plausible calendar year in a filename.
    pub min_year: i32,

    /// Highest plausible calendar year in a filename.
    pub max_year: i32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        let mut vert_fallbacks = BTreeMap::new();
        vert_fallbacks.insert(VerticalCode::Surface, VerticalCode::ModelLevel);

        Self {
            file_suffix: ".nc".to_string(),
            use_renamed_subdir: true,
            max_aux_depth: 2,
            vert_fallbacks,
            default_vert_code: Some(VerticalCode::Surface),
            climatology_year: CLIMATOLOGY_YEAR,
            min_year: 0,
            max_year: 3000,
        }
    }
}

impl ReaderConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GRIDDED_FILE_SUFFIX") {
            if !val.is_empty() {
                config.file_suffix = val;
            }
        }

        if let Ok(val) = std::env::var("GRIDDED_USE_RENAMED") {
            config.use_renamed_subdir = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("GRIDDED_MAX_AUX_DEPTH") {
            if let Ok(depth) = val.parse() {
                config.max_aux_depth = depth;
            }
        }

        if let Ok(val) = std::env::var("GRIDDED_DEFAULT_VERT_CODE") {
            config.default_vert_code = if val.is_empty() || val.eq_ignore_ascii_case("none") {
                None
            } else {
                val.parse().ok()
            };
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.file_suffix.starts_with('.') || self.file_suffix.len() < 2 {
            return Err(format!(
                "file_suffix must start with '.', got '{}'",
                self.file_suffix
            ));
        }

        if self.max_aux_depth == 0 {
            return Err("max_aux_depth must be >= 1".to_string());
        }

        if self.min_year > self.max_year {
            return Err("min_year must be <= max_year".to_string());
        }

        if (self.min_year..=self.max_year).contains(&self.climatology_year) {
            return Err("climatology_year must lie outside [min_year, max_year]".to_string());
        }

        for (from, to) in &self.vert_fallbacks {
            if from == to {
                return Err(format!("vertical fallback for {} points to itself", from));
            }
        }

        Ok(())
    }

    /// True if `year` is a calendar year in range or the climatology marker.
    pub fn is_valid_year(&self, year: i32) -> bool {
        year == self.climatology_year || (self.min_year..=self.max_year).contains(&year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReaderConfig::default();
        assert_eq!(config.file_suffix, ".nc");
        assert_eq!(config.max_aux_depth, 2);
        assert_eq!(
            config.vert_fallbacks.get(&VerticalCode::Surface),
            Some(&VerticalCode::ModelLevel)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ReaderConfig::default();
        config.max_aux_depth = 0;
        assert!(config.validate().is_err());

        config = ReaderConfig::default();
        config.file_suffix = "nc".to_string();
        assert!(config.validate().is_err());

        config = ReaderConfig::default();
        config.climatology_year = 2000;
        assert!(config.validate().is_err());

        config = ReaderConfig::default();
        config
            .vert_fallbacks
            .insert(VerticalCode::Column, VerticalCode::Column);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_year_validity() {
        let config = ReaderConfig::default();
        assert!(config.is_valid_year(2010));
        assert!(config.is_valid_year(9999));
        assert!(!config.is_valid_year(3001));
        assert!(!config.is_valid_year(-1));
    }
}
