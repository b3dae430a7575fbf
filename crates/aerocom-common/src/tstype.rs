//! Temporal resolution tags.
//!
//! The set of valid tags is fixed. Variants are declared from highest to
//! lowest frequency, so the derived `Ord` is the frequency order used when
//! negotiating a shared resolution: `a < b` means `a` has the shorter
//! sampling interval.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

/// A temporal resolution tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TsType {
    #[serde(rename = "minutely")]
    Minutely,
    #[serde(rename = "hourly")]
    Hourly,
    #[serde(rename = "3hourly")]
    ThreeHourly,
    #[serde(rename = "6hourly")]
    SixHourly,
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "monthly")]
    Monthly,
    #[serde(rename = "yearly")]
    Yearly,
}

impl TsType {
    /// All valid tags, highest frequency first.
    pub const ALL: [TsType; 8] = [
        TsType::Minutely,
        TsType::Hourly,
        TsType::ThreeHourly,
        TsType::SixHourly,
        TsType::Daily,
        TsType::Weekly,
        TsType::Monthly,
        TsType::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TsType::Minutely => "minutely",
            TsType::Hourly => "hourly",
            TsType::ThreeHourly => "3hourly",
            TsType::SixHourly => "6hourly",
            TsType::Daily => "daily",
            TsType::Weekly => "weekly",
            TsType::Monthly => "monthly",
            TsType::Yearly => "yearly",
        }
    }

    /// Position in the frequency order (0 = highest frequency).
    pub fn rank(&self) -> usize {
        *self as usize
    }

    /// True if `self` samples more often than `other`.
    pub fn is_finer_than(&self, other: TsType) -> bool {
        *self < other
    }

    /// True for resolutions where one calendar year is split across
    /// several time steps (and possibly several files).
    pub fn is_sub_yearly(&self) -> bool {
        self.is_finer_than(TsType::Yearly)
    }
}

impl fmt::Display for TsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TsType {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        TsType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| CommonError::InvalidTsType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_tags() {
        for ts in TsType::ALL {
            assert_eq!(ts.as_str().parse::<TsType>().unwrap(), ts);
        }
        assert_eq!("Daily".parse::<TsType>().unwrap(), TsType::Daily);
        assert!("fortnightly".parse::<TsType>().is_err());
        assert!("".parse::<TsType>().is_err());
    }

    #[test]
    fn test_frequency_order() {
        assert!(TsType::Hourly < TsType::Daily);
        assert!(TsType::Daily < TsType::Monthly);
        assert!(TsType::Monthly < TsType::Yearly);
        assert!(TsType::Daily.is_finer_than(TsType::Monthly));
        assert!(!TsType::Yearly.is_sub_yearly());
        assert!(TsType::Monthly.is_sub_yearly());
        assert_eq!(TsType::Minutely.rank(), 0);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&TsType::ThreeHourly).unwrap();
        assert_eq!(json, "\"3hourly\"");
        let ts: TsType = serde_json::from_str("\"monthly\"").unwrap();
        assert_eq!(ts, TsType::Monthly);
    }
}
