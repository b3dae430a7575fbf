//! Time handling for read requests.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

/// Reserved year meaning "long-term average, not a calendar year".
pub const CLIMATOLOGY_YEAR: i32 = 9999;

/// Parse a start or stop bound.
///
/// Accepts RFC 3339, `%Y-%m-%dT%H:%M:%S` (UTC assumed), `%Y-%m-%d` and a bare
/// year. A bare year or date used as a stop bound expands to the last second
/// of that year or day.
pub fn parse_time_bound(s: &str, is_stop: bool) -> CommonResult<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let time = if is_stop {
            date.and_hms_opt(23, 59, 59)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        if let Some(ndt) = time {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if s.len() == 4 {
        if let Ok(year) = s.parse::<i32>() {
            let ndt = if is_stop {
                NaiveDate::from_ymd_opt(year, 12, 31).and_then(|d| d.and_hms_opt(23, 59, 59))
            } else {
                NaiveDate::from_ymd_opt(year, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
            };
            if let Some(ndt) = ndt {
                return Ok(Utc.from_utc_datetime(&ndt));
            }
        }
    }

    Err(CommonError::InvalidTime(s.to_string()))
}

/// Requested time window. Unset bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub stop: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(start: Option<DateTime<Utc>>, stop: Option<DateTime<Utc>>) -> CommonResult<Self> {
        if let (Some(a), Some(b)) = (start, stop) {
            if a > b {
                return Err(CommonError::InvalidWindow {
                    start: a.to_rfc3339(),
                    stop: b.to_rfc3339(),
                });
            }
        }
        Ok(Self { start, stop })
    }

    /// Window with no bounds.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Build a window from optional string bounds.
    ///
    /// A bare start year without a stop covers that whole year.
    pub fn from_strs(start: Option<&str>, stop: Option<&str>) -> CommonResult<Self> {
        let start_dt = start.map(|s| parse_time_bound(s, false)).transpose()?;
        let stop_dt = match (start, stop) {
            (_, Some(s)) => Some(parse_time_bound(s, true)?),
            (Some(s), None) if s.trim().len() == 4 => Some(parse_time_bound(s, true)?),
            _ => None,
        };
        Self::new(start_dt, stop_dt)
    }

    pub fn is_bounded(&self) -> bool {
        self.start.is_some() || self.stop.is_some()
    }

    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| dt >= &s) && self.stop.map_or(true, |e| dt <= &e)
    }

    /// Inclusive calendar-year range covered by the window, clamped to
    /// `[min_year, max_year]` on open sides. `None` if the window is unbounded.
    pub fn year_range(&self, min_year: i32, max_year: i32) -> Option<(i32, i32)> {
        if !self.is_bounded() {
            return None;
        }
        let first = self.start.map_or(min_year, |s| s.year());
        let last = self.stop.map_or(max_year, |e| e.year());
        Some((first, last))
    }
}
