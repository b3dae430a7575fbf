//! Choosing one temporal resolution shared by several variables.

use std::collections::BTreeSet;

use aerocom_common::TsType;
use tracing::debug;

use crate::error::{GriddedError, Result};

/// How a resolution is picked when the requested one is not decisive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TsPolicy {
    /// Desired resolution.
    pub requested: Option<TsType>,
    /// Fail instead of falling back when `requested` is unavailable.
    pub strict: bool,
    /// Among fallbacks, prefer the resolution with the most files.
    pub prefer_longer: bool,
}

impl TsPolicy {
    pub fn flexible(requested: Option<TsType>) -> Self {
        Self {
            requested,
            ..Self::default()
        }
    }

    pub fn strict(requested: TsType) -> Self {
        Self {
            requested: Some(requested),
            strict: true,
            prefer_longer: false,
        }
    }
}

/// Pick one resolution available for every input.
///
/// `available` holds one set per input variable. `coverage(ts)` reports how
/// many files a candidate resolution yields; it is only consulted when
/// `policy.prefer_longer` is set. Ties in coverage go to the higher
/// frequency.
pub fn choose_ts_type(
    available: &[BTreeSet<TsType>],
    policy: TsPolicy,
    coverage: impl Fn(TsType) -> usize,
) -> Result<TsType> {
    let Some((first, rest)) = available.split_first() else {
        return Err(GriddedError::data_coverage("no inputs to negotiate a resolution for"));
    };
    let common: BTreeSet<TsType> = rest
        .iter()
        .fold(first.clone(), |acc, set| acc.intersection(set).copied().collect());

    let Some(&highest) = common.iter().next() else {
        return Err(GriddedError::data_coverage(format!(
            "no common resolution across inputs (available: {})",
            describe(available)
        )));
    };

    if common.len() == 1 {
        return match policy.requested {
            Some(req) if req != highest && policy.strict => Err(GriddedError::data_coverage(format!(
                "requested resolution {} unavailable, only {} exists",
                req, highest
            ))),
            _ => Ok(highest),
        };
    }

    if let Some(req) = policy.requested {
        if common.contains(&req) {
            return Ok(req);
        }
        if policy.strict {
            return Err(GriddedError::data_coverage(format!(
                "requested resolution {} unavailable (common: {})",
                req,
                join(&common)
            )));
        }
    }

    let chosen = if policy.prefer_longer {
        // BTreeSet iterates highest frequency first; max_by_key keeps the
        // last maximum, so iterate in reverse to let the first win ties.
        common
            .iter()
            .rev()
            .copied()
            .max_by_key(|ts| coverage(*ts))
            .unwrap_or(highest)
    } else {
        highest
    };
    debug!(
        chosen = %chosen,
        common = %join(&common),
        prefer_longer = policy.prefer_longer,
        "Negotiated resolution"
    );
    Ok(chosen)
}

fn join(set: &BTreeSet<TsType>) -> String {
    set.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
}

fn describe(available: &[BTreeSet<TsType>]) -> String {
    available
        .iter()
        .map(|s| format!("[{}]", join(s)))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[TsType]) -> BTreeSet<TsType> {
        items.iter().copied().collect()
    }

    fn no_coverage(_: TsType) -> usize {
        0
    }

    #[test]
    fn test_single_common_resolution() {
        let avail = [set(&[TsType::Monthly])];
        assert_eq!(
            choose_ts_type(&avail, TsPolicy::flexible(None), no_coverage).unwrap(),
            TsType::Monthly
        );
        assert_eq!(
            choose_ts_type(&avail, TsPolicy::flexible(Some(TsType::Daily)), no_coverage).unwrap(),
            TsType::Monthly
        );
        assert!(matches!(
            choose_ts_type(&avail, TsPolicy::strict(TsType::Daily), no_coverage),
            Err(GriddedError::DataCoverage(_))
        ));
        assert_eq!(
            choose_ts_type(&avail, TsPolicy::strict(TsType::Monthly), no_coverage).unwrap(),
            TsType::Monthly
        );
    }

    #[test]
    fn test_intersection() {
        let avail = [
            set(&[TsType::Hourly, TsType::Daily, TsType::Monthly]),
            set(&[TsType::Daily, TsType::Monthly]),
        ];
        assert_eq!(
            choose_ts_type(&avail, TsPolicy::flexible(None), no_coverage).unwrap(),
            TsType::Daily
        );
        assert_eq!(
            choose_ts_type(&avail, TsPolicy::flexible(Some(TsType::Monthly)), no_coverage).unwrap(),
            TsType::Monthly
        );

        let disjoint = [set(&[TsType::Hourly]), set(&[TsType::Monthly])];
        assert!(matches!(
            choose_ts_type(&disjoint, TsPolicy::flexible(None), no_coverage),
            Err(GriddedError::DataCoverage(_))
        ));
        assert!(choose_ts_type(&[], TsPolicy::flexible(None), no_coverage).is_err());
    }

    #[test]
    fn test_requested_missing() {
        let avail = [set(&[TsType::Daily, TsType::Monthly])];
        assert!(choose_ts_type(&avail, TsPolicy::strict(TsType::Hourly), no_coverage).is_err());
        assert_eq!(
            choose_ts_type(&avail, TsPolicy::flexible(Some(TsType::Hourly)), no_coverage).unwrap(),
            TsType::Daily
        );
    }

    #[test]
    fn test_prefer_longer() {
        let avail = [set(&[TsType::Daily, TsType::Monthly])];
        let policy = TsPolicy {
            prefer_longer: true,
            ..TsPolicy::default()
        };
        let counts = |daily: usize, monthly: usize| {
            move |ts: TsType| if ts == TsType::Daily { daily } else { monthly }
        };
        assert_eq!(choose_ts_type(&avail, policy, counts(10, 12)).unwrap(), TsType::Monthly);
        assert_eq!(choose_ts_type(&avail, policy, counts(12, 12)).unwrap(), TsType::Daily);
        assert_eq!(choose_ts_type(&avail, policy, counts(13, 12)).unwrap(), TsType::Daily);
    }
}
