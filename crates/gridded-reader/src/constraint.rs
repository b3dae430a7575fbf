//! Declarative mask-and-replace constraints applied after reading.
//!
//! ```json
//! {"operator": "<", "filter_val": 0.0, "var_name": "od550aer", "new_val": 0.0}
//! ```
//!
//! Points where `<evaluated> <operator> filter_val` holds are replaced by
//! `new_val` (NaN when unset). `evaluated` is the filtered variable itself
//! unless `var_name` names another variable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GriddedError, Result};
use crate::grid::GriddedData;

/// Comparison operator of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    /// NaN compares false under every operator except `!=`.
    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
        }
    }
}

impl FromStr for CompareOp {
    type Err = GriddedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "==" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Le),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Ge),
            other => Err(GriddedError::config(format!(
                "invalid constraint operator '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw constraint as supplied by callers, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawConstraint {
    pub operator: String,
    pub filter_val: serde_json::Value,
    #[serde(default)]
    pub var_name: Option<String>,
    #[serde(default)]
    pub new_val: Option<f64>,
}

/// A validated constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawConstraint")]
pub struct Constraint {
    pub operator: CompareOp,
    pub filter_val: f64,
    pub var_name: Option<String>,
    pub new_val: Option<f64>,
}

impl Constraint {
    pub fn new(operator: CompareOp, filter_val: f64) -> Self {
        Self {
            operator,
            filter_val,
            var_name: None,
            new_val: None,
        }
    }

    /// Evaluate the operator on another variable.
    pub fn on_var(mut self, var_name: impl Into<String>) -> Self {
        self.var_name = Some(var_name.into());
        self
    }

    pub fn replace_with(mut self, new_val: f64) -> Self {
        self.new_val = Some(new_val);
        self
    }

    /// Parse and validate a JSON constraint.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let raw: RawConstraint = serde_json::from_value(value.clone())
            .map_err(|e| GriddedError::config(format!("invalid constraint: {}", e)))?;
        Self::try_from(raw)
    }

    /// The variable other than `own` whose values are compared, if any.
    pub fn other_var<'a>(&'a self, own: &str) -> Option<&'a str> {
        self.var_name.as_deref().filter(|name| *name != own)
    }

    pub fn fill_value(&self) -> f64 {
        self.new_val.unwrap_or(f64::NAN)
    }

    /// Replace points of `data` where `evaluated` satisfies the constraint.
    ///
    /// `evaluated` defaults to `data` itself and must align with it.
    pub fn apply(&self, data: GriddedData, evaluated: Option<&GriddedData>) -> Result<GriddedData> {
        let mask: Vec<bool> = match evaluated {
            Some(other) => {
                data.check_aligned(other)?;
                other
                    .values
                    .iter()
                    .map(|v| self.operator.holds(*v, self.filter_val))
                    .collect()
            }
            None => data
                .values
                .iter()
                .map(|v| self.operator.holds(*v, self.filter_val))
                .collect(),
        };
        let fill = self.fill_value();
        let values = data
            .values
            .iter()
            .zip(mask)
            .map(|(v, masked)| if masked { fill } else { *v })
            .collect();
        Ok(GriddedData { values, ..data })
    }
}

impl TryFrom<RawConstraint> for Constraint {
    type Error = GriddedError;

    fn try_from(raw: RawConstraint) -> Result<Self> {
        let operator: CompareOp = raw.operator.parse()?;
        let filter_val = match &raw.filter_val {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .ok_or_else(|| {
            GriddedError::config(format!(
                "constraint filter_val must be numeric, got {}",
                raw.filter_val
            ))
        })?;
        Ok(Self {
            operator,
            filter_val,
            var_name: raw.var_name.filter(|v| !v.is_empty()),
            new_val: raw.new_val,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn grid(values: &[f64]) -> GriddedData {
        let t = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
        GriddedData::new("x", "1", vec![t], (1, values.len()), values.to_vec()).unwrap()
    }

    #[test]
    fn test_parse_operators() {
        for op in ["==", "!=", "<", "<=", ">", ">="] {
            assert_eq!(op.parse::<CompareOp>().unwrap().as_str(), op);
        }
        assert!(matches!("=>".parse::<CompareOp>(), Err(GriddedError::Config(_))));
    }

    #[test]
    fn test_from_json() {
        let c = Constraint::from_json(&json!({"operator": ">", "filter_val": "1.5"})).unwrap();
        assert_eq!(c.operator, CompareOp::Gt);
        assert_eq!(c.filter_val, 1.5);
        assert!(c.fill_value().is_nan());

        assert!(Constraint::from_json(&json!({"operator": ">", "filter_val": "high"})).is_err());
        assert!(Constraint::from_json(&json!({"operator": "~", "filter_val": 1})).is_err());
        assert!(Constraint::from_json(&json!({"operator": ">"})).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let c: Constraint =
            serde_json::from_str(r#"{"operator":"<","filter_val":0,"new_val":-1}"#).unwrap();
        assert_eq!(c.new_val, Some(-1.0));
        assert!(serde_json::from_str::<Constraint>(r#"{"operator":"<","filter_val":[1]}"#).is_err());
    }

    #[test]
    fn test_apply_self() {
        let c = Constraint::new(CompareOp::Lt, 0.0).replace_with(0.0);
        let out = c.apply(grid(&[-1.0, 2.0, -3.0]), None).unwrap();
        assert_eq!(out.values, vec![0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_apply_other_var() {
        let c = Constraint::new(CompareOp::Ge, 0.5).on_var("od550aer");
        let out = c.apply(grid(&[1.0, 2.0]), Some(&grid(&[0.1, 0.9]))).unwrap();
        assert_eq!(out.values[0], 1.0);
        assert!(out.values[1].is_nan());
        assert_eq!(c.other_var("concpm10"), Some("od550aer"));
        assert_eq!(c.other_var("od550aer"), None);

        assert!(c.apply(grid(&[1.0, 2.0]), Some(&grid(&[0.1]))).is_err());
    }
}
