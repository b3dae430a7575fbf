//! Builtin computation functions for derived variables.
//!
//! A compute function receives the materialized inputs in declaration order
//! and the merged keyword arguments of its rule.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{GriddedError, Result};
use crate::grid::GriddedData;

/// Keyword arguments passed to a compute function.
pub type ComputeArgs = BTreeMap<String, f64>;

/// A function combining materialized inputs into one output.
pub type ComputeFn = Arc<dyn Fn(&[GriddedData], &ComputeArgs) -> Result<GriddedData> + Send + Sync>;

/// Names accepted by [`builtin`].
pub const BUILTIN_NAMES: &[&str] = &["add", "subtract", "multiply", "divide", "scale", "angstrom"];

/// Look up a builtin compute function by name.
pub fn builtin(name: &str) -> Option<ComputeFn> {
    let f: ComputeFn = match name {
        "add" => Arc::new(add),
        "subtract" => Arc::new(subtract),
        "multiply" => Arc::new(multiply),
        "divide" => Arc::new(divide),
        "scale" => Arc::new(scale),
        "angstrom" => Arc::new(angstrom),
        _ => return None,
    };
    Some(f)
}

/// Number of inputs a builtin accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    AtLeast(usize),
    Exactly(usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::AtLeast(min) => n >= min,
            Arity::Exactly(k) => n == k,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::AtLeast(min) => write!(f, "at least {}", min),
            Arity::Exactly(k) => write!(f, "{}", k),
        }
    }
}

/// Input count accepted by the builtin `name`.
pub fn builtin_arity(name: &str) -> Option<Arity> {
    match name {
        "add" | "multiply" => Some(Arity::AtLeast(2)),
        "subtract" | "divide" | "angstrom" => Some(Arity::Exactly(2)),
        "scale" => Some(Arity::Exactly(1)),
        _ => None,
    }
}

fn at_least<'a>(fname: &str, inputs: &'a [GriddedData], n: usize) -> Result<&'a [GriddedData]> {
    if inputs.len() < n {
        return Err(GriddedError::config(format!(
            "{} expects at least {} inputs, got {}",
            fname,
            n,
            inputs.len()
        )));
    }
    Ok(inputs)
}

fn exactly<'a>(fname: &str, inputs: &'a [GriddedData], n: usize) -> Result<&'a [GriddedData]> {
    if inputs.len() != n {
        return Err(GriddedError::config(format!(
            "{} expects {} inputs, got {}",
            fname,
            n,
            inputs.len()
        )));
    }
    Ok(inputs)
}

fn arg(fname: &str, args: &ComputeArgs, key: &str) -> Result<f64> {
    args.get(key).copied().ok_or_else(|| {
        GriddedError::config(format!("{} requires keyword argument '{}'", fname, key))
    })
}

fn fold(inputs: &[GriddedData], f: impl Fn(f64, f64) -> f64) -> Result<GriddedData> {
    let mut acc = inputs[0].clone();
    for next in &inputs[1..] {
        acc = acc.zip_with(next, &f)?;
    }
    Ok(acc)
}

/// Pointwise sum of all inputs.
pub fn add(inputs: &[GriddedData], _args: &ComputeArgs) -> Result<GriddedData> {
    fold(at_least("add", inputs, 2)?, |a, b| a + b)
}

/// First input minus the second.
pub fn subtract(inputs: &[GriddedData], _args: &ComputeArgs) -> Result<GriddedData> {
    let inputs = exactly("subtract", inputs, 2)?;
    inputs[0].zip_with(&inputs[1], |a, b| a - b)
}

/// Pointwise product of all inputs, times an optional `factor`.
pub fn multiply(inputs: &[GriddedData], args: &ComputeArgs) -> Result<GriddedData> {
    let factor = args.get("factor").copied().unwrap_or(1.0);
    let product = fold(at_least("multiply", inputs, 2)?, |a, b| a * b)?;
    Ok(product.map(|v| v * factor))
}

/// First input divided by the second; division by zero yields NaN.
pub fn divide(inputs: &[GriddedData], _args: &ComputeArgs) -> Result<GriddedData> {
    let inputs = exactly("divide", inputs, 2)?;
    inputs[0].zip_with(&inputs[1], |a, b| if b == 0.0 { f64::NAN } else { a / b })
}

/// Single input multiplied by `factor`.
pub fn scale(inputs: &[GriddedData], args: &ComputeArgs) -> Result<GriddedData> {
    let inputs = exactly("scale", inputs, 1)?;
    let factor = arg("scale", args, "factor")?;
    Ok(inputs[0].map(|v| v * factor))
}

/// Angstrom exponent from two optical depths at `lambda1` and `lambda2`.
///
/// `-ln(od1 / od2) / ln(lambda1 / lambda2)`; non-positive depths yield NaN.
pub fn angstrom(inputs: &[GriddedData], args: &ComputeArgs) -> Result<GriddedData> {
    let inputs = exactly("angstrom", inputs, 2)?;
    let l1 = arg("angstrom", args, "lambda1")?;
    let l2 = arg("angstrom", args, "lambda2")?;
    if l1 <= 0.0 || l2 <= 0.0 || l1 == l2 {
        return Err(GriddedError::config(format!(
            "angstrom needs two distinct positive wavelengths, got {} and {}",
            l1, l2
        )));
    }
    let denom = (l1 / l2).ln();
    let out = inputs[0].zip_with(&inputs[1], |od1, od2| {
        if od1 <= 0.0 || od2 <= 0.0 {
            f64::NAN
        } else {
            -(od1 / od2).ln() / denom
        }
    })?;
    Ok(GriddedData {
        units: "1".to_string(),
        ..out
    })
}
