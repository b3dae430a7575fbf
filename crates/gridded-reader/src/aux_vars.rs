//! Auxiliary computation rules for derived variables.
//!
//! A rule maps an output name, or a family pattern with a single `*`
//! placeholder, to an ordered list of input names and a compute function.
//! Matching a family pattern captures the placeholder substring, which is
//! substituted into every input template that carries a placeholder:
//!
//! ```text
//! conc*  <- [mmr*, rho]      concpm10 -> [mmrpm10, rho]
//! ```
//!
//! Rules live in two [`AuxRegistry`] scopes: the shared defaults and a
//! per-reader override set. [`AuxGraph`] merges them at lookup time without
//! mutating either.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::compute::{self, ComputeArgs, ComputeFn};
use crate::error::{GriddedError, Result};

/// Placeholder token in family patterns.
pub const PLACEHOLDER: char = '*';

/// Molar mass of nitrogen, g/mol.
const M_N: f64 = 14.0067;
/// Molar mass of nitrate, g/mol.
const M_NO3: f64 = 62.0049;
/// Molar mass of ammonium, g/mol.
const M_NH4: f64 = 18.0385;

static DEFAULT_RULES: Lazy<Arc<AuxRegistry>> = Lazy::new(|| match build_defaults() {
    Ok(registry) => Arc::new(registry),
    Err(e) => {
        tracing::error!(error = %e, "Invalid builtin aux rule, starting without defaults");
        Arc::new(AuxRegistry::empty())
    }
});

/// A variable name or a single-placeholder family template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VarPattern {
    Literal(String),
    Family { prefix: String, suffix: String },
}

impl VarPattern {
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(GriddedError::config("empty variable pattern"));
        }
        match s.matches(PLACEHOLDER).count() {
            0 => Ok(Self::Literal(s.to_string())),
            1 => {
                let (prefix, suffix) = s.split_once(PLACEHOLDER).unwrap_or((s, ""));
                if prefix.is_empty() && suffix.is_empty() {
                    return Err(GriddedError::config("pattern '*' matches every variable"));
                }
                Ok(Self::Family {
                    prefix: prefix.to_string(),
                    suffix: suffix.to_string(),
                })
            }
            n => Err(GriddedError::config(format!(
                "pattern '{}' has {} placeholders, at most one is allowed",
                s, n
            ))),
        }
    }

    pub fn is_family(&self) -> bool {
        matches!(self, Self::Family { .. })
    }

    /// Match `name`, returning the captured placeholder substring.
    ///
    /// Literals capture the empty string. The capture must be non-empty for
    /// families.
    pub fn capture(&self, name: &str) -> Option<String> {
        match self {
            Self::Literal(lit) => (lit == name).then(String::new),
            Self::Family { prefix, suffix } => {
                if name.len() <= prefix.len() + suffix.len() {
                    return None;
                }
                name.strip_prefix(prefix.as_str())
                    .and_then(|rest| rest.strip_suffix(suffix.as_str()))
                    .map(str::to_string)
            }
        }
    }

    /// Render the pattern with `capture` in place of the placeholder.
    pub fn substitute(&self, capture: &str) -> String {
        match self {
            Self::Literal(lit) => lit.clone(),
            Self::Family { prefix, suffix } => format!("{}{}{}", prefix, capture, suffix),
        }
    }

    /// Number of literal characters, used to rank overlapping families.
    fn specificity(&self) -> usize {
        match self {
            Self::Literal(lit) => lit.len(),
            Self::Family { prefix, suffix } => prefix.len() + suffix.len(),
        }
    }
}

impl fmt::Display for VarPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(lit) => f.write_str(lit),
            Self::Family { prefix, suffix } => write!(f, "{}{}{}", prefix, PLACEHOLDER, suffix),
        }
    }
}

/// Declarative form of a rule, as found in YAML rule files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxRuleSpec {
    pub output: String,
    pub inputs: Vec<String>,
    pub function: String,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub args: ComputeArgs,
}

#[derive(Debug, Deserialize)]
struct AuxRulesFile {
    #[serde(default)]
    rules: Vec<AuxRuleSpec>,
}

/// One computation rule.
#[derive(Clone)]
pub struct AuxRule {
    output: VarPattern,
    inputs: Vec<VarPattern>,
    function: String,
    compute: ComputeFn,
    args: ComputeArgs,
    units: Option<String>,
}

impl fmt::Debug for AuxRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuxRule")
            .field("output", &self.output.to_string())
            .field("inputs", &self.input_templates())
            .field("function", &self.function)
            .field("args", &self.args)
            .field("units", &self.units)
            .finish()
    }
}

impl AuxRule {
    /// Rule using a builtin compute function.
    pub fn new(output: &str, inputs: &[&str], function: &str) -> Result<Self> {
        let compute = compute::builtin(function).ok_or_else(|| {
            GriddedError::config(format!(
                "unknown compute function '{}' for {} (expected one of {})",
                function,
                output,
                compute::BUILTIN_NAMES.join(", ")
            ))
        })?;
        if let Some(arity) = compute::builtin_arity(function) {
            if !arity.accepts(inputs.len()) {
                return Err(GriddedError::config(format!(
                    "{} for {} takes {} inputs, {} given",
                    function,
                    output,
                    arity,
                    inputs.len()
                )));
            }
        }
        Self::with_fn(output, inputs, function, compute)
    }

    /// Rule using a caller-supplied compute function.
    pub fn with_fn(output: &str, inputs: &[&str], function: &str, compute: ComputeFn) -> Result<Self> {
        let output = VarPattern::parse(output)?;
        let inputs = inputs
            .iter()
            .map(|s| VarPattern::parse(s))
            .collect::<Result<Vec<_>>>()?;
        let rule = Self {
            output,
            inputs,
            function: function.to_string(),
            compute,
            args: ComputeArgs::new(),
            units: None,
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn from_spec(spec: &AuxRuleSpec) -> Result<Self> {
        let inputs: Vec<&str> = spec.inputs.iter().map(String::as_str).collect();
        let mut rule = Self::new(&spec.output, &inputs, &spec.function)?;
        rule.args = spec.args.clone();
        rule.units = spec.units.clone();
        Ok(rule)
    }

    pub fn with_arg(mut self, key: &str, value: f64) -> Self {
        self.args.insert(key.to_string(), value);
        self
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(GriddedError::config(format!(
                "rule for {} declares no inputs",
                self.output
            )));
        }
        if !self.output.is_family() {
            if let Some(bad) = self.inputs.iter().find(|p| p.is_family()) {
                return Err(GriddedError::config(format!(
                    "rule for {} uses placeholder input {} but its output has no placeholder",
                    self.output, bad
                )));
            }
        }
        if self.inputs.contains(&self.output) {
            return Err(GriddedError::config(format!(
                "rule for {} lists itself as input",
                self.output
            )));
        }
        Ok(())
    }

    pub fn output(&self) -> &VarPattern {
        &self.output
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn args(&self) -> &ComputeArgs {
        &self.args
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn inputs(&self) -> &[VarPattern] {
        &self.inputs
    }

    pub fn input_templates(&self) -> Vec<String> {
        self.inputs.iter().map(|p| p.to_string()).collect()
    }

    pub fn compute_fn(&self) -> &ComputeFn {
        &self.compute
    }

    /// Concrete input names for output `name`, if this rule matches it.
    pub fn instantiate(&self, name: &str) -> Option<Vec<String>> {
        let capture = self.output.capture(name)?;
        Some(self.inputs.iter().map(|p| p.substitute(&capture)).collect())
    }
}

/// A set of rules: exact outputs plus family patterns.
#[derive(Debug, Clone, Default)]
pub struct AuxRegistry {
    exact: BTreeMap<String, Arc<AuxRule>>,
    families: Vec<Arc<AuxRule>>,
}

impl AuxRegistry {
    /// The shared default rule set.
    pub fn defaults() -> Arc<AuxRegistry> {
        Arc::clone(&DEFAULT_RULES)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a rule, replacing any rule with the same output pattern.
    pub fn register(&mut self, rule: AuxRule) {
        let rule = Arc::new(rule);
        match &rule.output {
            VarPattern::Literal(name) => {
                self.exact.insert(name.clone(), rule);
            }
            VarPattern::Family { .. } => {
                self.families.retain(|r| r.output != rule.output);
                self.families.push(rule);
            }
        }
    }

    pub fn with_rule(mut self, rule: AuxRule) -> Self {
        self.register(rule);
        self
    }

    /// Parse rules from YAML (`rules: [{output, inputs, function, ...}]`).
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: AuxRulesFile = serde_yaml::from_str(yaml)?;
        let mut registry = Self::empty();
        for spec in &file.rules {
            registry.register(AuxRule::from_spec(spec)?);
        }
        Ok(registry)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names with an exact rule.
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.exact.keys().map(String::as_str)
    }

    /// Family rules, in registration order.
    pub fn families(&self) -> &[Arc<AuxRule>] {
        &self.families
    }

    pub fn lookup_exact(&self, name: &str) -> Option<&Arc<AuxRule>> {
        self.exact.get(name)
    }

    /// The most specific family rule matching `name`.
    pub fn lookup_family(&self, name: &str) -> Option<&Arc<AuxRule>> {
        self.families
            .iter()
            .filter(|r| r.output.capture(name).is_some())
            .max_by_key(|r| r.output.specificity())
    }
}

/// Merged view of default and per-reader rules.
#[derive(Debug, Clone, Copy)]
pub struct AuxGraph<'a> {
    defaults: &'a AuxRegistry,
    overrides: &'a AuxRegistry,
}

impl<'a> AuxGraph<'a> {
    pub fn new(defaults: &'a AuxRegistry, overrides: &'a AuxRegistry) -> Self {
        Self { defaults, overrides }
    }

    /// Find the rule for `name`: exact rules before families, overrides
    /// before defaults.
    pub fn lookup(&self, name: &str) -> Option<&'a Arc<AuxRule>> {
        self.overrides
            .lookup_exact(name)
            .or_else(|| self.defaults.lookup_exact(name))
            .or_else(|| self.overrides.lookup_family(name))
            .or_else(|| self.defaults.lookup_family(name))
    }

    /// All names with an exact rule in either scope.
    pub fn exact_outputs(&self) -> BTreeSet<&'a str> {
        self.defaults.outputs().chain(self.overrides.outputs()).collect()
    }

    /// All family rules in either scope, overrides first.
    pub fn family_rules(&self) -> impl Iterator<Item = &'a Arc<AuxRule>> {
        self.overrides.families().iter().chain(self.defaults.families())
    }
}

/// A rule bound to one concrete output name.
#[derive(Debug, Clone)]
pub struct ResolvedRule {
    pub name: String,
    pub inputs: Vec<String>,
    pub rule: Arc<AuxRule>,
}

impl ResolvedRule {
    /// Bind `rule` to `name`, or `None` if the rule does not match it.
    pub fn bind(name: &str, rule: &Arc<AuxRule>) -> Option<Self> {
        Some(Self {
            name: name.to_string(),
            inputs: rule.instantiate(name)?,
            rule: Arc::clone(rule),
        })
    }

    /// Rule arguments with `overrides` applied on top.
    pub fn merged_args(&self, overrides: Option<&ComputeArgs>) -> ComputeArgs {
        let mut args = self.rule.args.clone();
        if let Some(extra) = overrides {
            args.extend(extra.iter().map(|(k, v)| (k.clone(), *v)));
        }
        args
    }
}

/// Memo of names known to be computable, keyed by concrete name.
#[derive(Debug, Default)]
pub struct AuxCache {
    entries: Mutex<HashMap<String, Arc<ResolvedRule>>>,
}

impl AuxCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ResolvedRule>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(name).cloned()
    }

    pub fn insert(&self, resolved: Arc<ResolvedRule>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(resolved.name.clone(), resolved);
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn build_defaults() -> Result<AuxRegistry> {
    let rules = vec![
        AuxRule::new("concno3", &["concno3c", "concno3f"], "add")?.with_units("ug m-3"),
        AuxRule::new("conc*", &["mmr*", "rho"], "multiply")?
            .with_arg("factor", 1e9)
            .with_units("ug m-3"),
        AuxRule::new("od550gt1aer", &["od550aer", "od550lt1aer"], "subtract")?,
        AuxRule::new("wetoa", &["wetpoa", "wetsoa"], "add")?,
        AuxRule::new("dryoa", &["drypoa", "drysoa"], "add")?,
        AuxRule::new("sc550dryaer", &["ec550dryaer", "ac550dryaer"], "subtract")?,
        AuxRule::new("concNtno3", &["concno3"], "scale")?
            .with_arg("factor", M_N / M_NO3)
            .with_units("ug N m-3"),
        AuxRule::new("concNnh4", &["concnh4"], "scale")?
            .with_arg("factor", M_N / M_NH4)
            .with_units("ug N m-3"),
        AuxRule::new("ang4487aer", &["od440aer", "od870aer"], "angstrom")?
            .with_arg("lambda1", 440.0)
            .with_arg("lambda2", 870.0),
    ];

    let mut registry = AuxRegistry::empty();
    for rule in rules {
        registry.register(rule);
    }
    Ok(registry)
}
