//! Variable naming tables: aliases, 3-D alternate names and default units.
//!
//! A registry is immutable once built. The process-wide defaults are
//! constructed once and shared; a reader may be handed a different registry
//! (for example loaded from YAML and merged over the defaults).
//!
//! ```yaml
//! aliases:
//!   od550aer: [od550_aer, aod550]
//! alt_3d:
//!   ec550aer: [ec5503Daer]
//! units:
//!   concno3: ug m-3
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{GriddedError, Result};

static DEFAULT_REGISTRY: Lazy<Arc<VariableRegistry>> = Lazy::new(|| Arc::new(build_defaults()));

/// Alias, alternate-name and unit tables for variable names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRegistry {
    /// Canonical name -> accepted aliases.
    #[serde(default)]
    aliases: BTreeMap<String, Vec<String>>,

    /// Canonical name -> legacy names of the same 3-D field.
    #[serde(default)]
    alt_3d: BTreeMap<String, Vec<String>>,

    /// Variable name -> units.
    #[serde(default)]
    units: BTreeMap<String, String>,
}

impl VariableRegistry {
    /// The shared default registry.
    pub fn defaults() -> Arc<VariableRegistry> {
        Arc::clone(&DEFAULT_REGISTRY)
    }

    /// An empty registry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a registry from YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let registry: VariableRegistry = serde_yaml::from_str(yaml)?;
        registry.validate()?;
        Ok(registry)
    }

    /// Load a registry from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Add an alias for `canonical`.
    pub fn with_alias(mut self, canonical: &str, alias: &str) -> Result<Self> {
        self.aliases
            .entry(canonical.to_string())
            .or_default()
            .push(alias.to_string());
        self.validate()?;
        Ok(self)
    }

    /// Add a legacy 3-D name for `canonical`.
    pub fn with_alt_3d(mut self, canonical: &str, alternate: &str) -> Result<Self> {
        self.alt_3d
            .entry(canonical.to_string())
            .or_default()
            .push(alternate.to_string());
        self.validate()?;
        Ok(self)
    }

    pub fn with_units(mut self, var_name: &str, units: &str) -> Self {
        self.units.insert(var_name.to_string(), units.to_string());
        self
    }

    /// Combine two registries. Entries of `other` extend or replace ours.
    pub fn merged(&self, other: &VariableRegistry) -> Result<Self> {
        let mut merged = self.clone();
        for (canonical, aliases) in &other.aliases {
            let entry = merged.aliases.entry(canonical.clone()).or_default();
            for alias in aliases {
                if !entry.contains(alias) {
                    entry.push(alias.clone());
                }
            }
        }
        for (canonical, alternates) in &other.alt_3d {
            let entry = merged.alt_3d.entry(canonical.clone()).or_default();
            for alt in alternates {
                if !entry.contains(alt) {
                    entry.push(alt.clone());
                }
            }
        }
        merged
            .units
            .extend(other.units.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged.validate()?;
        Ok(merged)
    }

    /// Reject aliases that shadow their own name or belong to two names.
    pub fn validate(&self) -> Result<()> {
        let mut owner: BTreeMap<&str, &str> = BTreeMap::new();
        for (canonical, aliases) in &self.aliases {
            for alias in aliases {
                if alias == canonical {
                    return Err(GriddedError::config(format!(
                        "variable {} lists itself as alias",
                        canonical
                    )));
                }
                if let Some(prev) = owner.insert(alias, canonical) {
                    if prev != canonical {
                        return Err(GriddedError::config(format!(
                            "alias {} is declared for both {} and {}",
                            alias, prev, canonical
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Aliases declared for `var_name`.
    pub fn aliases_of(&self, var_name: &str) -> &[String] {
        self.aliases
            .get(var_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The canonical name `alias` is declared for, if any.
    pub fn canonical_of(&self, alias: &str) -> Option<&str> {
        self.aliases
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|a| a == alias))
            .map(|(canonical, _)| canonical.as_str())
    }

    /// Alternate 3-D names related to `var_name`, in either direction.
    pub fn alt_3d_of(&self, var_name: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .alt_3d
            .get(var_name)
            .map(|alts| alts.iter().map(String::as_str).collect())
            .unwrap_or_default();
        for (canonical, alts) in &self.alt_3d {
            if alts.iter().any(|a| a == var_name) {
                names.push(canonical.as_str());
            }
        }
        names
    }

    pub fn units_of(&self, var_name: &str) -> Option<&str> {
        self.units.get(var_name).map(String::as_str)
    }
}

fn build_defaults() -> VariableRegistry {
    let aliases = [
        ("od550aer", &["od550_aer", "aod550"][..]),
        ("ang4487aer", &["ang4487_aer", "angstrom"][..]),
        ("concpm10", &["pm10"][..]),
        ("concpm25", &["pm25"][..]),
        ("concno3", &["no3"][..]),
        ("sc550dryaer", &["scatc550dryaer"][..]),
        ("ac550dryaer", &["absc550dryaer"][..]),
    ];
    let alt_3d = [
        ("ec550aer", &["ec5503Daer"][..]),
        ("bsc550aer", &["bsc5503Daer"][..]),
        ("concso4", &["concso43D"][..]),
    ];
    let units = [
        ("od550aer", "1"),
        ("od550lt1aer", "1"),
        ("od550gt1aer", "1"),
        ("od440aer", "1"),
        ("od870aer", "1"),
        ("ang4487aer", "1"),
        ("concno3", "ug m-3"),
        ("concno3c", "ug m-3"),
        ("concno3f", "ug m-3"),
        ("concnh4", "ug m-3"),
        ("concNtno3", "ug N m-3"),
        ("concNnh4", "ug N m-3"),
        ("concpm10", "ug m-3"),
        ("concpm25", "ug m-3"),
        ("mmrpm10", "kg kg-1"),
        ("mmrpm25", "kg kg-1"),
        ("rho", "kg m-3"),
        ("ec550aer", "m-1"),
        ("ac550dryaer", "m-1"),
        ("sc550dryaer", "m-1"),
    ];

    VariableRegistry {
        aliases: aliases
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect(),
        alt_3d: alt_3d
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect(),
        units: units
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid_and_shared() {
        let a = VariableRegistry::defaults();
        let b = VariableRegistry::defaults();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.validate().is_ok());
        assert_eq!(a.units_of("concno3"), Some("ug m-3"));
    }

    #[test]
    fn test_alias_lookups() {
        let reg = VariableRegistry::defaults();
        assert!(reg.aliases_of("od550aer").contains(&"aod550".to_string()));
        assert_eq!(reg.canonical_of("aod550"), Some("od550aer"));
        assert_eq!(reg.canonical_of("od550aer"), None);
        assert!(reg.aliases_of("unknown").is_empty());
    }

    #[test]
    fn test_alt_3d_both_directions() {
        let reg = VariableRegistry::defaults();
        assert_eq!(reg.alt_3d_of("ec550aer"), vec!["ec5503Daer"]);
        assert_eq!(reg.alt_3d_of("ec5503Daer"), vec!["ec550aer"]);
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
aliases:
  od550aer: [aod]
units:
  od550aer: "1"
"#;
        let reg = VariableRegistry::from_yaml_str(yaml).unwrap();
        assert_eq!(reg.canonical_of("aod"), Some("od550aer"));
        assert!(reg.alt_3d_of("ec550aer").is_empty());
    }

    #[test]
    fn test_conflicting_alias_rejected() {
        let yaml = r#"
aliases:
  a: [x]
  b: [x]
"#;
        assert!(matches!(
            VariableRegistry::from_yaml_str(yaml),
            Err(GriddedError::Config(_))
        ));
        assert!(VariableRegistry::empty().with_alias("a", "a").is_err());
    }

    #[test]
    fn test_merge_does_not_touch_defaults() {
        let extra = VariableRegistry::empty().with_alias("od550aer", "tau").unwrap();
        let merged = VariableRegistry::defaults().merged(&extra).unwrap();
        assert_eq!(merged.canonical_of("tau"), Some("od550aer"));
        assert_eq!(VariableRegistry::defaults().canonical_of("tau"), None);
    }
}
