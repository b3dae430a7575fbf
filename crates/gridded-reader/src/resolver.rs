//! Deciding how a requested variable name is obtained.
//!
//! Attempts, first success wins:
//!
//! 1. the name is in the catalog
//! 2. a 3-D alternate name of it is in the catalog
//! 3. one of its declared aliases is in the catalog
//! 4. it is an alias of a canonical name that is in the catalog
//! 5. an auxiliary rule computes it from resolvable inputs

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::aux_vars::{AuxCache, AuxGraph, ResolvedRule};
use crate::catalog::CatalogIndex;
use crate::error::{GriddedError, Result};
use crate::variables::VariableRegistry;

/// How a name was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveKind {
    Direct,
    Alias,
    Computed,
}

/// Outcome of resolving one name.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub kind: ResolveKind,
    /// The name that was asked for.
    pub requested: String,
    /// The name present in the catalog, or the computed name.
    pub canonical: String,
    /// Resolutions of the rule inputs, in declaration order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<Resolution>,
    #[serde(skip)]
    pub rule: Option<Arc<ResolvedRule>>,
}

impl Resolution {
    fn file(kind: ResolveKind, requested: &str, canonical: &str) -> Self {
        Self {
            kind,
            requested: requested.to_string(),
            canonical: canonical.to_string(),
            inputs: Vec::new(),
            rule: None,
        }
    }

    pub fn is_computed(&self) -> bool {
        self.kind == ResolveKind::Computed
    }

    /// Names read from files anywhere in this resolution tree.
    pub fn file_vars(&self) -> Vec<&str> {
        if self.is_computed() {
            self.inputs.iter().flat_map(|r| r.file_vars()).collect()
        } else {
            vec![self.canonical.as_str()]
        }
    }
}

/// Resolves names against one catalog.
pub struct Resolver<'a> {
    catalog: &'a CatalogIndex,
    variables: &'a VariableRegistry,
    graph: AuxGraph<'a>,
    cache: &'a AuxCache,
    max_depth: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(
        catalog: &'a CatalogIndex,
        variables: &'a VariableRegistry,
        graph: AuxGraph<'a>,
        cache: &'a AuxCache,
        max_depth: usize,
    ) -> Self {
        Self {
            catalog,
            variables,
            graph,
            cache,
            max_depth,
        }
    }

    /// Resolve `name`, failing with `VariableNotAvailable`.
    pub fn resolve(&self, name: &str) -> Result<Resolution> {
        let mut active = Vec::new();
        self.resolve_at(name, &mut active)
    }

    /// True if `name` is obtainable, by any path.
    pub fn has_var(&self, name: &str) -> bool {
        if self.find_file_var(name).is_some() || self.cache.get(name).is_some() {
            return true;
        }
        self.resolve(name).is_ok()
    }

    /// Attempts 1-4: a name that maps to files.
    pub fn find_file_var(&self, name: &str) -> Option<(ResolveKind, String)> {
        if self.catalog.has_file_var(name) {
            return Some((ResolveKind::Direct, name.to_string()));
        }
        if let Some(alt) = self
            .variables
            .alt_3d_of(name)
            .into_iter()
            .find(|alt| self.catalog.has_file_var(alt))
        {
            return Some((ResolveKind::Alias, alt.to_string()));
        }
        if let Some(alias) = self
            .variables
            .aliases_of(name)
            .iter()
            .find(|alias| self.catalog.has_file_var(alias))
        {
            return Some((ResolveKind::Alias, alias.clone()));
        }
        self.variables
            .canonical_of(name)
            .filter(|canonical| self.catalog.has_file_var(canonical))
            .map(|canonical| (ResolveKind::Alias, canonical.to_string()))
    }

    fn resolve_at(&self, name: &str, active: &mut Vec<String>) -> Result<Resolution> {
        if let Some((kind, canonical)) = self.find_file_var(name) {
            return Ok(Resolution::file(kind, name, &canonical));
        }
        self.resolve_computed(name, active)
    }

    /// Attempt 5, guarded against cycles and runaway nesting.
    fn resolve_computed(&self, name: &str, active: &mut Vec<String>) -> Result<Resolution> {
        if active.iter().any(|n| n == name) {
            debug!(var = %name, chain = ?active, "Cycle in aux rules");
            return Err(GriddedError::not_available(format!(
                "{} (cyclic rule via {})",
                name,
                active.join(" -> ")
            )));
        }
        if active.len() >= self.max_depth {
            debug!(var = %name, depth = active.len(), "Aux rule nesting too deep");
            return Err(GriddedError::not_available(format!(
                "{} (rule nesting deeper than {})",
                name, self.max_depth
            )));
        }

        let resolved = match self.cache.get(name) {
            Some(hit) => hit,
            None => {
                let rule = self.graph.lookup(name).ok_or_else(|| {
                    GriddedError::not_available(format!(
                        "{} (not in {} and no rule computes it)",
                        name,
                        self.catalog.dir().display()
                    ))
                })?;
                let bound = ResolvedRule::bind(name, rule)
                    .ok_or_else(|| GriddedError::not_available(name.to_string()))?;
                Arc::new(bound)
            }
        };

        active.push(name.to_string());
        let inputs = resolved
            .inputs
            .iter()
            .map(|input| self.resolve_at(input, active))
            .collect::<Result<Vec<_>>>();
        active.pop();
        let inputs = inputs.map_err(|e| match e {
            GriddedError::VariableNotAvailable(why) => {
                GriddedError::not_available(format!("{}: input {}", name, why))
            }
            other => other,
        })?;

        self.cache.insert(Arc::clone(&resolved));
        debug!(var = %name, inputs = ?resolved.inputs, function = %resolved.rule.function(), "Resolved computed variable");

        Ok(Resolution {
            kind: ResolveKind::Computed,
            requested: name.to_string(),
            canonical: name.to_string(),
            inputs,
            rule: Some(resolved),
        })
    }
}
