//! Reader for one directory of gridded model output.
//!
//! Opening a reader is cheap; [`GriddedReader::index`] scans the directory.
//! Every query needs an index and fails with `NotIndexed` otherwise. The
//! index and the memo of computable names are replaced together on each
//! (re)index, so concurrent queries see either the old or the new state.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use aerocom_common::{TimeWindow, TsType, VerticalCode};
use serde::Serialize;
use tracing::{debug, info};

use crate::aux_vars::{AuxCache, AuxGraph, AuxRegistry, AuxRule, ResolvedRule};
use crate::catalog::{CatalogIndex, IgnoredFile};
use crate::compute::ComputeArgs;
use crate::config::ReaderConfig;
use crate::error::{GriddedError, Result};
use crate::frequency::choose_ts_type;
use crate::grid::{GridLoader, GriddedData};
use crate::materialize::{crop_to_window, Materializer};
use crate::naming::NamingConvention;
use crate::query::{self, ReadRequest, YearFiles};
use crate::resolver::{Resolution, ResolveKind, Resolver};
use crate::variables::VariableRegistry;

/// Conventional subdirectory holding files renamed to a registered convention.
pub const RENAMED_SUBDIR: &str = "renamed";

/// A built index plus the computations known to succeed against it.
#[derive(Debug)]
pub struct IndexedState {
    catalog: CatalogIndex,
    aux_cache: AuxCache,
}

/// Shared handle to the current catalog.
#[derive(Debug, Clone)]
pub struct CatalogRef(Arc<IndexedState>);

impl Deref for CatalogRef {
    type Target = CatalogIndex;

    fn deref(&self) -> &CatalogIndex {
        &self.0.catalog
    }
}

/// How one read will be served, computed without loading data.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionPlan {
    /// Name asked for.
    pub requested: String,
    /// Name read from files, or the computed name.
    pub var_name: String,
    pub kind: ResolveKind,
    pub ts_type: TsType,
    pub is_computed: bool,
    /// Files per year, empty for computed variables.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub years: Vec<YearFiles>,
    pub is_climatology: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<ResolutionPlan>,
    #[serde(skip)]
    rule: Option<Arc<ResolvedRule>>,
}

impl ResolutionPlan {
    /// Every file read by this plan, inputs included.
    pub fn files(&self) -> Vec<&str> {
        let own = self
            .years
            .iter()
            .flat_map(|y| y.files.iter().map(String::as_str));
        own.chain(self.inputs.iter().flat_map(|p| p.files())).collect()
    }
}

/// Reader for one data directory.
pub struct GriddedReader {
    root: PathBuf,
    data_dir: PathBuf,
    config: ReaderConfig,
    variables: Arc<VariableRegistry>,
    aux_defaults: Arc<AuxRegistry>,
    aux_overrides: AuxRegistry,
    aux_args: HashMap<String, ComputeArgs>,
    loader: Option<Arc<dyn GridLoader>>,
    state: RwLock<Option<Arc<IndexedState>>>,
}

impl fmt::Debug for GriddedReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GriddedReader")
            .field("data_dir", &self.data_dir)
            .field("aux_overrides", &self.aux_overrides.len())
            .field("has_loader", &self.loader.is_some())
            .field("indexed", &self.is_indexed())
            .finish()
    }
}

impl GriddedReader {
    /// Prepare a reader for `dir` without scanning it.
    ///
    /// Uses `dir/renamed` instead when it exists and the configuration asks
    /// for it.
    pub fn open(dir: impl AsRef<Path>, config: ReaderConfig) -> Result<Self> {
        config.validate().map_err(GriddedError::Config)?;

        let root = dir.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(GriddedError::DirectoryNotFound(root));
        }
        let renamed = root.join(RENAMED_SUBDIR);
        let data_dir = if config.use_renamed_subdir && renamed.is_dir() {
            info!(dir = %renamed.display(), "Using renamed subdirectory");
            renamed
        } else {
            root.clone()
        };

        Ok(Self {
            root,
            data_dir,
            config,
            variables: VariableRegistry::defaults(),
            aux_defaults: AuxRegistry::defaults(),
            aux_overrides: AuxRegistry::empty(),
            aux_args: HashMap::new(),
            loader: None,
            state: RwLock::new(None),
        })
    }

    pub fn with_variables(mut self, variables: Arc<VariableRegistry>) -> Self {
        self.variables = variables;
        self.clear_aux_cache();
        self
    }

    /// Replace the shared default rules.
    pub fn with_aux_defaults(mut self, defaults: Arc<AuxRegistry>) -> Self {
        self.aux_defaults = defaults;
        self.clear_aux_cache();
        self
    }

    /// Add reader-local rules on top of the defaults.
    pub fn with_aux_rules(mut self, rules: AuxRegistry) -> Self {
        self.aux_overrides = rules;
        self.clear_aux_cache();
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn GridLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Register a reader-local rule. It takes precedence over defaults.
    pub fn add_aux_rule(&mut self, rule: AuxRule) {
        debug!(output = %rule.output(), function = %rule.function(), "Adding aux rule");
        self.aux_overrides.register(rule);
        self.clear_aux_cache();
    }

    /// Keyword arguments passed when computing `var_name`, overriding the
    /// rule's own defaults.
    pub fn set_aux_args(&mut self, var_name: &str, args: ComputeArgs) {
        self.aux_args.insert(var_name.to_string(), args);
    }

    fn clear_aux_cache(&mut self) {
        let slot = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(state) = slot.as_ref() {
            state.aux_cache.clear();
        }
    }

    /// Directory given to [`open`](Self::open).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory actually scanned.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn variables(&self) -> &VariableRegistry {
        &self.variables
    }

    /// Scan the data directory and replace the current index.
    pub fn index(&self) -> Result<CatalogRef> {
        let catalog = CatalogIndex::build(&self.data_dir, &self.config)?;
        let state = Arc::new(IndexedState {
            catalog,
            aux_cache: AuxCache::new(),
        });
        let mut slot = self.state.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::clone(&state));
        Ok(CatalogRef(state))
    }

    /// Rebuild the index after the directory changed.
    pub fn reindex(&self) -> Result<CatalogRef> {
        self.index()
    }

    pub fn is_indexed(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    fn state(&self) -> Result<Arc<IndexedState>> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| GriddedError::NotIndexed(self.data_dir.clone()))
    }

    /// The current index.
    pub fn catalog(&self) -> Result<CatalogRef> {
        self.state().map(CatalogRef)
    }

    fn graph(&self) -> AuxGraph<'_> {
        AuxGraph::new(&self.aux_defaults, &self.aux_overrides)
    }

    fn resolver<'s>(&'s self, state: &'s IndexedState) -> Resolver<'s> {
        Resolver::new(
            &state.catalog,
            &self.variables,
            self.graph(),
            &state.aux_cache,
            self.config.max_aux_depth,
        )
    }

    /// Decide how `name` is obtained.
    pub fn resolve(&self, name: &str) -> Result<Resolution> {
        let state = self.state()?;
        self.resolver(&state).resolve(name)
    }

    /// True if `name` can be read directly, through an alias or computed.
    pub fn has_var(&self, name: &str) -> Result<bool> {
        let state = self.state()?;
        Ok(self.resolver(&state).has_var(name))
    }

    /// All obtainable variable names, sorted.
    pub fn vars_provided(&self) -> Result<Vec<String>> {
        let state = self.state()?;
        let catalog = &state.catalog;
        let resolver = self.resolver(&state);
        let graph = self.graph();

        let mut candidates: BTreeSet<String> =
            graph.exact_outputs().into_iter().map(str::to_string).collect();
        for rule in graph.family_rules() {
            for var in catalog.vars() {
                for input in rule.inputs().iter().filter(|p| p.is_family()) {
                    if let Some(capture) = input.capture(&var) {
                        candidates.insert(rule.output().substitute(&capture));
                    }
                }
            }
        }

        let mut vars = catalog.vars();
        vars.extend(candidates.into_iter().filter(|name| resolver.has_var(name)));
        Ok(vars.into_iter().collect())
    }

    /// Resolutions `name` is available at.
    pub fn ts_types(&self, name: &str) -> Result<BTreeSet<TsType>> {
        let state = self.state()?;
        let resolution = self.resolver(&state).resolve(name)?;
        Ok(intersect_leaves(&resolution, &|var| state.catalog.ts_types(var)))
    }

    /// Years `name` is available for.
    pub fn years_avail(&self, name: &str) -> Result<BTreeSet<i32>> {
        let state = self.state()?;
        let resolution = self.resolver(&state).resolve(name)?;
        Ok(intersect_leaves(&resolution, &|var| state.catalog.years(var)))
    }

    pub fn experiments(&self) -> Result<BTreeSet<String>> {
        Ok(self.state()?.catalog.experiments())
    }

    pub fn vert_codes(&self) -> Result<BTreeSet<VerticalCode>> {
        Ok(self.state()?.catalog.vert_codes())
    }

    pub fn ignored_files(&self) -> Result<Vec<IgnoredFile>> {
        Ok(self.state()?.catalog.ignored().to_vec())
    }

    /// Most common dataset id in the directory.
    pub fn data_id(&self) -> Result<Option<String>> {
        Ok(self.state()?.catalog.data_id())
    }

    pub fn convention(&self) -> Result<Option<NamingConvention>> {
        Ok(self.state()?.catalog.convention().cloned())
    }

    /// Work out which files serve `request`, without loading them.
    pub fn plan(&self, request: &ReadRequest) -> Result<ResolutionPlan> {
        let state = self.state()?;
        self.plan_with(&state, request)
    }

    /// Read `request` into one series.
    pub fn read_var(&self, request: &ReadRequest) -> Result<GriddedData> {
        let state = self.state()?;
        let plan = self.plan_with(&state, request)?;
        let loader = self
            .loader
            .as_deref()
            .ok_or_else(|| GriddedError::config("no grid loader configured"))?;
        let materializer = Materializer::new(&state.catalog, loader);

        let mut data = self.read_plan(&materializer, &plan, &request.window)?;
        for constraint in &request.constraints {
            let evaluated = match constraint.other_var(&request.var_name) {
                Some(other) => {
                    let sub = request.for_var(other, plan.ts_type);
                    let sub_plan = self.plan_with(&state, &sub)?;
                    Some(self.read_plan(&materializer, &sub_plan, &sub.window)?)
                }
                None => None,
            };
            data = constraint.apply(data, evaluated.as_ref())?;
        }

        info!(
            var = %request.var_name,
            ts_type = %plan.ts_type,
            computed = plan.is_computed,
            steps = data.num_times(),
            "Read variable"
        );
        Ok(data)
    }

    fn plan_with(&self, state: &IndexedState, request: &ReadRequest) -> Result<ResolutionPlan> {
        request.validate()?;
        let catalog = &state.catalog;
        if catalog.is_empty() {
            return Err(GriddedError::data_coverage(format!(
                "no files in {}",
                catalog.dir().display()
            )));
        }

        let resolution = self.resolver(state).resolve(&request.var_name)?;
        let per_input = if resolution.is_computed() {
            resolution
                .inputs
                .iter()
                .map(|input| self.coverage(catalog, input, request))
                .collect::<Result<Vec<_>>>()?
        } else {
            vec![self.coverage(catalog, &resolution, request)?]
        };
        let combined = intersect_coverage(&per_input);
        let sets: Vec<BTreeSet<TsType>> = per_input
            .iter()
            .map(|c| c.keys().copied().collect())
            .collect();
        let ts_type = choose_ts_type(&sets, request.policy(), |ts| {
            combined.get(&ts).copied().unwrap_or(0)
        })?;
        debug!(var = %request.var_name, ts_type = %ts_type, "Chose resolution");

        self.build_plan(catalog, &resolution, request, ts_type)
    }

    /// Files per resolution available to a resolution tree.
    fn coverage(
        &self,
        catalog: &CatalogIndex,
        resolution: &Resolution,
        request: &ReadRequest,
    ) -> Result<BTreeMap<TsType, usize>> {
        if resolution.is_computed() {
            let per_input = resolution
                .inputs
                .iter()
                .map(|input| self.coverage(catalog, input, request))
                .collect::<Result<Vec<_>>>()?;
            Ok(intersect_coverage(&per_input))
        } else {
            Ok(query::candidates(catalog, &resolution.canonical, request, &self.config)?.coverage())
        }
    }

    fn build_plan(
        &self,
        catalog: &CatalogIndex,
        resolution: &Resolution,
        request: &ReadRequest,
        ts_type: TsType,
    ) -> Result<ResolutionPlan> {
        if resolution.is_computed() {
            let inputs = resolution
                .inputs
                .iter()
                .map(|input| self.build_plan(catalog, input, request, ts_type))
                .collect::<Result<Vec<_>>>()?;
            return Ok(ResolutionPlan {
                requested: resolution.requested.clone(),
                var_name: resolution.canonical.clone(),
                kind: resolution.kind,
                ts_type,
                is_computed: true,
                years: Vec::new(),
                is_climatology: inputs.iter().all(|p| p.is_climatology),
                function: resolution
                    .rule
                    .as_ref()
                    .map(|r| r.rule.function().to_string()),
                inputs,
                rule: resolution.rule.clone(),
            });
        }

        let candidates = query::candidates(catalog, &resolution.canonical, request, &self.config)?;
        let rows = candidates.at_ts_type(ts_type)?;
        if rows.is_empty() {
            return Err(GriddedError::data_coverage(format!(
                "no {} files for {}",
                ts_type, resolution.canonical
            )));
        }
        let years = query::group_by_year(&rows)?;
        let is_climatology = years
            .iter()
            .all(|y| y.year == self.config.climatology_year);

        Ok(ResolutionPlan {
            requested: resolution.requested.clone(),
            var_name: resolution.canonical.clone(),
            kind: resolution.kind,
            ts_type,
            is_computed: false,
            years,
            is_climatology,
            function: None,
            inputs: Vec::new(),
            rule: None,
        })
    }

    fn read_plan(
        &self,
        materializer: &Materializer<'_>,
        plan: &ResolutionPlan,
        window: &TimeWindow,
    ) -> Result<GriddedData> {
        let mut data = match &plan.rule {
            Some(resolved) => {
                let inputs = plan
                    .inputs
                    .iter()
                    .map(|input| self.read_plan(materializer, input, window))
                    .collect::<Result<Vec<_>>>()?;
                let args = resolved.merged_args(self.aux_args.get(&plan.var_name));
                let mut out = (resolved.rule.compute_fn())(&inputs, &args)?;
                if let Some(units) = resolved.rule.units() {
                    out.units = units.to_string();
                }
                out
            }
            None => {
                let loaded = materializer.load(&plan.var_name, plan.ts_type, &plan.years)?;
                crop_to_window(loaded, window, plan.is_climatology)
            }
        };

        data.var_name = plan.requested.clone();
        data.ts_type = Some(plan.ts_type);
        if data.units.is_empty() {
            if let Some(units) = self
                .variables
                .units_of(&plan.requested)
                .or_else(|| self.variables.units_of(&plan.var_name))
            {
                data.units = units.to_string();
            }
        }
        Ok(data)
    }
}

/// Keys present in every map, with the smallest count.
fn intersect_coverage(maps: &[BTreeMap<TsType, usize>]) -> BTreeMap<TsType, usize> {
    let Some((first, rest)) = maps.split_first() else {
        return BTreeMap::new();
    };
    first
        .iter()
        .filter_map(|(ts, n)| {
            rest.iter()
                .map(|m| m.get(ts).copied())
                .try_fold(*n, |acc, count| count.map(|c| acc.min(c)))
                .map(|min| (*ts, min))
        })
        .collect()
}

/// Intersect `leaf(var)` over every file variable of a resolution tree.
fn intersect_leaves<T: Ord + Clone>(
    resolution: &Resolution,
    leaf: &dyn Fn(&str) -> BTreeSet<T>,
) -> BTreeSet<T> {
    if !resolution.is_computed() {
        return leaf(&resolution.canonical);
    }
    let mut sets = resolution.inputs.iter().map(|r| intersect_leaves(r, leaf));
    let first = sets.next().unwrap_or_default();
    sets.fold(first, |acc, s| acc.intersection(&s).cloned().collect())
}
