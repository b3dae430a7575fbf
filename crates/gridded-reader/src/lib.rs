//! Catalog, variable resolution and computation graph for AeroCom gridded
//! model output.
//!
//! A data directory holds one file per variable, year and resolution, named
//! after one of two registered conventions. This crate indexes such a
//! directory and answers read requests:
//!
//! - **Direct reads**: the variable is present under its own name
//! - **Aliases**: it is present under a registered alternate name
//! - **Computed variables**: a rule derives it from other obtainable variables
//!
//! # Architecture
//!
//! ```text
//! ReadRequest
//!      │
//!      ▼
//! Resolver::resolve(var)
//!      │
//!      ├─► catalog name / 3-D alternate / alias
//!      │
//!      └─► AuxGraph rule ──► resolve each input (bounded depth)
//!               │
//!               ▼
//!      choose_ts_type(inputs)       one resolution for every input
//!               │
//!               ▼
//!      candidates() + group_by_year()   files per year, chunks allowed
//!               │
//!               ▼
//!      Materializer::load()  ──►  compute  ──►  constraints  ──►  crop
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use gridded_reader::{GriddedReader, ReadRequest, ReaderConfig};
//!
//! let reader = GriddedReader::open("/data/TM5_AP3-CTRL", ReaderConfig::from_env())?
//!     .with_loader(Arc::new(my_netcdf_loader));
//! reader.index()?;
//!
//! if reader.has_var("concno3")? {
//!     let data = reader.read_var(&ReadRequest::new("concno3").between("2010", "2010")?)?;
//! }
//! ```

pub mod aux_vars;
pub mod catalog;
pub mod compute;
pub mod config;
pub mod constraint;
pub mod data_id;
pub mod error;
pub mod frequency;
pub mod grid;
pub mod materialize;
pub mod naming;
pub mod query;
pub mod reader;
pub mod resolver;
pub mod variables;

// Re-export commonly used types at crate root
pub use aux_vars::{AuxCache, AuxGraph, AuxRegistry, AuxRule, AuxRuleSpec, ResolvedRule, VarPattern};
pub use catalog::{CatalogIndex, FileRecord, IgnoredFile};
pub use compute::{ComputeArgs, ComputeFn};
pub use config::ReaderConfig;
pub use constraint::{CompareOp, Constraint};
pub use data_id::DataId;
pub use error::{GriddedError, Result};
pub use frequency::{choose_ts_type, TsPolicy};
pub use grid::{GridLoader, GriddedData, MemoryLoader};
pub use naming::{identify, FileInfo, NamingConvention};
pub use query::{FileFilter, ReadRequest, YearFiles};
pub use reader::{CatalogRef, GriddedReader, ResolutionPlan, RENAMED_SUBDIR};
pub use resolver::{Resolution, ResolveKind, Resolver};
pub use variables::VariableRegistry;
