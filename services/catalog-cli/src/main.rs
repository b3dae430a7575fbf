//! Command-line inspector for AeroCom gridded data directories.
//!
//! Indexes one directory and prints the variables it provides, the files
//! that were indexed or ignored, and how a read would be served.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aerocom_common::{TsType, VerticalCode};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gridded_reader::{
    AuxRegistry, GriddedReader, ReadRequest, ReaderConfig, ResolutionPlan, VariableRegistry,
};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "catalog-cli")]
#[command(about = "Inspect AeroCom gridded model output directories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Extra alias / units table (YAML), merged over the defaults
    #[arg(long, global = true)]
    variables: Option<PathBuf>,

    /// Extra computation rules (YAML), taking precedence over the defaults
    #[arg(long, global = true)]
    aux_rules: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every obtainable variable with its resolutions and years
    Vars {
        /// Data directory
        dir: PathBuf,
    },

    /// List indexed files
    Files {
        /// Data directory
        dir: PathBuf,

        /// List skipped files and the reason instead
        #[arg(long)]
        ignored: bool,
    },

    /// Show which files would serve a read, without loading them
    Plan(PlanArgs),
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Data directory
    dir: PathBuf,

    /// Variable to read
    var: String,

    /// Requested resolution (e.g. monthly, daily)
    #[arg(long)]
    ts_type: Option<TsType>,

    /// Window start (year, date or timestamp)
    #[arg(long)]
    start: Option<String>,

    /// Window stop (year, date or timestamp)
    #[arg(long)]
    stop: Option<String>,

    /// Experiment to select when several are present
    #[arg(long)]
    experiment: Option<String>,

    /// Vertical code (e.g. Surface, Column, ModelLevel)
    #[arg(long)]
    vert_code: Option<VerticalCode>,

    /// Fail rather than fall back to another resolution
    #[arg(long)]
    strict: bool,

    /// Prefer the resolution with the most files
    #[arg(long)]
    prefer_longer: bool,
}

impl PlanArgs {
    fn request(&self) -> Result<ReadRequest> {
        let mut request = ReadRequest::new(&self.var);
        if self.start.is_some() || self.stop.is_some() {
            let window = aerocom_common::TimeWindow::from_strs(
                self.start.as_deref(),
                self.stop.as_deref(),
            )
            .context("invalid time window")?;
            request = request.in_window(window);
        }
        if let Some(ts) = self.ts_type {
            request = request.at_ts_type(ts);
        }
        if let Some(exp) = &self.experiment {
            request = request.for_experiment(exp.as_str());
        }
        if let Some(vert) = self.vert_code {
            request = request.at_vert_code(vert);
        }
        if self.strict {
            request = request.strict();
        }
        if self.prefer_longer {
            request = request.prefer_longer();
        }
        Ok(request)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);
    if cli.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let dir = match &cli.command {
        Commands::Vars { dir } | Commands::Files { dir, .. } => dir,
        Commands::Plan(args) => &args.dir,
    };
    let reader = open_reader(&cli, dir)?;

    match &cli.command {
        Commands::Vars { .. } => print_vars(&reader, cli.json),
        Commands::Files { ignored, .. } => print_files(&reader, *ignored, cli.json),
        Commands::Plan(args) => {
            let plan = reader.plan(&args.request()?)?;
            print_plan(&plan, cli.json)
        }
    }
}

fn open_reader(cli: &Cli, dir: &Path) -> Result<GriddedReader> {
    let config = ReaderConfig::from_env();
    let mut reader = GriddedReader::open(dir, config)
        .with_context(|| format!("cannot open {}", dir.display()))?;

    if let Some(path) = &cli.variables {
        let extra = VariableRegistry::from_file(path)
            .with_context(|| format!("cannot load variables from {}", path.display()))?;
        let merged = VariableRegistry::defaults().merged(&extra)?;
        reader = reader.with_variables(Arc::new(merged));
    }
    if let Some(path) = &cli.aux_rules {
        let rules = AuxRegistry::from_file(path)
            .with_context(|| format!("cannot load rules from {}", path.display()))?;
        debug!(rules = rules.len(), "Loaded aux rules");
        reader = reader.with_aux_rules(rules);
    }

    reader
        .index()
        .with_context(|| format!("cannot index {}", reader.data_dir().display()))?;
    Ok(reader)
}

fn print_vars(reader: &GriddedReader, json: bool) -> Result<()> {
    let mut rows = Vec::new();
    for var in reader.vars_provided()? {
        let resolution = reader.resolve(&var)?;
        let ts_types = reader.ts_types(&var)?;
        let years = reader.years_avail(&var)?;
        rows.push((var, resolution.kind, ts_types, years));
    }

    if json {
        let out: Vec<_> = rows
            .iter()
            .map(|(var, kind, ts_types, years)| {
                serde_json::json!({
                    "var_name": var,
                    "kind": kind,
                    "ts_types": ts_types,
                    "years": years,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if let Some(id) = reader.data_id()? {
        println!("data id: {}", id);
    }
    for (var, kind, ts_types, years) in &rows {
        let ts: Vec<&str> = ts_types.iter().map(TsType::as_str).collect();
        let span = match (years.first(), years.last()) {
            (Some(first), Some(last)) => format!("{}-{}", first, last),
            _ => "-".to_string(),
        };
        println!("{:<20} {:<9} {:<28} {}", var, format!("{:?}", kind).to_lowercase(), ts.join(","), span);
    }
    Ok(())
}

fn print_files(reader: &GriddedReader, ignored: bool, json: bool) -> Result<()> {
    let catalog = reader.catalog()?;
    if ignored {
        if json {
            println!("{}", serde_json::to_string_pretty(catalog.ignored())?);
        } else {
            for file in catalog.ignored() {
                println!("{}: {}", file.filename, file.reason);
            }
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(catalog.records())?);
        return Ok(());
    }
    for record in catalog.records() {
        let vert = record
            .vert_code
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:>4} {:<8} {:<12} {}",
            record.var_name, record.year, record.ts_type, vert, record.filename
        );
    }
    Ok(())
}

fn print_plan(plan: &ResolutionPlan, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(plan)?);
    } else {
        print_plan_text(plan, 0);
    }
    Ok(())
}

fn print_plan_text(plan: &ResolutionPlan, depth: usize) {
    let indent = "  ".repeat(depth);
    match &plan.function {
        Some(function) => println!(
            "{}{} = {}({}) @ {}",
            indent,
            plan.requested,
            function,
            plan.inputs
                .iter()
                .map(|p| p.requested.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            plan.ts_type
        ),
        None if plan.requested != plan.var_name => println!(
            "{}{} (as {}) @ {}",
            indent, plan.requested, plan.var_name, plan.ts_type
        ),
        None => println!("{}{} @ {}", indent, plan.requested, plan.ts_type),
    }
    for year in &plan.years {
        for file in &year.files {
            println!("{}  {} {}", indent, year.year, file);
        }
    }
    for input in &plan.inputs {
        print_plan_text(input, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_args() {
        let cli = Cli::try_parse_from([
            "catalog-cli",
            "plan",
            "/data/TM5",
            "concno3",
            "--ts-type",
            "monthly",
            "--vert-code",
            "Surface",
            "--start",
            "2010-03-01",
            "--strict",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        let Commands::Plan(args) = cli.command else {
            panic!("expected plan subcommand");
        };
        let request = args.request().unwrap();
        assert_eq!(request.var_name, "concno3");
        assert_eq!(request.ts_type, Some(TsType::Monthly));
        assert_eq!(request.vert_code, Some(VerticalCode::Surface));
        assert!(!request.flex_ts_type);
        assert!(request.window.start.is_some());
        assert!(request.window.stop.is_none());
    }

    #[test]
    fn test_plan_bare_year_covers_year() {
        let cli = Cli::try_parse_from(["catalog-cli", "plan", "/d", "od550aer", "--start", "2010"]).unwrap();
        let Commands::Plan(args) = cli.command else {
            panic!("expected plan subcommand");
        };
        let window = args.request().unwrap().window;
        assert_eq!(window.year_range(1900, 2100), Some((2010, 2010)));
    }

    #[test]
    fn test_parse_rejects_unknown_ts_type() {
        assert!(Cli::try_parse_from(["catalog-cli", "plan", "/d", "x", "--ts-type", "seasonal"]).is_err());
    }

    #[test]
    fn test_parse_files() {
        let cli = Cli::try_parse_from(["catalog-cli", "files", "/d", "--ignored"]).unwrap();
        assert!(matches!(cli.command, Commands::Files { ignored: true, .. }));
    }
}
