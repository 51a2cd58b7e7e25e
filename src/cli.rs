//! Command-line surface: argument definitions and command execution.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::config::HubConfig;
use crate::dataset::{Dataset, DatasetBuilder, SyntheticSite, UpstreamArtifacts, UpstreamPaths};
use crate::env::Environment;
use crate::eval::kpi::KpiTable;
use crate::eval::policy::{Policy, RegimeRulePolicy, UncontrolledPolicy};
use crate::eval::runner::{baseline_without_pv, run_episode};
use crate::io::export::{export_kpis_csv, export_steps_csv};

#[derive(Debug, Parser)]
#[command(name = "evhub-sim")]
#[command(author, version, about = "Mall-hub EV charging and BESS dispatch simulator")]
#[command(
    long_about = "Builds hourly datasets for a mall-sited EV charging hub with PV and a \
    battery, and evaluates dispatch policies over them.\n\
    \nExamples:\n  \
    evhub-sim demo --seed 7\n  \
    evhub-sim build --pv pv.csv --mall mall.csv --chargers chargers.json \\\n    \
    --sessions sessions.csv --bess bess.json --out data/\n  \
    evhub-sim evaluate --dataset data/ --kpi-out kpis.csv"
)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the canonical dataset from upstream artifacts
    Build(BuildArgs),
    /// Run the uncontrolled baseline and the regime rule over a dataset
    Evaluate(EvaluateArgs),
    /// Build a synthetic site and evaluate it
    Demo(DemoArgs),
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// PV generation CSV (hourly or 15-minute)
    #[arg(long)]
    pub pv: PathBuf,
    /// Mall demand CSV
    #[arg(long)]
    pub mall: PathBuf,
    /// Charger list JSON
    #[arg(long)]
    pub chargers: PathBuf,
    /// EV session events CSV
    #[arg(long)]
    pub sessions: PathBuf,
    /// BESS parameters JSON
    #[arg(long)]
    pub bess: PathBuf,
    /// Grid profile CSV or location JSON
    #[arg(long)]
    pub grid: Option<PathBuf>,
    /// Installed PV inverter AC rating; defaults to the observed maximum
    #[arg(long)]
    pub installed_pv_ac_kw: Option<f64>,
    /// Episode length in hours
    #[arg(long, default_value_t = 8760)]
    pub hours: usize,
    /// Output directory for dataset.csv and schema.json
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Debug, Args)]
pub struct EvaluateArgs {
    /// Directory holding dataset.csv and schema.json
    #[arg(long)]
    pub dataset: PathBuf,
    #[command(flatten)]
    pub run: RunOptions,
}

#[derive(Debug, Args)]
pub struct DemoArgs {
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// Length of the synthetic site in days
    #[arg(long, default_value_t = 7)]
    pub days: usize,
    /// Also write the synthetic dataset to this directory
    #[arg(long)]
    pub out: Option<PathBuf>,
    #[command(flatten)]
    pub run: RunOptions,
}

/// Options shared by every command that runs episodes.
#[derive(Debug, Args)]
pub struct RunOptions {
    /// Hub configuration TOML
    #[arg(long, conflicts_with = "preset")]
    pub config: Option<PathBuf>,
    /// Built-in configuration preset
    #[arg(long)]
    pub preset: Option<String>,
    /// Write the rule policy's per-step telemetry to this CSV
    #[arg(long)]
    pub telemetry_out: Option<PathBuf>,
    /// Write the KPI comparison to this CSV
    #[arg(long)]
    pub kpi_out: Option<PathBuf>,
}

impl RunOptions {
    /// Loads the configuration: `--config` first, then `--preset`, then the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the preset is unknown.
    pub fn hub_config(&self) -> Result<HubConfig> {
        if let Some(path) = &self.config {
            return Ok(HubConfig::from_toml_file(path)?);
        }
        match &self.preset {
            Some(name) => Ok(HubConfig::from_preset(name)?),
            None => Ok(HubConfig::default()),
        }
    }
}

/// Executes the parsed command.
///
/// # Errors
///
/// Any dataset, configuration, environment or output failure, with the
/// offending path attached where there is one.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build(args) => build(&args),
        Command::Evaluate(args) => {
            let dataset = Dataset::read_dir(&args.dataset)
                .with_context(|| format!("reading dataset from {}", args.dataset.display()))?;
            evaluate(dataset, &args.run)
        }
        Command::Demo(args) => {
            let dataset = SyntheticSite::small(args.days, args.seed).build()?;
            if let Some(out) = &args.out {
                write_dataset(&dataset, out)?;
            }
            evaluate(dataset, &args.run)
        }
    }
}

fn build(args: &BuildArgs) -> Result<()> {
    let paths = UpstreamPaths {
        pv: args.pv.clone(),
        mall: args.mall.clone(),
        chargers: args.chargers.clone(),
        sessions: args.sessions.clone(),
        bess: args.bess.clone(),
        grid: args.grid.clone(),
        installed_pv_ac_kw: args.installed_pv_ac_kw,
    };
    let artifacts = UpstreamArtifacts::read(&paths)?;
    let dataset = DatasetBuilder::new(args.hours).build(artifacts)?;
    write_dataset(&dataset, &args.out)
}

fn write_dataset(dataset: &Dataset, dir: &Path) -> Result<()> {
    dataset
        .write_dir(dir)
        .with_context(|| format!("writing dataset to {}", dir.display()))?;
    info!(dir = %dir.display(), hours = dataset.table.len(), "dataset written");
    Ok(())
}

fn evaluate(dataset: Dataset, opts: &RunOptions) -> Result<()> {
    let config = opts.hub_config()?.aligned_to(&dataset.schema);
    let store = dataset.into_store()?;

    let mut policies: [Box<dyn Policy>; 2] = [Box::new(UncontrolledPolicy), Box::new(RegimeRulePolicy)];
    let mut summaries = Vec::with_capacity(policies.len());
    let mut rule_trace = Vec::new();
    for policy in &mut policies {
        let mut env = Environment::new(config.clone(), store.clone())?;
        let keep_trace = opts.telemetry_out.is_some() && policy.name() == RegimeRulePolicy.name();
        let run = run_episode(&mut env, policy.as_mut(), keep_trace)?;
        if keep_trace {
            rule_trace = run.trace;
        }
        println!("{}\n", run.summary);
        summaries.push(run.summary);
    }
    let without_pv = baseline_without_pv(&config, &store)?;
    println!("{without_pv}\n");
    summaries.insert(0, without_pv);
    println!("{}", KpiTable(&summaries));

    if let Some(path) = &opts.telemetry_out {
        export_steps_csv(&rule_trace, path)
            .with_context(|| format!("writing telemetry to {}", path.display()))?;
        info!(path = %path.display(), rows = rule_trace.len(), "telemetry written");
    }
    if let Some(path) = &opts.kpi_out {
        export_kpis_csv(&summaries, path)
            .with_context(|| format!("writing KPIs to {}", path.display()))?;
        info!(path = %path.display(), "kpis written");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("evhub-sim").chain(args.iter().copied())).expect("parse should succeed")
    }

    #[test]
    fn supports_build_cli() {
        let cli = parse(&[
            "build", "--pv", "pv.csv", "--mall", "mall.csv", "--chargers", "c.json", "--sessions", "s.csv",
            "--bess", "b.json", "--out", "data",
        ]);
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.hours, 8760);
        assert!(args.grid.is_none());
        assert_eq!(args.out, PathBuf::from("data"));
    }

    #[test]
    fn supports_evaluate_cli() {
        let cli = parse(&["--log-json", "evaluate", "--dataset", "data", "--preset", "co2_focus"]);
        assert!(cli.log_json);
        let Command::Evaluate(args) = cli.command else {
            panic!("expected evaluate");
        };
        assert_eq!(args.run.preset.as_deref(), Some("co2_focus"));
        assert!(args.run.hub_config().is_ok());
    }

    #[test]
    fn config_and_preset_are_exclusive() {
        let res = Cli::try_parse_from(["evhub-sim", "demo", "--config", "hub.toml", "--preset", "default"]);
        assert!(res.is_err());
    }

    #[test]
    fn unknown_preset_is_rejected() {
        let cli = parse(&["demo", "--preset", "nope"]);
        let Command::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        assert!(args.run.hub_config().is_err());
    }

    #[test]
    fn demo_writes_exports() {
        let dir = tempfile::tempdir().expect("tempdir");
        let steps = dir.path().join("steps.csv");
        let kpis = dir.path().join("kpis.csv");
        let cli = parse(&[
            "demo",
            "--days",
            "1",
            "--seed",
            "3",
            "--out",
            dir.path().join("data").to_str().unwrap_or_default(),
            "--telemetry-out",
            steps.to_str().unwrap_or_default(),
            "--kpi-out",
            kpis.to_str().unwrap_or_default(),
        ]);
        run(cli).expect("demo runs");
        let telemetry = std::fs::read_to_string(steps).expect("telemetry");
        assert_eq!(telemetry.lines().count(), 25);
        let kpi_text = std::fs::read_to_string(kpis).expect("kpis");
        assert_eq!(kpi_text.lines().count(), 4);
        assert!(kpi_text.contains("uncontrolled_no_pv"));
        assert!(dir.path().join("data").join("schema.json").exists());
    }
}
