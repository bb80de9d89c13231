//! Resilience Simulator CLI
//!
//! Run failure/recovery simulations on a generated network.
//!
//! # Example
//!
//! ```bash
//! # Ten simulated years of end-to-end restoration on an 8-node ring
//! resilience-sim --seed 42
//!
//! # A scenario file, with the strategy overridden on the command line
//! resilience-sim --config scenario.toml --strategy local-repair -p fallbackEndToEnd=false
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use resilience_simulator::{Scenario, ScenarioConfig, TopologyKind};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Resilience Simulator
///
/// Generates a ring or grid network, fails and repairs its SRGs at random,
/// and lets a recovery strategy reroute the traffic. Reproducible when the
/// same seed is used.
#[derive(Parser, Debug)]
#[command(name = "resilience-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Scenario file (TOML). Flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Recovery strategy
    #[arg(short, long)]
    strategy: Option<String>,

    /// Strategy parameter as KEY=VALUE (can be specified multiple times)
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Seed of the failure model. When omitted, a random seed is used.
    #[arg(long)]
    seed: Option<u64>,

    /// Topology shape
    #[arg(long, value_enum)]
    topology: Option<Shape>,

    /// Ring size
    #[arg(short = 'n', long)]
    nodes: Option<usize>,

    /// Simulated time limit in hours (-1 for none)
    #[arg(short = 't', long, allow_hyphen_values = true)]
    total_sim_time: Option<f64>,

    /// End of the transitory period in hours (-1 for none)
    #[arg(long, allow_hyphen_values = true)]
    transitory_time: Option<f64>,

    /// Event limit (-1 for none)
    #[arg(short = 'e', long, allow_hyphen_values = true)]
    total_events: Option<i64>,

    /// List the available strategies and exit
    #[arg(long)]
    list_strategies: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Shape {
    Ring,
    Grid,
}

impl From<Shape> for TopologyKind {
    fn from(shape: Shape) -> Self {
        match shape {
            Shape::Ring => TopologyKind::Ring,
            Shape::Grid => TopologyKind::Grid,
        }
    }
}

fn load_config(path: &PathBuf) -> Result<ScenarioConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;
    ScenarioConfig::from_toml_str(&contents)
        .with_context(|| format!("Failed to parse scenario file: {}", path.display()))
}

/// Apply command-line overrides to the scenario.
fn apply_overrides(config: &mut ScenarioConfig, args: &Args) -> Result<()> {
    if let Some(ref strategy) = args.strategy {
        config.strategy.name = strategy.clone();
    }
    for param in &args.params {
        let Some((key, value)) = param.split_once('=') else {
            bail!("Strategy parameter must be KEY=VALUE, got {param:?}");
        };
        config
            .strategy
            .params
            .insert(key.trim().to_string(), toml::Value::String(value.trim().to_string()));
    }
    if let Some(shape) = args.topology {
        config.topology.kind = shape.into();
    }
    if let Some(nodes) = args.nodes {
        config.topology.nodes = nodes;
    }
    if let Some(time) = args.total_sim_time {
        config.driver.total_sim_time = time;
    }
    if let Some(time) = args.transitory_time {
        config.driver.transitory_time = time;
    }
    if let Some(events) = args.total_events {
        config.driver.total_events = events;
    }
    config.strategy.seed = args
        .seed
        .or(config.strategy.seed)
        .or_else(|| Some(rand::random()));
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("warn,resilience_simulator=info,resilience_recovery=info")
        }))
        .init();

    let args = Args::parse();

    let mut config = match args.config {
        Some(ref path) => load_config(path)?,
        None => ScenarioConfig::default(),
    };
    apply_overrides(&mut config, &args)?;

    let scenario = Scenario::new(config).context("Failed to build scenario")?;
    if args.list_strategies {
        for name in scenario.registry().names() {
            println!("{name}");
        }
        return Ok(());
    }

    info!(
        strategy = %scenario.config().strategy.name,
        topology = ?scenario.config().topology.kind,
        nodes = scenario.network().num_nodes(),
        links = scenario.network().num_links(),
        demands = scenario.network().num_demands(),
        "Starting simulation"
    );

    let outcome = scenario.run().context("Simulation failed")?;
    print!("{}", outcome.render());
    Ok(())
}
