//! # EJECTA-TRANSPORT
//!
//! Command-line driver: one Monte Carlo iteration over a model snapshot.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Serialize;

use ejecta_transport::simulator::summary;
use ejecta_transport::{info as crate_info, Estimators, ModelSnapshot, MonteCarloRunner, RunConfig, TransportStats};

/// Demo model epoch when no snapshot is given (13 days)
const DEMO_TIME_EXPLOSION: f64 = 13.0 * 86_400.0;

#[derive(Parser, Debug)]
#[command(name = "ejecta-transport", version, about = "Monte Carlo packet transport through expanding ejecta")]
struct Cli {
    /// Run configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model snapshot (JSON); a built-in demo model is used otherwise
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Number of packets
    #[arg(short = 'n', long)]
    packets: Option<usize>,

    /// Base random seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Worker threads (0 = rayon default)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Use full special-relativistic transforms
    #[arg(long)]
    full_relativity: bool,

    /// Make lines transparent
    #[arg(long)]
    no_lines: bool,

    /// Write estimators and the emitted spectrum here (JSON)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    stats: &'a TransportStats,
    estimators: &'a Estimators,
    output_nus: &'a [f64],
    output_energies: &'a [f64],
}

fn load_config(cli: &Cli) -> Result<RunConfig> {
    let mut config = match &cli.config {
        Some(path) => RunConfig::from_json_file(path)
            .with_context(|| format!("reading run configuration {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(n) = cli.packets {
        config.n_packets = n;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(threads) = cli.threads {
        config.n_threads = threads;
    }
    config.settings.full_relativity |= cli.full_relativity;
    config.settings.disable_line_scattering |= cli.no_lines;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    println!("{}", crate_info());
    println!();

    let config = load_config(&cli)?;
    let model = match &cli.model {
        Some(path) => ModelSnapshot::from_json_file(path)
            .with_context(|| format!("reading model snapshot {}", path.display()))?,
        None => {
            info!("no model given, using the built-in demo ejecta");
            ModelSnapshot::homologous_demo(20, 2_000, DEMO_TIME_EXPLOSION)?
        }
    };

    println!("Model:");
    println!("  Shells: {}", model.n_shells());
    println!("  Lines: {}", model.n_lines());
    println!("  Time since explosion: {:.2} d", model.time_explosion() / 86_400.0);
    println!("  Outer velocity: {:.3e} cm/s (β = {:.4})", model.v_outer(), model.beta_outer());
    println!();

    let runner = MonteCarloRunner::new(&model, config).context("setting up the transport run")?;
    let start = std::time::Instant::now();
    let result = runner.run().context("packet transport failed")?;
    let elapsed = start.elapsed();

    println!("{}", summary(&result));
    println!("Wall-clock time: {:.3} s", elapsed.as_secs_f64());
    println!(
        "Performance: {:.2e} packets/s",
        result.stats.packets_run as f64 / elapsed.as_secs_f64()
    );

    if let Some(path) = &cli.output {
        let output = RunOutput {
            stats: &result.stats,
            estimators: &result.estimators,
            output_nus: &result.output_nus,
            output_energies: &result.output_energies,
        };
        let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer(std::io::BufWriter::new(file), &output)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("estimators written to {}", path.display());
    }

    Ok(())
}
