//! circopt command-line interface.

mod config;
mod report;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use circopt_analysis::{
    MarginAnalysis, Optimizer, ParameterSet, YieldAnalysis, default_margin_workers,
};
use circopt_verify::{JosimVerifier, JosimVerifierFactory};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::{MarginRun, OptimizeRun, RunConfig, VerifySection, YieldRun};

#[derive(Parser)]
#[command(name = "circopt")]
#[command(about = "Margin, yield and yield-aware optimization of superconducting circuits", long_about = None)]
#[command(version)]
struct Cli {
    /// Run configuration (TOML)
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Upper limit on the number of parallel simulations
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Seed for yield sampling and optimization (overrides the config file)
    #[arg(long)]
    seed: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.threads == Some(0) {
        bail!("--threads must be at least 1");
    }

    let config = RunConfig::load(&cli.config)?;
    tracing::debug!("Loaded {}", cli.config.display());

    match &config {
        RunConfig::Verify(run) => run_verify(&run.verify),
        RunConfig::Margin(run) => run_margin(run, &cli),
        RunConfig::Yield(run) => run_yield(run, &cli),
        RunConfig::Optimize(run) => run_optimize(run, &cli),
    }
}

/// Worker count capped by `--threads`.
fn workers(default: usize, cli: &Cli) -> usize {
    match cli.threads {
        Some(limit) => default.min(limit),
        None => default,
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn run_verify(section: &VerifySection) -> Result<()> {
    let verifier = JosimVerifier::new(&section.to_verify_config())
        .context("Failed to prepare verification")?;

    let passed = verifier
        .check(&ParameterSet::new())
        .context("Verification failed to run")?;
    println!("{}", if passed { "SUCCESS" } else { "FAILURE" });
    Ok(())
}

fn run_margin(run: &MarginRun, cli: &Cli) -> Result<()> {
    let nominal = run.nominal();
    let workers = workers(default_margin_workers(nominal.len()), cli);
    tracing::info!("Margin analysis of {} parameters on {} workers", nominal.len(), workers);

    let factory = JosimVerifierFactory::new(run.verify.to_verify_config());
    let mut analysis = MarginAnalysis::new(factory, run.margin)?;
    let result = analysis
        .analyse(&nominal, workers)
        .context("Margin analysis failed")?;

    print!(
        "{}",
        report::format_margins(&result, &run.margin, report::terminal_width())
    );
    Ok(())
}

fn run_yield(run: &YieldRun, cli: &Cli) -> Result<()> {
    let num_samples = run.sampling.num_samples;
    let workers = workers(num_samples.min(available_cores()), cli);

    let factory = JosimVerifierFactory::new(run.verify.to_verify_config());
    let distributions = run.distributions();
    let mut analysis = match cli.seed.or(run.sampling.seed) {
        Some(seed) => YieldAnalysis::with_seed(factory, distributions, seed)?,
        None => YieldAnalysis::new(factory, distributions)?,
    };
    tracing::info!("Yield analysis seed: {}", analysis.seed());

    analysis
        .sample(num_samples, workers)
        .context("Yield analysis failed")?;

    println!("{}", report::format_yield(analysis.tally())?);
    Ok(())
}

fn run_optimize(run: &OptimizeRun, cli: &Cli) -> Result<()> {
    let mut optimize = run.optimize.to_optimize_config();
    if cli.seed.is_some() {
        optimize.seed = cli.seed;
    }

    let factory = JosimVerifierFactory::new(run.verify.to_verify_config());
    let optimizer = Optimizer::new(factory, run.margin, optimize, run.bounds())?;
    let margin_workers = workers(optimizer.margin_workers(), cli);
    let mut optimizer = optimizer.with_margin_workers(margin_workers);

    let outcome = optimizer
        .optimize(&run.nominal())
        .context("Optimization failed")?;

    print!("{}", report::format_optimization(&outcome));

    if let Some(path) = &run.optimize.output {
        let json = serde_json::to_string_pretty(&outcome)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write output file: {}", path.display()))?;
        tracing::info!("Wrote {}", path.display());
    }
    Ok(())
}
