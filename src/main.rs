use chrono::Utc;
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dot_evo::{Params, SimError, Simulation};

#[derive(Parser)]
#[command(name = "dot-evo", about = "Neuroevolution of foraging agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one headless simulation.
    Run {
        /// JSON parameter file; defaults are used for missing fields.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Seed for the random source.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Stop after this many generations have ended.
        #[arg(long, default_value_t = 10)]
        generations: u32,
        /// Override the population size.
        #[arg(long)]
        population: Option<usize>,
        /// CSV report path.
        #[arg(long, default_value = "simulation_report.csv")]
        report: PathBuf,
        /// Write a final rendering snapshot as JSON.
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Save the final run state as JSON.
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Run independent seeds in parallel.
    Sweep {
        /// JSON parameter file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of runs.
        #[arg(long, default_value_t = 4)]
        runs: u64,
        /// Seed of the first run; later runs use consecutive seeds.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Generations per run.
        #[arg(long, default_value_t = 10)]
        generations: u32,
        /// Directory for the per-seed reports.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Print the default parameters as JSON.
    Config,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    started_at: String,
    seed: u64,
    generations: u32,
    best_fitness: f32,
    mutation_rate: f32,
    population: usize,
    agents_created: usize,
    report: PathBuf,
}

fn load_params(config: Option<&Path>) -> Result<Params, SimError> {
    match config {
        Some(path) => Params::from_file(path),
        None => Ok(Params::default()),
    }
}

fn run_headless(
    params: Params,
    seed: u64,
    generations: u32,
    report: &Path,
) -> Result<(Simulation, RunSummary), SimError> {
    let started_at = Utc::now().to_rfc3339();
    let population = params.population_size;
    let tick_ms = params.tick_interval_ms;

    let mut sim = Simulation::with_seed(params, seed)?.with_report(report);
    sim.start(population)?;

    let target = sim.generation() + generations;
    while sim.generation() < target {
        sim.advance(tick_ms)?;
    }

    let summary = RunSummary {
        started_at,
        seed,
        generations,
        best_fitness: sim.best_fitness(),
        mutation_rate: sim.mutation_rate(),
        population: sim.agents().len(),
        agents_created: sim.world().context.len(),
        report: report.to_path_buf(),
    };
    info!(seed, best_fitness = summary.best_fitness, "run finished");
    Ok((sim, summary))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            seed,
            generations,
            population,
            report,
            snapshot,
            save,
        } => {
            let mut params = load_params(config.as_deref())?;
            if let Some(population) = population {
                params.population_size = population;
            }
            params.validate()?;

            let (sim, summary) = run_headless(params, seed, generations, &report)?;
            if let Some(path) = snapshot {
                std::fs::write(path, serde_json::to_string_pretty(&sim.snapshot())?)?;
            }
            if let Some(path) = save {
                sim.save_to_file(path)?;
            }
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Sweep {
            config,
            runs,
            seed,
            generations,
            out_dir,
        } => {
            let params = load_params(config.as_deref())?;
            std::fs::create_dir_all(&out_dir)?;

            let summaries = (seed..seed + runs)
                .into_par_iter()
                .map(|run_seed| {
                    let report = out_dir.join(format!("simulation_report_seed_{run_seed}.csv"));
                    run_headless(params.clone(), run_seed, generations, &report)
                        .map(|(_, summary)| summary)
                })
                .collect::<Result<Vec<_>, SimError>>()?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&Params::default())?);
        }
    }

    Ok(())
}
