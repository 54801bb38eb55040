use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use neuroflap::simulation::archive::{JsonFileArchive, load_genome};
use neuroflap::simulation::evolution::EvolutionEngine;
use neuroflap::simulation::params::Params;
use neuroflap::simulation::trainer::{Trainer, replay};

#[derive(Parser, Debug)]
#[command(name = "neuroflap", about = "Evolve flap/no-flap controllers headlessly")]
struct Cli {
    /// TOML file with training parameters.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Simulation time step in seconds.
    #[arg(long, global = true, default_value_t = 1.0 / 60.0)]
    dt: f32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a population and keep the best genome on disk.
    Train {
        /// Number of generations to run.
        #[arg(long, default_value_t = 50)]
        generations: usize,
        /// Override the configured RNG seed.
        #[arg(long)]
        seed: Option<u64>,
        /// Override the configured population size.
        #[arg(long)]
        population: Option<usize>,
        /// Override where the best genome is written.
        #[arg(long)]
        archive: Option<PathBuf>,
    },
    /// Fly a saved genome through a fresh course.
    Replay {
        /// Genome snapshot to load; defaults to the configured archive path.
        #[arg(long)]
        archive: Option<PathBuf>,
        /// Seed for the course layout.
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut params = match &cli.config {
        Some(path) => Params::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Params::default(),
    };

    match cli.command {
        Command::Train {
            generations,
            seed,
            population,
            archive,
        } => {
            if seed.is_some() {
                params.seed = seed;
            }
            if let Some(population) = population {
                params.population_size = population;
            }
            if let Some(archive) = archive {
                params.archive_path = archive;
            }
            train(params, generations, cli.dt)
        }
        Command::Replay { archive, seed } => {
            let path = archive.unwrap_or_else(|| params.archive_path.clone());
            let genome = load_genome(&path)
                .with_context(|| format!("loading genome from {}", path.display()))?;
            let report = replay(genome, params.course, seed, cli.dt)?;
            tracing::info!(
                obstacles_passed = report.obstacles_passed,
                time_alive = report.time_alive,
                "replay finished"
            );
            Ok(())
        }
    }
}

fn train(params: Params, generations: usize, dt: f32) -> Result<()> {
    let course = params.course.clone();
    let course_seed = params.seed.unwrap_or_else(rand::random);
    let archive = JsonFileArchive::new(params.archive_path.clone());

    tracing::info!(
        population = params.population_size,
        generations,
        archive = %archive.path().display(),
        "starting training"
    );

    let engine = EvolutionEngine::from_params(params)
        .context("invalid training parameters")?
        .with_archive(archive);
    let mut trainer = Trainer::new(engine, course, course_seed)?;

    for _ in 0..generations {
        let summary = trainer.run_generation(dt)?;
        let stats = trainer.stats();
        tracing::info!(
            generation = summary.generation,
            best = summary.best_fitness,
            best_ever = stats.best_fitness,
            "generation finished"
        );
    }

    if trainer.engine().archive_failures() > 0 {
        tracing::warn!(
            failures = trainer.engine().archive_failures(),
            "some best-genome snapshots could not be written"
        );
    }
    Ok(())
}
