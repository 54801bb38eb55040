//! # Neuroflap - Neuroevolution of a flap/no-flap controller
//!
//! A population of fixed-topology feedforward networks learns a single
//! reactive decision through a generational genetic algorithm.
//!
//! ## Features
//!
//! - One-hidden-layer networks (tanh hidden, sigmoid output)
//! - Uniform per-gene crossover and rate-gated uniform mutation
//! - Elitism plus fitness-proportional (roulette) selection
//! - Best-ever genome tracking with JSON snapshots
//! - Seedable, injected randomness for reproducible runs
//! - Headless course with a reusable agent slot pool and parallel ticks
//!
//! ## Core Modules
//!
//! - [`simulation::brain`] - Genome representation and genetic operators
//! - [`simulation::evolution`] - Population and generation management
//! - [`simulation::archive`] - Best genome persistence
//! - [`simulation::trainer`] - Headless training loop

/// Neuroevolution engine and the headless course that drives it.
pub mod simulation {
    /// Reusable agent slots and observation building.
    pub mod agent;
    /// Best genome snapshots.
    pub mod archive;
    /// Fixed-topology feedforward genome.
    pub mod brain;
    /// Scrolling obstacle course.
    pub mod course;
    /// Error types.
    pub mod error;
    /// Generational genetic algorithm.
    pub mod evolution;
    /// Ordered registry of active obstacles.
    pub mod obstacles;
    /// Training parameters.
    pub mod params;
    /// Headless training loop.
    pub mod trainer;
}
