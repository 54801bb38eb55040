//! Error types for the neuroevolution engine, the genome archive and
//! configuration loading.

use thiserror::Error;

use super::brain::Topology;

/// Errors raised by genome operators and the evolution engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvolutionError {
    /// Two genomes with different shapes were combined.
    #[error("topology mismatch: {left} vs {right}")]
    TopologyMismatch {
        /// Shape of the first genome.
        left: Topology,
        /// Shape of the second genome.
        right: Topology,
    },

    /// A buffer handed to [`Genome::from_parts`](super::brain::Genome::from_parts)
    /// does not match the declared shape.
    #[error("buffer `{buffer}` has length {actual}, expected {expected}")]
    BufferLength {
        /// Name of the offending buffer.
        buffer: &'static str,
        /// Length implied by the topology.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// More elites were requested than there are genomes.
    #[error("elite count {elite_count} exceeds population size {population_size}")]
    EliteCountExceedsPopulation {
        /// Configured number of elites.
        elite_count: usize,
        /// Configured population size.
        population_size: usize,
    },

    /// A configuration value is outside its allowed range.
    #[error("invalid parameter: {0}")]
    InvalidParams(String),

    /// A death was reported for a slot that does not exist.
    #[error("genome index {index} out of range for population of {population_size}")]
    IndexOutOfRange {
        /// Reported slot index.
        index: usize,
        /// Current population size.
        population_size: usize,
    },

    /// A slot reported its death twice in the same generation.
    #[error("stale report: slot {index} already reported in generation {generation}")]
    StaleReport {
        /// Reported slot index.
        index: usize,
        /// Generation in which the slot already reported.
        generation: u32,
    },

    /// A death was reported before any generation was started.
    #[error("no generation has been started yet")]
    GenerationNotStarted,
}

impl EvolutionError {
    /// Creates a new invalid parameter error.
    #[must_use]
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParams(msg.into())
    }
}

/// Errors raised while writing or reading a persisted genome.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// File system errors.
    #[error("file system error: {0}")]
    FileSystem(#[from] std::io::Error),

    /// JSON encoding or decoding errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The record decoded but its buffers are inconsistent.
    #[error("malformed genome record: {0}")]
    Malformed(#[from] EvolutionError),
}

/// Errors raised while loading [`Params`](super::params::Params).
#[derive(Error, Debug)]
pub enum ParamsError {
    /// The configuration file could not be read.
    #[error("could not read config: {0}")]
    FileSystem(#[from] std::io::Error),

    /// The configuration file is not valid TOML for [`Params`](super::params::Params).
    #[error("could not parse config: {0}")]
    Toml(#[from] toml::de::Error),

    /// The configuration parsed but failed validation.
    #[error(transparent)]
    Invalid(#[from] EvolutionError),
}
