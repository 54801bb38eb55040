//! Training parameters.
//!
//! Parameters are plain serde structs so they can be read from a `config.toml`:
//!
//! ```toml
//! population_size = 100
//! hidden_count = 6
//! mutation_rate = 0.05
//! elite_count = 5
//! seed = 42
//!
//! [course]
//! gravity = -20.0
//! flap_strength = 6.0
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::brain::Topology;
use super::error::{EvolutionError, ParamsError};

/// Genetic algorithm and network shape parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Number of genomes (and agent slots) per generation.
    pub population_size: usize,
    /// Observation size fed to each genome.
    pub input_count: usize,
    /// Hidden layer width.
    pub hidden_count: usize,
    /// Number of network outputs; only the first drives the decision.
    pub output_count: usize,
    /// Per-parameter probability of mutation, in `[0, 1]`.
    pub mutation_rate: f32,
    /// Half-width of the uniform mutation perturbation.
    pub mutation_strength: f32,
    /// Number of top genomes copied unchanged into the next generation.
    pub elite_count: usize,
    /// Seed for the engine RNG. Entropy is used when absent.
    pub seed: Option<u64>,
    /// Where the best genome snapshot is written.
    pub archive_path: PathBuf,
    /// Headless course used to drive training.
    pub course: CourseParams,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            population_size: 100,
            input_count: Topology::FLAPPY.inputs,
            hidden_count: Topology::FLAPPY.hidden,
            output_count: Topology::FLAPPY.outputs,
            mutation_rate: 0.05,
            mutation_strength: 0.5,
            elite_count: 5,
            seed: None,
            archive_path: PathBuf::from("best_genome.json"),
            course: CourseParams::default(),
        }
    }
}

impl Params {
    /// Network shape implied by these parameters.
    pub fn topology(&self) -> Topology {
        Topology::new(self.input_count, self.hidden_count, self.output_count)
    }

    /// Checks every engine-relevant value and reports the first violation.
    pub fn validate(&self) -> Result<(), EvolutionError> {
        if self.population_size == 0 {
            return Err(EvolutionError::invalid("population_size must be at least 1"));
        }
        if self.input_count == 0 || self.hidden_count == 0 || self.output_count == 0 {
            return Err(EvolutionError::invalid(format!(
                "layer sizes must be non-zero, got {}",
                self.topology()
            )));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(EvolutionError::invalid(format!(
                "mutation_rate must be in [0, 1], got {}",
                self.mutation_rate
            )));
        }
        if !self.mutation_strength.is_finite() || self.mutation_strength < 0.0 {
            return Err(EvolutionError::invalid(format!(
                "mutation_strength must be finite and >= 0, got {}",
                self.mutation_strength
            )));
        }
        if self.elite_count > self.population_size {
            return Err(EvolutionError::EliteCountExceedsPopulation {
                elite_count: self.elite_count,
                population_size: self.population_size,
            });
        }
        self.course.validate()
    }

    /// Reads and validates parameters from a TOML file.
    ///
    /// Missing keys fall back to [`Params::default`].
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ParamsError> {
        let content = std::fs::read_to_string(path)?;
        let params: Self = toml::from_str(&content)?;
        params.validate()?;
        Ok(params)
    }
}

/// Kinematics and obstacle layout of the headless course.
///
/// Units are world units and seconds. The agent sits at `agent_x` and
/// obstacles scroll towards it from `spawn_x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourseParams {
    /// Vertical acceleration applied every tick.
    pub gravity: f32,
    /// Vertical velocity set by a flap.
    pub flap_strength: f32,
    /// Horizontal position of every agent.
    pub agent_x: f32,
    /// Agent collision radius.
    pub agent_radius: f32,
    /// Vertical spawn position of agents.
    pub spawn_y: f32,
    /// Leftward obstacle speed.
    pub scroll_speed: f32,
    /// Seconds between obstacle spawns.
    pub spawn_interval: f32,
    /// Horizontal position where obstacles appear.
    pub spawn_x: f32,
    /// Obstacles are removed once they scroll past this position.
    pub despawn_x: f32,
    /// Lowest possible gap center.
    pub min_gap_center: f32,
    /// Highest possible gap center.
    pub max_gap_center: f32,
    /// Vertical size of the opening in each obstacle.
    pub gap_height: f32,
    /// Horizontal thickness of each obstacle.
    pub obstacle_width: f32,
    /// Agents below this height have hit the ground.
    pub floor: f32,
    /// Agents above this height have hit the ceiling.
    pub ceiling: f32,
    /// Agents still alive after this many seconds are retired so the
    /// generation can finish.
    pub max_episode_seconds: f32,
}

impl Default for CourseParams {
    fn default() -> Self {
        Self {
            gravity: -20.0,
            flap_strength: 6.0,
            agent_x: 0.0,
            agent_radius: 0.3,
            spawn_y: 0.0,
            scroll_speed: 5.0,
            spawn_interval: 1.0,
            spawn_x: 8.0,
            despawn_x: -8.0,
            min_gap_center: -1.0,
            max_gap_center: 2.0,
            gap_height: 3.0,
            obstacle_width: 1.0,
            floor: -4.5,
            ceiling: 5.5,
            max_episode_seconds: 60.0,
        }
    }
}

impl CourseParams {
    /// Rejects layouts that would stall or break the course.
    ///
    /// Obstacles must scroll towards the agent so the registry stays ordered
    /// by `x`, and every value must be finite.
    pub fn validate(&self) -> Result<(), EvolutionError> {
        let values = [
            ("gravity", self.gravity),
            ("flap_strength", self.flap_strength),
            ("agent_x", self.agent_x),
            ("agent_radius", self.agent_radius),
            ("spawn_y", self.spawn_y),
            ("scroll_speed", self.scroll_speed),
            ("spawn_interval", self.spawn_interval),
            ("spawn_x", self.spawn_x),
            ("despawn_x", self.despawn_x),
            ("min_gap_center", self.min_gap_center),
            ("max_gap_center", self.max_gap_center),
            ("gap_height", self.gap_height),
            ("obstacle_width", self.obstacle_width),
            ("floor", self.floor),
            ("ceiling", self.ceiling),
            ("max_episode_seconds", self.max_episode_seconds),
        ];
        if let Some((name, value)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(EvolutionError::invalid(format!(
                "course.{name} must be finite, got {value}"
            )));
        }

        if self.scroll_speed <= 0.0 {
            return Err(EvolutionError::invalid("course.scroll_speed must be positive"));
        }
        if self.spawn_interval <= 0.0 {
            return Err(EvolutionError::invalid("course.spawn_interval must be positive"));
        }
        if self.min_gap_center > self.max_gap_center {
            return Err(EvolutionError::invalid(
                "course.min_gap_center must not exceed course.max_gap_center",
            ));
        }
        if self.gap_height <= 0.0 {
            return Err(EvolutionError::invalid("course.gap_height must be positive"));
        }
        if self.obstacle_width < 0.0 || self.agent_radius < 0.0 {
            return Err(EvolutionError::invalid(
                "course.obstacle_width and course.agent_radius must not be negative",
            ));
        }
        if self.floor >= self.ceiling {
            return Err(EvolutionError::invalid("course.floor must be below course.ceiling"));
        }
        if self.max_episode_seconds <= 0.0 {
            return Err(EvolutionError::invalid(
                "course.max_episode_seconds must be positive",
            ));
        }
        Ok(())
    }
}
