//! Reusable agent slots.
//!
//! A slot is bound to one genome clone per generation. While alive it turns
//! observations into flap decisions and integrates its own vertical motion.
//! Its death is reported exactly once through [`Agent::kill`]; afterwards the
//! slot stays inert until the next [`Agent::initialize`].

use super::brain::Genome;
use super::course::Course;
use super::obstacles::ObstacleRegistry;

/// Number of values in an [`Observation`].
pub const OBSERVATION_SIZE: usize = 4;

/// `[height, dx to next obstacle, dy to its gap center, vertical velocity]`.
pub type Observation = [f32; OBSERVATION_SIZE];

/// Terminal metrics of one episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeathReport {
    /// Slot index the agent was bound to.
    pub index: usize,
    /// Obstacles crossed while alive.
    pub obstacles_passed: u32,
    /// Seconds survived.
    pub time_alive: f32,
}

/// One agent slot of the training pool.
#[derive(Debug, Clone, Default)]
pub struct Agent {
    index: usize,
    genome: Option<Genome>,
    alive: bool,
    obstacles_passed: u32,
    time_alive: f32,
    y: f32,
    velocity: f32,
}

impl Agent {
    /// Creates an inert slot with no genome.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Binds `genome` to this slot and resets it to a fresh, living agent.
    pub fn initialize(&mut self, genome: Genome, index: usize, spawn_y: f32) {
        self.index = index;
        self.genome = Some(genome);
        self.alive = true;
        self.obstacles_passed = 0;
        self.time_alive = 0.0;
        self.y = spawn_y;
        self.velocity = 0.0;
    }

    /// Builds the observation for an agent at `x`.
    ///
    /// Falls back to the zero vector when nothing lies ahead.
    pub fn observe(&self, x: f32, registry: &ObstacleRegistry) -> Observation {
        match registry.nearest_ahead(x) {
            Some(obstacle) => [
                self.y,
                obstacle.x - x,
                obstacle.gap_center - self.y,
                self.velocity,
            ],
            None => [0.0; OBSERVATION_SIZE],
        }
    }

    /// Runs one tick: decide, flap, integrate gravity and age.
    ///
    /// Returns whether the agent flapped. Dead or unbound slots do nothing.
    pub fn step(&mut self, dt: f32, course: &Course) -> bool {
        if !self.alive {
            return false;
        }
        let Some(genome) = self.genome.as_ref() else {
            return false;
        };

        let params = course.params();
        let observation = self.observe(params.agent_x, course.registry());
        let flapped = genome.decide(&observation);
        if flapped {
            self.velocity = params.flap_strength;
        }

        self.velocity += params.gravity * dt;
        self.y += self.velocity * dt;
        self.time_alive += dt;
        flapped
    }

    /// Credits obstacles that crossed the agent line while it was alive.
    pub fn record_crossings(&mut self, crossings: u32) {
        if self.alive {
            self.obstacles_passed += crossings;
        }
    }

    /// Ends the episode and returns its metrics.
    ///
    /// Returns `None` if the slot was already dead, so a slot can never
    /// produce two reports for one episode.
    pub fn kill(&mut self) -> Option<DeathReport> {
        if !self.alive {
            return None;
        }
        self.alive = false;
        Some(DeathReport {
            index: self.index,
            obstacles_passed: self.obstacles_passed,
            time_alive: self.time_alive,
        })
    }

    /// Whether the slot is running an episode.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Slot index of the current binding.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Genome bound to this slot, if any.
    pub fn genome(&self) -> Option<&Genome> {
        self.genome.as_ref()
    }

    /// Current height.
    pub fn y(&self) -> f32 {
        self.y
    }

    /// Current vertical velocity.
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    /// Obstacles passed in the current episode.
    pub fn obstacles_passed(&self) -> u32 {
        self.obstacles_passed
    }

    /// Seconds survived in the current episode.
    pub fn time_alive(&self) -> f32 {
        self.time_alive
    }
}
