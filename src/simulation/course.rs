//! Headless obstacle course that drives training.
//!
//! The course scrolls obstacles past a fixed agent line and answers two
//! questions per tick: how many obstacles crossed the line, and whether a
//! given height collides with anything. It knows nothing about genomes.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::obstacles::{Obstacle, ObstacleRegistry};
use super::params::CourseParams;

/// Scrolling course with a floor, a ceiling and randomly placed gaps.
#[derive(Debug, Clone)]
pub struct Course {
    params: CourseParams,
    registry: ObstacleRegistry,
    spawn_timer: f32,
    time: f32,
    rng: ChaCha8Rng,
}

impl Course {
    /// Creates an empty course whose gap layout is drawn from `seed`.
    pub fn new(params: CourseParams, seed: u64) -> Self {
        Self {
            params,
            registry: ObstacleRegistry::new(),
            spawn_timer: 0.0,
            time: 0.0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Removes every obstacle and restarts the spawn clock.
    pub fn reset(&mut self) {
        self.registry.clear();
        self.spawn_timer = 0.0;
        self.time = 0.0;
    }

    /// Advances the course by `dt` seconds.
    ///
    /// Returns how many obstacles crossed the agent line during this tick.
    pub fn step(&mut self, dt: f32) -> u32 {
        self.time += dt;

        let shift = self.params.scroll_speed * dt;
        let agent_x = self.params.agent_x;
        let mut crossings = 0;
        for obstacle in self.registry.iter_mut() {
            obstacle.x -= shift;
            if !obstacle.passed && obstacle.x <= agent_x {
                obstacle.passed = true;
                crossings += 1;
            }
        }

        let despawned = self.registry.pop_expired(self.params.despawn_x);
        if despawned > 0 {
            tracing::trace!(despawned, "obstacles left the course");
        }

        self.spawn_timer += dt;
        while self.spawn_timer >= self.params.spawn_interval {
            self.spawn_timer -= self.params.spawn_interval;
            self.spawn();
        }

        crossings
    }

    fn spawn(&mut self) {
        let gap_center = self
            .rng
            .random_range(self.params.min_gap_center..=self.params.max_gap_center);
        self.registry.push(Obstacle::new(
            self.params.spawn_x,
            gap_center,
            self.params.gap_height,
            self.params.obstacle_width,
        ));
    }

    /// Whether an agent at height `y` touches an obstacle, the floor or the ceiling.
    pub fn collides(&self, y: f32) -> bool {
        let r = self.params.agent_radius;
        if y - r <= self.params.floor || y + r >= self.params.ceiling {
            return true;
        }
        self.registry
            .iter()
            .any(|o| o.hits(self.params.agent_x, y, r))
    }

    /// Active obstacles.
    pub fn registry(&self) -> &ObstacleRegistry {
        &self.registry
    }

    /// Kinematics and layout parameters.
    pub fn params(&self) -> &CourseParams {
        &self.params
    }

    /// Seconds since the last reset.
    pub fn time(&self) -> f32 {
        self.time
    }
}
