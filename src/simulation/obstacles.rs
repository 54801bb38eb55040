//! Ordered registry of active obstacles.
//!
//! Obstacles enter at the far end of the course and leave at the near end,
//! so a `VecDeque` ordered by `x` is enough: spawning pushes to the back,
//! despawning pops from the front, and the nearest obstacle ahead of an
//! agent is found without scanning the whole scene.

use std::collections::VecDeque;

/// A pipe pair with an opening at `gap_center`.
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    /// Horizontal center.
    pub x: f32,
    /// Vertical center of the opening.
    pub gap_center: f32,
    /// Vertical size of the opening.
    pub gap_height: f32,
    /// Horizontal thickness.
    pub width: f32,
    /// Set once the obstacle has crossed the agent line.
    pub passed: bool,
}

impl Obstacle {
    /// Creates an obstacle that has not been passed yet.
    pub fn new(x: f32, gap_center: f32, gap_height: f32, width: f32) -> Self {
        Self {
            x,
            gap_center,
            gap_height,
            width,
            passed: false,
        }
    }

    /// Whether a circle at (`x`, `y`) with `radius` touches the solid part.
    pub fn hits(&self, x: f32, y: f32, radius: f32) -> bool {
        let half_width = self.width / 2.0;
        if (x - self.x).abs() > half_width + radius {
            return false;
        }
        let half_gap = self.gap_height / 2.0;
        y - radius < self.gap_center - half_gap || y + radius > self.gap_center + half_gap
    }
}

/// Active obstacles ordered by increasing `x`.
#[derive(Debug, Clone, Default)]
pub struct ObstacleRegistry {
    obstacles: VecDeque<Obstacle>,
}

impl ObstacleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly spawned obstacle.
    ///
    /// New obstacles spawn behind every existing one, which keeps the
    /// registry ordered.
    pub fn push(&mut self, obstacle: Obstacle) {
        debug_assert!(
            self.obstacles.back().is_none_or(|last| last.x <= obstacle.x),
            "obstacles must be registered in increasing x order"
        );
        self.obstacles.push_back(obstacle);
    }

    /// Removes obstacles whose trailing edge is left of `despawn_x`.
    ///
    /// Returns how many were removed.
    pub fn pop_expired(&mut self, despawn_x: f32) -> usize {
        let mut removed = 0;
        while self
            .obstacles
            .front()
            .is_some_and(|o| o.x + o.width / 2.0 < despawn_x)
        {
            self.obstacles.pop_front();
            removed += 1;
        }
        removed
    }

    /// The closest obstacle strictly to the right of `x`.
    pub fn nearest_ahead(&self, x: f32) -> Option<&Obstacle> {
        self.obstacles.iter().find(|o| o.x > x)
    }

    /// Iterates obstacles from nearest to farthest.
    pub fn iter(&self) -> impl Iterator<Item = &Obstacle> {
        self.obstacles.iter()
    }

    /// Mutable iteration in the same order as [`ObstacleRegistry::iter`].
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Obstacle> {
        self.obstacles.iter_mut()
    }

    /// Number of active obstacles.
    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    /// Whether no obstacle is active.
    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    /// Removes every obstacle.
    pub fn clear(&mut self) {
        self.obstacles.clear();
    }
}
