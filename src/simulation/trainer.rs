//! Headless training loop.
//!
//! The trainer keeps a fixed pool of agent slots, one per genome index, and
//! re-initializes the same slots every generation. Each tick all live slots
//! are advanced in parallel; deaths are then reported to the engine one by
//! one in slot order, so the generation barrier is only ever crossed by the
//! last report.

use rand::Rng;
use rayon::prelude::*;

use super::agent::{Agent, DeathReport, OBSERVATION_SIZE};
use super::brain::Genome;
use super::course::Course;
use super::error::EvolutionError;
use super::evolution::{Binding, EvolutionEngine, GenerationSummary, ReportOutcome};
use super::params::CourseParams;

/// Values a training display would show.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingStats {
    /// Current generation.
    pub generation: u32,
    /// Slots still running in this generation.
    pub alive: usize,
    /// Best-ever fitness.
    pub best_fitness: f32,
}

/// Couples an [`EvolutionEngine`] with a [`Course`] and a slot pool.
#[derive(Debug)]
pub struct Trainer<R> {
    engine: EvolutionEngine<R>,
    course: Course,
    slots: Vec<Agent>,
}

impl<R: Rng> Trainer<R> {
    /// Starts a new generation of `engine` on a course seeded with `course_seed`.
    ///
    /// The engine's genomes must take an [`Observation`](super::agent::Observation)
    /// as input.
    pub fn new(
        mut engine: EvolutionEngine<R>,
        course_params: CourseParams,
        course_seed: u64,
    ) -> Result<Self, EvolutionError> {
        course_params.validate()?;
        let topology = engine.params().topology();
        if topology.inputs != OBSERVATION_SIZE {
            return Err(EvolutionError::invalid(format!(
                "agents produce {OBSERVATION_SIZE} observations but genomes take {}",
                topology.inputs
            )));
        }

        let slots = vec![Agent::idle(); engine.params().population_size];
        let bindings = engine.start_generation();
        let mut trainer = Self {
            engine,
            course: Course::new(course_params, course_seed),
            slots,
        };
        trainer.respawn(bindings);
        Ok(trainer)
    }

    fn respawn(&mut self, bindings: Vec<Binding>) {
        self.course.reset();
        let spawn_y = self.course.params().spawn_y;
        for binding in bindings {
            self.slots[binding.index].initialize(binding.genome, binding.index, spawn_y);
        }
    }

    /// Advances every live slot by `dt` seconds.
    ///
    /// Returns the summary of the generation that ended during this tick, if any.
    pub fn step(&mut self, dt: f32) -> Result<Option<GenerationSummary>, EvolutionError> {
        check_dt(dt)?;
        let crossings = self.course.step(dt);

        let course = &self.course;
        let cap = course.params().max_episode_seconds;
        let deaths: Vec<DeathReport> = self
            .slots
            .par_iter_mut()
            .filter(|agent| agent.is_alive())
            .filter_map(|agent| {
                agent.step(dt, course);
                if course.collides(agent.y()) || agent.time_alive() >= cap {
                    agent.kill()
                } else {
                    agent.record_crossings(crossings);
                    None
                }
            })
            .collect();

        let mut finished = None;
        for death in deaths {
            let outcome = self.engine.report_death(
                death.index,
                death.obstacles_passed,
                death.time_alive,
            )?;
            if let ReportOutcome::GenerationAdvanced { summary, bindings, .. } = outcome {
                self.respawn(bindings);
                finished = Some(summary);
            }
        }
        Ok(finished)
    }

    /// Steps until the current generation ends.
    pub fn run_generation(&mut self, dt: f32) -> Result<GenerationSummary, EvolutionError> {
        loop {
            if let Some(summary) = self.step(dt)? {
                return Ok(summary);
            }
        }
    }

    /// Runs `generations` complete generations.
    pub fn run_generations(
        &mut self,
        generations: usize,
        dt: f32,
    ) -> Result<Vec<GenerationSummary>, EvolutionError> {
        (0..generations).map(|_| self.run_generation(dt)).collect()
    }

    /// Generation, alive count and best fitness.
    pub fn stats(&self) -> TrainingStats {
        TrainingStats {
            generation: self.engine.generation(),
            alive: self.engine.alive_count(),
            best_fitness: self.engine.best_fitness(),
        }
    }

    /// The underlying engine.
    pub fn engine(&self) -> &EvolutionEngine<R> {
        &self.engine
    }

    /// The course agents are flying through.
    pub fn course(&self) -> &Course {
        &self.course
    }

    /// The slot pool, indexed by genome index.
    pub fn slots(&self) -> &[Agent] {
        &self.slots
    }
}

/// Flies a single genome through a fresh course until it crashes or hits the
/// episode cap.
pub fn replay(
    genome: Genome,
    course_params: CourseParams,
    course_seed: u64,
    dt: f32,
) -> Result<DeathReport, EvolutionError> {
    check_dt(dt)?;
    course_params.validate()?;
    let inputs = genome.topology().inputs;
    if inputs != OBSERVATION_SIZE {
        return Err(EvolutionError::invalid(format!(
            "agents produce {OBSERVATION_SIZE} observations but the genome takes {inputs}"
        )));
    }

    let mut course = Course::new(course_params, course_seed);
    let cap = course.params().max_episode_seconds;
    let mut agent = Agent::idle();
    agent.initialize(genome, 0, course.params().spawn_y);

    loop {
        let crossings = course.step(dt);
        agent.step(dt, &course);
        if course.collides(agent.y()) || agent.time_alive() >= cap {
            if let Some(report) = agent.kill() {
                return Ok(report);
            }
        }
        agent.record_crossings(crossings);
    }
}

fn check_dt(dt: f32) -> Result<(), EvolutionError> {
    if dt.is_finite() && dt > 0.0 {
        Ok(())
    } else {
        Err(EvolutionError::invalid(format!("time step must be positive, got {dt}")))
    }
}
