//! Generational genetic algorithm over a fixed population of genomes.
//!
//! The engine owns the population, the parallel fitness array, the
//! generation counter and the best-ever record. Agents are bound to genome
//! slots by index: [`EvolutionEngine::start_generation`] hands out one clone
//! per slot and each slot later calls [`EvolutionEngine::report_death`]
//! exactly once. The report that completes the generation triggers
//! selection, crossover and mutation, and immediately starts the next
//! generation.
//!
//! All mutation goes through `&mut self`, so the dead-count increment and the
//! "last report evolves" check can never race. Callers that simulate agents
//! on several threads collect death reports and feed them in sequentially,
//! or share the engine behind a `Mutex`.

use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::archive::GenomeArchive;
use super::brain::Genome;
use super::error::EvolutionError;
use super::params::Params;

/// Weight of one passed obstacle relative to one second alive.
pub const OBSTACLE_WEIGHT: f32 = 1000.0;
/// Added to the fitness sum before roulette selection.
pub const FITNESS_EPSILON: f32 = 1e-6;
/// Fitness sums at or below this fall back to uniform selection.
pub const DEGENERATE_TOTAL: f32 = 1e-5;

/// Fitness of an episode: passed obstacles dominate, survival time breaks ties.
#[inline]
pub fn fitness(obstacles_passed: u32, time_alive: f32) -> f32 {
    obstacles_passed as f32 * OBSTACLE_WEIGHT + time_alive
}

/// Fitness-proportional selection over `fitness`.
///
/// Draws `r` uniformly from `[0, total)` and returns the first index whose
/// cumulative fitness reaches `r`. When `total` is degenerate, or rounding
/// exhausts the array before reaching `r`, a uniformly random index is
/// returned instead.
///
/// # Panics
///
/// Panics if `fitness` is empty.
pub fn roulette_select<R: Rng>(fitness: &[f32], total: f32, rng: &mut R) -> usize {
    if total <= DEGENERATE_TOTAL {
        return rng.random_range(0..fitness.len());
    }

    let r = rng.random_range(0.0..total);
    let mut accum = 0.0;
    for (i, &f) in fitness.iter().enumerate() {
        accum += f;
        if accum >= r {
            return i;
        }
    }

    rng.random_range(0..fitness.len())
}

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Population built, no generation started yet.
    Initializing,
    /// Agents are running and reporting deaths.
    GenerationRunning,
    /// Every slot reported; the next population is being bred.
    Evolving,
}

/// A genome clone assigned to an agent slot for one generation.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Slot index; also the index to use when reporting death.
    pub index: usize,
    /// Private copy of the slot's genome.
    pub genome: Genome,
}

/// Snapshot of the best genome seen across all generations.
#[derive(Debug, Clone)]
pub struct BestRecord {
    /// Deep copy of the genome; never aliases the live population.
    pub genome: Genome,
    /// Fitness that earned the record.
    pub fitness: f32,
    /// Generation in which it was achieved.
    pub generation: u32,
}

/// Statistics of a completed generation, taken before fitness reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSummary {
    /// Generation the statistics describe.
    pub generation: u32,
    /// Highest fitness in this generation.
    pub best_fitness: f32,
    /// Mean fitness in this generation.
    pub mean_fitness: f32,
    /// Best-ever watermark after this generation.
    pub best_ever: f32,
    /// Mean parameter distance from the generation's best genome.
    pub diversity: f32,
}

/// Result of a death report.
#[derive(Debug, Clone)]
pub enum ReportOutcome {
    /// The report was stored; other slots are still running.
    Recorded {
        /// Fitness assigned to the slot.
        fitness: f32,
        /// Whether the report raised the best-ever watermark.
        new_best: bool,
    },
    /// The report completed the generation. The population was evolved and
    /// the next generation started.
    GenerationAdvanced {
        /// Fitness assigned to the slot.
        fitness: f32,
        /// Whether the report raised the best-ever watermark.
        new_best: bool,
        /// Statistics of the generation that just ended.
        summary: GenerationSummary,
        /// Bindings for the new generation, one per slot in index order.
        bindings: Vec<Binding>,
    },
}

/// Population manager for fixed-topology neuroevolution.
pub struct EvolutionEngine<R = ChaCha8Rng> {
    params: Params,
    population: Vec<Genome>,
    fitness: Vec<f32>,
    reported: Vec<bool>,
    dead_count: usize,
    generation: u32,
    phase: Phase,
    best_fitness: f32,
    best: Option<BestRecord>,
    last_summary: Option<GenerationSummary>,
    archive: Option<Box<dyn GenomeArchive + Send>>,
    archive_failures: usize,
    rng: R,
}

impl EvolutionEngine<ChaCha8Rng> {
    /// Builds an engine with a ChaCha RNG seeded from `params.seed`, or from
    /// OS entropy when no seed is configured.
    pub fn from_params(params: Params) -> Result<Self, EvolutionError> {
        let rng = match params.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_os_rng(),
        };
        Self::new(params, rng)
    }
}

impl<R: Rng> EvolutionEngine<R> {
    /// Validates `params` and builds a population of random genomes.
    pub fn new(params: Params, mut rng: R) -> Result<Self, EvolutionError> {
        params.validate()?;

        let n = params.population_size;
        let topology = params.topology();
        let population = (0..n)
            .map(|_| Genome::new_random(topology, &mut rng))
            .collect();

        tracing::info!(population = n, %topology, "initialized population");

        Ok(Self {
            params,
            population,
            fitness: vec![0.0; n],
            reported: vec![false; n],
            dead_count: 0,
            generation: 0,
            phase: Phase::Initializing,
            best_fitness: 0.0,
            best: None,
            last_summary: None,
            archive: None,
            archive_failures: 0,
            rng,
        })
    }

    /// Attaches a sink that receives every new best genome.
    #[must_use]
    pub fn with_archive(mut self, archive: impl GenomeArchive + Send + 'static) -> Self {
        self.archive = Some(Box::new(archive));
        self
    }

    /// Starts a new generation and returns one genome clone per slot.
    pub fn start_generation(&mut self) -> Vec<Binding> {
        self.generation += 1;
        self.dead_count = 0;
        self.reported.fill(false);
        self.fitness.fill(0.0);
        self.phase = Phase::GenerationRunning;

        self.population
            .iter()
            .enumerate()
            .map(|(index, genome)| Binding {
                index,
                genome: genome.clone(),
            })
            .collect()
    }

    /// Records the end of slot `index`'s episode.
    ///
    /// Each slot may report once per generation; a second report is rejected
    /// with [`EvolutionError::StaleReport`] and leaves the engine untouched.
    /// The report that completes the generation evolves the population and
    /// starts the next generation.
    pub fn report_death(
        &mut self,
        index: usize,
        obstacles_passed: u32,
        time_alive: f32,
    ) -> Result<ReportOutcome, EvolutionError> {
        if self.phase != Phase::GenerationRunning {
            return Err(EvolutionError::GenerationNotStarted);
        }
        let n = self.population.len();
        if index >= n {
            return Err(EvolutionError::IndexOutOfRange {
                index,
                population_size: n,
            });
        }
        if self.reported[index] {
            return Err(EvolutionError::StaleReport {
                index,
                generation: self.generation,
            });
        }
        if !time_alive.is_finite() || time_alive < 0.0 {
            return Err(EvolutionError::invalid(format!(
                "time_alive must be finite and >= 0, got {time_alive}"
            )));
        }

        let fitness = fitness(obstacles_passed, time_alive);
        self.fitness[index] = fitness;
        self.reported[index] = true;
        self.dead_count += 1;

        let new_best = self.record_best(index, fitness);

        tracing::debug!(
            generation = self.generation,
            index,
            obstacles_passed,
            fitness,
            alive = self.alive_count(),
            "agent reported death"
        );

        if self.dead_count < n {
            return Ok(ReportOutcome::Recorded { fitness, new_best });
        }

        self.phase = Phase::Evolving;
        let summary = self.evolve_population()?;
        let bindings = self.start_generation();

        Ok(ReportOutcome::GenerationAdvanced {
            fitness,
            new_best,
            summary,
            bindings,
        })
    }

    fn record_best(&mut self, index: usize, fitness: f32) -> bool {
        if fitness <= self.best_fitness {
            return false;
        }

        self.best_fitness = fitness;
        let record = BestRecord {
            genome: self.population[index].clone(),
            fitness,
            generation: self.generation,
        };

        if let Some(archive) = self.archive.as_mut() {
            if let Err(e) = archive.persist(&record.genome) {
                self.archive_failures += 1;
                tracing::warn!(error = %e, fitness, "failed to persist best genome");
            }
        }

        self.best = Some(record);
        true
    }

    fn evolve_population(&mut self) -> Result<GenerationSummary, EvolutionError> {
        let n = self.population.len();

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| self.fitness[b].total_cmp(&self.fitness[a]));

        let summary = self.summarize(order[0])?;

        let mut next = Vec::with_capacity(n);
        next.extend(
            order
                .iter()
                .take(self.params.elite_count)
                .map(|&i| self.population[i].clone()),
        );

        let total = self.fitness.iter().sum::<f32>() + FITNESS_EPSILON;
        while next.len() < n {
            let a = roulette_select(&self.fitness, total, &mut self.rng);
            let b = roulette_select(&self.fitness, total, &mut self.rng);
            let mut child =
                Genome::crossover(&self.population[a], &self.population[b], &mut self.rng)?;
            child.mutate(
                self.params.mutation_rate,
                self.params.mutation_strength,
                &mut self.rng,
            );
            next.push(child);
        }

        self.population = next;
        self.fitness.fill(0.0);
        self.last_summary = Some(summary);

        tracing::info!(
            generation = summary.generation,
            best = summary.best_fitness,
            mean = summary.mean_fitness,
            best_ever = summary.best_ever,
            diversity = summary.diversity,
            "generation evolved"
        );

        Ok(summary)
    }

    fn summarize(&self, top: usize) -> Result<GenerationSummary, EvolutionError> {
        let n = self.population.len() as f32;
        let leader = &self.population[top];

        let mut spread = 0.0;
        for genome in &self.population {
            spread += Genome::distance(leader, genome)?;
        }

        Ok(GenerationSummary {
            generation: self.generation,
            best_fitness: self.fitness[top],
            mean_fitness: self.fitness.iter().sum::<f32>() / n,
            best_ever: self.best_fitness,
            diversity: spread / n,
        })
    }

    /// Current generation counter; 0 before the first generation starts.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Best-ever fitness watermark. Never decreases.
    pub fn best_fitness(&self) -> f32 {
        self.best_fitness
    }

    /// Best-ever genome record, if any report has raised the watermark.
    pub fn best(&self) -> Option<&BestRecord> {
        self.best.as_ref()
    }

    /// Number of slots that have not reported in the current generation.
    pub fn alive_count(&self) -> usize {
        if self.phase == Phase::Initializing {
            0
        } else {
            self.population.len() - self.dead_count
        }
    }

    /// Current lifecycle state.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The live population, indexed by slot.
    pub fn population(&self) -> &[Genome] {
        &self.population
    }

    /// Fitness reported so far in the current generation, indexed by slot.
    pub fn fitness(&self) -> &[f32] {
        &self.fitness
    }

    /// Whether slot `index` has already reported in the current generation.
    pub fn has_reported(&self, index: usize) -> bool {
        self.reported.get(index).copied().unwrap_or(false)
    }

    /// Statistics of the most recently completed generation.
    pub fn last_summary(&self) -> Option<&GenerationSummary> {
        self.last_summary.as_ref()
    }

    /// Number of snapshot writes that failed so far.
    pub fn archive_failures(&self) -> usize {
        self.archive_failures
    }

    /// Parameters the engine was built with.
    pub fn params(&self) -> &Params {
        &self.params
    }
}

impl<R> fmt::Debug for EvolutionEngine<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvolutionEngine")
            .field("population_size", &self.population.len())
            .field("generation", &self.generation)
            .field("phase", &self.phase)
            .field("dead_count", &self.dead_count)
            .field("best_fitness", &self.best_fitness)
            .field("archive_failures", &self.archive_failures)
            .finish_non_exhaustive()
    }
}
