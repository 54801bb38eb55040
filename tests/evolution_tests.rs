#![allow(missing_docs)]
#![allow(clippy::float_cmp)]

use std::sync::{Arc, Mutex};

use neuroflap::simulation::archive::GenomeArchive;
use neuroflap::simulation::brain::{Genome, Topology};
use neuroflap::simulation::error::{ArchiveError, EvolutionError};
use neuroflap::simulation::evolution::{
    EvolutionEngine, Phase, ReportOutcome, fitness, roulette_select,
};
use neuroflap::simulation::params::Params;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn create_test_params(population_size: usize, elite_count: usize) -> Params {
    Params {
        population_size,
        elite_count,
        mutation_rate: 0.2,
        mutation_strength: 0.5,
        seed: Some(42),
        ..Params::default()
    }
}

fn create_engine(population_size: usize, elite_count: usize) -> EvolutionEngine {
    EvolutionEngine::from_params(create_test_params(population_size, elite_count))
        .expect("valid params")
}

/// Records every genome handed to the archive.
#[derive(Clone, Default)]
struct RecordingArchive {
    saved: Arc<Mutex<Vec<Genome>>>,
}

impl GenomeArchive for RecordingArchive {
    fn persist(&mut self, genome: &Genome) -> Result<(), ArchiveError> {
        self.saved.lock().unwrap().push(genome.clone());
        Ok(())
    }
}

struct FailingArchive;

impl GenomeArchive for FailingArchive {
    fn persist(&mut self, _genome: &Genome) -> Result<(), ArchiveError> {
        Err(ArchiveError::FileSystem(std::io::Error::other("storage unavailable")))
    }
}

#[test]
fn test_fitness_formula() {
    assert_eq!(fitness(0, 12.5), 12.5);
    assert_eq!(fitness(3, 0.25), 3000.25);
    // One more obstacle always beats any realistic survival time difference
    assert!(fitness(2, 0.0) > fitness(1, 999.0));
}

#[test]
fn test_initialize_population() {
    let engine = create_engine(10, 2);

    assert_eq!(engine.population().len(), 10);
    assert_eq!(engine.fitness(), &[0.0; 10]);
    assert_eq!(engine.generation(), 0);
    assert_eq!(engine.phase(), Phase::Initializing);
    assert_eq!(engine.alive_count(), 0);
    assert_eq!(engine.best_fitness(), 0.0);
    assert!(engine.best().is_none());
    for genome in engine.population() {
        assert_eq!(genome.topology(), engine.params().topology());
    }
}

#[test]
fn test_elite_count_larger_than_population_is_rejected() {
    let err = EvolutionEngine::from_params(create_test_params(3, 4)).unwrap_err();
    assert_eq!(
        err,
        EvolutionError::EliteCountExceedsPopulation {
            elite_count: 4,
            population_size: 3,
        }
    );
}

#[test]
fn test_start_generation_hands_out_clones() {
    let mut engine = create_engine(5, 1);
    let bindings = engine.start_generation();

    assert_eq!(engine.generation(), 1);
    assert_eq!(engine.phase(), Phase::GenerationRunning);
    assert_eq!(engine.alive_count(), 5);
    assert_eq!(bindings.len(), 5);

    for (i, binding) in bindings.into_iter().enumerate() {
        assert_eq!(binding.index, i);
        assert_eq!(binding.genome, engine.population()[i]);

        // Mutating the bound clone leaves the population alone
        let mut genome = binding.genome;
        genome.mutate(1.0, 1.0, &mut ChaCha8Rng::seed_from_u64(i as u64));
        assert_ne!(genome, engine.population()[i]);
    }
}

#[test]
fn test_report_before_start_is_rejected() {
    let mut engine = create_engine(3, 0);
    assert_eq!(
        engine.report_death(0, 1, 1.0).unwrap_err(),
        EvolutionError::GenerationNotStarted
    );
}

#[test]
fn test_out_of_range_index_is_rejected() {
    let mut engine = create_engine(3, 0);
    engine.start_generation();

    assert_eq!(
        engine.report_death(3, 0, 1.0).unwrap_err(),
        EvolutionError::IndexOutOfRange {
            index: 3,
            population_size: 3,
        }
    );
    assert_eq!(engine.alive_count(), 3);
}

#[test]
fn test_duplicate_report_is_rejected() {
    let mut engine = create_engine(3, 0);
    engine.start_generation();

    engine.report_death(1, 2, 3.0).expect("first report");
    let err = engine.report_death(1, 5, 9.0).unwrap_err();

    assert_eq!(
        err,
        EvolutionError::StaleReport {
            index: 1,
            generation: 1,
        }
    );
    // The stale report did not count or overwrite anything
    assert_eq!(engine.alive_count(), 2);
    assert_eq!(engine.fitness()[1], fitness(2, 3.0));
    assert!(engine.has_reported(1));
    assert!(!engine.has_reported(0));
}

#[test]
fn test_generation_barrier() {
    let mut engine = create_engine(3, 1);
    engine.start_generation();

    let first = engine.report_death(0, 1, 2.0).unwrap();
    let second = engine.report_death(2, 0, 7.0).unwrap();
    assert!(matches!(first, ReportOutcome::Recorded { .. }));
    assert!(matches!(second, ReportOutcome::Recorded { .. }));
    assert_eq!(engine.generation(), 1);
    assert_eq!(engine.alive_count(), 1);
    assert!(engine.last_summary().is_none());

    let third = engine.report_death(1, 0, 1.0).unwrap();
    match third {
        ReportOutcome::GenerationAdvanced {
            summary, bindings, ..
        } => {
            assert_eq!(summary.generation, 1);
            assert_eq!(summary.best_fitness, 1002.0);
            assert_eq!(bindings.len(), 3);
        }
        ReportOutcome::Recorded { .. } => panic!("third report should complete the generation"),
    }

    assert_eq!(engine.generation(), 2);
    assert_eq!(engine.phase(), Phase::GenerationRunning);
    assert_eq!(engine.alive_count(), 3);
    assert!(engine.fitness().iter().all(|&f| f == 0.0));
    assert!((0..3).all(|i| !engine.has_reported(i)));

    // Slots may report again in the new generation
    assert!(engine.report_death(1, 0, 1.0).is_ok());
}

#[test]
fn test_elitism_preserves_top_genomes() {
    let mut engine = create_engine(4, 2);
    engine.start_generation();
    let before = engine.population().to_vec();

    // fitness = [10, 40, 5, 20]
    for (index, time) in [(0, 10.0), (1, 40.0), (2, 5.0), (3, 20.0)] {
        engine.report_death(index, 0, time).unwrap();
    }

    let after = engine.population();
    assert_eq!(after.len(), 4);
    assert_eq!(after[0], before[1]);
    assert_eq!(after[1], before[3]);
    assert_eq!(after[0].to_flat_vector(), before[1].to_flat_vector());
}

#[test]
fn test_zero_elites_replace_whole_population() {
    let params = Params {
        mutation_rate: 1.0,
        ..create_test_params(4, 0)
    };
    let mut engine = EvolutionEngine::from_params(params).unwrap();
    engine.start_generation();
    let before = engine.population().to_vec();

    for index in 0..4 {
        engine.report_death(index, 0, 1.0 + index as f32).unwrap();
    }

    for genome in engine.population() {
        assert!(!before.contains(genome));
    }
}

#[test]
fn test_roulette_puts_all_mass_on_single_fit_genome() {
    let fitness = [100.0, 0.0, 0.0, 0.0];
    let total = fitness.iter().sum::<f32>() + 1e-6;
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    for _ in 0..1000 {
        assert_eq!(roulette_select(&fitness, total, &mut rng), 0);
    }
}

#[test]
fn test_roulette_is_fitness_proportional() {
    let fitness = [1.0, 3.0];
    let mut rng = ChaCha8Rng::seed_from_u64(2);

    let picks_of_second = (0..10_000)
        .filter(|_| roulette_select(&fitness, 4.0, &mut rng) == 1)
        .count();
    let share = picks_of_second as f32 / 10_000.0;
    assert!((share - 0.75).abs() < 0.03, "share {share}");
}

#[test]
fn test_roulette_falls_back_to_uniform_for_zero_fitness() {
    let fitness = [0.0; 4];
    let total = fitness.iter().sum::<f32>() + 1e-6;
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    let mut counts = [0usize; 4];
    for _ in 0..4000 {
        counts[roulette_select(&fitness, total, &mut rng)] += 1;
    }

    for count in counts {
        assert!((800..=1200).contains(&count), "counts {counts:?}");
    }
}

#[test]
fn test_all_zero_generation_still_evolves() {
    let mut engine = create_engine(5, 1);
    engine.start_generation();

    for index in 0..5 {
        engine.report_death(index, 0, 0.0).unwrap();
    }

    assert_eq!(engine.generation(), 2);
    assert_eq!(engine.population().len(), 5);
    assert_eq!(engine.best_fitness(), 0.0);
    assert!(engine.best().is_none());
}

#[test]
fn test_watermark_never_decreases() {
    let mut engine = create_engine(8, 2);
    engine.start_generation();
    let mut rng = ChaCha8Rng::seed_from_u64(4);

    let mut previous = engine.best_fitness();
    for _ in 0..10 {
        for index in 0..8 {
            let obstacles = rng.random_range(0..5);
            let time = rng.random_range(0.0..30.0);
            engine.report_death(index, obstacles, time).unwrap();

            assert!(engine.best_fitness() >= previous);
            previous = engine.best_fitness();
        }
    }

    assert_eq!(engine.generation(), 11);
    assert_eq!(engine.best().unwrap().fitness, engine.best_fitness());
}

#[test]
fn test_best_record_is_a_snapshot() {
    let params = Params {
        mutation_rate: 1.0,
        ..create_test_params(3, 0)
    };
    let mut engine = EvolutionEngine::from_params(params).unwrap();
    engine.start_generation();
    let before = engine.population().to_vec();

    engine.report_death(0, 0, 1.0).unwrap();
    let outcome = engine.report_death(2, 4, 1.0).unwrap();
    assert!(matches!(outcome, ReportOutcome::Recorded { new_best: true, .. }));
    engine.report_death(1, 1, 1.0).unwrap();

    // The live population was fully replaced, the record was not
    let best = engine.best().unwrap();
    assert_eq!(best.fitness, 4001.0);
    assert_eq!(best.generation, 1);
    assert_eq!(best.genome, before[2]);
    assert_ne!(engine.population()[2], before[2]);
}

#[test]
fn test_archive_receives_each_improvement() {
    let archive = RecordingArchive::default();
    let saved = Arc::clone(&archive.saved);
    let mut engine = create_engine(3, 1).with_archive(archive);
    engine.start_generation();
    let before = engine.population().to_vec();

    engine.report_death(0, 0, 5.0).unwrap(); // improves
    engine.report_death(1, 0, 3.0).unwrap(); // does not
    engine.report_death(2, 1, 0.0).unwrap(); // improves

    let saved = saved.lock().unwrap();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[0], before[0]);
    assert_eq!(saved[1], before[2]);
}

#[test]
fn test_archive_failure_does_not_stop_training() {
    let mut engine = create_engine(2, 0).with_archive(FailingArchive);
    engine.start_generation();

    engine.report_death(0, 1, 1.0).unwrap();
    engine.report_death(1, 2, 1.0).unwrap();

    assert_eq!(engine.archive_failures(), 2);
    assert_eq!(engine.generation(), 2);
    assert_eq!(engine.best_fitness(), 2001.0);
}

#[test]
fn test_same_seed_same_evolution() {
    let run = || {
        let mut engine = create_engine(6, 1);
        engine.start_generation();
        for _ in 0..3 {
            for index in 0..6 {
                engine
                    .report_death(index, (index % 3) as u32, index as f32)
                    .unwrap();
            }
        }
        engine.population().to_vec()
    };

    assert_eq!(run(), run());
}

#[test]
fn test_negative_time_is_rejected() {
    let mut engine = create_engine(2, 0);
    engine.start_generation();

    assert!(matches!(
        engine.report_death(0, 0, -1.0),
        Err(EvolutionError::InvalidParams(_))
    ));
    assert!(!engine.has_reported(0));
}

#[test]
fn test_single_genome_scenario() {
    let params = Params {
        population_size: 1,
        input_count: 1,
        hidden_count: 1,
        output_count: 1,
        elite_count: 0,
        mutation_rate: 0.0,
        seed: Some(7),
        ..Params::default()
    };
    // A single-unit controller whose output for [1.0] is sigmoid(tanh(1)) > 0.5
    let topology = Topology::new(1, 1, 1);
    let flapper =
        Genome::from_parts(topology, vec![1.0], vec![0.0], vec![1.0], vec![0.0]).unwrap();
    assert!(flapper.forward(&[1.0]) > 0.5);
    assert!(flapper.decide(&[1.0]));

    let negated =
        Genome::from_parts(topology, vec![1.0], vec![0.0], vec![-1.0], vec![0.0]).unwrap();
    assert!(negated.forward(&[1.0]) < 0.5);
    assert!(!negated.decide(&[1.0]));

    let mut engine = EvolutionEngine::from_params(params).unwrap();
    let bindings = engine.start_generation();
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].genome.topology(), topology);

    let outcome = engine.report_death(0, 2, 1.5).unwrap();
    let ReportOutcome::GenerationAdvanced { summary, bindings, new_best, .. } = outcome else {
        panic!("a single report completes a generation of one");
    };
    assert!(new_best);
    assert_eq!(summary.best_fitness, 2001.5);
    assert_eq!(summary.diversity, 0.0);
    assert_eq!(engine.generation(), 2);
    assert_eq!(engine.best_fitness(), 2001.5);

    // Crossover of a genome with itself and no mutation reproduces it
    assert_eq!(bindings[0].genome, engine.best().unwrap().genome);
}
