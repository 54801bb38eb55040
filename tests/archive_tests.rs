#![allow(missing_docs)]
#![allow(clippy::float_cmp)]

use std::fs;
use std::path::PathBuf;

use neuroflap::simulation::archive::{
    GenomeArchive, GenomeRecord, JsonFileArchive, load_genome, save_genome,
};
use neuroflap::simulation::brain::{Genome, Topology};
use neuroflap::simulation::error::{ArchiveError, EvolutionError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("neuroflap_{name}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn random_genome(seed: u64) -> Genome {
    Genome::new_random(Topology::FLAPPY, &mut ChaCha8Rng::seed_from_u64(seed))
}

#[test]
fn test_save_and_load_genome() {
    let dir = temp_dir("save_load");
    let path = dir.join("best.json");
    let genome = random_genome(1);

    save_genome(&genome, &path).expect("save");
    let loaded = load_genome(&path).expect("load");

    assert_eq!(loaded, genome);
    let inputs = [0.5, 2.0, -0.3, 1.0];
    assert_eq!(loaded.forward(&inputs), genome.forward(&inputs));
    // No temporary file is left behind
    assert!(!dir.join("best.json.tmp").exists());

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_record_field_order() {
    let genome = Genome::zeros(Topology::new(1, 2, 1));
    let json = serde_json::to_string(&GenomeRecord::from(&genome)).unwrap();

    let keys = [
        "\"inputCount\"",
        "\"hiddenCount\"",
        "\"outputCount\"",
        "\"weightsIH\"",
        "\"biasH\"",
        "\"weightsHO\"",
        "\"biasO\"",
    ];
    let positions: Vec<usize> = keys
        .iter()
        .map(|key| json.find(key).unwrap_or_else(|| panic!("{key} missing in {json}")))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");
}

#[test]
fn test_record_uses_flat_layout() {
    let genome = Genome::from_parts(
        Topology::new(2, 2, 1),
        vec![1.0, 2.0, 3.0, 4.0],
        vec![5.0, 6.0],
        vec![7.0, 8.0],
        vec![9.0],
    )
    .unwrap();
    let record = GenomeRecord::from(&genome);

    assert_eq!(record.input_count, 2);
    assert_eq!(record.hidden_count, 2);
    assert_eq!(record.output_count, 1);
    assert_eq!(record.weights_ih, vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(record.weights_ho, vec![7.0, 8.0]);
    assert_eq!(Genome::try_from(record).unwrap(), genome);
}

#[test]
fn test_load_parses_handwritten_record() {
    let dir = temp_dir("handwritten");
    let path = dir.join("genome.json");
    fs::write(
        &path,
        r#"{
            "inputCount": 1,
            "hiddenCount": 1,
            "outputCount": 1,
            "weightsIH": [1.0],
            "biasH": [0.0],
            "weightsHO": [-1.0],
            "biasO": [0.0]
        }"#,
    )
    .unwrap();

    let genome = load_genome(&path).unwrap();
    assert!(!genome.decide(&[1.0]));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_load_rejects_malformed_record() {
    let dir = temp_dir("malformed");
    let path = dir.join("genome.json");
    fs::write(
        &path,
        r#"{"inputCount":2,"hiddenCount":2,"outputCount":1,
            "weightsIH":[1.0,2.0,3.0],"biasH":[0.0,0.0],"weightsHO":[1.0,1.0],"biasO":[0.0]}"#,
    )
    .unwrap();

    let err = load_genome(&path).unwrap_err();
    assert!(matches!(
        err,
        ArchiveError::Malformed(EvolutionError::BufferLength {
            buffer: "weightsIH",
            expected: 4,
            actual: 3,
        })
    ));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_load_rejects_zero_sized_record() {
    let dir = temp_dir("zero_sized");
    let path = dir.join("genome.json");
    fs::write(
        &path,
        r#"{"inputCount":4,"hiddenCount":1,"outputCount":0,
            "weightsIH":[0,0,0,0],"biasH":[0],"weightsHO":[],"biasO":[]}"#,
    )
    .unwrap();

    let err = load_genome(&path).unwrap_err();
    assert!(matches!(
        err,
        ArchiveError::Malformed(EvolutionError::InvalidParams(_))
    ));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_record_with_huge_counts_is_rejected() {
    let record = GenomeRecord {
        input_count: usize::MAX,
        hidden_count: 2,
        output_count: 1,
        weights_ih: vec![],
        bias_h: vec![0.0, 0.0],
        weights_ho: vec![0.0, 0.0],
        bias_o: vec![0.0],
    };

    assert!(matches!(
        Genome::try_from(record),
        Err(ArchiveError::Malformed(EvolutionError::InvalidParams(_)))
    ));
}

#[test]
fn test_load_rejects_invalid_json() {
    let dir = temp_dir("invalid_json");
    let path = dir.join("genome.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(matches!(load_genome(&path), Err(ArchiveError::Json(_))));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_load_missing_file() {
    let dir = temp_dir("missing");
    let result = load_genome(dir.join("nope.json"));

    assert!(matches!(result, Err(ArchiveError::FileSystem(_))));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_archive_overwrites_previous_snapshot() {
    let dir = temp_dir("overwrite");
    let mut archive = JsonFileArchive::new(dir.join("nested").join("best.json"));
    let first = random_genome(2);
    let second = random_genome(3);

    archive.persist(&first).expect("first persist creates parent dirs");
    archive.persist(&second).expect("second persist");

    assert_eq!(load_genome(archive.path()).unwrap(), second);

    fs::remove_dir_all(&dir).ok();
}
