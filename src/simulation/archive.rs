//! Persistence of the best genome found so far.
//!
//! A snapshot is a flat JSON record with a fixed field order:
//! `inputCount, hiddenCount, outputCount, weightsIH, biasH, weightsHO, biasO`.
//! `weightsIH` is indexed `i * hiddenCount + h` and `weightsHO` is indexed
//! `h * outputCount + o`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::brain::{Genome, Topology};
use super::error::ArchiveError;

/// Flat, language-neutral representation of a genome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenomeRecord {
    /// Number of inputs.
    pub input_count: usize,
    /// Number of hidden units.
    pub hidden_count: usize,
    /// Number of outputs.
    pub output_count: usize,
    /// Input to hidden weights, input-major.
    #[serde(rename = "weightsIH")]
    pub weights_ih: Vec<f32>,
    /// Hidden biases.
    #[serde(rename = "biasH")]
    pub bias_h: Vec<f32>,
    /// Hidden to output weights, hidden-major.
    #[serde(rename = "weightsHO")]
    pub weights_ho: Vec<f32>,
    /// Output biases.
    #[serde(rename = "biasO")]
    pub bias_o: Vec<f32>,
}

impl From<&Genome> for GenomeRecord {
    fn from(genome: &Genome) -> Self {
        let topology = genome.topology();
        Self {
            input_count: topology.inputs,
            hidden_count: topology.hidden,
            output_count: topology.outputs,
            weights_ih: genome.weights_ih.iter().copied().collect(),
            bias_h: genome.bias_h.to_vec(),
            weights_ho: genome.weights_ho.iter().copied().collect(),
            bias_o: genome.bias_o.to_vec(),
        }
    }
}

impl TryFrom<GenomeRecord> for Genome {
    type Error = ArchiveError;

    fn try_from(record: GenomeRecord) -> Result<Self, Self::Error> {
        let topology = Topology::new(record.input_count, record.hidden_count, record.output_count);
        let genome = Genome::from_parts(
            topology,
            record.weights_ih,
            record.bias_h,
            record.weights_ho,
            record.bias_o,
        )?;
        Ok(genome)
    }
}

/// Destination for best-genome snapshots.
///
/// The engine calls [`GenomeArchive::persist`] synchronously every time its
/// best-fitness watermark improves. Errors are reported back but never stop
/// training.
pub trait GenomeArchive {
    /// Stores `genome`, replacing any earlier snapshot.
    fn persist(&mut self, genome: &Genome) -> Result<(), ArchiveError>;
}

/// Writes snapshots as pretty-printed JSON to a single file.
#[derive(Debug, Clone)]
pub struct JsonFileArchive {
    path: PathBuf,
}

impl JsonFileArchive {
    /// Creates an archive that writes to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file of this archive.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl GenomeArchive for JsonFileArchive {
    fn persist(&mut self, genome: &Genome) -> Result<(), ArchiveError> {
        save_genome(genome, &self.path)
    }
}

/// Writes `genome` to `path`.
///
/// The record goes to a sibling temporary file first and is then renamed
/// over `path`, so readers never observe a partially written snapshot.
pub fn save_genome(genome: &Genome, path: impl AsRef<Path>) -> Result<(), ArchiveError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(&GenomeRecord::from(genome))?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;

    tracing::debug!(path = %path.display(), "saved genome snapshot");
    Ok(())
}

/// Reads a genome snapshot written by [`save_genome`].
pub fn load_genome(path: impl AsRef<Path>) -> Result<Genome, ArchiveError> {
    let json = std::fs::read_to_string(path)?;
    let record: GenomeRecord = serde_json::from_str(&json)?;
    Genome::try_from(record)
}
