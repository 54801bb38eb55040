//! Fixed-topology feedforward network used as the genome.
//!
//! A genome has exactly one hidden layer with tanh activation and a sigmoid
//! output layer. Shapes never change once a population is created; evolution
//! only touches the numeric content of the four parameter buffers.

use std::fmt;

use ndarray::{Array1, Array2, ArrayView1, Zip};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::EvolutionError;

/// Output above this value means "flap".
pub const FLAP_THRESHOLD: f32 = 0.5;

/// Layer sizes of a genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topology {
    /// Number of input units.
    pub inputs: usize,
    /// Number of hidden units.
    pub hidden: usize,
    /// Number of output units.
    pub outputs: usize,
}

impl Topology {
    /// The shape used by the flapping agent: 4 observations, 6 hidden units, 1 decision.
    pub const FLAPPY: Self = Self::new(4, 6, 1);

    /// Creates a topology from its three layer sizes.
    pub const fn new(inputs: usize, hidden: usize, outputs: usize) -> Self {
        Self {
            inputs,
            hidden,
            outputs,
        }
    }

    /// Total number of weights and biases.
    pub fn parameter_count(&self) -> usize {
        self.inputs * self.hidden + self.hidden + self.hidden * self.outputs + self.outputs
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.inputs, self.hidden, self.outputs)
    }
}

/// A single-hidden-layer network and the unit of selection.
///
/// Weights are stored input-major: `weights_ih[[i, h]]` connects input `i`
/// to hidden unit `h`, and `weights_ho[[h, o]]` connects hidden unit `h` to
/// output `o`. Arrays are kept in standard layout, so iterating them yields
/// the same order as the persisted flat record.
#[derive(Debug, Clone, PartialEq)]
pub struct Genome {
    /// Input to hidden weights (`inputs` × `hidden`).
    pub weights_ih: Array2<f32>,
    /// Hidden biases (`hidden`).
    pub bias_h: Array1<f32>,
    /// Hidden to output weights (`hidden` × `outputs`).
    pub weights_ho: Array2<f32>,
    /// Output biases (`outputs`).
    pub bias_o: Array1<f32>,
}

impl Genome {
    /// Creates a genome with every parameter set to zero.
    pub fn zeros(topology: Topology) -> Self {
        Self {
            weights_ih: Array2::zeros((topology.inputs, topology.hidden)),
            bias_h: Array1::zeros(topology.hidden),
            weights_ho: Array2::zeros((topology.hidden, topology.outputs)),
            bias_o: Array1::zeros(topology.outputs),
        }
    }

    /// Creates a genome with every parameter drawn uniformly from `[-1, 1]`.
    pub fn new_random<R: Rng>(topology: Topology, rng: &mut R) -> Self {
        let mut genome = Self::zeros(topology);
        genome.for_each_param_mut(|w| *w = rng.random_range(-1.0..=1.0));
        genome
    }

    /// Builds a genome from flat buffers laid out in record order.
    ///
    /// `weights_ih` is indexed `i * hidden + h` and `weights_ho` is indexed
    /// `h * outputs + o`. Every layer must have at least one unit.
    pub fn from_parts(
        topology: Topology,
        weights_ih: Vec<f32>,
        bias_h: Vec<f32>,
        weights_ho: Vec<f32>,
        bias_o: Vec<f32>,
    ) -> Result<Self, EvolutionError> {
        if topology.inputs == 0 || topology.hidden == 0 || topology.outputs == 0 {
            return Err(EvolutionError::invalid(format!(
                "layer sizes must be non-zero, got {topology}"
            )));
        }
        let ih_len = topology
            .inputs
            .checked_mul(topology.hidden)
            .ok_or_else(|| EvolutionError::invalid(format!("topology {topology} is too large")))?;
        let ho_len = topology
            .hidden
            .checked_mul(topology.outputs)
            .ok_or_else(|| EvolutionError::invalid(format!("topology {topology} is too large")))?;

        check_len("weightsIH", ih_len, &weights_ih)?;
        check_len("biasH", topology.hidden, &bias_h)?;
        check_len("weightsHO", ho_len, &weights_ho)?;
        check_len("biasO", topology.outputs, &bias_o)?;

        let weights_ih = Array2::from_shape_vec((topology.inputs, topology.hidden), weights_ih)
            .map_err(|_| EvolutionError::invalid("weightsIH does not fit its shape"))?;
        let weights_ho = Array2::from_shape_vec((topology.hidden, topology.outputs), weights_ho)
            .map_err(|_| EvolutionError::invalid("weightsHO does not fit its shape"))?;

        Ok(Self {
            weights_ih,
            bias_h: Array1::from_vec(bias_h),
            weights_ho,
            bias_o: Array1::from_vec(bias_o),
        })
    }

    /// Returns the layer sizes of this genome.
    ///
    /// Read from `weights_ih` and `bias_o`; the other two buffers are expected
    /// to keep matching shapes when edited through the public fields.
    pub fn topology(&self) -> Topology {
        let (inputs, hidden) = self.weights_ih.dim();
        Topology::new(inputs, hidden, self.bias_o.len())
    }

    /// Runs a forward pass and returns every output unit.
    ///
    /// # Panics
    ///
    /// Panics if `inputs` does not have exactly `topology().inputs` elements.
    #[inline]
    pub fn think(&self, inputs: ArrayView1<'_, f32>) -> Array1<f32> {
        let mut hidden = inputs.dot(&self.weights_ih);
        hidden += &self.bias_h;
        hidden.mapv_inplace(f32::tanh);

        let mut output = hidden.dot(&self.weights_ho);
        output += &self.bias_o;
        output.mapv_inplace(sigmoid);
        output
    }

    /// Runs a forward pass and returns the first output, in `(0, 1)`.
    ///
    /// # Panics
    ///
    /// Panics if `inputs` does not have exactly `topology().inputs` elements.
    #[inline]
    pub fn forward(&self, inputs: &[f32]) -> f32 {
        self.think(ArrayView1::from(inputs))[0]
    }

    /// Whether this genome flaps for the given observation.
    #[inline]
    pub fn decide(&self, inputs: &[f32]) -> bool {
        self.forward(inputs) > FLAP_THRESHOLD
    }

    /// Builds a child whose every parameter is taken from `a` or `b` with a
    /// fair coin flip per position.
    pub fn crossover<R: Rng>(
        a: &Genome,
        b: &Genome,
        rng: &mut R,
    ) -> Result<Self, EvolutionError> {
        check_same_shape(a, b)?;

        let mut child = a.clone();
        let mut pick = |c: &mut f32, &x: &f32, &y: &f32| {
            *c = if rng.random_bool(0.5) { x } else { y };
        };

        Zip::from(&mut child.weights_ih)
            .and(&a.weights_ih)
            .and(&b.weights_ih)
            .for_each(&mut pick);
        Zip::from(&mut child.bias_h)
            .and(&a.bias_h)
            .and(&b.bias_h)
            .for_each(&mut pick);
        Zip::from(&mut child.weights_ho)
            .and(&a.weights_ho)
            .and(&b.weights_ho)
            .for_each(&mut pick);
        Zip::from(&mut child.bias_o)
            .and(&a.bias_o)
            .and(&b.bias_o)
            .for_each(&mut pick);

        Ok(child)
    }

    /// Perturbs each parameter with probability `rate` by a value drawn
    /// uniformly from `[-strength, strength]`.
    ///
    /// # Panics
    ///
    /// Panics if `strength` is negative or not finite.
    pub fn mutate<R: Rng>(&mut self, rate: f32, strength: f32, rng: &mut R) {
        self.for_each_param_mut(|w| {
            if rng.random::<f32>() < rate {
                *w += rng.random_range(-strength..=strength);
            }
        });
    }

    /// Flattens all parameters in record order
    /// (`weightsIH`, `biasH`, `weightsHO`, `biasO`).
    pub fn to_flat_vector(&self) -> Vec<f32> {
        let mut flat = Vec::with_capacity(self.topology().parameter_count());
        flat.extend(self.weights_ih.iter().copied());
        flat.extend(self.bias_h.iter().copied());
        flat.extend(self.weights_ho.iter().copied());
        flat.extend(self.bias_o.iter().copied());
        flat
    }

    /// Euclidean distance between two genomes of the same shape.
    pub fn distance(a: &Genome, b: &Genome) -> Result<f32, EvolutionError> {
        check_same_shape(a, b)?;

        let sum_sq: f32 = a
            .to_flat_vector()
            .into_iter()
            .zip(b.to_flat_vector())
            .map(|(x, y)| (x - y) * (x - y))
            .sum();
        Ok(sum_sq.sqrt())
    }

    fn for_each_param_mut(&mut self, mut f: impl FnMut(&mut f32)) {
        self.weights_ih.iter_mut().for_each(&mut f);
        self.bias_h.iter_mut().for_each(&mut f);
        self.weights_ho.iter_mut().for_each(&mut f);
        self.bias_o.iter_mut().for_each(&mut f);
    }
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn check_same_shape(a: &Genome, b: &Genome) -> Result<(), EvolutionError> {
    let same = a.weights_ih.dim() == b.weights_ih.dim()
        && a.bias_h.len() == b.bias_h.len()
        && a.weights_ho.dim() == b.weights_ho.dim()
        && a.bias_o.len() == b.bias_o.len();
    if same {
        Ok(())
    } else {
        Err(EvolutionError::TopologyMismatch {
            left: a.topology(),
            right: b.topology(),
        })
    }
}

fn check_len(buffer: &'static str, expected: usize, values: &[f32]) -> Result<(), EvolutionError> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(EvolutionError::BufferLength {
            buffer,
            expected,
            actual: values.len(),
        })
    }
}
