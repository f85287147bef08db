//! Neural network controller for agent movement.
//!
//! A fixed-topology feed-forward network (one hidden layer, tanh activations)
//! together with the genetic operators used by the evolution engine:
//! sparse mutation and two-point structured crossover.

use ndarray::{Array1, Array2, s};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::{Result, SimError};
use super::params::{INPUT_SIZE, OUTPUT_SIZE};

/// A single fully connected layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    /// Weight matrix (`output_size` × `input_size`), one row per neuron.
    pub weights: Array2<f32>,
    /// Bias vector (`output_size`).
    pub biases: Array1<f32>,
}

impl Mlp {
    /// Creates a new layer with weights and biases drawn from `[-scale, scale]`.
    pub fn new_random<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        scale: f32,
        rng: &mut R,
    ) -> Self {
        Self {
            weights: Array2::from_shape_simple_fn((output_size, input_size), || {
                rng.random_range(-scale..=scale)
            }),
            biases: Array1::from_shape_simple_fn(output_size, || rng.random_range(-scale..=scale)),
        }
    }

    /// Performs forward pass with tanh activation.
    #[inline]
    pub fn forward(&self, inputs: &Array1<f32>) -> Array1<f32> {
        let mut output = self.weights.dot(inputs);
        output += &self.biases;
        output.mapv_inplace(f32::tanh);
        output
    }

    /// Perturbs each weight and bias with probability `probability` by a uniform
    /// offset in `[-rate, rate]`.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rate: f32, probability: f32, rng: &mut R) {
        let mut perturb = |value: f32| {
            if rng.random::<f32>() < probability {
                value + rng.random_range(-rate..=rate)
            } else {
                value
            }
        };
        self.weights.mapv_inplace(&mut perturb);
        self.biases.mapv_inplace(&mut perturb);
    }

    /// Replaces every neuron (row and bias) at index `cut` or beyond with the
    /// corresponding neuron of `donor`.
    pub fn splice(&mut self, donor: &Mlp, cut: usize) {
        self.weights
            .slice_mut(s![cut.., ..])
            .assign(&donor.weights.slice(s![cut.., ..]));
        self.biases
            .slice_mut(s![cut..])
            .assign(&donor.biases.slice(s![cut..]));
    }

    /// Number of neurons in this layer.
    pub fn neurons(&self) -> usize {
        self.biases.len()
    }
}

/// The feed-forward network that steers one agent.
///
/// Seven sensory inputs feed a tanh hidden layer, which feeds two tanh outputs
/// interpreted as a movement direction. Layer shapes never change after
/// construction; clones are deep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralController {
    /// Input to hidden layer.
    pub hidden: Mlp,
    /// Hidden to output layer.
    pub output: Mlp,
}

impl NeuralController {
    /// Creates a controller with all parameters drawn from `[-1, 1]`.
    pub fn new_random<R: Rng + ?Sized>(hidden_size: usize, rng: &mut R) -> Self {
        Self {
            hidden: Mlp::new_random(INPUT_SIZE, hidden_size, 1.0, rng),
            output: Mlp::new_random(hidden_size, OUTPUT_SIZE, 1.0, rng),
        }
    }

    /// Number of hidden neurons.
    pub fn hidden_size(&self) -> usize {
        self.hidden.neurons()
    }

    /// Layer shapes as `((hidden rows, inputs), (output rows, hidden))`.
    pub fn shape(&self) -> ((usize, usize), (usize, usize)) {
        (self.hidden.weights.dim(), self.output.weights.dim())
    }

    /// Maps sensory inputs to a movement direction `(dx, dy)` in `[-1, 1]²`.
    pub fn forward(&self, inputs: &Array1<f32>) -> (f32, f32) {
        let out = self.output.forward(&self.hidden.forward(inputs));
        (out[0], out[1])
    }

    /// Adds `bias` to every output neuron bias.
    pub fn shift_output_bias(&mut self, bias: f32) {
        self.output.biases += bias;
    }

    /// Sparse mutation in place: each parameter is perturbed with probability
    /// `probability` by a uniform offset in `[-rate, rate]`.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rate: f32, probability: f32, rng: &mut R) {
        self.hidden.mutate(rate, probability, rng);
        self.output.mutate(rate, probability, rng);
    }

    /// Returns a mutated copy, leaving `self` untouched.
    pub fn mutated<R: Rng + ?Sized>(&self, rate: f32, probability: f32, rng: &mut R) -> Self {
        let mut child = self.clone();
        child.mutate(rate, probability, rng);
        child
    }

    /// Deterministic crossover: hidden neurons from `cut_hidden` on and output
    /// neurons from `cut_output` on come from `other`, the rest from `self`.
    pub fn crossed(&self, other: &Self, cut_hidden: usize, cut_output: usize) -> Result<Self> {
        if self.shape() != other.shape() {
            return Err(SimError::ShapeMismatch {
                expected: self.shape(),
                found: other.shape(),
            });
        }

        let mut child = self.clone();
        child
            .hidden
            .splice(&other.hidden, cut_hidden.min(self.hidden.neurons()));
        child
            .output
            .splice(&other.output, cut_output.min(self.output.neurons()));
        Ok(child)
    }

    /// Two-point crossover with cut points drawn uniformly from
    /// `[1, hidden_size - 1]` and `[1, output_size - 1]`, one per layer.
    ///
    /// # Arguments
    ///
    /// * `parent1` - Supplies the neurons before each cut
    /// * `parent2` - Supplies the neurons from each cut on
    /// * `rng` - Random source for the cut points
    ///
    /// # Returns
    ///
    /// The child controller, or [`SimError::ShapeMismatch`] if the parents
    /// differ in topology.
    pub fn crossover<R: Rng + ?Sized>(parent1: &Self, parent2: &Self, rng: &mut R) -> Result<Self> {
        if parent1.shape() != parent2.shape() {
            return Err(SimError::ShapeMismatch {
                expected: parent1.shape(),
                found: parent2.shape(),
            });
        }
        let cut_hidden = draw_cut(parent1.hidden.neurons(), rng);
        let cut_output = draw_cut(parent1.output.neurons(), rng);
        parent1.crossed(parent2, cut_hidden, cut_output)
    }

    /// Flattens all weights and biases into a single vector.
    pub fn to_flat_vector(&self) -> Vec<f32> {
        let mut flat = Vec::new();
        for layer in [&self.hidden, &self.output] {
            flat.extend(layer.weights.iter().copied());
            flat.extend(layer.biases.iter().copied());
        }
        flat
    }
}

// A single-neuron layer has no interior cut; it is inherited whole from the first parent.
fn draw_cut<R: Rng + ?Sized>(neurons: usize, rng: &mut R) -> usize {
    if neurons < 2 {
        neurons
    } else {
        rng.random_range(1..neurons)
    }
}
