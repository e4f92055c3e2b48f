// Fully connected layer and inverted dropout

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::tensor::Parameters;

/// Dense layer, weights laid out `[input][output]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    inputs: usize,
    outputs: usize,
    params: Parameters,
}

impl Dense {
    pub fn new<R: Rng + ?Sized>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        Self {
            inputs,
            outputs,
            params: Parameters::glorot(inputs * outputs, outputs, inputs, outputs, rng),
        }
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn outputs(&self) -> usize {
        self.outputs
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Parameters {
        &mut self.params
    }

    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        debug_assert_eq!(input.len(), self.inputs);
        let mut output = self.params.bias.clone();
        for (&value, row) in input.iter().zip(self.params.weights.chunks_exact(self.outputs)) {
            if value == 0.0 {
                continue;
            }
            for (out, &w) in output.iter_mut().zip(row) {
                *out += value * w;
            }
        }
        output
    }

    /// Accumulate parameter gradients and return the input gradient
    pub fn backward(&self, input: &[f32], grad_output: &[f32], grads: &mut Parameters) -> Vec<f32> {
        for (b, &g) in grads.bias.iter_mut().zip(grad_output) {
            *b += g;
        }

        input
            .iter()
            .zip(grads.weights.chunks_exact_mut(self.outputs))
            .zip(self.params.weights.chunks_exact(self.outputs))
            .map(|((&value, grad_row), row)| {
                for (gw, &g) in grad_row.iter_mut().zip(grad_output) {
                    *gw += value * g;
                }
                row.iter().zip(grad_output).map(|(w, g)| w * g).sum()
            })
            .collect()
    }
}

/// Inverted-dropout mask: each entry is 0 with probability `rate`,
/// otherwise `1 / (1 - rate)`
pub fn dropout_mask<R: Rng + ?Sized>(len: usize, rate: f32, rng: &mut R) -> Vec<f32> {
    if rate <= 0.0 {
        return vec![1.0; len];
    }
    let keep = 1.0 - rate;
    (0..len)
        .map(|_| if rng.gen::<f32>() < keep { 1.0 / keep } else { 0.0 })
        .collect()
}

/// Element-wise product, used for both applying a mask and its backward pass
pub fn apply_mask(values: &[f32], mask: &[f32]) -> Vec<f32> {
    values.iter().zip(mask).map(|(v, m)| v * m).collect()
}
