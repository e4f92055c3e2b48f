// Per-sample feature map in height x width x channels layout

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Activation volume for one sample, stored `[(y * width + x) * channels + c]`
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMap {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub data: Vec<f32>,
}

impl FeatureMap {
    pub fn zeros(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
            data: vec![0.0; height * width * channels],
        }
    }

    /// Wrap a flat buffer; `None` on length mismatch
    pub fn from_vec(height: usize, width: usize, channels: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == height * width * channels).then_some(Self {
            height,
            width,
            channels,
            data,
        })
    }

    /// Channel vector at `(y, x)`
    #[inline]
    pub fn pixel(&self, y: usize, x: usize) -> &[f32] {
        let start = (y * self.width + x) * self.channels;
        &self.data[start..start + self.channels]
    }

    #[inline]
    pub fn pixel_mut(&mut self, y: usize, x: usize) -> &mut [f32] {
        let start = (y * self.width + x) * self.channels;
        &mut self.data[start..start + self.channels]
    }
}

/// Trainable weight/bias pair shared by convolution and dense layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl Parameters {
    /// Glorot-uniform weights, zero bias
    pub fn glorot<R: Rng + ?Sized>(
        weight_count: usize,
        bias_count: usize,
        fan_in: usize,
        fan_out: usize,
        rng: &mut R,
    ) -> Self {
        let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
        Self {
            weights: (0..weight_count)
                .map(|_| rng.gen_range(-limit..limit))
                .collect(),
            bias: vec![0.0; bias_count],
        }
    }

    /// Zeroed buffer of identical layout, used for gradients
    pub fn zeros_like(&self) -> Self {
        Self {
            weights: vec![0.0; self.weights.len()],
            bias: vec![0.0; self.bias.len()],
        }
    }

    pub fn scale(&mut self, factor: f32) {
        for value in self.weights.iter_mut().chain(self.bias.iter_mut()) {
            *value *= factor;
        }
    }
}

/// In-place ReLU
pub fn relu(values: &mut [f32]) {
    for value in values.iter_mut() {
        *value = value.max(0.0);
    }
}

/// Zero the gradient wherever the ReLU output was clamped
pub fn relu_backward(grad: &mut [f32], activated: &[f32]) {
    for (g, &a) in grad.iter_mut().zip(activated) {
        if a <= 0.0 {
            *g = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_pixel_layout() {
        let map = FeatureMap::from_vec(2, 2, 2, (0..8).map(|v| v as f32).collect()).unwrap();
        assert_eq!(map.pixel(1, 0), &[4.0, 5.0]);
        assert!(FeatureMap::from_vec(2, 2, 2, vec![0.0; 7]).is_none());
    }

    #[test]
    fn test_glorot_limits() {
        let params = Parameters::glorot(1000, 4, 10, 20, &mut StdRng::seed_from_u64(0));
        let limit = (6.0f32 / 30.0).sqrt();
        assert!(params.weights.iter().all(|w| w.abs() <= limit));
        assert!(params.bias.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_relu_backward_masks() {
        let mut values = vec![-1.0, 0.5, 0.0, 2.0];
        relu(&mut values);
        assert_eq!(values, vec![0.0, 0.5, 0.0, 2.0]);

        let mut grad = vec![1.0; 4];
        relu_backward(&mut grad, &values);
        assert_eq!(grad, vec![0.0, 1.0, 0.0, 1.0]);
    }
}
