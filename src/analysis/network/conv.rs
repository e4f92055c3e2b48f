// 3x3 same-padded, stride-1 convolution

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::tensor::{FeatureMap, Parameters};

const KERNEL: usize = 3;

/// 2D convolution with a 3x3 kernel and zero "same" padding
///
/// Kernel layout is `[ky][kx][in][out]` so the innermost loop runs over
/// contiguous output channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conv2d {
    in_channels: usize,
    out_channels: usize,
    params: Parameters,
}

impl Conv2d {
    pub fn new<R: Rng + ?Sized>(in_channels: usize, out_channels: usize, rng: &mut R) -> Self {
        let area = KERNEL * KERNEL;
        Self {
            in_channels,
            out_channels,
            params: Parameters::glorot(
                area * in_channels * out_channels,
                out_channels,
                area * in_channels,
                area * out_channels,
                rng,
            ),
        }
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Parameters {
        &mut self.params
    }

    /// Weight row for kernel tap `(ky, kx)` and input channel `ic`
    #[inline]
    fn tap_offset(&self, ky: usize, kx: usize, ic: usize) -> usize {
        ((ky * KERNEL + kx) * self.in_channels + ic) * self.out_channels
    }

    /// Input coordinates covered by kernel tap `k` around output coordinate `o`
    #[inline]
    fn source(o: usize, k: usize, extent: usize) -> Option<usize> {
        (o + k).checked_sub(1).filter(|&i| i < extent)
    }

    /// Pre-activation output, same spatial size as `input`
    pub fn forward(&self, input: &FeatureMap) -> FeatureMap {
        debug_assert_eq!(input.channels, self.in_channels);
        let (height, width) = (input.height, input.width);
        let mut output = FeatureMap::zeros(height, width, self.out_channels);

        for y in 0..height {
            for x in 0..width {
                let out_px = output.pixel_mut(y, x);
                out_px.copy_from_slice(&self.params.bias);

                for ky in 0..KERNEL {
                    let Some(iy) = Self::source(y, ky, height) else {
                        continue;
                    };
                    for kx in 0..KERNEL {
                        let Some(ix) = Self::source(x, kx, width) else {
                            continue;
                        };
                        for (ic, &value) in input.pixel(iy, ix).iter().enumerate() {
                            if value == 0.0 {
                                continue;
                            }
                            let offset = self.tap_offset(ky, kx, ic);
                            let row = &self.params.weights[offset..offset + self.out_channels];
                            for (out, &w) in out_px.iter_mut().zip(row) {
                                *out += value * w;
                            }
                        }
                    }
                }
            }
        }

        output
    }

    /// Accumulate parameter gradients; optionally return the input gradient
    ///
    /// `grad_output` is the gradient w.r.t. the pre-activation output.
    pub fn backward(
        &self,
        input: &FeatureMap,
        grad_output: &FeatureMap,
        grads: &mut Parameters,
        want_input_grad: bool,
    ) -> Option<FeatureMap> {
        let (height, width) = (input.height, input.width);
        let mut grad_input =
            want_input_grad.then(|| FeatureMap::zeros(height, width, self.in_channels));

        for y in 0..height {
            for x in 0..width {
                let g_out = grad_output.pixel(y, x);
                if g_out.iter().all(|&g| g == 0.0) {
                    continue;
                }
                for (b, &g) in grads.bias.iter_mut().zip(g_out) {
                    *b += g;
                }

                for ky in 0..KERNEL {
                    let Some(iy) = Self::source(y, ky, height) else {
                        continue;
                    };
                    for kx in 0..KERNEL {
                        let Some(ix) = Self::source(x, kx, width) else {
                            continue;
                        };
                        let in_px = input.pixel(iy, ix);
                        for (ic, &value) in in_px.iter().enumerate() {
                            let offset = self.tap_offset(ky, kx, ic);
                            let range = offset..offset + self.out_channels;

                            if value != 0.0 {
                                for (gw, &g) in grads.weights[range.clone()].iter_mut().zip(g_out) {
                                    *gw += value * g;
                                }
                            }

                            if let Some(grad_input) = grad_input.as_mut() {
                                let dot: f32 = self.params.weights[range]
                                    .iter()
                                    .zip(g_out)
                                    .map(|(w, g)| w * g)
                                    .sum();
                                grad_input.pixel_mut(iy, ix)[ic] += dot;
                            }
                        }
                    }
                }
            }
        }

        grad_input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_input() -> FeatureMap {
        FeatureMap::from_vec(3, 4, 2, (0..24).map(|v| (v as f32 * 0.37).sin()).collect()).unwrap()
    }

    #[test]
    fn test_same_padding_keeps_spatial_shape() {
        let conv = Conv2d::new(2, 5, &mut StdRng::seed_from_u64(0));
        let out = conv.forward(&small_input());
        assert_eq!((out.height, out.width, out.channels), (3, 4, 5));
    }

    #[test]
    fn test_identity_kernel() {
        let mut conv = Conv2d::new(1, 1, &mut StdRng::seed_from_u64(0));
        conv.params_mut().weights = vec![0.0; 9];
        conv.params_mut().weights[4] = 1.0; // center tap
        conv.params_mut().bias = vec![0.5];

        let input = FeatureMap::from_vec(2, 2, 1, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let out = conv.forward(&input);
        assert_eq!(out.data, vec![1.5, 2.5, 3.5, 4.5]);
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(11);
        let conv = Conv2d::new(2, 3, &mut rng);
        let input = small_input();

        // Loss = sum(output * upstream)
        let upstream: Vec<f32> = (0..3 * 4 * 3).map(|v| ((v * 7 % 5) as f32) - 2.0).collect();
        let loss = |conv: &Conv2d, input: &FeatureMap| -> f32 {
            conv.forward(input)
                .data
                .iter()
                .zip(&upstream)
                .map(|(o, u)| o * u)
                .sum()
        };

        let grad_out = FeatureMap::from_vec(3, 4, 3, upstream.clone()).unwrap();
        let mut grads = conv.params().zeros_like();
        let grad_in = conv.backward(&input, &grad_out, &mut grads, true).unwrap();

        let eps = 1e-2;
        for index in [0, 7, 20, 53] {
            let mut plus = conv.clone();
            plus.params_mut().weights[index] += eps;
            let mut minus = conv.clone();
            minus.params_mut().weights[index] -= eps;
            let numeric = (loss(&plus, &input) - loss(&minus, &input)) / (2.0 * eps);
            assert!((numeric - grads.weights[index]).abs() < 1e-2, "weight {}", index);
        }

        for index in [0, 5, 13, 23] {
            let mut plus = input.clone();
            plus.data[index] += eps;
            let mut minus = input.clone();
            minus.data[index] -= eps;
            let numeric = (loss(&conv, &plus) - loss(&conv, &minus)) / (2.0 * eps);
            assert!((numeric - grad_in.data[index]).abs() < 1e-2, "input {}", index);
        }

        let bias_numeric: f32 = upstream.iter().skip(1).step_by(3).sum();
        assert!((grads.bias[1] - bias_numeric).abs() < 1e-4);
    }
}
