// Network - fixed CNN topology for blow / not-blow classification
//
// Input [N_FRAMES, N_MELS, 1] ->
//   Conv(32, 3x3, same, ReLU) -> MaxPool(2x2) ->
//   Conv(64, 3x3, same, ReLU) -> MaxPool(2x2) ->
//   Conv(128, 3x3, same, ReLU) -> GlobalAveragePool ->
//   Dropout(0.5) -> Dense(64, ReLU) -> Dropout(0.3) -> Dense(2, softmax)
//
// Layer math is written out per sample; a mini-batch is a loop over
// samples accumulating into one `Gradients` buffer.
//
// Module organization:
// - tensor: FeatureMap, Parameters, ReLU
// - conv: 3x3 same-padded convolution
// - pool: max pooling and global average pooling
// - dense: fully connected layer and dropout masks
// - loss: softmax and categorical cross-entropy
// - adam: optimizer

pub mod adam;
pub mod conv;
pub mod dense;
pub mod loss;
pub mod pool;
pub mod tensor;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::analysis::features::{N_FRAMES, N_MELS};

pub use adam::Adam;
use conv::Conv2d;
use dense::{apply_mask, dropout_mask, Dense};
use tensor::{relu, relu_backward, FeatureMap, Parameters};

/// `[frames, mels, channels]` accepted by the network
pub const INPUT_SHAPE: [usize; 3] = [N_FRAMES, N_MELS, 1];

/// Output width (one-hot: 0 = blow, 1 = not_blow)
pub const NUM_CLASSES: usize = 2;

const DROPOUT_POOLED: f32 = 0.5;
const DROPOUT_HIDDEN: f32 = 0.3;

/// CNN parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    conv1: Conv2d,
    conv2: Conv2d,
    conv3: Conv2d,
    hidden: Dense,
    output: Dense,
}

/// Gradient buffers mirroring `Network`'s parameters
#[derive(Debug, Clone)]
pub struct Gradients {
    layers: [Parameters; 5],
}

impl Gradients {
    /// Multiply every gradient by `factor` (batch averaging)
    pub fn scale(&mut self, factor: f32) {
        for layer in self.layers.iter_mut() {
            layer.scale(factor);
        }
    }

    /// Flat views in `Network::parameters_mut` order
    pub fn slices(&self) -> Vec<&[f32]> {
        self.layers
            .iter()
            .flat_map(|layer| [layer.weights.as_slice(), layer.bias.as_slice()])
            .collect()
    }
}

/// Loss and hit for one training sample
#[derive(Debug, Clone, Copy)]
pub struct SampleOutcome {
    pub loss: f32,
    pub correct: bool,
}

/// Convolutional trunk activations (post-ReLU) and pooling routes
struct TrunkActivations {
    a1: FeatureMap,
    pool1_argmax: Vec<usize>,
    p1: FeatureMap,
    a2: FeatureMap,
    pool2_argmax: Vec<usize>,
    p2: FeatureMap,
    a3: FeatureMap,
}

/// Activations kept from the forward pass for backpropagation
struct ForwardTrace {
    input: FeatureMap,
    trunk: TrunkActivations,
    pooled_mask: Vec<f32>,
    pooled_dropped: Vec<f32>,
    hidden: Vec<f32>,
    hidden_mask: Vec<f32>,
    hidden_dropped: Vec<f32>,
    probs: Vec<f32>,
}

impl Network {
    /// Fresh Glorot-initialized network with the fixed topology
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            conv1: Conv2d::new(INPUT_SHAPE[2], 32, rng),
            conv2: Conv2d::new(32, 64, rng),
            conv3: Conv2d::new(64, 128, rng),
            hidden: Dense::new(128, 64, rng),
            output: Dense::new(64, NUM_CLASSES, rng),
        }
    }

    /// Check that deserialized layers chain together with the fixed topology
    pub fn validate_topology(&self) -> Result<(), String> {
        let chain = [
            ("conv1", self.conv1.in_channels(), INPUT_SHAPE[2], self.conv1.out_channels(), 32),
            ("conv2", self.conv2.in_channels(), 32, self.conv2.out_channels(), 64),
            ("conv3", self.conv3.in_channels(), 64, self.conv3.out_channels(), 128),
            ("hidden", self.hidden.inputs(), 128, self.hidden.outputs(), 64),
            ("output", self.output.inputs(), 64, self.output.outputs(), NUM_CLASSES),
        ];
        for (name, inputs, want_in, outputs, want_out) in chain {
            if inputs != want_in || outputs != want_out {
                return Err(format!(
                    "{} is {}->{} but topology needs {}->{}",
                    name, inputs, outputs, want_in, want_out
                ));
            }
        }

        let layers = [
            (self.conv1.params(), 9 * INPUT_SHAPE[2] * 32, 32),
            (self.conv2.params(), 9 * 32 * 64, 64),
            (self.conv3.params(), 9 * 64 * 128, 128),
            (self.hidden.params(), 128 * 64, 64),
            (self.output.params(), 64 * NUM_CLASSES, NUM_CLASSES),
        ];
        for (index, (params, weights, bias)) in layers.into_iter().enumerate() {
            if params.weights.len() != weights || params.bias.len() != bias {
                return Err(format!("layer {} has wrong parameter count", index));
            }
            if params.weights.iter().chain(&params.bias).any(|v| !v.is_finite()) {
                return Err(format!("layer {} has non-finite parameters", index));
            }
        }
        Ok(())
    }

    fn input_map(input: &[f32]) -> Option<FeatureMap> {
        FeatureMap::from_vec(INPUT_SHAPE[0], INPUT_SHAPE[1], INPUT_SHAPE[2], input.to_vec())
    }

    /// Conv + ReLU + pool trunk shared by inference and training
    fn trunk(&self, input: &FeatureMap) -> TrunkActivations {
        let mut a1 = self.conv1.forward(input);
        relu(&mut a1.data);
        let (p1, pool1_argmax) = pool::max_pool_2x2(&a1);

        let mut a2 = self.conv2.forward(&p1);
        relu(&mut a2.data);
        let (p2, pool2_argmax) = pool::max_pool_2x2(&a2);

        let mut a3 = self.conv3.forward(&p2);
        relu(&mut a3.data);

        TrunkActivations {
            a1,
            pool1_argmax,
            p1,
            a2,
            pool2_argmax,
            p2,
            a3,
        }
    }

    /// Inference forward pass (dropout disabled)
    ///
    /// `input` is one flattened `[N_FRAMES, N_MELS]` matrix. Returns
    /// `None` on a length mismatch.
    pub fn predict(&self, input: &[f32]) -> Option<[f32; NUM_CLASSES]> {
        let map = Self::input_map(input)?;
        let trunk = self.trunk(&map);

        let pooled = pool::global_average_pool(&trunk.a3);
        let mut hidden = self.hidden.forward(&pooled);
        relu(&mut hidden);
        let probs = loss::softmax(&self.output.forward(&hidden));

        Some([probs[0], probs[1]])
    }

    fn forward_train<R: Rng + ?Sized>(&self, input: FeatureMap, rng: &mut R) -> ForwardTrace {
        let trunk = self.trunk(&input);

        let pooled = pool::global_average_pool(&trunk.a3);
        let pooled_mask = dropout_mask(pooled.len(), DROPOUT_POOLED, rng);
        let pooled_dropped = apply_mask(&pooled, &pooled_mask);

        let mut hidden = self.hidden.forward(&pooled_dropped);
        relu(&mut hidden);
        let hidden_mask = dropout_mask(hidden.len(), DROPOUT_HIDDEN, rng);
        let hidden_dropped = apply_mask(&hidden, &hidden_mask);

        let probs = loss::softmax(&self.output.forward(&hidden_dropped));

        ForwardTrace {
            input,
            trunk,
            pooled_mask,
            pooled_dropped,
            hidden,
            hidden_mask,
            hidden_dropped,
            probs,
        }
    }

    /// Forward + backward for one sample, accumulating into `grads`
    ///
    /// Dropout is active. Returns `None` on an input length mismatch.
    pub fn accumulate<R: Rng + ?Sized>(
        &self,
        input: &[f32],
        target: &[f32; NUM_CLASSES],
        rng: &mut R,
        grads: &mut Gradients,
    ) -> Option<SampleOutcome> {
        let trace = self.forward_train(Self::input_map(input)?, rng);
        let [g_conv1, g_conv2, g_conv3, g_hidden, g_output] = &mut grads.layers;

        let outcome = SampleOutcome {
            loss: loss::categorical_cross_entropy(&trace.probs, target),
            correct: loss::argmax(&trace.probs) == loss::argmax(target),
        };

        // Dense head
        let g_logits = loss::softmax_cross_entropy_grad(&trace.probs, target);
        let g_hidden_dropped = self.output.backward(&trace.hidden_dropped, &g_logits, g_output);
        let mut g_hidden_act = apply_mask(&g_hidden_dropped, &trace.hidden_mask);
        relu_backward(&mut g_hidden_act, &trace.hidden);
        let g_pooled_dropped = self.hidden.backward(&trace.pooled_dropped, &g_hidden_act, g_hidden);
        let g_pooled = apply_mask(&g_pooled_dropped, &trace.pooled_mask);

        // Convolutional trunk
        let trunk = &trace.trunk;
        let mut g_a3 = pool::global_average_pool_backward(&g_pooled, trunk.a3.height, trunk.a3.width);
        relu_backward(&mut g_a3.data, &trunk.a3.data);
        let g_p2 = self.conv3.backward(&trunk.p2, &g_a3, g_conv3, true)?;

        let mut g_a2 =
            pool::max_pool_2x2_backward(&g_p2, &trunk.pool2_argmax, trunk.a2.height, trunk.a2.width);
        relu_backward(&mut g_a2.data, &trunk.a2.data);
        let g_p1 = self.conv2.backward(&trunk.p1, &g_a2, g_conv2, true)?;

        let mut g_a1 =
            pool::max_pool_2x2_backward(&g_p1, &trunk.pool1_argmax, trunk.a1.height, trunk.a1.width);
        relu_backward(&mut g_a1.data, &trunk.a1.data);
        // First layer input gradient is never needed
        let _ = self.conv1.backward(&trace.input, &g_a1, g_conv1, false);

        Some(outcome)
    }

    /// Zeroed gradient buffers for one mini-batch
    pub fn zero_gradients(&self) -> Gradients {
        Gradients {
            layers: [
                self.conv1.params().zeros_like(),
                self.conv2.params().zeros_like(),
                self.conv3.params().zeros_like(),
                self.hidden.params().zeros_like(),
                self.output.params().zeros_like(),
            ],
        }
    }

    /// Mutable flat views of every parameter, matching `Gradients::slices`
    pub fn parameters_mut(&mut self) -> Vec<&mut [f32]> {
        [
            self.conv1.params_mut(),
            self.conv2.params_mut(),
            self.conv3.params_mut(),
            self.hidden.params_mut(),
            self.output.params_mut(),
        ]
        .into_iter()
        .flat_map(|params| [params.weights.as_mut_slice(), params.bias.as_mut_slice()])
        .collect()
    }

    /// Total trainable parameter count
    pub fn parameter_count(&self) -> usize {
        [
            self.conv1.params(),
            self.conv2.params(),
            self.conv3.params(),
            self.hidden.params(),
            self.output.params(),
        ]
        .iter()
        .map(|p| p.weights.len() + p.bias.len())
        .sum()
    }
}
