// Pooling layers: 2x2 max pooling and global average pooling

use super::tensor::FeatureMap;

/// 2x2 max pooling, stride 2, valid padding
///
/// Returns the pooled map and, per output cell, the flat input index that
/// won the max (used to route gradients back).
pub fn max_pool_2x2(input: &FeatureMap) -> (FeatureMap, Vec<usize>) {
    let (out_h, out_w, channels) = (input.height / 2, input.width / 2, input.channels);
    let mut output = FeatureMap::zeros(out_h, out_w, channels);
    let mut argmax = vec![0usize; out_h * out_w * channels];

    for y in 0..out_h {
        for x in 0..out_w {
            for c in 0..channels {
                let mut best_index = ((2 * y) * input.width + 2 * x) * channels + c;
                let mut best = input.data[best_index];
                for (dy, dx) in [(0, 1), (1, 0), (1, 1)] {
                    let index = ((2 * y + dy) * input.width + 2 * x + dx) * channels + c;
                    if input.data[index] > best {
                        best = input.data[index];
                        best_index = index;
                    }
                }
                let out_index = (y * out_w + x) * channels + c;
                output.data[out_index] = best;
                argmax[out_index] = best_index;
            }
        }
    }

    (output, argmax)
}

/// Route pooled gradients back to the winning input cells
pub fn max_pool_2x2_backward(
    grad_output: &FeatureMap,
    argmax: &[usize],
    input_height: usize,
    input_width: usize,
) -> FeatureMap {
    let mut grad_input = FeatureMap::zeros(input_height, input_width, grad_output.channels);
    for (&source, &g) in argmax.iter().zip(&grad_output.data) {
        grad_input.data[source] += g;
    }
    grad_input
}

/// Mean over all spatial positions, one value per channel
pub fn global_average_pool(input: &FeatureMap) -> Vec<f32> {
    let mut pooled = vec![0.0; input.channels];
    for pixel in input.data.chunks_exact(input.channels) {
        for (sum, &v) in pooled.iter_mut().zip(pixel) {
            *sum += v;
        }
    }
    let area = (input.height * input.width).max(1) as f32;
    for value in pooled.iter_mut() {
        *value /= area;
    }
    pooled
}

/// Spread each channel gradient evenly over the spatial positions
pub fn global_average_pool_backward(grad: &[f32], height: usize, width: usize) -> FeatureMap {
    let area = (height * width).max(1) as f32;
    let spread: Vec<f32> = grad.iter().map(|g| g / area).collect();
    let mut grad_input = FeatureMap::zeros(height, width, grad.len());
    for pixel in grad_input.data.chunks_exact_mut(grad.len()) {
        pixel.copy_from_slice(&spread);
    }
    grad_input
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_pool_picks_maximum() {
        // 2x4 single-channel map -> 1x2
        let input = FeatureMap::from_vec(2, 4, 1, vec![1.0, 5.0, 2.0, 0.0, 3.0, 4.0, 9.0, 1.0]).unwrap();
        let (out, argmax) = max_pool_2x2(&input);

        assert_eq!((out.height, out.width), (1, 2));
        assert_eq!(out.data, vec![5.0, 9.0]);
        assert_eq!(argmax, vec![1, 6]);
    }

    #[test]
    fn test_max_pool_floors_odd_extent() {
        let input = FeatureMap::zeros(5, 3, 2);
        let (out, _) = max_pool_2x2(&input);
        assert_eq!((out.height, out.width, out.channels), (2, 1, 2));
    }

    #[test]
    fn test_max_pool_backward_routes_to_winner() {
        let input = FeatureMap::from_vec(2, 2, 1, vec![1.0, 3.0, 2.0, 0.0]).unwrap();
        let (_, argmax) = max_pool_2x2(&input);
        let grad = FeatureMap::from_vec(1, 1, 1, vec![7.0]).unwrap();

        let back = max_pool_2x2_backward(&grad, &argmax, 2, 2);
        assert_eq!(back.data, vec![0.0, 7.0, 0.0, 0.0]);
    }

    #[test]
    fn test_global_average_pool() {
        let input = FeatureMap::from_vec(1, 2, 2, vec![1.0, 10.0, 3.0, 20.0]).unwrap();
        assert_eq!(global_average_pool(&input), vec![2.0, 15.0]);

        let back = global_average_pool_backward(&[2.0, 4.0], 1, 2);
        assert_eq!(back.data, vec![1.0, 2.0, 1.0, 2.0]);
    }
}
