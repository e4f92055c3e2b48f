// Softmax output and categorical cross-entropy

/// Probabilities are clipped to `[EPSILON, 1 - EPSILON]` inside the log
const EPSILON: f32 = 1e-7;

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&z| (z - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// `-sum(target * ln(p))`
pub fn categorical_cross_entropy(probs: &[f32], target: &[f32]) -> f32 {
    -probs
        .iter()
        .zip(target)
        .map(|(&p, &t)| t * p.clamp(EPSILON, 1.0 - EPSILON).ln())
        .sum::<f32>()
}

/// Gradient of softmax + cross-entropy w.r.t. the logits: `p - target`
pub fn softmax_cross_entropy_grad(probs: &[f32], target: &[f32]) -> Vec<f32> {
    probs.iter().zip(target).map(|(p, t)| p - t).collect()
}

/// Index of the largest value; ties resolve to the later index
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (index, &value) in values.iter().enumerate().skip(1) {
        if value >= values[best] {
            best = index;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[2.0, -1.0]);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(probs[0] > probs[1]);

        let huge = softmax(&[1000.0, 999.0]);
        assert!(huge.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_cross_entropy() {
        assert!((categorical_cross_entropy(&[0.5, 0.5], &[1.0, 0.0]) - std::f32::consts::LN_2).abs() < 1e-6);
        // Clipping keeps a zero probability finite
        assert!(categorical_cross_entropy(&[0.0, 1.0], &[1.0, 0.0]).is_finite());
    }

    #[test]
    fn test_grad() {
        assert_eq!(softmax_cross_entropy_grad(&[0.75, 0.25], &[0.0, 1.0]), vec![0.75, -0.75]);
    }

    #[test]
    fn test_argmax_ties_go_late() {
        assert_eq!(argmax(&[0.7, 0.3]), 0);
        assert_eq!(argmax(&[0.5, 0.5]), 1);
    }
}
