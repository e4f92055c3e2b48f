// Training tensors - shuffled, flattened (X, y) pairs
//
// Produced by `TrainingSet::to_training_tensors` and consumed by the
// classifier's training loop. Owned by the caller for the duration of one
// training run and dropped with it.

use rand::Rng;

/// Uniform random permutation of `0..len` (Fisher–Yates)
pub fn fisher_yates_permutation<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    for i in (1..len).rev() {
        let j = rng.gen_range(0..=i);
        order.swap(i, j);
    }
    order
}

/// Feature/label arrays shaped `[N, frames, mels, 1]` and `[N, 2]`
#[derive(Debug, Clone)]
pub struct TrainingTensors {
    features: Vec<f32>,
    labels: Vec<[f32; 2]>,
    origin: Vec<usize>,
    frames: usize,
    mels: usize,
}

impl TrainingTensors {
    /// Assemble from unshuffled rows, then apply one permutation to both
    ///
    /// `rows[i]` must each hold `frames * mels` values.
    pub(crate) fn shuffled<R: Rng + ?Sized>(
        rows: Vec<(&[f32], [f32; 2])>,
        frames: usize,
        mels: usize,
        rng: &mut R,
    ) -> Self {
        let order = fisher_yates_permutation(rows.len(), rng);
        let sample_len = frames * mels;

        let mut features = Vec::with_capacity(rows.len() * sample_len);
        let mut labels = Vec::with_capacity(rows.len());
        for &source in &order {
            let (feature, label) = rows[source];
            features.extend_from_slice(feature);
            labels.push(label);
        }

        Self {
            features,
            labels,
            origin: order,
            frames,
            mels,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// `[N, frames, mels, 1]`
    pub fn x_shape(&self) -> [usize; 4] {
        [self.len(), self.frames, self.mels, 1]
    }

    /// `[N, 2]`
    pub fn y_shape(&self) -> [usize; 2] {
        [self.len(), 2]
    }

    /// Flattened features of row `index`
    pub fn features(&self, index: usize) -> &[f32] {
        let sample_len = self.frames * self.mels;
        &self.features[index * sample_len..(index + 1) * sample_len]
    }

    /// One-hot label of row `index`
    pub fn label(&self, index: usize) -> &[f32; 2] {
        &self.labels[index]
    }

    pub fn labels(&self) -> &[[f32; 2]] {
        &self.labels
    }

    /// Position of row `index` in the unshuffled blow-then-not_blow order
    pub fn origin(&self, index: usize) -> usize {
        self.origin[index]
    }

    /// First row of the validation tail
    ///
    /// Rows `[split, N)` are held out: `split = floor(N * (1 - fraction))`,
    /// clamped so at least one row stays in training.
    pub fn validation_split_index(&self, fraction: f32) -> usize {
        let n = self.len();
        if n == 0 {
            return 0;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        let split = (n as f32 * (1.0 - fraction)).floor() as usize;
        split.clamp(1, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_permutation_is_complete() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut order = fisher_yates_permutation(50, &mut rng);
        order.sort_unstable();
        assert_eq!(order, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_permutation_is_seed_deterministic() {
        let a = fisher_yates_permutation(20, &mut StdRng::seed_from_u64(9));
        let b = fisher_yates_permutation(20, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_permutation_edge_lengths() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(fisher_yates_permutation(0, &mut rng).is_empty());
        assert_eq!(fisher_yates_permutation(1, &mut rng), vec![0]);
    }

    #[test]
    fn test_validation_split_index() {
        let rows: Vec<(&[f32], [f32; 2])> = Vec::new();
        let empty = TrainingTensors::shuffled(rows, 1, 1, &mut StdRng::seed_from_u64(0));
        assert_eq!(empty.validation_split_index(0.2), 0);

        let data = [0.0f32; 10];
        let rows: Vec<(&[f32], [f32; 2])> = (0..10).map(|i| (&data[i..i + 1], [1.0, 0.0])).collect();
        let tensors = TrainingTensors::shuffled(rows, 1, 1, &mut StdRng::seed_from_u64(0));
        assert_eq!(tensors.validation_split_index(0.2), 8);
        assert_eq!(tensors.validation_split_index(0.0), 10);
        assert_eq!(tensors.validation_split_index(1.0), 1);
    }
}
