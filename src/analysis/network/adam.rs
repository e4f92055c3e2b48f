// Adam optimizer

/// Numerical fuzz added to the second-moment root
const EPSILON: f32 = 1e-7;

/// Adam with bias-corrected step size
///
/// Moment buffers are allocated on the first `step`, one per parameter
/// slice, in the order the slices are passed. Callers must pass the same
/// slices in the same order every step.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    step: i32,
    first_moment: Vec<Vec<f32>>,
    second_moment: Vec<Vec<f32>>,
}

impl Adam {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            step: 0,
            first_moment: Vec::new(),
            second_moment: Vec::new(),
        }
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn steps_taken(&self) -> i32 {
        self.step
    }

    /// Apply one update to every parameter slice
    pub fn step(&mut self, params: Vec<&mut [f32]>, grads: Vec<&[f32]>) {
        debug_assert_eq!(params.len(), grads.len());
        if self.first_moment.is_empty() {
            self.first_moment = params.iter().map(|p| vec![0.0; p.len()]).collect();
            self.second_moment = params.iter().map(|p| vec![0.0; p.len()]).collect();
        }

        self.step += 1;
        let correction1 = 1.0 - self.beta1.powi(self.step);
        let correction2 = 1.0 - self.beta2.powi(self.step);
        let step_size = self.learning_rate * correction2.sqrt() / correction1;

        for (((param, grad), m), v) in params
            .into_iter()
            .zip(grads)
            .zip(self.first_moment.iter_mut())
            .zip(self.second_moment.iter_mut())
        {
            for (((p, &g), m), v) in param
                .iter_mut()
                .zip(grad)
                .zip(m.iter_mut())
                .zip(v.iter_mut())
            {
                *m = self.beta1 * *m + (1.0 - self.beta1) * g;
                *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
                *p -= step_size * *m / (v.sqrt() + EPSILON);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        let mut adam = Adam::new(0.001);
        let mut param = vec![1.0f32, -1.0];
        let grad = [0.5f32, -2.0];
        adam.step(vec![param.as_mut_slice()], vec![&grad[..]]);

        // First Adam step is ~lr * sign(g)
        assert!((param[0] - 0.999).abs() < 1e-5);
        assert!((param[1] + 0.999).abs() < 1e-5);
        assert_eq!(adam.steps_taken(), 1);
    }

    #[test]
    fn test_minimizes_quadratic() {
        let mut adam = Adam::new(0.05);
        let mut x = vec![3.0f32];
        for _ in 0..500 {
            let grad = [2.0 * x[0]];
            adam.step(vec![x.as_mut_slice()], vec![&grad[..]]);
        }
        assert!(x[0].abs() < 0.25, "x = {}", x[0]);
    }
}
