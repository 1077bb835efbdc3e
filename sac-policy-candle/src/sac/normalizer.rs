//! Running normalization of vector observations.
use ndarray::{Array1, Array2, Axis};

const CLIP: f32 = 5.0;

/// Running mean and variance of vector observations.
///
/// `variance` accumulates the sum of squared deviations; the variance used for
/// normalization is `variance / (steps + 1)`. Normalized values are clipped to
/// `[-5, 5]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalizer {
    steps: f32,
    mean: Array1<f32>,
    variance: Array1<f32>,
}

impl Normalizer {
    /// Creates statistics of observations of `dim` elements.
    pub fn new(dim: usize) -> Self {
        Self {
            steps: 0.0,
            mean: Array1::zeros(dim),
            variance: Array1::ones(dim),
        }
    }

    /// Accumulates a batch of observations of shape `(n, dim)`.
    pub fn update(&mut self, obs: &Array2<f32>) {
        let n = obs.nrows();
        if n == 0 {
            return;
        }
        let total = self.steps + n as f32;
        let diff = obs - &self.mean;
        let new_mean = &self.mean + &(diff.sum_axis(Axis(0)) / total);
        let new_diff = obs - &new_mean;
        self.variance = &self.variance + &(&new_diff * &diff).sum_axis(Axis(0));
        self.mean = new_mean;
        self.steps = total;
    }

    /// Normalizes observations with the current statistics.
    pub fn normalize(&self, obs: &Array2<f32>) -> Array2<f32> {
        let std = (&self.variance / (self.steps + 1.0)).mapv(f32::sqrt);
        ((obs - &self.mean) / &std).mapv(|x| x.clamp(-CLIP, CLIP))
    }

    /// Number of accumulated observations.
    pub fn steps(&self) -> f32 {
        self.steps
    }

    /// Running mean.
    pub fn mean(&self) -> &Array1<f32> {
        &self.mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_initial_statistics_pass_through() {
        let normalizer = Normalizer::new(2);
        let obs = arr2(&[[1.0f32, -2.0], [7.0, 0.5]]);
        assert_eq!(normalizer.normalize(&obs), arr2(&[[1.0f32, -2.0], [5.0, 0.5]]));
    }

    #[test]
    fn test_update_tracks_mean() {
        let mut normalizer = Normalizer::new(1);
        normalizer.update(&arr2(&[[2.0f32], [4.0]]));
        normalizer.update(&arr2(&[[6.0f32]]));

        assert_eq!(normalizer.steps(), 3.0);
        assert!((normalizer.mean()[0] - 4.0).abs() < 1e-6);

        let z = normalizer.normalize(&arr2(&[[4.0f32]]));
        assert!(z[[0, 0]].abs() < 1e-6);
    }

    #[test]
    fn test_empty_batch_is_ignored() {
        let mut normalizer = Normalizer::new(3);
        normalizer.update(&Array2::zeros((0, 3)));
        assert_eq!(normalizer, Normalizer::new(3));
    }
}
