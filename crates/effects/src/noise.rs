//! Seeded per-frame randomness.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uniquify_model::derive_seed;

/// RNG for one frame of one stage. Identical for the same stage seed and
/// frame index, whatever order frames are processed in.
pub fn frame_rng(stage_seed: u64, frame_index: u64) -> StdRng {
    StdRng::seed_from_u64(derive_seed(stage_seed, frame_index))
}

/// Normal(0, sigma) samples via the Box-Muller transform.
pub struct GaussianNoise {
    rng: StdRng,
    sigma: f64,
    spare: Option<f64>,
}

impl GaussianNoise {
    pub fn new(rng: StdRng, sigma: f64) -> Self {
        Self {
            rng,
            sigma: sigma.max(0.0),
            spare: None,
        }
    }

    pub fn sample(&mut self) -> f64 {
        if let Some(z) = self.spare.take() {
            return z * self.sigma;
        }
        // u1 in (0, 1] keeps ln() finite.
        let u1: f64 = 1.0 - self.rng.gen::<f64>();
        let u2: f64 = self.rng.gen::<f64>();
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = std::f64::consts::TAU * u2;
        self.spare = Some(radius * theta.sin());
        radius * theta.cos() * self.sigma
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rng_is_reproducible() {
        let a: Vec<u32> = (0..4).map(|_| frame_rng(5, 9).gen()).collect();
        let b: Vec<u32> = (0..4).map(|_| frame_rng(5, 9).gen()).collect();
        assert_eq!(a, b);
        assert_ne!(frame_rng(5, 9).gen::<u64>(), frame_rng(5, 10).gen::<u64>());
    }

    #[test]
    fn test_gaussian_moments() {
        let mut noise = GaussianNoise::new(frame_rng(1, 1), 2.0);
        let samples: Vec<f64> = (0..20_000).map(|_| noise.sample()).collect();
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / samples.len() as f64;
        assert!(mean.abs() < 0.1, "mean {mean}");
        assert!((var.sqrt() - 2.0).abs() < 0.1, "std {}", var.sqrt());
    }
}
