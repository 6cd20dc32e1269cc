//! Noise simulation: additive Gaussian noise and modulatory Poisson noise.
//!
//! Used to build realistic test data (photon shot noise on a blurred image)
//! and to give a PSF a small noise floor so that Fourier-domain division
//! never hits an exact zero. Both generators are deterministic for a seed.

use ndarray::{Array3, ArrayView3};

// ============================================================================
// Simple RNG (deterministic across platforms)
// ============================================================================

/// Simple linear congruential generator for deterministic noise.
/// Uses MINSTD parameters.
struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        SimpleRng {
            state: seed.wrapping_add(1), // Avoid zero
        }
    }

    /// Generate next random u32.
    fn next_u32(&mut self) -> u32 {
        // MINSTD LCG
        self.state = self.state.wrapping_mul(48271).wrapping_add(1) % 2147483647;
        self.state as u32
    }

    /// Generate uniform random f64 in [0, 1).
    fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / 2147483647.0
    }

    /// Generate standard normal f64 using Box-Muller transform.
    fn next_gaussian(&mut self) -> f64 {
        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Draw from a Poisson distribution with the given mean.
    ///
    /// Knuth's multiplication method for small means, a rounded normal
    /// approximation above 30 where the former gets slow and underflows.
    fn next_poisson(&mut self, mean: f64) -> f64 {
        // NaN compares false too, and would never reach the Knuth limit
        if !(mean > 0.0) {
            return 0.0;
        }
        if mean > 30.0 {
            let draw = (mean + mean.sqrt() * self.next_gaussian()).round();
            return draw.max(0.0);
        }

        let limit = (-mean).exp();
        let mut k = 0u32;
        let mut p = 1.0;
        loop {
            p *= self.next_f64();
            if p <= limit {
                return k as f64;
            }
            k += 1;
        }
    }
}

// ============================================================================
// Add Noise
// ============================================================================

/// Add zero-mean Gaussian noise with standard deviation `std_dev`.
///
/// # Arguments
/// * `input` - Image (depth, height, width)
/// * `std_dev` - Noise standard deviation in intensity units
/// * `seed` - Random seed for deterministic results
pub fn add_gaussian_noise(input: ArrayView3<f32>, std_dev: f32, seed: u64) -> Array3<f32> {
    let mut rng = SimpleRng::new(seed);
    let sd = std_dev as f64;
    input.mapv(|v| (v as f64 + sd * rng.next_gaussian()) as f32)
}

/// Replace each sample by a Poisson draw whose mean is the sample value.
///
/// Models photon shot noise: the noise grows with the signal. Negative and
/// NaN samples are treated as a mean of zero.
pub fn poisson_noise(input: ArrayView3<f32>, seed: u64) -> Array3<f32> {
    let mut rng = SimpleRng::new(seed);
    input.mapv(|v| rng.next_poisson(v as f64) as f32)
}
