//! Constrained iterative deconvolution (additive van Cittert update).
//!
//! Starting from a guess `G_0` (the observed image by default), each
//! iteration re-blurs the guess with the PSF, compares it with the observed
//! image and adds the difference back:
//!
//! ```text
//! O_k     = rescale(G_k ⊛ PSF)
//! D_k     = O − O_k
//! G_{k+1} = clamp₀(smooth?(G_k + D_k))
//! ```
//!
//! Smoothing is periodic (see [`SmoothingPolicy`]) and keeps noise amplified
//! by the correction step under control. The clamp enforces the physical
//! non-negativity constraint, so the guess handed to the next iteration (and
//! to any observer) is always non-negative.
//!
//! Iterations are strictly sequential. The guess buffer is moved through the
//! loop and updated in place; the re-blurred estimate and the difference live
//! for one iteration only.

use std::ops::ControlFlow;

use ndarray::{Array3, ArrayView3};

use crate::config::{DeconvolutionConfig, RescalePolicy, SmoothingPolicy, SmoothingStage};
use crate::error::{RestorationError, Result, Shape};
use crate::filters::blur::gaussian_blur;
use crate::filters::core::{ensure_finite, ensure_not_empty, ensure_same_shape};
use crate::filters::fourier::TransferFunction;
use crate::filters::stats;

/// Diagnostics for one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationReport {
    /// Zero-based iteration index `k`.
    pub iteration: usize,
    /// `max(D_k)`, trends toward zero as the guess converges.
    pub max_difference: f32,
    /// `max(|D_k|)`.
    pub max_abs_difference: f32,
    /// Whether the guess was smoothed during this iteration.
    pub smoothed: bool,
    /// Number of samples the non-negativity clamp set to zero.
    pub clamped: usize,
    /// The re-blurred estimate had no usable maximum and was not rescaled.
    pub rescale_skipped: bool,
}

/// Result of a deconvolution run.
#[derive(Debug, Clone)]
pub struct Restoration {
    /// Final restored estimate, every sample >= 0.
    pub image: Array3<f32>,
    /// One report per completed iteration.
    pub history: Vec<IterationReport>,
    /// Iterations actually run; less than requested if the observer stopped
    /// early or the terminate threshold was reached.
    pub completed: usize,
    /// The run stopped because `max(|D_k|)` fell below the terminate threshold.
    pub converged: bool,
}

/// Iterative deconvolution of one observed image with one PSF.
///
/// The PSF transfer function and the observed maximum are computed once in
/// [`Deconvolver::new`] and reused by every iteration and every run.
#[derive(Debug, Clone)]
pub struct Deconvolver {
    observed: Array3<f32>,
    observed_max: f32,
    transfer: TransferFunction,
    config: DeconvolutionConfig,
}

impl Deconvolver {
    /// Validate the inputs and precompute the PSF transfer function.
    ///
    /// # Errors
    /// * `EmptyImage` if the observed image has no samples
    /// * `DimensionMismatch` if the PSF shape differs from the observed shape
    /// * `NonFiniteInput` if either image contains NaN or infinity
    /// * `InvalidConfig` if the configuration does not validate
    pub fn new(
        observed: ArrayView3<f32>,
        psf: ArrayView3<f32>,
        config: DeconvolutionConfig,
    ) -> Result<Self> {
        ensure_not_empty(observed)?;
        ensure_same_shape(observed.dim(), psf)?;
        ensure_finite(observed, "observed image")?;
        ensure_finite(psf, "PSF")?;
        config.validate()?;

        let psf_sum = stats::sum(psf);
        if (psf_sum - 1.0).abs() > 0.05 {
            log::warn!("PSF sums to {psf_sum:.4}, not 1; relying on rescale to fix the gain");
        }

        let observed_max = stats::max(observed).unwrap_or(0.0);

        Ok(Self {
            observed: observed.to_owned(),
            observed_max,
            transfer: TransferFunction::from_psf(psf)?,
            config,
        })
    }

    pub fn config(&self) -> &DeconvolutionConfig {
        &self.config
    }

    pub fn shape(&self) -> Shape {
        self.observed.dim()
    }

    /// Run all configured iterations starting from the observed image.
    pub fn run(&self) -> Result<Restoration> {
        self.run_with(|_| ControlFlow::Continue(()))
    }

    /// Run starting from the observed image, reporting every iteration.
    ///
    /// The observer is called after each iteration, once the guess is
    /// clamped. Returning `ControlFlow::Break` stops the run; the guess at
    /// that point is returned.
    pub fn run_with<F>(&self, observer: F) -> Result<Restoration>
    where
        F: FnMut(&IterationReport) -> ControlFlow<()>,
    {
        self.iterate(self.observed.clone(), observer)
    }

    /// Run starting from an explicit initial guess `G_0`.
    ///
    /// # Errors
    /// * `DimensionMismatch` if the guess shape differs from the observed shape
    /// * `NonFiniteInput` if the guess contains NaN or infinity
    pub fn run_from<F>(&self, initial_guess: Array3<f32>, observer: F) -> Result<Restoration>
    where
        F: FnMut(&IterationReport) -> ControlFlow<()>,
    {
        ensure_same_shape(self.shape(), initial_guess.view())?;
        ensure_finite(initial_guess.view(), "initial guess")?;
        self.iterate(initial_guess, observer)
    }

    fn iterate<F>(&self, mut guess: Array3<f32>, mut observer: F) -> Result<Restoration>
    where
        F: FnMut(&IterationReport) -> ControlFlow<()>,
    {
        let iterations = self.config.iterations;
        log::info!(
            "Deconvolving {:?} image, {} iterations, smoothing every {} (sigma {})",
            self.shape(),
            iterations,
            self.config.smoothing.period,
            self.config.smoothing.sigma
        );

        let mut history = Vec::with_capacity(iterations);
        let mut converged = false;
        for k in 0..iterations {
            let (next, report) = self.step(guess, k)?;
            guess = next;

            log::debug!(
                "iteration {}: max diff {:.4}, max |diff| {:.4}, clamped {}{}",
                k,
                report.max_difference,
                report.max_abs_difference,
                report.clamped,
                if report.smoothed { ", smoothed" } else { "" }
            );
            history.push(report);

            if observer(&report).is_break() {
                log::info!("Deconvolution stopped after {} of {} iterations", k + 1, iterations);
                break;
            }

            if self.has_converged(&report) {
                log::info!(
                    "Deconvolution converged after {} of {} iterations",
                    k + 1,
                    iterations
                );
                converged = true;
                break;
            }
        }

        if let Some(target) = self.config.output_max {
            if !stats::rescale_to_max(&mut guess, target) {
                log::warn!("Result has no positive maximum, output rescale skipped");
            }
        }

        let completed = history.len();
        if let Some(last) = history.last() {
            log::info!(
                "Deconvolution finished: {} iterations, final max |diff| {:.4}",
                completed,
                last.max_abs_difference
            );
        }

        Ok(Restoration {
            image: guess,
            history,
            completed,
            converged,
        })
    }

    /// `max(|D_k|)` relative to the observed maximum is below `terminate`.
    /// Never true without a positive observed maximum to compare against.
    fn has_converged(&self, report: &IterationReport) -> bool {
        match self.config.terminate {
            Some(fraction) if self.observed_max > 0.0 => {
                report.max_abs_difference / self.observed_max < fraction
            }
            _ => false,
        }
    }

    /// One iteration: consumes `G_k` and returns `G_{k+1}` with its report.
    ///
    /// # Errors
    /// `DimensionMismatch` if `guess` does not have the observed image's shape.
    pub fn step(&self, mut guess: Array3<f32>, k: usize) -> Result<(Array3<f32>, IterationReport)> {
        let smoothing = &self.config.smoothing;
        let smooth_now = smoothing.applies_at(k);

        if smooth_now && smoothing.stage == SmoothingStage::BeforeUpdate {
            guess = smooth(guess.view(), smoothing);
        }

        let mut reblurred = self.transfer.convolve(guess.view())?;

        let rescale_skipped = !self.rescale(&mut reblurred, k);

        // D_k = O - O_k, reusing the re-blurred buffer
        let mut difference = reblurred;
        difference.zip_mut_with(&self.observed, |d, &o| *d = o - *d);

        let max_difference = stats::max(difference.view()).unwrap_or(0.0);
        let max_abs_difference = stats::max_abs(difference.view());

        guess += &difference;
        drop(difference);

        if smooth_now && smoothing.stage == SmoothingStage::AfterUpdate {
            guess = smooth(guess.view(), smoothing);
        }

        let clamped = stats::clamp_non_negative(&mut guess);

        let report = IterationReport {
            iteration: k,
            max_difference,
            max_abs_difference,
            smoothed: smooth_now,
            clamped,
            rescale_skipped,
        };
        Ok((guess, report))
    }

    /// Apply the rescale policy; `false` if the estimate was left unscaled
    /// because its maximum, or the target maximum, is zero, negative or not
    /// finite.
    fn rescale(&self, reblurred: &mut Array3<f32>, k: usize) -> bool {
        let target = match self.config.rescale {
            RescalePolicy::Off => return true,
            RescalePolicy::MatchObservedMax => self.observed_max,
            RescalePolicy::FixedMax(target) => target,
        };

        // Scaling to a non-positive target would zero the estimate or flip its sign
        if !(target > 0.0 && target.is_finite()) {
            log::warn!("iteration {k}: observed image has max {target}, skipping rescale");
            return false;
        }

        if stats::rescale_to_max(reblurred, target) {
            return true;
        }

        log::warn!(
            "iteration {k}: re-blurred estimate has max {:?}, skipping rescale",
            stats::max(reblurred.view())
        );
        false
    }
}

fn smooth(image: ArrayView3<f32>, policy: &SmoothingPolicy) -> Array3<f32> {
    gaussian_blur(image, policy.sigma, policy.sigma_z)
}

/// Deconvolve `observed` with `psf` using the reference settings.
///
/// Runs `iterations` additive updates, smoothing with a Gaussian of width
/// `smooth_sigma` every `smooth_period` iterations (0 disables smoothing,
/// iteration 0 included), clamping negatives to zero after each one.
///
/// # Errors
/// * `InvalidIteration` if `iterations < 0`
/// * `DimensionMismatch` if `psf` and `observed` differ in shape
/// * `InvalidConfig` if `smooth_sigma` is negative or not finite
pub fn deconvolve(
    observed: ArrayView3<f32>,
    psf: ArrayView3<f32>,
    iterations: i64,
    smooth_period: usize,
    smooth_sigma: f32,
) -> Result<Array3<f32>> {
    let iterations =
        usize::try_from(iterations).map_err(|_| RestorationError::InvalidIteration(iterations))?;

    let config = DeconvolutionConfig {
        iterations,
        smoothing: SmoothingPolicy::every(smooth_period, smooth_sigma),
        ..DeconvolutionConfig::default()
    };

    Ok(Deconvolver::new(observed, psf, config)?.run()?.image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn identity_psf(shape: Shape) -> Array3<f32> {
        let mut psf = Array3::<f32>::zeros(shape);
        psf[[shape.0 / 2, shape.1 / 2, shape.2 / 2]] = 1.0;
        psf
    }

    fn unsmoothed(iterations: usize) -> DeconvolutionConfig {
        DeconvolutionConfig {
            iterations,
            smoothing: SmoothingPolicy::never(),
            ..DeconvolutionConfig::default()
        }
    }

    #[test]
    fn test_negative_iterations_rejected() {
        let observed = Array3::<f32>::from_elem((1, 4, 4), 1.0);
        let psf = identity_psf((1, 4, 4));
        let err = deconvolve(observed.view(), psf.view(), -1, 5, 1.0).unwrap_err();
        assert_eq!(err, RestorationError::InvalidIteration(-1));
    }

    #[test]
    fn test_zero_iterations_returns_observed() {
        let observed = Array3::from_shape_fn((1, 4, 4), |(_, y, x)| (y * 4 + x) as f32);
        let psf = identity_psf((1, 4, 4));
        let result = deconvolve(observed.view(), psf.view(), 0, 5, 1.0).unwrap();
        assert_eq!(result, observed);
    }

    #[test]
    fn test_empty_image_rejected() {
        let observed = Array3::<f32>::zeros((1, 0, 4));
        let err = Deconvolver::new(observed.view(), observed.view(), unsmoothed(1)).unwrap_err();
        assert_eq!(err, RestorationError::EmptyImage);
    }

    #[test]
    fn test_non_finite_psf_rejected() {
        let observed = Array3::<f32>::from_elem((1, 4, 4), 1.0);
        let mut psf = identity_psf((1, 4, 4));
        psf[[0, 0, 0]] = f32::INFINITY;
        let err = Deconvolver::new(observed.view(), psf.view(), unsmoothed(1)).unwrap_err();
        assert_eq!(err, RestorationError::NonFiniteInput("PSF"));
    }

    #[test]
    fn test_step_reports_smoothing_schedule() {
        let observed = Array3::<f32>::from_elem((1, 8, 8), 10.0);
        let psf = identity_psf((1, 8, 8));
        let deconvolver =
            Deconvolver::new(observed.view(), psf.view(), DeconvolutionConfig::with_iterations(11))
                .unwrap();

        let restoration = deconvolver.run().unwrap();
        let smoothed: Vec<usize> = restoration
            .history
            .iter()
            .filter(|r| r.smoothed)
            .map(|r| r.iteration)
            .collect();
        assert_eq!(smoothed, vec![0, 5, 10]);
    }

    #[test]
    fn test_rescale_skipped_for_non_positive_estimate() {
        let observed = Array3::<f32>::from_elem((1, 4, 4), 100.0);
        let psf = identity_psf((1, 4, 4));
        let deconvolver = Deconvolver::new(observed.view(), psf.view(), unsmoothed(1)).unwrap();

        let guess = Array3::<f32>::from_elem((1, 4, 4), -50.0);
        let restoration = deconvolver
            .run_from(guess, |_| ControlFlow::Continue(()))
            .unwrap();

        let report = restoration.history[0];
        assert!(report.rescale_skipped);
        assert_abs_diff_eq!(report.max_difference, 150.0, epsilon = 1e-3);
        for &v in restoration.image.iter() {
            assert!(v.is_finite());
            assert_abs_diff_eq!(v, 100.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_rescale_skipped_for_non_positive_observed_max() {
        let observed = Array3::<f32>::from_elem((1, 4, 4), -2.0);
        let psf = identity_psf((1, 4, 4));
        let deconvolver = Deconvolver::new(observed.view(), psf.view(), unsmoothed(1)).unwrap();

        let guess = Array3::<f32>::from_elem((1, 4, 4), 5.0);
        let restoration = deconvolver
            .run_from(guess, |_| ControlFlow::Continue(()))
            .unwrap();

        // Unscaled: D = -2 - 5 everywhere, so the guess is clamped to zero
        let report = restoration.history[0];
        assert!(report.rescale_skipped);
        assert_abs_diff_eq!(report.max_difference, -7.0, epsilon = 1e-3);
        assert_eq!(report.clamped, 16);
        assert!(restoration.image.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_fixed_max_rescale() {
        let observed = Array3::<f32>::from_elem((1, 4, 4), 10000.0);
        let psf = identity_psf((1, 4, 4));
        let config = DeconvolutionConfig {
            rescale: RescalePolicy::FixedMax(10000.0),
            ..unsmoothed(1)
        };
        let deconvolver = Deconvolver::new(observed.view(), psf.view(), config).unwrap();

        // A guess at a tenth of the scale re-blurs and rescales back to 10000
        let guess = Array3::<f32>::from_elem((1, 4, 4), 1000.0);
        let restoration = deconvolver
            .run_from(guess, |_| ControlFlow::Continue(()))
            .unwrap();
        assert_abs_diff_eq!(restoration.history[0].max_abs_difference, 0.0, epsilon = 1e-1);
    }

    #[test]
    fn test_output_max_rescales_result() {
        let observed = Array3::from_shape_fn((1, 4, 4), |(_, y, x)| 1.0 + (y + x) as f32);
        let psf = identity_psf((1, 4, 4));
        let config = DeconvolutionConfig {
            output_max: Some(255.0),
            ..unsmoothed(2)
        };
        let restoration = Deconvolver::new(observed.view(), psf.view(), config)
            .unwrap()
            .run()
            .unwrap();
        assert_abs_diff_eq!(stats::max(restoration.image.view()).unwrap(), 255.0, epsilon = 1e-2);
    }

    #[test]
    fn test_terminate_stops_once_difference_is_small() {
        let observed = Array3::from_shape_fn((1, 4, 4), |(_, y, x)| 50.0 + (y * 4 + x) as f32);
        let psf = identity_psf((1, 4, 4));
        let config = DeconvolutionConfig {
            terminate: Some(0.001),
            ..unsmoothed(200)
        };
        let restoration = Deconvolver::new(observed.view(), psf.view(), config)
            .unwrap()
            .run()
            .unwrap();

        // Identity PSF: the observed image is already a fixed point
        assert!(restoration.converged);
        assert_eq!(restoration.completed, 1);
        assert_eq!(restoration.history.len(), 1);
    }

    #[test]
    fn test_terminate_not_reached_runs_all_iterations() {
        let observed = Array3::<f32>::from_elem((1, 4, 4), 100.0);
        let psf = identity_psf((1, 4, 4));
        let config = DeconvolutionConfig {
            terminate: Some(0.001),
            ..unsmoothed(3)
        };
        let deconvolver = Deconvolver::new(observed.view(), psf.view(), config).unwrap();

        // A guess far from the answer keeps |D_k| large for every iteration
        let guess = Array3::from_shape_fn((1, 4, 4), |(_, y, x)| ((y + x) % 2) as f32 * 500.0);
        let restoration = deconvolver
            .run_from(guess, |_| ControlFlow::Continue(()))
            .unwrap();

        assert!(!restoration.converged);
        assert_eq!(restoration.completed, 3);
    }

    #[test]
    fn test_run_from_rejects_wrong_guess_shape() {
        let observed = Array3::<f32>::from_elem((1, 4, 4), 1.0);
        let psf = identity_psf((1, 4, 4));
        let deconvolver = Deconvolver::new(observed.view(), psf.view(), unsmoothed(1)).unwrap();

        let result = deconvolver.run_from(Array3::zeros((1, 4, 5)), |_| ControlFlow::Continue(()));
        assert!(matches!(
            result,
            Err(RestorationError::DimensionMismatch { .. })
        ));
    }
}
