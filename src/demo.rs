//! The convolution / deconvolution teaching pipeline.
//!
//! Builds the chirp target, blurs it with a PSF, shows that a plain inverse
//! filter recovers it when there is no noise, adds shot noise, and restores
//! the noisy image with the constrained iterative engine. Every stage is
//! returned as its own image so callers can plot line profiles of any of them.

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::config::DeconvolutionConfig;
use crate::deconvolution::{Deconvolver, IterationReport};
use crate::error::{RestorationError, Result};
use crate::filters::fourier::TransferFunction;
use crate::filters::{noise, stats};
use crate::synth::{self, ChirpParams};

/// Intensity the blurred image is rescaled to, in photons.
pub const BLURRED_MAX: f32 = 10000.0;

/// Parameters of the demo run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub width: usize,
    pub height: usize,
    pub chirp: ChirpParams,
    /// Lateral PSF standard deviation in pixels.
    pub psf_sigma: f32,
    /// Gaussian noise floor added to the normalized PSF so the inverse filter
    /// never divides by an exact zero.
    pub psf_noise: f32,
    pub seed: u64,
    pub deconvolution: DeconvolutionConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            chirp: ChirpParams::default(),
            psf_sigma: 5.0,
            psf_noise: 2e-8,
            seed: 0,
            deconvolution: DeconvolutionConfig::default(),
        }
    }
}

/// All intermediate images of a demo run.
#[derive(Debug, Clone)]
pub struct ChirpDemo {
    /// Ground truth target.
    pub chirp: Array3<f32>,
    /// PSF with its noise floor.
    pub psf: Array3<f32>,
    /// Chirp convolved with the PSF, rescaled to [`BLURRED_MAX`].
    pub blurred: Array3<f32>,
    /// Blurred image after Fourier division by the PSF.
    pub inverse_filtered: Array3<f32>,
    /// Blurred image with modulatory Poisson noise.
    pub noisy: Array3<f32>,
    /// Constrained iterative restoration of the noisy image.
    pub restored: Array3<f32>,
    pub history: Vec<IterationReport>,
}

/// Run the full pipeline.
///
/// # Errors
/// `InvalidConfig` for an empty image size or a non-positive PSF width, plus
/// anything the deconvolution engine rejects.
pub fn run_chirp_demo(config: &DemoConfig) -> Result<ChirpDemo> {
    if config.width == 0 || config.height == 0 {
        return Err(RestorationError::InvalidConfig(format!(
            "demo image size must be non-zero, got {}x{}",
            config.width, config.height
        )));
    }
    if !(config.psf_sigma > 0.0 && config.psf_sigma.is_finite()) {
        return Err(RestorationError::InvalidConfig(format!(
            "PSF sigma must be positive, got {}",
            config.psf_sigma
        )));
    }

    let chirp = synth::chirp_image(config.width, config.height, &config.chirp);
    let shape = chirp.dim();

    let clean_psf = synth::gaussian_psf(shape, config.psf_sigma, 0.0);
    let psf = noise::add_gaussian_noise(clean_psf.view(), config.psf_noise, config.seed);
    let transfer = TransferFunction::from_psf(psf.view())?;

    let mut blurred = transfer.convolve(chirp.view())?;
    if !stats::rescale_to_max(&mut blurred, BLURRED_MAX) {
        log::warn!("Blurred chirp has no positive maximum, left unscaled");
    }
    log::info!("Blurred chirp with {}x{} PSF, sigma {}", config.width, config.height, config.psf_sigma);

    // The blurred image went through a rescale, so divide by the same gain
    let mut inverse_filtered = transfer.inverse_filter(blurred.view())?;
    if let Some(chirp_max) = stats::max(chirp.view()) {
        if !stats::rescale_to_max(&mut inverse_filtered, chirp_max) {
            log::warn!("Inverse-filtered image has no positive maximum, left unscaled");
        }
    }

    let noisy = noise::poisson_noise(blurred.view(), config.seed.wrapping_add(1));

    let restoration =
        Deconvolver::new(noisy.view(), psf.view(), config.deconvolution.clone())?.run()?;

    Ok(ChirpDemo {
        chirp,
        psf,
        blurred,
        inverse_filtered,
        noisy,
        restored: restoration.image,
        history: restoration.history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> DemoConfig {
        DemoConfig {
            width: 64,
            height: 8,
            chirp: ChirpParams {
                period: 20.0,
                ..ChirpParams::default()
            },
            psf_sigma: 1.5,
            psf_noise: 0.0,
            seed: 42,
            deconvolution: DeconvolutionConfig::with_iterations(10),
        }
    }

    #[test]
    fn test_demo_stages_have_expected_shape_and_scale() {
        let demo = run_chirp_demo(&small_config()).unwrap();

        for image in [&demo.chirp, &demo.psf, &demo.blurred, &demo.noisy, &demo.restored] {
            assert_eq!(image.dim(), (1, 8, 64));
        }
        let blurred_max = stats::max(demo.blurred.view()).unwrap();
        assert!((blurred_max - BLURRED_MAX).abs() < 1e-2);
        assert_eq!(demo.history.len(), 10);
        assert!(demo.restored.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_blur_reduces_contrast_of_fine_stripes() {
        let demo = run_chirp_demo(&small_config()).unwrap();

        // Right half carries the finest stripes
        let range = |image: &Array3<f32>| {
            let row = image.slice(ndarray::s![0, 4, 40..]);
            let lo = row.iter().cloned().fold(f32::INFINITY, f32::min);
            let hi = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            hi - lo
        };
        assert!(range(&demo.blurred) < range(&demo.chirp));
    }

    #[test]
    fn test_demo_survives_unscalable_blur() {
        // A zero-amplitude chirp with no offset blurs to all zeros
        let config = DemoConfig {
            chirp: ChirpParams {
                amplitude: 0.0,
                offset: 0.0,
                ..small_config().chirp
            },
            ..small_config()
        };
        let demo = run_chirp_demo(&config).unwrap();

        assert!(demo.blurred.iter().all(|v| v.abs() < 1e-3));
        assert!(demo.inverse_filtered.iter().all(|v| v.is_finite()));
        assert!(demo.restored.iter().all(|&v| v >= 0.0 && v.is_finite()));
    }

    #[test]
    fn test_demo_rejects_empty_size() {
        let config = DemoConfig {
            width: 0,
            ..small_config()
        };
        assert!(matches!(
            run_chirp_demo(&config),
            Err(RestorationError::InvalidConfig(_))
        ));
    }
}
