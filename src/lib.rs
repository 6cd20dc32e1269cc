//! Restoration Rust Extensions
//!
//! Microscopy image restoration: Fourier-domain convolution, inverse
//! filtering and constrained iterative deconvolution, with Python bindings
//! via PyO3 and WASM bindings for JavaScript.
//!
//! ## Image Format
//! Images are `ndarray::Array3<f32>` shaped `(depth, height, width)`;
//! a 2D image has `depth == 1`. Samples are physical intensities (photons),
//! not normalized display values.
//!
//! ## Deconvolution
//! [`deconvolution::Deconvolver`] runs the additive (van Cittert) update
//! with periodic Gaussian smoothing and a non-negativity clamp after every
//! iteration. [`deconvolution::deconvolve`] is the one-call entry point.

pub mod config;
pub mod deconvolution;
pub mod demo;
pub mod error;
pub mod filters;
pub mod synth;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use config::{DeconvolutionConfig, RescalePolicy, SmoothingPolicy, SmoothingStage};
pub use deconvolution::{deconvolve, Deconvolver, IterationReport, Restoration};
pub use error::{RestorationError, Result};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use numpy::{IntoPyArray, PyArray3, PyReadonlyArray3};
    use pyo3::prelude::*;

    use crate::deconvolution;
    use crate::filters::{blur, fourier, noise};
    use crate::synth::{self, ChirpParams};

    // ========================================================================
    // Deconvolution
    // ========================================================================

    /// Constrained iterative deconvolution of a float32 (depth, height, width) image.
    ///
    /// # Arguments
    /// * `observed` - Blurred, noisy image
    /// * `psf` - Centred point-spread function, same shape as `observed`
    /// * `iterations` - Number of additive updates (must be >= 0)
    /// * `smooth_period` - Gaussian smoothing every N iterations (0 disables)
    /// * `smooth_sigma` - Smoothing width in pixels
    #[pyfunction]
    #[pyo3(signature = (observed, psf, iterations, smooth_period=5, smooth_sigma=1.0))]
    pub fn deconvolve<'py>(
        py: Python<'py>,
        observed: PyReadonlyArray3<'py, f32>,
        psf: PyReadonlyArray3<'py, f32>,
        iterations: i64,
        smooth_period: usize,
        smooth_sigma: f32,
    ) -> PyResult<Bound<'py, PyArray3<f32>>> {
        let result = deconvolution::deconvolve(
            observed.as_array(),
            psf.as_array(),
            iterations,
            smooth_period,
            smooth_sigma,
        )?;
        Ok(result.into_pyarray(py))
    }

    // ========================================================================
    // Fourier Domain Math
    // ========================================================================

    /// Circular convolution with a centred PSF.
    #[pyfunction]
    pub fn convolve<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        psf: PyReadonlyArray3<'py, f32>,
    ) -> PyResult<Bound<'py, PyArray3<f32>>> {
        let result = fourier::convolve(image.as_array(), psf.as_array())?;
        Ok(result.into_pyarray(py))
    }

    /// Plain inverse filter (Fourier division by the PSF).
    #[pyfunction]
    pub fn inverse_filter<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        psf: PyReadonlyArray3<'py, f32>,
    ) -> PyResult<Bound<'py, PyArray3<f32>>> {
        let result = fourier::inverse_filter(image.as_array(), psf.as_array())?;
        Ok(result.into_pyarray(py))
    }

    /// Wiener-regularized inverse filter.
    #[pyfunction]
    #[pyo3(signature = (image, psf, k=0.01))]
    pub fn wiener_filter<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        psf: PyReadonlyArray3<'py, f32>,
        k: f32,
    ) -> PyResult<Bound<'py, PyArray3<f32>>> {
        let result = fourier::wiener_filter(image.as_array(), psf.as_array(), k)?;
        Ok(result.into_pyarray(py))
    }

    // ========================================================================
    // Smoothing & Noise
    // ========================================================================

    #[pyfunction]
    #[pyo3(signature = (image, sigma, sigma_z=0.0))]
    pub fn gaussian_blur<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        sigma: f32,
        sigma_z: f32,
    ) -> Bound<'py, PyArray3<f32>> {
        let result = blur::gaussian_blur(image.as_array(), sigma, sigma_z);
        result.into_pyarray(py)
    }

    #[pyfunction]
    #[pyo3(signature = (image, std_dev, seed=0))]
    pub fn add_gaussian_noise<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        std_dev: f32,
        seed: u64,
    ) -> Bound<'py, PyArray3<f32>> {
        let result = noise::add_gaussian_noise(image.as_array(), std_dev, seed);
        result.into_pyarray(py)
    }

    #[pyfunction]
    #[pyo3(signature = (image, seed=0))]
    pub fn poisson_noise<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        seed: u64,
    ) -> Bound<'py, PyArray3<f32>> {
        let result = noise::poisson_noise(image.as_array(), seed);
        result.into_pyarray(py)
    }

    // ========================================================================
    // Test Data
    // ========================================================================

    /// Exponential chirp test image (1, height, width), 1-10001 photons.
    #[pyfunction]
    #[pyo3(signature = (width=512, height=512))]
    pub fn chirp_image<'py>(
        py: Python<'py>,
        width: usize,
        height: usize,
    ) -> Bound<'py, PyArray3<f32>> {
        let result = synth::chirp_image(width, height, &ChirpParams::default());
        result.into_pyarray(py)
    }

    /// Centred Gaussian PSF normalized to sum 1.
    #[pyfunction]
    #[pyo3(signature = (depth, height, width, sigma, sigma_z=0.0))]
    pub fn gaussian_psf<'py>(
        py: Python<'py>,
        depth: usize,
        height: usize,
        width: usize,
        sigma: f32,
        sigma_z: f32,
    ) -> Bound<'py, PyArray3<f32>> {
        let result = synth::gaussian_psf((depth, height, width), sigma, sigma_z);
        result.into_pyarray(py)
    }

    /// Restoration Rust extension module
    #[pymodule]
    pub fn restoration_rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
        // Deconvolution
        m.add_function(wrap_pyfunction!(deconvolve, m)?)?;

        // Fourier domain math
        m.add_function(wrap_pyfunction!(convolve, m)?)?;
        m.add_function(wrap_pyfunction!(inverse_filter, m)?)?;
        m.add_function(wrap_pyfunction!(wiener_filter, m)?)?;

        // Smoothing & noise
        m.add_function(wrap_pyfunction!(gaussian_blur, m)?)?;
        m.add_function(wrap_pyfunction!(add_gaussian_noise, m)?)?;
        m.add_function(wrap_pyfunction!(poisson_noise, m)?)?;

        // Test data
        m.add_function(wrap_pyfunction!(chirp_image, m)?)?;
        m.add_function(wrap_pyfunction!(gaussian_psf, m)?)?;

        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python::restoration_rust;
