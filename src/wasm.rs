//! WebAssembly exports for the restoration filters.
//!
//! These functions are exposed to JavaScript via wasm-bindgen.
//!
//! ## Buffer Layout
//!
//! Images cross the boundary as flat row-major `Float32Array`s of length
//! `width * height * depth`, slice after slice. Errors are returned as
//! JavaScript strings.

use wasm_bindgen::prelude::*;

use crate::deconvolution;
use crate::error::RestorationError;
use crate::filters::core::{image_from_flat, image_into_flat};
use crate::filters::fourier;
use crate::synth::{self, ChirpParams};

fn to_js(err: RestorationError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

// ============================================================================
// Deconvolution
// ============================================================================

/// Constrained iterative deconvolution.
///
/// # Arguments
/// * `observed` - Flat observed image
/// * `psf` - Flat centred PSF with the same dimensions
/// * `width`, `height`, `depth` - Image dimensions (`depth = 1` for 2D)
/// * `iterations` - Number of iterations (must be >= 0)
/// * `smooth_period` - Smooth every N iterations (0 disables)
/// * `smooth_sigma` - Gaussian smoothing width in pixels
///
/// # Returns
/// Flat restored image
#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn deconvolve_wasm(
    observed: &[f32],
    psf: &[f32],
    width: usize,
    height: usize,
    depth: usize,
    iterations: i32,
    smooth_period: usize,
    smooth_sigma: f32,
) -> Result<Vec<f32>, JsValue> {
    let observed = image_from_flat(observed, width, height, depth).map_err(to_js)?;
    let psf = image_from_flat(psf, width, height, depth).map_err(to_js)?;

    let result = deconvolution::deconvolve(
        observed.view(),
        psf.view(),
        iterations as i64,
        smooth_period,
        smooth_sigma,
    )
    .map_err(to_js)?;
    Ok(image_into_flat(result))
}

// ============================================================================
// Fourier Domain Math
// ============================================================================

/// Circular convolution with a centred PSF.
#[wasm_bindgen]
pub fn convolve_wasm(
    image: &[f32],
    psf: &[f32],
    width: usize,
    height: usize,
    depth: usize,
) -> Result<Vec<f32>, JsValue> {
    let image = image_from_flat(image, width, height, depth).map_err(to_js)?;
    let psf = image_from_flat(psf, width, height, depth).map_err(to_js)?;

    let result = fourier::convolve(image.view(), psf.view()).map_err(to_js)?;
    Ok(image_into_flat(result))
}

// ============================================================================
// Test Data
// ============================================================================

/// Exponential chirp test image, 1-10001 photons.
#[wasm_bindgen]
pub fn chirp_image_wasm(width: usize, height: usize) -> Vec<f32> {
    image_into_flat(synth::chirp_image(width, height, &ChirpParams::default()))
}

/// Centred Gaussian PSF normalized to sum 1.
#[wasm_bindgen]
pub fn gaussian_psf_wasm(
    width: usize,
    height: usize,
    depth: usize,
    sigma: f32,
    sigma_z: f32,
) -> Vec<f32> {
    image_into_flat(synth::gaussian_psf((depth, height, width), sigma, sigma_z))
}
