//! Synthetic test data: the exponential chirp target and Gaussian PSFs.
//!
//! The chirp has identical contrast at every stripe spacing, which makes the
//! frequency-dependent contrast loss caused by blurring (and its recovery by
//! deconvolution) visible along any horizontal line profile.

use std::f32::consts::PI;

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::error::Shape;
use crate::filters::core::center_of;
use crate::filters::stats;

/// Parameters of the exponential chirp `sin(2π·f0·k^t·t)` with `t = x / period`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChirpParams {
    /// Starting spatial frequency.
    pub f0: f32,
    /// Exponential growth base of the frequency.
    pub k: f32,
    /// Pixels per unit of `t`.
    pub period: f32,
    /// Half the peak-to-peak range, in photons.
    pub amplitude: f32,
    /// Added to every sample so the minimum stays positive.
    pub offset: f32,
}

impl Default for ChirpParams {
    fn default() -> Self {
        Self {
            f0: 0.1,
            k: 3.0,
            // avoids a sharp discontinuity at the right edge of a 512 wide image
            period: 149.8,
            amplitude: 5000.0,
            offset: 1.0,
        }
    }
}

/// Generate a 2D exponential chirp image of shape `(1, height, width)`.
///
/// With default parameters samples span 1 to 10001 photons regardless of
/// stripe spacing, and every row is identical.
pub fn chirp_image(width: usize, height: usize, params: &ChirpParams) -> Array3<f32> {
    let row: Vec<f32> = (0..width)
        .map(|x| {
            let t = x as f32 / params.period;
            let v = (2.0 * PI * params.f0 * (params.k.powf(t) * t)).sin();
            (v + 1.0) * params.amplitude + params.offset
        })
        .collect();

    Array3::from_shape_fn((1, height, width), |(_, _, x)| row[x])
}

/// Generate a centred Gaussian PSF normalized to a sum of 1.
///
/// # Arguments
/// * `shape` - `(depth, height, width)` of the image it will be used with
/// * `sigma_xy` - Lateral standard deviation in pixels
/// * `sigma_z` - Axial standard deviation in pixels; `<= 0` gives a PSF
///   confined to the central slice
pub fn gaussian_psf(shape: Shape, sigma_xy: f32, sigma_z: f32) -> Array3<f32> {
    let (cz, cy, cx) = center_of(shape);

    let weight = |d: f32, sigma: f32| -> f32 {
        if sigma > 0.0 {
            (-d * d / (2.0 * sigma * sigma)).exp()
        } else if d == 0.0 {
            1.0
        } else {
            0.0
        }
    };

    let mut psf = Array3::from_shape_fn(shape, |(z, y, x)| {
        let dz = z as f32 - cz as f32;
        let dy = y as f32 - cy as f32;
        let dx = x as f32 - cx as f32;
        weight(dz, sigma_z) * weight(dy, sigma_xy) * weight(dx, sigma_xy)
    });

    stats::normalize_sum(&mut psf);
    psf
}
