//! Core utilities for the restoration filters.
//!
//! This module provides shared functionality used by multiple filters:
//! - Gaussian kernel generation
//! - Shape and finiteness validation
//! - PSF centre handling (centred layout <-> FFT origin layout)
//! - Flat buffer conversion for the bindings

use ndarray::{Array3, ArrayView3};

use crate::error::{RestorationError, Result, Shape};

/// Generate a 1D Gaussian kernel.
///
/// # Arguments
/// * `sigma` - Standard deviation of the Gaussian
///
/// # Returns
/// Normalized 1D kernel as Vec<f32>
pub fn gaussian_kernel_1d(sigma: f32) -> Vec<f32> {
    if sigma <= 0.0 {
        return vec![1.0];
    }

    // Kernel size = 6 sigma (covers 99.7% of distribution), ensure odd
    let kernel_size = ((sigma * 6.0).ceil() as usize) | 1;
    let half = kernel_size / 2;

    let mut kernel: Vec<f32> = (0..kernel_size)
        .map(|i| {
            let x = i as f32 - half as f32;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();

    // Normalize
    let sum: f32 = kernel.iter().sum();
    for v in kernel.iter_mut() {
        *v /= sum;
    }

    kernel
}

/// Centre index of an image, `(depth/2, height/2, width/2)`.
///
/// A PSF is expected to carry its peak here. A PSF whose only non-zero tap
/// sits at the centre is the identity kernel.
#[inline]
pub fn center_of(shape: Shape) -> Shape {
    (shape.0 / 2, shape.1 / 2, shape.2 / 2)
}

/// Circularly shift a centred kernel so its centre lands at index (0, 0, 0).
///
/// This is the layout FFT-based convolution needs so that the result is not
/// translated by half the image size.
pub fn center_to_origin(kernel: ArrayView3<f32>) -> Array3<f32> {
    let (depth, height, width) = kernel.dim();
    let (cz, cy, cx) = center_of(kernel.dim());

    Array3::from_shape_fn((depth, height, width), |(z, y, x)| {
        kernel[[(z + cz) % depth, (y + cy) % height, (x + cx) % width]]
    })
}

/// Fail with `EmptyImage` when any axis has length zero.
pub fn ensure_not_empty(image: ArrayView3<f32>) -> Result<()> {
    if image.is_empty() {
        return Err(RestorationError::EmptyImage);
    }
    Ok(())
}

/// Fail with `DimensionMismatch` unless `other` has the shape `expected`.
pub fn ensure_same_shape(expected: Shape, other: ArrayView3<f32>) -> Result<()> {
    if other.dim() != expected {
        return Err(RestorationError::DimensionMismatch {
            expected,
            actual: other.dim(),
        });
    }
    Ok(())
}

/// Fail with `NonFiniteInput` if any sample is NaN or infinite.
pub fn ensure_finite(image: ArrayView3<f32>, what: &'static str) -> Result<()> {
    if image.iter().any(|v| !v.is_finite()) {
        return Err(RestorationError::NonFiniteInput(what));
    }
    Ok(())
}

/// Wrap a flat row-major buffer as a `(depth, height, width)` image.
///
/// Dimensions whose product overflows `usize` are reported as an
/// `InvalidBuffer` with `expected == usize::MAX`.
pub fn image_from_flat(data: &[f32], width: usize, height: usize, depth: usize) -> Result<Array3<f32>> {
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(depth))
        .ok_or(RestorationError::InvalidBuffer {
            expected: usize::MAX,
            actual: data.len(),
        })?;
    if data.len() != expected {
        return Err(RestorationError::InvalidBuffer {
            expected,
            actual: data.len(),
        });
    }

    Array3::from_shape_vec((depth, height, width), data.to_vec()).map_err(|_| {
        RestorationError::InvalidBuffer {
            expected,
            actual: data.len(),
        }
    })
}

/// Flatten an image to a row-major buffer.
pub fn image_into_flat(image: Array3<f32>) -> Vec<f32> {
    if image.is_standard_layout() {
        image.into_raw_vec_and_offset().0
    } else {
        image.iter().copied().collect()
    }
}
