//! Image statistics and intensity scaling.
//!
//! Min/max, sums and the rescaling helpers the deconvolution loop uses to
//! keep the re-blurred estimate on the observed image's intensity scale, plus
//! the non-negativity clamp.

use ndarray::{Array3, ArrayView3, Zip};
use rayon::prelude::*;

/// Minimum and maximum sample value.
///
/// Returns `None` for an empty image. NaN samples are ignored.
pub fn min_max(image: ArrayView3<f32>) -> Option<(f32, f32)> {
    image.iter().fold(None, |acc, &v| {
        if v.is_nan() {
            return acc;
        }
        match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        }
    })
}

/// Maximum sample value, `None` when empty.
pub fn max(image: ArrayView3<f32>) -> Option<f32> {
    min_max(image).map(|(_, hi)| hi)
}

/// Largest absolute sample value (0 for an empty image).
pub fn max_abs(image: ArrayView3<f32>) -> f32 {
    match image.as_slice_memory_order() {
        Some(samples) => samples
            .par_iter()
            .fold(|| 0.0f32, |acc, v| acc.max(v.abs()))
            .reduce(|| 0.0f32, f32::max),
        None => image.iter().fold(0.0f32, |acc, v| acc.max(v.abs())),
    }
}

/// Sum of all samples, accumulated in f64.
pub fn sum(image: ArrayView3<f32>) -> f64 {
    image.iter().map(|&v| v as f64).sum()
}

/// Multiply every sample by `factor` in place.
pub fn scale(image: &mut Array3<f32>, factor: f32) {
    image.mapv_inplace(|v| v * factor);
}

/// Rescale so the maximum sample equals `target_max`.
///
/// Returns `false` and leaves the image untouched when the current maximum is
/// not a positive finite number, since dividing by it would poison the data.
pub fn rescale_to_max(image: &mut Array3<f32>, target_max: f32) -> bool {
    match max(image.view()) {
        Some(current) if current > 0.0 && current.is_finite() => {
            scale(image, target_max / current);
            true
        }
        _ => false,
    }
}

/// Normalize so the samples sum to 1.
///
/// Returns `false` when the sum is zero or non-finite.
pub fn normalize_sum(image: &mut Array3<f32>) -> bool {
    let total = sum(image.view());
    if total == 0.0 || !total.is_finite() {
        return false;
    }
    scale(image, (1.0 / total) as f32);
    true
}

/// Set every negative sample to exactly zero.
///
/// Only samples below zero are written; an image that is already
/// non-negative is left bit-for-bit unchanged.
///
/// # Returns
/// Number of samples that were clamped.
pub fn clamp_non_negative(image: &mut Array3<f32>) -> usize {
    if let Some(samples) = image.as_slice_memory_order_mut() {
        return samples
            .par_iter_mut()
            .map(|v| {
                if *v < 0.0 {
                    *v = 0.0;
                    1usize
                } else {
                    0
                }
            })
            .sum();
    }

    let mut clamped = 0;
    Zip::from(image).for_each(|v| {
        if *v < 0.0 {
            *v = 0.0;
            clamped += 1;
        }
    });
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp() -> Array3<f32> {
        Array3::from_shape_fn((1, 3, 3), |(_, y, x)| (y * 3 + x) as f32 - 2.0)
    }

    #[test]
    fn test_min_max() {
        assert_eq!(min_max(ramp().view()), Some((-2.0, 6.0)));
        assert_eq!(min_max(Array3::<f32>::zeros((0, 3, 3)).view()), None);
    }

    #[test]
    fn test_max_abs() {
        let mut image = ramp();
        image[[0, 0, 0]] = -9.0;
        assert_eq!(max_abs(image.view()), 9.0);
    }

    #[test]
    fn test_rescale_to_max() {
        let mut image = ramp();
        assert!(rescale_to_max(&mut image, 10000.0));
        assert_relative_eq!(max(image.view()).unwrap(), 10000.0);
        assert_relative_eq!(image[[0, 0, 0]], -2.0 * 10000.0 / 6.0, epsilon = 1e-2);
    }

    #[test]
    fn test_rescale_to_max_skips_non_positive_max() {
        let mut image = Array3::<f32>::from_elem((1, 2, 2), -1.0);
        let before = image.clone();
        assert!(!rescale_to_max(&mut image, 100.0));
        assert_eq!(image, before);

        let mut zeros = Array3::<f32>::zeros((1, 2, 2));
        assert!(!rescale_to_max(&mut zeros, 100.0));
    }

    #[test]
    fn test_normalize_sum() {
        let mut image = Array3::<f32>::from_elem((2, 2, 2), 3.0);
        assert!(normalize_sum(&mut image));
        assert_relative_eq!(sum(image.view()), 1.0, epsilon = 1e-6);

        let mut zeros = Array3::<f32>::zeros((1, 2, 2));
        assert!(!normalize_sum(&mut zeros));
    }

    #[test]
    fn test_clamp_sets_negatives_to_zero() {
        let mut image = ramp();
        let clamped = clamp_non_negative(&mut image);

        assert_eq!(clamped, 2);
        assert_eq!(image[[0, 0, 0]], 0.0);
        assert_eq!(image[[0, 0, 1]], 0.0);
        assert_eq!(image[[0, 0, 2]], 0.0);
        assert_eq!(image[[0, 2, 2]], 6.0);
    }

    #[test]
    fn test_clamp_with_reversed_axis() {
        // Memory order no longer matches logical order
        let mut image = ramp();
        image.invert_axis(ndarray::Axis(2));
        let clamped = clamp_non_negative(&mut image);

        assert_eq!(clamped, 2);
        assert!(image.iter().all(|&v| v >= 0.0));
        assert_eq!(max_abs(image.view()), 6.0);
    }

    #[test]
    fn test_max_abs_of_large_image() {
        let mut image = Array3::<f32>::from_elem((4, 64, 64), 1.5);
        image[[3, 17, 40]] = -250.0;
        assert_eq!(max_abs(image.view()), 250.0);
        assert_eq!(max_abs(Array3::<f32>::zeros((0, 2, 2)).view()), 0.0);
    }

    #[test]
    fn test_clamp_is_noop_without_negatives() {
        let mut image = Array3::from_shape_fn((2, 3, 3), |(z, y, x)| (z + y * x) as f32 * 0.37);
        let before: Vec<u32> = image.iter().map(|v| v.to_bits()).collect();

        assert_eq!(clamp_non_negative(&mut image), 0);

        let after: Vec<u32> = image.iter().map(|v| v.to_bits()).collect();
        assert_eq!(before, after);
    }
}
