//! Gaussian smoothing for 2D and 3D float images.
//!
//! Separable convolution with one 1D pass per axis. Edges are handled by
//! clamping the sample index to the image border, so a constant image stays
//! constant. Lanes along each axis are processed in parallel with rayon.

use ndarray::{Array3, ArrayView3, Axis, Zip};

use super::core::gaussian_kernel_1d;

/// Apply Gaussian blur to a `(depth, height, width)` image.
///
/// # Arguments
/// * `image` - Input image
/// * `sigma_xy` - Standard deviation along x and y, in pixels
/// * `sigma_z` - Standard deviation along z; `0.0` blurs each slice on its own
///
/// # Returns
/// Blurred image with the same dimensions
pub fn gaussian_blur(image: ArrayView3<f32>, sigma_xy: f32, sigma_z: f32) -> Array3<f32> {
    let mut result = image.to_owned();

    if sigma_xy > 0.0 {
        let kernel = gaussian_kernel_1d(sigma_xy);
        // Horizontal pass
        result = blur_axis(result.view(), Axis(2), &kernel);
        // Vertical pass
        result = blur_axis(result.view(), Axis(1), &kernel);
    }

    if sigma_z > 0.0 && image.len_of(Axis(0)) > 1 {
        let kernel = gaussian_kernel_1d(sigma_z);
        result = blur_axis(result.view(), Axis(0), &kernel);
    }

    result
}

fn blur_axis(input: ArrayView3<f32>, axis: Axis, kernel: &[f32]) -> Array3<f32> {
    let mut output = Array3::<f32>::zeros(input.raw_dim());
    let half = kernel.len() / 2;

    Zip::from(output.lanes_mut(axis))
        .and(input.lanes(axis))
        .par_for_each(|mut dst, src| {
            let len = src.len();
            for i in 0..len {
                let mut sum = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let si = (i as isize + ki as isize - half as isize)
                        .clamp(0, len as isize - 1) as usize;
                    sum += src[si] * kv;
                }
                dst[i] = sum;
            }
        });

    output
}
