//! Filter modules used by the restoration pipeline.
//!
//! ## Image Format
//!
//! | Shape | Type | Description |
//! |-------|------|-------------|
//! | (1, H, W) | f32 | 2D image, physical intensity units |
//! | (D, H, W) | f32 | 3D stack, D slices |
//!
//! PSFs share the image's shape and carry their peak at the centre index
//! `(D/2, H/2, W/2)`.
//!
//! ## Filter Categories
//!
//! - **Statistics**: min/max, sums, rescaling, non-negativity clamp
//! - **Blur**: separable Gaussian smoothing (clamp-to-edge)
//! - **Fourier**: circular convolution, inverse filter, Wiener filter
//! - **Noise**: additive Gaussian, modulatory Poisson
//!
//! Lane-wise work (FFT passes, blur passes) runs in parallel with rayon.

pub mod core;
pub mod stats;
pub mod blur;
pub mod fourier;
pub mod noise;
