//! Fourier-domain image math: convolution, inverse filtering, Wiener filtering.
//!
//! All operations assume periodic (circular) boundaries, which is what a
//! plain FFT implies. Images of any size are accepted; power-of-two sizes are
//! merely faster. PSFs are given in centred layout (peak at
//! `(depth/2, height/2, width/2)`) and are shifted to the origin internally,
//! so convolving with a centred delta returns the input unchanged.

use std::fmt;
use std::sync::Arc;

use ndarray::{Array1, Array3, ArrayView3, Axis, Zip};
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftDirection, FftPlanner};

use super::core::{center_to_origin, ensure_not_empty, ensure_same_shape};
use crate::error::{RestorationError, Result, Shape};

/// Complex spectrum of a `(depth, height, width)` image.
pub type Spectrum = Array3<Complex32>;

/// One plan per axis; `None` for axes of length 1, which are skipped.
type AxisPlans = [Option<Arc<dyn Fft<f32>>>; 3];

/// Forward and inverse FFT plans for one image shape.
#[derive(Clone)]
struct FftPlans {
    shape: Shape,
    forward: AxisPlans,
    inverse: AxisPlans,
}

impl FftPlans {
    fn new(shape: Shape) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            shape,
            forward: plan_axes(&mut planner, shape, FftDirection::Forward),
            inverse: plan_axes(&mut planner, shape, FftDirection::Inverse),
        }
    }

    /// Forward 3D FFT of a real image with this plan's shape.
    fn forward(&self, image: ArrayView3<f32>) -> Spectrum {
        let mut data = image.mapv(|v| Complex32::new(v, 0.0));
        transform(&mut data, &self.forward);
        data
    }

    /// Inverse 3D FFT, normalized by 1/N, keeping the real part.
    fn inverse(&self, mut spectrum: Spectrum) -> Array3<f32> {
        transform(&mut spectrum, &self.inverse);
        let norm = 1.0 / spectrum.len() as f32;
        spectrum.mapv(|c| c.re * norm)
    }
}

impl fmt::Debug for FftPlans {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftPlans").field("shape", &self.shape).finish()
    }
}

fn plan_axes(planner: &mut FftPlanner<f32>, shape: Shape, direction: FftDirection) -> AxisPlans {
    [shape.0, shape.1, shape.2].map(|len| (len > 1).then(|| planner.plan_fft(len, direction)))
}

fn transform(data: &mut Spectrum, plans: &AxisPlans) {
    for (axis, plan) in plans.iter().enumerate() {
        let Some(fft) = plan else { continue };

        Zip::from(data.lanes_mut(Axis(axis))).par_for_each(|mut lane| {
            let mut buffer: Vec<Complex32> = lane.iter().copied().collect();
            fft.process(&mut buffer);
            lane.assign(&Array1::from(buffer));
        });
    }
}

/// Forward 3D FFT of a real image. Axes of length 1 are skipped.
pub fn forward(image: ArrayView3<f32>) -> Spectrum {
    FftPlans::new(image.dim()).forward(image)
}

/// Inverse 3D FFT, normalized by 1/N, keeping the real part.
pub fn inverse(spectrum: Spectrum) -> Array3<f32> {
    FftPlans::new(spectrum.dim()).inverse(spectrum)
}

/// Optical transfer function of a PSF, computed once and reused.
///
/// The FFT plans for the PSF's shape are built here too, so repeated
/// convolutions (one per deconvolution iteration) do no planning.
#[derive(Debug, Clone)]
pub struct TransferFunction {
    spectrum: Spectrum,
    plans: FftPlans,
}

impl TransferFunction {
    /// Transform a centred PSF.
    pub fn from_psf(psf: ArrayView3<f32>) -> Result<Self> {
        ensure_not_empty(psf)?;
        let plans = FftPlans::new(psf.dim());
        let origin = center_to_origin(psf);
        Ok(Self {
            spectrum: plans.forward(origin.view()),
            plans,
        })
    }

    /// Shape of the images this transfer function applies to.
    pub fn shape(&self) -> Shape {
        self.spectrum.dim()
    }

    /// The complex spectrum `H`.
    pub fn spectrum(&self) -> &Spectrum {
        &self.spectrum
    }

    /// Circular convolution of `image` with the PSF: `F⁻¹(F(image) · H)`.
    pub fn convolve(&self, image: ArrayView3<f32>) -> Result<Array3<f32>> {
        ensure_same_shape(self.shape(), image)?;
        let mut spectrum = self.plans.forward(image);
        Zip::from(&mut spectrum)
            .and(&self.spectrum)
            .for_each(|f, &h| *f *= h);
        Ok(self.plans.inverse(spectrum))
    }

    /// Plain inverse filter: `F⁻¹(F(image) / H)`.
    ///
    /// Frequencies where `|H|²` underflows are set to zero instead of
    /// dividing by zero; a small noise floor on the PSF keeps that rare.
    pub fn inverse_filter(&self, image: ArrayView3<f32>) -> Result<Array3<f32>> {
        ensure_same_shape(self.shape(), image)?;
        let mut spectrum = self.plans.forward(image);
        Zip::from(&mut spectrum).and(&self.spectrum).for_each(|f, &h| {
            let power = h.norm_sqr();
            *f = if power > f32::MIN_POSITIVE {
                *f * h.conj() / power
            } else {
                Complex32::new(0.0, 0.0)
            };
        });
        Ok(self.plans.inverse(spectrum))
    }

    /// Wiener-regularized inverse filter: `F⁻¹(F(image) · H* / (|H|² + k))`.
    pub fn wiener_filter(&self, image: ArrayView3<f32>, k: f32) -> Result<Array3<f32>> {
        if !(k >= 0.0 && k.is_finite()) {
            return Err(RestorationError::InvalidConfig(format!(
                "Wiener constant must be finite and >= 0, got {k}"
            )));
        }
        ensure_same_shape(self.shape(), image)?;
        let mut spectrum = self.plans.forward(image);
        Zip::from(&mut spectrum).and(&self.spectrum).for_each(|f, &h| {
            let denom = h.norm_sqr() + k;
            *f = if denom > f32::MIN_POSITIVE {
                *f * h.conj() / denom
            } else {
                Complex32::new(0.0, 0.0)
            };
        });
        Ok(self.plans.inverse(spectrum))
    }
}

/// Convolve `image` with a centred `psf` of the same shape.
pub fn convolve(image: ArrayView3<f32>, psf: ArrayView3<f32>) -> Result<Array3<f32>> {
    ensure_same_shape(image.dim(), psf)?;
    TransferFunction::from_psf(psf)?.convolve(image)
}

/// Deconvolve `image` by direct Fourier division with `psf`.
pub fn inverse_filter(image: ArrayView3<f32>, psf: ArrayView3<f32>) -> Result<Array3<f32>> {
    ensure_same_shape(image.dim(), psf)?;
    TransferFunction::from_psf(psf)?.inverse_filter(image)
}

/// Deconvolve `image` with a Wiener-regularized inverse of `psf`.
pub fn wiener_filter(image: ArrayView3<f32>, psf: ArrayView3<f32>, k: f32) -> Result<Array3<f32>> {
    ensure_same_shape(image.dim(), psf)?;
    TransferFunction::from_psf(psf)?.wiener_filter(image, k)
}
