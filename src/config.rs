//! Configuration for the iterative deconvolution engine.
//!
//! Every field has a default matching the classic reference run (additive
//! update, Gaussian smoothing every 5 iterations starting at iteration 0,
//! re-blurred estimate rescaled to the observed maximum), so a partial JSON
//! or YAML document only needs to name what it changes.

use serde::{Deserialize, Serialize};

use crate::error::{RestorationError, Result};

/// When, within an iteration, the periodic smoothing is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingStage {
    /// Smooth the current guess before it is re-blurred.
    BeforeUpdate,
    /// Smooth the corrected guess, before the non-negativity clamp.
    AfterUpdate,
}

/// Periodic Gaussian regularization of the guess.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingPolicy {
    /// Smooth when `iteration % period == 0`; `0` disables smoothing.
    pub period: usize,
    /// Lateral (x/y) Gaussian standard deviation in pixels.
    pub sigma: f32,
    /// Axial (z) standard deviation; `0.0` smooths each slice on its own.
    pub sigma_z: f32,
    /// Whether iteration 0 counts as a smoothing iteration.
    pub include_first: bool,
    pub stage: SmoothingStage,
}

impl Default for SmoothingPolicy {
    fn default() -> Self {
        Self {
            period: 5,
            sigma: 1.0,
            sigma_z: 0.0,
            include_first: true,
            stage: SmoothingStage::AfterUpdate,
        }
    }
}

impl SmoothingPolicy {
    /// Policy that never smooths.
    pub fn never() -> Self {
        Self {
            period: 0,
            ..Self::default()
        }
    }

    /// Smooth every `period` iterations with width `sigma`, otherwise defaults.
    pub fn every(period: usize, sigma: f32) -> Self {
        Self {
            period,
            sigma,
            ..Self::default()
        }
    }

    /// Whether smoothing runs on iteration `k`.
    pub fn applies_at(&self, k: usize) -> bool {
        if self.period == 0 || (self.sigma <= 0.0 && self.sigma_z <= 0.0) {
            return false;
        }
        k % self.period == 0 && (self.include_first || k > 0)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [("sigma", self.sigma), ("sigma_z", self.sigma_z)] {
            if !value.is_finite() || value < 0.0 {
                return Err(RestorationError::InvalidConfig(format!(
                    "smoothing {name} must be finite and >= 0, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// How the re-blurred estimate is brought back to the observed intensity scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescalePolicy {
    /// Scale so `max(O_k) == max(O)`.
    MatchObservedMax,
    /// Scale so `max(O_k)` equals a fixed value (10000 in the classic demo).
    FixedMax(f32),
    /// Use the convolution output as is.
    Off,
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeconvolutionConfig {
    /// Number of iterations `N`.
    pub iterations: usize,
    pub smoothing: SmoothingPolicy,
    pub rescale: RescalePolicy,
    /// Rescale the final result so its maximum equals this value.
    pub output_max: Option<f32>,
    /// Stop early once `max(|D_k|) / max(O)` drops below this fraction
    /// (0.001 in the classic Iterative Deconvolve 3D run).
    pub terminate: Option<f32>,
}

impl Default for DeconvolutionConfig {
    fn default() -> Self {
        Self {
            iterations: 50,
            smoothing: SmoothingPolicy::default(),
            rescale: RescalePolicy::MatchObservedMax,
            output_max: None,
            terminate: None,
        }
    }
}

impl DeconvolutionConfig {
    /// Default configuration with `iterations` iterations.
    pub fn with_iterations(iterations: usize) -> Self {
        Self {
            iterations,
            ..Self::default()
        }
    }

    /// Check that every numeric field is usable.
    pub fn validate(&self) -> Result<()> {
        self.smoothing.validate()?;

        if let RescalePolicy::FixedMax(target) = self.rescale {
            if !(target > 0.0 && target.is_finite()) {
                return Err(RestorationError::InvalidConfig(format!(
                    "rescale target must be positive and finite, got {target}"
                )));
            }
        }

        if let Some(max) = self.output_max {
            if !(max > 0.0 && max.is_finite()) {
                return Err(RestorationError::InvalidConfig(format!(
                    "output range must be positive and finite, got {max}"
                )));
            }
        }

        if let Some(fraction) = self.terminate {
            if !(fraction > 0.0 && fraction.is_finite()) {
                return Err(RestorationError::InvalidConfig(format!(
                    "terminate threshold must be positive and finite, got {fraction}"
                )));
            }
        }

        Ok(())
    }
}
