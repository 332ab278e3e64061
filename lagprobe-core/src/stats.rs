//! Descriptive statistics over latency samples.
//!
//! All functions take microsecond values as `f64` and return `0.0` for an
//! empty sample instead of `NaN`.

#![allow(clippy::cast_precision_loss)]

use crate::error::CoreError;
use std::fmt;
use std::str::FromStr;

pub fn arithmetic_mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Computed in log space so long samples of large values do not overflow.
/// Any zero (or negative) value yields `0.0`.
pub fn geometric_mean(xs: &[f64]) -> f64 {
    if xs.is_empty() || xs.iter().any(|&x| x <= 0.0) {
        return 0.0;
    }
    (xs.iter().map(|x| x.ln()).sum::<f64>() / xs.len() as f64).exp()
}

/// Any zero (or negative) value yields `0.0`.
pub fn harmonic_mean(xs: &[f64]) -> f64 {
    if xs.is_empty() || xs.iter().any(|&x| x <= 0.0) {
        return 0.0;
    }
    xs.len() as f64 / xs.iter().map(|x| 1.0 / x).sum::<f64>()
}

pub fn quadratic_mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    (xs.iter().map(|x| x * x).sum::<f64>() / xs.len() as f64).sqrt()
}

/// Population standard deviation (divides by `n`).
pub fn standard_deviation(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let mean = arithmetic_mean(xs);
    let variance = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / xs.len() as f64;
    variance.sqrt()
}

/// Standard deviation divided by the arithmetic mean.
///
/// `0.0` for empty and singleton samples and for a zero mean.
pub fn coefficient_of_variation(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let mean = arithmetic_mean(xs);
    if mean == 0.0 {
        return 0.0;
    }
    standard_deviation(xs) / mean
}

/// Mean used to collapse repeated samples of one endpoint into a single
/// measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeanAlgorithm {
    #[default]
    Arithmetic,
    Geometric,
    Harmonic,
    Quadratic,
}

impl MeanAlgorithm {
    pub const NAMES: [&'static str; 4] = ["arithmetic", "geometric", "harmonic", "quadratic"];

    pub fn mean(self, xs: &[f64]) -> f64 {
        match self {
            MeanAlgorithm::Arithmetic => arithmetic_mean(xs),
            MeanAlgorithm::Geometric => geometric_mean(xs),
            MeanAlgorithm::Harmonic => harmonic_mean(xs),
            MeanAlgorithm::Quadratic => quadratic_mean(xs),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MeanAlgorithm::Arithmetic => "arithmetic",
            MeanAlgorithm::Geometric => "geometric",
            MeanAlgorithm::Harmonic => "harmonic",
            MeanAlgorithm::Quadratic => "quadratic",
        }
    }
}

impl FromStr for MeanAlgorithm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arithmetic" => Ok(MeanAlgorithm::Arithmetic),
            "geometric" => Ok(MeanAlgorithm::Geometric),
            "harmonic" => Ok(MeanAlgorithm::Harmonic),
            "quadratic" => Ok(MeanAlgorithm::Quadratic),
            _ => Err(CoreError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for MeanAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
