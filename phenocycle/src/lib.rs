//! Per-cycle phenological descriptors for vegetation index time series.
//!
//! A growth cycle is the stretch of a series between two successive local
//! minima. For each cycle this crate derives standing biomass, the
//! permanent (baseline) fraction, the active fraction and its temporal
//! barycenter and dispersion. Failures never abort a batch: they are
//! recorded on the [`CycleRecord`] as a [`CycleError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod baseline;
pub mod cycle;
pub mod decompose;
pub mod drill;
pub mod kernels;
pub mod moments;
pub mod series;
pub mod window;

pub use cycle::{
    CycleCurves, CycleError, CycleErrorKind, CycleRecord, CycleWarning, SeasonSummary,
};
pub use decompose::CombineRule;
pub use drill::{analyse_batch, analyse_location, BatchSummary, LocationAnalysis, LocationInput};
pub use series::{CycleBoundary, Sample, Series};

/// Historical buffer margin, as a fraction of the cycle length.
pub const DEFAULT_MARGIN_FACTOR: f64 = 2.0 / 3.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhenoError {
    #[error("series is empty")]
    EmptySeries,
    #[error("series timestamps are not strictly increasing at index {index}")]
    NonMonotonicSeries { index: usize },
    #[error("series has {times} timestamps but {values} values")]
    LengthMismatch { times: usize, values: usize },
    #[error("invalid cycle boundary: start {start} is not before end {end}")]
    InvalidBoundary { start: i64, end: i64 },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("season summary already attached to cycle")]
    SeasonAlreadyAttached,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CycleParams {
    /// Buffer added on both sides of a cycle, relative to its length.
    pub margin_factor: f64,
}

impl Default for CycleParams {
    fn default() -> Self {
        Self {
            margin_factor: DEFAULT_MARGIN_FACTOR,
        }
    }
}

impl CycleParams {
    pub fn validate(&self) -> Result<(), PhenoError> {
        if !self.margin_factor.is_finite() || self.margin_factor < 0.0 {
            return Err(PhenoError::InvalidParameter(format!(
                "margin_factor must be finite and >= 0, got {}",
                self.margin_factor
            )));
        }
        Ok(())
    }

    /// Parse and validate params from a JSON document. Missing keys take defaults.
    pub fn from_json(text: &str) -> Result<Self, PhenoError> {
        let params: CycleParams =
            serde_json::from_str(text).map_err(|e| PhenoError::InvalidParameter(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchParams {
    #[serde(flatten)]
    pub cycle: CycleParams,
    pub parallel: bool,
}

impl Default for BatchParams {
    fn default() -> Self {
        Self {
            cycle: CycleParams::default(),
            parallel: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_use_two_thirds_margin() {
        let params = CycleParams::default();
        assert!((params.margin_factor - 2.0 / 3.0).abs() < 1e-12);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn negative_margin_is_rejected() {
        let params = CycleParams { margin_factor: -0.2 };
        assert!(matches!(
            params.validate(),
            Err(PhenoError::InvalidParameter(_))
        ));
    }

    #[test]
    fn params_from_json_fills_defaults() {
        let params = CycleParams::from_json("{}").unwrap();
        assert_eq!(params, CycleParams::default());
        let params = CycleParams::from_json(r#"{"margin_factor": 0.2}"#).unwrap();
        assert!((params.margin_factor - 0.2).abs() < 1e-12);
        assert!(CycleParams::from_json(r#"{"margin_factor": "x"}"#).is_err());
    }

    #[test]
    fn batch_params_flatten_cycle_params() {
        let params: BatchParams =
            serde_json::from_str(r#"{"margin_factor": 0.2, "parallel": false}"#).unwrap();
        assert!(!params.parallel);
        assert!((params.cycle.margin_factor - 0.2).abs() < 1e-12);
    }
}
