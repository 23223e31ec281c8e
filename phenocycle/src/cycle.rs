use std::fmt;

use chrono::{DateTime, Datelike, Duration, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::decompose::{self, CombineRule};
use crate::series::{CycleBoundary, Series};
use crate::window::CycleWindow;
use crate::{baseline, kernels, moments, CycleParams, PhenoError};

/// Why a single cycle could not be fully described.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CycleError {
    #[error("boundary error: {0}")]
    Boundary(String),
    #[error("interpolation error: {0}")]
    Interpolation(String),
    #[error("arithmetic error: {0}")]
    Arithmetic(String),
    #[error("variance domain error: sup {sup} < inf {inf}")]
    VarianceDomain { sup: f64, inf: f64 },
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CycleErrorKind {
    Boundary,
    Interpolation,
    Arithmetic,
    VarianceDomain,
}

impl CycleError {
    pub fn kind(&self) -> CycleErrorKind {
        match self {
            CycleError::Boundary(_) => CycleErrorKind::Boundary,
            CycleError::Interpolation(_) => CycleErrorKind::Interpolation,
            CycleError::Arithmetic(_) => CycleErrorKind::Arithmetic,
            CycleError::VarianceDomain { .. } => CycleErrorKind::VarianceDomain,
        }
    }
}

impl CycleErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleErrorKind::Boundary => "boundary",
            CycleErrorKind::Interpolation => "interpolation",
            CycleErrorKind::Arithmetic => "arithmetic",
            CycleErrorKind::VarianceDomain => "variance_domain",
        }
    }
}

impl fmt::Display for CycleErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal conditions noticed while describing a cycle.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CycleWarning {
    /// Baseline integral was not positive; the active fraction was built by addition.
    NonPositiveBaseline,
    /// The series does not cover the whole buffered window.
    TruncatedBuffer,
}

impl CycleWarning {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleWarning::NonPositiveBaseline => "non_positive_baseline",
            CycleWarning::TruncatedBuffer => "truncated_buffer",
        }
    }
}

impl fmt::Display for CycleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Season-level aggregates, written once by the season aggregation step.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SeasonSummary {
    pub start: i64,
    pub end: i64,
    pub length: i64,
    pub permanent_integral: f64,
    pub integral: f64,
    pub cyclic_fraction: f64,
    pub active_fraction: f64,
}

/// Intermediate curves of a cycle, co-indexed with its minimum-to-minimum window.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleCurves {
    pub times: Vec<i64>,
    pub observed: Vec<f64>,
    pub baseline: Array1<f64>,
    pub active: Array1<f64>,
}

/// Descriptors of one minimum-to-minimum growth cycle.
///
/// Stages run in order: window, standing biomass, baseline, active fraction,
/// barycenter, dispersion, maximum. The first failing stage stores its error
/// and leaves every later field unset.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleRecord {
    boundary: CycleBoundary,
    cycle_length: i64,
    margin: Option<f64>,
    standing_biomass: Option<f64>,
    baseline_integral: Option<f64>,
    combine_rule: Option<CombineRule>,
    active_fraction_integral: Option<f64>,
    barycenter_epoch: Option<f64>,
    barycenter_date: Option<DateTime<Utc>>,
    dispersion_seconds: Option<f64>,
    dispersion_duration: Option<Duration>,
    max_value_timestamp: Option<i64>,
    reference_year: Option<i32>,
    error: Option<CycleError>,
    warning: Option<CycleWarning>,
    season: Option<SeasonSummary>,
}

impl CycleRecord {
    fn empty(boundary: CycleBoundary) -> Self {
        Self {
            boundary,
            cycle_length: boundary.length(),
            margin: None,
            standing_biomass: None,
            baseline_integral: None,
            combine_rule: None,
            active_fraction_integral: None,
            barycenter_epoch: None,
            barycenter_date: None,
            dispersion_seconds: None,
            dispersion_duration: None,
            max_value_timestamp: None,
            reference_year: None,
            error: None,
            warning: None,
            season: None,
        }
    }

    /// Describe the cycle `boundary` of `series`. Never fails; see [`CycleRecord::error`].
    pub fn compute(series: &Series, boundary: CycleBoundary, params: &CycleParams) -> Self {
        Self::compute_detailed(series, boundary, params).0
    }

    /// Like [`CycleRecord::compute`], also returning the intermediate curves
    /// when the decomposition stage was reached.
    pub fn compute_detailed(
        series: &Series,
        boundary: CycleBoundary,
        params: &CycleParams,
    ) -> (Self, Option<CycleCurves>) {
        let mut record = Self::empty(boundary);
        let mut curves = None;
        match record.run(series, params, &mut curves) {
            Ok(()) => trace!(
                start = boundary.start,
                end = boundary.end,
                "cycle described"
            ),
            Err(err) => {
                debug!(
                    start = boundary.start,
                    end = boundary.end,
                    kind = %err.kind(),
                    "cycle left incomplete: {}",
                    err
                );
                record.error = Some(err);
            }
        }
        (record, curves)
    }

    fn run(
        &mut self,
        series: &Series,
        params: &CycleParams,
        curves: &mut Option<CycleCurves>,
    ) -> Result<(), CycleError> {
        let window = CycleWindow::extract(series, self.boundary, params.margin_factor)?;
        self.margin = Some(window.margin);
        if window.truncated {
            self.warn(CycleWarning::TruncatedBuffer);
        }
        let times = window.times();
        let observed = window.values();

        self.standing_biomass = Some(decompose::checked_integral(observed, "standing biomass")?);

        let permanent = baseline::permanent_fraction(times, observed)?;
        let baseline_integral = match permanent.as_slice() {
            Some(buf) => decompose::checked_integral(buf, "baseline")?,
            None => decompose::checked_integral(&permanent.to_vec(), "baseline")?,
        };
        self.baseline_integral = Some(baseline_integral);

        let rule = CombineRule::for_baseline_integral(baseline_integral);
        self.combine_rule = Some(rule);
        if rule == CombineRule::Add {
            self.warn(CycleWarning::NonPositiveBaseline);
        }
        let active = decompose::active_fraction(observed, &permanent, rule)?;
        let weights = active.to_vec();
        let total = decompose::checked_integral(&weights, "active fraction")?;
        self.active_fraction_integral = Some(total);
        *curves = Some(CycleCurves {
            times: times.to_vec(),
            observed: observed.to_vec(),
            baseline: permanent,
            active,
        });

        let cbc = moments::barycenter(times, &weights, total)?;
        self.barycenter_epoch = Some(cbc);
        let date = moments::to_datetime(cbc)?;
        self.barycenter_date = Some(date);

        let dispersion = moments::dispersion(times, &weights, total, cbc)?;
        self.dispersion_seconds = Some(dispersion.seconds);
        self.dispersion_duration = Some(moments::to_duration(dispersion.seconds)?);

        let idx = kernels::argmax_first(observed)
            .ok_or_else(|| CycleError::Arithmetic("no finite maximum in window".into()))?;
        self.max_value_timestamp = Some(times[idx]);
        self.reference_year = Some(date.year());
        Ok(())
    }

    fn warn(&mut self, warning: CycleWarning) {
        if self.warning.is_none() {
            self.warning = Some(warning);
        }
    }

    /// Store the season-level aggregates. Allowed exactly once.
    pub fn attach_season(&mut self, season: SeasonSummary) -> Result<(), PhenoError> {
        if self.season.is_some() {
            return Err(PhenoError::SeasonAlreadyAttached);
        }
        self.season = Some(season);
        Ok(())
    }

    pub fn boundary(&self) -> CycleBoundary {
        self.boundary
    }

    pub fn cycle_length(&self) -> i64 {
        self.cycle_length
    }

    pub fn margin(&self) -> Option<f64> {
        self.margin
    }

    pub fn standing_biomass(&self) -> Option<f64> {
        self.standing_biomass
    }

    pub fn baseline_integral(&self) -> Option<f64> {
        self.baseline_integral
    }

    pub fn combine_rule(&self) -> Option<CombineRule> {
        self.combine_rule
    }

    pub fn active_fraction_integral(&self) -> Option<f64> {
        self.active_fraction_integral
    }

    pub fn barycenter_epoch(&self) -> Option<f64> {
        self.barycenter_epoch
    }

    pub fn barycenter_date(&self) -> Option<DateTime<Utc>> {
        self.barycenter_date
    }

    pub fn dispersion_seconds(&self) -> Option<f64> {
        self.dispersion_seconds
    }

    pub fn dispersion_duration(&self) -> Option<Duration> {
        self.dispersion_duration
    }

    pub fn max_value_timestamp(&self) -> Option<i64> {
        self.max_value_timestamp
    }

    pub fn reference_year(&self) -> Option<i32> {
        self.reference_year
    }

    pub fn error(&self) -> Option<&CycleError> {
        self.error.as_ref()
    }

    pub fn error_flag(&self) -> bool {
        self.error.is_some()
    }

    pub fn warning(&self) -> Option<CycleWarning> {
        self.warning
    }

    pub fn season(&self) -> Option<&SeasonSummary> {
        self.season.as_ref()
    }
}
