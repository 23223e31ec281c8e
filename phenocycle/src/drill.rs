//! Per-location analysis and batch dispatch across locations.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::cycle::{CycleErrorKind, CycleRecord, CycleWarning};
use crate::series::{CycleBoundary, Series};
use crate::{BatchParams, CycleParams, PhenoError};

/// One location's series and the cycle boundaries detected on it.
#[derive(Clone, Debug)]
pub struct LocationInput {
    pub id: String,
    pub series: Series,
    pub boundaries: Vec<CycleBoundary>,
}

/// All cycles described for one location. Dropped at the end of the pass.
#[derive(Clone, Debug, PartialEq)]
pub struct LocationAnalysis {
    pub id: String,
    pub samples: usize,
    pub cycles: Vec<CycleRecord>,
}

impl LocationAnalysis {
    pub fn errored_cycles(&self) -> usize {
        self.cycles.iter().filter(|c| c.error_flag()).count()
    }

    pub fn complete_cycles(&self) -> impl Iterator<Item = &CycleRecord> {
        self.cycles.iter().filter(|c| !c.error_flag())
    }
}

pub fn analyse_location(
    id: &str,
    series: &Series,
    boundaries: &[CycleBoundary],
    params: &CycleParams,
) -> LocationAnalysis {
    let cycles: Vec<CycleRecord> = boundaries
        .iter()
        .map(|&boundary| CycleRecord::compute(series, boundary, params))
        .collect();
    let analysis = LocationAnalysis {
        id: id.to_string(),
        samples: series.len(),
        cycles,
    };
    let errored = analysis.errored_cycles();
    if errored > 0 {
        debug!(
            location = id,
            "{} of {} cycles incomplete",
            errored,
            analysis.cycles.len()
        );
    }
    analysis
}

/// Analyse every location, in parallel unless `params.parallel` is off.
/// Output order follows `inputs`.
pub fn analyse_batch(
    inputs: &[LocationInput],
    params: &BatchParams,
) -> Result<Vec<LocationAnalysis>, PhenoError> {
    params.cycle.validate()?;
    let run = |input: &LocationInput| {
        analyse_location(&input.id, &input.series, &input.boundaries, &params.cycle)
    };
    let out = if params.parallel {
        inputs.par_iter().map(run).collect()
    } else {
        inputs.iter().map(run).collect()
    };
    Ok(out)
}

/// Counts of complete, errored and warned cycles over a batch.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct BatchSummary {
    pub locations: usize,
    pub cycles: usize,
    pub complete: usize,
    pub errors: BTreeMap<CycleErrorKind, usize>,
    pub warnings: BTreeMap<CycleWarning, usize>,
}

impl BatchSummary {
    pub fn from_analyses(analyses: &[LocationAnalysis]) -> Self {
        let mut summary = BatchSummary {
            locations: analyses.len(),
            ..BatchSummary::default()
        };
        for cycle in analyses.iter().flat_map(|a| a.cycles.iter()) {
            summary.cycles += 1;
            match cycle.error() {
                Some(err) => *summary.errors.entry(err.kind()).or_insert(0) += 1,
                None => summary.complete += 1,
            }
            if let Some(warning) = cycle.warning() {
                *summary.warnings.entry(warning).or_insert(0) += 1;
            }
        }
        summary
    }

    pub fn errored(&self) -> usize {
        self.errors.values().sum()
    }
}
