use serde::{Deserialize, Serialize};

use crate::PhenoError;

/// One observation: epoch seconds and index value.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    pub timestamp: i64,
    pub value: f64,
}

/// Regularly sampled index series with strictly increasing timestamps.
///
/// Times and values are stored as separate contiguous buffers so the numeric
/// kernels can run over plain slices.
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    times: Vec<i64>,
    values: Vec<f64>,
}

impl Series {
    pub fn new(times: Vec<i64>, values: Vec<f64>) -> Result<Self, PhenoError> {
        if times.len() != values.len() {
            return Err(PhenoError::LengthMismatch {
                times: times.len(),
                values: values.len(),
            });
        }
        if times.is_empty() {
            return Err(PhenoError::EmptySeries);
        }
        if let Some(pos) = times.windows(2).position(|w| w[1] <= w[0]) {
            return Err(PhenoError::NonMonotonicSeries { index: pos + 1 });
        }
        Ok(Self { times, values })
    }

    pub fn from_samples(samples: &[Sample]) -> Result<Self, PhenoError> {
        let (times, values) = samples.iter().map(|s| (s.timestamp, s.value)).unzip();
        Self::new(times, values)
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[i64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn first_time(&self) -> i64 {
        self.times[0]
    }

    pub fn last_time(&self) -> i64 {
        self.times[self.times.len() - 1]
    }

    /// Index range of samples with `lo <= t <= hi`.
    pub(crate) fn range_between(&self, lo: f64, hi: f64) -> std::ops::Range<usize> {
        let start = self.times.partition_point(|&t| (t as f64) < lo);
        let end = self.times.partition_point(|&t| (t as f64) <= hi);
        start..end.max(start)
    }

    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.times
            .iter()
            .zip(self.values.iter())
            .map(|(&timestamp, &value)| Sample { timestamp, value })
    }
}

/// Start and end of one minimum-to-minimum cycle, in epoch seconds.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CycleBoundary {
    pub start: i64,
    pub end: i64,
}

impl CycleBoundary {
    pub fn new(start: i64, end: i64) -> Result<Self, PhenoError> {
        if start >= end {
            return Err(PhenoError::InvalidBoundary { start, end });
        }
        Ok(Self { start, end })
    }

    /// Cycle length in seconds. Non-positive for a malformed boundary.
    pub fn length(&self) -> i64 {
        self.end - self.start
    }
}
