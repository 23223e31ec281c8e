use std::ops::Range;

use crate::cycle::CycleError;
use crate::series::{CycleBoundary, Series};

/// Borrowed views of one cycle inside its owning series.
#[derive(Clone, Debug)]
pub struct CycleWindow<'a> {
    pub boundary: CycleBoundary,
    /// `end - start` in seconds.
    pub cycle_length: i64,
    /// Buffer applied on both sides, in seconds.
    pub margin: f64,
    buffered_times: &'a [i64],
    buffered_values: &'a [f64],
    min_min: Range<usize>,
    /// The series ends before the buffered window does, on either side.
    pub truncated: bool,
}

impl<'a> CycleWindow<'a> {
    /// Slice `series` to `[start - margin, end + margin]`, then the buffer to `[start, end]`.
    pub fn extract(
        series: &'a Series,
        boundary: CycleBoundary,
        margin_factor: f64,
    ) -> Result<Self, CycleError> {
        let cycle_length = boundary.length();
        if cycle_length <= 0 {
            return Err(CycleError::Boundary(format!(
                "start {} is not before end {}",
                boundary.start, boundary.end
            )));
        }
        let margin = cycle_length as f64 * margin_factor;
        let lo = boundary.start as f64 - margin;
        let hi = boundary.end as f64 + margin;

        let buffered = series.range_between(lo, hi);
        let buffered_times = &series.times()[buffered.clone()];
        let buffered_values = &series.values()[buffered];

        let start = buffered_times.partition_point(|&t| t < boundary.start);
        let end = buffered_times.partition_point(|&t| t <= boundary.end);
        if start >= end {
            return Err(CycleError::Boundary(format!(
                "no samples between {} and {}",
                boundary.start, boundary.end
            )));
        }

        let truncated = (series.first_time() as f64) > lo || (series.last_time() as f64) < hi;

        Ok(Self {
            boundary,
            cycle_length,
            margin,
            buffered_times,
            buffered_values,
            min_min: start..end,
            truncated,
        })
    }

    pub fn buffered_times(&self) -> &'a [i64] {
        self.buffered_times
    }

    pub fn buffered_values(&self) -> &'a [f64] {
        self.buffered_values
    }

    pub fn times(&self) -> &'a [i64] {
        &self.buffered_times[self.min_min.clone()]
    }

    pub fn values(&self) -> &'a [f64] {
        &self.buffered_values[self.min_min.clone()]
    }

    pub fn len(&self) -> usize {
        self.min_min.len()
    }

    pub fn is_empty(&self) -> bool {
        self.min_min.is_empty()
    }
}
