//! Allocation-free numeric kernels over contiguous buffers.
//!
//! These carry no state and take no locks; every cycle of every location can
//! call them concurrently. Timestamps are shifted by an `origin` before they
//! are weighted so that the squared terms of the second moment stay small.

/// Discrete integral of a curve: the plain sum of its samples.
#[inline]
pub fn integral(values: &[f64]) -> f64 {
    values.iter().sum()
}

/// Straight line through the first and last samples, evaluated at `times`.
///
/// `out[0]` and `out[n - 1]` receive `first` and `last` unchanged; interior
/// points are linearly interpolated in time. Requires `times.len() >= 2`,
/// `out.len() == times.len()` and distinct end timestamps.
#[inline]
pub fn line_fill(times: &[i64], first: f64, last: f64, out: &mut [f64]) {
    debug_assert_eq!(times.len(), out.len());
    let n = times.len();
    if n == 0 {
        return;
    }
    let t0 = times[0];
    let slope = if n > 1 && times[n - 1] != t0 {
        (last - first) / (times[n - 1] - t0) as f64
    } else {
        0.0
    };
    for (slot, &t) in out.iter_mut().zip(times.iter()) {
        *slot = first + slope * (t - t0) as f64;
    }
    out[0] = first;
    if n > 1 {
        out[n - 1] = last;
    }
}

/// Weighted mean time, `origin + sum((t - origin) * w) / total`.
#[inline]
pub fn weighted_barycenter(times: &[i64], weights: &[f64], total: f64, origin: i64) -> f64 {
    let num: f64 = times
        .iter()
        .zip(weights.iter())
        .map(|(&t, &w)| (t - origin) as f64 * w)
        .sum();
    origin as f64 + num / total
}

/// Weighted second moment about `origin`, `sum((t - origin)^2 * w) / total`.
#[inline]
pub fn weighted_second_moment(times: &[i64], weights: &[f64], total: f64, origin: i64) -> f64 {
    let num: f64 = times
        .iter()
        .zip(weights.iter())
        .map(|(&t, &w)| {
            let dt = (t - origin) as f64;
            dt * dt * w
        })
        .sum();
    num / total
}

/// Index of the largest value, first occurrence on ties. NaN is skipped.
#[inline]
pub fn argmax_first(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((idx, v)),
        }
    }
    best.map(|(idx, _)| idx)
}
