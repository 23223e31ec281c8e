use ndarray::Array1;

use crate::cycle::CycleError;
use crate::kernels;

/// Permanent fraction: the straight line joining the first and last samples
/// of a minimum-to-minimum window, co-indexed with it.
pub fn permanent_fraction(times: &[i64], values: &[f64]) -> Result<Array1<f64>, CycleError> {
    if times.len() != values.len() {
        return Err(CycleError::Interpolation(format!(
            "{} timestamps for {} values",
            times.len(),
            values.len()
        )));
    }
    let n = times.len();
    if n < 2 {
        return Err(CycleError::Interpolation(format!(
            "need at least 2 samples, got {n}"
        )));
    }
    if times[n - 1] == times[0] {
        return Err(CycleError::Interpolation(
            "window endpoints share a timestamp".into(),
        ));
    }

    let mut out = Array1::<f64>::zeros(n);
    // Freshly allocated 1-D arrays are contiguous.
    if let Some(buf) = out.as_slice_mut() {
        kernels::line_fill(times, values[0], values[n - 1], buf);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_point_midpoint() {
        let baseline = permanent_fraction(&[0, 5, 10], &[10.0, 99.0, 20.0]).unwrap();
        assert_eq!(baseline.to_vec(), vec![10.0, 15.0, 20.0]);
    }

    #[test]
    fn endpoints_are_copied() {
        let values = [0.1, 0.4, 0.9, 0.3, 0.2];
        let baseline = permanent_fraction(&[0, 7, 14, 21, 30], &values).unwrap();
        assert_eq!(baseline[0], 0.1);
        assert_eq!(baseline[4], 0.2);
    }

    #[test]
    fn single_sample_is_an_interpolation_error() {
        assert!(matches!(
            permanent_fraction(&[3], &[1.0]),
            Err(CycleError::Interpolation(_))
        ));
    }

    #[test]
    fn two_samples_are_copied_verbatim() {
        let baseline = permanent_fraction(&[0, 16], &[0.25, 0.5]).unwrap();
        assert_eq!(baseline.to_vec(), vec![0.25, 0.5]);
    }
}
