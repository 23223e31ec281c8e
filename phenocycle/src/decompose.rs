use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::cycle::CycleError;
use crate::kernels;

/// How the permanent fraction is combined with the observed curve.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CombineRule {
    /// `observed - baseline`, used when the baseline integral is positive.
    Subtract,
    /// `observed + baseline`, used when the baseline integral is zero or negative.
    Add,
}

impl CombineRule {
    pub fn for_baseline_integral(integral: f64) -> Self {
        if integral > 0.0 {
            CombineRule::Subtract
        } else {
            CombineRule::Add
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CombineRule::Subtract => "subtract",
            CombineRule::Add => "add",
        }
    }
}

/// Sum of `values`, rejecting NaN and infinities.
pub fn checked_integral(values: &[f64], what: &str) -> Result<f64, CycleError> {
    let total = kernels::integral(values);
    if total.is_finite() {
        Ok(total)
    } else {
        Err(CycleError::Arithmetic(format!("{what} integral is {total}")))
    }
}

/// Residual seasonal signal once the permanent fraction is removed.
pub fn active_fraction(
    observed: &[f64],
    baseline: &Array1<f64>,
    rule: CombineRule,
) -> Result<Array1<f64>, CycleError> {
    if observed.len() != baseline.len() {
        return Err(CycleError::Arithmetic(format!(
            "observed has {} samples, baseline has {}",
            observed.len(),
            baseline.len()
        )));
    }
    let observed = ArrayView1::from(observed);
    Ok(match rule {
        CombineRule::Subtract => &observed - baseline,
        CombineRule::Add => &observed + baseline,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn positive_baseline_subtracts() {
        let baseline = array![5.0, 5.0, 5.0, 5.0, 5.0];
        let integral = checked_integral(baseline.as_slice().unwrap(), "baseline").unwrap();
        let rule = CombineRule::for_baseline_integral(integral);
        assert_eq!(rule, CombineRule::Subtract);
        let active = active_fraction(&[5.0, 20.0, 30.0, 10.0, 5.0], &baseline, rule).unwrap();
        assert_eq!(active.to_vec(), vec![0.0, 15.0, 25.0, 5.0, 0.0]);
    }

    #[test]
    fn negative_baseline_adds() {
        let baseline = array![-2.0, -3.0, -4.0];
        let rule = CombineRule::for_baseline_integral(-9.0);
        assert_eq!(rule, CombineRule::Add);
        let active = active_fraction(&[-2.0, 1.0, -4.0], &baseline, rule).unwrap();
        assert_eq!(active.to_vec(), vec![-4.0, -2.0, -8.0]);
    }

    #[test]
    fn zero_baseline_takes_addition_branch() {
        assert_eq!(CombineRule::for_baseline_integral(0.0), CombineRule::Add);
        assert_eq!(CombineRule::for_baseline_integral(-0.0), CombineRule::Add);
    }

    #[test]
    fn nan_integral_is_arithmetic_error() {
        assert!(matches!(
            checked_integral(&[1.0, f64::NAN], "standing biomass"),
            Err(CycleError::Arithmetic(_))
        ));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let baseline = array![1.0, 1.0];
        assert!(active_fraction(&[1.0, 2.0, 3.0], &baseline, CombineRule::Add).is_err());
    }
}
