//! Value-weighted temporal moments of the active fraction.
//!
//! The barycenter is the weighted mean time of the active signal and the
//! dispersion its weighted standard deviation in seconds, computed as
//! `sqrt(sup - inf)` with `sup` the weighted mean of squared times and `inf`
//! the squared barycenter. Both moments are taken about the first timestamp
//! of the window; the variance is unchanged by the shift.

use chrono::{DateTime, Duration, Utc};

use crate::cycle::CycleError;
use crate::kernels;

/// Terms of the dispersion computation, relative to the window origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dispersion {
    pub sup: f64,
    pub inf: f64,
    pub seconds: f64,
}

fn check_total(total: f64) -> Result<(), CycleError> {
    if total == 0.0 || !total.is_finite() {
        return Err(CycleError::Arithmetic(format!(
            "active fraction integral is {total}"
        )));
    }
    Ok(())
}

/// Weighted mean timestamp (epoch seconds) of `weights` over `times`.
pub fn barycenter(times: &[i64], weights: &[f64], total: f64) -> Result<f64, CycleError> {
    check_total(total)?;
    let Some(&origin) = times.first() else {
        return Err(CycleError::Arithmetic("empty window".into()));
    };
    let cbc = kernels::weighted_barycenter(times, weights, total, origin);
    if !cbc.is_finite() {
        return Err(CycleError::Arithmetic(format!("barycenter is {cbc}")));
    }
    if cbc <= 0.0 {
        return Err(CycleError::Arithmetic(format!(
            "barycenter {cbc} is not positive"
        )));
    }
    Ok(cbc)
}

/// Weighted standard deviation in seconds around `cbc`.
///
/// Fails with [`CycleError::VarianceDomain`] when `sup < inf`, which only
/// happens with negative weights or rounding; no value is produced then.
pub fn dispersion(
    times: &[i64],
    weights: &[f64],
    total: f64,
    cbc: f64,
) -> Result<Dispersion, CycleError> {
    check_total(total)?;
    let Some(&origin) = times.first() else {
        return Err(CycleError::Arithmetic("empty window".into()));
    };
    let sup = kernels::weighted_second_moment(times, weights, total, origin);
    let shifted = cbc - origin as f64;
    let inf = shifted * shifted;
    if !sup.is_finite() || !inf.is_finite() {
        return Err(CycleError::Arithmetic(format!(
            "dispersion terms are not finite (sup {sup}, inf {inf})"
        )));
    }
    if sup < inf {
        return Err(CycleError::VarianceDomain { sup, inf });
    }
    Ok(Dispersion {
        sup,
        inf,
        seconds: (sup - inf).sqrt(),
    })
}

fn split_seconds(seconds: f64) -> (i64, u32) {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0);
    (whole as i64, nanos as u32)
}

/// Calendar instant for fractional epoch seconds.
pub fn to_datetime(seconds: f64) -> Result<DateTime<Utc>, CycleError> {
    if !seconds.is_finite() || seconds.abs() > i64::MAX as f64 / 2.0 {
        return Err(CycleError::Arithmetic(format!(
            "{seconds} s is outside the calendar range"
        )));
    }
    let (secs, nanos) = split_seconds(seconds);
    DateTime::<Utc>::from_timestamp(secs, nanos).ok_or_else(|| {
        CycleError::Arithmetic(format!("{seconds} s is outside the calendar range"))
    })
}

/// Time span for fractional seconds.
pub fn to_duration(seconds: f64) -> Result<Duration, CycleError> {
    if !seconds.is_finite() || seconds.abs() > i64::MAX as f64 / 2.0 {
        return Err(CycleError::Arithmetic(format!(
            "{seconds} s is not a representable duration"
        )));
    }
    let (secs, nanos) = split_seconds(seconds);
    Duration::try_seconds(secs)
        .and_then(|d| d.checked_add(&Duration::nanoseconds(i64::from(nanos))))
        .ok_or_else(|| {
            CycleError::Arithmetic(format!("{seconds} s is not a representable duration"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Datelike, TimeZone};

    const TIMES: [i64; 5] = [0, 1, 2, 3, 4];
    const ACTIVE: [f64; 5] = [0.0, 15.0, 25.0, 5.0, 0.0];

    #[test]
    fn barycenter_of_reference_cycle() {
        let cbc = barycenter(&TIMES, &ACTIVE, 45.0).unwrap();
        assert_relative_eq!(cbc, 80.0 / 45.0, max_relative = 1e-12);
    }

    #[test]
    fn dispersion_squared_equals_sup_minus_inf() {
        let cbc = barycenter(&TIMES, &ACTIVE, 45.0).unwrap();
        let d = dispersion(&TIMES, &ACTIVE, 45.0, cbc).unwrap();
        assert_relative_eq!(d.sup, 160.0 / 45.0, max_relative = 1e-12);
        assert_relative_eq!(d.inf, cbc * cbc, max_relative = 1e-12);
        assert_relative_eq!(d.seconds * d.seconds, d.sup - d.inf, max_relative = 1e-12);
        assert!((d.seconds - 0.63).abs() < 0.005);
    }

    #[test]
    fn zero_integral_is_arithmetic_error() {
        assert!(matches!(
            barycenter(&TIMES, &[0.0; 5], 0.0),
            Err(CycleError::Arithmetic(_))
        ));
    }

    #[test]
    fn non_positive_barycenter_is_rejected() {
        let times = [-20, -10, 0];
        assert!(matches!(
            barycenter(&times, &[1.0, 1.0, 1.0], 3.0),
            Err(CycleError::Arithmetic(_))
        ));
    }

    #[test]
    fn negative_weights_can_break_the_variance_domain() {
        // Positive total, but the negative mass pulls the barycenter outside
        // the support and sup falls below inf.
        let times = [100, 101, 102];
        let weights = [-1.0, 0.0, 2.0];
        let cbc = barycenter(&times, &weights, 1.0).unwrap();
        assert_relative_eq!(cbc, 104.0);
        let err = dispersion(&times, &weights, 1.0, cbc).unwrap_err();
        match err {
            CycleError::VarianceDomain { sup, inf } => assert!(sup < inf),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn real_epoch_dispersion_is_stable() {
        // Symmetric triangle over 9 daily samples.
        let start = 1_577_836_800; // 2020-01-01
        let times: Vec<i64> = (0..9).map(|i| start + i * 86_400).collect();
        let weights = [0.0, 1.0, 2.0, 3.0, 4.0, 3.0, 2.0, 1.0, 0.0];
        let total: f64 = weights.iter().sum();
        let cbc = barycenter(&times, &weights, total).unwrap();
        assert_relative_eq!(cbc, (start + 4 * 86_400) as f64);
        let d = dispersion(&times, &weights, total, cbc).unwrap();
        // variance in days^2 = 2 * (1*9 + 2*4 + 3*1) / 16 = 2.5
        assert_relative_eq!(d.seconds, 2.5f64.sqrt() * 86_400.0, max_relative = 1e-9);
    }

    #[test]
    fn date_and_duration_conversions() {
        let date = to_datetime(1_577_836_800.5).unwrap();
        assert_eq!(date.year(), 2020);
        assert_eq!(
            date,
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap() + Duration::milliseconds(500)
        );
        let span = to_duration(90.25).unwrap();
        assert_eq!(span, Duration::milliseconds(90_250));
        assert!(to_datetime(f64::NAN).is_err());
        assert!(to_duration(f64::INFINITY).is_err());
    }
}
