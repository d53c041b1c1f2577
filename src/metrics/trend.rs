/// Round to `precision` decimal places.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// `a / b` rounded to `precision` places, or `0` when `b` is zero.
pub fn safe_divide(a: f64, b: f64, precision: u32) -> f64 {
    if b == 0.0 {
        return 0.0;
    }
    round_to(a / b, precision)
}

/// Signed fractional change of `current` versus `previous`.
///
/// A zero `previous` gives `-1`, the same as a total decline. Callers cannot
/// tell "no prior data" apart from "down 100%".
pub fn trend(current: f64, previous: f64) -> f64 {
    safe_divide(current, previous, 2) - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_divide() {
        assert_eq!(safe_divide(10.0, 4.0, 2), 2.5);
        assert_eq!(safe_divide(1.0, 3.0, 2), 0.33);
        assert_eq!(safe_divide(2.0, 3.0, 4), 0.6667);
    }

    #[test]
    fn test_safe_divide_by_zero_is_zero() {
        for a in [0.0, 1.0, -5.0, 1e9] {
            for p in [0, 2, 6] {
                assert_eq!(safe_divide(a, 0.0, p), 0.0);
            }
        }
    }

    #[test]
    fn test_trend() {
        assert!((trend(12.0, 10.0) - 0.2).abs() < 1e-9);
        assert_eq!(trend(10.0, 10.0), 0.0);
        assert_eq!(trend(5.0, 10.0), -0.5);
    }

    // Documented quirk: an empty previous period reads as a 100% decline,
    // whatever the current value is.
    #[test]
    fn test_trend_with_zero_previous_is_minus_one() {
        assert_eq!(trend(0.0, 0.0), -1.0);
        assert_eq!(trend(42.0, 0.0), -1.0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(2.0, 2), 2.0);
        assert_eq!(round_to(7.5, 0), 8.0);
    }
}
