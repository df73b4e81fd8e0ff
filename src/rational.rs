//! The rational time axis shared by the writer and the score walk.
//!
//! Beat positions and durations are exact fractions so that triplets and
//! other tuplets never accumulate rounding error while events are merged
//! and split.

use num_rational::Rational64;

/// A beat position or duration.
pub type Rational = Rational64;

/// Build a rational from a numerator and denominator.
pub fn ratio(numer: i64, denom: i64) -> Rational {
    Rational::new(numer, denom)
}

/// Build an integral rational.
pub fn whole(n: i64) -> Rational {
    Rational::from_integer(n)
}

/// Zero, the start of the piece and the duration of grace notes.
pub fn zero() -> Rational {
    Rational::from_integer(0)
}

/// Reduce to lowest terms.
pub fn rationalise(r: Rational) -> Rational {
    r.reduced()
}

pub fn to_float(r: Rational) -> f64 {
    *r.numer() as f64 / *r.denom() as f64
}

/// Render a duration or beat literal: `0`, `n` or `n/d`.
pub fn format_duration(r: Rational) -> String {
    let r = rationalise(r);
    if *r.numer() == 0 {
        return "0".to_string();
    }
    if *r.denom() == 1 {
        r.numer().to_string()
    } else {
        format!("{}/{}", r.numer(), r.denom())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_literals() {
        assert_eq!(format_duration(zero()), "0");
        assert_eq!(format_duration(whole(3)), "3");
        assert_eq!(format_duration(ratio(2, 8)), "1/4");
        assert_eq!(format_duration(ratio(3, 2)), "3/2");
        assert_eq!(format_duration(ratio(-1, 3)), "-1/3");
    }

    #[test]
    fn rationalise_is_idempotent() {
        let r = Rational::new_raw(6, 8);
        let once = rationalise(r);
        assert_eq!(*once.numer(), 3);
        assert_eq!(*once.denom(), 4);
        assert_eq!(rationalise(once), once);
    }

    #[test]
    fn float_view() {
        assert_eq!(to_float(ratio(1, 4)), 0.25);
        assert_eq!(to_float(whole(2)), 2.0);
    }
}
