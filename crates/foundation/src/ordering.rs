//! Deterministic float ordering.
//!
//! Columns arriving from the backend are plain `f64`s, so sorting them (for a
//! median, or for stable hit ordering) needs a total order that does not
//! depend on the sign of zero or on which NaN payload showed up.

use core::cmp::Ordering;

/// Collapse `-0.0` onto `0.0` and every NaN onto one canonical NaN.
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Total ordering over canonicalized floats.
pub fn total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}

/// Sort a slice of floats in place using [`total_cmp_f64`].
pub fn sort_f64(values: &mut [f64]) {
    values.sort_by(|a, b| total_cmp_f64(*a, *b));
}

#[cfg(test)]
mod tests {
    use super::{canonical_f64, sort_f64, total_cmp_f64};
    use core::cmp::Ordering;

    #[test]
    fn negative_zero_equals_zero() {
        assert_eq!(canonical_f64(-0.0).to_bits(), 0.0f64.to_bits());
        assert_eq!(total_cmp_f64(-0.0, 0.0), Ordering::Equal);
    }

    #[test]
    fn nan_sorts_after_numbers() {
        let mut v = vec![2.0, f64::NAN, -1.0, 0.5];
        sort_f64(&mut v);
        assert_eq!(&v[..3], &[-1.0, 0.5, 2.0]);
        assert!(v[3].is_nan());
    }
}
