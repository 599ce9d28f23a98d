//! Numeric columns → renderable `[0, 1]` channels.
//!
//! Values arrive in whatever unit the backend computed (scores, citation
//! counts, cluster indices). Renderers want `[0, 1]`, and raw linear scaling of
//! skewed data squashes most points into one end of the range, so the main
//! entry point applies a gamma derived from the median.

use crate::ordering::sort_f64;

/// Default divisor floor: ranges narrower than this are not stretched to `[0, 1]`.
pub const DEFAULT_MIN_SPAN_FLOOR: f64 = 1.0;

/// Lower bound for the adaptive gamma.
pub const MIN_GAMMA: f64 = 0.1;

/// Median of the finite values; `None` if there are none.
///
/// Even-length inputs yield the mean of the two middle values.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sort_f64(&mut sorted);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) * 0.5)
    } else {
        Some(sorted[mid])
    }
}

fn finite_min_max(values: &[f64]) -> Option<(f64, f64)> {
    let mut it = values.iter().copied().filter(|v| v.is_finite());
    let first = it.next()?;
    Some(it.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

fn shift_and_scale(values: &[f64], min: f64, span: f64) -> Vec<f64> {
    values
        .iter()
        .map(|&v| {
            if v.is_finite() {
                ((v - min) / span).clamp(0.0, 1.0)
            } else {
                0.0
            }
        })
        .collect()
}

/// Normalize with a gamma anchored on the median.
///
/// - Empty input → empty output.
/// - No variation (`min == max`) → every output is exactly `1.0`.
/// - Otherwise values are shifted by the minimum, divided by
///   `max(range, min_span_floor)` and raised to
///   `max(0.1, median(normalized) * 2.0 * gamma_factor)`.
///
/// Non-finite inputs map to `0.0` and do not take part in min/max/median.
pub fn normalize_median_gamma(values: &[f64], gamma_factor: f64, min_span_floor: f64) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let Some((min, max)) = finite_min_max(values) else {
        return vec![1.0; values.len()];
    };
    if min == max {
        return vec![1.0; values.len()];
    }

    let span = (max - min).max(min_span_floor);
    let base = shift_and_scale(values, min, span);
    let gamma = median(&base)
        .map(|m| (m * 2.0 * gamma_factor).max(MIN_GAMMA))
        .unwrap_or(MIN_GAMMA);
    base.into_iter().map(|b| b.powf(gamma)).collect()
}

/// Normalize with a fixed gamma.
///
/// Unlike [`normalize_median_gamma`] a constant input maps to `0.0`.
pub fn normalize_with_gamma(values: &[f64], gamma: f64, min_span_floor: f64) -> Vec<f64> {
    let Some((min, max)) = finite_min_max(values) else {
        return vec![0.0; values.len()];
    };
    let span = (max - min).max(min_span_floor);
    shift_and_scale(values, min, span)
        .into_iter()
        .map(|b| b.powf(gamma))
        .collect()
}

/// Median-gamma normalization for categorical values feeding a cyclic channel.
///
/// Hue wraps around, so a plain normalization would put the last category at
/// `1.0`, the same color as the first one at `0.0`. A sentinel one past the
/// largest category is normalized along with the data and then dropped.
pub fn normalize_cyclic_categorical(
    values: &[f64],
    gamma_factor: f64,
    min_span_floor: f64,
) -> Vec<f64> {
    let Some((_, max)) = finite_min_max(values) else {
        return normalize_median_gamma(values, gamma_factor, min_span_floor);
    };
    let mut padded = Vec::with_capacity(values.len() + 1);
    padded.extend_from_slice(values);
    padded.push(max + 1.0);

    let mut out = normalize_median_gamma(&padded, gamma_factor, min_span_floor);
    out.truncate(values.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_identity() {
        assert!(normalize_median_gamma(&[], 1.0, 1.0).is_empty());
        assert!(normalize_cyclic_categorical(&[], 1.0, 1.0).is_empty());
    }

    #[test]
    fn constant_input_is_all_ones() {
        assert_eq!(normalize_median_gamma(&[3.0, 3.0, 3.0], 1.0, 1.0), vec![1.0; 3]);
        assert_eq!(normalize_median_gamma(&[-7.5], 0.3, 1.0), vec![1.0]);
    }

    #[test]
    fn zero_to_ten_with_unit_factor_is_linear() {
        let out = normalize_median_gamma(&[0.0, 10.0], 1.0, 1.0);
        assert_eq!(out, vec![0.0, 1.0]);
    }

    #[test]
    fn outputs_stay_in_unit_range() {
        let inputs: [&[f64]; 4] = [
            &[1.0, 2.0, 1000.0, 3.0, 4.0],
            &[-5.0, -4.0, 0.25],
            &[0.001, 0.002, 0.003],
            &[7.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0],
        ];
        for values in inputs {
            for factor in [0.0, 0.3, 1.0, 4.0] {
                for v in normalize_median_gamma(values, factor, 1.0) {
                    assert!((0.0..=1.0).contains(&v), "{v} out of range for {values:?}");
                }
            }
        }
    }

    #[test]
    fn span_floor_prevents_stretching_small_ranges() {
        let out = normalize_median_gamma(&[0.0, 0.1, 0.2], 0.5, 1.0);
        assert!(out[2] < 1.0);
        let stretched = normalize_median_gamma(&[0.0, 0.1, 0.2], 0.5, 0.0);
        assert_eq!(stretched[2], 1.0);
    }

    #[test]
    fn gamma_never_drops_below_floor() {
        // Median of the normalized data is 0, so the gamma falls back to 0.1.
        let out = normalize_median_gamma(&[0.0, 0.0, 0.0, 1.0], 1.0, 1.0);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[3], 1.0);
    }

    #[test]
    fn non_finite_values_map_to_zero() {
        let out = normalize_median_gamma(&[0.0, f64::NAN, 10.0], 1.0, 1.0);
        assert_eq!(out[1], 0.0);
        assert_eq!(out[2], 1.0);
    }

    #[test]
    fn categorical_sentinel_avoids_wraparound() {
        let out = normalize_cyclic_categorical(&[0.0, 1.0, 2.0], 1.0, 1.0);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|v| *v < 1.0), "{out:?}");
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn categorical_single_category_is_not_saturated() {
        let out = normalize_cyclic_categorical(&[4.0, 4.0], 1.0, 1.0);
        assert!(out.iter().all(|v| *v < 1.0));
    }

    #[test]
    fn fixed_gamma_matches_linear_scaling() {
        assert_eq!(normalize_with_gamma(&[2.0, 4.0, 6.0], 1.0, 1.0), vec![0.0, 0.5, 1.0]);
        assert_eq!(normalize_with_gamma(&[5.0, 5.0], 1.0, 1.0), vec![0.0, 0.0]);
    }

    #[test]
    fn median_handles_even_and_odd_lengths() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }
}
