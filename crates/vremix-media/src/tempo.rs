//! Decomposition of a playback-rate factor into `atempo` stages.
//!
//! The audio tempo filter only accepts factors in `[0.5, 2.0]` per stage, so
//! larger changes are expressed as a product of in-range stages.

/// Smallest factor a single stage accepts.
pub const MIN_STAGE: f64 = 0.5;
/// Largest factor a single stage accepts.
pub const MAX_STAGE: f64 = 2.0;
/// Remainders this close to 1.0 are dropped.
pub const UNITY_EPSILON: f64 = 1e-5;

/// Split `factor` into stage factors whose product equals it.
///
/// Returns an empty list for a factor within `UNITY_EPSILON` of 1.0 and for
/// non-positive or non-finite input.
pub fn decompose(factor: f64) -> Vec<f64> {
    let mut stages = Vec::new();
    if !factor.is_finite() || factor <= 0.0 {
        return stages;
    }

    let mut remaining = factor;
    while remaining > MAX_STAGE {
        stages.push(MAX_STAGE);
        remaining /= MAX_STAGE;
    }
    while remaining < MIN_STAGE {
        stages.push(MIN_STAGE);
        remaining /= MIN_STAGE;
    }
    if (remaining - 1.0).abs() > UNITY_EPSILON {
        stages.push(remaining);
    }
    stages
}

/// One `atempo` filter per stage.
pub fn atempo_filters(factor: f64) -> Vec<String> {
    decompose(factor)
        .iter()
        .map(|s| format!("atempo={}", crate::graph::format_number(*s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stages: &[f64]) -> f64 {
        stages.iter().product()
    }

    #[test]
    fn test_unity_is_empty() {
        assert!(decompose(1.0).is_empty());
        assert!(decompose(1.000_001).is_empty());
    }

    #[test]
    fn test_in_range_single_stage() {
        assert_eq!(decompose(1.5), vec![1.5]);
        assert_eq!(decompose(0.75), vec![0.75]);
        assert_eq!(decompose(2.0), vec![2.0]);
        assert_eq!(decompose(0.5), vec![0.5]);
    }

    #[test]
    fn test_large_factor() {
        let stages = decompose(3.0);
        assert_eq!(stages, vec![2.0, 1.5]);

        let stages = decompose(8.0);
        assert_eq!(stages, vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_small_factor() {
        let stages = decompose(0.2);
        assert_eq!(stages.len(), 3);
        assert_eq!(&stages[..2], &[0.5, 0.5]);
        assert!((stages[2] - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_product_and_bounds() {
        for factor in [0.01, 0.1, 0.33, 0.9, 1.1, 2.5, 4.2, 17.0, 100.0] {
            let stages = decompose(factor);
            assert!(
                (product(&stages) - factor).abs() < 1e-4 * factor,
                "product mismatch for {}",
                factor
            );
            for s in &stages {
                assert!((MIN_STAGE..=MAX_STAGE).contains(s), "{} out of range", s);
            }
        }
    }

    #[test]
    fn test_invalid_input() {
        assert!(decompose(0.0).is_empty());
        assert!(decompose(-2.0).is_empty());
        assert!(decompose(f64::NAN).is_empty());
        assert!(decompose(f64::INFINITY).is_empty());
    }

    #[test]
    fn test_atempo_filters() {
        assert!(atempo_filters(1.0).is_empty());
        assert_eq!(atempo_filters(1.5), vec!["atempo=1.5"]);
        assert_eq!(atempo_filters(3.0), vec!["atempo=2", "atempo=1.5"]);
    }
}
