//! Per-file resolution of randomized percentage parameters.

use tracing::warn;
use vremix_models::{ParamSpec, ResolvedJobParams, TransformSpec};

use crate::random::RandomSource;

/// Resolves `ParamSpec`s into concrete values.
pub struct ParameterSampler;

impl ParameterSampler {
    /// Resolve one parameter.
    ///
    /// `Fixed(v)` yields `v`; `Range` draws uniformly from `[min, max]`. An
    /// inverted range yields `min`.
    pub fn resolve(spec: &ParamSpec, rng: &mut dyn RandomSource) -> u32 {
        match *spec {
            ParamSpec::Fixed(v) => v,
            ParamSpec::Range { min, max } if max < min => {
                warn!(min, max, "Inverted parameter range, using minimum");
                min
            }
            ParamSpec::Range { min, max } => rng.int_inclusive(min, max),
        }
    }

    /// Draw zoom then speed for one file.
    pub fn sample_job(spec: &TransformSpec, rng: &mut dyn RandomSource) -> ResolvedJobParams {
        let zoom_percent = Self::resolve(&spec.zoom, rng);
        let speed_percent = Self::resolve(&spec.speed, rng);
        ResolvedJobParams::new(zoom_percent, speed_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::StdRandom;

    #[test]
    fn test_fixed_ignores_rng() {
        let mut rng = StdRandom::seeded(3);
        for _ in 0..10 {
            assert_eq!(ParameterSampler::resolve(&ParamSpec::Fixed(115), &mut rng), 115);
        }
    }

    #[test]
    fn test_range_within_bounds() {
        let mut rng = StdRandom::seeded(11);
        let spec = ParamSpec::range(80, 120);
        for _ in 0..10_000 {
            let v = ParameterSampler::resolve(&spec, &mut rng);
            assert!((80..=120).contains(&v));
        }
    }

    #[test]
    fn test_degenerate_range() {
        let mut rng = StdRandom::seeded(5);
        assert_eq!(ParameterSampler::resolve(&ParamSpec::range(100, 100), &mut rng), 100);
    }

    #[test]
    fn test_inverted_range_returns_min() {
        let mut rng = StdRandom::seeded(5);
        assert_eq!(ParameterSampler::resolve(&ParamSpec::range(130, 70), &mut rng), 130);
    }

    #[test]
    fn test_range_endpoints_reachable() {
        let mut rng = StdRandom::seeded(99);
        let spec = ParamSpec::range(1, 3);
        let mut seen = [false; 3];
        for _ in 0..300 {
            seen[(ParameterSampler::resolve(&spec, &mut rng) - 1) as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_sample_job() {
        let mut rng = StdRandom::seeded(1);
        let spec = TransformSpec::default()
            .with_zoom(ParamSpec::Fixed(110))
            .with_speed(ParamSpec::range(90, 90));

        let params = ParameterSampler::sample_job(&spec, &mut rng);
        assert_eq!(params, ResolvedJobParams::new(110, 90));
    }
}
