// Temperature sampling over a probability vector.
//
// The scorer's probabilities are moved to log space (with a small epsilon so
// exact zeros stay finite), divided by the temperature, exponentiated and
// renormalized. Temperatures below 1 sharpen the distribution toward its mode;
// above 1 they flatten it. The largest log is subtracted before dividing by
// the temperature, so arbitrarily small temperatures converge on the argmax
// instead of overflowing or underflowing every weight. If the result still
// has a zero or non-finite sum (NaN or infinite input), the distribution
// falls back to uniform.

use crate::error::{GenerationError, Result};
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

/// Added to every probability before taking the log.
pub const EPSILON: f64 = 1e-9;

/// Reject temperatures that are not strictly positive and finite.
pub fn validate_temperature(temperature: f64) -> Result<()> {
    if temperature.is_finite() && temperature > 0.0 {
        Ok(())
    } else {
        Err(GenerationError::InvalidTemperature(temperature))
    }
}

/// Rescale `probs` by `temperature` and renormalize to sum to 1.
pub fn rescale(probs: &[f64], temperature: f64) -> Result<Vec<f64>> {
    validate_temperature(temperature)?;
    if probs.is_empty() {
        return Ok(Vec::new());
    }

    let logs: Vec<f64> = probs.iter().map(|&p| (p + EPSILON).ln()).collect();
    let max = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // Divide the gap to the max, not the raw log: a tiny temperature then
    // sends every non-max weight to zero instead of every logit to -inf.
    let weights: Vec<f64> = logs
        .iter()
        .map(|&l| ((l - max) / temperature).exp())
        .collect();
    let total: f64 = weights.iter().sum();

    if !total.is_finite() || total <= 0.0 {
        return Ok(uniform(probs.len()));
    }
    Ok(weights.into_iter().map(|w| w / total).collect())
}

/// Draw one index from `probs` rescaled at `temperature`.
///
/// Fails with `InvalidTemperature` for `temperature <= 0`. Advances `rng`
/// and nothing else.
pub fn sample(probs: &[f64], temperature: f64, rng: &mut impl Rng) -> Result<usize> {
    let dist = rescale(probs, temperature)?;
    if dist.is_empty() {
        return Err(GenerationError::IndexOutOfRange {
            index: 0,
            n_vocab: 0,
        });
    }

    match WeightedIndex::new(&dist) {
        Ok(weighted) => Ok(weighted.sample(rng)),
        // Only reachable through rounding in a degenerate distribution.
        Err(_) => Ok(rng.random_range(0..dist.len())),
    }
}

fn uniform(n: usize) -> Vec<f64> {
    vec![1.0 / n as f64; n]
}

#[cfg(test)]
mod tests {
    use super::*;
    use melodist_prng::NoteRng;

    const SKEWED: [f64; 5] = [0.05, 0.1, 0.6, 0.15, 0.1];

    fn argmax(v: &[f64]) -> usize {
        v.iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn test_rescaled_sums_to_one() {
        let probs = [0.0, 0.2, 0.3, 0.0, 0.5];
        for t in [1e-3, 0.1, 0.5, 0.9, 1.0, 2.5, 7.0, 10.0] {
            let dist = rescale(&probs, t).unwrap();
            let total: f64 = dist.iter().sum();
            assert!((total - 1.0).abs() < 1e-6, "t={t}: sum {total}");
            assert!(dist.iter().all(|&p| p >= 0.0 && p.is_finite()));
        }
    }

    #[test]
    fn test_unit_temperature_preserves_distribution() {
        let dist = rescale(&SKEWED, 1.0).unwrap();
        for (a, b) in dist.iter().zip(SKEWED.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_low_temperature_sharpens_high_flattens() {
        let cold = rescale(&SKEWED, 0.5).unwrap();
        let hot = rescale(&SKEWED, 3.0).unwrap();
        assert!(cold[2] > SKEWED[2]);
        assert!(hot[2] < SKEWED[2]);
        assert_eq!(argmax(&cold), 2);
        assert_eq!(argmax(&hot), 2);
    }

    #[test]
    fn test_near_zero_temperature_picks_argmax() {
        let mut rng = NoteRng::new(1);
        for _ in 0..1000 {
            assert_eq!(sample(&SKEWED, 0.01, &mut rng).unwrap(), 2);
        }
    }

    #[test]
    fn test_subnormal_temperature_is_argmax() {
        assert_eq!(rescale(&[0.4, 0.6], 1e-309).unwrap(), vec![0.0, 1.0]);
        assert_eq!(argmax(&rescale(&SKEWED, f64::MIN_POSITIVE).unwrap()), 2);

        let mut rng = NoteRng::new(5);
        assert_eq!(sample(&[0.4, 0.6], 5e-324, &mut rng).unwrap(), 1);
    }

    #[test]
    fn test_sampling_frequencies_track_distribution() {
        let mut rng = NoteRng::new(2);
        let mut counts = [0usize; 5];
        let n = 20_000;
        for _ in 0..n {
            counts[sample(&SKEWED, 1.0, &mut rng).unwrap()] += 1;
        }
        let freq = counts[2] as f64 / n as f64;
        assert!((0.57..0.63).contains(&freq), "mode frequency {freq}");
    }

    #[test]
    fn test_invalid_temperature_rejected() {
        let mut rng = NoteRng::new(3);
        for t in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                sample(&SKEWED, t, &mut rng),
                Err(GenerationError::InvalidTemperature(_))
            ));
        }
    }

    #[test]
    fn test_non_finite_input_falls_back_to_uniform() {
        let dist = rescale(&[f64::NAN, 0.5, 0.5], 1.0).unwrap();
        assert_eq!(dist, vec![1.0 / 3.0; 3]);

        let dist = rescale(&[f64::INFINITY, 0.5], 0.7).unwrap();
        assert_eq!(dist, vec![0.5; 2]);
    }

    #[test]
    fn test_all_zero_probabilities_become_uniform() {
        let dist = rescale(&[0.0; 4], 0.9).unwrap();
        for p in dist {
            assert!((p - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sample_stays_in_range() {
        let mut rng = NoteRng::new(4);
        for _ in 0..1000 {
            assert!(sample(&SKEWED, 1.5, &mut rng).unwrap() < SKEWED.len());
        }
    }
}
