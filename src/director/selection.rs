//! Weighted candidate selection.
//!
//! Weight = descriptor weight x category weight x stage-tier proximity
//! x band affinity x intro boost. The numbers are tuning, the mechanism
//! (weighted sampling over already-filtered candidates) is the contract.

use rand::Rng;

use crate::analysis::Band;
use crate::config::DirectorConfig;
use crate::director::descriptor::{WaveDescriptor, INTRO_TAG};

/// Selection weight of `descriptor` for a beat on `band` at `stage`.
///
/// Never negative; non-finite results collapse to zero.
pub fn candidate_weight(
    descriptor: &WaveDescriptor,
    config: &DirectorConfig,
    stage: u32,
    band: Band,
) -> f64 {
    let mut weight = descriptor.weight * config.category_weight(descriptor.category);

    // Waves tuned for the current stage are favoured over far-off tiers
    if let Some(tier) = descriptor.tier.or(descriptor.min_stage) {
        let distance = (i64::from(stage) - i64::from(tier)).unsigned_abs() as f64;
        weight *= 1.0 / (1.0 + distance);
    }

    if !descriptor.bands.is_empty() {
        weight *= if descriptor.bands.contains(&band) {
            config.band_match_boost
        } else {
            config.band_mismatch_factor
        };
    }

    if stage <= config.intro_stage_limit && descriptor.has_tag(INTRO_TAG) {
        weight *= config.intro_boost;
    }

    if weight.is_finite() {
        weight.max(0.0)
    } else {
        0.0
    }
}

/// Pick one entry from `weights` proportionally to its weight.
///
/// Falls back to a uniform pick when every weight is zero.
pub fn pick_weighted<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }

    let total: f64 = weights.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return Some(rng.gen_range(0..weights.len()));
    }

    let mut target = rng.gen_range(0.0..total);
    for (index, weight) in weights.iter().enumerate() {
        if target < *weight {
            return Some(index);
        }
        target -= weight;
    }

    // Float residue: land on the last non-zero entry
    weights.iter().rposition(|w| *w > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::director::descriptor::WaveCategory;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_category_weight_applies() {
        let cfg = DirectorConfig::default();
        let light = WaveDescriptor::new("l").with_category(WaveCategory::Light);
        let boss = WaveDescriptor::new("b").with_category(WaveCategory::Boss);
        assert!(
            candidate_weight(&light, &cfg, 1, Band::Low) > candidate_weight(&boss, &cfg, 1, Band::Low)
        );
    }

    #[test]
    fn test_band_affinity() {
        let cfg = DirectorConfig::default();
        let wave = WaveDescriptor::new("w").with_bands(vec![Band::High]);
        let matched = candidate_weight(&wave, &cfg, 1, Band::High);
        let mismatched = candidate_weight(&wave, &cfg, 1, Band::Low);
        assert!((matched - cfg.band_match_boost).abs() < 1e-9);
        assert!((mismatched - cfg.band_mismatch_factor).abs() < 1e-9);
    }

    #[test]
    fn test_intro_boost_only_on_early_stages() {
        let cfg = DirectorConfig::default();
        let wave = WaveDescriptor::new("w").with_tags(&[INTRO_TAG]);
        let early = candidate_weight(&wave, &cfg, 1, Band::Mid);
        let late = candidate_weight(&wave, &cfg, cfg.intro_stage_limit + 1, Band::Mid);
        assert!((early - cfg.intro_boost).abs() < 1e-9);
        assert!((late - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_tier_proximity_decays() {
        let cfg = DirectorConfig::default();
        let wave = WaveDescriptor::new("w").with_stage_range(Some(5), None);
        let near = candidate_weight(&wave, &cfg, 5, Band::Mid);
        let far = candidate_weight(&wave, &cfg, 9, Band::Mid);
        assert!(near > far);
        assert!((far - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weight_never_picked_when_others_positive() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            assert_eq!(pick_weighted(&mut rng, &[0.0, 3.0, 0.0]), Some(1));
        }
    }

    #[test]
    fn test_all_zero_falls_back_to_uniform() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = [false; 3];
        for _ in 0..200 {
            let index = pick_weighted(&mut rng, &[0.0, 0.0, 0.0]).unwrap();
            seen[index] = true;
        }
        assert!(seen.iter().all(|s| *s));
        assert_eq!(pick_weighted(&mut rng, &[]), None);
    }

    #[test]
    fn test_weights_shape_distribution() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut counts = [0usize; 2];
        for _ in 0..4000 {
            counts[pick_weighted(&mut rng, &[1.0, 3.0]).unwrap()] += 1;
        }
        let ratio = counts[1] as f64 / counts[0] as f64;
        assert!(ratio > 2.4 && ratio < 3.7, "ratio {}", ratio);
    }
}
