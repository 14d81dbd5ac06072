//! Synth - deterministic drum track rendering
//!
//! Renders a simple kick/snare/hat pattern at a given tempo so the band
//! analyzer and wave director can be exercised without an audio device.
//! Key features:
//! - Fixed-seed noise, so renders are identical across runs
//! - Kick energy sits in the low band, snare body in the mid band, hats in the high band
//! - Pure functions (no side effects, deterministic output)

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

use crate::audio::conductor::beat_length_ms;

/// Duration of the hat burst in milliseconds
const HAT_DURATION_MS: f32 = 20.0;

/// Duration of the kick in milliseconds
const KICK_DURATION_MS: f32 = 120.0;

/// Duration of the snare in milliseconds
const SNARE_DURATION_MS: f32 = 90.0;

fn samples_for(duration_ms: f32, sample_rate: u32) -> usize {
    (sample_rate as f32 * duration_ms / 1000.0) as usize
}

/// Generates a hat sample (20ms white noise burst with a linear fade).
///
/// # Examples
/// ```
/// use beat_director::audio::synth::generate_hat_sample;
/// let hat = generate_hat_sample(48000);
/// assert_eq!(hat.len(), 960);
/// ```
pub fn generate_hat_sample(sample_rate: u32) -> Vec<f32> {
    let num_samples = samples_for(HAT_DURATION_MS, sample_rate);

    // Use fixed seed for deterministic noise generation
    let mut rng = StdRng::seed_from_u64(42);

    (0..num_samples)
        .map(|i| {
            let fade = 1.0 - i as f32 / num_samples as f32;
            rng.gen_range(-1.0f32..1.0) * 0.4 * fade
        })
        .collect()
}

/// Generates a kick sample: a 60 Hz sine with exponential decay.
pub fn generate_kick_sample(sample_rate: u32) -> Vec<f32> {
    let num_samples = samples_for(KICK_DURATION_MS, sample_rate);
    let sr = sample_rate as f32;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sr;
            (2.0 * PI * 60.0 * t).sin() * (-t * 25.0).exp() * 0.9
        })
        .collect()
}

/// Generates a snare sample: a 200 Hz body plus light noise.
pub fn generate_snare_sample(sample_rate: u32) -> Vec<f32> {
    let num_samples = samples_for(SNARE_DURATION_MS, sample_rate);
    let sr = sample_rate as f32;
    let mut rng = StdRng::seed_from_u64(7);
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sr;
            let envelope = (-t * 35.0).exp();
            ((2.0 * PI * 200.0 * t).sin() * 0.6 + rng.gen_range(-1.0f32..1.0) * 0.15) * envelope
        })
        .collect()
}

/// Converts a millisecond timestamp to a sample index.
#[inline]
pub fn ms_to_samples(ms: f64, sample_rate: u32) -> usize {
    if !ms.is_finite() || ms <= 0.0 {
        return 0;
    }
    (ms * sample_rate as f64 / 1000.0).round() as usize
}

/// Renders a mono drum track.
///
/// Kick on every beat, snare on beats 2 and 4 of a 4-beat bar (every
/// other beat otherwise), hats on the off-beats.
///
/// # Arguments
/// * `bpm` - Tempo; invalid values use the conductor's beat-length sentinel
/// * `duration_ms` - Track length
/// * `sample_rate` - Sample rate in Hz
pub fn render_drum_track(bpm: f64, duration_ms: f64, sample_rate: u32) -> Vec<f32> {
    let total = ms_to_samples(duration_ms, sample_rate);
    let mut track = vec![0.0f32; total];
    if total == 0 {
        return track;
    }

    let kick = generate_kick_sample(sample_rate);
    let snare = generate_snare_sample(sample_rate);
    let hat = generate_hat_sample(sample_rate);
    let beat_ms = beat_length_ms(bpm);

    let mut mix = |start: usize, sample: &[f32]| {
        for (offset, value) in sample.iter().enumerate() {
            match track.get_mut(start + offset) {
                Some(slot) => *slot += value,
                None => break,
            }
        }
    };

    let mut beat = 0u64;
    loop {
        let beat_start_ms = beat as f64 * beat_ms;
        if beat_start_ms >= duration_ms {
            break;
        }
        mix(ms_to_samples(beat_start_ms, sample_rate), &kick);
        if beat % 2 == 1 {
            mix(ms_to_samples(beat_start_ms, sample_rate), &snare);
        }
        mix(
            ms_to_samples(beat_start_ms + beat_ms / 2.0, sample_rate),
            &hat,
        );
        beat += 1;
    }

    for sample in track.iter_mut() {
        *sample = sample.clamp(-1.0, 1.0);
    }
    track
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hat_sample_duration() {
        for &sr in &[44100, 48000, 96000] {
            let hat = generate_hat_sample(sr);
            assert_eq!(hat.len(), samples_for(HAT_DURATION_MS, sr));
        }
    }

    #[test]
    fn test_hat_sample_deterministic() {
        assert_eq!(generate_hat_sample(48000), generate_hat_sample(48000));
    }

    #[test]
    fn test_kick_decays() {
        let kick = generate_kick_sample(48000);
        let head: f32 = kick[..1200].iter().map(|s| s.abs()).sum();
        let tail: f32 = kick[kick.len() - 1200..].iter().map(|s| s.abs()).sum();
        assert!(head > tail * 4.0, "kick should decay: head {} tail {}", head, tail);
    }

    #[test]
    fn test_track_length_and_range() {
        let track = render_drum_track(120.0, 2000.0, 48000);
        assert_eq!(track.len(), 96000);
        assert!(track.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_track_has_energy_on_beats_and_silence_between() {
        let sr = 48000;
        let track = render_drum_track(120.0, 1000.0, sr);
        // 150-240 ms after the first kick: kick has died away, hat not yet started
        let quiet: f32 = track[ms_to_samples(200.0, sr)..ms_to_samples(240.0, sr)]
            .iter()
            .map(|s| s.abs())
            .sum();
        let loud: f32 = track[..ms_to_samples(40.0, sr)]
            .iter()
            .map(|s| s.abs())
            .sum();
        assert!(loud > quiet * 10.0);
    }

    #[test]
    fn test_ms_to_samples() {
        assert_eq!(ms_to_samples(500.0, 48000), 24000);
        assert_eq!(ms_to_samples(-5.0, 48000), 0);
        assert_eq!(ms_to_samples(f64::NAN, 48000), 0);
    }
}
