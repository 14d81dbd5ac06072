//! BeatJudge - timing accuracy classification
//!
//! This module grades a player input against the beat grid.
//! Key features:
//! - PERFECT/NORMAL/MISS classification from the distance to the nearest beat boundary
//! - Latency calibration offset expressed in milliseconds, converted to phase
//! - Window clamped to [0, 0.5] instead of being rejected
//! - No mutable state touched while judging; safe to call at any rate
//!
//! The judge never reads the clock itself: it samples a phase function,
//! usually [`crate::audio::Conductor::phase_source`].

use crate::audio::conductor::cycle_phase;
use crate::audio::Conductor;
use crate::config::JudgeConfig;

/// Zero-argument function returning the current beat phase in [0, 1)
pub type PhaseSource = Box<dyn Fn() -> f64 + Send>;

/// Default half-width of the NORMAL window, as a fraction of a beat
pub const DEFAULT_WINDOW: f64 = 0.12;

/// Verdict for a single input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Judgment {
    /// Within half the window of a beat boundary
    Perfect,
    /// Within the window
    Normal,
    /// Outside the window
    Miss,
}

/// Verdict plus the numbers that produced it
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct JudgeOutcome {
    pub judgment: Judgment,
    /// Phase after the latency offset was applied, in [0, 1)
    pub effective_phase: f64,
    /// Distance to the nearest beat boundary, in [0, 0.5]
    pub distance: f64,
}

/// Construction options for [`BeatJudge`]
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct JudgeOptions {
    /// Half-width of the NORMAL window (clamped to [0, 0.5])
    pub window: f64,
    /// Input latency offset in milliseconds
    pub offset_ms: f64,
    /// Beat length used to convert `offset_ms` to phase; 0 disables the offset
    pub beat_length_ms: f64,
}

impl Default for JudgeOptions {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            offset_ms: 0.0,
            beat_length_ms: 0.0,
        }
    }
}

/// Clamp a configured window into [0, 0.5]. NaN is treated as 0.
#[inline]
pub fn clamp_window(window: f64) -> f64 {
    if window.is_nan() {
        0.0
    } else {
        window.clamp(0.0, 0.5)
    }
}

/// Convert a millisecond offset into a phase offset in [0, 1).
///
/// A non-positive or non-finite beat length disables the offset.
#[inline]
pub fn offset_phase(offset_ms: f64, beat_length_ms: f64) -> f64 {
    if !(beat_length_ms.is_finite() && beat_length_ms > 0.0) || !offset_ms.is_finite() {
        return 0.0;
    }
    cycle_phase(offset_ms, beat_length_ms)
}

/// Classify a phase against a window.
///
/// `phase` may be anything finite; it is wrapped into [0, 1) after the
/// offset is added, so 1.0 behaves exactly like 0.0.
pub fn classify(phase: f64, offset: f64, window: f64) -> JudgeOutcome {
    let raw = if phase.is_finite() { phase } else { 0.0 };
    let effective_phase = cycle_phase(raw + offset, 1.0);
    let distance = effective_phase.min(1.0 - effective_phase);
    let judgment = if distance <= window / 2.0 {
        Judgment::Perfect
    } else if distance <= window {
        Judgment::Normal
    } else {
        Judgment::Miss
    };
    JudgeOutcome {
        judgment,
        effective_phase,
        distance,
    }
}

/// Timing judge sampling a phase function
///
/// # Example
/// ```
/// use beat_director::analysis::{BeatJudge, JudgeOptions, Judgment};
/// let judge = BeatJudge::new(Box::new(|| 0.02), JudgeOptions::default());
/// assert_eq!(judge.judge(), Judgment::Perfect);
/// ```
pub struct BeatJudge {
    phase_source: PhaseSource,
    window: f64,
    offset_ms: f64,
    beat_length_ms: f64,
    offset_phase: f64,
}

impl BeatJudge {
    /// Create a judge from a phase function and options.
    pub fn new(phase_source: PhaseSource, options: JudgeOptions) -> Self {
        Self {
            phase_source,
            window: clamp_window(options.window),
            offset_ms: options.offset_ms,
            beat_length_ms: options.beat_length_ms,
            offset_phase: offset_phase(options.offset_ms, options.beat_length_ms),
        }
    }

    /// Judge against a conductor's current tempo.
    ///
    /// The conductor's phase is snapshotted; build a new judge after a
    /// tempo change.
    pub fn for_conductor(conductor: &Conductor, config: &JudgeConfig) -> Self {
        Self::new(
            Box::new(conductor.phase_source()),
            JudgeOptions {
                window: config.window,
                offset_ms: config.offset_ms,
                beat_length_ms: conductor.beat_length_ms(),
            },
        )
    }

    /// Classify the current instant.
    pub fn judge(&self) -> Judgment {
        self.judge_with_distance().judgment
    }

    /// Classify the current instant, keeping the distance for feedback.
    pub fn judge_with_distance(&self) -> JudgeOutcome {
        self.judge_phase((self.phase_source)())
    }

    /// Classify an explicit raw phase with this judge's configuration.
    pub fn judge_phase(&self, raw_phase: f64) -> JudgeOutcome {
        classify(raw_phase, self.offset_phase, self.window)
    }

    /// Effective (clamped) window.
    pub fn window(&self) -> f64 {
        self.window
    }

    pub fn offset_ms(&self) -> f64 {
        self.offset_ms
    }

    pub fn beat_length_ms(&self) -> f64 {
        self.beat_length_ms
    }

    /// Offset converted to phase units.
    pub fn offset_phase(&self) -> f64 {
        self.offset_phase
    }

    pub fn set_window(&mut self, window: f64) {
        self.window = clamp_window(window);
    }

    pub fn set_offset_ms(&mut self, offset_ms: f64) {
        self.offset_ms = offset_ms;
        self.offset_phase = offset_phase(self.offset_ms, self.beat_length_ms);
    }

    pub fn set_beat_length_ms(&mut self, beat_length_ms: f64) {
        self.beat_length_ms = beat_length_ms;
        self.offset_phase = offset_phase(self.offset_ms, self.beat_length_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn judge_at(phase: f64, options: JudgeOptions) -> Judgment {
        BeatJudge::new(Box::new(move || phase), options).judge()
    }

    fn window(window: f64) -> JudgeOptions {
        JudgeOptions {
            window,
            ..JudgeOptions::default()
        }
    }

    #[test]
    fn test_exactly_on_beat_is_perfect() {
        assert_eq!(judge_at(0.0, JudgeOptions::default()), Judgment::Perfect);
        assert_eq!(judge_at(0.99, JudgeOptions::default()), Judgment::Perfect);
    }

    #[test]
    fn test_phase_one_wraps_to_zero() {
        for w in [0.0, 0.01, 0.12, 0.5] {
            assert_eq!(judge_at(1.0, window(w)), Judgment::Perfect, "window {}", w);
        }
    }

    #[test]
    fn test_window_boundaries() {
        // w = 0.12: perfect up to 0.06, normal up to 0.12
        assert_eq!(judge_at(0.05, window(0.12)), Judgment::Perfect);
        assert_eq!(judge_at(0.1, window(0.12)), Judgment::Normal);
        assert_eq!(judge_at(0.9, window(0.12)), Judgment::Normal);
        assert_eq!(judge_at(0.2, window(0.12)), Judgment::Miss);
        assert_eq!(judge_at(0.5, window(0.12)), Judgment::Miss);
    }

    #[test]
    fn test_window_is_clamped() {
        for phase in [0.0, 0.1, 0.26, 0.3, 0.45, 0.5, 0.7] {
            assert_eq!(
                judge_at(phase, window(0.6)),
                judge_at(phase, window(0.5)),
                "phase {}",
                phase
            );
        }
        assert_eq!(judge_at(0.3, window(0.6)), Judgment::Normal);

        let judge = BeatJudge::new(Box::new(|| 0.0), window(-1.0));
        assert_eq!(judge.window(), 0.0);
        let judge = BeatJudge::new(Box::new(|| 0.0), window(f64::NAN));
        assert_eq!(judge.window(), 0.0);
    }

    #[test]
    fn test_offset_wraparound() {
        let options = JudgeOptions {
            window: 0.12,
            offset_ms: 100.0,
            beat_length_ms: 500.0,
        };
        let judge = BeatJudge::new(Box::new(|| 0.95), options);
        let outcome = judge.judge_with_distance();
        assert!((judge.offset_phase() - 0.2).abs() < 1e-9);
        assert!((outcome.effective_phase - 0.15).abs() < 1e-9);
        assert!((outcome.distance - 0.15).abs() < 1e-9);
        assert_eq!(outcome.judgment, Judgment::Miss);
    }

    #[test]
    fn test_zero_beat_length_disables_offset() {
        let options = JudgeOptions {
            window: 0.12,
            offset_ms: 250.0,
            beat_length_ms: 0.0,
        };
        let judge = BeatJudge::new(Box::new(|| 0.0), options);
        assert_eq!(judge.offset_phase(), 0.0);
        assert_eq!(judge.judge(), Judgment::Perfect);
    }

    #[test]
    fn test_negative_offset_normalizes() {
        // -50 ms at 500 ms/beat moves the phase back by 0.1
        let options = JudgeOptions {
            window: 0.12,
            offset_ms: -50.0,
            beat_length_ms: 500.0,
        };
        let judge = BeatJudge::new(Box::new(|| 0.1), options);
        assert!((judge.offset_phase() - 0.9).abs() < 1e-9);
        assert_eq!(judge.judge(), Judgment::Perfect);
    }

    #[test]
    fn test_offset_larger_than_beat_wraps() {
        assert!((offset_phase(1100.0, 500.0) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_mutators_keep_offset_consistent() {
        let mut judge = BeatJudge::new(Box::new(|| 0.0), JudgeOptions::default());
        judge.set_offset_ms(100.0);
        assert_eq!(judge.offset_phase(), 0.0);

        judge.set_beat_length_ms(400.0);
        assert!((judge.offset_phase() - 0.25).abs() < 1e-9);

        judge.set_offset_ms(0.0);
        assert_eq!(judge.offset_phase(), 0.0);

        judge.set_window(0.9);
        assert_eq!(judge.window(), 0.5);
    }

    #[test]
    fn test_non_finite_phase_treated_as_on_beat() {
        assert_eq!(judge_at(f64::NAN, JudgeOptions::default()), Judgment::Perfect);
    }

    #[test]
    fn test_judgment_serializes_upper_case() {
        let json = serde_json::to_string(&Judgment::Perfect).unwrap();
        assert_eq!(json, "\"PERFECT\"");
    }
}
