// Analysis module - beat detection and timing judgment
//
// This module holds the two consumers of musical time:
// - AudioAnalyzer: AudioTap → band energy → BandDetector (low/mid/high) → BeatEvent
// - BeatJudge: phase function → PERFECT/NORMAL/MISS
//
// Beat events feed the wave director; the judge samples the conductor.

pub mod analyzer;
pub mod band_detector;
pub mod judge;
pub mod spectrum;

pub use analyzer::AudioAnalyzer;
pub use band_detector::BandDetector;
pub use judge::{BeatJudge, JudgeOptions, JudgeOutcome, Judgment, PhaseSource};
pub use spectrum::{band_energy, AudioSource, AudioTap, PcmFeed, PcmSpectrumTap};

/// Frequency band a beat was detected on
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    /// Kick and bass
    Low,
    /// Snare body
    Mid,
    /// Transients and hats
    High,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Low, Band::Mid, Band::High];

    pub fn index(self) -> usize {
        match self {
            Band::Low => 0,
            Band::Mid => 1,
            Band::High => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Band::Low => "low",
            Band::Mid => "mid",
            Band::High => "high",
        }
    }

    /// Event name used by hosts that key listeners by string ("beat:low")
    pub fn event_name(self) -> &'static str {
        match self {
            Band::Low => "beat:low",
            Band::Mid => "beat:mid",
            Band::High => "beat:high",
        }
    }
}

impl std::str::FromStr for Band {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "beat:low" => Ok(Band::Low),
            "mid" | "beat:mid" => Ok(Band::Mid),
            "high" | "beat:high" => Ok(Band::High),
            other => Err(format!("unknown band '{}'", other)),
        }
    }
}

/// A detected beat on one band
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BeatEvent {
    pub band: Band,
    /// Smoothed band level that crossed the threshold
    pub level: f32,
    /// Time of detection from the analyzer's time source
    pub at_ms: f64,
}
