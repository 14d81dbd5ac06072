//! Conductor - beat and bar phase clock
//!
//! This module is the single source of truth for musical time when no live
//! beat tracking is driving the game, and the phase function the timing
//! judge samples on every input.
//! Key features:
//! - Total phase functions: any bpm, including zero, negative and NaN, gives a finite phase in [0, 1)
//! - Bar anchor that can be re-aligned from detected downbeats
//! - Synchronous bar-start notifications to any number of subscribers
//!
//! All time is read from the injected [`TimeSource`], never from the wall clock.

use crate::clock::{monotonic_time_source, TimeSource};
use crate::events::{Listeners, SubscriptionId};

/// Beat length used when the tempo is unusable, and the upper bound for any tempo.
pub const MAX_BEAT_LENGTH_MS: f64 = 60_000.0;

/// Converts BPM (beats per minute) to milliseconds per beat.
///
/// Formula: beat_length_ms = 60000 / bpm. Tempos below 1 bpm (including
/// zero, negative, NaN and infinite values) map to [`MAX_BEAT_LENGTH_MS`],
/// so the result is always finite and positive.
///
/// # Examples
/// ```
/// use beat_director::audio::conductor::beat_length_ms;
/// assert_eq!(beat_length_ms(120.0), 500.0);
/// assert_eq!(beat_length_ms(0.0), 60_000.0);
/// ```
#[inline]
pub fn beat_length_ms(bpm: f64) -> f64 {
    if bpm.is_finite() && bpm > 0.0 {
        (60_000.0 / bpm).min(MAX_BEAT_LENGTH_MS)
    } else {
        MAX_BEAT_LENGTH_MS
    }
}

/// Normalized position of `elapsed_ms` within a cycle of `cycle_ms`.
///
/// Always in [0, 1). Negative elapsed time wraps backwards into the
/// previous cycle; degenerate inputs yield 0.
#[inline]
pub fn cycle_phase(elapsed_ms: f64, cycle_ms: f64) -> f64 {
    if !elapsed_ms.is_finite() || !cycle_ms.is_finite() || cycle_ms <= 0.0 {
        return 0.0;
    }
    let phase = elapsed_ms.rem_euclid(cycle_ms) / cycle_ms;
    if phase >= 1.0 {
        0.0
    } else {
        phase
    }
}

/// Events raised by the conductor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConductorEventKind {
    BarStart,
}

/// Payload delivered with [`ConductorEventKind::BarStart`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarStartEvent {
    /// Time the bar start was signaled (the new bar anchor)
    pub at_ms: f64,
    /// Number of bar starts signaled so far, including this one
    pub bar_number: u64,
}

/// Logical beat/bar clock driven by a declared tempo
pub struct Conductor {
    bpm: f64,
    beats_per_bar: u32,
    origin_ms: f64,
    bar_anchor_ms: Option<f64>,
    bars_signaled: u64,
    time_source: TimeSource,
    listeners: Listeners<ConductorEventKind, BarStartEvent>,
}

impl Conductor {
    /// Create a conductor on the default monotonic clock.
    pub fn new(bpm: f64, beats_per_bar: u32) -> Self {
        Self::with_time_source(bpm, beats_per_bar, monotonic_time_source())
    }

    /// Create a conductor reading time from `time_source`.
    ///
    /// The clock origin is captured from the source immediately.
    pub fn with_time_source(bpm: f64, beats_per_bar: u32, time_source: TimeSource) -> Self {
        let origin_ms = time_source();
        Self {
            bpm,
            beats_per_bar: beats_per_bar.max(1),
            origin_ms,
            bar_anchor_ms: None,
            bars_signaled: 0,
            time_source,
            listeners: Listeners::new(),
        }
    }

    pub fn from_config(config: &crate::config::ConductorConfig, time_source: TimeSource) -> Self {
        Self::with_time_source(config.bpm, config.beats_per_bar, time_source)
    }

    /// Replace the tempo. Invalid values are kept and corrected on read.
    pub fn set_tempo(&mut self, bpm: f64, beats_per_bar: u32) {
        self.bpm = bpm;
        self.beats_per_bar = beats_per_bar.max(1);
        log::debug!(
            "[Conductor] Tempo set to {} bpm, {} beats per bar",
            bpm,
            self.beats_per_bar
        );
    }

    /// Swap the time source.
    ///
    /// Timestamps from different sources are not comparable, so the origin
    /// is re-captured and any bar anchor is cleared.
    pub fn set_time_source(&mut self, time_source: TimeSource) {
        self.origin_ms = time_source();
        self.bar_anchor_ms = None;
        self.time_source = time_source;
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    pub fn origin_ms(&self) -> f64 {
        self.origin_ms
    }

    pub fn now_ms(&self) -> f64 {
        (self.time_source)()
    }

    pub fn beat_length_ms(&self) -> f64 {
        beat_length_ms(self.bpm)
    }

    pub fn bar_length_ms(&self) -> f64 {
        self.beat_length_ms() * self.beats_per_bar as f64
    }

    /// Phase within the current beat, in [0, 1).
    pub fn beat_phase(&self) -> f64 {
        cycle_phase(self.now_ms() - self.origin_ms, self.beat_length_ms())
    }

    /// Phase within the current bar, in [0, 1).
    ///
    /// Measured from the last [`Conductor::signal_bar_start`], or from the
    /// clock origin if none has been signaled.
    pub fn bar_phase(&self) -> f64 {
        let anchor = self.bar_anchor_ms.unwrap_or(self.origin_ms);
        cycle_phase(self.now_ms() - anchor, self.bar_length_ms())
    }

    /// Whole beats elapsed since the clock origin.
    pub fn beat_index(&self) -> u64 {
        let elapsed = self.now_ms() - self.origin_ms;
        if !elapsed.is_finite() || elapsed <= 0.0 {
            return 0;
        }
        (elapsed / self.beat_length_ms()).floor() as u64
    }

    /// Snapshot phase function for a [`crate::analysis::BeatJudge`].
    ///
    /// Captures the current tempo and origin; a tempo change needs a new
    /// phase source (and judge).
    pub fn phase_source(&self) -> impl Fn() -> f64 + Send + 'static {
        let time_source = self.time_source.clone();
        let origin_ms = self.origin_ms;
        let length_ms = self.beat_length_ms();
        move || cycle_phase(time_source() - origin_ms, length_ms)
    }

    /// Mark "now" as the start of a bar and notify subscribers.
    ///
    /// Handlers run synchronously before this returns.
    pub fn signal_bar_start(&mut self) -> BarStartEvent {
        let at_ms = self.now_ms();
        self.bar_anchor_ms = Some(at_ms);
        self.bars_signaled += 1;
        let event = BarStartEvent {
            at_ms,
            bar_number: self.bars_signaled,
        };
        self.listeners.emit(&ConductorEventKind::BarStart, &event);
        event
    }

    pub fn subscribe<F>(&mut self, kind: ConductorEventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&BarStartEvent) + Send + 'static,
    {
        self.listeners.subscribe(kind, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}
