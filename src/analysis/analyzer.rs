// AudioAnalyzer - live three-band beat detection
//
// Polls an AudioTap once per frame, reduces the magnitude snapshot to
// low/mid/high band energies, and runs one adaptive BandDetector per band.
// Detected beats are timestamped with the injected time source, logged in
// a bounded chronological list, and delivered synchronously to subscribers.
//
// Losing the tap is not an error: update() becomes a no-op and
// is_started() reports false until attach_to_source() succeeds again.

use std::collections::VecDeque;

use crate::analysis::band_detector::BandDetector;
use crate::analysis::spectrum::{band_energy, AudioSource, AudioTap};
use crate::analysis::{Band, BeatEvent};
use crate::clock::TimeSource;
use crate::config::AnalyzerConfig;
use crate::events::{Listeners, SubscriptionId};
use crate::telemetry;

/// Spectral band beat detector
pub struct AudioAnalyzer {
    config: AnalyzerConfig,
    tap: Option<Box<dyn AudioTap>>,
    started: bool,
    detectors: [BandDetector; 3],
    beat_log: VecDeque<f64>,
    time_source: TimeSource,
    listeners: Listeners<Band, BeatEvent>,
}

impl AudioAnalyzer {
    /// Create a detached analyzer
    ///
    /// # Arguments
    /// * `config` - Band edges, smoothing and detector tuning
    /// * `time_source` - Clock used to timestamp beats
    pub fn new(config: AnalyzerConfig, time_source: TimeSource) -> Self {
        let detectors = Band::ALL.map(|band| Self::detector_for(&config, band));
        let beat_log = VecDeque::with_capacity(config.beat_log_capacity.max(1));
        Self {
            config,
            tap: None,
            started: false,
            detectors,
            beat_log,
            time_source,
            listeners: Listeners::new(),
        }
    }

    fn detector_for(config: &AnalyzerConfig, band: Band) -> BandDetector {
        let settings = config.band(band);
        BandDetector::new(
            config.history_len,
            config.smoothing,
            settings.sensitivity,
            settings.refractory_ms,
        )
    }

    /// Acquire a frequency tap from `source`
    ///
    /// # Returns
    /// `true` when a live tap was obtained. `false` means the source is not
    /// running yet; callers should retry on a later frame.
    pub fn attach_to_source(&mut self, source: &mut dyn AudioSource) -> bool {
        let Some(mut tap) = source.open_tap() else {
            log::debug!("[AudioAnalyzer] No tap available yet");
            self.started = false;
            return false;
        };
        if tap.sample_rate() == 0 || tap.magnitudes().is_none() {
            log::debug!("[AudioAnalyzer] Tap opened but not producing data");
            self.started = false;
            return false;
        }

        log::info!(
            "[AudioAnalyzer] Attached to tap at {} Hz",
            tap.sample_rate()
        );
        // Histories from a previous tap describe a different signal
        for detector in self.detectors.iter_mut() {
            detector.reset();
        }
        self.tap = Some(tap);
        self.started = true;
        true
    }

    /// Drop the current tap
    pub fn detach(&mut self) {
        if self.tap.take().is_some() {
            log::info!("[AudioAnalyzer] Detached from tap");
        }
        self.started = false;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Poll the tap and run beat detection. Call once per frame.
    ///
    /// # Returns
    /// Number of beat events emitted this frame (0 when detached)
    pub fn update(&mut self) -> usize {
        let Some(tap) = self.tap.as_mut() else {
            return 0;
        };
        let sample_rate = tap.sample_rate();
        let config = &self.config;
        let levels = tap.magnitudes().map(|magnitudes| {
            Band::ALL.map(|band| {
                let settings = config.band(band);
                band_energy(magnitudes, sample_rate, settings.lo_hz, settings.hi_hz)
            })
        });

        let Some(levels) = levels else {
            let now = (self.time_source)();
            log::warn!("[AudioAnalyzer] Tap lost at {:.1} ms, waiting for re-attach", now);
            telemetry::hub().record_tap_lost(now);
            self.tap = None;
            self.started = false;
            return 0;
        };
        self.feed_levels(levels)
    }

    /// Run detection on externally computed band energies `[low, mid, high]`
    ///
    /// Works with or without an attached tap, for hosts that compute band
    /// energy elsewhere.
    pub fn feed_levels(&mut self, levels: [f32; 3]) -> usize {
        let now = (self.time_source)();
        let mut emitted = 0;
        for band in Band::ALL {
            let detector = &mut self.detectors[band.index()];
            if let Some(level) = detector.process(levels[band.index()], now) {
                self.record_beat(BeatEvent {
                    band,
                    level,
                    at_ms: now,
                });
                emitted += 1;
            }
        }
        emitted
    }

    fn record_beat(&mut self, event: BeatEvent) {
        if self.beat_log.len() >= self.config.beat_log_capacity.max(1) {
            self.beat_log.pop_front();
        }
        self.beat_log.push_back(event.at_ms);

        log::debug!(
            "[AudioAnalyzer] {} level={:.4} at {:.1} ms",
            event.band.event_name(),
            event.level,
            event.at_ms
        );
        telemetry::hub().record_beat(&event);
        self.listeners.emit(&event.band, &event);
    }

    /// Smallest absolute distance from `at_ms` to any recorded beat
    ///
    /// # Returns
    /// Distance in milliseconds, or `f64::INFINITY` when no beat has been recorded
    pub fn nearest_beat_delta_ms(&self, at_ms: f64) -> f64 {
        // Beat times are appended in clock order, so the log is sorted
        let idx = self.beat_log.partition_point(|&t| t < at_ms);
        let after = self.beat_log.get(idx).map(|t| (t - at_ms).abs());
        let before = idx
            .checked_sub(1)
            .and_then(|i| self.beat_log.get(i))
            .map(|t| (at_ms - t).abs());
        match (before, after) {
            (Some(a), Some(b)) => a.min(b),
            (Some(d), None) | (None, Some(d)) => d,
            (None, None) => f64::INFINITY,
        }
    }

    /// Latest smoothed level for `band`
    pub fn band_level(&self, band: Band) -> f32 {
        self.detectors[band.index()].level()
    }

    pub fn last_beat_ms(&self, band: Band) -> Option<f64> {
        self.detectors[band.index()].last_beat_ms()
    }

    /// Recorded beat timestamps, oldest first
    pub fn beat_times(&self) -> impl Iterator<Item = f64> + '_ {
        self.beat_log.iter().copied()
    }

    /// Register a handler for beats on `band` (the "beat:<band>" event)
    pub fn subscribe<F>(&mut self, band: Band, handler: F) -> SubscriptionId
    where
        F: FnMut(&BeatEvent) + Send + 'static,
    {
        self.listeners.subscribe(band, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}
