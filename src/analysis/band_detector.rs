use std::collections::VecDeque;

/// Levels at or below this never count as beats, so near-silence with a
/// flat history cannot trigger on float noise.
const MIN_BEAT_LEVEL: f32 = 1e-4;

/// Samples required in the history before a threshold is trusted
const MIN_HISTORY: usize = 8;

/// Adaptive beat detector for one frequency band.
///
/// Raw energy is smoothed with a single-pole filter, compared against
/// `mean + sensitivity * stddev` of the recent smoothed history, and
/// debounced by a refractory interval.
#[derive(Debug, Clone)]
pub struct BandDetector {
    history: VecDeque<f32>,
    capacity: usize,
    smoothing: f32,
    sensitivity: f32,
    refractory_ms: f64,
    level: f32,
    primed: bool,
    last_beat_ms: Option<f64>,
}

impl BandDetector {
    pub fn new(capacity: usize, smoothing: f32, sensitivity: f32, refractory_ms: f64) -> Self {
        let capacity = capacity.max(2);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            smoothing: smoothing.clamp(0.0, 0.99),
            sensitivity: sensitivity.max(0.0),
            refractory_ms: refractory_ms.max(0.0),
            level: 0.0,
            primed: false,
            last_beat_ms: None,
        }
    }

    /// Reset internal state (e.g. after the tap was re-attached)
    pub fn reset(&mut self) {
        self.history.clear();
        self.level = 0.0;
        self.primed = false;
        self.last_beat_ms = None;
    }

    /// Latest smoothed level
    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn last_beat_ms(&self) -> Option<f64> {
        self.last_beat_ms
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Current adaptive threshold, if enough history has accumulated
    pub fn threshold(&self) -> Option<f32> {
        let needed = MIN_HISTORY.min(self.capacity);
        if self.history.len() < needed {
            return None;
        }
        let n = self.history.len() as f32;
        let mean = self.history.iter().sum::<f32>() / n;
        let variance = self
            .history
            .iter()
            .map(|v| (v - mean) * (v - mean))
            .sum::<f32>()
            / n;
        Some(mean + self.sensitivity * variance.sqrt())
    }

    /// Feed one raw energy sample taken at `now_ms`.
    ///
    /// Returns the smoothed level when a beat is declared.
    pub fn process(&mut self, raw: f32, now_ms: f64) -> Option<f32> {
        let raw = if raw.is_finite() { raw.max(0.0) } else { 0.0 };
        self.level = if self.primed {
            self.smoothing * self.level + (1.0 - self.smoothing) * raw
        } else {
            self.primed = true;
            raw
        };

        let refractory_clear = self
            .last_beat_ms
            .map(|last| now_ms - last >= self.refractory_ms)
            .unwrap_or(true);

        let is_beat = refractory_clear
            && self.level > MIN_BEAT_LEVEL
            && self
                .threshold()
                .map(|threshold| self.level > threshold)
                .unwrap_or(false);

        // Threshold compares against the past, so insert after deciding
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(self.level);

        if is_beat {
            self.last_beat_ms = Some(now_ms);
            Some(self.level)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_MS: f64 = 16.0;

    /// Feed `frames` copies of `value` starting at `start_ms`, returning beats seen
    fn feed(detector: &mut BandDetector, value: f32, frames: usize, start_ms: f64) -> usize {
        (0..frames)
            .filter(|i| {
                detector
                    .process(value, start_ms + *i as f64 * FRAME_MS)
                    .is_some()
            })
            .count()
    }

    #[test]
    fn test_spike_over_flat_baseline_is_beat() {
        let mut detector = BandDetector::new(30, 0.0, 1.5, 100.0);
        assert_eq!(feed(&mut detector, 0.1, 20, 0.0), 0);
        assert!(detector.process(1.0, 320.0).is_some());
        assert_eq!(detector.last_beat_ms(), Some(320.0));
    }

    #[test]
    fn test_no_beat_without_history() {
        let mut detector = BandDetector::new(30, 0.0, 1.5, 100.0);
        assert!(detector.process(1.0, 0.0).is_none());
        assert_eq!(feed(&mut detector, 0.1, 3, 16.0), 0);
        assert!(detector.process(5.0, 64.0).is_none());
    }

    #[test]
    fn test_refractory_blocks_second_spike() {
        let mut detector = BandDetector::new(30, 0.0, 1.5, 100.0);
        feed(&mut detector, 0.1, 20, 0.0);

        assert!(detector.process(1.0, 320.0).is_some());
        assert!(detector.process(0.1, 336.0).is_none());
        // 40 ms after the first beat: inside the 100 ms refractory window
        assert!(detector.process(1.0, 360.0).is_none());

        // After the window a fresh spike registers again
        feed(&mut detector, 0.1, 10, 376.0);
        assert!(detector.process(1.0, 600.0).is_some());
    }

    #[test]
    fn test_silence_never_triggers() {
        let mut detector = BandDetector::new(30, 0.7, 1.5, 50.0);
        assert_eq!(feed(&mut detector, 0.0, 100, 0.0), 0);
        assert_eq!(feed(&mut detector, 0.00001, 10, 1600.0), 0);
    }

    #[test]
    fn test_smoothing_damps_single_frame() {
        let mut detector = BandDetector::new(30, 0.7, 1.5, 100.0);
        feed(&mut detector, 0.1, 20, 0.0);
        detector.process(1.0, 320.0);
        assert!((detector.level() - (0.7 * 0.1 + 0.3 * 1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut detector = BandDetector::new(5, 0.0, 1.5, 0.0);
        feed(&mut detector, 0.2, 50, 0.0);
        assert_eq!(detector.history_len(), 5);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut detector = BandDetector::new(30, 0.0, 1.5, 100.0);
        feed(&mut detector, 0.1, 20, 0.0);
        detector.process(1.0, 320.0);
        detector.reset();
        assert_eq!(detector.history_len(), 0);
        assert_eq!(detector.last_beat_ms(), None);
        assert_eq!(detector.level(), 0.0);
    }
}
