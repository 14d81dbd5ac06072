//! Diagnostics telemetry collector and helpers.
//!
//! The collector multiplexes beat, judgment, and wave lifecycle events into
//! a bounded history plus a broadcast stream. Publishing never blocks the
//! frame loop: a lagging or absent subscriber simply misses events.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use once_cell::sync::Lazy;
use tokio::sync::broadcast;

use crate::analysis::{Band, BeatEvent, JudgeOutcome, Judgment};

pub mod events;

pub use events::MetricEvent;

/// Global telemetry hub shared across the crate.
static HUB: Lazy<TelemetryHub> = Lazy::new(TelemetryHub::default);

/// Access the global telemetry hub.
pub fn hub() -> &'static TelemetryHub {
    &HUB
}

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        let history_capacity = history_capacity.max(1);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        // No receivers is the common case
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 128)
    }
}

/// Rolling window of recent verdicts.
struct JudgmentTracker {
    verdicts: VecDeque<Judgment>,
    max_samples: usize,
}

impl JudgmentTracker {
    fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            verdicts: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    /// Returns (perfect, normal, miss) counts after observing `judgment`
    fn observe(&mut self, judgment: Judgment) -> (usize, usize, usize) {
        if self.verdicts.len() == self.max_samples {
            self.verdicts.pop_front();
        }
        self.verdicts.push_back(judgment);

        self.verdicts
            .iter()
            .fold((0, 0, 0), |(perfect, normal, miss), verdict| match verdict {
                Judgment::Perfect => (perfect + 1, normal, miss),
                Judgment::Normal => (perfect, normal + 1, miss),
                Judgment::Miss => (perfect, normal, miss + 1),
            })
    }
}

/// Top-level hub wrapping collector state plus derived gauges.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    judgments: Mutex<JudgmentTracker>,
    queue_gauge: Mutex<Option<f32>>,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize, judgment_window: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            judgments: Mutex::new(JudgmentTracker::new(judgment_window)),
            queue_gauge: Mutex::new(None),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.collector.snapshot()
    }

    pub fn record_beat(&self, event: &BeatEvent) {
        self.collector.publish(MetricEvent::Beat {
            band: event.band,
            level: event.level,
            at_ms: event.at_ms,
        });
    }

    pub fn record_tap_lost(&self, at_ms: f64) {
        self.collector.publish(MetricEvent::TapLost { at_ms });
    }

    pub fn record_judgment(&self, outcome: &JudgeOutcome) {
        self.collector.publish(MetricEvent::Judgment {
            judgment: outcome.judgment,
            distance: outcome.distance,
        });

        let ((perfect, normal, miss), window) = {
            let mut tracker = self.judgments.lock().unwrap_or_else(PoisonError::into_inner);
            (tracker.observe(outcome.judgment), tracker.max_samples)
        };

        self.collector.publish(MetricEvent::Accuracy {
            perfect,
            normal,
            miss,
            window,
        });
    }

    pub fn record_wave_scheduled(
        &self,
        descriptor_id: &str,
        instance_id: u64,
        spawn_at_ms: f64,
        fallback: bool,
    ) {
        self.collector.publish(MetricEvent::WaveScheduled {
            descriptor_id: descriptor_id.to_string(),
            instance_id,
            spawn_at_ms,
            fallback,
        });
    }

    pub fn record_wave_spawned(&self, descriptor_id: &str, instance_id: u64, entity_count: usize) {
        self.collector.publish(MetricEvent::WaveSpawned {
            descriptor_id: descriptor_id.to_string(),
            instance_id,
            entity_count,
        });
    }

    pub fn record_wave_completed(&self, instance_id: u64) {
        self.collector
            .publish(MetricEvent::WaveCompleted { instance_id });
    }

    pub fn record_beat_dropped(&self, band: Band, queue_depth: usize) {
        self.collector
            .publish(MetricEvent::BeatDropped { band, queue_depth });
    }

    /// Queue fill gauge; changes under 2.5 points are not re-published.
    pub fn record_queue_depth(&self, depth: usize, capacity: usize) {
        let percent = if capacity == 0 {
            100.0
        } else {
            (depth as f32 / capacity as f32 * 100.0).clamp(0.0, 100.0)
        };
        let mut gauge = self.queue_gauge.lock().unwrap_or_else(PoisonError::into_inner);

        let should_emit = gauge
            .map(|last| (last - percent).abs() >= 2.5)
            .unwrap_or(true);

        if should_emit {
            *gauge = Some(percent);
            self.collector
                .publish(MetricEvent::QueueOccupancy { percent });
        }
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 128, 32)
    }
}
