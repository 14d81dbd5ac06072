//! Core telemetry event types describing diagnostics data exposed to
//! the CLI report and broadcast subscribers.

use serde::{Deserialize, Serialize};

use crate::analysis::{Band, Judgment};

/// Metric events covering detection, judging, and wave scheduling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    Beat {
        band: Band,
        level: f32,
        at_ms: f64,
    },
    Judgment {
        judgment: Judgment,
        distance: f64,
    },
    /// Rolling verdict counts over the recent judgment window
    Accuracy {
        perfect: usize,
        normal: usize,
        miss: usize,
        window: usize,
    },
    WaveScheduled {
        descriptor_id: String,
        instance_id: u64,
        spawn_at_ms: f64,
        fallback: bool,
    },
    WaveSpawned {
        descriptor_id: String,
        instance_id: u64,
        entity_count: usize,
    },
    WaveCompleted {
        instance_id: u64,
    },
    /// Beat ignored because the spawn queue was full
    BeatDropped {
        band: Band,
        queue_depth: usize,
    },
    TapLost {
        at_ms: f64,
    },
    QueueOccupancy {
        percent: f32,
    },
}
