// Audio module - musical clock and deterministic test signals

pub mod conductor;
pub mod synth;

// Re-export commonly used types for convenience
pub use conductor::{beat_length_ms, BarStartEvent, Conductor, ConductorEventKind};
pub use synth::render_drum_track;
