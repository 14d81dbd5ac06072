// Beat Director Core - beat-synchronized timing and wave scheduling
// Frame-driven components sharing one injected clock

// Module declarations
pub mod analysis;
pub mod audio;
pub mod clock;
pub mod config;
pub mod director;
pub mod error;
pub mod events;
pub mod simulation;
pub mod telemetry;

// Re-exports for convenience
pub use analysis::{AudioAnalyzer, Band, BeatEvent, BeatJudge, Judgment};
pub use audio::Conductor;
pub use clock::{monotonic_time_source, ManualClock, TimeSource};
pub use config::AppConfig;
pub use director::{Playlist, WaveDescriptor, WaveDirector};
pub use error::{ConfigError, DirectorError, ErrorCode};
