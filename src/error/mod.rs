// Error types for the beat director core
//
// Steady-state calls (phase queries, judging, analyzer/director updates)
// never fail; degraded operation is reported through return values and
// logging. The errors here cover configuration loading and programmer
// errors caught when a component is constructed.

mod config;
mod director;

pub use config::{log_config_error, ConfigError, ConfigErrorCodes};
pub use director::{log_director_error, DirectorError, DirectorErrorCodes};

/// Error codes for structured error reporting
///
/// Gives every error type a stable numeric code plus a human-readable
/// message so hosts can report them uniformly.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
