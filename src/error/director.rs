// Wave director construction errors

use crate::error::{ConfigError, ErrorCode};
use log::error;
use std::fmt;

/// Director error code constants
///
/// Error code range: 4001-4002
pub struct DirectorErrorCodes {}

impl DirectorErrorCodes {
    /// Director configuration failed validation
    pub const INVALID_CONFIG: i32 = 4001;

    /// Two playlist entries share the same id
    pub const DUPLICATE_DESCRIPTOR: i32 = 4002;
}

/// Log a director error with structured context
pub fn log_director_error(err: &DirectorError, context: &str) {
    error!(
        "Director error in {}: code={}, component=WaveDirector, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised when building a [`crate::director::WaveDirector`]
///
/// These are programmer errors: they surface at construction and never
/// during `enqueue_beat`/`update`.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectorError {
    /// Configuration is unusable
    InvalidConfig { reason: String },

    /// Playlist contains the same descriptor id twice
    DuplicateDescriptor { id: String },
}

impl ErrorCode for DirectorError {
    fn code(&self) -> i32 {
        match self {
            DirectorError::InvalidConfig { .. } => DirectorErrorCodes::INVALID_CONFIG,
            DirectorError::DuplicateDescriptor { .. } => DirectorErrorCodes::DUPLICATE_DESCRIPTOR,
        }
    }

    fn message(&self) -> String {
        match self {
            DirectorError::InvalidConfig { reason } => {
                format!("Invalid director configuration: {}", reason)
            }
            DirectorError::DuplicateDescriptor { id } => {
                format!("Playlist contains duplicate wave id '{}'", id)
            }
        }
    }
}

impl fmt::Display for DirectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DirectorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for DirectorError {}

impl From<ConfigError> for DirectorError {
    fn from(err: ConfigError) -> Self {
        DirectorError::InvalidConfig {
            reason: err.message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_director_error_codes() {
        assert_eq!(
            DirectorError::InvalidConfig {
                reason: "x".to_string()
            }
            .code(),
            DirectorErrorCodes::INVALID_CONFIG
        );
        assert_eq!(
            DirectorError::DuplicateDescriptor {
                id: "w1".to_string()
            }
            .code(),
            DirectorErrorCodes::DUPLICATE_DESCRIPTOR
        );
    }

    #[test]
    fn test_config_error_conversion_keeps_message() {
        let err: DirectorError =
            ConfigError::invalid("director.max_queue_depth", "must be at least 1").into();
        match err {
            DirectorError::InvalidConfig { reason } => {
                assert!(reason.contains("max_queue_depth"));
            }
            other => panic!("Expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_error_code_trait_object() {
        let err: &dyn ErrorCode = &DirectorError::DuplicateDescriptor {
            id: "w1".to_string(),
        };
        assert_eq!(err.code(), 4002);
        assert!(err.message().contains("w1"));
    }
}
