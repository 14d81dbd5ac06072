// Configuration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Configuration error code constants
///
/// Error code range: 3001-3003
pub struct ConfigErrorCodes {}

impl ConfigErrorCodes {
    /// Config or playlist file could not be read
    pub const IO: i32 = 3001;

    /// JSON could not be parsed into the expected shape
    pub const PARSE: i32 = 3002;

    /// A field holds a value outside its accepted range
    pub const INVALID_VALUE: i32 = 3003;
}

/// Log a configuration error with structured context
pub fn log_config_error(err: &ConfigError, context: &str) {
    error!(
        "Config error in {}: code={}, component=Config, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Configuration and playlist loading errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// File could not be read
    Io { path: String, reason: String },

    /// JSON was malformed or did not match the schema
    Parse { reason: String },

    /// A field failed validation
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::Io { .. } => ConfigErrorCodes::IO,
            ConfigError::Parse { .. } => ConfigErrorCodes::PARSE,
            ConfigError::InvalidValue { .. } => ConfigErrorCodes::INVALID_VALUE,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::Io { path, reason } => {
                format!("Failed to read {}: {}", path, reason)
            }
            ConfigError::Parse { reason } => format!("Invalid JSON: {}", reason),
            ConfigError::InvalidValue { field, reason } => {
                format!("Invalid value for {}: {}", field, reason)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_codes() {
        assert_eq!(
            ConfigError::Io {
                path: "a".to_string(),
                reason: "b".to_string()
            }
            .code(),
            ConfigErrorCodes::IO
        );
        assert_eq!(
            ConfigError::Parse {
                reason: "x".to_string()
            }
            .code(),
            ConfigErrorCodes::PARSE
        );
        assert_eq!(
            ConfigError::invalid("judge.window", "not finite").code(),
            ConfigErrorCodes::INVALID_VALUE
        );
    }

    #[test]
    fn test_serde_error_conversion() {
        let err: ConfigError = serde_json::from_str::<u32>("{").unwrap_err().into();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("3002"));
    }

    #[test]
    fn test_invalid_value_message_names_field() {
        let err = ConfigError::invalid("director.max_queue_depth", "must be at least 1");
        assert!(err.message().contains("director.max_queue_depth"));
        assert!(err.message().contains("at least 1"));
    }
}
