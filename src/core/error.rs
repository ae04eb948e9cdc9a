/// dbexec Error Module
///
/// This module defines the error types surfaced by the crate. Ordinary
/// statement and transaction failures are reported through `Response` and
/// `bool` return values; `DbError` is what callers see when the API itself
/// is misused or when configuration cannot be loaded.
use thiserror::Error;

/// Comprehensive error type for dbexec.
///
/// This enum covers:
/// - Programming errors (invalid API usage)
/// - Configuration loading and validation
/// - Encoding of responses for output
#[derive(Error, Debug)]
pub enum DbError {
    /// Invalid API usage, such as an empty batch or an unknown response field
    #[error("Programming error: {0}")]
    Programming(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Type alias for Result to use DbError as the error type.
pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let prog = DbError::Programming("'foo' does not exist".to_string());
        assert!(prog.to_string().contains("Programming error"));

        let config_err = DbError::Config("Undefined host".to_string());
        assert!(config_err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DbError = io_err.into();
        match err {
            DbError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }

        let json_err = serde_json::from_str::<serde_json::Value>("{ invalid json }").unwrap_err();
        let err: DbError = json_err.into();
        match err {
            DbError::Json(_) => {}
            _ => panic!("Expected JSON error"),
        }

        let toml_err = toml::from_str::<toml::Value>("key = ").unwrap_err();
        let err: DbError = toml_err.into();
        assert!(err.to_string().starts_with("TOML error"));
    }
}
