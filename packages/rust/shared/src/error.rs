//! Error types for landingsync.
//!
//! Library crates use [`LandingSyncError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all landingsync operations.
#[derive(Debug, thiserror::Error)]
pub enum LandingSyncError {
    /// A required credential or setting is absent or malformed.
    #[error("config error: {message}")]
    Config { message: String },

    /// The text generator failed or returned output we could not use.
    #[error("generation error: {0}")]
    Generation(String),

    /// A CRM record or association was not found or could not be fetched.
    #[error("lookup error: {message}")]
    Lookup { message: String },

    /// A row-creation batch was rejected by the publishing platform.
    #[error("publish batch error (HTTP {status}): {message}")]
    PublishBatch { status: u16, message: String },

    /// Transport-level HTTP failure.
    #[error("network error: {0}")]
    Network(String),

    /// Trigger input failed validation.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LandingSyncError>;

impl LandingSyncError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a lookup error from any displayable message.
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status category reported to external triggers.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Lookup { .. } => 404,
            Self::Generation(_) | Self::PublishBatch { .. } | Self::Network(_) => 502,
            Self::Config { .. } | Self::Io { .. } => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = LandingSyncError::config("missing OPENAI_API_KEY");
        assert_eq!(err.to_string(), "config error: missing OPENAI_API_KEY");

        let err = LandingSyncError::PublishBatch {
            status: 503,
            message: "upstream unavailable".into(),
        };
        assert_eq!(
            err.to_string(),
            "publish batch error (HTTP 503): upstream unavailable"
        );
    }

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(LandingSyncError::validation("x").status_code(), 400);
        assert_eq!(LandingSyncError::lookup("x").status_code(), 404);
        assert_eq!(LandingSyncError::Generation("x".into()).status_code(), 502);
        assert_eq!(LandingSyncError::config("x").status_code(), 500);
    }
}
