//! Error types for Duplex Core
//!
//! Provides error handling for:
//! - Backend calls (primary errors propagate, secondary errors are recorded)
//! - Configuration loading and validation
//! - Stats period resolution

/// Error returned by a release-health backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Backend cannot be reached
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Query rejected by the backend
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Backend failed while serving the query
    #[error("internal backend error: {0}")]
    Internal(String),

    /// Backend did not answer in time
    #[error("backend timed out after {duration_secs}s")]
    Timeout { duration_secs: u64 },
}

impl BackendError {
    /// Check if the error is transient
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is not valid TOML for [`crate::DuplexConfig`]
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration parsed but holds unusable values
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Unknown stats period
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid stats period: {0}")]
pub struct StatsPeriodError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_display() {
        let err = BackendError::Unavailable("metrics cluster".to_string());
        assert_eq!(err.to_string(), "backend unavailable: metrics cluster");
        let err = BackendError::Timeout { duration_secs: 30 };
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn backend_error_is_transient() {
        assert!(BackendError::Unavailable("x".to_string()).is_transient());
        assert!(BackendError::Timeout { duration_secs: 1 }.is_transient());
        assert!(!BackendError::InvalidQuery("x".to_string()).is_transient());
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::Invalid("default_rollup_secs must be positive".to_string());
        assert!(err.to_string().starts_with("invalid configuration"));
    }
}
