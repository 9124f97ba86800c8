//! Duplex configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! metrics_start = "2021-10-01T00:00:00Z"
//! default_rollup_secs = 3600
//! mode = "background"
//! ```

use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Default comparison granularity in seconds
pub const DEFAULT_ROLLUP_SECS: i64 = 3600;

/// Where the secondary call and comparison run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowMode {
    /// Awaited before the primary result is returned
    #[default]
    Inline,
    /// Detached task on the current tokio runtime
    Background,
}

/// Proxy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplexConfig {
    /// First instant for which the secondary backend has complete data
    pub metrics_start: DateTime<Utc>,
    /// Rollup used by operations that take none
    pub default_rollup_secs: i64,
    /// Shadow execution mode
    pub mode: ShadowMode,
}

impl DuplexConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With metrics start
    #[inline]
    #[must_use]
    pub fn with_metrics_start(mut self, metrics_start: DateTime<Utc>) -> Self {
        self.metrics_start = metrics_start;
        self
    }

    /// With default rollup
    #[inline]
    #[must_use]
    pub fn with_default_rollup(mut self, rollup_secs: i64) -> Self {
        self.default_rollup_secs = rollup_secs;
        self
    }

    /// With shadow mode
    #[inline]
    #[must_use]
    pub fn with_mode(mut self, mode: ShadowMode) -> Self {
        self.mode = mode;
        self
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the document does not parse or validate
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read, parsed or validated
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for a non-positive rollup
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_rollup_secs <= 0 {
            return Err(ConfigError::Invalid(format!(
                "default_rollup_secs must be positive, got {}",
                self.default_rollup_secs
            )));
        }
        Ok(())
    }
}

impl Default for DuplexConfig {
    fn default() -> Self {
        Self {
            metrics_start: DateTime::<Utc>::default(),
            default_rollup_secs: DEFAULT_ROLLUP_SECS,
            mode: ShadowMode::Inline,
        }
    }
}

/// Source of "now" for gating decisions
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
