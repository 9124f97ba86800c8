//! Duplex Core - release-health shadow proxy
//!
//! Validates a backend migration in production traffic:
//! - Serves every call from the primary backend
//! - Replays gated calls against the secondary backend
//! - Compares both results under per-operation schemas
//! - Records discrepancies and secondary failures in a sink
//!
//! # Example
//!
//! ```rust,ignore
//! use duplex_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     primary: Arc<dyn ReleaseHealthBackend>,
//! #     secondary: Arc<dyn ReleaseHealthBackend>,
//! #     request: SessionsCountRequest,
//! # ) -> Result<(), BackendError> {
//! let sink = Arc::new(MemorySink::new());
//! let duplex = DuplexBackend::new(primary, secondary, DuplexConfig::new())
//!     .with_sink(sink.clone());
//!
//! let count = duplex.get_project_sessions_count(&request).await?;
//! println!("{count} sessions, {} reports", sink.reports().len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod backend;
pub mod config;
pub mod dispatch;
mod duplex;
pub mod error;
pub mod gate;
pub mod request;
pub mod sink;
pub mod types;

// Re-exports for convenience
pub use backend::ReleaseHealthBackend;
pub use config::{Clock, DuplexConfig, FixedClock, ShadowMode, SystemClock, DEFAULT_ROLLUP_SECS};
pub use dispatch::DuplexBackend;
pub use error::{BackendError, ConfigError, StatsPeriodError};
pub use gate::Gate;
pub use request::{
    ChangedAdoptionsRequest, CrashFreeBreakdownRequest, CrashFreeRatesRequest,
    HasHealthDataRequest, HealthOverviewRequest, OldestHealthDataRequest, ReleaseAdoptionRequest,
    ReleaseStatsRequest, ReleasesByStabilityRequest, ReleasesCountRequest,
    ReleasesHealthDataRequest, SessionsCountRequest, SessionsPerProjectRequest,
    SessionsQueryRequest, TimeBoundsRequest,
};
pub use sink::{
    CallContext, ChannelSink, ComparisonReport, DiscrepancySink, MemorySink, ShadowEvent,
    ShadowFailure, TracingSink,
};
pub use types::{
    CrashFreeBreakdown, CrashFreeRates, CurrentAndPreviousCrashFreeRates, EnvironmentName,
    OrganizationId, OverviewStat, ProjectId, ProjectOrRelease, ProjectRelease,
    ProjectReleaseStats, ProjectWithCount, QueryDefinition, ReleaseAdoption,
    ReleaseHealthOverview, ReleaseName, ReleaseSessionsTimeBounds, ReleasesAdoption,
    SessionsQueryGroup, SessionsQueryResult, StatsBucket, StatsPeriod,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Duplex Core
    pub use crate::request::*;
    pub use crate::{
        BackendError, ChannelSink, ComparisonReport, DiscrepancySink, DuplexBackend,
        DuplexConfig, FixedClock, MemorySink, ProjectId, ProjectRelease, ReleaseHealthBackend,
        ShadowEvent, ShadowMode,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
