//! Discrepancy sinks
//!
//! Provides the destinations for shadow outcomes:
//! - [`TracingSink`]: structured log lines (default)
//! - [`MemorySink`]: append-only in-memory log for tests and replay
//! - [`ChannelSink`]: forwards every outcome to a tokio channel
//!
//! Sinks are shared between concurrent shadow tasks and must not block.

use chrono::{DateTime, Utc};
use duplex_compare::Discrepancy;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc;

/// Identity of one proxied call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallContext {
    /// Operation name
    pub operation: &'static str,
    /// Serialized request
    pub arguments: serde_json::Value,
    /// When the primary answered
    pub timestamp: DateTime<Utc>,
}

/// Outcome of comparing the secondary against the primary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub context: CallContext,
    pub rollup_secs: i64,
    pub discrepancies: Vec<Discrepancy>,
}

impl ComparisonReport {
    /// Check if both backends agreed
    #[inline]
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// Secondary call that errored or panicked
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShadowFailure {
    pub context: CallContext,
    pub error: String,
}

/// Either outcome of a shadow call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ShadowEvent {
    Compared(ComparisonReport),
    Failed(ShadowFailure),
}

/// Destination for shadow outcomes
pub trait DiscrepancySink: Send + Sync + fmt::Debug {
    /// Record a finished comparison
    fn record(&self, report: ComparisonReport);

    /// Record a failed secondary call
    fn record_failure(&self, failure: ShadowFailure);
}

/// Logs outcomes through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiscrepancySink for TracingSink {
    fn record(&self, report: ComparisonReport) {
        let operation = report.context.operation;
        for discrepancy in &report.discrepancies {
            tracing::warn!(
                operation,
                path = %discrepancy.path,
                kind = ?discrepancy.kind,
                "{}",
                discrepancy.message
            );
        }
        tracing::info!(
            operation,
            discrepancies = report.discrepancies.len(),
            rollup_secs = report.rollup_secs,
            arguments = %report.context.arguments,
            "shadow comparison finished"
        );
    }

    fn record_failure(&self, failure: ShadowFailure) {
        tracing::warn!(
            operation = failure.context.operation,
            arguments = %failure.context.arguments,
            error = %failure.error,
            "secondary backend failed"
        );
    }
}

/// Append-only in-memory log
#[derive(Debug, Default)]
pub struct MemorySink {
    inner: Mutex<Vec<ShadowEvent>>,
}

impl MemorySink {
    /// Create empty sink
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in recording order
    #[must_use]
    pub fn events(&self) -> Vec<ShadowEvent> {
        self.inner.lock().clone()
    }

    /// Recorded comparisons
    #[must_use]
    pub fn reports(&self) -> Vec<ComparisonReport> {
        self.inner
            .lock()
            .iter()
            .filter_map(|event| match event {
                ShadowEvent::Compared(report) => Some(report.clone()),
                ShadowEvent::Failed(_) => None,
            })
            .collect()
    }

    /// Recorded failures
    #[must_use]
    pub fn failures(&self) -> Vec<ShadowFailure> {
        self.inner
            .lock()
            .iter()
            .filter_map(|event| match event {
                ShadowEvent::Failed(failure) => Some(failure.clone()),
                ShadowEvent::Compared(_) => None,
            })
            .collect()
    }

    /// Number of recorded events
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl DiscrepancySink for MemorySink {
    fn record(&self, report: ComparisonReport) {
        self.inner.lock().push(ShadowEvent::Compared(report));
    }

    fn record_failure(&self, failure: ShadowFailure) {
        self.inner.lock().push(ShadowEvent::Failed(failure));
    }
}

/// Forwards outcomes to an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ShadowEvent>,
}

impl ChannelSink {
    /// Create sink and its receiving end
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ShadowEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ShadowEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("shadow event dropped, receiver closed");
        }
    }
}

impl DiscrepancySink for ChannelSink {
    fn record(&self, report: ComparisonReport) {
        self.send(ShadowEvent::Compared(report));
    }

    fn record_failure(&self, failure: ShadowFailure) {
        self.send(ShadowEvent::Failed(failure));
    }
}
