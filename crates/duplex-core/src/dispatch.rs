//! Dispatch proxy
//!
//! [`DuplexBackend`] forwards every call to the primary backend and returns
//! its result. When the call's gate allows it, the same request is replayed
//! against the secondary backend and both results are compared.
//!
//! # Invariants
//!
//! - The caller always receives exactly the primary result.
//! - Secondary errors and panics are recorded, never propagated or retried.
//! - The secondary is never invoked when the primary fails or the gate is closed.
//! - The comparison works on a snapshot taken before the result is returned.

use crate::backend::ReleaseHealthBackend;
use crate::config::{Clock, DuplexConfig, ShadowMode, SystemClock};
use crate::error::BackendError;
use crate::gate::Gate;
use crate::sink::{CallContext, ComparisonReport, DiscrepancySink, ShadowFailure, TracingSink};
use crate::types::StatsPeriod;
use chrono::{DateTime, Duration, Utc};
use duplex_compare::{compare_values, Schema, ToValue, Value};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Proxy comparing a secondary backend against a primary one
#[derive(Debug, Clone)]
pub struct DuplexBackend {
    primary: Arc<dyn ReleaseHealthBackend>,
    secondary: Arc<dyn ReleaseHealthBackend>,
    config: DuplexConfig,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn DiscrepancySink>,
}

impl DuplexBackend {
    /// Create proxy logging through `tracing` on the wall clock
    #[must_use]
    pub fn new(
        primary: Arc<dyn ReleaseHealthBackend>,
        secondary: Arc<dyn ReleaseHealthBackend>,
        config: DuplexConfig,
    ) -> Self {
        Self {
            primary,
            secondary,
            config,
            clock: Arc::new(SystemClock),
            sink: Arc::new(TracingSink),
        }
    }

    /// With sink
    #[inline]
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn DiscrepancySink>) -> Self {
        self.sink = sink;
        self
    }

    /// With clock
    #[inline]
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Primary backend
    #[inline]
    #[must_use]
    pub fn primary(&self) -> &Arc<dyn ReleaseHealthBackend> {
        &self.primary
    }

    /// Secondary backend
    #[inline]
    #[must_use]
    pub fn secondary(&self) -> &Arc<dyn ReleaseHealthBackend> {
        &self.secondary
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &DuplexConfig {
        &self.config
    }

    #[inline]
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[inline]
    pub(crate) fn default_rollup(&self) -> i64 {
        self.config.default_rollup_secs
    }

    /// Check if the secondary has data for `instant`
    #[inline]
    pub(crate) fn covers(&self, instant: DateTime<Utc>) -> bool {
        instant > self.config.metrics_start
    }

    /// Check if the secondary has data for the trailing `window`
    #[inline]
    pub(crate) fn covers_last(&self, window: Duration) -> bool {
        self.covers(self.now() - window)
    }

    /// Resolve a stats period into its gate and rollup
    ///
    /// Unknown periods close the gate.
    pub(crate) fn stats_window<T>(
        &self,
        operation: &'static str,
        stats_period: Option<&str>,
        scope: &str,
    ) -> (Gate<T>, i64) {
        match StatsPeriod::for_scope(stats_period, scope) {
            Ok(period) => (
                Gate::from(self.covers(period.start(self.now()))),
                period.rollup_secs(),
            ),
            Err(err) => {
                tracing::warn!(operation, error = %err, "skipping shadow comparison");
                (Gate::closed(), self.default_rollup())
            }
        }
    }

    /// Return the primary result, shadowing it against the secondary
    pub(crate) async fn shadow<Req, T, F>(
        &self,
        call: ShadowCall<'_, Req>,
        primary: Result<T, BackendError>,
        gate: Gate<T>,
        secondary: F,
    ) -> Result<T, BackendError>
    where
        Req: Clone + Serialize + Send + Sync + 'static,
        T: ToValue + Send + 'static,
        F: FnOnce(Arc<dyn ReleaseHealthBackend>, Req) -> BoxFuture<'static, Result<T, BackendError>>
            + Send,
    {
        let result = primary?;
        let operation = call.operation;

        if !gate.allows(&result) {
            tracing::debug!(operation, "shadow comparison skipped");
            metrics::counter!("duplex_shadow_skipped_total", "operation" => operation).increment(1);
            return Ok(result);
        }

        let task = ShadowTask {
            sink: Arc::clone(&self.sink),
            context: CallContext {
                operation,
                arguments: call_arguments(operation, call.request),
                timestamp: self.now(),
            },
            snapshot: result.to_value(),
            schema: call.schema,
            rollup_secs: call.rollup_secs,
        };
        let pending = secondary(Arc::clone(&self.secondary), call.request.clone());

        match self.config.mode {
            ShadowMode::Inline => task.run(pending).await,
            ShadowMode::Background => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(task.run(pending));
                }
                Err(_) => task.run(pending).await,
            },
        }

        Ok(result)
    }
}

/// Static description of one proxied call
#[derive(Debug)]
pub(crate) struct ShadowCall<'a, Req> {
    pub(crate) operation: &'static str,
    pub(crate) request: &'a Req,
    pub(crate) schema: Schema,
    pub(crate) rollup_secs: i64,
}

impl<'a, Req> ShadowCall<'a, Req> {
    pub(crate) fn new(
        operation: &'static str,
        request: &'a Req,
        schema: Schema,
        rollup_secs: i64,
    ) -> Self {
        Self {
            operation,
            request,
            schema,
            rollup_secs,
        }
    }
}

/// Owned state of the secondary half of a call
struct ShadowTask {
    sink: Arc<dyn DiscrepancySink>,
    context: CallContext,
    snapshot: Value,
    schema: Schema,
    rollup_secs: i64,
}

impl ShadowTask {
    async fn run<T: ToValue>(self, pending: BoxFuture<'static, Result<T, BackendError>>) {
        let Self {
            sink,
            context,
            snapshot,
            schema,
            rollup_secs,
        } = self;
        let operation = context.operation;

        let outcome = AssertUnwindSafe(async {
            let secondary = pending.await?;
            Ok::<_, BackendError>(compare_values(
                &snapshot,
                &secondary.to_value(),
                &schema,
                rollup_secs,
            ))
        })
        .catch_unwind()
        .await;

        let error = match outcome {
            Ok(Ok(discrepancies)) => {
                metrics::counter!("duplex_shadow_compared_total", "operation" => operation)
                    .increment(1);
                metrics::counter!("duplex_shadow_discrepancies_total", "operation" => operation)
                    .increment(discrepancies.len() as u64);
                sink.record(ComparisonReport {
                    context,
                    rollup_secs,
                    discrepancies,
                });
                return;
            }
            Ok(Err(err)) => err.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        tracing::warn!(operation, error = %error, "secondary backend call failed");
        metrics::counter!("duplex_shadow_failed_total", "operation" => operation).increment(1);
        sink.record_failure(ShadowFailure { context, error });
    }
}

fn call_arguments<Req: Serialize>(operation: &'static str, request: &Req) -> serde_json::Value {
    serde_json::to_value(request).unwrap_or_else(|err| {
        tracing::warn!(operation, error = %err, "failed to serialize call arguments");
        serde_json::Value::Null
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("secondary backend panicked: {detail}")
}
