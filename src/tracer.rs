//! Tracer trait for observing recipe propagation.
//!
//! The default [`NoopTracer`] discards everything. [`LogTracer`] forwards
//! every hook to the `tracing` crate.
//!
//! # Example
//!
//! ```
//! use grain::{Metric, SpanId, Tracer};
//!
//! struct PrintTracer;
//!
//! impl Tracer for PrintTracer {
//!     fn new_span_id(&self) -> SpanId {
//!         SpanId(1)
//!     }
//!
//!     fn on_metric_recomputed(&self, _span: SpanId, metric: Metric, value: Option<f64>) {
//!         println!("{metric} = {value:?}");
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::RecipeError;
use crate::graph::{InputCategory, Metric};

/// Identifier of one propagation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanId(pub u64);

/// Observer of recipe propagation.
///
/// All methods except [`new_span_id`](Tracer::new_span_id) have empty
/// defaults, so implementations only override what they need.
pub trait Tracer: Send + Sync + 'static {
    /// Generate a new unique span ID. Called once per propagation pass.
    fn new_span_id(&self) -> SpanId;

    /// Called before any metric of `plan` is recomputed. `category` is
    /// `None` for a full recompute.
    #[inline]
    fn on_propagation_start(&self, _span: SpanId, _category: Option<InputCategory>, _plan: &[Metric]) {}

    /// Called after a metric was recomputed into the staged set.
    #[inline]
    fn on_metric_recomputed(&self, _span: SpanId, _metric: Metric, _value: Option<f64>) {}

    /// Called once the staged metrics were committed.
    #[inline]
    fn on_propagation_end(&self, _span: SpanId, _category: Option<InputCategory>) {}

    /// Called when a failed propagation was rolled back.
    #[inline]
    fn on_rollback(&self, _span: SpanId, _category: Option<InputCategory>, _error: &RecipeError) {}
}

impl<T: Tracer> Tracer for Arc<T> {
    fn new_span_id(&self) -> SpanId {
        (**self).new_span_id()
    }

    fn on_propagation_start(&self, span: SpanId, category: Option<InputCategory>, plan: &[Metric]) {
        (**self).on_propagation_start(span, category, plan)
    }

    fn on_metric_recomputed(&self, span: SpanId, metric: Metric, value: Option<f64>) {
        (**self).on_metric_recomputed(span, metric, value)
    }

    fn on_propagation_end(&self, span: SpanId, category: Option<InputCategory>) {
        (**self).on_propagation_end(span, category)
    }

    fn on_rollback(&self, span: SpanId, category: Option<InputCategory>, error: &RecipeError) {
        (**self).on_rollback(span, category, error)
    }
}

/// Tracer that discards all events.
///
/// This is the default tracer for [`Recipe`](crate::Recipe).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

static NOOP_SPAN_COUNTER: AtomicU64 = AtomicU64::new(1);

impl Tracer for NoopTracer {
    #[inline(always)]
    fn new_span_id(&self) -> SpanId {
        SpanId(NOOP_SPAN_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Tracer that forwards every hook to `tracing` events.
#[derive(Debug, Default)]
pub struct LogTracer {
    next: AtomicU64,
}

impl LogTracer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tracer for LogTracer {
    fn new_span_id(&self) -> SpanId {
        SpanId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    fn on_propagation_start(&self, span: SpanId, category: Option<InputCategory>, plan: &[Metric]) {
        tracing::debug!(span = span.0, ?category, ?plan, "propagation started");
    }

    fn on_metric_recomputed(&self, span: SpanId, metric: Metric, value: Option<f64>) {
        tracing::debug!(span = span.0, %metric, ?value, "metric recomputed");
    }

    fn on_propagation_end(&self, span: SpanId, category: Option<InputCategory>) {
        tracing::debug!(span = span.0, ?category, "propagation committed");
    }

    fn on_rollback(&self, span: SpanId, category: Option<InputCategory>, error: &RecipeError) {
        tracing::warn!(span = span.0, ?category, %error, "propagation rolled back");
    }
}
