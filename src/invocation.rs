//! Flushing metrics around each invocation of a function handler
//!
//! Inspired by Lambda Power Tools
//!
//! # Example
//! ```
//! use metrics_cloudwatch_powertools::{Builder, Error, InvocationContext, MetricUnit};
//!
//! let mut metrics = Builder::new()
//!     .cloudwatch_namespace("MetricsExample")
//!     .service("Booking")
//!     .capture_cold_start_metric(true)
//!     .init();
//!
//! let context = InvocationContext::new("booking-handler");
//! let booked = metrics.log_metrics(&context, |metrics| {
//!     metrics.add_metric("SuccessfulBooking", MetricUnit::Count, 1)?;
//!     Ok::<_, Error>(true)
//! });
//! assert!(booked.unwrap());
//! ```
//!
//! # Output
//!
//! ```plaintext
//! {"_aws":{"Timestamp":1687947426188,"CloudWatchMetrics":[{"Namespace":"MetricsExample","Dimensions":[["service","function_name"]],"Metrics":[{"Name":"ColdStart","Unit":"Count"}]}]},"function_name":"booking-handler","service":"Booking","ColdStart":1}
//! {"_aws":{"Timestamp":1687947426188,"CloudWatchMetrics":[{"Namespace":"MetricsExample","Dimensions":[["service"]],"Metrics":[{"Name":"SuccessfulBooking","Unit":"Count"}]}]},"service":"Booking","SuccessfulBooking":1}
//! ```

use super::collector::Collector;
use super::error::MetricsError;
use super::unit::MetricUnit;
use super::Error;
use std::ops::{Deref, DerefMut};
use tracing::{debug, error, warn};

/// Name of the metric written on the first invocation when cold starts are captured
pub const COLD_START_METRIC: &str = "ColdStart";

/// Details of the invocation being handled
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvocationContext {
    pub function_name: String,
    pub request_id: Option<String>,
}

impl InvocationContext {
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

#[cfg(feature = "lambda")]
impl From<&lambda_runtime::Context> for InvocationContext {
    fn from(context: &lambda_runtime::Context) -> Self {
        Self {
            function_name: context.env_config.function_name.clone(),
            request_id: Some(context.request_id.clone()),
        }
    }
}

/// [Collector] wrapper flushing the metric set after every handler invocation
///
/// Keep one instance for the lifetime of the process so metrics, dimensions and the cold start
/// state carry over warm invocations. Use [Builder::init](super::Builder::init) to construct.
pub struct Metrics {
    collector: Collector,
    is_cold_start: bool,
}

impl Metrics {
    pub fn new(collector: Collector) -> Self {
        Self {
            collector,
            is_cold_start: true,
        }
    }

    pub fn is_cold_start(&self) -> bool {
        self.is_cold_start
    }

    /// Run `handler` then serialize, write and clear the metric set
    ///
    /// * The metric set is flushed whether the handler returns an error or panics
    /// * The handler always runs, even if writing the cold start metric failed
    /// * The handler's error is returned unless flushing fails, the flush error wins, then the
    ///   cold start error
    /// * An empty metric set logs a warning and writes nothing, unless
    ///   [raise_on_empty_metrics](super::Builder::raise_on_empty_metrics) is set
    pub fn log_metrics<T, E, F>(&mut self, context: &InvocationContext, handler: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Collector) -> Result<T, E>,
        E: Into<Error>,
    {
        if let (Some(key), Some(request_id)) = (&self.collector.config.request_id_metadata, &context.request_id) {
            let (key, request_id) = (key.clone(), request_id.clone());
            self.collector.add_metadata(key, request_id);
        }

        let mut cold_start = Ok(());
        if self.collector.config.capture_cold_start_metric && self.is_cold_start {
            self.is_cold_start = false;
            debug!("Capturing cold start metric for {}", context.function_name);
            cold_start = self.collector.write_single(
                COLD_START_METRIC,
                MetricUnit::Count,
                1,
                &[("function_name", context.function_name.as_str())],
            );
        }

        let mut guard = FlushGuard {
            collector: &mut self.collector,
            armed: true,
        };
        let result = handler(&mut *guard.collector);
        let flushed = guard.finish().and(cold_start);

        match (result, flushed) {
            (_, Err(err)) => Err(err.into()),
            (Ok(value), Ok(())) => Ok(value),
            (Err(err), Ok(())) => Err(err.into()),
        }
    }
}

impl Deref for Metrics {
    type Target = Collector;

    fn deref(&self) -> &Collector {
        &self.collector
    }
}

impl DerefMut for Metrics {
    fn deref_mut(&mut self) -> &mut Collector {
        &mut self.collector
    }
}

/// Flushes the metric set when dropped while still armed, i.e. when the handler panicked
struct FlushGuard<'a> {
    collector: &'a mut Collector,
    armed: bool,
}

impl FlushGuard<'_> {
    fn finish(mut self) -> Result<(), MetricsError> {
        self.armed = false;
        publish(&mut *self.collector)
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(err) = publish(&mut *self.collector) {
                error!("Failed to flush metrics after the handler panicked: {err}");
            }
        }
    }
}

/// Write and clear the metric set, the set is cleared even if writing fails
fn publish(collector: &mut Collector) -> Result<(), MetricsError> {
    if collector.metric_set().is_empty() && !collector.config.raise_on_empty_metrics {
        warn!("No metrics to publish, skipping");
        collector.clear_metrics();
        return Ok(());
    }

    let result = collector.emit();
    collector.clear_metrics();
    result
}
