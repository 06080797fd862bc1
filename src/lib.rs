pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

pub use {
    builder::{Builder, NAMESPACE_ENV, SERVICE_ENV},
    collector::{Collector, MetricRecord, MAX_DIMENSIONS, MAX_METRICS},
    error::{MetricsError, DIMENSIONS_PATH, METRICS_PATH, NAMESPACE_PATH},
    invocation::{InvocationContext, Metrics, COLD_START_METRIC},
    unit::{IntoMetricUnit, MetricUnit},
};

mod builder;
mod collector;
mod emf;
mod error;
mod invocation;
mod unit;
