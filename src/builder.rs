use super::collector::{self, Collector};
use super::error::MetricsError;
use super::invocation::Metrics;
use super::unit::IntoMetricUnit;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;

/// Environment variable consulted when no namespace is given to the builder
pub const NAMESPACE_ENV: &str = "POWERTOOLS_METRICS_NAMESPACE";

/// Environment variable consulted when no service is given to the builder
pub const SERVICE_ENV: &str = "POWERTOOLS_SERVICE_NAME";

/// Builder for the Embedded Cloudwatch Metrics Collector
///
/// Explicit settings win over the `POWERTOOLS_METRICS_NAMESPACE` and `POWERTOOLS_SERVICE_NAME`
/// environment variables, which are read once when the builder is consumed
///
/// # Example
/// ```
///  let metrics = metrics_cloudwatch_powertools::Builder::new()
///      .cloudwatch_namespace("MyApplication")
///      .service("Payment")
///      .init();
/// ```
pub struct Builder {
    cloudwatch_namespace: Option<String>,
    service: Option<String>,
    default_dimensions: Vec<(String, String)>,
    timestamp: Option<u64>,
    writer: Option<Box<dyn Write + Send>>,
    capture_cold_start_metric: bool,
    raise_on_empty_metrics: bool,
    request_id_metadata: Option<String>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            cloudwatch_namespace: None,
            service: None,
            default_dimensions: Vec::new(),
            timestamp: None,
            writer: None,
            capture_cold_start_metric: false,
            raise_on_empty_metrics: false,
            request_id_metadata: None,
        }
    }

    /// Sets the CloudWatch namespace for all metrics
    /// * Falls back to `POWERTOOLS_METRICS_NAMESPACE`, serializing without either fails
    pub fn cloudwatch_namespace(self, namespace: impl Into<String>) -> Self {
        Self {
            cloudwatch_namespace: Some(namespace.into()),
            ..self
        }
    }

    /// Sets the service name, emitted as the `service` dimension with every document
    /// * Falls back to `POWERTOOLS_SERVICE_NAME`
    pub fn service(self, service: impl Into<String>) -> Self {
        Self {
            service: Some(service.into()),
            ..self
        }
    }

    /// Adds a static dimension (name, value), that will be sent with each document.
    /// * This method can be called multiple times with distinct names
    /// * Static dimensions count towards the limit of 10 dimensions
    pub fn with_dimension(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.default_dimensions.push((name.into(), value.to_string()));
        self
    }

    /// Use a fixed timestamp instead of the time of serialization
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Write documents somewhere other than stdout
    pub fn with_writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    /// Emits a `ColdStart` metric with a `function_name` dimension on the first invocation
    /// handled by [Metrics::log_metrics]
    pub fn capture_cold_start_metric(mut self, capture: bool) -> Self {
        self.capture_cold_start_metric = capture;
        self
    }

    /// Makes [Metrics::log_metrics] fail when an invocation recorded no metrics, instead of
    /// logging a warning
    pub fn raise_on_empty_metrics(mut self, raise: bool) -> Self {
        self.raise_on_empty_metrics = raise;
        self
    }

    /// Decorates every document written by [Metrics::log_metrics] with the invocation request id
    /// as a metadata property with the given name
    pub fn with_request_id_metadata(mut self, name: impl Into<String>) -> Self {
        self.request_id_metadata = Some(name.into());
        self
    }

    /// Private helper for consuming the builder into collector configuration
    fn build_config(self) -> (collector::Config, Box<dyn Write + Send>) {
        let namespace = non_empty(self.cloudwatch_namespace).or_else(|| non_empty(std::env::var(NAMESPACE_ENV).ok()));
        let service = non_empty(self.service).or_else(|| non_empty(std::env::var(SERVICE_ENV).ok()));

        let mut default_dimensions = BTreeMap::new();
        if let Some(service) = service {
            default_dimensions.insert("service".to_string(), service);
        }
        default_dimensions.extend(self.default_dimensions);

        let config = collector::Config {
            namespace,
            default_dimensions,
            timestamp: self.timestamp,
            capture_cold_start_metric: self.capture_cold_start_metric,
            raise_on_empty_metrics: self.raise_on_empty_metrics,
            request_id_metadata: self.request_id_metadata,
        };
        let writer = self.writer.unwrap_or_else(|| Box::new(std::io::stdout()));
        (config, writer)
    }

    /// Build a metric store to add metrics to and flush by hand
    pub fn build(self) -> Collector {
        let (config, writer) = self.build_config();
        Collector::new(config, writer)
    }

    /// Build the invocation wrapper, see [Metrics::log_metrics]
    pub fn init(self) -> Metrics {
        Metrics::new(self.build())
    }

    /// Record one metric in a private store, let `scope` add to it, then flush it
    ///
    /// The document is written when the scope returns, even if it returned an error.
    /// A flush error takes precedence over the scope's error.
    ///
    /// # Example
    /// ```
    /// use metrics_cloudwatch_powertools::{Builder, MetricUnit};
    ///
    /// Builder::new()
    ///     .cloudwatch_namespace("MyApplication")
    ///     .single_metric("SuccessfulBooking", MetricUnit::Count, 1, |metric| {
    ///         metric.add_dimension("environment", "prod");
    ///         Ok(())
    ///     })
    ///     .unwrap();
    /// ```
    pub fn single_metric<F>(
        self,
        name: impl Into<String>,
        unit: impl IntoMetricUnit,
        value: impl Into<Value>,
        scope: F,
    ) -> Result<(), MetricsError>
    where
        F: FnOnce(&mut Collector) -> Result<(), MetricsError>,
    {
        let mut collector = self.build();
        collector.add_metric(name, unit, value)?;

        let result = scope(&mut collector);
        collector.flush_metrics()?;
        result
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
