//! # Collector
//!
//! Metric store + emitter returned from [Builder::build](super::Builder::build)

use super::emf;
use super::error::{MetricsError, DIMENSIONS_PATH, METRICS_PATH, NAMESPACE_PATH};
use super::unit::{IntoMetricUnit, MetricUnit};
use serde::Serialize;
use serde_json::value::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// The Embedded Metric Format supports a maximum of 100 metrics per document
pub const MAX_METRICS: usize = 100;

/// CloudWatch supports a maximum of 10 dimensions per metric, service included
pub const MAX_DIMENSIONS: usize = 10;

/// Configuration via Builder
pub struct Config {
    pub namespace: Option<String>,
    /// Dimensions that survive [Collector::clear_metrics], the service dimension lives here
    pub default_dimensions: BTreeMap<String, String>,
    pub timestamp: Option<u64>,
    pub capture_cold_start_metric: bool,
    pub raise_on_empty_metrics: bool,
    pub request_id_metadata: Option<String>,
}

/// Every value recorded under one metric name
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricRecord {
    pub name: String,
    pub unit: MetricUnit,
    pub values: Vec<Value>,
}

impl MetricRecord {
    /// A single recorded value is written as is, repeated values as an array
    fn value(&self) -> Value {
        match self.values.as_slice() {
            [single] => single.clone(),
            values => Value::Array(values.to_vec()),
        }
    }
}

/// Embedded CloudWatch metric store + emitter
///
/// Use [Builder](super::Builder) to construct
///
/// # Example
/// ```
/// use metrics_cloudwatch_powertools::MetricUnit;
///
/// let mut metrics = metrics_cloudwatch_powertools::Builder::new()
///     .cloudwatch_namespace("MyApplication")
///     .build();
///
/// metrics.add_metric("requests", MetricUnit::Count, 1).unwrap();
/// metrics.add_dimension("Method", "Default");
/// metrics.add_metadata("RequestId", "ABC123");
/// metrics.flush_metrics().unwrap();
/// ```
pub struct Collector {
    pub config: Config,
    metrics: BTreeMap<String, MetricRecord>,
    dimensions: BTreeMap<String, String>,
    metadata: BTreeMap<String, Value>,
    writer: Box<dyn Write + Send>,
}

impl Collector {
    pub fn new(config: Config, writer: Box<dyn Write + Send>) -> Self {
        Self {
            config,
            metrics: BTreeMap::new(),
            dimensions: BTreeMap::new(),
            metadata: BTreeMap::new(),
            writer,
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.config.namespace.as_deref()
    }

    pub fn metric_set(&self) -> &BTreeMap<String, MetricRecord> {
        &self.metrics
    }

    /// Dimensions added through [add_dimension](Self::add_dimension), without the defaults
    pub fn dimension_set(&self) -> &BTreeMap<String, String> {
        &self.dimensions
    }

    pub fn default_dimensions(&self) -> &BTreeMap<String, String> {
        &self.config.default_dimensions
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    /// Record a value for a metric
    /// * Recording the same name again appends the value, the last unit given wins
    /// * Reaching [MAX_METRICS] distinct names flushes the metrics right away, dimensions and
    ///   metadata are kept for the next batch
    /// * The metrics are dropped even if that flush fails, the flush error is returned
    pub fn add_metric(
        &mut self,
        name: impl Into<String>,
        unit: impl IntoMetricUnit,
        value: impl Into<Value>,
    ) -> Result<&mut Self, MetricsError> {
        let unit = unit.into_metric_unit()?;
        let name = name.into();

        let record = self.metrics.entry(name.clone()).or_insert_with(|| MetricRecord {
            name,
            unit,
            values: Vec::new(),
        });
        record.unit = unit;
        record.values.push(value.into());

        if self.metrics.len() >= MAX_METRICS {
            debug!("Reached {MAX_METRICS} metrics, flushing the metric set");
            let result = self.emit();
            self.metrics.clear();
            result?;
        }

        Ok(self)
    }

    /// Add a dimension to emit with the metrics
    /// * Values are stored as their string representation
    /// * Setting a dimension with the same name again overwrites the previous value
    /// * Overwriting a default dimension (e.g. `service`) changes the default, so the new value
    ///   outlives [clear_metrics](Self::clear_metrics)
    pub fn add_dimension(&mut self, name: impl Into<String>, value: impl ToString) -> &mut Self {
        let name = name.into();
        let value = value.to_string();

        match self.config.default_dimensions.get_mut(&name) {
            Some(default) => *default = value,
            None => {
                self.dimensions.insert(name, value);
            }
        }
        self
    }

    /// Add a metadata property to emit with the metrics, it is neither a metric nor a dimension
    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Drop all metrics, dimensions and metadata, default dimensions are kept
    pub fn clear_metrics(&mut self) {
        debug!("Clearing out existing metric set from memory");
        self.metrics.clear();
        self.dimensions.clear();
        self.metadata.clear();
    }

    /// Validate and serialize the current metric set without clearing it
    pub fn serialize_metric_set(&self) -> Result<Value, MetricsError> {
        Ok(serde_json::to_value(self.document()?)?)
    }

    /// Write the current metric set as a single line to the configured writer, then clear it
    pub fn flush_metrics(&mut self) -> Result<(), MetricsError> {
        self.emit()?;
        self.clear_metrics();
        Ok(())
    }

    /// Write a single metric document, avoids touching the accumulated metric set
    /// * The document carries the default dimensions plus the given ones
    pub fn write_single(
        &mut self,
        name: &str,
        unit: impl IntoMetricUnit,
        value: impl Into<Value>,
        dimensions: &[(&str, &str)],
    ) -> Result<(), MetricsError> {
        let unit = unit.into_metric_unit()?;
        let value = value.into();
        if !value.is_number() {
            return Err(MetricsError::MetricValue {
                name: name.to_string(),
                value,
            });
        }

        let mut emf = emf::EmbeddedMetrics::new(self.resolved_namespace()?, self.timestamp());
        for (name, value) in &self.config.default_dimensions {
            emf.push_dimension(name, value);
        }
        for (name, value) in dimensions {
            emf.push_dimension(name, value);
        }
        emf.push_metric(name, unit, value);

        let line = serde_json::to_vec(&emf)?;
        self.write_line(line)
    }

    /// Compute the timestamp unless it was set via [Builder::with_timestamp](super::Builder::with_timestamp)
    fn timestamp(&self) -> u64 {
        match self.config.timestamp {
            Some(t) => t,
            None => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
        }
    }

    fn resolved_namespace(&self) -> Result<&str, MetricsError> {
        self.config
            .namespace
            .as_deref()
            .filter(|namespace| !namespace.is_empty())
            .ok_or_else(|| MetricsError::schema(NAMESPACE_PATH, "namespace must be set"))
    }

    /// Build the document, first failing check wins:
    /// namespace, dimension count, metric count, then metric values
    fn document(&self) -> Result<emf::EmbeddedMetrics<'_>, MetricsError> {
        let mut emf = emf::EmbeddedMetrics::new(self.resolved_namespace()?, self.timestamp());

        for (name, value) in self.config.default_dimensions.iter().chain(&self.dimensions) {
            emf.push_dimension(name, value);
        }
        if emf.dimension_count() > MAX_DIMENSIONS {
            return Err(MetricsError::schema(
                DIMENSIONS_PATH,
                format!(
                    "at most {MAX_DIMENSIONS} dimensions are allowed, found {}",
                    emf.dimension_count()
                ),
            ));
        }

        if self.metrics.is_empty() {
            return Err(MetricsError::schema(METRICS_PATH, "at least one metric is required"));
        }

        for (key, value) in &self.metadata {
            emf.metadata.insert(key, value);
        }

        for record in self.metrics.values() {
            if let Some(value) = record.values.iter().find(|value| !value.is_number()) {
                return Err(MetricsError::MetricValue {
                    name: record.name.clone(),
                    value: value.clone(),
                });
            }
            emf.push_metric(&record.name, record.unit, record.value());
        }

        Ok(emf)
    }

    /// Serialize and write the current metric set, state is left untouched
    pub(crate) fn emit(&mut self) -> Result<(), MetricsError> {
        let line = serde_json::to_vec(&self.document()?)?;
        debug!(
            "Flushing {} metrics to {}",
            self.metrics.len(),
            self.namespace().unwrap_or_default()
        );
        self.write_line(line)
    }

    fn write_line(&mut self, mut line: Vec<u8>) -> Result<(), MetricsError> {
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::SharedBuffer;
    use crate::Builder;
    use serde_json::json;

    fn collector(namespace: &str) -> (Collector, SharedBuffer) {
        let output = SharedBuffer::default();
        let collector = Builder::new()
            .cloudwatch_namespace(namespace)
            .with_timestamp(1687657545423)
            .with_writer(output.clone())
            .build();
        (collector, output)
    }

    #[test]
    fn serialize_single_metric() {
        let (mut metrics, _) = collector("test_namespace");
        metrics.add_metric("metric_one", MetricUnit::Count, 1).unwrap();
        metrics.add_dimension("test_dimension", "test");

        let doc = metrics.serialize_metric_set().unwrap();
        assert_eq!(
            doc,
            json!({
                "_aws": {
                    "Timestamp": 1687657545423u64,
                    "CloudWatchMetrics": [{
                        "Namespace": "test_namespace",
                        "Dimensions": [["test_dimension"]],
                        "Metrics": [{"Name": "metric_one", "Unit": "Count"}]
                    }]
                },
                "test_dimension": "test",
                "metric_one": 1
            })
        );

        // Serializing leaves the state alone
        assert_eq!(metrics.metric_set().len(), 1);
        assert_eq!(metrics.dimension_set().len(), 1);
    }

    #[test]
    fn repeated_metric_serializes_as_list() {
        let (mut metrics, _) = collector("test_namespace");
        metrics
            .add_metric("latency", "Milliseconds", 12)
            .unwrap()
            .add_metric("latency", "Milliseconds", 7.5)
            .unwrap()
            .add_metric("latency", "Milliseconds", 3)
            .unwrap();
        metrics.add_metric("requests", "Count", 1).unwrap();

        let doc = metrics.serialize_metric_set().unwrap();
        assert_eq!(doc["latency"], json!([12, 7.5, 3]));
        assert_eq!(doc["requests"], json!(1));
        assert_eq!(
            doc["_aws"]["CloudWatchMetrics"][0]["Metrics"],
            json!([{"Name": "latency", "Unit": "Milliseconds"}, {"Name": "requests", "Unit": "Count"}])
        );
    }

    #[test]
    fn last_unit_wins() {
        let (mut metrics, _) = collector("test_namespace");
        metrics.add_metric("payload", MetricUnit::Bytes, 1).unwrap();
        metrics.add_metric("payload", MetricUnit::Kilobytes, 2).unwrap();

        assert_eq!(metrics.metric_set()["payload"].unit, MetricUnit::Kilobytes);
        assert_eq!(metrics.metric_set()["payload"].values, vec![json!(1), json!(2)]);
    }

    #[test]
    fn incorrect_unit_is_not_stored() {
        let (mut metrics, _) = collector("test_namespace");
        let Err(err) = metrics.add_metric("single_metric", "incorrect_unit", 1) else {
            panic!("incorrect_unit was accepted");
        };

        assert!(matches!(err, MetricsError::Unit { .. }));
        assert!(metrics.metric_set().is_empty());
    }

    #[test]
    fn no_metrics() {
        let (mut metrics, _) = collector("test_namespace");
        metrics.add_dimension("test_dimension", "test");
        metrics.add_dimension("test_dimension_2", "test");

        let err = metrics.serialize_metric_set().unwrap_err();
        assert!(err.is_empty_metrics());
        assert!(err.to_string().starts_with("_aws.CloudWatchMetrics[0].Metrics"));
    }

    #[test]
    fn no_namespace() {
        let mut metrics = Builder::new().with_writer(SharedBuffer::default()).build();
        metrics.add_metric("single_metric", MetricUnit::Count, 1).unwrap();

        let err = metrics.serialize_metric_set().unwrap_err();
        assert!(matches!(err, MetricsError::SchemaValidation { path, .. } if path == NAMESPACE_PATH));

        let (mut metrics, _) = collector("");
        metrics.add_metric("single_metric", MetricUnit::Count, 1).unwrap();
        assert!(matches!(
            metrics.serialize_metric_set(),
            Err(MetricsError::SchemaValidation { path, .. }) if path == NAMESPACE_PATH
        ));
    }

    #[test]
    fn too_many_dimensions() {
        let (mut metrics, _) = collector("test_namespace");
        metrics.add_metric("single_metric", MetricUnit::Count, 1).unwrap();
        for i in 0..10 {
            metrics.add_dimension(format!("test_{i}"), "test");
        }
        assert!(metrics.serialize_metric_set().is_ok());

        metrics.add_dimension("test_10", "test");
        let err = metrics.serialize_metric_set().unwrap_err();
        assert!(matches!(err, MetricsError::SchemaValidation { path, .. } if path == DIMENSIONS_PATH));
    }

    #[test]
    fn service_counts_towards_dimension_limit() {
        let output = SharedBuffer::default();
        let mut metrics = Builder::new()
            .cloudwatch_namespace("test_namespace")
            .service("test_service")
            .with_writer(output)
            .build();
        metrics.add_metric("single_metric", MetricUnit::Count, 1).unwrap();
        for i in 0..10 {
            metrics.add_dimension(format!("test_{i}"), "test");
        }

        assert!(matches!(
            metrics.serialize_metric_set(),
            Err(MetricsError::SchemaValidation { path, .. }) if path == DIMENSIONS_PATH
        ));
    }

    #[test]
    fn validation_order() {
        // Too many dimensions is reported before the missing metrics
        let (mut metrics, _) = collector("test_namespace");
        for i in 0..11 {
            metrics.add_dimension(format!("test_{i}"), "test");
        }
        assert!(matches!(
            metrics.serialize_metric_set(),
            Err(MetricsError::SchemaValidation { path, .. }) if path == DIMENSIONS_PATH
        ));

        // The missing namespace is reported before everything else
        let mut metrics = Builder::new().with_writer(SharedBuffer::default()).build();
        metrics.add_metric("single_metric", MetricUnit::Count, "some_value").unwrap();
        assert!(matches!(
            metrics.serialize_metric_set(),
            Err(MetricsError::SchemaValidation { path, .. }) if path == NAMESPACE_PATH
        ));
    }

    #[test]
    fn incorrect_value() {
        let (mut metrics, _) = collector("test_namespace");
        metrics.add_metric("single_metric", MetricUnit::Count, "some_value").unwrap();

        let err = metrics.serialize_metric_set().unwrap_err();
        assert!(matches!(err, MetricsError::MetricValue { ref name, .. } if name == "single_metric"));

        // NaN has no JSON number representation
        let (mut metrics, _) = collector("test_namespace");
        metrics.add_metric("ratio", MetricUnit::Percent, f64::NAN).unwrap();
        assert!(matches!(metrics.serialize_metric_set(), Err(MetricsError::MetricValue { .. })));
    }

    #[test]
    fn non_string_dimension_values() {
        let (mut metrics, _) = collector("test_namespace");
        metrics.add_metric("metric_one", MetricUnit::Count, 1).unwrap();
        metrics.add_dimension("test_dimension", true);
        metrics.add_dimension("test_dimension_2", 3);

        let doc = metrics.serialize_metric_set().unwrap();
        assert_eq!(doc["test_dimension"], json!("true"));
        assert_eq!(doc["test_dimension_2"], json!("3"));
    }

    #[test]
    fn metadata_is_written_but_not_a_metric() {
        let (mut metrics, _) = collector("test_namespace");
        metrics.add_metric("metric_one", MetricUnit::Count, 1).unwrap();
        metrics.add_metadata("RequestId", "ABC123");
        metrics.add_metadata("Attempts", json!({"first": true}));

        let doc = metrics.serialize_metric_set().unwrap();
        assert_eq!(doc["RequestId"], json!("ABC123"));
        assert_eq!(doc["Attempts"], json!({"first": true}));
        assert_eq!(doc["_aws"]["CloudWatchMetrics"][0]["Metrics"].as_array().unwrap().len(), 1);
        assert_eq!(doc["_aws"]["CloudWatchMetrics"][0]["Dimensions"], json!([[]]));
    }

    #[test]
    fn flush_writes_one_line_and_clears() {
        let (mut metrics, output) = collector("test_namespace");
        metrics.add_metric("metric_one", MetricUnit::Count, 1).unwrap();
        metrics.add_dimension("test_dimension", "test");
        metrics.add_metadata("RequestId", "ABC123");
        metrics.flush_metrics().unwrap();

        assert_eq!(
            output.contents(),
            r#"{"_aws":{"Timestamp":1687657545423,"CloudWatchMetrics":[{"Namespace":"test_namespace","Dimensions":[["test_dimension"]],"Metrics":[{"Name":"metric_one","Unit":"Count"}]}]},"test_dimension":"test","RequestId":"ABC123","metric_one":1}
"#
        );
        assert!(metrics.metric_set().is_empty());
        assert!(metrics.dimension_set().is_empty());
        assert!(metrics.metadata().is_empty());
    }

    #[test]
    fn failed_flush_keeps_state() {
        let (mut metrics, output) = collector("test_namespace");
        metrics.add_metric("single_metric", MetricUnit::Count, "some_value").unwrap();

        assert!(metrics.flush_metrics().is_err());
        assert!(output.contents().is_empty());
        assert_eq!(metrics.metric_set().len(), 1);
    }

    #[test]
    fn spillover() {
        let (mut metrics, output) = collector("test_namespace");
        metrics.add_dimension("test_dimension", "test");

        for i in 0..99 {
            metrics.add_metric(format!("metric_{i}"), "Count", 1).unwrap();
        }
        assert!(output.contents().is_empty());
        assert_eq!(metrics.metric_set().len(), 99);

        metrics.add_metric("metric_99", "Count", 1).unwrap();
        let lines = output.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["_aws"]["CloudWatchMetrics"][0]["Metrics"].as_array().unwrap().len(), 100);
        assert_eq!(lines[0]["test_dimension"], json!("test"));
        assert!(metrics.metric_set().is_empty());

        // The 101st metric lands in a fresh document with the same dimensions
        metrics.add_metric("single_metric", MetricUnit::Count, 1).unwrap();
        let doc = metrics.serialize_metric_set().unwrap();
        assert_eq!(
            doc["_aws"]["CloudWatchMetrics"][0],
            json!({
                "Namespace": "test_namespace",
                "Dimensions": [["test_dimension"]],
                "Metrics": [{"Name": "single_metric", "Unit": "Count"}]
            })
        );
        assert_eq!(output.lines().len(), 1);
    }

    #[test]
    fn failed_spillover_still_clears() {
        let output = SharedBuffer::default();
        let mut metrics = Builder::new().with_writer(output.clone()).build();
        metrics.add_dimension("test_dimension", "test");

        let mut errors = 0;
        for i in 0..105 {
            if let Err(err) = metrics.add_metric(format!("metric_{i}"), "Count", 1) {
                assert!(matches!(err, MetricsError::SchemaValidation { path, .. } if path == NAMESPACE_PATH));
                errors += 1;
            }
            assert!(metrics.metric_set().len() < MAX_METRICS);
        }

        assert_eq!(errors, 1);
        assert_eq!(metrics.metric_set().len(), 5);
        assert_eq!(metrics.dimension_set().len(), 1);
        assert!(output.contents().is_empty());
    }

    #[test]
    fn repeated_values_do_not_count_towards_spillover() {
        let (mut metrics, output) = collector("test_namespace");
        for i in 0..150 {
            metrics.add_metric("latency", MetricUnit::Milliseconds, i).unwrap();
        }

        assert!(output.contents().is_empty());
        assert_eq!(metrics.metric_set()["latency"].values.len(), 150);
    }

    #[test]
    fn rename_default_dimension() {
        let output = SharedBuffer::default();
        let mut metrics = Builder::new()
            .cloudwatch_namespace("test_application")
            .service("test_service")
            .with_writer(output.clone())
            .build();

        metrics.add_dimension("service", "another_test_service");
        assert!(metrics.dimension_set().is_empty());

        metrics.add_metric("metric_one", MetricUnit::Count, 1).unwrap();
        metrics.flush_metrics().unwrap();
        metrics.add_metric("metric_one", MetricUnit::Count, 1).unwrap();
        metrics.flush_metrics().unwrap();

        let lines = output.lines();
        assert_eq!(lines.len(), 2);
        for line in lines {
            assert_eq!(line["service"], json!("another_test_service"));
            assert_eq!(line["_aws"]["CloudWatchMetrics"][0]["Dimensions"], json!([["service"]]));
        }
    }

    #[test]
    fn write_single_leaves_metric_set_alone() {
        let (mut metrics, output) = collector("test_namespace");
        metrics.add_metric("metric_one", MetricUnit::Count, 1).unwrap();
        metrics.add_dimension("test_dimension", "test");

        metrics
            .write_single("ColdStart", MetricUnit::Count, 1, &[("function_name", "example_fn")])
            .unwrap();

        let lines = output.lines();
        assert_eq!(lines[0]["ColdStart"], json!(1));
        assert_eq!(lines[0]["function_name"], json!("example_fn"));
        assert!(lines[0].get("test_dimension").is_none());
        assert!(lines[0].get("metric_one").is_none());
        assert_eq!(metrics.metric_set().len(), 1);

        assert!(matches!(
            metrics.write_single("bad", MetricUnit::Count, "x", &[]),
            Err(MetricsError::MetricValue { .. })
        ));
    }
}
