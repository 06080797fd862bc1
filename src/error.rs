use serde_json::Value;
use thiserror::Error;

/// Path of the namespace within an embedded metrics document
pub const NAMESPACE_PATH: &str = "_aws.CloudWatchMetrics[0].Namespace";
/// Path of the single dimension set within an embedded metrics document
pub const DIMENSIONS_PATH: &str = "_aws.CloudWatchMetrics[0].Dimensions[0]";
/// Path of the metric definitions within an embedded metrics document
pub const METRICS_PATH: &str = "_aws.CloudWatchMetrics[0].Metrics";

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid metric unit '{unit}', expected either option: {valid}")]
    Unit { unit: String, valid: String },
    #[error("metric '{name}' has a non numeric value: {value}")]
    MetricValue { name: String, value: Value },
    #[error("{path}: {message}")]
    SchemaValidation { path: &'static str, message: String },
    #[error("failed to write metrics: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize metrics: {0}")]
    Json(#[from] serde_json::Error),
}

impl MetricsError {
    pub(crate) fn schema(path: &'static str, message: impl Into<String>) -> Self {
        MetricsError::SchemaValidation {
            path,
            message: message.into(),
        }
    }

    /// True when the document was rejected because it held no metrics
    pub fn is_empty_metrics(&self) -> bool {
        matches!(self, MetricsError::SchemaValidation { path, .. } if *path == METRICS_PATH)
    }
}
