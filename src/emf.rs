//! # EMF
//!
//! Helpers for serializing CloudWatch Embedded Metrics via serde_json
//!
//! <https://docs.aws.amazon.com/AmazonCloudWatch/latest/monitoring/CloudWatch_Embedded_Metric_Format_Specification.html>

use super::unit::MetricUnit;
use serde::Serialize;
use serde_json::value::Value;
use std::collections::BTreeMap;

#[derive(Serialize)]
pub struct EmbeddedMetrics<'a> {
    #[serde(rename = "_aws")]
    pub aws: EmbeddedMetricsAws<'a>,
    #[serde(flatten)]
    pub dimensions: BTreeMap<&'a str, &'a str>,
    #[serde(flatten)]
    pub metadata: BTreeMap<&'a str, &'a Value>,
    #[serde(flatten)]
    pub values: BTreeMap<&'a str, Value>,
}

#[derive(Serialize)]
pub struct EmbeddedMetricsAws<'a> {
    #[serde(rename = "Timestamp")]
    pub timestamp: u64,
    // This crate never uses more than one namespace in a metrics document
    #[serde(rename = "CloudWatchMetrics")]
    pub cloudwatch_metrics: [EmbeddedNamespace<'a>; 1],
}

#[derive(Serialize)]
pub struct EmbeddedNamespace<'a> {
    #[serde(rename = "Namespace")]
    pub namespace: &'a str,
    // This crate builds a single dimension set with all dimensions
    #[serde(rename = "Dimensions")]
    pub dimensions: [Vec<&'a str>; 1],
    #[serde(rename = "Metrics")]
    pub metrics: Vec<EmbeddedMetric<'a>>,
}

#[derive(Serialize)]
pub struct EmbeddedMetric<'a> {
    #[serde(rename = "Name")]
    pub name: &'a str,
    #[serde(rename = "Unit")]
    pub unit: MetricUnit,
}

impl<'a> EmbeddedMetrics<'a> {
    pub fn new(namespace: &'a str, timestamp: u64) -> Self {
        EmbeddedMetrics {
            aws: EmbeddedMetricsAws {
                timestamp,
                cloudwatch_metrics: [EmbeddedNamespace {
                    namespace,
                    dimensions: [Vec::new()],
                    metrics: Vec::new(),
                }],
            },
            dimensions: BTreeMap::new(),
            metadata: BTreeMap::new(),
            values: BTreeMap::new(),
        }
    }

    /// Add a dimension, replacing the value if the name is already present
    pub fn push_dimension(&mut self, name: &'a str, value: &'a str) {
        if self.dimensions.insert(name, value).is_none() {
            self.aws.cloudwatch_metrics[0].dimensions[0].push(name);
        }
    }

    pub fn push_metric(&mut self, name: &'a str, unit: MetricUnit, value: Value) {
        self.aws.cloudwatch_metrics[0].metrics.push(EmbeddedMetric { name, unit });
        self.values.insert(name, value);
    }

    pub fn dimension_count(&self) -> usize {
        self.dimensions.len()
    }
}
