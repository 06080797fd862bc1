//! # Units
//!
//! The closed set of units CloudWatch accepts for a metric
//!
//! <https://docs.aws.amazon.com/AmazonCloudWatch/latest/APIReference/API_MetricDatum.html>

use super::error::MetricsError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricUnit {
    Seconds,
    Microseconds,
    Milliseconds,
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
    Terabytes,
    Bits,
    Kilobits,
    Megabits,
    Gigabits,
    Terabits,
    Percent,
    Count,
    BytesPerSecond,
    KilobytesPerSecond,
    MegabytesPerSecond,
    GigabytesPerSecond,
    TerabytesPerSecond,
    BitsPerSecond,
    KilobitsPerSecond,
    MegabitsPerSecond,
    GigabitsPerSecond,
    TerabitsPerSecond,
    CountPerSecond,
}

impl MetricUnit {
    pub const ALL: [MetricUnit; 26] = [
        MetricUnit::Seconds,
        MetricUnit::Microseconds,
        MetricUnit::Milliseconds,
        MetricUnit::Bytes,
        MetricUnit::Kilobytes,
        MetricUnit::Megabytes,
        MetricUnit::Gigabytes,
        MetricUnit::Terabytes,
        MetricUnit::Bits,
        MetricUnit::Kilobits,
        MetricUnit::Megabits,
        MetricUnit::Gigabits,
        MetricUnit::Terabits,
        MetricUnit::Percent,
        MetricUnit::Count,
        MetricUnit::BytesPerSecond,
        MetricUnit::KilobytesPerSecond,
        MetricUnit::MegabytesPerSecond,
        MetricUnit::GigabytesPerSecond,
        MetricUnit::TerabytesPerSecond,
        MetricUnit::BitsPerSecond,
        MetricUnit::KilobitsPerSecond,
        MetricUnit::MegabitsPerSecond,
        MetricUnit::GigabitsPerSecond,
        MetricUnit::TerabitsPerSecond,
        MetricUnit::CountPerSecond,
    ];

    /// Symbolic name of the unit, e.g. `BytesPerSecond`
    pub fn name(&self) -> &'static str {
        match self {
            MetricUnit::Seconds => "Seconds",
            MetricUnit::Microseconds => "Microseconds",
            MetricUnit::Milliseconds => "Milliseconds",
            MetricUnit::Bytes => "Bytes",
            MetricUnit::Kilobytes => "Kilobytes",
            MetricUnit::Megabytes => "Megabytes",
            MetricUnit::Gigabytes => "Gigabytes",
            MetricUnit::Terabytes => "Terabytes",
            MetricUnit::Bits => "Bits",
            MetricUnit::Kilobits => "Kilobits",
            MetricUnit::Megabits => "Megabits",
            MetricUnit::Gigabits => "Gigabits",
            MetricUnit::Terabits => "Terabits",
            MetricUnit::Percent => "Percent",
            MetricUnit::Count => "Count",
            MetricUnit::BytesPerSecond => "BytesPerSecond",
            MetricUnit::KilobytesPerSecond => "KilobytesPerSecond",
            MetricUnit::MegabytesPerSecond => "MegabytesPerSecond",
            MetricUnit::GigabytesPerSecond => "GigabytesPerSecond",
            MetricUnit::TerabytesPerSecond => "TerabytesPerSecond",
            MetricUnit::BitsPerSecond => "BitsPerSecond",
            MetricUnit::KilobitsPerSecond => "KilobitsPerSecond",
            MetricUnit::MegabitsPerSecond => "MegabitsPerSecond",
            MetricUnit::GigabitsPerSecond => "GigabitsPerSecond",
            MetricUnit::TerabitsPerSecond => "TerabitsPerSecond",
            MetricUnit::CountPerSecond => "CountPerSecond",
        }
    }

    /// The CloudWatch string written into the `Unit` field, e.g. `Bytes/Second`
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricUnit::BytesPerSecond => "Bytes/Second",
            MetricUnit::KilobytesPerSecond => "Kilobytes/Second",
            MetricUnit::MegabytesPerSecond => "Megabytes/Second",
            MetricUnit::GigabytesPerSecond => "Gigabytes/Second",
            MetricUnit::TerabytesPerSecond => "Terabytes/Second",
            MetricUnit::BitsPerSecond => "Bits/Second",
            MetricUnit::KilobitsPerSecond => "Kilobits/Second",
            MetricUnit::MegabitsPerSecond => "Megabits/Second",
            MetricUnit::GigabitsPerSecond => "Gigabits/Second",
            MetricUnit::TerabitsPerSecond => "Terabits/Second",
            MetricUnit::CountPerSecond => "Count/Second",
            other => other.name(),
        }
    }

    /// Look up a unit by either its symbolic name or its CloudWatch string
    pub fn validate(unit: &str) -> Result<MetricUnit, MetricsError> {
        MetricUnit::ALL
            .iter()
            .find(|u| u.name() == unit || u.as_str() == unit)
            .copied()
            .ok_or_else(|| MetricsError::Unit {
                unit: unit.to_string(),
                valid: MetricUnit::ALL.iter().map(MetricUnit::as_str).collect::<Vec<_>>().join(", "),
            })
    }
}

impl fmt::Display for MetricUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricUnit {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricUnit::validate(s)
    }
}

impl Serialize for MetricUnit {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Convert a metrics::Unit into the closest CloudWatch unit
///
/// The metrics crate counts in binary multiples where CloudWatch uses decimal names
impl From<metrics::Unit> for MetricUnit {
    fn from(unit: metrics::Unit) -> Self {
        match unit {
            metrics::Unit::Count => MetricUnit::Count,
            metrics::Unit::Percent => MetricUnit::Percent,
            metrics::Unit::Seconds => MetricUnit::Seconds,
            metrics::Unit::Milliseconds => MetricUnit::Milliseconds,
            metrics::Unit::Microseconds => MetricUnit::Microseconds,
            // CloudWatch has nothing finer than microseconds
            metrics::Unit::Nanoseconds => MetricUnit::Microseconds,
            metrics::Unit::Tebibytes => MetricUnit::Terabytes,
            metrics::Unit::Gibibytes => MetricUnit::Gigabytes,
            metrics::Unit::Mebibytes => MetricUnit::Megabytes,
            metrics::Unit::Kibibytes => MetricUnit::Kilobytes,
            metrics::Unit::Bytes => MetricUnit::Bytes,
            metrics::Unit::TerabitsPerSecond => MetricUnit::TerabitsPerSecond,
            metrics::Unit::GigabitsPerSecond => MetricUnit::GigabitsPerSecond,
            metrics::Unit::MegabitsPerSecond => MetricUnit::MegabitsPerSecond,
            metrics::Unit::KilobitsPerSecond => MetricUnit::KilobitsPerSecond,
            metrics::Unit::BitsPerSecond => MetricUnit::BitsPerSecond,
            metrics::Unit::CountPerSecond => MetricUnit::CountPerSecond,
        }
    }
}

/// Anything [add_metric](super::Collector::add_metric) accepts as a unit
pub trait IntoMetricUnit {
    fn into_metric_unit(self) -> Result<MetricUnit, MetricsError>;
}

impl IntoMetricUnit for MetricUnit {
    fn into_metric_unit(self) -> Result<MetricUnit, MetricsError> {
        Ok(self)
    }
}

impl IntoMetricUnit for metrics::Unit {
    fn into_metric_unit(self) -> Result<MetricUnit, MetricsError> {
        Ok(self.into())
    }
}

impl IntoMetricUnit for &str {
    fn into_metric_unit(self) -> Result<MetricUnit, MetricsError> {
        MetricUnit::validate(self)
    }
}

impl IntoMetricUnit for String {
    fn into_metric_unit(self) -> Result<MetricUnit, MetricsError> {
        MetricUnit::validate(&self)
    }
}

impl IntoMetricUnit for &String {
    fn into_metric_unit(self) -> Result<MetricUnit, MetricsError> {
        MetricUnit::validate(self)
    }
}
