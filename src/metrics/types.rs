use std::collections::BTreeMap;

use serde::Serialize;

use crate::query::period::Granularity;

/// A JSON-safe scalar: integer, finite float, or null.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Null,
}

impl MetricValue {
    /// Non-finite floats have no JSON form and become `Null`.
    pub fn float(v: f64) -> Self {
        if v.is_finite() {
            MetricValue::Float(v)
        } else {
            MetricValue::Null
        }
    }

    pub fn count(n: usize) -> Self {
        MetricValue::Int(n as i64)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MetricValue::Null)
    }
}

/// One labelled sample of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub x: String,
    pub y: MetricValue,
}

/// An ordered `{x, y}` series, oldest first. Built once, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricSeries(Vec<Point>);

impl MetricSeries {
    pub fn values(&self) -> Vec<MetricValue> {
        self.0.iter().map(|p| p.y).collect()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.0.iter().map(|p| p.x.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Point> for MetricSeries {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        MetricSeries(iter.into_iter().collect())
    }
}

/// A metric rendered at several granularities, serialised as
/// `{"day": [...], "week": [...], "month": [...]}`.
pub type GranularSeries = BTreeMap<Granularity, MetricSeries>;

/// A scalar per granularity, e.g. last-period counts and trends.
pub type GranularScalar = BTreeMap<Granularity, MetricValue>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metric_value_json() {
        assert_eq!(serde_json::to_value(MetricValue::Int(3)).unwrap(), json!(3));
        assert_eq!(serde_json::to_value(MetricValue::Float(2.5)).unwrap(), json!(2.5));
        assert_eq!(serde_json::to_value(MetricValue::Null).unwrap(), json!(null));
    }

    #[test]
    fn test_non_finite_becomes_null() {
        assert!(MetricValue::float(f64::NAN).is_null());
        assert!(MetricValue::float(f64::INFINITY).is_null());
        assert_eq!(MetricValue::float(1.5), MetricValue::Float(1.5));
    }

    #[test]
    fn test_granular_series_serialises_in_order() {
        let mut series = GranularSeries::new();
        series.insert(
            Granularity::Month,
            [Point { x: "2025-01".into(), y: MetricValue::Int(1) }].into_iter().collect(),
        );
        series.insert(Granularity::Day, MetricSeries::default());
        let text = serde_json::to_string(&series).unwrap();
        assert_eq!(text, r#"{"day":[],"month":[{"x":"2025-01","y":1}]}"#);
    }
}
