//! Metric snapshots and export sinks
//!
//! A [`MetricsSnapshot`] is an ordered list of `(snake_case name, value)`
//! pairs. Sinks publish a snapshot under a namespace; the process-wide
//! namespace is [`NAMESPACE`].

use parking_lot::Mutex;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use thiserror::Error;

/// Namespace every codec publishes its metrics under
pub const NAMESPACE: &str = "splitcodec";

/// Errors raised while publishing metrics
#[derive(Debug, Error)]
pub enum ExportError {
    /// Writing the rendered snapshot failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Rendering the snapshot failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Value of one exported metric
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricValue {
    /// Plain counter
    Count(u64),
    /// Size histogram buckets as `(label, count)`, smallest first
    Buckets(Vec<(String, u64)>),
    /// Frequency map entries sorted by key
    Frequencies(BTreeMap<String, u64>),
}

impl MetricValue {
    /// Counter value, if this is a counter
    #[inline]
    #[must_use]
    pub fn as_count(&self) -> Option<u64> {
        match self {
            Self::Count(n) => Some(*n),
            _ => None,
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Count(n) => serializer.serialize_u64(*n),
            Self::Buckets(buckets) => {
                let mut map = serializer.serialize_map(Some(buckets.len()))?;
                for (label, n) in buckets {
                    map.serialize_entry(label, n)?;
                }
                map.end()
            }
            Self::Frequencies(entries) => entries.serialize(serializer),
        }
    }
}

/// Ordered, point-in-time copy of a codec's metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    entries: Vec<(String, MetricValue)>,
}

impl MetricsSnapshot {
    /// Value for a snake_case metric name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.entries
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v))
    }

    /// Iterate in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of metrics
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the snapshot holds no metrics
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as a JSON object preserving declaration order
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl FromIterator<(String, MetricValue)> for MetricsSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, MetricValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Serialize for MetricsSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Destination for metric snapshots
pub trait MetricsSink: Send + Sync {
    /// Publish `snapshot` under `namespace`
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot accept the snapshot.
    fn publish(&self, namespace: &str, snapshot: &MetricsSnapshot) -> Result<(), ExportError>;
}

/// Publishes through the `metrics` facade
///
/// Counters become `<namespace>.<name>` absolute counters. Histogram buckets
/// and frequency keys become one counter each, labelled `bucket` or `key`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsFacadeSink;

impl MetricsSink for MetricsFacadeSink {
    fn publish(&self, namespace: &str, snapshot: &MetricsSnapshot) -> Result<(), ExportError> {
        for (name, value) in snapshot.iter() {
            let key = format!("{namespace}.{name}");
            match value {
                MetricValue::Count(n) => metrics::counter!(key).absolute(*n),
                MetricValue::Buckets(buckets) => {
                    for (label, n) in buckets {
                        metrics::counter!(key.clone(), "bucket" => label.clone()).absolute(*n);
                    }
                }
                MetricValue::Frequencies(entries) => {
                    for (k, n) in entries {
                        metrics::counter!(key.clone(), "key" => k.clone()).absolute(*n);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Writes each snapshot as one JSON line `{"<namespace>": {...}}`
#[derive(Debug)]
pub struct JsonSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonSink<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Unwrap the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> MetricsSink for JsonSink<W> {
    fn publish(&self, namespace: &str, snapshot: &MetricsSnapshot) -> Result<(), ExportError> {
        let mut wrapped = BTreeMap::new();
        wrapped.insert(namespace, snapshot);
        let line = serde_json::to_string(&wrapped)?;

        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> MetricsSnapshot {
        vec![
            ("num_encode_total".to_string(), MetricValue::Count(4)),
            (
                "encode_size_histogram".to_string(),
                MetricValue::Buckets(vec![("<8B".to_string(), 1), ("<1KiB".to_string(), 3)]),
            ),
            (
                "encode_flag_histogram".to_string(),
                MetricValue::Frequencies(BTreeMap::from([("escape_html".to_string(), 2)])),
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn json_preserves_declaration_order() {
        assert_eq!(
            sample().to_json().unwrap(),
            r#"{"num_encode_total":4,"encode_size_histogram":{"<8B":1,"<1KiB":3},"encode_flag_histogram":{"escape_html":2}}"#
        );
    }

    #[test]
    fn snapshot_lookup() {
        let snap = sample();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap.get("num_encode_total").and_then(MetricValue::as_count), Some(4));
        assert!(snap.get("nope").is_none());
    }

    #[test]
    fn json_sink_writes_one_line_per_publish() {
        let sink = JsonSink::new(Vec::new());
        sink.publish(NAMESPACE, &sample()).unwrap();
        sink.publish(NAMESPACE, &MetricsSnapshot::default()).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(r#"{"splitcodec":{"num_encode_total":4"#));
        assert_eq!(lines[1], r#"{"splitcodec":{}}"#);
    }

    #[test]
    fn facade_sink_without_recorder_is_noop() {
        assert!(MetricsFacadeSink.publish(NAMESPACE, &sample()).is_ok());
    }
}
