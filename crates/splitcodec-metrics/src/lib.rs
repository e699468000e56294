//! splitcodec metrics
//!
//! Lock-free counters, log₂ size histograms and frequency maps backing the
//! per-codec [`CodecMetrics`] registry, plus snapshot export to the `metrics`
//! facade or JSON lines.

#![warn(missing_docs)]

pub mod counter;
pub mod export;
pub mod frequency;
pub mod histogram;
pub mod registry;

pub use counter::Counter;
pub use export::{
    ExportError, JsonSink, MetricValue, MetricsFacadeSink, MetricsSink, MetricsSnapshot, NAMESPACE,
};
pub use frequency::FrequencyMap;
pub use histogram::{SizeHistogram, SIZE_BUCKETS};
pub use registry::{snake_case, CodecMetrics, OperationKind, OperationMetrics};

/// Version of the metrics crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
