//! Codec metrics registry
//!
//! Provides [`CodecMetrics`], the per-instance set of counters and histograms
//! for encode and decode calls, plus the statically declared export table that
//! turns it into a deterministic [`MetricsSnapshot`].

use crate::counter::Counter;
use crate::export::{MetricValue, MetricsSnapshot};
use crate::frequency::FrequencyMap;
use crate::histogram::SizeHistogram;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation kind of a codec call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Value to bytes
    Encode,
    /// Bytes into a target value
    Decode,
}

impl OperationKind {
    /// Stable name used in records and metric names
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Encode => "Encode",
            Self::Decode => "Decode",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters and histograms for one operation kind
#[derive(Debug, Default)]
pub struct OperationMetrics {
    /// Every call
    pub total: Counter,
    /// Calls that returned an error
    pub errors: Counter,
    /// Calls that ran only the old path
    pub only_old: Counter,
    /// Calls that ran only the new path
    pub only_new: Counter,
    /// Calls that ran both paths
    pub both_called: Counter,
    /// Calls that wanted both paths but could not isolate the target
    ///
    /// Only decode isolates a target, so the encode counter stays at zero and
    /// is left out of the export table.
    pub both_skipped: Counter,
    /// Calls that returned the old path's result
    pub return_old: Counter,
    /// Calls that returned the new path's result
    pub return_new: Counter,
    /// Calls where the two paths diverged
    pub divergences: Counter,
    /// Decode calls whose target held data on entry
    pub merge: Counter,
    /// Nanoseconds in the old path, only when both paths ran
    pub exec_time_old_nanos: Counter,
    /// Nanoseconds in the new path, only when both paths ran
    pub exec_time_new_nanos: Counter,
    /// Payload sizes, regardless of outcome
    pub sizes: SizeHistogram,
    /// Call sites that produced a divergence
    pub callers: FrequencyMap,
    /// Flags resolved by bisection
    pub flags: FrequencyMap,
}

impl OperationMetrics {
    /// Create zeroed metrics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every counter and drop every histogram key
    pub fn reset(&self) {
        for counter in [
            &self.total,
            &self.errors,
            &self.only_old,
            &self.only_new,
            &self.both_called,
            &self.both_skipped,
            &self.return_old,
            &self.return_new,
            &self.divergences,
            &self.merge,
            &self.exec_time_old_nanos,
            &self.exec_time_new_nanos,
        ] {
            counter.reset();
        }
        self.sizes.reset();
        self.callers.reset();
        self.flags.reset();
    }
}

/// All metrics owned by one codec instance
#[derive(Debug, Default)]
pub struct CodecMetrics {
    /// Encode-side metrics
    pub encode: OperationMetrics,
    /// Decode-side metrics
    pub decode: OperationMetrics,
}

impl CodecMetrics {
    /// Create zeroed metrics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Metrics for one operation kind
    #[inline]
    #[must_use]
    pub fn for_op(&self, op: OperationKind) -> &OperationMetrics {
        match op {
            OperationKind::Encode => &self.encode,
            OperationKind::Decode => &self.decode,
        }
    }

    /// Wholesale reset of both operation kinds
    pub fn reset(&self) {
        self.encode.reset();
        self.decode.reset();
    }

    /// Exported metric names in declaration order
    pub fn names() -> impl Iterator<Item = &'static str> {
        EXPORTS.iter().map(|(name, _)| name.as_str())
    }

    /// Deterministic snapshot of every declared metric
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        EXPORTS
            .iter()
            .map(|(name, accessor)| (name.clone(), accessor(self)))
            .collect()
    }
}

type Accessor = fn(&CodecMetrics) -> MetricValue;

macro_rules! declare_metrics {
    ($($name:literal => |$m:ident| $body:expr),* $(,)?) => {
        &[$(($name, {
            fn accessor($m: &CodecMetrics) -> MetricValue {
                $body
            }
            accessor as Accessor
        })),*]
    };
}

const DECLARED: &[(&str, Accessor)] = declare_metrics! {
    "NumEncodeTotal" => |m| MetricValue::Count(m.encode.total.load()),
    "NumEncodeErrors" => |m| MetricValue::Count(m.encode.errors.load()),
    "NumEncodeOnlyOld" => |m| MetricValue::Count(m.encode.only_old.load()),
    "NumEncodeOnlyNew" => |m| MetricValue::Count(m.encode.only_new.load()),
    "NumEncodeBothCalled" => |m| MetricValue::Count(m.encode.both_called.load()),
    "NumEncodeReturnOld" => |m| MetricValue::Count(m.encode.return_old.load()),
    "NumEncodeReturnNew" => |m| MetricValue::Count(m.encode.return_new.load()),
    "NumEncodeDivergences" => |m| MetricValue::Count(m.encode.divergences.load()),
    "ExecTimeEncodeOldNanos" => |m| MetricValue::Count(m.encode.exec_time_old_nanos.load()),
    "ExecTimeEncodeNewNanos" => |m| MetricValue::Count(m.encode.exec_time_new_nanos.load()),
    "EncodeSizeHistogram" => |m| MetricValue::Buckets(m.encode.sizes.snapshot()),
    "EncodeCallerHistogram" => |m| MetricValue::Frequencies(m.encode.callers.snapshot()),
    "EncodeFlagHistogram" => |m| MetricValue::Frequencies(m.encode.flags.snapshot()),
    "NumDecodeTotal" => |m| MetricValue::Count(m.decode.total.load()),
    "NumDecodeErrors" => |m| MetricValue::Count(m.decode.errors.load()),
    "NumDecodeMerge" => |m| MetricValue::Count(m.decode.merge.load()),
    "NumDecodeOnlyOld" => |m| MetricValue::Count(m.decode.only_old.load()),
    "NumDecodeOnlyNew" => |m| MetricValue::Count(m.decode.only_new.load()),
    "NumDecodeBothCalled" => |m| MetricValue::Count(m.decode.both_called.load()),
    "NumDecodeBothSkipped" => |m| MetricValue::Count(m.decode.both_skipped.load()),
    "NumDecodeReturnOld" => |m| MetricValue::Count(m.decode.return_old.load()),
    "NumDecodeReturnNew" => |m| MetricValue::Count(m.decode.return_new.load()),
    "NumDecodeDivergences" => |m| MetricValue::Count(m.decode.divergences.load()),
    "ExecTimeDecodeOldNanos" => |m| MetricValue::Count(m.decode.exec_time_old_nanos.load()),
    "ExecTimeDecodeNewNanos" => |m| MetricValue::Count(m.decode.exec_time_new_nanos.load()),
    "DecodeSizeHistogram" => |m| MetricValue::Buckets(m.decode.sizes.snapshot()),
    "DecodeCallerHistogram" => |m| MetricValue::Frequencies(m.decode.callers.snapshot()),
    "DecodeFlagHistogram" => |m| MetricValue::Frequencies(m.decode.flags.snapshot()),
};

/// Declared table with names already converted to snake case
static EXPORTS: Lazy<Vec<(String, Accessor)>> = Lazy::new(|| {
    DECLARED
        .iter()
        .map(|&(name, accessor)| (snake_case(name), accessor))
        .collect()
});

/// Convert a `PascalCase` name to `snake_case`
///
/// Every uppercase letter after the first character is preceded by `_`.
#[must_use]
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 8);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
