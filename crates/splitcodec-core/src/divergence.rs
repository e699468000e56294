//! Divergence detection and reporting
//!
//! When both paths ran and their results differ, the detector counts the
//! divergence, records the call site and any resolved flags, logs it and hands
//! a borrowed [`Divergence`] record to the registered sink.

use crate::bisect::OptionBisector;
use crate::compare::Comparators;
use crate::flags::{FlagSet, FlagUniverse};
use parking_lot::RwLock;
use splitcodec_metrics::{OperationKind, OperationMetrics};
use std::fmt;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Source location of a codec call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite {
    /// Source file
    pub file: &'static str,
    /// Line number
    pub line: u32,
}

impl CallSite {
    /// Location of the nearest caller not marked `#[track_caller]`
    #[inline]
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        Self::from(Location::caller())
    }
}

impl From<&'static Location<'static>> for CallSite {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Input given to the diverging call
#[derive(Clone, Copy)]
pub enum DivergenceInput<'a> {
    /// Value passed to encode
    Value(&'a dyn fmt::Debug),
    /// Bytes passed to decode
    Bytes(&'a [u8]),
}

impl fmt::Debug for DivergenceInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Bytes(b) => f
                .debug_tuple("Bytes")
                .field(&String::from_utf8_lossy(b))
                .finish(),
        }
    }
}

/// Outputs produced by the two paths
#[derive(Clone, Copy)]
pub enum DivergenceOutput<'a> {
    /// Encoded bytes; empty for a path that failed
    Encoded {
        /// Old path output
        old: &'a [u8],
        /// New path output
        new: &'a [u8],
    },
    /// Decoded values
    Decoded {
        /// Old path value
        old: &'a dyn fmt::Debug,
        /// New path value
        new: &'a dyn fmt::Debug,
    },
}

impl fmt::Debug for DivergenceOutput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encoded { old, new } => f
                .debug_struct("Encoded")
                .field("old", &String::from_utf8_lossy(old))
                .field("new", &String::from_utf8_lossy(new))
                .finish(),
            Self::Decoded { old, new } => f
                .debug_struct("Decoded")
                .field("old", old)
                .field("new", new)
                .finish(),
        }
    }
}

/// One detected divergence
///
/// Every field borrows from the call that produced it. Sinks must copy what
/// they want to keep before returning.
pub struct Divergence<'a, E> {
    /// Where the codec was called from
    pub caller: CallSite,
    /// Encode or decode
    pub op: OperationKind,
    /// Type being encoded or decoded
    pub type_name: &'static str,
    /// Call input
    pub input: DivergenceInput<'a>,
    /// Outputs of both paths
    pub output: DivergenceOutput<'a>,
    /// Old path error
    pub old_error: Option<&'a E>,
    /// New path error
    pub new_error: Option<&'a E>,
    /// Flags that make the new path match the old one; empty when
    /// auto-detection is off or inconclusive
    pub flags: &'a FlagSet,
}

impl<E> Divergence<'_, E> {
    /// Names of the resolved flags in universe order
    pub fn flag_names(&self) -> impl Iterator<Item = &str> {
        self.flags.names()
    }
}

impl<E: fmt::Debug> fmt::Debug for Divergence<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Divergence")
            .field("caller", &self.caller)
            .field("op", &self.op)
            .field("type_name", &self.type_name)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("old_error", &self.old_error)
            .field("new_error", &self.new_error)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Callback receiving each divergence synchronously
pub type DivergenceSink<E> = Arc<dyn Fn(&Divergence<'_, E>) + Send + Sync>;

/// Compares dual-path results and reports mismatches
pub struct DivergenceDetector<E> {
    comparators: Comparators<E>,
    bisector: OptionBisector,
    auto_detect: AtomicBool,
    sink: RwLock<Option<DivergenceSink<E>>>,
}

impl<E> fmt::Debug for DivergenceDetector<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DivergenceDetector")
            .field("comparators", &self.comparators)
            .field("bisector", &self.bisector)
            .field("auto_detect", &self.auto_detect_flags())
            .field("sink", &self.sink.read().is_some())
            .finish()
    }
}

impl<E> DivergenceDetector<E> {
    /// Create a detector
    #[must_use]
    pub fn new(comparators: Comparators<E>, universe: FlagUniverse) -> Self {
        Self {
            comparators,
            bisector: OptionBisector::new(universe),
            auto_detect: AtomicBool::new(false),
            sink: RwLock::new(None),
        }
    }

    /// Equality hooks in use
    #[inline]
    #[must_use]
    pub fn comparators(&self) -> &Comparators<E> {
        &self.comparators
    }

    /// Flags searched by bisection
    #[inline]
    #[must_use]
    pub fn universe(&self) -> &FlagUniverse {
        self.bisector.universe()
    }

    /// Check if flag bisection runs on divergence
    #[inline]
    #[must_use]
    pub fn auto_detect_flags(&self) -> bool {
        self.auto_detect.load(Ordering::Relaxed)
    }

    /// Enable or disable flag bisection
    #[inline]
    pub fn set_auto_detect_flags(&self, enabled: bool) {
        self.auto_detect.store(enabled, Ordering::Relaxed);
    }

    /// Replace the sink
    pub fn set_sink(&self, sink: Option<DivergenceSink<E>>) {
        *self.sink.write() = sink;
    }

    /// Resolve the flags explaining a divergence
    ///
    /// Returns an empty set without calling `matches` when auto-detection is
    /// disabled.
    pub fn resolve_flags<F>(&self, caller_flags: &FlagSet, matches: F) -> FlagSet
    where
        F: FnMut(&FlagSet) -> bool,
    {
        if self.auto_detect_flags() {
            self.bisector.bisect(caller_flags, matches)
        } else {
            FlagSet::new()
        }
    }

    /// Record a divergence in `metrics`, log it and pass it to the sink
    pub fn report(&self, metrics: &OperationMetrics, record: &Divergence<'_, E>) {
        let caller = record.caller.to_string();
        metrics.divergences.inc();
        metrics.callers.increment(&caller);
        for name in record.flag_names() {
            metrics.flags.increment(name);
        }

        warn!(
            op = %record.op,
            caller = %caller,
            type_name = record.type_name,
            flags = %record.flags,
            "old and new paths diverged"
        );

        // Clone the handle so the sink runs without holding the lock.
        let sink = self.sink.read().clone();
        if let Some(sink) = sink {
            sink(record);
        }
    }
}
