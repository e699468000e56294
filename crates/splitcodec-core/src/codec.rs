//! Dual-path codec
//!
//! [`SplitCodec`] routes every encode and decode call to the old engine, the
//! new engine or both, according to a per-direction [`ModeRatioSelector`].
//! When both run, results are compared and divergences reported.
//!
//! Decode targets are mutable, so the second path always writes into its own
//! copy of the target as it was on entry. If no copy can be made the call
//! degrades to the mode's preferred path alone and is counted as skipped.

use crate::compare::{clone_target, CloneHook, Comparators};
use crate::divergence::{
    CallSite, Divergence, DivergenceDetector, DivergenceInput, DivergenceOutput, DivergenceSink,
};
use crate::engine::{Decoder, Encoder, Engine};
use crate::error::ConfigError;
use crate::flags::{FlagSet, FlagUniverse};
use crate::mode::{CallMode, Path};
use crate::ratio::{ModeRatio, ModeRatioSelector};
use splitcodec_metrics::{
    CodecMetrics, ExportError, MetricsSink, OperationKind, OperationMetrics, NAMESPACE,
};
use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Builder for [`SplitCodec`]
pub struct SplitCodecBuilder<Old: Engine, New> {
    old: Old,
    new: New,
    encode_ratio: ModeRatio,
    decode_ratio: ModeRatio,
    universe: FlagUniverse,
    auto_detect_flags: bool,
    comparators: Comparators<Old::Error>,
    clone_hook: Option<CloneHook>,
    sink: Option<DivergenceSink<Old::Error>>,
}

impl<Old, New> SplitCodecBuilder<Old, New>
where
    Old: Engine,
    New: Engine<Error = Old::Error>,
{
    /// Start from [`CallMode::OnlyOld`] in both directions
    pub fn new(old: Old, new: New) -> Self {
        Self {
            old,
            new,
            encode_ratio: ModeRatio::default(),
            decode_ratio: ModeRatio::default(),
            universe: FlagUniverse::default(),
            auto_detect_flags: false,
            comparators: Comparators::default(),
            clone_hook: None,
            sink: None,
        }
    }

    /// Set the encode mode ratio
    #[must_use]
    pub fn with_encode_ratio(mut self, ratio: ModeRatio) -> Self {
        self.encode_ratio = ratio;
        self
    }

    /// Set the decode mode ratio
    #[must_use]
    pub fn with_decode_ratio(mut self, ratio: ModeRatio) -> Self {
        self.decode_ratio = ratio;
        self
    }

    /// Set the flags searched by bisection
    #[must_use]
    pub fn with_flag_universe(mut self, universe: FlagUniverse) -> Self {
        self.universe = universe;
        self
    }

    /// Enable flag bisection on divergence
    #[must_use]
    pub fn with_auto_detect_flags(mut self, enabled: bool) -> Self {
        self.auto_detect_flags = enabled;
        self
    }

    /// Replace the equality hooks
    #[must_use]
    pub fn with_comparators(mut self, comparators: Comparators<Old::Error>) -> Self {
        self.comparators = comparators;
        self
    }

    /// Set the decode target clone hook
    #[must_use]
    pub fn with_clone_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&dyn Any) -> Option<Box<dyn Any>> + Send + Sync + 'static,
    {
        self.clone_hook = Some(Arc::new(hook));
        self
    }

    /// Set the divergence sink
    #[must_use]
    pub fn with_divergence_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&Divergence<'_, Old::Error>) + Send + Sync + 'static,
    {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Build the codec
    pub fn build(self) -> SplitCodec<Old, New> {
        let detector = DivergenceDetector::new(self.comparators, self.universe);
        detector.set_auto_detect_flags(self.auto_detect_flags);
        detector.set_sink(self.sink);
        SplitCodec {
            old: self.old,
            new: self.new,
            encode_ratio: ModeRatioSelector::new(self.encode_ratio),
            decode_ratio: ModeRatioSelector::new(self.decode_ratio),
            detector,
            clone_hook: self.clone_hook,
            metrics: CodecMetrics::new(),
        }
    }
}

/// Codec splitting calls between an old and a new engine
///
/// All methods take `&self`; one instance can serve any number of threads.
pub struct SplitCodec<Old: Engine, New> {
    old: Old,
    new: New,
    encode_ratio: ModeRatioSelector,
    decode_ratio: ModeRatioSelector,
    detector: DivergenceDetector<Old::Error>,
    clone_hook: Option<CloneHook>,
    metrics: CodecMetrics,
}

impl<Old, New> fmt::Debug for SplitCodec<Old, New>
where
    Old: Engine,
    New: Engine<Error = Old::Error>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitCodec")
            .field("old", &self.old.name())
            .field("new", &self.new.name())
            .field("encode_ratio", &self.encode_call_ratio())
            .field("decode_ratio", &self.decode_call_ratio())
            .field("detector", &self.detector)
            .finish_non_exhaustive()
    }
}

impl<Old, New> SplitCodec<Old, New>
where
    Old: Engine,
    New: Engine<Error = Old::Error>,
{
    /// Codec that only calls the old engine until reconfigured
    pub fn new(old: Old, new: New) -> Self {
        SplitCodecBuilder::new(old, new).build()
    }

    /// Start building a codec
    pub fn builder(old: Old, new: New) -> SplitCodecBuilder<Old, New> {
        SplitCodecBuilder::new(old, new)
    }

    /// Old engine
    #[inline]
    #[must_use]
    pub fn old(&self) -> &Old {
        &self.old
    }

    /// New engine
    #[inline]
    #[must_use]
    pub fn new_engine(&self) -> &New {
        &self.new
    }

    /// Metrics owned by this codec
    #[inline]
    #[must_use]
    pub fn metrics(&self) -> &CodecMetrics {
        &self.metrics
    }

    /// Divergence detector
    #[inline]
    #[must_use]
    pub fn detector(&self) -> &DivergenceDetector<Old::Error> {
        &self.detector
    }

    /// Publish a metrics snapshot under [`NAMESPACE`]
    ///
    /// # Errors
    ///
    /// Returns the sink's error.
    pub fn publish(&self, sink: &dyn MetricsSink) -> Result<(), ExportError> {
        sink.publish(NAMESPACE, &self.metrics.snapshot())
    }

    /// Use `mode2` for a `ratio` share of encode calls and `mode1` otherwise
    ///
    /// Safe to call while other threads encode.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRatio`] if `ratio` is outside `[0, 1]`.
    pub fn set_encode_call_ratio(
        &self,
        mode1: CallMode,
        mode2: CallMode,
        ratio: f64,
    ) -> Result<(), ConfigError> {
        self.encode_ratio.store(mode1, mode2, ratio)
    }

    /// Use `mode` for every encode call
    pub fn set_encode_call_mode(&self, mode: CallMode) {
        self.encode_ratio.set(ModeRatio::single(mode));
    }

    /// Replace the encode ratio
    pub fn set_encode_ratio(&self, ratio: ModeRatio) {
        self.encode_ratio.set(ratio);
    }

    /// Current encode ratio
    #[must_use]
    pub fn encode_call_ratio(&self) -> ModeRatio {
        self.encode_ratio.load()
    }

    /// Use `mode2` for a `ratio` share of decode calls and `mode1` otherwise
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRatio`] if `ratio` is outside `[0, 1]`.
    pub fn set_decode_call_ratio(
        &self,
        mode1: CallMode,
        mode2: CallMode,
        ratio: f64,
    ) -> Result<(), ConfigError> {
        self.decode_ratio.store(mode1, mode2, ratio)
    }

    /// Use `mode` for every decode call
    pub fn set_decode_call_mode(&self, mode: CallMode) {
        self.decode_ratio.set(ModeRatio::single(mode));
    }

    /// Replace the decode ratio
    pub fn set_decode_ratio(&self, ratio: ModeRatio) {
        self.decode_ratio.set(ratio);
    }

    /// Current decode ratio
    #[must_use]
    pub fn decode_call_ratio(&self) -> ModeRatio {
        self.decode_ratio.load()
    }

    /// Check if flag bisection runs on divergence
    #[must_use]
    pub fn auto_detect_flags(&self) -> bool {
        self.detector.auto_detect_flags()
    }

    /// Enable or disable flag bisection
    pub fn set_auto_detect_flags(&self, enabled: bool) {
        self.detector.set_auto_detect_flags(enabled);
    }

    /// Replace the divergence sink
    pub fn set_divergence_sink<F>(&self, sink: F)
    where
        F: Fn(&Divergence<'_, Old::Error>) + Send + Sync + 'static,
    {
        self.detector.set_sink(Some(Arc::new(sink)));
    }

    /// Remove the divergence sink
    pub fn clear_divergence_sink(&self) {
        self.detector.set_sink(None);
    }

    /// Encode `value`
    ///
    /// Returns the result of the path chosen by the current encode mode; path
    /// errors are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the selected engine's error.
    #[track_caller]
    pub fn encode<T>(&self, value: &T, flags: &FlagSet) -> Result<Vec<u8>, Old::Error>
    where
        T: fmt::Debug,
        Old: Encoder<T>,
        New: Encoder<T>,
    {
        let caller = CallSite::caller();
        let metrics = &self.metrics.encode;
        metrics.total.inc();

        let result = self.dispatch_encode(caller, value, flags);
        metrics.sizes.insert(result.as_ref().map_or(0, Vec::len));
        if result.is_err() {
            metrics.errors.inc();
        }
        result
    }

    /// Decode `input` into `target`
    ///
    /// `target` may hold data on entry; such calls are counted as merges and
    /// can only run both paths when the clone hook can copy the target.
    ///
    /// # Errors
    ///
    /// Returns the selected engine's error.
    #[track_caller]
    pub fn decode<T>(&self, input: &[u8], target: &mut T, flags: &FlagSet) -> Result<(), Old::Error>
    where
        T: Default + PartialEq + fmt::Debug + 'static,
        Old: Decoder<T>,
        New: Decoder<T>,
    {
        let caller = CallSite::caller();
        let metrics = &self.metrics.decode;
        metrics.total.inc();
        metrics.sizes.insert(input.len());
        if *target != T::default() {
            metrics.merge.inc();
        }

        let result = self.dispatch_decode(caller, input, target, flags);
        if result.is_err() {
            metrics.errors.inc();
        }
        result
    }

    fn dispatch_encode<T>(
        &self,
        caller: CallSite,
        value: &T,
        flags: &FlagSet,
    ) -> Result<Vec<u8>, Old::Error>
    where
        T: fmt::Debug,
        Old: Encoder<T>,
        New: Encoder<T>,
    {
        let metrics = &self.metrics.encode;
        let mode = self.encode_ratio.load_random();
        trace!(op = "encode", %mode, "selected call mode");

        let ((old, old_time), (new, new_time)) = match mode {
            CallMode::OnlyOld | CallMode::OnlyNew => {
                let path = mode.preferred();
                count_single(metrics, path);
                return self.encode_with(path, value, flags);
            }
            CallMode::OldThenNewOnError | CallMode::NewThenOldOnError => {
                let first = mode.preferred();
                let (result, elapsed) = timed(|| self.encode_with(first, value, flags));
                if result.is_ok() {
                    count_single(metrics, first);
                    return result;
                }
                let second = timed(|| self.encode_with(first.other(), value, flags));
                match first {
                    Path::Old => ((result, elapsed), second),
                    Path::New => (second, (result, elapsed)),
                }
            }
            CallMode::BothPreferOld | CallMode::BothPreferNew => (
                timed(|| self.encode_with(Path::Old, value, flags)),
                timed(|| self.encode_with(Path::New, value, flags)),
            ),
        };
        count_both(metrics, old_time, new_time);

        let cmp = self.detector.comparators();
        let old_bytes: &[u8] = old.as_deref().unwrap_or_default();
        let new_bytes: &[u8] = new.as_deref().unwrap_or_default();
        let old_error = old.as_ref().err();
        let new_error = new.as_ref().err();

        if !(cmp.encoded_eq(old_bytes, new_bytes) && cmp.errors_eq(old_error, new_error)) {
            let resolved = self.detector.resolve_flags(flags, |trial| {
                let retry = self.encode_with(Path::New, value, trial);
                cmp.encoded_eq(old_bytes, retry.as_deref().unwrap_or_default())
                    && cmp.errors_eq(old_error, retry.as_ref().err())
            });
            self.detector.report(
                metrics,
                &Divergence {
                    caller,
                    op: OperationKind::Encode,
                    type_name: type_name::<T>(),
                    input: DivergenceInput::Value(value),
                    output: DivergenceOutput::Encoded {
                        old: old_bytes,
                        new: new_bytes,
                    },
                    old_error,
                    new_error,
                    flags: &resolved,
                },
            );
        }

        select_result(metrics, mode, old, new)
    }

    fn dispatch_decode<T>(
        &self,
        caller: CallSite,
        input: &[u8],
        target: &mut T,
        flags: &FlagSet,
    ) -> Result<(), Old::Error>
    where
        T: Default + PartialEq + fmt::Debug + 'static,
        Old: Decoder<T>,
        New: Decoder<T>,
    {
        let metrics = &self.metrics.decode;
        let mode = self.decode_ratio.load_random();
        trace!(op = "decode", %mode, "selected call mode");

        if mode.is_single() {
            let path = mode.preferred();
            count_single(metrics, path);
            return self.decode_with(path, input, target, flags);
        }

        // One copy for the second path, one kept as it was on entry for
        // bisection retries.
        let copies = self
            .clone_target(target)
            .and_then(|pristine| Some((self.clone_target(&pristine)?, pristine)));
        let Some((mut second, pristine)) = copies else {
            let path = mode.preferred();
            debug!(
                op = "decode",
                %mode,
                type_name = type_name::<T>(),
                "decode target cannot be cloned; calling {path} path only"
            );
            metrics.both_skipped.inc();
            count_single(metrics, path);
            return self.decode_with(path, input, target, flags);
        };

        let ((old, old_time), (new, new_time)) = match mode {
            CallMode::OldThenNewOnError | CallMode::NewThenOldOnError => {
                let first = mode.preferred();
                let (result, elapsed) = timed(|| self.decode_with(first, input, target, flags));
                if result.is_ok() {
                    count_single(metrics, first);
                    return result;
                }
                let fallback = timed(|| self.decode_with(first.other(), input, &mut second, flags));
                // The caller gets the fallback value; the failed path's partial
                // value stays in `second` for comparison.
                std::mem::swap(target, &mut second);
                match first {
                    Path::Old => ((result, elapsed), fallback),
                    Path::New => (fallback, (result, elapsed)),
                }
            }
            _ => match mode.preferred() {
                Path::Old => (
                    timed(|| self.decode_with(Path::Old, input, target, flags)),
                    timed(|| self.decode_with(Path::New, input, &mut second, flags)),
                ),
                Path::New => (
                    timed(|| self.decode_with(Path::Old, input, &mut second, flags)),
                    timed(|| self.decode_with(Path::New, input, target, flags)),
                ),
            },
        };
        count_both(metrics, old_time, new_time);

        let cmp = self.detector.comparators();
        let (old_value, new_value): (&T, &T) = match mode.returned_after_both() {
            Path::Old => (&*target, &second),
            Path::New => (&second, &*target),
        };
        let old_error = old.as_ref().err();
        let new_error = new.as_ref().err();

        if !(cmp.decoded_eq(old_value, new_value) && cmp.errors_eq(old_error, new_error)) {
            let resolved = self.detector.resolve_flags(flags, |trial| {
                let Some(mut retry) = self.clone_target(&pristine) else {
                    return false;
                };
                let result = self.decode_with(Path::New, input, &mut retry, trial);
                cmp.decoded_eq(old_value, &retry) && cmp.errors_eq(old_error, result.as_ref().err())
            });
            self.detector.report(
                metrics,
                &Divergence {
                    caller,
                    op: OperationKind::Decode,
                    type_name: type_name::<T>(),
                    input: DivergenceInput::Bytes(input),
                    output: DivergenceOutput::Decoded {
                        old: old_value,
                        new: new_value,
                    },
                    old_error,
                    new_error,
                    flags: &resolved,
                },
            );
        }

        select_result(metrics, mode, old, new)
    }

    fn encode_with<T>(&self, path: Path, value: &T, flags: &FlagSet) -> Result<Vec<u8>, Old::Error>
    where
        Old: Encoder<T>,
        New: Encoder<T>,
    {
        match path {
            Path::Old => <Old as Encoder<T>>::encode(&self.old, value, flags),
            Path::New => <New as Encoder<T>>::encode(&self.new, value, flags),
        }
    }

    fn decode_with<T>(
        &self,
        path: Path,
        input: &[u8],
        target: &mut T,
        flags: &FlagSet,
    ) -> Result<(), Old::Error>
    where
        Old: Decoder<T>,
        New: Decoder<T>,
    {
        match path {
            Path::Old => <Old as Decoder<T>>::decode(&self.old, input, target, flags),
            Path::New => <New as Decoder<T>>::decode(&self.new, input, target, flags),
        }
    }

    fn clone_target<T>(&self, target: &T) -> Option<T>
    where
        T: Default + PartialEq + 'static,
    {
        clone_target(self.clone_hook.as_ref(), target)
    }
}

fn timed<R>(f: impl FnOnce() -> R) -> (R, Duration) {
    let start = Instant::now();
    let result = f();
    (result, start.elapsed())
}

fn count_single(metrics: &OperationMetrics, path: Path) {
    match path {
        Path::Old => {
            metrics.only_old.inc();
            metrics.return_old.inc();
        }
        Path::New => {
            metrics.only_new.inc();
            metrics.return_new.inc();
        }
    }
}

fn count_both(metrics: &OperationMetrics, old_time: Duration, new_time: Duration) {
    metrics.both_called.inc();
    metrics.exec_time_old_nanos.add_duration(old_time);
    metrics.exec_time_new_nanos.add_duration(new_time);
}

fn select_result<R>(metrics: &OperationMetrics, mode: CallMode, old: R, new: R) -> R {
    match mode.returned_after_both() {
        Path::Old => {
            metrics.return_old.inc();
            old
        }
        Path::New => {
            metrics.return_new.inc();
            new
        }
    }
}
