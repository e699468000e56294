//! Migration simulator
//!
//! Drives a legacy → strict codec built from the reference text engines with a
//! seeded synthetic workload, then checks the metric accounting: every call
//! must land in exactly one of only-old, only-new or both-called, and return
//! exactly one path's result.

use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use splitcodec_core::{CallMode, Divergence, FlagSet, ModeRatio};
use splitcodec_metrics::{MetricValue, MetricsSnapshot, OperationKind, OperationMetrics};
use splitcodec_test_utils::{
    clone_person, reference_builder, Person, RawText, TextCodec, TextError,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

const FIRST_NAMES: [&str; 6] = ["John", "Ann", "Mei", "Omar", "Zoë", "Lars"];
const LAST_NAMES: [&str; 6] = ["Doe", "Lee", "Chen", "Haddad", "Novak", "Berg"];

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for the workload
    pub seed: u64,
    /// Number of codec calls
    pub total_operations: u64,
    /// Encode mode ratio
    pub encode_ratio: ModeRatio,
    /// Decode mode ratio
    pub decode_ratio: ModeRatio,
    /// Run flag bisection on divergence
    pub auto_detect_flags: bool,
    /// Install a clone hook so merges can run both paths
    pub clone_targets: bool,
    /// Flags passed on every call
    pub caller_flags: FlagSet,
    /// Operation mix
    pub distribution: WorkloadDistribution,
    /// Divergences kept for the report
    pub max_samples: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        let canary = ModeRatio::new(CallMode::OnlyOld, CallMode::BothPreferOld, 0.1)
            .unwrap_or_default();
        Self {
            seed: 42,
            total_operations: 10_000,
            encode_ratio: canary,
            decode_ratio: canary,
            auto_detect_flags: true,
            clone_targets: false,
            caller_flags: FlagSet::new(),
            distribution: WorkloadDistribution::default(),
            max_samples: 10,
        }
    }
}

/// Relative weights of the generated operations
#[derive(Debug, Clone)]
pub struct WorkloadDistribution {
    /// Encode of a plain record; both engines agree
    pub plain_encode: f64,
    /// Encode of a record with HTML characters
    pub html_encode: f64,
    /// Encode of bytes that are not valid UTF-8
    pub invalid_utf8_encode: f64,
    /// Decode of a well-formed document into an empty record
    pub plain_decode: f64,
    /// Decode with mismatched name case and a repeated field
    pub case_duplicate_decode: f64,
    /// Decode of an explicit null into a populated record
    pub merge_decode: f64,
}

impl Default for WorkloadDistribution {
    fn default() -> Self {
        Self {
            plain_encode: 0.35,
            html_encode: 0.10,
            invalid_utf8_encode: 0.05,
            plain_decode: 0.30,
            case_duplicate_decode: 0.10,
            merge_decode: 0.10,
        }
    }
}

impl WorkloadDistribution {
    /// Workload made of a single operation kind
    #[must_use]
    pub fn only(kind: WorkloadOp) -> Self {
        let mut d = Self {
            plain_encode: 0.0,
            html_encode: 0.0,
            invalid_utf8_encode: 0.0,
            plain_decode: 0.0,
            case_duplicate_decode: 0.0,
            merge_decode: 0.0,
        };
        *d.weight_mut(kind) = 1.0;
        d
    }

    fn weight_mut(&mut self, kind: WorkloadOp) -> &mut f64 {
        match kind {
            WorkloadOp::PlainEncode => &mut self.plain_encode,
            WorkloadOp::HtmlEncode => &mut self.html_encode,
            WorkloadOp::InvalidUtf8Encode => &mut self.invalid_utf8_encode,
            WorkloadOp::PlainDecode => &mut self.plain_decode,
            WorkloadOp::CaseDuplicateDecode => &mut self.case_duplicate_decode,
            WorkloadOp::MergeDecode => &mut self.merge_decode,
        }
    }

    fn weights(&self) -> [(WorkloadOp, f64); 6] {
        [
            (WorkloadOp::PlainEncode, self.plain_encode),
            (WorkloadOp::HtmlEncode, self.html_encode),
            (WorkloadOp::InvalidUtf8Encode, self.invalid_utf8_encode),
            (WorkloadOp::PlainDecode, self.plain_decode),
            (WorkloadOp::CaseDuplicateDecode, self.case_duplicate_decode),
            (WorkloadOp::MergeDecode, self.merge_decode),
        ]
    }
}

/// Kinds of generated operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkloadOp {
    /// See [`WorkloadDistribution::plain_encode`]
    PlainEncode,
    /// See [`WorkloadDistribution::html_encode`]
    HtmlEncode,
    /// See [`WorkloadDistribution::invalid_utf8_encode`]
    InvalidUtf8Encode,
    /// See [`WorkloadDistribution::plain_decode`]
    PlainDecode,
    /// See [`WorkloadDistribution::case_duplicate_decode`]
    CaseDuplicateDecode,
    /// See [`WorkloadDistribution::merge_decode`]
    MergeDecode,
}

impl WorkloadOp {
    /// snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlainEncode => "plain_encode",
            Self::HtmlEncode => "html_encode",
            Self::InvalidUtf8Encode => "invalid_utf8_encode",
            Self::PlainDecode => "plain_decode",
            Self::CaseDuplicateDecode => "case_duplicate_decode",
            Self::MergeDecode => "merge_decode",
        }
    }
}

/// A generated codec call
#[derive(Debug, Clone)]
pub enum SimulatedOperation {
    /// Encode a record
    Encode(Person),
    /// Encode raw bytes
    EncodeRaw(RawText),
    /// Decode `input` into `target`
    Decode {
        /// Encoded document
        input: Vec<u8>,
        /// Target contents on entry
        target: Person,
    },
}

/// Counts collected while simulating
#[derive(Debug, Clone, Default)]
pub struct OperationStats {
    /// Calls made
    pub total_operations: u64,
    /// Calls returning `Ok`
    pub successful_operations: u64,
    /// Calls returning an engine error
    pub failed_operations: u64,
    /// Calls per generated kind
    pub operations_by_type: BTreeMap<&'static str, u64>,
}

impl OperationStats {
    fn record(&mut self, kind: WorkloadOp, result: &Result<(), TextError>) {
        self.total_operations += 1;
        *self.operations_by_type.entry(kind.as_str()).or_insert(0) += 1;
        match result {
            Ok(()) => self.successful_operations += 1,
            Err(_) => self.failed_operations += 1,
        }
    }
}

/// Final report from the simulator
#[derive(Debug, Clone)]
pub struct SimulatorReport {
    /// Configuration the run used
    pub config: SimulatorConfig,
    /// Call counts
    pub stats: OperationStats,
    /// Metrics exported by the codec after the run
    pub snapshot: MetricsSnapshot,
    /// First divergences, rendered one per line
    pub samples: Vec<String>,
    /// Accounting checks that failed
    pub violations: Vec<String>,
    /// Wall time of the workload
    pub elapsed: Duration,
}

impl SimulatorReport {
    /// Check if every accounting check held
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Exported counter by name, 0 if absent
    #[must_use]
    pub fn count(&self, name: &str) -> u64 {
        self.snapshot
            .get(name)
            .and_then(MetricValue::as_count)
            .unwrap_or(0)
    }

    /// Generate a text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== splitcodec Simulator Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!("Encode Ratio: {}\n", self.config.encode_ratio));
        report.push_str(&format!("Decode Ratio: {}\n", self.config.decode_ratio));
        report.push_str(&format!("Auto-detect Flags: {}\n", self.config.auto_detect_flags));
        report.push_str(&format!("Caller Flags: {}\n", self.config.caller_flags));
        report.push_str(&format!("Total Operations: {}\n", self.stats.total_operations));
        report.push_str(&format!("Successful: {}\n", self.stats.successful_operations));
        report.push_str(&format!("Failed: {}\n", self.stats.failed_operations));
        let secs = self.elapsed.as_secs_f64();
        #[allow(clippy::cast_precision_loss)]
        let rate = self.stats.total_operations as f64 / secs.max(f64::EPSILON);
        report.push_str(&format!("Elapsed: {secs:.2}s ({rate:.0} ops/sec)\n"));

        report.push_str("\n=== Operations ===\n");
        for (kind, n) in &self.stats.operations_by_type {
            report.push_str(&format!("  {kind}: {n}\n"));
        }

        report.push_str("\n=== Metrics ===\n");
        for (name, value) in self.snapshot.iter() {
            let rendered = match value {
                MetricValue::Count(n) => n.to_string(),
                other => serde_json::to_string(other).unwrap_or_default(),
            };
            report.push_str(&format!("  {name}: {rendered}\n"));
        }

        if !self.samples.is_empty() {
            report.push_str("\n=== Divergence Samples ===\n");
            for (i, sample) in self.samples.iter().enumerate() {
                report.push_str(&format!("{}. {}\n", i + 1, sample));
            }
        }

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {}\n", i + 1, v));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        report
    }
}

/// Build the codec a run drives
#[must_use]
pub fn build_codec(config: &SimulatorConfig, samples: Arc<Mutex<Vec<String>>>) -> TextCodec {
    let max_samples = config.max_samples;
    let mut builder = reference_builder()
        .with_encode_ratio(config.encode_ratio)
        .with_decode_ratio(config.decode_ratio)
        .with_auto_detect_flags(config.auto_detect_flags)
        .with_divergence_sink(move |d: &Divergence<'_, TextError>| {
            let mut samples = samples.lock();
            if samples.len() < max_samples {
                samples.push(format!(
                    "{} at {} ({}): {:?} flags=[{}]",
                    d.op, d.caller, d.type_name, d.output, d.flags
                ));
            }
        });
    if config.clone_targets {
        builder = builder.with_clone_hook(clone_person);
    }
    builder.build()
}

/// Run the simulator
pub fn run_simulator(config: SimulatorConfig) -> SimulatorReport {
    let samples = Arc::new(Mutex::new(Vec::new()));
    let codec = build_codec(&config, Arc::clone(&samples));
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut stats = OperationStats::default();

    info!(
        seed = config.seed,
        ops = config.total_operations,
        encode = %config.encode_ratio,
        decode = %config.decode_ratio,
        "starting simulation"
    );

    let start = Instant::now();
    for _ in 0..config.total_operations {
        let (kind, operation) = generate_operation(&mut rng, &config.distribution);
        let result = execute_operation(&codec, operation, &config.caller_flags);
        stats.record(kind, &result);
    }
    let elapsed = start.elapsed();

    let metrics = codec.metrics();
    let mut violations = Vec::new();
    check_accounting(OperationKind::Encode, &metrics.encode, &mut violations);
    check_accounting(OperationKind::Decode, &metrics.decode, &mut violations);
    let calls = metrics.encode.total.load() + metrics.decode.total.load();
    if calls != stats.total_operations {
        violations.push(format!(
            "codec saw {calls} calls, simulator made {}",
            stats.total_operations
        ));
    }

    info!(
        ops = stats.total_operations,
        divergences = metrics.encode.divergences.load() + metrics.decode.divergences.load(),
        elapsed_ms = elapsed.as_millis(),
        "simulation finished"
    );

    let samples = samples.lock().clone();
    SimulatorReport {
        snapshot: metrics.snapshot(),
        config,
        stats,
        samples,
        violations,
        elapsed,
    }
}

fn check_accounting(op: OperationKind, m: &OperationMetrics, violations: &mut Vec<String>) {
    let total = m.total.load();
    let paths = m.only_old.load() + m.only_new.load() + m.both_called.load();
    if paths != total {
        violations.push(format!("{op}: {paths} path counts for {total} calls"));
    }
    let returns = m.return_old.load() + m.return_new.load();
    if returns != total {
        violations.push(format!("{op}: {returns} returned results for {total} calls"));
    }
    if m.sizes.total() != total {
        violations.push(format!("{op}: {} sizes for {total} calls", m.sizes.total()));
    }
    if m.both_skipped.load() > m.only_old.load() + m.only_new.load() {
        violations.push(format!("{op}: skipped dual calls exceed single-path calls"));
    }
}

/// Draw the next operation
pub fn generate_operation(
    rng: &mut StdRng,
    distribution: &WorkloadDistribution,
) -> (WorkloadOp, SimulatedOperation) {
    let weights = distribution.weights();
    let total: f64 = weights.iter().map(|(_, w)| w.max(0.0)).sum();
    let mut draw = rng.gen::<f64>() * total;
    let mut kind = WorkloadOp::PlainEncode;
    for (candidate, weight) in weights {
        let weight = weight.max(0.0);
        if weight > 0.0 {
            kind = candidate;
            if draw < weight {
                break;
            }
            draw -= weight;
        }
    }

    let first = FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())];
    let last = LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())];

    let operation = match kind {
        WorkloadOp::PlainEncode => SimulatedOperation::Encode(Person::new(first, last)),
        WorkloadOp::HtmlEncode => {
            SimulatedOperation::Encode(Person::new(&format!("<b>{first}</b>"), last))
        }
        WorkloadOp::InvalidUtf8Encode => {
            let mut bytes = first.as_bytes().to_vec();
            bytes.push(0xff);
            SimulatedOperation::EncodeRaw(RawText(bytes))
        }
        WorkloadOp::PlainDecode => SimulatedOperation::Decode {
            input: format!("firstName={first};lastName={last}").into_bytes(),
            target: Person::default(),
        },
        WorkloadOp::CaseDuplicateDecode => SimulatedOperation::Decode {
            input: format!("FIRSTNAME={first};lastName={last};lastName={last}").into_bytes(),
            target: Person::default(),
        },
        WorkloadOp::MergeDecode => SimulatedOperation::Decode {
            input: format!("firstName=~;lastName={last}").into_bytes(),
            target: Person::new(first, "Unknown"),
        },
    };
    (kind, operation)
}

fn execute_operation(
    codec: &TextCodec,
    operation: SimulatedOperation,
    flags: &FlagSet,
) -> Result<(), TextError> {
    match operation {
        SimulatedOperation::Encode(person) => codec.encode(&person, flags).map(drop),
        SimulatedOperation::EncodeRaw(raw) => codec.encode(&raw, flags).map(drop),
        SimulatedOperation::Decode { input, mut target } => {
            codec.decode(&input, &mut target, flags)
        }
    }
}
