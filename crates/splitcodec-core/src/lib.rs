//! splitcodec core
//!
//! Call-site by call-site migration from one serialization engine to another.
//!
//! # Components
//!
//! - [`ModeRatioSelector`]: two [`CallMode`]s and a probability packed into one
//!   atomic word, drawn per call
//! - [`SplitCodec`]: runs the old path, the new path or both, keeping decode
//!   targets isolated between paths
//! - [`DivergenceDetector`]: compares dual-path results and reports mismatches
//! - [`OptionBisector`]: finds the flags that make the new path behave like
//!   the old one
//! - [`CodecMetrics`]: lock-free counters and histograms for every call
//!
//! # Example
//!
//! ```ignore
//! let codec = SplitCodec::builder(legacy, strict)
//!     .with_flag_universe(universe)
//!     .with_auto_detect_flags(true)
//!     .build();
//! codec.set_encode_call_ratio(CallMode::OnlyOld, CallMode::BothPreferOld, 0.01)?;
//! let bytes = codec.encode(&value, &FlagSet::new())?;
//! ```

#![warn(missing_docs)]

pub mod bisect;
pub mod codec;
pub mod compare;
pub mod config;
pub mod divergence;
pub mod engine;
pub mod error;
pub mod flags;
pub mod mode;
pub mod ratio;
pub mod shared;

pub use bisect::OptionBisector;
pub use codec::{SplitCodec, SplitCodecBuilder};
pub use compare::{clone_target, CloneHook, Comparators, DecodedEq, EncodedEq, ErrorsEq};
pub use config::{DirectionConfig, SplitConfig};
pub use divergence::{
    CallSite, Divergence, DivergenceDetector, DivergenceInput, DivergenceOutput, DivergenceSink,
};
pub use engine::{Decoder, Encoder, Engine};
pub use error::ConfigError;
pub use flags::{ConfigFlag, FlagSet, FlagUniverse};
pub use mode::{CallMode, Path};
pub use ratio::{ModeRatio, ModeRatioSelector};
pub use shared::SharedCodec;
pub use splitcodec_metrics::{CodecMetrics, OperationKind, OperationMetrics};

/// Commonly used items
pub mod prelude {
    pub use crate::{
        CallMode, ConfigFlag, Decoder, Divergence, Encoder, Engine, FlagSet, FlagUniverse,
        ModeRatio, SplitCodec, SplitConfig,
    };
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
