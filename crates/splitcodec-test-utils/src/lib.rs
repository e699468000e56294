//! Testing utilities for the splitcodec workspace
//!
//! Reference engines, records, fixtures and a recording divergence sink.

#![allow(missing_docs)]

pub mod engine;
pub mod record;
pub mod sink;

pub use engine::{
    reference_universe, TextEngine, TextError, ALLOW_DUPLICATE_NAMES, ALLOW_INVALID_UTF8,
    ALL_FLAGS, ESCAPE_HTML, MATCH_CASE_INSENSITIVE_NAMES, MERGE_WITH_LEGACY_SEMANTICS, NULL_VALUE,
};
pub use record::{clone_person, Person, RawText, TextRecord};
pub use sink::{RecordedDivergence, RecordingSink};

use splitcodec_core::{CallMode, ModeRatio, SplitCodec, SplitCodecBuilder};

pub type TextCodec = SplitCodec<TextEngine, TextEngine>;

/// Legacy → strict builder with the reference universe and bisection on
pub fn reference_builder() -> SplitCodecBuilder<TextEngine, TextEngine> {
    SplitCodec::builder(TextEngine::legacy(), TextEngine::strict())
        .with_flag_universe(reference_universe())
        .with_auto_detect_flags(true)
}

/// Reference codec using `mode` in both directions, reporting into `sink`
pub fn setup_codec(mode: CallMode, sink: &RecordingSink) -> TextCodec {
    reference_builder()
        .with_encode_ratio(ModeRatio::single(mode))
        .with_decode_ratio(ModeRatio::single(mode))
        .with_divergence_sink(sink.callback())
        .build()
}

/// Like [`setup_codec`], with [`clone_person`] installed
pub fn setup_codec_with_clone(mode: CallMode, sink: &RecordingSink) -> TextCodec {
    reference_builder()
        .with_encode_ratio(ModeRatio::single(mode))
        .with_decode_ratio(ModeRatio::single(mode))
        .with_clone_hook(clone_person)
        .with_divergence_sink(sink.callback())
        .build()
}

/// Input whose names only match case-insensitively and repeat a field
pub const CASE_DUPLICATE_INPUT: &[u8] = b"FIRSTNAME=John;LASTNAME=Doe;lastName=Dupe";

/// Input nulling one field of a populated target
pub const NULL_MERGE_INPUT: &[u8] = b"firstName=~;lastName=Smith";

/// Input whose first field is not valid UTF-8
pub const INVALID_UTF8_INPUT: &[u8] = b"firstName=caf\xff;lastName=Doe";
