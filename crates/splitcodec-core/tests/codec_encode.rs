use pretty_assertions::assert_eq;
use splitcodec_core::{CallMode, Comparators, FlagSet, ModeRatio, OperationKind};
use splitcodec_metrics::SizeHistogram;
use splitcodec_test_utils::*;

#[test]
fn test_only_old_returns_legacy_bytes_without_comparing() {
    let sink = RecordingSink::new();
    let codec = setup_codec(CallMode::OnlyOld, &sink);

    let bytes = codec.encode(&Person::new("John", "Doe"), &FlagSet::new()).unwrap();
    assert_eq!(bytes, b"firstName=John;lastName=Doe");

    let m = &codec.metrics().encode;
    assert_eq!(m.total.load(), 1);
    assert_eq!(m.only_old.load(), 1);
    assert_eq!(m.return_old.load(), 1);
    assert_eq!(m.both_called.load(), 0);
    assert_eq!(m.sizes.count(SizeHistogram::bucket_index(bytes.len())), 1);
    assert!(sink.is_empty());
}

#[test]
fn test_both_prefer_old_reports_html_divergence() {
    let sink = RecordingSink::new();
    let codec = setup_codec(CallMode::BothPreferOld, &sink);

    let expected_line = line!() + 1;
    let bytes = codec.encode(&Person::new("<b>", "x"), &FlagSet::new()).unwrap();
    assert_eq!(bytes, br"firstName=\u003cb\u003e;lastName=x");

    let records = sink.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.op, OperationKind::Encode);
    assert_eq!(record.flags, FlagSet::new().with(ESCAPE_HTML, true));
    assert!(record.type_name.ends_with("Person"));
    assert!(record.input.contains("<b>"));
    assert!(record.caller.ends_with(&format!("codec_encode.rs:{expected_line}")));
    assert_eq!(record.old_error, None);
    assert_eq!(record.new_error, None);

    let m = &codec.metrics().encode;
    assert_eq!(m.both_called.load(), 1);
    assert_eq!(m.return_old.load(), 1);
    assert_eq!(m.divergences.load(), 1);
    assert_eq!(m.flags.get(ESCAPE_HTML), 1);
    assert_eq!(m.callers.get(&record.caller), 1);
}

#[test]
fn test_caller_flags_reach_both_paths() {
    let sink = RecordingSink::new();
    let codec = setup_codec(CallMode::BothPreferNew, &sink);

    let flags = FlagSet::new().with(ESCAPE_HTML, true);
    let bytes = codec.encode(&Person::new("<b>", "x"), &flags).unwrap();
    assert_eq!(bytes, br"firstName=\u003cb\u003e;lastName=x");
    assert!(sink.is_empty());
    assert_eq!(codec.metrics().encode.divergences.load(), 0);
}

#[test]
fn test_prefer_new_returns_new_error() {
    let sink = RecordingSink::new();
    let codec = setup_codec(CallMode::BothPreferNew, &sink);

    let err = codec.encode(&RawText(b"caf\xff".to_vec()), &FlagSet::new()).unwrap_err();
    assert_eq!(err, TextError::InvalidUtf8("text".into()));

    let m = &codec.metrics().encode;
    assert_eq!(m.errors.load(), 1);
    assert_eq!(m.return_new.load(), 1);
    assert_eq!(m.sizes.count(0), 1);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].old_error, None);
    assert_eq!(records[0].new_error.as_deref(), Some("invalid utf-8 in field \"text\""));
    assert_eq!(records[0].flags, FlagSet::new().with(ALLOW_INVALID_UTF8, true));
}

#[test]
fn test_new_then_old_on_error_falls_back_to_old() {
    let sink = RecordingSink::new();
    let codec = setup_codec(CallMode::NewThenOldOnError, &sink);

    let bytes = codec.encode(&RawText(b"caf\xff".to_vec()), &FlagSet::new()).unwrap();
    assert_eq!(bytes, "text=caf\u{fffd}".as_bytes());

    let m = &codec.metrics().encode;
    assert_eq!(m.both_called.load(), 1);
    assert_eq!(m.return_old.load(), 1);
    assert_eq!(m.errors.load(), 0);
    assert_eq!(m.divergences.load(), 1);
}

#[test]
fn test_fallback_success_only_calls_first_path() {
    let sink = RecordingSink::new();
    let codec = setup_codec(CallMode::NewThenOldOnError, &sink);

    let bytes = codec.encode(&Person::new("<b>", "x"), &FlagSet::new()).unwrap();
    assert_eq!(bytes, b"firstName=<b>;lastName=x");

    let m = &codec.metrics().encode;
    assert_eq!(m.only_new.load(), 1);
    assert_eq!(m.return_new.load(), 1);
    assert_eq!(m.both_called.load(), 0);
    assert_eq!(m.exec_time_old_nanos.load(), 0);
    assert!(sink.is_empty());
}

#[test]
fn test_disabled_auto_detect_reports_empty_flags() {
    let sink = RecordingSink::new();
    let codec = setup_codec(CallMode::BothPreferOld, &sink);
    codec.set_auto_detect_flags(false);

    codec.encode(&Person::new("<b>", "x"), &FlagSet::new()).unwrap();

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].flags.is_empty());
    assert!(codec.metrics().encode.flags.is_empty());
}

#[test]
fn test_custom_comparator_suppresses_divergence() {
    let sink = RecordingSink::new();
    let codec = reference_builder()
        .with_encode_ratio(ModeRatio::single(CallMode::BothPreferOld))
        .with_comparators(Comparators::new().with_encoded(|old, new| old.len().min(10) == new.len().min(10)))
        .with_divergence_sink(sink.callback())
        .build();

    codec.encode(&Person::new("<b>", "x"), &FlagSet::new()).unwrap();
    assert!(sink.is_empty());
    assert_eq!(codec.metrics().encode.divergences.load(), 0);
    assert_eq!(codec.metrics().encode.both_called.load(), 1);
}

#[test]
fn test_cleared_sink_still_counts() {
    let sink = RecordingSink::new();
    let codec = setup_codec(CallMode::BothPreferOld, &sink);
    codec.clear_divergence_sink();

    codec.encode(&Person::new("<b>", "x"), &FlagSet::new()).unwrap();
    assert!(sink.is_empty());
    assert_eq!(codec.metrics().encode.divergences.load(), 1);
}

#[test]
fn test_runtime_mode_switch() {
    let sink = RecordingSink::new();
    let codec = setup_codec(CallMode::OnlyOld, &sink);
    let person = Person::new("<b>", "x");

    codec.encode(&person, &FlagSet::new()).unwrap();
    codec.set_encode_call_mode(CallMode::OnlyNew);
    let bytes = codec.encode(&person, &FlagSet::new()).unwrap();
    assert_eq!(bytes, b"firstName=<b>;lastName=x");

    let m = &codec.metrics().encode;
    assert_eq!(m.only_old.load(), 1);
    assert_eq!(m.only_new.load(), 1);
    assert_eq!(m.total.load(), 2);
}
