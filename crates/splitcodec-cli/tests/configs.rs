use pretty_assertions::assert_eq;
use splitcodec_cli::{run_simulator, SimulatorConfig};
use splitcodec_core::{CallMode, FlagSet, ModeRatio, SplitConfig};
use splitcodec_test_utils::{reference_universe, ESCAPE_HTML};

const CANARY: &str = include_str!("../configs/canary.toml");
const CUTOVER: &str = include_str!("../configs/cutover.toml");

#[test]
fn test_canary_config() {
    let config = SplitConfig::from_toml_str(CANARY).unwrap();
    let (encode, decode) = config.ratios().unwrap();
    let expected = ModeRatio::new(CallMode::OnlyOld, CallMode::BothPreferOld, 0.01).unwrap();
    assert_eq!(encode, expected);
    assert_eq!(decode, expected);
    assert_eq!(config.auto_detect_flags, Some(true));
    assert!(config.caller_flags(&reference_universe()).unwrap().is_empty());
}

#[test]
fn test_cutover_config_runs_clean() {
    let config = SplitConfig::from_toml_str(CUTOVER).unwrap();
    let (encode, decode) = config.ratios().unwrap();
    assert_eq!(encode, ModeRatio::single(CallMode::NewThenOldOnError));

    let flags = config.caller_flags(&reference_universe()).unwrap();
    assert_eq!(flags, FlagSet::new().with(ESCAPE_HTML, true));

    let report = run_simulator(SimulatorConfig {
        total_operations: 1_000,
        encode_ratio: encode,
        decode_ratio: decode,
        auto_detect_flags: false,
        caller_flags: flags,
        ..SimulatorConfig::default()
    });
    assert!(report.passed(), "{}", report.generate_text());
    assert_eq!(report.stats.total_operations, 1_000);
}
