use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use splitcodec_core::{CallMode, ConfigError, ModeRatio, ModeRatioSelector};

fn call_mode() -> impl Strategy<Value = CallMode> {
    proptest::sample::select(CallMode::ALL.to_vec())
}

proptest! {
    #[test]
    fn prop_pack_roundtrip(m1 in call_mode(), m2 in call_mode(), ratio in 0.0f64..=1.0) {
        let r = ModeRatio::new(m1, m2, ratio).unwrap();
        prop_assert_eq!(ModeRatio::unpack(r.pack()).unwrap(), r);
    }

    #[test]
    fn prop_selector_loads_what_was_stored(m1 in call_mode(), m2 in call_mode(), ratio in 0.0f64..=1.0) {
        let selector = ModeRatioSelector::default();
        selector.store(m1, m2, ratio).unwrap();
        let loaded = selector.load();
        prop_assert_eq!(loaded.mode1(), m1);
        prop_assert_eq!(loaded.mode2(), m2);
        prop_assert!((loaded.ratio() - ratio).abs() < 1e-6);
    }

    #[test]
    fn prop_draw_is_one_of_the_two_modes(m1 in call_mode(), m2 in call_mode(), ratio in 0.0f64..=1.0, seed: u64) {
        let selector = ModeRatioSelector::new(ModeRatio::new(m1, m2, ratio).unwrap());
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..32 {
            let mode = selector.load_random_with(&mut rng);
            prop_assert!(mode == m1 || mode == m2);
        }
    }

    #[test]
    fn prop_out_of_range_ratio_is_rejected(ratio in prop_oneof![-1e6f64..-1e-9, 1.000_001f64..1e6]) {
        let selector = ModeRatioSelector::default();
        let err = selector.store(CallMode::OnlyNew, CallMode::OnlyNew, ratio).unwrap_err();
        prop_assert!(err.is_ratio_error());
        prop_assert_eq!(selector.load(), ModeRatio::default());
    }
}

fn mode2_share(ratio: f64, draws: usize) -> f64 {
    let selector = ModeRatioSelector::new(
        ModeRatio::new(CallMode::OnlyOld, CallMode::BothPreferOld, ratio).unwrap(),
    );
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let hits = (0..draws)
        .filter(|_| selector.load_random_with(&mut rng) == CallMode::BothPreferOld)
        .count();
    hits as f64 / draws as f64
}

#[test]
fn test_draw_frequency_tracks_ratio() {
    for ratio in [0.01, 0.25, 0.5, 0.9] {
        let share = mode2_share(ratio, 100_000);
        assert!(
            (share - ratio).abs() < 0.01,
            "ratio {ratio}: observed share {share}"
        );
    }
}

#[test]
fn test_ratio_bounds_are_exact() {
    assert_eq!(mode2_share(0.0, 10_000), 0.0);
    assert_eq!(mode2_share(1.0, 10_000), 1.0);
}

#[test]
fn test_invalid_values_keep_previous_ratio() {
    let before = ModeRatio::new(CallMode::OnlyOld, CallMode::OnlyNew, 0.5).unwrap();
    let selector = ModeRatioSelector::new(before);

    assert!(selector.store(CallMode::OnlyOld, CallMode::OnlyNew, f64::NAN).is_err());
    assert!(matches!(selector.store_raw(0, 6, 0.5), Err(ConfigError::InvalidMode(6))));
    assert!(matches!(selector.store_raw(9, 0, 0.5), Err(ConfigError::InvalidMode(9))));
    assert_eq!(selector.load(), before);

    selector.store_raw(5, 4, 0.75).unwrap();
    assert_eq!(
        selector.load(),
        ModeRatio::new(CallMode::OnlyNew, CallMode::NewThenOldOnError, 0.75).unwrap()
    );
}
