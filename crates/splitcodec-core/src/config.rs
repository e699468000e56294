//! Codec configuration
//!
//! A [`SplitConfig`] is read from TOML and applied to a running codec:
//!
//! ```toml
//! auto_detect_flags = true
//!
//! [encode]
//! mode1 = "only_old"
//! mode2 = "both_prefer_old"
//! ratio = 0.1
//!
//! [decode]
//! mode = "old_then_new_on_error"
//!
//! [flags]
//! escape_html = false
//! ```

use crate::codec::SplitCodec;
use crate::engine::Engine;
use crate::error::ConfigError;
use crate::flags::{FlagSet, FlagUniverse};
use crate::mode::CallMode;
use crate::ratio::ModeRatio;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mode settings for one direction
///
/// `mode` is shorthand for `mode1 = mode2 = mode, ratio = 1` and wins over
/// the other keys. Without it, `mode1` defaults to `only_old`, `mode2` to
/// `mode1` and `ratio` to 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectionConfig {
    /// Single mode for every call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<CallMode>,
    /// Mode used with probability `1 - ratio`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode1: Option<CallMode>,
    /// Mode used with probability `ratio`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode2: Option<CallMode>,
    /// Probability of `mode2`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
}

impl DirectionConfig {
    /// Always use `mode`
    #[must_use]
    pub fn single(mode: CallMode) -> Self {
        Self {
            mode: Some(mode),
            ..Self::default()
        }
    }

    /// Resolve to a validated ratio
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRatio`] if `ratio` is outside `[0, 1]`.
    pub fn to_mode_ratio(&self) -> Result<ModeRatio, ConfigError> {
        if let Some(mode) = self.mode {
            return Ok(ModeRatio::single(mode));
        }
        let mode1 = self.mode1.unwrap_or(CallMode::OnlyOld);
        let mode2 = self.mode2.unwrap_or(mode1);
        ModeRatio::new(mode1, mode2, self.ratio.unwrap_or(0.0))
    }
}

/// Runtime configuration of a [`SplitCodec`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitConfig {
    /// Run flag bisection on divergence; unchanged when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_detect_flags: Option<bool>,
    /// Encode direction
    #[serde(default)]
    pub encode: DirectionConfig,
    /// Decode direction
    #[serde(default)]
    pub decode: DirectionConfig,
    /// Flags callers pass on every call
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: BTreeMap<String, bool>,
}

impl SplitConfig {
    /// Parse a TOML document
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed documents, unknown keys
    /// and unknown mode names.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Set the encode direction
    #[must_use]
    pub fn with_encode(mut self, encode: DirectionConfig) -> Self {
        self.encode = encode;
        self
    }

    /// Set the decode direction
    #[must_use]
    pub fn with_decode(mut self, decode: DirectionConfig) -> Self {
        self.decode = decode;
        self
    }

    /// Set auto-detection
    #[must_use]
    pub fn with_auto_detect_flags(mut self, enabled: bool) -> Self {
        self.auto_detect_flags = Some(enabled);
        self
    }

    /// Validated encode and decode ratios
    ///
    /// # Errors
    ///
    /// Returns the first invalid direction's error.
    pub fn ratios(&self) -> Result<(ModeRatio, ModeRatio), ConfigError> {
        Ok((self.encode.to_mode_ratio()?, self.decode.to_mode_ratio()?))
    }

    /// Caller flags, checked against `universe`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownFlag`] for flags outside `universe`.
    pub fn caller_flags(&self, universe: &FlagUniverse) -> Result<FlagSet, ConfigError> {
        let flags: FlagSet = self.flags.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        universe.check(&flags)?;
        Ok(flags)
    }

    /// Apply to a running codec
    ///
    /// Both directions are validated before either is changed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRatio`] without touching the codec.
    pub fn apply<Old, New>(&self, codec: &SplitCodec<Old, New>) -> Result<(), ConfigError>
    where
        Old: Engine,
        New: Engine<Error = Old::Error>,
    {
        let (encode, decode) = self.ratios()?;
        codec.set_encode_ratio(encode);
        codec.set_decode_ratio(decode);
        if let Some(enabled) = self.auto_detect_flags {
            codec.set_auto_detect_flags(enabled);
        }
        tracing::info!(%encode, %decode, auto_detect = codec.auto_detect_flags(), "applied codec configuration");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::ConfigFlag;

    #[test]
    fn parse_full_document() {
        let config = SplitConfig::from_toml_str(
            r#"
            auto_detect_flags = true

            [encode]
            mode1 = "only_old"
            mode2 = "both_prefer_old"
            ratio = 0.25

            [decode]
            mode = "new_then_old_on_error"

            [flags]
            escape_html = false
            "#,
        )
        .unwrap();

        let (encode, decode) = config.ratios().unwrap();
        assert_eq!(
            encode,
            ModeRatio::new(CallMode::OnlyOld, CallMode::BothPreferOld, 0.25).unwrap()
        );
        assert_eq!(decode, ModeRatio::single(CallMode::NewThenOldOnError));
        assert_eq!(config.auto_detect_flags, Some(true));
        assert_eq!(config.flags.get("escape_html"), Some(&false));
    }

    #[test]
    fn empty_document_is_only_old() {
        let config = SplitConfig::from_toml_str("").unwrap();
        let (encode, decode) = config.ratios().unwrap();
        assert_eq!(encode, ModeRatio::default());
        assert_eq!(decode, ModeRatio::default());
        assert_eq!(config.auto_detect_flags, None);
    }

    #[test]
    fn mode2_defaults_to_mode1() {
        let dir = DirectionConfig {
            mode1: Some(CallMode::BothPreferNew),
            ratio: Some(0.5),
            ..DirectionConfig::default()
        };
        let ratio = dir.to_mode_ratio().unwrap();
        assert_eq!(ratio.mode1(), CallMode::BothPreferNew);
        assert_eq!(ratio.mode2(), CallMode::BothPreferNew);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = SplitConfig::from_toml_str("[encode]\nmode1 = \"sometimes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = SplitConfig::from_toml_str("[decode]\nratio = 1.5").unwrap();
        assert!(err.ratios().unwrap_err().is_ratio_error());

        let err = SplitConfig::from_toml_str("unknown_key = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn caller_flags_are_checked() {
        let universe = FlagUniverse::new([ConfigFlag::new("escape_html")]).unwrap();
        let mut config = SplitConfig::default();
        config.flags.insert("escape_html".into(), false);
        assert_eq!(
            config.caller_flags(&universe).unwrap(),
            FlagSet::new().with("escape_html", false)
        );

        config.flags.insert("nope".into(), true);
        assert!(matches!(
            config.caller_flags(&universe),
            Err(ConfigError::UnknownFlag(name)) if name == "nope"
        ));
    }

    #[test]
    fn serializes_back_to_toml() {
        let config = SplitConfig::default()
            .with_encode(DirectionConfig::single(CallMode::BothPreferOld))
            .with_auto_detect_flags(false);
        let text = toml::to_string(&config).unwrap();
        assert_eq!(SplitConfig::from_toml_str(&text).unwrap(), config);
    }
}
