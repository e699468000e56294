//! Error types for splitcodec core
//!
//! Configuration mistakes fail fast with [`ConfigError`]. Errors produced by
//! the engines themselves are never wrapped; they reach the caller unchanged.

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Mode value outside the call mode enumeration
    #[error("invalid call mode: {0}")]
    InvalidMode(u16),

    /// Ratio outside `[0, 1]` or not a number
    #[error("invalid call ratio: {0} (must be within [0, 1])")]
    InvalidRatio(f64),

    /// Unrecognized mode name
    #[error("unknown call mode: {0:?}")]
    UnknownMode(String),

    /// Flag declared twice in one universe
    #[error("duplicate flag: {0}")]
    DuplicateFlag(String),

    /// Flag not present in the universe
    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    /// Malformed configuration document
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Shared codec was already installed
    #[error("shared codec already installed")]
    AlreadyInstalled,
}

impl ConfigError {
    /// Check if error concerns a call mode
    #[inline]
    #[must_use]
    pub fn is_mode_error(&self) -> bool {
        matches!(self, Self::InvalidMode(_) | Self::UnknownMode(_))
    }

    /// Check if error concerns a call ratio
    #[inline]
    #[must_use]
    pub fn is_ratio_error(&self) -> bool {
        matches!(self, Self::InvalidRatio(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_predicates() {
        assert!(ConfigError::InvalidMode(9).is_mode_error());
        assert!(ConfigError::UnknownMode("both".into()).is_mode_error());
        assert!(ConfigError::InvalidRatio(1.5).is_ratio_error());
        assert!(!ConfigError::AlreadyInstalled.is_mode_error());
        assert!(!ConfigError::DuplicateFlag("x".into()).is_ratio_error());
    }

    #[test]
    fn error_messages() {
        assert_eq!(ConfigError::InvalidMode(6).to_string(), "invalid call mode: 6");
        assert_eq!(
            ConfigError::InvalidRatio(-0.5).to_string(),
            "invalid call ratio: -0.5 (must be within [0, 1])"
        );
        assert_eq!(
            ConfigError::UnknownMode("sometimes".into()).to_string(),
            "unknown call mode: \"sometimes\""
        );
    }
}
