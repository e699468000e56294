//! Call modes
//!
//! A [`CallMode`] decides which engine runs for a call and whose result is
//! returned. Modes are ordered from "old only" to "new only".

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two engines under comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Path {
    /// The engine being migrated away from
    Old,
    /// The replacement engine
    New,
}

impl Path {
    /// The opposite path
    #[inline]
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Old => Self::New,
            Self::New => Self::Old,
        }
    }

    /// Lowercase name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Old => "old",
            Self::New => "new",
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy selecting which path(s) execute for a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum CallMode {
    /// Run only the old path
    OnlyOld = 0,
    /// Run the old path; on error run the new path and return its result
    OldThenNewOnError = 1,
    /// Run both paths, return the old result
    BothPreferOld = 2,
    /// Run both paths, return the new result
    BothPreferNew = 3,
    /// Run the new path; on error run the old path and return its result
    NewThenOldOnError = 4,
    /// Run only the new path
    OnlyNew = 5,
}

impl CallMode {
    /// Every mode in order
    pub const ALL: [Self; 6] = [
        Self::OnlyOld,
        Self::OldThenNewOnError,
        Self::BothPreferOld,
        Self::BothPreferNew,
        Self::NewThenOldOnError,
        Self::OnlyNew,
    ];

    /// Numeric value used in the packed mode word
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnlyOld => "only_old",
            Self::OldThenNewOnError => "old_then_new_on_error",
            Self::BothPreferOld => "both_prefer_old",
            Self::BothPreferNew => "both_prefer_new",
            Self::NewThenOldOnError => "new_then_old_on_error",
            Self::OnlyNew => "only_new",
        }
    }

    /// One-line description
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::OnlyOld => "call the old engine only",
            Self::OldThenNewOnError => "call old; on error call new and return its result",
            Self::BothPreferOld => "call both, compare, return the old result",
            Self::BothPreferNew => "call both, compare, return the new result",
            Self::NewThenOldOnError => "call new; on error call old and return its result",
            Self::OnlyNew => "call the new engine only",
        }
    }

    /// Path whose result is returned when nothing fails
    #[inline]
    #[must_use]
    pub const fn preferred(self) -> Path {
        match self {
            Self::OnlyOld | Self::OldThenNewOnError | Self::BothPreferOld => Path::Old,
            Self::BothPreferNew | Self::NewThenOldOnError | Self::OnlyNew => Path::New,
        }
    }

    /// Path whose result is returned once both paths have run
    #[inline]
    #[must_use]
    pub const fn returned_after_both(self) -> Path {
        if self.is_fallback() {
            self.preferred().other()
        } else {
            self.preferred()
        }
    }

    /// Check if exactly one path ever runs
    #[inline]
    #[must_use]
    pub const fn is_single(self) -> bool {
        matches!(self, Self::OnlyOld | Self::OnlyNew)
    }

    /// Check if the second path runs only after the first fails
    #[inline]
    #[must_use]
    pub const fn is_fallback(self) -> bool {
        matches!(self, Self::OldThenNewOnError | Self::NewThenOldOnError)
    }

    /// Check if both paths always run
    #[inline]
    #[must_use]
    pub const fn is_both(self) -> bool {
        matches!(self, Self::BothPreferOld | Self::BothPreferNew)
    }
}

impl TryFrom<u16> for CallMode {
    type Error = ConfigError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(ConfigError::InvalidMode(value))
    }
}

impl FromStr for CallMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownMode(s.to_string()))
    }
}

impl fmt::Display for CallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
