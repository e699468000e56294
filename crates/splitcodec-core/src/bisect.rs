//! Flag bisection
//!
//! Finds which flags the new path needs, set to their old-compatible values,
//! to reproduce the old path's result. The search toggles one flag at a time,
//! so flags that only matter in combination with others are not detected.

use crate::flags::{FlagSet, FlagUniverse};
use tracing::debug;

/// Single-flag search over a [`FlagUniverse`]
#[derive(Debug, Clone, Default)]
pub struct OptionBisector {
    universe: FlagUniverse,
}

impl OptionBisector {
    /// Create a bisector over `universe`
    #[must_use]
    pub fn new(universe: FlagUniverse) -> Self {
        Self { universe }
    }

    /// Flags searched
    #[inline]
    #[must_use]
    pub fn universe(&self) -> &FlagUniverse {
        &self.universe
    }

    /// Find the flags necessary for `matches` to hold
    ///
    /// `matches` re-runs the new path with the given flags and reports whether
    /// it reproduces the old result. It is first called with every flag at its
    /// old-compatible value joined with `caller_flags`; if that does not match,
    /// the divergence is not explained by the universe and the result is empty.
    /// Then each flag the caller did not set is flipped on its own, and every
    /// flip that breaks the match marks that flag as necessary.
    ///
    /// Costs at most `1 + |universe|` calls to `matches`.
    pub fn bisect<F>(&self, caller_flags: &FlagSet, mut matches: F) -> FlagSet
    where
        F: FnMut(&FlagSet) -> bool,
    {
        let baseline = self.universe.legacy_defaults().join(caller_flags);
        if !matches(&baseline) {
            debug!(
                caller_flags = %caller_flags,
                "old-compatible flags do not reproduce old result; bisection inconclusive"
            );
            return FlagSet::new();
        }

        let mut necessary = FlagSet::new();
        for flag in self.universe.iter() {
            if caller_flags.contains(flag.name()) {
                continue;
            }
            let mut trial = baseline.clone();
            trial.set(flag.name(), !flag.legacy_value());
            if !matches(&trial) {
                necessary.set(flag.name(), flag.legacy_value());
            }
        }
        necessary
    }
}
