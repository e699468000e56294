//! Configuration flags
//!
//! Engine options are modelled as a name → bool map. A [`FlagSet`] only holds
//! the flags someone set explicitly, so "has the caller set this?" is a plain
//! key lookup. A [`FlagUniverse`] is the sorted list of every flag the engines
//! understand, each with the value that reproduces the old engine's behavior.

use crate::error::ConfigError;
use std::collections::BTreeMap;
use std::fmt;

/// Explicitly set flags, sorted by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet {
    flags: BTreeMap<String, bool>,
}

impl FlagSet {
    /// Create an empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`FlagSet::set`]
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: bool) -> Self {
        self.set(name, value);
        self
    }

    /// Set a flag, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, value: bool) {
        self.flags.insert(name.into(), value);
    }

    /// Value of a flag if it was set
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<bool> {
        self.flags.get(name).copied()
    }

    /// Value of a flag, or `default` when unset
    #[inline]
    #[must_use]
    pub fn get_or(&self, name: &str, default: bool) -> bool {
        self.get(name).unwrap_or(default)
    }

    /// Check if a flag was set explicitly
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    /// Combine two sets; flags in `other` win
    #[must_use]
    pub fn join(&self, other: &FlagSet) -> FlagSet {
        let mut joined = self.clone();
        joined
            .flags
            .extend(other.flags.iter().map(|(k, v)| (k.clone(), *v)));
        joined
    }

    /// Names of every set flag in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.flags.keys().map(String::as_str)
    }

    /// Iterate `(name, value)` in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.flags.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of set flags
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Check if no flag is set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for FlagSet {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        Self {
            flags: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Renders as `name=value` pairs joined by commas
impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

/// A named boolean engine option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFlag {
    name: String,
    legacy_value: bool,
}

impl ConfigFlag {
    /// Flag whose old-compatible value is `true`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            legacy_value: true,
        }
    }

    /// Set the old-compatible value
    #[must_use]
    pub fn with_legacy_value(mut self, value: bool) -> Self {
        self.legacy_value = value;
        self
    }

    /// Flag name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value that reproduces the old engine's behavior
    #[inline]
    #[must_use]
    pub fn legacy_value(&self) -> bool {
        self.legacy_value
    }
}

/// Every flag the engines understand, sorted by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagUniverse {
    flags: Vec<ConfigFlag>,
}

impl FlagUniverse {
    /// Build a universe, sorting flags by name
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateFlag`] if a name appears twice.
    pub fn new(flags: impl IntoIterator<Item = ConfigFlag>) -> Result<Self, ConfigError> {
        let mut flags: Vec<_> = flags.into_iter().collect();
        flags.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(pair) = flags.windows(2).find(|w| w[0].name == w[1].name) {
            return Err(ConfigError::DuplicateFlag(pair[0].name.clone()));
        }
        Ok(Self { flags })
    }

    /// Every flag set to its old-compatible value
    #[must_use]
    pub fn legacy_defaults(&self) -> FlagSet {
        self.flags
            .iter()
            .map(|f| (f.name.clone(), f.legacy_value))
            .collect()
    }

    /// Look up a flag by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ConfigFlag> {
        self.flags
            .binary_search_by(|f| f.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.flags[i])
    }

    /// Check that every flag in `set` belongs to this universe
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownFlag`] naming the first stranger.
    pub fn check(&self, set: &FlagSet) -> Result<(), ConfigError> {
        match set.names().find(|name| self.get(name).is_none()) {
            Some(name) => Err(ConfigError::UnknownFlag(name.to_string())),
            None => Ok(()),
        }
    }

    /// Iterate flags in name order
    pub fn iter(&self) -> impl Iterator<Item = &ConfigFlag> {
        self.flags.iter()
    }

    /// Number of flags
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Check if the universe has no flags
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn universe() -> FlagUniverse {
        FlagUniverse::new([
            ConfigFlag::new("zeta"),
            ConfigFlag::new("alpha").with_legacy_value(false),
            ConfigFlag::new("mid"),
        ])
        .unwrap()
    }

    #[test]
    fn join_prefers_right_side() {
        let base = FlagSet::new().with("a", true).with("b", true);
        let caller = FlagSet::new().with("b", false).with("c", true);
        let joined = base.join(&caller);

        assert_eq!(joined.get("a"), Some(true));
        assert_eq!(joined.get("b"), Some(false));
        assert_eq!(joined.get("c"), Some(true));
        assert_eq!(joined.len(), 3);
    }

    #[test]
    fn contains_tracks_explicit_flags() {
        let set = FlagSet::new().with("escape_html", false);
        assert!(set.contains("escape_html"));
        assert!(!set.contains("allow_invalid_utf8"));
        assert!(!set.get_or("escape_html", true));
        assert!(set.get_or("allow_invalid_utf8", true));
    }

    #[test]
    fn display_is_sorted() {
        let set = FlagSet::new().with("b", false).with("a", true);
        assert_eq!(set.to_string(), "a=true,b=false");
        assert_eq!(FlagSet::new().to_string(), "");
    }

    #[test]
    fn universe_is_sorted() {
        let declared = universe();
        let names: Vec<_> = declared.iter().map(ConfigFlag::name).collect();
        assert_eq!(names, ["alpha", "mid", "zeta"]);
    }

    #[test]
    fn universe_rejects_duplicates() {
        let err = FlagUniverse::new([ConfigFlag::new("x"), ConfigFlag::new("x")]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateFlag(name) if name == "x"));
    }

    #[test]
    fn legacy_defaults_use_flag_values() {
        let defaults = universe().legacy_defaults();
        assert_eq!(defaults.get("alpha"), Some(false));
        assert_eq!(defaults.get("mid"), Some(true));
        assert_eq!(defaults.len(), 3);
    }

    #[test]
    fn check_reports_unknown_flags() {
        let u = universe();
        assert!(u.check(&FlagSet::new().with("mid", false)).is_ok());
        let err = u.check(&FlagSet::new().with("mid", true).with("nope", true)).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFlag(name) if name == "nope"));
    }
}
