//! Process-wide codec slot
//!
//! Applications that want one codec for the whole process declare a
//! `static` [`SharedCodec`] and install it once at startup.

use crate::codec::SplitCodec;
use crate::engine::Engine;
use crate::error::ConfigError;
use once_cell::sync::OnceCell;
use std::fmt;

/// Write-once holder for a [`SplitCodec`]
///
/// ```ignore
/// static CODEC: SharedCodec<Legacy, Strict> = SharedCodec::new();
///
/// CODEC.install(SplitCodec::new(Legacy, Strict))?;
/// let bytes = CODEC.get().expect("installed").encode(&value, &FlagSet::new())?;
/// ```
pub struct SharedCodec<Old: Engine, New> {
    cell: OnceCell<SplitCodec<Old, New>>,
}

impl<Old: Engine, New> SharedCodec<Old, New> {
    /// Empty slot
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }
}

impl<Old: Engine, New> Default for SharedCodec<Old, New> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Old, New> SharedCodec<Old, New>
where
    Old: Engine,
    New: Engine<Error = Old::Error>,
{
    /// Install `codec`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlreadyInstalled`] if a codec is already present;
    /// the installed codec is kept.
    pub fn install(&self, codec: SplitCodec<Old, New>) -> Result<&SplitCodec<Old, New>, ConfigError> {
        self.cell
            .set(codec)
            .map_err(|_| ConfigError::AlreadyInstalled)?;
        self.cell.get().ok_or(ConfigError::AlreadyInstalled)
    }

    /// Installed codec, if any
    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<&SplitCodec<Old, New>> {
        self.cell.get()
    }

    /// Installed codec, installing the result of `init` first if empty
    pub fn get_or_init<F>(&self, init: F) -> &SplitCodec<Old, New>
    where
        F: FnOnce() -> SplitCodec<Old, New>,
    {
        self.cell.get_or_init(init)
    }

    /// Check if a codec is installed
    #[inline]
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<Old, New> fmt::Debug for SharedCodec<Old, New>
where
    Old: Engine,
    New: Engine<Error = Old::Error>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCodec")
            .field("codec", &self.cell.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Encoder;
    use crate::flags::FlagSet;
    use crate::mode::CallMode;

    #[derive(Debug, thiserror::Error)]
    #[error("never")]
    struct Never;

    struct Constant(&'static [u8]);

    impl Engine for Constant {
        type Error = Never;

        fn name(&self) -> &str {
            "constant"
        }
    }

    impl Encoder<()> for Constant {
        fn encode(&self, _value: &(), _flags: &FlagSet) -> Result<Vec<u8>, Never> {
            Ok(self.0.to_vec())
        }
    }

    static SHARED: SharedCodec<Constant, Constant> = SharedCodec::new();

    #[test]
    fn install_once() {
        let local = SharedCodec::new();
        assert!(!local.is_installed());
        local
            .install(SplitCodec::new(Constant(b"old"), Constant(b"new")))
            .unwrap();
        let err = local
            .install(SplitCodec::new(Constant(b"x"), Constant(b"y")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyInstalled));
        assert_eq!(local.get().unwrap().encode(&(), &FlagSet::new()).unwrap(), b"old");
    }

    #[test]
    fn static_slot_get_or_init() {
        let codec = SHARED.get_or_init(|| SplitCodec::new(Constant(b"old"), Constant(b"new")));
        codec.set_encode_call_mode(CallMode::OnlyNew);
        assert_eq!(SHARED.get().unwrap().encode(&(), &FlagSet::new()).unwrap(), b"new");
    }
}
