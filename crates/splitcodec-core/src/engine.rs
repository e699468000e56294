//! Engine traits
//!
//! The two serialization engines are external collaborators. Both must share
//! one error type so a call can return either path's result unchanged.

use crate::flags::FlagSet;

/// A serialization engine
pub trait Engine: Send + Sync {
    /// Error returned by encode and decode
    type Error: std::error::Error + Send + Sync + 'static;

    /// Short name used in logs
    fn name(&self) -> &str;
}

/// Engine that can encode `T`
pub trait Encoder<T: ?Sized>: Engine {
    /// Encode `value` with `flags` applied over the engine's own defaults
    ///
    /// # Errors
    ///
    /// Returns the engine's error if `value` cannot be encoded.
    fn encode(&self, value: &T, flags: &FlagSet) -> Result<Vec<u8>, Self::Error>;
}

/// Engine that can decode into `T`
pub trait Decoder<T>: Engine {
    /// Decode `input` into `target` with `flags` applied over the engine's
    /// own defaults
    ///
    /// `target` may already hold data; what happens to it is up to the engine.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if `input` cannot be decoded. `target` may be
    /// partially written.
    fn decode(&self, input: &[u8], target: &mut T, flags: &FlagSet) -> Result<(), Self::Error>;
}
