//! Mode ratio packing and lock-free selection
//!
//! A [`ModeRatio`] is packed into a single `u64` so that readers never see a
//! mode from one store paired with a ratio from another.
//!
//! Bit layout of the packed word:
//!
//! | bits    | field                          |
//! |---------|--------------------------------|
//! | `0..16` | `mode1` as [`CallMode::as_u16`] |
//! | `16..32`| `mode2` as [`CallMode::as_u16`] |
//! | `32..64`| `ratio` as IEEE-754 `f32` bits  |

use crate::error::ConfigError;
use crate::mode::CallMode;
use rand::Rng;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

const MODE_MASK: u64 = 0xffff;
const MODE2_SHIFT: u32 = 16;
const RATIO_SHIFT: u32 = 32;

/// Two modes and the probability of choosing the second
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeRatio {
    mode1: CallMode,
    mode2: CallMode,
    ratio: f32,
}

impl Default for ModeRatio {
    /// Always [`CallMode::OnlyOld`]
    fn default() -> Self {
        Self {
            mode1: CallMode::OnlyOld,
            mode2: CallMode::OnlyOld,
            ratio: 0.0,
        }
    }
}

impl ModeRatio {
    /// Create a ratio choosing `mode2` with probability `ratio`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRatio`] if `ratio` is outside `[0, 1]`
    /// or NaN. Values are never clamped.
    pub fn new(mode1: CallMode, mode2: CallMode, ratio: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(ConfigError::InvalidRatio(ratio));
        }
        #[allow(clippy::cast_possible_truncation)]
        let ratio = ratio as f32;
        Ok(Self {
            mode1,
            mode2,
            ratio,
        })
    }

    /// Create from raw mode values
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMode`] for values outside the enumeration
    /// and [`ConfigError::InvalidRatio`] as in [`ModeRatio::new`].
    pub fn from_raw(mode1: u16, mode2: u16, ratio: f64) -> Result<Self, ConfigError> {
        Self::new(CallMode::try_from(mode1)?, CallMode::try_from(mode2)?, ratio)
    }

    /// Always use `mode`
    #[inline]
    #[must_use]
    pub const fn single(mode: CallMode) -> Self {
        Self {
            mode1: mode,
            mode2: mode,
            ratio: 1.0,
        }
    }

    /// Mode used with probability `1 - ratio`
    #[inline]
    #[must_use]
    pub const fn mode1(&self) -> CallMode {
        self.mode1
    }

    /// Mode used with probability `ratio`
    #[inline]
    #[must_use]
    pub const fn mode2(&self) -> CallMode {
        self.mode2
    }

    /// Probability of choosing `mode2`
    #[inline]
    #[must_use]
    pub fn ratio(&self) -> f64 {
        f64::from(self.ratio)
    }

    /// Pick a mode for a uniform draw in `[0, 1)`
    ///
    /// A ratio of 0 always yields `mode1` and a ratio of 1 always yields
    /// `mode2`, whatever the draw.
    #[inline]
    #[must_use]
    pub fn select(&self, draw: f32) -> CallMode {
        if self.ratio < 1.0 && draw >= self.ratio {
            self.mode1
        } else {
            self.mode2
        }
    }

    /// Pack into a single word
    #[inline]
    #[must_use]
    pub fn pack(&self) -> u64 {
        u64::from(self.mode1.as_u16())
            | u64::from(self.mode2.as_u16()) << MODE2_SHIFT
            | u64::from(self.ratio.to_bits()) << RATIO_SHIFT
    }

    /// Unpack a word produced by [`ModeRatio::pack`]
    ///
    /// # Errors
    ///
    /// Returns an error if either mode field or the ratio is invalid.
    #[allow(clippy::cast_possible_truncation)]
    pub fn unpack(word: u64) -> Result<Self, ConfigError> {
        let mode1 = CallMode::try_from((word & MODE_MASK) as u16)?;
        let mode2 = CallMode::try_from(((word >> MODE2_SHIFT) & MODE_MASK) as u16)?;
        let ratio = f32::from_bits((word >> RATIO_SHIFT) as u32);
        Self::new(mode1, mode2, f64::from(ratio))
    }
}

impl fmt::Display for ModeRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.mode1, self.mode2, self.ratio)
    }
}

/// Atomically updated [`ModeRatio`]
///
/// Stores and loads touch one `AtomicU64`, so any number of threads may call
/// [`store`](Self::store) and [`load_random`](Self::load_random) without
/// external locking.
#[derive(Debug)]
pub struct ModeRatioSelector {
    word: AtomicU64,
}

impl Default for ModeRatioSelector {
    fn default() -> Self {
        Self::new(ModeRatio::default())
    }
}

impl ModeRatioSelector {
    /// Create a selector holding `initial`
    #[must_use]
    pub fn new(initial: ModeRatio) -> Self {
        Self {
            word: AtomicU64::new(initial.pack()),
        }
    }

    /// Replace modes and ratio
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRatio`] if `ratio` is outside `[0, 1]`.
    pub fn store(&self, mode1: CallMode, mode2: CallMode, ratio: f64) -> Result<(), ConfigError> {
        self.set(ModeRatio::new(mode1, mode2, ratio)?);
        Ok(())
    }

    /// Replace modes and ratio from raw mode values
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMode`] or [`ConfigError::InvalidRatio`].
    pub fn store_raw(&self, mode1: u16, mode2: u16, ratio: f64) -> Result<(), ConfigError> {
        self.set(ModeRatio::from_raw(mode1, mode2, ratio)?);
        Ok(())
    }

    /// Replace with an already validated ratio
    #[inline]
    pub fn set(&self, ratio: ModeRatio) {
        self.word.store(ratio.pack(), Ordering::Release);
    }

    /// Current modes and ratio
    #[inline]
    #[must_use]
    pub fn load(&self) -> ModeRatio {
        // Only validated ratios are ever packed into the word.
        ModeRatio::unpack(self.word.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Draw a mode with the thread-local generator
    #[inline]
    #[must_use]
    pub fn load_random(&self) -> CallMode {
        self.load_random_with(&mut rand::thread_rng())
    }

    /// Draw a mode with a caller supplied generator
    #[inline]
    pub fn load_random_with<R: Rng>(&self, rng: &mut R) -> CallMode {
        let ratio = self.load();
        ratio.select(rng.gen::<f32>())
    }
}
