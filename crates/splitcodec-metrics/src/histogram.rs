//! Log₂ histogram of payload sizes
//!
//! Bucket `i` counts sizes in `[2ⁱ⁻¹, 2ⁱ)`; bucket 0 holds only zero. The
//! bucket index of `n` is `floor(log2(n)) + 1`, i.e. the bit length of `n`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of buckets: one per bit of `usize` plus the zero bucket
pub const SIZE_BUCKETS: usize = usize::BITS as usize + 1;

/// Binary magnitude prefixes, one per ten buckets
const PREFIXES: [&str; 7] = ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];

/// Fixed-bucket size histogram with lock-free inserts
///
/// Buckets only ever grow; there is no eviction.
#[derive(Debug)]
pub struct SizeHistogram {
    buckets: [AtomicU64; SIZE_BUCKETS],
}

impl Default for SizeHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl SizeHistogram {
    /// Create an empty histogram
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Bucket index for a size
    #[inline]
    #[must_use]
    pub const fn bucket_index(n: usize) -> usize {
        (usize::BITS - n.leading_zeros()) as usize
    }

    /// Record one observation of size `n`
    #[inline]
    pub fn insert(&self, n: usize) {
        self.buckets[Self::bucket_index(n)].fetch_add(1, Ordering::Relaxed);
    }

    /// Count stored in `bucket` (zero when out of range)
    #[must_use]
    pub fn count(&self, bucket: usize) -> u64 {
        self.buckets
            .get(bucket)
            .map_or(0, |b| b.load(Ordering::Relaxed))
    }

    /// Total number of observations
    #[must_use]
    pub fn total(&self) -> u64 {
        self.buckets.iter().map(|b| b.load(Ordering::Relaxed)).sum()
    }

    /// Zero every bucket
    pub fn reset(&self) {
        for bucket in &self.buckets {
            bucket.store(0, Ordering::Relaxed);
        }
    }

    /// Render the upper bound of a bucket, e.g. `<64KiB` for bucket 16
    #[must_use]
    pub fn label(bucket: usize) -> String {
        let magnitude = 1u64 << (bucket % 10);
        let prefix = PREFIXES.get(bucket / 10).copied().unwrap_or("?");
        format!("<{magnitude}{prefix}B")
    }

    /// Non-empty buckets in ascending order as `(label, count)`
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        self.buckets
            .iter()
            .enumerate()
            .filter_map(|(i, b)| {
                let n = b.load(Ordering::Relaxed);
                (n > 0).then(|| (Self::label(i), n))
            })
            .collect()
    }
}

/// Renders as a JSON object of non-empty buckets, smallest first
impl fmt::Display for SizeHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (label, n)) in self.snapshot().into_iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "\"{label}\":{n}")?;
        }
        f.write_str("}")
    }
}
