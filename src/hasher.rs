use core::hash::BuildHasher;

use siphasher::sip::SipHasher;

/// The hasher builder the facades use by default.
///
/// SipHash-2-4 with fixed keys. SipHash delivers full avalanche, which is
/// why the default policy splits its output without a mixing stage. Fixed
/// keys keep behavior deterministic across runs; if an attacker can choose
/// your keys and you need HashDoS resistance, seed per-process keys with
/// [`with_keys`](DefaultHashBuilder::with_keys).
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultHashBuilder {
    key0: u64,
    key1: u64,
}

impl DefaultHashBuilder {
    /// Creates a builder with the default (all-zero) keys.
    #[must_use]
    pub const fn new() -> Self {
        Self { key0: 0, key1: 0 }
    }

    /// Creates a builder keyed with `key0` and `key1`.
    #[must_use]
    pub const fn with_keys(key0: u64, key1: u64) -> Self {
        Self { key0, key1 }
    }
}

impl BuildHasher for DefaultHashBuilder {
    type Hasher = SipHasher;

    #[inline]
    fn build_hasher(&self) -> SipHasher {
        SipHasher::new_with_keys(self.key0, self.key1)
    }
}
