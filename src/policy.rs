//! Instantiation-time policies.
//!
//! Every knob here is resolved by monomorphization: the hasher, the probe
//! sequence, the mixing stage, and the slot representation are all chosen
//! when the container type is instantiated, so nothing on the probe path
//! goes through an indirect call.

use crate::control::mix64;
use crate::simd::Backend;
use crate::simd::DefaultBackend;

/// How the facade conditions a hash before splitting it into the group
/// locator and the 7-bit control fragment.
pub trait MixPolicy {
    /// Conditions `hash` for splitting.
    fn mix(hash: u64) -> u64;
}

/// Runs the 64-bit MurmurHash3 finalizer over the hash.
///
/// Use this with hashers that are fast but leave the upper bits poorly
/// avalanched; the fragment and the group locator both come from those
/// bits.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mix;

impl MixPolicy for Mix {
    #[inline(always)]
    fn mix(hash: u64) -> u64 {
        mix64(hash)
    }
}

/// Uses the hash as-is.
///
/// Correct only for hashers that already deliver full avalanche, such as
/// the bundled [`DefaultHashBuilder`](crate::DefaultHashBuilder).
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl MixPolicy for Identity {
    #[inline(always)]
    fn mix(hash: u64) -> u64 {
        hash
    }
}

/// The group sequence visited on a collision.
///
/// `group` holds the current group index and `stride` the number of
/// advances taken so far; both are updated in place. `mask` is the group
/// count minus one (group counts are powers of two).
pub trait ProbePolicy {
    /// Steps to the next group in the sequence.
    fn advance(group: &mut usize, stride: &mut usize, mask: usize);
}

/// Triangular-number probing: the stride grows by one group per step.
///
/// Over a power-of-two group count this visits every group exactly once,
/// while scattering colliding chains away from each other far better than
/// a linear scan.
#[derive(Clone, Copy, Debug, Default)]
pub struct Quadratic;

impl ProbePolicy for Quadratic {
    #[inline(always)]
    fn advance(group: &mut usize, stride: &mut usize, mask: usize) {
        *stride += 1;
        *group = group.wrapping_add(*stride) & mask;
    }
}

/// Linear probing: the next group is simply the following one.
#[derive(Clone, Copy, Debug, Default)]
pub struct Linear;

impl ProbePolicy for Linear {
    #[inline(always)]
    fn advance(group: &mut usize, stride: &mut usize, mask: usize) {
        *stride += 1;
        *group = group.wrapping_add(1) & mask;
    }
}

/// Whether a slot carries its element's hash alongside the element.
///
/// Recomputing hashes is free for small keys, so the default slot is the
/// bare element. For expensive hashers over large keys, caching the hash
/// removes the dominant cost from rehashing: relocation reads a word
/// instead of re-hashing the element.
pub trait CachePolicy {
    /// The stored representation of one element.
    type Slot<V>;

    /// Builds a slot from the post-mix hash and the element.
    fn wrap<V>(hash: u64, value: V) -> Self::Slot<V>;

    /// The element within a slot.
    fn value<V>(slot: &Self::Slot<V>) -> &V;

    /// The element within a slot, mutably.
    fn value_mut<V>(slot: &mut Self::Slot<V>) -> &mut V;

    /// Unwraps a slot into its element.
    fn into_value<V>(slot: Self::Slot<V>) -> V;

    /// The cached hash, if this policy stores one.
    fn cached_hash<V>(slot: &Self::Slot<V>) -> Option<u64>;
}

/// Slots hold the bare element; hashes are recomputed when needed.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoStore;

impl CachePolicy for NoStore {
    type Slot<V> = V;

    #[inline(always)]
    fn wrap<V>(_hash: u64, value: V) -> V {
        value
    }

    #[inline(always)]
    fn value<V>(slot: &V) -> &V {
        slot
    }

    #[inline(always)]
    fn value_mut<V>(slot: &mut V) -> &mut V {
        slot
    }

    #[inline(always)]
    fn into_value<V>(slot: V) -> V {
        slot
    }

    #[inline(always)]
    fn cached_hash<V>(_slot: &V) -> Option<u64> {
        None
    }
}

/// Slots carry the element's post-mix hash in a machine word.
#[derive(Clone, Copy, Debug, Default)]
pub struct Store;

/// An element paired with its cached hash.
#[derive(Clone, Copy, Debug)]
pub struct CachedSlot<V> {
    hash: u64,
    value: V,
}

impl CachePolicy for Store {
    type Slot<V> = CachedSlot<V>;

    #[inline(always)]
    fn wrap<V>(hash: u64, value: V) -> CachedSlot<V> {
        CachedSlot { hash, value }
    }

    #[inline(always)]
    fn value<V>(slot: &CachedSlot<V>) -> &V {
        &slot.value
    }

    #[inline(always)]
    fn value_mut<V>(slot: &mut CachedSlot<V>) -> &mut V {
        &mut slot.value
    }

    #[inline(always)]
    fn into_value<V>(slot: CachedSlot<V>) -> V {
        slot.value
    }

    #[inline(always)]
    fn cached_hash<V>(slot: &CachedSlot<V>) -> Option<u64> {
        Some(slot.hash)
    }
}

/// The full policy bundle a table is instantiated with.
///
/// The load factor is a compile-time ratio in (0, 1): once live elements
/// plus tombstones exceed `capacity * LOAD_NUM / LOAD_DEN`, the next
/// insertion into an empty lane rehashes.
pub trait TablePolicy {
    /// The SIMD backend scanning control byte groups.
    type Group: Backend;
    /// The collision policy.
    type Probe: ProbePolicy;
    /// The slot hash caching policy.
    type Cache: CachePolicy;
    /// The hash conditioning applied by the facades.
    type Mix: MixPolicy;

    /// Load factor numerator.
    const LOAD_NUM: usize = 7;
    /// Load factor denominator.
    const LOAD_DEN: usize = 8;
}

/// The default bundle: native backend, quadratic probing, bare slots, no
/// mixing, 7/8 load factor.
///
/// No mixing is right for the bundled SipHash builder; pair a weak hasher
/// with a policy whose mixing stage is [`Mix`] instead.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultPolicy;

impl TablePolicy for DefaultPolicy {
    type Group = DefaultBackend;
    type Probe = Quadratic;
    type Cache = NoStore;
    type Mix = Identity;
}
