//! SIMD group scanning backends.
//!
//! A backend abstracts one group-wide register over the control bytes. All
//! probe-path decisions are a constant number of backend operations per
//! group: load the group, compare every lane against a value, and collapse
//! the comparison into a [`BitMask`] that can be tested, indexed, and
//! iterated without touching the bytes again.
//!
//! The SSE2 backend is used on x86/x86_64 when the target enables it at
//! compile time; everything else gets the portable scalar backend, which
//! produces identical masks one byte at a time. Wider backends (32 or 64
//! lanes) fit the same trait — masks are 64 bits wide for that reason —
//! but are not provided; the probability of a fragment match decays so
//! quickly past the first few lanes that wider scans rarely pay for
//! themselves.

use cfg_if::cfg_if;

mod bitmask;
mod generic;

pub use bitmask::BitMask;
pub use bitmask::BitMaskIter;
pub use generic::ScalarBackend;

cfg_if! {
    if #[cfg(all(
        any(target_arch = "x86", target_arch = "x86_64"),
        target_feature = "sse2"
    ))] {
        mod sse2;
        pub use sse2::Sse2Backend;

        /// The widest backend available on the compilation target.
        pub type DefaultBackend = Sse2Backend;
    } else {
        /// The widest backend available on the compilation target.
        pub type DefaultBackend = ScalarBackend;
    }
}

/// A group-wide scan over control bytes.
///
/// Implementations answer three questions about a loaded group in parallel:
/// which lanes carry a given byte, which lanes are empty, and which lanes
/// hold a live element (top bit clear). Lane indices in the returned masks
/// are in memory order: bit `n` corresponds to the byte at offset `n` from
/// the load address.
pub trait Backend {
    /// Number of control bytes scanned per group.
    ///
    /// A power of two, at least 16 and at most 64 (the mask type caps the
    /// lane count at 64).
    const WIDTH: usize;

    /// The register type holding one loaded group.
    type Register: Copy;

    /// Loads `WIDTH` control bytes starting at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `WIDTH` bytes. No alignment is
    /// required.
    unsafe fn load(ptr: *const u8) -> Self::Register;

    /// Mask of lanes equal to `byte`.
    fn match_byte(group: Self::Register, byte: u8) -> BitMask;

    /// Mask of lanes in the [`EMPTY`](crate::control::EMPTY) state.
    fn match_empty(group: Self::Register) -> BitMask;

    /// Mask of lanes holding a live element (top bit clear).
    fn match_full(group: Self::Register) -> BitMask;
}

#[cfg(test)]
mod tests {
    use crate::control::DELETED;
    use crate::control::EMPTY;
    use crate::control::SENTINEL;

    use super::*;

    fn sample_group() -> [u8; 16] {
        let mut bytes = [EMPTY; 16];
        bytes[0] = 0x11;
        bytes[3] = 0x7f;
        bytes[4] = DELETED;
        bytes[7] = 0x11;
        bytes[9] = 0x00;
        bytes[15] = SENTINEL;
        bytes
    }

    fn check_backend<B: Backend<Register = R>, R: Copy>() {
        let bytes = sample_group();
        // SAFETY: the array holds exactly 16 readable bytes.
        let group = unsafe { B::load(bytes.as_ptr()) };

        let tags: alloc::vec::Vec<usize> = B::match_byte(group, 0x11).into_iter().collect();
        assert_eq!(tags, [0, 7]);

        assert_eq!(B::match_byte(group, SENTINEL).first_set(), Some(15));
        assert_eq!(B::match_byte(group, DELETED).first_set(), Some(4));

        let empty = B::match_empty(group);
        assert!(empty.any_set());
        assert_eq!(empty.first_set(), Some(1));

        let full: alloc::vec::Vec<usize> = B::match_full(group).into_iter().collect();
        assert_eq!(full, [0, 3, 7, 9]);
    }

    #[test]
    fn scalar_masks() {
        check_backend::<ScalarBackend, _>();
    }

    #[cfg(all(
        any(target_arch = "x86", target_arch = "x86_64"),
        target_feature = "sse2"
    ))]
    #[test]
    fn sse2_masks_agree_with_scalar() {
        check_backend::<Sse2Backend, _>();
    }

    #[test]
    fn mask_iteration_is_ascending() {
        let mask = BitMask(0b1010_0100);
        let lanes: alloc::vec::Vec<usize> = mask.into_iter().collect();
        assert_eq!(lanes, [2, 5, 7]);
        assert_eq!(mask.next_set(3), Some(5));
        assert_eq!(mask.next_set(6), Some(7));
        assert_eq!(mask.next_set(8), None);
        assert_eq!(mask.remove_below(5).first_set(), Some(5));
    }
}
