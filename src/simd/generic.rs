use crate::control::EMPTY;
use crate::control::is_full;

use super::Backend;
use super::BitMask;

/// Portable 16-lane backend.
///
/// Scans one byte at a time. The loops are short, branch-free in the body,
/// and unroll fully; on targets without vector bytewise compares this is
/// competitive with word-at-a-time bit tricks and far easier to audit.
pub struct ScalarBackend;

impl Backend for ScalarBackend {
    const WIDTH: usize = 16;

    type Register = [u8; 16];

    #[inline(always)]
    unsafe fn load(ptr: *const u8) -> [u8; 16] {
        // SAFETY: The caller guarantees 16 readable bytes; `read_unaligned`
        // has no alignment requirement.
        unsafe { ptr.cast::<[u8; 16]>().read_unaligned() }
    }

    #[inline(always)]
    fn match_byte(group: [u8; 16], byte: u8) -> BitMask {
        let mut mask = 0u64;
        for (lane, &candidate) in group.iter().enumerate() {
            if candidate == byte {
                mask |= 1 << lane;
            }
        }
        BitMask(mask)
    }

    #[inline(always)]
    fn match_empty(group: [u8; 16]) -> BitMask {
        Self::match_byte(group, EMPTY)
    }

    #[inline(always)]
    fn match_full(group: [u8; 16]) -> BitMask {
        let mut mask = 0u64;
        for (lane, &candidate) in group.iter().enumerate() {
            if is_full(candidate) {
                mask |= 1 << lane;
            }
        }
        BitMask(mask)
    }
}
