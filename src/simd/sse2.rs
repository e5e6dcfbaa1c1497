#[cfg(target_arch = "x86")]
use core::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::*;

use crate::control::EMPTY;

use super::Backend;
use super::BitMask;

/// 16-lane backend over SSE2.
///
/// One `movemask` collapses a byte compare into a 16-bit lane mask, and the
/// full-lane scan needs no compare at all: `movemask` collects the top bits
/// directly, and a full byte is exactly one with the top bit clear.
pub struct Sse2Backend;

impl Backend for Sse2Backend {
    const WIDTH: usize = 16;

    type Register = __m128i;

    #[inline(always)]
    unsafe fn load(ptr: *const u8) -> __m128i {
        // SAFETY: The caller guarantees 16 readable bytes; `loadu` has no
        // alignment requirement. SSE2 is statically enabled for this module
        // to be compiled at all.
        unsafe { _mm_loadu_si128(ptr.cast()) }
    }

    #[inline(always)]
    fn match_byte(group: __m128i, byte: u8) -> BitMask {
        // SAFETY: SSE2 is statically enabled for this module to be compiled.
        unsafe {
            let matched = _mm_cmpeq_epi8(group, _mm_set1_epi8(byte as i8));
            BitMask(_mm_movemask_epi8(matched) as u16 as u64)
        }
    }

    #[inline(always)]
    fn match_empty(group: __m128i) -> BitMask {
        Self::match_byte(group, EMPTY)
    }

    #[inline(always)]
    fn match_full(group: __m128i) -> BitMask {
        // SAFETY: SSE2 is statically enabled for this module to be compiled.
        unsafe { BitMask(!(_mm_movemask_epi8(group) as u32) as u16 as u64) }
    }
}
