#![allow(clippy::undocumented_unsafe_blocks)]
#![allow(unsafe_op_in_unsafe_fn)]

use std::{arch::x86_64::*, num::NonZeroUsize};

#[must_use]
#[target_feature(enable = "avx2")]
pub unsafe fn block_luma_diff(
    width: NonZeroUsize,
    height: NonZeroUsize,
    src: &[u8],
    src_pitch: NonZeroUsize,
    ref_: &[u8],
    ref_pitch: NonZeroUsize,
) -> i32 {
    let width = width.get();

    let mut acc256 = _mm256_setzero_si256();
    let mut acc128 = _mm_setzero_si128();
    let mut tail = 0u32;

    for j in 0..height.get() {
        // Slicing bounds-checks the whole row once, the loads below stay inside it.
        let src_row = &src[j * src_pitch.get()..][..width];
        let ref_row = &ref_[j * ref_pitch.get()..][..width];
        let a = src_row.as_ptr();
        let b = ref_row.as_ptr();
        let mut i = 0;

        while i + 32 <= width {
            let va = _mm256_loadu_si256(a.add(i) as *const __m256i);
            let vb = _mm256_loadu_si256(b.add(i) as *const __m256i);
            acc256 = _mm256_add_epi64(acc256, _mm256_sad_epu8(va, vb));
            i += 32;
        }

        if i + 16 <= width {
            let va = _mm_loadu_si128(a.add(i) as *const __m128i);
            let vb = _mm_loadu_si128(b.add(i) as *const __m128i);
            acc128 = _mm_add_epi64(acc128, _mm_sad_epu8(va, vb));
            i += 16;
        }

        if i + 8 <= width {
            let va = _mm_loadl_epi64(a.add(i) as *const __m128i);
            let vb = _mm_loadl_epi64(b.add(i) as *const __m128i);
            acc128 = _mm_add_epi64(acc128, _mm_sad_epu8(va, vb));
            i += 8;
        }

        if i + 4 <= width {
            let va = _mm_cvtsi32_si128((a.add(i) as *const u32).read_unaligned() as i32);
            let vb = _mm_cvtsi32_si128((b.add(i) as *const u32).read_unaligned() as i32);
            acc128 = _mm_add_epi64(acc128, _mm_sad_epu8(va, vb));
            i += 4;
        }

        for x in i..width {
            tail += u32::from(src_row[x].abs_diff(ref_row[x]));
        }
    }

    // Reduce acc256: add high and low 128-bit lanes
    let acc256_lo = _mm256_castsi256_si128(acc256);
    let acc256_hi = _mm256_extracti128_si256(acc256, 1);
    let combined = _mm_add_epi64(_mm_add_epi64(acc256_lo, acc256_hi), acc128);

    // Reduce 2x u64 lanes to scalar
    let high = _mm_unpackhi_epi64(combined, combined);
    let total = _mm_add_epi64(combined, high);
    (_mm_cvtsi128_si64(total) as u64 + u64::from(tail)) as i32
}
