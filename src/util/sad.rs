#[cfg(all(target_arch = "x86_64", not(feature = "no_simd")))]
mod avx2;
mod rust;


use std::num::NonZeroUsize;

use cfg_if::cfg_if;

/// Sum of absolute differences between two `width` by `height` luma blocks.
///
/// This is the per-block metric `BlockDiff` attaches to every frame. The caller
/// guarantees `width * height * 255` fits in an `i32`, which `BlockGeometry`
/// checks once when a filter is built.
///
/// # Parameters
/// - `src`: First block, starting at its top-left sample
/// - `src_pitch`: Number of samples per row in `src`, including padding
/// - `ref_`: Second block, starting at its top-left sample
/// - `ref_pitch`: Number of samples per row in `ref_`, including padding
#[must_use]
pub fn block_luma_diff(
    width: NonZeroUsize,
    height: NonZeroUsize,
    src: &[u8],
    src_pitch: NonZeroUsize,
    ref_: &[u8],
    ref_pitch: NonZeroUsize,
) -> i32 {
    cfg_if! {
        if #[cfg(all(target_arch = "x86_64", not(feature = "no_simd")))] {
            if crate::util::has_avx2() {
                // SAFETY: We check for AVX2 first
                return unsafe {
                    avx2::block_luma_diff(width, height, src, src_pitch, ref_, ref_pitch)
                };
            }
        }
    }

    rust::block_luma_diff(width, height, src, src_pitch, ref_, ref_pitch)
}
