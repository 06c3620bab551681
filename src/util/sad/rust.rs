use std::num::NonZeroUsize;

#[must_use]
pub(super) fn block_luma_diff(
    width: NonZeroUsize,
    height: NonZeroUsize,
    src: &[u8],
    src_pitch: NonZeroUsize,
    ref_: &[u8],
    ref_pitch: NonZeroUsize,
) -> i32 {
    let width = width.get();
    let mut sum = 0i32;
    for y in 0..height.get() {
        let src_row = &src[y * src_pitch.get()..][..width];
        let ref_row = &ref_[y * ref_pitch.get()..][..width];
        sum += src_row
            .iter()
            .zip(ref_row.iter())
            .fold(0i32, |acc, (&s, &r)| acc + i32::from(s.abs_diff(r)));
    }
    sum
}
