
use std::num::NonZeroUsize;

use crate::{params::BlendDirection, util::vs_bitblt};

/// Read-only view of the U and V planes of one frame, starting at some
/// sample and addressed with the frame's chroma pitch.
#[derive(Debug, Clone, Copy)]
pub struct ChromaView<'a> {
    pub u: &'a [u8],
    pub v: &'a [u8],
    pub pitch: NonZeroUsize,
}

impl<'a> ChromaView<'a> {
    #[must_use]
    pub fn new(u: &'a [u8], v: &'a [u8], pitch: NonZeroUsize) -> Self {
        Self { u, v, pitch }
    }

    /// The same planes, starting at chroma sample `(x, y)`.
    #[must_use]
    pub fn at(&self, x: usize, y: usize) -> Self {
        let offset = y * self.pitch.get() + x;
        Self {
            u: &self.u[offset..],
            v: &self.v[offset..],
            pitch: self.pitch,
        }
    }
}

/// Returns true when `cur` moved away from both temporal neighbours in the
/// same direction by more than `variation`.
#[inline(always)]
fn diverges(prev: u8, cur: u8, next: u8, variation: i64) -> bool {
    let to_prev = i64::from(cur) - i64::from(prev);
    let to_next = i64::from(cur) - i64::from(next);
    (to_prev + variation < 0 && to_next + variation < 0)
        || (-to_prev + variation < 0 && -to_next + variation < 0)
}

/// Flags the chroma samples of one block that look like rainbowing.
///
/// A sample is flagged when its U or its V value sits above or below both
/// temporal neighbours by more than `variation`. The decision is shared by
/// both chroma planes, so a single mask is written. `mask` is `width` wide
/// with no padding.
pub fn make_block_rainbow_mask(
    prev: &ChromaView,
    cur: &ChromaView,
    next: &ChromaView,
    mask: &mut [bool],
    width: NonZeroUsize,
    height: NonZeroUsize,
    variation: i32,
) {
    let width = width.get();
    let variation = i64::from(variation);

    for y in 0..height.get() {
        let up = &prev.u[y * prev.pitch.get()..][..width];
        let vp = &prev.v[y * prev.pitch.get()..][..width];
        let uc = &cur.u[y * cur.pitch.get()..][..width];
        let vc = &cur.v[y * cur.pitch.get()..][..width];
        let un = &next.u[y * next.pitch.get()..][..width];
        let vn = &next.v[y * next.pitch.get()..][..width];
        let mask_row = &mut mask[y * width..][..width];

        for x in 0..width {
            mask_row[x] = diverges(up[x], uc[x], un[x], variation)
                || diverges(vp[x], vc[x], vn[x], variation);
        }
    }
}

/// Cleans up a raw block mask.
///
/// First every flagged sample without a flagged horizontal neighbour is
/// dropped from `raw`, with the result written to `mask`. Then, unless
/// `conservative` is set, `mask` is grown vertically in place: a sample is
/// set when both the row above and the row below are set. Rows are updated
/// top to bottom, so each row sees the already expanded row above it. The
/// first and last row only have one neighbour row and take it directly.
///
/// Both buffers are `width` wide with no padding. `width` and `height` must
/// be at least 2.
pub fn process_block_rainbow_mask(
    raw: &[bool],
    mask: &mut [bool],
    width: NonZeroUsize,
    height: NonZeroUsize,
    conservative: bool,
) {
    let width = width.get();
    let height = height.get();
    debug_assert!(width >= 2 && height >= 2);

    for y in 0..height {
        let src = &raw[y * width..][..width];
        let dst = &mut mask[y * width..][..width];

        dst[0] = src[0] && src[1];
        for x in 1..width - 1 {
            dst[x] = src[x] && (src[x - 1] || src[x + 1]);
        }
        dst[width - 1] = src[width - 1] && src[width - 2];
    }

    if conservative {
        return;
    }

    for x in 0..width {
        mask[x] = mask[x] || mask[width + x];
    }

    for y in 1..height - 1 {
        for x in 0..width {
            let above = mask[(y - 1) * width + x];
            let below = mask[(y + 1) * width + x];
            let here = &mut mask[y * width + x];
            *here = *here || (above && below);
        }
    }

    let last = (height - 1) * width;
    for x in 0..width {
        mask[last + x] = mask[last + x] || mask[last - width + x];
    }
}

#[inline(always)]
fn blend(direction: BlendDirection, prev: u8, cur: u8, next: u8) -> u8 {
    let (prev, cur, next) = (u16::from(prev), u16::from(cur), u16::from(next));
    let value = match direction {
        BlendDirection::Next => (cur + next + 1) >> 1,
        BlendDirection::Prev => (cur + prev + 1) >> 1,
        BlendDirection::Both => (2 * cur + prev + next + 3) >> 2,
    };
    value as u8
}

/// Writes one block of output chroma: samples flagged in `mask` are averaged
/// with the neighbour(s) chosen by `direction`, all others are copied from
/// `cur`.
pub fn apply_block_rainbow_mask(
    prev: &ChromaView,
    cur: &ChromaView,
    next: &ChromaView,
    mask: &[bool],
    dst_u: &mut [u8],
    dst_v: &mut [u8],
    dst_pitch: NonZeroUsize,
    width: NonZeroUsize,
    height: NonZeroUsize,
    direction: BlendDirection,
) {
    let width = width.get();

    for y in 0..height.get() {
        let mask_row = &mask[y * width..][..width];
        for (src_p, src_c, src_n, dst) in [
            (prev.u, cur.u, next.u, &mut *dst_u),
            (prev.v, cur.v, next.v, &mut *dst_v),
        ] {
            let p = &src_p[y * prev.pitch.get()..][..width];
            let c = &src_c[y * cur.pitch.get()..][..width];
            let n = &src_n[y * next.pitch.get()..][..width];
            let dst_row = &mut dst[y * dst_pitch.get()..][..width];

            for x in 0..width {
                dst_row[x] = if mask_row[x] {
                    blend(direction, p[x], c[x], n[x])
                } else {
                    c[x]
                };
            }
        }
    }
}

/// Copies one block of both chroma planes unchanged.
pub fn copy_chroma_block(
    src: &ChromaView,
    dst_u: &mut [u8],
    dst_v: &mut [u8],
    dst_pitch: NonZeroUsize,
    width: NonZeroUsize,
    height: NonZeroUsize,
) {
    vs_bitblt(dst_u, dst_pitch, src.u, src.pitch, width, height);
    vs_bitblt(dst_v, dst_pitch, src.v, src.pitch, width, height);
}
