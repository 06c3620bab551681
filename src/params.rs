
use std::num::NonZeroUsize;

use crate::error::BifrostError;

/// Which temporal neighbours a masked chroma pixel is averaged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendDirection {
    Next,
    Prev,
    Both,
}

impl BlendDirection {
    /// Blend towards the side with the smaller luma change.
    ///
    /// A side only wins when its neighbour's difference exceeds it by
    /// `relative_frame_diff`; otherwise both neighbours are used.
    #[must_use]
    pub fn from_diffs(ldprev: f32, ldnext: f32, relative_frame_diff: f32) -> Self {
        if ldprev > ldnext * relative_frame_diff {
            Self::Next
        } else if ldnext > ldprev * relative_frame_diff {
            Self::Prev
        } else {
            Self::Both
        }
    }
}

/// Whether the clip is processed as separated fields or as whole frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    Progressive,
    Fields,
}

impl FieldMode {
    /// Distance in frames between temporal neighbours. Separated fields
    /// alternate parity, so the previous field of the same parity is two
    /// frames back.
    #[must_use]
    pub fn offset(self) -> usize {
        match self {
            Self::Progressive => 1,
            Self::Fields => 2,
        }
    }
}

impl From<bool> for FieldMode {
    fn from(interlaced: bool) -> Self {
        if interlaced {
            Self::Fields
        } else {
            Self::Progressive
        }
    }
}

/// Luma block layout shared by `BlockDiff` and the mask stage.
///
/// Blocks tile the frame from the top-left corner. Pixels right of
/// `blocks_x * block_width` or below `blocks_y * block_height` belong to no
/// block and are never examined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGeometry {
    pub block_width: NonZeroUsize,
    pub block_height: NonZeroUsize,
    pub blocks_x: usize,
    pub blocks_y: usize,
}

impl BlockGeometry {
    pub fn new(
        filter: &'static str,
        width: usize,
        height: usize,
        blockx: i64,
        blocky: i64,
    ) -> Result<Self, BifrostError> {
        let invalid = || BifrostError::InvalidBlockSize {
            filter,
            width: blockx,
            height: blocky,
        };
        let block_width = usize::try_from(blockx)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(invalid)?;
        let block_height = usize::try_from(blocky)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(invalid)?;

        // Every sample pair can differ by at most 255.
        let worst_case = block_width
            .get()
            .checked_mul(block_height.get())
            .and_then(|area| area.checked_mul(u8::MAX as usize));
        if worst_case.is_none_or(|sum| sum > i32::MAX as usize) {
            return Err(BifrostError::BlockTooLarge {
                filter,
                width: block_width.get(),
                height: block_height.get(),
            });
        }

        Ok(Self {
            block_width,
            block_height,
            blocks_x: width / block_width,
            blocks_y: height / block_height,
        })
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks_x * self.blocks_y
    }

    /// Derives the chroma block size for a clip subsampled by
    /// `1 << sub_sampling_w` horizontally and `1 << sub_sampling_h` vertically.
    pub fn chroma(
        &self,
        filter: &'static str,
        sub_sampling_w: u8,
        sub_sampling_h: u8,
    ) -> Result<ChromaGeometry, BifrostError> {
        let x_ratio = 1usize << sub_sampling_w;
        let y_ratio = 1usize << sub_sampling_h;
        if self.block_width.get() % x_ratio != 0 || self.block_height.get() % y_ratio != 0 {
            return Err(BifrostError::IncompatibleSubsampling { filter });
        }

        let block_width = self.block_width.get() >> sub_sampling_w;
        let block_height = self.block_height.get() >> sub_sampling_h;
        if block_width < 2 || block_height < 2 {
            return Err(BifrostError::BlockTooSmall { filter });
        }

        // SAFETY: both were checked to be at least 2 above
        let (block_width, block_height) = unsafe {
            (
                NonZeroUsize::new_unchecked(block_width),
                NonZeroUsize::new_unchecked(block_height),
            )
        };
        Ok(ChromaGeometry {
            block_width,
            block_height,
        })
    }
}

/// Size of one block in the chroma planes. Both dimensions are at least 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromaGeometry {
    pub block_width: NonZeroUsize,
    pub block_height: NonZeroUsize,
}

impl ChromaGeometry {
    #[must_use]
    pub fn area(&self) -> usize {
        self.block_width.get() * self.block_height.get()
    }
}
