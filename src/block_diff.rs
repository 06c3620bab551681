
use std::{cmp::min, num::NonZeroUsize};

use anyhow::{Result, anyhow};
use tracing::debug;
use vapoursynth::{
    api::API,
    core::CoreRef,
    frame::{FrameRef, FrameRefMut},
    map::Map,
    node::Node,
    plugins::{Filter, FrameContext},
    video_info::VideoInfo,
};

use crate::{
    error::BifrostError,
    params::{BlockGeometry, FieldMode},
    util::{block_luma_diff, constant_yuv8, plane_pitch, plane_with_padding},
};

/// Frame property holding the per-block luma differences of a frame.
pub const PROP_LUMA_DIFF: &str = "BifrostLumaDiff";

const FILTER_NAME: &str = "BlockDiff";

/// Per-block luma differences stored in a frame's `BifrostLumaDiff`
/// property.
///
/// The property is a byte blob of `blocks_x * blocks_y` native-endian `i32`
/// values in row-major block order. Values are read straight out of the
/// property without copying.
#[derive(Debug, Clone, Copy)]
pub struct LumaDiffs<'a> {
    data: &'a [u8],
}

impl<'a> LumaDiffs<'a> {
    const ENTRY_SIZE: usize = size_of::<i32>();

    /// Serializes block differences into the property layout.
    #[must_use]
    pub fn encode(diffs: &[i32]) -> Vec<u8> {
        diffs.iter().flat_map(|diff| diff.to_ne_bytes()).collect()
    }

    /// Wraps already serialized property data, checking it holds exactly
    /// `expected` entries.
    pub fn from_bytes(
        filter: &'static str,
        frame: usize,
        data: &'a [u8],
        expected: usize,
    ) -> Result<Self, BifrostError> {
        if data.len() != expected * Self::ENTRY_SIZE {
            return Err(BifrostError::LumaDiffLength {
                filter,
                frame,
                expected,
                actual: data.len() / Self::ENTRY_SIZE,
            });
        }
        Ok(Self { data })
    }

    /// Reads the differences attached to frame `frame` through its property
    /// map.
    pub fn from_props(
        filter: &'static str,
        props: &'a Map<'a>,
        frame: usize,
        expected: usize,
    ) -> Result<Self, BifrostError> {
        let data = props
            .get_data(PROP_LUMA_DIFF)
            .map_err(|_| BifrostError::MissingLumaDiff { filter, frame })?;
        Self::from_bytes(filter, frame, data, expected)
    }

    /// Difference of block `block`, counted in row-major order.
    #[must_use]
    pub fn get(&self, block: usize) -> i32 {
        let d = &self.data[block * Self::ENTRY_SIZE..][..Self::ENTRY_SIZE];
        i32::from_ne_bytes([d[0], d[1], d[2], d[3]])
    }
}

/// Computes the sum of absolute luma differences of every block in
/// `geometry`, in row-major order. Samples outside the block grid are never
/// read.
#[must_use]
pub fn compute_diffs(
    geometry: &BlockGeometry,
    cur: &[u8],
    cur_pitch: NonZeroUsize,
    next: &[u8],
    next_pitch: NonZeroUsize,
) -> Vec<i32> {
    let bw = geometry.block_width;
    let bh = geometry.block_height;
    let mut diffs = Vec::with_capacity(geometry.block_count());

    for by in 0..geometry.blocks_y {
        let cur_row = &cur[by * bh.get() * cur_pitch.get()..];
        let next_row = &next[by * bh.get() * next_pitch.get()..];
        for bx in 0..geometry.blocks_x {
            let x = bx * bw.get();
            diffs.push(block_luma_diff(
                bw,
                bh,
                &cur_row[x..],
                cur_pitch,
                &next_row[x..],
                next_pitch,
            ));
        }
    }

    diffs
}

/// Annotates every frame with the per-block luma difference to the frame
/// `offset` positions later (or to itself at the end of the clip).
///
/// The result is consumed by `RainbowMask` to detect scene changes and to
/// pick blending directions.
#[derive(Debug)]
pub struct BlockDiff<'core> {
    clip: Node<'core>,
    field_mode: FieldMode,
    geometry: BlockGeometry,
    num_frames: usize,
}

impl<'core> BlockDiff<'core> {
    pub fn new(
        clip: Node<'core>,
        interlaced: Option<i64>,
        blockx: Option<i64>,
        blocky: Option<i64>,
    ) -> Result<Self> {
        let field_mode = FieldMode::from(interlaced.is_none_or(|i| i != 0));
        let blockx = blockx.unwrap_or(4);
        let blocky = blocky.unwrap_or(4);

        let info = clip.info();
        let (_format, resolution) = constant_yuv8(FILTER_NAME, &info)?;
        let geometry = BlockGeometry::new(
            FILTER_NAME,
            resolution.width,
            resolution.height,
            blockx,
            blocky,
        )?;

        debug!(
            blocks_x = geometry.blocks_x,
            blocks_y = geometry.blocks_y,
            block_width = geometry.block_width.get(),
            block_height = geometry.block_height.get(),
            offset = field_mode.offset(),
            "BlockDiff: created filter"
        );

        Ok(Self {
            num_frames: info.num_frames,
            clip,
            field_mode,
            geometry,
        })
    }

    fn next_frame(&self, n: usize) -> usize {
        min(n + self.field_mode.offset(), self.num_frames.saturating_sub(1))
    }
}

impl<'core> Filter<'core> for BlockDiff<'core> {
    fn video_info(&self, _api: API, _core: CoreRef<'core>) -> Vec<VideoInfo<'core>> {
        vec![self.clip.info()]
    }

    fn get_frame_initial(
        &self,
        _api: API,
        _core: CoreRef<'core>,
        context: FrameContext,
        n: usize,
    ) -> Result<Option<FrameRef<'core>>> {
        self.clip.request_frame_filter(context, n);
        self.clip.request_frame_filter(context, self.next_frame(n));
        Ok(None)
    }

    fn get_frame(
        &self,
        _api: API,
        core: CoreRef<'core>,
        context: FrameContext,
        n: usize,
    ) -> Result<FrameRef<'core>> {
        let cur = self
            .clip
            .get_frame_filter(context, n)
            .ok_or_else(|| anyhow!("BlockDiff: get_frame_filter past end of video"))?;
        let next = self
            .clip
            .get_frame_filter(context, self.next_frame(n))
            .ok_or_else(|| anyhow!("BlockDiff: get_frame_filter next past end of video"))?;

        let diffs = compute_diffs(
            &self.geometry,
            plane_with_padding(&cur, 0)?,
            plane_pitch(&cur, 0),
            plane_with_padding(&next, 0)?,
            plane_pitch(&next, 0),
        );

        let mut dest = FrameRefMut::copy_of(core, &cur);
        let mut props = dest.props_mut();
        // Replace whatever an upstream BlockDiff left behind.
        let _ = props.delete_key(PROP_LUMA_DIFF);
        props.set_data(PROP_LUMA_DIFF, &LumaDiffs::encode(&diffs))?;

        Ok(dest.into())
    }
}
