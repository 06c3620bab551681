
use std::{cmp::min, num::NonZeroUsize};

use anyhow::{Result, anyhow};
use smallvec::{SmallVec, smallvec};
use tracing::{Level, debug, enabled, trace};
use vapoursynth::{
    api::API,
    core::CoreRef,
    frame::{Frame, FrameRef, FrameRefMut},
    node::Node,
    plugins::{Filter, FrameContext},
    video_info::{Property, VideoInfo},
};

use crate::{
    block_diff::{LumaDiffs, PROP_LUMA_DIFF},
    error::BifrostError,
    params::{BlendDirection, BlockGeometry, ChromaGeometry, FieldMode},
    rainbow_mask::{
        ChromaView,
        apply_block_rainbow_mask,
        copy_chroma_block,
        make_block_rainbow_mask,
        process_block_rainbow_mask,
    },
    util::{chroma_planes_mut, constant_yuv8, plane_pitch, plane_with_padding},
};

const FILTER_NAME: &str = "Bifrost";

/// A side only wins the blend when its neighbour changed this much more.
const RELATIVE_FRAME_DIFF: f32 = 1.2;

/// Validated settings of the mask stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RainbowParams {
    /// Scene change threshold for a whole block, i.e. the per-pixel
    /// threshold multiplied by the block area.
    pub luma_thresh: f32,
    /// How far a chroma sample has to move away from both neighbours to be
    /// flagged.
    pub variation: i32,
    /// Skips the vertical mask expansion.
    pub conservative_mask: bool,
    pub relative_frame_diff: f32,
    pub geometry: BlockGeometry,
    pub chroma: ChromaGeometry,
}

impl RainbowParams {
    pub fn new(
        filter: &'static str,
        luma_thresh: f64,
        variation: i64,
        conservative_mask: bool,
        geometry: BlockGeometry,
        chroma: ChromaGeometry,
    ) -> Result<Self, BifrostError> {
        let variation = i32::try_from(variation).map_err(|_| BifrostError::InvalidVariation {
            filter,
            value: variation,
        })?;

        Ok(Self {
            luma_thresh: luma_thresh as f32
                * geometry.block_width.get() as f32
                * geometry.block_height.get() as f32,
            variation,
            conservative_mask,
            relative_frame_diff: RELATIVE_FRAME_DIFF,
            geometry,
            chroma,
        })
    }
}

/// Luma differences of one block, taken from the BlockDiff annotations of
/// frames `n - 2 * offset`, `n - offset`, `n` and `n + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDiffs {
    pub prevprev: i32,
    pub prev: i32,
    pub cur: i32,
    pub next: i32,
}

/// Three consecutive frames of the five frame window used to build a mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskSource {
    /// `n - 2 * offset`, `n - offset`, `n`
    Preceding,
    /// `n`, `n + offset`, `n + 2 * offset`
    Following,
    /// `n - offset`, `n`, `n + offset`
    Centered,
}

impl MaskSource {
    /// Positions of the (previous, current, next) frames in the window.
    #[must_use]
    pub fn frames(self) -> [usize; 3] {
        match self {
            Self::Preceding => [0, 1, 2],
            Self::Following => [2, 3, 4],
            Self::Centered => [1, 2, 3],
        }
    }
}

/// What happens to the chroma of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDecision {
    /// Luma changed a lot towards both neighbours.
    SceneChangeBoth,
    /// Luma changed a lot on one side and again one frame further out on the
    /// other side.
    SceneChangeExtended,
    /// Rainbows are detected on the frames in `source` and blended towards
    /// `direction`.
    Stable {
        source: MaskSource,
        direction: BlendDirection,
    },
}

/// Decides how one block is treated from its luma differences.
///
/// The two-frame differences further out are compared against the same
/// threshold as the adjacent ones.
#[must_use]
pub fn classify(diffs: BlockDiffs, params: &RainbowParams) -> BlockDecision {
    let thresh = params.luma_thresh;
    let ldprev = diffs.prev as f32;
    let ldnext = diffs.cur as f32;

    if ldnext > thresh && ldprev > thresh {
        return BlockDecision::SceneChangeBoth;
    }

    let (ldprevprev, ldnextnext) = if ldnext > thresh {
        (diffs.prevprev as f32, 0.0)
    } else if ldprev > thresh {
        (0.0, diffs.next as f32)
    } else {
        (0.0, 0.0)
    };

    if (ldnext > thresh && ldprevprev > thresh) || (ldprev > thresh && ldnextnext > thresh) {
        return BlockDecision::SceneChangeExtended;
    }

    // Build the mask on the side of the scene change the current frame
    // belongs to.
    let source = if ldnext > thresh {
        MaskSource::Preceding
    } else if ldprev > thresh {
        MaskSource::Following
    } else {
        MaskSource::Centered
    };

    BlockDecision::Stable {
        source,
        direction: BlendDirection::from_diffs(ldprev, ldnext, params.relative_frame_diff),
    }
}

/// Everything the mask stage reads to render one output frame.
#[derive(Debug, Clone, Copy)]
pub struct TemporalWindow<'a> {
    /// Chroma of frames `n - 2o`, `n - o`, `n`, `n + o`, `n + 2o`.
    pub chroma: [ChromaView<'a>; 5],
    /// BlockDiff annotations of frames `n - 2o`, `n - o`, `n`, `n + o`.
    pub diffs: [LumaDiffs<'a>; 4],
    /// Chroma of frame `n` of the alternate clip.
    pub alt: ChromaView<'a>,
}

impl TemporalWindow<'_> {
    fn block_diffs(&self, block: usize) -> BlockDiffs {
        BlockDiffs {
            prevprev: self.diffs[0].get(block),
            prev: self.diffs[1].get(block),
            cur: self.diffs[2].get(block),
            next: self.diffs[3].get(block),
        }
    }
}

/// Per-frame block tally, only used for logging. `masked_samples` is only
/// counted when requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub scene_change_blocks: usize,
    pub stable_blocks: usize,
    pub masked_samples: usize,
}

/// Writes the chroma of every block of the output frame.
///
/// Scene change blocks receive the alternate clip's chroma verbatim. Stable
/// blocks get a rainbow mask from the frames chosen by [`classify`] and are
/// then blended with the frames right before and after the current one.
/// Samples outside the block grid are left as they are in `dst_u` and
/// `dst_v`.
pub fn render_chroma(
    params: &RainbowParams,
    window: &TemporalWindow,
    dst_u: &mut [u8],
    dst_v: &mut [u8],
    dst_pitch: NonZeroUsize,
    count_masked: bool,
) -> RenderStats {
    let geometry = &params.geometry;
    let width = params.chroma.block_width;
    let height = params.chroma.block_height;

    let mut raw_mask: SmallVec<[bool; 64]> = smallvec![false; params.chroma.area()];
    let mut mask: SmallVec<[bool; 64]> = smallvec![false; params.chroma.area()];
    let mut stats = RenderStats::default();

    for by in 0..geometry.blocks_y {
        let y = by * height.get();
        for bx in 0..geometry.blocks_x {
            let x = bx * width.get();
            let dst_offset = y * dst_pitch.get() + x;

            match classify(window.block_diffs(by * geometry.blocks_x + bx), params) {
                BlockDecision::SceneChangeBoth | BlockDecision::SceneChangeExtended => {
                    copy_chroma_block(
                        &window.alt.at(x, y),
                        &mut dst_u[dst_offset..],
                        &mut dst_v[dst_offset..],
                        dst_pitch,
                        width,
                        height,
                    );
                    stats.scene_change_blocks += 1;
                }
                BlockDecision::Stable { source, direction } => {
                    let [prev, cur, next] = source.frames().map(|i| window.chroma[i].at(x, y));
                    make_block_rainbow_mask(
                        &prev,
                        &cur,
                        &next,
                        &mut raw_mask,
                        width,
                        height,
                        params.variation,
                    );
                    process_block_rainbow_mask(
                        &raw_mask,
                        &mut mask,
                        width,
                        height,
                        params.conservative_mask,
                    );

                    let [prev, cur, next] =
                        MaskSource::Centered.frames().map(|i| window.chroma[i].at(x, y));
                    apply_block_rainbow_mask(
                        &prev,
                        &cur,
                        &next,
                        &mask,
                        &mut dst_u[dst_offset..],
                        &mut dst_v[dst_offset..],
                        dst_pitch,
                        width,
                        height,
                        direction,
                    );
                    stats.stable_blocks += 1;
                    if count_masked {
                        stats.masked_samples += mask.iter().filter(|&&m| m).count();
                    }
                }
            }
        }
    }

    stats
}

fn chroma_view<'a>(frame: &'a Frame) -> Result<ChromaView<'a>> {
    Ok(ChromaView::new(
        plane_with_padding(frame, 1)?,
        plane_with_padding(frame, 2)?,
        plane_pitch(frame, 1),
    ))
}

/// The rainbow mask stage.
///
/// Expects `clip` to carry BlockDiff annotations computed with the same
/// block size and field mode. `altclip` supplies the chroma of scene change
/// blocks.
#[derive(Debug)]
pub struct Bifrost<'core> {
    clip: Node<'core>,
    altclip: Node<'core>,
    field_mode: FieldMode,
    params: RainbowParams,
    num_frames: usize,
}

impl<'core> Bifrost<'core> {
    pub fn new(
        clip: Node<'core>,
        altclip: Option<Node<'core>>,
        luma_thresh: Option<f64>,
        variation: Option<i64>,
        conservative_mask: Option<i64>,
        interlaced: Option<i64>,
        blockx: Option<i64>,
        blocky: Option<i64>,
    ) -> Result<Self> {
        let luma_thresh = luma_thresh.unwrap_or(10.0);
        let variation = variation.unwrap_or(5);
        let conservative_mask = conservative_mask.is_some_and(|c| c != 0);
        let field_mode = FieldMode::from(interlaced.is_none_or(|i| i != 0));
        let blockx = blockx.unwrap_or(4);
        let blocky = blocky.unwrap_or(4);
        let altclip = altclip.unwrap_or_else(|| clip.clone());

        let info = clip.info();
        let (format, resolution) = constant_yuv8(FILTER_NAME, &info)?;

        let alt_info = altclip.info();
        if alt_info.format != Property::Constant(format)
            || alt_info.resolution != Property::Constant(resolution)
            || alt_info.num_frames != info.num_frames
        {
            return Err(BifrostError::ClipMismatch {
                filter: FILTER_NAME,
            }
            .into());
        }

        let geometry = BlockGeometry::new(
            FILTER_NAME,
            resolution.width,
            resolution.height,
            blockx,
            blocky,
        )?;
        let chroma = geometry.chroma(
            FILTER_NAME,
            format.sub_sampling_w(),
            format.sub_sampling_h(),
        )?;
        let params = RainbowParams::new(
            FILTER_NAME,
            luma_thresh,
            variation,
            conservative_mask,
            geometry,
            chroma,
        )?;

        debug!(
            blocks_x = geometry.blocks_x,
            blocks_y = geometry.blocks_y,
            chroma_block_width = chroma.block_width.get(),
            chroma_block_height = chroma.block_height.get(),
            luma_thresh = params.luma_thresh,
            variation = params.variation,
            conservative_mask,
            offset = field_mode.offset(),
            "Bifrost: created filter"
        );

        Ok(Self {
            num_frames: info.num_frames,
            clip,
            altclip,
            field_mode,
            params,
        })
    }

    /// Frame numbers of the five frame window around `n`, clamped to the
    /// clip.
    fn window(&self, n: usize) -> [usize; 5] {
        let offset = self.field_mode.offset();
        let last = self.num_frames.saturating_sub(1);
        [
            n.saturating_sub(2 * offset),
            n.saturating_sub(offset),
            n,
            min(n + offset, last),
            min(n + 2 * offset, last),
        ]
    }

    fn source_frame(&self, context: FrameContext, n: usize) -> Result<FrameRef<'core>> {
        self.clip
            .get_frame_filter(context, n)
            .ok_or_else(|| anyhow!("Bifrost: get_frame_filter past end of video"))
    }
}

impl<'core> Filter<'core> for Bifrost<'core> {
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
        for i in self.window(n) {
            self.clip.request_frame_filter(context, i);
        }
        self.altclip.request_frame_filter(context, n);
        Ok(None)
    }

    fn get_frame(
        &self,
        _api: API,
        core: CoreRef<'core>,
        context: FrameContext,
        n: usize,
    ) -> Result<FrameRef<'core>> {
        let window = self.window(n);
        let frames = [
            self.source_frame(context, window[0])?,
            self.source_frame(context, window[1])?,
            self.source_frame(context, window[2])?,
            self.source_frame(context, window[3])?,
            self.source_frame(context, window[4])?,
        ];
        let alt = self
            .altclip
            .get_frame_filter(context, n)
            .ok_or_else(|| anyhow!("Bifrost: get_frame_filter alt past end of video"))?;

        let block_count = self.params.geometry.block_count();
        let props = [
            frames[0].props(),
            frames[1].props(),
            frames[2].props(),
            frames[3].props(),
        ];
        let diffs = [
            LumaDiffs::from_props(FILTER_NAME, &props[0], window[0], block_count)?,
            LumaDiffs::from_props(FILTER_NAME, &props[1], window[1], block_count)?,
            LumaDiffs::from_props(FILTER_NAME, &props[2], window[2], block_count)?,
            LumaDiffs::from_props(FILTER_NAME, &props[3], window[3], block_count)?,
        ];
        let temporal = TemporalWindow {
            chroma: [
                chroma_view(&frames[0])?,
                chroma_view(&frames[1])?,
                chroma_view(&frames[2])?,
                chroma_view(&frames[3])?,
                chroma_view(&frames[4])?,
            ],
            diffs,
            alt: chroma_view(&alt)?,
        };

        // Copying all of frame `n` keeps the chroma outside the block grid
        // defined, at the cost of a chroma copy the blocks then overwrite.
        let mut dest = FrameRefMut::copy_of(core, &frames[2]);
        let _ = dest.props_mut().delete_key(PROP_LUMA_DIFF);
        let dst_pitch = plane_pitch(&dest, 1);
        let (dst_u, dst_v) = chroma_planes_mut(&mut dest)?;

        let stats = render_chroma(
            &self.params,
            &temporal,
            dst_u,
            dst_v,
            dst_pitch,
            enabled!(Level::TRACE),
        );
        trace!(
            frame = n,
            scene_change_blocks = stats.scene_change_blocks,
            stable_blocks = stats.stable_blocks,
            masked_samples = stats.masked_samples,
            "Bifrost: rendered frame"
        );

        Ok(dest.into())
    }
}
