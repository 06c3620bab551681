#![allow(dead_code)]

use std::fmt::Write;

#[derive(Debug, Clone)]
pub struct TestClipConfig {
    pub width: usize,
    pub height: usize,
    pub format: &'static str, // e.g., "vs.YUV420P8"
    pub length: usize,
    pub content_type: ClipContentType,
}

#[derive(Debug, Clone)]
pub enum ClipContentType {
    Blank,
    /// Static luma with U and V swapping places every frame, which is what
    /// rainbowing looks like to the filter.
    ChromaFlicker,
    /// Luma and chroma jump to new values at frame `at`.
    SceneCut { at: usize },
    /// A single frame at `at` with different luma and chroma from the rest.
    Flash { at: usize },
    MovingBox { speed_x: i32, speed_y: i32 },
}

impl ClipContentType {
    fn to_script(&self) -> String {
        match self {
            Self::Blank => String::new(),
            Self::ChromaFlicker => r#"
flick = core.std.BlankClip(clip, color=[128, 118, 138])
flack = core.std.BlankClip(clip, color=[128, 138, 118])
clip = core.std.Interleave([flick, flack])[:clip.num_frames]
"#
            .to_string(),
            Self::SceneCut { at } => {
                format!(
                    r#"
before = core.std.BlankClip(clip, color=[40, 100, 150], length={at})
after = core.std.BlankClip(clip, color=[200, 150, 100], length=clip.num_frames - {at})
clip = before + after
"#
                )
            }
            Self::Flash { at } => {
                format!(
                    r#"
steady = core.std.BlankClip(clip, color=[40, 100, 150])
flash = core.std.BlankClip(clip, color=[200, 150, 100], length=1)
clip = steady[:{at}] + flash + steady[{at} + 1:]
"#
                )
            }
            Self::MovingBox { speed_x, speed_y } => {
                // Create a simple pattern with motion by shifting frame content
                format!(
                    r#"
box_size = min(clip.width, clip.height) // 4
border_h = (clip.width - box_size) // 2
border_v = (clip.height - box_size) // 2

# Coloured box in the center
base = core.std.BlankClip(clip, color=[0, 128, 128])
box = core.std.BlankClip(clip, width=box_size, height=box_size, color=[180, 90, 160])
box_bordered = core.std.AddBorders(box, left=border_h, right=border_h, top=border_v, bottom=border_v, color=[0, 128, 128])

# Shift the pattern per frame to create motion
def shift_clip(n):
    # Ensure shifts are mod 2 for YUV420 chroma alignment
    shift_x = ((n * {speed_x}) % (clip.width - box_size)) & ~1
    shift_y = ((n * {speed_y}) % (clip.height - box_size)) & ~1
    if shift_x == 0 and shift_y == 0:
        return box_bordered
    # Shift by cropping and adding borders
    cropped = core.std.Crop(box_bordered, left=shift_x, top=shift_y, right=0, bottom=0)
    shifted = core.std.AddBorders(cropped, left=0, top=0, right=shift_x, bottom=shift_y, color=[0, 128, 128])
    return shifted

clip = core.std.FrameEval(clip, shift_clip)
"#
                )
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BifrostParams {
    /// Name of a script variable to pass as `altclip`
    pub altclip: Option<&'static str>,
    pub luma_thresh: Option<f64>,
    pub variation: Option<i64>,
    pub conservative_mask: Option<i64>,
    pub interlaced: Option<i64>,
    pub blockx: Option<i64>,
    pub blocky: Option<i64>,
}

impl BifrostParams {
    /// Keyword arguments accepted by `BlockDiff`
    pub fn block_diff_kwargs(&self) -> String {
        let mut parts = Vec::new();

        if let Some(v) = self.interlaced {
            parts.push(format!("interlaced={}", v));
        }
        if let Some(v) = self.blockx {
            parts.push(format!("blockx={}", v));
        }
        if let Some(v) = self.blocky {
            parts.push(format!("blocky={}", v));
        }

        parts.join(", ")
    }

    /// Keyword arguments accepted by `Bifrost`
    pub fn to_kwargs(&self) -> String {
        let mut parts = Vec::new();

        if let Some(v) = self.altclip {
            parts.push(format!("altclip={}", v));
        }
        if let Some(v) = self.luma_thresh {
            parts.push(format!("luma_thresh={:?}", v));
        }
        if let Some(v) = self.variation {
            parts.push(format!("variation={}", v));
        }
        if let Some(v) = self.conservative_mask {
            parts.push(format!("conservative_mask={}", v));
        }
        let block_diff = self.block_diff_kwargs();
        if !block_diff.is_empty() {
            parts.push(block_diff);
        }

        parts.join(", ")
    }
}

fn call(namespace: &str, function: &str, kwargs: &str) -> String {
    if kwargs.is_empty() {
        format!("core.{namespace}.{function}(clip)")
    } else {
        format!("core.{namespace}.{function}(clip, {kwargs})")
    }
}

fn source_script(clip_config: &TestClipConfig) -> String {
    format!(
        r#"
import vapoursynth as vs
core = vs.core

# Generate base clip
clip = core.std.BlankClip(width={}, height={}, format={}, length={})
{}
alt = core.std.BlankClip(clip, color=[16, 60, 200])
"#,
        clip_config.width,
        clip_config.height,
        clip_config.format,
        clip_config.length,
        clip_config.content_type.to_script(),
    )
}

/// Runs `function` ("Bifrost" or "BlockDiff") from the C plugin as output 0
/// and from this plugin as output 1.
pub fn generate_comparison_script(
    clip_config: &TestClipConfig,
    params: &BifrostParams,
    function: &str,
) -> String {
    let kwargs = if function == "BlockDiff" {
        params.block_diff_kwargs()
    } else {
        params.to_kwargs()
    };

    let mut script = source_script(clip_config);
    writeln!(&mut script, "c_out = {}", call("bifrost", function, &kwargs)).unwrap();
    writeln!(&mut script, "r_out = {}", call("rbifrost", function, &kwargs)).unwrap();
    script.push_str("c_out.set_output(0)\nr_out.set_output(1)\n");

    script
}

/// Outputs the source clip as output 0, `function` of this plugin applied to
/// it as output 1 and the alternate clip as output 2.
pub fn generate_rust_script(
    clip_config: &TestClipConfig,
    params: &BifrostParams,
    function: &str,
) -> String {
    let kwargs = if function == "BlockDiff" {
        params.block_diff_kwargs()
    } else {
        params.to_kwargs()
    };

    let mut script = source_script(clip_config);
    writeln!(&mut script, "r_out = {}", call("rbifrost", function, &kwargs)).unwrap();
    script.push_str("clip.set_output(0)\nr_out.set_output(1)\nalt.set_output(2)\n");

    script
}
