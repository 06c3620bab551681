use anyhow::{Result, anyhow};
use tracing::debug;
use vapoursynth::{
    api::API,
    core::CoreRef,
    frame::FrameRef,
    map::{Map, OwnedMap},
    node::Node,
    plugin::Plugin,
    plugins::{Filter, FrameContext},
    video_info::VideoInfo,
};

use crate::{PLUGIN_IDENTIFIER, bifrost::Bifrost, error::BifrostError};

const FILTER_NAME: &str = "Bifrost";
const STD_PLUGIN_IDENTIFIER: &str = "com.vapoursynth.std";

/// User arguments of `Bifrost`, forwarded to the stages of the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct BifrostArgs {
    pub luma_thresh: Option<f64>,
    pub variation: Option<i64>,
    pub conservative_mask: Option<i64>,
    pub interlaced: Option<i64>,
    pub blockx: Option<i64>,
    pub blocky: Option<i64>,
}

/// Passes the frames of an already assembled filter chain through unchanged.
#[derive(Debug)]
pub struct Chain<'core> {
    node: Node<'core>,
}

impl<'core> Filter<'core> for Chain<'core> {
    fn video_info(&self, _api: API, _core: CoreRef<'core>) -> Vec<VideoInfo<'core>> {
        vec![self.node.info()]
    }

    fn get_frame_initial(
        &self,
        _api: API,
        _core: CoreRef<'core>,
        context: FrameContext,
        n: usize,
    ) -> Result<Option<FrameRef<'core>>> {
        self.node.request_frame_filter(context, n);
        Ok(None)
    }

    fn get_frame(
        &self,
        _api: API,
        _core: CoreRef<'core>,
        context: FrameContext,
        n: usize,
    ) -> Result<FrameRef<'core>> {
        self.node
            .get_frame_filter(context, n)
            .ok_or_else(|| anyhow!("Bifrost: get_frame_filter past end of video"))
    }
}

fn plugin<'core>(
    core: CoreRef<'core>,
    identifier: &str,
    function: &'static str,
) -> Result<Plugin<'core>> {
    core.get_plugin_by_id(identifier)?.ok_or_else(|| {
        BifrostError::Invoke {
            filter: FILTER_NAME,
            function,
            reason: format!("plugin {identifier} is not loaded"),
        }
        .into()
    })
}

/// Calls `function` of `plugin` on `clip` and returns the resulting clip.
/// `set_args` adds any arguments besides `clip`.
fn invoke<'core>(
    api: API,
    plugin: &Plugin<'core>,
    function: &'static str,
    clip: &Node<'core>,
    set_args: impl FnOnce(&mut Map<'core>) -> Result<()>,
) -> Result<Node<'core>> {
    let mut args = OwnedMap::new(api);
    args.set_node("clip", clip)?;
    set_args(&mut *args)?;

    let ret = plugin.invoke(function, &*args)?;
    if let Some(reason) = ret.error() {
        return Err(BifrostError::Invoke {
            filter: FILTER_NAME,
            function,
            reason: reason.into_owned(),
        }
        .into());
    }
    Ok(ret.get_node("clip")?)
}

/// Builds the complete rainbow removal chain for `clip`.
///
/// Interlaced clips are split into fields first and woven back together at
/// the end. The primary clip is annotated by `BlockDiff` and then handed to
/// `RainbowMask` together with the alternate clip.
pub fn assemble<'core>(
    api: API,
    core: CoreRef<'core>,
    clip: Node<'core>,
    altclip: Option<Node<'core>>,
    args: BifrostArgs,
) -> Result<Chain<'core>> {
    // Reject bad arguments before anything is built.
    Bifrost::new(
        clip.clone(),
        altclip.clone(),
        args.luma_thresh,
        args.variation,
        args.conservative_mask,
        args.interlaced,
        args.blockx,
        args.blocky,
    )?;

    let interlaced = args.interlaced.is_none_or(|i| i != 0);
    let std = plugin(core, STD_PLUGIN_IDENTIFIER, "std")?;
    let bifrost = plugin(core, PLUGIN_IDENTIFIER, "RainbowMask")?;

    let mut altclip = altclip.unwrap_or_else(|| clip.clone());
    let mut clip = clip;
    if interlaced {
        clip = invoke(api, &std, "SeparateFields", &clip, |map| {
            Ok(map.set_int("tff", 1)?)
        })?;
        altclip = invoke(api, &std, "SeparateFields", &altclip, |map| {
            Ok(map.set_int("tff", 1)?)
        })?;
    }

    let clip = invoke(api, &std, "Cache", &clip, |_| Ok(()))?;
    let clip = invoke(api, &bifrost, "BlockDiff", &clip, |map| {
        map.set_int("interlaced", i64::from(interlaced))?;
        if let Some(blockx) = args.blockx {
            map.set_int("blockx", blockx)?;
        }
        if let Some(blocky) = args.blocky {
            map.set_int("blocky", blocky)?;
        }
        Ok(())
    })?;
    let clip = invoke(api, &std, "Cache", &clip, |_| Ok(()))?;

    let mut clip = invoke(api, &bifrost, "RainbowMask", &clip, |map| {
        map.set_node("altclip", &altclip)?;
        if let Some(luma_thresh) = args.luma_thresh {
            map.set_float("luma_thresh", luma_thresh)?;
        }
        if let Some(variation) = args.variation {
            map.set_int("variation", variation)?;
        }
        if let Some(conservative_mask) = args.conservative_mask {
            map.set_int("conservative_mask", conservative_mask)?;
        }
        map.set_int("interlaced", i64::from(interlaced))?;
        if let Some(blockx) = args.blockx {
            map.set_int("blockx", blockx)?;
        }
        if let Some(blocky) = args.blocky {
            map.set_int("blocky", blocky)?;
        }
        Ok(())
    })?;

    if interlaced {
        clip = invoke(api, &std, "DoubleWeave", &clip, |map| {
            Ok(map.set_int("tff", 1)?)
        })?;
        clip = invoke(api, &std, "SelectEvery", &clip, |map| {
            map.set_int("cycle", 2)?;
            map.set_int("offsets", 0)?;
            Ok(())
        })?;
    }

    debug!(interlaced, "Bifrost: assembled filter chain");

    Ok(Chain { node: clip })
}
