use thiserror::Error;

/// Failures reported by the plugin's filters.
///
/// Everything except the `*LumaDiff` variants is detected while the filter is
/// being constructed, so a misconfigured filter never produces a frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BifrostError {
    #[error("{filter}: Only constant format 8 bit integer YUV allowed.")]
    UnsupportedFormat { filter: &'static str },

    #[error("{filter}: variable resolution input clips are not supported")]
    VariableResolution { filter: &'static str },

    #[error("{filter}: The two input clips must have the same format, dimensions and length.")]
    ClipMismatch { filter: &'static str },

    #[error("{filter}: 'blockx' and 'blocky' must be positive, got {width}x{height}.")]
    InvalidBlockSize {
        filter: &'static str,
        width: i64,
        height: i64,
    },

    #[error("{filter}: a {width}x{height} block can overflow the 32-bit difference sum.")]
    BlockTooLarge {
        filter: &'static str,
        width: usize,
        height: usize,
    },

    #[error("{filter}: The requested block size is incompatible with the clip's subsampling.")]
    IncompatibleSubsampling { filter: &'static str },

    #[error("{filter}: The requested block size is too small.")]
    BlockTooSmall { filter: &'static str },

    #[error("{filter}: 'variation' must fit in a 32-bit integer, got {value}.")]
    InvalidVariation { filter: &'static str, value: i64 },

    #[error("{filter}: invoking {function} failed: {reason}")]
    Invoke {
        filter: &'static str,
        function: &'static str,
        reason: String,
    },

    #[error(
        "{filter}: frame {frame} has no BifrostLumaDiff property, the clip must come from \
         BlockDiff."
    )]
    MissingLumaDiff { filter: &'static str, frame: usize },

    #[error("{filter}: frame {frame} carries {actual} block differences, expected {expected}.")]
    LumaDiffLength {
        filter: &'static str,
        frame: usize,
        expected: usize,
        actual: usize,
    },
}
