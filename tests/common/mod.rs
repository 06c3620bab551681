pub mod comparison;
pub mod detection;
pub mod script_gen;

// Re-export commonly used items
pub use comparison::{
    ComparisonConfig, PixelDiff, PixelDifference, assert_frames_match, compare_frame_properties,
    compare_frames, luma_diffs,
};
pub use detection::{check_bifrost_available, check_rbifrost_available};
pub use script_gen::{
    BifrostParams, ClipContentType, TestClipConfig, generate_comparison_script,
    generate_rust_script,
};

/// Macro to require the C Bifrost plugin and fail the test if it is missing
/// Use this at the start of each comparison test
#[macro_export]
macro_rules! require_bifrost {
    () => {
        if let Err(e) = $crate::common::check_bifrost_available() {
            panic!("Test failed: {:#}", e);
        }
    };
}

/// Macro to require this plugin to be installed where VapourSynth autoloads it
#[macro_export]
macro_rules! require_rbifrost {
    () => {
        if let Err(e) = $crate::common::check_rbifrost_available() {
            panic!("Test failed: {:#}", e);
        }
    };
}
