use anyhow::{Context, Result};
use vapoursynth::prelude::Environment;

/// Checks if the C Bifrost plugin is available
pub fn check_bifrost_available() -> Result<()> {
    let test_script = r#"
import vapoursynth as vs
core = vs.core
clip = core.std.BlankClip(width=64, height=64, format=vs.YUV420P8, length=10)
try:
    clip = core.bifrost.Bifrost(clip)
    clip.set_output()
except AttributeError as e:
    raise Exception(f"C Bifrost (bifrost namespace) not available: {e}")
"#;

    Environment::from_script(test_script).context(
        "C Bifrost plugin not detected. Please install libbifrost.so to /usr/lib/vapoursynth/",
    )?;

    Ok(())
}

/// Checks if this plugin was installed where VapourSynth autoloads it
pub fn check_rbifrost_available() -> Result<()> {
    let test_script = r#"
import vapoursynth as vs
core = vs.core
clip = core.std.BlankClip(width=64, height=64, format=vs.YUV420P8, length=10)
try:
    clip = core.rbifrost.Bifrost(clip)
    clip.set_output()
except AttributeError as e:
    raise Exception(f"rbifrost namespace not available: {e}")
"#;

    Environment::from_script(test_script).context(
        "rbifrost plugin not detected. Build with `cargo build --release` and copy \
         libvapoursynth_bifrost.so into a VapourSynth plugin directory",
    )?;

    Ok(())
}
