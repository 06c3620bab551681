mod sad;


use core::slice;
use std::num::NonZeroUsize;

use anyhow::{Result, bail};
use vapoursynth::{
    format::{ColorFamily, Format, SampleType},
    frame::Frame,
    video_info::{Property, Resolution, VideoInfo},
};

use crate::error::BifrostError;

pub use sad::block_luma_diff;

#[cfg(target_arch = "x86_64")]
cpufeatures::new!(cpuid_avx2, "avx2");

#[cfg(target_arch = "x86_64")]
pub use cpuid_avx2::get as has_avx2;

/// Copies a `row_size` by `height` rectangle between two strided buffers.
///
/// When both strides equal the row size the rectangle is contiguous and is
/// copied in one go.
pub fn vs_bitblt(
    dest: &mut [u8],
    dest_stride: NonZeroUsize,
    src: &[u8],
    src_stride: NonZeroUsize,
    row_size: NonZeroUsize,
    height: NonZeroUsize,
) {
    let height = height.get();
    let row_size = row_size.get();
    let src_stride = src_stride.get();
    let dest_stride = dest_stride.get();

    if src_stride == dest_stride && src_stride == row_size {
        dest[..row_size * height].copy_from_slice(&src[..row_size * height]);
    } else {
        for i in 0..height {
            let src_start = i * src_stride;
            let dest_start = i * dest_stride;
            dest[dest_start..dest_start + row_size]
                .copy_from_slice(&src[src_start..src_start + row_size]);
        }
    }
}

/// Returns the format and resolution of a clip if it is constant 8 bit
/// integer YUV, which is all the filters in this plugin accept.
pub fn constant_yuv8<'core>(
    filter: &'static str,
    info: &VideoInfo<'core>,
) -> Result<(Format<'core>, Resolution), BifrostError> {
    let format = match info.format {
        Property::Variable => return Err(BifrostError::UnsupportedFormat { filter }),
        Property::Constant(format) => format,
    };
    if format.color_family() != ColorFamily::YUV
        || format.sample_type() != SampleType::Integer
        || format.bits_per_sample() != 8
    {
        return Err(BifrostError::UnsupportedFormat { filter });
    }

    let resolution = match info.resolution {
        Property::Variable => return Err(BifrostError::VariableResolution { filter }),
        Property::Constant(resolution) => resolution,
    };
    Ok((format, resolution))
}

/// Row pitch of a plane in samples. Frames in this plugin are 8 bit, so it is
/// the byte stride.
#[must_use]
pub fn plane_pitch(frame: &Frame, plane: usize) -> NonZeroUsize {
    // SAFETY: strides are at least the plane width, which is non-zero
    unsafe { NonZeroUsize::new_unchecked(frame.stride(plane)) }
}

/// Gets a slice to the plane's data including its padding.
/// The `plane` function in Vapoursynth fails if a plane has padding,
/// but the per-block kernels address rows by stride, so they need all of it.
pub fn plane_with_padding<'a>(frame: &'a Frame, plane: usize) -> Result<&'a [u8]> {
    if frame.format().plane_count() < plane + 1 {
        bail!("Tried to get plane not present in frame");
    }

    let data_ptr = frame.data_ptr(plane);
    let len = frame.stride(plane) * frame.height(plane);

    // SAFETY: VapourSynth allocates `stride * height` bytes per plane
    Ok(unsafe { slice::from_raw_parts(data_ptr, len) })
}

/// Gets mutable slices to both chroma planes of a frame at once.
pub fn chroma_planes_mut<'a>(frame: &'a mut Frame) -> Result<(&'a mut [u8], &'a mut [u8])> {
    if frame.format().plane_count() < 3 {
        bail!("Tried to get chroma planes of a frame without chroma");
    }

    let u_len = frame.stride(1) * frame.height(1);
    let v_len = frame.stride(2) * frame.height(2);
    let u_ptr = frame.data_ptr_mut(1);
    let v_ptr = frame.data_ptr_mut(2);

    // SAFETY: each plane is its own `stride * height` allocation region, so
    // the U and V slices never overlap, and both borrow `frame` mutably for
    // the same lifetime.
    Ok(unsafe {
        (
            slice::from_raw_parts_mut(u_ptr, u_len),
            slice::from_raw_parts_mut(v_ptr, v_len),
        )
    })
}
