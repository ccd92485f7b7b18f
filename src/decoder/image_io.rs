//! Still-image encode/decode for stored frames, through OpenCV's imgcodecs.

use anyhow::{anyhow, bail, Result};
use opencv::{imgcodecs, imgproc, prelude::*};
use std::path::Path;
use std::time::Duration;

use super::frame_data::FrameData;

/// Encodes an RGB frame; the format follows the file extension.
pub fn write_rgb(path: &Path, frame: &FrameData) -> Result<()> {
    if !frame.is_well_formed() {
        bail!(
            "refusing to write malformed frame ({}x{}, {} bytes)",
            frame.width,
            frame.height,
            frame.buffer.len()
        );
    }

    let flat = Mat::from_slice(&frame.buffer)?;
    let rgb = flat.reshape(3, frame.height as i32)?;

    let mut bgr = Mat::default();
    imgproc::cvt_color_def(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR)?;

    let path_str = path.to_string_lossy();
    if !imgcodecs::imwrite_def(&path_str, &bgr)? {
        bail!("imwrite rejected {}", path_str);
    }
    Ok(())
}

/// Decodes an image file to RGB24.
pub fn read_rgb(path: &Path) -> Result<FrameData> {
    let path_str = path.to_string_lossy();
    let bgr = imgcodecs::imread(&path_str, imgcodecs::IMREAD_COLOR)?;
    if bgr.empty() {
        return Err(anyhow!("could not decode image: {}", path_str));
    }

    let mut rgb = Mat::default();
    imgproc::cvt_color_def(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB)?;
    if !rgb.is_continuous() {
        rgb = rgb.try_clone()?;
    }

    let width = rgb.cols() as u32;
    let height = rgb.rows() as u32;
    Ok(FrameData::new(rgb.data_bytes()?.to_vec(), width, height, Duration::ZERO))
}
