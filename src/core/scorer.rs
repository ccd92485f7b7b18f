use anyhow::{bail, Result};
use fast_image_resize as fr;
use fr::images::{Image, ImageRef};
use serde::Serialize;

use crate::core::frame_store::FrameHandle;
use crate::decoder::{image_io, FrameData};
use crate::utils::logger;

/// NHWC `f32` image batch of one, RGB, intensities in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTensor {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl FrameTensor {
    pub const CHANNELS: u32 = 3;

    /// `[1, height, width, 3]`
    pub fn shape(&self) -> [i32; 4] {
        [1, self.height as i32, self.width as i32, Self::CHANNELS as i32]
    }
}

/// Image classification capability: fixed-size tensor in, one scalar out.
pub trait Classifier {
    /// `(width, height)` the model expects.
    fn input_size(&self) -> (u32, u32);

    fn classify(&mut self, tensor: &FrameTensor) -> Result<f32>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameScore {
    pub frame_index: usize,
    pub value: f64,
}

#[derive(Debug, Default)]
pub struct ScoreOutcome {
    pub scores: Vec<FrameScore>,
    pub skipped: usize,
}

/// Nearest-neighbour resize to exactly `width x height`, aspect ratio ignored.
pub fn resize_rgb(frame: &FrameData, width: u32, height: u32) -> Result<FrameData> {
    if !frame.is_well_formed() {
        bail!("malformed frame ({}x{}, {} bytes)", frame.width, frame.height, frame.buffer.len());
    }
    if width == 0 || height == 0 {
        bail!("target size {}x{} is empty", width, height);
    }
    if frame.width == width && frame.height == height {
        return Ok(frame.clone());
    }

    let src_image = ImageRef::new(frame.width, frame.height, &frame.buffer, fr::PixelType::U8x3)?;
    let mut dst_image = Image::new(width, height, fr::PixelType::U8x3);

    let options = fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Nearest);
    let mut resizer = fr::Resizer::new();
    resizer.resize(&src_image, &mut dst_image, &options)?;

    Ok(FrameData::new(dst_image.into_vec(), width, height, frame.timestamp))
}

/// Linear `0..=255 -> 0.0..=1.0`.
pub fn normalize(pixels: &[u8]) -> Vec<f32> {
    pixels.iter().map(|&p| p as f32 / 255.0).collect()
}

pub fn to_tensor(frame: &FrameData, width: u32, height: u32) -> Result<FrameTensor> {
    let data = if frame.is_well_formed() && frame.width == width && frame.height == height {
        normalize(&frame.buffer)
    } else {
        normalize(&resize_rgb(frame, width, height)?.buffer)
    };
    Ok(FrameTensor { data, width, height })
}

/// Runs the classifier over stored frames, one at a time, in store order.
pub struct FrameScorer<'a> {
    classifier: &'a mut dyn Classifier,
}

impl<'a> FrameScorer<'a> {
    pub fn new(classifier: &'a mut dyn Classifier) -> Self {
        Self { classifier }
    }

    fn try_score(&mut self, handle: &FrameHandle) -> Result<FrameScore> {
        let (width, height) = self.classifier.input_size();
        let pixels = image_io::read_rgb(&handle.path)?;
        let tensor = to_tensor(&pixels, width, height)?;

        let value = self.classifier.classify(&tensor)? as f64;
        if !value.is_finite() {
            bail!("classifier returned {}", value);
        }

        Ok(FrameScore {
            frame_index: handle.index,
            value,
        })
    }

    /// `None` when the frame could not be decoded or classified.
    pub fn score(&mut self, handle: &FrameHandle) -> Option<FrameScore> {
        match self.try_score(handle) {
            Ok(score) => Some(score),
            Err(e) => {
                logger::warn(&format!("Frame {} skipped ({}): {}", handle.index, handle.path.display(), e));
                None
            }
        }
    }

    pub fn score_all(&mut self, handles: &[FrameHandle]) -> ScoreOutcome {
        let mut outcome = ScoreOutcome::default();
        for handle in handles {
            match self.score(handle) {
                Some(score) => outcome.scores.push(score),
                None => outcome.skipped += 1,
            }
        }
        logger::info(&format!(
            "Scored {} frames ({} skipped).",
            outcome.scores.len(),
            outcome.skipped
        ));
        outcome
    }
}
