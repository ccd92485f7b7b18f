use anyhow::{anyhow, Result};
use opencv::{imgproc, prelude::*, videoio};
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use super::frame_data::FrameData;
use super::{DecodeError, VideoSource};
use crate::utils::logger;
use crate::utils::time_utils;

#[derive(Debug, Clone, Serialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub frame_count: u64,
    pub duration_seconds: f64,
}

/// OpenCV `VideoCapture` opened on a file, read by timestamp.
pub struct OpenCvVideo {
    capture: videoio::VideoCapture,
    fps: f64,
    frame_count: u64,
    width: u32,
    height: u32,
}

impl OpenCvVideo {
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        let path_str = path.to_string_lossy();
        logger::debug(&format!("Opening video with OpenCV: {}", path_str));

        // CAP_ANY lets OpenCV pick the backend (FFmpeg/GStreamer on Linux)
        let capture = videoio::VideoCapture::from_file(&path_str, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            logger::error(&format!("Failed to open video file: {}", path_str));
            return Err(DecodeError::Open(path.to_path_buf()));
        }

        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        let raw_count = capture.get(videoio::CAP_PROP_FRAME_COUNT)?;
        // some containers report -1 or NaN here
        let frame_count = if raw_count.is_finite() && raw_count > 0.0 { raw_count as u64 } else { 0 };
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;

        logger::info(&format!(
            "VideoCapture opened: {}x{} fps={} frames={}",
            width, height, fps, frame_count
        ));

        Ok(Self {
            capture,
            fps,
            frame_count,
            width,
            height,
        })
    }

    pub fn info(&self) -> VideoInfo {
        VideoInfo {
            width: self.width,
            height: self.height,
            frame_rate: self.fps,
            frame_count: self.frame_count,
            duration_seconds: self.duration_seconds(),
        }
    }

    fn decode_current(&mut self, timestamp_secs: f64) -> Result<Option<FrameData>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? {
            return Ok(None);
        }
        if frame.empty() {
            return Ok(None);
        }

        let width = frame.cols() as u32;
        let height = frame.rows() as u32;

        let mut rgb = Mat::default();
        imgproc::cvt_color_def(&frame, &mut rgb, imgproc::COLOR_BGR2RGB)?;
        if !rgb.is_continuous() {
            rgb = rgb.try_clone()?;
        }

        let bytes = rgb.data_bytes()?;
        if bytes.len() != FrameData::expected_len(width, height) {
            return Err(anyhow!(
                "unexpected frame layout: {} bytes for {}x{}",
                bytes.len(),
                width,
                height
            ));
        }

        Ok(Some(FrameData::new(
            bytes.to_vec(),
            width,
            height,
            Duration::from_secs_f64(timestamp_secs.max(0.0)),
        )))
    }
}

impl VideoSource for OpenCvVideo {
    fn frame_rate(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn read_at(&mut self, timestamp_secs: f64) -> Result<Option<FrameData>> {
        let seeked = self
            .capture
            .set(videoio::CAP_PROP_POS_MSEC, time_utils::secs_to_millis(timestamp_secs))?;
        if !seeked {
            logger::debug(&format!("Seek to {:.3}s not acknowledged by backend", timestamp_secs));
        }
        self.decode_current(timestamp_secs)
    }
}

impl Drop for OpenCvVideo {
    fn drop(&mut self) {
        let _ = self.capture.release();
        logger::debug("VideoCapture released");
    }
}
