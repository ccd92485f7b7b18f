use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::video::OpenCvVideo;
use super::{DecodeError, DecodeProvider, VideoSource};
use crate::shared::constants;
use crate::utils::logger;

/// Writes the upload into the run's scratch dir, optionally re-encodes it to
/// H.264/yuv420p MP4 so OpenCV can seek it, then opens it with OpenCV.
pub struct FfmpegProvider {
    ffmpeg_bin: String,
    transcode: bool,
}

impl FfmpegProvider {
    pub fn new(ffmpeg_bin: impl Into<String>, transcode: bool) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            transcode,
        }
    }

    fn write_upload(video: &[u8], scratch_dir: &Path) -> Result<PathBuf, DecodeError> {
        fs::create_dir_all(scratch_dir).map_err(|source| DecodeError::Io {
            path: scratch_dir.to_path_buf(),
            source,
        })?;

        let upload = scratch_dir.join(constants::UPLOAD_FILE_NAME);
        fs::write(&upload, video).map_err(|source| DecodeError::Io {
            path: upload.clone(),
            source,
        })?;
        logger::info(&format!("Video saved to: {} ({} bytes)", upload.display(), video.len()));
        Ok(upload)
    }

    pub fn transcode_args(input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    fn run_ffmpeg(&self, input: &Path, output: &Path) -> Result<(), DecodeError> {
        let result = Command::new(&self.ffmpeg_bin)
            .args(Self::transcode_args(input, output))
            .output()
            .map_err(|source| DecodeError::FfmpegNotFound {
                bin: self.ffmpeg_bin.clone(),
                source,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).to_string();
            logger::error(&format!("ffmpeg failed: {}", stderr));
            return Err(DecodeError::Transcode {
                exit_code: result.status.code(),
                stderr,
            });
        }

        logger::info(&format!("Video converted to MP4: {}", output.display()));
        Ok(())
    }
}

impl DecodeProvider for FfmpegProvider {
    fn open(&self, video: &[u8], scratch_dir: &Path) -> Result<Box<dyn VideoSource>, DecodeError> {
        if video.is_empty() {
            return Err(DecodeError::EmptyInput);
        }

        let upload = Self::write_upload(video, scratch_dir)?;

        let playable = if self.transcode {
            let converted = scratch_dir.join(constants::TRANSCODED_FILE_NAME);
            self.run_ffmpeg(&upload, &converted)?;
            converted
        } else {
            upload
        };

        Ok(Box::new(OpenCvVideo::open(&playable)?))
    }
}
