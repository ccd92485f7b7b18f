pub mod frame_data;
pub mod image_io;
pub mod transcode;
pub mod video;

use std::path::{Path, PathBuf};

pub use frame_data::FrameData;
pub use transcode::FfmpegProvider;
pub use video::OpenCvVideo;

/// Error type for turning raw bytes into a seekable video.
/// Any of these aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("ffmpeg binary not found ({bin}): {source}")]
    FfmpegNotFound {
        bin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ffmpeg conversion failed (exit code {exit_code:?}): {stderr}")]
    Transcode {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to open video: {0}")]
    Open(PathBuf),

    #[error("empty video payload")]
    EmptyInput,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// A decodable, seekable stream.
pub trait VideoSource {
    /// Frames per second as reported by the container; 0 or NaN when unknown.
    fn frame_rate(&self) -> f64;

    fn frame_count(&self) -> u64;

    /// Seeks to `timestamp_secs` and decodes the frame there.
    /// `Ok(None)` means the source had no frame at that position.
    fn read_at(&mut self, timestamp_secs: f64) -> anyhow::Result<Option<FrameData>>;

    fn duration_seconds(&self) -> f64 {
        duration_from(self.frame_count(), self.frame_rate())
    }
}

/// Turns an uploaded payload into a [`VideoSource`].
/// `scratch_dir` belongs to the current run and may be written freely.
pub trait DecodeProvider {
    fn open(&self, video: &[u8], scratch_dir: &Path) -> Result<Box<dyn VideoSource>, DecodeError>;
}

/// `frame_count / frame_rate`, or 0 when the rate is unusable.
pub fn duration_from(frame_count: u64, frame_rate: f64) -> f64 {
    if frame_rate.is_finite() && frame_rate > 0.0 {
        frame_count as f64 / frame_rate
    } else {
        0.0
    }
}
