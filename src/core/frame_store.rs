use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::sampler::SampledFrame;
use crate::decoder::image_io;
use crate::shared::constants;
use crate::utils::{file_utils, logger};

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode frame {index} to {path}: {reason}")]
    Encode {
        index: usize,
        path: PathBuf,
        reason: String,
    },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// On-disk image format for stored frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    Jpg,
    Png,
}

impl FrameFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FrameFormat::Jpg => "jpg",
            FrameFormat::Png => "png",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(FrameFormat::Jpg),
            "png" => Some(FrameFormat::Png),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameHandle {
    pub index: usize,
    pub path: PathBuf,
}

/// Directory of sampled frames for exactly one run.
///
/// Layout of a namespace:
/// ```text
/// <root>/frames/frame_00000000.jpg
/// <root>/scratch/...            (decode provider working files)
/// ```
pub struct FrameStore {
    root: PathBuf,
    frames_dir: PathBuf,
    scratch_dir: PathBuf,
    format: FrameFormat,
}

impl FrameStore {
    /// Binds a fixed directory. Frames land directly in `dir`, next to
    /// whatever else lives there; scratch files go to a hidden per-store
    /// subdirectory. Two runs must not share such a store at once.
    pub fn open(dir: &Path, format: FrameFormat) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).map_err(io_err(dir))?;
        Ok(Self {
            root: dir.to_path_buf(),
            frames_dir: dir.to_path_buf(),
            scratch_dir: dir.join(format!(".{}-{}", constants::SCRATCH_SUBDIR, Self::next_run_id())),
            format,
        })
    }

    /// Allocates a fresh namespace under `work_root` so concurrent runs never
    /// share a frames directory.
    pub fn for_run(work_root: &Path, format: FrameFormat) -> Result<Self, StoreError> {
        let root = work_root.join(Self::next_run_id());
        let frames_dir = root.join(constants::FRAMES_SUBDIR);
        fs::create_dir_all(&frames_dir).map_err(io_err(&frames_dir))?;
        logger::debug(&format!("Allocated frame store {}", root.display()));
        Ok(Self {
            scratch_dir: root.join(constants::SCRATCH_SUBDIR),
            root,
            frames_dir,
            format,
        })
    }

    fn next_run_id() -> String {
        format!(
            "run-{}-{}-{}",
            chrono::Utc::now().format("%Y%m%dT%H%M%S%.6f"),
            std::process::id(),
            RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        )
    }

    pub fn frames_dir(&self) -> &Path {
        &self.frames_dir
    }

    /// Working directory for the decode provider, outside the frames listing.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn frame_file_name(&self, index: usize) -> String {
        format!(
            "{}{:0width$}.{}",
            constants::FRAME_FILE_PREFIX,
            index,
            self.format.extension(),
            width = constants::FRAME_INDEX_WIDTH
        )
    }

    /// Removes previously stored frames. Only files named like this store's
    /// frames are touched. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        for handle in self.list_ordered()? {
            if handle.path.is_file() {
                fs::remove_file(&handle.path).map_err(io_err(&handle.path))?;
                removed += 1;
            }
        }
        if removed > 0 {
            logger::debug(&format!("Cleared {} stale frames from {}", removed, self.frames_dir.display()));
        }
        Ok(removed)
    }

    /// Persists the frame under its zero-padded index name. The store owns
    /// the pixels from here on.
    pub fn put(&self, frame: SampledFrame) -> Result<FrameHandle, StoreError> {
        let path = self.frames_dir.join(self.frame_file_name(frame.index));
        image_io::write_rgb(&path, &frame.pixels).map_err(|e| StoreError::Encode {
            index: frame.index,
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(FrameHandle {
            index: frame.index,
            path,
        })
    }

    /// Stored frames in emission order. Files not named like frames are ignored.
    pub fn list_ordered(&self) -> Result<Vec<FrameHandle>, StoreError> {
        let files = file_utils::list_files(&self.frames_dir, self.format.extension())
            .map_err(io_err(&self.frames_dir))?;

        Ok(files
            .into_iter()
            .filter_map(|path| {
                let index = parse_frame_index(&path)?;
                Some(FrameHandle { index, path })
            })
            .collect())
    }

    /// Deletes the whole namespace. Only for stores created with [`FrameStore::for_run`].
    pub fn release(self) -> Result<(), StoreError> {
        if self.root == self.frames_dir {
            return Ok(());
        }
        fs::remove_dir_all(&self.root).map_err(io_err(&self.root))?;
        logger::debug(&format!("Released frame store {}", self.root.display()));
        Ok(())
    }
}

fn parse_frame_index(path: &Path) -> Option<usize> {
    let stem = path.file_stem()?.to_str()?;
    let digits = stem.strip_prefix(constants::FRAME_FILE_PREFIX)?;
    if digits.len() != constants::FRAME_INDEX_WIDTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
