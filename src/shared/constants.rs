pub const APP_NAME: &str = "Veriframe";

pub const CONFIG_FILE: &str = "Veriframe.config";
pub const ERROR_LOG_FILE: &str = "veriframe-error.log";
pub const DEBUG_LOG_FILE: &str = "veriframe-debug.log";

pub const DEFAULT_SEGMENT_DURATION_SECS: f64 = 5.0;
pub const DEFAULT_SAMPLES_PER_SEGMENT: u32 = 10;
/// Upper bound on timestamps requested for one video.
pub const MAX_PLANNED_SAMPLES: usize = 100_000;
pub const DEFAULT_REAL_THRESHOLD: f64 = 0.7;

pub const DEFAULT_MODEL_FILE: &str = "xception_model.onnx";
/// Xception input resolution.
pub const DEFAULT_INPUT_WIDTH: u32 = 299;
pub const DEFAULT_INPUT_HEIGHT: u32 = 299;

pub const DEFAULT_FFMPEG_BIN: &str = "ffmpeg";
pub const WORK_DIR_NAME: &str = "veriframe";

pub const FRAME_FILE_PREFIX: &str = "frame_";
/// Zero padding for frame names; 8 digits keeps listings sorted past any realistic run.
pub const FRAME_INDEX_WIDTH: usize = 8;

pub const FRAMES_SUBDIR: &str = "frames";
pub const SCRATCH_SUBDIR: &str = "scratch";
pub const UPLOAD_FILE_NAME: &str = "input_video.webm";
pub const TRANSCODED_FILE_NAME: &str = "converted_video.mp4";

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm"];
