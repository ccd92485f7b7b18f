//! `Veriframe.config`: `key = value` lines, `#` comments, read from the
//! working directory. Missing file means defaults; command-line flags win.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::aggregator::{ConfidencePolicy, DecisionPolicy};
use crate::core::frame_store::FrameFormat;
use crate::core::sampler::SampleSpec;
use crate::shared::constants;
use crate::utils::logger;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    pub segment_duration: f64,
    pub samples_per_segment: u32,
    pub threshold: f64,
    pub confidence_policy: ConfidencePolicy,
    pub model: PathBuf,
    pub input_width: u32,
    pub input_height: u32,
    pub work_dir: PathBuf,
    pub frame_format: FrameFormat,
    pub ffmpeg: String,
    pub transcode: bool,
    pub keep_frames: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let work_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(constants::WORK_DIR_NAME);

        Self {
            segment_duration: constants::DEFAULT_SEGMENT_DURATION_SECS,
            samples_per_segment: constants::DEFAULT_SAMPLES_PER_SEGMENT,
            threshold: constants::DEFAULT_REAL_THRESHOLD,
            confidence_policy: ConfidencePolicy::MeanScore,
            model: PathBuf::from(constants::DEFAULT_MODEL_FILE),
            input_width: constants::DEFAULT_INPUT_WIDTH,
            input_height: constants::DEFAULT_INPUT_HEIGHT,
            work_dir,
            frame_format: FrameFormat::Jpg,
            ffmpeg: constants::DEFAULT_FFMPEG_BIN.to_string(),
            transcode: true,
            keep_frames: false,
        }
    }
}

/// Values given on the command line; `None` keeps the file/default value.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub segment_duration: Option<f64>,
    pub samples_per_segment: Option<u32>,
    pub threshold: Option<f64>,
    pub model: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub no_transcode: bool,
    pub keep_frames: bool,
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => bail!("{}: expected a boolean, got '{}'", key, value),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| anyhow::anyhow!("{}: invalid number '{}'", key, value))
}

impl AppConfig {
    /// Reads `path` if it exists, otherwise returns defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        if !path.exists() {
            return Ok(config);
        }

        let content = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        config
            .apply_str(&content)
            .with_context(|| format!("invalid {}", path.display()))?;
        Ok(config)
    }

    pub fn apply_str(&mut self, content: &str) -> Result<()> {
        for (line_no, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                bail!("line {}: expected 'key = value'", line_no + 1);
            };
            self.set(key.trim(), value.trim())
                .with_context(|| format!("line {}", line_no + 1))?;
        }
        Ok(())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "segment-duration" => self.segment_duration = parse_num(key, value)?,
            "samples-per-segment" => self.samples_per_segment = parse_num(key, value)?,
            "threshold" => self.threshold = parse_num(key, value)?,
            "confidence-policy" => {
                self.confidence_policy = ConfidencePolicy::parse(value)
                    .ok_or_else(|| anyhow::anyhow!("{}: unknown policy '{}'", key, value))?
            }
            "model" => self.model = PathBuf::from(value),
            "input-width" => self.input_width = parse_num(key, value)?,
            "input-height" => self.input_height = parse_num(key, value)?,
            "work-dir" => self.work_dir = PathBuf::from(value),
            "frame-format" => {
                self.frame_format = FrameFormat::parse(value)
                    .ok_or_else(|| anyhow::anyhow!("{}: unsupported format '{}'", key, value))?
            }
            "ffmpeg" => self.ffmpeg = value.to_string(),
            "transcode" => self.transcode = parse_bool(key, value)?,
            "keep-frames" => self.keep_frames = parse_bool(key, value)?,
            _ => logger::warn(&format!("{}: unknown key '{}' ignored", constants::CONFIG_FILE, key)),
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(v) = overrides.segment_duration {
            self.segment_duration = v;
        }
        if let Some(v) = overrides.samples_per_segment {
            self.samples_per_segment = v;
        }
        if let Some(v) = overrides.threshold {
            self.threshold = v;
        }
        if let Some(v) = &overrides.model {
            self.model = v.clone();
        }
        if let Some(v) = &overrides.work_dir {
            self.work_dir = v.clone();
        }
        if overrides.no_transcode {
            self.transcode = false;
        }
        if overrides.keep_frames {
            self.keep_frames = true;
        }
    }

    pub fn sample_spec(&self) -> Result<SampleSpec> {
        Ok(SampleSpec::new(self.segment_duration, self.samples_per_segment)?)
    }

    pub fn decision_policy(&self) -> DecisionPolicy {
        DecisionPolicy {
            threshold: self.threshold,
            confidence: self.confidence_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_business_rules() {
        let config = AppConfig::default();
        assert_eq!(config.sample_spec().unwrap(), SampleSpec::default());
        assert_eq!(config.decision_policy(), DecisionPolicy::default());
        assert_eq!((config.input_width, config.input_height), (299, 299));
        assert!(config.transcode);
    }

    #[test]
    fn test_apply_str_reads_keys_and_comments() {
        let mut config = AppConfig::default();
        config
            .apply_str(
                "# tuning\n\
                 segment-duration = 2.5\n\
                 samples-per-segment=4\n\
                 threshold = 0.55\n\
                 confidence-policy = label-probability\n\
                 frame-format = png\n\
                 transcode = off\n\
                 mystery = 42\n",
            )
            .unwrap();

        assert_eq!(config.segment_duration, 2.5);
        assert_eq!(config.samples_per_segment, 4);
        assert_eq!(config.threshold, 0.55);
        assert_eq!(config.confidence_policy, ConfidencePolicy::LabelProbability);
        assert_eq!(config.frame_format, FrameFormat::Png);
        assert!(!config.transcode);
    }

    #[test]
    fn test_malformed_values_are_errors() {
        assert!(AppConfig::default().apply_str("threshold = high").is_err());
        assert!(AppConfig::default().apply_str("transcode = maybe").is_err());
        assert!(AppConfig::default().apply_str("just some words").is_err());
        assert!(AppConfig::default().apply_str("frame-format = gif").is_err());
    }

    #[test]
    fn test_invalid_spec_surfaces_on_use() {
        let mut config = AppConfig::default();
        config.apply_str("samples-per-segment = 0").unwrap();
        assert!(config.sample_spec().is_err());
    }

    #[test]
    fn test_overrides_win() {
        let mut config = AppConfig::default();
        config.apply_str("threshold = 0.4\nkeep-frames = false").unwrap();
        config.apply_overrides(&Overrides {
            threshold: Some(0.9),
            samples_per_segment: Some(3),
            no_transcode: true,
            keep_frames: true,
            ..Overrides::default()
        });

        assert_eq!(config.threshold, 0.9);
        assert_eq!(config.samples_per_segment, 3);
        assert_eq!(config.segment_duration, 5.0);
        assert!(!config.transcode);
        assert!(config.keep_frames);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/Veriframe.config")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_config_json_uses_kebab_policy() {
        let json = serde_json::to_value(AppConfig::default()).unwrap();
        assert_eq!(json["confidence_policy"], "mean-score");
        assert_eq!(json["frame_format"], "jpg");
    }
}
