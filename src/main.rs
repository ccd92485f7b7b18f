mod classifier;
mod core;
mod decoder;
mod shared;
mod utils;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::classifier::DnnClassifier;
use crate::core::aggregator::Decision;
use crate::core::pipeline::{self, Pipeline};
use crate::core::FrameStore;
use crate::decoder::{FfmpegProvider, OpenCvVideo};
use crate::shared::config::{AppConfig, Overrides};
use crate::shared::constants;
use crate::utils::{file_utils, logger};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (key = value lines)
    #[arg(long, global = true, default_value = constants::CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct Tuning {
    /// Segment length in seconds
    #[arg(long)]
    segment_duration: Option<f64>,
    /// Frames sampled inside each segment
    #[arg(long)]
    samples_per_segment: Option<u32>,
    /// Mean scores strictly above this are Real
    #[arg(long)]
    threshold: Option<f64>,
    /// ONNX model file
    #[arg(short, long)]
    model: Option<PathBuf>,
    /// Root for per-run frame directories
    #[arg(long)]
    work_dir: Option<PathBuf>,
    /// Open the file directly instead of converting it to H.264 first
    #[arg(long, default_value_t = false)]
    no_transcode: bool,
    /// Leave the run's frames on disk
    #[arg(long, default_value_t = false)]
    keep_frames: bool,
}

impl From<&Tuning> for Overrides {
    fn from(t: &Tuning) -> Self {
        Overrides {
            segment_duration: t.segment_duration,
            samples_per_segment: t.samples_per_segment,
            threshold: t.threshold,
            model: t.model.clone(),
            work_dir: t.work_dir.clone(),
            no_transcode: t.no_transcode,
            keep_frames: t.keep_frames,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Score a video and print the Real/Fake decision as JSON
    Analyze {
        #[arg(short, long)]
        video: PathBuf,
        #[command(flatten)]
        tuning: Tuning,
    },
    /// Sample frames from a video into a directory without scoring them
    Sample {
        #[arg(short, long)]
        video: PathBuf,
        #[arg(short, long)]
        output_dir: PathBuf,
        #[command(flatten)]
        tuning: Tuning,
    },
    /// Print frame rate, frame count and the sampling plan for a video
    Probe {
        #[arg(short, long)]
        video: PathBuf,
        #[command(flatten)]
        tuning: Tuning,
    },
    /// Print the effective configuration
    Config {
        #[command(flatten)]
        tuning: Tuning,
    },
}

fn main() -> Result<()> {
    logger::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Analyze { video, tuning } => {
            let result = load_config(&cli.config, tuning).and_then(|config| analyze(&config, video));
            let (report, code) = analyze_report(result);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Sample { video, output_dir, tuning } => {
            let config = load_config(&cli.config, tuning)?;
            sample(&config, video, output_dir)?;
        }
        Commands::Probe { video, tuning } => {
            let config = load_config(&cli.config, tuning)?;
            let spec = config.sample_spec()?;
            let source = OpenCvVideo::open(video)?;
            let info = source.info();
            let planned = pipeline::planned_samples(info.duration_seconds, &spec)?;
            let report = serde_json::json!({
                "video": info,
                "sample_spec": spec,
                "planned_samples": planned,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Config { tuning } => {
            let config = load_config(&cli.config, tuning)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn load_config(path: &Path, tuning: &Tuning) -> Result<AppConfig> {
    let mut config = AppConfig::load(path)?;
    config.apply_overrides(&Overrides::from(tuning));
    logger::debug(&format!("effective config: {:?}", config));
    Ok(config)
}

fn read_video(video: &Path) -> Result<Vec<u8>> {
    if !file_utils::is_video_file(video) {
        logger::warn(&format!("{} has an unrecognised video extension", video.display()));
    }
    let bytes = file_utils::read_file(video)?;
    logger::info(&format!("Video received: {} ({} bytes)", video.display(), bytes.len()));
    Ok(bytes)
}

fn analyze(config: &AppConfig, video: &Path) -> Result<Decision> {
    let spec = config.sample_spec()?;
    let bytes = read_video(video)?;

    let provider = FfmpegProvider::new(config.ffmpeg.clone(), config.transcode);
    let mut classifier = DnnClassifier::load(&config.model, config.input_width, config.input_height)?;
    let store = FrameStore::for_run(&config.work_dir, config.frame_format)?;

    let result = Pipeline::new(&provider, &mut classifier, config.decision_policy()).run(&store, &bytes, &spec);

    if config.keep_frames {
        eprintln!("Frames kept in {}", store.frames_dir().display());
    } else if let Err(e) = store.release() {
        logger::warn(&format!("Could not remove run directory: {}", e));
    }

    Ok(result?)
}

/// JSON printed for `analyze` and the process exit code. Every failure,
/// including configuration and model loading, becomes `{"error": ...}`.
fn analyze_report(result: Result<Decision>) -> (serde_json::Value, i32) {
    match result {
        Ok(decision) => match serde_json::to_value(&decision) {
            Ok(report) => (report, 0),
            Err(e) => (serde_json::json!({ "error": e.to_string() }), 1),
        },
        Err(e) => {
            logger::error(&format!("Could not process video: {:#}", e));
            (serde_json::json!({ "error": format!("{:#}", e) }), 1)
        }
    }
}

fn sample(config: &AppConfig, video: &Path, output_dir: &Path) -> Result<()> {
    let spec = config.sample_spec()?;
    let bytes = read_video(video)?;

    let provider = FfmpegProvider::new(config.ffmpeg.clone(), config.transcode);
    let store = FrameStore::open(output_dir, config.frame_format)?;

    let summary = pipeline::extract_into(&provider, &store, &bytes, &spec)
        .with_context(|| format!("sampling {} failed", video.display()))?;

    let scratch = store.scratch_dir();
    if scratch.exists() {
        std::fs::remove_dir_all(&scratch).with_context(|| format!("failed to remove {}", scratch.display()))?;
    }

    println!(
        "Extracted {} of {} planned frames into {} ({} skipped, {} stale frames cleared)",
        summary.stored,
        summary.planned,
        store.frames_dir().display(),
        summary.skipped,
        summary.cleared
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_failures_become_json_errors() {
        let tuning = Tuning {
            segment_duration: Some(0.0),
            ..Tuning::default()
        };
        let missing = Path::new("veriframe-no-such.config");
        let result = load_config(missing, &tuning).and_then(|config| analyze(&config, Path::new("clip.webm")));

        let (report, code) = analyze_report(result);
        assert_eq!(code, 1);
        let message = report["error"].as_str().unwrap();
        assert!(message.contains("segment duration"), "{}", message);
    }

    #[test]
    fn test_unreadable_video_becomes_json_error() {
        let config = AppConfig::default();
        let result = analyze(&config, Path::new("/nonexistent/veriframe/clip.webm"));

        let (report, code) = analyze_report(result);
        assert_eq!(code, 1);
        assert!(report["error"].is_string());
        assert!(report.get("prediction").is_none());
    }

    #[test]
    fn test_decision_report_passes_through() {
        let decision = crate::core::aggregator::aggregate(&[], &Default::default());
        let (report, code) = analyze_report(Ok(decision));
        assert_eq!(code, 0);
        assert_eq!(report["prediction"], "Fake");
        assert_eq!(report["confidence"], 0.0);
    }
}
