use crate::core::aggregator::{self, Decision, DecisionPolicy, RunStats};
use crate::core::frame_store::{FrameStore, StoreError};
use crate::core::sampler::{plan_timestamps, FrameSampler, SampleSpec, SpecError};
use crate::core::scorer::{Classifier, FrameScorer};
use crate::decoder::{DecodeError, DecodeProvider};
use crate::utils::logger;
use crate::utils::time_utils::Timer;

/// The only errors that escape a run. Everything per-frame is absorbed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("could not decode video: {0}")]
    Decode(#[from] DecodeError),

    #[error("frame store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("invalid sampling plan: {0}")]
    Spec(#[from] SpecError),
}

/// Result of the sample-and-store half of a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractionSummary {
    pub planned: usize,
    pub sampled: usize,
    pub skipped: usize,
    pub stored: usize,
    pub cleared: usize,
}

/// Sequences decode -> sample -> store -> score -> aggregate for one video.
/// The classifier and decode provider are borrowed per pipeline; the frame
/// store is handed in per run.
pub struct Pipeline<'a> {
    provider: &'a dyn DecodeProvider,
    classifier: &'a mut dyn Classifier,
    policy: DecisionPolicy,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        provider: &'a dyn DecodeProvider,
        classifier: &'a mut dyn Classifier,
        policy: DecisionPolicy,
    ) -> Self {
        Self {
            provider,
            classifier,
            policy,
        }
    }

    pub fn run(&mut self, store: &FrameStore, video: &[u8], spec: &SampleSpec) -> Result<Decision, PipelineError> {
        let total = Timer::new();
        let mut stage = Timer::new();

        let extraction = extract_into(self.provider, store, video, spec)?;
        logger::debug(&format!("extract stage: {}ms", stage.lap_ms()));

        let handles = store.list_ordered()?;
        let scored = FrameScorer::new(&mut *self.classifier).score_all(&handles);
        logger::debug(&format!("score stage: {}ms", stage.lap_ms()));

        let mut decision = aggregator::aggregate(&scored.scores, &self.policy);
        decision.stats = RunStats {
            planned_samples: extraction.planned,
            sampled_frames: extraction.sampled,
            skipped_samples: extraction.skipped,
            stored_frames: handles.len(),
            scored_frames: scored.scores.len(),
            skipped_frames: scored.skipped,
            elapsed_ms: total.elapsed_ms(),
        };

        logger::info(&format!(
            "Prediction result: score={:.4} prediction={:?} confidence={:.4}",
            decision.score, decision.prediction, decision.confidence
        ));
        Ok(decision)
    }
}

/// Clears the store, then opens the video and writes each sampled frame to
/// the store as soon as it is decoded. The video handle is released before
/// returning.
pub fn extract_into(
    provider: &dyn DecodeProvider,
    store: &FrameStore,
    video: &[u8],
    spec: &SampleSpec,
) -> Result<ExtractionSummary, PipelineError> {
    let mut summary = ExtractionSummary {
        cleared: store.clear()?,
        ..ExtractionSummary::default()
    };

    let outcome = {
        let mut source = provider.open(video, store.scratch_dir())?;
        let stored = &mut summary.stored;
        FrameSampler::new(*spec).sample(source.as_mut(), &mut |frame| {
            let index = frame.index;
            match store.put(frame) {
                Ok(_) => *stored += 1,
                Err(e) => logger::warn(&format!("Frame {} not stored: {}", index, e)),
            }
        })?
    };

    summary.planned = outcome.attempted;
    summary.sampled = outcome.kept;
    summary.skipped = outcome.skipped;

    debug_assert_eq!(
        summary.planned,
        summary.sampled + summary.skipped,
        "sampler accounting"
    );
    Ok(summary)
}

/// Timestamps that would be requested for a video of `duration_secs`.
pub fn planned_samples(duration_secs: f64, spec: &SampleSpec) -> Result<usize, SpecError> {
    Ok(plan_timestamps(duration_secs, spec)?.len())
}
