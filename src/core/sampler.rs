//! Temporal frame sampling.
//!
//! The timeline `[0, duration)` is cut into fixed-length segments (the last one
//! may be shorter). Each segment contributes up to `samples_per_segment`
//! timestamps spaced evenly strictly inside it, so no sample lands on a
//! segment boundary. Timestamps at or past the end of the video are never
//! requested.

use serde::Serialize;

use crate::decoder::{FrameData, VideoSource};
use crate::shared::constants;
use crate::utils::logger;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SpecError {
    #[error("segment duration must be a finite number of seconds > 0 (got {0})")]
    SegmentDuration(f64),

    #[error("samples per segment must be > 0")]
    SamplesPerSegment,

    #[error("sampling a {duration_secs:.3}s video would request more than {limit} frames")]
    TooManySamples { duration_secs: f64, limit: usize },
}

/// Sampling parameters for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleSpec {
    segment_duration_secs: f64,
    samples_per_segment: u32,
}

impl SampleSpec {
    pub fn new(segment_duration_secs: f64, samples_per_segment: u32) -> Result<Self, SpecError> {
        if !segment_duration_secs.is_finite() || segment_duration_secs <= 0.0 {
            return Err(SpecError::SegmentDuration(segment_duration_secs));
        }
        if samples_per_segment == 0 {
            return Err(SpecError::SamplesPerSegment);
        }
        Ok(Self {
            segment_duration_secs,
            samples_per_segment,
        })
    }

    pub fn segment_duration_secs(&self) -> f64 {
        self.segment_duration_secs
    }

    pub fn samples_per_segment(&self) -> u32 {
        self.samples_per_segment
    }

    /// Distance between neighbouring samples inside a full segment.
    pub fn sample_spacing(&self) -> f64 {
        self.segment_duration_secs / (self.samples_per_segment as f64 + 1.0)
    }
}

impl Default for SampleSpec {
    fn default() -> Self {
        Self {
            segment_duration_secs: constants::DEFAULT_SEGMENT_DURATION_SECS,
            samples_per_segment: constants::DEFAULT_SAMPLES_PER_SEGMENT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampledFrame {
    pub index: usize,
    pub timestamp_secs: f64,
    pub pixels: FrameData,
}

/// Counters for one sampling pass. The frames themselves go to the sink.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SampleOutcome {
    /// Timestamps requested from the source.
    pub attempted: usize,
    /// Frames handed to the sink.
    pub kept: usize,
    /// Timestamps that produced no frame.
    pub skipped: usize,
}

/// Number of segments covering `[0, duration)`. Fails when the resulting plan
/// would exceed [`constants::MAX_PLANNED_SAMPLES`].
pub fn segment_count(duration_secs: f64, spec: &SampleSpec) -> Result<usize, SpecError> {
    if !(duration_secs > 0.0) {
        return Ok(0);
    }
    let segments = (duration_secs / spec.segment_duration_secs()).ceil();
    let planned = segments * spec.samples_per_segment() as f64;
    if !planned.is_finite() || planned > constants::MAX_PLANNED_SAMPLES as f64 {
        return Err(SpecError::TooManySamples {
            duration_secs,
            limit: constants::MAX_PLANNED_SAMPLES,
        });
    }
    Ok(segments as usize)
}

/// Every timestamp the sampler will request for a video of `duration_secs`,
/// in ascending order.
pub fn plan_timestamps(duration_secs: f64, spec: &SampleSpec) -> Result<Vec<f64>, SpecError> {
    let segments = segment_count(duration_secs, spec)?;
    let spacing = spec.sample_spacing();
    let per_segment = spec.samples_per_segment();
    let mut timestamps = Vec::with_capacity(segments * per_segment as usize);

    for segment in 0..segments {
        let segment_start = segment as f64 * spec.segment_duration_secs();
        for i in 0..per_segment {
            let t = segment_start + (i as f64 + 1.0) * spacing;
            if t >= duration_secs {
                break;
            }
            timestamps.push(t);
        }
    }

    Ok(timestamps)
}

pub struct FrameSampler {
    spec: SampleSpec,
}

impl FrameSampler {
    pub fn new(spec: SampleSpec) -> Self {
        Self { spec }
    }

    /// Reads one frame per planned timestamp and hands each to `sink` as soon
    /// as it is decoded. Failed or empty reads are dropped and indices stay
    /// contiguous over the frames that were kept.
    pub fn sample(
        &self,
        source: &mut dyn VideoSource,
        sink: &mut dyn FnMut(SampledFrame),
    ) -> Result<SampleOutcome, SpecError> {
        let duration = source.duration_seconds();
        let timestamps = plan_timestamps(duration, &self.spec)?;

        logger::debug(&format!(
            "Sampling {:.3}s video (fps={}, frames={}): {} timestamps",
            duration,
            source.frame_rate(),
            source.frame_count(),
            timestamps.len()
        ));

        let mut outcome = SampleOutcome {
            attempted: timestamps.len(),
            ..SampleOutcome::default()
        };

        for t in timestamps {
            match source.read_at(t) {
                Ok(Some(pixels)) if pixels.is_well_formed() => {
                    sink(SampledFrame {
                        index: outcome.kept,
                        timestamp_secs: t,
                        pixels,
                    });
                    outcome.kept += 1;
                }
                Ok(Some(_)) => {
                    logger::debug(&format!("Malformed frame at {:.3}s, skipped", t));
                    outcome.skipped += 1;
                }
                Ok(None) => {
                    logger::debug(&format!("No frame at {:.3}s, skipped", t));
                    outcome.skipped += 1;
                }
                Err(e) => {
                    logger::debug(&format!("Decode failed at {:.3}s, skipped: {}", t, e));
                    outcome.skipped += 1;
                }
            }
        }

        logger::info(&format!("Extracted {} frames ({} skipped).", outcome.kept, outcome.skipped));
        Ok(outcome)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::rc::Rc;
    use std::time::Duration;

    /// In-memory source; `fail_at` holds read ordinals (0-based) that error.
    pub(crate) struct FakeVideo {
        pub fps: f64,
        pub frames: u64,
        pub fail_at: HashSet<usize>,
        pub empty_at: HashSet<usize>,
        pub reads: Vec<f64>,
    }

    impl FakeVideo {
        pub(crate) fn new(fps: f64, frames: u64) -> Self {
            Self {
                fps,
                frames,
                fail_at: HashSet::new(),
                empty_at: HashSet::new(),
                reads: Vec::new(),
            }
        }
    }

    impl VideoSource for FakeVideo {
        fn frame_rate(&self) -> f64 {
            self.fps
        }

        fn frame_count(&self) -> u64 {
            self.frames
        }

        fn read_at(&mut self, timestamp_secs: f64) -> anyhow::Result<Option<FrameData>> {
            let ordinal = self.reads.len();
            self.reads.push(timestamp_secs);
            if self.fail_at.contains(&ordinal) {
                return Err(anyhow!("corrupt packet"));
            }
            if self.empty_at.contains(&ordinal) {
                return Ok(None);
            }
            // shade encodes the ordinal so frames are distinguishable
            let shade = (ordinal % 256) as u8;
            Ok(Some(FrameData::new(
                vec![shade; 4 * 4 * 3],
                4,
                4,
                Duration::from_secs_f64(timestamp_secs),
            )))
        }
    }

    fn spec(seg: f64, n: u32) -> SampleSpec {
        SampleSpec::new(seg, n).unwrap()
    }

    fn collect(spec: SampleSpec, video: &mut FakeVideo) -> (Vec<SampledFrame>, SampleOutcome) {
        let mut frames = Vec::new();
        let outcome = FrameSampler::new(spec)
            .sample(video, &mut |frame| frames.push(frame))
            .unwrap();
        (frames, outcome)
    }

    #[test]
    fn test_spec_validation() {
        assert_eq!(SampleSpec::new(0.0, 10), Err(SpecError::SegmentDuration(0.0)));
        assert!(SampleSpec::new(-1.0, 10).is_err());
        assert!(SampleSpec::new(f64::NAN, 10).is_err());
        assert_eq!(SampleSpec::new(5.0, 0), Err(SpecError::SamplesPerSegment));
        assert_eq!(SampleSpec::default(), spec(5.0, 10));
    }

    #[test]
    fn test_zero_frame_rate_samples_nothing() {
        let mut video = FakeVideo::new(0.0, 900);
        let (frames, outcome) = collect(SampleSpec::default(), &mut video);

        assert!(frames.is_empty());
        assert_eq!(outcome.attempted, 0);
        assert!(video.reads.is_empty());
    }

    #[test]
    fn test_twelve_second_video_three_segments() {
        let s = spec(5.0, 10);
        assert_eq!(segment_count(12.0, &s), Ok(3));

        let ts = plan_timestamps(12.0, &s).unwrap();
        // 10 + 10 + 4: the short tail segment stops before 12s
        assert_eq!(ts.len(), 24);
        assert!(ts.iter().all(|&t| t < 12.0));

        let tail: Vec<f64> = ts.iter().copied().filter(|&t| t >= 10.0).collect();
        assert_eq!(tail.len(), 4);
        assert!((tail[0] - (10.0 + 5.0 / 11.0)).abs() < 1e-9);
    }

    #[test]
    fn test_whole_segments_bounded_and_increasing() {
        for (k, n) in [(1usize, 1u32), (2, 10), (3, 7), (6, 4)] {
            let s = spec(5.0, n);
            let duration = 5.0 * k as f64;
            let ts = plan_timestamps(duration, &s).unwrap();

            assert!(ts.len() <= k * n as usize);
            assert!(ts.windows(2).all(|w| w[0] < w[1]));
            assert!(ts.iter().all(|&t| t > 0.0 && t < duration));
        }
    }

    #[test]
    fn test_samples_avoid_segment_boundaries() {
        let s = spec(2.0, 3);
        let ts = plan_timestamps(6.0, &s).unwrap();
        assert_eq!(ts, vec![0.5, 1.0, 1.5, 2.5, 3.0, 3.5, 4.5, 5.0, 5.5]);
        assert!(ts.iter().all(|&t| (t % 2.0).abs() > 1e-9));
    }

    #[test]
    fn test_indices_contiguous_despite_failures() {
        // 10s at 30fps, 5s segments, 4 samples each -> 8 reads
        let mut video = FakeVideo::new(30.0, 300);
        video.fail_at = [0, 3].into_iter().collect();
        video.empty_at = [5].into_iter().collect();

        let (frames, outcome) = collect(spec(5.0, 4), &mut video);

        assert_eq!(outcome.attempted, 8);
        assert_eq!(outcome.skipped, 3);
        assert_eq!(outcome.kept, 5);
        assert_eq!(frames.len(), 5);

        let indices: Vec<usize> = frames.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert!(frames.windows(2).all(|w| w[0].timestamp_secs < w[1].timestamp_secs));
        // first kept frame came from read ordinal 1
        assert_eq!(frames[0].pixels.buffer[0], 1);
    }

    #[test]
    fn test_every_read_failing_yields_empty_outcome() {
        let mut video = FakeVideo::new(25.0, 250);
        video.fail_at = (0..100).collect();

        let (frames, outcome) = collect(spec(5.0, 10), &mut video);
        assert!(frames.is_empty());
        assert_eq!(outcome.skipped, outcome.attempted);
        assert_eq!(outcome.attempted, 20);
    }

    #[test]
    fn test_reads_follow_plan() {
        let mut video = FakeVideo::new(24.0, 24 * 7);
        let s = spec(5.0, 3);
        collect(s, &mut video);
        assert_eq!(video.reads, plan_timestamps(7.0, &s).unwrap());
    }

    /// Records how many frames the sink had received when each read started.
    struct CountingVideo {
        inner: FakeVideo,
        delivered: Rc<Cell<usize>>,
        delivered_at_read: Vec<usize>,
    }

    impl VideoSource for CountingVideo {
        fn frame_rate(&self) -> f64 {
            self.inner.frame_rate()
        }

        fn frame_count(&self) -> u64 {
            self.inner.frame_count()
        }

        fn read_at(&mut self, timestamp_secs: f64) -> anyhow::Result<Option<FrameData>> {
            self.delivered_at_read.push(self.delivered.get());
            self.inner.read_at(timestamp_secs)
        }
    }

    #[test]
    fn test_each_frame_reaches_sink_before_next_read() {
        let delivered = Rc::new(Cell::new(0));
        let mut video = CountingVideo {
            inner: FakeVideo::new(10.0, 50),
            delivered: Rc::clone(&delivered),
            delivered_at_read: Vec::new(),
        };
        video.inner.fail_at = [1].into_iter().collect();

        let outcome = FrameSampler::new(spec(5.0, 4))
            .sample(&mut video, &mut |_| delivered.set(delivered.get() + 1))
            .unwrap();

        assert_eq!(outcome.kept, 3);
        assert_eq!(video.delivered_at_read, vec![0, 1, 1, 2]);
        assert_eq!(delivered.get(), 3);
    }

    #[test]
    fn test_oversized_plan_is_rejected() {
        let tiny = spec(1e-300, 10);
        assert_eq!(
            plan_timestamps(12.0, &tiny),
            Err(SpecError::TooManySamples {
                duration_secs: 12.0,
                limit: constants::MAX_PLANNED_SAMPLES,
            })
        );

        let mut video = FakeVideo::new(30.0, 360);
        let result = FrameSampler::new(tiny).sample(&mut video, &mut |_| panic!("no frame expected"));
        assert!(result.is_err());
        assert!(video.reads.is_empty());

        // right at the limit is still allowed
        let edge = spec(1.0, (constants::MAX_PLANNED_SAMPLES / 10) as u32);
        assert!(segment_count(10.0, &edge).is_ok());
    }
}
