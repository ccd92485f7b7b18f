use serde::Serialize;

use crate::core::scorer::FrameScore;
use crate::shared::constants;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    Real,
    Fake,
}

/// How `confidence` is derived from the mean score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfidencePolicy {
    /// Confidence is the mean score itself.
    MeanScore,
    /// Probability mass behind the chosen label: `score` for Real, `1 - score` for Fake.
    LabelProbability,
}

impl ConfidencePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "mean-score" => Some(ConfidencePolicy::MeanScore),
            "label-probability" => Some(ConfidencePolicy::LabelProbability),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecisionPolicy {
    /// Mean scores strictly above this are Real.
    pub threshold: f64,
    pub confidence: ConfidencePolicy,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            threshold: constants::DEFAULT_REAL_THRESHOLD,
            confidence: ConfidencePolicy::MeanScore,
        }
    }
}

/// Per-run counters reported alongside the verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub planned_samples: usize,
    pub sampled_frames: usize,
    pub skipped_samples: usize,
    pub stored_frames: usize,
    pub scored_frames: usize,
    pub skipped_frames: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub score: f64,
    pub prediction: Label,
    pub confidence: f64,
    pub stats: RunStats,
}

/// 0.0 for an empty set.
pub fn mean_score(scores: &[FrameScore]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().map(|s| s.value).sum::<f64>() / scores.len() as f64
}

pub fn aggregate(scores: &[FrameScore], policy: &DecisionPolicy) -> Decision {
    let score = mean_score(scores);
    let prediction = if score > policy.threshold { Label::Real } else { Label::Fake };
    // no evidence means no confidence, whichever policy is active
    let confidence = match (policy.confidence, prediction) {
        _ if scores.is_empty() => 0.0,
        (ConfidencePolicy::MeanScore, _) => score,
        (ConfidencePolicy::LabelProbability, Label::Real) => score,
        (ConfidencePolicy::LabelProbability, Label::Fake) => 1.0 - score,
    };

    Decision {
        score,
        prediction,
        confidence,
        stats: RunStats {
            scored_frames: scores.len(),
            ..RunStats::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(values: &[f64]) -> Vec<FrameScore> {
        values
            .iter()
            .enumerate()
            .map(|(frame_index, &value)| FrameScore { frame_index, value })
            .collect()
    }

    #[test]
    fn test_empty_scores_are_fake_with_zero_confidence() {
        let decision = aggregate(&[], &DecisionPolicy::default());
        assert_eq!(decision.score, 0.0);
        assert_eq!(decision.prediction, Label::Fake);
        assert_eq!(decision.confidence, 0.0);
    }

    #[test]
    fn test_single_high_score_is_real() {
        let decision = aggregate(&scores(&[0.9]), &DecisionPolicy::default());
        assert_eq!(decision.prediction, Label::Real);
        assert_eq!(decision.confidence, 0.9);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let decision = aggregate(&scores(&[0.7]), &DecisionPolicy::default());
        assert_eq!(decision.prediction, Label::Fake);

        let decision = aggregate(&scores(&[0.5, 0.9]), &DecisionPolicy::default());
        assert_eq!(decision.score, 0.7);
        assert_eq!(decision.prediction, Label::Fake);
    }

    #[test]
    fn test_order_insensitive() {
        let policy = DecisionPolicy::default();
        let a = aggregate(&scores(&[0.2, 0.8, 0.95, 0.99]), &policy);
        let b = aggregate(&scores(&[0.99, 0.95, 0.2, 0.8]), &policy);
        assert!((a.score - b.score).abs() < 1e-12);
        assert_eq!(a.prediction, b.prediction);
    }

    #[test]
    fn test_custom_threshold() {
        let policy = DecisionPolicy {
            threshold: 0.5,
            ..DecisionPolicy::default()
        };
        assert_eq!(aggregate(&scores(&[0.6]), &policy).prediction, Label::Real);
    }

    #[test]
    fn test_label_probability_confidence() {
        let policy = DecisionPolicy {
            confidence: ConfidencePolicy::LabelProbability,
            ..DecisionPolicy::default()
        };
        let fake = aggregate(&scores(&[0.25]), &policy);
        assert_eq!(fake.prediction, Label::Fake);
        assert_eq!(fake.confidence, 0.75);

        let real = aggregate(&scores(&[0.8]), &policy);
        assert_eq!(real.confidence, 0.8);

        let empty = aggregate(&[], &policy);
        assert_eq!(empty.score, 0.0);
        assert_eq!(empty.prediction, Label::Fake);
        assert_eq!(empty.confidence, 0.0);
    }

    #[test]
    fn test_decision_json_shape() {
        let decision = aggregate(&scores(&[0.9]), &DecisionPolicy::default());
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["prediction"], "Real");
        assert_eq!(json["score"], 0.9);
        assert_eq!(json["confidence"], 0.9);
        assert_eq!(json["stats"]["scored_frames"], 1);
    }

    #[test]
    fn test_confidence_policy_parse() {
        assert_eq!(ConfidencePolicy::parse("mean-score"), Some(ConfidencePolicy::MeanScore));
        assert_eq!(ConfidencePolicy::parse("label-probability"), Some(ConfidencePolicy::LabelProbability));
        assert_eq!(ConfidencePolicy::parse("vibes"), None);
    }
}
