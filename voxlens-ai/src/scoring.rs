//! Feature scoring interface
//!
//! Numeric scores derived from acoustic features are embedded in stage
//! prompts as anchors for the model. The scoring model itself belongs to the
//! feature-extraction side; [`BaselineScorer`] is a simple heuristic used when
//! no other scorer is supplied.

use crate::types::AudioFeatures;

/// Score used when the relevant measurements are absent
pub const NEUTRAL_SCORE: u8 = 50;

/// Derives 0-100 scores from acoustic features
pub trait FeatureScorer: Send + Sync {
    /// Delivery score (pace and pausing)
    fn communication_score(&self, features: &AudioFeatures) -> u8;

    /// Vocal confidence score (energy, pitch movement, hesitation)
    fn confidence_score(&self, features: &AudioFeatures) -> u8;
}

/// Heuristic scorer: penalises distance from conversational norms
#[derive(Debug, Clone)]
pub struct BaselineScorer {
    /// Comfortable speech rate range (words per minute)
    pub speech_rate_range: (f64, f64),
    /// Comfortable pause ratio range
    pub pause_ratio_range: (f64, f64),
}

impl Default for BaselineScorer {
    fn default() -> Self {
        Self {
            speech_rate_range: (120.0, 160.0),
            pause_ratio_range: (0.10, 0.25),
        }
    }
}

impl BaselineScorer {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Distance of `value` outside `[low, high]` (0 inside the range)
fn outside(value: f64, (low, high): (f64, f64)) -> f64 {
    if value < low {
        low - value
    } else if value > high {
        value - high
    } else {
        0.0
    }
}

fn to_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

impl FeatureScorer for BaselineScorer {
    fn communication_score(&self, features: &AudioFeatures) -> u8 {
        let rate = features.number(AudioFeatures::SPEECH_RATE);
        let pauses = features.number(AudioFeatures::PAUSE_RATIO);
        if rate.is_none() && pauses.is_none() {
            return NEUTRAL_SCORE;
        }

        let rate_penalty = rate
            .map(|r| (outside(r, self.speech_rate_range) * 0.5).min(40.0))
            .unwrap_or(0.0);
        let pause_penalty = pauses
            .map(|p| (outside(p, self.pause_ratio_range) * 100.0).min(30.0))
            .unwrap_or(0.0);

        to_score(100.0 - rate_penalty - pause_penalty)
    }

    fn confidence_score(&self, features: &AudioFeatures) -> u8 {
        let energy = features.category(AudioFeatures::ENERGY_LEVEL);
        let pitch = features.number(AudioFeatures::PITCH_VARIANCE);
        let pauses = features.number(AudioFeatures::PAUSE_RATIO);
        if energy.is_none() && pitch.is_none() && pauses.is_none() {
            return NEUTRAL_SCORE;
        }

        let energy_points = match energy.as_deref() {
            Some("high") => 40.0,
            Some("medium") => 30.0,
            Some("low") => 10.0,
            _ => 20.0,
        };
        // Monotone delivery reads as hesitant; very erratic pitch reads as nervous
        let pitch_points = match pitch {
            Some(v) if v < 5.0 => 15.0,
            Some(v) if v > 60.0 => 20.0,
            Some(_) => 30.0,
            None => 20.0,
        };
        let pause_points = pauses
            .map(|p| 30.0 - (outside(p, self.pause_ratio_range) * 100.0).min(30.0))
            .unwrap_or(20.0);

        to_score(energy_points + pitch_points + pause_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn features(value: serde_json::Value) -> AudioFeatures {
        match value {
            serde_json::Value::Object(map) => AudioFeatures::new(map),
            _ => AudioFeatures::default(),
        }
    }

    #[test]
    fn test_empty_features_are_neutral() {
        let scorer = BaselineScorer::new();
        assert_eq!(scorer.communication_score(&AudioFeatures::default()), NEUTRAL_SCORE);
        assert_eq!(scorer.confidence_score(&AudioFeatures::default()), NEUTRAL_SCORE);
    }

    #[test]
    fn test_comfortable_delivery_scores_full() {
        let scorer = BaselineScorer::new();
        let f = features(json!({"speech_rate": 140, "pause_ratio": 0.15}));
        assert_eq!(scorer.communication_score(&f), 100);
    }

    #[test]
    fn test_fast_speech_is_penalised_but_bounded() {
        let scorer = BaselineScorer::new();
        let f = features(json!({"speech_rate": 400, "pause_ratio": 0.9}));
        assert_eq!(scorer.communication_score(&f), 30);
    }

    #[test]
    fn test_confident_delivery() {
        let scorer = BaselineScorer::new();
        let f = features(json!({"energy_level": "High", "pitch_variance": 25.0, "pause_ratio": 0.2}));
        assert_eq!(scorer.confidence_score(&f), 100);

        let f = features(json!({"energy_level": "low", "pitch_variance": 2.0, "pause_ratio": 0.6}));
        assert_eq!(scorer.confidence_score(&f), 25);
    }
}
