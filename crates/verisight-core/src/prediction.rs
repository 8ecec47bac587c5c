//! Label/score pairs emitted by an image-labeling model.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One (label, score) pair for a single image.
///
/// Labels are free text and not guaranteed unique. Scores are model
/// confidences in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelPrediction {
    pub label: String,
    pub score: f64,
}

impl LabelPrediction {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Check that every score is finite, within `[0, 1]`, and that the
/// sequence is sorted by descending score.
pub fn validate_predictions(predictions: &[LabelPrediction]) -> Result<(), ValidationError> {
    for (index, p) in predictions.iter().enumerate() {
        if !p.score.is_finite() {
            return Err(ValidationError::NonFiniteScore {
                index,
                label: p.label.clone(),
                score: p.score,
            });
        }
        if !(0.0..=1.0).contains(&p.score) {
            return Err(ValidationError::ScoreOutOfRange {
                index,
                label: p.label.clone(),
                score: p.score,
            });
        }
    }

    for (i, pair) in predictions.windows(2).enumerate() {
        if pair[0].score < pair[1].score {
            return Err(ValidationError::Unsorted {
                index: i + 1,
                prev: pair[0].score,
                next: pair[1].score,
            });
        }
    }

    Ok(())
}

/// Sort predictions by descending score. Stable, so equal scores keep
/// model order.
pub fn sort_descending(predictions: &mut [LabelPrediction]) {
    predictions.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}
