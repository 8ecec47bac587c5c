//! Normalized evidence scores and the final real-vs-AI verdict.
//!
//! The serialized [`Verdict`] shape is the only contract with rendering
//! code: `{ prediction, confidence, details: { realScore, aiScore } }`,
//! plus the optionally floored `displayConfidence`.

use serde::{Deserialize, Serialize};

/// Binary outcome of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prediction {
    Real,
    Ai,
}

impl Prediction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Real => "real",
            Self::Ai => "ai",
        }
    }
}

/// Evidence mass attributed to each side.
///
/// Built through [`EvidenceScores::normalized`], so `ai_score + real_score`
/// is 1 for nonzero mass and both are 0.5 when there is no evidence at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceScores {
    pub ai_score: f64,
    pub real_score: f64,
}

impl EvidenceScores {
    /// Turn raw accumulated mass into a probability pair.
    ///
    /// Zero total mass yields 0.5/0.5 (maximal uncertainty).
    pub fn normalized(ai_mass: f64, real_mass: f64) -> Self {
        let total = ai_mass + real_mass;
        if total > 0.0 {
            Self {
                ai_score: ai_mass / total,
                real_score: real_mass / total,
            }
        } else {
            Self {
                ai_score: 0.5,
                real_score: 0.5,
            }
        }
    }
}

/// Confidence band used to phrase a verdict for humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    /// Confidence above 0.9.
    High,
    /// Confidence above 0.7.
    Moderate,
    Low,
}

impl ConfidenceBand {
    pub fn of(confidence: f64) -> Self {
        if confidence > 0.9 {
            Self::High
        } else if confidence > 0.7 {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
        }
    }
}

/// Final result of scoring one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub prediction: Prediction,
    /// `max(ai_score, real_score)`, never floored.
    pub confidence: f64,
    pub details: EvidenceScores,
    /// Confidence for display, raised to the configured floor if any.
    pub display_confidence: f64,
}

impl Verdict {
    /// Select the side with the larger score. Equal scores resolve to
    /// [`Prediction::Real`].
    pub fn from_scores(details: EvidenceScores, confidence_floor: Option<f64>) -> Self {
        let prediction = if details.ai_score > details.real_score {
            Prediction::Ai
        } else {
            Prediction::Real
        };
        let confidence = details.ai_score.max(details.real_score);
        let display_confidence = match confidence_floor {
            Some(floor) => confidence.max(floor),
            None => confidence,
        };
        Self {
            prediction,
            confidence,
            details,
            display_confidence,
        }
    }

    pub fn band(&self) -> ConfidenceBand {
        ConfidenceBand::of(self.confidence)
    }

    /// One-sentence explanation of the verdict for end users.
    pub fn summary(&self) -> &'static str {
        match (self.prediction, self.band()) {
            (Prediction::Real, ConfidenceBand::High) => {
                "This image appears to be a genuine photograph with high confidence."
            }
            (Prediction::Real, ConfidenceBand::Moderate) => {
                "This image appears to be a real photograph, though there are some ambiguous elements."
            }
            (Prediction::Real, ConfidenceBand::Low) => {
                "This image appears to be a real photograph, but our confidence is low."
            }
            (Prediction::Ai, ConfidenceBand::High) => {
                "This image shows strong indicators of AI generation."
            }
            (Prediction::Ai, ConfidenceBand::Moderate) => {
                "This image appears to be AI-generated, though some elements look realistic."
            }
            (Prediction::Ai, ConfidenceBand::Low) => {
                "This image shows some signs of AI generation, but our confidence is low."
            }
        }
    }
}
