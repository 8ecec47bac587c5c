//! Real-vs-AI evidence scorer.
//!
//! Turns the ordered label/score output of a generic image-labeling model
//! into a [`Verdict`]. Two strategies, in strict priority order:
//!
//! 1. **Keywords.** Every label is lower-cased and tested against the AI
//!    and real keyword sets independently. A match adds the prediction's
//!    raw score once to that side; a label may feed both sides.
//! 2. **Fallback.** Only when no label matched at all. The top-K scores
//!    and labels are reduced to [`Signals`] and the first matching rule of
//!    the [`FallbackPolicy`] assigns a fixed score pair.
//!
//! The accumulated mass is normalized to a probability pair (0.5/0.5 when
//! there is none) and the larger side wins, ties going to "real".

use serde::Serialize;
use tracing::debug;
use verisight_core::{
    EvidenceScores, LabelPrediction, ValidationError, Verdict, validate_predictions,
};

use crate::config::{ConfigError, ScorerConfig};
use crate::keywords::KeywordMatcher;
use crate::policy::{FallbackPolicy, Signals};

/// What a verdict was based on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Basis {
    /// At least one label matched a keyword set. `*_matches` are the
    /// contributing labels, `*_keywords` the distinct keywords they hit.
    Keywords {
        ai_matches: Vec<String>,
        real_matches: Vec<String>,
        ai_keywords: Vec<String>,
        real_keywords: Vec<String>,
    },
    /// No keyword matched; a fallback rule decided.
    Rule { name: String, signals: Signals },
    /// No predictions, or no rule applied.
    NoEvidence,
}

/// A verdict together with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub verdict: Verdict,
    pub basis: Basis,
}

/// Stateless decision engine built from a [`ScorerConfig`].
#[derive(Debug, Clone)]
pub struct EvidenceScorer {
    ai_keywords: KeywordMatcher,
    real_keywords: KeywordMatcher,
    artificial_markers: KeywordMatcher,
    natural_markers: KeywordMatcher,
    policy: FallbackPolicy,
    top_k: usize,
    confidence_floor: Option<f64>,
}

impl EvidenceScorer {
    /// Validate `config` and compile its keyword matchers.
    pub fn new(config: &ScorerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            ai_keywords: KeywordMatcher::new(&config.keywords.ai)?,
            real_keywords: KeywordMatcher::new(&config.keywords.real)?,
            artificial_markers: KeywordMatcher::new(&config.markers.artificial)?,
            natural_markers: KeywordMatcher::new(&config.markers.natural)?,
            policy: FallbackPolicy::new(config.rules.clone()),
            top_k: config.top_k,
            confidence_floor: config.confidence_floor,
        })
    }

    /// Score a prediction sequence. Never fails for well-formed input,
    /// including the empty sequence.
    pub fn score(&self, predictions: &[LabelPrediction]) -> Result<Verdict, ValidationError> {
        Ok(self.assess(predictions)?.verdict)
    }

    /// Like [`score`](Self::score), also reporting which stage decided.
    pub fn assess(&self, predictions: &[LabelPrediction]) -> Result<Assessment, ValidationError> {
        validate_predictions(predictions)?;

        let (ai_mass, real_mass, basis) = match self.keyword_stage(predictions) {
            Some(found) => found,
            None => self.fallback_stage(predictions),
        };

        let details = EvidenceScores::normalized(ai_mass, real_mass);
        let verdict = Verdict::from_scores(details, self.confidence_floor);

        debug!(
            prediction = verdict.prediction.as_str(),
            confidence = verdict.confidence,
            ai_score = details.ai_score,
            real_score = details.real_score,
            "scored predictions"
        );

        Ok(Assessment { verdict, basis })
    }

    /// Accumulate keyword evidence. `None` when no label matched either set.
    fn keyword_stage(&self, predictions: &[LabelPrediction]) -> Option<(f64, f64, Basis)> {
        let mut ai_mass = 0.0;
        let mut real_mass = 0.0;
        let mut ai_matches = Vec::new();
        let mut real_matches = Vec::new();
        let mut ai_hits = Vec::new();
        let mut real_hits = Vec::new();

        for p in predictions {
            let label = p.label.to_lowercase();

            let hits = self.ai_keywords.matches(&label);
            if !hits.is_empty() {
                ai_mass += p.score;
                ai_matches.push(p.label.clone());
                extend_unique(&mut ai_hits, hits);
            }

            let hits = self.real_keywords.matches(&label);
            if !hits.is_empty() {
                real_mass += p.score;
                real_matches.push(p.label.clone());
                extend_unique(&mut real_hits, hits);
            }
        }

        if ai_matches.is_empty() && real_matches.is_empty() {
            return None;
        }

        debug!(
            ai_matches = ai_matches.len(),
            real_matches = real_matches.len(),
            ai_mass,
            real_mass,
            "keyword stage matched"
        );
        Some((
            ai_mass,
            real_mass,
            Basis::Keywords {
                ai_matches,
                real_matches,
                ai_keywords: ai_hits,
                real_keywords: real_hits,
            },
        ))
    }

    fn fallback_stage(&self, predictions: &[LabelPrediction]) -> (f64, f64, Basis) {
        let top_k = &predictions[..predictions.len().min(self.top_k)];

        let Some(signals) =
            Signals::measure(top_k, &self.artificial_markers, &self.natural_markers)
        else {
            debug!("no predictions, falling back to even scores");
            return (0.0, 0.0, Basis::NoEvidence);
        };

        match self.policy.decide(&signals) {
            Some(rule) => {
                debug!(
                    rule = %rule.name,
                    top_score = signals.top_score,
                    spread = signals.spread,
                    "fallback rule applied"
                );
                (
                    rule.ai,
                    rule.real,
                    Basis::Rule {
                        name: rule.name.clone(),
                        signals,
                    },
                )
            }
            None => {
                debug!("no fallback rule matched");
                (0.0, 0.0, Basis::NoEvidence)
            }
        }
    }
}

fn extend_unique(seen: &mut Vec<String>, hits: Vec<&str>) {
    for hit in hits {
        if !seen.iter().any(|s| s == hit) {
            seen.push(hit.to_string());
        }
    }
}

impl Default for EvidenceScorer {
    /// Scorer over the built-in configuration.
    fn default() -> Self {
        Self::new(&ScorerConfig::default()).expect("built-in scorer config compiles")
    }
}
