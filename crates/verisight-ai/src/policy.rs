//! Fallback policy table.
//!
//! Used only when no label matched a keyword. Each rule pairs a pure
//! predicate over [`Signals`] with a fixed, unnormalized `(ai, real)` score
//! pair. Rules are evaluated in order and the first one whose condition
//! holds decides.

use serde::{Deserialize, Serialize};
use verisight_core::LabelPrediction;

use crate::keywords::KeywordMatcher;

/// Which marker vocabulary a [`Condition::MarkersOnly`] rule looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerSide {
    Artificial,
    Natural,
}

/// Predicate over the evidence signals of the top-K predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// A single dominant label: high top score and high spread.
    Concentrated { min_top_score: f64, min_spread: f64 },
    /// Scores clustered together.
    Diffuse { max_spread: f64 },
    /// Markers from `side` present in the joined labels, none from the other.
    MarkersOnly { side: MarkerSide },
    Always,
}

impl Condition {
    pub fn holds(&self, signals: &Signals) -> bool {
        match *self {
            Self::Concentrated {
                min_top_score,
                min_spread,
            } => signals.top_score >= min_top_score && signals.spread >= min_spread,
            Self::Diffuse { max_spread } => signals.spread < max_spread,
            Self::MarkersOnly {
                side: MarkerSide::Artificial,
            } => signals.artificial_markers && !signals.natural_markers,
            Self::MarkersOnly {
                side: MarkerSide::Natural,
            } => signals.natural_markers && !signals.artificial_markers,
            Self::Always => true,
        }
    }
}

/// A named rule: condition plus the score pair it assigns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackRule {
    pub name: String,
    pub when: Condition,
    pub ai: f64,
    pub real: f64,
}

/// Signals measured over the top-K predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Signals {
    pub top_score: f64,
    /// Top score minus the mean of the remaining top-K scores (0 if none).
    pub spread: f64,
    pub artificial_markers: bool,
    pub natural_markers: bool,
}

impl Signals {
    /// Measure `top_k`, which must be non-empty and sorted descending.
    pub fn measure(
        top_k: &[LabelPrediction],
        artificial: &KeywordMatcher,
        natural: &KeywordMatcher,
    ) -> Option<Self> {
        let (top, rest) = top_k.split_first()?;

        let runner_up_mean = if rest.is_empty() {
            0.0
        } else {
            rest.iter().map(|p| p.score).sum::<f64>() / rest.len() as f64
        };

        let joined = top_k
            .iter()
            .map(|p| p.label.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        Some(Self {
            top_score: top.score,
            spread: top.score - runner_up_mean,
            artificial_markers: artificial.is_match(&joined),
            natural_markers: natural.is_match(&joined),
        })
    }
}

/// Ordered fallback rule table.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackPolicy {
    rules: Vec<FallbackRule>,
}

impl FallbackPolicy {
    pub fn new(rules: Vec<FallbackRule>) -> Self {
        Self { rules }
    }

    /// First rule whose condition holds, if any.
    pub fn decide(&self, signals: &Signals) -> Option<&FallbackRule> {
        self.rules.iter().find(|r| r.when.holds(signals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScorerConfig;

    fn preds(items: &[(&str, f64)]) -> Vec<LabelPrediction> {
        items
            .iter()
            .map(|&(l, s)| LabelPrediction::new(l, s))
            .collect()
    }

    fn markers() -> (KeywordMatcher, KeywordMatcher) {
        let config = ScorerConfig::default();
        (
            KeywordMatcher::new(&config.markers.artificial).unwrap(),
            KeywordMatcher::new(&config.markers.natural).unwrap(),
        )
    }

    fn signals(top_score: f64, spread: f64, artificial: bool, natural: bool) -> Signals {
        Signals {
            top_score,
            spread,
            artificial_markers: artificial,
            natural_markers: natural,
        }
    }

    fn builtin_policy() -> FallbackPolicy {
        FallbackPolicy::new(ScorerConfig::default().rules)
    }

    #[test]
    fn measure_spread_against_runner_ups() {
        let (a, n) = markers();
        let s = Signals::measure(
            &preds(&[("envelope", 0.85), ("letter", 0.05), ("carton", 0.02)]),
            &a,
            &n,
        )
        .unwrap();
        assert_eq!(s.top_score, 0.85);
        assert!((s.spread - 0.815).abs() < 1e-12);
    }

    #[test]
    fn measure_single_prediction_spread_is_top_score() {
        let (a, n) = markers();
        let s = Signals::measure(&preds(&[("envelope", 0.4)]), &a, &n).unwrap();
        assert_eq!(s.spread, 0.4);
    }

    #[test]
    fn measure_empty_is_none() {
        let (a, n) = markers();
        assert!(Signals::measure(&[], &a, &n).is_none());
    }

    #[test]
    fn measure_markers_over_joined_labels() {
        let (a, n) = markers();
        let s = Signals::measure(&preds(&[("Wallpaper Pattern", 0.3), ("quilt", 0.2)]), &a, &n)
            .unwrap();
        assert!(s.artificial_markers);
        assert!(!s.natural_markers);
    }

    #[test]
    fn concentrated_condition() {
        let c = Condition::Concentrated {
            min_top_score: 0.7,
            min_spread: 0.3,
        };
        assert!(c.holds(&signals(0.85, 0.8, false, false)));
        assert!(!c.holds(&signals(0.6, 0.5, false, false)));
        assert!(!c.holds(&signals(0.75, 0.2, false, false)));
    }

    #[test]
    fn diffuse_condition() {
        let c = Condition::Diffuse { max_spread: 0.1 };
        assert!(c.holds(&signals(0.2, 0.02, false, false)));
        assert!(!c.holds(&signals(0.2, 0.1, false, false)));
    }

    #[test]
    fn markers_only_excludes_mixed() {
        let art = Condition::MarkersOnly {
            side: MarkerSide::Artificial,
        };
        let nat = Condition::MarkersOnly {
            side: MarkerSide::Natural,
        };
        assert!(art.holds(&signals(0.3, 0.2, true, false)));
        assert!(!art.holds(&signals(0.3, 0.2, true, true)));
        assert!(nat.holds(&signals(0.3, 0.2, false, true)));
        assert!(!nat.holds(&signals(0.3, 0.2, false, false)));
    }

    #[test]
    fn builtin_policy_branches() {
        let policy = builtin_policy();
        let name = |s: Signals| policy.decide(&s).map(|r| r.name.clone()).unwrap();

        assert_eq!(name(signals(0.85, 0.8, false, false)), "concentrated");
        assert_eq!(name(signals(0.2, 0.02, false, true)), "diffuse");
        assert_eq!(name(signals(0.4, 0.2, true, false)), "artificial_markers");
        assert_eq!(name(signals(0.4, 0.2, false, true)), "natural_markers");
        assert_eq!(name(signals(0.4, 0.2, true, true)), "default_bias");
        assert_eq!(name(signals(0.4, 0.2, false, false)), "default_bias");
    }

    #[test]
    fn reordering_changes_winner() {
        let mut rules = ScorerConfig::default().rules;
        let bias = rules.pop().unwrap();
        rules.insert(0, bias);
        let policy = FallbackPolicy::new(rules);
        let rule = policy.decide(&signals(0.85, 0.8, false, false)).unwrap();
        assert_eq!(rule.name, "default_bias");
    }

    #[test]
    fn no_matching_rule() {
        let policy = FallbackPolicy::new(vec![FallbackRule {
            name: "diffuse".into(),
            when: Condition::Diffuse { max_spread: 0.1 },
            ai: 0.7,
            real: 0.3,
        }]);
        assert!(policy.decide(&signals(0.9, 0.9, false, false)).is_none());
    }

    #[test]
    fn rule_json_shape() {
        let rule: FallbackRule = serde_json::from_str(
            r#"{"name": "n", "when": {"kind": "markers_only", "side": "natural"}, "ai": 0.3, "real": 0.7}"#,
        )
        .unwrap();
        assert_eq!(
            rule.when,
            Condition::MarkersOnly {
                side: MarkerSide::Natural
            }
        );
    }
}
