use thiserror::Error;

/// Malformed prediction input handed to the scorer.
///
/// A conforming label model never produces these; they indicate a bug in
/// the adapter or in hand-built input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("prediction {index} ({label:?}) has non-finite score {score}")]
    NonFiniteScore {
        index: usize,
        label: String,
        score: f64,
    },

    #[error("prediction {index} ({label:?}) has score {score} outside [0, 1]")]
    ScoreOutOfRange {
        index: usize,
        label: String,
        score: f64,
    },

    #[error("predictions not sorted by descending score at index {index} ({prev} < {next})")]
    Unsorted { index: usize, prev: f64, next: f64 },
}
