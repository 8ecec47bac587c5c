pub mod error;
pub mod prediction;
pub mod verdict;

pub use error::ValidationError;
pub use prediction::{LabelPrediction, sort_descending, validate_predictions};
pub use verdict::{ConfidenceBand, EvidenceScores, Prediction, Verdict};
