//! Decision engine: label classifier adapter and real-vs-AI evidence scorer.

pub mod adapter;
pub mod config;
pub mod keywords;
pub mod policy;
pub mod scorer;

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use onnx::{OnnxLabeler, OnnxLabelerConfig, OnnxLoader};

pub use adapter::{ClassifyError, ImageInput, LabelClassifier, LabelModel, LoadState, ModelLoader};
pub use config::{ConfigError, ScorerConfig};
pub use scorer::{Assessment, Basis, EvidenceScorer};
