//! ONNX Runtime image labeler.
//!
//! Runs an image-classification model exported to ONNX (e.g. a ViT or
//! ResNet ImageNet classifier). The model directory must contain
//! `model.onnx` and `labels.txt`, one label per line in class-index order.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};
use verisight_core::LabelPrediction;

use crate::adapter::{ImageInput, LabelModel, ModelLoader};

/// Preprocessing and output settings for [`OnnxLabeler`].
#[derive(Debug, Clone)]
pub struct OnnxLabelerConfig {
    /// Name of the model's image input.
    pub input_name: String,
    /// Square input resolution in pixels.
    pub input_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    /// Number of top labels returned per image.
    pub max_labels: usize,
    /// Larger encoded images are rejected before decoding.
    pub max_image_bytes: usize,
}

impl Default for OnnxLabelerConfig {
    fn default() -> Self {
        Self {
            input_name: "pixel_values".to_string(),
            input_size: 224,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
            max_labels: 10,
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Image labeler backed by ONNX Runtime.
pub struct OnnxLabeler {
    session: Session,
    labels: Vec<String>,
    config: OnnxLabelerConfig,
}

impl OnnxLabeler {
    /// Load a model from a directory containing `model.onnx` and `labels.txt`.
    pub fn load(model_dir: &Path, config: OnnxLabelerConfig) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let labels_path = model_dir.join("labels.txt");

        anyhow::ensure!(model_path.exists(), "model.onnx not found in {model_dir:?}");
        anyhow::ensure!(labels_path.exists(), "labels.txt not found in {model_dir:?}");

        let labels = parse_labels(&std::fs::read_to_string(&labels_path)?);
        anyhow::ensure!(!labels.is_empty(), "labels.txt in {model_dir:?} is empty");

        let session = Session::builder()?.commit_from_file(&model_path)?;

        info!(
            labels = labels.len(),
            input_size = config.input_size,
            model = %model_path.display(),
            "loaded labeling model"
        );
        Ok(Self {
            session,
            labels,
            config,
        })
    }

    /// Number of classes the model distinguishes.
    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }
}

impl LabelModel for OnnxLabeler {
    fn predict(&mut self, image: &ImageInput) -> anyhow::Result<Vec<LabelPrediction>> {
        let bytes = image.to_bytes()?;
        anyhow::ensure!(
            bytes.len() <= self.config.max_image_bytes,
            "image is {} bytes, limit is {}",
            bytes.len(),
            self.config.max_image_bytes
        );

        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| anyhow::anyhow!("decode image: {e}"))?;
        let pixels = to_nchw(&decoded, &self.config);

        let size = self.config.input_size as i64;
        let tensor = Tensor::from_array(([1i64, 3, size, size], pixels.into_boxed_slice()))?;

        let outputs = self
            .session
            .run(ort::inputs![self.config.input_name.as_str() => tensor])?;

        // Logits: [1, num_labels].
        let (_, logits) = outputs[0].try_extract_tensor::<f32>()?;
        anyhow::ensure!(
            logits.len() == self.labels.len(),
            "model produced {} logits for {} labels",
            logits.len(),
            self.labels.len()
        );

        let probs = softmax(logits);
        let predictions = top_labels(&probs, &self.labels, self.config.max_labels);
        debug!(
            top = predictions.first().map(|p| p.label.as_str()).unwrap_or(""),
            "labeled image"
        );
        Ok(predictions)
    }
}

/// Loads an [`OnnxLabeler`] on first use.
#[derive(Debug, Clone)]
pub struct OnnxLoader {
    model_dir: PathBuf,
    config: OnnxLabelerConfig,
}

impl OnnxLoader {
    pub fn new(model_dir: impl Into<PathBuf>, config: OnnxLabelerConfig) -> Self {
        Self {
            model_dir: model_dir.into(),
            config,
        }
    }
}

impl ModelLoader for OnnxLoader {
    type Model = OnnxLabeler;

    fn load(&self) -> anyhow::Result<OnnxLabeler> {
        OnnxLabeler::load(&self.model_dir, self.config.clone())
    }
}

fn parse_labels(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resize to the model resolution and lay out as normalized planar RGB.
fn to_nchw(img: &image::DynamicImage, config: &OnnxLabelerConfig) -> Vec<f32> {
    let size = config.input_size;
    let rgb = img
        .resize_exact(size, size, FilterType::Triangle)
        .to_rgb8();

    let plane = (size * size) as usize;
    let mut out = vec![0.0f32; 3 * plane];
    for (i, pixel) in rgb.pixels().enumerate() {
        for c in 0..3 {
            let v = pixel.0[c] as f32 / 255.0;
            out[c * plane + i] = (v - config.mean[c]) / config.std[c];
        }
    }
    out
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        exps
    }
}

/// The `k` most probable labels, sorted descending.
fn top_labels(probs: &[f32], labels: &[String], k: usize) -> Vec<LabelPrediction> {
    let mut ranked: Vec<(usize, f32)> = probs.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked
        .into_iter()
        .take(k)
        .map(|(i, p)| LabelPrediction::new(labels[i].clone(), (p as f64).clamp(0.0, 1.0)))
        .collect()
}
