//! Analysis pipeline: image → label model → scorer → report.

use std::io::Read;
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use verisight_ai::{
    Assessment, EvidenceScorer, ImageInput, LabelClassifier, OnnxLabelerConfig, OnnxLoader,
    ScorerConfig,
};
use verisight_core::{LabelPrediction, sort_descending};

/// Upload limit applied before the model sees the file.
const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;
const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Everything shown for one analyzed input.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub source: String,
    pub analyzed_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub labels: Vec<LabelPrediction>,
    #[serde(flatten)]
    pub assessment: Assessment,
}

/// Label `image` with the model in `model_dir` and score the result.
pub async fn analyze_image(
    image: &Path,
    model_dir: &Path,
    config: &ScorerConfig,
) -> anyhow::Result<Report> {
    let start = Instant::now();
    check_image(image)?;

    let scorer = EvidenceScorer::new(config).context("building scorer")?;
    let classifier =
        LabelClassifier::new(OnnxLoader::new(model_dir, OnnxLabelerConfig::default()));

    eprintln!("  Loading model from {}", model_dir.display());
    classifier.load().await.context("loading label model")?;

    let labels = classifier
        .classify(ImageInput::Path(image.to_path_buf()))
        .await
        .with_context(|| format!("classifying {}", image.display()))?;

    let mut report = score_predictions(&scorer, image.display().to_string(), labels)?;
    report.elapsed_secs = start.elapsed().as_secs_f64();
    Ok(report)
}

/// Score an already-labeled input.
pub fn score_predictions(
    scorer: &EvidenceScorer,
    source: String,
    labels: Vec<LabelPrediction>,
) -> anyhow::Result<Report> {
    let start = Instant::now();
    let assessment = scorer.assess(&labels).context("scoring predictions")?;
    Ok(Report {
        source,
        analyzed_at: Utc::now(),
        elapsed_secs: start.elapsed().as_secs_f64(),
        labels,
        assessment,
    })
}

/// Read a JSON predictions array from `path`, or stdin for `-`.
pub fn read_predictions(path: &Path) -> anyhow::Result<Vec<LabelPrediction>> {
    let json = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading predictions from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading predictions {}", path.display()))?
    };
    parse_predictions(&json)
}

fn parse_predictions(json: &str) -> anyhow::Result<Vec<LabelPrediction>> {
    let mut labels: Vec<LabelPrediction> =
        serde_json::from_str(json).context("parsing predictions JSON")?;
    sort_descending(&mut labels);
    Ok(labels)
}

fn check_image(path: &Path) -> anyhow::Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    anyhow::ensure!(
        SUPPORTED_EXTENSIONS.contains(&ext.as_str()),
        "unsupported image type {:?}, expected JPG, PNG or WebP",
        path.display().to_string()
    );

    let meta = std::fs::metadata(path).with_context(|| format!("reading {}", path.display()))?;
    anyhow::ensure!(
        meta.len() <= MAX_IMAGE_BYTES,
        "{} is {} bytes, limit is 10 MB",
        path.display(),
        meta.len()
    );
    Ok(())
}
