//! Label classifier adapter.
//!
//! Wraps an image-labeling model behind one async call,
//! [`LabelClassifier::classify`]. The classifier owns the model and its
//! load state:
//!
//! ```text
//! Unloaded ──▶ Loading ──▶ Ready
//!                 │
//!                 └──────▶ Failed ──(retry_load)──▶ Unloaded
//! ```
//!
//! The model loads at most once per classifier and is reused for every
//! call. A failed load is sticky until [`LabelClassifier::retry_load`].
//! Loading and inference run on tokio's blocking pool. Only one request may
//! be in flight; an overlapping request is rejected with
//! [`ClassifyError::Busy`].

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use verisight_core::{LabelPrediction, sort_descending, validate_predictions};

/// A single image, in whatever form the wrapped model accepts.
#[derive(Debug, Clone)]
pub enum ImageInput {
    /// Encoded image bytes (PNG, JPEG, WebP, ...).
    Bytes(Vec<u8>),
    /// `data:<mime>;base64,<payload>` URL.
    DataUrl(String),
    Path(PathBuf),
}

impl ImageInput {
    /// Resolve to encoded image bytes. Reads from disk for [`ImageInput::Path`].
    pub fn to_bytes(&self) -> anyhow::Result<Cow<'_, [u8]>> {
        match self {
            Self::Bytes(bytes) => Ok(Cow::Borrowed(bytes)),
            Self::DataUrl(url) => decode_data_url(url).map(Cow::Owned),
            Self::Path(path) => std::fs::read(path)
                .map(Cow::Owned)
                .map_err(|e| anyhow::anyhow!("read {}: {e}", path.display())),
        }
    }
}

fn decode_data_url(url: &str) -> anyhow::Result<Vec<u8>> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| anyhow::anyhow!("not a data URL"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| anyhow::anyhow!("data URL has no payload"))?;
    anyhow::ensure!(
        meta.ends_with(";base64"),
        "only base64 data URLs are supported"
    );
    BASE64
        .decode(payload.trim())
        .map_err(|e| anyhow::anyhow!("decode data URL payload: {e}"))
}

/// The wrapped image-labeling model.
///
/// Implementations return (label, score) pairs for one image; the
/// classifier sorts and validates them.
pub trait LabelModel: Send + 'static {
    fn predict(&mut self, image: &ImageInput) -> anyhow::Result<Vec<LabelPrediction>>;
}

/// Builds a [`LabelModel`]. Called at most once per successful load.
pub trait ModelLoader: Send + Sync + 'static {
    type Model: LabelModel;

    fn load(&self) -> anyhow::Result<Self::Model>;
}

impl<F, M> ModelLoader for F
where
    F: Fn() -> anyhow::Result<M> + Send + Sync + 'static,
    M: LabelModel,
{
    type Model = M;

    fn load(&self) -> anyhow::Result<M> {
        self()
    }
}

/// Lifecycle of the wrapped model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Ready,
    /// Load failed; classification stays disabled until an explicit retry.
    Failed(String),
}

impl LoadState {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("label model unavailable: {0}")]
    ModelLoad(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("a classification request is already in flight")]
    Busy,
}

type SharedModel<M> = Arc<StdMutex<M>>;

/// Owns one label model and serializes access to it.
pub struct LabelClassifier<L: ModelLoader> {
    loader: Arc<L>,
    slot: Mutex<Option<SharedModel<L::Model>>>,
    state: watch::Sender<LoadState>,
}

impl<L: ModelLoader> LabelClassifier<L> {
    pub fn new(loader: L) -> Self {
        let (state, _) = watch::channel(LoadState::Unloaded);
        Self {
            loader: Arc::new(loader),
            slot: Mutex::new(None),
            state,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state.borrow().clone()
    }

    /// Watch load state changes, e.g. to disable an "analyze" action while
    /// the model is `Failed`.
    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.state.subscribe()
    }

    /// Load the model now instead of on the first `classify`.
    pub async fn load(&self) -> Result<(), ClassifyError> {
        let mut slot = self.slot.lock().await;
        self.ensure_loaded(&mut slot).await.map(|_| ())
    }

    /// Leave the `Failed` state and attempt another load.
    pub async fn retry_load(&self) -> Result<(), ClassifyError> {
        let mut slot = self.slot.lock().await;
        if self.state.borrow().is_failed() {
            info!("retrying label model load");
            self.state.send_replace(LoadState::Unloaded);
        }
        self.ensure_loaded(&mut slot).await.map(|_| ())
    }

    /// Label one image. Predictions come back sorted by descending score.
    ///
    /// Dropping the returned future discards the result; the model stays
    /// owned by the classifier.
    pub async fn classify(
        &self,
        image: ImageInput,
    ) -> Result<Vec<LabelPrediction>, ClassifyError> {
        let Ok(mut slot) = self.slot.try_lock() else {
            warn!("rejecting classification: another request is in flight");
            return Err(ClassifyError::Busy);
        };
        let model = self.ensure_loaded(&mut slot).await?;

        let joined = tokio::task::spawn_blocking(move || {
            // A panic in an earlier `predict` leaves the model usable.
            let mut model = model.lock().unwrap_or_else(PoisonError::into_inner);
            model.predict(&image)
        })
        .await;

        let mut predictions = match joined {
            Ok(Ok(predictions)) => predictions,
            Ok(Err(e)) => {
                let reason = format!("{e:#}");
                warn!(reason = %reason, "inference failed");
                return Err(ClassifyError::Inference(reason));
            }
            Err(e) => {
                warn!(error = %e, "inference task aborted");
                return Err(ClassifyError::Inference(format!("inference task: {e}")));
            }
        };

        sort_descending(&mut predictions);
        validate_predictions(&predictions)
            .map_err(|e| ClassifyError::Inference(format!("model output: {e}")))?;

        debug!(count = predictions.len(), "classified image");
        Ok(predictions)
    }

    async fn ensure_loaded(
        &self,
        slot: &mut Option<SharedModel<L::Model>>,
    ) -> Result<SharedModel<L::Model>, ClassifyError> {
        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }

        let failed = match &*self.state.borrow() {
            LoadState::Failed(reason) => Some(reason.clone()),
            _ => None,
        };
        if let Some(reason) = failed {
            return Err(ClassifyError::ModelLoad(reason));
        }

        self.state.send_replace(LoadState::Loading);
        info!("loading label model");

        let loader = Arc::clone(&self.loader);
        let reason = match tokio::task::spawn_blocking(move || loader.load()).await {
            Ok(Ok(model)) => {
                let model = Arc::new(StdMutex::new(model));
                *slot = Some(Arc::clone(&model));
                self.state.send_replace(LoadState::Ready);
                info!("label model ready");
                return Ok(model);
            }
            Ok(Err(e)) => format!("{e:#}"),
            Err(e) => format!("model load task: {e}"),
        };

        warn!(reason = %reason, "label model failed to load");
        self.state.send_replace(LoadState::Failed(reason.clone()));
        Err(ClassifyError::ModelLoad(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    /// Returns a fixed prediction list, optionally failing first.
    struct FixedModel {
        predictions: Vec<LabelPrediction>,
        fail_next: bool,
    }

    impl LabelModel for FixedModel {
        fn predict(&mut self, _image: &ImageInput) -> anyhow::Result<Vec<LabelPrediction>> {
            if std::mem::take(&mut self.fail_next) {
                anyhow::bail!("out of memory");
            }
            Ok(self.predictions.clone())
        }
    }

    fn fixed(items: &[(&str, f64)]) -> FixedModel {
        FixedModel {
            predictions: items
                .iter()
                .map(|&(l, s)| LabelPrediction::new(l, s))
                .collect(),
            fail_next: false,
        }
    }

    fn image() -> ImageInput {
        ImageInput::Bytes(vec![0x89, b'P', b'N', b'G'])
    }

    #[tokio::test]
    async fn loads_lazily_and_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let classifier = LabelClassifier::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(fixed(&[("sky", 0.7)]))
        });

        assert_eq!(classifier.state(), LoadState::Unloaded);
        assert_eq!(loads.load(Ordering::SeqCst), 0);

        classifier.classify(image()).await.unwrap();
        classifier.classify(image()).await.unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(classifier.state(), LoadState::Ready);
    }

    #[tokio::test]
    async fn eager_load() {
        let classifier = LabelClassifier::new(|| Ok(fixed(&[])));
        classifier.load().await.unwrap();
        assert_eq!(classifier.state(), LoadState::Ready);
        assert!(classifier.classify(image()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sorts_model_output() {
        let classifier = LabelClassifier::new(|| {
            Ok(fixed(&[("tree", 0.1), ("sky", 0.6), ("water", 0.3)]))
        });
        let preds = classifier.classify(image()).await.unwrap();
        let labels: Vec<&str> = preds.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["sky", "water", "tree"]);
    }

    #[tokio::test]
    async fn load_failure_is_sticky_until_retry() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let classifier = LabelClassifier::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("model.onnx is corrupt");
            }
            Ok(fixed(&[("sky", 0.7)]))
        });

        let err = classifier.classify(image()).await.unwrap_err();
        assert!(matches!(err, ClassifyError::ModelLoad(ref r) if r.contains("corrupt")));
        assert!(classifier.state().is_failed());

        // No automatic retry.
        let err = classifier.classify(image()).await.unwrap_err();
        assert!(matches!(err, ClassifyError::ModelLoad(_)));
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        classifier.retry_load().await.unwrap();
        assert_eq!(classifier.state(), LoadState::Ready);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(classifier.classify(image()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn inference_failure_keeps_model_ready() {
        let classifier = LabelClassifier::new(|| {
            let mut model = fixed(&[("sky", 0.7)]);
            model.fail_next = true;
            Ok(model)
        });

        let err = classifier.classify(image()).await.unwrap_err();
        assert!(matches!(err, ClassifyError::Inference(ref r) if r.contains("out of memory")));
        assert_eq!(classifier.state(), LoadState::Ready);

        // Same image again succeeds.
        assert_eq!(classifier.classify(image()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_model_output_is_inference_error() {
        let classifier = LabelClassifier::new(|| Ok(fixed(&[("sky", f64::NAN)])));
        let err = classifier.classify(image()).await.unwrap_err();
        assert!(matches!(err, ClassifyError::Inference(_)));
        assert_eq!(classifier.state(), LoadState::Ready);
    }

    /// Panics on its first call.
    struct PanicOnce {
        panicked: bool,
    }

    impl LabelModel for PanicOnce {
        fn predict(&mut self, _image: &ImageInput) -> anyhow::Result<Vec<LabelPrediction>> {
            if !std::mem::replace(&mut self.panicked, true) {
                panic!("model crashed");
            }
            Ok(vec![LabelPrediction::new("sky", 0.9)])
        }
    }

    #[tokio::test]
    async fn panic_in_predict_does_not_disable_model() {
        let classifier = LabelClassifier::new(|| Ok(PanicOnce { panicked: false }));

        let err = classifier.classify(image()).await.unwrap_err();
        assert!(matches!(err, ClassifyError::Inference(_)));
        assert_eq!(classifier.state(), LoadState::Ready);

        let preds = classifier.classify(image()).await.unwrap();
        assert_eq!(preds[0].label, "sky");
        assert_eq!(classifier.state(), LoadState::Ready);
    }

    /// Blocks inside `predict` until released.
    struct GatedModel {
        started: tokio::sync::mpsc::UnboundedSender<()>,
        release: mpsc::Receiver<()>,
    }

    impl LabelModel for GatedModel {
        fn predict(&mut self, _image: &ImageInput) -> anyhow::Result<Vec<LabelPrediction>> {
            let _ = self.started.send(());
            self.release.recv()?;
            Ok(vec![LabelPrediction::new("sky", 0.9)])
        }
    }

    #[tokio::test]
    async fn overlapping_request_is_rejected() {
        let (started_tx, mut started_rx) = tokio::sync::mpsc::unbounded_channel();
        let (release_tx, release_rx) = mpsc::channel();
        let gated = StdMutex::new(Some(GatedModel {
            started: started_tx,
            release: release_rx,
        }));
        let classifier = Arc::new(LabelClassifier::new(move || {
            gated
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| anyhow::anyhow!("already loaded"))
        }));

        let first = tokio::spawn({
            let classifier = Arc::clone(&classifier);
            async move { classifier.classify(image()).await }
        });
        started_rx.recv().await.unwrap();

        let err = classifier.classify(image()).await.unwrap_err();
        assert!(matches!(err, ClassifyError::Busy));

        release_tx.send(()).unwrap();
        let preds = first.await.unwrap().unwrap();
        assert_eq!(preds[0].label, "sky");
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let classifier = LabelClassifier::new(|| -> anyhow::Result<FixedModel> {
            anyhow::bail!("missing model.onnx")
        });
        let mut rx = classifier.subscribe();
        assert_eq!(*rx.borrow(), LoadState::Unloaded);

        let _ = classifier.load().await;
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_failed());
    }

    #[test]
    fn data_url_decodes() {
        let input = ImageInput::DataUrl("data:image/png;base64,iVBORw==".into());
        assert_eq!(&*input.to_bytes().unwrap(), &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn rejects_non_base64_data_url() {
        let input = ImageInput::DataUrl("data:text/plain,hello".into());
        assert!(input.to_bytes().is_err());
        let input = ImageInput::DataUrl("https://example.com/cat.png".into());
        assert!(input.to_bytes().is_err());
    }

    #[test]
    fn missing_path_names_file() {
        let input = ImageInput::Path(PathBuf::from("/nonexistent/cat.png"));
        let err = input.to_bytes().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/cat.png"));
    }
}
