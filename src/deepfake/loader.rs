//! Lazily loaded, shared classifier handle
//!
//! `ClassifierService` owns one model loader and hands every caller the
//! same classifier once it is loaded. Callers arriving while a load is in
//! flight wait for that load instead of starting another. A failed load is
//! reported to everyone who waited on it and is not cached: the next call
//! loads again.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::errors::ModelError;
use crate::models::ClassScore;
use crate::upload::ImageUpload;

/// Boxed `Send` future, for the object-safe traits below
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A loaded image-classification model.
pub trait Classifier: Send + Sync {
    /// Label/score pairs in the order the model returns them
    fn classify<'a>(&'a self, image: &'a ImageUpload) -> BoxFuture<'a, Result<Vec<ClassScore>, ModelError>>;
}

/// Something that can produce a [`Classifier`], typically slowly.
pub trait ModelLoader: Send + Sync + 'static {
    fn model_id(&self) -> &str;

    fn load(&self) -> BoxFuture<'_, Result<Arc<dyn Classifier>, ModelError>>;
}

type LoadOutcome = Result<Arc<dyn Classifier>, ModelError>;

enum LoaderState {
    Unloaded,
    Loading(watch::Receiver<Option<LoadOutcome>>),
    Ready(Arc<dyn Classifier>),
    Failed(ModelError),
}

/// Observable lifecycle of a [`ClassifierService`]
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderStatus {
    Unloaded,
    Loading,
    Ready,
    Failed(ModelError),
}

impl std::fmt::Display for LoaderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderStatus::Unloaded => write!(f, "unloaded"),
            LoaderStatus::Loading => write!(f, "loading"),
            LoaderStatus::Ready => write!(f, "ready"),
            LoaderStatus::Failed(e) => write!(f, "failed ({})", e),
        }
    }
}

/// Memoizing owner of a model loader.
pub struct ClassifierService {
    loader: Arc<dyn ModelLoader>,
    state: Arc<Mutex<LoaderState>>,
    load_attempts: AtomicUsize,
}

impl ClassifierService {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            state: Arc::new(Mutex::new(LoaderState::Unloaded)),
            load_attempts: AtomicUsize::new(0),
        }
    }

    pub fn model_id(&self) -> &str {
        self.loader.model_id()
    }

    pub fn status(&self) -> LoaderStatus {
        match &*self.state.lock() {
            LoaderState::Unloaded => LoaderStatus::Unloaded,
            LoaderState::Loading(_) => LoaderStatus::Loading,
            LoaderState::Ready(_) => LoaderStatus::Ready,
            LoaderState::Failed(e) => LoaderStatus::Failed(e.clone()),
        }
    }

    /// Number of times the underlying loader has been invoked
    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::Relaxed)
    }

    /// The shared classifier, loading it first if needed.
    ///
    /// Must be called from within a tokio runtime: the load itself runs on
    /// a spawned task so that a caller giving up does not abort it for the
    /// others.
    pub async fn get_classifier(&self) -> Result<Arc<dyn Classifier>, ModelError> {
        let mut receiver = {
            let mut state = self.state.lock();
            let in_flight = match &*state {
                LoaderState::Ready(classifier) => return Ok(Arc::clone(classifier)),
                // A closed channel means the load task died without settling
                LoaderState::Loading(receiver) if receiver.has_changed().is_ok() => Some(receiver.clone()),
                _ => None,
            };
            match in_flight {
                Some(receiver) => receiver,
                None => {
                    let receiver = self.spawn_load();
                    *state = LoaderState::Loading(receiver.clone());
                    receiver
                }
            }
        };

        let settled = receiver
            .wait_for(Option::is_some)
            .await
            .map(|outcome| (*outcome).clone());

        match settled {
            Ok(Some(outcome)) => outcome,
            _ => Err(ModelError::Load {
                model_id: self.loader.model_id().to_string(),
                message: "model loader stopped before finishing".to_string(),
            }),
        }
    }

    /// Forget a loaded classifier that turned out to be unusable, so the
    /// next call loads again. A load in flight is left alone.
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        if matches!(*state, LoaderState::Ready(_)) {
            log::info!("Discarding model '{}'", self.loader.model_id());
            *state = LoaderState::Unloaded;
        }
    }

    fn spawn_load(&self) -> watch::Receiver<Option<LoadOutcome>> {
        let (sender, receiver) = watch::channel(None);
        let loader = Arc::clone(&self.loader);
        let state = Arc::clone(&self.state);
        let attempt = self.load_attempts.fetch_add(1, Ordering::Relaxed) + 1;

        log::info!("Loading model '{}' (attempt {})", loader.model_id(), attempt);

        tokio::spawn(async move {
            let outcome = loader.load().await;

            *state.lock() = match &outcome {
                Ok(classifier) => {
                    log::info!("Model '{}' ready", loader.model_id());
                    LoaderState::Ready(Arc::clone(classifier))
                }
                Err(e) => {
                    log::error!("Error loading model: {}", e);
                    LoaderState::Failed(e.clone())
                }
            };

            // Nobody waiting is fine
            let _ = sender.send(Some(outcome));
        });

        receiver
    }
}
