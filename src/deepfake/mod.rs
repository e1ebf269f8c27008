//! Deepfake Detection Module
//!
//! Classifies whether an image is AI generated using a pre-trained image
//! classification model:
//! - `loader`: memoized, shared model handle with retry after failure
//! - `remote`: Hugging Face hub loader and inference client
//! - `detector`: verdict interpretation and the fallback path

pub mod detector;
pub mod loader;
pub mod remote;

pub use detector::{DeepfakeDetector, DETECTOR_MODEL_NAME, FALLBACK_MODEL_NAME};
pub use loader::{Classifier, ClassifierService, LoaderStatus, ModelLoader};
pub use remote::{HubConfig, HubModelLoader};
