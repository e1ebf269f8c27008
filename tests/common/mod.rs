//! Shared test utilities for integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pixel_truth::deepfake::loader::{BoxFuture, Classifier, ModelLoader};
use pixel_truth::errors::ModelError;
use pixel_truth::upload::ImageUpload;
use pixel_truth::{Analyzer, StegoResult, TruthResult};

/// Analyzer that always reports the same scores after `delay`
pub struct FixedStegoAnalyzer {
    pub lsb: u8,
    pub dct: u8,
    pub confidence: u8,
    pub delay: Duration,
}

impl FixedStegoAnalyzer {
    pub fn new(lsb: u8, dct: u8) -> Self {
        Self {
            lsb,
            dct,
            confidence: 85,
            delay: Duration::ZERO,
        }
    }
}

impl Analyzer for FixedStegoAnalyzer {
    type Output = StegoResult;

    fn name(&self) -> &str {
        "fixed-steganalysis"
    }

    async fn analyze(&self, _upload: &ImageUpload) -> TruthResult<StegoResult> {
        tokio::time::sleep(self.delay).await;
        Ok(StegoResult::from_scores(self.lsb, self.dct, self.confidence))
    }
}

/// Model loader whose every load fails, like an unreachable hub
#[derive(Default)]
pub struct UnreachableLoader {
    pub attempts: AtomicUsize,
}

impl ModelLoader for UnreachableLoader {
    fn model_id(&self) -> &str {
        "test/unreachable"
    }

    fn load(&self) -> BoxFuture<'_, Result<Arc<dyn Classifier>, ModelError>> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(ModelError::Load {
                model_id: "test/unreachable".to_string(),
                message: "connection refused".to_string(),
            })
        })
    }
}

/// Write a JPEG-looking file of exactly `size` bytes
pub fn write_jpeg(dir: &Path, name: &str, size: usize) -> PathBuf {
    let mut bytes = vec![0u8; size];
    bytes[..4].copy_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("Failed to write test image");
    path
}

pub fn small_png(name: &str) -> ImageUpload {
    ImageUpload::from_bytes(name, "image/png", vec![0x89u8, b'P', b'N', b'G']).expect("valid test upload")
}
