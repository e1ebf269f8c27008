//! The analyzer seam shared by both features.
//!
//! A session only knows it holds an [`Analyzer`]; whether results come from
//! the random steganalysis mock or from a remote classifier is invisible to
//! it. Real implementations can replace either without touching callers.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::TruthResult;
use crate::models::{DeepfakeResult, StegoResult};
use crate::upload::ImageUpload;

/// Turns an uploaded image into a result.
pub trait Analyzer: Send + Sync + 'static {
    type Output: Verdict + Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Short name used in log lines
    fn name(&self) -> &str;

    /// Analyze `upload`. May take arbitrarily long.
    fn analyze(&self, upload: &ImageUpload) -> impl Future<Output = TruthResult<Self::Output>> + Send;
}

/// How a result is announced once an analysis completes.
pub trait Verdict {
    /// Whether the result flags the image (hidden data found, AI generated)
    fn is_flagged(&self) -> bool;

    /// One-line description for the completion notification
    fn summary(&self) -> &'static str;
}

impl Verdict for StegoResult {
    fn is_flagged(&self) -> bool {
        self.has_hidden_data()
    }

    fn summary(&self) -> &'static str {
        if self.has_hidden_data() {
            "Suspicious content detected in this image."
        } else {
            "No hidden data detected in this image."
        }
    }
}

impl Verdict for DeepfakeResult {
    fn is_flagged(&self) -> bool {
        self.is_ai_generated
    }

    fn summary(&self) -> &'static str {
        if self.is_ai_generated {
            "This image appears to be AI-generated or manipulated."
        } else {
            "This image appears to be authentic."
        }
    }
}

/// Artificial processing delay, sampled uniformly in whole milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedLatency {
    min: Duration,
    max: Duration,
}

impl SimulatedLatency {
    /// Delay between `a` and `b` inclusive, in either order
    pub fn between(a: Duration, b: Duration) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self::between(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    /// No delay at all
    pub fn none() -> Self {
        Self::between(Duration::ZERO, Duration::ZERO)
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        Duration::from_millis(rng.gen_range(min_ms..=max_ms))
    }
}
