//! Steganalysis Module
//!
//! Reports whether an image likely carries hidden data, scored on two axes:
//! - LSB (Least Significant Bit) analysis
//! - DCT (Discrete Cosine Transform) analysis
//!
//! No signal analysis is performed. `MockStegoAnalyzer` draws both scores
//! at random after a simulated processing delay; only the shape of the
//! result (and the invariants `StegoResult` enforces) is meaningful. It sits
//! behind the `Analyzer` trait so a real detector can replace it.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::analyzer::{Analyzer, SimulatedLatency};
use crate::errors::TruthResult;
use crate::models::StegoResult;
use crate::upload::ImageUpload;

/// Default simulated processing time, 2-4 seconds
pub fn default_latency() -> SimulatedLatency {
    SimulatedLatency::from_millis(2000, 4000)
}

/// Random steganalysis results.
pub struct MockStegoAnalyzer {
    rng: Mutex<StdRng>,
    latency: SimulatedLatency,
}

impl MockStegoAnalyzer {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic analyzer for a given random source
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            latency: default_latency(),
        }
    }

    pub fn with_latency(mut self, latency: SimulatedLatency) -> Self {
        self.latency = latency;
        self
    }

    /// Draw one result: LSB and DCT scores uniform in 0-100, confidence
    /// uniform in 50-95, derived fields computed from those.
    pub fn generate(&self) -> StegoResult {
        let mut rng = self.rng.lock();
        let lsb_score = rng.gen_range(0..=100u8);
        let dct_score = rng.gen_range(0..=100u8);
        let confidence = rng.gen_range(50..=95u8);
        StegoResult::from_scores(lsb_score, dct_score, confidence)
    }
}

impl Default for MockStegoAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for MockStegoAnalyzer {
    type Output = StegoResult;

    fn name(&self) -> &str {
        "mock-steganalysis"
    }

    async fn analyze(&self, upload: &ImageUpload) -> TruthResult<StegoResult> {
        let delay = self.latency.sample(&mut *self.rng.lock());
        log::debug!(
            "Simulating steganalysis of {} ({} bytes) for {}ms",
            upload.filename(),
            upload.size(),
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;

        let result = self.generate();
        log::info!(
            "Steganalysis of {}: overall {} (LSB {}, DCT {})",
            upload.filename(),
            result.overall_score(),
            result.lsb_score(),
            result.dct_score()
        );
        Ok(result)
    }
}
