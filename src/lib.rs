//! Pixel Truth
//!
//! Image forensics for still images: steganalysis (does this image hide
//! data?) and deepfake detection (was it AI generated?), each with a
//! persisted, capped history of past analyses.

pub mod analyzer;
pub mod app;
pub mod cli;
pub mod config;
pub mod deepfake;
pub mod errors;
pub mod exporter;
pub mod history;
pub mod models;
pub mod session;
pub mod stego;
pub mod storage;
pub mod ui;
pub mod upload;
pub mod watcher;

pub use analyzer::{Analyzer, SimulatedLatency, Verdict};
pub use errors::{TruthError, TruthResult};
pub use history::HistoryStore;
pub use models::{AnalysisKind, ClassScore, DeepfakeResult, HistoryItem, StegoResult};
pub use session::{AnalysisOutcome, AnalysisSession, Phase, SessionEvent};
