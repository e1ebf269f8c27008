use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall score above which an image is reported as carrying hidden data.
pub const HIDDEN_DATA_THRESHOLD: u8 = 60;

/// Steganalysis scores for one image.
///
/// `overall_score` and `has_hidden_data` are always derived from the two
/// component scores, so the only way to build one is [`StegoResult::from_scores`].
/// Stored copies go through it as well: the derived fields in the JSON are
/// recomputed on load, not trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredScores")]
pub struct StegoResult {
    overall_score: u8,
    lsb_score: u8,
    dct_score: u8,
    has_hidden_data: bool,
    confidence: u8,
}

impl StegoResult {
    /// Build a result from LSB and DCT scores (each clamped to 0-100).
    ///
    /// The overall score is `round(lsb * 0.6 + dct * 0.4)`, computed in
    /// integers: `6l + 4d` is always even, so the weighted sum never lands on
    /// a half and `(6l + 4d + 5) / 10` is the exact rounding.
    pub fn from_scores(lsb_score: u8, dct_score: u8, confidence: u8) -> Self {
        let lsb_score = lsb_score.min(100);
        let dct_score = dct_score.min(100);
        let weighted = 6 * u16::from(lsb_score) + 4 * u16::from(dct_score);
        let overall_score = ((weighted + 5) / 10) as u8;

        Self {
            overall_score,
            lsb_score,
            dct_score,
            has_hidden_data: overall_score > HIDDEN_DATA_THRESHOLD,
            confidence: confidence.min(100),
        }
    }

    pub fn overall_score(&self) -> u8 {
        self.overall_score
    }

    pub fn lsb_score(&self) -> u8 {
        self.lsb_score
    }

    pub fn dct_score(&self) -> u8 {
        self.dct_score
    }

    pub fn has_hidden_data(&self) -> bool {
        self.has_hidden_data
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }
}

/// The independent part of a stored [`StegoResult`]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredScores {
    lsb_score: u8,
    dct_score: u8,
    confidence: u8,
}

impl From<StoredScores> for StegoResult {
    fn from(stored: StoredScores) -> Self {
        StegoResult::from_scores(stored.lsb_score, stored.dct_score, stored.confidence)
    }
}

/// One label/score pair as returned by an image-classification model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub label: String,
    /// Probability in `[0, 1]`
    pub score: f64,
}

impl ClassScore {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Deepfake classification outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepfakeResult {
    #[serde(rename = "isAIGenerated")]
    pub is_ai_generated: bool,
    /// Confidence 0-100
    pub confidence: u8,
    pub model_name: String,
    pub classes: Vec<ClassScore>,
}

/// A past analysis as persisted in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem<R> {
    /// Creation time in epoch milliseconds, as a decimal string
    pub id: String,
    /// `data:` or `file://` reference to the analyzed image
    pub image_url: String,
    pub filename: String,
    pub date: DateTime<Utc>,
    pub result: R,
}

/// The two analysis features, each with its own history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    Steganalysis,
    Deepfake,
}

impl AnalysisKind {
    /// Storage key the feature's history lives under
    pub fn storage_key(&self) -> &'static str {
        match self {
            AnalysisKind::Steganalysis => "steganalysis_history",
            AnalysisKind::Deepfake => "deepfake_detection_history",
        }
    }

    /// Number of history items kept unless overridden
    pub fn default_capacity(&self) -> usize {
        match self {
            AnalysisKind::Steganalysis => 50,
            AnalysisKind::Deepfake => 20,
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisKind::Steganalysis => write!(f, "Steganalysis"),
            AnalysisKind::Deepfake => write!(f, "Deepfake Detection"),
        }
    }
}
