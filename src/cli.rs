use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::deepfake::remote::{DEFAULT_HUB_URL, DEFAULT_INFERENCE_URL, DEFAULT_MODEL_ID, TOKEN_ENV_VAR};
use crate::models::AnalysisKind;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pixel-truth",
    about = "Pixel Truth - steganalysis and deepfake detection for still images",
    version
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the history files (default: platform data dir)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Keep history in memory only, nothing is written to disk
    #[arg(long, global = true, conflicts_with = "data_dir")]
    pub ephemeral: bool,

    /// Override the history capacity for the selected feature
    #[arg(long, global = true)]
    pub capacity: Option<usize>,

    /// Store the image itself (as a data URL) in history instead of its path
    #[arg(long, global = true)]
    pub embed_preview: bool,

    /// Hugging Face model used for deepfake detection
    #[arg(long, global = true, default_value = DEFAULT_MODEL_ID)]
    pub model_id: String,

    /// Hugging Face access token
    #[arg(long, global = true, env = TOKEN_ENV_VAR, hide_env_values = true)]
    pub model_token: Option<String>,

    /// Base URL of the model hub
    #[arg(long, global = true, default_value = DEFAULT_HUB_URL)]
    pub hub_url: String,

    /// Base URL of the hosted inference API
    #[arg(long, global = true, default_value = DEFAULT_INFERENCE_URL)]
    pub inference_url: String,

    /// Model hub request timeout in seconds
    #[arg(long, global = true, default_value = "30")]
    pub timeout: u64,

    /// Enable verbose logging of all operations
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Hide spinners and decorations
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Check an image for hidden data
    Stego {
        /// Image to analyze
        image: PathBuf,

        /// Write an HTML snapshot of the result to <EXPORT>.html
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Check whether an image is AI generated
    Deepfake {
        /// Image to analyze
        image: PathBuf,

        /// Write an HTML snapshot of the result to <EXPORT>.html
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Browse previous analyses
    History {
        #[arg(value_enum)]
        feature: Feature,

        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum HistoryAction {
    /// List stored analyses, most recent first
    List,

    /// Show one stored analysis in full
    Show { id: String },

    /// Write an HTML snapshot of one stored analysis to <OUTPUT>.html
    Export { id: String, output: PathBuf },

    /// Reprint the list whenever the history changes on disk
    Watch,

    /// Delete all stored analyses for this feature
    Clear,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum Feature {
    /// Steganalysis history
    Stego,
    /// Deepfake detection history
    Deepfake,
}

impl From<Feature> for AnalysisKind {
    fn from(feature: Feature) -> Self {
        match feature {
            Feature::Stego => AnalysisKind::Steganalysis,
            Feature::Deepfake => AnalysisKind::Deepfake,
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feature::Stego => write!(f, "stego"),
            Feature::Deepfake => write!(f, "deepfake"),
        }
    }
}

impl Command {
    /// The feature whose history this command touches
    pub fn kind(&self) -> AnalysisKind {
        match self {
            Command::Stego { .. } => AnalysisKind::Steganalysis,
            Command::Deepfake { .. } => AnalysisKind::Deepfake,
            Command::History { feature, .. } => (*feature).into(),
        }
    }
}
