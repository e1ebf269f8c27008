//! Runtime settings derived from the command line

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::Args;
use crate::deepfake::remote::HubConfig;
use crate::errors::TruthResult;
use crate::models::AnalysisKind;
use crate::storage::{FileStore, KeyValueStore, MemoryStore};
use crate::upload::PreviewMode;

/// Where history is kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// Platform data directory, or the given one
    Directory(Option<PathBuf>),
    /// Process memory; gone on exit
    Memory,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub storage: StorageLocation,
    pub capacity: Option<usize>,
    pub preview: PreviewMode,
    pub hub: HubConfig,
    pub quiet: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage: StorageLocation::Directory(None),
            capacity: None,
            preview: PreviewMode::FileUrl,
            hub: HubConfig::default(),
            quiet: false,
        }
    }
}

impl Settings {
    pub fn from_args(args: &Args) -> Self {
        let storage = if args.ephemeral {
            StorageLocation::Memory
        } else {
            StorageLocation::Directory(args.data_dir.clone())
        };

        let preview = if args.embed_preview {
            PreviewMode::DataUrl
        } else {
            PreviewMode::FileUrl
        };

        Self {
            storage,
            capacity: args.capacity,
            preview,
            hub: HubConfig {
                model_id: args.model_id.clone(),
                hub_url: args.hub_url.clone(),
                inference_url: args.inference_url.clone(),
                token: args.model_token.clone().filter(|t| !t.is_empty()),
                timeout: Duration::from_secs(args.timeout.max(1)),
            },
            quiet: args.quiet,
        }
    }

    /// History capacity for `kind`, honoring an override
    pub fn capacity_for(&self, kind: AnalysisKind) -> usize {
        self.capacity.unwrap_or_else(|| kind.default_capacity()).max(1)
    }

    /// Open the configured key-value backend.
    pub fn open_backend(&self) -> TruthResult<Arc<dyn KeyValueStore>> {
        let backend: Arc<dyn KeyValueStore> = match self.open_file_store()? {
            Some(store) => Arc::new(store),
            None => Arc::new(MemoryStore::new()),
        };
        Ok(backend)
    }

    /// Open the file store directly, for watching. `None` for memory storage.
    pub fn open_file_store(&self) -> TruthResult<Option<FileStore>> {
        let dir = match &self.storage {
            StorageLocation::Memory => return Ok(None),
            StorageLocation::Directory(Some(dir)) => dir.clone(),
            StorageLocation::Directory(None) => FileStore::default_dir()?,
        };
        log::debug!("Using history directory {}", dir.display());
        Ok(Some(FileStore::open(dir)?))
    }
}
