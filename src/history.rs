//! Persisted analysis history
//!
//! Each feature keeps a single JSON array under a fixed key, most recent
//! first, capped at a fixed capacity. Reads fail open (missing or corrupt
//! data reads as empty history) and so do writes: a failed write is logged
//! and dropped so that a full disk or quota never blocks an analysis.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::TruthResult;
use crate::models::{AnalysisKind, HistoryItem};
use crate::storage::KeyValueStore;

/// Capped, most-recent-first history of results of type `R`.
pub struct HistoryStore<R> {
    backend: Arc<dyn KeyValueStore>,
    key: String,
    capacity: usize,
    _result: PhantomData<fn() -> R>,
}

impl<R> HistoryStore<R>
where
    R: Serialize + DeserializeOwned + Clone,
{
    /// A history under `key` keeping at most `capacity` items (minimum 1)
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>, capacity: usize) -> Self {
        Self {
            backend,
            key: key.into(),
            capacity: capacity.max(1),
            _result: PhantomData,
        }
    }

    /// The history for `kind` with its default key and capacity
    pub fn for_kind(backend: Arc<dyn KeyValueStore>, kind: AnalysisKind) -> Self {
        Self::new(backend, kind.storage_key(), kind.default_capacity())
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Prepend `item`, evicting the oldest items beyond capacity.
    pub fn append(&self, item: HistoryItem<R>) {
        let mut items = self.get_all();
        items.insert(0, item);
        items.truncate(self.capacity);

        if let Err(e) = self.write(&items) {
            log::warn!("Failed to save history under '{}': {}", self.key, e);
        }
    }

    /// Stamp a new history item with the current time and append it.
    pub fn record(&self, image_url: &str, filename: &str, result: R) -> HistoryItem<R> {
        let date = Utc::now();
        let mut id = date.timestamp_millis();

        // Two records in the same millisecond would otherwise share an id
        if let Some(newest) = self
            .get_all()
            .first()
            .and_then(|item| item.id.parse::<i64>().ok())
        {
            if newest >= id {
                id = newest + 1;
            }
        }

        let item = HistoryItem {
            id: id.to_string(),
            image_url: image_url.to_string(),
            filename: filename.to_string(),
            date,
            result,
        };
        self.append(item.clone());
        log::debug!("Recorded history item {} for {}", item.id, item.filename);
        item
    }

    /// All stored items, most recent first. Never fails.
    pub fn get_all(&self) -> Vec<HistoryItem<R>> {
        let raw = match self.backend.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                log::warn!("Failed to read history under '{}': {}", self.key, e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                log::warn!("Error parsing history under '{}': {}", self.key, e);
                Vec::new()
            }
        }
    }

    /// The item with the given id, if it is still in history
    pub fn get_by_id(&self, id: &str) -> Option<HistoryItem<R>> {
        self.get_all().into_iter().find(|item| item.id == id)
    }

    /// Drop every stored item for this feature
    pub fn clear(&self) -> TruthResult<()> {
        self.backend.remove(&self.key)?;
        log::info!("Cleared history under '{}'", self.key);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.get_all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self, items: &[HistoryItem<R>]) -> TruthResult<()> {
        let json = serde_json::to_string(items)?;
        self.backend.set(&self.key, &json)?;
        Ok(())
    }
}
