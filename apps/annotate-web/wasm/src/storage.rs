//! `window.localStorage` backend for saved edits.

use annotate_core::config::PersistenceConfig;
use annotate_core::{AnnotateError, EditPersistence};
use web_sys::Storage;

/// Stores each document's edits under `<key_prefix><docId>`.
pub struct LocalStorage {
    config: PersistenceConfig,
}

impl LocalStorage {
    pub fn new(config: PersistenceConfig) -> Self {
        Self { config }
    }

    fn key(&self, doc_id: &str) -> String {
        self.config.storage_key(doc_id)
    }

    fn storage(&self) -> Result<Storage, AnnotateError> {
        let window = web_sys::window()
            .ok_or_else(|| AnnotateError::PersistenceError("No window".to_string()))?;
        window
            .local_storage()
            .map_err(|_| AnnotateError::PersistenceError("localStorage is blocked".to_string()))?
            .ok_or_else(|| AnnotateError::PersistenceError("No localStorage".to_string()))
    }
}

impl EditPersistence for LocalStorage {
    fn load(&self, doc_id: &str) -> Result<Option<String>, AnnotateError> {
        self.storage()?
            .get_item(&self.key(doc_id))
            .map_err(|_| AnnotateError::PersistenceError("Failed to read edits".to_string()))
    }

    fn save(&mut self, doc_id: &str, payload: &str) -> Result<(), AnnotateError> {
        // Quota errors surface here
        self.storage()?
            .set_item(&self.key(doc_id), payload)
            .map_err(|_| AnnotateError::PersistenceError("Failed to write edits".to_string()))
    }

    fn remove(&mut self, doc_id: &str) -> Result<(), AnnotateError> {
        self.storage()?
            .remove_item(&self.key(doc_id))
            .map_err(|_| AnnotateError::PersistenceError("Failed to remove edits".to_string()))
    }
}
