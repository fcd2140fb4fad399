//! Edit persistence
//!
//! One policy covers every edit kind. A backend stores the JSON of a whole
//! [`DocumentEdits`] keyed by document id; the browser build writes it to
//! `localStorage`, tests and headless callers use [`MemoryPersistence`].

use crate::config::PersistencePolicy;
use crate::error::AnnotateError;
use crate::store::{DocumentEdits, EditStore};
use std::collections::HashMap;
use tracing::debug;

/// Storage backend for serialized document edits.
pub trait EditPersistence {
    fn load(&self, doc_id: &str) -> Result<Option<String>, AnnotateError>;
    fn save(&mut self, doc_id: &str, payload: &str) -> Result<(), AnnotateError>;
    fn remove(&mut self, doc_id: &str) -> Result<(), AnnotateError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryPersistence {
    entries: HashMap<String, String>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.entries.contains_key(doc_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl EditPersistence for MemoryPersistence {
    fn load(&self, doc_id: &str) -> Result<Option<String>, AnnotateError> {
        Ok(self.entries.get(doc_id).cloned())
    }

    fn save(&mut self, doc_id: &str, payload: &str) -> Result<(), AnnotateError> {
        self.entries.insert(doc_id.to_string(), payload.to_string());
        Ok(())
    }

    fn remove(&mut self, doc_id: &str) -> Result<(), AnnotateError> {
        self.entries.remove(doc_id);
        Ok(())
    }
}

/// Write the document's edits to the backend. A document with no edits has
/// its entry removed. Returns `false` when the policy keeps edits in memory.
pub fn save_document<P: EditPersistence + ?Sized>(
    store: &EditStore,
    doc_id: &str,
    policy: PersistencePolicy,
    backend: &mut P,
) -> Result<bool, AnnotateError> {
    if policy == PersistencePolicy::Session {
        return Ok(false);
    }

    let edits = store.snapshot(doc_id);
    if edits.is_empty() {
        backend.remove(doc_id)?;
        debug!(doc_id, "Removed persisted edits");
        return Ok(true);
    }

    let payload = edits.to_json()?;
    backend.save(doc_id, &payload)?;
    debug!(doc_id, records = edits.len(), "Persisted edits");
    Ok(true)
}

/// Replace the document's collections with whatever the backend holds.
/// Returns whether anything was restored.
pub fn restore_document<P: EditPersistence + ?Sized>(
    store: &mut EditStore,
    doc_id: &str,
    policy: PersistencePolicy,
    backend: &P,
) -> Result<bool, AnnotateError> {
    if policy == PersistencePolicy::Session {
        return Ok(false);
    }

    let Some(payload) = backend.load(doc_id)? else {
        return Ok(false);
    };
    let edits = DocumentEdits::from_json(&payload).map_err(|e| {
        AnnotateError::PersistenceError(format!("Stored edits for {} are unreadable: {}", doc_id, e))
    })?;
    debug!(doc_id, records = edits.len(), "Restored edits");
    store.replace_document(doc_id, edits);
    Ok(true)
}
