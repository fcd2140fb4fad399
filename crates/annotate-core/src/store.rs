//! Edit record store
//!
//! Per-document, per-kind collections. Every collection is an `Arc<Vec<T>>`
//! and every mutation goes through `Arc::make_mut`, so a snapshot taken
//! before a mutation keeps seeing the old collection.

use crate::error::AnnotateError;
use crate::records::{
    EditKindTag, EditRecord, EditRef, ImageEdit, Markup, PenStroke, Shape, StickyNote, TextEdit,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Every edit collection of one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEdits {
    #[serde(default)]
    pub markups: Arc<Vec<Markup>>,
    #[serde(default)]
    pub notes: Arc<Vec<StickyNote>>,
    #[serde(default)]
    pub pens: Arc<Vec<PenStroke>>,
    #[serde(default)]
    pub shapes: Arc<Vec<Shape>>,
    #[serde(default)]
    pub texts: Arc<Vec<TextEdit>>,
    #[serde(default)]
    pub images: Arc<Vec<ImageEdit>>,
}

impl DocumentEdits {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.markups.len()
            + self.notes.len()
            + self.pens.len()
            + self.shapes.len()
            + self.texts.len()
            + self.images.len()
    }

    /// Records of one kind in insertion order.
    pub fn records_of(&self, kind: EditKindTag) -> Vec<EditRecord> {
        match kind {
            EditKindTag::Markup => to_records(&self.markups),
            EditKindTag::Note => to_records(&self.notes),
            EditKindTag::Pen => to_records(&self.pens),
            EditKindTag::Shape => to_records(&self.shapes),
            EditKindTag::Text => to_records(&self.texts),
            EditKindTag::Image => to_records(&self.images),
        }
    }

    pub fn to_json(&self) -> Result<String, AnnotateError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, AnnotateError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn to_records<K: EditKind>(items: &[K]) -> Vec<EditRecord> {
    items.iter().cloned().map(EditKind::into_record).collect()
}

/// A record kind with its own collection in [`DocumentEdits`].
pub trait EditKind: Clone {
    const KIND: EditKindTag;

    fn id(&self) -> &str;
    fn collection(edits: &DocumentEdits) -> &Arc<Vec<Self>>;
    fn collection_mut(edits: &mut DocumentEdits) -> &mut Arc<Vec<Self>>;
    fn into_record(self) -> EditRecord;
}

macro_rules! impl_edit_kind {
    ($ty:ty, $tag:ident, $field:ident) => {
        impl EditKind for $ty {
            const KIND: EditKindTag = EditKindTag::$tag;

            fn id(&self) -> &str {
                &self.id
            }

            fn collection(edits: &DocumentEdits) -> &Arc<Vec<Self>> {
                &edits.$field
            }

            fn collection_mut(edits: &mut DocumentEdits) -> &mut Arc<Vec<Self>> {
                &mut edits.$field
            }

            fn into_record(self) -> EditRecord {
                EditRecord::$tag(self)
            }
        }
    };
}

impl_edit_kind!(Markup, Markup, markups);
impl_edit_kind!(StickyNote, Note, notes);
impl_edit_kind!(PenStroke, Pen, pens);
impl_edit_kind!(Shape, Shape, shapes);
impl_edit_kind!(TextEdit, Text, texts);
impl_edit_kind!(ImageEdit, Image, images);

/// Keyed collection store. No validation happens here.
#[derive(Debug, Default, Clone)]
pub struct EditStore {
    documents: HashMap<String, DocumentEdits>,
}

impl EditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection of kind `K` for a document; empty when nothing was stored.
    pub fn get<K: EditKind>(&self, doc_id: &str) -> Arc<Vec<K>> {
        self.documents
            .get(doc_id)
            .map(|edits| Arc::clone(K::collection(edits)))
            .unwrap_or_default()
    }

    /// Replace the record with the same id in place, or append it.
    pub fn upsert<K: EditKind>(&mut self, doc_id: &str, record: K) {
        let edits = self.documents.entry(doc_id.to_string()).or_default();
        let items = Arc::make_mut(K::collection_mut(edits));
        match items.iter().position(|r| r.id() == record.id()) {
            Some(idx) => items[idx] = record,
            None => items.push(record),
        }
    }

    /// Filter out the record with `id`. Returns whether anything was removed.
    pub fn remove<K: EditKind>(&mut self, doc_id: &str, id: &str) -> bool {
        let Some(edits) = self.documents.get_mut(doc_id) else {
            return false;
        };
        let collection = K::collection_mut(edits);
        if !collection.iter().any(|r| r.id() == id) {
            return false;
        }
        Arc::make_mut(collection).retain(|r| r.id() != id);
        true
    }

    /// Drop every record of every kind for the document.
    pub fn clear(&mut self, doc_id: &str) {
        if let Some(edits) = self.documents.get_mut(doc_id) {
            *edits = DocumentEdits::default();
        }
    }

    pub fn clear_kind<K: EditKind>(&mut self, doc_id: &str) {
        if let Some(edits) = self.documents.get_mut(doc_id) {
            *K::collection_mut(edits) = Arc::default();
        }
    }

    pub fn find(&self, doc_id: &str, edit: &EditRef) -> Option<EditRecord> {
        let edits = self.documents.get(doc_id)?;
        match edit.kind {
            EditKindTag::Markup => find_in(&edits.markups, &edit.id),
            EditKindTag::Note => find_in(&edits.notes, &edit.id),
            EditKindTag::Pen => find_in(&edits.pens, &edit.id),
            EditKindTag::Shape => find_in(&edits.shapes, &edit.id),
            EditKindTag::Text => find_in(&edits.texts, &edit.id),
            EditKindTag::Image => find_in(&edits.images, &edit.id),
        }
    }

    pub fn upsert_record(&mut self, doc_id: &str, record: EditRecord) {
        match record {
            EditRecord::Markup(r) => self.upsert(doc_id, r),
            EditRecord::Note(r) => self.upsert(doc_id, r),
            EditRecord::Pen(r) => self.upsert(doc_id, r),
            EditRecord::Shape(r) => self.upsert(doc_id, r),
            EditRecord::Text(r) => self.upsert(doc_id, r),
            EditRecord::Image(r) => self.upsert(doc_id, r),
        }
    }

    pub fn remove_record(&mut self, doc_id: &str, edit: &EditRef) -> bool {
        match edit.kind {
            EditKindTag::Markup => self.remove::<Markup>(doc_id, &edit.id),
            EditKindTag::Note => self.remove::<StickyNote>(doc_id, &edit.id),
            EditKindTag::Pen => self.remove::<PenStroke>(doc_id, &edit.id),
            EditKindTag::Shape => self.remove::<Shape>(doc_id, &edit.id),
            EditKindTag::Text => self.remove::<TextEdit>(doc_id, &edit.id),
            EditKindTag::Image => self.remove::<ImageEdit>(doc_id, &edit.id),
        }
    }

    /// Every collection of the document, sharing storage with the store.
    pub fn snapshot(&self, doc_id: &str) -> DocumentEdits {
        self.documents.get(doc_id).cloned().unwrap_or_default()
    }

    pub fn get_edits_for_document(&self, doc_id: &str, kind: EditKindTag) -> Vec<EditRecord> {
        self.documents
            .get(doc_id)
            .map(|edits| edits.records_of(kind))
            .unwrap_or_default()
    }

    /// Swap in a whole set of collections, e.g. after a restore.
    pub fn replace_document(&mut self, doc_id: &str, edits: DocumentEdits) {
        self.documents.insert(doc_id.to_string(), edits);
    }

    /// Forget a document, returning what it held.
    pub fn close_document(&mut self, doc_id: &str) -> Option<DocumentEdits> {
        self.documents.remove(doc_id)
    }

    pub fn document_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.documents.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

fn find_in<K: EditKind>(items: &[K], id: &str) -> Option<EditRecord> {
    items
        .iter()
        .find(|r| r.id() == id)
        .cloned()
        .map(EditKind::into_record)
}
