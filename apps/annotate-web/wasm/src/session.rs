//! Editor session for one open PDF
//!
//! Owns the edit store, one overlay engine per page surface, and the
//! persistence backend. Every call that changes a record writes the whole
//! document back to storage.

use crate::storage::LocalStorage;
use annotate_core::command::{ExportMetrics, ExportResult, ServiceCommand, TargetFormat};
use annotate_core::config::EditorConfig;
use annotate_core::coords::to_page_normalized;
use annotate_core::records::{ImageEdit, ImageRegion, StickyNote, TextEdit, TextRun};
use annotate_core::{
    export_document, page_sizes, restore_document, save_document, AnnotateError,
    EditKindTag, EditPersistence, EditStore, Interaction, OverlayEngine, PageGeometry, Point, Tool,
    ToolStyle,
};
use std::collections::BTreeMap;
use wasm_bindgen::prelude::*;

fn to_js(err: AnnotateError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen]
pub struct EditorSession {
    doc_id: String,
    document_bytes: Vec<u8>,
    pages: Vec<PageGeometry>,
    store: EditStore,
    engines: BTreeMap<u32, OverlayEngine>,
    config: EditorConfig,
    tool: Tool,
    style: ToolStyle,
    zoom: f64,
    active_page: Option<u32>,
    persistence: Box<dyn EditPersistence>,
    last_error: Option<String>,
}

#[wasm_bindgen]
impl EditorSession {
    /// Open a document and restore any edits saved for it
    #[wasm_bindgen(constructor)]
    pub fn new(doc_id: &str, bytes: &[u8]) -> Result<EditorSession, JsValue> {
        let config = EditorConfig::default();
        let backend = LocalStorage::new(config.persistence.clone());
        Self::open(doc_id, bytes, config, Box::new(backend)).map_err(to_js)
    }

    #[wasm_bindgen(getter, js_name = docId)]
    pub fn doc_id(&self) -> String {
        self.doc_id.clone()
    }

    #[wasm_bindgen(getter, js_name = pageCount)]
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// `[{ originX, originY, width, height }]` in PDF units
    #[wasm_bindgen(js_name = pageSizes)]
    pub fn page_sizes(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.pages)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Last storage failure, if any. Edits stay in memory when saving fails.
    #[wasm_bindgen(getter, js_name = lastError)]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }

    #[wasm_bindgen(js_name = setTool)]
    pub fn set_tool(&mut self, name: &str) -> Result<(), JsValue> {
        let tool: Tool = name.parse().map_err(|e: String| JsValue::from_str(&e))?;
        self.apply_tool(tool);
        Ok(())
    }

    #[wasm_bindgen(js_name = setZoom)]
    pub fn set_zoom(&mut self, zoom: f64) {
        if !(zoom.is_finite() && zoom > 0.0) {
            return;
        }
        self.zoom = zoom;
        for engine in self.engines.values_mut() {
            engine.set_zoom(zoom);
        }
    }

    /// Override the active tool's color, stroke width and fill
    #[wasm_bindgen(js_name = setStyle)]
    pub fn set_style(&mut self, color: Option<String>, stroke_width: Option<f64>, filled: bool) {
        self.style = ToolStyle {
            color,
            stroke_width,
            filled,
        };
        for engine in self.engines.values_mut() {
            engine.set_style(self.style.clone());
        }
    }

    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&mut self, page: u32, x: f64, y: f64) {
        if let Some(previous) = self.active_page.filter(|p| *p != page) {
            if let Some(engine) = self.engines.get_mut(&previous) {
                engine.cancel();
                engine.select(None);
            }
        }
        self.active_page = Some(page);
        self.ensure_engine(page);
        if let Some(engine) = self.engines.get_mut(&page) {
            engine.pointer_down(&mut self.store, Point::new(x, y));
        }
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&mut self, page: u32, x: f64, y: f64) {
        if let Some(engine) = self.engines.get_mut(&page) {
            engine.pointer_move(&mut self.store, Point::new(x, y));
        }
    }

    /// Returns the id of the committed record, if the gesture created one
    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&mut self, page: u32, x: f64, y: f64) -> Option<String> {
        let engine = self.engines.get_mut(&page)?;
        let was_editing = *engine.state() != Interaction::Idle;
        let committed = engine.pointer_up(&mut self.store, Point::new(x, y));
        if committed.is_some() || was_editing {
            self.persist();
        }
        committed.map(|edit| edit.id)
    }

    /// Delete/Backspace remove the selection, Escape cancels
    #[wasm_bindgen(js_name = keyDown)]
    pub fn key_down(&mut self, key: &str) -> bool {
        let Some(engine) = self.active_page.and_then(|p| self.engines.get_mut(&p)) else {
            return false;
        };
        let removed = engine.key_down(&mut self.store, key);
        if removed {
            self.persist();
        }
        removed
    }

    /// `{ kind, id }` of the selected record, or null
    pub fn selection(&self) -> Result<JsValue, JsValue> {
        match self.selected() {
            Some(edit) => serde_wasm_bindgen::to_value(&edit)
                .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e))),
            None => Ok(JsValue::NULL),
        }
    }

    /// Selection outline in screen pixels as `[x, y, width, height]`
    #[wasm_bindgen(js_name = selectionBounds)]
    pub fn selection_bounds(&self) -> Option<Vec<f64>> {
        let page = self.active_page?;
        let bounds = self.engines.get(&page)?.selection_bounds(&self.store)?;
        Some(vec![bounds.x, bounds.y, bounds.width, bounds.height])
    }

    /// Draft under construction on a page as JSON, for live rendering
    #[wasm_bindgen(js_name = draftJson)]
    pub fn draft_json(&self, page: u32) -> Option<String> {
        let draft = self.engines.get(&page)?.draft()?;
        serde_json::to_string(draft).ok()
    }

    #[wasm_bindgen(js_name = setNoteText)]
    pub fn set_note_text(&mut self, id: &str, text: &str) -> bool {
        let Some(mut note) = self
            .store
            .get::<StickyNote>(&self.doc_id)
            .iter()
            .find(|n| n.id == id)
            .cloned()
        else {
            return false;
        };
        note.text = text.to_string();
        self.store.upsert(&self.doc_id, note);
        self.persist();
        true
    }

    #[wasm_bindgen(js_name = recolorSelection)]
    pub fn recolor_selection(&mut self, color: &str) -> bool {
        let Some(engine) = self.active_page.and_then(|p| self.engines.get_mut(&p)) else {
            return false;
        };
        let changed = engine.recolor_selection(&mut self.store, color);
        if changed {
            self.persist();
        }
        changed
    }

    /// New text at a screen-space baseline point. Returns the record id.
    #[wasm_bindgen(js_name = insertText)]
    pub fn insert_text(
        &mut self,
        page: u32,
        x: f64,
        y: f64,
        text: &str,
        font_size: f64,
        font_family: &str,
    ) -> String {
        let baseline = to_page_normalized(Point::new(x, y), self.zoom);
        let edit = TextEdit::inserted(page, baseline, text, font_size, font_family, self.zoom);
        let id = edit.id.clone();
        self.store.upsert(&self.doc_id, edit);
        self.persist();
        id
    }

    /// Replace an extracted text run. `run_json` is the run as reported by
    /// the text layer.
    #[wasm_bindgen(js_name = replaceTextRun)]
    pub fn replace_text_run(
        &mut self,
        page: u32,
        run_json: &str,
        edited_text: &str,
    ) -> Result<String, JsValue> {
        self.try_replace_text_run(page, run_json, edited_text).map_err(to_js)
    }

    /// Start tracking an image placement reported by the rendering surface
    #[wasm_bindgen(js_name = registerImage)]
    pub fn register_image(&mut self, region_json: &str) -> Result<String, JsValue> {
        self.try_register_image(region_json).map_err(to_js)
    }

    #[wasm_bindgen(js_name = deleteImage)]
    pub fn delete_image(&mut self, id: &str) -> bool {
        self.update_image(id, |image| ImageEdit {
            deleted: true,
            ..image.clone()
        })
    }

    /// Swap the picture for a `data:image/png|jpeg;base64,` payload
    #[wasm_bindgen(js_name = replaceImage)]
    pub fn replace_image(&mut self, id: &str, data_uri: &str) -> bool {
        self.update_image(id, |image| ImageEdit {
            deleted: false,
            image_data: Some(data_uri.to_string()),
            ..image.clone()
        })
    }

    #[wasm_bindgen(js_name = resetImage)]
    pub fn reset_image(&mut self, id: &str) -> bool {
        self.update_image(id, ImageEdit::reset)
    }

    /// Records of one kind as a JSON array, or every collection when `kind`
    /// is omitted
    #[wasm_bindgen(js_name = getEditsJson)]
    pub fn get_edits_json(&self, kind: Option<String>) -> Result<String, JsValue> {
        self.edits_json(kind.as_deref()).map_err(to_js)
    }

    #[wasm_bindgen(js_name = clearEdits)]
    pub fn clear_edits(&mut self) {
        self.store.clear(&self.doc_id);
        for engine in self.engines.values_mut() {
            engine.cancel();
            engine.select(None);
        }
        self.persist();
    }

    /// Composite every edit into the PDF. Returns `{ success, data, error,
    /// metrics }` with `data` base64-encoded.
    pub fn export(&self) -> Result<JsValue, JsValue> {
        let result = match self.export_bytes() {
            Ok((bytes, metrics)) => ExportResult::ok(&bytes, metrics),
            Err(e) => ExportResult::failed(e),
        };
        serde_wasm_bindgen::to_value(&result)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// JSON body for the conversion service, built from the exported PDF
    #[wasm_bindgen(js_name = conversionRequest)]
    pub fn conversion_request(
        &self,
        format: &str,
        operation: Option<String>,
    ) -> Result<String, JsValue> {
        self.try_conversion_request(format, operation).map_err(to_js)
    }
}

impl EditorSession {
    /// Open a session over any persistence backend.
    pub fn open(
        doc_id: &str,
        bytes: &[u8],
        config: EditorConfig,
        persistence: Box<dyn EditPersistence>,
    ) -> Result<Self, AnnotateError> {
        let pages = page_sizes(bytes)?;
        let mut session = Self {
            doc_id: doc_id.to_string(),
            document_bytes: bytes.to_vec(),
            pages,
            store: EditStore::new(),
            engines: BTreeMap::new(),
            config,
            tool: Tool::Select,
            style: ToolStyle::default(),
            zoom: 1.0,
            active_page: None,
            persistence,
            last_error: None,
        };

        let policy = session.config.persistence.policy;
        if let Err(e) = restore_document(
            &mut session.store,
            &session.doc_id,
            policy,
            session.persistence.as_ref(),
        ) {
            // unreadable entries are dropped so the next save starts clean
            let mut message = e.to_string();
            if let Err(remove_err) = session.persistence.remove(&session.doc_id) {
                message = format!("{message}; {remove_err}");
            }
            session.last_error = Some(message);
        }
        Ok(session)
    }

    pub fn store(&self) -> &EditStore {
        &self.store
    }

    pub fn apply_tool(&mut self, tool: Tool) {
        self.tool = tool;
        for engine in self.engines.values_mut() {
            engine.set_tool(tool);
        }
    }

    pub fn selected(&self) -> Option<annotate_core::EditRef> {
        let page = self.active_page?;
        self.engines.get(&page)?.selection().cloned()
    }

    /// Page surfaces get their engine on first touch, set up with the
    /// session's current tool, zoom and style.
    fn ensure_engine(&mut self, page: u32) {
        if self.engines.contains_key(&page) {
            return;
        }
        let mut engine = OverlayEngine::new(self.doc_id.clone(), page, self.config.overlay.clone());
        engine.set_zoom(self.zoom);
        engine.set_tool(self.tool);
        engine.set_style(self.style.clone());
        self.engines.insert(page, engine);
    }

    fn persist(&mut self) {
        let policy = self.config.persistence.policy;
        match save_document(&self.store, &self.doc_id, policy, self.persistence.as_mut()) {
            Ok(_) => self.last_error = None,
            Err(e) => self.last_error = Some(e.to_string()),
        }
    }

    fn page_geometry(&self, page: u32) -> Result<PageGeometry, AnnotateError> {
        self.pages
            .get(page as usize)
            .copied()
            .ok_or_else(|| {
                AnnotateError::OperationError(format!(
                    "Page {} out of range (document has {} pages)",
                    page,
                    self.pages.len()
                ))
            })
    }

    pub fn try_replace_text_run(
        &mut self,
        page: u32,
        run_json: &str,
        edited_text: &str,
    ) -> Result<String, AnnotateError> {
        let run: TextRun = serde_json::from_str(run_json)?;
        let geometry = self.page_geometry(page)?;
        let mut edit = TextEdit::replacing(&run, page, edited_text, &geometry);

        // keep styling chosen on an earlier replacement of the same run
        if let Some(previous) = self
            .store
            .get::<TextEdit>(&self.doc_id)
            .iter()
            .find(|t| t.id == run.id)
        {
            edit.font_color = previous.font_color.clone();
            edit.is_bold = previous.is_bold;
            edit.is_italic = previous.is_italic;
        }

        let id = edit.id.clone();
        self.store.upsert(&self.doc_id, edit);
        self.persist();
        Ok(id)
    }

    pub fn try_register_image(&mut self, region_json: &str) -> Result<String, AnnotateError> {
        let region: ImageRegion = serde_json::from_str(region_json)?;
        self.page_geometry(region.page)?;
        let known = self
            .store
            .get::<ImageEdit>(&self.doc_id)
            .iter()
            .any(|i| i.id == region.id);
        if !known {
            self.store
                .upsert(&self.doc_id, ImageEdit::from_region(&region, self.zoom));
            self.persist();
        }
        Ok(region.id)
    }

    fn update_image(&mut self, id: &str, change: impl FnOnce(&ImageEdit) -> ImageEdit) -> bool {
        let Some(updated) = self
            .store
            .get::<ImageEdit>(&self.doc_id)
            .iter()
            .find(|i| i.id == id)
            .map(change)
        else {
            return false;
        };
        self.store.upsert(&self.doc_id, updated);
        self.persist();
        true
    }

    pub fn edits_json(&self, kind: Option<&str>) -> Result<String, AnnotateError> {
        match kind {
            None => self.store.snapshot(&self.doc_id).to_json(),
            Some(name) => {
                let kind: EditKindTag = name.parse().map_err(AnnotateError::OperationError)?;
                let records = self.store.get_edits_for_document(&self.doc_id, kind);
                Ok(serde_json::to_string(&records)?)
            }
        }
    }

    pub fn export_bytes(&self) -> Result<(Vec<u8>, ExportMetrics), AnnotateError> {
        export_document(
            &self.document_bytes,
            &self.store,
            &self.doc_id,
            &self.config.compositor,
        )
    }

    pub fn try_conversion_request(
        &self,
        format: &str,
        operation: Option<String>,
    ) -> Result<String, AnnotateError> {
        let format: TargetFormat = format.parse()?;
        let (bytes, _) = self.export_bytes()?;
        let command = match operation {
            Some(operation) => ServiceCommand::Convert {
                file: bytes,
                format,
                operation,
            },
            None => ServiceCommand::convert(bytes, format),
        };
        command.to_json()
    }
}
