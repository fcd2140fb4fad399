//! Annotation and editing layer for PDF documents
//!
//! Users draw markups, notes, pen strokes and shapes over rendered pages,
//! rewrite text runs and move or replace images. Every edit is captured as a
//! record in page-normalized units, kept per document in an [`EditStore`],
//! and composited into the original PDF's content streams on export.
//!
//! - [`coords`]: screen / page-normalized / PDF space conversions
//! - [`overlay`]: pointer-driven drawing, selection, move and resize
//! - [`store`]: per-document edit collections
//! - [`compositor`]: writes the edits into a copy of the source PDF

pub mod command;
pub mod compositor;
pub mod config;
pub mod coords;
pub mod error;
pub mod overlay;
pub mod persistence;
pub mod records;
pub mod store;
pub mod style;

pub use command::{ExportMetrics, ExportResult, ServiceCommand, ServiceResponse, TargetFormat};
pub use compositor::{
    composite, composite_with_report, get_page_count, page_sizes, CompositeReport, PageGeometry,
};
pub use config::{EditorConfig, PersistencePolicy};
pub use coords::{Point, Rect};
pub use error::AnnotateError;
pub use overlay::{Interaction, OverlayEngine, Tool, ToolStyle};
pub use persistence::{restore_document, save_document, EditPersistence, MemoryPersistence};
pub use records::{
    EditKindTag, EditRecord, EditRef, ImageEdit, ImageRegion, Markup, MarkupType, PenStroke,
    Shape, ShapeType, StickyNote, TextEdit, TextRun,
};
pub use store::{DocumentEdits, EditKind, EditStore};

/// Composite a store's edits for one document and summarize the run.
pub fn export_document(
    source: &[u8],
    store: &EditStore,
    doc_id: &str,
    config: &config::CompositorConfig,
) -> Result<(Vec<u8>, ExportMetrics), AnnotateError> {
    let edits = store.snapshot(doc_id);
    let (output, report) = composite_with_report(source, &edits, config)?;
    let metrics = ExportMetrics::from_report(&report, source.len(), output.len(), edits.len());
    Ok((output, metrics))
}
