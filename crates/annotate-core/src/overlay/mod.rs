//! Interactive overlay engine
//!
//! One engine per page surface. Pointer positions arrive in screen pixels at
//! the current zoom; everything written to the store is in page units. The
//! engine only reads records through the store and writes them back whole.


pub use hit_test::{handle_at, handle_rects, hit_note, hit_pen, resize_from_anchor, Handle};

use crate::config::OverlayConfig;
use crate::coords::{to_page_normalized, to_screen, Point, Rect};
use crate::records::{
    new_id, EditKindTag, EditRecord, EditRef, ImageEdit, Markup, MarkupType, PenStroke, Shape,
    ShapeType, StickyNote, TextEdit, NOTE_ICON_SIZE,
};
use crate::store::{EditKind, EditStore};
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    Markup(MarkupType),
    Shape(ShapeType),
    Pen,
    Note,
}

impl Tool {
    pub fn default_color(&self) -> &'static str {
        match self {
            Tool::Markup(MarkupType::Highlight) => "#FFFF00",
            Tool::Markup(MarkupType::Underline) => "#0000FF",
            Tool::Markup(MarkupType::Strikeout) => "#FF0000",
            Tool::Shape(_) => "#0000FF",
            Tool::Pen => "#FF0000",
            Tool::Note => "#FFEB3B",
            Tool::Select => "#000000",
        }
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "select" | "none" | "" => Ok(Tool::Select),
            "highlight" => Ok(Tool::Markup(MarkupType::Highlight)),
            "underline" => Ok(Tool::Markup(MarkupType::Underline)),
            "strikeout" | "strikethrough" => Ok(Tool::Markup(MarkupType::Strikeout)),
            "rect" | "rectangle" => Ok(Tool::Shape(ShapeType::Rectangle)),
            "circle" => Ok(Tool::Shape(ShapeType::Circle)),
            "line" => Ok(Tool::Shape(ShapeType::Line)),
            "arrow" => Ok(Tool::Shape(ShapeType::Arrow)),
            "pen" | "draw" => Ok(Tool::Pen),
            "note" | "comment" => Ok(Tool::Note),
            other => Err(format!("Unknown tool: {}", other)),
        }
    }
}

/// Overrides for the active tool's defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolStyle {
    pub color: Option<String>,
    pub stroke_width: Option<f64>,
    pub filled: bool,
}

const DEFAULT_STROKE_WIDTH: f64 = 2.0;

/// Result of a hit test.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub edit: EditRef,
    /// Set when the point landed on a resize hotspot.
    pub handle: Option<Handle>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    Idle,
    /// `start` is the drag origin in screen pixels.
    Drawing { start: Point },
    /// `last` is the previous pointer position in screen pixels.
    Moving { edit: EditRef, last: Point },
    /// `anchor` is the pinned corner in screen pixels.
    Resizing {
        edit: EditRef,
        handle: Handle,
        anchor: Point,
    },
}

#[derive(Debug, Clone)]
pub struct OverlayEngine {
    doc_id: String,
    page: u32,
    zoom: f64,
    tool: Tool,
    style: ToolStyle,
    config: OverlayConfig,
    interaction: Interaction,
    draft: Option<EditRecord>,
    selection: Option<EditRef>,
}

impl OverlayEngine {
    pub fn new(doc_id: impl Into<String>, page: u32, config: OverlayConfig) -> Self {
        Self {
            doc_id: doc_id.into(),
            page,
            zoom: 1.0,
            tool: Tool::Select,
            style: ToolStyle::default(),
            config,
            interaction: Interaction::Idle,
            draft: None,
            selection: None,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn state(&self) -> &Interaction {
        &self.interaction
    }

    pub fn selection(&self) -> Option<&EditRef> {
        self.selection.as_ref()
    }

    /// Record under construction, for live rendering.
    pub fn draft(&self) -> Option<&EditRecord> {
        self.draft.as_ref()
    }

    /// Non-positive or non-finite zoom values are ignored. Stored records are
    /// untouched; only the display scale changes.
    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() && zoom > 0.0 {
            self.zoom = zoom;
        }
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.cancel();
        if tool != Tool::Select {
            self.selection = None;
        }
        self.tool = tool;
    }

    pub fn set_style(&mut self, style: ToolStyle) {
        self.style = style;
    }

    pub fn select(&mut self, edit: Option<EditRef>) {
        self.selection = edit;
    }

    /// Abandon any drag and drop the draft.
    pub fn cancel(&mut self) {
        self.interaction = Interaction::Idle;
        self.draft = None;
    }

    pub fn pointer_down(&mut self, store: &mut EditStore, p: Point) {
        if self.interaction != Interaction::Idle {
            self.cancel();
        }

        if self.tool == Tool::Select {
            match self.hit_test(store, p) {
                Some(Hit {
                    edit,
                    handle: Some(handle),
                }) => {
                    let anchor = store
                        .find(&self.doc_id, &edit)
                        .map(|record| handle.opposite().corner(self.display_bounds(&record)));
                    if let Some(anchor) = anchor {
                        self.selection = Some(edit.clone());
                        self.interaction = Interaction::Resizing {
                            edit,
                            handle,
                            anchor,
                        };
                    }
                }
                Some(Hit { edit, handle: None }) => {
                    self.selection = Some(edit.clone());
                    self.interaction = Interaction::Moving { edit, last: p };
                }
                None => self.selection = None,
            }
            return;
        }

        self.selection = None;
        self.draft = Some(self.start_draft(p));
        self.interaction = Interaction::Drawing { start: p };
    }

    pub fn pointer_move(&mut self, store: &mut EditStore, p: Point) {
        match self.interaction.clone() {
            Interaction::Idle => {}
            Interaction::Drawing { start } => self.update_draft(start, p),
            Interaction::Moving { edit, last } => {
                let Some(record) = store.find(&self.doc_id, &edit) else {
                    self.interaction = Interaction::Idle;
                    self.selection = None;
                    return;
                };
                let dx = (p.x - last.x) / self.zoom;
                let dy = (p.y - last.y) / self.zoom;
                if dx != 0.0 || dy != 0.0 {
                    store.upsert_record(&self.doc_id, record.translated(dx, dy));
                }
                self.interaction = Interaction::Moving { edit, last: p };
            }
            Interaction::Resizing {
                edit,
                handle,
                anchor,
            } => {
                let Some(record) = store.find(&self.doc_id, &edit) else {
                    self.interaction = Interaction::Idle;
                    self.selection = None;
                    return;
                };
                let screen = resize_from_anchor(anchor, p, handle, self.config.resize_floor);
                let bounds = screen.scaled(1.0 / self.zoom);
                store.upsert_record(&self.doc_id, record.with_bounds(bounds));
            }
        }
    }

    /// Finish the current gesture. Returns the committed record when a draft
    /// was large enough to keep.
    pub fn pointer_up(&mut self, store: &mut EditStore, p: Point) -> Option<EditRef> {
        self.pointer_move(store, p);

        let interaction = std::mem::replace(&mut self.interaction, Interaction::Idle);
        let Interaction::Drawing { start } = interaction else {
            return None;
        };
        let draft = self.draft.take()?;
        if !self.meets_threshold(&draft, start, p) {
            debug!(kind = %draft.kind(), "Discarded undersized draft");
            return None;
        }

        let edit = draft.edit_ref();
        debug!(kind = %edit.kind, id = %edit.id, page = self.page, "Committed edit");
        store.upsert_record(&self.doc_id, draft);
        Some(edit)
    }

    /// Delete/Backspace remove the selection; Escape abandons the gesture.
    pub fn key_down(&mut self, store: &mut EditStore, key: &str) -> bool {
        match key {
            "Delete" | "Backspace" => self.delete_selection(store),
            "Escape" => {
                self.cancel();
                self.selection = None;
                false
            }
            _ => false,
        }
    }

    /// Remove the selected record if it still exists.
    pub fn delete_selection(&mut self, store: &mut EditStore) -> bool {
        let Some(edit) = self.selection.take() else {
            return false;
        };
        self.cancel();
        if store.find(&self.doc_id, &edit).is_none() {
            return false;
        }
        debug!(kind = %edit.kind, id = %edit.id, "Deleted edit");
        store.remove_record(&self.doc_id, &edit)
    }

    pub fn recolor_selection(&mut self, store: &mut EditStore, color: &str) -> bool {
        let Some(record) = self
            .selection
            .as_ref()
            .and_then(|edit| store.find(&self.doc_id, edit))
        else {
            return false;
        };
        store.upsert_record(&self.doc_id, record.with_color(color));
        true
    }

    /// Topmost record under `p`. Kinds are tried notes first, then pen
    /// strokes, shapes, markups, image edits and text edits; within a kind
    /// the most recently added record wins.
    pub fn hit_test(&self, store: &EditStore, p: Point) -> Option<Hit> {
        let zoom = self.zoom;

        let notes = store.get::<StickyNote>(&self.doc_id);
        for note in notes.iter().rev().filter(|n| n.page == self.page) {
            if hit_note(to_screen(note.anchor(), zoom), NOTE_ICON_SIZE, p) {
                return Some(Hit {
                    edit: EditRef::new(EditKindTag::Note, note.id.clone()),
                    handle: None,
                });
            }
        }

        let pens = store.get::<PenStroke>(&self.doc_id);
        for pen in pens.iter().rev().filter(|s| s.page == self.page) {
            let points: Vec<Point> = pen.points.iter().map(|pt| to_screen(*pt, zoom)).collect();
            if hit_pen(
                &points,
                pen.stroke_width * zoom,
                p,
                self.config.pen_hit_padding,
                self.config.pen_hit_tolerance,
            ) {
                return Some(Hit {
                    edit: EditRef::new(EditKindTag::Pen, pen.id.clone()),
                    handle: None,
                });
            }
        }

        self.hit_boxes::<Shape>(store, p, |s| (s.page, s.bounds()))
            .or_else(|| self.hit_boxes::<Markup>(store, p, |m| (m.page, m.bounds())))
            .or_else(|| self.hit_boxes::<ImageEdit>(store, p, |i| (i.page, i.bounds())))
            .or_else(|| self.hit_boxes::<TextEdit>(store, p, |t| (t.page, t.bounds())))
    }

    fn hit_boxes<K: EditKind>(
        &self,
        store: &EditStore,
        p: Point,
        placement: impl Fn(&K) -> (u32, Rect),
    ) -> Option<Hit> {
        let items = store.get::<K>(&self.doc_id);
        items.iter().rev().find_map(|item| {
            let (page, bounds) = placement(item);
            if page != self.page {
                return None;
            }
            let screen = bounds.scaled(self.zoom);
            let handle = handle_at(screen, p, self.config.handle_size);
            (handle.is_some() || screen.contains(p)).then(|| Hit {
                edit: EditRef::new(K::KIND, item.id()),
                handle,
            })
        })
    }

    /// Outline of the selected record in screen pixels.
    pub fn selection_bounds(&self, store: &EditStore) -> Option<Rect> {
        let record = store.find(&self.doc_id, self.selection.as_ref()?)?;
        Some(self.display_bounds(&record))
    }

    /// Corner hotspots of the selection in screen pixels; empty for kinds
    /// that cannot be resized.
    pub fn resize_handles(&self, store: &EditStore) -> Vec<(Handle, Rect)> {
        let Some(record) = self
            .selection
            .as_ref()
            .and_then(|edit| store.find(&self.doc_id, edit))
        else {
            return Vec::new();
        };
        if !record.is_resizable() {
            return Vec::new();
        }
        handle_rects(self.display_bounds(&record), self.config.handle_size).to_vec()
    }

    /// Screen-space box of a record at the current zoom.
    pub fn display_bounds(&self, record: &EditRecord) -> Rect {
        match record {
            EditRecord::Note(note) => {
                let anchor = to_screen(note.anchor(), self.zoom);
                Rect::new(anchor.x, anchor.y, NOTE_ICON_SIZE, NOTE_ICON_SIZE)
            }
            other => other.bounds().scaled(self.zoom),
        }
    }

    fn stroke_width(&self) -> f64 {
        self.style.stroke_width.unwrap_or(DEFAULT_STROKE_WIDTH)
    }

    fn color(&self) -> String {
        self.style
            .color
            .clone()
            .unwrap_or_else(|| self.tool.default_color().to_string())
    }

    fn start_draft(&self, p: Point) -> EditRecord {
        let origin = to_page_normalized(p, self.zoom);
        let at = Rect::new(origin.x, origin.y, 0.0, 0.0);
        match self.tool {
            Tool::Markup(markup_type) => {
                EditRecord::Markup(Markup::new(self.page, at, markup_type, self.color(), self.zoom))
            }
            Tool::Shape(shape_type) => EditRecord::Shape(Shape {
                id: new_id(),
                page: self.page,
                shape_type,
                x: at.x,
                y: at.y,
                width: 0.0,
                height: 0.0,
                color: self.color(),
                stroke_width: self.stroke_width(),
                filled: self.style.filled,
                flip_x: false,
                flip_y: false,
                creation_zoom: self.zoom,
            }),
            Tool::Pen => EditRecord::Pen(PenStroke {
                id: new_id(),
                page: self.page,
                points: vec![origin],
                color: self.color(),
                stroke_width: self.stroke_width(),
                creation_zoom: self.zoom,
            }),
            Tool::Note | Tool::Select => {
                EditRecord::Note(StickyNote::new(self.page, origin, self.color(), self.zoom))
            }
        }
    }

    fn update_draft(&mut self, start: Point, p: Point) {
        let zoom = self.zoom;
        let rect = Rect::from_corners(start, p).scaled(1.0 / zoom);
        match self.draft.as_mut() {
            Some(EditRecord::Markup(m)) => {
                m.x = rect.x;
                m.y = rect.y;
                m.width = rect.width;
                m.height = rect.height;
            }
            Some(EditRecord::Shape(s)) => {
                s.x = rect.x;
                s.y = rect.y;
                s.width = rect.width;
                s.height = rect.height;
                s.flip_x = p.x < start.x;
                s.flip_y = p.y < start.y;
            }
            Some(EditRecord::Pen(pen)) => {
                let point = to_page_normalized(p, zoom);
                if pen.points.last() != Some(&point) {
                    pen.points.push(point);
                }
            }
            _ => {}
        }
    }

    fn meets_threshold(&self, draft: &EditRecord, start: Point, end: Point) -> bool {
        let min = self.config.min_draft_size;
        let dragged = Rect::from_corners(start, end);
        match draft {
            EditRecord::Markup(_) => dragged.width > min && dragged.height > min,
            EditRecord::Shape(s) => match s.shape_type {
                ShapeType::Line | ShapeType::Arrow => start.distance(end) > min,
                ShapeType::Rectangle | ShapeType::Circle => {
                    dragged.width > min && dragged.height > min
                }
            },
            EditRecord::Pen(pen) => pen.points.len() > 1,
            EditRecord::Note(_) => true,
            EditRecord::Text(_) | EditRecord::Image(_) => false,
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn points_inside_hit_and_outside_miss(
            x in 0.0f64..400.0, y in 0.0f64..400.0,
            w in 10.0f64..200.0, h in 10.0f64..200.0,
            fx in 0.01f64..0.99, fy in 0.01f64..0.99,
            zoom in 0.5f64..4.0,
            away in 0.1f64..100.0,
        ) {
            let mut store = EditStore::new();
            let record = Markup::new(0, Rect::new(x, y, w, h), MarkupType::Highlight, "#FFFF00", 1.0);
            let id = record.id.clone();
            store.upsert("doc", record);

            let mut engine = OverlayEngine::new("doc", 0, OverlayConfig::default());
            engine.set_zoom(zoom);
            let screen = Rect::new(x, y, w, h).scaled(zoom);

            let inside = Point::new(screen.x + fx * screen.width, screen.y + fy * screen.height);
            let hit = engine.hit_test(&store, inside);
            prop_assert_eq!(hit.map(|h| h.edit.id), Some(id));

            // beyond the box plus half a hotspot
            let pad = OverlayConfig::default().handle_size / 2.0;
            let outside = Point::new(screen.right() + pad + away, inside.y);
            prop_assert!(engine.hit_test(&store, outside).is_none());
        }

        #[test]
        fn pen_hit_iff_within_half_width_plus_tolerance(
            x0 in 0.0f64..300.0, len in 10.0f64..200.0,
            t in 0.0f64..1.0, width in 0.5f64..12.0,
            zoom in 0.5f64..4.0,
        ) {
            let mut store = EditStore::new();
            store.upsert("doc", PenStroke {
                id: "pen".to_string(),
                page: 0,
                points: vec![Point::new(x0, 50.0), Point::new(x0 + len, 50.0)],
                color: "#000000".to_string(),
                stroke_width: width,
                creation_zoom: 1.0,
            });
            let config = OverlayConfig::default();
            let mut engine = OverlayEngine::new("doc", 0, config.clone());
            engine.set_zoom(zoom);

            let limit = width * zoom / 2.0 + config.pen_hit_tolerance;
            let x = (x0 + t * len) * zoom;
            let y = 50.0 * zoom;
            prop_assert!(engine.hit_test(&store, Point::new(x, y + limit - 1e-6)).is_some());
            prop_assert!(engine.hit_test(&store, Point::new(x, y - limit + 1e-6)).is_some());
            prop_assert!(engine.hit_test(&store, Point::new(x, y + limit + 1e-6)).is_none());
        }
    }
}
