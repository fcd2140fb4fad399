//! PDF compositor
//!
//! Draws every edit collection of a document into the page content of a
//! fresh copy of the source bytes. Kinds are drawn in a fixed order so later
//! draws occlude earlier ones: text edits, image edits, shapes, pen strokes,
//! sticky notes, then markups on top.
//!
//! Per-record problems (page out of range, undecodable image payload) are
//! logged and counted in the [`CompositeReport`]; only a source that cannot
//! be loaded fails the whole call.

mod draw;
mod image;
mod page;

pub use page::PageGeometry;

use crate::config::CompositorConfig;
use crate::coords::{Point, Rect};
use crate::error::AnnotateError;
use crate::records::{
    ImageEdit, Markup, MarkupType, PenStroke, Shape, ShapeType, StickyNote, TextEdit,
    NOTE_ICON_SIZE,
};
use crate::store::DocumentEdits;
use crate::style::{encode_win_ansi, standard_font, Color};
use draw::*;
use lopdf::{dictionary, Document, Object, ObjectId};
use page::PageCanvas;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Outcome counters for one compositing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeReport {
    pub page_count: usize,
    pub applied: usize,
    pub skipped_out_of_range: usize,
    pub skipped_noop: usize,
    pub failed: usize,
}

enum Drawn {
    Applied,
    Noop,
}

/// Composite all edits onto a copy of `source` and return the new bytes.
pub fn composite(
    source: &[u8],
    edits: &DocumentEdits,
    config: &CompositorConfig,
) -> Result<Vec<u8>, AnnotateError> {
    composite_with_report(source, edits, config).map(|(bytes, _)| bytes)
}

/// Like [`composite`], also returning what happened to each record.
pub fn composite_with_report(
    source: &[u8],
    edits: &DocumentEdits,
    config: &CompositorConfig,
) -> Result<(Vec<u8>, CompositeReport), AnnotateError> {
    let mut doc =
        Document::load_mem(source).map_err(|e| AnnotateError::ParseError(e.to_string()))?;

    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if edits.is_empty() {
        debug!("No edits to composite");
        let report = CompositeReport {
            page_count: pages.len(),
            ..Default::default()
        };
        return Ok((source.to_vec(), report));
    }

    let mut compositor = Compositor {
        doc: &mut doc,
        pages: &pages,
        canvases: BTreeMap::new(),
        config,
        report: CompositeReport {
            page_count: pages.len(),
            ..Default::default()
        },
    };

    for edit in edits.texts.iter() {
        compositor.apply(edit.page, &edit.id, "text", |c, canvas| {
            c.draw_text(canvas, edit)
        });
    }
    for edit in edits.images.iter() {
        compositor.apply(edit.page, &edit.id, "image", |c, canvas| {
            c.draw_image(canvas, edit)
        });
    }
    for edit in edits.shapes.iter() {
        compositor.apply(edit.page, &edit.id, "shape", |c, canvas| {
            c.draw_shape(canvas, edit)
        });
    }
    for edit in edits.pens.iter() {
        compositor.apply(edit.page, &edit.id, "pen", |c, canvas| {
            c.draw_pen(canvas, edit)
        });
    }
    for edit in edits.notes.iter() {
        compositor.apply(edit.page, &edit.id, "note", |c, canvas| {
            c.draw_note(canvas, edit)
        });
    }
    for edit in edits.markups.iter() {
        compositor.apply(edit.page, &edit.id, "markup", |c, canvas| {
            c.draw_markup(canvas, edit)
        });
    }

    let report = compositor.finish();

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| AnnotateError::OperationError(e.to_string()))?;

    info!(
        applied = report.applied,
        skipped_out_of_range = report.skipped_out_of_range,
        skipped_noop = report.skipped_noop,
        failed = report.failed,
        "Composited edits"
    );
    Ok((output, report))
}

/// Number of pages in a PDF.
pub fn get_page_count(bytes: &[u8]) -> Result<usize, AnnotateError> {
    let doc = Document::load_mem(bytes).map_err(|e| AnnotateError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len())
}

/// Size of each page in PDF units, in page order.
pub fn page_sizes(bytes: &[u8]) -> Result<Vec<PageGeometry>, AnnotateError> {
    let doc = Document::load_mem(bytes).map_err(|e| AnnotateError::ParseError(e.to_string()))?;
    Ok(doc
        .get_pages()
        .into_values()
        .map(|page_id| PageGeometry::of_page(&doc, page_id))
        .collect())
}

struct Compositor<'a> {
    doc: &'a mut Document,
    pages: &'a [ObjectId],
    canvases: BTreeMap<usize, PageCanvas>,
    config: &'a CompositorConfig,
    report: CompositeReport,
}

impl<'a> Compositor<'a> {
    /// Resolve the page, run one draw, and account for the result.
    fn apply<F>(&mut self, page: u32, id: &str, kind: &str, render: F)
    where
        F: FnOnce(&mut Self, &mut PageCanvas) -> Result<Drawn, AnnotateError>,
    {
        let index = page as usize;
        let Some(&page_id) = self.pages.get(index) else {
            warn!(id, kind, page, pages = self.pages.len(), "Skipping edit on missing page");
            self.report.skipped_out_of_range += 1;
            return;
        };

        let mut canvas = match self.canvases.remove(&index) {
            Some(canvas) => canvas,
            None => PageCanvas::new(self.doc, page_id),
        };
        match render(self, &mut canvas) {
            Ok(Drawn::Applied) => {
                debug!(id, kind, page, "Applied edit");
                canvas.applied += 1;
            }
            Ok(Drawn::Noop) => {
                debug!(id, kind, page, "Edit changes nothing");
                self.report.skipped_noop += 1;
            }
            Err(e) => {
                warn!(id, kind, page, error = %e, "Failed to draw edit");
                self.report.failed += 1;
            }
        }
        self.canvases.insert(index, canvas);
    }

    fn finish(mut self) -> CompositeReport {
        let canvases = std::mem::take(&mut self.canvases);
        for (index, canvas) in canvases {
            let applied = canvas.applied;
            match canvas.flush(self.doc) {
                Ok(()) => self.report.applied += applied,
                Err(e) => {
                    warn!(page = index, error = %e, "Failed to write page content");
                    self.report.failed += applied;
                }
            }
        }
        self.report
    }

    fn draw_text(&mut self, canvas: &mut PageCanvas, edit: &TextEdit) -> Result<Drawn, AnnotateError> {
        let geometry = canvas.geometry;
        let bounds = geometry.rect_to_pdf(edit.bounds());

        if !edit.is_inserted() {
            let pad = self.config.text_cover;
            let cover = Rect::new(
                bounds.x - pad.left,
                bounds.y - pad.bottom,
                bounds.width + pad.left + pad.right,
                bounds.height + pad.bottom + pad.top,
            );
            canvas.extend([save(), fill_color(Color::WHITE), rect(cover), fill(), restore()]);
        }

        if edit.edited_text.is_empty() {
            return Ok(Drawn::Applied);
        }

        // Inserted text anchors at its baseline point; replacements sit at
        // the bottom of the run's box.
        let origin = if edit.is_inserted() {
            geometry.point_to_pdf(Point::new(edit.x, edit.y))
        } else {
            Point::new(bounds.x, bounds.y)
        };

        let base_font = standard_font(&edit.font_family, edit.is_bold, edit.is_italic);
        let font = canvas.font(base_font);
        let color = edit
            .font_color
            .as_deref()
            .map(|c| Color::parse_or(c, Color::BLACK))
            .unwrap_or(Color::BLACK);
        let lines: Vec<Vec<u8>> = edit
            .edited_text
            .lines()
            .map(encode_win_ansi)
            .collect();

        canvas.push(save());
        canvas.push(fill_color(color));
        canvas.extend(text_block(
            &font,
            edit.font_size,
            edit.font_size * self.config.line_height,
            origin,
            &lines,
        ));
        canvas.push(restore());
        Ok(Drawn::Applied)
    }

    fn draw_image(&mut self, canvas: &mut PageCanvas, edit: &ImageEdit) -> Result<Drawn, AnnotateError> {
        if edit.is_noop() {
            return Ok(Drawn::Noop);
        }

        let original = canvas.geometry.rect_to_pdf(edit.original_bounds());
        canvas.extend([save(), fill_color(Color::WHITE), rect(original), fill(), restore()]);
        if edit.deleted {
            return Ok(Drawn::Applied);
        }

        let data = edit
            .image_data
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| AnnotateError::ImageError("Moved image has no payload".to_string()))?;
        let (media, bytes) = image::parse_data_uri(data)?;
        let xobject = image::embed_image(self.doc, media, &bytes)?;
        let name = canvas.image(xobject);
        let target = canvas.geometry.rect_to_pdf(edit.bounds());
        canvas.extend(place_xobject(&name, target));
        Ok(Drawn::Applied)
    }

    fn draw_markup(&mut self, canvas: &mut PageCanvas, edit: &Markup) -> Result<Drawn, AnnotateError> {
        let bounds = canvas.geometry.rect_to_pdf(edit.bounds());
        let color = Color::parse_or(&edit.color, Color::rgb(1.0, 1.0, 0.0));
        let thickness = self.config.markup_bar_thickness.min(bounds.height.max(0.0));

        let (area, alpha) = match edit.markup_type {
            MarkupType::Highlight => (
                bounds,
                color.alpha.unwrap_or(self.config.highlight_opacity as f32),
            ),
            MarkupType::Underline => (
                Rect::new(bounds.x, bounds.y, bounds.width, thickness),
                color.alpha.unwrap_or(1.0),
            ),
            MarkupType::Strikeout => (
                Rect::new(
                    bounds.x,
                    bounds.y + bounds.height / 2.0 - thickness / 2.0,
                    bounds.width,
                    thickness,
                ),
                color.alpha.unwrap_or(1.0),
            ),
        };

        canvas.push(save());
        if alpha < 1.0 {
            let gs = canvas.opacity(alpha);
            canvas.push(graphics_state(&gs));
        }
        canvas.extend([fill_color(color), rect(area), fill(), restore()]);
        Ok(Drawn::Applied)
    }

    fn draw_shape(&mut self, canvas: &mut PageCanvas, edit: &Shape) -> Result<Drawn, AnnotateError> {
        let geometry = canvas.geometry;
        let color = Color::parse_or(&edit.color, Color::BLACK);

        canvas.push(save());
        if let Some(alpha) = color.alpha.filter(|a| *a < 1.0) {
            let gs = canvas.opacity(alpha);
            canvas.push(graphics_state(&gs));
        }
        canvas.extend([stroke_color(color), fill_color(color), line_width(edit.stroke_width)]);

        let paint = if edit.filled { fill_and_stroke() } else { stroke() };
        match edit.shape_type {
            ShapeType::Rectangle => {
                canvas.extend([rect(geometry.rect_to_pdf(edit.bounds())), paint]);
            }
            ShapeType::Circle => {
                canvas.extend(ellipse(geometry.rect_to_pdf(edit.bounds())));
                canvas.push(paint);
            }
            ShapeType::Line | ShapeType::Arrow => {
                let (start, end) = edit.endpoints();
                let start = geometry.point_to_pdf(start);
                let end = geometry.point_to_pdf(end);
                canvas.extend(round_ends());
                canvas.extend([move_to(start), line_to(end), stroke()]);
                if edit.shape_type == ShapeType::Arrow {
                    let [tip, left, right] = arrow_head(start, end, self.config.arrow_head_length);
                    canvas.extend([move_to(tip), line_to(left), line_to(right), close_path(), fill()]);
                }
            }
        }
        canvas.push(restore());
        Ok(Drawn::Applied)
    }

    fn draw_pen(&mut self, canvas: &mut PageCanvas, edit: &PenStroke) -> Result<Drawn, AnnotateError> {
        let geometry = canvas.geometry;
        let mut points = edit.points.iter().map(|p| geometry.point_to_pdf(*p));
        let Some(first) = points.next() else {
            return Ok(Drawn::Noop);
        };
        let color = Color::parse_or(&edit.color, Color::BLACK);

        canvas.push(save());
        if let Some(alpha) = color.alpha.filter(|a| *a < 1.0) {
            let gs = canvas.opacity(alpha);
            canvas.push(graphics_state(&gs));
        }
        canvas.extend([stroke_color(color), line_width(edit.stroke_width)]);
        canvas.extend(round_ends());
        canvas.push(move_to(first));
        let mut segments = 0;
        for p in points {
            canvas.push(line_to(p));
            segments += 1;
        }
        if segments == 0 {
            // a lone point still shows as a round dot
            canvas.push(line_to(first));
        }
        canvas.extend([stroke(), restore()]);
        Ok(Drawn::Applied)
    }

    fn draw_note(&mut self, canvas: &mut PageCanvas, edit: &StickyNote) -> Result<Drawn, AnnotateError> {
        let size = NOTE_ICON_SIZE;
        let icon = canvas
            .geometry
            .rect_to_pdf(Rect::new(edit.x, edit.y, size, size));
        let color = Color::parse_or(&edit.color, Color::rgb(1.0, 0.92, 0.23));

        canvas.extend([
            save(),
            fill_color(color),
            stroke_color(Color::rgb(0.4, 0.4, 0.4)),
            line_width(0.5),
            rect(icon),
            fill_and_stroke(),
            restore(),
        ]);

        let [r, g, b] = color.components();
        let annot = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Text",
            "Rect" => vec![
                real(icon.x),
                real(icon.y),
                real(icon.right()),
                real(icon.bottom()),
            ],
            "Contents" => text_string(&edit.text),
            "NM" => text_string(&edit.id),
            "Name" => "Comment",
            "C" => vec![Object::Real(r), Object::Real(g), Object::Real(b)],
            "Open" => false,
        };
        let annot_id = self.doc.add_object(annot);
        canvas.add_annotation(annot_id);
        Ok(Drawn::Applied)
    }
}
