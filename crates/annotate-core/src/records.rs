//! Edit record types
//!
//! Every record stores its geometry in page-normalized units (screen pixels
//! divided by the zoom in effect at capture). `creation_zoom` is kept as the
//! capture provenance so a record can still be re-expressed in capture-time
//! screen pixels.

use crate::compositor::PageGeometry;
use crate::coords::{to_page_normalized, Point, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reserved id prefix for text inserted by the user (no original glyph run).
pub const INSERTED_TEXT_PREFIX: &str = "new-text-";

/// Side of the square sticky-note icon, in screen pixels on the overlay and
/// page units in the output.
pub const NOTE_ICON_SIZE: f64 = 18.0;

fn default_zoom() -> f64 {
    1.0
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkupType {
    #[default]
    Highlight,
    Underline,
    Strikeout,
}

/// Highlight, underline or strikeout over a rectangle of page content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Markup {
    pub id: String,
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: String,
    #[serde(default)]
    pub markup_type: MarkupType,
    /// Text under the mark, when the surface could extract it.
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_zoom")]
    pub creation_zoom: f64,
}

impl Markup {
    pub fn new(
        page: u32,
        rect: Rect,
        markup_type: MarkupType,
        color: impl Into<String>,
        creation_zoom: f64,
    ) -> Self {
        Self {
            id: new_id(),
            page,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            color: color.into(),
            markup_type,
            text: String::new(),
            creation_zoom,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickyNote {
    pub id: String,
    pub page: u32,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub text: String,
    pub color: String,
    #[serde(default = "default_zoom")]
    pub creation_zoom: f64,
    #[serde(default)]
    pub is_expanded: bool,
}

impl StickyNote {
    pub fn new(page: u32, at: Point, color: impl Into<String>, creation_zoom: f64) -> Self {
        Self {
            id: new_id(),
            page,
            x: at.x,
            y: at.y,
            text: String::new(),
            color: color.into(),
            creation_zoom,
            is_expanded: false,
        }
    }

    pub fn anchor(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Freehand polyline, at least two points once committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PenStroke {
    pub id: String,
    pub page: u32,
    pub points: Vec<Point>,
    pub color: String,
    pub stroke_width: f64,
    #[serde(default = "default_zoom")]
    pub creation_zoom: f64,
}

impl PenStroke {
    pub fn bounds(&self) -> Rect {
        Rect::bounding(&self.points).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    Rectangle,
    Circle,
    Line,
    Arrow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    pub id: String,
    pub page: u32,
    pub shape_type: ShapeType,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: String,
    pub stroke_width: f64,
    #[serde(default)]
    pub filled: bool,
    /// Line and arrow run right-to-left.
    #[serde(default)]
    pub flip_x: bool,
    /// Line and arrow run bottom-to-top.
    #[serde(default)]
    pub flip_y: bool,
    #[serde(default = "default_zoom")]
    pub creation_zoom: f64,
}

impl Shape {
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Start and end of a line or arrow, honoring the drag direction.
    pub fn endpoints(&self) -> (Point, Point) {
        let (x0, x1) = if self.flip_x {
            (self.x + self.width, self.x)
        } else {
            (self.x, self.x + self.width)
        };
        let (y0, y1) = if self.flip_y {
            (self.y + self.height, self.y)
        } else {
            (self.y, self.y + self.height)
        };
        (Point::new(x0, y0), Point::new(x1, y1))
    }
}

/// Replacement of an extracted text run, or newly inserted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
    /// Extracted run id, or [`INSERTED_TEXT_PREFIX`] + unique suffix.
    pub id: String,
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub original_text: String,
    pub edited_text: String,
    pub font_size: f64,
    #[serde(default)]
    pub font_family: String,
    #[serde(default)]
    pub font_color: Option<String>,
    #[serde(default)]
    pub is_bold: bool,
    #[serde(default)]
    pub is_italic: bool,
    #[serde(default = "default_zoom")]
    pub creation_zoom: f64,
}

impl TextEdit {
    /// New text anchored at `baseline` (page units, top-left origin).
    pub fn inserted(
        page: u32,
        baseline: Point,
        text: impl Into<String>,
        font_size: f64,
        font_family: impl Into<String>,
        creation_zoom: f64,
    ) -> Self {
        let text = text.into();
        Self {
            id: format!("{}{}", INSERTED_TEXT_PREFIX, new_id()),
            page,
            x: baseline.x,
            y: baseline.y,
            // Rough advance width for selection; the compositor never uses it.
            width: text.chars().count() as f64 * font_size * 0.5,
            height: font_size,
            original_text: String::new(),
            edited_text: text,
            font_size,
            font_family: font_family.into(),
            font_color: None,
            is_bold: false,
            is_italic: false,
            creation_zoom,
        }
    }

    /// Replace the text of an extracted run. The run's PDF-space box is
    /// converted to page units against the page's MediaBox.
    pub fn replacing(
        run: &TextRun,
        page: u32,
        edited_text: impl Into<String>,
        geometry: &PageGeometry,
    ) -> Self {
        let rect = geometry.rect_from_pdf(run.pdf_rect());
        Self {
            id: run.id.clone(),
            page,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            original_text: run.text.clone(),
            edited_text: edited_text.into(),
            font_size: run.pdf_font_size,
            font_family: run.font_family.clone(),
            font_color: None,
            is_bold: false,
            is_italic: false,
            creation_zoom: run.capture_zoom(),
        }
    }

    pub fn is_inserted(&self) -> bool {
        self.id.starts_with(INSERTED_TEXT_PREFIX)
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Image move/resize/replace/delete, keeping the extracted placement for reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEdit {
    pub id: String,
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub original_x: f64,
    pub original_y: f64,
    pub original_width: f64,
    pub original_height: f64,
    #[serde(default)]
    pub deleted: bool,
    /// Replacement payload as a `data:image/...;base64,` URI.
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default = "default_zoom", alias = "zoom")]
    pub creation_zoom: f64,
}

impl ImageEdit {
    /// Start tracking an image region reported by the rendering surface.
    pub fn from_region(region: &ImageRegion, zoom: f64) -> Self {
        let origin = to_page_normalized(Point::new(region.x, region.y), zoom);
        let width = region.width / zoom;
        let height = region.height / zoom;
        Self {
            id: region.id.clone(),
            page: region.page,
            x: origin.x,
            y: origin.y,
            width,
            height,
            original_x: origin.x,
            original_y: origin.y,
            original_width: width,
            original_height: height,
            deleted: false,
            image_data: None,
            creation_zoom: zoom,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn original_bounds(&self) -> Rect {
        Rect::new(
            self.original_x,
            self.original_y,
            self.original_width,
            self.original_height,
        )
    }

    pub fn has_payload(&self) -> bool {
        self.image_data.as_deref().is_some_and(|d| !d.is_empty())
    }

    pub fn is_moved(&self) -> bool {
        self.bounds() != self.original_bounds()
    }

    /// Nothing to composite: not deleted, no payload, still in place.
    pub fn is_noop(&self) -> bool {
        !self.deleted && !self.has_payload() && !self.is_moved()
    }

    /// Back to the extracted placement with no deletion or replacement.
    pub fn reset(&self) -> Self {
        Self {
            x: self.original_x,
            y: self.original_y,
            width: self.original_width,
            height: self.original_height,
            deleted: false,
            image_data: None,
            ..self.clone()
        }
    }
}

/// Text run extracted by the rendering surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRun {
    pub id: String,
    #[serde(rename = "str")]
    pub text: String,
    pub screen_x: f64,
    pub screen_y: f64,
    pub screen_width: f64,
    pub screen_height: f64,
    pub pdf_x: f64,
    pub pdf_y: f64,
    pub pdf_width: f64,
    pub pdf_height: f64,
    pub pdf_font_size: f64,
    #[serde(default)]
    pub font_family: String,
}

impl TextRun {
    pub fn pdf_rect(&self) -> Rect {
        Rect::new(self.pdf_x, self.pdf_y, self.pdf_width, self.pdf_height)
    }

    /// Zoom the run was reported at, derived from its screen and PDF widths.
    pub fn capture_zoom(&self) -> f64 {
        if self.pdf_width > 0.0 && self.screen_width > 0.0 {
            self.screen_width / self.pdf_width
        } else {
            1.0
        }
    }
}

/// Image placement extracted by the rendering surface, in screen pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegion {
    pub id: String,
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditKindTag {
    Markup,
    Note,
    Pen,
    Shape,
    Text,
    Image,
}

impl EditKindTag {
    pub const ALL: [EditKindTag; 6] = [
        EditKindTag::Markup,
        EditKindTag::Note,
        EditKindTag::Pen,
        EditKindTag::Shape,
        EditKindTag::Text,
        EditKindTag::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EditKindTag::Markup => "markup",
            EditKindTag::Note => "note",
            EditKindTag::Pen => "pen",
            EditKindTag::Shape => "shape",
            EditKindTag::Text => "text",
            EditKindTag::Image => "image",
        }
    }
}

impl fmt::Display for EditKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditKindTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markup" | "highlight" | "underline" | "strikeout" => Ok(EditKindTag::Markup),
            "note" | "sticky-note" => Ok(EditKindTag::Note),
            "pen" => Ok(EditKindTag::Pen),
            "shape" | "shapes" => Ok(EditKindTag::Shape),
            "text" => Ok(EditKindTag::Text),
            "image" => Ok(EditKindTag::Image),
            other => Err(format!("Unknown edit kind: {}", other)),
        }
    }
}

/// Addresses one record in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditRef {
    pub kind: EditKindTag,
    pub id: String,
}

impl EditRef {
    pub fn new(kind: EditKindTag, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// Any edit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EditRecord {
    Markup(Markup),
    Note(StickyNote),
    Pen(PenStroke),
    Shape(Shape),
    Text(TextEdit),
    Image(ImageEdit),
}

impl EditRecord {
    pub fn id(&self) -> &str {
        match self {
            EditRecord::Markup(r) => &r.id,
            EditRecord::Note(r) => &r.id,
            EditRecord::Pen(r) => &r.id,
            EditRecord::Shape(r) => &r.id,
            EditRecord::Text(r) => &r.id,
            EditRecord::Image(r) => &r.id,
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            EditRecord::Markup(r) => r.page,
            EditRecord::Note(r) => r.page,
            EditRecord::Pen(r) => r.page,
            EditRecord::Shape(r) => r.page,
            EditRecord::Text(r) => r.page,
            EditRecord::Image(r) => r.page,
        }
    }

    pub fn kind(&self) -> EditKindTag {
        match self {
            EditRecord::Markup(_) => EditKindTag::Markup,
            EditRecord::Note(_) => EditKindTag::Note,
            EditRecord::Pen(_) => EditKindTag::Pen,
            EditRecord::Shape(_) => EditKindTag::Shape,
            EditRecord::Text(_) => EditKindTag::Text,
            EditRecord::Image(_) => EditKindTag::Image,
        }
    }

    pub fn edit_ref(&self) -> EditRef {
        EditRef::new(self.kind(), self.id())
    }

    /// Box with a movable/resizable outline. Notes report a zero-size box at
    /// their anchor; the icon size is a display concern.
    pub fn bounds(&self) -> Rect {
        match self {
            EditRecord::Markup(r) => r.bounds(),
            EditRecord::Note(r) => Rect::new(r.x, r.y, 0.0, 0.0),
            EditRecord::Pen(r) => r.bounds(),
            EditRecord::Shape(r) => r.bounds(),
            EditRecord::Text(r) => r.bounds(),
            EditRecord::Image(r) => r.bounds(),
        }
    }

    /// Whether corner handles apply.
    pub fn is_resizable(&self) -> bool {
        !matches!(self, EditRecord::Note(_) | EditRecord::Pen(_))
    }

    /// Copy moved by `(dx, dy)` page units.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        match self {
            EditRecord::Markup(r) => EditRecord::Markup(Markup {
                x: r.x + dx,
                y: r.y + dy,
                ..r.clone()
            }),
            EditRecord::Note(r) => EditRecord::Note(StickyNote {
                x: r.x + dx,
                y: r.y + dy,
                ..r.clone()
            }),
            EditRecord::Pen(r) => EditRecord::Pen(PenStroke {
                points: r
                    .points
                    .iter()
                    .map(|p| Point::new(p.x + dx, p.y + dy))
                    .collect(),
                ..r.clone()
            }),
            EditRecord::Shape(r) => EditRecord::Shape(Shape {
                x: r.x + dx,
                y: r.y + dy,
                ..r.clone()
            }),
            EditRecord::Text(r) => EditRecord::Text(TextEdit {
                x: r.x + dx,
                y: r.y + dy,
                ..r.clone()
            }),
            EditRecord::Image(r) => EditRecord::Image(ImageEdit {
                x: r.x + dx,
                y: r.y + dy,
                ..r.clone()
            }),
        }
    }

    /// Copy with a new box. Notes and pen strokes have no box and are returned
    /// unchanged.
    pub fn with_bounds(&self, b: Rect) -> Self {
        match self {
            EditRecord::Markup(r) => EditRecord::Markup(Markup {
                x: b.x,
                y: b.y,
                width: b.width,
                height: b.height,
                ..r.clone()
            }),
            EditRecord::Shape(r) => EditRecord::Shape(Shape {
                x: b.x,
                y: b.y,
                width: b.width,
                height: b.height,
                ..r.clone()
            }),
            EditRecord::Text(r) => EditRecord::Text(TextEdit {
                x: b.x,
                y: b.y,
                width: b.width,
                height: b.height,
                ..r.clone()
            }),
            EditRecord::Image(r) => EditRecord::Image(ImageEdit {
                x: b.x,
                y: b.y,
                width: b.width,
                height: b.height,
                ..r.clone()
            }),
            EditRecord::Note(_) | EditRecord::Pen(_) => self.clone(),
        }
    }

    /// Copy with a new color. Image edits have none and are returned unchanged.
    pub fn with_color(&self, color: &str) -> Self {
        let color = color.to_string();
        match self {
            EditRecord::Markup(r) => EditRecord::Markup(Markup {
                color,
                ..r.clone()
            }),
            EditRecord::Note(r) => EditRecord::Note(StickyNote {
                color,
                ..r.clone()
            }),
            EditRecord::Pen(r) => EditRecord::Pen(PenStroke {
                color,
                ..r.clone()
            }),
            EditRecord::Shape(r) => EditRecord::Shape(Shape {
                color,
                ..r.clone()
            }),
            EditRecord::Text(r) => EditRecord::Text(TextEdit {
                font_color: Some(color),
                ..r.clone()
            }),
            EditRecord::Image(_) => self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn image_edit() -> ImageEdit {
        ImageEdit::from_region(
            &ImageRegion {
                id: "img-0".to_string(),
                page: 0,
                x: 100.0,
                y: 200.0,
                width: 60.0,
                height: 40.0,
            },
            2.0,
        )
    }

    #[test]
    fn test_image_region_is_normalized() {
        let edit = image_edit();
        assert_eq!(edit.bounds(), Rect::new(50.0, 100.0, 30.0, 20.0));
        assert_eq!(edit.original_bounds(), edit.bounds());
        assert!(edit.is_noop());
    }

    #[test]
    fn test_image_reset_restores_original() {
        let mut edit = image_edit();
        edit.x += 15.0;
        edit.width = 80.0;
        edit.deleted = true;
        edit.image_data = Some("data:image/png;base64,AAAA".to_string());
        assert!(!edit.is_noop());

        let reset = edit.reset();
        assert_eq!(reset, image_edit());
    }

    fn invoice_run() -> TextRun {
        TextRun {
            id: "run-3".to_string(),
            text: "Invoice".to_string(),
            screen_x: 108.0,
            screen_y: 123.0,
            screen_width: 60.0,
            screen_height: 15.0,
            pdf_x: 72.0,
            pdf_y: 700.0,
            pdf_width: 40.0,
            pdf_height: 10.0,
            pdf_font_size: 10.0,
            font_family: "Times-Roman".to_string(),
        }
    }

    fn letter_page(origin_x: f64, origin_y: f64) -> PageGeometry {
        PageGeometry {
            origin_x,
            origin_y,
            width: 612.0,
            height: 792.0,
        }
    }

    #[test]
    fn test_replacing_run_uses_pdf_box() {
        let edit = TextEdit::replacing(&invoice_run(), 0, "Receipt", &letter_page(0.0, 0.0));
        assert_eq!(edit.bounds(), Rect::new(72.0, 82.0, 40.0, 10.0));
        assert_eq!(edit.original_text, "Invoice");
        assert_eq!(edit.creation_zoom, 1.5);
        assert!(!edit.is_inserted());
    }

    #[test]
    fn test_replacing_run_on_offset_media_box() {
        let page = letter_page(10.0, 20.0);
        let edit = TextEdit::replacing(&invoice_run(), 0, "Receipt", &page);
        assert_eq!(edit.bounds(), Rect::new(62.0, 102.0, 40.0, 10.0));
        // and back to where the run was extracted from
        assert_eq!(page.rect_to_pdf(edit.bounds()), invoice_run().pdf_rect());
    }

    #[test]
    fn test_inserted_text_has_reserved_prefix() {
        let edit = TextEdit::inserted(1, Point::new(10.0, 20.0), "Hi", 12.0, "Helvetica", 1.0);
        assert!(edit.is_inserted());
        assert!(edit.id.starts_with(INSERTED_TEXT_PREFIX));
    }

    #[test]
    fn test_translate_pen_moves_every_point() {
        let pen = EditRecord::Pen(PenStroke {
            id: "p".to_string(),
            page: 0,
            points: vec![Point::new(0.0, 0.0), Point::new(10.0, 5.0)],
            color: "#000".to_string(),
            stroke_width: 2.0,
            creation_zoom: 1.0,
        });
        let moved = pen.translated(3.0, -1.0);
        match moved {
            EditRecord::Pen(p) => {
                assert_eq!(p.points, vec![Point::new(3.0, -1.0), Point::new(13.0, 4.0)])
            }
            other => panic!("expected pen, got {:?}", other),
        }
    }

    #[test]
    fn test_image_translate_keeps_original_box() {
        let moved = EditRecord::Image(image_edit()).translated(5.0, 5.0);
        if let EditRecord::Image(img) = moved {
            assert_eq!(img.original_bounds(), image_edit().original_bounds());
            assert!(img.is_moved());
        } else {
            panic!("expected image");
        }
    }

    #[test]
    fn test_shape_endpoints_follow_flip() {
        let shape = Shape {
            id: "s".to_string(),
            page: 0,
            shape_type: ShapeType::Arrow,
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 40.0,
            color: "#00F".to_string(),
            stroke_width: 2.0,
            filled: false,
            flip_x: true,
            flip_y: false,
            creation_zoom: 1.0,
        };
        assert_eq!(
            shape.endpoints(),
            (Point::new(40.0, 20.0), Point::new(10.0, 60.0))
        );
    }

    #[test]
    fn test_legacy_zoom_field_accepted() {
        let json = r#"{"id":"i","page":2,"x":1,"y":2,"width":3,"height":4,
            "originalX":1,"originalY":2,"originalWidth":3,"originalHeight":4,
            "deleted":true,"zoom":1.25}"#;
        let edit: ImageEdit = serde_json::from_str(json).unwrap();
        assert_eq!(edit.creation_zoom, 1.25);
        assert!(edit.deleted);
        assert_eq!(edit.image_data, None);
    }

    #[test]
    fn test_record_json_is_tagged_by_kind() {
        let note = EditRecord::Note(StickyNote::new(0, Point::new(1.0, 2.0), "#FFEB3B", 1.0));
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["kind"], "note");
        assert_eq!(json["creationZoom"], 1.0);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("highlight".parse::<EditKindTag>(), Ok(EditKindTag::Markup));
        assert_eq!("Image".parse::<EditKindTag>(), Ok(EditKindTag::Image));
        assert!("checkbox".parse::<EditKindTag>().is_err());
    }
}
