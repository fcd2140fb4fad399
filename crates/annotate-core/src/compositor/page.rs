//! Per-page accumulation of drawing operations and the resources they use,
//! written back into the page dictionary in one step.

use super::draw;
use crate::coords::{from_pdf_space, to_pdf_point, to_pdf_space, Point, Rect};
use crate::error::AnnotateError;
use crate::style::uses_win_ansi;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use serde::Serialize;
use std::collections::HashSet;

const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Page box in PDF units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
}

impl PageGeometry {
    /// Resolve the MediaBox through the page tree; US Letter when absent.
    pub fn of_page(doc: &Document, page_id: ObjectId) -> Self {
        let values = inherited(doc, page_id, b"MediaBox")
            .and_then(|obj| resolve(doc, &obj).as_array().ok().cloned())
            .and_then(|arr| {
                let nums: Vec<f64> = arr.iter().filter_map(|o| number(doc, o)).collect();
                (nums.len() == 4).then(|| [nums[0], nums[1], nums[2], nums[3]])
            })
            .unwrap_or(DEFAULT_MEDIA_BOX);

        let [x0, y0, x1, y1] = values;
        Self {
            origin_x: x0.min(x1),
            origin_y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    /// Page-normalized rectangle to PDF page space, MediaBox origin included.
    pub fn rect_to_pdf(&self, r: Rect) -> Rect {
        to_pdf_space(r, self.height).translated(self.origin_x, self.origin_y)
    }

    /// PDF page-space rectangle back to page-normalized units.
    pub fn rect_from_pdf(&self, r: Rect) -> Rect {
        from_pdf_space(r.translated(-self.origin_x, -self.origin_y), self.height)
    }

    pub fn point_to_pdf(&self, p: Point) -> Point {
        let flipped = to_pdf_point(p, self.height);
        Point::new(flipped.x + self.origin_x, flipped.y + self.origin_y)
    }
}

fn number(doc: &Document, obj: &Object) -> Option<f64> {
    match resolve(doc, obj) {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Follow a reference to its target, or return the object itself.
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Look a key up on the page, then on each ancestor in the page tree.
fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

/// Owned copy of a dictionary that may be inline or referenced.
fn owned_dict(doc: &Document, obj: Option<&Object>) -> Dictionary {
    obj.map(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok().cloned())
        .unwrap_or_default()
}

/// Drawing operations and resources collected for one page.
pub(crate) struct PageCanvas {
    page_id: ObjectId,
    pub geometry: PageGeometry,
    ops: Vec<Operation>,
    fonts: Vec<(String, &'static str)>,
    states: Vec<(String, u32)>,
    images: Vec<(String, ObjectId)>,
    annotations: Vec<ObjectId>,
    taken: HashSet<Vec<u8>>,
    next_name: usize,
    /// Records drawn onto this canvas.
    pub applied: usize,
}

impl PageCanvas {
    pub fn new(doc: &Document, page_id: ObjectId) -> Self {
        let mut taken = HashSet::new();
        if let Some(resources) = inherited(doc, page_id, b"Resources") {
            let resources = owned_dict(doc, Some(&resources));
            for category in [&b"Font"[..], b"ExtGState", b"XObject"] {
                let sub = owned_dict(doc, resources.get(category).ok());
                taken.extend(sub.iter().map(|(name, _)| name.clone()));
            }
        }

        Self {
            page_id,
            geometry: PageGeometry::of_page(doc, page_id),
            ops: Vec::new(),
            fonts: Vec::new(),
            states: Vec::new(),
            images: Vec::new(),
            annotations: Vec::new(),
            taken,
            next_name: 1,
            applied: 0,
        }
    }

    pub fn push(&mut self, op: Operation) {
        self.ops.push(op);
    }

    pub fn extend(&mut self, ops: impl IntoIterator<Item = Operation>) {
        self.ops.extend(ops);
    }

    pub fn add_annotation(&mut self, annot_id: ObjectId) {
        self.annotations.push(annot_id);
    }

    fn fresh_name(&mut self, prefix: &str) -> String {
        loop {
            let name = format!("{}{}", prefix, self.next_name);
            self.next_name += 1;
            if self.taken.insert(name.as_bytes().to_vec()) {
                return name;
            }
        }
    }

    /// Resource name for a standard font, registered on first use.
    pub fn font(&mut self, base_font: &'static str) -> String {
        if let Some((name, _)) = self.fonts.iter().find(|(_, base)| *base == base_font) {
            return name.clone();
        }
        let name = self.fresh_name("AnF");
        self.fonts.push((name.clone(), base_font));
        name
    }

    /// Resource name for an ExtGState with the given fill and stroke opacity.
    pub fn opacity(&mut self, alpha: f32) -> String {
        let bits = alpha.to_bits();
        if let Some((name, _)) = self.states.iter().find(|(_, b)| *b == bits) {
            return name.clone();
        }
        let name = self.fresh_name("AnGs");
        self.states.push((name.clone(), bits));
        name
    }

    pub fn image(&mut self, xobject: ObjectId) -> String {
        let name = self.fresh_name("AnIm");
        self.images.push((name.clone(), xobject));
        name
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.annotations.is_empty()
    }

    /// Append the collected operations after the existing page content and
    /// merge the resources into the page's own Resources dictionary.
    pub fn flush(self, doc: &mut Document) -> Result<(), AnnotateError> {
        if self.is_empty() {
            return Ok(());
        }

        let resources = self.merged_resources(doc);

        let page = doc
            .get_object(self.page_id)
            .and_then(Object::as_dict)
            .map_err(|e| AnnotateError::OperationError(format!("Page is not a dictionary: {}", e)))?;
        let original: Vec<Object> = match page.get(b"Contents") {
            Ok(Object::Array(items)) => items.clone(),
            Ok(other @ Object::Reference(_)) => vec![other.clone()],
            _ => Vec::new(),
        };
        let existing_annots: Vec<Object> = match page.get(b"Annots") {
            Ok(obj) => resolve(doc, obj).as_array().cloned().unwrap_or_default(),
            Err(_) => Vec::new(),
        };

        let mut contents = Vec::with_capacity(original.len() + 2);
        if original.is_empty() {
            let stream = encode_stream(self.ops)?;
            contents.push(Object::Reference(doc.add_object(stream)));
        } else {
            let open = encode_stream(vec![draw::save()])?;
            contents.push(Object::Reference(doc.add_object(open)));
            contents.extend(original);
            let mut tail = Vec::with_capacity(self.ops.len() + 1);
            tail.push(draw::restore());
            tail.extend(self.ops);
            let close = encode_stream(tail)?;
            contents.push(Object::Reference(doc.add_object(close)));
        }

        let mut annots = existing_annots;
        annots.extend(self.annotations.into_iter().map(Object::Reference));

        let page = doc
            .get_object_mut(self.page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| AnnotateError::OperationError(format!("Page is not a dictionary: {}", e)))?;
        page.set("Contents", Object::Array(contents));
        page.set("Resources", Object::Dictionary(resources));
        if !annots.is_empty() {
            page.set("Annots", Object::Array(annots));
        }
        Ok(())
    }

    fn merged_resources(&self, doc: &mut Document) -> Dictionary {
        let inherited_resources = inherited(doc, self.page_id, b"Resources");
        let mut resources = owned_dict(doc, inherited_resources.as_ref());

        if !self.fonts.is_empty() {
            let mut fonts = owned_dict(doc, resources.get(b"Font").ok());
            for (name, base_font) in &self.fonts {
                let mut font = dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => *base_font,
                };
                if uses_win_ansi(base_font) {
                    font.set("Encoding", "WinAnsiEncoding");
                }
                let id = doc.add_object(font);
                fonts.set(name.as_bytes().to_vec(), Object::Reference(id));
            }
            resources.set("Font", Object::Dictionary(fonts));
        }

        if !self.states.is_empty() {
            let mut states = owned_dict(doc, resources.get(b"ExtGState").ok());
            for (name, bits) in &self.states {
                let alpha = f32::from_bits(*bits);
                let id = doc.add_object(dictionary! {
                    "Type" => "ExtGState",
                    "ca" => Object::Real(alpha),
                    "CA" => Object::Real(alpha),
                });
                states.set(name.as_bytes().to_vec(), Object::Reference(id));
            }
            resources.set("ExtGState", Object::Dictionary(states));
        }

        if !self.images.is_empty() {
            let mut xobjects = owned_dict(doc, resources.get(b"XObject").ok());
            for (name, id) in &self.images {
                xobjects.set(name.as_bytes().to_vec(), Object::Reference(*id));
            }
            resources.set("XObject", Object::Dictionary(xobjects));
        }

        resources
    }
}

fn encode_stream(operations: Vec<Operation>) -> Result<Stream, AnnotateError> {
    let content = Content { operations }
        .encode()
        .map_err(|e| AnnotateError::OperationError(format!("Failed to encode content: {}", e)))?;
    Ok(Stream::new(Dictionary::new(), content))
}
