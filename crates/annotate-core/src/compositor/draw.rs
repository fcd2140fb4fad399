//! Content-stream operator builders. All coordinates are PDF page space.

use crate::coords::{Point, Rect};
use crate::style::Color;
use lopdf::content::Operation;
use lopdf::{Object, StringFormat};

/// Bézier control-point ratio for quarter-circle arcs.
const KAPPA: f64 = 0.552_284_749_8;

pub(crate) fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

fn op(operator: &str, operands: Vec<Object>) -> Operation {
    Operation::new(operator, operands)
}

pub(crate) fn save() -> Operation {
    op("q", vec![])
}

pub(crate) fn restore() -> Operation {
    op("Q", vec![])
}

pub(crate) fn fill_color(c: Color) -> Operation {
    let [r, g, b] = c.components();
    op("rg", vec![Object::Real(r), Object::Real(g), Object::Real(b)])
}

pub(crate) fn stroke_color(c: Color) -> Operation {
    let [r, g, b] = c.components();
    op("RG", vec![Object::Real(r), Object::Real(g), Object::Real(b)])
}

pub(crate) fn line_width(w: f64) -> Operation {
    op("w", vec![real(w)])
}

/// Round caps and joins.
pub(crate) fn round_ends() -> Vec<Operation> {
    vec![op("J", vec![Object::Integer(1)]), op("j", vec![Object::Integer(1)])]
}

pub(crate) fn graphics_state(name: &str) -> Operation {
    op("gs", vec![Object::Name(name.as_bytes().to_vec())])
}

pub(crate) fn rect(r: Rect) -> Operation {
    op("re", vec![real(r.x), real(r.y), real(r.width), real(r.height)])
}

pub(crate) fn move_to(p: Point) -> Operation {
    op("m", vec![real(p.x), real(p.y)])
}

pub(crate) fn line_to(p: Point) -> Operation {
    op("l", vec![real(p.x), real(p.y)])
}

fn curve_to(c1: Point, c2: Point, end: Point) -> Operation {
    op(
        "c",
        vec![
            real(c1.x),
            real(c1.y),
            real(c2.x),
            real(c2.y),
            real(end.x),
            real(end.y),
        ],
    )
}

pub(crate) fn close_path() -> Operation {
    op("h", vec![])
}

pub(crate) fn fill() -> Operation {
    op("f", vec![])
}

pub(crate) fn stroke() -> Operation {
    op("S", vec![])
}

pub(crate) fn fill_and_stroke() -> Operation {
    op("B", vec![])
}

/// Ellipse inscribed in `r` as four cubic arcs, path left open for painting.
pub(crate) fn ellipse(r: Rect) -> Vec<Operation> {
    let rx = r.width / 2.0;
    let ry = r.height / 2.0;
    let cx = r.x + rx;
    let cy = r.y + ry;
    let ox = rx * KAPPA;
    let oy = ry * KAPPA;

    vec![
        move_to(Point::new(cx + rx, cy)),
        curve_to(
            Point::new(cx + rx, cy + oy),
            Point::new(cx + ox, cy + ry),
            Point::new(cx, cy + ry),
        ),
        curve_to(
            Point::new(cx - ox, cy + ry),
            Point::new(cx - rx, cy + oy),
            Point::new(cx - rx, cy),
        ),
        curve_to(
            Point::new(cx - rx, cy - oy),
            Point::new(cx - ox, cy - ry),
            Point::new(cx, cy - ry),
        ),
        curve_to(
            Point::new(cx + ox, cy - ry),
            Point::new(cx + rx, cy - oy),
            Point::new(cx + rx, cy),
        ),
        close_path(),
    ]
}

/// Triangle for an arrow head at `tip` pointing away from `tail`.
pub(crate) fn arrow_head(tail: Point, tip: Point, length: f64) -> [Point; 3] {
    let dx = tip.x - tail.x;
    let dy = tip.y - tail.y;
    let len = dx.hypot(dy);
    if len == 0.0 {
        return [tip, tip, tip];
    }
    let (ux, uy) = (dx / len, dy / len);
    let base = Point::new(tip.x - ux * length, tip.y - uy * length);
    let half = length * 0.4;
    [
        tip,
        Point::new(base.x - uy * half, base.y + ux * half),
        Point::new(base.x + uy * half, base.y - ux * half),
    ]
}

/// Place an XObject so it fills `r`.
pub(crate) fn place_xobject(name: &str, r: Rect) -> Vec<Operation> {
    vec![
        save(),
        op(
            "cm",
            vec![
                real(r.width),
                real(0.0),
                real(0.0),
                real(r.height),
                real(r.x),
                real(r.y),
            ],
        ),
        op("Do", vec![Object::Name(name.as_bytes().to_vec())]),
        restore(),
    ]
}

/// Text block starting at baseline `origin`, one `Tj` per line.
pub(crate) fn text_block(
    font: &str,
    size: f64,
    leading: f64,
    origin: Point,
    lines: &[Vec<u8>],
) -> Vec<Operation> {
    let mut ops = vec![
        op("BT", vec![]),
        op("Tf", vec![Object::Name(font.as_bytes().to_vec()), real(size)]),
        op("TL", vec![real(leading)]),
        op("Td", vec![real(origin.x), real(origin.y)]),
    ];
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            ops.push(op("T*", vec![]));
        }
        ops.push(op(
            "Tj",
            vec![Object::String(line.clone(), StringFormat::Literal)],
        ));
    }
    ops.push(op("ET", vec![]));
    ops
}

/// PDF text string: literal for ASCII, UTF-16BE with a byte order mark
/// otherwise.
pub(crate) fn text_string(s: &str) -> Object {
    if s.is_ascii() {
        return Object::String(s.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in s.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reals(op: &Operation) -> Vec<f32> {
        op.operands
            .iter()
            .filter_map(|o| match o {
                Object::Real(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_ellipse_starts_and_ends_on_right_edge() {
        let ops = ellipse(Rect::new(0.0, 0.0, 20.0, 10.0));
        assert_eq!(ops.len(), 6);
        assert_eq!(ops[0].operator, "m");
        assert_eq!(reals(&ops[0]), vec![20.0, 5.0]);
        assert_eq!(reals(&ops[4])[4..], [20.0, 5.0]);
        assert_eq!(ops[5].operator, "h");
    }

    #[test]
    fn test_arrow_head_points_along_line() {
        let [tip, a, b] = arrow_head(Point::new(0.0, 0.0), Point::new(100.0, 0.0), 15.0);
        assert_eq!(tip, Point::new(100.0, 0.0));
        assert_eq!(a, Point::new(85.0, 6.0));
        assert_eq!(b, Point::new(85.0, -6.0));
    }

    #[test]
    fn test_degenerate_arrow_head() {
        let p = Point::new(3.0, 3.0);
        assert_eq!(arrow_head(p, p, 15.0), [p, p, p]);
    }

    #[test]
    fn test_text_block_breaks_lines() {
        let lines = vec![b"one".to_vec(), b"two".to_vec()];
        let ops = text_block("F1", 12.0, 14.4, Point::new(72.0, 700.0), &lines);
        let names: Vec<&str> = ops.iter().map(|o| o.operator.as_str()).collect();
        assert_eq!(names, vec!["BT", "Tf", "TL", "Td", "Tj", "T*", "Tj", "ET"]);
    }

    #[test]
    fn test_text_string_encoding() {
        match text_string("Note") {
            Object::String(bytes, StringFormat::Literal) => assert_eq!(bytes, b"Note"),
            _ => panic!("expected literal string"),
        }
        match text_string("é") {
            Object::String(bytes, StringFormat::Hexadecimal) => {
                assert_eq!(bytes, vec![0xFE, 0xFF, 0x00, 0xE9])
            }
            _ => panic!("expected UTF-16 string"),
        }
    }
}
