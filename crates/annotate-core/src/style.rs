//! Colors and font resolution shared by the overlay and the compositor

use serde::{Deserialize, Serialize};

/// RGB color with optional alpha, components in the 0-1 range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub alpha: Option<f32>,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self {
            r,
            g,
            b,
            alpha: None,
        }
    }

    /// Parse `#RGB`, `#RRGGBB`, `rgb(r, g, b)` or `rgba(r, g, b, a)`.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        let lower = s.to_ascii_lowercase();
        let inner = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))?
            .strip_suffix(')')?;
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return None;
        }
        let channel = |v: &str| v.parse::<f32>().ok().map(|c| (c / 255.0).clamp(0.0, 1.0));
        let alpha = match parts.get(3) {
            Some(a) => Some(a.parse::<f32>().ok()?.clamp(0.0, 1.0)),
            None => None,
        };
        Some(Self {
            r: channel(parts[0])?,
            g: channel(parts[1])?,
            b: channel(parts[2])?,
            alpha,
        })
    }

    /// Parse with a fallback for anything unrecognized.
    pub fn parse_or(input: &str, fallback: Color) -> Self {
        Self::parse(input).unwrap_or(fallback)
    }

    pub fn components(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
    match hex.len() {
        3 => {
            let expand = |i: usize| {
                let c = &hex[i..i + 1];
                byte(&format!("{c}{c}"))
            };
            Some(Color::rgb(expand(0)?, expand(1)?, expand(2)?))
        }
        6 => Some(Color::rgb(
            byte(&hex[0..2])?,
            byte(&hex[2..4])?,
            byte(&hex[4..6])?,
        )),
        _ => None,
    }
}

/// Resolve a font family name to one of the PDF standard 14 fonts.
///
/// Accepts CSS generic families ("serif", "monospace"), the names the editor
/// offers ("TimesRoman-Bold", "Courier") and embedded names reported by the
/// renderer ("BCDEEE+ArialMT"). Unknown names fall back to Helvetica.
pub fn standard_font(family: &str, bold: bool, italic: bool) -> &'static str {
    let lower = family.to_lowercase();
    let bold = bold || lower.contains("bold");
    let italic = italic || lower.contains("italic") || lower.contains("oblique");

    if lower.contains("symbol") {
        return "Symbol";
    }
    if lower.contains("zapf") || lower.contains("dingbat") {
        return "ZapfDingbats";
    }

    match (base_family(&lower), bold, italic) {
        (BaseFamily::Times, true, true) => "Times-BoldItalic",
        (BaseFamily::Times, true, false) => "Times-Bold",
        (BaseFamily::Times, false, true) => "Times-Italic",
        (BaseFamily::Times, false, false) => "Times-Roman",
        (BaseFamily::Courier, true, true) => "Courier-BoldOblique",
        (BaseFamily::Courier, true, false) => "Courier-Bold",
        (BaseFamily::Courier, false, true) => "Courier-Oblique",
        (BaseFamily::Courier, false, false) => "Courier",
        (BaseFamily::Helvetica, true, true) => "Helvetica-BoldOblique",
        (BaseFamily::Helvetica, true, false) => "Helvetica-Bold",
        (BaseFamily::Helvetica, false, true) => "Helvetica-Oblique",
        (BaseFamily::Helvetica, false, false) => "Helvetica",
    }
}

enum BaseFamily {
    Times,
    Courier,
    Helvetica,
}

fn base_family(lower: &str) -> BaseFamily {
    match lower {
        "serif" => return BaseFamily::Times,
        "monospace" => return BaseFamily::Courier,
        "sans-serif" | "cursive" | "fantasy" => return BaseFamily::Helvetica,
        _ => {}
    }

    if lower.contains("times") || lower.contains("georgia") || lower.contains("garamond") {
        return BaseFamily::Times;
    }

    if lower.contains("courier")
        || lower.contains("mono")
        || lower.contains("consolas")
        || lower.contains("monaco")
    {
        return BaseFamily::Courier;
    }

    BaseFamily::Helvetica
}

/// Symbol fonts use their built-in encoding.
pub fn uses_win_ansi(base_font: &str) -> bool {
    !matches!(base_font, "Symbol" | "ZapfDingbats")
}

/// Encode text for a standard font with WinAnsiEncoding. Characters outside
/// the encoding become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}' => c as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            '\t' => b' ',
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_colors() {
        assert_eq!(Color::parse("#FF0000"), Some(Color::rgb(1.0, 0.0, 0.0)));
        assert_eq!(Color::parse("#fff"), Some(Color::WHITE));
        assert_eq!(Color::parse("#12345"), None);
        assert_eq!(Color::parse("#GG0000"), None);
    }

    #[test]
    fn test_parse_rgba() {
        let c = Color::parse("rgba(255,255,0,0.35)").unwrap();
        assert_eq!(c.components(), [1.0, 1.0, 0.0]);
        assert_eq!(c.alpha, Some(0.35));

        let c = Color::parse("rgb(0, 0, 255)").unwrap();
        assert_eq!(c.components(), [0.0, 0.0, 1.0]);
        assert_eq!(c.alpha, None);
    }

    #[test]
    fn test_parse_or_falls_back() {
        assert_eq!(Color::parse_or("tomato", Color::BLACK), Color::BLACK);
    }

    #[test]
    fn test_non_ascii_hex_is_rejected() {
        assert_eq!(Color::parse("#é0"), None);
        assert_eq!(Color::parse("#aéé0"), None);
        assert_eq!(Color::parse("#+f+f+f"), None);
        assert_eq!(Color::parse_or("#日本", Color::WHITE), Color::WHITE);
    }

    #[test]
    fn test_font_lookup_editor_names() {
        assert_eq!(standard_font("Helvetica", false, false), "Helvetica");
        assert_eq!(standard_font("Helvetica-Bold", false, false), "Helvetica-Bold");
        assert_eq!(standard_font("TimesRoman", false, false), "Times-Roman");
        assert_eq!(standard_font("TimesRoman-Italic", false, false), "Times-Italic");
        assert_eq!(standard_font("Courier-Oblique", false, false), "Courier-Oblique");
    }

    #[test]
    fn test_font_lookup_flags_and_generics() {
        assert_eq!(standard_font("serif", true, true), "Times-BoldItalic");
        assert_eq!(standard_font("monospace", false, true), "Courier-Oblique");
        assert_eq!(standard_font("BCDEEE+ArialMT", true, false), "Helvetica-Bold");
    }

    #[test]
    fn test_font_lookup_fallback() {
        assert_eq!(standard_font("g_d0_f1", false, false), "Helvetica");
        assert_eq!(standard_font("", false, false), "Helvetica");
        assert_eq!(standard_font("Symbol", false, false), "Symbol");
    }

    #[test]
    fn test_win_ansi_encoding() {
        assert_eq!(encode_win_ansi("Café"), vec![b'C', b'a', b'f', 0xE9]);
        assert_eq!(encode_win_ansi("“x”"), vec![0x93, b'x', 0x94]);
        assert_eq!(encode_win_ansi("日"), vec![b'?']);
    }
}
