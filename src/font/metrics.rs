//! Advance-width tables parsed from TrueType/OpenType data.

use std::collections::HashMap;

use base64::Engine as _;

use crate::error::LayoutError;
use crate::model::FontEntry;

/// Parsed metrics from a TrueType/OpenType font via ttf-parser.
#[derive(Debug, Clone)]
pub struct FontMetrics {
    pub units_per_em: u16,
    pub advance_widths: HashMap<char, u16>,
    pub default_advance: u16,
}

impl FontMetrics {
    /// Advance width of a character in pixels. Characters the face has no
    /// glyph for use the face's space advance.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        let w = self
            .advance_widths
            .get(&ch)
            .copied()
            .unwrap_or(self.default_advance);
        (w as f64 / self.units_per_em as f64) * font_size
    }

    pub fn measure(&self, text: &str, font_size: f64) -> f64 {
        text.chars().map(|ch| self.char_width(ch, font_size)).sum()
    }

    /// Parse metrics from font data using ttf-parser.
    pub fn from_font_data(data: &[u8]) -> Option<Self> {
        let face = ttf_parser::Face::parse(data, 0).ok()?;
        let units_per_em = face.units_per_em();
        if units_per_em == 0 {
            return None;
        }

        let mut advance_widths = HashMap::new();
        let mut default_advance = 0u16;

        for code in 32u32..=0xFFFF {
            if let Some(ch) = char::from_u32(code) {
                if let Some(glyph_id) = face.glyph_index(ch) {
                    let advance = face.glyph_hor_advance(glyph_id).unwrap_or(0);
                    advance_widths.insert(ch, advance);
                    if ch == ' ' {
                        default_advance = advance;
                    }
                }
            }
        }

        if default_advance == 0 {
            default_advance = units_per_em / 2;
        }

        Some(FontMetrics {
            units_per_em,
            advance_widths,
            default_advance,
        })
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: String,
    pub weight: u32,
    pub italic: bool,
}

/// Registered font faces keyed by family, weight and style.
#[derive(Debug, Clone, Default)]
pub struct FontRegistry {
    fonts: HashMap<FontKey, FontMetrics>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the font list carried by the settings.
    pub fn from_entries(entries: &[FontEntry]) -> Result<Self, LayoutError> {
        let mut registry = Self::new();
        for entry in entries {
            let data = decode_font_src(&entry.src)?;
            registry.register(&entry.family, entry.weight, entry.italic, &data)?;
        }
        Ok(registry)
    }

    /// Register a face from raw TrueType/OpenType bytes.
    pub fn register(
        &mut self,
        family: &str,
        weight: u32,
        italic: bool,
        data: &[u8],
    ) -> Result<(), LayoutError> {
        let metrics = FontMetrics::from_font_data(data).ok_or_else(|| {
            LayoutError::Font(format!("could not parse font data for `{}`", family))
        })?;
        self.insert(family, weight, italic, metrics);
        Ok(())
    }

    /// Register already-parsed metrics.
    pub fn insert(&mut self, family: &str, weight: u32, italic: bool, metrics: FontMetrics) {
        self.fonts.insert(
            FontKey {
                family: family.to_string(),
                weight,
                italic,
            },
            metrics,
        );
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    /// Look up a face: exact match, then weight snapped to 400/700, then any
    /// face of the family (lowest weight, upright first).
    pub fn resolve(&self, family: &str, weight: u32, italic: bool) -> Option<&FontMetrics> {
        let key = FontKey {
            family: family.to_string(),
            weight,
            italic,
        };
        if let Some(font) = self.fonts.get(&key) {
            return Some(font);
        }

        let snapped_weight = if weight >= 600 { 700 } else { 400 };
        let key = FontKey {
            family: family.to_string(),
            weight: snapped_weight,
            italic,
        };
        if let Some(font) = self.fonts.get(&key) {
            return Some(font);
        }

        self.fonts
            .iter()
            .filter(|(k, _)| k.family == family)
            .min_by_key(|(k, _)| (k.italic != italic, k.weight))
            .map(|(_, m)| m)
    }
}

/// Accepts plain base64 or a `data:...;base64,` URI.
fn decode_font_src(src: &str) -> Result<Vec<u8>, LayoutError> {
    let payload = match src.find("base64,") {
        Some(idx) if src.starts_with("data:") => &src[idx + "base64,".len()..],
        _ => src,
    };
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| LayoutError::Font(format!("invalid base64 font data: {}", e)))
}
