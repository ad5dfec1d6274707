use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use ttf_parser::{Face, GlyphId, name_id};

/// A parsed TrueType face kept as raw bytes so it can be both measured and
/// embedded into the output document.
#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    space_advance: u16,
    family: Option<String>,
    ascender: i16,
    descender: i16,
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("units_per_em", &self.units_per_em)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    pub fn ascender(&self) -> i16 {
        self.ascender
    }

    pub fn descender(&self) -> i16 {
        self.descender
    }

    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, self.face_index).ok()
    }

    pub fn glyph_id(&self, ch: char) -> Option<u16> {
        self.face()?.glyph_index(ch).map(|glyph| glyph.0)
    }

    /// Horizontal advance in font units.
    pub fn advance(&self, glyph: u16) -> u16 {
        self.face()
            .and_then(|face| face.glyph_hor_advance(GlyphId(glyph)))
            .unwrap_or(self.space_advance)
    }

    /// Advance scaled to the PDF's 1000-unit glyph space.
    pub fn advance_per_mille(&self, glyph: u16) -> f32 {
        self.advance(glyph) as f32 * 1000.0 / self.units_per_em.max(1) as f32
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(data)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

pub fn load_font_metrics_from_data(data: Vec<u8>) -> Result<FontMetrics> {
    let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
    for index in 0..count {
        let Ok(face) = Face::parse(&data, index) else {
            continue;
        };
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 2);
        let family = extract_family_name(&face);
        let ascender = face.ascender();
        let descender = face.descender();
        return Ok(FontMetrics {
            data: Arc::new(data),
            face_index: index,
            units_per_em,
            space_advance,
            family,
            ascender,
            descender,
        });
    }
    Err(anyhow!("no parsable face in font data"))
}

/// Width of `text` in points. Without a font the width is estimated from
/// glyph classes, which is close enough for Helvetica-like faces.
pub fn measure_text_width(text: &str, font_size: f32, font: Option<&FontMetrics>) -> f32 {
    if let Some(face) = font.and_then(|font| font.face().map(|face| (font, face))) {
        let (font, face) = face;
        let mut advance = 0u32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            let glyph_advance = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(font.space_advance);
            advance = advance.saturating_add(glyph_advance as u32);
        }
        return advance as f32 * (font_size / font.units_per_em.max(1) as f32);
    }
    estimate_text_width_units(text) * font_size
}

fn estimate_char_units(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.28
    } else if ch.is_ascii_uppercase() || ch.is_ascii_digit() {
        0.62
    } else if ch.is_ascii_alphanumeric() {
        0.52
    } else if ch.is_ascii() {
        0.33
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    ) {
        1.0
    } else {
        0.6
    }
}

pub fn estimate_text_width_units(text: &str) -> f32 {
    text.chars().map(estimate_char_units).sum()
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
