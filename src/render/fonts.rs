use anyhow::{Result, anyhow};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use std::collections::BTreeMap;

use super::metrics::{FontMetrics, measure_text_width};
use crate::encoding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Regular,
    Bold,
    Serif,
    /// Translated text: the embedded font when one is configured, Helvetica
    /// otherwise.
    Body,
}

const BASE_FONTS: [(&str, &str); 3] = [
    ("F1", "Helvetica"),
    ("F2", "Helvetica-Bold"),
    ("F3", "Times-Roman"),
];
const EMBEDDED_KEY: &str = "F4";

struct Embedded {
    metrics: FontMetrics,
    id: ObjectId,
    /// Glyph id to the character it was drawn for.
    used: BTreeMap<u16, char>,
}

/// Font resources shared by every generated page of one document.
pub struct FontSet {
    resources: Dictionary,
    embedded: Option<Embedded>,
}

impl FontSet {
    pub fn new(doc: &mut Document, body: Option<&FontMetrics>) -> Self {
        let mut resources = Dictionary::new();
        for (key, base) in BASE_FONTS {
            let id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => base,
                "Encoding" => "WinAnsiEncoding",
            });
            resources.set(key, id);
        }
        let embedded = body.map(|metrics| {
            let id = doc.new_object_id();
            resources.set(EMBEDDED_KEY, id);
            Embedded {
                metrics: metrics.clone(),
                id,
                used: BTreeMap::new(),
            }
        });
        Self {
            resources,
            embedded,
        }
    }

    pub fn resources(&self) -> Dictionary {
        dictionary! { "Font" => self.resources.clone() }
    }

    pub fn resource_key(&self, face: Face) -> &'static str {
        match face {
            Face::Regular => BASE_FONTS[0].0,
            Face::Bold => BASE_FONTS[1].0,
            Face::Serif => BASE_FONTS[2].0,
            Face::Body if self.embedded.is_some() => EMBEDDED_KEY,
            Face::Body => BASE_FONTS[0].0,
        }
    }

    pub fn measure(&self, face: Face, text: &str, size: f32) -> f32 {
        match (face, &self.embedded) {
            (Face::Body, Some(embedded)) => measure_text_width(text, size, Some(&embedded.metrics)),
            _ => measure_text_width(text, size, None),
        }
    }

    /// Encodes `text` as a string operand for `face`. Fails on the first
    /// character the font cannot show.
    pub fn encode(&mut self, face: Face, text: &str) -> Result<Object> {
        if let (Face::Body, Some(embedded)) = (face, self.embedded.as_mut()) {
            let mut bytes = Vec::with_capacity(text.len() * 2);
            for ch in text.chars() {
                let glyph = embedded
                    .metrics
                    .glyph_id(ch)
                    .filter(|glyph| *glyph != 0)
                    .ok_or_else(|| anyhow!("character {ch:?} is missing from the embedded font"))?;
                embedded.used.entry(glyph).or_insert(ch);
                bytes.extend_from_slice(&glyph.to_be_bytes());
            }
            return Ok(Object::String(bytes, StringFormat::Hexadecimal));
        }
        let bytes = encoding::encode(text)
            .map_err(|ch| anyhow!("character {ch:?} cannot be encoded in WinAnsiEncoding"))?;
        Ok(Object::String(bytes, StringFormat::Literal))
    }

    /// Writes the embedded font objects. Must run after every page is drawn
    /// so the width table covers all glyphs in use.
    pub fn finish(self, doc: &mut Document) {
        let Some(embedded) = self.embedded else {
            return;
        };
        let metrics = &embedded.metrics;
        let name = postscript_name(metrics.family());
        let scale = 1000.0 / metrics.units_per_em().max(1) as f32;
        let ascent = (metrics.ascender() as f32 * scale).round() as i64;
        let descent = (metrics.descender() as f32 * scale).round() as i64;

        let file_id = doc.add_object(Stream::new(
            dictionary! { "Length1" => metrics.data().len() as i64 },
            metrics.data().to_vec(),
        ));

        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => Object::Name(name.clone().into_bytes()),
            "Flags" => 32,
            "FontBBox" => vec![0.into(), descent.into(), 1000.into(), ascent.into()],
            "ItalicAngle" => 0,
            "Ascent" => ascent,
            "Descent" => descent,
            "CapHeight" => ascent,
            "StemV" => 80,
            "FontFile2" => file_id,
        });

        let widths = embedded
            .used
            .keys()
            .flat_map(|glyph| {
                let width = metrics.advance_per_mille(*glyph).round() as i64;
                [Object::Integer(*glyph as i64), Object::Array(vec![width.into()])]
            })
            .collect::<Vec<_>>();
        let cid_font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => Object::Name(name.clone().into_bytes()),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "FontDescriptor" => descriptor_id,
            "DW" => 1000,
            "W" => widths,
            "CIDToGIDMap" => "Identity",
        });

        let to_unicode_id = doc.add_object(Stream::new(
            Dictionary::new(),
            to_unicode_cmap(&embedded.used).into_bytes(),
        ));
        doc.objects.insert(
            embedded.id,
            Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type0",
                "BaseFont" => Object::Name(name.into_bytes()),
                "Encoding" => "Identity-H",
                "DescendantFonts" => vec![Object::Reference(cid_font_id)],
                "ToUnicode" => to_unicode_id,
            }),
        );
        tracing::debug!(glyphs = embedded.used.len(), "embedded body font");
    }
}

fn postscript_name(family: Option<&str>) -> String {
    let name = family
        .unwrap_or_default()
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-')
        .collect::<String>();
    if name.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        name
    }
}

fn to_unicode_cmap(used: &BTreeMap<u16, char>) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    let entries = used.iter().collect::<Vec<_>>();
    for chunk in entries.chunks(100) {
        cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (glyph, ch) in chunk {
            let mut units = [0u16; 2];
            let hex = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|unit| format!("{unit:04X}"))
                .collect::<String>();
            cmap.push_str(&format!("<{glyph:04X}> <{hex}>\n"));
        }
        cmap.push_str("endbfchar\n");
    }
    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap
}
