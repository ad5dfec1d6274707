use serde::Serialize;

use crate::stats::is_medical_term;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Digital,
    Ocr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Digital,
    Scanned,
}

impl DocumentKind {
    pub fn extraction_method(self) -> ExtractionMethod {
        match self {
            DocumentKind::Digital => ExtractionMethod::Digital,
            DocumentKind::Scanned => ExtractionMethod::Ocr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

/// A text run read straight from a page content stream. Coordinates are PDF
/// user space with the origin at the bottom-left.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitalItem {
    pub text: String,
    pub x: f32,
    pub y: f32,
    /// Estimated from glyph-class widths; not read from font metrics.
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
    pub font_name: String,
    pub color: String,
}

/// One recognized word. Coordinates are pixels on the upscaled raster with
/// the origin at the top-left.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrItem {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TextItem {
    Digital(DigitalItem),
    Ocr(OcrItem),
}

impl TextItem {
    pub fn text(&self) -> &str {
        match self {
            TextItem::Digital(item) => &item.text,
            TextItem::Ocr(item) => &item.text,
        }
    }

    pub fn x(&self) -> f32 {
        match self {
            TextItem::Digital(item) => item.x,
            TextItem::Ocr(item) => item.x,
        }
    }

    pub fn y(&self) -> f32 {
        match self {
            TextItem::Digital(item) => item.y,
            TextItem::Ocr(item) => item.y,
        }
    }

    pub fn font_size(&self) -> Option<f32> {
        match self {
            TextItem::Digital(item) => Some(item.font_size),
            TextItem::Ocr(_) => None,
        }
    }

    pub fn color(&self) -> Option<&str> {
        match self {
            TextItem::Digital(item) => Some(&item.color),
            TextItem::Ocr(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageExtraction {
    pub page_number: u32,
    pub raw_text: String,
    pub items: Vec<TextItem>,
    pub viewport: Viewport,
    pub method: ExtractionMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslatedItem {
    pub source: TextItem,
    pub text: String,
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordMapping {
    pub original: String,
    pub translated: String,
    pub confidence: f64,
    pub position: usize,
}

impl WordMapping {
    pub fn is_medical(&self) -> bool {
        is_medical_term(&self.original)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedPage {
    pub page_number: u32,
    pub original_text: String,
    pub translated_text: String,
    pub translated_items: Vec<TranslatedItem>,
    pub word_mappings: Vec<WordMapping>,
}
