mod color;
mod fonts;
pub mod metrics;
mod page;
mod wrap;

pub use color::{Rgb, parse_color};
pub use metrics::{FontMetrics, load_font_metrics, measure_text_width};
pub use page::{MARGIN, PAGE_HEIGHT, PAGE_WIDTH};
pub use wrap::wrap_text;

use anyhow::{Context, anyhow};
use lopdf::{Document, Object, ObjectId, dictionary};
use time::{OffsetDateTime, format_description};

use crate::error::RenderError;
use crate::extract::{inherited, load_document};
use crate::model::{PageExtraction, TranslatedPage};
use fonts::{Face, FontSet};
use page::Canvas;

const HEADER_SIZE: f32 = 16.0;
const BODY_SIZE: f32 = 12.0;
const TABLE_SIZE: f32 = 10.0;
const FOOTER_SIZE: f32 = 8.0;
const FALLBACK_LINE_HEIGHT: f32 = 18.0;
const ROW_HEIGHT: f32 = 15.0;
const TRANSLATION_HEADER: Rgb = Rgb(0.2, 0.2, 0.8);
const MAPPING_HEADER: Rgb = Rgb(0.8, 0.2, 0.2);
const TRANSLATED_COLUMN: Rgb = Rgb(0.0, 0.0, 0.8);
const RULE: Rgb = Rgb::gray(0.7);
const TABLE_RULE: Rgb = Rgb::gray(0.3);
const FOOTER: Rgb = Rgb::gray(0.5);
const HIGH_CONFIDENCE: Rgb = Rgb(0.0, 0.6, 0.0);
const MEDIUM_CONFIDENCE: Rgb = Rgb(0.8, 0.6, 0.0);
const LOW_CONFIDENCE: Rgb = Rgb(0.8, 0.0, 0.0);
/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&str; 4] = ["MediaBox", "Resources", "CropBox", "Rotate"];

pub const DEFAULT_FOOTER: &str = "Translated with PDF Translation Studio";
pub const NO_TRANSLATION: &str = "No translation available";

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// TrueType face for translated text; base-14 Helvetica when absent.
    pub body_font: Option<FontMetrics>,
    /// Shown in the mapping page footer.
    pub generated_on: String,
    pub footer: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            body_font: None,
            generated_on: today(),
            footer: DEFAULT_FOOTER.to_string(),
        }
    }
}

pub fn today() -> String {
    let now = OffsetDateTime::now_utc();
    format_description::parse("[year]-[month]-[day]")
        .ok()
        .and_then(|format| now.format(&format).ok())
        .unwrap_or_else(|| now.date().to_string())
}

/// Builds the output document: each source page followed by its translation
/// page, then one word-mapping page per translated page.
pub fn render(
    original: &[u8],
    extracted: &[PageExtraction],
    translated: &[TranslatedPage],
    options: &RenderOptions,
) -> Result<Vec<u8>, RenderError> {
    let mut doc = load_document(original).map_err(RenderError::SourceLoad)?;
    let source_pages = doc.get_pages().into_values().collect::<Vec<_>>();
    for page_id in &source_pages {
        materialize_inherited(&mut doc, *page_id).map_err(RenderError::SourceLoad)?;
    }

    let mut fonts = FontSet::new(&mut doc, options.body_font.as_ref());
    let mut kids = Vec::new();
    let total = extracted.len().max(translated.len());
    for idx in 0..total {
        if let Some(page_id) = source_pages.get(idx) {
            kids.push(*page_id);
        }
        if let Some(page) = translated.get(idx) {
            let canvas = translation_page(&mut fonts, page, idx + 1, options);
            let page_id = canvas
                .into_page(&mut doc, &fonts)
                .map_err(|source| RenderError::Page {
                    page: idx + 1,
                    source,
                })?;
            kids.push(page_id);
        }
    }
    for (idx, page) in translated.iter().enumerate() {
        let canvas = mapping_page(&mut fonts, page, idx + 1, options);
        let page_id = canvas
            .into_page(&mut doc, &fonts)
            .map_err(|source| RenderError::Page {
                page: idx + 1,
                source,
            })?;
        kids.push(page_id);
    }
    fonts.finish(&mut doc);

    replace_page_tree(&mut doc, &kids).map_err(RenderError::Serialize)?;
    doc.prune_objects();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .with_context(|| "failed to write pdf")
        .map_err(RenderError::Serialize)?;
    tracing::info!(pages = kids.len(), bytes = bytes.len(), "rendered document");
    Ok(bytes)
}

/// Copies inherited attributes onto the page so it keeps its look once it
/// hangs off a new page tree.
fn materialize_inherited(doc: &mut Document, page_id: ObjectId) -> anyhow::Result<()> {
    for key in INHERITABLE {
        let has_own = doc.get_dictionary(page_id)?.has(key.as_bytes());
        if has_own {
            continue;
        }
        if let Some(value) = inherited(doc, page_id, key.as_bytes()).cloned() {
            doc.get_object_mut(page_id)?.as_dict_mut()?.set(key, value);
        }
    }
    Ok(())
}

fn replace_page_tree(doc: &mut Document, kids: &[ObjectId]) -> anyhow::Result<()> {
    let pages_id = doc.new_object_id();
    for kid in kids {
        doc.get_object_mut(*kid)?
            .as_dict_mut()?
            .set("Parent", pages_id);
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
            "Count" => kids.len() as i64,
        }),
    );
    let root = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| anyhow!("pdf has no document catalog"))?;
    doc.get_object_mut(root)?
        .as_dict_mut()?
        .set("Pages", pages_id);
    Ok(())
}

fn draw_or_warn(
    canvas: &mut Canvas,
    fonts: &mut FontSet,
    face: Face,
    at: (f32, f32),
    size: f32,
    color: Rgb,
    text: &str,
) {
    if text.is_empty() {
        return;
    }
    if let Err(err) = canvas.text(fonts, face, at, size, color, text) {
        tracing::warn!(error = %err, text, "skipping text the font cannot draw");
    }
}

fn page_header(canvas: &mut Canvas, fonts: &mut FontSet, title: &str, color: Rgb) {
    draw_or_warn(
        canvas,
        fonts,
        Face::Bold,
        (MARGIN, PAGE_HEIGHT - MARGIN),
        HEADER_SIZE,
        color,
        title,
    );
    let rule_y = PAGE_HEIGHT - MARGIN - 25.0;
    canvas.line((MARGIN, rule_y), (PAGE_WIDTH - MARGIN, rule_y), 1.0, RULE);
}

fn page_footer(canvas: &mut Canvas, fonts: &mut FontSet, text: &str) {
    draw_or_warn(
        canvas,
        fonts,
        Face::Regular,
        (MARGIN, MARGIN - 20.0),
        FOOTER_SIZE,
        FOOTER,
        text,
    );
}

fn translation_page(
    fonts: &mut FontSet,
    page: &TranslatedPage,
    number: usize,
    options: &RenderOptions,
) -> Canvas {
    let mut canvas = Canvas::new();
    page_header(
        &mut canvas,
        fonts,
        &format!("Translation - Page {number}"),
        TRANSLATION_HEADER,
    );
    let mut cursor = PAGE_HEIGHT - MARGIN - 50.0;

    if !page.translated_items.is_empty() {
        for item in &page.translated_items {
            if cursor < MARGIN + 50.0 {
                tracing::debug!(page = number, "translation page full, dropping remaining items");
                break;
            }
            let x = (MARGIN + item.source.x() * 0.5).clamp(MARGIN, PAGE_WIDTH - MARGIN - 100.0);
            let y = (cursor - item.source.y() * 0.1).max(MARGIN);
            let size = item.source.font_size().unwrap_or(BODY_SIZE).clamp(8.0, 14.0);
            let color = item.source.color().map(parse_color).unwrap_or(Rgb::BLACK);
            draw_or_warn(&mut canvas, fonts, Face::Body, (x, y), size, color, &item.text);
            cursor -= size + 5.0;
        }
    } else {
        let text = if page.translated_text.trim().is_empty() {
            NO_TRANSLATION
        } else {
            page.translated_text.as_str()
        };
        let max_width = PAGE_WIDTH - 2.0 * MARGIN;
        let lines = wrap_text(text, max_width, |line| fonts.measure(Face::Body, line, BODY_SIZE));
        for line in lines {
            if cursor < MARGIN + 20.0 {
                break;
            }
            draw_or_warn(
                &mut canvas,
                fonts,
                Face::Body,
                (MARGIN, cursor),
                BODY_SIZE,
                Rgb::BLACK,
                &line,
            );
            cursor -= FALLBACK_LINE_HEIGHT;
        }
    }

    page_footer(&mut canvas, fonts, &options.footer);
    canvas
}

fn mapping_page(
    fonts: &mut FontSet,
    page: &TranslatedPage,
    number: usize,
    options: &RenderOptions,
) -> Canvas {
    let mut canvas = Canvas::new();
    page_header(
        &mut canvas,
        fonts,
        &format!("Word-to-Word Mapping - Page {number}"),
        MAPPING_HEADER,
    );
    let column = (PAGE_WIDTH - 2.0 * MARGIN) / 3.0;
    let columns = [MARGIN, MARGIN + column, MARGIN + 2.0 * column];
    let mut cursor = PAGE_HEIGHT - MARGIN - 50.0;

    for (title, x) in ["Original", "Translation", "Confidence"].iter().zip(columns) {
        draw_or_warn(
            &mut canvas,
            fonts,
            Face::Bold,
            (x, cursor),
            BODY_SIZE,
            Rgb::BLACK,
            title,
        );
    }
    canvas.line(
        (MARGIN, cursor - 5.0),
        (PAGE_WIDTH - MARGIN, cursor - 5.0),
        1.0,
        TABLE_RULE,
    );
    cursor -= 25.0;

    for mapping in &page.word_mappings {
        if cursor < MARGIN + 30.0 {
            tracing::debug!(page = number, "mapping page full, dropping remaining rows");
            break;
        }
        draw_or_warn(
            &mut canvas,
            fonts,
            Face::Regular,
            (columns[0], cursor),
            TABLE_SIZE,
            Rgb::BLACK,
            &mapping.original,
        );
        draw_or_warn(
            &mut canvas,
            fonts,
            Face::Body,
            (columns[1], cursor),
            TABLE_SIZE,
            TRANSLATED_COLUMN,
            &mapping.translated,
        );
        let percent = (mapping.confidence * 100.0).round() as i64;
        draw_or_warn(
            &mut canvas,
            fonts,
            Face::Serif,
            (columns[2], cursor),
            TABLE_SIZE,
            confidence_color(percent),
            &format!("{percent}%"),
        );
        cursor -= ROW_HEIGHT;
    }

    page_footer(
        &mut canvas,
        fonts,
        &format!("Generated on {}", options.generated_on),
    );
    canvas
}

fn confidence_color(percent: i64) -> Rgb {
    if percent > 80 {
        HIGH_CONFIDENCE
    } else if percent > 60 {
        MEDIUM_CONFIDENCE
    } else {
        LOW_CONFIDENCE
    }
}
