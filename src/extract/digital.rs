use anyhow::{Context, Result, anyhow};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;

use crate::encoding::decode_pdf_string;
use crate::model::{DigitalItem, Viewport};
use crate::render::metrics::estimate_text_width_units;

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
const LETTER: Viewport = Viewport {
    width: 612.0,
    height: 792.0,
};
const MAX_TREE_DEPTH: usize = 32;
const MAX_FORM_DEPTH: usize = 8;
/// `TJ` adjustments wider than this many thousandths of an em read as a word
/// gap.
const TJ_SPACE_THRESHOLD: f32 = 250.0;

pub(crate) fn load_document(bytes: &[u8]) -> Result<Document> {
    let doc = Document::load_mem(bytes).with_context(|| "failed to parse pdf")?;
    if doc.is_encrypted() {
        return Err(anyhow!("encrypted pdf documents are not supported"));
    }
    Ok(doc)
}

pub(crate) struct DigitalPage {
    pub viewport: Viewport,
    pub items: Vec<DigitalItem>,
}

pub(crate) fn read_page(doc: &Document, page_id: ObjectId) -> Result<DigitalPage> {
    let viewport = page_viewport(doc, page_id);
    let content = doc
        .get_page_content(page_id)
        .with_context(|| "failed to read page content stream")?;
    let content = Content::decode(&content).with_context(|| "failed to decode page content")?;
    let resources = Resources::for_page(doc, page_id);
    let mut collector = RunCollector::new(doc);
    collector.run(&content.operations, &resources, 0);
    Ok(DigitalPage {
        viewport,
        items: collector.items,
    })
}

/// Walks up the page tree until `key` is found.
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(doc, value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn sub_dictionary<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    dict.get(key)
        .ok()
        .and_then(|value| resolve(doc, value))
        .and_then(|value| value.as_dict().ok())
}

pub(crate) fn page_viewport(doc: &Document, page_id: ObjectId) -> Viewport {
    let Some(Object::Array(values)) = inherited(doc, page_id, b"MediaBox") else {
        return LETTER;
    };
    let numbers = values
        .iter()
        .filter_map(|value| resolve(doc, value).and_then(number))
        .collect::<Vec<_>>();
    if numbers.len() != 4 {
        return LETTER;
    }
    let width = (numbers[2] - numbers[0]).abs();
    let height = (numbers[3] - numbers[1]).abs();
    if width <= 0.0 || height <= 0.0 {
        return LETTER;
    }
    Viewport { width, height }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

fn matrix_from(values: &[f32]) -> Option<Matrix> {
    match values {
        [a, b, c, d, e, f] => Some([*a, *b, *c, *d, *e, *f]),
        _ => None,
    }
}

fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn translate(matrix: &Matrix, tx: f32, ty: f32) -> Matrix {
    multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], matrix)
}

/// Fonts and XObjects visible to one content stream.
struct Resources<'a> {
    fonts: BTreeMap<Vec<u8>, &'a Dictionary>,
    xobjects: Option<&'a Dictionary>,
}

impl<'a> Resources<'a> {
    fn for_page(doc: &'a Document, page_id: ObjectId) -> Self {
        let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
        let xobjects = inherited(doc, page_id, b"Resources")
            .and_then(|resources| resources.as_dict().ok())
            .and_then(|resources| sub_dictionary(doc, resources, b"XObject"));
        Self { fonts, xobjects }
    }

    /// A form without its own resources draws with the enclosing ones.
    fn for_form(doc: &'a Document, form: &'a Dictionary, parent: &Resources<'a>) -> Self {
        let Some(resources) = sub_dictionary(doc, form, b"Resources") else {
            return Self {
                fonts: parent.fonts.clone(),
                xobjects: parent.xobjects,
            };
        };
        let fonts = match sub_dictionary(doc, resources, b"Font") {
            Some(fonts) => fonts
                .iter()
                .filter_map(|(name, font)| {
                    resolve(doc, font)
                        .and_then(|font| font.as_dict().ok())
                        .map(|font| (name.clone(), font))
                })
                .collect(),
            None => parent.fonts.clone(),
        };
        Self {
            fonts,
            xobjects: sub_dictionary(doc, resources, b"XObject"),
        }
    }
}

/// Text state parameters; saved and restored with the graphics state.
#[derive(Debug, Clone)]
struct TextParams {
    font: String,
    size: f32,
    leading: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    rise: f32,
}

impl Default for TextParams {
    fn default() -> Self {
        Self {
            font: String::new(),
            size: 12.0,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: [f32; 3],
    text: TextParams,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            fill: [0.0; 3],
            text: TextParams::default(),
        }
    }
}

/// Text and line matrices; reset by `BT`.
#[derive(Debug, Clone, Copy)]
struct TextObject {
    matrix: Matrix,
    line: Matrix,
}

impl Default for TextObject {
    fn default() -> Self {
        Self {
            matrix: IDENTITY,
            line: IDENTITY,
        }
    }
}

enum Segment {
    Text(String),
    Adjust(f32),
}

type Decode<'d> = dyn Fn(&str, &[u8]) -> String + 'd;

struct RunCollector<'a> {
    doc: &'a Document,
    graphics: GraphicsState,
    stack: Vec<GraphicsState>,
    text: TextObject,
    items: Vec<DigitalItem>,
}

impl<'a> RunCollector<'a> {
    fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            graphics: GraphicsState::default(),
            stack: Vec::new(),
            text: TextObject::default(),
            items: Vec::new(),
        }
    }

    fn run(&mut self, operations: &[Operation], resources: &Resources<'a>, depth: usize) {
        let doc = self.doc;
        let encodings = resources
            .fonts
            .iter()
            .filter_map(|(name, font)| match font.get_font_encoding(doc) {
                Ok(encoding) => Some((name.clone(), encoding)),
                Err(err) => {
                    tracing::debug!(
                        font = %String::from_utf8_lossy(name),
                        error = %err,
                        "font encoding unavailable"
                    );
                    None
                }
            })
            .collect::<BTreeMap<_, _>>();
        let decode = |font: &str, bytes: &[u8]| {
            let text = encodings
                .get(font.as_bytes())
                .and_then(|encoding| Document::decode_text(encoding, bytes).ok())
                .unwrap_or_else(|| decode_pdf_string(bytes));
            text.chars().filter(|ch| !ch.is_control()).collect::<String>()
        };
        for op in operations {
            if op.operator == "Do" {
                self.draw_form(op, resources, depth);
            } else {
                self.apply(op, &decode);
            }
        }
    }

    fn draw_form(&mut self, op: &Operation, resources: &Resources<'a>, depth: usize) {
        let doc = self.doc;
        let Some(name) = op.operands.first().and_then(|value| value.as_name().ok()) else {
            return;
        };
        let Some(stream) = resources
            .xobjects
            .and_then(|xobjects| xobjects.get(name).ok())
            .and_then(|value| resolve(doc, value))
            .and_then(|value| value.as_stream().ok())
        else {
            return;
        };
        let is_form = stream
            .dict
            .get(b"Subtype")
            .and_then(Object::as_name)
            .map(|subtype| subtype == b"Form")
            .unwrap_or(false);
        if !is_form {
            return;
        }
        if depth >= MAX_FORM_DEPTH {
            tracing::debug!(depth, "form xobjects nested too deeply, skipping");
            return;
        }
        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let operations = match Content::decode(&content) {
            Ok(content) => content.operations,
            Err(err) => {
                tracing::debug!(
                    form = %String::from_utf8_lossy(name),
                    error = %err,
                    "skipping undecodable form xobject"
                );
                return;
            }
        };
        let matrix = sub_matrix(doc, &stream.dict).unwrap_or(IDENTITY);
        let form_resources = Resources::for_form(doc, &stream.dict, resources);

        let saved_graphics = self.graphics.clone();
        let saved_text = self.text;
        let saved_depth = self.stack.len();
        self.graphics.ctm = multiply(&matrix, &self.graphics.ctm);
        self.run(&operations, &form_resources, depth + 1);
        self.stack.truncate(saved_depth);
        self.graphics = saved_graphics;
        self.text = saved_text;
    }

    fn apply(&mut self, op: &Operation, decode: &Decode<'_>) {
        let nums = op.operands.iter().filter_map(number).collect::<Vec<_>>();
        match op.operator.as_str() {
            "q" => self.stack.push(self.graphics.clone()),
            "Q" => {
                if let Some(state) = self.stack.pop() {
                    self.graphics = state;
                }
            }
            "cm" => {
                if let Some(m) = matrix_from(&nums) {
                    self.graphics.ctm = multiply(&m, &self.graphics.ctm);
                }
            }
            "g" | "rg" | "k" | "sc" | "scn" => {
                if let Some(fill) = fill_from_components(&nums) {
                    self.graphics.fill = fill;
                }
            }
            "BT" => self.text = TextObject::default(),
            "Tf" => {
                if let Some(name) = op.operands.first().and_then(|v| v.as_name().ok()) {
                    self.graphics.text.font = String::from_utf8_lossy(name).into_owned();
                }
                if let Some(size) = op.operands.get(1).and_then(number) {
                    self.graphics.text.size = size;
                }
            }
            "Tc" if !nums.is_empty() => self.graphics.text.char_spacing = nums[0],
            "Tw" if !nums.is_empty() => self.graphics.text.word_spacing = nums[0],
            "Tz" if !nums.is_empty() => self.graphics.text.horizontal_scale = nums[0] / 100.0,
            "TL" if !nums.is_empty() => self.graphics.text.leading = nums[0],
            "Ts" if !nums.is_empty() => self.graphics.text.rise = nums[0],
            "Td" if nums.len() == 2 => self.move_line(nums[0], nums[1]),
            "TD" if nums.len() == 2 => {
                self.graphics.text.leading = -nums[1];
                self.move_line(nums[0], nums[1]);
            }
            "Tm" => {
                if let Some(m) = matrix_from(&nums) {
                    self.text.matrix = m;
                    self.text.line = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(bytes) = op.operands.first().and_then(string_bytes) {
                    let text = decode(&self.graphics.text.font, bytes);
                    self.show(vec![Segment::Text(text)]);
                }
            }
            "'" => {
                self.next_line();
                if let Some(bytes) = op.operands.first().and_then(string_bytes) {
                    let text = decode(&self.graphics.text.font, bytes);
                    self.show(vec![Segment::Text(text)]);
                }
            }
            "\"" if op.operands.len() == 3 => {
                if let Some(value) = number(&op.operands[0]) {
                    self.graphics.text.word_spacing = value;
                }
                if let Some(value) = number(&op.operands[1]) {
                    self.graphics.text.char_spacing = value;
                }
                self.next_line();
                if let Some(bytes) = string_bytes(&op.operands[2]) {
                    let text = decode(&self.graphics.text.font, bytes);
                    self.show(vec![Segment::Text(text)]);
                }
            }
            "TJ" => {
                if let Some(Object::Array(parts)) = op.operands.first() {
                    let font = &self.graphics.text.font;
                    let segments = parts
                        .iter()
                        .filter_map(|part| match part {
                            Object::String(bytes, _) => Some(Segment::Text(decode(font, bytes))),
                            other => number(other).map(Segment::Adjust),
                        })
                        .collect();
                    self.show(segments);
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.text.line = translate(&self.text.line, tx, ty);
        self.text.matrix = self.text.line;
    }

    fn next_line(&mut self) {
        let leading = self.graphics.text.leading;
        self.move_line(0.0, -leading);
    }

    fn show(&mut self, segments: Vec<Segment>) {
        let rendering = multiply(&self.text.matrix, &self.graphics.ctm);
        let origin = multiply(&[1.0, 0.0, 0.0, 1.0, 0.0, self.graphics.text.rise], &rendering);
        let scale = rendering[0].hypot(rendering[1]);
        let start_x = self.text.matrix[4];

        let mut text = String::new();
        for segment in segments {
            match segment {
                Segment::Text(chunk) => {
                    for ch in chunk.chars() {
                        self.advance_glyph(ch);
                    }
                    text.push_str(&chunk);
                }
                Segment::Adjust(amount) => {
                    if -amount > TJ_SPACE_THRESHOLD && !text.is_empty() && !text.ends_with(' ') {
                        text.push(' ');
                    }
                    let params = &self.graphics.text;
                    let tx = -amount / 1000.0 * params.size * params.horizontal_scale;
                    self.text.matrix = translate(&self.text.matrix, tx, 0.0);
                }
            }
        }

        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }
        let width = (self.text.matrix[4] - start_x).abs() * self.graphics.ctm[0].hypot(self.graphics.ctm[1]);
        let font_size = (self.graphics.text.size * scale).abs();
        self.items.push(DigitalItem {
            text,
            x: origin[4],
            y: origin[5],
            width,
            height: font_size,
            font_size,
            font_name: self.graphics.text.font.clone(),
            color: hex_color(self.graphics.fill),
        });
    }

    fn advance_glyph(&mut self, ch: char) {
        let params = &self.graphics.text;
        let glyph = estimate_text_width_units(ch.encode_utf8(&mut [0; 4]));
        let mut tx = glyph * params.size + params.char_spacing;
        if ch == ' ' {
            tx += params.word_spacing;
        }
        tx *= params.horizontal_scale;
        self.text.matrix = translate(&self.text.matrix, tx, 0.0);
    }
}

fn sub_matrix(doc: &Document, dict: &Dictionary) -> Option<Matrix> {
    let values = dict
        .get(b"Matrix")
        .ok()
        .and_then(|value| resolve(doc, value))
        .and_then(|value| value.as_array().ok())?
        .iter()
        .filter_map(number)
        .collect::<Vec<_>>();
    matrix_from(&values)
}

fn string_bytes(object: &Object) -> Option<&[u8]> {
    match object {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

fn fill_from_components(values: &[f32]) -> Option<[f32; 3]> {
    match values {
        [gray] => Some([*gray; 3]),
        [r, g, b] => Some([*r, *g, *b]),
        [c, m, y, k] => Some([
            (1.0 - c) * (1.0 - k),
            (1.0 - m) * (1.0 - k),
            (1.0 - y) * (1.0 - k),
        ]),
        _ => None,
    }
}

fn hex_color(rgb: [f32; 3]) -> String {
    let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        channel(rgb[0]),
        channel(rgb[1]),
        channel(rgb[2])
    )
}
