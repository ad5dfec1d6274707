use anyhow::{Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

use super::color::Rgb;
use super::fonts::{Face, FontSet};

pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;
pub const MARGIN: f32 = 50.0;

/// Content-stream builder for one generated A4 page.
#[derive(Default)]
pub struct Canvas {
    operations: Vec<Operation>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(
        &mut self,
        fonts: &mut FontSet,
        face: Face,
        (x, y): (f32, f32),
        size: f32,
        color: Rgb,
        text: &str,
    ) -> Result<()> {
        let operand = fonts.encode(face, text)?;
        self.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![
                Object::Name(fonts.resource_key(face).as_bytes().to_vec()),
                size.into(),
            ]),
            Operation::new("rg", vec![color.0.into(), color.1.into(), color.2.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![operand]),
            Operation::new("ET", vec![]),
        ]);
        Ok(())
    }

    pub fn line(&mut self, from: (f32, f32), to: (f32, f32), thickness: f32, color: Rgb) {
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("RG", vec![color.0.into(), color.1.into(), color.2.into()]),
            Operation::new("w", vec![thickness.into()]),
            Operation::new("m", vec![from.0.into(), from.1.into()]),
            Operation::new("l", vec![to.0.into(), to.1.into()]),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    /// Adds the page and its content stream to `doc`. The page has no parent
    /// until the page tree is rebuilt.
    pub fn into_page(self, doc: &mut Document, fonts: &FontSet) -> Result<ObjectId> {
        let content = Content {
            operations: self.operations,
        }
        .encode()
        .with_context(|| "failed to encode page content")?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        Ok(doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Contents" => content_id,
            "Resources" => fonts.resources(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_wrapped_in_a_text_object() {
        let mut doc = Document::with_version("1.5");
        let mut fonts = FontSet::new(&mut doc, None);
        let mut canvas = Canvas::new();
        canvas
            .text(&mut fonts, Face::Bold, (50.0, 791.89), 16.0, Rgb(0.2, 0.2, 0.8), "Title")
            .expect("draw");
        let operators = canvas
            .operations
            .iter()
            .map(|op| op.operator.as_str())
            .collect::<Vec<_>>();
        assert_eq!(operators, vec!["BT", "Tf", "rg", "Td", "Tj", "ET"]);
        assert_eq!(canvas.operations[1].operands[0], Object::Name(b"F2".to_vec()));
    }

    #[test]
    fn unencodable_text_leaves_the_canvas_untouched() {
        let mut doc = Document::with_version("1.5");
        let mut fonts = FontSet::new(&mut doc, None);
        let mut canvas = Canvas::new();
        let result = canvas.text(
            &mut fonts,
            Face::Body,
            (50.0, 700.0),
            12.0,
            Rgb::BLACK,
            "عالم",
        );
        assert!(result.is_err());
        assert!(canvas.operations.is_empty());
    }
}
