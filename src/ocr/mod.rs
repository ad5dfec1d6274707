mod parse;
mod raster;
mod tesseract;

use anyhow::Result;
use serde::Serialize;

pub use tesseract::{Tesseract, TesseractEngine, list_tesseract_languages};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BBoxPx {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrWord {
    pub text: String,
    pub bbox: BBoxPx,
    /// Recognition confidence in `0.0..=1.0`.
    pub conf: f32,
}

/// One rasterized page as PNG bytes plus its pixel size.
#[derive(Debug, Clone)]
pub struct RasterPage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// A running recognizer. Owned by exactly one extractor; `terminate` must be
/// called before it is dropped and never while `recognize` is in flight.
/// Calls block, so the extractor moves the engine onto the blocking pool.
pub trait OcrEngine: Send + 'static {
    fn recognize(&mut self, page: &RasterPage) -> Result<Vec<OcrWord>>;
    fn terminate(&mut self) -> Result<()>;
}

/// Everything the OCR extraction path needs from the outside world.
pub trait OcrBackend: Clone + Send + 'static {
    type Engine: OcrEngine;

    fn rasterize(&self, pdf_bytes: &[u8], scale: f32) -> Result<Vec<RasterPage>>;

    /// Creates an engine for a `+`-joined language set such as `eng+ara`.
    fn start(&self, languages: &str) -> Result<Self::Engine>;
}
