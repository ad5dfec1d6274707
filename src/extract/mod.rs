mod digital;

pub(crate) use digital::{inherited, load_document};

use anyhow::anyhow;

use crate::error::{ClassificationError, ExtractionError};
use crate::model::{
    DocumentKind, ExtractionMethod, OcrItem, PageExtraction, TextItem, Viewport,
};
use crate::ocr::{OcrBackend, OcrEngine, OcrWord, Tesseract};
use crate::progress::Progress;

pub const DEFAULT_OCR_LANGUAGES: &str = "eng+ara";
pub const DEFAULT_OCR_SCALE: f32 = 2.0;
pub const DEFAULT_SCANNED_THRESHOLD: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorConfig {
    pub ocr_languages: String,
    pub ocr_scale: f32,
    /// Documents with fewer extracted characters than this are scanned.
    pub scanned_threshold: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            ocr_languages: DEFAULT_OCR_LANGUAGES.to_string(),
            ocr_scale: DEFAULT_OCR_SCALE,
            scanned_threshold: DEFAULT_SCANNED_THRESHOLD,
        }
    }
}

/// Turns PDF bytes into per-page text items, either from the content streams
/// or by OCR. The OCR engine is started on first use and kept until
/// [`Extractor::release`] or drop.
pub struct Extractor<B: OcrBackend = Tesseract> {
    backend: B,
    config: ExtractorConfig,
    engine: Option<B::Engine>,
}

impl Extractor<Tesseract> {
    pub fn new(config: ExtractorConfig) -> Self {
        Self::with_backend(Tesseract, config)
    }
}

impl<B: OcrBackend> Extractor<B> {
    pub fn with_backend(backend: B, config: ExtractorConfig) -> Self {
        Self {
            backend,
            config,
            engine: None,
        }
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    pub fn try_classify(&self, bytes: &[u8]) -> Result<DocumentKind, ClassificationError> {
        let pages = extract_digital(bytes, &Progress::silent())
            .map_err(|err| ClassificationError { source: err.into() })?;
        let chars = pages
            .iter()
            .map(|page| page.raw_text.chars().count())
            .sum::<usize>();
        let kind = if chars < self.config.scanned_threshold {
            DocumentKind::Scanned
        } else {
            DocumentKind::Digital
        };
        tracing::info!(chars, kind = ?kind, "classified document");
        Ok(kind)
    }

    /// Like [`Extractor::try_classify`], but an unreadable document is
    /// treated as scanned.
    pub fn classify(&self, bytes: &[u8]) -> DocumentKind {
        match self.try_classify(bytes) {
            Ok(kind) => kind,
            Err(err) => {
                tracing::warn!(error = %err, "classification failed; assuming scanned document");
                DocumentKind::Scanned
            }
        }
    }

    pub async fn extract(
        &mut self,
        bytes: &[u8],
        method: ExtractionMethod,
        progress: &Progress,
    ) -> Result<Vec<PageExtraction>, ExtractionError> {
        match method {
            ExtractionMethod::Digital => {
                let pages = extract_digital(bytes, progress)?;
                progress.report(100.0, "Text extraction complete");
                Ok(pages)
            }
            ExtractionMethod::Ocr => self.extract_ocr(bytes, progress).await,
        }
    }

    async fn extract_ocr(
        &mut self,
        bytes: &[u8],
        progress: &Progress,
    ) -> Result<Vec<PageExtraction>, ExtractionError> {
        progress.report(10.0, "Initializing OCR engine...");
        let engine = match self.engine.take() {
            Some(engine) => engine,
            None => {
                let backend = self.backend.clone();
                let languages = self.config.ocr_languages.clone();
                blocking(move || backend.start(&languages))
                    .await?
                    .map_err(ExtractionError::Ocr)?
            }
        };

        let (engine, result) = self.recognize_pages(engine, bytes, progress).await;
        self.engine = engine;
        let pages = result?;

        progress.report(90.0, "Finalizing OCR extraction...");
        progress.report(100.0, "OCR extraction complete");
        Ok(pages)
    }

    /// Hands the engine back alongside the outcome so a failed page does not
    /// lose it. `None` only when a worker task died holding it.
    async fn recognize_pages(
        &self,
        mut engine: B::Engine,
        bytes: &[u8],
        progress: &Progress,
    ) -> (Option<B::Engine>, Result<Vec<PageExtraction>, ExtractionError>) {
        progress.report(20.0, "Converting PDF to images...");
        let backend = self.backend.clone();
        let pdf = bytes.to_vec();
        let scale = self.config.ocr_scale;
        let rasters = match blocking(move || backend.rasterize(&pdf, scale)).await {
            Ok(Ok(rasters)) => rasters,
            Ok(Err(err)) => return (Some(engine), Err(ExtractionError::Ocr(err))),
            Err(err) => return (Some(engine), Err(err)),
        };
        if rasters.is_empty() {
            return (
                Some(engine),
                Err(ExtractionError::Ocr(anyhow!("document rendered no pages"))),
            );
        }

        let total = rasters.len();
        let mut pages = Vec::with_capacity(total);
        for (idx, raster) in rasters.into_iter().enumerate() {
            let page_number = idx as u32 + 1;
            progress.report(
                20.0 + (idx as f32 / total as f32) * 60.0,
                format!("OCR processing page {page_number}..."),
            );
            let (width, height) = (raster.width, raster.height);
            let recognized = blocking(move || {
                let words = engine.recognize(&raster);
                (engine, words)
            })
            .await;
            let words = match recognized {
                Ok((returned, words)) => {
                    engine = returned;
                    words
                }
                Err(err) => return (None, Err(err)),
            };
            let words = match words {
                Ok(words) => words,
                Err(source) => {
                    return (
                        Some(engine),
                        Err(ExtractionError::Page {
                            page: page_number,
                            source,
                        }),
                    );
                }
            };
            tracing::debug!(page = page_number, words = words.len(), "ocr page recognized");
            pages.push(ocr_page(page_number, width, height, words));
        }
        (Some(engine), Ok(pages))
    }

    /// Terminates the OCR engine if one is running. Safe to call repeatedly.
    pub fn release(&mut self) -> anyhow::Result<()> {
        if let Some(mut engine) = self.engine.take() {
            engine.terminate()?;
        }
        Ok(())
    }
}

impl<B: OcrBackend> Drop for Extractor<B> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::warn!(error = %err, "failed to terminate OCR engine");
        }
    }
}

/// Runs subprocess-bound OCR work on the blocking pool so progress keeps
/// flowing while a page is recognized.
async fn blocking<T, F>(task: F) -> Result<T, ExtractionError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| ExtractionError::Ocr(anyhow!("OCR worker failed: {err}")))
}

fn extract_digital(bytes: &[u8], progress: &Progress) -> Result<Vec<PageExtraction>, ExtractionError> {
    progress.report(10.0, "Loading PDF document...");
    let doc = load_document(bytes).map_err(ExtractionError::Load)?;
    let page_ids = doc.get_pages();
    let total = page_ids.len();
    progress.report(20.0, format!("Processing {total} pages..."));

    let mut pages = Vec::with_capacity(total);
    for (page_number, page_id) in page_ids {
        progress.report(
            20.0 + (page_number as f32 / total.max(1) as f32) * 60.0,
            format!("Extracting text from page {page_number}..."),
        );
        let page = digital::read_page(&doc, page_id).map_err(|source| ExtractionError::Page {
            page: page_number,
            source,
        })?;
        let raw_text = page.items.iter().fold(String::new(), |mut acc, item| {
            acc.push_str(&item.text);
            acc.push(' ');
            acc
        });
        pages.push(PageExtraction {
            page_number,
            raw_text,
            items: page.items.into_iter().map(TextItem::Digital).collect(),
            viewport: page.viewport,
            method: ExtractionMethod::Digital,
        });
    }

    progress.report(90.0, "Finalizing text extraction...");
    Ok(pages)
}

fn ocr_page(page_number: u32, width: u32, height: u32, words: Vec<OcrWord>) -> PageExtraction {
    let raw_text = words
        .iter()
        .map(|word| word.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let items = words
        .into_iter()
        .map(|word| {
            TextItem::Ocr(OcrItem {
                text: word.text,
                x: word.bbox.x as f32,
                y: word.bbox.y as f32,
                width: word.bbox.w as f32,
                height: word.bbox.h as f32,
                confidence: word.conf,
            })
        })
        .collect();
    PageExtraction {
        page_number,
        raw_text,
        items,
        viewport: Viewport {
            width: width as f32,
            height: height as f32,
        },
        method: ExtractionMethod::Ocr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{BBoxPx, RasterPage};
    use crate::test_util::text_pdf;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default, Clone)]
    struct Counters {
        started: Arc<AtomicUsize>,
        terminated: Arc<AtomicUsize>,
    }

    #[derive(Clone)]
    struct FakeBackend {
        pages: usize,
        counters: Counters,
    }

    struct FakeEngine {
        counters: Counters,
    }

    impl OcrBackend for FakeBackend {
        type Engine = FakeEngine;

        fn rasterize(&self, _pdf_bytes: &[u8], scale: f32) -> anyhow::Result<Vec<RasterPage>> {
            let side = (600.0 * scale) as u32;
            Ok((0..self.pages)
                .map(|_| RasterPage {
                    png: Vec::new(),
                    width: side,
                    height: side * 2,
                })
                .collect())
        }

        fn start(&self, _languages: &str) -> anyhow::Result<FakeEngine> {
            self.counters.started.fetch_add(1, Ordering::SeqCst);
            Ok(FakeEngine {
                counters: self.counters.clone(),
            })
        }
    }

    impl OcrEngine for FakeEngine {
        fn recognize(&mut self, _page: &RasterPage) -> anyhow::Result<Vec<OcrWord>> {
            Ok(["patient", "fever"]
                .iter()
                .enumerate()
                .map(|(idx, text)| OcrWord {
                    text: text.to_string(),
                    bbox: BBoxPx {
                        x: 100 + idx as u32 * 200,
                        y: 80,
                        w: 150,
                        h: 40,
                    },
                    conf: 0.9,
                })
                .collect())
        }

        fn terminate(&mut self) -> anyhow::Result<()> {
            self.counters.terminated.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Clone)]
    struct FailingBackend {
        counters: Counters,
    }

    struct FailingEngine {
        counters: Counters,
    }

    impl OcrBackend for FailingBackend {
        type Engine = FailingEngine;

        fn rasterize(&self, _pdf_bytes: &[u8], _scale: f32) -> anyhow::Result<Vec<RasterPage>> {
            Ok(vec![RasterPage {
                png: Vec::new(),
                width: 10,
                height: 10,
            }])
        }

        fn start(&self, _languages: &str) -> anyhow::Result<FailingEngine> {
            Ok(FailingEngine {
                counters: self.counters.clone(),
            })
        }
    }

    impl OcrEngine for FailingEngine {
        fn recognize(&mut self, _page: &RasterPage) -> anyhow::Result<Vec<OcrWord>> {
            Err(anyhow!("tesseract exited with status 1"))
        }

        fn terminate(&mut self) -> anyhow::Result<()> {
            self.counters.terminated.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fake_extractor(pages: usize) -> (Extractor<FakeBackend>, Counters) {
        let counters = Counters::default();
        let backend = FakeBackend {
            pages,
            counters: counters.clone(),
        };
        (
            Extractor::with_backend(backend, ExtractorConfig::default()),
            counters,
        )
    }

    #[test]
    fn short_documents_classify_as_scanned() {
        let (extractor, _) = fake_extractor(0);
        let short = text_pdf(&[&["hello world"]]);
        assert_eq!(extractor.classify(&short), DocumentKind::Scanned);

        let line = "The patient was admitted to the hospital with fever";
        let long = text_pdf(&[&[line, line]]);
        assert_eq!(extractor.classify(&long), DocumentKind::Digital);
    }

    #[test]
    fn threshold_counts_the_separator_after_each_run() {
        let (extractor, _) = fake_extractor(0);
        // 98 letters plus the trailing space: 99 characters
        let under = "a".repeat(98);
        assert_eq!(
            extractor.try_classify(&text_pdf(&[&[under.as_str()]])).expect("classify"),
            DocumentKind::Scanned
        );
        // 99 letters plus the trailing space: exactly 100
        let at = "a".repeat(99);
        assert_eq!(
            extractor.try_classify(&text_pdf(&[&[at.as_str()]])).expect("classify"),
            DocumentKind::Digital
        );
    }

    #[tokio::test]
    async fn failed_recognition_keeps_the_engine_for_release() {
        let counters = Counters::default();
        let backend = FailingBackend {
            counters: counters.clone(),
        };
        let mut extractor = Extractor::with_backend(backend, ExtractorConfig::default());
        let err = extractor
            .extract(b"%PDF", ExtractionMethod::Ocr, &Progress::silent())
            .await
            .expect_err("recognition fails");
        assert!(matches!(err, ExtractionError::Page { page: 1, .. }));
        assert!(extractor.has_engine());
        drop(extractor);
        assert_eq!(counters.terminated.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unreadable_documents_classify_as_scanned() {
        let (extractor, _) = fake_extractor(0);
        assert!(extractor.try_classify(b"not a pdf").is_err());
        assert_eq!(extractor.classify(b"not a pdf"), DocumentKind::Scanned);
    }

    #[tokio::test]
    async fn digital_extraction_reports_pages_in_order() {
        let (mut extractor, counters) = fake_extractor(0);
        let pdf = text_pdf(&[&["hello world"], &["unknown", "term"]]);
        let (progress, mut rx) = Progress::channel();
        let pages = extractor
            .extract(&pdf, ExtractionMethod::Digital, &progress)
            .await
            .expect("extract");

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 1);
        assert_eq!(pages[0].raw_text, "hello world ");
        assert_eq!(pages[1].items.len(), 2);
        assert_eq!(pages[1].method, ExtractionMethod::Digital);
        assert_eq!(counters.started.load(Ordering::SeqCst), 0);

        let mut messages = Vec::new();
        while let Ok(event) = rx.try_recv() {
            messages.push(event.message);
        }
        assert_eq!(messages.first().map(String::as_str), Some("Loading PDF document..."));
        assert!(messages.contains(&"Processing 2 pages...".to_string()));
        assert!(messages.contains(&"Extracting text from page 2...".to_string()));
    }

    #[tokio::test]
    async fn ocr_extraction_reuses_one_engine_until_release() {
        let (mut extractor, counters) = fake_extractor(2);
        let progress = Progress::silent();
        let pages = extractor
            .extract(b"%PDF", ExtractionMethod::Ocr, &progress)
            .await
            .expect("ocr");
        extractor
            .extract(b"%PDF", ExtractionMethod::Ocr, &progress)
            .await
            .expect("ocr again");

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].page_number, 2);
        assert_eq!(pages[0].raw_text, "patient fever");
        assert_eq!(pages[0].viewport, Viewport {
            width: 1200.0,
            height: 2400.0
        });
        match &pages[0].items[1] {
            TextItem::Ocr(item) => {
                assert_eq!(item.x, 300.0);
                assert!((item.confidence - 0.9).abs() < 1e-6);
            }
            other => panic!("unexpected item: {other:?}"),
        }
        assert_eq!(counters.started.load(Ordering::SeqCst), 1);
        assert!(extractor.has_engine());

        extractor.release().expect("release");
        extractor.release().expect("release twice");
        assert!(!extractor.has_engine());
        assert_eq!(counters.terminated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_the_extractor_terminates_the_engine() {
        let (mut extractor, counters) = fake_extractor(1);
        extractor
            .extract(b"%PDF", ExtractionMethod::Ocr, &Progress::silent())
            .await
            .expect("ocr");
        drop(extractor);
        assert_eq!(counters.terminated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn broken_pdf_fails_digital_extraction() {
        let (mut extractor, _) = fake_extractor(0);
        let err = extractor
            .extract(b"garbage", ExtractionMethod::Digital, &Progress::silent())
            .await
            .expect_err("should fail");
        assert!(matches!(err, ExtractionError::Load(_)));
    }
}
