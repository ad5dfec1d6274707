use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;

use crate::dictionary::Dictionary;
use crate::error::PipelineError;
use crate::extract::{Extractor, ExtractorConfig};
use crate::model::{DocumentKind, ExtractionMethod, PageExtraction, TranslatedPage};
use crate::ocr::{OcrBackend, Tesseract};
use crate::progress::Progress;
use crate::render::{RenderOptions, render};
use crate::stats::{TranslationStats, stats};
use crate::translate::{PlaceholderSource, RandomFiller, TranslationEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodChoice {
    #[default]
    Auto,
    Digital,
    Ocr,
}

impl FromStr for MethodChoice {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(MethodChoice::Auto),
            "digital" | "text" => Ok(MethodChoice::Digital),
            "ocr" | "scanned" => Ok(MethodChoice::Ocr),
            other => Err(anyhow!(
                "unknown extraction method: {other} (expected auto, digital or ocr)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub kind: DocumentKind,
    pub method: ExtractionMethod,
    pub extracted: Vec<PageExtraction>,
    pub translated: Vec<TranslatedPage>,
    pub stats: TranslationStats,
    pub document: Vec<u8>,
}

/// Phase bands of the overall progress range.
const CLASSIFY: (f32, f32) = (0.0, 5.0);
const EXTRACT: (f32, f32) = (5.0, 50.0);
const TRANSLATE: (f32, f32) = (50.0, 80.0);
const STATS: (f32, f32) = (80.0, 85.0);
const RENDER: (f32, f32) = (85.0, 100.0);

/// Classify, extract, translate, summarize and render one document.
pub struct Pipeline<B: OcrBackend = Tesseract, P: PlaceholderSource = RandomFiller> {
    extractor: Extractor<B>,
    engine: TranslationEngine<P>,
    render_options: RenderOptions,
}

impl Pipeline<Tesseract, RandomFiller> {
    pub fn new(dictionary: Arc<Dictionary>, config: ExtractorConfig) -> Self {
        Self::with_parts(
            Extractor::new(config),
            TranslationEngine::new(dictionary),
            RenderOptions::default(),
        )
    }
}

impl<B: OcrBackend, P: PlaceholderSource> Pipeline<B, P> {
    pub fn with_parts(
        extractor: Extractor<B>,
        engine: TranslationEngine<P>,
        render_options: RenderOptions,
    ) -> Self {
        Self {
            extractor,
            engine,
            render_options,
        }
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.engine = self.engine.with_page_delay(delay);
        self
    }

    pub async fn run(
        &mut self,
        bytes: &[u8],
        choice: MethodChoice,
        progress: &Progress,
    ) -> Result<PipelineOutput, PipelineError> {
        let classify = progress.band(CLASSIFY.0, CLASSIFY.1);
        classify.report(0.0, "Analyzing document...");
        let kind = self.extractor.classify(bytes);
        let method = match choice {
            MethodChoice::Auto => kind.extraction_method(),
            MethodChoice::Digital => ExtractionMethod::Digital,
            MethodChoice::Ocr => ExtractionMethod::Ocr,
        };
        tracing::info!(kind = ?kind, method = ?method, "extraction method selected");
        classify.report(100.0, format!("Detected {} document", kind_label(kind)));

        let extracted = self
            .extractor
            .extract(bytes, method, &progress.band(EXTRACT.0, EXTRACT.1))
            .await?;

        let translated = self
            .engine
            .translate(&extracted, &progress.band(TRANSLATE.0, TRANSLATE.1))
            .await?;

        let stats_progress = progress.band(STATS.0, STATS.1);
        stats_progress.report(0.0, "Calculating statistics...");
        let stats = stats(&translated);
        stats_progress.report(100.0, "Statistics ready");

        let render_progress = progress.band(RENDER.0, RENDER.1);
        render_progress.report(0.0, "Generating translated PDF...");
        let document = render(bytes, &extracted, &translated, &self.render_options)?;
        render_progress.report(100.0, "Done");

        Ok(PipelineOutput {
            kind,
            method,
            extracted,
            translated,
            stats,
            document,
        })
    }
}

fn kind_label(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Digital => "digital",
        DocumentKind::Scanned => "scanned",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::text_pdf;
    use std::collections::HashMap;

    fn pipeline() -> Pipeline {
        let dictionary = Dictionary::new(HashMap::from([
            ("hello".to_string(), "bonjour".to_string()),
            ("world".to_string(), "monde".to_string()),
        ]));
        Pipeline::new(Arc::new(dictionary), ExtractorConfig::default()).with_render_options(
            RenderOptions {
                generated_on: "2024-01-02".to_string(),
                ..RenderOptions::default()
            },
        )
    }

    #[test]
    fn method_choice_parses_case_insensitively() {
        assert_eq!("OCR".parse::<MethodChoice>().expect("ocr"), MethodChoice::Ocr);
        assert_eq!("auto".parse::<MethodChoice>().expect("auto"), MethodChoice::Auto);
        assert!("vision".parse::<MethodChoice>().is_err());
    }

    #[tokio::test]
    async fn forced_digital_run_produces_all_artifacts() {
        let pdf = text_pdf(&[&["hello world"], &["unknown term"]]);
        let (progress, mut rx) = Progress::channel();
        let output = pipeline()
            .run(&pdf, MethodChoice::Digital, &progress)
            .await
            .expect("run");

        assert_eq!(output.kind, DocumentKind::Scanned);
        assert_eq!(output.method, ExtractionMethod::Digital);
        assert_eq!(output.extracted.len(), 2);
        assert_eq!(output.translated[0].translated_text, "bonjour monde");
        assert_eq!(output.stats.total_pages, 2);
        assert!(output.document.starts_with(b"%PDF"));

        let mut last = 0.0f32;
        let mut final_event = None;
        while let Ok(event) = rx.try_recv() {
            assert!(event.percent >= last, "progress went backwards");
            last = event.percent;
            final_event = Some(event);
        }
        let final_event = final_event.expect("events");
        assert_eq!(final_event.percent, 100.0);
        assert_eq!(final_event.message, "Done");
    }

    #[tokio::test]
    async fn unreadable_input_fails_in_extraction() {
        let err = pipeline()
            .run(b"not a pdf", MethodChoice::Digital, &Progress::silent())
            .await
            .expect_err("fail");
        assert!(matches!(err, PipelineError::Extraction(_)));
    }
}
