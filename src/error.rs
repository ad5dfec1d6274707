use thiserror::Error;

/// Digital pre-pass used for classification could not run. Callers fall back
/// to treating the document as scanned.
#[derive(Debug, Error)]
#[error("failed to classify document: {source}")]
pub struct ClassificationError {
    #[source]
    pub source: anyhow::Error,
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to load pdf: {0}")]
    Load(#[source] anyhow::Error),

    #[error("failed to extract text from page {page}: {source}")]
    Page {
        page: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("OCR processing failed: {0}")]
    Ocr(#[source] anyhow::Error),
}

#[derive(Debug, Error)]
#[error("failed to translate page {page}: {reason}")]
pub struct TranslationError {
    pub page: u32,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to load source pdf: {0}")]
    SourceLoad(#[source] anyhow::Error),

    #[error("failed to build page {page}: {source}")]
    Page {
        page: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to serialize pdf: {0}")]
    Serialize(#[source] anyhow::Error),
}

/// Raised when the dictionary source is unreadable; the store then uses the
/// built-in fallback set.
#[derive(Debug, Error)]
#[error("failed to load dictionary from {path}: {source}")]
pub struct DictionaryLoadError {
    pub path: String,
    #[source]
    pub source: anyhow::Error,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Render(#[from] RenderError),
}
