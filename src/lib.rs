use anyhow::{Context, Result, anyhow};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub mod dictionary;
mod encoding;
pub mod error;
pub mod extract;
pub mod logging;
pub mod model;
pub mod ocr;
pub mod pipeline;
pub mod progress;
pub mod render;
pub mod settings;
pub mod stats;
mod test_util;
pub mod translate;

pub use dictionary::Dictionary;
pub use error::PipelineError;
pub use extract::{Extractor, ExtractorConfig};
pub use model::{DocumentKind, ExtractionMethod, PageExtraction, TextItem, TranslatedPage};
pub use pipeline::{MethodChoice, Pipeline, PipelineOutput};
pub use progress::{Progress, ProgressEvent};
pub use render::{RenderOptions, render};
pub use stats::{ExportedMapping, TranslationStats, export_word_mappings};
pub use translate::{PlaceholderSource, RandomFiller, TranslationEngine};

use settings::Settings;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub input: PathBuf,
    /// Defaults to `translated_<input name>` next to the input.
    pub output: Option<PathBuf>,
    pub method: MethodChoice,
    pub dictionary: Option<PathBuf>,
    pub phrases: Option<PathBuf>,
    pub export_mappings: Option<PathBuf>,
    pub settings_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub output: PathBuf,
    pub kind: DocumentKind,
    pub method: ExtractionMethod,
    pub pages: usize,
    pub stats: TranslationStats,
    pub mappings_path: Option<PathBuf>,
}

pub async fn run(config: Config, progress: &Progress) -> Result<RunReport> {
    let settings = load_settings(config.settings_path.as_deref())?;
    let bytes = fs::read(&config.input)
        .with_context(|| format!("failed to read input: {}", config.input.display()))?;

    let dictionary = Arc::new(build_dictionary_store(&config, &settings)?);
    let extractor = Extractor::new(extractor_config(&settings));
    let engine = TranslationEngine::with_placeholder(
        dictionary,
        RandomFiller::new(&settings.placeholder_alphabet),
    )
    .with_page_delay(Duration::from_millis(settings.page_delay_ms));
    let render_options = RenderOptions {
        body_font: load_body_font(&settings),
        ..RenderOptions::default()
    };

    let mut pipeline = Pipeline::with_parts(extractor, engine, render_options);
    let output = pipeline.run(&bytes, config.method, progress).await?;

    let output_path = config
        .output
        .clone()
        .map(Ok)
        .unwrap_or_else(|| default_output_path(&config.input))?;
    fs::write(&output_path, &output.document)
        .with_context(|| format!("failed to write output: {}", output_path.display()))?;
    tracing::info!(path = %output_path.display(), "translated pdf written");

    if let Some(path) = &config.export_mappings {
        let exported = export_word_mappings(&output.translated);
        let json = serde_json::to_string_pretty(&exported)
            .with_context(|| "failed to serialize word mappings")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write mappings: {}", path.display()))?;
    }

    Ok(RunReport {
        output: output_path,
        kind: output.kind,
        method: output.method,
        pages: output.extracted.len(),
        stats: output.stats,
        mappings_path: config.export_mappings,
    })
}

pub fn classify_file(input: &Path, settings_path: Option<&str>) -> Result<DocumentKind> {
    let settings = load_settings(settings_path)?;
    let bytes = fs::read(input)
        .with_context(|| format!("failed to read input: {}", input.display()))?;
    let extractor = Extractor::new(extractor_config(&settings));
    Ok(extractor.classify(&bytes))
}

/// Converts a TEI dictionary to the JSON word map, layering `merge` files on
/// top in order. Returns the number of entries written.
pub fn build_dictionary(tei: &Path, merge: &[PathBuf], output: &Path) -> Result<usize> {
    let xml = fs::read_to_string(tei)
        .with_context(|| format!("failed to read TEI file: {}", tei.display()))?;
    let mut combined = dictionary::tei::parse_tei(&xml)
        .with_context(|| format!("failed to parse TEI file: {}", tei.display()))?;
    tracing::info!(entries = combined.len(), "parsed TEI dictionary");
    for path in merge {
        let overlay = dictionary::load_word_map(path)?;
        tracing::info!(path = %path.display(), entries = overlay.len(), "merging dictionary");
        combined = dictionary::combine(combined, overlay).into_iter().collect();
    }
    let sorted = combined.into_iter().collect::<BTreeMap<_, _>>();
    let json = serde_json::to_string_pretty(&sorted)
        .with_context(|| "failed to serialize dictionary")?;
    fs::write(output, json)
        .with_context(|| format!("failed to write dictionary: {}", output.display()))?;
    Ok(sorted.len())
}

fn load_settings(path: Option<&str>) -> Result<Settings> {
    settings::load_settings(path.map(Path::new))
}

fn extractor_config(settings: &Settings) -> ExtractorConfig {
    ExtractorConfig {
        ocr_languages: settings.ocr_languages.clone(),
        ocr_scale: settings.ocr_scale,
        scanned_threshold: settings.scanned_threshold,
    }
}

fn build_dictionary_store(config: &Config, settings: &Settings) -> Result<Dictionary> {
    let dictionary_path = config
        .dictionary
        .clone()
        .or_else(|| settings.dictionary_path.as_ref().map(PathBuf::from));
    let dictionary = Dictionary::load_or_fallback(dictionary_path.as_deref());

    let phrases_path = config
        .phrases
        .clone()
        .or_else(|| settings.phrases_path.as_ref().map(PathBuf::from));
    let Some(phrases_path) = phrases_path else {
        return Ok(dictionary);
    };
    let phrases = dictionary::load_phrases(&phrases_path)?;
    tracing::info!(phrases = phrases.len(), "phrase table loaded");
    Ok(dictionary.with_phrases(phrases))
}

fn load_body_font(settings: &Settings) -> Option<render::FontMetrics> {
    let path = settings.font_path.as_deref()?;
    match render::load_font_metrics(Path::new(path)) {
        Ok(metrics) => {
            tracing::info!(
                family = metrics.family().unwrap_or("unknown"),
                "using embedded body font"
            );
            Some(metrics)
        }
        Err(err) => {
            tracing::warn!(error = %err, "body font unavailable, using Helvetica");
            None
        }
    }
}

fn default_output_path(input: &Path) -> Result<PathBuf> {
    let name = input
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("input path has no file name: {}", input.display()))?;
    Ok(input.with_file_name(format!("translated_{name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{text_pdf, with_temp_home};

    #[test]
    fn default_output_sits_next_to_input() {
        let path = default_output_path(Path::new("/tmp/reports/scan.pdf")).expect("path");
        assert_eq!(path, PathBuf::from("/tmp/reports/translated_scan.pdf"));
        assert!(default_output_path(Path::new("/")).is_err());
    }

    #[test]
    fn build_dictionary_merges_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tei = dir.path().join("dict.tei");
        fs::write(
            &tei,
            r#"<TEI><text><body>
            <entry><form><orth>Heart</orth></form><sense><cit type="trans"><quote>قلب</quote></cit></sense></entry>
            <entry><form><orth>lung</orth></form><sense><cit type="trans"><quote>رئة</quote></cit></sense></entry>
            </body></text></TEI>"#,
        )
        .expect("write tei");
        let extra = dir.path().join("extra.json");
        fs::write(&extra, r#"{"lung": "رئتان", "pain": "ألم"}"#).expect("write extra");
        let output = dir.path().join("out.json");

        let count = build_dictionary(&tei, &[extra], &output).expect("build");
        assert_eq!(count, 3);
        let written: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&output).expect("read")).expect("json");
        assert_eq!(written["heart"], "قلب");
        assert_eq!(written["lung"], "رئتان");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_writes_pdf_and_mappings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("note.pdf");
        fs::write(&input, text_pdf(&[&["hello world"]])).expect("write pdf");
        let dictionary = dir.path().join("dict.json");
        fs::write(&dictionary, r#"{"hello": "bonjour", "world": "monde"}"#).expect("dict");
        let mappings = dir.path().join("mappings.json");

        let config = Config {
            input: input.clone(),
            method: MethodChoice::Digital,
            dictionary: Some(dictionary),
            export_mappings: Some(mappings.clone()),
            ..Config::default()
        };
        let report = with_temp_home(|_| {
            tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current().block_on(run(config, &Progress::silent()))
            })
        })
        .expect("run");

        assert_eq!(report.output, dir.path().join("translated_note.pdf"));
        assert!(fs::read(&report.output).expect("output").starts_with(b"%PDF"));
        assert_eq!(report.stats.total_words, 1);
        let exported: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&mappings).expect("mappings")).expect("json");
        assert_eq!(exported[0]["original"], "hello");
        assert_eq!(exported[0]["translated"], "bonjour");
        assert_eq!(exported[1]["isMedical"], false);
    }
}
