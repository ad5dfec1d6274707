use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use super::parse::parse_tsv_words;
use super::raster::render_pdf_pages;
use super::{OcrBackend, OcrEngine, OcrWord, RasterPage};

/// Page segmentation mode 3: fully automatic layout analysis.
const PAGE_SEGMENTATION: u32 = 3;

/// Tesseract CLI backend; pages are rasterized with mutool or pdftoppm.
#[derive(Debug, Clone, Default)]
pub struct Tesseract;

impl OcrBackend for Tesseract {
    type Engine = TesseractEngine;

    fn rasterize(&self, pdf_bytes: &[u8], scale: f32) -> Result<Vec<RasterPage>> {
        render_pdf_pages(pdf_bytes, scale)
    }

    fn start(&self, languages: &str) -> Result<TesseractEngine> {
        let languages = normalize_ocr_languages(languages)?;
        let workdir = tempfile::Builder::new()
            .prefix("ocr-")
            .tempdir()
            .with_context(|| "failed to create OCR work directory")?;
        tracing::info!(languages = %languages, "tesseract engine started");
        Ok(TesseractEngine {
            languages,
            workdir: Some(workdir),
        })
    }
}

/// A started engine: the resolved language set plus a scratch directory that
/// lives until [`OcrEngine::terminate`].
#[derive(Debug)]
pub struct TesseractEngine {
    languages: String,
    workdir: Option<TempDir>,
}

impl TesseractEngine {
    fn page_path(&self) -> Result<PathBuf> {
        let dir = self
            .workdir
            .as_ref()
            .ok_or_else(|| anyhow!("tesseract engine already terminated"))?;
        Ok(dir.path().join("page.png"))
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&mut self, page: &RasterPage) -> Result<Vec<OcrWord>> {
        let path = self.page_path()?;
        std::fs::write(&path, &page.png).with_context(|| "failed to write temp image for OCR")?;
        let tsv = run_tesseract_tsv(&path, &self.languages, PAGE_SEGMENTATION)?;
        parse_tsv_words(&tsv)
    }

    fn terminate(&mut self) -> Result<()> {
        if let Some(dir) = self.workdir.take() {
            dir.close()
                .with_context(|| "failed to remove OCR work directory")?;
            tracing::info!("tesseract engine terminated");
        }
        Ok(())
    }
}

pub fn list_tesseract_languages() -> Result<Vec<String>> {
    let output = Command::new("tesseract")
        .arg("--list-langs")
        .output()
        .with_context(|| "failed to run tesseract --list-langs")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract --list-langs failed: {}", stderr.trim()));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_language_list(&stdout))
}

fn parse_language_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_ocr_languages(requested: &str) -> Result<String> {
    let available = list_tesseract_languages()?;
    select_languages(requested, &available)
}

fn select_languages(requested: &str, available: &[String]) -> Result<String> {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("ocr languages is empty"));
    }

    let mut chosen = Vec::new();
    let mut missing = Vec::new();
    for raw in trimmed.split(['+', ',', ' ']) {
        let lang = raw.trim();
        if lang.is_empty() {
            continue;
        }
        if available.iter().any(|value| value == lang) {
            chosen.push(lang.to_string());
        } else {
            missing.push(lang.to_string());
        }
    }

    if chosen.is_empty() {
        return Err(anyhow!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        ));
    }
    if !missing.is_empty() {
        tracing::warn!(
            missing = %missing.join(", "),
            available = %available.join(", "),
            "some ocr languages are not installed"
        );
    }

    Ok(chosen.join("+"))
}

fn run_tesseract_tsv(path: &Path, languages: &str, psm: u32) -> Result<String> {
    let output = Command::new("tesseract")
        .arg(path)
        .arg("stdout")
        .arg("-l")
        .arg(languages)
        .arg("--oem")
        .arg("1")
        .arg("--psm")
        .arg(psm.to_string())
        .arg("tsv")
        .output()
        .with_context(|| "failed to run tesseract (is it installed?)")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract failed: {}", stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
