use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::extract::{DEFAULT_OCR_LANGUAGES, DEFAULT_OCR_SCALE, DEFAULT_SCANNED_THRESHOLD};
use crate::translate::ARABIC_ALPHABET;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const HOME_DIR_NAME: &str = ".pdf-translation-studio";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub dictionary_path: Option<String>,
    pub phrases_path: Option<String>,
    pub ocr_languages: String,
    pub ocr_scale: f32,
    pub scanned_threshold: usize,
    pub placeholder_alphabet: String,
    pub page_delay_ms: u64,
    pub font_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dictionary_path: None,
            phrases_path: None,
            ocr_languages: DEFAULT_OCR_LANGUAGES.to_string(),
            ocr_scale: DEFAULT_OCR_SCALE,
            scanned_threshold: DEFAULT_SCANNED_THRESHOLD,
            placeholder_alphabet: ARABIC_ALPHABET.to_string(),
            page_delay_ms: 0,
            font_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    dictionary: Option<DictionarySettings>,
    ocr: Option<OcrSettings>,
    translation: Option<TranslationSettings>,
    render: Option<RenderSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct DictionarySettings {
    path: Option<String>,
    phrases_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    languages: Option<String>,
    scale: Option<f32>,
    scanned_threshold: Option<usize>,
    alphabet: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslationSettings {
    page_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    font_path: Option<String>,
}

/// Built-in defaults, then `./settings.toml`, `./settings.local.toml`, the
/// same pair under `~/.pdf-translation-studio`, then `extra_path`. Later
/// files win key by key.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    settings.merge(parse_settings(DEFAULT_SETTINGS_TOML, Path::new("<built-in>"))?);
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge(parse_settings(&content, &path)?);
            tracing::debug!(path = %path.display(), "settings layer applied");
        }
    }

    Ok(settings)
}

fn parse_settings(content: &str, path: &Path) -> Result<SettingsFile> {
    toml::from_str(content).with_context(|| format!("failed to parse settings: {}", path.display()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(dictionary) = incoming.dictionary {
            if let Some(path) = non_blank(dictionary.path) {
                self.dictionary_path = Some(path);
            }
            if let Some(path) = non_blank(dictionary.phrases_path) {
                self.phrases_path = Some(path);
            }
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(languages) = non_blank(ocr.languages) {
                self.ocr_languages = languages;
            }
            if let Some(scale) = ocr.scale {
                if scale > 0.0 {
                    self.ocr_scale = scale;
                }
            }
            if let Some(threshold) = ocr.scanned_threshold {
                self.scanned_threshold = threshold;
            }
            if let Some(alphabet) = non_blank(ocr.alphabet) {
                self.placeholder_alphabet = alphabet;
            }
        }
        if let Some(translation) = incoming.translation {
            if let Some(delay) = translation.page_delay_ms {
                self.page_delay_ms = delay;
            }
        }
        if let Some(render) = incoming.render {
            if let Some(path) = non_blank(render.font_path) {
                self.font_path = Some(path);
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(HOME_DIR_NAME))
        }
    })
}
