use anyhow::{Context, Result, anyhow};
use image::GenericImageView;
use std::env;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

use super::RasterPage;

const POINTS_PER_INCH: f32 = 72.0;

/// Rasterizes every page to PNG at `scale` × the PDF's native 72 dpi.
pub(super) fn render_pdf_pages(pdf_bytes: &[u8], scale: f32) -> Result<Vec<RasterPage>> {
    let dir = tempdir().with_context(|| "failed to create temp dir for pdf")?;
    let input_path = dir.path().join("input.pdf");
    fs::write(&input_path, pdf_bytes).with_context(|| "failed to write temp pdf")?;
    let dpi = raster_dpi(scale).to_string();

    if command_exists("mutool") {
        let output = Command::new("mutool")
            .arg("draw")
            .arg("-r")
            .arg(&dpi)
            .arg("-o")
            .arg(dir.path().join("page-%03d.png"))
            .arg(&input_path)
            .output()
            .with_context(|| "failed to run mutool")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("mutool failed: {}", stderr.trim()));
        }
    } else if command_exists("pdftoppm") {
        let output = Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(&dpi)
            .arg(&input_path)
            .arg(dir.path().join("page"))
            .output()
            .with_context(|| "failed to run pdftoppm")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("pdftoppm failed: {}", stderr.trim()));
        }
    } else {
        return Err(anyhow!(
            "pdf rendering requires mutool or pdftoppm (install mupdf or poppler)"
        ));
    }

    let mut entries: Vec<_> = fs::read_dir(dir.path())
        .with_context(|| "failed to read temp pdf directory")?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_page_image(path))
        .collect();
    entries.sort_by_key(|path| page_index(path));

    let mut pages = Vec::with_capacity(entries.len());
    for path in entries {
        let png = fs::read(&path).with_context(|| "failed to read rendered pdf page")?;
        pages.push(RasterPage::from_png(png)?);
    }
    Ok(pages)
}

impl RasterPage {
    pub fn from_png(png: Vec<u8>) -> Result<Self> {
        let image =
            image::load_from_memory(&png).with_context(|| "failed to decode rendered page")?;
        let (width, height) = image.dimensions();
        Ok(Self { png, width, height })
    }
}

fn raster_dpi(scale: f32) -> u32 {
    (POINTS_PER_INCH * scale.max(0.1)).round() as u32
}

fn is_page_image(path: &Path) -> bool {
    let named_page = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with("page"))
        .unwrap_or(false);
    let is_png = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("png"))
        .unwrap_or(false);
    named_page && is_png
}

/// pdftoppm pads page numbers by document length (`page-1` vs `page-01`),
/// so sort numerically rather than by name.
fn page_index(path: &Path) -> u32 {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.rsplit('-').next())
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(u32::MAX)
}

fn command_exists(cmd: &str) -> bool {
    let Some(path_var) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&path_var).any(|dir| is_executable(&dir.join(cmd)))
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}
