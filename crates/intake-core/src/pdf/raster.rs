//! Full-page rasterization through poppler's `pdftoppm`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, trace};

use super::Result;
use crate::error::PdfError;

const PDFTOPPM: &str = "pdftoppm";

/// Whether `pdftoppm` can be spawned.
pub fn pdftoppm_available() -> bool {
    match Command::new(PDFTOPPM).arg("-v").output() {
        Ok(_) => true,
        Err(e) => {
            trace!("pdftoppm unavailable: {}", e);
            false
        }
    }
}

/// Render one page (1-indexed) to `<out_dir>/<stem>.png`.
pub fn render_page(pdf: &Path, page: u32, dpi: u32, out_dir: &Path, stem: &str) -> Result<PathBuf> {
    let prefix = out_dir.join(stem);
    let output = Command::new(PDFTOPPM)
        .arg("-png")
        .arg("-singlefile")
        .args(["-r", &dpi.to_string()])
        .args(["-f", &page.to_string(), "-l", &page.to_string()])
        .arg(pdf)
        .arg(&prefix)
        .output()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => PdfError::Render(format!("{} not found on PATH", PDFTOPPM)),
            _ => PdfError::Io(e),
        })?;

    if !output.status.success() {
        return Err(PdfError::Render(format!(
            "{} failed on page {}: {}",
            PDFTOPPM,
            page,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let path = prefix.with_extension("png");
    debug!("Rendered page {} at {} dpi to {}", page, dpi, path.display());
    Ok(path)
}
