//! PDF processing module.

mod extractor;
mod raster;

pub use extractor::PdfExtractor;
pub use raster::pdftoppm_available;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::PdfError;
use crate::models::config::{RenderBackend, RenderConfig};

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Turns a PDF into the two inputs the extractor needs: its text layer
/// and one PNG per page.
pub trait DocumentRenderer {
    /// Extract the plain text layer.
    fn extract_text(&self, pdf: &Path) -> Result<String>;

    /// Write `image_<n>.png` (n from 0) into `out_dir`, returning the paths
    /// in page order.
    fn render_pages(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Renderer backed by lopdf/pdf-extract and, when available, pdftoppm.
pub struct PdfRenderer {
    config: RenderConfig,
}

impl PdfRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    fn load(&self, pdf: &Path) -> Result<PdfExtractor> {
        let data = fs::read(pdf)?;
        PdfExtractor::load(&data)
    }

    fn page_limit(&self, page_count: u32) -> u32 {
        let limit = match self.config.max_pages {
            0 => page_count,
            max => page_count.min(u32::try_from(max).unwrap_or(u32::MAX)),
        };

        if limit < page_count {
            warn!(
                "Rendering only {} of {} pages (render.max_pages)",
                limit, page_count
            );
        }
        limit
    }

    fn rasterize(&self, pdf: &Path, page_count: u32, out_dir: &Path) -> Result<Vec<PathBuf>> {
        (1..=self.page_limit(page_count))
            .map(|page| {
                let stem = format!("image_{}", page - 1);
                raster::render_page(pdf, page, self.config.dpi, out_dir, &stem)
            })
            .collect()
    }

    fn embedded(&self, extractor: &PdfExtractor, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();

        for page in 1..=self.page_limit(extractor.page_count()) {
            let Some(image) = extractor.page_images(page)?.into_iter().next() else {
                debug!("Page {} has no decodable images", page);
                continue;
            };

            let path = out_dir.join(format!("image_{}.png", paths.len()));
            image
                .save_with_format(&path, image::ImageFormat::Png)
                .map_err(|e| PdfError::Render(e.to_string()))?;
            paths.push(path);
        }

        if paths.is_empty() {
            return Err(PdfError::Render("no page images found in PDF".to_string()));
        }
        Ok(paths)
    }
}

impl DocumentRenderer for PdfRenderer {
    fn extract_text(&self, pdf: &Path) -> Result<String> {
        let text = self.load(pdf)?.extract_text()?;
        debug!("Extracted {} chars of text from {}", text.len(), pdf.display());
        Ok(text)
    }

    fn render_pages(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let extractor = self.load(pdf)?;
        fs::create_dir_all(out_dir)?;

        let paths = match self.config.backend {
            RenderBackend::Pdftoppm if pdftoppm_available() => {
                self.rasterize(pdf, extractor.page_count(), out_dir)?
            }
            RenderBackend::Pdftoppm => {
                warn!("pdftoppm not found, falling back to embedded page images");
                self.embedded(&extractor, out_dir)?
            }
            RenderBackend::Embedded => self.embedded(&extractor, out_dir)?,
        };

        debug!("Rendered {} page image(s) into {}", paths.len(), out_dir.display());
        Ok(paths)
    }
}
