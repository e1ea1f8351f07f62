//! pdfium binding and whole-page rasterisation.
//!
//! Binding goes through `pdfium-auto`: `PDFIUM_LIB_PATH` when it names an
//! existing library file, otherwise the per-user cache, otherwise a one-time
//! download into that cache. Failures come back as
//! [`DocParseError::PdfiumBindingFailed`] rather than a panic.
//!
//! All pdfium work is synchronous; async callers wrap it in
//! `tokio::task::spawn_blocking`.

use crate::error::DocParseError;
use image::DynamicImage;
use pdfium_auto::PdfiumAutoError;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Bind to pdfium, downloading it into the cache if needed.
pub fn bind_pdfium() -> Result<Pdfium, DocParseError> {
    pdfium_auto::bind_pdfium_silent().map_err(binding_failed)
}

/// Bind to the library file at `path`; never downloads.
pub fn bind_pdfium_at(path: &Path) -> Result<Pdfium, DocParseError> {
    pdfium_auto::bind_pdfium_from_path(path).map_err(binding_failed)
}

fn binding_failed(e: PdfiumAutoError) -> DocParseError {
    DocParseError::PdfiumBindingFailed(e.to_string())
}

/// Rasterises every page of a PDF file at its native size.
///
/// The batch slicer depends on this trait rather than on pdfium so the
/// band arithmetic and file naming can be tested without the library.
pub trait PageRenderer {
    /// One image per page, in page order.
    fn render_pages(&self, pdf: &Path) -> Result<Vec<DynamicImage>, DocParseError>;
}

/// [`PageRenderer`] backed by pdfium at a 1:1 scale.
pub struct PdfiumRenderer {
    pdfium: Pdfium,
}

impl PdfiumRenderer {
    pub fn new() -> Result<Self, DocParseError> {
        Ok(Self {
            pdfium: bind_pdfium()?,
        })
    }

    /// Render with the pdfium library at `path`.
    pub fn from_library(path: &Path) -> Result<Self, DocParseError> {
        Ok(Self {
            pdfium: bind_pdfium_at(path)?,
        })
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render_pages(&self, pdf: &Path) -> Result<Vec<DynamicImage>, DocParseError> {
        let pdf_err = |detail: String| DocParseError::Pdf {
            path: pdf.to_path_buf(),
            detail,
        };

        let document = self
            .pdfium
            .load_pdf_from_file(pdf, None)
            .map_err(|e| pdf_err(format!("{:?}", e)))?;
        let pages = document.pages();
        info!("PDF loaded: {} pages ({})", pages.len(), pdf.display());

        let render_config = PdfRenderConfig::new().scale_page_by_factor(1.0);
        let mut images = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| pdf_err(format!("page {}: {:?}", idx + 1, e)))?;
            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            images.push(image);
        }
        Ok(images)
    }
}
