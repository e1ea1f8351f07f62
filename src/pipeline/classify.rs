//! `auto` mode classification: does this PDF have a usable text layer?
//!
//! Counts non-whitespace characters in each page's embedded text via pdfium.
//! A page with at least [`MIN_TEXT_CHARS_PER_PAGE`] counts as "text"; the
//! document goes to text mode when at least half of its pages do. Scans,
//! image-only pages and empty documents go to OCR. Images always go to OCR.

use crate::error::DocParseError;
use crate::pipeline::analyze::ParseMode;
use crate::pipeline::dispatch::{Dataset, DatasetSource};
use crate::pipeline::render::bind_pdfium;
use std::path::PathBuf;
use tracing::debug;

/// Non-whitespace characters a page needs to count as having a text layer.
pub const MIN_TEXT_CHARS_PER_PAGE: usize = 10;

pub fn classify_dataset(dataset: &Dataset) -> Result<ParseMode, DocParseError> {
    match dataset.source() {
        DatasetSource::Image(_) => Ok(ParseMode::Ocr),
        DatasetSource::Pdf(bytes) => {
            let counts = text_chars_per_page(bytes)?;
            debug!("Text-layer characters per page: {:?}", counts);
            Ok(decide_mode(&counts))
        }
    }
}

/// Pure decision over per-page character counts.
pub fn decide_mode(chars_per_page: &[usize]) -> ParseMode {
    if chars_per_page.is_empty() {
        return ParseMode::Ocr;
    }
    let text_pages = chars_per_page
        .iter()
        .filter(|&&n| n >= MIN_TEXT_CHARS_PER_PAGE)
        .count();
    if text_pages * 2 >= chars_per_page.len() {
        ParseMode::Txt
    } else {
        ParseMode::Ocr
    }
}

fn text_chars_per_page(bytes: &[u8]) -> Result<Vec<usize>, DocParseError> {
    let pdf_err = |detail: String| DocParseError::Pdf {
        path: PathBuf::from("<upload>"),
        detail,
    };

    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| pdf_err(format!("{:?}", e)))?;

    document
        .pages()
        .iter()
        .map(|page| {
            page.text()
                .map(|text| text.all().chars().filter(|c| !c.is_whitespace()).count())
                .map_err(|e| pdf_err(format!("{:?}", e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_needs_ocr() {
        assert_eq!(decide_mode(&[]), ParseMode::Ocr);
    }

    #[test]
    fn mostly_text_pages_use_text_layer() {
        assert_eq!(decide_mode(&[500, 1200, 0]), ParseMode::Txt);
        assert_eq!(decide_mode(&[10, 0]), ParseMode::Txt);
    }

    #[test]
    fn mostly_scanned_pages_need_ocr() {
        assert_eq!(decide_mode(&[0, 3, 800]), ParseMode::Ocr);
        assert_eq!(decide_mode(&[9]), ParseMode::Ocr);
    }

    #[test]
    fn images_always_need_ocr() {
        let ds = Dataset::image("/tmp/whatever.png");
        assert_eq!(classify_dataset(&ds).unwrap(), ParseMode::Ocr);
    }
}
