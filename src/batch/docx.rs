//! `.docx` output for the batch job: a list of plain paragraphs in one font.
//!
//! Packaging is done by `docx-rs`. The document defaults carry the font, so
//! every run inherits SimSun / 宋体 at 12 pt without per-run properties.

use crate::error::DocParseError;
use docx_rs::{Docx, Paragraph, Run, RunFonts};
use std::io::Cursor;
use std::path::Path;
use tracing::info;

/// Latin font of the document defaults.
pub const DEFAULT_FONT: &str = "SimSun";
/// East-Asian font of the document defaults.
pub const DEFAULT_EAST_ASIA_FONT: &str = "宋体";
/// Default size in points.
pub const DEFAULT_FONT_SIZE_PT: usize = 12;

/// An in-memory document of plain paragraphs.
#[derive(Debug, Clone, Default)]
pub struct DocxDocument {
    paragraphs: Vec<String>,
}

impl DocxDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_paragraph(&mut self, text: impl Into<String>) {
        self.paragraphs.push(text.into());
    }

    pub fn paragraphs(&self) -> &[String] {
        &self.paragraphs
    }

    /// Serialise the package.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocParseError> {
        let fonts = RunFonts::new()
            .ascii(DEFAULT_FONT)
            .hi_ansi(DEFAULT_FONT)
            .cs(DEFAULT_FONT)
            .east_asia(DEFAULT_EAST_ASIA_FONT);
        // Word sizes are in half-points.
        let mut docx = Docx::new()
            .default_fonts(fonts)
            .default_size(DEFAULT_FONT_SIZE_PT * 2);
        for text in &self.paragraphs {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(xml_safe(text))));
        }

        let mut buf = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut buf)
            .map_err(|e| DocParseError::Internal(format!("docx packaging failed: {e}")))?;
        Ok(buf.into_inner())
    }

    /// Write the package to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), DocParseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DocParseError::io(format!("Failed to create '{}'", parent.display()), e))?;
        }
        std::fs::write(path, self.to_bytes()?)
            .map_err(|e| DocParseError::io(format!("Failed to write '{}'", path.display()), e))?;
        info!("Saved {} paragraphs → {}", self.paragraphs.len(), path.display());
        Ok(())
    }
}

/// Drop characters XML 1.0 cannot carry; OCR output occasionally has them.
pub fn xml_safe(text: &str) -> String {
    text.chars()
        .filter(|&c| match c {
            '\t' | '\n' | '\r' => true,
            '\u{FFFE}' | '\u{FFFF}' => false,
            c => (c as u32) >= 0x20,
        })
        .collect()
}
