//! Office → PDF conversion.
//!
//! `.doc/.docx/.ppt/.pptx` are converted with a headless LibreOffice
//! (`soffice --headless --convert-to pdf`). The trait exists so tests and
//! deployments with a different converter can substitute their own.

use crate::error::DocParseError;
use crate::pipeline::external::run_tool;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// Default LibreOffice executable.
pub const DEFAULT_SOFFICE: &str = "soffice";

pub trait OfficeConverter: Send + Sync {
    /// Convert `input` to a PDF inside `out_dir`; returns the PDF path.
    fn convert_into(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, DocParseError>;
}

/// LibreOffice-backed converter.
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    binary: String,
}

impl SofficeConverter {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for SofficeConverter {
    fn default() -> Self {
        Self::new(DEFAULT_SOFFICE)
    }
}

impl OfficeConverter for SofficeConverter {
    fn convert_into(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, DocParseError> {
        std::fs::create_dir_all(out_dir)
            .map_err(|e| DocParseError::io(format!("Failed to create '{}'", out_dir.display()), e))?;

        let mut cmd = Command::new(&self.binary);
        cmd.args(["--headless", "--convert-to", "pdf", "--outdir"])
            .arg(out_dir)
            .arg(input);
        run_tool(cmd, &self.binary)?;

        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let pdf = out_dir.join(format!("{stem}.pdf"));
        if !pdf.is_file() {
            return Err(DocParseError::ExternalTool {
                tool: self.binary.clone(),
                detail: format!("no PDF produced for '{}'", input.display()),
            });
        }
        info!("Converted {} → {}", input.display(), pdf.display());
        Ok(pdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_soffice_is_tool_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.docx");
        std::fs::write(&input, b"x").unwrap();
        let conv = SofficeConverter::new("no-such-soffice-binary");
        let err = conv.convert_into(&input, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, DocParseError::ToolNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn tool_that_writes_nothing_is_an_error() {
        // `true` accepts any arguments and succeeds without producing a PDF.
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.pptx");
        std::fs::write(&input, b"x").unwrap();
        let err = SofficeConverter::new("true")
            .convert_into(&input, &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, DocParseError::ExternalTool { .. }));
    }
}
