//! Error types for the edgequake-docparse library.
//!
//! Every failure in this crate is fatal to the request or batch run it
//! happens in: there is no per-page or per-image partial success to report.
//! A single [`DocParseError`] enum therefore covers the whole surface, from
//! storage selection through the external engines to the batch job.
//!
//! The HTTP layer turns any of these into a uniform `500` envelope (see
//! [`crate::server`]); the CLI wraps them in `anyhow` with context.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-docparse library.
#[derive(Debug, Error)]
pub enum DocParseError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The file extension is not one of the PDF, Office or image formats.
    #[error("Unsupported file type '{extension}'\nSupported: .pdf, .ppt, .pptx, .doc, .docx, .png, .jpg, .jpeg")]
    UnsupportedFileType { extension: String },

    /// The HTTP request body was missing a field or could not be decoded.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Filesystem operation failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ── Storage errors ────────────────────────────────────────────────────
    /// A writer or reader could not store or fetch an object.
    #[error("Storage error at '{path}': {detail}")]
    Storage { path: String, detail: String },

    /// An `s3://` path without a bucket component.
    #[error("Invalid object-storage path '{path}': expected s3://<bucket>/<key>")]
    InvalidS3Path { path: String },

    /// No credentials for the bucket and no `[default]` entry either.
    #[error("No credentials configured for bucket '{bucket}'\nAdd it (or \"[default]\") under \"bucket_info\" in the config file.")]
    BucketNotConfigured { bucket: String },

    // ── External engine errors ────────────────────────────────────────────
    /// An external program ran but reported failure.
    #[error("{tool} failed: {detail}")]
    ExternalTool { tool: String, detail: String },

    /// An external program could not be started at all.
    #[error("Could not run '{tool}': {source}\nCheck it is installed and on PATH.")]
    ToolNotFound {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The analysis engine produced output we cannot read.
    #[error("Invalid analysis output: {detail}")]
    InvalidEngineOutput { detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// pdfium could not open or render a document.
    #[error("PDF '{path}' could not be processed: {detail}")]
    Pdf { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
pdfium is downloaded to the user cache on first use; set PDFIUM_LIB_PATH=/path/to/libpdfium to use a local copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Batch errors ──────────────────────────────────────────────────────
    /// OCR engine failed on an image.
    #[error("OCR failed on '{path}': {detail}")]
    Ocr { path: PathBuf, detail: String },

    /// A file in the slice directory does not follow `img_<n>.png`.
    #[error("Malformed slice filename '{name}': expected img_<n>.png")]
    MalformedSliceName { name: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or option validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocParseError {
    /// Wrap an `std::io::Error` with a short description of what was being done.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        DocParseError::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for DocParseError {
    fn from(e: serde_json::Error) -> Self {
        DocParseError::InvalidEngineOutput {
            detail: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_display_names_extension() {
        let e = DocParseError::UnsupportedFileType {
            extension: ".xls".into(),
        };
        assert!(e.to_string().contains(".xls"));
    }

    #[test]
    fn io_helper_keeps_context_and_source() {
        let e = DocParseError::io(
            "Failed to read 'a.pdf'",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let msg = e.to_string();
        assert!(msg.contains("a.pdf"), "got: {msg}");
        assert!(msg.contains("gone"), "got: {msg}");
        assert!(std::error::Error::source(&e).is_some());
    }

    #[test]
    fn json_error_becomes_invalid_engine_output() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let e: DocParseError = err.into();
        assert!(matches!(e, DocParseError::InvalidEngineOutput { .. }));
    }

    #[test]
    fn bucket_not_configured_display() {
        let e = DocParseError::BucketNotConfigured {
            bucket: "reports".into(),
        };
        assert!(e.to_string().contains("reports"));
    }
}
