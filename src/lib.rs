//! # edgequake-docparse
//!
//! Turn PDFs, Office documents and images into Markdown, and turn folders of
//! scanned books into `.docx` files.
//!
//! The crate has two independent halves:
//!
//! - a **parse service** ([`DocumentParser`], exposed over HTTP by
//!   `server`) that drives an external document-analysis engine and returns
//!   self-contained Markdown with every figure inlined as a data URI;
//! - a **batch OCR job** ([`BatchRunner`]) that slices every PDF page into
//!   horizontal bands, OCRs them in reading order and writes one paragraph
//!   per recognised line.
//!
//! ## Parse pipeline
//!
//! ```text
//! upload / path / s3://
//!  │
//!  ├─ 1. Storage   pick local or S3 writers for markdown and images
//!  ├─ 2. Dispatch  by extension: PDF │ Office (→ PDF via soffice) │ image
//!  ├─ 3. Mode      ocr │ txt │ auto (engine's own classifier)
//!  ├─ 4. Analyze   external engine → model JSON, markdown, content list
//!  ├─ 5. Dump      optional <stem>.md / _content_list.json / _middle.json / _model.json
//!  └─ 6. Inline    ![](images/x.jpg) → ![x.jpg](data:image/jpeg;base64,…)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docparse::pipeline::{mineru::MineruAnalyzer, office::SofficeConverter};
//! use edgequake_docparse::{DocumentParser, ParseConfig};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ParseConfig::builder().output_dir("output").build()?;
//!     let parser = DocumentParser::new(
//!         config.clone(),
//!         Arc::new(MineruAnalyzer::default()),
//!         Arc::new(SofficeConverter::default()),
//!     );
//!     let response = parser.parse_path("report.pdf", &config)?;
//!     println!("{} pages\n{}", response.pages, response.markdown);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `docparse` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | axum router for `POST /v2/parse/file` |
//! | `s3`     | on      | `s3://` inputs and outputs via aws-sdk-s3 |
//! | `paddle` | off     | PaddleOCR ONNX models for the batch job via oar-ocr |
//!
//! Library-only users can drop the binary's dependencies:
//! ```toml
//! edgequake-docparse = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{BatchReport, BatchRunner};
pub use config::{
    BatchConfig, BatchConfigBuilder, BucketConfig, BucketCredentials, ParseConfig, ParseConfigBuilder,
    ParseMethod, ServerConfig,
};
pub use convert::DocumentParser;
pub use error::DocParseError;
pub use output::{ErrorResponse, ParseResponse};
pub use progress::{BatchProgress, BatchProgressCallback, NoopBatchProgress};
