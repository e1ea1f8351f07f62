//! Pipeline stages for document-to-Markdown parsing.
//!
//! Each submodule implements one step. The external engines sit behind the
//! [`analyze::DocumentAnalyzer`] and [`office::OfficeConverter`] traits.
//!
//! ## Data Flow
//!
//! ```text
//! bytes+ext ──▶ dispatch ──▶ classify ──▶ analyze ──▶ encode ──▶ postprocess
//!              (FileKind)   (ocr/txt)   (engine)    (data URIs) (embed images)
//! ```
//!
//! 1. [`dispatch`]: turn raw bytes into a [`dispatch::Dataset`] according
//!    to the file kind (PDF as-is, Office via [`office`], images via a
//!    scratch file)
//! 2. [`classify`]: decide OCR vs. text mode for `auto` using pdfium, for
//!    analyzers that do not classify on their own ([`mineru`] does)
//! 3. [`analyze`]: the [`analyze::DocumentAnalyzer`] seam; [`mineru`] is the
//!    shipped backend
//! 4. [`encode`]: base64 data URIs for extracted images, MIME sniffed from
//!    the bytes
//! 5. [`postprocess`]: rewrite `![](images/…)` references to inline the
//!    data URIs
//!
//! [`render`] binds pdfium (through `pdfium-auto`) for `classify` and the
//! batch slicer; [`external`] runs the external command-line tools.

pub mod analyze;
pub mod classify;
pub mod dispatch;
pub mod encode;
pub mod external;
pub mod mineru;
pub mod office;
pub mod postprocess;
pub mod render;
