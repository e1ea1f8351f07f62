//! Progress-callback trait for the batch OCR job.
//!
//! Pass an [`Arc<dyn BatchProgressCallback>`] to
//! [`crate::batch::BatchRunner::with_progress`] to receive events as each
//! PDF is sliced, recognised and written out. The CLI forwards them to an
//! `indicatif` progress bar; library users can forward them anywhere.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docparse::progress::BatchProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingCallback {
//!     documents: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: usize, total: usize, _output: &std::path::Path) {
//!         self.documents.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} done", index, total);
//!     }
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the batch job as it works through its input directory.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once the book directory has been listed.
    ///
    /// # Arguments
    /// * `total_documents`: PDFs that will be processed
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called before a PDF is sliced.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position in the run
    /// * `total`: total PDFs
    /// * `name` : file name of the PDF
    fn on_document_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called after a PDF's pages have been cut into slice images.
    fn on_slices_written(&self, name: &str, slice_count: usize) {
        let _ = (name, slice_count);
    }

    /// Called after each slice image has been recognised.
    ///
    /// # Arguments
    /// * `done` : slices recognised so far for the current PDF
    /// * `total`: slices for the current PDF
    fn on_slice_recognised(&self, done: usize, total: usize) {
        let _ = (done, total);
    }

    /// Called when a PDF's `.docx` has been saved.
    fn on_document_complete(&self, index: usize, total: usize, output: &Path) {
        let _ = (index, total, output);
    }

    /// Called once after every PDF has been processed.
    fn on_batch_complete(&self, total_documents: usize) {
        let _ = total_documents;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopBatchProgress;

impl BatchProgressCallback for NoopBatchProgress {}

/// Shared handle type accepted by the batch runner.
pub type BatchProgress = Arc<dyn BatchProgressCallback>;
