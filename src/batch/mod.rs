//! Batch OCR job: a directory of PDFs and Office files → one `.docx` each.
//!
//! ## Flow
//!
//! ```text
//! input_dir ──stage──▶ book_dir (PDFs only) ──slice──▶ image_dir/img_<n>.png
//!                                        ──OCR──▶ output_dir/<stem>.docx
//! ```
//!
//! 1. **Stage**: PDFs in `input_dir` are moved to `book_dir`; everything
//!    else is converted to PDF into `book_dir` via [`OfficeConverter`].
//! 2. **Slice**: each page of each PDF is cut into `parts_per_page`
//!    horizontal bands ([`slicer`]).
//! 3. **Recognise**: every band is OCR'd in page-then-band order and each
//!    line becomes a paragraph ([`assemble`], [`docx`]).
//! 4. **Clean up**: files (not subdirectories) in the image, input and book
//!    directories are removed.
//!
//! The job is sequential and not resumable: the first error aborts the run
//! and leaves the directories as they were at that point.

pub mod assemble;
pub mod docx;
pub mod ocr;
pub mod slicer;

use crate::config::BatchConfig;
use crate::error::DocParseError;
use crate::pipeline::office::OfficeConverter;
use crate::pipeline::render::PageRenderer;
use crate::progress::{BatchProgress, NoopBatchProgress};
use ocr::OcrEngine;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use assemble::{assemble_document, ocr_directory_to_docx, sorted_slice_files};
pub use docx::DocxDocument;
pub use ocr::{OcrLine, TesseractConfig, TesseractEngine};
pub use slicer::{band_bounds, slice_pdf, ImageSlice};

/// What a batch run produced.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Files moved from the input dir into the book dir.
    pub moved: Vec<PathBuf>,
    /// PDFs produced by the Office converter.
    pub converted: Vec<PathBuf>,
    /// One `.docx` per processed PDF, in processing order.
    pub documents: Vec<PathBuf>,
}

/// Runs the directory-driven batch job.
pub struct BatchRunner {
    config: BatchConfig,
    renderer: Box<dyn PageRenderer>,
    converter: Arc<dyn OfficeConverter>,
    progress: BatchProgress,
}

impl BatchRunner {
    pub fn new(
        config: BatchConfig,
        renderer: Box<dyn PageRenderer>,
        converter: Arc<dyn OfficeConverter>,
    ) -> Self {
        Self {
            config,
            renderer,
            converter,
            progress: Arc::new(NoopBatchProgress),
        }
    }

    pub fn with_progress(mut self, progress: BatchProgress) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Stage, slice, recognise and clean up. `engine` is used for every slice.
    pub fn run(&self, engine: &mut dyn OcrEngine) -> Result<BatchReport, DocParseError> {
        let cfg = &self.config;
        for dir in [&cfg.output_dir, &cfg.book_dir, &cfg.image_dir] {
            create_dir(dir)?;
        }

        let mut report = self.stage()?;

        let books = list_files(&cfg.book_dir)?;
        let total = books.len();
        info!("Processing {} PDFs from {}", total, cfg.book_dir.display());
        self.progress.on_batch_start(total);

        for (i, pdf) in books.iter().enumerate() {
            let name = file_name(pdf);
            self.progress.on_document_start(i + 1, total, &name);
            let out = self.process_pdf(engine, pdf)?;
            self.progress.on_document_complete(i + 1, total, &out);
            report.documents.push(out);
        }

        for dir in [&cfg.image_dir, &cfg.input_dir, &cfg.book_dir] {
            remove_files(dir)?;
        }
        self.progress.on_batch_complete(total);
        Ok(report)
    }

    /// Move PDFs from the input dir to the book dir; convert everything else.
    pub fn stage(&self) -> Result<BatchReport, DocParseError> {
        let cfg = &self.config;
        let mut report = BatchReport::default();
        if !cfg.input_dir.is_dir() {
            warn!("Input directory {} does not exist; nothing to stage", cfg.input_dir.display());
            return Ok(report);
        }

        for file in list_files(&cfg.input_dir)? {
            let is_pdf = file
                .extension()
                .map(|e| e.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false);
            if is_pdf {
                let target = cfg.book_dir.join(file_name(&file));
                move_file(&file, &target)?;
                report.moved.push(target);
            } else {
                let pdf = self.converter.convert_into(&file, &cfg.book_dir)?;
                report.converted.push(pdf);
            }
        }
        info!(
            "Staged {} PDFs and {} converted documents",
            report.moved.len(),
            report.converted.len()
        );
        Ok(report)
    }

    /// Slice one PDF, OCR its bands in page-then-band order and save the docx.
    pub fn process_pdf(&self, engine: &mut dyn OcrEngine, pdf: &Path) -> Result<PathBuf, DocParseError> {
        let cfg = &self.config;
        remove_files(&cfg.image_dir)?;

        let mut slices = slice_pdf(self.renderer.as_ref(), pdf, &cfg.image_dir, cfg.parts_per_page)?;
        slices.sort_by_key(|s| (s.page_index, s.band_index));
        self.progress.on_slices_written(&file_name(pdf), slices.len());

        let images: Vec<PathBuf> = slices.into_iter().map(|s| s.path).collect();
        let doc = assemble_document(engine, &images, self.progress.as_ref())?;

        let stem = pdf
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let out = cfg.output_dir.join(format!("{stem}.docx"));
        doc.save(&out)?;
        Ok(out)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn create_dir(dir: &Path) -> Result<(), DocParseError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| DocParseError::io(format!("Failed to create '{}'", dir.display()), e))
}

/// Regular files directly in `dir`, sorted by name.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>, DocParseError> {
    let list_err = |e: std::io::Error| DocParseError::io(format!("Failed to list '{}'", dir.display()), e);
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(list_err)? {
        let path = entry.map_err(list_err)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Remove the regular files directly in `dir`; subdirectories stay.
/// A missing directory is left alone.
pub fn remove_files(dir: &Path) -> Result<(), DocParseError> {
    if !dir.is_dir() {
        return Ok(());
    }
    for file in list_files(dir)? {
        std::fs::remove_file(&file)
            .map_err(|e| DocParseError::io(format!("Failed to remove '{}'", file.display()), e))?;
    }
    debug!("Cleared files in {}", dir.display());
    Ok(())
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<(), DocParseError> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to).map_err(|e| {
        DocParseError::io(format!("Failed to copy '{}' → '{}'", from.display(), to.display()), e)
    })?;
    std::fs::remove_file(from)
        .map_err(|e| DocParseError::io(format!("Failed to remove '{}'", from.display()), e))
}
