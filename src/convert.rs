//! Parse entry points: one document in, one [`ParseResponse`] out.
//!
//! ## Flow
//!
//! ```text
//! upload / path ──▶ storage::init_*_writers ──▶ dispatch::load_dataset
//!      ──▶ dispatch::process_file ──▶ assemble_response
//! ```
//!
//! [`DocumentParser`] is synchronous: the external engines block, so the
//! HTTP handler calls it from `spawn_blocking` and the CLI from a plain
//! blocking context. Each call is independent; the parser holds only
//! configuration and shared engine handles.

use crate::config::{BucketConfig, ParseConfig};
use crate::error::DocParseError;
use crate::output::ParseResponse;
use crate::pipeline::analyze::{DocumentAnalyzer, InferenceResult, PipelineResult};
use crate::pipeline::dispatch::{load_dataset, process_file, UploadedDocument};
use crate::pipeline::office::OfficeConverter;
use crate::pipeline::{encode, postprocess};
use crate::storage::{self, DataWriter, MemoryDataWriter, StorageHandles};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Subdirectory of each document's output dir holding extracted images.
pub const IMAGE_SUBDIR: &str = "images";

/// Stem used when a filename yields nothing usable.
const FALLBACK_STEM: &str = "document";

/// Base name of `name` up to its first `.`.
///
/// `"report.v2.pdf"` → `"report"`, `"s3://b/x/scan.png"` → `"scan"`.
pub fn document_stem(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => FALLBACK_STEM.to_string(),
    }
}

/// Runs documents through storage selection, dispatch, analysis and
/// response assembly.
#[derive(Clone)]
pub struct DocumentParser {
    config: ParseConfig,
    analyzer: Arc<dyn DocumentAnalyzer>,
    converter: Arc<dyn OfficeConverter>,
    buckets: BucketConfig,
}

impl DocumentParser {
    pub fn new(
        config: ParseConfig,
        analyzer: Arc<dyn DocumentAnalyzer>,
        converter: Arc<dyn OfficeConverter>,
    ) -> Self {
        Self {
            config,
            analyzer,
            converter,
            buckets: BucketConfig::default(),
        }
    }

    /// Credentials for `s3://` path input.
    pub fn with_buckets(mut self, buckets: BucketConfig) -> Self {
        self.buckets = buckets;
        self
    }

    /// Baseline options; per-request options start from a clone of this.
    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    /// Parse an uploaded document. Output always goes to the local
    /// filesystem under `options.output_dir`.
    pub fn parse_upload(
        &self,
        upload: UploadedDocument,
        options: &ParseConfig,
    ) -> Result<ParseResponse, DocParseError> {
        let stem = document_stem(&upload.filename);
        let output_path = output_dir_for(options, &upload.filename);
        let image_path = output_path.join(IMAGE_SUBDIR);
        info!(
            "Parsing upload '{}' ({} bytes) → {}",
            upload.filename,
            upload.bytes.len(),
            output_path.display()
        );

        let handles = storage::init_upload_writers(upload, &output_path, &image_path)?;
        self.run(&stem, handles, &image_path, options)
    }

    /// Parse a local path or `s3://` URI. Object-storage input writes its
    /// dumps and images back to the same bucket.
    pub fn parse_path(&self, path: &str, options: &ParseConfig) -> Result<ParseResponse, DocParseError> {
        let stem = document_stem(path);
        let output_path = output_dir_for(options, path);
        let image_path = output_path.join(IMAGE_SUBDIR);
        info!("Parsing '{}' → {}", path, output_path.display());

        let handles = storage::init_writers(
            path,
            &output_path.to_string_lossy(),
            &image_path.to_string_lossy(),
            &self.buckets,
        )?;
        self.run(&stem, handles, &image_path, options)
    }

    fn run(
        &self,
        stem: &str,
        handles: StorageHandles,
        image_path: &Path,
        options: &ParseConfig,
    ) -> Result<ParseResponse, DocParseError> {
        let start = Instant::now();
        let StorageHandles {
            writer,
            image_writer,
            file_bytes,
            extension,
        } = handles;

        let dataset = load_dataset(
            file_bytes,
            &extension,
            self.converter.as_ref(),
            options.temp_dir.as_deref(),
        )?;
        let (inference, pipe) = process_file(
            &dataset,
            options.parse_method,
            self.analyzer.as_ref(),
            image_writer.as_ref(),
        )?;
        drop(dataset);

        let response = assemble_response(stem, &inference, &pipe, writer.as_ref(), image_path, options)?;
        info!(
            "Parsed '{}': {} pages in {}ms",
            stem,
            response.pages,
            start.elapsed().as_millis()
        );
        Ok(response)
    }
}

impl std::fmt::Debug for DocumentParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentParser")
            .field("config", &self.config)
            .field("analyzer", &self.analyzer.name())
            .finish()
    }
}

/// Build the response from analysis results.
///
/// Renders every view through a [`MemoryDataWriter`] with image links
/// relative to the output dir (`images/…`), optionally dumps them through
/// `writer` as `<stem>.md`, `<stem>_content_list.json`, `<stem>_middle.json`
/// and `<stem>_model.json`, then inlines the images found under `image_dir`
/// into the Markdown.
pub fn assemble_response(
    stem: &str,
    inference: &InferenceResult,
    pipe: &PipelineResult,
    writer: &dyn DataWriter,
    image_dir: &Path,
    options: &ParseConfig,
) -> Result<ParseResponse, DocParseError> {
    // Dumps link images relative to the document's output dir.
    let image_dir_str = image_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| IMAGE_SUBDIR.to_string());

    let md_writer = MemoryDataWriter::new();
    pipe.dump_md(&md_writer, "", &image_dir_str)?;
    let content_list_writer = MemoryDataWriter::new();
    pipe.dump_content_list(&content_list_writer, "", &image_dir_str)?;
    let middle_writer = MemoryDataWriter::new();
    pipe.dump_middle_json(&middle_writer, "")?;

    let markdown = md_writer.value()?;
    let content_list = content_list_writer.value()?;
    let middle_json = middle_writer.value()?;
    let model_json = serde_json::to_string_pretty(&inference.model_json())?;

    if options.dump {
        writer.write_string(&format!("{stem}.md"), &markdown)?;
        writer.write_string(&format!("{stem}_content_list.json"), &content_list)?;
        writer.write_string(&format!("{stem}_middle.json"), &middle_json)?;
        writer.write_string(&format!("{stem}_model.json"), &model_json)?;
        debug!("Dumped views for '{}'", stem);
    }

    let images = encode::collect_image_data_uris(image_dir)?;
    let mut response = ParseResponse::new(
        postprocess::embed_images(&markdown, &images),
        inference.page_count(),
    );

    if options.return_layout {
        response.layout = Some(inference.model_json());
    }
    if options.return_info {
        response.info = Some(serde_json::from_str(&middle_json)?);
    }
    if options.return_content_list {
        response.content_list = Some(serde_json::from_str(&content_list)?);
    }
    Ok(response)
}

/// Output directory a document with this name would be written to.
pub fn output_dir_for(options: &ParseConfig, name: &str) -> PathBuf {
    options.output_dir.join(document_stem(name))
}
