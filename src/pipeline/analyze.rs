//! The analysis-engine seam and the results it produces.
//!
//! A [`DocumentAnalyzer`] turns a [`Dataset`] into an [`InferenceResult`]
//! (one model entry per page, plus whatever on-disk artifacts the engine
//! left behind) and then into a [`PipelineResult`]: Markdown, content list
//! and middle JSON. The response assembler only ever sees these two types,
//! so any engine that can produce them plugs in.

use crate::error::DocParseError;
use crate::pipeline::classify;
use crate::pipeline::dispatch::Dataset;
use crate::storage::DataWriter;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

/// Prefix used for image references in engine Markdown and content lists.
pub const ENGINE_IMAGE_DIR: &str = "images";

/// Concrete analysis mode after `auto` has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Rasterise and OCR every page.
    Ocr,
    /// Trust the embedded text layer.
    Txt,
}

impl ParseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseMode::Ocr => "ocr",
            ParseMode::Txt => "txt",
        }
    }
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Files an engine left on disk for [`DocumentAnalyzer::pipe`] to read.
#[derive(Debug)]
pub struct EngineArtifacts {
    dir: PathBuf,
    stem: String,
    _workspace: TempDir,
}

impl EngineArtifacts {
    /// `dir` must live inside `workspace`; both are removed together.
    pub fn new(workspace: TempDir, dir: PathBuf, stem: impl Into<String>) -> Self {
        Self {
            dir,
            stem: stem.into(),
            _workspace: workspace,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// `<dir>/<stem><suffix>`
    pub fn file(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}{}", self.stem, suffix))
    }
}

/// Per-page model output.
#[derive(Debug)]
pub struct InferenceResult {
    mode: ParseMode,
    pages: Vec<Value>,
    artifacts: Option<EngineArtifacts>,
}

impl InferenceResult {
    pub fn new(mode: ParseMode, pages: Vec<Value>) -> Self {
        Self {
            mode,
            pages,
            artifacts: None,
        }
    }

    pub fn with_artifacts(mut self, artifacts: EngineArtifacts) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    pub fn pages(&self) -> &[Value] {
        &self.pages
    }

    /// Length of the per-page model output; this is the `pages` field.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn artifacts(&self) -> Option<&EngineArtifacts> {
        self.artifacts.as_ref()
    }

    /// The model output as one JSON array (the `layout` view).
    pub fn model_json(&self) -> Value {
        Value::Array(self.pages.clone())
    }
}

/// Markdown and structured views derived from an [`InferenceResult`].
///
/// Image references inside are relative to [`ENGINE_IMAGE_DIR`]; the `dump_*`
/// methods rewrite that prefix to whatever directory the caller names.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    markdown: String,
    content_list: Value,
    middle_json: Value,
}

impl PipelineResult {
    pub fn new(markdown: impl Into<String>, content_list: Value, middle_json: Value) -> Self {
        Self {
            markdown: markdown.into(),
            content_list,
            middle_json,
        }
    }

    pub fn markdown(&self) -> &str {
        &self.markdown
    }

    pub fn content_list(&self) -> &Value {
        &self.content_list
    }

    pub fn middle_json(&self) -> &Value {
        &self.middle_json
    }

    /// Write the Markdown with image links pointing at `image_dir`.
    pub fn dump_md(
        &self,
        writer: &dyn DataWriter,
        path: &str,
        image_dir: &str,
    ) -> Result<(), DocParseError> {
        let md = if image_dir == ENGINE_IMAGE_DIR {
            self.markdown.clone()
        } else {
            self.markdown.replace(
                &format!("]({ENGINE_IMAGE_DIR}/"),
                &format!("]({}/", image_dir.trim_end_matches('/')),
            )
        };
        writer.write_string(path, &md)
    }

    /// Write the content list as JSON, rewriting each `img_path` to `image_dir`.
    pub fn dump_content_list(
        &self,
        writer: &dyn DataWriter,
        path: &str,
        image_dir: &str,
    ) -> Result<(), DocParseError> {
        let mut list = self.content_list.clone();
        if image_dir != ENGINE_IMAGE_DIR {
            rebase_img_paths(&mut list, image_dir.trim_end_matches('/'));
        }
        writer.write_string(path, &serde_json::to_string_pretty(&list)?)
    }

    pub fn dump_middle_json(&self, writer: &dyn DataWriter, path: &str) -> Result<(), DocParseError> {
        writer.write_string(path, &serde_json::to_string_pretty(&self.middle_json)?)
    }
}

fn rebase_img_paths(list: &mut Value, image_dir: &str) {
    let Some(items) = list.as_array_mut() else {
        return;
    };
    let prefix = format!("{ENGINE_IMAGE_DIR}/");
    for item in items {
        if let Some(Value::String(p)) = item.get_mut("img_path") {
            if let Some(rest) = p.strip_prefix(&prefix) {
                *p = format!("{image_dir}/{rest}");
            }
        }
    }
}

/// A layout-analysis engine.
///
/// Implementations are called from a blocking thread and may shell out,
/// load models, or do anything else synchronous.
pub trait DocumentAnalyzer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Decide OCR vs. text mode for `auto`. Defaults to the pdfium
    /// text-layer heuristic in [`classify`].
    fn classify(&self, dataset: &Dataset) -> Result<ParseMode, DocParseError> {
        classify::classify_dataset(dataset)
    }

    /// Run layout analysis in the given mode.
    fn analyze(&self, dataset: &Dataset, mode: ParseMode) -> Result<InferenceResult, DocParseError>;

    /// Run layout analysis for `auto`.
    ///
    /// The default asks [`classify`](Self::classify) for a mode and then
    /// calls [`analyze`](Self::analyze). Engines with their own classifier
    /// override this and report the mode they picked in the result.
    fn analyze_auto(&self, dataset: &Dataset) -> Result<InferenceResult, DocParseError> {
        let mode = self.classify(dataset)?;
        info!("{}: classified {:?} dataset → {} mode", self.name(), dataset.kind(), mode);
        self.analyze(dataset, mode)
    }

    /// Derive Markdown and JSON views, writing extracted images to `image_writer`.
    fn pipe(
        &self,
        inference: &InferenceResult,
        image_writer: &dyn DataWriter,
    ) -> Result<PipelineResult, DocParseError>;
}
