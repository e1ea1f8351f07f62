//! MinerU (`magic-pdf`) analysis backend.
//!
//! The engine is driven through its command line:
//!
//! ```text
//! magic-pdf -p <input> -o <out> -m <ocr|txt|auto>
//! ```
//!
//! and leaves its results under `<out>/<stem>/<method>/`:
//!
//! ```text
//! <stem>.md  <stem>_content_list.json  <stem>_middle.json  <stem>_model.json  images/
//! ```
//!
//! For `auto` the engine runs its own classifier and records the outcome as
//! `_parse_type` in the middle JSON, so no pdfium pass happens here. Older
//! releases skip the `auto/` directory and write straight into `ocr/` or
//! `txt/`; whichever directory exists is read.
//!
//! Everything happens inside a temp workspace (under the dataset's temp root)
//! owned by the returned [`InferenceResult`], so [`DocumentAnalyzer::pipe`]
//! can read the files and the workspace disappears with the result.

use crate::error::DocParseError;
use crate::pipeline::analyze::{
    DocumentAnalyzer, EngineArtifacts, InferenceResult, ParseMode, PipelineResult, ENGINE_IMAGE_DIR,
};
use crate::pipeline::dispatch::{Dataset, DatasetSource};
use crate::pipeline::external::run_tool;
use crate::storage::DataWriter;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, info};

/// Default engine executable.
pub const DEFAULT_MAGIC_PDF: &str = "magic-pdf";

/// Name given to in-memory PDFs when they are written for the engine.
const PDF_INPUT_NAME: &str = "document.pdf";

/// `-m` value that lets the engine classify the document itself.
const AUTO_METHOD: &str = "auto";

#[derive(Debug, Clone)]
pub struct MineruAnalyzer {
    program: String,
    leading_args: Vec<String>,
}

impl MineruAnalyzer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Run the engine as `program <leading_args…> -p … -o … -m …`, e.g.
    /// `python -m magic_pdf.tools.cli`.
    pub fn with_command(program: impl Into<String>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }
}

impl Default for MineruAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_MAGIC_PDF)
    }
}

fn read_text(path: &Path) -> Result<String, DocParseError> {
    std::fs::read_to_string(path).map_err(|e| DocParseError::InvalidEngineOutput {
        detail: format!("cannot read '{}': {}", path.display(), e),
    })
}

fn read_json(path: &Path) -> Result<Value, DocParseError> {
    Ok(serde_json::from_str(&read_text(path)?)?)
}

impl DocumentAnalyzer for MineruAnalyzer {
    fn name(&self) -> &str {
        "mineru"
    }

    fn analyze(&self, dataset: &Dataset, mode: ParseMode) -> Result<InferenceResult, DocParseError> {
        let run = self.run(dataset, mode.as_str())?;
        let result_dir = run.doc_dir().join(mode.as_str());
        self.collect(run, result_dir, mode)
    }

    fn analyze_auto(&self, dataset: &Dataset) -> Result<InferenceResult, DocParseError> {
        let run = self.run(dataset, AUTO_METHOD)?;
        let (result_dir, mode) = auto_result(&run.doc_dir(), &run.stem)?;
        info!("{} chose {} mode", self.program, mode);
        self.collect(run, result_dir, mode)
    }

    fn pipe(
        &self,
        inference: &InferenceResult,
        image_writer: &dyn DataWriter,
    ) -> Result<PipelineResult, DocParseError> {
        let artifacts = inference
            .artifacts()
            .ok_or_else(|| DocParseError::InvalidEngineOutput {
                detail: "analysis left no output files".into(),
            })?;

        let markdown = read_text(&artifacts.file(".md"))?;
        let content_list = read_json(&artifacts.file("_content_list.json"))?;
        let middle_json = read_json(&artifacts.file("_middle.json"))?;

        let copied = copy_images(&artifacts.dir().join(ENGINE_IMAGE_DIR), image_writer)?;
        debug!("Copied {} extracted images", copied);

        Ok(PipelineResult::new(markdown, content_list, middle_json))
    }
}

/// One finished engine invocation.
struct EngineRun {
    workspace: TempDir,
    out: PathBuf,
    stem: String,
}

impl EngineRun {
    fn doc_dir(&self) -> PathBuf {
        self.out.join(&self.stem)
    }
}

impl MineruAnalyzer {
    fn run(&self, dataset: &Dataset, method: &str) -> Result<EngineRun, DocParseError> {
        let workspace = dataset.workspace("docparse-mineru-")?;

        let input: PathBuf = match dataset.source() {
            DatasetSource::Pdf(bytes) => {
                let p = workspace.path().join(PDF_INPUT_NAME);
                std::fs::write(&p, bytes)
                    .map_err(|e| DocParseError::io(format!("Failed to write '{}'", p.display()), e))?;
                p
            }
            DatasetSource::Image(path) => path.clone(),
        };
        let out = workspace.path().join("out");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg("-p")
            .arg(&input)
            .arg("-o")
            .arg(&out)
            .arg("-m")
            .arg(method);
        run_tool(cmd, &self.program)?;

        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(EngineRun { workspace, out, stem })
    }

    fn collect(&self, run: EngineRun, result_dir: PathBuf, mode: ParseMode) -> Result<InferenceResult, DocParseError> {
        let artifacts = EngineArtifacts::new(run.workspace, result_dir, run.stem);

        let pages = match read_json(&artifacts.file("_model.json"))? {
            Value::Array(pages) => pages,
            other => {
                return Err(DocParseError::InvalidEngineOutput {
                    detail: format!("model output is not a list of pages: {}", type_name(&other)),
                })
            }
        };
        info!("{} finished: {} pages", self.program, pages.len());
        Ok(InferenceResult::new(mode, pages).with_artifacts(artifacts))
    }
}

/// Locate the output of an `auto` run and the mode the engine settled on.
fn auto_result(doc_dir: &Path, stem: &str) -> Result<(PathBuf, ParseMode), DocParseError> {
    let auto_dir = doc_dir.join(AUTO_METHOD);
    if auto_dir.is_dir() {
        let middle = read_json(&auto_dir.join(format!("{stem}_middle.json")))?;
        let mode = match middle.get("_parse_type").and_then(Value::as_str) {
            Some("ocr") => ParseMode::Ocr,
            Some("txt") => ParseMode::Txt,
            other => {
                return Err(DocParseError::InvalidEngineOutput {
                    detail: format!("auto run reported no usable _parse_type: {other:?}"),
                })
            }
        };
        return Ok((auto_dir, mode));
    }
    for mode in [ParseMode::Ocr, ParseMode::Txt] {
        let dir = doc_dir.join(mode.as_str());
        if dir.is_dir() {
            return Ok((dir, mode));
        }
    }
    Err(DocParseError::InvalidEngineOutput {
        detail: format!("no auto, ocr or txt output under '{}'", doc_dir.display()),
    })
}

fn copy_images(dir: &Path, image_writer: &dyn DataWriter) -> Result<usize, DocParseError> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let list_err = |e: std::io::Error| DocParseError::io(format!("Failed to list '{}'", dir.display()), e);
    let mut copied = 0;
    for entry in std::fs::read_dir(dir).map_err(list_err)? {
        let path = entry.map_err(list_err)?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let bytes = std::fs::read(&path)
            .map_err(|e| DocParseError::io(format!("Failed to read '{}'", path.display()), e))?;
        image_writer.write(name, &bytes)?;
        copied += 1;
    }
    Ok(copied)
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
