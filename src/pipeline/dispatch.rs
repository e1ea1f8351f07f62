//! File-type dispatch: raw upload bytes → [`Dataset`] → analysis results.
//!
//! ## Why a scratch file for Office and images?
//!
//! PDFs are handed to the engine straight from memory. Office documents need
//! a real file for the converter, and the analysis engine opens images by
//! path, so those two kinds are written to exactly one file inside a fresh
//! scratch directory. The [`TempDir`] is owned by the [`Dataset`], so the
//! file is removed as soon as the dataset is dropped at the end of the request.
//!
//! The dataset also remembers the configured temp root, so engines that need
//! a workspace of their own create it in the same place.

use crate::config::ParseMethod;
use crate::error::DocParseError;
use crate::pipeline::analyze::{DocumentAnalyzer, InferenceResult, ParseMode, PipelineResult};
use crate::pipeline::office::OfficeConverter;
use crate::storage::DataWriter;
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Extensions routed to the PDF path.
pub const PDF_EXTENSIONS: &[&str] = &["pdf"];
/// Extensions routed through the Office converter.
pub const OFFICE_EXTENSIONS: &[&str] = &["ppt", "pptx", "doc", "docx"];
/// Extensions loaded as image datasets.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Name (without extension) of the scratch file written for Office/image input.
const SCRATCH_STEM: &str = "upload";
/// Scratch subdirectory receiving the converter's PDF.
const CONVERTED_SUBDIR: &str = "pdf";

/// A file received over HTTP, fully buffered.
#[derive(Clone)]
pub struct UploadedDocument {
    /// Client-supplied filename; only its base name and extension are used.
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

impl fmt::Debug for UploadedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedDocument")
            .field("filename", &self.filename)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Lowercase extension of the last path segment, without the dot.
///
/// Works for local paths, `s3://` URIs and bare filenames. Returns an empty
/// string when there is none.
pub fn extension_of(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    Path::new(base)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// The three ingestion paths, plus everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Office,
    Image,
    /// Carries the offending extension (possibly empty).
    Unsupported(String),
}

impl FileKind {
    /// Classify an extension, with or without a leading dot, ignoring case.
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if PDF_EXTENSIONS.contains(&ext.as_str()) {
            FileKind::Pdf
        } else if OFFICE_EXTENSIONS.contains(&ext.as_str()) {
            FileKind::Office
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            FileKind::Image
        } else {
            FileKind::Unsupported(ext)
        }
    }
}

/// What the analysis engine reads.
#[derive(Debug)]
pub enum DatasetSource {
    /// PDF bytes, either uploaded directly or produced by the Office converter.
    Pdf(Vec<u8>),
    /// Path to an image file.
    Image(PathBuf),
}

/// A loaded document ready for classification and analysis.
#[derive(Debug)]
pub struct Dataset {
    kind: FileKind,
    source: DatasetSource,
    /// Keeps the scratch file alive for as long as the dataset.
    _scratch: Option<TempDir>,
    temp_root: Option<PathBuf>,
}

impl Dataset {
    /// A PDF dataset straight from bytes.
    pub fn pdf(bytes: Vec<u8>) -> Self {
        Self {
            kind: FileKind::Pdf,
            source: DatasetSource::Pdf(bytes),
            _scratch: None,
            temp_root: None,
        }
    }

    /// An image dataset over an existing file (the caller owns the file).
    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: FileKind::Image,
            source: DatasetSource::Image(path.into()),
            _scratch: None,
            temp_root: None,
        }
    }

    /// Create engine workspaces under `root` instead of the system temp dir.
    pub fn with_temp_root(mut self, root: Option<&Path>) -> Self {
        self.temp_root = root.map(Path::to_path_buf);
        self
    }

    /// The kind the dataset was loaded as (never `Unsupported`).
    pub fn kind(&self) -> &FileKind {
        &self.kind
    }

    pub fn source(&self) -> &DatasetSource {
        &self.source
    }

    /// Directory holding the scratch file, if one was written.
    pub fn scratch_dir(&self) -> Option<&Path> {
        self._scratch.as_ref().map(|d| d.path())
    }

    pub fn temp_root(&self) -> Option<&Path> {
        self.temp_root.as_deref()
    }

    /// A fresh temp dir named `<prefix>…` under [`temp_root`](Self::temp_root),
    /// or the system temp dir when none is set.
    pub fn workspace(&self, prefix: &str) -> Result<TempDir, DocParseError> {
        make_temp_dir(prefix, self.temp_root())
    }
}

fn make_temp_dir(prefix: &str, root: Option<&Path>) -> Result<TempDir, DocParseError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    match root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
    .map_err(|e| DocParseError::io("Failed to create temp directory", e))
}

/// Load raw bytes as a dataset according to `extension`.
///
/// PDF input writes nothing to disk. Office and image input write exactly one
/// file, `upload.<ext>`, into a fresh scratch dir under `temp_root` (or the
/// system temp dir). Office conversion output lands in the same scratch dir.
pub fn load_dataset(
    bytes: Vec<u8>,
    extension: &str,
    converter: &dyn OfficeConverter,
    temp_root: Option<&Path>,
) -> Result<Dataset, DocParseError> {
    let kind = FileKind::from_extension(extension);
    debug!("Dispatching {} bytes as {:?}", bytes.len(), kind);

    let temp_root_buf = temp_root.map(Path::to_path_buf);
    match kind {
        FileKind::Pdf => Ok(Dataset::pdf(bytes).with_temp_root(temp_root)),
        FileKind::Office => {
            let (scratch, path) = write_scratch_file(&bytes, extension, temp_root)?;
            let pdf_path = converter.convert_into(&path, &scratch.path().join(CONVERTED_SUBDIR))?;
            let pdf = std::fs::read(&pdf_path)
                .map_err(|e| DocParseError::io(format!("Failed to read '{}'", pdf_path.display()), e))?;
            info!("Converted Office document → {} bytes of PDF", pdf.len());
            Ok(Dataset {
                kind: FileKind::Office,
                source: DatasetSource::Pdf(pdf),
                _scratch: Some(scratch),
                temp_root: temp_root_buf,
            })
        }
        FileKind::Image => {
            let (scratch, path) = write_scratch_file(&bytes, extension, temp_root)?;
            Ok(Dataset {
                kind: FileKind::Image,
                source: DatasetSource::Image(path),
                _scratch: Some(scratch),
                temp_root: temp_root_buf,
            })
        }
        FileKind::Unsupported(ext) => Err(DocParseError::UnsupportedFileType {
            extension: format!(".{ext}"),
        }),
    }
}

fn write_scratch_file(
    bytes: &[u8],
    extension: &str,
    temp_root: Option<&Path>,
) -> Result<(TempDir, PathBuf), DocParseError> {
    let scratch = make_temp_dir("docparse-", temp_root)?;

    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    let path = scratch.path().join(format!("{SCRATCH_STEM}.{ext}"));
    std::fs::write(&path, bytes)
        .map_err(|e| DocParseError::io(format!("Failed to write '{}'", path.display()), e))?;
    debug!("Wrote scratch file {}", path.display());
    Ok((scratch, path))
}

/// The mode a forced method names; `None` for `Auto`.
pub fn forced_mode(method: ParseMethod) -> Option<ParseMode> {
    match method {
        ParseMethod::Ocr => Some(ParseMode::Ocr),
        ParseMethod::Txt => Some(ParseMode::Txt),
        ParseMethod::Auto => None,
    }
}

/// Run analysis and extraction on a dataset.
///
/// Extracted images go through `image_writer`; the returned pair holds the
/// raw inference (for page count and layout) and the derived views.
pub fn process_file(
    dataset: &Dataset,
    method: ParseMethod,
    analyzer: &dyn DocumentAnalyzer,
    image_writer: &dyn DataWriter,
) -> Result<(InferenceResult, PipelineResult), DocParseError> {
    let inference = match forced_mode(method) {
        Some(mode) => analyzer.analyze(dataset, mode)?,
        None => analyzer.analyze_auto(dataset)?,
    };
    info!(
        "{}: {} pages analysed in {} mode",
        analyzer.name(),
        inference.page_count(),
        inference.mode()
    );
    let pipe = analyzer.pipe(&inference, image_writer)?;
    Ok((inference, pipe))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDataWriter;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records the mode it was asked to analyse in; classifies as configured.
    struct RecordingAnalyzer {
        classify_as: ParseMode,
        seen: Mutex<Vec<ParseMode>>,
        classified: Mutex<usize>,
    }

    impl RecordingAnalyzer {
        fn new(classify_as: ParseMode) -> Self {
            Self {
                classify_as,
                seen: Mutex::new(Vec::new()),
                classified: Mutex::new(0),
            }
        }
    }

    impl DocumentAnalyzer for RecordingAnalyzer {
        fn name(&self) -> &str {
            "recording"
        }

        fn classify(&self, _dataset: &Dataset) -> Result<ParseMode, DocParseError> {
            *self.classified.lock().unwrap() += 1;
            Ok(self.classify_as)
        }

        fn analyze(&self, _dataset: &Dataset, mode: ParseMode) -> Result<InferenceResult, DocParseError> {
            self.seen.lock().unwrap().push(mode);
            Ok(InferenceResult::new(mode, vec![json!({"page_no": 0})]))
        }

        fn pipe(
            &self,
            _inference: &InferenceResult,
            _image_writer: &dyn DataWriter,
        ) -> Result<PipelineResult, DocParseError> {
            Ok(PipelineResult::new("md", json!([]), json!({})))
        }
    }

    /// Writes a fake PDF beside the input, like a real converter would.
    struct FakeConverter;

    impl OfficeConverter for FakeConverter {
        fn convert_into(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, DocParseError> {
            std::fs::create_dir_all(out_dir).unwrap();
            let out = out_dir.join("converted.pdf");
            let mut pdf = b"%PDF-from-".to_vec();
            pdf.extend(std::fs::read(input).unwrap());
            std::fs::write(&out, pdf).unwrap();
            Ok(out)
        }
    }

    fn count_files(dir: &Path) -> usize {
        let mut n = 0;
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                n += count_files(&path);
            } else {
                n += 1;
            }
        }
        n
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a.PDF"), "pdf");
        assert_eq!(extension_of("/x/y/report.v2.docx"), "docx");
        assert_eq!(extension_of("s3://bucket/dir.d/scan.jpeg"), "jpeg");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of("dir.d/README"), "");
    }

    #[test]
    fn test_file_kind_from_extension() {
        assert_eq!(FileKind::from_extension(".pdf"), FileKind::Pdf);
        assert_eq!(FileKind::from_extension("PPTX"), FileKind::Office);
        assert_eq!(FileKind::from_extension("doc"), FileKind::Office);
        assert_eq!(FileKind::from_extension("jpeg"), FileKind::Image);
        assert_eq!(
            FileKind::from_extension("xls"),
            FileKind::Unsupported("xls".into())
        );
        assert_eq!(FileKind::from_extension(""), FileKind::Unsupported(String::new()));
    }

    #[test]
    fn pdf_dispatch_writes_no_temp_file() {
        let root = tempfile::tempdir().unwrap();
        let ds = load_dataset(b"%PDF-1.4".to_vec(), "pdf", &FakeConverter, Some(root.path())).unwrap();
        assert_eq!(ds.kind(), &FileKind::Pdf);
        assert!(ds.scratch_dir().is_none());
        assert_eq!(count_files(root.path()), 0);
        assert!(matches!(ds.source(), DatasetSource::Pdf(b) if b == b"%PDF-1.4"));
    }

    #[test]
    fn image_dispatch_writes_exactly_one_temp_file() {
        let root = tempfile::tempdir().unwrap();
        let ds = load_dataset(vec![0xFF, 0xD8, 0xFF], "JPG", &FakeConverter, Some(root.path())).unwrap();
        assert_eq!(count_files(root.path()), 1);
        match ds.source() {
            DatasetSource::Image(path) => {
                assert_eq!(path.file_name().unwrap(), "upload.jpg");
                assert_eq!(std::fs::read(path).unwrap(), vec![0xFF, 0xD8, 0xFF]);
            }
            other => panic!("expected image source, got {other:?}"),
        }
    }

    #[test]
    fn office_dispatch_converts_inside_temp_root() {
        let root = tempfile::tempdir().unwrap();
        let ds = load_dataset(b"DOCX".to_vec(), "docx", &FakeConverter, Some(root.path())).unwrap();
        assert_eq!(ds.kind(), &FileKind::Office);
        assert!(matches!(ds.source(), DatasetSource::Pdf(b) if b == b"%PDF-from-DOCX"));

        // The upload and the converter's PDF both live under the configured root.
        let scratch = ds.scratch_dir().unwrap().to_path_buf();
        assert!(scratch.starts_with(root.path()));
        assert_eq!(count_files(root.path()), 2);
        assert!(scratch.join("upload.docx").is_file());
        assert!(scratch.join("pdf/converted.pdf").is_file());

        drop(ds);
        assert_eq!(count_files(root.path()), 0);
    }

    #[test]
    fn workspaces_follow_temp_root() {
        let root = tempfile::tempdir().unwrap();
        for ds in [
            load_dataset(b"%PDF".to_vec(), "pdf", &FakeConverter, Some(root.path())).unwrap(),
            load_dataset(vec![1], "png", &FakeConverter, Some(root.path())).unwrap(),
        ] {
            assert_eq!(ds.temp_root(), Some(root.path()));
            let ws = ds.workspace("docparse-engine-").unwrap();
            assert!(ws.path().starts_with(root.path()));
        }
        assert!(Dataset::pdf(vec![]).temp_root().is_none());
    }

    #[test]
    fn scratch_dir_is_removed_with_dataset() {
        let root = tempfile::tempdir().unwrap();
        let ds = load_dataset(vec![1], "png", &FakeConverter, Some(root.path())).unwrap();
        let scratch = ds.scratch_dir().unwrap().to_path_buf();
        assert!(scratch.exists());
        drop(ds);
        assert!(!scratch.exists());
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = load_dataset(vec![], "xlsx", &FakeConverter, None).unwrap_err();
        assert!(matches!(err, DocParseError::UnsupportedFileType { ref extension } if extension == ".xlsx"));
    }

    #[test]
    fn forced_methods_skip_classifier() {
        let analyzer = RecordingAnalyzer::new(ParseMode::Ocr);
        let ds = Dataset::pdf(vec![]);
        let writer = MemoryDataWriter::new();
        for method in [ParseMethod::Txt, ParseMethod::Ocr] {
            let (inference, _) = process_file(&ds, method, &analyzer, &writer).unwrap();
            assert_eq!(Some(inference.mode()), forced_mode(method));
        }
        assert_eq!(*analyzer.seen.lock().unwrap(), vec![ParseMode::Txt, ParseMode::Ocr]);
        assert_eq!(*analyzer.classified.lock().unwrap(), 0);
        assert_eq!(forced_mode(ParseMethod::Auto), None);
    }

    #[test]
    fn auto_follows_classifier_outcome() {
        for outcome in [ParseMode::Ocr, ParseMode::Txt] {
            let analyzer = RecordingAnalyzer::new(outcome);
            let ds = Dataset::pdf(vec![]);
            let writer = MemoryDataWriter::new();
            let (inference, _) = process_file(&ds, ParseMethod::Auto, &analyzer, &writer).unwrap();
            assert_eq!(inference.mode(), outcome);
            assert_eq!(*analyzer.seen.lock().unwrap(), vec![outcome]);
        }
    }
}
