//! Integration tests for the HTTP parse service.
//!
//! The analysis engine and Office converter are replaced with in-process
//! fakes, so these run without magic-pdf, LibreOffice or pdfium.

#![cfg(feature = "server")]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use edgequake_docparse::pipeline::analyze::{DocumentAnalyzer, InferenceResult, ParseMode, PipelineResult};
use edgequake_docparse::pipeline::dispatch::{Dataset, DatasetSource};
use edgequake_docparse::pipeline::office::OfficeConverter;
use edgequake_docparse::server::router;
use edgequake_docparse::storage::DataWriter;
use edgequake_docparse::{DocParseError, DocumentParser, ParseConfig, ServerConfig};
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Reports two pages, writes one JPEG figure and links it from the Markdown.
#[derive(Default)]
struct FakeAnalyzer {
    modes: Mutex<Vec<ParseMode>>,
}

impl DocumentAnalyzer for FakeAnalyzer {
    fn name(&self) -> &str {
        "fake"
    }

    fn classify(&self, _dataset: &Dataset) -> Result<ParseMode, DocParseError> {
        Ok(ParseMode::Txt)
    }

    fn analyze(&self, dataset: &Dataset, mode: ParseMode) -> Result<InferenceResult, DocParseError> {
        assert!(matches!(dataset.source(), DatasetSource::Pdf(_)));
        self.modes.lock().unwrap().push(mode);
        Ok(InferenceResult::new(
            mode,
            vec![json!({"page_info": {"page_no": 0}}), json!({"page_info": {"page_no": 1}})],
        ))
    }

    fn pipe(
        &self,
        _inference: &InferenceResult,
        image_writer: &dyn DataWriter,
    ) -> Result<PipelineResult, DocParseError> {
        image_writer.write("fig.jpg", &jpeg_bytes())?;
        Ok(PipelineResult::new(
            "# Report\n\n![](images/fig.jpg)\n",
            json!([{"type": "image", "img_path": "images/fig.jpg", "page_idx": 0}]),
            json!({"pdf_info": [], "_parse_type": "txt"}),
        ))
    }
}

/// Fails the way an engine that exits non-zero does.
struct FailingAnalyzer;

impl DocumentAnalyzer for FailingAnalyzer {
    fn name(&self) -> &str {
        "failing"
    }

    fn classify(&self, _dataset: &Dataset) -> Result<ParseMode, DocParseError> {
        Ok(ParseMode::Ocr)
    }

    fn analyze(&self, _dataset: &Dataset, _mode: ParseMode) -> Result<InferenceResult, DocParseError> {
        Err(DocParseError::ExternalTool {
            tool: "magic-pdf".into(),
            detail: "model weights missing".into(),
        })
    }

    fn pipe(&self, _: &InferenceResult, _: &dyn DataWriter) -> Result<PipelineResult, DocParseError> {
        unreachable!("analysis never succeeds")
    }
}

/// Panics inside the blocking parse task.
struct PanickingAnalyzer;

impl DocumentAnalyzer for PanickingAnalyzer {
    fn name(&self) -> &str {
        "panicking"
    }

    fn classify(&self, _dataset: &Dataset) -> Result<ParseMode, DocParseError> {
        Ok(ParseMode::Ocr)
    }

    fn analyze(&self, _dataset: &Dataset, _mode: ParseMode) -> Result<InferenceResult, DocParseError> {
        panic!("engine state corrupted");
    }

    fn pipe(&self, _: &InferenceResult, _: &dyn DataWriter) -> Result<PipelineResult, DocParseError> {
        unreachable!("analysis never returns")
    }
}

/// Writes a placeholder PDF next to the input.
struct FakeConverter;

impl OfficeConverter for FakeConverter {
    fn convert_into(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, DocParseError> {
        let stem = input.file_stem().unwrap().to_string_lossy().into_owned();
        let out = out_dir.join(format!("{stem}.pdf"));
        std::fs::write(&out, b"%PDF-1.4 converted").unwrap();
        Ok(out)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

const BOUNDARY: &str = "docparse-test-boundary";

fn jpeg_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(4, 4, Rgb([200, 10, 10]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg).unwrap();
    buf
}

fn app_with(output_dir: &Path, analyzer: Arc<dyn DocumentAnalyzer>) -> Router {
    let config = ParseConfig::builder().output_dir(output_dir).build().unwrap();
    let parser = DocumentParser::new(config, analyzer, Arc::new(FakeConverter));
    router(Arc::new(parser), &ServerConfig::default())
}

fn setup(output_dir: &Path) -> (Router, Arc<FakeAnalyzer>) {
    let analyzer = Arc::new(FakeAnalyzer::default());
    (app_with(output_dir, analyzer.clone()), analyzer)
}

/// Hand-built `multipart/form-data` body.
fn multipart_body(file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn post_parse(app: Router, body: Vec<u8>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/v2/parse/file")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_ok() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = setup(dir.path());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let v: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["status"], "ok");
    assert_eq!(v["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn pdf_upload_returns_markdown_with_inlined_images() {
    let dir = tempfile::tempdir().unwrap();
    let (app, analyzer) = setup(dir.path());

    let body = multipart_body(Some(("report.pdf", b"%PDF-1.4 fake")), &[]);
    let (status, v) = post_parse(app, body).await;

    assert_eq!(status, StatusCode::OK, "{v}");
    assert_eq!(v["success"], true);
    assert_eq!(v["pages"], 2);
    let md = v["markdown"].as_str().unwrap();
    assert!(md.starts_with("# Report"));
    assert!(md.contains("![fig.jpg](data:image/jpeg;base64,"), "{md}");
    assert!(v.get("layout").is_none());
    assert!(v.get("info").is_none());
    assert!(v.get("content_list").is_none());

    // auto → the fake classifier's choice
    assert_eq!(*analyzer.modes.lock().unwrap(), vec![ParseMode::Txt]);
    assert!(dir.path().join("report/images/fig.jpg").is_file());
    assert!(!dir.path().join("report/report.md").exists());
}

#[tokio::test]
async fn form_fields_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let (app, analyzer) = setup(dir.path());

    let body = multipart_body(
        Some(("deck.pptx", b"PK fake pptx")),
        &[
            ("parse_method", "ocr"),
            ("is_json_md_dump", "true"),
            ("return_layout", "true"),
            ("return_info", "1"),
            ("return_content_list", "true"),
            ("unknown_field", "ignored"),
        ],
    );
    let (status, v) = post_parse(app, body).await;

    assert_eq!(status, StatusCode::OK, "{v}");
    assert_eq!(*analyzer.modes.lock().unwrap(), vec![ParseMode::Ocr]);
    assert_eq!(v["layout"].as_array().unwrap().len(), 2);
    assert_eq!(v["info"]["_parse_type"], "txt");
    assert_eq!(v["content_list"][0]["img_path"], "images/fig.jpg");

    let out = dir.path().join("deck");
    for name in ["deck.md", "deck_content_list.json", "deck_middle.json", "deck_model.json"] {
        assert!(out.join(name).is_file(), "missing dump {name}");
    }
    let dumped_md = std::fs::read_to_string(out.join("deck.md")).unwrap();
    assert!(dumped_md.contains("![](images/fig.jpg)"));
}

#[tokio::test]
async fn unsupported_extension_is_500_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let (app, analyzer) = setup(dir.path());

    let body = multipart_body(Some(("notes.txt", b"plain text")), &[]);
    let (status, v) = post_parse(app, body).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(v["success"], false);
    assert_eq!(v["message"], "");
    let error = v["error"].as_str().unwrap();
    assert!(error.starts_with("Internal server error: "), "{error}");
    assert!(error.contains(".txt"), "{error}");
    assert!(analyzer.modes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_file_field_is_500_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = setup(dir.path());

    let (status, v) = post_parse(app, multipart_body(None, &[("parse_method", "auto")])).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(v["success"], false);
}

#[tokio::test]
async fn invalid_parse_method_is_500_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let (app, analyzer) = setup(dir.path());

    let body = multipart_body(Some(("report.pdf", b"%PDF")), &[("parse_method", "vision")]);
    let (status, v) = post_parse(app, body).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(v["success"], false);
    assert!(analyzer.modes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn non_multipart_body_is_500_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = setup(dir.path());

    let request = Request::builder()
        .method("POST")
        .uri("/v2/parse/file")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let v: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["success"], false);
}

#[tokio::test]
async fn engine_failure_is_500_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(dir.path(), Arc::new(FailingAnalyzer));

    let body = multipart_body(Some(("report.pdf", b"%PDF-1.4")), &[]);
    let (status, v) = post_parse(app, body).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(v["success"], false);
    assert_eq!(v["message"], "");
    let error = v["error"].as_str().unwrap();
    assert!(error.starts_with("Internal server error: "), "{error}");
    assert!(error.contains("magic-pdf failed: model weights missing"), "{error}");
}

#[tokio::test]
async fn panicking_engine_is_500_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(dir.path(), Arc::new(PanickingAnalyzer));

    let body = multipart_body(Some(("report.pdf", b"%PDF-1.4")), &[("parse_method", "ocr")]);
    let (status, v) = post_parse(app.clone(), body).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(v["success"], false);
    let error = v["error"].as_str().unwrap();
    assert!(error.starts_with("Internal server error: "), "{error}");
    assert!(error.contains("panicked"), "{error}");

    // The service keeps answering after a panicked request.
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
