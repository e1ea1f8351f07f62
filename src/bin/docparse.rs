//! CLI binary for edgequake-docparse.
//!
//! Three subcommands over the library crate: `serve` runs the HTTP parse
//! service, `parse` handles one document from the shell, and `batch` runs
//! the directory-driven PDF → DOCX OCR job.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use edgequake_docparse::batch::ocr::{OcrEngine, TesseractConfig, TesseractEngine, DEFAULT_TESSERACT_LANG};
use edgequake_docparse::config::DEFAULT_PARTS_PER_PAGE;
use edgequake_docparse::pipeline::mineru::{MineruAnalyzer, DEFAULT_MAGIC_PDF};
use edgequake_docparse::pipeline::office::{SofficeConverter, DEFAULT_SOFFICE};
use edgequake_docparse::pipeline::render::PdfiumRenderer;
use edgequake_docparse::server::run_server;
use edgequake_docparse::{
    BatchConfig, BatchProgressCallback, BatchRunner, BucketConfig, DocumentParser, ParseConfig,
    ParseMethod, ServerConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Batch progress using indicatif ───────────────────────────────────────────

/// One bar per document, counting recognised slices.
struct CliBatchProgress {
    bar: ProgressBar,
}

impl CliBatchProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>4}/{len} slices  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl BatchProgressCallback for CliBatchProgress {
    fn on_batch_start(&self, total_documents: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_documents} PDFs…"))
        ));
    }

    fn on_document_start(&self, index: usize, total: usize, name: &str) {
        self.bar.set_prefix(format!("{index}/{total} {name}"));
        self.bar.set_position(0);
    }

    fn on_slices_written(&self, _name: &str, count: usize) {
        self.bar.set_length(count as u64);
        self.bar.reset_eta();
    }

    fn on_slice_recognised(&self, done: usize, _total: usize) {
        self.bar.set_position(done as u64);
    }

    fn on_document_complete(&self, _index: usize, _total: usize, output: &Path) {
        self.bar
            .println(format!("  {} {}", green("✓"), output.display()));
    }

    fn on_batch_complete(&self, total_documents: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} documents written",
            green("✔"),
            bold(&total_documents.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the parse service on :7333
  docparse serve --output-dir ./output

  # Parse one file and print its Markdown
  docparse parse report.pdf

  # Parse from object storage (credentials from ~/docparse.json)
  docparse parse s3://bucket/reports/q3.pdf --json

  # OCR every book in ./pdf_input_dir into ./pdf_output_dir/*.docx
  docparse batch --parts-per-page 4

ENVIRONMENT VARIABLES:
  DOCPARSE_CONFIG   Bucket credentials file (default ~/docparse.json)
  PDFIUM_LIB_PATH   Path to libpdfium (file or directory)
  RUST_LOG          Override the log filter
"#;

/// Parse documents to Markdown and OCR scanned books to DOCX.
#[derive(Parser, Debug)]
#[command(
    name = "docparse",
    version,
    about = "Parse documents to Markdown and OCR scanned books to DOCX",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCPARSE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCPARSE_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve `POST /v2/parse/file` over HTTP.
    Serve(ServeArgs),
    /// Parse one local or s3:// document.
    Parse(ParseArgs),
    /// Run the PDF → slices → OCR → DOCX batch job.
    Batch(BatchArgs),
}

/// Options shared by `serve` and `parse`.
#[derive(Args, Debug)]
struct EngineArgs {
    /// Root directory for per-document output.
    #[arg(long, env = "DOCPARSE_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Default parse method.
    #[arg(long, env = "DOCPARSE_PARSE_METHOD", value_enum, default_value = "auto")]
    parse_method: MethodArg,

    /// Document-analysis engine executable.
    #[arg(long, env = "DOCPARSE_MAGIC_PDF", default_value = DEFAULT_MAGIC_PDF)]
    magic_pdf: String,

    /// LibreOffice executable for Office → PDF.
    #[arg(long, env = "DOCPARSE_SOFFICE", default_value = DEFAULT_SOFFICE)]
    soffice: String,

    /// Scratch directory for uploads and engine workspaces.
    #[arg(long, env = "DOCPARSE_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Bucket credentials file.
    #[arg(long, env = "DOCPARSE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, env = "DOCPARSE_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(short, long, env = "DOCPARSE_PORT", default_value_t = edgequake_docparse::config::DEFAULT_PORT)]
    port: u16,

    /// Largest accepted upload, in MiB.
    #[arg(long, env = "DOCPARSE_MAX_UPLOAD_MB", default_value_t = 200)]
    max_upload_mb: usize,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args, Debug)]
struct ParseArgs {
    /// Local file path or s3://bucket/key.
    input: String,

    /// Print the full JSON response instead of the Markdown.
    #[arg(long)]
    json: bool,

    /// Write <stem>.md, _content_list.json, _middle.json and _model.json.
    #[arg(long)]
    dump: bool,

    /// Include the per-page model output in the JSON response.
    #[arg(long)]
    return_layout: bool,

    /// Include the middle JSON in the JSON response.
    #[arg(long)]
    return_info: bool,

    /// Include the content list in the JSON response.
    #[arg(long)]
    return_content_list: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args, Debug)]
struct BatchArgs {
    #[arg(long, default_value = "./pdf_input_dir")]
    input_dir: PathBuf,

    #[arg(long, default_value = "./pdf_book_dir/")]
    book_dir: PathBuf,

    #[arg(long, default_value = "./pdf_img_dir/")]
    image_dir: PathBuf,

    #[arg(long, default_value = "./pdf_output_dir")]
    output_dir: PathBuf,

    /// Horizontal bands per page.
    #[arg(long, default_value_t = DEFAULT_PARTS_PER_PAGE,
          value_parser = clap::value_parser!(u32).range(1..))]
    parts_per_page: u32,

    /// LibreOffice executable for Office → PDF.
    #[arg(long, env = "DOCPARSE_SOFFICE", default_value = DEFAULT_SOFFICE)]
    soffice: String,

    #[arg(long, value_enum, default_value = "tesseract")]
    ocr_engine: OcrEngineArg,

    /// Tesseract language(s).
    #[arg(long, default_value = DEFAULT_TESSERACT_LANG)]
    lang: String,

    #[arg(long)]
    tessdata_dir: Option<PathBuf>,

    /// Tesseract executable.
    #[arg(long, default_value = "tesseract")]
    tesseract: String,

    /// PaddleOCR detection model (.onnx).
    #[arg(long)]
    det_model: Option<PathBuf>,

    /// PaddleOCR recognition model (.onnx).
    #[arg(long)]
    rec_model: Option<PathBuf>,

    /// PaddleOCR character dictionary.
    #[arg(long)]
    dict: Option<PathBuf>,

    /// PaddleOCR text-line orientation model (.onnx).
    #[arg(long)]
    cls_model: Option<PathBuf>,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MethodArg {
    Auto,
    Ocr,
    Txt,
}

impl From<MethodArg> for ParseMethod {
    fn from(v: MethodArg) -> Self {
        match v {
            MethodArg::Auto => ParseMethod::Auto,
            MethodArg::Ocr => ParseMethod::Ocr,
            MethodArg::Txt => ParseMethod::Txt,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum OcrEngineArg {
    Tesseract,
    Paddle,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Parse(args) => parse(args, cli.quiet).await,
        Command::Batch(args) => batch(args, cli.quiet).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let parser = build_parser(&args.engine, ParseConfig::builder())?;
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        max_upload_bytes: args.max_upload_mb * 1024 * 1024,
    };
    run_server(Arc::new(parser), config)
        .await
        .context("Server failed")
}

async fn parse(args: ParseArgs, quiet: bool) -> Result<()> {
    let builder = ParseConfig::builder()
        .dump(args.dump)
        .return_layout(args.return_layout)
        .return_info(args.return_info)
        .return_content_list(args.return_content_list);
    let parser = build_parser(&args.engine, builder)?;
    let options = parser.config().clone();

    // The engines block; S3 handles need the runtime handle, which
    // block_in_place keeps available.
    let response = tokio::task::block_in_place(|| parser.parse_path(&args.input, &options))
        .with_context(|| format!("Failed to parse {}", args.input))?;

    if args.json {
        let json = serde_json::to_string_pretty(&response).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(response.markdown.as_bytes())
            .context("Failed to write to stdout")?;
        if !response.markdown.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }
    if !quiet {
        eprintln!("{} {} pages parsed", green("✔"), bold(&response.pages.to_string()));
    }
    Ok(())
}

async fn batch(args: BatchArgs, quiet: bool) -> Result<()> {
    let config = BatchConfig::builder()
        .input_dir(&args.input_dir)
        .book_dir(&args.book_dir)
        .image_dir(&args.image_dir)
        .output_dir(&args.output_dir)
        .parts_per_page(args.parts_per_page)
        .build()?;

    let mut engine = build_ocr_engine(&args)?;
    ensure_pdfium(quiet)?;
    let renderer = PdfiumRenderer::new().context("Failed to load pdfium")?;
    let mut runner = BatchRunner::new(
        config,
        Box::new(renderer),
        Arc::new(SofficeConverter::new(args.soffice.clone())),
    );
    if !quiet && !args.no_progress {
        runner = runner.with_progress(CliBatchProgress::new());
    }

    let report = tokio::task::block_in_place(|| runner.run(engine.as_mut())).context("Batch job failed")?;
    if !quiet {
        eprintln!(
            "   {} moved, {} converted, {} documents",
            report.moved.len(),
            report.converted.len(),
            report.documents.len()
        );
    }
    Ok(())
}

/// Fetch pdfium into the user cache on first run, with a download bar.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    if pdfium_auto::is_pdfium_cached() {
        return Ok(());
    }
    if quiet {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
        return Ok(());
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.set_message("Connecting…");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}

/// Map engine flags to a [`DocumentParser`].
fn build_parser(args: &EngineArgs, builder: edgequake_docparse::ParseConfigBuilder) -> Result<DocumentParser> {
    let mut builder = builder
        .output_dir(&args.output_dir)
        .parse_method(args.parse_method.into());
    if let Some(dir) = &args.temp_dir {
        builder = builder.temp_dir(dir);
    }
    let config = builder.build()?;

    let bucket_path = args.config.clone().unwrap_or_else(BucketConfig::default_path);
    let buckets = BucketConfig::load(&bucket_path)
        .with_context(|| format!("Failed to load bucket config {}", bucket_path.display()))?;

    Ok(DocumentParser::new(
        config,
        Arc::new(MineruAnalyzer::new(args.magic_pdf.clone())),
        Arc::new(SofficeConverter::new(args.soffice.clone())),
    )
    .with_buckets(buckets))
}

fn build_ocr_engine(args: &BatchArgs) -> Result<Box<dyn OcrEngine>> {
    match args.ocr_engine {
        OcrEngineArg::Tesseract => Ok(Box::new(TesseractEngine::new(TesseractConfig {
            binary: args.tesseract.clone(),
            lang: args.lang.clone(),
            tessdata_dir: args.tessdata_dir.clone(),
            ..TesseractConfig::default()
        }))),
        OcrEngineArg::Paddle => build_paddle_engine(args),
    }
}

#[cfg(feature = "paddle")]
fn build_paddle_engine(args: &BatchArgs) -> Result<Box<dyn OcrEngine>> {
    use edgequake_docparse::batch::ocr::{PaddleConfig, PaddleEngine};

    let (Some(det_model), Some(rec_model), Some(dict)) =
        (args.det_model.clone(), args.rec_model.clone(), args.dict.clone())
    else {
        anyhow::bail!("--ocr-engine paddle needs --det-model, --rec-model and --dict");
    };
    let engine = PaddleEngine::new(&PaddleConfig {
        det_model,
        rec_model,
        dict,
        cls_model: args.cls_model.clone(),
    })?;
    Ok(Box::new(engine))
}

#[cfg(not(feature = "paddle"))]
fn build_paddle_engine(_args: &BatchArgs) -> Result<Box<dyn OcrEngine>> {
    anyhow::bail!("this build has no PaddleOCR support; rebuild with --features paddle")
}
