//! Configuration types for the parse service and the batch job.
//!
//! Parse behaviour is controlled through [`ParseConfig`] and batch behaviour
//! through [`BatchConfig`], both built via builders so callers only set what
//! they care about. Object-storage credentials live in a separate
//! [`BucketConfig`] loaded from a JSON file; its `Debug` output redacts
//! secret keys.

use crate::error::DocParseError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default HTTP port of the parse service.
pub const DEFAULT_PORT: u16 = 7333;

/// Default number of horizontal bands each PDF page is cut into.
pub const DEFAULT_PARTS_PER_PAGE: u32 = 4;

/// Environment variable naming the bucket-credentials file.
pub const CONFIG_ENV_VAR: &str = "DOCPARSE_CONFIG";

// ── Parse method ─────────────────────────────────────────────────────────

/// How the analysis engine should read a document.
///
/// `Auto` lets the engine's classifier decide per document; the other two
/// force a mode. The resolved choice is a [`crate::pipeline::analyze::ParseMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMethod {
    /// Classify the document and pick OCR or text mode. (default)
    #[default]
    Auto,
    /// Always run OCR on rendered pages.
    Ocr,
    /// Always use the embedded text layer.
    Txt,
}

impl FromStr for ParseMethod {
    type Err = DocParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ParseMethod::Auto),
            "ocr" => Ok(ParseMethod::Ocr),
            "txt" => Ok(ParseMethod::Txt),
            other => Err(DocParseError::InvalidConfig(format!(
                "parse_method must be auto, ocr or txt, got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ParseMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseMethod::Auto => write!(f, "auto"),
            ParseMethod::Ocr => write!(f, "ocr"),
            ParseMethod::Txt => write!(f, "txt"),
        }
    }
}

// ── Parse config ─────────────────────────────────────────────────────────

/// Configuration for one parse request (HTTP upload or CLI path).
///
/// Built via [`ParseConfig::builder()`] or using [`ParseConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docparse::{ParseConfig, ParseMethod};
///
/// let config = ParseConfig::builder()
///     .output_dir("output")
///     .parse_method(ParseMethod::Ocr)
///     .return_content_list(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.parse_method, ParseMethod::Ocr);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Root of the per-document output tree. Default: `output`.
    ///
    /// Each document gets `<output_dir>/<stem>/` for dumps and
    /// `<output_dir>/<stem>/images/` for extracted images.
    pub output_dir: PathBuf,

    /// Parse method. Default: [`ParseMethod::Auto`].
    pub parse_method: ParseMethod,

    /// Directory under which scratch dirs for Office/image uploads are
    /// created. `None` uses the system temp dir.
    pub temp_dir: Option<PathBuf>,

    /// Also write Markdown and the three JSON views through the content
    /// writer. Default: false.
    pub dump: bool,

    /// Include the raw per-page model output as `layout` in the response.
    pub return_layout: bool,

    /// Include the middle JSON as `info` in the response.
    pub return_info: bool,

    /// Include the content list as `content_list` in the response.
    pub return_content_list: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            parse_method: ParseMethod::default(),
            temp_dir: None,
            dump: false,
            return_layout: false,
            return_info: false,
            return_content_list: false,
        }
    }
}

impl ParseConfig {
    /// Create a new builder for `ParseConfig`.
    pub fn builder() -> ParseConfigBuilder {
        ParseConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ParseConfig`].
#[derive(Debug)]
pub struct ParseConfigBuilder {
    config: ParseConfig,
}

impl ParseConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn parse_method(mut self, method: ParseMethod) -> Self {
        self.config.parse_method = method;
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    pub fn dump(mut self, v: bool) -> Self {
        self.config.dump = v;
        self
    }

    pub fn return_layout(mut self, v: bool) -> Self {
        self.config.return_layout = v;
        self
    }

    pub fn return_info(mut self, v: bool) -> Self {
        self.config.return_info = v;
        self
    }

    pub fn return_content_list(mut self, v: bool) -> Self {
        self.config.return_content_list = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ParseConfig, DocParseError> {
        if self.config.output_dir.as_os_str().is_empty() {
            return Err(DocParseError::InvalidConfig(
                "output_dir must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Server config ────────────────────────────────────────────────────────

/// Configuration for the HTTP listener.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted request body, in bytes. Default: 200 MiB.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_upload_bytes: 200 * 1024 * 1024,
        }
    }
}

// ── Batch config ─────────────────────────────────────────────────────────

/// Directory layout and slicing parameters for the batch OCR job.
///
/// The four directories default to the relative paths the job has always
/// used, so running `docparse batch` from a prepared working directory needs
/// no flags at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Staging directory holding PDFs and Office files to process.
    pub input_dir: PathBuf,
    /// PDFs ready for slicing (moved or converted from `input_dir`).
    pub book_dir: PathBuf,
    /// Working directory for `img_<n>.png` slices.
    pub image_dir: PathBuf,
    /// Where `<stem>.docx` files are written.
    pub output_dir: PathBuf,
    /// Horizontal bands per page. Default: 4.
    pub parts_per_page: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./pdf_input_dir"),
            book_dir: PathBuf::from("./pdf_book_dir/"),
            image_dir: PathBuf::from("./pdf_img_dir/"),
            output_dir: PathBuf::from("./pdf_output_dir"),
            parts_per_page: DEFAULT_PARTS_PER_PAGE,
        }
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.input_dir = dir.into();
        self
    }

    pub fn book_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.book_dir = dir.into();
        self
    }

    pub fn image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.image_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn parts_per_page(mut self, n: u32) -> Self {
        self.config.parts_per_page = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, DocParseError> {
        if self.config.parts_per_page == 0 {
            return Err(DocParseError::InvalidConfig(
                "parts_per_page must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Bucket credentials ───────────────────────────────────────────────────

/// Key under `bucket_info` used when a bucket has no entry of its own.
pub const DEFAULT_BUCKET_KEY: &str = "[default]";

/// Access key, secret key and endpoint for one bucket.
///
/// Stored in the config file as a three-element array
/// `["<ak>", "<sk>", "<endpoint>"]`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "(String, String, String)")]
pub struct BucketCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub endpoint: String,
}

impl From<(String, String, String)> for BucketCredentials {
    fn from((access_key, secret_key, endpoint): (String, String, String)) -> Self {
        Self {
            access_key,
            secret_key,
            endpoint,
        }
    }
}

impl fmt::Debug for BucketCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Per-bucket credentials, loaded from a JSON file:
///
/// ```json
/// {
///   "bucket_info": {
///     "[default]": ["ak", "sk", "https://s3.example.com"],
///     "reports":   ["ak2", "sk2", "https://minio.internal:9000"]
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BucketConfig {
    #[serde(default)]
    pub bucket_info: HashMap<String, BucketCredentials>,
}

impl BucketConfig {
    /// Load from `path`. A missing file yields an empty config; a file that
    /// exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self, DocParseError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No bucket config at {}", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(DocParseError::io(
                    format!("Failed to read config '{}'", path.display()),
                    e,
                ))
            }
        };
        serde_json::from_str(&raw).map_err(|e| {
            DocParseError::InvalidConfig(format!("config '{}': {}", path.display(), e))
        })
    }

    /// `$DOCPARSE_CONFIG`, else `~/docparse.json`, else `./docparse.json`.
    pub fn default_path() -> PathBuf {
        if let Ok(p) = std::env::var(CONFIG_ENV_VAR) {
            if !p.is_empty() {
                return PathBuf::from(p);
            }
        }
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join("docparse.json"))
            .unwrap_or_else(|| PathBuf::from("docparse.json"))
    }

    /// Credentials for `bucket`, falling back to the `[default]` entry.
    pub fn credentials(&self, bucket: &str) -> Result<&BucketCredentials, DocParseError> {
        self.bucket_info
            .get(bucket)
            .or_else(|| self.bucket_info.get(DEFAULT_BUCKET_KEY))
            .ok_or_else(|| DocParseError::BucketNotConfigured {
                bucket: bucket.to_string(),
            })
    }
}
