//! Writer/reader backends and the selector that picks one per request.
//!
//! The analysis engine never touches the filesystem or a bucket directly: it
//! receives a [`DataWriter`] for extracted images, and the response assembler
//! dumps its views into [`MemoryDataWriter`]s. Which concrete backend is used
//! is decided once, up front, by [`init_writers`] (path input) or
//! [`init_upload_writers`] (HTTP upload):
//!
//! ```text
//! "s3://bucket/key"  ──▶ S3DataWriter × 2  + bytes via throwaway S3DataReader
//! "some/local/path"  ──▶ FileBasedDataWriter × 2 + bytes via std::fs
//! upload buffer      ──▶ FileBasedDataWriter × 2 + bytes from the buffer
//! ```

pub mod local;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

use crate::config::BucketConfig;
use crate::error::DocParseError;
use crate::pipeline::dispatch::{extension_of, UploadedDocument};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub use local::{FileBasedDataReader, FileBasedDataWriter};
pub use memory::MemoryDataWriter;

/// URI scheme that routes a path to object storage.
pub const S3_SCHEME: &str = "s3://";

/// Sink for engine output: extracted images, Markdown, JSON dumps.
///
/// Implementations are shared across the blocking parse thread, hence
/// `Send + Sync` and `&self` receivers.
pub trait DataWriter: Send + Sync {
    /// Write `data` to `path`, relative to the writer's root unless absolute.
    fn write(&self, path: &str, data: &[u8]) -> Result<(), DocParseError>;

    /// Write a UTF-8 string.
    fn write_string(&self, path: &str, data: &str) -> Result<(), DocParseError> {
        self.write(path, data.as_bytes())
    }
}

/// Source of input bytes.
pub trait DataReader: Send + Sync {
    /// Read the whole object at `path`.
    fn read(&self, path: &str) -> Result<Vec<u8>, DocParseError>;
}

/// Everything the pipeline needs from the storage layer for one document.
pub struct StorageHandles {
    /// Writer rooted at the document's output directory.
    pub writer: Arc<dyn DataWriter>,
    /// Writer rooted at the document's image directory.
    pub image_writer: Arc<dyn DataWriter>,
    /// Raw input bytes.
    pub file_bytes: Vec<u8>,
    /// Lowercase extension without the dot (`"pdf"`, `"docx"`, …).
    pub extension: String,
}

impl std::fmt::Debug for StorageHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageHandles")
            .field("file_bytes", &self.file_bytes.len())
            .field("extension", &self.extension)
            .finish()
    }
}

/// Check if the path should be served by object storage.
pub fn is_s3_path(path: &str) -> bool {
    path.starts_with(S3_SCHEME)
}

/// Split `s3://bucket/some/key` into `("bucket", "some/key")`.
pub fn parse_s3_path(path: &str) -> Result<(String, String), DocParseError> {
    let rest = path
        .strip_prefix(S3_SCHEME)
        .ok_or_else(|| DocParseError::InvalidS3Path {
            path: path.to_string(),
        })?;
    let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return Err(DocParseError::InvalidS3Path {
            path: path.to_string(),
        });
    }
    Ok((bucket.to_string(), key.to_string()))
}

/// Build writers and read the input for a path that may be local or `s3://`.
///
/// For object storage the bucket named in `file_path` also hosts the output
/// prefixes; credentials come from `buckets`.
pub fn init_writers(
    file_path: &str,
    output_path: &str,
    output_image_path: &str,
    buckets: &BucketConfig,
) -> Result<StorageHandles, DocParseError> {
    let extension = extension_of(file_path);

    if is_s3_path(file_path) {
        return init_s3_writers(file_path, output_path, output_image_path, buckets, extension);
    }

    let writer = FileBasedDataWriter::new(output_path);
    let image_writer = FileBasedDataWriter::new(output_image_path);
    create_dir(Path::new(output_image_path))?;

    let file_bytes = std::fs::read(file_path)
        .map_err(|e| DocParseError::io(format!("Failed to read '{file_path}'"), e))?;
    debug!("Read {} bytes from {}", file_bytes.len(), file_path);

    Ok(StorageHandles {
        writer: Arc::new(writer),
        image_writer: Arc::new(image_writer),
        file_bytes,
        extension,
    })
}

/// Build filesystem writers for an uploaded document. Uploads never use
/// object storage.
pub fn init_upload_writers(
    upload: UploadedDocument,
    output_path: &Path,
    output_image_path: &Path,
) -> Result<StorageHandles, DocParseError> {
    let extension = extension_of(&upload.filename);
    let writer = FileBasedDataWriter::new(output_path);
    let image_writer = FileBasedDataWriter::new(output_image_path);
    create_dir(output_image_path)?;

    Ok(StorageHandles {
        writer: Arc::new(writer),
        image_writer: Arc::new(image_writer),
        file_bytes: upload.bytes,
        extension,
    })
}

fn create_dir(path: &Path) -> Result<(), DocParseError> {
    std::fs::create_dir_all(path)
        .map_err(|e| DocParseError::io(format!("Failed to create '{}'", path.display()), e))
}

#[cfg(feature = "s3")]
fn init_s3_writers(
    file_path: &str,
    output_path: &str,
    output_image_path: &str,
    buckets: &BucketConfig,
    extension: String,
) -> Result<StorageHandles, DocParseError> {
    let (bucket, _key) = parse_s3_path(file_path)?;
    let creds = buckets.credentials(&bucket)?;
    info!("Using object storage: bucket={} endpoint={}", bucket, creds.endpoint);

    let writer = s3::S3DataWriter::new(output_path, &bucket, creds)?;
    let image_writer = s3::S3DataWriter::new(output_image_path, &bucket, creds)?;
    let file_bytes = s3::S3DataReader::new("", &bucket, creds)?.read(file_path)?;

    Ok(StorageHandles {
        writer: Arc::new(writer),
        image_writer: Arc::new(image_writer),
        file_bytes,
        extension,
    })
}

#[cfg(not(feature = "s3"))]
fn init_s3_writers(
    file_path: &str,
    _output_path: &str,
    _output_image_path: &str,
    _buckets: &BucketConfig,
    _extension: String,
) -> Result<StorageHandles, DocParseError> {
    info!("Rejecting object-storage path without s3 support: {}", file_path);
    Err(DocParseError::Storage {
        path: file_path.to_string(),
        detail: "object storage support not compiled in (enable the `s3` feature)".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_s3_path() {
        assert!(is_s3_path("s3://bucket/doc.pdf"));
        assert!(!is_s3_path("/tmp/doc.pdf"));
        assert!(!is_s3_path("S3:/bucket"));
        assert!(!is_s3_path(""));
    }

    #[test]
    fn test_parse_s3_path() {
        assert_eq!(
            parse_s3_path("s3://bucket/a/b.pdf").unwrap(),
            ("bucket".to_string(), "a/b.pdf".to_string())
        );
        assert_eq!(
            parse_s3_path("s3://bucket").unwrap(),
            ("bucket".to_string(), String::new())
        );
        assert!(parse_s3_path("s3:///key").is_err());
        assert!(parse_s3_path("/local").is_err());
    }

    #[test]
    fn local_path_reads_bytes_and_creates_image_dir() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("Report.PDF");
        std::fs::write(&input, b"%PDF-1.7 test").unwrap();
        let out = dir.path().join("output/Report");
        let images = out.join("images");

        let handles = init_writers(
            input.to_str().unwrap(),
            out.to_str().unwrap(),
            images.to_str().unwrap(),
            &BucketConfig::default(),
        )
        .unwrap();

        assert_eq!(handles.file_bytes, b"%PDF-1.7 test");
        assert_eq!(handles.extension, "pdf");
        assert!(images.is_dir());
    }

    #[test]
    fn missing_local_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = init_writers(
            dir.path().join("nope.pdf").to_str().unwrap(),
            dir.path().join("o").to_str().unwrap(),
            dir.path().join("o/images").to_str().unwrap(),
            &BucketConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DocParseError::Io { .. }));
    }

    #[test]
    fn upload_uses_buffer_and_filename_extension() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("out/scan/images");
        let handles = init_upload_writers(
            UploadedDocument::new("scan.JPG", vec![1, 2, 3]),
            &dir.path().join("out/scan"),
            &images,
        )
        .unwrap();

        assert_eq!(handles.file_bytes, vec![1, 2, 3]);
        assert_eq!(handles.extension, "jpg");
        assert!(images.is_dir());
    }

    #[test]
    fn s3_path_without_credentials_fails() {
        let err = init_writers(
            "s3://nobucket/doc.pdf",
            "output/doc",
            "output/doc/images",
            &BucketConfig::default(),
        )
        .unwrap_err();
        #[cfg(feature = "s3")]
        assert!(matches!(err, DocParseError::BucketNotConfigured { .. }));
        #[cfg(not(feature = "s3"))]
        assert!(matches!(err, DocParseError::Storage { .. }));
    }
}
