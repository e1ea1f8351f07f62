//! Image encoding: extracted image bytes → `data:<mime>;base64,…` URIs.
//!
//! The MIME type is sniffed from the bytes, not taken from the file
//! extension: engines write `.jpg` names for whatever they cropped, and a
//! mislabelled PNG would render as a broken image in most viewers.

use crate::error::DocParseError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Fallback when the format cannot be recognised.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// Extension of the images the engine extracts.
const EXTRACTED_IMAGE_EXT: &str = "jpg";

/// MIME type from magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or(UNKNOWN_MIME)
}

/// Build a data URI for `bytes`.
pub fn image_data_uri(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", sniff_mime(bytes), STANDARD.encode(bytes))
}

/// Map every `*.jpg` file in `dir` (non-recursive) to its data URI, keyed
/// by file name. A missing directory yields an empty map.
pub fn collect_image_data_uris(dir: &Path) -> Result<BTreeMap<String, String>, DocParseError> {
    let mut uris = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(uris);
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| DocParseError::io(format!("Failed to list '{}'", dir.display()), e))?;
    for entry in entries {
        let path = entry
            .map_err(|e| DocParseError::io(format!("Failed to list '{}'", dir.display()), e))?
            .path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(EXTRACTED_IMAGE_EXT) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let bytes = std::fs::read(&path)
            .map_err(|e| DocParseError::io(format!("Failed to read '{}'", path.display()), e))?;
        uris.insert(name.to_string(), image_data_uri(&bytes));
    }

    debug!("Encoded {} images from {}", uris.len(), dir.display());
    Ok(uris)
}
