//! OCR-to-document assembly: slice images → recognised lines → `.docx`.

use crate::batch::docx::DocxDocument;
use crate::batch::ocr::OcrEngine;
use crate::batch::slicer::{SLICE_EXT, SLICE_PREFIX};
use crate::error::DocParseError;
use crate::progress::BatchProgressCallback;
use std::path::{Path, PathBuf};
use tracing::debug;

/// OCR each image in order and append every recognised line as a paragraph.
pub fn assemble_document(
    engine: &mut dyn OcrEngine,
    images: &[PathBuf],
    progress: &dyn BatchProgressCallback,
) -> Result<DocxDocument, DocParseError> {
    let mut doc = DocxDocument::new();
    for (i, image) in images.iter().enumerate() {
        let lines = engine.recognize(image)?;
        debug!("{}: {} lines", image.display(), lines.len());
        for line in lines {
            doc.add_paragraph(line.text);
        }
        progress.on_slice_recognised(i + 1, images.len());
    }
    Ok(doc)
}

/// The `n` in `img_<n>.png`.
pub fn slice_ordinal(name: &str) -> Result<usize, DocParseError> {
    name.strip_prefix(SLICE_PREFIX)
        .and_then(|rest| rest.strip_suffix(SLICE_EXT))
        .and_then(|rest| rest.strip_suffix('.'))
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| DocParseError::MalformedSliceName {
            name: name.to_string(),
        })
}

/// Files in `dir` sorted by their slice number (numerically, so `img_10`
/// follows `img_9`). Any other file name is an error.
pub fn sorted_slice_files(dir: &Path) -> Result<Vec<PathBuf>, DocParseError> {
    let list_err = |e: std::io::Error| DocParseError::io(format!("Failed to list '{}'", dir.display()), e);
    let mut numbered = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(list_err)? {
        let path = entry.map_err(list_err)?.path();
        if !path.is_file() {
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        numbered.push((slice_ordinal(&name)?, path));
    }
    numbered.sort_by_key(|(n, _)| *n);
    Ok(numbered.into_iter().map(|(_, p)| p).collect())
}

/// OCR every slice in `dir` and save `<out_dir>/<name>.docx`.
pub fn ocr_directory_to_docx(
    engine: &mut dyn OcrEngine,
    dir: &Path,
    out_dir: &Path,
    name: &str,
    progress: &dyn BatchProgressCallback,
) -> Result<PathBuf, DocParseError> {
    let images = sorted_slice_files(dir)?;
    let doc = assemble_document(engine, &images, progress)?;
    let out = out_dir.join(format!("{name}.docx"));
    doc.save(&out)?;
    Ok(out)
}
