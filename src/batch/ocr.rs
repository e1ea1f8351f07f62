//! OCR engines for the batch job.
//!
//! [`OcrEngine::recognize`] takes `&mut self`: an engine is built once by
//! the caller, handed to the assembler, and used for one image at a time.
//! Two backends ship:
//!
//! - [`TesseractEngine`] wraps the `tesseract` CLI and groups its TSV word
//!   output into lines (always available)
//! - `PaddleEngine` runs PaddleOCR ONNX models through `oar-ocr`
//!   (feature `paddle`)

use crate::error::DocParseError;
use crate::pipeline::external::run_tool;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// One recognised text line.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrLine {
    pub text: String,
    /// 0.0 – 1.0
    pub confidence: f32,
}

pub trait OcrEngine {
    /// Recognise the lines of text in an image file, top to bottom.
    fn recognize(&mut self, image: &Path) -> Result<Vec<OcrLine>, DocParseError>;
}

// ── Tesseract ────────────────────────────────────────────────────────────

/// Default Tesseract language: simplified Chinese plus English.
pub const DEFAULT_TESSERACT_LANG: &str = "chi_sim+eng";

/// Settings for [`TesseractEngine`].
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    pub binary: String,
    pub lang: String,
    pub tessdata_dir: Option<PathBuf>,
    /// Let Tesseract detect and correct rotated text (`--psm 1`) instead of
    /// assuming a single upright block (`--psm 3`).
    pub detect_orientation: bool,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            lang: DEFAULT_TESSERACT_LANG.to_string(),
            tessdata_dir: None,
            detect_orientation: true,
        }
    }
}

pub struct TesseractEngine {
    config: TesseractConfig,
}

impl TesseractEngine {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    fn psm(&self) -> &'static str {
        if self.config.detect_orientation {
            "1"
        } else {
            "3"
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&mut self, image: &Path) -> Result<Vec<OcrLine>, DocParseError> {
        let mut cmd = Command::new(&self.config.binary);
        cmd.arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.lang)
            .arg("--psm")
            .arg(self.psm())
            .arg("tsv");
        if let Some(dir) = &self.config.tessdata_dir {
            cmd.arg("--tessdata-dir").arg(dir);
        }

        let output = run_tool(cmd, &self.config.binary).map_err(|e| DocParseError::Ocr {
            path: image.to_path_buf(),
            detail: e.to_string(),
        })?;
        let lines = parse_tsv_lines(&String::from_utf8_lossy(&output.stdout));
        debug!("{}: {} lines", image.display(), lines.len());
        Ok(lines)
    }
}

/// Group Tesseract TSV word rows (level 5) into lines.
///
/// Columns: `level page block par line word left top width height conf text`.
/// Words sharing `(page, block, par, line)` form one line, in output order.
/// Line confidence is the mean word confidence scaled to 0–1.
pub fn parse_tsv_lines(tsv: &str) -> Vec<OcrLine> {
    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current: Option<(LineKey, Vec<String>, Vec<f32>)> = None;

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let text = cols[11].trim();
        let conf: f32 = cols[10].trim().parse().unwrap_or(-1.0);
        if text.is_empty() || conf < 0.0 {
            continue;
        }
        let key = LineKey::from_cols(&cols);

        let same_line = matches!(&current, Some((k, _, _)) if *k == key);
        if same_line {
            if let Some((_, words, confs)) = current.as_mut() {
                words.push(text.to_string());
                confs.push(conf);
            }
        } else {
            if let Some((_, words, confs)) = current.take() {
                lines.push(finish_line(words, confs));
            }
            current = Some((key, vec![text.to_string()], vec![conf]));
        }
    }
    if let Some((_, words, confs)) = current {
        lines.push(finish_line(words, confs));
    }
    lines
}

#[derive(Debug, PartialEq, Eq)]
struct LineKey([String; 4]);

impl LineKey {
    fn from_cols(cols: &[&str]) -> Self {
        LineKey([
            cols[1].to_string(),
            cols[2].to_string(),
            cols[3].to_string(),
            cols[4].to_string(),
        ])
    }
}

fn finish_line(words: Vec<String>, confs: Vec<f32>) -> OcrLine {
    let mut text = String::new();
    for word in &words {
        let needs_space = match (text.chars().last(), word.chars().next()) {
            (Some(prev), Some(next)) => !is_cjk(prev) && !is_cjk(next),
            _ => false,
        };
        if needs_space {
            text.push(' ');
        }
        text.push_str(word);
    }
    let confidence = confs.iter().sum::<f32>() / confs.len().max(1) as f32 / 100.0;
    OcrLine { text, confidence }
}

/// CJK ideographs, kana, hangul and full-width punctuation are written
/// without spaces between words.
fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3000..=0x303F   // CJK symbols and punctuation
        | 0x3040..=0x30FF // kana
        | 0x3400..=0x4DBF // extension A
        | 0x4E00..=0x9FFF // unified ideographs
        | 0xAC00..=0xD7AF // hangul
        | 0xF900..=0xFAFF // compatibility ideographs
        | 0xFF00..=0xFFEF // full-width forms
    )
}

// ── PaddleOCR via oar-ocr ────────────────────────────────────────────────

#[cfg(feature = "paddle")]
pub use paddle::{PaddleConfig, PaddleEngine};

#[cfg(feature = "paddle")]
mod paddle {
    use super::{OcrEngine, OcrLine};
    use crate::error::DocParseError;
    use oar_ocr::oarocr::{OAROCRBuilder, OAROCR};
    use std::path::{Path, PathBuf};
    use tracing::info;

    /// Model files for [`PaddleEngine`].
    #[derive(Debug, Clone)]
    pub struct PaddleConfig {
        pub det_model: PathBuf,
        pub rec_model: PathBuf,
        pub dict: PathBuf,
        /// Text-line orientation classifier; enables angle classification.
        pub cls_model: Option<PathBuf>,
    }

    pub struct PaddleEngine {
        ocr: OAROCR,
    }

    impl PaddleEngine {
        pub fn new(config: &PaddleConfig) -> Result<Self, DocParseError> {
            let mut builder = OAROCRBuilder::new(&config.det_model, &config.rec_model, &config.dict);
            if let Some(cls) = &config.cls_model {
                builder = builder.with_text_line_orientation_classification(cls);
            }
            let ocr = builder
                .build()
                .map_err(|e| DocParseError::InvalidConfig(format!("PaddleOCR models: {e}")))?;
            info!("PaddleOCR pipeline ready ({})", config.rec_model.display());
            Ok(Self { ocr })
        }
    }

    impl OcrEngine for PaddleEngine {
        fn recognize(&mut self, path: &Path) -> Result<Vec<OcrLine>, DocParseError> {
            let ocr_err = |detail: String| DocParseError::Ocr {
                path: path.to_path_buf(),
                detail,
            };
            let img = image::open(path)
                .map_err(|e| ocr_err(e.to_string()))?
                .to_rgb8();
            let results = self
                .ocr
                .predict(vec![img])
                .map_err(|e| ocr_err(e.to_string()))?;

            Ok(results
                .iter()
                .flat_map(|r| r.text_regions.iter())
                .filter_map(|region| {
                    region.text.as_ref().map(|t| OcrLine {
                        text: t.to_string(),
                        confidence: region.confidence.unwrap_or(0.0),
                    })
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn row(level: u8, line: u8, word: u8, conf: &str, text: &str) -> String {
        format!("{level}\t1\t1\t1\t{line}\t{word}\t0\t0\t10\t10\t{conf}\t{text}")
    }

    fn tsv(rows: &[String]) -> String {
        std::iter::once(HEADER.to_string())
            .chain(rows.iter().cloned())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn words_grouped_into_lines() {
        let out = tsv(&[
            row(4, 1, 0, "-1", ""),
            row(5, 1, 1, "90", "Hello"),
            row(5, 1, 2, "80", "world"),
            row(4, 2, 0, "-1", ""),
            row(5, 2, 1, "70", "Next"),
        ]);
        let lines = parse_tsv_lines(&out);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Hello world");
        assert!((lines[0].confidence - 0.85).abs() < 1e-6);
        assert_eq!(lines[1].text, "Next");
    }

    #[test]
    fn cjk_words_join_without_spaces() {
        let out = tsv(&[
            row(5, 1, 1, "95", "中文"),
            row(5, 1, 2, "95", "识别"),
            row(5, 1, 3, "95", "OCR"),
            row(5, 1, 4, "95", "engine"),
        ]);
        assert_eq!(parse_tsv_lines(&out)[0].text, "中文识别OCR engine");
    }

    #[test]
    fn empty_and_unconfident_words_skipped() {
        let out = tsv(&[row(5, 1, 1, "-1", "ghost"), row(5, 1, 2, "50", "  ")]);
        assert!(parse_tsv_lines(&out).is_empty());
    }

    #[test]
    fn header_only_is_empty() {
        assert!(parse_tsv_lines(HEADER).is_empty());
        assert!(parse_tsv_lines("").is_empty());
    }

    #[test]
    fn missing_tesseract_is_ocr_error() {
        let mut engine = TesseractEngine::new(TesseractConfig {
            binary: "no-such-tesseract-binary".into(),
            ..TesseractConfig::default()
        });
        let err = engine.recognize(Path::new("img_1.png")).unwrap_err();
        assert!(matches!(err, DocParseError::Ocr { .. }));
    }
}
