//! PDF page slicer: every page → `parts_per_page` horizontal bands.
//!
//! Pages are rendered at 1:1 scale (one pixel per PDF point) and cut into
//! bands top to bottom. Bands are written as `img_<n>.png`, where `n` is a
//! counter that starts at 1 and keeps increasing across pages, so sorting the
//! files by `n` gives page-then-band reading order.
//!
//! Every band is at least one pixel tall. A page shorter than
//! `parts_per_page` pixels cannot be cut that finely, and the whole document
//! is rejected with [`DocParseError::InvalidConfig`] before any file is written.

use crate::error::DocParseError;
use crate::pipeline::render::PageRenderer;
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Prefix of slice file names.
pub const SLICE_PREFIX: &str = "img_";
/// Extension of slice file names.
pub const SLICE_EXT: &str = "png";

/// One band of one page, as written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSlice {
    /// 0-based page index.
    pub page_index: usize,
    /// 0-based band index within the page.
    pub band_index: usize,
    /// The `n` in `img_<n>.png` (1-based, global across pages).
    pub ordinal: usize,
    pub path: PathBuf,
}

/// `img_<n>.png`
pub fn slice_file_name(ordinal: usize) -> String {
    format!("{SLICE_PREFIX}{ordinal}.{SLICE_EXT}")
}

/// Pixel rows `[top, bottom)` of each of `parts` bands of a page `height` tall.
///
/// The bands tile the page exactly; their heights differ by at most one.
pub fn band_bounds(height: u32, parts: u32) -> Vec<(u32, u32)> {
    let (h, k) = (u64::from(height), u64::from(parts));
    (0..k)
        .map(|i| ((i * h / k) as u32, ((i + 1) * h / k) as u32))
        .collect()
}

/// Cut already-rendered pages into bands and save them under `image_dir`.
///
/// Fails without writing anything when `parts_per_page` is 0 or any page is
/// shorter than `parts_per_page` pixels.
pub fn slice_pages(
    pages: &[DynamicImage],
    image_dir: &Path,
    parts_per_page: u32,
) -> Result<Vec<ImageSlice>, DocParseError> {
    if parts_per_page == 0 {
        return Err(DocParseError::InvalidConfig(
            "parts_per_page must be at least 1".into(),
        ));
    }
    if let Some((index, short)) = pages
        .iter()
        .enumerate()
        .find(|(_, page)| page.height() < parts_per_page)
    {
        return Err(DocParseError::InvalidConfig(format!(
            "page {} is {} px tall, too short for {} bands",
            index + 1,
            short.height(),
            parts_per_page
        )));
    }
    std::fs::create_dir_all(image_dir)
        .map_err(|e| DocParseError::io(format!("Failed to create '{}'", image_dir.display()), e))?;

    let mut slices = Vec::with_capacity(pages.len() * parts_per_page as usize);
    let mut ordinal = 0usize;

    for (page_index, page) in pages.iter().enumerate() {
        for (band_index, (top, bottom)) in band_bounds(page.height(), parts_per_page)
            .into_iter()
            .enumerate()
        {
            ordinal += 1;
            let path = image_dir.join(slice_file_name(ordinal));
            page.crop_imm(0, top, page.width(), bottom - top)
                .save_with_format(&path, ImageFormat::Png)
                .map_err(|e| DocParseError::Internal(format!("Failed to save '{}': {}", path.display(), e)))?;
            debug!(
                "Page {} band {} → {}",
                page_index + 1,
                band_index + 1,
                path.display()
            );
            slices.push(ImageSlice {
                page_index,
                band_index,
                ordinal,
                path,
            });
        }
    }
    Ok(slices)
}

/// Render `pdf` and slice every page into `image_dir`.
pub fn slice_pdf(
    renderer: &dyn PageRenderer,
    pdf: &Path,
    image_dir: &Path,
    parts_per_page: u32,
) -> Result<Vec<ImageSlice>, DocParseError> {
    let pages = renderer.render_pages(pdf)?;
    let slices = slice_pages(&pages, image_dir, parts_per_page)?;
    info!(
        "Sliced {} pages of {} into {} images",
        pages.len(),
        pdf.display(),
        slices.len()
    );
    Ok(slices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn page(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([255, 255, 255])))
    }

    struct FixedRenderer(Vec<DynamicImage>);

    impl PageRenderer for FixedRenderer {
        fn render_pages(&self, _pdf: &Path) -> Result<Vec<DynamicImage>, DocParseError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn bands_tile_exactly() {
        assert_eq!(band_bounds(800, 4), vec![(0, 200), (200, 400), (400, 600), (600, 800)]);
        let b = band_bounds(842, 4);
        assert_eq!(b.first().unwrap().0, 0);
        assert_eq!(b.last().unwrap().1, 842);
        for w in b.windows(2) {
            assert_eq!(w[0].1, w[1].0);
        }
        let heights: Vec<u32> = b.iter().map(|(t, bt)| bt - t).collect();
        assert!(heights.iter().max().unwrap() - heights.iter().min().unwrap() <= 1);
    }

    #[test]
    fn single_band_is_whole_page() {
        assert_eq!(band_bounds(595, 1), vec![(0, 595)]);
    }

    #[test]
    fn counter_continues_across_pages() {
        let dir = tempfile::tempdir().unwrap();
        let slices = slice_pages(&[page(10, 40), page(10, 40)], dir.path(), 4).unwrap();

        assert_eq!(slices.len(), 8);
        let ordinals: Vec<usize> = slices.iter().map(|s| s.ordinal).collect();
        assert_eq!(ordinals, (1..=8).collect::<Vec<_>>());
        assert_eq!((slices[4].page_index, slices[4].band_index), (1, 0));
        assert_eq!(slices[7].path.file_name().unwrap(), "img_8.png");
    }

    #[test]
    fn band_images_have_expected_size() {
        let dir = tempfile::tempdir().unwrap();
        let slices = slice_pages(&[page(30, 100)], dir.path(), 4).unwrap();
        for s in &slices {
            let img = image::open(&s.path).unwrap();
            assert_eq!((img.width(), img.height()), (30, 25));
        }
    }

    #[test]
    fn zero_parts_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = slice_pdf(&FixedRenderer(vec![page(10, 10)]), Path::new("x.pdf"), dir.path(), 0).unwrap_err();
        assert!(matches!(err, DocParseError::InvalidConfig(_)));
    }

    #[test]
    fn page_exactly_parts_tall_gets_one_pixel_bands() {
        let dir = tempfile::tempdir().unwrap();
        let slices = slice_pages(&[page(5, 3)], dir.path(), 3).unwrap();
        assert_eq!(slices.len(), 3);
        for s in &slices {
            assert_eq!(image::open(&s.path).unwrap().height(), 1);
        }
    }

    #[test]
    fn short_page_rejects_document_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let img_dir = dir.path().join("imgs");
        let err = slice_pages(&[page(10, 40), page(10, 3)], &img_dir, 4).unwrap_err();
        match err {
            DocParseError::InvalidConfig(msg) => assert!(msg.contains("page 2 is 3 px tall"), "{msg}"),
            other => panic!("expected InvalidConfig, got {other}"),
        }
        assert!(!img_dir.exists());
    }

    #[test]
    fn slice_pdf_uses_renderer_pages() {
        let dir = tempfile::tempdir().unwrap();
        let img_dir = dir.path().join("imgs");
        let slices = slice_pdf(&FixedRenderer(vec![page(8, 8); 3]), Path::new("x.pdf"), &img_dir, 2).unwrap();
        assert_eq!(slices.len(), 6);
        assert!(img_dir.join("img_6.png").is_file());
    }
}
