//! OCR collaborator for pages without embedded text.
//!
//! [`OcrBackend`] is the seam: rasterize a page to an image, read text from
//! the image, and estimate how busy the image is. [`CommandOcr`] implements
//! it with `pdftoppm` (poppler) and `tesseract`, and measures complexity
//! in-process with [`count_regions`]. Rasters are binarized with
//! [`adaptive_threshold`] before tesseract reads them.

use anyhow::{bail, Context, Result};
use image::{GrayImage, Luma};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::OcrConfig;
use crate::models::PdfPage;

/// A rasterized page on disk. The file is scratch output and may be left
/// behind after extraction.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub path: PathBuf,
}

pub trait OcrBackend: Send + Sync {
    fn rasterize(&self, document: &Path, page: &PdfPage) -> Result<RasterImage>;

    fn ocr(&self, image: &RasterImage) -> Result<String>;

    /// Number of distinct shapes found in the image.
    fn detect_shape_complexity(&self, image: &RasterImage) -> Result<usize>;
}

/// Coarse content type of an image-only page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    GraphChart,
    Diagram,
    Picture,
}

/// Region counts at or above this are treated as charts.
pub const GRAPH_MIN_REGIONS: usize = 200;
/// Region counts at or above this (and below the chart threshold) are diagrams.
pub const DIAGRAM_MIN_REGIONS: usize = 40;

impl ImageKind {
    pub fn from_complexity(regions: usize) -> Self {
        if regions >= GRAPH_MIN_REGIONS {
            ImageKind::GraphChart
        } else if regions >= DIAGRAM_MIN_REGIONS {
            ImageKind::Diagram
        } else {
            ImageKind::Picture
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImageKind::GraphChart => "Graph/Chart",
            ImageKind::Diagram => "Diagram",
            ImageKind::Picture => "Picture",
        }
    }
}

/// Connected dark regions smaller than this are treated as noise.
const MIN_REGION_PIXELS: usize = 4;

/// Counts 4-connected dark regions after thresholding at the mean luminance.
pub fn count_regions(img: &GrayImage) -> usize {
    let (w, h) = img.dimensions();
    let (w, h) = (w as usize, h as usize);
    if w == 0 || h == 0 {
        return 0;
    }

    let raw = img.as_raw();
    let mean = raw.iter().map(|&p| p as u64).sum::<u64>() / raw.len() as u64;
    let dark: Vec<bool> = raw.iter().map(|&p| (p as u64) < mean).collect();

    let mut seen = vec![false; w * h];
    let mut stack = Vec::new();
    let mut regions = 0;

    for start in 0..w * h {
        if !dark[start] || seen[start] {
            continue;
        }
        seen[start] = true;
        stack.push(start);
        let mut size = 0usize;

        while let Some(i) = stack.pop() {
            size += 1;
            let (x, y) = (i % w, i / w);
            let mut visit = |j: usize| {
                if dark[j] && !seen[j] {
                    seen[j] = true;
                    stack.push(j);
                }
            };
            if x > 0 {
                visit(i - 1);
            }
            if x + 1 < w {
                visit(i + 1);
            }
            if y > 0 {
                visit(i - w);
            }
            if y + 1 < h {
                visit(i + w);
            }
        }

        if size >= MIN_REGION_PIXELS {
            regions += 1;
        }
    }

    regions
}

/// Side of the square neighbourhood used by [`adaptive_threshold`].
pub const THRESHOLD_BLOCK: u32 = 15;
/// Offset subtracted from the neighbourhood mean.
pub const THRESHOLD_OFFSET: i64 = 10;

/// Local-mean binarization: a pixel turns white when it is brighter than the
/// mean of its `block`-sized neighbourhood minus `offset`, black otherwise.
/// Windows are clipped at the image border.
pub fn adaptive_threshold(img: &GrayImage, block: u32, offset: i64) -> GrayImage {
    let (w, h) = img.dimensions();
    let (wu, hu) = (w as usize, h as usize);
    let radius = (block / 2) as usize;

    // Summed-area table with a zero row and column in front.
    let mut integral = vec![0u64; (wu + 1) * (hu + 1)];
    for y in 0..hu {
        let mut row = 0u64;
        for x in 0..wu {
            row += img.get_pixel(x as u32, y as u32)[0] as u64;
            integral[(y + 1) * (wu + 1) + x + 1] = integral[y * (wu + 1) + x + 1] + row;
        }
    }

    GrayImage::from_fn(w, h, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let (x0, y0) = (x.saturating_sub(radius), y.saturating_sub(radius));
        let (x1, y1) = ((x + radius + 1).min(wu), (y + radius + 1).min(hu));
        let sum = integral[y1 * (wu + 1) + x1] + integral[y0 * (wu + 1) + x0]
            - integral[y0 * (wu + 1) + x1]
            - integral[y1 * (wu + 1) + x0];
        let mean = (sum / ((x1 - x0) * (y1 - y0)) as u64) as i64;
        let value = img.get_pixel(x as u32, y as u32)[0] as i64;
        Luma([if value > mean - offset { 255 } else { 0 }])
    })
}

/// `images/page_3.png` -> `images/page_3_processed.png`.
pub fn processed_path(raster: &Path) -> PathBuf {
    let stem = raster
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    raster.with_file_name(format!("{}_processed.png", stem))
}

/// OCR through external `pdftoppm` and `tesseract` executables.
pub struct CommandOcr {
    pdftoppm: String,
    tesseract: String,
    dpi: u32,
    scratch_dir: PathBuf,
}

impl CommandOcr {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            pdftoppm: config.pdftoppm.clone(),
            tesseract: config.tesseract.clone(),
            dpi: config.dpi,
            scratch_dir: config.scratch_dir.clone(),
        }
    }
}

impl OcrBackend for CommandOcr {
    fn rasterize(&self, document: &Path, page: &PdfPage) -> Result<RasterImage> {
        std::fs::create_dir_all(&self.scratch_dir).with_context(|| {
            format!("Failed to create scratch dir {}", self.scratch_dir.display())
        })?;

        let stem = self.scratch_dir.join(format!("page_{}", page.index));
        let number = page.number().to_string();
        let output = Command::new(&self.pdftoppm)
            .arg("-r")
            .arg(self.dpi.to_string())
            .args(["-f", &number, "-l", &number, "-png", "-singlefile"])
            .arg(document)
            .arg(&stem)
            .output()
            .with_context(|| format!("Failed to run {}", self.pdftoppm))?;

        if !output.status.success() {
            bail!(
                "{} failed: {}",
                self.pdftoppm,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(RasterImage {
            path: stem.with_extension("png"),
        })
    }

    fn ocr(&self, image: &RasterImage) -> Result<String> {
        let gray = image::open(&image.path)
            .with_context(|| format!("Failed to decode {}", image.path.display()))?
            .to_luma8();
        let processed = processed_path(&image.path);
        adaptive_threshold(&gray, THRESHOLD_BLOCK, THRESHOLD_OFFSET)
            .save(&processed)
            .with_context(|| format!("Failed to write {}", processed.display()))?;

        let output = Command::new(&self.tesseract)
            .arg(&processed)
            .arg("stdout")
            .output()
            .with_context(|| format!("Failed to run {}", self.tesseract))?;

        if !output.status.success() {
            bail!(
                "{} failed: {}",
                self.tesseract,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn detect_shape_complexity(&self, image: &RasterImage) -> Result<usize> {
        let img = image::open(&image.path)
            .with_context(|| format!("Failed to decode {}", image.path.display()))?;
        Ok(count_regions(&img.to_luma8()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas(w: u32, h: u32) -> GrayImage {
        GrayImage::from_pixel(w, h, Luma([255u8]))
    }

    fn fill(img: &mut GrayImage, x0: u32, y0: u32, side: u32) {
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                img.put_pixel(x, y, Luma([0u8]));
            }
        }
    }

    #[test]
    fn blank_image_has_no_regions() {
        assert_eq!(count_regions(&canvas(20, 20)), 0);
    }

    #[test]
    fn separate_squares_are_counted() {
        let mut img = canvas(40, 40);
        fill(&mut img, 2, 2, 4);
        fill(&mut img, 20, 2, 4);
        fill(&mut img, 2, 20, 4);
        assert_eq!(count_regions(&img), 3);
    }

    #[test]
    fn specks_below_minimum_are_ignored() {
        let mut img = canvas(20, 20);
        fill(&mut img, 2, 2, 4);
        img.put_pixel(15, 15, Luma([0u8]));
        assert_eq!(count_regions(&img), 1);
    }

    #[test]
    fn classification_thresholds() {
        assert_eq!(ImageKind::from_complexity(0), ImageKind::Picture);
        assert_eq!(ImageKind::from_complexity(39), ImageKind::Picture);
        assert_eq!(ImageKind::from_complexity(40), ImageKind::Diagram);
        assert_eq!(ImageKind::from_complexity(250), ImageKind::GraphChart);
        assert_eq!(ImageKind::GraphChart.label(), "Graph/Chart");
    }

    #[test]
    fn threshold_keeps_background_white() {
        let out = adaptive_threshold(&GrayImage::from_pixel(20, 20, Luma([180u8])), 15, 10);
        assert!(out.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn threshold_blackens_ink_on_uneven_paper() {
        // Left half lit, right half shaded; a stroke sits on each side.
        let mut img = GrayImage::from_fn(40, 20, |x, _| Luma([if x < 20 { 230 } else { 120 }]));
        fill(&mut img, 5, 8, 3);
        for y in 8..11 {
            for x in 30..33 {
                img.put_pixel(x, y, Luma([40u8]));
            }
        }

        let out = adaptive_threshold(&img, 15, 10);
        assert_eq!(out.get_pixel(6, 9)[0], 0);
        assert_eq!(out.get_pixel(31, 9)[0], 0);
        assert_eq!(out.get_pixel(2, 2)[0], 255);
        assert_eq!(out.get_pixel(36, 2)[0], 255);
    }

    #[test]
    fn processed_image_sits_next_to_raster() {
        assert_eq!(
            processed_path(Path::new("images/page_3.png")),
            PathBuf::from("images/page_3_processed.png")
        );
    }

    #[test]
    fn ocr_reads_the_binarized_image() {
        let dir = tempfile::TempDir::new().unwrap();
        let raster = dir.path().join("page_0.png");
        let mut img = canvas(30, 30);
        fill(&mut img, 10, 10, 5);
        img.save(&raster).unwrap();

        let ocr = CommandOcr::new(&OcrConfig {
            tesseract: "definitely-not-a-real-tesseract".into(),
            scratch_dir: dir.path().to_path_buf(),
            ..OcrConfig::default()
        });
        assert!(ocr.ocr(&RasterImage { path: raster }).is_err());

        let processed = image::open(dir.path().join("page_0_processed.png"))
            .unwrap()
            .to_luma8();
        assert_eq!(processed.get_pixel(12, 12)[0], 0);
        assert_eq!(processed.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn missing_executable_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let ocr = CommandOcr::new(&OcrConfig {
            pdftoppm: "definitely-not-a-real-pdftoppm".into(),
            scratch_dir: dir.path().join("images"),
            ..OcrConfig::default()
        });
        let page = PdfPage {
            index: 0,
            native_text: String::new(),
        };
        assert!(ocr.rasterize(Path::new("x.pdf"), &page).is_err());
        assert!(dir.path().join("images").is_dir());
    }
}
