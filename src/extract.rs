//! Per-page text acquisition.
//!
//! Native text wins when the page has any. Otherwise the page is rasterized
//! and OCR'd through an [`OcrBackend`], optionally tagged with the kind of
//! image it looked like. OCR failures never escape: the page contributes an
//! empty string and the document carries on.

use anyhow::Result;
use std::path::Path;

use crate::config::OcrConfig;
use crate::models::PdfPage;
use crate::ocr::{CommandOcr, ImageKind, OcrBackend};

pub struct PageExtractor {
    ocr: Option<Box<dyn OcrBackend>>,
    classify_images: bool,
}

impl PageExtractor {
    pub fn new(ocr: Option<Box<dyn OcrBackend>>, classify_images: bool) -> Self {
        Self {
            ocr,
            classify_images,
        }
    }

    /// Extractor that never falls back to OCR.
    pub fn native_only() -> Self {
        Self::new(None, false)
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        let ocr: Option<Box<dyn OcrBackend>> = if config.enabled {
            Some(Box::new(CommandOcr::new(config)))
        } else {
            None
        };
        Self::new(ocr, config.classify_images)
    }

    /// Text of `page` from `document`; empty when nothing could be read.
    pub fn extract(&self, document: &Path, page: &PdfPage) -> String {
        let native = page.native_text.trim();
        if !native.is_empty() {
            return native.to_string();
        }

        let Some(ocr) = self.ocr.as_deref() else {
            return String::new();
        };

        match self.ocr_page(ocr, document, page) {
            Ok(text) => {
                tracing::debug!(page = page.number(), chars = text.len(), "page read via OCR");
                text
            }
            Err(e) => {
                tracing::warn!(
                    "OCR failed for page {} of {}: {:#}",
                    page.number(),
                    document.display(),
                    e
                );
                String::new()
            }
        }
    }

    fn ocr_page(&self, ocr: &dyn OcrBackend, document: &Path, page: &PdfPage) -> Result<String> {
        let image = ocr.rasterize(document, page)?;
        let text = ocr.ocr(&image)?;
        let text = text.trim();

        if !self.classify_images {
            return Ok(text.to_string());
        }

        match ocr.detect_shape_complexity(&image) {
            Ok(regions) => {
                let kind = ImageKind::from_complexity(regions);
                Ok(format!("[{} on page {}]\n{}", kind.label(), page.number(), text))
            }
            Err(e) => {
                tracing::warn!("image classification failed for page {}: {:#}", page.number(), e);
                Ok(text.to_string())
            }
        }
    }
}
