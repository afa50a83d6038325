//! # OCR Hints
//!
//! Recommendations handed to the downstream OCR engine based on the quality
//! tier reported by preprocessing. Nothing here runs OCR.

use serde::{Deserialize, Serialize};

use crate::preprocessing::QualityTier;

/// Confidence below which a Low-tier page is worth a second, sparse-text pass
pub const SPARSE_RETRY_CONFIDENCE: f32 = 60.0;

/// Page Segmentation Mode, using Tesseract's numbering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSegMode {
    /// Fully automatic page segmentation
    #[default]
    Auto = 3,
    /// Assume a single uniform block of text
    SingleBlock = 6,
    /// Find as much text as possible in no particular order
    SparseText = 11,
}

impl PageSegMode {
    /// Convert PSM mode to the string value Tesseract expects
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSegMode::Auto => "3",
            PageSegMode::SingleBlock => "6",
            PageSegMode::SparseText => "11",
        }
    }
}

/// Engine settings suggested for a preprocessed page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OcrHints {
    /// Tier the hints were derived from
    pub quality: QualityTier,
    /// Segmentation mode for the first pass
    pub page_seg_mode: PageSegMode,
    /// Whether engine-side noise removal is still worth enabling
    pub aggressive_denoise: bool,
    /// Mean confidence below which a Low page is read again
    pub retry_confidence_floor: f32,
}

impl OcrHints {
    /// Suggested settings for a quality tier.
    ///
    /// High pages go through automatic layout analysis. Medium pages are
    /// binarized and read best as one uniform block. Low pages start in
    /// automatic mode and fall back to sparse text on poor confidence.
    pub fn for_tier(quality: QualityTier) -> Self {
        let (page_seg_mode, aggressive_denoise) = match quality {
            QualityTier::High => (PageSegMode::Auto, false),
            QualityTier::Medium => (PageSegMode::SingleBlock, false),
            QualityTier::Low => (PageSegMode::Auto, true),
        };

        Self {
            quality,
            page_seg_mode,
            aggressive_denoise,
            retry_confidence_floor: SPARSE_RETRY_CONFIDENCE,
        }
    }

    /// Whether a first OCR pass with this confidence should be retried in
    /// sparse-text mode. Only Low pages are retried.
    pub fn should_retry_sparse(&self, confidence: f32) -> bool {
        self.quality == QualityTier::Low && confidence < self.retry_confidence_floor
    }

    /// Segmentation mode for the retry pass
    pub fn retry_page_seg_mode(&self) -> PageSegMode {
        PageSegMode::SparseText
    }
}
