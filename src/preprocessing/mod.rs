//! # Image Preprocessing Module
//!
//! This module turns a raw page photo into a cleaned grayscale or binary image
//! ready for OCR. The amount of work done is chosen per image from a quick
//! quality estimate.
//!
//! The module is organized into focused sub-modules:
//! - `scaling`: Resolution normalization and grayscale conversion
//! - `quality`: Image quality assessment for adaptive preprocessing
//! - `contrast`: Linear contrast stretch and CLAHE
//! - `thresholding`: Global Otsu and local Sauvola binarization
//! - `filtering`: Morphological closing and median denoising
//! - `pipeline`: Per-tier orchestration of the stages
//! - `buffer`: Fallible buffer allocation helpers
//! - `types`: Shared types and error definitions

pub mod buffer;
pub mod contrast;
pub mod filtering;
pub mod pipeline;
pub mod quality;
pub mod scaling;
pub mod thresholding;
pub mod types;

// Re-export commonly used types and functions for convenience
pub use types::{
    ContrastImageResult, ContrastStrategy, DenoisedImageResult, ImageQualityResult,
    MorphologicalImageResult, MorphologicalOperation, PreprocessedImage, PreprocessingError,
    PreprocessingSummary, QualityMetrics, QualityTier, ScaledImageResult, StageKind, StageTiming,
    ThresholdMethod, ThresholdedImageResult,
};

// Re-export main functions from sub-modules
pub use buffer::is_binary;
pub use contrast::{apply_clahe, apply_contrast_strategy, enhance_contrast, stretch_contrast};
pub use filtering::{apply_closing, apply_median_filter, apply_morphological_operation};
pub use pipeline::{decode_image, load_image, preprocess, ImagePreprocessor, StagePlan};
pub use quality::{assess_image_quality, classify_image_quality};
pub use scaling::ImageScaler;
pub use thresholding::{apply_otsu_threshold, apply_sauvola_threshold, find_otsu_threshold};
