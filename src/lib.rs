//! # Page Preprocess
//!
//! Quality-adaptive image preprocessing for OCR. A page photo is normalized
//! to a working resolution, graded High, Medium or Low, and then enhanced,
//! binarized, repaired and denoised only as far as its grade requires.

pub mod config;
pub mod errors;
pub mod observability;
pub mod observability_config;
pub mod ocr_hints;
pub mod preprocessing;
pub mod preprocessing_config;

// Re-export types for easier access
pub use errors::{AppError, AppResult};
pub use ocr_hints::{OcrHints, PageSegMode};
pub use preprocessing::{
    preprocess, ImagePreprocessor, PreprocessedImage, PreprocessingError, QualityTier,
};
pub use preprocessing_config::PreprocessingConfig;
