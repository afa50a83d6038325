//! # Shared Types for Image Preprocessing
//!
//! This module contains all the shared types, structs, and enums used across
//! the preprocessing sub-modules.

use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Errors that can occur during image preprocessing operations.
#[derive(Debug, Clone, PartialEq)]
pub enum PreprocessingError {
    /// The input image has zero area or could not be decoded
    InvalidInput { message: String },
    /// A working buffer could not be reserved
    AllocationFailure { width: u32, height: u32 },
    /// A stage could not execute on the given geometry
    ProcessingFailed { stage: StageKind, message: String },
}

impl std::fmt::Display for PreprocessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreprocessingError::InvalidInput { message } => {
                write!(f, "Invalid input image: {}", message)
            }
            PreprocessingError::AllocationFailure { width, height } => {
                write!(
                    f,
                    "Failed to allocate a {}x{} working buffer",
                    width, height
                )
            }
            PreprocessingError::ProcessingFailed { stage, message } => {
                write!(f, "Preprocessing failed during {}: {}", stage, message)
            }
        }
    }
}

impl std::error::Error for PreprocessingError {}

/// Image quality classifications.
///
/// The tier is computed once per pipeline run and selects the strategy of
/// every later stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityTier {
    /// High quality - contrast stretch only, no binarization
    High,
    /// Medium quality - global thresholding and despeckling
    Medium,
    /// Low quality - full preprocessing pipeline
    Low,
}

impl QualityTier {
    /// Lowercase label used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::High => "high",
            QualityTier::Medium => "medium",
            QualityTier::Low => "low",
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics sampled from the central region of a grayscale image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// (max - min) / 255, in 0.0-1.0
    pub contrast_ratio: f64,
    /// Mean absolute horizontal delta normalised by 255, in 0.0-1.0
    pub noise_level: f64,
    /// Mean intensity, in 0.0-255.0
    pub mean_brightness: f64,
    /// Standard deviation of intensity
    pub brightness_std_dev: f64,
    /// Fraction of sampled pixels sitting on a strong horizontal edge
    pub edge_density: f64,
    /// Side of the square region the statistics were taken from
    pub sample_size: u32,
}

/// Result of image quality assessment.
#[derive(Debug, Clone)]
pub struct ImageQualityResult {
    /// Overall quality classification
    pub quality: QualityTier,
    /// Sampled statistics, `None` when the image was too small to sample
    pub metrics: Option<QualityMetrics>,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of the resize + grayscale normalisation step.
#[derive(Debug, Clone)]
pub struct ScaledImageResult {
    /// The normalised grayscale image
    pub image: GrayImage,
    /// Original image dimensions (width, height)
    pub original_dimensions: (u32, u32),
    /// New image dimensions (width, height)
    pub new_dimensions: (u32, u32),
    /// Scale factor applied (1.0 when passed through)
    pub scale_factor: f32,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Contrast enhancement strategies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ContrastStrategy {
    /// Brightness-preserving linear scale about mid-gray
    LinearStretch { factor: f32 },
    /// Tiled contrast-limited histogram equalization
    Clahe { clip_limit: f32, grid: u32 },
}

/// Result of a contrast enhancement operation.
#[derive(Debug, Clone)]
pub struct ContrastImageResult {
    /// The contrast-enhanced image
    pub image: GrayImage,
    /// Strategy that produced it
    pub strategy: ContrastStrategy,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Binarization methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdMethod {
    /// Global threshold maximising between-class variance
    Otsu,
    /// Local threshold from windowed mean and standard deviation
    Sauvola,
}

/// Result of image thresholding operation.
#[derive(Debug, Clone)]
pub struct ThresholdedImageResult {
    /// The thresholded binary image
    pub image: GrayImage,
    /// Method used
    pub method: ThresholdMethod,
    /// Global threshold, only set for Otsu
    pub threshold: Option<u8>,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of morphological operations on binary images.
#[derive(Debug, Clone)]
pub struct MorphologicalImageResult {
    /// The morphologically processed image
    pub image: GrayImage,
    /// Type of morphological operation applied
    pub operation: MorphologicalOperation,
    /// Kernel size used (e.g., 3 for 3x3 kernel)
    pub kernel_size: u32,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Types of morphological operations. Dark pixels are foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MorphologicalOperation {
    /// Any dark neighbour darkens the centre (grows strokes)
    Dilation,
    /// The centre stays dark only if all neighbours are dark (thins strokes)
    Erosion,
    /// Dilation followed by erosion - fills gaps
    Closing,
}

/// Result of image noise reduction operation.
#[derive(Debug, Clone)]
pub struct DenoisedImageResult {
    /// The denoised image
    pub image: GrayImage,
    /// Median window side
    pub kernel_size: u32,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    /// Resize into the working band and convert to grayscale
    Normalize,
    /// Sample statistics and pick the quality tier
    QualityEstimate,
    /// Linear stretch or CLAHE
    Contrast,
    /// Otsu or Sauvola thresholding
    Binarize,
    /// Morphological closing of broken strokes
    Repair,
    /// 3x3 median speckle removal
    Denoise,
}

impl StageKind {
    /// Snake-case label used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Normalize => "normalize",
            StageKind::QualityEstimate => "quality_estimate",
            StageKind::Contrast => "contrast",
            StageKind::Binarize => "binarize",
            StageKind::Repair => "repair",
            StageKind::Denoise => "denoise",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing of one executed pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    /// Stage that ran
    pub stage: StageKind,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Final output of a preprocessing run.
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    /// Binarized image (contrast-enhanced grayscale for the High tier)
    pub image: GrayImage,
    /// Detected quality tier, consumed by the OCR engine
    pub quality: QualityTier,
    /// Statistics behind the tier decision
    pub metrics: Option<QualityMetrics>,
    /// Global Otsu threshold when the Medium path ran
    pub threshold: Option<u8>,
    /// Dimensions of the raw input
    pub original_dimensions: (u32, u32),
    /// Dimensions after normalisation
    pub working_dimensions: (u32, u32),
    /// Executed stages in order
    pub stages: Vec<StageTiming>,
    /// Total processing time in milliseconds
    pub processing_time_ms: u32,
}

impl PreprocessedImage {
    /// Whether the given stage ran during this invocation.
    pub fn ran(&self, stage: StageKind) -> bool {
        self.stages.iter().any(|timing| timing.stage == stage)
    }

    /// Serializable view without the pixel data.
    pub fn summary(&self) -> PreprocessingSummary {
        PreprocessingSummary {
            quality: self.quality,
            metrics: self.metrics,
            threshold: self.threshold,
            original_dimensions: self.original_dimensions,
            working_dimensions: self.working_dimensions,
            stages: self.stages.clone(),
            processing_time_ms: self.processing_time_ms,
        }
    }
}

/// Pixel-free report of a preprocessing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingSummary {
    /// Detected quality tier
    pub quality: QualityTier,
    /// Statistics behind the tier decision
    pub metrics: Option<QualityMetrics>,
    /// Global Otsu threshold, if one was computed
    pub threshold: Option<u8>,
    /// Dimensions of the raw input
    pub original_dimensions: (u32, u32),
    /// Dimensions after normalisation
    pub working_dimensions: (u32, u32),
    /// Executed stages in order
    pub stages: Vec<StageTiming>,
    /// Total processing time in milliseconds
    pub processing_time_ms: u32,
}
