//! # Preprocessing Pipeline
//!
//! Sequences the stages: normalize, assess quality, enhance contrast, then
//! binarize, repair and denoise as the quality tier dictates. Each stage takes
//! ownership of the previous stage's buffer, so at most one working image is
//! alive between stages.

use std::path::Path;
use std::time::{Duration, Instant};

use image::{DynamicImage, GrayImage};
use tracing;

use super::contrast::{apply_contrast_strategy, contrast_strategy};
use super::filtering::{apply_closing, apply_median_filter};
use super::quality::assess_image_quality;
use super::scaling::ImageScaler;
use super::thresholding::{apply_otsu_threshold, apply_sauvola_threshold, threshold_method};
use super::types::{
    ContrastStrategy, PreprocessedImage, PreprocessingError, QualityTier, StageKind, StageTiming,
    ThresholdMethod,
};
use crate::errors::{error_logging, AppResult};
use crate::observability;
use crate::preprocessing_config::PreprocessingConfig;

/// Per-tier strategy table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StagePlan {
    pub contrast: ContrastStrategy,
    /// `None` skips binarization entirely
    pub threshold: Option<ThresholdMethod>,
    /// Whether morphological closing runs
    pub repair: bool,
    /// Whether the median filter runs
    pub denoise: bool,
}

impl StagePlan {
    /// Strategy table for a tier:
    ///
    /// | tier   | contrast       | binarize | repair | denoise |
    /// |--------|----------------|----------|--------|---------|
    /// | High   | stretch x1.1   | -        | -      | -       |
    /// | Medium | stretch x1.3   | Otsu     | -      | median  |
    /// | Low    | CLAHE          | Sauvola  | close  | median  |
    pub fn for_tier(tier: QualityTier, config: &PreprocessingConfig) -> Self {
        Self {
            contrast: contrast_strategy(tier, &config.contrast),
            threshold: threshold_method(tier),
            repair: matches!(tier, QualityTier::Low),
            denoise: !matches!(tier, QualityTier::High),
        }
    }
}

/// Quality-adaptive preprocessing pipeline.
#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor {
    config: PreprocessingConfig,
}

impl ImagePreprocessor {
    /// Creates a pipeline with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pipeline with a validated custom configuration.
    pub fn with_config(config: PreprocessingConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    /// Runs the full pipeline on a decoded image.
    ///
    /// The raw image is consumed. Any stage failure aborts the whole run; the
    /// raw image is never returned as a fallback.
    ///
    /// # Arguments
    ///
    /// * `image` - Decoded page in any color layout
    ///
    /// # Returns
    ///
    /// Returns a `PreprocessedImage` with the processed image, its quality
    /// tier and the timing of every stage that ran
    ///
    /// # Examples
    ///
    /// ```
    /// use image::{DynamicImage, GrayImage, Luma};
    /// use page_preprocess::preprocessing::{ImagePreprocessor, StageKind};
    ///
    /// let page = GrayImage::from_fn(1000, 1000, |x, _| Luma([if x % 25 < 6 { 20 } else { 230 }]));
    /// let result = ImagePreprocessor::new()
    ///     .preprocess(DynamicImage::ImageLuma8(page))
    ///     .unwrap();
    /// assert!(result.ran(StageKind::Contrast));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for zero-area images, `AllocationFailure` when a
    /// working buffer exceeds the memory limit or cannot be reserved, and `ProcessingFailed` when a stage
    /// cannot run on the working geometry.
    pub fn preprocess(&self, image: DynamicImage) -> Result<PreprocessedImage, PreprocessingError> {
        let span = observability::preprocessing_span(image.width(), image.height());
        let _guard = span.enter();

        let start_time = Instant::now();
        let original_dimensions = (image.width(), image.height());

        let result = self.run_stages(image, start_time);
        let elapsed = start_time.elapsed();

        match &result {
            Ok(output) => {
                observability::record_pipeline_metrics(Some(output.quality), true, elapsed);
                tracing::info!(
                    quality = %output.quality,
                    original_width = original_dimensions.0,
                    original_height = original_dimensions.1,
                    working_width = output.working_dimensions.0,
                    working_height = output.working_dimensions.1,
                    stages = output.stages.len(),
                    duration_ms = elapsed.as_millis() as u64,
                    "Image preprocessing completed"
                );
            }
            Err(err) => {
                observability::record_pipeline_metrics(None, false, elapsed);
                error_logging::log_preprocessing_error(
                    err,
                    "preprocess",
                    Some(original_dimensions),
                    Some(elapsed),
                );
            }
        }

        result
    }

    /// Runs the pipeline and returns only the image and its tier.
    pub fn preprocess_image(
        &self,
        image: DynamicImage,
    ) -> Result<(GrayImage, QualityTier), PreprocessingError> {
        let output = self.preprocess(image)?;
        Ok((output.image, output.quality))
    }

    /// Decodes an encoded image (PNG, JPEG, ...) and runs the pipeline.
    pub fn preprocess_bytes(&self, bytes: &[u8]) -> Result<PreprocessedImage, PreprocessingError> {
        self.preprocess(decode_image(bytes)?)
    }

    /// Loads an image file and runs the pipeline.
    pub fn preprocess_path(&self, path: &Path) -> Result<PreprocessedImage, PreprocessingError> {
        self.preprocess(load_image(path)?)
    }

    fn run_stages(
        &self,
        image: DynamicImage,
        start_time: Instant,
    ) -> Result<PreprocessedImage, PreprocessingError> {
        let mut stages = Vec::with_capacity(6);

        let scaled = ImageScaler::with_config(self.config.scaling.clone())
            .with_memory_limit(self.config.memory.clone())
            .normalize(image)?;
        record_stage(&mut stages, StageKind::Normalize, scaled.processing_time_ms);
        let original_dimensions = scaled.original_dimensions;
        let working_dimensions = scaled.new_dimensions;
        let working = scaled.image;

        let assessment = assess_image_quality(&working, &self.config.quality)?;
        record_stage(&mut stages, StageKind::QualityEstimate, assessment.processing_time_ms);
        let quality = assessment.quality;

        let plan = StagePlan::for_tier(quality, &self.config);
        tracing::debug!(
            target: "ocr_preprocessing",
            "Selected stage plan for {} quality: {:?}",
            quality,
            plan
        );

        let enhanced = apply_contrast_strategy(working, plan.contrast)?;
        record_stage(&mut stages, StageKind::Contrast, enhanced.processing_time_ms);
        let mut working = enhanced.image;

        let mut threshold = None;
        if let Some(method) = plan.threshold {
            let binarized = match method {
                ThresholdMethod::Otsu => apply_otsu_threshold(working)?,
                ThresholdMethod::Sauvola => apply_sauvola_threshold(
                    working,
                    &self.config.sauvola,
                    &self.config.memory,
                )?,
            };
            record_stage(&mut stages, StageKind::Binarize, binarized.processing_time_ms);
            threshold = binarized.threshold;
            working = binarized.image;
        }

        if plan.repair {
            let repaired = apply_closing(working)?;
            record_stage(&mut stages, StageKind::Repair, repaired.processing_time_ms);
            working = repaired.image;
        }

        if plan.denoise {
            let denoised = apply_median_filter(working)?;
            record_stage(&mut stages, StageKind::Denoise, denoised.processing_time_ms);
            working = denoised.image;
        }

        Ok(PreprocessedImage {
            image: working,
            quality,
            metrics: assessment.metrics,
            threshold,
            original_dimensions,
            working_dimensions,
            stages,
            processing_time_ms: start_time.elapsed().as_millis() as u32,
        })
    }
}

/// Runs the default pipeline, returning the processed image and its tier.
pub fn preprocess(image: DynamicImage) -> Result<(GrayImage, QualityTier), PreprocessingError> {
    ImagePreprocessor::new().preprocess_image(image)
}

/// Decodes an in-memory image, rejecting undecodable data as invalid input.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, PreprocessingError> {
    image::load_from_memory(bytes).map_err(|e| PreprocessingError::InvalidInput {
        message: format!("failed to decode image: {}", e),
    })
}

/// Loads and decodes an image file, rejecting unreadable files as invalid input.
pub fn load_image(path: &Path) -> Result<DynamicImage, PreprocessingError> {
    image::open(path).map_err(|e| PreprocessingError::InvalidInput {
        message: format!("failed to load {}: {}", path.display(), e),
    })
}

fn record_stage(stages: &mut Vec<StageTiming>, stage: StageKind, processing_time_ms: u32) {
    observability::record_stage_metrics(stage, Duration::from_millis(processing_time_ms as u64));
    stages.push(StageTiming {
        stage,
        processing_time_ms,
    });
}
