//! # Geometric Normalization Module
//!
//! Brings an arbitrary decoded raster into the bounded working resolution and
//! collapses it to a single intensity channel.

use image::{imageops::FilterType, DynamicImage, GenericImageView, GrayImage};
use tracing;

use super::buffer::{checked_area, ensure_buffer_fits};
use super::types::{PreprocessingError, ScaledImageResult};
use crate::preprocessing_config::{MemoryConfig, ScalingConfig};

/// Bytes per sample of the resampler's intermediate RGBA `f32` image.
const RESAMPLE_BYTES_PER_SAMPLE: usize = 16;

/// Resizes images into the working resolution band.
#[derive(Debug, Clone, Default)]
pub struct ImageScaler {
    config: ScalingConfig,
    memory: MemoryConfig,
}

impl ImageScaler {
    /// Creates a new ImageScaler with the default 800-2048 band.
    ///
    /// # Examples
    ///
    /// ```
    /// use page_preprocess::preprocessing::ImageScaler;
    ///
    /// let scaler = ImageScaler::new();
    /// assert_eq!(scaler.target_dimensions(4000, 3000), (2048, 1536));
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scaler with custom bounds.
    pub fn with_config(config: ScalingConfig) -> Self {
        Self {
            config,
            memory: MemoryConfig::default(),
        }
    }

    /// Replaces the memory limit applied to the normalised buffers.
    pub fn with_memory_limit(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    /// Returns the configured bounds.
    pub fn config(&self) -> &ScalingConfig {
        &self.config
    }

    /// Computes the working dimensions for an input of the given size.
    ///
    /// Images whose sides both lie within `[min_dimension, max_dimension]`
    /// keep their size. Otherwise the image is scaled uniformly: an oversized
    /// image is shrunk so its larger side equals `max_dimension`, else an
    /// undersized one is enlarged so its smaller side equals `min_dimension`.
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = self.scale_factor(width, height);
        if scale == 1.0 {
            return (width, height);
        }

        let long = width.max(height);
        let short = width.min(height);
        let (new_long, new_short) = if long > self.config.max_dimension {
            (self.config.max_dimension, scale_side(short, scale))
        } else {
            (scale_side(long, scale), self.config.min_dimension)
        };

        if width >= height {
            (new_long, new_short)
        } else {
            (new_short, new_long)
        }
    }

    /// Uniform scale factor the normaliser will apply.
    pub fn scale_factor(&self, width: u32, height: u32) -> f64 {
        let long = width.max(height);
        let short = width.min(height);

        if long > self.config.max_dimension {
            self.config.max_dimension as f64 / long as f64
        } else if short < self.config.min_dimension {
            self.config.min_dimension as f64 / short as f64
        } else {
            1.0
        }
    }

    /// Resizes the image into the working band and converts it to grayscale.
    ///
    /// The input is consumed; its color buffer is released as soon as the
    /// grayscale copy exists.
    ///
    /// # Arguments
    ///
    /// * `image` - Decoded input in any color layout
    ///
    /// # Returns
    ///
    /// Returns a `ScaledImageResult` holding the grayscale working image and
    /// the scale that produced it.
    ///
    /// # Errors
    ///
    /// Returns `PreprocessingError::InvalidInput` for a zero-area image and
    /// `PreprocessingError::AllocationFailure` when the grayscale copy, the
    /// resampler's intermediate image or the resized output would exceed the
    /// memory limit. An extreme aspect ratio can enlarge a small input into
    /// such an image.
    pub fn normalize(&self, image: DynamicImage) -> Result<ScaledImageResult, PreprocessingError> {
        let start_time = std::time::Instant::now();

        let (width, height) = image.dimensions();
        checked_area(width, height)?;

        let (new_width, new_height) = self.target_dimensions(width, height);
        let resize = (new_width, new_height) != (width, height);

        ensure_buffer_fits(width, height, 1, &self.memory)?;
        if resize {
            ensure_buffer_fits(new_width, new_height, 1, &self.memory)?;
            // The vertical pass keeps the source width at the target height
            ensure_buffer_fits(width, new_height, RESAMPLE_BYTES_PER_SAMPLE, &self.memory)?;
        }

        // Luminance first so the resampler works on one channel
        let gray = image.into_luma8();
        let normalized = if resize {
            resize_gray(&gray, new_width, new_height)
        } else {
            gray
        };

        let processing_time = start_time.elapsed();

        tracing::debug!(
            target: "ocr_preprocessing",
            "Normalization completed in {}ms: {}x{} -> {}x{}",
            processing_time.as_millis(),
            width,
            height,
            new_width,
            new_height
        );

        Ok(ScaledImageResult {
            image: normalized,
            original_dimensions: (width, height),
            new_dimensions: (new_width, new_height),
            scale_factor: self.scale_factor(width, height) as f32,
            processing_time_ms: processing_time.as_millis() as u32,
        })
    }
}

fn scale_side(side: u32, scale: f64) -> u32 {
    ((side as f64 * scale).round() as u32).max(1)
}

fn resize_gray(image: &GrayImage, width: u32, height: u32) -> GrayImage {
    // Catmull-Rom keeps stroke edges sharper than bilinear
    image::imageops::resize(image, width, height, FilterType::CatmullRom)
}
