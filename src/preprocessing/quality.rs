//! # Image Quality Assessment Module
//!
//! This module provides image quality assessment functionality for adaptive preprocessing.
//! It samples a centred square of the grayscale image and derives contrast, noise,
//! brightness and edge statistics to pick a quality tier.

use image::GrayImage;
use tracing;

use super::buffer::checked_area;
use super::types::{ImageQualityResult, PreprocessingError, QualityMetrics, QualityTier};
use crate::preprocessing_config::QualityConfig;

/// Assesses the quality of a grayscale image to determine the preprocessing strategy.
///
/// The sample region is a centred square of side `min(sample_size, min(width, height) / 2)`.
/// When that side falls below `min_sample_size` there is not enough signal and the
/// image is classified `Medium` without sampling.
///
/// # Arguments
///
/// * `image` - Normalised grayscale image
/// * `config` - Sample size, edge threshold and tier thresholds
///
/// # Returns
///
/// Returns an `ImageQualityResult` with the tier and the metrics behind it
///
/// # Examples
///
/// ```
/// use image::{GrayImage, Luma};
/// use page_preprocess::preprocessing::{assess_image_quality, QualityTier};
/// use page_preprocess::preprocessing_config::QualityConfig;
///
/// let flat = GrayImage::from_pixel(400, 400, Luma([128]));
/// let result = assess_image_quality(&flat, &QualityConfig::default()).unwrap();
/// assert_eq!(result.quality, QualityTier::Low);
/// ```
///
/// # Errors
///
/// Returns `PreprocessingError::InvalidInput` for a zero-area image.
pub fn assess_image_quality(
    image: &GrayImage,
    config: &QualityConfig,
) -> Result<ImageQualityResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    let (width, height) = image.dimensions();
    checked_area(width, height)?;

    let metrics = calculate_quality_metrics(image, config);
    let quality = match &metrics {
        Some(metrics) => classify_image_quality(metrics, config),
        None => QualityTier::Medium,
    };

    let processing_time = start_time.elapsed();

    match &metrics {
        Some(m) => tracing::debug!(
            target: "ocr_preprocessing",
            "Quality assessment completed in {}ms: quality={:?}, contrast={:.3}, noise={:.3}, brightness={:.1}, std_dev={:.1}, edges={:.3}",
            processing_time.as_millis(),
            quality,
            m.contrast_ratio,
            m.noise_level,
            m.mean_brightness,
            m.brightness_std_dev,
            m.edge_density
        ),
        None => tracing::debug!(
            target: "ocr_preprocessing",
            "Quality assessment skipped for {}x{} image: sample region too small, assuming {:?}",
            width,
            height,
            quality
        ),
    }

    Ok(ImageQualityResult {
        quality,
        metrics,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Samples the centred square and computes its statistics.
///
/// Returns `None` when the sample side is below `min_sample_size`.
pub fn calculate_quality_metrics(image: &GrayImage, config: &QualityConfig) -> Option<QualityMetrics> {
    let (width, height) = image.dimensions();
    let side = config.sample_size.min(width.min(height) / 2);
    if side < config.min_sample_size {
        return None;
    }

    let start_x = (width - side) / 2;
    let start_y = (height - side) / 2;

    let mut min_value = u8::MAX;
    let mut max_value = u8::MIN;
    let mut sum = 0u64;
    let mut sum_sq = 0u64;
    let mut delta_sum = 0u64;
    let mut edge_count = 0u64;

    for y in start_y..start_y + side {
        let mut previous: Option<u8> = None;
        for x in start_x..start_x + side {
            let value = image.get_pixel(x, y)[0];
            min_value = min_value.min(value);
            max_value = max_value.max(value);
            sum += value as u64;
            sum_sq += (value as u64) * (value as u64);

            // Deltas only between horizontal neighbours of the same row
            if let Some(prev) = previous {
                let delta = value.abs_diff(prev);
                delta_sum += delta as u64;
                if delta > config.edge_threshold {
                    edge_count += 1;
                }
            }
            previous = Some(value);
        }
    }

    let pixel_count = (side as u64 * side as u64) as f64;
    let mean = sum as f64 / pixel_count;
    let variance = (sum_sq as f64 / pixel_count - mean * mean).max(0.0);

    Some(QualityMetrics {
        contrast_ratio: (max_value - min_value) as f64 / 255.0,
        noise_level: delta_sum as f64 / (pixel_count * 255.0),
        mean_brightness: mean,
        brightness_std_dev: variance.sqrt(),
        edge_density: edge_count as f64 / pixel_count,
        sample_size: side,
    })
}

/// Classifies image quality from sampled metrics.
///
/// Rules are evaluated in order and the first match wins:
/// 1. High: contrast ≥ 0.7, noise ≤ 0.1 and brightness within [50, 220]
/// 2. Medium: contrast ≥ 0.4 and noise ≤ 0.25
/// 3. Low: everything else
///
/// # Arguments
///
/// * `metrics` - Statistics from `calculate_quality_metrics`
/// * `config` - Tier thresholds
///
/// # Returns
///
/// Returns the first matching `QualityTier`
pub fn classify_image_quality(metrics: &QualityMetrics, config: &QualityConfig) -> QualityTier {
    let brightness_ok = metrics.mean_brightness >= config.high_min_brightness
        && metrics.mean_brightness <= config.high_max_brightness;

    if metrics.contrast_ratio >= config.high_min_contrast
        && metrics.noise_level <= config.high_max_noise
        && brightness_ok
    {
        QualityTier::High
    } else if metrics.contrast_ratio >= config.medium_min_contrast
        && metrics.noise_level <= config.medium_max_noise
    {
        QualityTier::Medium
    } else {
        QualityTier::Low
    }
}
