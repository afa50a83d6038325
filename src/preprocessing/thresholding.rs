//! # Image Thresholding Module
//!
//! This module provides binary thresholding functionality for OCR preprocessing.
//! It includes Otsu's method for a global threshold and Sauvola's method for a
//! local threshold driven by integral images. Both binarize their input in place:
//! intensities above the threshold become white, everything else black.

use image::GrayImage;
use imageproc::integral_image::{integral_image, integral_squared_image};
use tracing;

use super::buffer::{checked_area, ensure_buffer_fits, BLACK, WHITE};
use super::types::{PreprocessingError, QualityTier, ThresholdMethod, ThresholdedImageResult};
use crate::preprocessing_config::{MemoryConfig, SauvolaConfig};

/// Binarization method for a quality tier; `None` means the stage is skipped.
pub fn threshold_method(tier: QualityTier) -> Option<ThresholdMethod> {
    match tier {
        QualityTier::High => None,
        QualityTier::Medium => Some(ThresholdMethod::Otsu),
        QualityTier::Low => Some(ThresholdMethod::Sauvola),
    }
}

/// Applies Otsu's thresholding algorithm to convert an image to binary (black/white).
///
/// The threshold maximizes the between-class variance of the global histogram.
///
/// # Arguments
///
/// * `image` - Grayscale image, binarized in place
///
/// # Returns
///
/// Returns a `ThresholdedImageResult` carrying the chosen threshold
///
/// # Examples
///
/// ```
/// use image::{GrayImage, Luma};
/// use page_preprocess::preprocessing::apply_otsu_threshold;
///
/// let img = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 5 { 25 } else { 225 }]));
/// let thresholded = apply_otsu_threshold(img).unwrap();
/// assert_eq!(thresholded.image.get_pixel(0, 0)[0], 0);
/// assert_eq!(thresholded.image.get_pixel(9, 0)[0], 255);
/// ```
pub fn apply_otsu_threshold(
    mut image: GrayImage,
) -> Result<ThresholdedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    let (width, height) = image.dimensions();
    checked_area(width, height)?;

    // Calculate histogram
    let mut histogram = [0u64; 256];
    for &sample in image.iter() {
        histogram[sample as usize] += 1;
    }

    let optimal_threshold = find_otsu_threshold(&histogram);

    for sample in image.iter_mut() {
        *sample = if *sample > optimal_threshold { WHITE } else { BLACK };
    }

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Otsu thresholding completed in {}ms: threshold={}, dimensions={}x{}",
        processing_time.as_millis(),
        optimal_threshold,
        width,
        height
    );

    Ok(ThresholdedImageResult {
        image,
        method: ThresholdMethod::Otsu,
        threshold: Some(optimal_threshold),
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Finds the optimal threshold using Otsu's method by maximizing between-class variance.
///
/// Candidates `t` in `0..255` are scanned upwards with running background
/// (`<= t`) and foreground (`> t`) counts and sums. Only a strictly greater
/// variance replaces the current choice, so ties resolve to the lowest `t`.
/// A histogram with a single occupied bin yields 0.
pub fn find_otsu_threshold(histogram: &[u64; 256]) -> u8 {
    let total: u64 = histogram.iter().sum();
    let total_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(value, &count)| value as f64 * count as f64)
        .sum();

    let mut background_count = 0u64;
    let mut background_sum = 0f64;
    let mut max_variance = 0f64;
    let mut optimal_threshold = 0u8;

    for threshold in 0..255usize {
        background_count += histogram[threshold];
        background_sum += threshold as f64 * histogram[threshold] as f64;

        if background_count == 0 {
            continue;
        }
        let foreground_count = total - background_count;
        if foreground_count == 0 {
            break;
        }

        let w_b = background_count as f64;
        let w_f = foreground_count as f64;
        let mean_b = background_sum / w_b;
        let mean_f = (total_sum - background_sum) / w_f;

        let variance = w_b * w_f * (mean_b - mean_f).powi(2);
        if variance > max_variance {
            max_variance = variance;
            optimal_threshold = threshold as u8;
        }
    }

    optimal_threshold
}

/// Applies Sauvola local thresholding.
///
/// For every pixel the mean `m` and standard deviation `s` of the
/// `window_size` square around it (clamped at the image border) are read from
/// integral images of intensities and squared intensities, and the pixel is
/// compared against `T = m * (1 + k * (s / R - 1))`.
///
/// # Arguments
///
/// * `image` - Grayscale image, binarized in place
/// * `config` - Window size, `k` and dynamic range `R`
/// * `memory` - Limit applied to each of the two `u64` integral tables
///
/// # Returns
///
/// Returns a `ThresholdedImageResult` with no global threshold.
///
/// # Errors
///
/// Returns `PreprocessingError::InvalidInput` for a zero-area image and
/// `PreprocessingError::AllocationFailure` when an integral table would
/// exceed the memory limit.
pub fn apply_sauvola_threshold(
    mut image: GrayImage,
    config: &SauvolaConfig,
    memory: &MemoryConfig,
) -> Result<ThresholdedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    let (width, height) = image.dimensions();
    checked_area(width, height)?;

    // (width + 1) x (height + 1) tables with a zero first row and column
    ensure_buffer_fits(
        width.saturating_add(1),
        height.saturating_add(1),
        std::mem::size_of::<u64>(),
        memory,
    )?;
    let sums = integral_image::<_, u64>(&image);
    let squares = integral_squared_image::<_, u64>(&image);
    let window = IntegralWindow {
        sums: sums.as_raw(),
        squares: squares.as_raw(),
        stride: width as usize + 1,
    };

    let half = config.half_window();
    let row_len = width as usize;
    let samples: &mut [u8] = &mut image;
    for y in 0..height {
        let top = y.saturating_sub(half);
        let bottom = (y + half).min(height - 1);
        for x in 0..width {
            let left = x.saturating_sub(half);
            let right = (x + half).min(width - 1);

            let (mean, std_dev) = window.mean_std_dev(left, top, right, bottom);
            let threshold = sauvola_threshold(mean, std_dev, config);

            let idx = y as usize * row_len + x as usize;
            let sample = &mut samples[idx];
            *sample = if *sample as f64 > threshold { WHITE } else { BLACK };
        }
    }

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Sauvola thresholding completed in {}ms: window={}, k={}, r={}, dimensions={}x{}",
        processing_time.as_millis(),
        config.window_size,
        config.k,
        config.dynamic_range,
        width,
        height
    );

    Ok(ThresholdedImageResult {
        image,
        method: ThresholdMethod::Sauvola,
        threshold: None,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Local threshold `m * (1 + k * (s / R - 1))`.
pub fn sauvola_threshold(mean: f64, std_dev: f64, config: &SauvolaConfig) -> f64 {
    mean * (1.0 + config.k * (std_dev / config.dynamic_range - 1.0))
}

/// O(1) windowed statistics over a pair of summed-area tables.
struct IntegralWindow<'a> {
    sums: &'a [u64],
    squares: &'a [u64],
    stride: usize,
}

impl IntegralWindow<'_> {
    /// Mean and standard deviation over the inclusive rectangle.
    fn mean_std_dev(&self, left: u32, top: u32, right: u32, bottom: u32) -> (f64, f64) {
        let area = ((right - left + 1) as u64 * (bottom - top + 1) as u64) as f64;
        let sum = self.rect_sum(self.sums, left, top, right, bottom) as f64;
        let sum_sq = self.rect_sum(self.squares, left, top, right, bottom) as f64;

        let mean = sum / area;
        let variance = sum_sq / area - mean * mean;
        (mean, variance.max(0.0).sqrt())
    }

    fn rect_sum(&self, table: &[u64], left: u32, top: u32, right: u32, bottom: u32) -> u64 {
        let (x0, y0) = (left as usize, top as usize);
        let (x1, y1) = (right as usize + 1, bottom as usize + 1);

        let at = |x: usize, y: usize| table[y * self.stride + x];
        (at(x1, y1) + at(x0, y0)) - (at(x0, y1) + at(x1, y0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::buffer::is_binary;
    use image::Luma;

    fn histogram_of(image: &GrayImage) -> [u64; 256] {
        let mut histogram = [0u64; 256];
        for pixel in image.pixels() {
            histogram[pixel[0] as usize] += 1;
        }
        histogram
    }

    /// Background of `light` with dark vertical strokes 3 px wide every 10 px.
    fn striped_half(width: u32, height: u32, light: u8, ink: u8) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| {
            if x % 10 >= 4 && x % 10 < 7 {
                Luma([ink])
            } else {
                Luma([light])
            }
        })
    }

    #[test]
    fn test_threshold_method_table() {
        assert_eq!(threshold_method(QualityTier::High), None);
        assert_eq!(threshold_method(QualityTier::Medium), Some(ThresholdMethod::Otsu));
        assert_eq!(threshold_method(QualityTier::Low), Some(ThresholdMethod::Sauvola));
    }

    #[test]
    fn test_apply_otsu_threshold_simple_image() {
        let img = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 5 { 25 } else { 225 }]));
        let result = apply_otsu_threshold(img)
            .expect("apply_otsu_threshold should succeed with valid grayscale image");

        let threshold = result.threshold.expect("Otsu reports its threshold");
        assert!((25..225).contains(&threshold));
        assert!(is_binary(&result.image));
        assert_eq!(result.image.get_pixel(0, 0)[0], BLACK);
        assert_eq!(result.image.get_pixel(9, 9)[0], WHITE);
    }

    #[test]
    fn test_find_otsu_threshold_between_spread_peaks() {
        let mut histogram = [0u64; 256];
        for offset in 0..5 {
            histogram[38 + offset] = 1000;
            histogram[198 + offset] = 1000;
        }

        let threshold = find_otsu_threshold(&histogram);
        assert!(threshold > 40 && threshold < 200, "threshold {}", threshold);
    }

    #[test]
    fn test_find_otsu_threshold_ties_resolve_to_lowest() {
        // Every t in 25..225 separates the spikes equally well
        let mut histogram = [0u64; 256];
        histogram[25] = 5000;
        histogram[225] = 5000;

        assert_eq!(find_otsu_threshold(&histogram), 25);
    }

    #[test]
    fn test_find_otsu_threshold_single_class() {
        let mut histogram = [0u64; 256];
        histogram[128] = 100;
        assert_eq!(find_otsu_threshold(&histogram), 0);

        let mut histogram = [0u64; 256];
        histogram[255] = 100;
        assert_eq!(find_otsu_threshold(&histogram), 0);
    }

    #[test]
    fn test_sauvola_threshold_formula() {
        let config = SauvolaConfig::default();
        // s == R leaves the mean unchanged
        assert!((sauvola_threshold(150.0, 128.0, &config) - 150.0).abs() < 1e-9);
        // flat regions are cut at 80% of the mean
        assert!((sauvola_threshold(150.0, 0.0, &config) - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_integral_window_matches_direct_sum() {
        let img = GrayImage::from_fn(9, 7, |x, y| Luma([(x * 17 + y * 31) as u8]));
        let sums = integral_image::<_, u64>(&img);
        let squares = integral_squared_image::<_, u64>(&img);
        let window = IntegralWindow {
            sums: sums.as_raw(),
            squares: squares.as_raw(),
            stride: 10,
        };

        let (left, top, right, bottom) = (2u32, 1u32, 6u32, 4u32);
        let mut values = Vec::new();
        for y in top..=bottom {
            for x in left..=right {
                values.push(img.get_pixel(x, y)[0] as f64);
            }
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

        let (got_mean, got_std) = window.mean_std_dev(left, top, right, bottom);
        assert!((got_mean - mean).abs() < 1e-9);
        assert!((got_std - variance.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_sauvola_flat_image_is_white() {
        let img = GrayImage::from_pixel(40, 30, Luma([90]));
        let result =
            apply_sauvola_threshold(img, &SauvolaConfig::default(), &MemoryConfig::default())
                .expect("apply_sauvola_threshold should succeed with valid image");

        assert_eq!(result.method, ThresholdMethod::Sauvola);
        assert_eq!(result.threshold, None);
        assert!(result.image.pixels().all(|p| p[0] == WHITE));
    }

    #[test]
    fn test_sauvola_refuses_tables_over_memory_limit() {
        let memory = MemoryConfig { max_buffer_mb: 1 };

        // 301 x 301 u64 entries fit in 1MB
        let small = GrayImage::from_pixel(300, 300, Luma([90]));
        assert!(apply_sauvola_threshold(small, &SauvolaConfig::default(), &memory).is_ok());

        // 401 x 401 u64 entries do not
        let large = GrayImage::from_pixel(400, 400, Luma([90]));
        let result = apply_sauvola_threshold(large, &SauvolaConfig::default(), &memory);
        assert!(matches!(
            result,
            Err(PreprocessingError::AllocationFailure {
                width: 401,
                height: 401
            })
        ));
    }

    #[test]
    fn test_sauvola_handles_uneven_illumination_where_otsu_fails() {
        // Left half lit at 200, right half shadowed at 80; same strokes in both.
        // Ink is 0.45 of the local illumination.
        let (width, height) = (200u32, 60u32);
        let left = striped_half(width / 2, height, 200, 90);
        let right = striped_half(width / 2, height, 80, 36);
        let mut img = GrayImage::new(width, height);
        for y in 0..height {
            for x in 0..width / 2 {
                img.put_pixel(x, y, *left.get_pixel(x, y));
                img.put_pixel(x + width / 2, y, *right.get_pixel(x, y));
            }
        }
        let is_ink = |x: u32| x % 10 >= 4 && x % 10 < 7;

        let sauvola = apply_sauvola_threshold(
            img.clone(),
            &SauvolaConfig::default(),
            &MemoryConfig::default(),
        )
        .expect("apply_sauvola_threshold should succeed with valid image")
        .image;
        for y in 10..height - 10 {
            for x in 10..width - 10 {
                // Skip the columns next to the illumination step
                if (95..105).contains(&x) {
                    continue;
                }
                let expected = if is_ink(x % (width / 2)) { BLACK } else { WHITE };
                assert_eq!(sauvola.get_pixel(x, y)[0], expected, "pixel ({}, {})", x, y);
            }
        }

        // The global threshold only separates the lit paper from everything
        // else, so the shadowed paper merges with its ink.
        let otsu = apply_otsu_threshold(img)
            .expect("apply_otsu_threshold should succeed with valid image");
        let threshold = otsu.threshold.expect("Otsu reports its threshold");
        assert!((80..200).contains(&threshold), "threshold {}", threshold);
        let right_paper = otsu.image.get_pixel(width / 2 + 20, 30)[0];
        let right_ink = otsu.image.get_pixel(width / 2 + 25, 30)[0];
        assert_eq!(right_paper, BLACK);
        assert_eq!(right_paper, right_ink, "Otsu should lose the shadowed text");
    }
}
