//! # Contrast Enhancement Module
//!
//! Two strategies with different cost/quality profiles: a linear stretch about
//! mid-gray for images that are already legible, and tiled contrast-limited
//! histogram equalization (CLAHE) for poor images. Both rewrite their input
//! buffer in place.

use image::GrayImage;
use tracing;

use super::buffer::checked_area;
use super::types::{ContrastImageResult, ContrastStrategy, PreprocessingError, QualityTier};
use crate::preprocessing_config::ContrastConfig;

/// Picks the contrast strategy for a quality tier.
pub fn contrast_strategy(tier: QualityTier, config: &ContrastConfig) -> ContrastStrategy {
    match tier {
        QualityTier::High => ContrastStrategy::LinearStretch {
            factor: config.high_factor,
        },
        QualityTier::Medium => ContrastStrategy::LinearStretch {
            factor: config.medium_factor,
        },
        QualityTier::Low => ContrastStrategy::Clahe {
            clip_limit: config.clahe_clip_limit,
            grid: config.clahe_grid_size,
        },
    }
}

/// Enhances contrast with the strategy the tier calls for.
///
/// # Arguments
///
/// * `image` - Grayscale working image, consumed
/// * `tier` - Quality tier selecting stretch or CLAHE
/// * `config` - Stretch factors and CLAHE parameters
///
/// # Returns
///
/// Returns a `ContrastImageResult` recording the strategy used
///
/// # Errors
///
/// Returns `PreprocessingError::InvalidInput` for a zero-area image.
pub fn enhance_contrast(
    image: GrayImage,
    tier: QualityTier,
    config: &ContrastConfig,
) -> Result<ContrastImageResult, PreprocessingError> {
    apply_contrast_strategy(image, contrast_strategy(tier, config))
}

/// Applies an explicit contrast strategy.
pub fn apply_contrast_strategy(
    mut image: GrayImage,
    strategy: ContrastStrategy,
) -> Result<ContrastImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    let (width, height) = image.dimensions();
    checked_area(width, height)?;

    match strategy {
        ContrastStrategy::LinearStretch { factor } => stretch_contrast(&mut image, factor),
        ContrastStrategy::Clahe { clip_limit, grid } => {
            if clip_limit <= 0.0 || grid == 0 {
                return Err(PreprocessingError::InvalidInput {
                    message: format!(
                        "invalid CLAHE parameters: clip_limit={}, grid={}",
                        clip_limit, grid
                    ),
                });
            }
            apply_clahe(&mut image, clip_limit, grid)
        }
    }

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Contrast enhancement completed in {}ms: strategy={:?}, dimensions={}x{}",
        processing_time.as_millis(),
        strategy,
        width,
        height
    );

    Ok(ContrastImageResult {
        image,
        strategy,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Scales contrast about mid-gray: `clamp(p * c + (0.5 - 0.5 * c) * 255, 0, 255)`.
pub fn stretch_contrast(image: &mut GrayImage, factor: f32) {
    let translate = (-0.5 * factor + 0.5) * 255.0;

    let mut lut = [0u8; 256];
    for (value, slot) in lut.iter_mut().enumerate() {
        *slot = (value as f32 * factor + translate).round().clamp(0.0, 255.0) as u8;
    }

    for sample in image.iter_mut() {
        *sample = lut[*sample as usize];
    }
}

/// Applies tiled CLAHE over a `grid` x `grid` partition of the image.
///
/// Tiles are equalized independently with no blending between neighbours,
/// so seams may appear at tile borders.
///
/// # Arguments
///
/// * `image` - Grayscale image, equalized in place
/// * `clip_limit` - Histogram clip as a multiple of the mean bin height
/// * `grid` - Tiles per axis; empty tiles of a small image are skipped
pub fn apply_clahe(image: &mut GrayImage, clip_limit: f32, grid: u32) {
    let (width, height) = image.dimensions();

    for tile_y in 0..grid {
        let start_y = tile_bound(tile_y, grid, height);
        let end_y = tile_bound(tile_y + 1, grid, height);
        for tile_x in 0..grid {
            let start_x = tile_bound(tile_x, grid, width);
            let end_x = tile_bound(tile_x + 1, grid, width);
            if start_x == end_x || start_y == end_y {
                continue;
            }

            equalize_tile(image, (start_x, start_y, end_x, end_y), clip_limit);
        }
    }
}

/// Start coordinate of tile `index` when `length` pixels are split into `grid` tiles.
fn tile_bound(index: u32, grid: u32, length: u32) -> u32 {
    (index as u64 * length as u64 / grid as u64) as u32
}

/// Equalizes one tile in place.
fn equalize_tile(image: &mut GrayImage, (start_x, start_y, end_x, end_y): (u32, u32, u32, u32), clip_limit: f32) {
    let mut histogram = [0u32; 256];
    for y in start_y..end_y {
        for x in start_x..end_x {
            histogram[image.get_pixel(x, y)[0] as usize] += 1;
        }
    }

    let tile_pixels = ((end_x - start_x) * (end_y - start_y)) as f64;
    let lut = clahe_mapping(&histogram, tile_pixels, clip_limit as f64);

    for y in start_y..end_y {
        for x in start_x..end_x {
            let pixel = image.get_pixel_mut(x, y);
            pixel[0] = lut[pixel[0] as usize];
        }
    }
}

/// Builds the intensity mapping of one tile from its histogram.
///
/// Bins are clipped at `clip_limit * tile_pixels / 256`, the clipped excess is
/// spread evenly over all 256 bins, and intensities are remapped through the
/// resulting CDF: `round((cdf[g] - cdf_min) * 255 / (tile_pixels - cdf_min))`.
fn clahe_mapping(histogram: &[u32; 256], tile_pixels: f64, clip_limit: f64) -> [u8; 256] {
    let clip = clip_limit * tile_pixels / 256.0;

    let mut clipped = [0f64; 256];
    let mut excess = 0f64;
    for (bin, &count) in clipped.iter_mut().zip(histogram.iter()) {
        let count = count as f64;
        if count > clip {
            excess += count - clip;
            *bin = clip;
        } else {
            *bin = count;
        }
    }

    let increment = excess / 256.0;
    let mut cdf = [0f64; 256];
    let mut cumulative = 0f64;
    for (slot, bin) in cdf.iter_mut().zip(clipped.iter()) {
        cumulative += bin + increment;
        *slot = cumulative;
    }

    let cdf_min = cdf.iter().copied().find(|&value| value > 0.0).unwrap_or(0.0);
    let denominator = tile_pixels - cdf_min;

    let mut lut = [0u8; 256];
    for (value, slot) in lut.iter_mut().enumerate() {
        *slot = if denominator > 0.0 {
            ((cdf[value] - cdf_min) * 255.0 / denominator)
                .round()
                .clamp(0.0, 255.0) as u8
        } else {
            value as u8
        };
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_contrast_strategy_table() {
        let config = ContrastConfig::default();
        assert_eq!(
            contrast_strategy(QualityTier::High, &config),
            ContrastStrategy::LinearStretch { factor: 1.1 }
        );
        assert_eq!(
            contrast_strategy(QualityTier::Medium, &config),
            ContrastStrategy::LinearStretch { factor: 1.3 }
        );
        assert_eq!(
            contrast_strategy(QualityTier::Low, &config),
            ContrastStrategy::Clahe {
                clip_limit: 2.0,
                grid: 8
            }
        );
    }

    #[test]
    fn test_stretch_contrast_preserves_mid_gray() {
        let mut img = GrayImage::from_fn(3, 1, |x, _| Luma([[100, 128, 200][x as usize]]));
        stretch_contrast(&mut img, 1.3);

        // 100 * 1.3 - 38.25 = 91.75, 200 * 1.3 - 38.25 = 221.75
        assert_eq!(img.get_pixel(0, 0)[0], 92);
        assert_eq!(img.get_pixel(1, 0)[0], 128);
        assert_eq!(img.get_pixel(2, 0)[0], 222);
    }

    #[test]
    fn test_stretch_contrast_clamps() {
        let mut img = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 5 } else { 252 }]));
        stretch_contrast(&mut img, 1.3);

        assert_eq!(img.get_pixel(0, 0)[0], 0);
        assert_eq!(img.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn test_clahe_uniform_tile_is_near_identity() {
        for gray in [40u8, 128, 200] {
            let mut img = GrayImage::from_pixel(64, 64, Luma([gray]));
            apply_clahe(&mut img, 2.0, 8);

            for pixel in img.pixels() {
                let diff = (pixel[0] as i32 - gray as i32).abs();
                assert!(diff <= 2, "gray {} mapped to {}", gray, pixel[0]);
            }
        }
    }

    #[test]
    fn test_clahe_stretches_low_contrast_tile() {
        // Values 100-106 spread over a single tile
        let mut img = GrayImage::from_fn(16, 16, |x, y| Luma([100 + ((x + y) % 7) as u8]));
        apply_clahe(&mut img, 2.0, 1);

        let min = img.pixels().map(|p| p[0]).min().unwrap_or(0);
        let max = img.pixels().map(|p| p[0]).max().unwrap_or(0);
        assert!(max - min > 6, "range {}..{} was not expanded", min, max);
    }

    #[test]
    fn test_clahe_tiles_are_independent() {
        // Left half dark, right half bright; with a 2x2 grid each tile is flat
        let mut img = GrayImage::from_fn(32, 32, |x, _| Luma([if x < 16 { 60 } else { 190 }]));
        apply_clahe(&mut img, 2.0, 2);

        assert!((img.get_pixel(0, 0)[0] as i32 - 60).abs() <= 2);
        assert!((img.get_pixel(31, 31)[0] as i32 - 190).abs() <= 2);
    }

    #[test]
    fn test_clahe_handles_image_smaller_than_grid() {
        let mut img = GrayImage::from_fn(5, 3, |x, y| Luma([(x * 40 + y * 10) as u8]));
        apply_clahe(&mut img, 2.0, 8);
        assert_eq!(img.dimensions(), (5, 3));
    }

    #[test]
    fn test_tile_bounds_cover_image() {
        assert_eq!(tile_bound(0, 8, 1000), 0);
        assert_eq!(tile_bound(8, 8, 1000), 1000);
        assert_eq!(tile_bound(3, 8, 1001), 375);
    }

    #[test]
    fn test_enhance_contrast_keeps_dimensions() {
        let img = GrayImage::from_fn(120, 90, |x, _| Luma([(x * 2) as u8]));
        for tier in [QualityTier::High, QualityTier::Medium, QualityTier::Low] {
            let result = enhance_contrast(img.clone(), tier, &ContrastConfig::default())
                .expect("enhance_contrast should succeed with valid image");
            assert_eq!(result.image.dimensions(), (120, 90));
        }
    }

    #[test]
    fn test_apply_contrast_strategy_rejects_bad_clahe_parameters() {
        let img = GrayImage::new(10, 10);
        let result = apply_contrast_strategy(
            img,
            ContrastStrategy::Clahe {
                clip_limit: 0.0,
                grid: 8,
            },
        );
        assert!(result.is_err());
    }
}
