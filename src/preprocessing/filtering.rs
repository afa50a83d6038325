//! # Image Filtering Module
//!
//! This module provides morphological repair and speckle removal for binarized images.
//! It includes a 3x3 closing to reconnect broken strokes and a 3x3 median filter.
//! Dark pixels are treated as foreground. Border rows and columns are copied unchanged
//! by every operation here.

use image::{GrayImage, Luma};
use tracing;

use super::buffer::{allocate_gray, copy_border, require_interior};
use super::types::{
    DenoisedImageResult, MorphologicalImageResult, MorphologicalOperation, PreprocessingError,
    StageKind,
};

/// Applies a morphological operation with a 3x3 structuring element.
///
/// Border pixels are copied unchanged; dark pixels are foreground.
///
/// # Arguments
///
/// * `image` - Binary image, consumed
/// * `operation` - Dilation, erosion or closing
///
/// # Returns
///
/// Returns a `Result` containing the processed image and metadata, or a `PreprocessingError`
///
/// # Examples
///
/// ```
/// use image::{GrayImage, Luma};
/// use page_preprocess::preprocessing::{apply_morphological_operation, MorphologicalOperation};
///
/// // A one-pixel gap between two dark bars is bridged by closing
/// let img = GrayImage::from_fn(9, 5, |x, _| Luma([if x == 4 || x == 0 || x == 8 { 255 } else { 0 }]));
/// let closed = apply_morphological_operation(img, MorphologicalOperation::Closing).unwrap();
/// assert_eq!(closed.image.get_pixel(4, 2)[0], 0);
/// ```
///
/// # Errors
///
/// Returns `PreprocessingError::ProcessingFailed` for images smaller than 3x3.
pub fn apply_morphological_operation(
    image: GrayImage,
    operation: MorphologicalOperation,
) -> Result<MorphologicalImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    require_interior(&image, StageKind::Repair)?;

    let processed = match operation {
        MorphologicalOperation::Dilation => apply_dilation(&image)?,
        MorphologicalOperation::Erosion => apply_erosion(&image)?,
        MorphologicalOperation::Closing => {
            let dilated = apply_dilation(&image)?;
            drop(image);
            apply_erosion(&dilated)?
        }
    };

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Morphological operation completed in {}ms: operation={:?}, dimensions={}x{}",
        processing_time.as_millis(),
        operation,
        processed.width(),
        processed.height()
    );

    Ok(MorphologicalImageResult {
        image: processed,
        operation,
        kernel_size: 3,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Binary closing: dilation followed by erosion.
pub fn apply_closing(image: GrayImage) -> Result<MorphologicalImageResult, PreprocessingError> {
    apply_morphological_operation(image, MorphologicalOperation::Closing)
}

/// Grows dark regions: the centre takes the darkest value of its 3x3 neighbourhood.
fn apply_dilation(image: &GrayImage) -> Result<GrayImage, PreprocessingError> {
    neighbourhood_filter(image, |window| window.iter().copied().min().unwrap_or(0))
}

/// Shrinks dark regions: the centre stays dark only if its whole 3x3
/// neighbourhood is dark.
fn apply_erosion(image: &GrayImage) -> Result<GrayImage, PreprocessingError> {
    neighbourhood_filter(image, |window| window.iter().copied().max().unwrap_or(255))
}

/// Applies a 3x3 median filter to remove isolated speckles.
///
/// # Arguments
///
/// * `image` - Binarized image, consumed
///
/// # Returns
///
/// Returns a `DenoisedImageResult` whose interior pixels hold the median of
/// their neighbourhood. A binary input stays binary.
///
/// # Errors
///
/// Returns `PreprocessingError::ProcessingFailed` for images smaller than 3x3.
pub fn apply_median_filter(image: GrayImage) -> Result<DenoisedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    require_interior(&image, StageKind::Denoise)?;

    let denoised = neighbourhood_filter(&image, |mut window| {
        window.sort_unstable();
        window[4]
    })?;
    drop(image);

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Median filtering completed in {}ms: kernel=3x3, dimensions={}x{}",
        processing_time.as_millis(),
        denoised.width(),
        denoised.height()
    );

    Ok(DenoisedImageResult {
        image: denoised,
        kernel_size: 3,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Runs `reduce` over every interior 3x3 neighbourhood into a fresh buffer.
fn neighbourhood_filter<F>(image: &GrayImage, reduce: F) -> Result<GrayImage, PreprocessingError>
where
    F: Fn([u8; 9]) -> u8,
{
    let (width, height) = image.dimensions();
    let mut result = allocate_gray(width, height)?;
    copy_border(image, &mut result);

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut window = [0u8; 9];
            let mut i = 0;
            for ny in y - 1..=y + 1 {
                for nx in x - 1..=x + 1 {
                    window[i] = image.get_pixel(nx, ny)[0];
                    i += 1;
                }
            }
            result.put_pixel(x, y, Luma([reduce(window)]));
        }
    }

    Ok(result)
}
