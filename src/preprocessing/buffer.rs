//! # Pixel Buffer Helpers
//!
//! Fallible allocation and geometry checks for the grayscale buffers handed
//! from stage to stage. Every stage owns exactly one buffer at a time: it
//! either rewrites its input in place or allocates a fresh buffer here and
//! drops the input before returning. Buffers allocated by `image` or
//! `imageproc` are first checked against the configured memory limit.

use image::GrayImage;
use tracing;

use super::types::{PreprocessingError, StageKind};
use crate::preprocessing_config::MemoryConfig;

/// Intensity of a foreground (ink) pixel in a binary image.
pub const BLACK: u8 = 0;
/// Intensity of a background pixel in a binary image.
pub const WHITE: u8 = 255;

/// Returns the pixel count of a `width` x `height` buffer.
///
/// Zero-area geometry is an invalid input; a pixel count that does not fit in
/// `usize` can never be allocated.
pub fn checked_area(width: u32, height: u32) -> Result<usize, PreprocessingError> {
    if width == 0 || height == 0 {
        return Err(PreprocessingError::InvalidInput {
            message: format!("image has zero area ({}x{})", width, height),
        });
    }

    (width as usize)
        .checked_mul(height as usize)
        .ok_or(PreprocessingError::AllocationFailure { width, height })
}

/// Allocates a zeroed grayscale buffer, surfacing out-of-memory as an error
/// instead of aborting.
pub fn allocate_gray(width: u32, height: u32) -> Result<GrayImage, PreprocessingError> {
    let len = checked_area(width, height)?;

    let mut samples: Vec<u8> = Vec::new();
    samples
        .try_reserve_exact(len)
        .map_err(|_| PreprocessingError::AllocationFailure { width, height })?;
    samples.resize(len, 0);

    GrayImage::from_raw(width, height, samples)
        .ok_or(PreprocessingError::AllocationFailure { width, height })
}

/// Checks that a `width` x `height` buffer of `bytes_per_sample`-byte samples
/// fits within the memory limit and can be reserved.
///
/// # Arguments
///
/// * `width`, `height` - Buffer geometry in samples
/// * `bytes_per_sample` - Storage size of one sample
/// * `memory` - Per-buffer memory limit
///
/// # Returns
///
/// Returns the buffer size in bytes. The reservation itself is released
/// again; the caller performs the real allocation.
///
/// # Errors
///
/// Returns `AllocationFailure` when the size overflows, exceeds the limit or
/// cannot be reserved, and `InvalidInput` for zero-area geometry.
pub fn ensure_buffer_fits(
    width: u32,
    height: u32,
    bytes_per_sample: usize,
    memory: &MemoryConfig,
) -> Result<usize, PreprocessingError> {
    let failure = move || PreprocessingError::AllocationFailure { width, height };

    let bytes = checked_area(width, height)?
        .checked_mul(bytes_per_sample)
        .ok_or_else(failure)?;

    if bytes as u64 > memory.max_buffer_bytes() {
        tracing::warn!(
            target: "ocr_preprocessing",
            "Refusing {}x{} buffer: {} bytes exceeds the {}MB limit",
            width,
            height,
            bytes,
            memory.max_buffer_mb
        );
        return Err(failure());
    }

    let mut reservation: Vec<u8> = Vec::new();
    reservation
        .try_reserve_exact(bytes)
        .map_err(|_| failure())?;

    Ok(bytes)
}

/// Fails with `ProcessingFailed` when the image is too small for a 3x3
/// neighbourhood operation to have any interior pixel.
pub fn require_interior(image: &GrayImage, stage: StageKind) -> Result<(), PreprocessingError> {
    let (width, height) = image.dimensions();
    checked_area(width, height)?;
    if width < 3 || height < 3 {
        return Err(PreprocessingError::ProcessingFailed {
            stage,
            message: format!(
                "{}x{} image has no interior pixels for a 3x3 kernel",
                width, height
            ),
        });
    }
    Ok(())
}

/// Whether every sample is either black or white.
pub fn is_binary(image: &GrayImage) -> bool {
    image
        .as_raw()
        .iter()
        .all(|&value| value == BLACK || value == WHITE)
}

/// Copies the outermost rows and columns of `source` into `target`.
pub(crate) fn copy_border(source: &GrayImage, target: &mut GrayImage) {
    let (width, height) = source.dimensions();
    for x in 0..width {
        target.put_pixel(x, 0, *source.get_pixel(x, 0));
        target.put_pixel(x, height - 1, *source.get_pixel(x, height - 1));
    }
    for y in 0..height {
        target.put_pixel(0, y, *source.get_pixel(0, y));
        target.put_pixel(width - 1, y, *source.get_pixel(width - 1, y));
    }
}
