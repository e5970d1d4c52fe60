//! Internal utility functions for chroma-matte.
//!
//! Validation and numeric helpers shared by the pipeline stages.

use crate::error::ChromaKeyError;

/// Rounds a floating-point channel value to the nearest `u8`.
///
/// Values outside `[0, 255]` saturate, NaN maps to 0.
#[inline]
pub fn round_to_u8(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}

/// Normalizes an 8-bit alpha value to `[0, 1]`.
#[inline]
pub fn normalize_alpha(alpha: u8) -> f32 {
    f32::from(alpha) / 255.0
}

/// Validates that an image has non-zero dimensions.
///
/// # Arguments
///
/// * `width` - The width of the image
/// * `height` - The height of the image
///
/// # Returns
///
/// `Ok(())` if the dimensions are valid, otherwise `ChromaKeyError::EmptyImage`
pub fn validate_non_empty_image(width: u32, height: u32) -> Result<(), ChromaKeyError> {
    if width == 0 || height == 0 {
        Err(ChromaKeyError::EmptyImage { width, height })
    } else {
        Ok(())
    }
}

/// Validates that two images have matching dimensions.
///
/// # Arguments
///
/// * `expected` - Dimensions of the reference image
/// * `actual` - Dimensions of the image being checked against it
pub fn validate_matching_dimensions(
    expected: (u32, u32),
    actual: (u32, u32),
) -> Result<(), ChromaKeyError> {
    if expected != actual {
        Err(ChromaKeyError::DimensionMismatch { expected, actual })
    } else {
        Ok(())
    }
}
