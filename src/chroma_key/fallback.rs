//! Keying paths that run entirely in process.
//!
//! [`fallback`] is the last resort of the engine and cannot fail for a
//! non-empty raster. [`colorkey`] is the single-pass alternative to the soft
//! pipeline.

use image::{Luma, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::map::{map_colors, map_colors2};
use tracing::debug;

use crate::chroma_key::backend::erode;
use crate::chroma_key::composite::{trim, Composite};
use crate::chroma_key::key_color::KeyColor;
use crate::chroma_key::matte::{ExtractAlpha, HardThreshold};
use crate::chroma_key::unmix::despill_pixel;
use crate::chroma_key::Matte;
use crate::config::ColorkeyConfig;
use crate::error::ChromaKeyError;

/// Radius of the diamond used to shave fringe pixels
pub const FALLBACK_EROSION_RADIUS: u8 = 1;

/// Binary matte: 0 within `tolerance` percent of the key, 255 elsewhere.
pub fn binary_matte(image: &RgbImage, key: KeyColor, tolerance: f32) -> Matte {
    map_colors(image, |pixel| {
        Luma([if key.matches(pixel, tolerance) { 0 } else { 255 }])
    })
}

fn merge(image: &RgbImage, matte: &Matte) -> RgbaImage {
    map_colors2(image, matte, |Rgb([r, g, b]), Luma([a])| Rgba([r, g, b, a]))
}

/// Hard threshold, one-pixel erosion, trim.
///
/// No feathering and no unmixing: the erosion removes the ring of tinted
/// pixels instead of correcting them.
pub fn fallback(image: &RgbImage, key: KeyColor, tolerance: f32) -> RgbaImage {
    let matte = binary_matte(image, key, tolerance);
    let eroded = erode(&matte, FALLBACK_EROSION_RADIUS);
    debug!(%key, tolerance, "fallback matte built");
    trim(merge(image, &eroded)).image
}

/// Colorkey with despill in one pass, then trim.
///
/// Despill is applied to the blend band only, so pixels outside the key's
/// reach keep their color.
///
/// # Errors
///
/// * `ChromaKeyError::EmptyImage` - When the image has no pixels
pub fn colorkey(
    image: &RgbImage,
    key: KeyColor,
    config: ColorkeyConfig,
    tolerance: f32,
) -> Result<Composite, ChromaKeyError> {
    let matte = HardThreshold::new(config, tolerance).extract_alpha(image, key)?;
    let channel = key.dominant_channel();

    let keyed = map_colors2(image, &matte, |pixel, Luma([alpha])| {
        let Rgb([r, g, b]) = match channel {
            Some(channel) if alpha > 0 && alpha < 255 => despill_pixel(pixel, channel),
            _ => pixel,
        };
        Rgba([r, g, b, alpha])
    });
    debug!(%key, similarity = config.similarity, blend = config.blend, "colorkey applied");
    Ok(trim(keyed))
}
