//! Foreground color recovery at partially keyed pixels.
//!
//! ## Compositing equation
//!
//! An edge pixel is an optical blend of the subject and the backdrop:
//!
//! ```text
//! I = a * F + (1 - a) * K
//! ```
//!
//! With the key `K` known and `a` taken from the refined matte, the true
//! foreground is recovered per channel as
//!
//! ```text
//! F = (I - (1 - a) * K) / a        for a > 0
//! ```
//!
//! Pixels with `a = 0` are fully transparent; their color is never divided
//! and is written as black.
//!
//! ## Despill
//!
//! Quantization and imperfect mattes leave a residual tint of the key hue
//! that unmixing alone does not remove. On partially covered pixels the
//! key's dominant channel is clamped to the mean of the other two:
//!
//! ```text
//! c_key = min(c_key, (c_a + c_b) / 2)
//! ```

use image::{Luma, Rgb, RgbImage};
use imageproc::map::{map_colors, map_colors2};

use crate::chroma_key::key_color::{Channel, KeyColor};
use crate::chroma_key::Matte;
use crate::config::UnmixConfig;
use crate::error::ChromaKeyError;
use crate::utils::{normalize_alpha, round_to_u8, validate_matching_dimensions};

/// Recovers the foreground of a single channel.
///
/// Returns `None` for `alpha <= 0`, where the channel is undefined.
#[inline]
pub fn unmix_channel(observed: f32, alpha: f32, key: f32) -> Option<f32> {
    (alpha > 0.0).then(|| (observed - (1.0 - alpha) * key) / alpha)
}

/// Recovers the foreground color of one pixel, clamped to gamut.
#[inline]
pub fn unmix_pixel(observed: Rgb<u8>, alpha: u8, key: KeyColor) -> Rgb<u8> {
    let a = normalize_alpha(alpha);
    let Rgb(k) = key.rgb();
    let mut out = [0u8; 3];
    for ((dst, &o), &k) in out.iter_mut().zip(observed.0.iter()).zip(k.iter()) {
        *dst = unmix_channel(f32::from(o), a, f32::from(k)).map_or(0, round_to_u8);
    }
    Rgb(out)
}

/// Clamps `channel` of `pixel` to the mean of the two other channels.
#[inline]
pub fn despill_pixel(pixel: Rgb<u8>, channel: Channel) -> Rgb<u8> {
    let [a, b] = channel.others();
    let mean = (u16::from(pixel[a.index()]) + u16::from(pixel[b.index()])) / 2;
    let mut out = pixel;
    // mean of two u8 values fits in u8
    out[channel.index()] = out[channel.index()].min(mean as u8);
    out
}

/// Applies despill to every pixel of an image
pub trait Despill {
    /// Clamps the key's dominant channel everywhere.
    ///
    /// A key without a dominant channel leaves the image unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use chroma_matte::{Despill, KeyColor};
    /// use image::{Rgb, RgbImage};
    ///
    /// let spilled = RgbImage::from_pixel(2, 2, Rgb([100, 180, 60]));
    /// let clean = spilled.despill(KeyColor::GREEN);
    /// // Green is clamped to the mean of red and blue.
    /// assert_eq!(clean.get_pixel(0, 0), &Rgb([100, 80, 60]));
    /// ```
    fn despill(&self, key: KeyColor) -> RgbImage;
}

impl Despill for RgbImage {
    fn despill(&self, key: KeyColor) -> RgbImage {
        match key.dominant_channel() {
            Some(channel) => map_colors(self, |pixel| despill_pixel(pixel, channel)),
            None => self.clone(),
        }
    }
}

/// Unmixes `image` against `key` using `matte` as coverage.
///
/// Fully opaque pixels pass through untouched. Partially covered pixels are
/// unmixed and, when enabled, despilled.
///
/// # Errors
///
/// * `ChromaKeyError::DimensionMismatch` - When image and matte sizes differ
pub fn unmix(
    image: &RgbImage,
    matte: &Matte,
    key: KeyColor,
    config: &UnmixConfig,
) -> Result<RgbImage, ChromaKeyError> {
    validate_matching_dimensions(image.dimensions(), matte.dimensions())?;
    let despill_channel = key.dominant_channel().filter(|_| config.despill);

    Ok(map_colors2(image, matte, |pixel, Luma([alpha])| match alpha {
        255 => pixel,
        0 => Rgb([0, 0, 0]),
        _ => {
            let unmixed = unmix_pixel(pixel, alpha, key);
            match despill_channel {
                Some(channel) => despill_pixel(unmixed, channel),
                None => unmixed,
            }
        }
    }))
}
