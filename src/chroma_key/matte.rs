//! Alpha matte extraction.
//!
//! Both strategies produce a [`Matte`] where 0 is background (the pixel
//! matches the key) and 255 is foreground.

use image::{Luma, Rgb, RgbImage};
use imageproc::map::{map_colors, map_colors2};
use tracing::debug;

use crate::chroma_key::backend::RasterBackend;
use crate::chroma_key::key_color::KeyColor;
use crate::chroma_key::Matte;
use crate::config::{ColorkeyConfig, SoftMatteConfig};
use crate::error::{ChromaKeyError, Stage};
use crate::utils::{round_to_u8, validate_matching_dimensions, validate_non_empty_image};

/// Builds an alpha matte from an image and a key color
pub trait ExtractAlpha {
    fn extract_alpha(&self, image: &RgbImage, key: KeyColor) -> Result<Matte, ChromaKeyError>;
}

/// Classification of an image as a whole against the key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coverage {
    AllKey,
    NoKey,
    Mixed,
}

fn coverage(image: &RgbImage, key: KeyColor, tolerance: f32) -> Coverage {
    let matching = image
        .pixels()
        .filter(|pixel| key.matches(**pixel, tolerance))
        .count();
    let total = image.width() as usize * image.height() as usize;
    if matching == total {
        Coverage::AllKey
    } else if matching == 0 {
        Coverage::NoKey
    } else {
        Coverage::Mixed
    }
}

/// Continuous matte from the per-pixel distance to the key
///
/// Distance is the largest channel difference, auto-levelled over the image,
/// blurred through the backend and pushed towards 0 / 255 by a level remap
/// that keeps a linear band in between.
pub struct SoftDifference<'a, B: RasterBackend + ?Sized> {
    pub config: SoftMatteConfig,
    /// Percent distance under which a pixel counts as key colored
    pub tolerance: f32,
    pub backend: &'a B,
}

impl<'a, B: RasterBackend + ?Sized> SoftDifference<'a, B> {
    pub fn new(config: SoftMatteConfig, tolerance: f32, backend: &'a B) -> Self {
        Self {
            config,
            tolerance,
            backend,
        }
    }
}

impl<B: RasterBackend + ?Sized> ExtractAlpha for SoftDifference<'_, B> {
    fn extract_alpha(&self, image: &RgbImage, key: KeyColor) -> Result<Matte, ChromaKeyError> {
        let (width, height) = image.dimensions();
        validate_non_empty_image(width, height)?;

        match coverage(image, key, self.tolerance) {
            Coverage::AllKey => {
                debug!("every pixel matches the key, matte is empty");
                return Ok(Matte::new(width, height));
            }
            Coverage::NoKey => {
                debug!("no pixel matches the key, matte is full");
                return Ok(Matte::from_pixel(width, height, Luma([255])));
            }
            Coverage::Mixed => {}
        }

        let difference: Matte = map_colors(image, |pixel| Luma([key.max_channel_difference(pixel)]));
        let levelled = auto_level(&difference);
        let blurred = self
            .backend
            .gaussian_blur(&levelled, self.config.blur_sigma)
            .map_err(ChromaKeyError::backend(Stage::Matte))?;

        Ok(level_remap(
            &blurred,
            self.config.level_low,
            self.config.level_high,
        ))
    }
}

/// Stretches the matte so its darkest value maps to 0 and brightest to 255.
///
/// A flat matte is returned unchanged.
fn auto_level(matte: &Matte) -> Matte {
    let (lo, hi) = matte
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if hi <= lo {
        return matte.clone();
    }
    let range = f32::from(hi - lo);
    map_colors(matte, |Luma([v])| {
        Luma([round_to_u8(f32::from(v - lo) * 255.0 / range)])
    })
}

/// Clips values below `low` to 0 and above `high` to 255, linear between.
///
/// `low` and `high` are fractions of the full range.
fn level_remap(matte: &Matte, low: f32, high: f32) -> Matte {
    let low = low * 255.0;
    let high = high * 255.0;
    let span = (high - low).max(f32::EPSILON);
    map_colors(matte, |Luma([v])| {
        let v = f32::from(v);
        let mapped = if v <= low {
            0
        } else if v >= high {
            255
        } else {
            round_to_u8((v - low) / span * 255.0)
        };
        Luma([mapped])
    })
}

/// Thresholded matte in the manner of a colorkey filter
///
/// A pixel whose normalized distance to the key is at most `similarity`
/// becomes background; with a non-zero `blend` alpha ramps linearly over the
/// next `blend` of distance, otherwise everything else is foreground.
///
/// `tolerance` classifies the image as a whole the same way
/// [`SoftDifference`] does: if every pixel is within tolerance of the key
/// the matte is empty, if none is it is full, whatever the thresholds say.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HardThreshold {
    pub config: ColorkeyConfig,
    /// Percent distance under which a pixel counts as key colored
    pub tolerance: f32,
}

impl HardThreshold {
    pub fn new(config: ColorkeyConfig, tolerance: f32) -> Self {
        Self { config, tolerance }
    }

    #[inline]
    pub fn alpha(&self, pixel: Rgb<u8>, key: KeyColor) -> u8 {
        let ColorkeyConfig { similarity, blend } = self.config;
        let distance = key.distance(pixel);
        if distance <= similarity {
            0
        } else if blend > 0.0 {
            round_to_u8(((distance - similarity) / blend).min(1.0) * 255.0)
        } else {
            255
        }
    }
}

impl ExtractAlpha for HardThreshold {
    fn extract_alpha(&self, image: &RgbImage, key: KeyColor) -> Result<Matte, ChromaKeyError> {
        let (width, height) = image.dimensions();
        validate_non_empty_image(width, height)?;

        match coverage(image, key, self.tolerance) {
            Coverage::AllKey => Ok(Matte::new(width, height)),
            Coverage::NoKey => Ok(Matte::from_pixel(width, height, Luma([255]))),
            Coverage::Mixed => Ok(map_colors(image, |pixel| Luma([self.alpha(pixel, key)]))),
        }
    }
}

/// Per-pixel limits on alpha implied by the source colors
///
/// `lower` is the smallest alpha for which unmixing the pixel against the key
/// yields an in-gamut foreground color: a pixel that the key cannot explain
/// must be opaque. `upper` is 0 for pixels within tolerance of the key and
/// 255 elsewhere. Spatial filtering may move alpha anywhere between the two.
#[derive(Debug, Clone, PartialEq)]
pub struct MatteBounds {
    pub lower: Matte,
    pub upper: Matte,
}

impl MatteBounds {
    pub fn from_source(image: &RgbImage, key: KeyColor, tolerance: f32) -> Self {
        let lower = map_colors(image, |pixel| Luma([minimum_alpha(pixel, key)]));
        let upper = map_colors(image, |pixel| {
            Luma([if key.matches(pixel, tolerance) { 0 } else { 255 }])
        });
        Self { lower, upper }
    }
}

/// Smallest alpha keeping `(pixel - (1 - a) * key) / a` within `[0, 255]`.
pub fn minimum_alpha(pixel: Rgb<u8>, key: KeyColor) -> u8 {
    let Rgb(key) = key.rgb();
    let needed = pixel
        .0
        .iter()
        .zip(key.iter())
        .map(|(&observed, &key)| {
            let (o, k) = (f32::from(observed), f32::from(key));
            if o < k {
                1.0 - o / k
            } else if o > k {
                (o - k) / (255.0 - k)
            } else {
                0.0
            }
        })
        .fold(0.0f32, f32::max);
    // Round up so the unmixed channel never leaves gamut by a rounding step.
    (needed * 255.0 - 1e-3).ceil().clamp(0.0, 255.0) as u8
}

/// Clamps the matte into `bounds`.
///
/// Pixels the matte already marks as background stay at 0, so specks removed
/// by refinement are not raised back to their lower bound. The upper bound
/// wins where the two disagree.
pub fn constrain(matte: &Matte, bounds: &MatteBounds) -> Result<Matte, ChromaKeyError> {
    validate_matching_dimensions(matte.dimensions(), bounds.lower.dimensions())?;
    validate_matching_dimensions(matte.dimensions(), bounds.upper.dimensions())?;
    let raised = map_colors2(matte, &bounds.lower, |Luma([a]), Luma([lo])| {
        Luma([if a == 0 { 0 } else { a.max(lo) }])
    });
    Ok(map_colors2(&raised, &bounds.upper, |Luma([a]), Luma([hi])| {
        Luma([a.min(hi)])
    }))
}
