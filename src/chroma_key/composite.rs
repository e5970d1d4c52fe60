use image::{imageops, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::map::map_colors2;
use tracing::{debug, warn};

use crate::chroma_key::Matte;
use crate::error::ChromaKeyError;
use crate::utils::validate_matching_dimensions;

/// Tightest rectangle enclosing the non-transparent pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Result of merging color and matte
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    pub image: RgbaImage,
    /// Box the image was cropped to, `None` when nothing was opaque
    pub bounds: Option<BoundingBox>,
}

/// Trait providing functionality to apply an alpha matte to an RGB image
pub trait ApplyAlphaMask {
    /// Uses `mask` as the alpha channel of a new RGBA image
    ///
    /// # Errors
    ///
    /// * `ChromaKeyError::DimensionMismatch` - When image and mask dimensions don't match
    ///
    /// # Examples
    ///
    /// ```
    /// use chroma_matte::{ApplyAlphaMask, Matte};
    /// use image::{Luma, Rgb, RgbImage, Rgba};
    ///
    /// # fn example() -> Result<(), chroma_matte::ChromaKeyError> {
    /// let rgb = RgbImage::from_pixel(4, 4, Rgb([200, 40, 90]));
    /// let mask = Matte::from_pixel(4, 4, Luma([128]));
    ///
    /// let rgba = rgb.apply_alpha_mask(&mask)?;
    /// assert_eq!(rgba.get_pixel(0, 0), &Rgba([200, 40, 90, 128]));
    /// # Ok(())
    /// # }
    /// # example().unwrap();
    /// ```
    fn apply_alpha_mask(&self, mask: &Matte) -> Result<RgbaImage, ChromaKeyError>;
}

impl ApplyAlphaMask for RgbImage {
    fn apply_alpha_mask(&self, mask: &Matte) -> Result<RgbaImage, ChromaKeyError> {
        validate_matching_dimensions(self.dimensions(), mask.dimensions())?;

        Ok(map_colors2(self, mask, |Rgb([red, green, blue]), Luma([alpha])| {
            Rgba([red, green, blue, alpha])
        }))
    }
}

/// Bounding box of pixels with non-zero alpha
pub fn alpha_bounds(image: &RgbaImage) -> Option<BoundingBox> {
    let (width, height) = image.dimensions();
    let mut bounds = [width, height, 0, 0]; // [x1, y1, x2, y2]
    let mut found = false;

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] > 0 {
            update_bounds(&mut bounds, x, y);
            found = true;
        }
    }

    found.then(|| BoundingBox {
        x: bounds[0],
        y: bounds[1],
        width: bounds[2] - bounds[0] + 1,
        height: bounds[3] - bounds[1] + 1,
    })
}

fn update_bounds(bounds: &mut [u32; 4], x: u32, y: u32) {
    bounds[0] = bounds[0].min(x);
    bounds[1] = bounds[1].min(y);
    bounds[2] = bounds[2].max(x);
    bounds[3] = bounds[3].max(y);
}

/// Crops `image` to its non-transparent content.
///
/// A fully transparent image is returned uncropped, since cropping it would
/// leave a zero-sized canvas.
pub fn trim(image: RgbaImage) -> Composite {
    match alpha_bounds(&image) {
        Some(bounds) if (bounds.width, bounds.height) == image.dimensions() => Composite {
            image,
            bounds: Some(bounds),
        },
        Some(bounds) => {
            debug!(?bounds, "trimming transparent border");
            let cropped = imageops::crop_imm(&image, bounds.x, bounds.y, bounds.width, bounds.height)
                .to_image();
            Composite {
                image: cropped,
                bounds: Some(bounds),
            }
        }
        None => {
            warn!(
                width = image.width(),
                height = image.height(),
                "result is fully transparent, leaving canvas uncropped"
            );
            Composite {
                image,
                bounds: None,
            }
        }
    }
}

/// Merges `rgb` with `matte` as alpha and trims the transparent border.
pub fn composite(rgb: &RgbImage, matte: &Matte) -> Result<Composite, ChromaKeyError> {
    let rgba = rgb.apply_alpha_mask(matte)?;
    Ok(trim(rgba))
}
