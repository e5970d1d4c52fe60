//! Test utilities for chroma-matte
//!
//! Small synthetic rasters shared by the unit tests. Only compiled for tests.

use image::{Pixel, Primitive, Rgb};

use crate::Image;

/// Creates a 2x2 RGB image with known pixel values:
/// - (0,0): [200, 150, 100]
/// - (1,0): [100, 200, 150]
/// - (0,1): [150, 100, 200]
/// - (1,1): [50, 75, 25]
pub fn create_test_rgb_image() -> Image<Rgb<u8>> {
    let mut image: Image<Rgb<u8>> = Image::new(2, 2);
    image.put_pixel(0, 0, Rgb([200, 150, 100]));
    image.put_pixel(1, 0, Rgb([100, 200, 150]));
    image.put_pixel(0, 1, Rgb([150, 100, 200]));
    image.put_pixel(1, 1, Rgb([50, 75, 25]));
    image
}

/// Creates a `background` canvas with a centered `foreground` rectangle.
///
/// The rectangle covers `width / 4 .. 3 * width / 4` horizontally and the
/// same fraction of the height, so a 40x40 canvas holds a 20x20 subject at
/// (10, 10).
pub fn framed_image(width: u32, height: u32, background: Rgb<u8>, foreground: Rgb<u8>) -> Image<Rgb<u8>> {
    let xs = width / 4..3 * width / 4;
    let ys = height / 4..3 * height / 4;
    Image::from_fn(width, height, |x, y| {
        if xs.contains(&x) && ys.contains(&y) {
            foreground
        } else {
            background
        }
    })
}

/// Compares two pixels channel by channel within `tolerance`.
pub fn pixels_approx_equal<P>(expected: P, actual: P, tolerance: f32) -> bool
where
    P: Pixel,
    P::Subpixel: Primitive,
    f32: From<P::Subpixel>,
{
    expected
        .channels()
        .iter()
        .zip(actual.channels().iter())
        .all(|(e, a)| (f32::from(*e) - f32::from(*a)).abs() <= tolerance)
}

/// Compares two images pixel by pixel within `tolerance`.
pub fn images_approx_equal<P>(expected: &Image<P>, actual: &Image<P>, tolerance: f32) -> bool
where
    P: Pixel,
    P::Subpixel: Primitive,
    f32: From<P::Subpixel>,
{
    expected.dimensions() == actual.dimensions()
        && expected
            .pixels()
            .zip(actual.pixels())
            .all(|(e, a)| pixels_approx_equal(*e, *a, tolerance))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framed_image_places_subject_in_the_middle() {
        let image = framed_image(40, 20, Rgb([0, 255, 0]), Rgb([1, 2, 3]));
        assert_eq!(image.get_pixel(9, 10), &Rgb([0, 255, 0]));
        assert_eq!(image.get_pixel(10, 5), &Rgb([1, 2, 3]));
        assert_eq!(image.get_pixel(29, 14), &Rgb([1, 2, 3]));
        assert_eq!(image.get_pixel(30, 14), &Rgb([0, 255, 0]));
        assert_eq!(image.get_pixel(29, 15), &Rgb([0, 255, 0]));
    }

    #[test]
    fn pixels_approx_equal_with_tolerant_comparison_returns_true() {
        let pixel1 = Rgb([100u8, 150u8, 200u8]);
        let pixel2 = Rgb([101u8, 149u8, 201u8]);
        let pixel3 = Rgb([105u8, 145u8, 205u8]);

        assert!(pixels_approx_equal(pixel1, pixel2, 1.5));
        assert!(!pixels_approx_equal(pixel1, pixel3, 1.5));
    }

    #[test]
    fn images_approx_equal_with_tolerant_comparison_returns_true() {
        let image1 = create_test_rgb_image();
        let mut image2 = create_test_rgb_image();
        image2.put_pixel(0, 0, Rgb([201, 150, 100]));

        assert!(images_approx_equal(&image1, &image2, 1.5));
        assert!(!images_approx_equal(&image1, &image2, 0.5));
        assert!(!images_approx_equal(&image1, &framed_image(3, 3, Rgb([0; 3]), Rgb([0; 3])), 255.0));
    }
}
