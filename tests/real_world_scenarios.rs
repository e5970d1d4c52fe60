//! Real-world scenario tests for chroma-matte
//!
//! Complete runs on synthetic green-screen renders, from decoded raster to
//! written PNG.

use image::{DynamicImage, Rgb, RgbImage, Rgba};
use chroma_matte::*;

/// `size` canvas of `background` with a `side` square of `subject` at `origin`
fn square_on_canvas(size: u32, side: u32, origin: u32, background: Rgb<u8>, subject: Rgb<u8>) -> RgbImage {
    let range = origin..origin + side;
    RgbImage::from_fn(size, size, |x, y| {
        if range.contains(&x) && range.contains(&y) {
            subject
        } else {
            background
        }
    })
}

#[test]
fn blue_square_on_green_screen_is_cut_out_exactly() {
    let image = square_on_canvas(200, 100, 50, Rgb([0, 255, 0]), Rgb([0, 0, 255]));
    let engine = ChromaKeyEngine::default();

    let keyed = engine
        .remove_background(&DynamicImage::ImageRgb8(image))
        .unwrap();

    assert_eq!(keyed.mode, ProcessingMode::Soft);
    assert_eq!(keyed.key_color, KeyColor::GREEN);
    assert!(keyed.trimmed);
    assert_eq!(keyed.image.dimensions(), (100, 100));
    assert!(keyed.image.pixels().all(|p| *p == Rgba([0, 0, 255, 255])));
    // No green tint survives on the edges.
    assert!(keyed.image.pixels().all(|p| p[1] == 0));
}

#[test]
fn blue_square_with_colorkey_strategy_matches_soft_result() {
    let image = square_on_canvas(200, 100, 50, Rgb([0, 255, 0]), Rgb([0, 0, 255]));
    let config = ChromaKeyConfig::default().with_strategy(KeyingStrategy::Colorkey);
    let engine = ChromaKeyEngine::new(config).unwrap();

    let keyed = engine
        .remove_background(&DynamicImage::ImageRgb8(image))
        .unwrap();

    assert_eq!(keyed.mode, ProcessingMode::Colorkey);
    assert_eq!(keyed.image.dimensions(), (100, 100));
    assert!(keyed.image.pixels().all(|p| *p == Rgba([0, 0, 255, 255])));
}

#[test]
fn isolated_noise_pixel_does_not_widen_the_crop() {
    let mut image = square_on_canvas(200, 40, 80, Rgb([0, 255, 0]), Rgb([0, 0, 255]));
    // Slightly off-key: outside tolerance, removed by the opening.
    image.put_pixel(10, 150, Rgb([30, 230, 30]));
    let engine = ChromaKeyEngine::new(ChromaKeyConfig::default().with_detect_key(false)).unwrap();

    let keyed = engine
        .remove_background(&DynamicImage::ImageRgb8(image))
        .unwrap();

    assert_eq!(keyed.mode, ProcessingMode::Soft);
    assert_eq!(keyed.image.dimensions(), (40, 40));
    assert!(keyed.image.pixels().all(|p| *p == Rgba([0, 0, 255, 255])));
}

#[test]
fn near_green_background_is_detected_instead_of_default() {
    let background = Rgb([0x0B, 0xF2, 0x0A]);
    let image = square_on_canvas(200, 80, 60, background, Rgb([230, 40, 40]));

    let key = sample_key_color(&image, &SamplerConfig::default(), KeyColor::GREEN);
    assert!(key.distance(background) < 0.01, "detected {key}");
    assert_ne!(key, KeyColor::GREEN);

    let keyed = ChromaKeyEngine::default()
        .remove_background(&DynamicImage::ImageRgb8(image))
        .unwrap();
    assert_eq!(keyed.key_color, key);
    assert_eq!(keyed.image.dimensions(), (80, 80));
}

#[test]
fn blue_screen_key_is_detected_and_removed() {
    let image = square_on_canvas(120, 40, 40, Rgb([0, 0, 255]), Rgb([250, 200, 20]));
    let keyed = ChromaKeyEngine::default()
        .remove_background(&DynamicImage::ImageRgb8(image))
        .unwrap();
    assert_eq!(keyed.key_color, KeyColor::BLUE);
    assert_eq!(keyed.image.dimensions(), (40, 40));
}

#[test]
fn unavailable_backend_still_writes_output_through_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("render.png");
    let output = dir.path().join("render_keyed.png");
    square_on_canvas(200, 100, 50, Rgb([0, 255, 0]), Rgb([0, 0, 255]))
        .save(&input)
        .unwrap();

    let backend = MagickBackend::with_program("chroma-matte-missing-magick");
    let engine = ChromaKeyEngine::with_backend(ChromaKeyConfig::default(), backend).unwrap();
    let keyed = engine.process_file(&input, &output).unwrap();

    assert!(keyed.is_degraded());
    assert!(keyed.fallback_reason.is_some());

    let written = image::open(&output).unwrap();
    assert!(written.color().has_alpha());
    let written = written.into_rgba8();
    // One-pixel erosion shaves the rim of the square.
    assert_eq!(written.dimensions(), (98, 98));
    assert!(written.pixels().all(|p| *p == Rgba([0, 0, 255, 255])));
}

#[test]
fn batch_of_renders_is_processed_independently() {
    let renders: Vec<DynamicImage> = [Rgb([0, 0, 255]), Rgb([255, 0, 0]), Rgb([255, 255, 255])]
        .into_iter()
        .enumerate()
        .map(|(i, subject)| {
            let side = 20 + 10 * i as u32;
            DynamicImage::ImageRgb8(square_on_canvas(100, side, 30, Rgb([0, 255, 0]), subject))
        })
        .collect();

    let results = ChromaKeyEngine::default().process_batch(&renders);

    assert_eq!(results.len(), 3);
    for (i, result) in results.into_iter().enumerate() {
        let keyed = result.unwrap();
        let side = 20 + 10 * i as u32;
        assert_eq!(keyed.image.dimensions(), (side, side));
    }
}
