//! Performance benchmarks for chroma-matte
//!
//! Per-stage timings and full engine runs over a few render sizes.

use chroma_matte::*;
use criterion::*;
use image::{DynamicImage, Rgb, RgbImage};
use itertools::iproduct;
use std::hint::black_box;

/// Green canvas with a round subject whose rim is blended into the key
fn create_green_screen(width: u32, height: u32) -> RgbImage {
    let mut image = RgbImage::from_pixel(width, height, Rgb([0, 255, 0]));
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let radius = width.min(height) as f32 / 3.0;

    iproduct!(0..height, 0..width).for_each(|(y, x)| {
        let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
        let coverage = (radius - d + 1.0).clamp(0.0, 1.0);
        if coverage > 0.0 {
            let fg = [220.0, 90.0 + (x % 50) as f32, 40.0];
            let key = [0.0, 255.0, 0.0];
            let blended = [0usize, 1, 2].map(|c| (coverage * fg[c] + (1.0 - coverage) * key[c]) as u8);
            image.put_pixel(x, y, Rgb(blended));
        }
    });

    image
}

const SIZES: [(u32, u32); 3] = [(128, 128), (512, 512), (1024, 768)];

fn bench_sampler(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_key_color");
    for (width, height) in SIZES {
        let image = create_green_screen(width, height);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &image,
            |b, image| {
                b.iter(|| {
                    sample_key_color(black_box(image), &SamplerConfig::default(), KeyColor::GREEN)
                })
            },
        );
    }
    group.finish();
}

fn bench_mattes(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_alpha");
    let backend = InProcessBackend;
    for (width, height) in SIZES {
        let image = create_green_screen(width, height);
        group.throughput(Throughput::Elements(u64::from(width * height)));

        let soft = SoftDifference::new(SoftMatteConfig::default(), 10.0, &backend);
        group.bench_with_input(
            BenchmarkId::new("soft", format!("{width}x{height}")),
            &image,
            |b, image| b.iter(|| soft.extract_alpha(black_box(image), KeyColor::GREEN)),
        );

        let hard = HardThreshold::new(ColorkeyConfig::default(), 10.0);
        group.bench_with_input(
            BenchmarkId::new("hard", format!("{width}x{height}")),
            &image,
            |b, image| b.iter(|| hard.extract_alpha(black_box(image), KeyColor::GREEN)),
        );
    }
    group.finish();
}

fn bench_refine_and_unmix(c: &mut Criterion) {
    let mut group = c.benchmark_group("refine_unmix");
    let backend = InProcessBackend;
    let (width, height) = (512, 512);
    let image = create_green_screen(width, height);
    let raw = SoftDifference::new(SoftMatteConfig::default(), 10.0, &backend)
        .extract_alpha(&image, KeyColor::GREEN)
        .expect("matte");
    let refined = refine(&raw, &RefineConfig::default(), &backend).expect("refine");

    group.bench_function("refine", |b| {
        b.iter(|| refine(black_box(&raw), &RefineConfig::default(), &backend))
    });
    for radius in [1u8, 2, 3] {
        group.bench_with_input(BenchmarkId::new("erode", radius), &radius, |b, &radius| {
            b.iter(|| erode(black_box(&raw), radius))
        });
    }
    group.bench_function("unmix", |b| {
        b.iter(|| {
            unmix(
                black_box(&image),
                black_box(&refined),
                KeyColor::GREEN,
                &UnmixConfig::default(),
            )
        })
    });
    group.finish();
}

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("remove_background");
    group.sample_size(20);
    let strategies = [KeyingStrategy::Soft, KeyingStrategy::Colorkey];
    for ((width, height), strategy) in iproduct!(SIZES, strategies) {
        let image = DynamicImage::ImageRgb8(create_green_screen(width, height));
        let engine = ChromaKeyEngine::new(ChromaKeyConfig::default().with_strategy(strategy))
            .expect("default config is valid");
        group.bench_with_input(
            BenchmarkId::new(strategy.to_string(), format!("{width}x{height}")),
            &image,
            |b, image| b.iter(|| engine.remove_background(black_box(image))),
        );
    }

    let image = create_green_screen(512, 512);
    group.bench_function("fallback/512x512", |b| {
        b.iter(|| fallback(black_box(&image), KeyColor::GREEN, 10.0))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_sampler,
    bench_mattes,
    bench_refine_and_unmix,
    bench_engine
);
criterion_main!(benches);
