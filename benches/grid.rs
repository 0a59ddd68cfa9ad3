use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use gridcrop::{CapturePipeline, CropFormat, GridConfig, GridLayout, ImageDimensions};
use image::{DynamicImage, Rgb, RgbImage};
use std::hint::black_box;

// Gradient photo stand-in; flat images compress unrealistically well
fn create_test_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

// Benchmark the geometry alone across grid sizes
fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let dims = ImageDimensions::new(4000, 3000, 800.0, 600.0).unwrap();
    let grids = [(1, 1), (2, 3), (6, 8), (20, 20)];

    for (rows, cols) in grids {
        let config = GridConfig::new(rows, cols, 0.1, 0.1).unwrap();
        group.bench_with_input(
            BenchmarkId::new("cells", format!("{}x{}", rows, cols)),
            &config,
            |b, config| {
                b.iter(|| black_box(GridLayout::new(config, dims).unwrap()));
            },
        );
    }
    group.finish();
}

// Benchmark different image sizes
fn bench_image_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("image_sizes");
    let sizes = [(500, 500), (1000, 1000), (2000, 2000), (4000, 3000)];
    let config = GridConfig::default();

    for (width, height) in sizes {
        let img = create_test_image(width, height);
        let dims = ImageDimensions::new(width, height, width as f64 / 4.0, height as f64 / 4.0)
            .unwrap();
        let pipeline = CapturePipeline::default();

        group.bench_with_input(
            BenchmarkId::new("size", format!("{}x{}", width, height)),
            &img,
            |b, img| {
                b.iter(|| black_box(pipeline.extract_all(&config, &dims, Some(img)).unwrap()));
            },
        );
    }
    group.finish();
}

// Benchmark the encoders against each other
fn bench_formats(c: &mut Criterion) {
    let mut group = c.benchmark_group("formats");
    let img = create_test_image(2000, 2000);
    let dims = ImageDimensions::from_image(&img);
    let config = GridConfig::default();
    let formats = [
        ("jpeg_75", CropFormat::Jpeg { quality: 75 }),
        ("jpeg_90", CropFormat::Jpeg { quality: 90 }),
        ("png", CropFormat::Png),
    ];

    for (name, format) in formats {
        let pipeline = CapturePipeline::new(format);
        group.bench_with_input(BenchmarkId::new("format", name), &img, |b, img| {
            b.iter(|| black_box(pipeline.extract_all(&config, &dims, Some(img)).unwrap()));
        });
    }
    group.finish();
}

// Benchmark parallel vs sequential encoding
fn bench_parallel_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_vs_sequential");
    let img = create_test_image(3000, 2000);
    let dims = ImageDimensions::from_image(&img);
    let grids = [(2, 3), (4, 6)];

    for (rows, cols) in grids {
        let config = GridConfig::new(rows, cols, 0.05, 0.05).unwrap();
        for (name, parallel) in [("parallel", true), ("sequential", false)] {
            let pipeline = CapturePipeline::default().with_parallel(parallel);
            group.bench_with_input(
                BenchmarkId::new(name, format!("{}x{}", rows, cols)),
                &img,
                |b, img| {
                    b.iter(|| black_box(pipeline.extract_all(&config, &dims, Some(img)).unwrap()));
                },
            );
        }
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(20); // Reduced sample size for faster runs
    targets = bench_layout, bench_image_sizes, bench_formats, bench_parallel_processing
}
criterion_main!(benches);
