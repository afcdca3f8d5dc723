use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dock_peek::macos::DisplayGeometry;
use dock_peek::models::{Point, Rect, Thumbnail};
use dock_peek::services::{in_icon_strip, scale_to_fit, ThumbnailCache};
use image::RgbaImage;
use std::time::{Duration, Instant};

fn displays() -> Vec<DisplayGeometry> {
    vec![
        DisplayGeometry {
            id: 1,
            frame: Rect::new(0.0, 0.0, 1728.0, 1117.0),
            visible_frame: Rect::new(0.0, 38.0, 1728.0, 1012.0),
            is_primary: true,
        },
        DisplayGeometry {
            id: 2,
            frame: Rect::new(1728.0, -200.0, 2560.0, 1440.0),
            visible_frame: Rect::new(1728.0, -175.0, 2560.0, 1415.0),
            is_primary: false,
        },
    ]
}

fn benchmark_thumbnail_cache(c: &mut Criterion) {
    let thumbnail = Thumbnail::new(RgbaImage::new(300, 190));

    c.bench_function("thumbnail_cache_hit", |b| {
        let now = Instant::now();
        let mut cache = ThumbnailCache::new(Duration::from_secs(5), Duration::from_secs(30), 30);
        for id in 0..30 {
            cache.insert(id, thumbnail.clone(), now);
        }
        b.iter(|| black_box(cache.get(black_box(17), now)))
    });

    c.bench_function("thumbnail_cache_insert_at_capacity", |b| {
        let start = Instant::now();
        let mut cache = ThumbnailCache::new(Duration::from_secs(5), Duration::from_secs(30), 30);
        let mut id = 0u32;
        b.iter(|| {
            id = id.wrapping_add(1);
            cache.insert(id, thumbnail.clone(), start + Duration::from_micros(id as u64));
        })
    });
}

fn benchmark_scale_to_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("scale_to_fit");
    for (width, height) in [(1440u32, 900u32), (2880, 1800)] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &(width, height),
            |b, &(width, height)| {
                b.iter(|| black_box(scale_to_fit(RgbaImage::new(width, height), 300)))
            },
        );
    }
    group.finish();
}

fn benchmark_icon_strip_prefilter(c: &mut Criterion) {
    let displays = displays();
    c.bench_function("icon_strip_miss", |b| {
        b.iter(|| black_box(in_icon_strip(&displays, black_box(Point::new(800.0, 400.0)), 100.0)))
    });
    c.bench_function("icon_strip_hit", |b| {
        b.iter(|| black_box(in_icon_strip(&displays, black_box(Point::new(800.0, 1100.0)), 100.0)))
    });
}

criterion_group!(
    benches,
    benchmark_thumbnail_cache,
    benchmark_scale_to_fit,
    benchmark_icon_strip_prefilter
);
criterion_main!(benches);
