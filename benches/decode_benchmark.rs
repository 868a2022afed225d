use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use gvvideo::testlib::{GvBuilder, Rgb};
use gvvideo::{FrameCache, GvVideo, TextureFormat};
use std::io::Cursor;

fn hd_clip(format: TextureFormat) -> Vec<u8> {
    let (width, height) = (1280u32, 720u32);
    let blocks = (width / 4 * height / 4) as usize;
    let colors = [Rgb::RED, Rgb::GREEN, Rgb::BLUE, Rgb::YELLOW];
    let pattern: Vec<Rgb> = (0..blocks).map(|i| colors[i % colors.len()]).collect();
    let mut builder = GvBuilder::new(width, height).format(format).fps(30.0);
    for _ in 0..4 {
        builder = builder.frame(&pattern);
    }
    builder.build()
}

fn bench_frame_decode(c: &mut Criterion) {
    let mut video = GvVideo::from_reader(Cursor::new(hd_clip(TextureFormat::Dxt1))).unwrap();

    c.bench_function("read_frame_dxt1_720p", |b| {
        b.iter(|| {
            let _ = video.read_frame(black_box(1)).unwrap();
        })
    });

    let mut buffer = vec![0u8; video.frame_size()];
    c.bench_function("read_frame_into_dxt1_720p", |b| {
        b.iter(|| {
            video.read_frame_into(black_box(1), &mut buffer).unwrap();
        })
    });

    c.bench_function("read_frame_raw_compressed_into_720p", |b| {
        b.iter(|| {
            video.read_frame_raw_compressed_into(black_box(2), &mut buffer).unwrap();
        })
    });

    let mut dxt5 = GvVideo::from_reader(Cursor::new(hd_clip(TextureFormat::Dxt5))).unwrap();
    c.bench_function("read_frame_into_dxt5_720p", |b| {
        b.iter(|| {
            dxt5.read_frame_into(black_box(3), &mut buffer).unwrap();
        })
    });
}

fn bench_cache_operations(c: &mut Criterion) {
    let mut video = GvVideo::from_reader(Cursor::new(hd_clip(TextureFormat::Dxt1))).unwrap();
    let cache = FrameCache::new(8);
    cache.get_or_decode(&mut video, 0).unwrap();

    c.bench_function("cache_hit", |b| {
        b.iter(|| {
            let _ = cache.get_or_decode(&mut video, black_box(0)).unwrap();
        })
    });
}

criterion_group!(benches, bench_frame_decode, bench_cache_operations);
criterion_main!(benches);
