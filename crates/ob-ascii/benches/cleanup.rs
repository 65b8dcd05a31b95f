//! Lissage, mapping et nettoyage sur une frame synthétique 320×180.
//! Run: cargo bench -p ob-ascii

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ob_ascii::{CharacterMapper, CleanupPipeline, Smoother};
use ob_core::config::CodecConfig;
use ob_core::frame::RasterFrame;

fn synthetic_frame(index: u32) -> RasterFrame {
    let (w, h) = (320u32, 180u32);
    let luma = (0..w * h)
        .map(|i| {
            let (x, y) = (i % w, i / w);
            ((x * 255 / w + y * 3 + index * 7 + i.wrapping_mul(2_654_435_761) % 17) % 256) as u8
        })
        .collect();
    RasterFrame::new(w, h, luma, index, f64::from(index) / 30.0).expect("frame")
}

fn bench_stages(c: &mut Criterion) {
    let config = CodecConfig::default();
    let smoother = Smoother::new(&config.smoothing).expect("smoother");
    let mapper = CharacterMapper::new(&config.conversion).expect("mapper");
    let frame = synthetic_frame(0);
    let smoothed = smoother.apply(&frame);
    let grid = mapper.map(&smoothed, None).expect("map");

    let mut group = c.benchmark_group("ascii");
    group.sample_size(20);

    group.bench_function("smoothing_320x180", |b| {
        b.iter(|| black_box(smoother.apply(black_box(&frame))));
    });

    group.bench_function("mapping_120_cols", |b| {
        b.iter(|| black_box(mapper.map(black_box(&smoothed), Some(&grid)).expect("map")));
    });

    group.bench_function("cleanup_all_stages", |b| {
        let mut pipeline =
            CleanupPipeline::new(&config.cleanup, mapper.ramp()).expect("pipeline");
        b.iter(|| black_box(pipeline.process(black_box(grid.clone()))));
    });

    group.finish();
}

criterion_group!(benches, bench_stages);
criterion_main!(benches);
