use std::hint::black_box;

use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion};

use marker_map::data::generate_simple_world;
use marker_map::geo::LatLng;
use marker_map::map::{Camera, MapController, MapRenderer, Viewport};
use marker_map::marker::{Marker, MarkerId};

fn bench_projection(c: &mut Criterion) {
    let viewport = Viewport::new(-80.0, 43.0, 9, 320, 160);
    c.bench_function("project_unproject", |b| {
        b.iter(|| {
            let (px, py) = viewport.project(black_box(-79.38), black_box(43.65));
            viewport.unproject(px, py)
        })
    });
}

fn bench_render(c: &mut Criterion) {
    let mut renderer = MapRenderer::new();
    generate_simple_world(&mut renderer);

    let mut group = c.benchmark_group("render");
    for zoom in [2u8, 6, 9] {
        let viewport = Viewport::new(-80.0, 43.0, zoom, 320, 160);
        group.bench_function(format!("zoom_{zoom}"), |b| {
            b.iter(|| renderer.render(160, 40, black_box(&viewport)))
        });
    }
    group.finish();
}

fn bench_hit_test(c: &mut Criterion) {
    let mut controller = MapController::new(
        Camera {
            center: LatLng::new(43.0, -80.0),
            zoom: 9,
        },
        16,
    );
    controller.resize_surface((1, 2), 160, 40);
    let now = Utc::now();
    let markers: Vec<Marker> = (0..1_000u64)
        .map(|i| Marker {
            id: MarkerId::Int(i),
            lat: 42.0 + (i % 40) as f64 * 0.05,
            lng: -81.0 + (i / 40) as f64 * 0.08,
            time: now,
        })
        .collect();

    c.bench_function("marker_at_1000", |b| {
        b.iter(|| controller.marker_at(markers.iter(), black_box(81), black_box(22)))
    });
}

criterion_group!(benches, bench_projection, bench_render, bench_hit_test);
criterion_main!(benches);
