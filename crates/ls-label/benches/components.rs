use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ls_core::Raster;
use ls_label::{ComponentConfig, Connectivity, boundary_mask, label_components};

fn synthetic_blobs(width: usize, height: usize) -> Raster<u8> {
    let mut data = vec![0u8; width * height];

    for cy in (24..height.saturating_sub(24)).step_by(48) {
        for cx in (24..width.saturating_sub(24)).step_by(48) {
            for y in cy - 16..cy + 16 {
                for x in cx - 16..cx + 16 {
                    let dx = x as isize - cx as isize;
                    let dy = y as isize - cy as isize;
                    if dx * dx + dy * dy < 256 {
                        data[y * width + x] = 1;
                    }
                }
            }
        }
    }

    Raster::from_vec_2d(width, height, data).expect("valid mask")
}

fn bench_label_components(c: &mut Criterion) {
    let mask = synthetic_blobs(1024, 768);

    let cfg = ComponentConfig {
        connectivity: Connectivity::C8,
        min_component_size: 4,
    };

    c.bench_function("ls_label_components_1024x768", |b| {
        b.iter(|| {
            let out = label_components(black_box(&mask), black_box(&cfg));
            black_box(out.num_components());
        });
    });

    let labels = label_components(&mask, &cfg).labels;
    c.bench_function("ls_label_boundary_mask_1024x768", |b| {
        b.iter(|| black_box(boundary_mask(black_box(&labels))));
    });
}

criterion_group!(benches, bench_label_components);
criterion_main!(benches);
