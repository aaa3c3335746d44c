//! Benchmarks for piping tree reconstruction and plan construction.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use feedflow::pipeline::{build_tree, Pipeline, Piping};
use feedflow::testing::{sample_catalog, DIRCOPY_ID, SIMPLEDS_ID};

/// A root with `width` chains of `depth` pipings each.
fn wide_pipeline(width: usize, depth: usize) -> Pipeline {
    let catalog = sample_catalog();
    let mut pipeline = Pipeline::new("bench");
    let root = pipeline
        .add_piping(&catalog, "root", DIRCOPY_ID, None, Vec::new())
        .expect("root piping");
    for branch in 0..width {
        let mut previous = root;
        for level in 0..depth {
            previous = pipeline
                .add_piping(
                    &catalog,
                    format!("step-{branch}-{level}"),
                    SIMPLEDS_ID,
                    Some(previous),
                    Vec::new(),
                )
                .expect("piping");
        }
    }
    pipeline
}

fn pipeline_benchmark(c: &mut Criterion) {
    let catalog = sample_catalog();
    let pipeline = wide_pipeline(20, 10);
    let mut shuffled: Vec<Piping> = pipeline.pipings().to_vec();
    shuffled.reverse();

    c.bench_function("build_tree_200_reversed", |b| {
        b.iter(|| build_tree("bench", black_box(&shuffled)))
    });

    c.bench_function("execution_plan_200", |b| {
        b.iter(|| black_box(&pipeline).to_execution_plan(&catalog))
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
