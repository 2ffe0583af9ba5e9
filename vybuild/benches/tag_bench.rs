//! Benchmarks for tag calculation and dependency extraction.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::HashSet;
use vybuild::pipeline::{calculate_tag, BuildArgTable};
use vybuild::recipe::extract_dependencies;
use vybuild::stages::StageName;

const RECIPE: &str = r#"
ARG BASE_IMAGE=debian:bookworm
FROM ${BASE_IMAGE} AS runtime
ARG PROFILE=release
ARG FEATURES
# build the service
FROM --platform=linux/amd64 toolchain AS build
COPY --from=protos /out /src/protos
RUN --mount=type=secret,id=registry-token \
    cargo build --profile "${PROFILE}" --features "${FEATURES}"
FROM runtime
COPY --from=build /src/target/release/svc /usr/local/bin/svc
"#;

fn tag_benchmark(c: &mut Criterion) {
    let stage = StageName::from("Service");
    let table: BuildArgTable = (0..32).map(|i| (format!("KEY_{i}"), format!("value/{i}"))).collect();
    let keys: Vec<String> = (0..32).step_by(2).map(|i| format!("KEY_{i}")).collect();

    c.bench_function("calculate_tag", |b| {
        b.iter(|| calculate_tag(black_box(&stage), keys.iter().map(String::as_str), black_box(&table)));
    });
}

fn extract_benchmark(c: &mut Criterion) {
    let stage = StageName::from("svc");
    let local: HashSet<StageName> = ["toolchain", "protos", "runtime"]
        .into_iter()
        .map(StageName::from)
        .collect();

    c.bench_function("extract_dependencies", |b| {
        b.iter(|| extract_dependencies(black_box(RECIPE), &stage, black_box(&local)));
    });
}

criterion_group!(benches, tag_benchmark, extract_benchmark);
criterion_main!(benches);
