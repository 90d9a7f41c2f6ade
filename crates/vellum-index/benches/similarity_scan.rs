use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::path::Path;
use vellum_index::chunker::{Chunk, ChunkKind, ChunkMetadata, ChunkerConfig, chunk_file};
use vellum_index::record::EmbeddingRecord;
use vellum_index::search::rank;
use vellum_llm::vector::l2_normalize;

const DIMENSIONS: usize = 384;

/// Cheap deterministic pseudo-random unit vectors.
fn vector(seed: usize) -> Vec<f32> {
    let mut state = (seed as u64).wrapping_mul(6_364_136_223_846_793_005) | 1;
    let v = (0..DIMENSIONS)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            ((state >> 33) as f32 / u32::MAX as f32) - 0.25
        })
        .collect();
    l2_normalize(v)
}

fn records(count: usize) -> Vec<EmbeddingRecord> {
    (0..count)
        .map(|i| {
            let chunk = Chunk {
                text: format!("function handler{i}() {{ return {i}; }}"),
                metadata: ChunkMetadata {
                    line_start: 1,
                    line_end: 3,
                    kind: ChunkKind::Function,
                    name: Some(format!("handler{i}")),
                },
            };
            EmbeddingRecord::new(&format!("src/file{}.ts", i / 10), i % 10, chunk, "hash", vector(i))
        })
        .collect()
}

fn top_k_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("top_k_scan");
    let query = vector(usize::MAX / 7);

    for size in [1_000, 10_000, 50_000] {
        let input = records(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("k5", size), &input, |b, input| {
            b.iter(|| rank(black_box(&query), input.clone(), 5));
        });
    }

    group.finish();
}

fn chunk_source(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_file");
    let unit = "\
import { api } from './api';

export async function fetchUser(id: string) {
  const res = await api.get(`/users/${id}`);
  return res.data;
}

interface UserProps {
  id: string;
  name: string;
}
";
    for repeats in [10, 100, 1_000] {
        let input = unit.repeat(repeats);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("typescript", repeats), &input, |b, input| {
            b.iter(|| chunk_file(Path::new("user.ts"), black_box(input), &ChunkerConfig::default()));
        });
    }

    group.finish();
}

criterion_group!(benches, top_k_scan, chunk_source);
criterion_main!(benches);
