//! Benchmarks for list change coalescing.
//!
//! Run with: `cargo bench --package ripple-collections --bench builder_bench`
//!
//! # Performance Baselines
//!
//! These benchmarks establish baselines for:
//! - Coalescing long runs of interleaved primitive edits
//! - Folding a permutation into pending replaced ranges
//! - End-to-end batched mutation with a registered listener

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ripple_collections::builder::ListChangeBuilder;
use ripple_collections::list::ObservableList;
use std::hint::black_box;

fn interleaved_edits(n: usize) -> Option<Vec<ripple_collections::change::ListSubChange<u32>>> {
    let mut builder = ListChangeBuilder::new();
    builder.begin_change();
    let mut len = 0usize;
    for i in 0..n {
        match i % 3 {
            0 => {
                let at = (i * 7) % (len + 1);
                builder.next_add(at, at + 2);
                len += 2;
            }
            1 if len > 0 => {
                let at = (i * 5) % len;
                builder.next_remove(at, i as u32);
                len -= 1;
            }
            _ if len > 0 => {
                builder.next_update((i * 3) % len);
            }
            _ => {}
        }
    }
    builder.end_change()
}

fn bench_interleaved_edits(c: &mut Criterion) {
    let mut group = c.benchmark_group("builder_interleaved");

    for n in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| interleaved_edits(black_box(n)));
        });
    }

    group.finish();
}

fn bench_permutation_fold(c: &mut Criterion) {
    let mut group = c.benchmark_group("builder_permutation_fold");

    for n in [64, 512, 4_096] {
        // Pending adds across the whole range, then a full reversal.
        let mapping: Vec<usize> = (0..n).rev().collect();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut builder: ListChangeBuilder<u32> = ListChangeBuilder::new();
                builder.begin_change();
                builder.next_add(0, n / 2);
                builder.next_permutation(0, n, black_box(&mapping));
                builder.end_change()
            });
        });
    }

    group.finish();
}

fn bench_batched_list_mutation(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_batch");

    for n in [100, 1_000] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let list: ObservableList<u32> = ObservableList::new();
            let _handle = list.listen(|change| {
                black_box(change.changes().len());
            });
            b.iter(|| {
                list.batch(|l| {
                    for i in 0..n as u32 {
                        l.push(i);
                    }
                });
                list.clear();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_interleaved_edits,
    bench_permutation_fold,
    bench_batched_list_mutation,
);

criterion_main!(benches);
