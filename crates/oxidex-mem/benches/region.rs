//! Region allocator and segmented stack performance benchmarks.
//!
//! Measures the cost of the two allocation strategies (bump, first-fit
//! reuse) and of crossing a stack chunk boundary on `push`/`pop`/`get`.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use oxidex_mem::region::Region;
use oxidex_mem::stack::Stack;

fn bench_bump_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("bump_allocation");

    for size in [16, 64, 256].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut region = Region::new(1 << 20);
                for _ in 0..1000 {
                    black_box(region.alloc_object(size).unwrap());
                }
            });
        });
    }

    group.finish();
}

fn bench_first_fit_reuse(c: &mut Criterion) {
    c.bench_function("first_fit_reuse", |b| {
        b.iter(|| {
            let mut region = Region::new(4096);
            let mut ptrs = Vec::new();
            loop {
                match region.alloc_object(32) {
                    Ok(ptr) => ptrs.push(ptr),
                    Err(_) => break,
                }
            }
            for ptr in &ptrs {
                ptr.free().unwrap();
            }
            for _ in 0..ptrs.len() {
                black_box(region.alloc_object(32).unwrap());
            }
        });
    });
}

fn bench_push_pop(c: &mut Criterion) {
    c.bench_function("push_pop_roundtrip", |b| {
        let mut stack = Stack::new();
        b.iter(|| {
            stack.push(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
            let mut out = [0u8; 8];
            stack.pop(&mut out).unwrap();
            black_box(out);
        });
    });
}

fn bench_get_across_chunk_boundary(c: &mut Criterion) {
    c.bench_function("get_across_chunk_boundary", |b| {
        let mut stack = Stack::new();
        stack.push(&[0xAA; 8]).unwrap();
        for _ in 0..(4096 / 8) {
            stack.push(&[0; 8]).unwrap();
        }
        b.iter(|| {
            let mut out = [0u8; 8];
            stack.get(4096, &mut out).unwrap();
            black_box(out);
        });
    });
}

criterion_group!(
    benches,
    bench_bump_allocation,
    bench_first_fit_reuse,
    bench_push_pop,
    bench_get_across_chunk_boundary
);
criterion_main!(benches);
