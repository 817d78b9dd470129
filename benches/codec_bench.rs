//! Benchmarks for RUStore codec and store operations

use std::io::Cursor;

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rustore::protocol::{encode_request, read_request, Request};
use rustore::ObjectStore;

fn codec_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for size in [64usize, 4 * 1024, 1024 * 1024] {
        let request = Request::Put {
            key: "bench-key".to_string(),
            data: Bytes::from(vec![0xA5; size]),
        };
        let encoded = encode_request(&request);
        group.throughput(Throughput::Bytes(encoded.len() as u64));

        group.bench_function(format!("encode_put_{}", size), |b| {
            b.iter(|| encode_request(black_box(&request)))
        });

        group.bench_function(format!("read_put_{}", size), |b| {
            b.iter(|| {
                let mut cursor = Cursor::new(&encoded[..]);
                read_request(&mut cursor, u32::MAX).unwrap()
            })
        });
    }

    group.finish();
}

fn store_benchmarks(c: &mut Criterion) {
    let store = ObjectStore::new();
    for i in 0..10_000 {
        store.put(format!("key{:05}", i), vec![0u8; 128]);
    }

    c.bench_function("store_get_hit", |b| {
        b.iter(|| store.get(black_box("key04242")))
    });

    c.bench_function("store_list_10k", |b| b.iter(|| store.list()));
}

criterion_group!(benches, codec_benchmarks, store_benchmarks);
criterion_main!(benches);
