//! Document throughput benchmarks: append, scan, and update over one
//! collection.
//!
//! ```bash
//! cargo bench --bench documents
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tempfile::tempdir;

use kistdb::{Database, Document};

fn sample(i: i32) -> Document {
    Document::builder()
        .field("n", i)
        .unwrap()
        .field("awesome", true)
        .unwrap()
        .finish()
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");
    group.throughput(Throughput::Elements(1000));
    group.bench_function("1000_documents", |b| {
        b.iter(|| {
            let dir = tempdir().unwrap();
            let mut db = Database::open(dir.path().join("bench.db")).unwrap();
            let mut col = db.make_collection("bench").unwrap();
            for i in 0..1000 {
                col.append(black_box(&sample(i))).unwrap();
            }
        })
    });
    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let mut db = Database::open(dir.path().join("bench.db")).unwrap();
    {
        let mut col = db.make_collection("bench").unwrap();
        for i in 0..1000 {
            col.append(&sample(i)).unwrap();
        }
    }

    let mut group = c.benchmark_group("scan");
    group.throughput(Throughput::Elements(1000));
    group.bench_function("1000_documents", |b| {
        b.iter(|| {
            let mut col = db.collection("bench").unwrap().unwrap();
            assert_eq!(col.iterate().map(black_box).count(), 1000);
        })
    });
    group.finish();
}

fn bench_update_in_place(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let mut db = Database::open(dir.path().join("bench.db")).unwrap();
    {
        let mut col = db.make_collection("bench").unwrap();
        for _ in 0..100 {
            col.append(&sample(1)).unwrap();
        }
    }

    let filter = sample(1);
    let replacement = sample(2);
    let back = sample(1);

    c.bench_function("update_in_place_100", |b| {
        b.iter(|| {
            let mut col = db.collection("bench").unwrap().unwrap();
            col.update(black_box(&filter), black_box(&replacement)).unwrap();
            col.update(black_box(&replacement), black_box(&back)).unwrap();
        })
    });
}

criterion_group!(benches, bench_append, bench_scan, bench_update_in_place);
criterion_main!(benches);
