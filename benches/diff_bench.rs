use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};

use bitacora::audit::{diff_snapshots, Snapshot};

fn make_snapshot(fields: usize, revision: usize) -> Snapshot {
    let mut snap = Snapshot::new();
    snap.insert("id".into(), json!(1));
    for i in 0..fields {
        // every tenth field changes between revisions
        let value = if i % 10 == 0 { format!("valor {} r{}", i, revision) } else { format!("valor {}", i) };
        snap.insert(format!("campo_{}", i), Value::from(value));
    }
    snap.insert("relacion".into(), json!({"id": revision, "nombre": "expandida"}));
    snap.insert("estado".into(), json!(true));
    snap.insert("created_at".into(), json!("2025-01-01T00:00:00.000Z"));
    snap.insert("updated_at".into(), Value::from(format!("2025-01-0{}T00:00:00.000Z", revision % 9 + 1)));
    snap
}

fn benchmark_update_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_update");
    for fields in [10usize, 50, 200] {
        let before = make_snapshot(fields, 1);
        let after = make_snapshot(fields, 2);
        group.bench_with_input(BenchmarkId::from_parameter(fields), &fields, |b, _| {
            b.iter(|| diff_snapshots(black_box(Some(&before)), black_box(Some(&after))))
        });
    }
    group.finish();
}

fn benchmark_create_diff(c: &mut Criterion) {
    let after = make_snapshot(50, 1);
    c.bench_function("diff_create_50", |b| {
        b.iter(|| diff_snapshots(black_box(None), black_box(Some(&after))))
    });
}

criterion_group!(benches, benchmark_update_diff, benchmark_create_diff);
criterion_main!(benches);
