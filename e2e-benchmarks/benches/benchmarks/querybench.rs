use criterion::{black_box, criterion_group, Criterion};

use common::catalog::Catalog;
use common::testutil::{cleanup_test_db, setup_test_db};
use queryexe::execute_sql;
use rand::Rng;
use std::path::PathBuf;

fn gen_rows(n: usize) -> Vec<Vec<i64>> {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| vec![rng.gen_range(0..100), rng.gen_range(0..1000)])
        .collect()
}

fn bench_db(rows: usize) -> PathBuf {
    let a = gen_rows(rows);
    let b = gen_rows(rows);
    setup_test_db(
        &[("TestA", &["A", "B"]), ("TestB", &["A", "B"])],
        &[("TestA", &a), ("TestB", &b)],
    )
}

fn run_query(catalog: &Catalog, sql: &str) {
    let mut out = Vec::new();
    execute_sql(catalog, sql, &mut out).unwrap();
    black_box(out);
}

fn bench_scan_filter(c: &mut Criterion) {
    let dir = bench_db(1000);
    let catalog = Catalog::load(&dir).unwrap();
    c.bench_function("scan_filter_1k", |b| {
        b.iter(|| run_query(&catalog, "SELECT * FROM TestA WHERE TestA.B > 500"))
    });
    cleanup_test_db(&dir);
}

fn bench_join_small(c: &mut Criterion) {
    let dir = bench_db(100);
    let catalog = Catalog::load(&dir).unwrap();
    c.bench_function("join_small", |b| {
        b.iter(|| {
            run_query(
                &catalog,
                "SELECT TestA.B, TestB.B FROM TestA, TestB WHERE TestA.A = TestB.A",
            )
        })
    });
    cleanup_test_db(&dir);
}

fn bench_join_filtered(c: &mut Criterion) {
    let dir = bench_db(200);
    let catalog = Catalog::load(&dir).unwrap();
    c.bench_function("join_filtered", |b| {
        b.iter(|| {
            run_query(
                &catalog,
                "SELECT TestA.B FROM TestA, TestB WHERE TestA.A = TestB.A AND TestA.B > 800 AND TestB.B < 200",
            )
        })
    });
    cleanup_test_db(&dir);
}

fn bench_group_by_sum(c: &mut Criterion) {
    let dir = bench_db(1000);
    let catalog = Catalog::load(&dir).unwrap();
    c.bench_function("group_by_sum_1k", |b| {
        b.iter(|| {
            run_query(
                &catalog,
                "SELECT TestA.A, SUM(TestA.B) FROM TestA GROUP BY TestA.A",
            )
        })
    });
    cleanup_test_db(&dir);
}

fn bench_sort(c: &mut Criterion) {
    let dir = bench_db(1000);
    let catalog = Catalog::load(&dir).unwrap();
    c.bench_function("sort_1k", |b| {
        b.iter(|| run_query(&catalog, "SELECT * FROM TestA ORDER BY TestA.B DESC"))
    });
    cleanup_test_db(&dir);
}

criterion_group! {
    name = querybench;
    config = Criterion::default().sample_size(10);
    targets =
    bench_scan_filter,
    bench_join_small,
    bench_join_filtered,
    bench_group_by_sum,
    bench_sort,
}
