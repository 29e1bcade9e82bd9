//! Write path benchmarks.
//!
//! Each iteration inserts a batch of rows into a fresh database through
//! prepare, resolve and execute.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use jogasaki_bench::utils::{bench_table, generate_rows};
use jogasaki_common::ExecutionConfig;
use jogasaki_kvs::{KvsDatabase, TransactionOptions};
use jogasaki_server::Database;
use jogasaki_sql::expr::Expression;
use jogasaki_sql::plan::{WriteKind, WriteStatement};
use jogasaki_sql::{Parameters, Statement, VariableTable};

fn fresh_database() -> Database {
    let db = Database::open(Arc::new(KvsDatabase::new()), ExecutionConfig::default()).unwrap();
    db.start().unwrap();
    db.create_table(&bench_table()).unwrap();
    db
}

/// Benchmark multi-row INSERT statements of different sizes.
fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("write/insert");

    for size in [100usize, 1_000, 10_000] {
        let tuples: Vec<Vec<Expression>> = generate_rows(size)
            .into_iter()
            .map(|row| row.into_iter().map(Expression::Immediate).collect())
            .collect();
        let statement = Statement::Write(WriteStatement::new(WriteKind::Insert, "BENCH", tuples));

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &statement, |b, statement| {
            b.iter_batched(
                fresh_database,
                |db| {
                    let handle = db.prepare(statement.clone(), VariableTable::new());
                    let exe = db.resolve(handle, &Parameters::new()).unwrap();
                    let result = db
                        .transaction(TransactionOptions::short(), |tx| db.execute(tx, &exe))
                        .unwrap();
                    black_box(result)
                },
                BatchSize::PerIteration,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert);
criterion_main!(benches);
