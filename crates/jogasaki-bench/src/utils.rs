//! Benchmark fixtures.

use jogasaki_sql::catalog::{Column, IndexKey, Table};
use jogasaki_sql::codec::{CodingSpec, FieldOp, RecordCodec};
use jogasaki_sql::data::{Triple, Value};
use jogasaki_sql::meta::FieldType;
use jogasaki_sql::plan::CreateTableStatement;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Column types of the benchmark table `BENCH`.
pub fn bench_types() -> Vec<FieldType> {
    vec![
        FieldType::Int8,
        FieldType::varchar(Some(32)),
        FieldType::decimal(Some(15), Some(2)),
        FieldType::Float8,
    ]
}

/// `CREATE TABLE BENCH(K BIGINT PRIMARY KEY, NAME VARCHAR(32), PRICE DECIMAL(15,2), SCORE DOUBLE)`.
pub fn bench_table() -> CreateTableStatement {
    let names = ["K", "NAME", "PRICE", "SCORE"];
    let columns = names
        .iter()
        .zip(bench_types())
        .enumerate()
        .map(|(i, (name, ty))| {
            let col = Column::new(*name, ty);
            if i == 0 {
                col.not_null()
            } else {
                col
            }
        })
        .collect();
    CreateTableStatement::new(Table::new("BENCH", columns), vec![IndexKey::asc("K")])
}

/// Generates a random alphanumeric string.
pub fn random_string(rng: &mut StdRng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generates `count` rows for `BENCH` with sequential keys.
pub fn generate_rows(count: usize) -> Vec<Vec<Value>> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|i| {
            let len = rng.gen_range(4..32);
            vec![
                Value::Int8(i as i64),
                Value::Character(random_string(&mut rng, len)),
                Value::Decimal(Triple::new(1, rng.gen_range(1..10_000_000), -2)),
                Value::Float8(rng.gen()),
            ]
        })
        .collect()
}

/// Codec over every column of a row, in `spec`.
pub fn row_codec(spec: CodingSpec) -> RecordCodec {
    let ops = bench_types()
        .into_iter()
        .enumerate()
        .filter_map(|(i, ty)| FieldOp::new(i, ty, true, spec).ok())
        .collect();
    RecordCodec::new(ops)
}
