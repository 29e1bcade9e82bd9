//! End-to-end scenarios driven through the database facade.

use std::cmp::Ordering;
use std::sync::Arc;

use jogasaki_common::{ErrorCode, ExecutionConfig};
use jogasaki_server::Database;
use jogasaki_sql::catalog::{Column, Index, IndexKey};
use jogasaki_sql::conv::CastContext;
use jogasaki_sql::data::{Triple, Value};
use jogasaki_sql::expr::{evaluate, BuiltinFunction, EvalContext, Expression, Scope};
use jogasaki_sql::meta::FieldType;
use jogasaki_sql::plan::{FindStatement, ScanStatement, WriteKind, WriteStatement};
use jogasaki_sql::Statement;
use jogasaki_test::fixtures::{insert_statement, int_column, ints, TestDatabase};

fn decimal(text: &str) -> Triple {
    text.parse().unwrap()
}

fn assert_decimal(value: &Value, expected: &str) {
    let expected = Value::Decimal(decimal(expected));
    assert_eq!(
        value.compare(&expected),
        Some(Ordering::Equal),
        "{value:?} != {expected:?}"
    );
}

fn table_t(t: &TestDatabase) {
    t.create_table("T", vec![int_column("C0").not_null(), int_column("C1")], &["C0"]);
}

#[test]
fn test_insert_and_select_in_key_order() {
    let t = TestDatabase::new();
    table_t(&t);
    let tx = t.begin();
    let stats = t
        .insert(&tx, "T", vec![ints(&[3, 30]), ints(&[1, 10]), ints(&[2, 20])])
        .unwrap();
    assert_eq!(stats.inserted, 3);
    t.db.commit(&tx).unwrap();

    assert_eq!(
        t.select_all("T"),
        vec![ints(&[1, 10]), ints(&[2, 20]), ints(&[3, 30])]
    );
}

#[test]
fn test_duplicate_key_aborts_second_transaction() {
    let t = TestDatabase::new();
    table_t(&t);
    let tx1 = t.begin();
    t.insert(&tx1, "T", vec![ints(&[1, 10])]).unwrap();
    t.db.commit(&tx1).unwrap();

    let tx2 = t.begin();
    let err = t.insert(&tx2, "T", vec![ints(&[1, 20])]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::UniqueConstraintViolation);
    assert!(!tx2.is_active());
    assert_eq!(t.select_all("T"), vec![ints(&[1, 10])]);
}

#[test]
fn test_missing_not_null_column() {
    let t = TestDatabase::new();
    t.create_table(
        "N",
        vec![int_column("K").not_null(), int_column("C0").not_null()],
        &["K"],
    );
    let tx = t.begin();
    let stmt = Statement::Write(
        WriteStatement::new(WriteKind::Insert, "N", vec![vec![Expression::immediate(1)]])
            .with_columns(["K"]),
    );
    let err = t.run(&tx, stmt).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotNullConstraintViolation);
    assert!(!tx.is_active());
    assert!(t.select_all("N").is_empty());
}

#[test]
fn test_varchar_overflow() {
    let t = TestDatabase::new();
    t.create_table(
        "C",
        vec![
            int_column("K").not_null(),
            Column::new("VC", FieldType::varchar(Some(5))),
            Column::new("CH", FieldType::character(5)),
        ],
        &["K"],
    );
    let tx = t.begin();
    let err = t
        .insert(
            &tx,
            "C",
            vec![vec![Value::Int4(1), Value::from("AAAAAA"), Value::from("AAAAA")]],
        )
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValueTooLong);
    assert!(t.select_all("C").is_empty());
}

#[test]
fn test_round_half_away_from_zero() {
    let round = |x: &str, scale: i32| {
        let expr = Expression::FunctionCall {
            function: BuiltinFunction::Round,
            arguments: vec![
                Expression::immediate(decimal(x)),
                Expression::immediate(scale),
            ],
        };
        evaluate(&expr, &mut EvalContext::new(CastContext::default()), &Scope::new()).unwrap()
    };
    assert_decimal(&round("123.456", 2), "123.46");
    assert_decimal(&round("2.5", 0), "3");
    assert_decimal(&round("-2.5", 0), "-3");
    assert_decimal(&round("1.5", 0), "2");
}

#[test]
fn test_round_stored_through_write_path() {
    let t = TestDatabase::new();
    t.create_table(
        "R",
        vec![
            int_column("K").not_null(),
            Column::new("D", FieldType::decimal(Some(10), Some(2))),
        ],
        &["K"],
    );
    let tx = t.begin();
    let round = Expression::FunctionCall {
        function: BuiltinFunction::Round,
        arguments: vec![
            Expression::immediate(decimal("123.456")),
            Expression::immediate(2),
        ],
    };
    let stmt = Statement::Write(WriteStatement::new(
        WriteKind::Insert,
        "R",
        vec![vec![Expression::immediate(1), round]],
    ));
    t.run(&tx, stmt).unwrap();
    t.db.commit(&tx).unwrap();
    let rows = t.select_all("R");
    assert_eq!(rows.len(), 1);
    assert_decimal(&rows[0][1], "123.46");
}

#[test]
fn test_restart_restores_rows_and_catalog() {
    let t = TestDatabase::new();
    table_t(&t);
    t.db.create_index(&Index::secondary("T_C1", "T", vec![IndexKey::desc("C1")]))
        .unwrap();
    let tx = t.begin();
    t.insert(&tx, "T", vec![ints(&[1, 10]), ints(&[2, 20]), ints(&[3, 30])])
        .unwrap();
    t.db.commit(&tx).unwrap();

    t.db.stop();
    let summary = t.db.start().unwrap();
    assert_eq!((summary.tables, summary.indexes), (1, 1));
    assert_eq!(
        t.select_all("T"),
        vec![ints(&[1, 10]), ints(&[2, 20]), ints(&[3, 30])]
    );

    let tx = t.begin();
    let by_c1 = t
        .run(&tx, Statement::Scan(ScanStatement::new("T_C1")))
        .unwrap();
    let firsts: Vec<Value> = by_c1
        .rows()
        .unwrap()
        .rows()
        .iter()
        .map(|r| r[0].clone())
        .collect();
    assert_eq!(firsts, ints(&[3, 2, 1]));
    t.db.commit(&tx).unwrap();
}

#[test]
fn test_new_process_over_same_storage() {
    let t = TestDatabase::new();
    table_t(&t);
    let tx = t.begin();
    t.insert(&tx, "T", vec![ints(&[5, 50])]).unwrap();
    t.db.commit(&tx).unwrap();
    t.db.stop();

    let db = Database::open(Arc::clone(t.db.kvs()), ExecutionConfig::for_testing()).unwrap();
    db.start().unwrap();
    let t2 = TestDatabase { db };
    assert_eq!(t2.select_all("T"), vec![ints(&[5, 50])]);
}

#[test]
fn test_row_id_table_survives_restart() {
    let t = TestDatabase::new();
    t.create_table("H", vec![int_column("V")], &[]);
    let tx = t.begin();
    t.insert(&tx, "H", vec![ints(&[1]), ints(&[2])]).unwrap();
    t.db.commit(&tx).unwrap();

    t.db.stop();
    t.db.start().unwrap();

    let tx = t.begin();
    t.insert(&tx, "H", vec![ints(&[3])]).unwrap();
    t.db.commit(&tx).unwrap();
    let mut values: Vec<Value> = t.select_all("H").into_iter().map(|r| r[0].clone()).collect();
    values.sort_by(|a, b| a.compare(b).unwrap_or(Ordering::Equal));
    assert_eq!(values, ints(&[1, 2, 3]));
}

#[test]
fn test_upsert_and_insert_skip_statistics() {
    let t = TestDatabase::new();
    table_t(&t);
    let tx = t.begin();
    t.insert(&tx, "T", vec![ints(&[1, 10])]).unwrap();

    let upsert = insert_statement(WriteKind::InsertOrReplace, "T", vec![ints(&[1, 11]), ints(&[2, 20])]);
    let stats = *t.run(&tx, upsert).unwrap().statistics().unwrap();
    assert_eq!(stats.merged, 2);

    let skip = insert_statement(WriteKind::InsertSkip, "T", vec![ints(&[1, 99]), ints(&[3, 30])]);
    let stats = *t.run(&tx, skip).unwrap().statistics().unwrap();
    assert_eq!(stats.inserted, 1);
    t.db.commit(&tx).unwrap();

    assert_eq!(
        t.select_all("T"),
        vec![ints(&[1, 11]), ints(&[2, 20]), ints(&[3, 30])]
    );
}

#[test]
fn test_point_lookup() {
    let t = TestDatabase::new();
    table_t(&t);
    let tx = t.begin();
    t.insert(&tx, "T", vec![ints(&[1, 10]), ints(&[2, 20])]).unwrap();
    let hit = t
        .run(&tx, Statement::Find(FindStatement::new("T", vec![Expression::immediate(2)])))
        .unwrap();
    assert_eq!(hit.rows().unwrap().rows(), &[ints(&[2, 20])]);
    let miss = t
        .run(&tx, Statement::Find(FindStatement::new("T", vec![Expression::immediate(9)])))
        .unwrap();
    assert!(miss.rows().unwrap().is_empty());
    t.db.commit(&tx).unwrap();
}

#[test]
fn test_upsert_with_secondaries_requires_flag() {
    let t = TestDatabase::new();
    table_t(&t);
    t.db.create_index(&Index::secondary("T_C1", "T", vec![IndexKey::asc("C1")]))
        .unwrap();
    let tx = t.begin();
    let err = t
        .run(&tx, insert_statement(WriteKind::InsertOrReplace, "T", vec![ints(&[1, 10])]))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnsupportedRuntimeFeature);

    let config = ExecutionConfig {
        support_upsert_with_secondaries: true,
        ..ExecutionConfig::for_testing()
    };
    let t = TestDatabase::with_config(config);
    table_t(&t);
    t.db.create_index(&Index::secondary("T_C1", "T", vec![IndexKey::asc("C1")]))
        .unwrap();
    let tx = t.begin();
    t.insert(&tx, "T", vec![ints(&[1, 10])]).unwrap();
    t.run(&tx, insert_statement(WriteKind::InsertOrReplace, "T", vec![ints(&[1, 15])]))
        .unwrap();
    let by_c1 = t.run(&tx, Statement::Scan(ScanStatement::new("T_C1"))).unwrap();
    assert_eq!(by_c1.rows().unwrap().rows(), &[ints(&[1, 15])]);
    t.db.commit(&tx).unwrap();
}
