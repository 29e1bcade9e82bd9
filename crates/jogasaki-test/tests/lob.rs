//! Large object registration through the write path.

use std::io::Write;

use jogasaki_kvs::BlobContent;
use jogasaki_sql::catalog::Column;
use jogasaki_sql::data::{BlobReference, ClobReference, LobLocator, Value};
use jogasaki_sql::meta::FieldType;
use jogasaki_test::fixtures::{int_column, TestDatabase};

fn lob_table(t: &TestDatabase) {
    t.create_table(
        "L",
        vec![
            int_column("K").not_null(),
            Column::new("B", FieldType::Blob),
            Column::new("C", FieldType::Clob),
        ],
        &["K"],
    );
}

#[test]
fn test_file_blob_is_published_on_commit() {
    let t = TestDatabase::new();
    lob_table(&t);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"blob payload").unwrap();

    let tx = t.begin();
    let blob = BlobReference::provided(LobLocator::File {
        path: file.path().to_path_buf(),
        temporary: false,
    });
    let clob = ClobReference::provided(LobLocator::Data(bytes_of("clob payload")));
    t.insert(
        &tx,
        "L",
        vec![vec![Value::Int4(1), Value::Blob(blob), Value::Clob(clob)]],
    )
    .unwrap();
    t.db.commit(&tx).unwrap();

    let rows = t.select_all("L");
    assert_eq!(rows.len(), 1);
    let Value::Blob(stored) = &rows[0][1] else {
        panic!("unexpected {:?}", rows[0][1]);
    };
    match t.db.kvs().get_blob(stored.id()).unwrap() {
        BlobContent::File { path, .. } => assert_eq!(path, file.path()),
        other => panic!("unexpected {other:?}"),
    }
    let Value::Clob(stored) = &rows[0][2] else {
        panic!("unexpected {:?}", rows[0][2]);
    };
    match t.db.kvs().get_blob(stored.id()).unwrap() {
        BlobContent::Data(data) => assert_eq!(&data[..], b"clob payload"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_missing_blob_file_fails_the_statement() {
    let t = TestDatabase::new();
    lob_table(&t);
    let dir = tempfile::tempdir().unwrap();
    let blob = BlobReference::provided(LobLocator::File {
        path: dir.path().join("absent.bin"),
        temporary: false,
    });
    let tx = t.begin();
    let err = t
        .insert(&tx, "L", vec![vec![Value::Int4(1), Value::Blob(blob), Value::Null]])
        .unwrap_err();
    assert_eq!(err.code(), jogasaki_common::ErrorCode::StorageIoError);
    assert!(!tx.is_active());
    assert!(t.select_all("L").is_empty());
}

fn bytes_of(text: &str) -> bytes::Bytes {
    bytes::Bytes::copy_from_slice(text.as_bytes())
}
