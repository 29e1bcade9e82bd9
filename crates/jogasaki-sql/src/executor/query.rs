//! Index reads: prefix scans and primary key lookups.
//!
//! Secondary scans decode the secondary key, rebuild the primary key from
//! its trailing fields and fetch the row from the primary index.

use std::sync::Arc;

use jogasaki_common::{ErrorCode, ErrorInfo, JogasakiResult, Key};
use jogasaki_kvs::ScanRange;
use tracing::debug;

use super::context::RequestContext;
use super::layout::{decode_row, PrimaryTarget, SecondaryTarget};
use crate::accessor::RecordRef;
use crate::catalog::Table;
use crate::codec::{encode_with_retry, RecordCodec};
use crate::conv::assign;
use crate::data::Value;
use crate::expr::{evaluate, EvalContext, Expression, Scope};
use crate::meta::FieldType;
use crate::plan::{BlockScope, FindStatement, ScanStatement};

/// Rows produced by a query, with the variables naming its columns.
#[derive(Debug, Clone)]
pub struct ResultSet {
    scope: BlockScope,
    rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Output columns.
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.scope.names()
    }

    /// Position of output column `name`.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.scope.index_of(name)
    }

    /// Output layout.
    #[must_use]
    pub fn scope(&self) -> &BlockScope {
        &self.scope
    }

    /// Rows in index order.
    #[inline]
    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if no row was produced.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Takes the rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }
}

/// Projection of table rows onto output columns.
struct Projection {
    positions: Vec<usize>,
    scope: BlockScope,
}

impl Projection {
    fn new(table: &Table, columns: &[String]) -> JogasakiResult<Self> {
        let positions: Vec<usize> = if columns.is_empty() {
            (0..table.columns().len())
                .filter(|&i| !table.columns()[i].is_hidden())
                .collect()
        } else {
            columns
                .iter()
                .map(|name| {
                    table.column_index(name).ok_or_else(|| {
                        ErrorInfo::new(
                            ErrorCode::SymbolAnalyze,
                            format!("column '{name}' not found in table '{}'", table.name()),
                        )
                    })
                })
                .collect::<JogasakiResult<_>>()?
        };
        let defined = positions
            .iter()
            .map(|&i| {
                let c = &table.columns()[i];
                (c.name().to_string(), *c.field_type())
            })
            .collect();
        Ok(Self {
            positions,
            scope: BlockScope::new(defined, &[]),
        })
    }

    fn apply(&self, mut row: Vec<Value>) -> Vec<Value> {
        self.positions
            .iter()
            .map(|&i| std::mem::take(&mut row[i]))
            .collect()
    }

    fn finish(self, rows: Vec<Vec<Value>>) -> ResultSet {
        ResultSet {
            scope: self.scope,
            rows,
        }
    }
}

/// Evaluates key expressions for the leading key columns of `codec` and
/// encodes them. Each value is assigned to its column type first.
fn encode_key_prefix(
    ctx: &RequestContext,
    table: &Table,
    codec: &RecordCodec,
    exprs: &[Expression],
    host: RecordRef<'_>,
) -> JogasakiResult<Vec<u8>> {
    if exprs.len() > codec.ops().len() {
        return Err(ErrorInfo::new(
            ErrorCode::SymbolAnalyze,
            format!(
                "{} key values given for {} key columns",
                exprs.len(),
                codec.ops().len()
            ),
        ));
    }
    let mut eval = EvalContext::new(ctx.cast_context());
    let scope = Scope::new().with_host_variables(host);
    let mut row = vec![Value::Null; table.columns().len()];
    for (op, expr) in codec.ops().iter().zip(exprs) {
        let value = evaluate(expr, &mut eval, &scope)?;
        row[op.index()] = if value.is_null() {
            Value::Null
        } else {
            let source = FieldType::from(value.kind());
            assign(&value, &source, op.field_type(), eval.cast_context_mut())?
        };
    }
    let prefix = RecordCodec::new(codec.ops()[..exprs.len()].to_vec());
    let mut buf = Vec::new();
    encode_with_retry(&mut buf, |out| prefix.encode_values(&row, out))?;
    Ok(buf)
}

/// Reads `statement.index` in key order, bounded by the key prefix.
///
/// The index name may also be a table name, which reads its primary index.
pub fn scan(
    ctx: &RequestContext,
    statement: &ScanStatement,
    host: RecordRef<'_>,
) -> JogasakiResult<ResultSet> {
    let provider = ctx.provider();
    let index = provider
        .find_index(&statement.index)
        .or_else(|| provider.find_primary_index(&statement.index))
        .ok_or_else(|| {
            ErrorInfo::target_not_found(format!("index '{}' not found", statement.index))
        })?;
    let table = find_table(ctx, index.table_name())?;
    let projection = Projection::new(&table, &statement.columns)?;
    let primary = PrimaryTarget::open(ctx, &table)?;
    let tx = Arc::clone(ctx.transaction()?);

    let secondary = if index.is_primary() {
        None
    } else {
        Some(SecondaryTarget::open(ctx, &table, Arc::clone(&index), &primary.index)?)
    };
    let (storage, key_codec) = match &secondary {
        Some(s) => (&s.storage, &s.key),
        None => (&primary.storage, &primary.key),
    };
    let range = if statement.prefix.is_empty() {
        ScanRange::all()
    } else {
        let prefix = encode_key_prefix(ctx, &table, key_codec, &statement.prefix, host)?;
        ScanRange::prefix(Key::from_vec(prefix))
    };

    ctx.check_canceled()?;
    let column_count = table.columns().len();
    let mut rows = Vec::new();
    let mut pk_buf = Vec::new();
    for (key, value) in tx.scan(storage, &range)? {
        let row = match &secondary {
            None => decode_row(column_count, &primary.key, &primary.value, &key, &value)?,
            Some(s) => {
                let mut keys = vec![Value::Null; column_count];
                for (op, v) in s.key.ops().iter().zip(s.key.decode_values(&key)?) {
                    keys[op.index()] = v;
                }
                encode_with_retry(&mut pk_buf, |out| primary.key.encode_values(&keys, out))?;
                ctx.check_canceled()?;
                let Some(value) = tx.get(&primary.storage, &pk_buf)? else {
                    return Err(ErrorInfo::new(
                        ErrorCode::DataCorruption,
                        format!(
                            "secondary index '{}' refers to a missing row",
                            index.name()
                        ),
                    ));
                };
                decode_row(column_count, &primary.key, &primary.value, &pk_buf, &value)?
            }
        };
        rows.push(projection.apply(row));
    }
    debug!(index = index.name(), rows = rows.len(), "scan completed");
    Ok(projection.finish(rows))
}

/// Looks up one row by its full primary key.
pub fn find(
    ctx: &RequestContext,
    statement: &FindStatement,
    host: RecordRef<'_>,
) -> JogasakiResult<ResultSet> {
    let table = find_table(ctx, &statement.table)?;
    let projection = Projection::new(&table, &statement.columns)?;
    let primary = PrimaryTarget::open(ctx, &table)?;
    if statement.key.len() != primary.key.ops().len() {
        return Err(ErrorInfo::new(
            ErrorCode::SymbolAnalyze,
            format!(
                "primary key of '{}' has {} columns, got {}",
                table.name(),
                primary.key.ops().len(),
                statement.key.len()
            ),
        ));
    }
    let key = encode_key_prefix(ctx, &table, &primary.key, &statement.key, host)?;
    let tx = ctx.transaction()?;
    ctx.check_canceled()?;
    let rows = match tx.get(&primary.storage, &key)? {
        Some(value) => vec![projection.apply(decode_row(
            table.columns().len(),
            &primary.key,
            &primary.value,
            &key,
            &value,
        )?)],
        None => Vec::new(),
    };
    Ok(projection.finish(rows))
}

fn find_table(ctx: &RequestContext, name: &str) -> JogasakiResult<Arc<Table>> {
    ctx.provider()
        .find_table(name)
        .ok_or_else(|| ErrorInfo::target_not_found(format!("table '{name}' not found")))
}

#[cfg(test)]
mod tests {
    use jogasaki_common::ExecutionConfig;
    use jogasaki_kvs::{KvsDatabase, TransactionOptions};

    use super::*;
    use crate::accessor::RecordBuffer;
    use crate::catalog::{Column, Index, IndexKey, StorageProvider};
    use crate::executor::write::WritePipeline;
    use crate::meta::RecordMeta;
    use crate::plan::{WriteKind, WriteStatement};
    use crate::sequence::SequenceManager;

    fn setup() -> (RequestContext, Arc<jogasaki_kvs::Transaction>) {
        let kvs = Arc::new(KvsDatabase::new());
        let provider = Arc::new(StorageProvider::new());
        let table = provider
            .add_table(
                Table::new(
                    "T",
                    vec![
                        Column::new("A", FieldType::Int4).not_null(),
                        Column::new("B", FieldType::Int8).not_null(),
                        Column::new("V", FieldType::varchar(None)),
                    ],
                ),
                false,
            )
            .unwrap();
        let primary = provider
            .add_index(
                Index::primary(&table, vec![IndexKey::asc("A"), IndexKey::desc("B")]),
                false,
            )
            .unwrap();
        let secondary = provider
            .add_index(Index::secondary("T_V", "T", vec![IndexKey::asc("V")]), false)
            .unwrap();
        kvs.get_or_create_storage(primary.storage_name());
        kvs.get_or_create_storage(secondary.storage_name());
        let tx = kvs.begin(TransactionOptions::short()).unwrap();
        let mut ctx = RequestContext::new(
            Arc::new(ExecutionConfig::for_testing()),
            provider,
            Arc::new(SequenceManager::new(Arc::clone(&kvs))),
            kvs,
        )
        .with_transaction(Arc::clone(&tx));

        let rows = [(1, 1, "c"), (1, 2, "b"), (2, 1, "a")];
        let tuples = rows
            .iter()
            .map(|&(a, b, v)| {
                vec![
                    Expression::immediate(a),
                    Expression::immediate(i64::from(b)),
                    Expression::immediate(v),
                ]
            })
            .collect::<Vec<_>>();
        let stmt = WriteStatement::new(WriteKind::Insert, "T", tuples);
        let empty = RecordBuffer::new(RecordMeta::new(Vec::new()).shared());
        WritePipeline::new(&ctx, &stmt)
            .unwrap()
            .run(&mut ctx, &stmt.tuples, empty.as_record_ref())
            .unwrap();
        (ctx, tx)
    }

    fn empty_host() -> RecordBuffer {
        RecordBuffer::new(RecordMeta::new(Vec::new()).shared())
    }

    #[test]
    fn test_full_scan_in_key_order() {
        let (ctx, _tx) = setup();
        let host = empty_host();
        let rs = scan(&ctx, &ScanStatement::new("T"), host.as_record_ref()).unwrap();
        assert_eq!(rs.columns(), &["A", "B", "V"]);
        let keys: Vec<_> = rs
            .rows()
            .iter()
            .map(|r| (r[0].clone(), r[1].clone()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (Value::Int4(1), Value::Int8(2)),
                (Value::Int4(1), Value::Int8(1)),
                (Value::Int4(2), Value::Int8(1)),
            ]
        );
    }

    #[test]
    fn test_prefix_scan() {
        let (ctx, _tx) = setup();
        let host = empty_host();
        let stmt = ScanStatement::new("T")
            .with_prefix(vec![Expression::immediate(1i64)])
            .with_columns(["V"]);
        let rs = scan(&ctx, &stmt, host.as_record_ref()).unwrap();
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.column_index("V"), Some(0));
        assert_eq!(rs.rows()[0], vec![Value::Character("b".into())]);
    }

    #[test]
    fn test_secondary_scan_fetches_rows() {
        let (ctx, _tx) = setup();
        let host = empty_host();
        let rs = scan(&ctx, &ScanStatement::new("T_V"), host.as_record_ref()).unwrap();
        let v: Vec<_> = rs.rows().iter().map(|r| r[2].clone()).collect();
        assert_eq!(
            v,
            vec![
                Value::Character("a".into()),
                Value::Character("b".into()),
                Value::Character("c".into())
            ]
        );
        assert_eq!(rs.rows()[0][0], Value::Int4(2));
    }

    #[test]
    fn test_find() {
        let (ctx, _tx) = setup();
        let host = empty_host();
        let hit = FindStatement::new(
            "T",
            vec![Expression::immediate(1), Expression::immediate(2i64)],
        );
        let rs = find(&ctx, &hit, host.as_record_ref()).unwrap();
        assert_eq!(rs.len(), 1);
        assert_eq!(rs.rows()[0][2], Value::Character("b".into()));

        let miss = FindStatement::new(
            "T",
            vec![Expression::immediate(9), Expression::immediate(9i64)],
        );
        assert!(find(&ctx, &miss, host.as_record_ref()).unwrap().is_empty());
    }

    #[test]
    fn test_find_requires_full_key() {
        let (ctx, _tx) = setup();
        let host = empty_host();
        let stmt = FindStatement::new("T", vec![Expression::immediate(1)]);
        let err = find(&ctx, &stmt, host.as_record_ref()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SymbolAnalyze);
    }

    #[test]
    fn test_unknown_targets() {
        let (ctx, _tx) = setup();
        let host = empty_host();
        assert_eq!(
            scan(&ctx, &ScanStatement::new("nope"), host.as_record_ref())
                .unwrap_err()
                .code(),
            ErrorCode::TargetNotFound
        );
        let stmt = ScanStatement::new("T").with_columns(["Z"]);
        assert_eq!(
            scan(&ctx, &stmt, host.as_record_ref()).unwrap_err().code(),
            ErrorCode::SymbolAnalyze
        );
    }
}
