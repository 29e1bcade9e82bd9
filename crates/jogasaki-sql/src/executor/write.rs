//! Write pipeline.
//!
//! Turns the tuples of an insert statement into primary and secondary index
//! entries. Each tuple walks the same states:
//!
//! ```text
//!   Ready -> EvaluatingTuple -> Encoding -> PutPrimary -> PutSecondaries -+
//!              ^                                                          |
//!              +------------------------- next tuple ---------------------+
//!
//!   any error -> abort transaction -> TerminalError      all tuples -> Done
//! ```
//!
//! Column values come from the tuple's expression or, for columns the
//! statement does not name, from the column default. Each value is coerced
//! to the column type with assignment rules and stored into a record laid
//! out by the table's columns; the index codecs read from that record.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jogasaki_common::memory::LifoArena;
use jogasaki_common::{BlobId, ErrorCode, ErrorInfo, JogasakiResult};
use jogasaki_kvs::{KvsError, PutOption, Transaction};
use tracing::{debug, trace};

use super::context::RequestContext;
use super::layout::{decode_row, PrimaryTarget, SecondaryTarget};
use crate::accessor::{RecordBuffer, RecordRef};
use crate::catalog::{Column, ColumnDefault, DefaultFunction, Table};
use crate::codec::encode_with_retry;
use crate::conv::assign;
use crate::data::{BlobReference, ClobReference, LobLocator, LobProvenance, TimePoint, Value};
use crate::expr::{evaluate_typed, EvalContext, Expression, Scope};
use crate::meta::{FieldType, RecordMeta};
use crate::plan::{WriteKind, WriteStatement};

/// Position of a write in its per-tuple cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteState {
    /// Nothing processed yet.
    Ready,
    /// Computing column values.
    EvaluatingTuple,
    /// Building key and value bytes.
    Encoding,
    /// Writing the primary entry.
    PutPrimary,
    /// Writing secondary entries.
    PutSecondaries,
    /// Every tuple written.
    Done,
    /// Stopped by an error; the transaction was aborted.
    TerminalError,
}

impl WriteState {
    /// Returns true for `Done` and `TerminalError`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, WriteState::Done | WriteState::TerminalError)
    }
}

/// Row counts of one statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStatistics {
    /// Rows created.
    pub inserted: u64,
    /// Rows written by an upsert.
    pub merged: u64,
    /// Rows updated.
    pub updated: u64,
    /// Rows deleted.
    pub deleted: u64,
}

impl WriteStatistics {
    /// Sum of all counters.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.inserted + self.merged + self.updated + self.deleted
    }

    /// Adds `other` into `self`.
    pub fn merge(&mut self, other: &WriteStatistics) {
        self.inserted += other.inserted;
        self.merged += other.merged;
        self.updated += other.updated;
        self.deleted += other.deleted;
    }
}

/// Executes one write statement.
#[derive(Debug)]
pub struct WritePipeline {
    kind: WriteKind,
    table: Arc<Table>,
    primary: PrimaryTarget,
    secondaries: Vec<SecondaryTarget>,
    /// Tuple position feeding each table column.
    sources: Vec<Option<usize>>,
    arity: usize,
    record: RecordBuffer,
    state: WriteState,
    statistics: WriteStatistics,
    key_buf: Vec<u8>,
    value_buf: Vec<u8>,
    secondary_buf: Vec<u8>,
    statement_time: TimePoint,
}

impl WritePipeline {
    /// Prepares the pipeline for `statement`.
    ///
    /// Fails without touching the transaction when the target table or a
    /// column is unknown, or when the statement is an upsert on a table
    /// with secondary indexes and upserts there are not enabled.
    pub fn new(ctx: &RequestContext, statement: &WriteStatement) -> JogasakiResult<Self> {
        let table = ctx.provider().find_table(&statement.table).ok_or_else(|| {
            ErrorInfo::target_not_found(format!("table '{}' not found", statement.table))
        })?;
        let primary = PrimaryTarget::open(ctx, &table)?;
        let secondaries = SecondaryTarget::open_all(ctx, &table, &primary.index)?;
        if statement.kind == WriteKind::InsertOrReplace
            && !secondaries.is_empty()
            && !ctx.config().support_upsert_with_secondaries
        {
            return Err(ErrorInfo::unsupported(format!(
                "INSERT OR REPLACE on table '{}' with secondary indexes",
                table.name()
            )));
        }
        let (sources, arity) = map_sources(&table, &statement.columns)?;
        let meta = RecordMeta::new(
            table
                .columns()
                .iter()
                .map(|c| (*c.field_type(), c.nullable()))
                .collect(),
        )
        .shared();
        let record = RecordBuffer::with_arena(meta, LifoArena::new(ctx.config().lifo_page_size));
        Ok(Self {
            kind: statement.kind,
            table,
            primary,
            secondaries,
            sources,
            arity,
            record,
            state: WriteState::Ready,
            statistics: WriteStatistics::default(),
            key_buf: Vec::new(),
            value_buf: Vec::new(),
            secondary_buf: Vec::new(),
            statement_time: statement_time()?,
        })
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> WriteState {
        self.state
    }

    /// Counters so far.
    #[inline]
    #[must_use]
    pub fn statistics(&self) -> WriteStatistics {
        self.statistics
    }

    /// Writes `tuples` in order under the context's transaction.
    ///
    /// On the first failing tuple the transaction is aborted, the pipeline
    /// moves to `TerminalError` and the error is returned.
    pub fn run(
        &mut self,
        ctx: &mut RequestContext,
        tuples: &[Vec<Expression>],
        host: RecordRef<'_>,
    ) -> JogasakiResult<WriteStatistics> {
        let tx = Arc::clone(ctx.transaction()?);
        for tuple in tuples {
            let checkpoint = self.record.checkpoint();
            let result = self.write_tuple(ctx, &tx, tuple, host);
            self.record.rewind(checkpoint);
            if let Err(err) = result {
                self.state = WriteState::TerminalError;
                ctx.abort_on_error(&err);
                debug!(table = self.table.name(), code = %err.code(), "write failed");
                return Err(err);
            }
        }
        self.state = WriteState::Done;
        debug!(
            table = self.table.name(),
            inserted = self.statistics.inserted,
            merged = self.statistics.merged,
            "write completed"
        );
        Ok(self.statistics)
    }

    fn write_tuple(
        &mut self,
        ctx: &RequestContext,
        tx: &Transaction,
        tuple: &[Expression],
        host: RecordRef<'_>,
    ) -> JogasakiResult<()> {
        ctx.check_canceled()?;
        self.state = WriteState::EvaluatingTuple;
        if tuple.len() != self.arity {
            return Err(ErrorInfo::new(
                ErrorCode::SymbolAnalyze,
                format!("expected {} values, got {}", self.arity, tuple.len()),
            ));
        }
        let mut eval = EvalContext::new(ctx.cast_context());
        let scope = Scope::new().with_host_variables(host);
        let mut lobs = Vec::new();
        let table = Arc::clone(&self.table);
        for (i, column) in table.columns().iter().enumerate() {
            let (value, source) = match self.sources[i] {
                Some(pos) => evaluate_typed(&tuple[pos], &mut eval, &scope)?,
                None => self.default_value(ctx, tx, column)?,
            };
            let value = coerce(column, &value, &source, &mut eval)?;
            let value = register_lob(tx, value, &mut lobs)?;
            self.record.set_value(i, &value)?;
        }

        self.state = WriteState::Encoding;
        let record = self.record.as_record_ref();
        encode_with_retry(&mut self.key_buf, |out| self.primary.key.encode_record(record, out))?;
        encode_with_retry(&mut self.value_buf, |out| {
            self.primary.value.encode_record(record, out)
        })?;
        check_size("key", self.key_buf.len(), ctx.config().max_key_size)?;
        check_size("value", self.value_buf.len(), ctx.config().max_value_size)?;

        ctx.check_canceled()?;
        self.state = WriteState::PutPrimary;
        match self.kind {
            WriteKind::Insert | WriteKind::InsertSkip => {
                match tx.put(
                    &self.primary.storage,
                    &self.key_buf,
                    &self.value_buf,
                    PutOption::Create,
                ) {
                    Ok(()) => {}
                    Err(KvsError::AlreadyExists) if self.kind == WriteKind::InsertSkip => {
                        trace!(table = self.table.name(), "existing row kept");
                        return Ok(());
                    }
                    Err(KvsError::AlreadyExists) => {
                        return Err(ErrorInfo::new(
                            ErrorCode::UniqueConstraintViolation,
                            format!("primary key already exists in table '{}'", self.table.name()),
                        ));
                    }
                    Err(e) => return Err(e.into()),
                }
                self.statistics.inserted += 1;
            }
            WriteKind::InsertOrReplace => {
                if !self.secondaries.is_empty() {
                    self.remove_old_secondaries(ctx, tx)?;
                }
                tx.put(
                    &self.primary.storage,
                    &self.key_buf,
                    &self.value_buf,
                    PutOption::CreateOrUpdate,
                )?;
                self.statistics.merged += 1;
            }
        }
        if !lobs.is_empty() {
            tx.blob_pool()?.publish(&lobs)?;
        }

        self.state = WriteState::PutSecondaries;
        let record = self.record.as_record_ref();
        for secondary in &self.secondaries {
            encode_with_retry(&mut self.secondary_buf, |out| {
                secondary.key.encode_record(record, out)
            })?;
            check_size("key", self.secondary_buf.len(), ctx.config().max_key_size)?;
            ctx.check_canceled()?;
            tx.put(
                &secondary.storage,
                &self.secondary_buf,
                &[],
                PutOption::CreateOrUpdate,
            )?;
        }
        trace!(table = self.table.name(), "tuple written");
        Ok(())
    }

    /// Deletes the secondary entries of the row an upsert replaces.
    fn remove_old_secondaries(&mut self, ctx: &RequestContext, tx: &Transaction) -> JogasakiResult<()> {
        ctx.check_canceled()?;
        let Some(old) = tx.get(&self.primary.storage, &self.key_buf)? else {
            return Ok(());
        };
        let row = decode_row(
            self.table.columns().len(),
            &self.primary.key,
            &self.primary.value,
            &self.key_buf,
            &old,
        )?;
        for secondary in &self.secondaries {
            encode_with_retry(&mut self.secondary_buf, |out| {
                secondary.key.encode_values(&row, out)
            })?;
            ctx.check_canceled()?;
            tx.remove(&secondary.storage, &self.secondary_buf)?;
        }
        Ok(())
    }

    /// Value of a column the statement does not name, with its type.
    fn default_value(
        &self,
        ctx: &RequestContext,
        tx: &Transaction,
        column: &Column,
    ) -> JogasakiResult<(Value, FieldType)> {
        Ok(match column.default_value() {
            ColumnDefault::Nothing => (Value::Null, FieldType::Unknown),
            ColumnDefault::Immediate(value) => (value.clone(), FieldType::from(value.kind())),
            ColumnDefault::Sequence(name) => {
                ctx.check_canceled()?;
                (Value::Int8(ctx.sequences().next(tx, name)?), FieldType::Int8)
            }
            ColumnDefault::Function(function) => {
                function_value(*function, self.statement_time, ctx.zone_offset())
            }
        })
    }
}

/// Maps each table column to the tuple position that feeds it. Returns the
/// mapping and the expected tuple length.
fn map_sources(table: &Table, columns: &[String]) -> JogasakiResult<(Vec<Option<usize>>, usize)> {
    let mut sources = vec![None; table.columns().len()];
    if columns.is_empty() {
        let mut arity = 0;
        for (i, column) in table.columns().iter().enumerate() {
            if !column.is_hidden() {
                sources[i] = Some(arity);
                arity += 1;
            }
        }
        return Ok((sources, arity));
    }
    for (pos, name) in columns.iter().enumerate() {
        let i = table
            .column_index(name)
            .filter(|&i| !table.columns()[i].is_hidden())
            .ok_or_else(|| {
                ErrorInfo::new(
                    ErrorCode::SymbolAnalyze,
                    format!("column '{name}' not found in table '{}'", table.name()),
                )
            })?;
        if sources[i].replace(pos).is_some() {
            return Err(ErrorInfo::new(
                ErrorCode::SymbolAnalyze,
                format!("column '{name}' specified more than once"),
            ));
        }
    }
    Ok((sources, columns.len()))
}

fn coerce(
    column: &Column,
    value: &Value,
    source: &FieldType,
    eval: &mut EvalContext,
) -> JogasakiResult<Value> {
    if value.is_null() {
        if !column.nullable() {
            return Err(ErrorInfo::new(
                ErrorCode::NotNullConstraintViolation,
                format!("column '{}' does not allow NULL", column.name()),
            ));
        }
        return Ok(Value::Null);
    }
    let target = column.field_type();
    if value.kind().is_lob() && value.kind() == target.kind() {
        return Ok(value.clone());
    }
    assign(value, source, target, eval.cast_context_mut()).map_err(|e| {
        ErrorInfo::from(e).with_supplemental_text(format!("column '{}'", column.name()))
    })
}

/// Registers provided or fetched LOB content with the transaction's blob
/// pool and returns the resolved reference.
fn register_lob(tx: &Transaction, value: Value, registered: &mut Vec<BlobId>) -> JogasakiResult<Value> {
    let (provenance, id, clob) = match &value {
        Value::Blob(r) => (r.provenance().clone(), r.id(), false),
        Value::Clob(r) => (r.provenance().clone(), r.id(), true),
        _ => return Ok(value),
    };
    let id = match provenance {
        LobProvenance::Resolved => return Ok(value),
        LobProvenance::Fetched => tx.blob_pool()?.duplicate(id)?,
        LobProvenance::Provided(LobLocator::File { path, temporary }) => {
            tx.blob_pool()?.register_file(&path, temporary)?
        }
        LobProvenance::Provided(LobLocator::Data(data)) => tx.blob_pool()?.register_data(data)?,
    };
    registered.push(id);
    Ok(if clob {
        Value::Clob(ClobReference::resolved(id))
    } else {
        Value::Blob(BlobReference::resolved(id))
    })
}

fn check_size(what: &str, len: usize, limit: usize) -> JogasakiResult<()> {
    if len > limit {
        return Err(ErrorInfo::new(
            ErrorCode::ValueTooLong,
            format!("encoded {what} of {len} bytes exceeds the limit of {limit}"),
        ));
    }
    Ok(())
}

fn statement_time() -> JogasakiResult<TimePoint> {
    let since = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| ErrorInfo::internal(format!("system clock before epoch: {e}")))?;
    let seconds = i64::try_from(since.as_secs())
        .map_err(|_| ErrorInfo::internal("system clock out of range"))?;
    Ok(TimePoint::new(seconds, since.subsec_nanos()))
}

fn function_value(function: DefaultFunction, now: TimePoint, zone_offset: i32) -> (Value, FieldType) {
    let local = now.shift_minutes(zone_offset);
    match function {
        DefaultFunction::CurrentDate => (Value::Date(local.date()), FieldType::Date),
        DefaultFunction::LocalTime => (
            Value::TimeOfDay(local.time_of_day()),
            FieldType::time_of_day(false),
        ),
        DefaultFunction::CurrentTimestamp => (Value::TimePoint(now), FieldType::time_point(true)),
        DefaultFunction::LocalTimestamp => (Value::TimePoint(local), FieldType::time_point(false)),
    }
}

#[cfg(test)]
mod tests {
    use jogasaki_common::ExecutionConfig;
    use jogasaki_kvs::{KvsDatabase, ScanRange, TransactionOptions};

    use super::*;
    use crate::catalog::{ColumnFeatures, Index, IndexKey, SequenceDefinition, StorageProvider};
    use crate::data::Triple;
    use crate::sequence::SequenceManager;

    struct Fixture {
        kvs: Arc<KvsDatabase>,
        provider: Arc<StorageProvider>,
        sequences: Arc<SequenceManager>,
        config: ExecutionConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let kvs = Arc::new(KvsDatabase::new());
            Self {
                provider: Arc::new(StorageProvider::new()),
                sequences: Arc::new(SequenceManager::new(Arc::clone(&kvs))),
                kvs,
                config: ExecutionConfig::for_testing(),
            }
        }

        fn table(&self, table: Table, keys: Vec<IndexKey>) {
            let table = self.provider.add_table(table, false).unwrap();
            let primary = self.provider.add_index(Index::primary(&table, keys), false).unwrap();
            self.kvs.get_or_create_storage(primary.storage_name());
        }

        fn secondary(&self, index: Index) {
            let index = self.provider.add_index(index, false).unwrap();
            self.kvs.get_or_create_storage(index.storage_name());
        }

        fn context(&self, tx: &Arc<Transaction>) -> RequestContext {
            RequestContext::new(
                Arc::new(self.config.clone()),
                Arc::clone(&self.provider),
                Arc::clone(&self.sequences),
                Arc::clone(&self.kvs),
            )
            .with_transaction(Arc::clone(tx))
        }

        fn count(&self, storage: &str) -> usize {
            let tx = self.kvs.begin(TransactionOptions::read_only()).unwrap();
            let storage = self.kvs.get_storage(storage).unwrap();
            tx.scan(&storage, &ScanRange::all()).unwrap().count()
        }
    }

    fn ints(rows: &[(i32, i32)]) -> Vec<Vec<Expression>> {
        rows.iter()
            .map(|&(a, b)| vec![Expression::immediate(a), Expression::immediate(b)])
            .collect()
    }

    fn two_ints() -> Table {
        Table::new(
            "T",
            vec![
                Column::new("C0", FieldType::Int4).not_null(),
                Column::new("C1", FieldType::Int4),
            ],
        )
    }

    fn run(
        fx: &Fixture,
        tx: &Arc<Transaction>,
        statement: &WriteStatement,
    ) -> (JogasakiResult<WriteStatistics>, WriteState, usize) {
        let mut ctx = fx.context(tx);
        let empty = RecordBuffer::new(RecordMeta::new(Vec::new()).shared());
        let mut pipeline = match WritePipeline::new(&ctx, statement) {
            Ok(p) => p,
            Err(e) => return (Err(e), WriteState::Ready, 0),
        };
        let result = pipeline.run(&mut ctx, &statement.tuples, empty.as_record_ref());
        (result, pipeline.state(), ctx.abort_count())
    }

    #[test]
    fn test_insert_rows() {
        let fx = Fixture::new();
        fx.table(two_ints(), vec![IndexKey::asc("C0")]);
        let tx = fx.kvs.begin(TransactionOptions::short()).unwrap();
        let stmt = WriteStatement::new(WriteKind::Insert, "T", ints(&[(1, 10), (2, 20), (3, 30)]));
        let (result, state, aborts) = run(&fx, &tx, &stmt);
        assert_eq!(result.unwrap().inserted, 3);
        assert_eq!(state, WriteState::Done);
        assert_eq!(aborts, 0);
        tx.commit().unwrap();
        assert_eq!(fx.count("T"), 3);
    }

    #[test]
    fn test_duplicate_key_aborts_once() {
        let fx = Fixture::new();
        fx.table(two_ints(), vec![IndexKey::asc("C0")]);
        let tx = fx.kvs.begin(TransactionOptions::short()).unwrap();
        let stmt = WriteStatement::new(WriteKind::Insert, "T", ints(&[(1, 10), (1, 20)]));
        let (result, state, aborts) = run(&fx, &tx, &stmt);
        assert_eq!(
            result.unwrap_err().code(),
            ErrorCode::UniqueConstraintViolation
        );
        assert_eq!(state, WriteState::TerminalError);
        assert_eq!(aborts, 1);
        assert!(!tx.is_active());
    }

    #[test]
    fn test_insert_skip_keeps_existing() {
        let fx = Fixture::new();
        fx.table(two_ints(), vec![IndexKey::asc("C0")]);
        let tx = fx.kvs.begin(TransactionOptions::short()).unwrap();
        let stmt = WriteStatement::new(WriteKind::InsertSkip, "T", ints(&[(1, 10), (1, 20), (2, 20)]));
        let (result, state, _) = run(&fx, &tx, &stmt);
        assert_eq!(result.unwrap().inserted, 2);
        assert_eq!(state, WriteState::Done);
        assert!(tx.is_active());
    }

    #[test]
    fn test_not_null_violation() {
        let fx = Fixture::new();
        fx.table(
            Table::new(
                "N",
                vec![
                    Column::new("K", FieldType::Int4).not_null(),
                    Column::new("C0", FieldType::Int4).not_null(),
                ],
            ),
            vec![IndexKey::asc("K")],
        );
        let tx = fx.kvs.begin(TransactionOptions::short()).unwrap();
        let stmt = WriteStatement::new(WriteKind::Insert, "N", vec![vec![Expression::immediate(1)]])
            .with_columns(["K"]);
        let (result, _, aborts) = run(&fx, &tx, &stmt);
        assert_eq!(
            result.unwrap_err().code(),
            ErrorCode::NotNullConstraintViolation
        );
        assert_eq!(aborts, 1);
        assert_eq!(fx.count("N"), 0);
    }

    #[test]
    fn test_value_too_long() {
        let fx = Fixture::new();
        fx.table(
            Table::new(
                "C",
                vec![
                    Column::new("K", FieldType::Int4).not_null(),
                    Column::new("VC", FieldType::varchar(Some(5))),
                    Column::new("CH", FieldType::character(5)),
                ],
            ),
            vec![IndexKey::asc("K")],
        );
        let tx = fx.kvs.begin(TransactionOptions::short()).unwrap();
        let stmt = WriteStatement::new(
            WriteKind::Insert,
            "C",
            vec![vec![
                Expression::immediate(1),
                Expression::immediate("AAAAAA"),
                Expression::immediate("AAAAA"),
            ]],
        );
        let (result, _, _) = run(&fx, &tx, &stmt);
        assert_eq!(result.unwrap_err().code(), ErrorCode::ValueTooLong);
    }

    #[test]
    fn test_defaults_and_coercion() {
        let fx = Fixture::new();
        let tx = fx.kvs.begin(TransactionOptions::short()).unwrap();
        let seq = fx.provider.add_sequence(SequenceDefinition::new("S"), false).unwrap();
        fx.sequences.register(&tx, seq).unwrap();
        fx.table(
            Table::new(
                "D",
                vec![
                    Column::new("K", FieldType::Int8)
                        .not_null()
                        .with_default(ColumnDefault::Sequence("S".into())),
                    Column::new("D", FieldType::decimal(Some(5), Some(2)))
                        .with_default(ColumnDefault::Immediate(Value::Int4(7))),
                    Column::new("V", FieldType::Int4),
                ],
            ),
            vec![IndexKey::asc("K")],
        );
        let stmt = WriteStatement::new(
            WriteKind::Insert,
            "D",
            vec![vec![Expression::immediate(1i64)], vec![Expression::immediate(2i64)]],
        )
        .with_columns(["V"]);
        let (result, _, _) = run(&fx, &tx, &stmt);
        assert_eq!(result.unwrap().inserted, 2);
        assert_eq!(fx.sequences.current("S"), Some(2));

        let table = fx.provider.find_table("D").unwrap();
        let ctx = fx.context(&tx);
        let primary = PrimaryTarget::open(&ctx, &table).unwrap();
        let rows: Vec<_> = tx
            .scan(&primary.storage, &ScanRange::all())
            .unwrap()
            .map(|(k, v)| decode_row(3, &primary.key, &primary.value, k.as_bytes(), &v).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], Value::Int8(1));
        let seven = Value::Decimal("7".parse::<Triple>().unwrap());
        assert_eq!(rows[0][1].compare(&seven), Some(std::cmp::Ordering::Equal));
        assert_eq!(rows[1][2], Value::Int4(2));
    }

    #[test]
    fn test_sequence_survives_abort() {
        let fx = Fixture::new();
        let tx = fx.kvs.begin(TransactionOptions::short()).unwrap();
        let seq = fx.provider.add_sequence(SequenceDefinition::new("S"), false).unwrap();
        fx.sequences.register(&tx, seq).unwrap();
        tx.commit().unwrap();
        fx.table(
            Table::new(
                "R",
                vec![
                    Column::new("K", FieldType::Int8)
                        .not_null()
                        .with_default(ColumnDefault::Sequence("S".into())),
                    Column::new("V", FieldType::varchar(Some(1))),
                ],
            ),
            vec![IndexKey::asc("K")],
        );
        let tx = fx.kvs.begin(TransactionOptions::short()).unwrap();
        let stmt = WriteStatement::new(WriteKind::Insert, "R", vec![vec![Expression::immediate("toolong")]])
            .with_columns(["V"]);
        let (result, _, _) = run(&fx, &tx, &stmt);
        assert!(result.is_err());
        assert_eq!(fx.sequences.current("S"), Some(1));
    }

    #[test]
    fn test_secondary_entries() {
        let fx = Fixture::new();
        fx.table(two_ints(), vec![IndexKey::asc("C0")]);
        fx.secondary(Index::secondary("T_C1", "T", vec![IndexKey::asc("C1")]));
        let tx = fx.kvs.begin(TransactionOptions::short()).unwrap();
        let stmt = WriteStatement::new(WriteKind::Insert, "T", ints(&[(1, 10), (2, 10)]));
        let (result, _, _) = run(&fx, &tx, &stmt);
        assert_eq!(result.unwrap().inserted, 2);
        tx.commit().unwrap();
        assert_eq!(fx.count("T_C1"), 2);
    }

    #[test]
    fn test_upsert_with_secondaries_rejected() {
        let fx = Fixture::new();
        fx.table(two_ints(), vec![IndexKey::asc("C0")]);
        fx.secondary(Index::secondary("T_C1", "T", vec![IndexKey::asc("C1")]));
        let tx = fx.kvs.begin(TransactionOptions::short()).unwrap();
        let stmt = WriteStatement::new(WriteKind::InsertOrReplace, "T", ints(&[(1, 10)]));
        let (result, _, aborts) = run(&fx, &tx, &stmt);
        assert_eq!(
            result.unwrap_err().code(),
            ErrorCode::UnsupportedRuntimeFeature
        );
        assert_eq!(aborts, 0);
        assert!(tx.is_active());
    }

    #[test]
    fn test_upsert_replaces_secondary_entries() {
        let mut fx = Fixture::new();
        fx.config.support_upsert_with_secondaries = true;
        fx.table(two_ints(), vec![IndexKey::asc("C0")]);
        fx.secondary(Index::secondary("T_C1", "T", vec![IndexKey::asc("C1")]));
        let tx = fx.kvs.begin(TransactionOptions::short()).unwrap();
        let insert = WriteStatement::new(WriteKind::Insert, "T", ints(&[(1, 10)]));
        run(&fx, &tx, &insert).0.unwrap();
        let upsert = WriteStatement::new(WriteKind::InsertOrReplace, "T", ints(&[(1, 20), (2, 30)]));
        let (result, _, _) = run(&fx, &tx, &upsert);
        assert_eq!(result.unwrap().merged, 2);
        tx.commit().unwrap();
        assert_eq!(fx.count("T"), 2);
        assert_eq!(fx.count("T_C1"), 2);
    }

    #[test]
    fn test_hidden_column_not_addressable() {
        let fx = Fixture::new();
        fx.table(
            Table::new(
                "H",
                vec![
                    Column::new("ROWID", FieldType::Int8)
                        .not_null()
                        .with_default(ColumnDefault::Immediate(Value::Int8(9)))
                        .with_features(ColumnFeatures::HIDDEN),
                    Column::new("V", FieldType::Int4),
                ],
            ),
            vec![IndexKey::asc("ROWID")],
        );
        let tx = fx.kvs.begin(TransactionOptions::short()).unwrap();
        let bad = WriteStatement::new(WriteKind::Insert, "H", ints(&[(1, 2)])).with_columns(["ROWID", "V"]);
        let (result, _, _) = run(&fx, &tx, &bad);
        assert_eq!(result.unwrap_err().code(), ErrorCode::SymbolAnalyze);
        let ok = WriteStatement::new(WriteKind::Insert, "H", vec![vec![Expression::immediate(5)]]);
        assert_eq!(run(&fx, &tx, &ok).0.unwrap().inserted, 1);
    }

    #[test]
    fn test_blob_is_registered() {
        let fx = Fixture::new();
        fx.table(
            Table::new(
                "B",
                vec![
                    Column::new("K", FieldType::Int4).not_null(),
                    Column::new("B", FieldType::Blob),
                ],
            ),
            vec![IndexKey::asc("K")],
        );
        let tx = fx.kvs.begin(TransactionOptions::short()).unwrap();
        let blob = BlobReference::provided(LobLocator::Data(bytes::Bytes::from_static(b"payload")));
        let stmt = WriteStatement::new(
            WriteKind::Insert,
            "B",
            vec![vec![Expression::immediate(1), Expression::Immediate(Value::Blob(blob))]],
        );
        let (result, _, _) = run(&fx, &tx, &stmt);
        assert_eq!(result.unwrap().inserted, 1);
        assert_eq!(tx.blob_pool().unwrap().registered_count(), 1);
    }

    #[test]
    fn test_zoned_host_variable_is_shifted_to_local_time() {
        let fx = Fixture::new();
        fx.table(
            Table::new(
                "Z",
                vec![
                    Column::new("K", FieldType::Int4).not_null(),
                    Column::new("TS", FieldType::time_point(false)),
                ],
            ),
            vec![IndexKey::asc("K")],
        );
        let tx = fx.kvs.begin(TransactionOptions::short()).unwrap();
        let mut ctx = fx.context(&tx).with_zone_offset(9 * 60);
        let mut host = RecordBuffer::new(
            RecordMeta::new(vec![(FieldType::time_point(true), true)]).shared(),
        );
        host.set_value(0, &Value::TimePoint(TimePoint::new(0, 0))).unwrap();
        let stmt = WriteStatement::new(
            WriteKind::Insert,
            "Z",
            vec![vec![Expression::immediate(1), Expression::HostVariable(0)]],
        );
        let mut pipeline = WritePipeline::new(&ctx, &stmt).unwrap();
        pipeline.run(&mut ctx, &stmt.tuples, host.as_record_ref()).unwrap();

        let table = fx.provider.find_table("Z").unwrap();
        let primary = PrimaryTarget::open(&ctx, &table).unwrap();
        let rows: Vec<_> = tx
            .scan(&primary.storage, &ScanRange::all())
            .unwrap()
            .map(|(k, v)| decode_row(2, &primary.key, &primary.value, k.as_bytes(), &v).unwrap())
            .collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1], Value::TimePoint(TimePoint::new(9 * 3600, 0)));
    }

    #[test]
    fn test_key_size_limit() {
        let mut fx = Fixture::new();
        fx.config.max_key_size = 4;
        fx.table(
            Table::new("K", vec![Column::new("K", FieldType::varchar(None)).not_null()]),
            vec![IndexKey::asc("K")],
        );
        let tx = fx.kvs.begin(TransactionOptions::short()).unwrap();
        let stmt = WriteStatement::new(WriteKind::Insert, "K", vec![vec![Expression::immediate("abcdef")]]);
        let (result, _, _) = run(&fx, &tx, &stmt);
        assert_eq!(result.unwrap_err().code(), ErrorCode::ValueTooLong);
    }

    #[test]
    fn test_canceled_before_first_tuple() {
        let fx = Fixture::new();
        fx.table(two_ints(), vec![IndexKey::asc("C0")]);
        let tx = fx.kvs.begin(TransactionOptions::short()).unwrap();
        let token = crate::executor::CancelToken::new();
        token.cancel();
        let mut ctx = fx.context(&tx).with_cancel_token(token);
        let stmt = WriteStatement::new(WriteKind::Insert, "T", ints(&[(1, 10)]));
        let mut pipeline = WritePipeline::new(&ctx, &stmt).unwrap();
        let empty = RecordBuffer::new(RecordMeta::new(Vec::new()).shared());
        let err = pipeline
            .run(&mut ctx, &stmt.tuples, empty.as_record_ref())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::OperationCanceled);
        assert!(!tx.is_active());
    }

    #[test]
    fn test_statistics_merge() {
        let mut a = WriteStatistics {
            inserted: 1,
            ..Default::default()
        };
        a.merge(&WriteStatistics {
            merged: 2,
            deleted: 1,
            ..Default::default()
        });
        assert_eq!(a.total(), 4);
        assert!(WriteState::Done.is_terminal());
        assert!(!WriteState::PutPrimary.is_terminal());
    }
}
