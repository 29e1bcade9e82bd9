//! Definition statements and catalog recovery.
//!
//! Every definition change updates the [`StorageProvider`], creates or
//! deletes the backing storages and records the serialized definition in the
//! system storage, all under an internal short transaction that is committed
//! before returning. The caller's transaction is never touched.
//!
//! ```text
//!   system storage key            value
//!   [0][sequence name]            serialized sequence
//!   [1][table name]               serialized primary index + table
//!   [2][index name]               serialized secondary index
//! ```
//!
//! [`restore_catalog`] replays the system storage in key order, so
//! sequences come back before the tables whose defaults use them and tables
//! before their secondary indexes.

use std::sync::Arc;

use jogasaki_common::{ErrorCode, ErrorInfo, JogasakiResult};
use jogasaki_kvs::{PutOption, ScanRange, StorageHandle, Transaction, TransactionOptions};
use tracing::{debug, info, warn};

use super::context::RequestContext;
use super::layout::{decode_row, PrimaryTarget, SecondaryTarget};
use crate::catalog::{
    Column, ColumnDefault, ColumnFeatures, Index, IndexKey, SequenceDefinition, Table,
};
use crate::codec::encode_with_retry;
use crate::meta::FieldType;
use crate::plan::CreateTableStatement;
use crate::serializer::{
    deserialize_index, deserialize_sequence, serialize_index, serialize_sequence, EntryKind,
};

/// Name of the column added to tables declared without a primary key.
pub const ROW_ID_COLUMN: &str = "__rowid";

/// Name of the sequence feeding the row id column of `table`.
#[must_use]
pub fn row_id_sequence_name(table: &str) -> String {
    format!("__rowid_seq_{table}")
}

fn system_storage(ctx: &RequestContext) -> StorageHandle {
    ctx.kvs().get_or_create_storage(&ctx.config().system_storage_name)
}

/// Runs `f` in a short transaction that modifies definitions, committing on
/// success and aborting on failure.
fn in_definition_tx<T>(
    ctx: &RequestContext,
    f: impl FnOnce(&Transaction) -> JogasakiResult<T>,
) -> JogasakiResult<T> {
    let tx = ctx
        .kvs()
        .begin(TransactionOptions::short().with_modifies_definitions(true))?;
    match f(&tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(e) = tx.abort() {
                warn!(txn = %tx.id(), error = %e, "abort of definition transaction failed");
            }
            Err(err)
        }
    }
}

// =============================================================================
// Tables
// =============================================================================

/// Creates a table and its primary index.
///
/// A table declared without a primary key gets a hidden `__rowid` column fed
/// by a synthesized sequence. Returns false when the table exists and the
/// statement says `IF NOT EXISTS`.
pub fn create_table(ctx: &RequestContext, statement: &CreateTableStatement) -> JogasakiResult<bool> {
    let name = statement.table.name();
    if ctx.provider().find_table(name).is_some() {
        if statement.if_not_exists {
            debug!(table = name, "table exists, nothing created");
            return Ok(false);
        }
        return Err(ErrorInfo::new(
            ErrorCode::TargetAlreadyExists,
            format!("table '{name}' already exists"),
        ));
    }
    let mut keys = statement.primary_key.clone();
    let mut columns = statement.table.columns().to_vec();
    let mut row_id = None;
    if keys.is_empty() {
        let sequence = row_id_sequence_name(name);
        columns.push(
            Column::new(ROW_ID_COLUMN, FieldType::Int8)
                .not_null()
                .with_default(ColumnDefault::Sequence(sequence.clone()))
                .with_features(ColumnFeatures::HIDDEN | ColumnFeatures::SYNTHESIZED),
        );
        keys.push(IndexKey::asc(ROW_ID_COLUMN));
        row_id = Some(sequence);
    }

    let provider = ctx.provider();
    let row_id_sequence = match &row_id {
        Some(seq) => Some(provider.add_sequence(SequenceDefinition::new(seq.as_str()), false)?),
        None => None,
    };
    let undo_sequence = || {
        if let Some(seq) = &row_id {
            let _ = provider.remove_sequence(seq);
        }
    };
    let table = match provider.add_table(Table::new(name, columns), false) {
        Ok(table) => table,
        Err(e) => {
            undo_sequence();
            return Err(e.into());
        }
    };
    let primary = match provider.add_index(Index::primary(&table, keys), false) {
        Ok(primary) => primary,
        Err(e) => {
            let _ = provider.remove_table(name);
            undo_sequence();
            return Err(e.into());
        }
    };

    let result = in_definition_tx(ctx, |tx| {
        if let Some(seq) = &row_id_sequence {
            ctx.sequences().register(tx, Arc::clone(seq))?;
        }
        ctx.kvs().get_or_create_storage(primary.storage_name());
        let bytes = serialize_index(&primary, provider)?;
        tx.put(
            &system_storage(ctx),
            &EntryKind::Table.key(name),
            &bytes,
            PutOption::CreateOrUpdate,
        )?;
        Ok(())
    });
    if let Err(e) = result {
        let _ = provider.remove_index(primary.name());
        let _ = provider.remove_table(name);
        undo_sequence();
        let _ = ctx.kvs().delete_storage(primary.storage_name());
        return Err(e);
    }
    info!(table = name, row_id = row_id.is_some(), "table created");
    Ok(true)
}

/// Drops a table with its indexes, storages and synthesized sequences.
pub fn drop_table(ctx: &RequestContext, name: &str) -> JogasakiResult<()> {
    let provider = ctx.provider();
    let table = provider
        .find_table(name)
        .ok_or_else(|| ErrorInfo::target_not_found(format!("table '{name}' not found")))?;
    let synthesized: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| c.features().contains(ColumnFeatures::SYNTHESIZED))
        .filter_map(|c| match c.default_value() {
            ColumnDefault::Sequence(seq) => Some(seq.clone()),
            _ => None,
        })
        .collect();

    in_definition_tx(ctx, |tx| {
        let system = system_storage(ctx);
        for index in provider.secondary_indexes(name) {
            provider.remove_index(index.name())?;
            tx.remove(&system, &EntryKind::SecondaryIndex.key(index.name()))?;
            drop_storage(ctx, index.storage_name());
        }
        if let Some(primary) = provider.find_primary_index(name) {
            provider.remove_index(primary.name())?;
            drop_storage(ctx, primary.storage_name());
        }
        provider.remove_table(name)?;
        tx.remove(&system, &EntryKind::Table.key(name))?;
        for seq in &synthesized {
            provider.remove_sequence(seq)?;
            if ctx.sequences().contains(seq) {
                ctx.sequences().remove(tx, seq)?;
            }
        }
        Ok(())
    })?;
    info!(table = name, "table dropped");
    Ok(())
}

fn drop_storage(ctx: &RequestContext, name: &str) {
    if let Err(e) = ctx.kvs().delete_storage(name) {
        warn!(storage = name, error = %e, "storage not deleted");
    }
}

// =============================================================================
// Indexes
// =============================================================================

/// Creates a secondary index and fills it from the existing rows.
pub fn create_index(ctx: &RequestContext, index: &Index) -> JogasakiResult<Arc<Index>> {
    if index.is_primary() {
        return Err(ErrorInfo::invalid_argument(format!(
            "primary index '{}' is created with its table",
            index.name()
        )));
    }
    let provider = ctx.provider();
    let index = provider.add_index(index.clone(), false)?;
    let storage = match ctx.kvs().create_storage(index.storage_name()) {
        Ok(storage) => storage,
        Err(e) => {
            let _ = provider.remove_index(index.name());
            return Err(e.into());
        }
    };
    let result = in_definition_tx(ctx, |tx| {
        let rows = backfill(ctx, tx, &index)?;
        let bytes = serialize_index(&index, provider)?;
        tx.put(
            &system_storage(ctx),
            &EntryKind::SecondaryIndex.key(index.name()),
            &bytes,
            PutOption::CreateOrUpdate,
        )?;
        Ok(rows)
    });
    match result {
        Ok(rows) => {
            info!(index = index.name(), table = index.table_name(), rows, "index created");
            Ok(index)
        }
        Err(e) => {
            let _ = provider.remove_index(index.name());
            drop_storage(ctx, storage.name());
            Err(e)
        }
    }
}

/// Writes a secondary entry for every row of the index's table.
fn backfill(ctx: &RequestContext, tx: &Transaction, index: &Arc<Index>) -> JogasakiResult<usize> {
    let table = ctx.provider().find_table(index.table_name()).ok_or_else(|| {
        ErrorInfo::target_not_found(format!("table '{}' not found", index.table_name()))
    })?;
    let primary = PrimaryTarget::open(ctx, &table)?;
    let secondary = SecondaryTarget::open(ctx, &table, Arc::clone(index), &primary.index)?;
    let column_count = table.columns().len();
    let mut buf = Vec::new();
    let mut rows = 0;
    for (key, value) in tx.scan(&primary.storage, &ScanRange::all())? {
        let row = decode_row(column_count, &primary.key, &primary.value, &key, &value)?;
        encode_with_retry(&mut buf, |out| secondary.key.encode_values(&row, out))?;
        tx.put(&secondary.storage, &buf, &[], PutOption::CreateOrUpdate)?;
        rows += 1;
    }
    Ok(rows)
}

/// Drops a secondary index.
pub fn drop_index(ctx: &RequestContext, name: &str) -> JogasakiResult<()> {
    let provider = ctx.provider();
    let index = provider
        .find_index(name)
        .ok_or_else(|| ErrorInfo::target_not_found(format!("index '{name}' not found")))?;
    if index.is_primary() {
        return Err(ErrorInfo::invalid_argument(format!(
            "'{name}' is a primary index; drop the table instead"
        )));
    }
    in_definition_tx(ctx, |tx| {
        provider.remove_index(name)?;
        tx.remove(&system_storage(ctx), &EntryKind::SecondaryIndex.key(name))?;
        Ok(())
    })?;
    drop_storage(ctx, index.storage_name());
    info!(index = name, "index dropped");
    Ok(())
}

// =============================================================================
// Sequences
// =============================================================================

/// Creates and registers a sequence.
pub fn create_sequence(
    ctx: &RequestContext,
    definition: &SequenceDefinition,
) -> JogasakiResult<Arc<SequenceDefinition>> {
    let provider = ctx.provider();
    let sequence = provider.add_sequence(definition.clone(), false)?;
    let result = in_definition_tx(ctx, |tx| {
        ctx.sequences().register(tx, Arc::clone(&sequence))?;
        tx.put(
            &system_storage(ctx),
            &EntryKind::Sequence.key(sequence.name()),
            &serialize_sequence(&sequence),
            PutOption::CreateOrUpdate,
        )?;
        Ok(())
    });
    if let Err(e) = result {
        let _ = provider.remove_sequence(sequence.name());
        return Err(e);
    }
    info!(sequence = sequence.name(), "sequence created");
    Ok(sequence)
}

/// Drops a sequence no column default refers to.
pub fn drop_sequence(ctx: &RequestContext, name: &str) -> JogasakiResult<()> {
    ctx.provider().remove_sequence(name)?;
    in_definition_tx(ctx, |tx| {
        if ctx.sequences().contains(name) {
            ctx.sequences().remove(tx, name)?;
        }
        tx.remove(&system_storage(ctx), &EntryKind::Sequence.key(name))?;
        Ok(())
    })?;
    info!(sequence = name, "sequence dropped");
    Ok(())
}

// =============================================================================
// Recovery
// =============================================================================

/// Objects rebuilt by [`restore_catalog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    /// Tables with their primary index.
    pub tables: usize,
    /// Secondary indexes.
    pub indexes: usize,
    /// Sequences registered with the sequence manager.
    pub sequences: usize,
}

/// Rebuilds the catalog from the system storage and registers every
/// sequence with the sequence manager.
pub fn restore_catalog(ctx: &RequestContext) -> JogasakiResult<RecoverySummary> {
    let provider = ctx.provider();
    let system = system_storage(ctx);
    let summary = in_definition_tx(ctx, |tx| {
        let mut summary = RecoverySummary::default();
        for (key, value) in tx.scan(&system, &ScanRange::all())? {
            match EntryKind::of_key(&key) {
                Some(EntryKind::Sequence) => {
                    deserialize_sequence(&value, provider, true)?;
                }
                Some(kind @ (EntryKind::Table | EntryKind::SecondaryIndex)) => {
                    let index = deserialize_index(&value, provider, true)?;
                    ctx.kvs().get_or_create_storage(index.storage_name());
                    if kind == EntryKind::Table {
                        summary.tables += 1;
                    } else {
                        summary.indexes += 1;
                    }
                }
                None => {
                    return Err(ErrorInfo::new(
                        ErrorCode::DataCorruption,
                        format!("unknown system entry {key:?}"),
                    ));
                }
            }
        }
        for sequence in provider.sequences() {
            if !ctx.sequences().contains(sequence.name()) {
                ctx.sequences().register(tx, sequence)?;
                summary.sequences += 1;
            }
        }
        Ok(summary)
    })?;
    info!(
        tables = summary.tables,
        indexes = summary.indexes,
        sequences = summary.sequences,
        "catalog restored"
    );
    Ok(summary)
}
