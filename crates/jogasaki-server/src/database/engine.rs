//! Main database engine.
//!
//! `Database` is the top-level entry point of Jogasaki. It owns the
//! catalog and sequence manager for one storage engine and admits
//! statements only while running.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use jogasaki_common::{ErrorCode, ErrorInfo, ExecutionConfig, JogasakiResult};
use jogasaki_kvs::{EngineStatsSnapshot, KvsDatabase, Transaction, TransactionOptions};
use jogasaki_sql::catalog::{Index, SequenceDefinition, StorageProvider};
use jogasaki_sql::executor::{self, CancelToken, ExecutionResult, RecoverySummary, RequestContext};
use jogasaki_sql::plan::CreateTableStatement;
use jogasaki_sql::sequence::SequenceManager;
use jogasaki_sql::{resolve, Executable, Parameters, PreparedStatement, Statement, VariableTable};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::handle::{StatementHandle, StatementStore};

/// Lifecycle state of a [`Database`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseState {
    /// Opened or stopped; statements are rejected.
    Stopped,
    /// Catalog restored; statements are admitted.
    Running,
}

/// Per-call execution settings.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Token the caller may set to cancel the statement.
    pub cancel: Option<CancelToken>,
    /// Session time zone offset in minutes.
    pub zone_offset: i32,
}

impl ExecuteOptions {
    /// Attaches a cancel token.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Sets the session time zone offset in minutes.
    #[must_use]
    pub fn with_zone_offset(mut self, minutes: i32) -> Self {
        self.zone_offset = minutes;
        self
    }
}

/// Database statistics.
#[derive(Debug, Clone, Default)]
pub struct DatabaseStats {
    /// Tables in the catalog.
    pub tables: usize,
    /// Secondary indexes in the catalog.
    pub indexes: usize,
    /// Sequences in the catalog.
    pub sequences: usize,
    /// Registered statements.
    pub prepared_statements: usize,
    /// Statements executed since open.
    pub statements_executed: u64,
    /// Storage engine transaction counters.
    pub engine: EngineStatsSnapshot,
    /// Time since the last start.
    pub uptime: Duration,
}

/// The main database engine.
#[derive(Debug)]
pub struct Database {
    config: Arc<ExecutionConfig>,
    kvs: Arc<KvsDatabase>,
    provider: Arc<StorageProvider>,
    sequences: Arc<SequenceManager>,
    statements: StatementStore,
    state: RwLock<DatabaseState>,
    started_at: RwLock<Option<Instant>>,
    executed: AtomicU64,
}

impl Database {
    /// Opens a database over `kvs`. The database starts out stopped.
    pub fn open(kvs: Arc<KvsDatabase>, config: ExecutionConfig) -> JogasakiResult<Self> {
        config
            .validate()
            .map_err(|msg| ErrorInfo::invalid_argument(format!("invalid configuration: {msg}")))?;
        info!(
            page_size = config.page_size,
            system_storage = %config.system_storage_name,
            "database opened"
        );
        Ok(Self {
            sequences: Arc::new(SequenceManager::new(Arc::clone(&kvs))),
            config: Arc::new(config),
            kvs,
            provider: Arc::new(StorageProvider::new()),
            statements: StatementStore::default(),
            state: RwLock::new(DatabaseState::Stopped),
            started_at: RwLock::new(None),
            executed: AtomicU64::new(0),
        })
    }

    /// Opens a database over a fresh in-memory engine with default settings.
    pub fn open_memory() -> JogasakiResult<Self> {
        Self::open(Arc::new(KvsDatabase::new()), ExecutionConfig::default())
    }

    /// Configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Storage engine.
    #[inline]
    #[must_use]
    pub fn kvs(&self) -> &Arc<KvsDatabase> {
        &self.kvs
    }

    /// Catalog.
    #[inline]
    #[must_use]
    pub fn provider(&self) -> &Arc<StorageProvider> {
        &self.provider
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> DatabaseState {
        *self.state.read()
    }

    /// Returns true while statements are admitted.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == DatabaseState::Running
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Restores the catalog from the system storage and starts admitting
    /// statements.
    ///
    /// Sequences are restored before tables and tables before their
    /// secondary indexes. On failure the partially restored catalog is
    /// dropped and the database stays stopped.
    pub fn start(&self) -> JogasakiResult<RecoverySummary> {
        let mut state = self.state.write();
        if *state == DatabaseState::Running {
            warn!("database already running");
            return Ok(RecoverySummary::default());
        }
        let summary = match executor::restore_catalog(&self.context()) {
            Ok(summary) => summary,
            Err(e) => {
                self.provider.clear();
                self.sequences.clear();
                warn!(code = %e.code(), error = %e, "catalog recovery failed");
                return Err(e);
            }
        };
        *state = DatabaseState::Running;
        *self.started_at.write() = Some(Instant::now());
        info!(
            tables = summary.tables,
            indexes = summary.indexes,
            sequences = summary.sequences,
            "database started"
        );
        Ok(summary)
    }

    /// Stops admitting statements and drops the in-memory catalog and
    /// registered statements. Data stays in the storage engine.
    pub fn stop(&self) {
        let mut state = self.state.write();
        if *state == DatabaseState::Stopped {
            return;
        }
        self.statements.clear();
        self.provider.clear();
        self.sequences.clear();
        *state = DatabaseState::Stopped;
        *self.started_at.write() = None;
        info!("database stopped");
    }

    fn ensure_running(&self) -> JogasakiResult<()> {
        if self.is_running() {
            return Ok(());
        }
        Err(ErrorInfo::new(
            ErrorCode::InvalidArgument,
            "database is not running",
        ))
    }

    fn context(&self) -> RequestContext {
        RequestContext::new(
            Arc::clone(&self.config),
            Arc::clone(&self.provider),
            Arc::clone(&self.sequences),
            Arc::clone(&self.kvs),
        )
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Begins a transaction.
    pub fn create_transaction(&self, options: TransactionOptions) -> JogasakiResult<Arc<Transaction>> {
        self.ensure_running()?;
        let tx = self.kvs.begin(options)?;
        debug!(txn = %tx.id(), "transaction begun");
        Ok(tx)
    }

    /// Commits `tx`.
    pub fn commit(&self, tx: &Transaction) -> JogasakiResult<()> {
        tx.commit()?;
        debug!(txn = %tx.id(), "transaction committed");
        Ok(())
    }

    /// Aborts `tx`. Aborting an already ended transaction is a no-op.
    pub fn abort(&self, tx: &Transaction) -> JogasakiResult<()> {
        if !tx.is_active() {
            return Ok(());
        }
        tx.abort()?;
        debug!(txn = %tx.id(), "transaction aborted");
        Ok(())
    }

    /// Runs `f` in a new transaction, committing on `Ok` and aborting on
    /// `Err`.
    pub fn transaction<F, T>(&self, options: TransactionOptions, f: F) -> JogasakiResult<T>
    where
        F: FnOnce(&Arc<Transaction>) -> JogasakiResult<T>,
    {
        let tx = self.create_transaction(options)?;
        match f(&tx) {
            Ok(value) => {
                self.commit(&tx)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = self.abort(&tx) {
                    warn!(txn = %tx.id(), error = %abort_err, "abort after failure failed");
                }
                Err(e)
            }
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Registers a compiled statement and its host variable declarations.
    pub fn prepare(&self, statement: Statement, variables: VariableTable) -> StatementHandle {
        let prepared = PreparedStatement::new(statement, variables);
        let kind = prepared.kind();
        let handle = self.statements.insert(prepared);
        debug!(%handle, ?kind, "statement prepared");
        handle
    }

    /// Releases a registered statement. Returns false for unknown handles.
    pub fn destroy_statement(&self, handle: StatementHandle) -> bool {
        self.statements.remove(handle)
    }

    /// Binds `parameters` to the placeholders of the statement behind
    /// `handle`.
    ///
    /// A declared placeholder without a parameter fails with
    /// `UnresolvedPlaceholder`.
    pub fn resolve(
        &self,
        handle: StatementHandle,
        parameters: &Parameters,
    ) -> JogasakiResult<Executable> {
        self.ensure_running()?;
        let prepared = self.statements.get(handle)?;
        resolve(&prepared, parameters, &mut self.context().cast_context())
    }

    /// Runs `executable` under `tx`.
    pub fn execute(
        &self,
        tx: &Arc<Transaction>,
        executable: &Executable,
    ) -> JogasakiResult<ExecutionResult> {
        self.execute_with(tx, executable, ExecuteOptions::default())
    }

    /// Runs `executable` under `tx` with a cancel token or session zone.
    pub fn execute_with(
        &self,
        tx: &Arc<Transaction>,
        executable: &Executable,
        options: ExecuteOptions,
    ) -> JogasakiResult<ExecutionResult> {
        self.ensure_running()?;
        let mut ctx = self
            .context()
            .with_transaction(Arc::clone(tx))
            .with_zone_offset(options.zone_offset);
        if let Some(cancel) = options.cancel {
            ctx = ctx.with_cancel_token(cancel);
        }
        let result = executor::execute(&mut ctx, executable)?;
        self.executed.fetch_add(1, Ordering::Relaxed);
        if let Some(stats) = result.statistics() {
            debug!(
                txn = %tx.id(),
                inserted = stats.inserted,
                merged = stats.merged,
                "write completed"
            );
        }
        Ok(result)
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    /// Creates a table and its primary index. Returns false when the table
    /// exists and the statement allows that.
    pub fn create_table(&self, statement: &CreateTableStatement) -> JogasakiResult<bool> {
        self.ensure_running()?;
        executor::create_table(&self.context(), statement)
    }

    /// Drops a table with its indexes and rows.
    pub fn drop_table(&self, name: &str) -> JogasakiResult<()> {
        self.ensure_running()?;
        executor::drop_table(&self.context(), name)
    }

    /// Creates a secondary index over existing rows.
    pub fn create_index(&self, index: &Index) -> JogasakiResult<Arc<Index>> {
        self.ensure_running()?;
        executor::create_index(&self.context(), index)
    }

    /// Drops a secondary index.
    pub fn drop_index(&self, name: &str) -> JogasakiResult<()> {
        self.ensure_running()?;
        executor::drop_index(&self.context(), name)
    }

    /// Creates a sequence.
    pub fn create_sequence(
        &self,
        definition: &SequenceDefinition,
    ) -> JogasakiResult<Arc<SequenceDefinition>> {
        self.ensure_running()?;
        executor::create_sequence(&self.context(), definition)
    }

    /// Drops a sequence that no column default refers to.
    pub fn drop_sequence(&self, name: &str) -> JogasakiResult<()> {
        self.ensure_running()?;
        executor::drop_sequence(&self.context(), name)
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Returns database statistics.
    #[must_use]
    pub fn stats(&self) -> DatabaseStats {
        let indexes = self
            .provider
            .indexes()
            .iter()
            .filter(|i| !i.is_primary())
            .count();
        DatabaseStats {
            tables: self.provider.tables().len(),
            indexes,
            sequences: self.provider.sequences().len(),
            prepared_statements: self.statements.len(),
            statements_executed: self.executed.load(Ordering::Relaxed),
            engine: self.kvs.stats(),
            uptime: self.uptime(),
        }
    }

    /// Time since the last start, zero while stopped.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at
            .read()
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use jogasaki_sql::catalog::{Column, IndexKey, Table};
    use jogasaki_sql::data::Value;
    use jogasaki_sql::expr::Expression;
    use jogasaki_sql::meta::FieldType;
    use jogasaki_sql::plan::{ScanStatement, WriteKind, WriteStatement};

    use super::*;

    fn started() -> Database {
        let db = Database::open(Arc::new(KvsDatabase::new()), ExecutionConfig::for_testing()).unwrap();
        db.start().unwrap();
        db
    }

    fn create_t(db: &Database) {
        let table = Table::new(
            "T",
            vec![
                Column::new("C0", FieldType::Int4).not_null(),
                Column::new("C1", FieldType::Int4),
            ],
        );
        assert!(db
            .create_table(&CreateTableStatement::new(table, vec![IndexKey::asc("C0")]))
            .unwrap());
    }

    fn insert(c0: i32, c1: i32) -> Statement {
        Statement::Write(WriteStatement::new(
            WriteKind::Insert,
            "T",
            vec![vec![Expression::immediate(c0), Expression::immediate(c1)]],
        ))
    }

    fn scan_all(db: &Database) -> Vec<Vec<Value>> {
        let h = db.prepare(Statement::Scan(ScanStatement::new("T")), VariableTable::new());
        let exe = db.resolve(h, &Parameters::new()).unwrap();
        db.transaction(TransactionOptions::short(), |tx| db.execute(tx, &exe))
            .unwrap()
            .rows()
            .unwrap()
            .rows()
            .to_vec()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ExecutionConfig {
            max_key_size: 0,
            ..ExecutionConfig::for_testing()
        };
        let err = Database::open(Arc::new(KvsDatabase::new()), config).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_statements_require_running() {
        let db = Database::open_memory().unwrap();
        assert_eq!(db.state(), DatabaseState::Stopped);
        let err = db.create_transaction(TransactionOptions::short()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        db.start().unwrap();
        assert!(db.is_running());
        assert!(db.create_transaction(TransactionOptions::short()).is_ok());
        db.stop();
        assert!(!db.is_running());
        assert_eq!(db.uptime(), Duration::ZERO);
    }

    #[test]
    fn test_prepare_resolve_execute() {
        let db = started();
        create_t(&db);
        let h = db.prepare(
            Statement::Write(WriteStatement::new(
                WriteKind::Insert,
                "T",
                vec![vec![
                    Expression::Placeholder("k".into()),
                    Expression::Placeholder("v".into()),
                ]],
            )),
            VariableTable::new()
                .with("k", FieldType::Int4)
                .with("v", FieldType::Int4),
        );
        let exe = db
            .resolve(h, &Parameters::new().with("k", 7).with("v", 70))
            .unwrap();
        let result = db
            .transaction(TransactionOptions::short(), |tx| db.execute(tx, &exe))
            .unwrap();
        assert_eq!(result.statistics().unwrap().inserted, 1);
        assert_eq!(scan_all(&db), vec![vec![Value::Int4(7), Value::Int4(70)]]);
        assert_eq!(db.stats().statements_executed, 2);
    }

    #[test]
    fn test_missing_parameter_unresolved() {
        let db = started();
        create_t(&db);
        let h = db.prepare(
            Statement::Write(WriteStatement::new(
                WriteKind::Insert,
                "T",
                vec![vec![Expression::Placeholder("k".into()), Expression::immediate(1)]],
            )),
            VariableTable::new().with("k", FieldType::Int4),
        );
        let err = db.resolve(h, &Parameters::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnresolvedPlaceholder);
    }

    #[test]
    fn test_destroyed_handle_rejected() {
        let db = started();
        let h = db.prepare(Statement::Empty, VariableTable::new());
        assert!(db.destroy_statement(h));
        let err = db.resolve(h, &Parameters::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_transaction_aborts_on_error() {
        let db = started();
        create_t(&db);
        let h = db.prepare(insert(1, 10), VariableTable::new());
        let exe = db.resolve(h, &Parameters::new()).unwrap();
        db.transaction(TransactionOptions::short(), |tx| db.execute(tx, &exe))
            .unwrap();
        let err = db
            .transaction(TransactionOptions::short(), |tx| db.execute(tx, &exe))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UniqueConstraintViolation);
        assert_eq!(scan_all(&db).len(), 1);
        assert_eq!(db.stats().engine.active(), 0);
    }

    #[test]
    fn test_restart_restores_catalog() {
        let db = started();
        create_t(&db);
        db.create_index(&Index::secondary("T_C1", "T", vec![IndexKey::asc("C1")]))
            .unwrap();
        db.create_sequence(&SequenceDefinition::new("S")).unwrap();
        for (k, v) in [(1, 10), (2, 20)] {
            let exe = db
                .resolve(db.prepare(insert(k, v), VariableTable::new()), &Parameters::new())
                .unwrap();
            db.transaction(TransactionOptions::short(), |tx| db.execute(tx, &exe))
                .unwrap();
        }
        db.stop();
        assert_eq!(db.stats().tables, 0);
        assert_eq!(db.stats().prepared_statements, 0);

        let summary = db.start().unwrap();
        assert_eq!(summary.tables, 1);
        assert_eq!(summary.indexes, 1);
        let stats = db.stats();
        assert_eq!((stats.tables, stats.indexes, stats.sequences), (1, 1, 1));
        assert_eq!(
            scan_all(&db),
            vec![
                vec![Value::Int4(1), Value::Int4(10)],
                vec![Value::Int4(2), Value::Int4(20)],
            ]
        );
    }

    #[test]
    fn test_canceled_execution() {
        let db = started();
        create_t(&db);
        let exe = db
            .resolve(db.prepare(insert(1, 1), VariableTable::new()), &Parameters::new())
            .unwrap();
        let tx = db.create_transaction(TransactionOptions::short()).unwrap();
        let token = CancelToken::new();
        token.cancel();
        let err = db
            .execute_with(&tx, &exe, ExecuteOptions::default().with_cancel_token(token))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::OperationCanceled);
        assert!(!tx.is_active());
        db.abort(&tx).unwrap();
    }

    #[test]
    fn test_drop_definitions() {
        let db = started();
        create_t(&db);
        db.create_index(&Index::secondary("T_C1", "T", vec![IndexKey::asc("C1")]))
            .unwrap();
        db.drop_index("T_C1").unwrap();
        db.drop_table("T").unwrap();
        assert_eq!(
            db.drop_table("T").unwrap_err().code(),
            ErrorCode::TargetNotFound
        );
        db.create_sequence(&SequenceDefinition::new("S")).unwrap();
        db.drop_sequence("S").unwrap();
        assert_eq!(db.stats().sequences, 0);
    }
}
