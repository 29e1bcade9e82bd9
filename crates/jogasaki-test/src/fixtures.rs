//! Database fixtures.

use std::sync::{Arc, Once};

use jogasaki_common::{ExecutionConfig, JogasakiResult};
use jogasaki_kvs::{KvsDatabase, Transaction, TransactionOptions};
use jogasaki_server::Database;
use jogasaki_sql::catalog::{Column, IndexKey, Table};
use jogasaki_sql::data::Value;
use jogasaki_sql::expr::Expression;
use jogasaki_sql::meta::FieldType;
use jogasaki_sql::plan::{CreateTableStatement, ScanStatement, WriteKind, WriteStatement};
use jogasaki_sql::{ExecutionResult, Parameters, Statement, VariableTable, WriteStatistics};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a subscriber honoring `RUST_LOG`, once per process.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A started database over an in-memory engine.
pub struct TestDatabase {
    /// The database.
    pub db: Database,
}

impl TestDatabase {
    /// Opens and starts a database with the test configuration.
    pub fn new() -> Self {
        Self::with_config(ExecutionConfig::for_testing())
    }

    /// Opens and starts a database with `config`.
    pub fn with_config(config: ExecutionConfig) -> Self {
        init_tracing();
        let db = Database::open(Arc::new(KvsDatabase::new()), config)
            .expect("configuration is valid");
        db.start().expect("empty catalog restores");
        Self { db }
    }

    /// Creates `name` with `columns`, keyed by the columns in `key`.
    pub fn create_table(&self, name: &str, columns: Vec<Column>, key: &[&str]) {
        let keys = key.iter().map(|k| IndexKey::asc(*k)).collect();
        self.db
            .create_table(&CreateTableStatement::new(Table::new(name, columns), keys))
            .expect("table is created");
    }

    /// Begins a short transaction.
    pub fn begin(&self) -> Arc<Transaction> {
        self.db
            .create_transaction(TransactionOptions::short())
            .expect("database is running")
    }

    /// Prepares, resolves and runs `statement` under `tx`.
    pub fn run(&self, tx: &Arc<Transaction>, statement: Statement) -> JogasakiResult<ExecutionResult> {
        let handle = self.db.prepare(statement, VariableTable::new());
        let exe = self.db.resolve(handle, &Parameters::new())?;
        let result = self.db.execute(tx, &exe);
        self.db.destroy_statement(handle);
        result
    }

    /// Inserts `rows` into `table` under `tx`.
    pub fn insert(
        &self,
        tx: &Arc<Transaction>,
        table: &str,
        rows: Vec<Vec<Value>>,
    ) -> JogasakiResult<WriteStatistics> {
        let result = self.run(tx, insert_statement(WriteKind::Insert, table, rows))?;
        Ok(result.statistics().copied().unwrap_or_default())
    }

    /// Reads every row of `table` in primary key order in a fresh
    /// transaction.
    pub fn select_all(&self, table: &str) -> Vec<Vec<Value>> {
        let tx = self.begin();
        let rows = self
            .run(&tx, Statement::Scan(ScanStatement::new(table)))
            .expect("scan succeeds")
            .rows()
            .map(|rs| rs.rows().to_vec())
            .unwrap_or_default();
        self.db.commit(&tx).expect("read-only commit succeeds");
        rows
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// A write statement with one literal tuple per row.
pub fn insert_statement(kind: WriteKind, table: &str, rows: Vec<Vec<Value>>) -> Statement {
    let tuples = rows
        .into_iter()
        .map(|row| row.into_iter().map(Expression::Immediate).collect())
        .collect();
    Statement::Write(WriteStatement::new(kind, table, tuples))
}

/// An `INT` column.
pub fn int_column(name: &str) -> Column {
    Column::new(name, FieldType::Int4)
}

/// Shorthand for a row of `INT` values.
pub fn ints(values: &[i32]) -> Vec<Value> {
    values.iter().map(|v| Value::Int4(*v)).collect()
}
