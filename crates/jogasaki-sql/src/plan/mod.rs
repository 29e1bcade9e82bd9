//! Compiled statements and their variable layout.
//!
//! The planner hands the engine a [`Statement`] together with a
//! [`VariableTable`] declaring its host variables. [`resolve`] binds
//! [`Parameters`] to the placeholders and produces an [`Executable`]:
//!
//! ```text
//!   Statement + VariableTable --prepare--> PreparedStatement
//!   PreparedStatement + Parameters --resolve--> Executable --execute--> result
//! ```

mod resolve;
mod statement;
mod variables;

pub use resolve::{resolve, Executable, PreparedStatement};
pub use statement::{
    CreateTableStatement, FindStatement, ScanStatement, Statement, WriteKind, WriteStatement,
};
pub use variables::{BlockScope, Parameters, VariableTable};

/// Classification of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// Insert family.
    Write,
    /// Read returning rows.
    Query,
    /// `CREATE TABLE`.
    CreateTable,
    /// `DROP TABLE`.
    DropTable,
    /// `CREATE INDEX`.
    CreateIndex,
    /// `DROP INDEX`.
    DropIndex,
    /// `CREATE SEQUENCE`.
    CreateSequence,
    /// `DROP SEQUENCE`.
    DropSequence,
    /// No effect.
    Empty,
}

impl StatementKind {
    /// Returns true for definition statements.
    #[must_use]
    pub const fn is_ddl(self) -> bool {
        !matches!(
            self,
            StatementKind::Write | StatementKind::Query | StatementKind::Empty
        )
    }
}

/// Ordinal weight of a statement, used as a scheduling hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkLevel {
    /// Touches a single key.
    KeyOperation,
    /// A handful of keys.
    SimpleCrud,
    /// A range of records.
    SimpleMultirecord,
    /// Joins.
    Join,
    /// Aggregation.
    Aggregate,
    /// Unbounded, e.g. definition changes.
    Infinity,
}
