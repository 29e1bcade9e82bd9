//! Compiled statements.

use crate::catalog::{Index, IndexKey, SequenceDefinition, Table};
use crate::expr::Expression;

use super::{StatementKind, WorkLevel};

/// Conflict policy of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    /// `INSERT`; an existing primary key is a unique constraint violation.
    Insert,
    /// `INSERT OR REPLACE`; an existing row is overwritten.
    InsertOrReplace,
    /// `INSERT IF NOT EXISTS`; an existing row leaves the tuple unwritten.
    InsertSkip,
}

/// `INSERT ... VALUES (...), (...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteStatement {
    /// Conflict policy.
    pub kind: WriteKind,
    /// Target table.
    pub table: String,
    /// Target columns. Empty means every visible column in declaration order.
    pub columns: Vec<String>,
    /// One expression per target column, per tuple.
    pub tuples: Vec<Vec<Expression>>,
}

impl WriteStatement {
    /// A write of `tuples` into every visible column of `table`.
    #[must_use]
    pub fn new(kind: WriteKind, table: impl Into<String>, tuples: Vec<Vec<Expression>>) -> Self {
        Self {
            kind,
            table: table.into(),
            columns: Vec::new(),
            tuples,
        }
    }

    /// Restricts the target columns.
    #[must_use]
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// Range read over an index, in key order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanStatement {
    /// Index to read; a table name reads its primary index.
    pub index: String,
    /// Values for the leading key columns. Empty scans the whole index.
    pub prefix: Vec<Expression>,
    /// Output columns. Empty means every visible column.
    pub columns: Vec<String>,
}

impl ScanStatement {
    /// A full scan of `index`.
    #[must_use]
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            prefix: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Bounds the scan to keys starting with `prefix`.
    #[must_use]
    pub fn with_prefix(mut self, prefix: Vec<Expression>) -> Self {
        self.prefix = prefix;
        self
    }

    /// Restricts the output columns.
    #[must_use]
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// Point lookup by full primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct FindStatement {
    /// Table to read.
    pub table: String,
    /// One expression per primary key column.
    pub key: Vec<Expression>,
    /// Output columns. Empty means every visible column.
    pub columns: Vec<String>,
}

impl FindStatement {
    /// A lookup of `key` in `table`.
    #[must_use]
    pub fn new(table: impl Into<String>, key: Vec<Expression>) -> Self {
        Self {
            table: table.into(),
            key,
            columns: Vec::new(),
        }
    }
}

/// `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    /// The table.
    pub table: Table,
    /// Primary key. Empty makes the table keyed by a hidden generated row id.
    pub primary_key: Vec<IndexKey>,
    /// Succeed without effect when the table exists.
    pub if_not_exists: bool,
}

impl CreateTableStatement {
    /// Creates `table` keyed by `primary_key`.
    #[must_use]
    pub fn new(table: Table, primary_key: Vec<IndexKey>) -> Self {
        Self {
            table,
            primary_key,
            if_not_exists: false,
        }
    }
}

/// A compiled statement as handed over by the planner.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Insert family.
    Write(WriteStatement),
    /// Index range read.
    Scan(ScanStatement),
    /// Primary key lookup.
    Find(FindStatement),
    /// `CREATE TABLE`.
    CreateTable(CreateTableStatement),
    /// `DROP TABLE`.
    DropTable {
        /// Table name.
        name: String,
    },
    /// `CREATE INDEX`.
    CreateIndex(Index),
    /// `DROP INDEX`.
    DropIndex {
        /// Index name.
        name: String,
    },
    /// `CREATE SEQUENCE`.
    CreateSequence(SequenceDefinition),
    /// `DROP SEQUENCE`.
    DropSequence {
        /// Sequence name.
        name: String,
    },
    /// A statement with no effect, e.g. a lone `;`.
    Empty,
}

impl Statement {
    /// Classification used by the dispatcher.
    #[must_use]
    pub fn kind(&self) -> StatementKind {
        match self {
            Statement::Write(_) => StatementKind::Write,
            Statement::Scan(_) | Statement::Find(_) => StatementKind::Query,
            Statement::CreateTable(_) => StatementKind::CreateTable,
            Statement::DropTable { .. } => StatementKind::DropTable,
            Statement::CreateIndex(_) => StatementKind::CreateIndex,
            Statement::DropIndex { .. } => StatementKind::DropIndex,
            Statement::CreateSequence(_) => StatementKind::CreateSequence,
            Statement::DropSequence { .. } => StatementKind::DropSequence,
            Statement::Empty => StatementKind::Empty,
        }
    }

    /// Computational weight of the statement.
    #[must_use]
    pub fn work_level(&self) -> WorkLevel {
        let mut aggregates = false;
        for expr in self.expressions() {
            expr.walk(&mut |e| {
                if matches!(e, Expression::AggregateCall { .. }) {
                    aggregates = true;
                }
            });
        }
        let base = match self {
            Statement::Empty | Statement::Find(_) => WorkLevel::KeyOperation,
            Statement::Write(w) if w.tuples.len() <= 1 => WorkLevel::KeyOperation,
            Statement::Write(_) => WorkLevel::SimpleCrud,
            Statement::Scan(_) => WorkLevel::SimpleMultirecord,
            _ => WorkLevel::Infinity,
        };
        if aggregates {
            base.max(WorkLevel::Aggregate)
        } else {
            base
        }
    }

    /// Every top-level expression of the statement.
    #[must_use]
    pub fn expressions(&self) -> Vec<&Expression> {
        match self {
            Statement::Write(w) => w.tuples.iter().flatten().collect(),
            Statement::Scan(s) => s.prefix.iter().collect(),
            Statement::Find(f) => f.key.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Rewrites every expression of the statement with `f`.
    pub fn map_expressions<E>(
        self,
        f: &mut impl FnMut(Expression) -> Result<Expression, E>,
    ) -> Result<Self, E> {
        let mut map_all = |exprs: Vec<Expression>| -> Result<Vec<Expression>, E> {
            exprs.into_iter().map(|e| e.map(&mut *f)).collect()
        };
        Ok(match self {
            Statement::Write(mut w) => {
                w.tuples = w.tuples.into_iter().map(&mut map_all).collect::<Result<_, _>>()?;
                Statement::Write(w)
            }
            Statement::Scan(mut s) => {
                s.prefix = map_all(s.prefix)?;
                Statement::Scan(s)
            }
            Statement::Find(mut find) => {
                find.key = map_all(find.key)?;
                Statement::Find(find)
            }
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Column;
    use crate::expr::BuiltinFunction;
    use crate::meta::FieldType;

    fn lit(v: i32) -> Expression {
        Expression::immediate(v)
    }

    #[test]
    fn test_kind() {
        let w = Statement::Write(WriteStatement::new(WriteKind::Insert, "T", vec![vec![lit(1)]]));
        assert_eq!(w.kind(), StatementKind::Write);
        assert_eq!(Statement::Scan(ScanStatement::new("T")).kind(), StatementKind::Query);
        assert_eq!(Statement::Empty.kind(), StatementKind::Empty);
        assert_eq!(
            Statement::DropSequence { name: "S".into() }.kind(),
            StatementKind::DropSequence
        );
    }

    #[test]
    fn test_work_level() {
        let single = Statement::Write(WriteStatement::new(WriteKind::Insert, "T", vec![vec![lit(1)]]));
        let multi = Statement::Write(WriteStatement::new(
            WriteKind::Insert,
            "T",
            vec![vec![lit(1)], vec![lit(2)]],
        ));
        assert_eq!(single.work_level(), WorkLevel::KeyOperation);
        assert_eq!(multi.work_level(), WorkLevel::SimpleCrud);
        assert_eq!(
            Statement::Scan(ScanStatement::new("T")).work_level(),
            WorkLevel::SimpleMultirecord
        );
        let table = Table::new("T", vec![Column::new("C0", FieldType::Int4)]);
        let ddl = Statement::CreateTable(CreateTableStatement::new(table, vec![IndexKey::asc("C0")]));
        assert_eq!(ddl.work_level(), WorkLevel::Infinity);
        assert!(WorkLevel::KeyOperation < WorkLevel::Join);
    }

    #[test]
    fn test_aggregate_raises_work_level() {
        let agg = Expression::AggregateCall {
            name: "sum".into(),
            arguments: vec![lit(1)],
        };
        let find = Statement::Find(FindStatement::new(
            "T",
            vec![Expression::call(BuiltinFunction::Abs, vec![agg])],
        ));
        assert_eq!(find.work_level(), WorkLevel::Aggregate);
    }

    #[test]
    fn test_map_expressions() {
        let stmt = Statement::Write(WriteStatement::new(
            WriteKind::Insert,
            "T",
            vec![vec![Expression::Placeholder("p".into()), lit(2)]],
        ));
        let mapped = stmt
            .map_expressions(&mut |e| match e {
                Expression::Placeholder(_) => Ok::<_, ()>(Expression::HostVariable(0)),
                other => Ok(other),
            })
            .unwrap();
        let Statement::Write(w) = mapped else {
            panic!("expected write");
        };
        assert_eq!(w.tuples[0][0], Expression::HostVariable(0));
        assert_eq!(w.tuples[0][1], lit(2));
    }
}
