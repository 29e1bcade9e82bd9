//! Statement execution.
//!
//! [`execute`] dispatches a resolved statement to the component that runs
//! it:
//!
//! ```text
//!                      ┌──────────────┐
//!   Executable ──────▶ │   execute    │
//!                      └──────┬───────┘
//!        ┌──────────────┬─────┴────────┬────────────────┐
//!        ▼              ▼              ▼                ▼
//!  WritePipeline   scan / find    create_* / drop_*   (empty)
//!  (caller's tx)   (caller's tx)  (internal tx)
//! ```
//!
//! Writes and reads run under the caller's transaction carried by the
//! [`RequestContext`]. A failing write aborts it; definition statements
//! commit their own transaction and leave the caller's alone.

mod context;
mod ddl;
mod layout;
mod query;
mod write;

use jogasaki_common::{ErrorCode, JogasakiResult};
use tracing::debug;

use crate::plan::{Executable, Statement};

pub use context::{CancelToken, RequestContext};
pub use ddl::{
    create_index, create_sequence, create_table, drop_index, drop_sequence, drop_table,
    restore_catalog, row_id_sequence_name, RecoverySummary, ROW_ID_COLUMN,
};
pub use query::{find, scan, ResultSet};
pub use write::{WritePipeline, WriteState, WriteStatistics};

/// Outcome of a statement.
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    /// Row counts of a write.
    Written(WriteStatistics),
    /// Rows of a query.
    Rows(ResultSet),
    /// A statement without output.
    Done,
}

impl ExecutionResult {
    /// Write counters, if this is a write result.
    #[must_use]
    pub fn statistics(&self) -> Option<&WriteStatistics> {
        match self {
            ExecutionResult::Written(s) => Some(s),
            _ => None,
        }
    }

    /// Rows, if this is a query result.
    #[must_use]
    pub fn rows(&self) -> Option<&ResultSet> {
        match self {
            ExecutionResult::Rows(r) => Some(r),
            _ => None,
        }
    }
}

/// Runs `executable`.
///
/// Writes and queries require the context to carry a transaction. A
/// canceled query aborts the transaction like a failed write does.
pub fn execute(ctx: &mut RequestContext, executable: &Executable) -> JogasakiResult<ExecutionResult> {
    let host = executable.host_variables();
    let kind = executable.kind();
    let result = match executable.statement() {
        Statement::Write(stmt) => {
            let mut pipeline = WritePipeline::new(ctx, stmt)?;
            pipeline
                .run(ctx, &stmt.tuples, host)
                .map(ExecutionResult::Written)
        }
        Statement::Scan(stmt) => {
            let rows = scan(ctx, stmt, host);
            query_result(ctx, rows)
        }
        Statement::Find(stmt) => {
            let rows = find(ctx, stmt, host);
            query_result(ctx, rows)
        }
        Statement::CreateTable(stmt) => create_table(ctx, stmt).map(|_| ExecutionResult::Done),
        Statement::DropTable { name } => drop_table(ctx, name).map(|()| ExecutionResult::Done),
        Statement::CreateIndex(index) => create_index(ctx, index).map(|_| ExecutionResult::Done),
        Statement::DropIndex { name } => drop_index(ctx, name).map(|()| ExecutionResult::Done),
        Statement::CreateSequence(def) => {
            create_sequence(ctx, def).map(|_| ExecutionResult::Done)
        }
        Statement::DropSequence { name } => {
            drop_sequence(ctx, name).map(|()| ExecutionResult::Done)
        }
        Statement::Empty => Ok(ExecutionResult::Done),
    };
    match &result {
        Ok(_) => debug!(?kind, level = ?executable.work_level(), "statement executed"),
        Err(e) => debug!(?kind, code = %e.code(), "statement failed"),
    }
    result
}

fn query_result(
    ctx: &mut RequestContext,
    result: JogasakiResult<ResultSet>,
) -> JogasakiResult<ExecutionResult> {
    result.map(ExecutionResult::Rows).map_err(|e| {
        if e.code() == ErrorCode::OperationCanceled {
            ctx.abort_on_error(&e);
        }
        e
    })
}
