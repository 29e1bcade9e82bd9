//! Prepared statements and parameter binding.

use std::collections::HashSet;
use std::sync::Arc;

use jogasaki_common::{ErrorCode, ErrorInfo, JogasakiResult};
use tracing::trace;

use crate::accessor::{RecordBuffer, RecordRef};
use crate::conv::{assign, CastContext};
use crate::data::Value;
use crate::expr::Expression;
use crate::meta::{FieldType, FieldTypeKind};

use super::statement::Statement;
use super::variables::{Parameters, VariableTable};
use super::{StatementKind, WorkLevel};

/// A compiled statement and its declared host variables.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    statement: Arc<Statement>,
    host_variables: VariableTable,
}

impl PreparedStatement {
    /// Wraps the planner's output.
    #[must_use]
    pub fn new(statement: Statement, host_variables: VariableTable) -> Self {
        Self {
            statement: Arc::new(statement),
            host_variables,
        }
    }

    /// The statement, placeholders unbound.
    #[inline]
    #[must_use]
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Declared host variables.
    #[inline]
    #[must_use]
    pub fn host_variables(&self) -> &VariableTable {
        &self.host_variables
    }

    /// Classification of the statement.
    #[must_use]
    pub fn kind(&self) -> StatementKind {
        self.statement.kind()
    }

    /// Returns true if the statement references placeholders.
    #[must_use]
    pub fn has_placeholders(&self) -> bool {
        let mut found = false;
        for expr in self.statement.expressions() {
            expr.walk(&mut |e| found |= matches!(e, Expression::Placeholder(_)));
        }
        found
    }
}

/// A statement with every placeholder bound, ready for execution.
#[derive(Debug)]
pub struct Executable {
    statement: Statement,
    host_values: RecordBuffer,
    work_level: WorkLevel,
}

impl Executable {
    /// The bound statement.
    #[inline]
    #[must_use]
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Bound host variable values, addressed by `Expression::HostVariable`.
    #[must_use]
    pub fn host_variables(&self) -> RecordRef<'_> {
        self.host_values.as_record_ref()
    }

    /// Classification of the statement.
    #[must_use]
    pub fn kind(&self) -> StatementKind {
        self.statement.kind()
    }

    /// Computational weight of the statement.
    #[inline]
    #[must_use]
    pub fn work_level(&self) -> WorkLevel {
        self.work_level
    }
}

fn unresolved(name: &str) -> ErrorInfo {
    ErrorInfo::new(
        ErrorCode::UnresolvedPlaceholder,
        format!("placeholder ':{name}' is not bound"),
    )
}

/// Binds `parameters` to the placeholders of `prepared`.
///
/// Each `:name` must be declared in the statement's variable table and
/// supplied in `parameters`; otherwise `UnresolvedPlaceholder` is returned.
/// Values are converted to the declared type with assignment rules. LOB
/// values are inlined as literals since a record slot can only hold a
/// registered reference.
pub fn resolve(
    prepared: &PreparedStatement,
    parameters: &Parameters,
    cast: &mut CastContext,
) -> JogasakiResult<Executable> {
    let vars = prepared.host_variables();
    let mut host_values = RecordBuffer::new(vars.meta());
    let mut bound = HashSet::new();
    let mut bind = |e: Expression| -> JogasakiResult<Expression> {
        let Expression::Placeholder(name) = e else {
            return Ok(e);
        };
        let index = vars.index_of(&name).ok_or_else(|| unresolved(&name))?;
        let value = parameters.get(&name).ok_or_else(|| unresolved(&name))?;
        if value.kind().is_lob() {
            return Ok(Expression::Immediate(value.clone()));
        }
        if bound.insert(index) {
            let target = vars.field_type(index).copied().unwrap_or(FieldType::Unknown);
            let converted = convert(value, &target, cast)?;
            host_values.set_value(index, &converted)?;
            trace!(placeholder = %name, index, "host variable bound");
        }
        Ok(Expression::HostVariable(index))
    };
    let statement = prepared.statement().clone().map_expressions(&mut bind)?;
    let work_level = statement.work_level();
    Ok(Executable {
        statement,
        host_values,
        work_level,
    })
}

fn convert(value: &Value, target: &FieldType, cast: &mut CastContext) -> JogasakiResult<Value> {
    if value.is_null() || value.kind() == target.kind() || target.kind() == FieldTypeKind::Unknown {
        return Ok(value.clone());
    }
    Ok(assign(value, &FieldType::from(value.kind()), target, cast)?)
}
