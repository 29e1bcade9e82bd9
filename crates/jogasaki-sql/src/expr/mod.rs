//! Scalar expressions and their evaluation.
//!
//! An [`Expression`] is a compiled scalar expression tree. [`evaluate`] walks
//! it post-order against a [`Scope`] (stream variables of the current block
//! plus bound host variables) and yields one [`Value`].
//!
//! ```text
//!        Binary(+)
//!        /       \
//!   Variable(0)  Cast(decimal(5,2))
//!                    |
//!               HostVariable(1)
//! ```

mod error;
mod evaluator;
mod functions;

pub use error::{EvalError, EvalResult};
pub use evaluator::{evaluate, evaluate_typed, EvalContext, Scope};
pub use functions::like_match;

use crate::data::Value;
use crate::meta::FieldType;

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    /// `+x`
    Plus,
    /// `-x`
    Minus,
    /// `NOT x`
    Not,
    /// `x IS NULL`
    IsNull,
    /// `x IS NOT NULL`
    IsNotNull,
    /// `x IS TRUE`
    IsTrue,
    /// `x IS NOT TRUE`
    IsNotTrue,
    /// `x IS FALSE`
    IsFalse,
    /// `x IS NOT FALSE`
    IsNotFalse,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Remainder,
    /// `||`
    Concat,
    /// `AND`
    And,
    /// `OR`
    Or,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOperator {
    /// `=`
    Equal,
    /// `<>`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
}

/// Built-in scalar functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFunction {
    /// `abs(x)`
    Abs,
    /// `round(x [, scale])`, half away from zero
    Round,
    /// `ceil(x)`
    Ceil,
    /// `floor(x)`
    Floor,
    /// `upper(s)`
    Upper,
    /// `lower(s)`
    Lower,
    /// `character_length(s)`
    CharacterLength,
    /// `octet_length(s)`
    OctetLength,
    /// `substring(s, start [, length])`
    Substring,
    /// `mod(x, y)`
    Mod,
}

impl BuiltinFunction {
    /// SQL name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            BuiltinFunction::Abs => "abs",
            BuiltinFunction::Round => "round",
            BuiltinFunction::Ceil => "ceil",
            BuiltinFunction::Floor => "floor",
            BuiltinFunction::Upper => "upper",
            BuiltinFunction::Lower => "lower",
            BuiltinFunction::CharacterLength => "character_length",
            BuiltinFunction::OctetLength => "octet_length",
            BuiltinFunction::Substring => "substring",
            BuiltinFunction::Mod => "mod",
        }
    }

    /// Looks a function up by name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        const ALL: [BuiltinFunction; 10] = [
            BuiltinFunction::Abs,
            BuiltinFunction::Round,
            BuiltinFunction::Ceil,
            BuiltinFunction::Floor,
            BuiltinFunction::Upper,
            BuiltinFunction::Lower,
            BuiltinFunction::CharacterLength,
            BuiltinFunction::OctetLength,
            BuiltinFunction::Substring,
            BuiltinFunction::Mod,
        ];
        ALL.into_iter().find(|f| f.name().eq_ignore_ascii_case(name))
    }
}

/// A compiled scalar expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A literal.
    Immediate(Value),
    /// Stream variable of the enclosing block, by scope index.
    Variable(usize),
    /// Bound host variable, by index into the host variable table.
    HostVariable(usize),
    /// Host variable not yet bound to an index (`:name`).
    Placeholder(String),
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOperator,
        /// Operand.
        operand: Box<Expression>,
    },
    /// Binary arithmetic, concatenation or logical operation.
    Binary {
        /// Operator.
        op: BinaryOperator,
        /// Left operand.
        left: Box<Expression>,
        /// Right operand.
        right: Box<Expression>,
    },
    /// Comparison.
    Compare {
        /// Operator.
        op: CompareOperator,
        /// Left operand.
        left: Box<Expression>,
        /// Right operand.
        right: Box<Expression>,
    },
    /// `CAST(operand AS target)`.
    Cast {
        /// Operand.
        operand: Box<Expression>,
        /// Target type.
        target: FieldType,
    },
    /// `CASE WHEN .. THEN .. ELSE .. END`.
    Conditional {
        /// `(condition, result)` pairs tried in order.
        alternatives: Vec<(Expression, Expression)>,
        /// `ELSE` branch; NULL when absent.
        default: Option<Box<Expression>>,
    },
    /// `COALESCE(..)`.
    Coalesce(Vec<Expression>),
    /// `input [NOT] LIKE pattern [ESCAPE escape]`.
    Like {
        /// Matched text.
        input: Box<Expression>,
        /// Pattern with `%` and `_`.
        pattern: Box<Expression>,
        /// Escape character.
        escape: Option<Box<Expression>>,
        /// `NOT LIKE`.
        negated: bool,
    },
    /// Built-in scalar function.
    FunctionCall {
        /// Function.
        function: BuiltinFunction,
        /// Arguments.
        arguments: Vec<Expression>,
    },
    /// Aggregate or user-defined call; evaluated by the operator graph only.
    AggregateCall {
        /// Function name.
        name: String,
        /// Arguments.
        arguments: Vec<Expression>,
    },
}

impl Expression {
    /// A literal.
    #[must_use]
    pub fn immediate(value: impl Into<Value>) -> Self {
        Expression::Immediate(value.into())
    }

    /// A unary operation.
    #[must_use]
    pub fn unary(op: UnaryOperator, operand: Expression) -> Self {
        Expression::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// A binary operation.
    #[must_use]
    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// A comparison.
    #[must_use]
    pub fn compare(op: CompareOperator, left: Expression, right: Expression) -> Self {
        Expression::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// A cast.
    #[must_use]
    pub fn cast(operand: Expression, target: FieldType) -> Self {
        Expression::Cast {
            operand: Box::new(operand),
            target,
        }
    }

    /// A built-in function call.
    #[must_use]
    pub fn call(function: BuiltinFunction, arguments: Vec<Expression>) -> Self {
        Expression::FunctionCall {
            function,
            arguments,
        }
    }

    /// Calls `f` on this node and every descendant, pre-order.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expression)) {
        f(self);
        match self {
            Expression::Unary { operand, .. } | Expression::Cast { operand, .. } => operand.walk(f),
            Expression::Binary { left, right, .. } | Expression::Compare { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            Expression::Conditional {
                alternatives,
                default,
            } => {
                for (condition, result) in alternatives {
                    condition.walk(f);
                    result.walk(f);
                }
                if let Some(d) = default {
                    d.walk(f);
                }
            }
            Expression::Like {
                input,
                pattern,
                escape,
                ..
            } => {
                input.walk(f);
                pattern.walk(f);
                if let Some(e) = escape {
                    e.walk(f);
                }
            }
            Expression::Coalesce(args)
            | Expression::FunctionCall {
                arguments: args, ..
            }
            | Expression::AggregateCall {
                arguments: args, ..
            } => {
                for a in args {
                    a.walk(f);
                }
            }
            Expression::Immediate(_)
            | Expression::Variable(_)
            | Expression::HostVariable(_)
            | Expression::Placeholder(_) => {}
        }
    }

    /// Rewrites every node bottom-up with `f`.
    pub fn map<E>(self, f: &mut impl FnMut(Expression) -> Result<Expression, E>) -> Result<Expression, E> {
        let mapped = match self {
            Expression::Unary { op, operand } => Expression::Unary {
                op,
                operand: Box::new(operand.map(f)?),
            },
            Expression::Cast { operand, target } => Expression::Cast {
                operand: Box::new(operand.map(f)?),
                target,
            },
            Expression::Binary { op, left, right } => Expression::Binary {
                op,
                left: Box::new(left.map(f)?),
                right: Box::new(right.map(f)?),
            },
            Expression::Compare { op, left, right } => Expression::Compare {
                op,
                left: Box::new(left.map(f)?),
                right: Box::new(right.map(f)?),
            },
            Expression::Conditional {
                alternatives,
                default,
            } => Expression::Conditional {
                alternatives: alternatives
                    .into_iter()
                    .map(|(c, r)| Ok((c.map(f)?, r.map(f)?)))
                    .collect::<Result<_, E>>()?,
                default: match default {
                    Some(d) => Some(Box::new(d.map(f)?)),
                    None => None,
                },
            },
            Expression::Like {
                input,
                pattern,
                escape,
                negated,
            } => Expression::Like {
                input: Box::new(input.map(f)?),
                pattern: Box::new(pattern.map(f)?),
                escape: match escape {
                    Some(e) => Some(Box::new(e.map(f)?)),
                    None => None,
                },
                negated,
            },
            Expression::Coalesce(args) => Expression::Coalesce(
                args.into_iter().map(|a| a.map(f)).collect::<Result<_, E>>()?,
            ),
            Expression::FunctionCall {
                function,
                arguments,
            } => Expression::FunctionCall {
                function,
                arguments: arguments
                    .into_iter()
                    .map(|a| a.map(f))
                    .collect::<Result<_, E>>()?,
            },
            Expression::AggregateCall { name, arguments } => Expression::AggregateCall {
                name,
                arguments: arguments
                    .into_iter()
                    .map(|a| a.map(f))
                    .collect::<Result<_, E>>()?,
            },
            leaf => leaf,
        };
        f(mapped)
    }
}
