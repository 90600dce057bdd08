//! Statements — nodes with side effects.

use crate::arena::Handle;
use crate::expr::Expression;
use crate::variable::Variable;

/// A statement node.
///
/// `Sequence` chains execute left to right and are associative for
/// emission purposes; any number of writes may be chained.
#[derive(Clone, Debug)]
pub enum Statement {
    /// Execute `first`, then `second`.
    Sequence {
        first: Handle<Statement>,
        second: Handle<Statement>,
    },
    /// Store the value of an expression into a variable.
    Write {
        variable: Handle<Variable>,
        value: Handle<Expression>,
    },
}
