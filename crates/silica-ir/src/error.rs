//! Error types for the silica IR.

/// Errors reported while constructing or typing IR nodes.
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// A handle index is out of bounds for its arena.
    #[error("handle index {index} out of bounds (arena size: {size})")]
    BadHandle { index: usize, size: usize },

    /// Operand types disagree where they must match.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A swizzle mask is empty, too long, or uses characters outside
    /// `{x,y,z,w,r,g,b,a}`, or selects past the source vector's width.
    #[error("invalid swizzle mask {mask:?}")]
    InvalidSwizzle { mask: String },

    /// An operation node has the wrong number of children.
    #[error("{fun} expects {expected} operand(s), found {found}")]
    ArityMismatch {
        fun: &'static str,
        expected: usize,
        found: usize,
    },

    /// A type has no encoding in the supported subset.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// An operation cannot be applied to the given operand types.
    #[error("unsupported operation: {0}")]
    UnsupportedOp(String),
}
