//! Silica shader intermediate representation.
//!
//! An arena-based typed expression/statement graph describing shader
//! programs. Callers build a [`ShaderGraph`] through its validating
//! constructors and hand one statement root per shader stage to the
//! SPIR-V backend.

pub mod arena;
mod display;
mod error;
mod expr;
mod graph;
mod stmt;
mod types;
mod variable;

pub use arena::{Arena, Handle};
pub use display::dump_graph;
pub use error::IrError;
pub use expr::{swizzle_component_index, BinaryOp, Constant, Expression, MathFunction, UnaryOp};
pub use graph::ShaderGraph;
pub use stmt::Statement;
pub use types::{ScalarKind, ShaderType, StructMember, VectorSize};
pub use variable::{
    AttributeBuiltin, BufferKind, FragmentBuiltin, ImageDims, InterpolantBuiltin, Variable,
};
