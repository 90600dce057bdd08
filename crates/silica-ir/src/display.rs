//! Display implementations and a text dump for debugging.

use std::fmt;

use crate::expr::{Constant, Expression};
use crate::graph::ShaderGraph;
use crate::stmt::Statement;
use crate::types::{ScalarKind, ShaderType, VectorSize};
use crate::variable::Variable;

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Float => "f32",
            Self::Uint => "u32",
            Self::Sint => "i32",
            Self::Bool => "bool",
        })
    }
}

impl fmt::Display for VectorSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u32)
    }
}

impl fmt::Display for ShaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "{kind}"),
            Self::Vector { scalar, size, .. } => write!(f, "vec{size}<{scalar}>"),
            Self::Matrix {
                scalar,
                rows,
                columns,
                ..
            } => write!(f, "mat{rows}x{columns}<{scalar}>"),
            Self::Array { base, len, .. } => write!(f, "array<{base}, {len}>"),
            Self::Struct { members, .. } => {
                write!(f, "struct {{")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " @{} {}", m.offset, m.ty)?;
                }
                write!(f, " }}")
            }
        }
    }
}

/// Renders the graph as indented text, one line per node.
pub fn dump_graph(graph: &ShaderGraph) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(out, "Variables:");
    for (h, var) in graph.variables.iter() {
        let desc = match var {
            Variable::Buffer {
                set, slot, kind, ty, ..
            } => format!("buffer({set}, {slot}) {kind:?} : {ty}"),
            Variable::StructMember { parent, index } => {
                format!("member {index} of {parent:?}")
            }
            Variable::ArrayMember { parent, index } => {
                format!("element {index:?} of {parent:?}")
            }
            Variable::Attribute { location, .. } => format!("attribute(loc {location})"),
            Variable::Interpolant { location, .. } => format!("interpolant(loc {location})"),
            Variable::TessLevelInner => "tess_level_inner".into(),
            Variable::TessLevelOuter => "tess_level_outer".into(),
            Variable::Fragment { location, .. } => format!("fragment(loc {location})"),
            Variable::SampledImage {
                set, slot, dims, ..
            } => format!("sampled_image({set}, {slot}) {dims:?}"),
        };
        let _ = writeln!(out, "  {h:?} {desc}");
    }
    let _ = writeln!(out, "Expressions:");
    for (h, expr) in graph.expressions.iter() {
        let desc = match expr {
            Expression::Constant(Constant::F32(v)) => format!("const {v}f"),
            Expression::Constant(Constant::U32(v)) => format!("const {v}u"),
            Expression::Constant(Constant::I32(v)) => format!("const {v}i"),
            Expression::Constant(Constant::Bool(v)) => format!("const {v}"),
            Expression::Constant(Constant::Composite { ty, .. }) => format!("const {ty}"),
            Expression::Construct { components } => format!("construct {components:?}"),
            Expression::Swizzle { vector, mask } => format!("{vector:?}.{mask}"),
            Expression::Unary { op, expr } => format!("{op:?} {expr:?}"),
            Expression::Binary { op, left, right } => format!("{op:?} {left:?} {right:?}"),
            Expression::Math { fun, .. } => format!("{}(...)", fun.name()),
            Expression::Read { variable } => format!("read {variable:?}"),
            Expression::Sample { image, coords } => format!("sample {image:?} at {coords:?}"),
        };
        let _ = writeln!(out, "  {h:?} {desc}");
    }
    let _ = writeln!(out, "Statements:");
    for (h, stmt) in graph.statements.iter() {
        let desc = match stmt {
            Statement::Sequence { first, second } => format!("seq {first:?} {second:?}"),
            Statement::Write { variable, value } => format!("write {value:?} -> {variable:?}"),
        };
        let _ = writeln!(out, "  {h:?} {desc}");
    }
    out
}
