//! Expressions — pure values with no side effects.

use crate::arena::Handle;
use crate::types::{ScalarKind, ShaderType};
use crate::variable::Variable;

/// A literal constant value.
///
/// Scalar constants are deduplicated by the backend per scalar kind;
/// composite constants are emitted once per node, without deduplication.
#[derive(Clone, Debug)]
pub enum Constant {
    Bool(bool),
    U32(u32),
    I32(i32),
    F32(f32),
    /// A composite literal (vector, matrix, or array of constants).
    Composite {
        ty: ShaderType,
        components: Vec<Constant>,
    },
}

impl Constant {
    /// Returns the data type of this constant.
    pub fn ty(&self) -> ShaderType {
        match self {
            Self::Bool(_) => ShaderType::BOOL,
            Self::U32(_) => ShaderType::U32,
            Self::I32(_) => ShaderType::I32,
            Self::F32(_) => ShaderType::F32,
            Self::Composite { ty, .. } => ty.clone(),
        }
    }
}

/// A unary operator.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum UnaryOp {
    Negate,
    /// Screen-space derivative in x. Fragment stage, floating point only.
    Dpdx,
    /// Screen-space derivative in y. Fragment stage, floating point only.
    Dpdy,
}

/// A binary arithmetic operator.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// A built-in math function, lowered to `GLSL.std.450` (except `Dot`,
/// which has a core SPIR-V opcode).
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum MathFunction {
    // Component-wise
    Abs,
    Floor,
    Ceil,
    Fract,
    // Exponential
    Sqrt,
    InverseSqrt,
    Pow,
    Exp,
    Log,
    Exp2,
    Log2,
    // Trigonometric
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    // Selection / interpolation
    Min,
    Max,
    Clamp,
    Mix,
    // Linear algebra
    Dot,
    Length,
    Distance,
    Cross,
    Normalize,
}

impl MathFunction {
    /// Number of operands this function takes.
    pub fn argument_count(self) -> usize {
        match self {
            Self::Abs
            | Self::Floor
            | Self::Ceil
            | Self::Fract
            | Self::Sqrt
            | Self::InverseSqrt
            | Self::Exp
            | Self::Log
            | Self::Exp2
            | Self::Log2
            | Self::Sin
            | Self::Cos
            | Self::Tan
            | Self::Asin
            | Self::Acos
            | Self::Atan
            | Self::Length
            | Self::Normalize => 1,
            Self::Pow | Self::Min | Self::Max | Self::Dot | Self::Distance | Self::Cross => 2,
            Self::Clamp | Self::Mix => 3,
        }
    }

    /// Human-readable name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Abs => "Abs",
            Self::Floor => "Floor",
            Self::Ceil => "Ceil",
            Self::Fract => "Fract",
            Self::Sqrt => "Sqrt",
            Self::InverseSqrt => "InverseSqrt",
            Self::Pow => "Pow",
            Self::Exp => "Exp",
            Self::Log => "Log",
            Self::Exp2 => "Exp2",
            Self::Log2 => "Log2",
            Self::Sin => "Sin",
            Self::Cos => "Cos",
            Self::Tan => "Tan",
            Self::Asin => "Asin",
            Self::Acos => "Acos",
            Self::Atan => "Atan",
            Self::Min => "Min",
            Self::Max => "Max",
            Self::Clamp => "Clamp",
            Self::Mix => "Mix",
            Self::Dot => "Dot",
            Self::Length => "Length",
            Self::Distance => "Distance",
            Self::Cross => "Cross",
            Self::Normalize => "Normalize",
        }
    }

    /// Whether this function accepts the given element kind.
    pub fn accepts(self, kind: ScalarKind) -> bool {
        match self {
            Self::Abs => matches!(kind, ScalarKind::Float | ScalarKind::Sint),
            Self::Min | Self::Max | Self::Clamp => {
                matches!(kind, ScalarKind::Float | ScalarKind::Uint | ScalarKind::Sint)
            }
            // Everything else is floating point only.
            _ => kind == ScalarKind::Float,
        }
    }
}

/// Maps a swizzle mask character to a component index.
///
/// `x/r → 0, y/g → 1, z/b → 2, w/a → 3`; anything else is invalid.
pub fn swizzle_component_index(c: char) -> Option<u32> {
    match c {
        'x' | 'r' => Some(0),
        'y' | 'g' => Some(1),
        'z' | 'b' => Some(2),
        'w' | 'a' => Some(3),
        _ => None,
    }
}

/// An expression node. Expressions are immutable once appended and may be
/// shared; a node referenced twice compiles to a single instruction.
#[derive(Clone, Debug)]
pub enum Expression {
    /// A literal constant.
    Constant(Constant),
    /// Build a vector from scalar and vector components.
    Construct { components: Vec<Handle<Expression>> },
    /// Select/reorder vector components with a 1–4 character mask
    /// over `{x,y,z,w,r,g,b,a}`.
    Swizzle {
        vector: Handle<Expression>,
        mask: String,
    },
    /// Apply a unary operator.
    Unary {
        op: UnaryOp,
        expr: Handle<Expression>,
    },
    /// Apply a binary operator.
    Binary {
        op: BinaryOp,
        left: Handle<Expression>,
        right: Handle<Expression>,
    },
    /// Call a built-in math function. Unused operand slots are `None`.
    Math {
        fun: MathFunction,
        arg: Handle<Expression>,
        arg1: Option<Handle<Expression>>,
        arg2: Option<Handle<Expression>>,
    },
    /// Load the value of a variable.
    Read { variable: Handle<Variable> },
    /// Sample a sampled image at the given coordinates.
    Sample {
        image: Handle<Variable>,
        coords: Handle<Expression>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_types() {
        assert_eq!(Constant::F32(1.0).ty(), ShaderType::F32);
        assert_eq!(Constant::U32(8).ty(), ShaderType::U32);
        assert_eq!(Constant::I32(-3).ty(), ShaderType::I32);
        assert_eq!(Constant::Bool(true).ty(), ShaderType::BOOL);
        let composite = Constant::Composite {
            ty: ShaderType::vec2f(),
            components: vec![Constant::F32(0.0), Constant::F32(1.0)],
        };
        assert_eq!(composite.ty(), ShaderType::vec2f());
    }

    #[test]
    fn math_arity() {
        assert_eq!(MathFunction::Sqrt.argument_count(), 1);
        assert_eq!(MathFunction::Pow.argument_count(), 2);
        assert_eq!(MathFunction::Clamp.argument_count(), 3);
        assert_eq!(MathFunction::Mix.argument_count(), 3);
        assert_eq!(MathFunction::Cross.argument_count(), 2);
    }

    #[test]
    fn math_element_kinds() {
        assert!(MathFunction::Min.accepts(ScalarKind::Uint));
        assert!(MathFunction::Abs.accepts(ScalarKind::Sint));
        assert!(!MathFunction::Abs.accepts(ScalarKind::Uint));
        assert!(!MathFunction::Sin.accepts(ScalarKind::Sint));
        assert!(!MathFunction::Mix.accepts(ScalarKind::Uint));
    }

    #[test]
    fn swizzle_characters() {
        assert_eq!(swizzle_component_index('x'), Some(0));
        assert_eq!(swizzle_component_index('r'), Some(0));
        assert_eq!(swizzle_component_index('w'), Some(3));
        assert_eq!(swizzle_component_index('a'), Some(3));
        assert_eq!(swizzle_component_index('q'), None);
    }
}
