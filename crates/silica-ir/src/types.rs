//! Shader data types with explicit std140 layout information.
//!
//! Sizes, row strides, and member offsets are supplied by the caller
//! (the engine's math vocabulary); the IR only records and reports them.
//! The derived `Ord` gives the strict, value-based total order that the
//! backend's deduplication maps key on: kind discriminant first, then
//! fields in declaration order.

use std::sync::Arc;

/// The kind of a scalar type. All supported kinds occupy four bytes.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ScalarKind {
    /// 32-bit floating point.
    Float,
    /// 32-bit unsigned integer.
    Uint,
    /// 32-bit signed integer.
    Sint,
    /// Boolean.
    Bool,
}

/// Number of components in a vector, or rows/columns in a matrix.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum VectorSize {
    /// 2 components.
    Bi = 2,
    /// 3 components.
    Tri = 3,
    /// 4 components.
    Quad = 4,
}

impl VectorSize {
    /// Returns the component count as a plain integer.
    pub fn count(self) -> u32 {
        self as u32
    }

    /// Maps a component count back to a `VectorSize`.
    pub fn from_count(n: u32) -> Option<Self> {
        match n {
            2 => Some(Self::Bi),
            3 => Some(Self::Tri),
            4 => Some(Self::Quad),
            _ => None,
        }
    }
}

/// A member of a struct type: caller-specified byte offset plus type.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct StructMember {
    pub offset: u32,
    pub ty: Arc<ShaderType>,
}

/// A shader data type.
///
/// Recursive positions hold `Arc<ShaderType>` so structurally equal types
/// compare equal regardless of where they were allocated.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ShaderType {
    /// A single scalar value, four bytes.
    Scalar(ScalarKind),
    /// A vector of scalars. `span` may exceed the packed component size
    /// because of std140 alignment.
    Vector {
        scalar: ScalarKind,
        size: VectorSize,
        span: u32,
    },
    /// A row-major matrix. `row_stride` is the std140 stride between rows.
    Matrix {
        scalar: ScalarKind,
        rows: VectorSize,
        columns: VectorSize,
        row_stride: u32,
        span: u32,
    },
    /// A fixed-length array.
    Array {
        base: Arc<ShaderType>,
        len: u32,
        span: u32,
    },
    /// A composite struct with caller-specified member offsets.
    Struct {
        members: Vec<StructMember>,
        span: u32,
    },
}

impl ShaderType {
    pub const F32: Self = Self::Scalar(ScalarKind::Float);
    pub const U32: Self = Self::Scalar(ScalarKind::Uint);
    pub const I32: Self = Self::Scalar(ScalarKind::Sint);
    pub const BOOL: Self = Self::Scalar(ScalarKind::Bool);

    /// A vector type with an explicit overall span in bytes.
    pub fn vector(scalar: ScalarKind, size: VectorSize, span: u32) -> Self {
        Self::Vector { scalar, size, span }
    }

    /// `vec2<f32>`, tightly packed (8 bytes).
    pub fn vec2f() -> Self {
        Self::vector(ScalarKind::Float, VectorSize::Bi, 8)
    }

    /// `vec3<f32>`, tightly packed (12 bytes).
    pub fn vec3f() -> Self {
        Self::vector(ScalarKind::Float, VectorSize::Tri, 12)
    }

    /// `vec4<f32>` (16 bytes).
    pub fn vec4f() -> Self {
        Self::vector(ScalarKind::Float, VectorSize::Quad, 16)
    }

    /// A matrix type with explicit row stride and overall span.
    pub fn matrix(
        scalar: ScalarKind,
        rows: VectorSize,
        columns: VectorSize,
        row_stride: u32,
        span: u32,
    ) -> Self {
        Self::Matrix {
            scalar,
            rows,
            columns,
            row_stride,
            span,
        }
    }

    /// `mat4x4<f32>` with the std140 row stride of 16 (64 bytes).
    pub fn mat4f() -> Self {
        Self::matrix(ScalarKind::Float, VectorSize::Quad, VectorSize::Quad, 16, 64)
    }

    /// A fixed-length array with an explicit overall span.
    pub fn array(base: ShaderType, len: u32, span: u32) -> Self {
        Self::Array {
            base: Arc::new(base),
            len,
            span,
        }
    }

    /// A struct from `(offset, type)` pairs with an explicit overall span.
    pub fn structure(members: Vec<(u32, ShaderType)>, span: u32) -> Self {
        Self::Struct {
            members: members
                .into_iter()
                .map(|(offset, ty)| StructMember {
                    offset,
                    ty: Arc::new(ty),
                })
                .collect(),
            span,
        }
    }

    /// Overall size of a value of this type, in bytes. Never zero.
    pub fn size(&self) -> u32 {
        match *self {
            Self::Scalar(_) => 4,
            Self::Vector { span, .. }
            | Self::Matrix { span, .. }
            | Self::Array { span, .. }
            | Self::Struct { span, .. } => span,
        }
    }

    /// The element scalar kind for scalars, vectors, and matrices.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match *self {
            Self::Scalar(kind)
            | Self::Vector { scalar: kind, .. }
            | Self::Matrix { scalar: kind, .. } => Some(kind),
            Self::Array { .. } | Self::Struct { .. } => None,
        }
    }

    /// Number of scalar components for scalars (1) and vectors (n).
    pub fn component_count(&self) -> Option<u32> {
        match *self {
            Self::Scalar(_) => Some(1),
            Self::Vector { size, .. } => Some(size.count()),
            _ => None,
        }
    }

    /// Layout-insensitive shape equality: same kind, components, and
    /// dimensions, ignoring spans, strides, and offsets. Used when checking
    /// operand compatibility, where a tightly packed value may meet a
    /// std140-padded one.
    pub fn compatible(&self, other: &ShaderType) -> bool {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (
                Self::Vector {
                    scalar: k1,
                    size: s1,
                    ..
                },
                Self::Vector {
                    scalar: k2,
                    size: s2,
                    ..
                },
            ) => k1 == k2 && s1 == s2,
            (
                Self::Matrix {
                    scalar: k1,
                    rows: r1,
                    columns: c1,
                    ..
                },
                Self::Matrix {
                    scalar: k2,
                    rows: r2,
                    columns: c2,
                    ..
                },
            ) => k1 == k2 && r1 == r2 && c1 == c2,
            (
                Self::Array {
                    base: b1, len: l1, ..
                },
                Self::Array {
                    base: b2, len: l2, ..
                },
            ) => l1 == l2 && b1.compatible(b2),
            (Self::Struct { members: m1, .. }, Self::Struct { members: m2, .. }) => {
                m1.len() == m2.len()
                    && m1.iter().zip(m2).all(|(a, b)| a.ty.compatible(&b.ty))
            }
            _ => false,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Vector { .. })
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, Self::Matrix { .. })
    }
}
