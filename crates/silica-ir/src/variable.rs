//! Variables — addressable storage the shader reads and writes.

use crate::arena::Handle;
use crate::expr::Expression;
use crate::types::ShaderType;

/// The descriptor kind of a buffer variable.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BufferKind {
    /// Read-only uniform buffer.
    Uniform,
    /// Storage buffer.
    Storage,
}

/// Builtins available on vertex-stage inputs.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum AttributeBuiltin {
    VertexIndex,
    InstanceIndex,
}

/// Builtins available on inter-stage varyings.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum InterpolantBuiltin {
    /// Clip-space position.
    Position,
    PointSize,
    FragCoord,
}

/// Builtins available on fragment outputs.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum FragmentBuiltin {
    FragDepth,
}

/// Dimensionality of a sampled image.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ImageDims {
    D1 = 1,
    D2 = 2,
    D3 = 3,
}

impl ImageDims {
    /// Number of coordinate components needed to sample.
    pub fn coord_count(self) -> u32 {
        self as u32
    }
}

/// A variable node.
///
/// `StructMember` and `ArrayMember` are access-chain steps into a parent
/// variable; the rest declare fresh storage.
#[derive(Clone, Debug)]
pub enum Variable {
    /// An externally bound buffer at `(set, slot)`.
    Buffer {
        set: u32,
        slot: u32,
        kind: BufferKind,
        ty: ShaderType,
    },
    /// A member of a struct-typed parent variable.
    StructMember {
        parent: Handle<Variable>,
        index: u32,
    },
    /// A dynamically indexed element of an array-typed parent variable.
    ArrayMember {
        parent: Handle<Variable>,
        index: Handle<Expression>,
    },
    /// A stage input at the vertex boundary.
    Attribute {
        location: u32,
        builtin: Option<AttributeBuiltin>,
        ty: ShaderType,
    },
    /// An inter-stage varying: written by one stage, read by the next.
    Interpolant {
        location: u32,
        builtin: Option<InterpolantBuiltin>,
        ty: ShaderType,
    },
    /// The `array<f32, 2>` inner tessellation level builtin.
    TessLevelInner,
    /// The `array<f32, 4>` outer tessellation level builtin.
    TessLevelOuter,
    /// A fragment-stage output.
    Fragment {
        location: u32,
        builtin: Option<FragmentBuiltin>,
        ty: ShaderType,
    },
    /// An externally bound sampled image at `(set, slot)`. `ty` is the
    /// declared sample result type (scalar or vector).
    SampledImage {
        set: u32,
        slot: u32,
        dims: ImageDims,
        ty: ShaderType,
    },
}
