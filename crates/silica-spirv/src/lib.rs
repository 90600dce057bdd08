//! SPIR-V 1.0 backend for the silica shader IR.
//!
//! [`compile`] lowers a [`silica_ir::ShaderGraph`] with one statement
//! root per requested stage into a binary SPIR-V module plus the
//! descriptor-set layouts its bindings require. The output is
//! deterministic: the same graph and roots always produce byte-identical
//! words.

mod bindings;
mod lower;
pub mod spv;
mod words;

use silica_ir as ir;
use silica_ir::{Handle, Statement};

use crate::lower::{Compiler, ExecMode};
use crate::spv::execution_model;

pub use bindings::{DescriptorBinding, DescriptorKind, DescriptorSetLayout, StageMask};
pub use words::Word;

/// One statement root per shader stage to compile.
///
/// At least one root must be present. Tessellation roots come in pairs
/// and require an output vertex count; compute requires a workgroup
/// size with all components at least one.
#[derive(Clone, Copy, Debug, Default)]
pub struct GraphicsShaderRoots {
    pub vertex: Option<Handle<Statement>>,
    pub tessellation_control: Option<Handle<Statement>>,
    pub tessellation_evaluation: Option<Handle<Statement>>,
    pub tessellation_output_vertices: Option<u32>,
    pub fragment: Option<Handle<Statement>>,
    pub compute: Option<Handle<Statement>>,
    pub compute_size: Option<[u32; 3]>,
}

/// A compiled module: the raw words and the descriptor-set layouts
/// derived from the bindings the stages actually use.
#[derive(Clone, Debug)]
pub struct SpirvModule {
    pub words: Vec<Word>,
    pub descriptor_sets: Vec<DescriptorSetLayout>,
}

impl SpirvModule {
    /// The module as little-endian bytes, as Vulkan consumes it.
    pub fn bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }
}

/// Why a compilation was rejected. All variants abort the compilation;
/// no partial output is returned.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    #[error("unsupported operation: {0}")]
    UnsupportedOp(String),
    #[error("invalid swizzle mask {mask:?}")]
    InvalidSwizzle { mask: String },
    #[error("{fun} expects {expected} operands, found {found}")]
    ArityMismatch {
        fun: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("descriptor (set {set}, binding {slot}) declared as both {existing:?} and {requested:?}")]
    DescriptorConflict {
        set: u32,
        slot: u32,
        existing: DescriptorKind,
        requested: DescriptorKind,
    },
    #[error("tessellation requires control and evaluation roots plus a nonzero output vertex count")]
    InconsistentTessellation,
    #[error("no stage roots were provided")]
    MissingEntryPoint,
    #[error("compute size components must all be at least 1")]
    InvalidComputeSize,
}

impl From<ir::IrError> for CompileError {
    fn from(err: ir::IrError) -> Self {
        match err {
            ir::IrError::InvalidSwizzle { mask } => Self::InvalidSwizzle { mask },
            ir::IrError::ArityMismatch {
                fun,
                expected,
                found,
            } => Self::ArityMismatch {
                fun,
                expected,
                found,
            },
            ir::IrError::UnsupportedType(what) => Self::UnsupportedType(what),
            other => Self::UnsupportedOp(other.to_string()),
        }
    }
}

/// Compiles the requested stage roots of `graph` into one module.
pub fn compile(
    graph: &ir::ShaderGraph,
    roots: &GraphicsShaderRoots,
) -> Result<SpirvModule, CompileError> {
    validate_roots(roots)?;
    let mut compiler = Compiler::new(graph);
    if let Some(root) = roots.vertex {
        compiler.compile_entry(
            "mainVertex",
            execution_model::VERTEX,
            StageMask::VERTEX,
            ExecMode::None,
            root,
        )?;
    }
    if let Some(root) = roots.tessellation_control {
        // Checked by validate_roots.
        let vertices = roots.tessellation_output_vertices.unwrap_or(0);
        compiler.compile_entry(
            "mainTessellationControl",
            execution_model::TESSELLATION_CONTROL,
            StageMask::TESSELLATION_CONTROL,
            ExecMode::OutputVertices(vertices),
            root,
        )?;
    }
    if let Some(root) = roots.tessellation_evaluation {
        compiler.compile_entry(
            "mainTessellationEvaluation",
            execution_model::TESSELLATION_EVALUATION,
            StageMask::TESSELLATION_EVALUATION,
            ExecMode::None,
            root,
        )?;
    }
    if let Some(root) = roots.fragment {
        compiler.compile_entry(
            "mainFragment",
            execution_model::FRAGMENT,
            StageMask::FRAGMENT,
            ExecMode::OriginUpperLeft,
            root,
        )?;
    }
    if let Some(root) = roots.compute {
        let size = roots.compute_size.unwrap_or([0; 3]);
        compiler.compile_entry(
            "mainCompute",
            execution_model::GL_COMPUTE,
            StageMask::COMPUTE,
            ExecMode::LocalSize(size),
            root,
        )?;
    }
    let (words, descriptor_sets) = compiler.finalize();
    Ok(SpirvModule {
        words,
        descriptor_sets,
    })
}

fn validate_roots(roots: &GraphicsShaderRoots) -> Result<(), CompileError> {
    let any = roots.vertex.is_some()
        || roots.tessellation_control.is_some()
        || roots.tessellation_evaluation.is_some()
        || roots.fragment.is_some()
        || roots.compute.is_some();
    if !any {
        return Err(CompileError::MissingEntryPoint);
    }
    let tess = roots.tessellation_control.is_some() || roots.tessellation_evaluation.is_some();
    if tess {
        let paired =
            roots.tessellation_control.is_some() && roots.tessellation_evaluation.is_some();
        let vertices = roots.tessellation_output_vertices.unwrap_or(0);
        if !paired || vertices == 0 {
            return Err(CompileError::InconsistentTessellation);
        }
    }
    if roots.compute.is_some() {
        let size = roots.compute_size.ok_or(CompileError::InvalidComputeSize)?;
        if size.iter().any(|&n| n == 0) {
            return Err(CompileError::InvalidComputeSize);
        }
    }
    Ok(())
}
