//! Graph traversal and instruction emission.
//!
//! One [`Compiler`] lowers one [`ir::ShaderGraph`] into a module. Per
//! entry point it walks the statement tree, memoizing expression results
//! by handle so a shared subexpression emits a single instruction.
//! Types, scalar constants, pointer types, and externally bound
//! variables are deduplicated module-wide in ordered maps, which keeps
//! the output byte-identical across runs.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use silica_ir as ir;
use silica_ir::{
    BinaryOp, Expression, Handle, MathFunction, ScalarKind, ShaderType, Statement, UnaryOp,
    Variable, VectorSize,
};

use crate::bindings::{BindingTable, DescriptorKind, DescriptorSetLayout, StageMask};
use crate::spv::{self, builtin, decoration, execution_mode, execution_model, op, storage_class};
use crate::words::{Word, WordStream};
use crate::CompileError;

/// Execution mode attached to an entry point at finalize.
#[derive(Clone, Copy, Debug)]
pub(crate) enum ExecMode {
    None,
    OutputVertices(u32),
    OriginUpperLeft,
    LocalSize([u32; 3]),
}

/// A lowered entry point, held until finalize.
struct EntryFunction {
    name: &'static str,
    execution_model: Word,
    function_id: Word,
    interface: Vec<Word>,
    mode: ExecMode,
    body: WordStream,
}

/// Per-entry-point traversal state.
///
/// The expression memo stores 0 while a node is being lowered; hitting
/// the placeholder again means the graph has a cycle.
struct FunctionState {
    stage: StageMask,
    body: WordStream,
    exprs: HashMap<Handle<Expression>, Word>,
    vars: HashMap<(Handle<Variable>, Word), Word>,
    interface: Vec<Word>,
}

impl FunctionState {
    fn new(stage: StageMask) -> Self {
        Self {
            stage,
            body: WordStream::new(),
            exprs: HashMap::new(),
            vars: HashMap::new(),
            interface: Vec::new(),
        }
    }
}

pub(crate) struct Compiler<'a> {
    graph: &'a ir::ShaderGraph,
    next_id: Word,
    glsl_ext_id: Word,
    capabilities: BTreeSet<Word>,
    extensions: BTreeSet<&'static str>,
    annotations: WordStream,
    declarations: WordStream,
    functions: Vec<EntryFunction>,
    types: BTreeMap<ShaderType, Word>,
    pointer_types: BTreeMap<(Word, Word), Word>,
    image_types: BTreeMap<(ir::ImageDims, ScalarKind), Word>,
    f32_consts: BTreeMap<u32, Word>,
    u32_consts: BTreeMap<u32, Word>,
    i32_consts: BTreeMap<i32, Word>,
    bool_consts: BTreeMap<bool, Word>,
    module_vars: BTreeMap<Handle<Variable>, Word>,
    bindings: BindingTable,
}

impl<'a> Compiler<'a> {
    pub fn new(graph: &'a ir::ShaderGraph) -> Self {
        let mut compiler = Self {
            graph,
            next_id: 1,
            glsl_ext_id: 0,
            capabilities: BTreeSet::new(),
            extensions: BTreeSet::new(),
            annotations: WordStream::new(),
            declarations: WordStream::new(),
            functions: Vec::new(),
            types: BTreeMap::new(),
            pointer_types: BTreeMap::new(),
            image_types: BTreeMap::new(),
            f32_consts: BTreeMap::new(),
            u32_consts: BTreeMap::new(),
            i32_consts: BTreeMap::new(),
            bool_consts: BTreeMap::new(),
            module_vars: BTreeMap::new(),
            bindings: BindingTable::new(),
        };
        compiler.glsl_ext_id = compiler.fresh_id();
        compiler.capabilities.insert(spv::capability::MATRIX);
        compiler.capabilities.insert(spv::capability::SHADER);
        compiler
    }

    fn fresh_id(&mut self) -> Word {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Lowers one stage root into a function body and records the entry
    /// point for finalize.
    pub fn compile_entry(
        &mut self,
        name: &'static str,
        model: Word,
        stage: StageMask,
        mode: ExecMode,
        root: Handle<Statement>,
    ) -> Result<(), CompileError> {
        log::debug!("lowering entry point {name}");
        if model == execution_model::TESSELLATION_CONTROL
            || model == execution_model::TESSELLATION_EVALUATION
        {
            self.capabilities.insert(spv::capability::TESSELLATION);
        }
        let mut fx = FunctionState::new(stage);
        self.traverse_statement(&mut fx, root)?;
        let function_id = self.fresh_id();
        self.functions.push(EntryFunction {
            name,
            execution_model: model,
            function_id,
            interface: fx.interface,
            mode,
            body: fx.body,
        });
        Ok(())
    }

    // ---- Statements ----

    fn traverse_statement(
        &mut self,
        fx: &mut FunctionState,
        handle: Handle<Statement>,
    ) -> Result<(), CompileError> {
        let graph = self.graph;
        let stmt = graph
            .statements
            .try_get(handle)
            .ok_or_else(|| CompileError::UnsupportedOp(format!("dangling statement {handle:?}")))?;
        match stmt {
            Statement::Sequence { first, second } => {
                self.traverse_statement(fx, *first)?;
                self.traverse_statement(fx, *second)
            }
            Statement::Write { variable, value } => {
                let (pointer, _) = self.resolve_variable(fx, *variable, true)?;
                let value_id = self.traverse_expression(fx, *value)?;
                fx.body.instruction(op::STORE, &[pointer, value_id]);
                Ok(())
            }
        }
    }

    // ---- Expressions ----

    fn traverse_expression(
        &mut self,
        fx: &mut FunctionState,
        handle: Handle<Expression>,
    ) -> Result<Word, CompileError> {
        if let Some(&id) = fx.exprs.get(&handle) {
            if id == 0 {
                return Err(CompileError::UnsupportedOp(
                    "cyclic expression graph".into(),
                ));
            }
            return Ok(id);
        }
        fx.exprs.insert(handle, 0);
        log::trace!("lowering expression {handle:?}");
        let graph = self.graph;
        let expr = graph
            .expressions
            .try_get(handle)
            .ok_or_else(|| CompileError::UnsupportedOp(format!("dangling expression {handle:?}")))?;
        let id = match expr {
            Expression::Constant(c) => self.constant_id(c)?,
            Expression::Construct { components } => {
                let ty = graph.expr_type(handle)?;
                let mut ids = Vec::with_capacity(components.len());
                for &c in components {
                    ids.push(self.traverse_expression(fx, c)?);
                }
                let ty_id = self.type_id(&ty)?;
                let id = self.fresh_id();
                let header = fx.body.begin(op::COMPOSITE_CONSTRUCT);
                fx.body.word(ty_id);
                fx.body.word(id);
                for &c in &ids {
                    fx.body.word(c);
                }
                fx.body.end(header);
                id
            }
            Expression::Swizzle { vector, mask } => {
                let source = self.traverse_expression(fx, *vector)?;
                let ty = graph.expr_type(handle)?;
                let ty_id = self.type_id(&ty)?;
                let mut indices = Vec::with_capacity(mask.len());
                for c in mask.chars() {
                    indices.push(ir::swizzle_component_index(c).ok_or_else(|| {
                        CompileError::InvalidSwizzle { mask: mask.clone() }
                    })?);
                }
                let id = self.fresh_id();
                if let [index] = indices[..] {
                    fx.body
                        .instruction(op::COMPOSITE_EXTRACT, &[ty_id, id, source, index]);
                } else {
                    let header = fx.body.begin(op::VECTOR_SHUFFLE);
                    fx.body.word(ty_id);
                    fx.body.word(id);
                    fx.body.word(source);
                    fx.body.word(source);
                    for &index in &indices {
                        fx.body.word(index);
                    }
                    fx.body.end(header);
                }
                id
            }
            Expression::Unary { op: un_op, expr } => {
                let operand = self.traverse_expression(fx, *expr)?;
                let ty = graph.expr_type(handle)?;
                let kind = ty.scalar_kind().ok_or_else(|| {
                    CompileError::UnsupportedOp(format!("{un_op:?} on {ty}"))
                })?;
                let opcode = match (un_op, kind) {
                    (UnaryOp::Negate, ScalarKind::Float) => op::F_NEGATE,
                    (UnaryOp::Negate, _) => op::S_NEGATE,
                    (UnaryOp::Dpdx, _) => op::DPDX,
                    (UnaryOp::Dpdy, _) => op::DPDY,
                };
                let ty_id = self.type_id(&ty)?;
                let id = self.fresh_id();
                fx.body.instruction(opcode, &[ty_id, id, operand]);
                id
            }
            Expression::Binary { op: bin_op, left, right } => {
                let lt = graph.expr_type(*left)?;
                let rt = graph.expr_type(*right)?;
                let result_ty = graph.expr_type(handle)?;
                let l = self.traverse_expression(fx, *left)?;
                let r = self.traverse_expression(fx, *right)?;
                let ty_id = self.type_id(&result_ty)?;
                let id = self.fresh_id();
                if *bin_op == BinaryOp::Multiply {
                    self.emit_multiply(fx, ty_id, id, &lt, &rt, l, r)?;
                } else {
                    let kind = lt.scalar_kind().ok_or_else(|| {
                        CompileError::UnsupportedOp(format!("{bin_op:?} on {lt}"))
                    })?;
                    let opcode = match (bin_op, kind) {
                        (BinaryOp::Add, ScalarKind::Float) => op::F_ADD,
                        (BinaryOp::Add, _) => op::I_ADD,
                        (BinaryOp::Subtract, ScalarKind::Float) => op::F_SUB,
                        (BinaryOp::Subtract, _) => op::I_SUB,
                        (BinaryOp::Divide, ScalarKind::Float) => op::F_DIV,
                        (BinaryOp::Divide, ScalarKind::Uint) => op::U_DIV,
                        (BinaryOp::Divide, _) => op::S_DIV,
                        (BinaryOp::Multiply, _) => unreachable!("handled above"),
                    };
                    fx.body.instruction(opcode, &[ty_id, id, l, r]);
                }
                id
            }
            Expression::Math { fun, arg, arg1, arg2 } => {
                let result_ty = graph.expr_type(handle)?;
                let arg_ty = graph.expr_type(*arg)?;
                let kind = arg_ty.scalar_kind().ok_or_else(|| {
                    CompileError::UnsupportedOp(format!("{} on {arg_ty}", fun.name()))
                })?;
                let mut args = Vec::with_capacity(3);
                args.push(self.traverse_expression(fx, *arg)?);
                for h in [*arg1, *arg2].into_iter().flatten() {
                    args.push(self.traverse_expression(fx, h)?);
                }
                let ty_id = self.type_id(&result_ty)?;
                let id = self.fresh_id();
                if *fun == MathFunction::Dot {
                    fx.body.instruction(op::DOT, &[ty_id, id, args[0], args[1]]);
                } else {
                    let inst = glsl_instruction(*fun, kind)?;
                    let header = fx.body.begin(op::EXT_INST);
                    fx.body.word(ty_id);
                    fx.body.word(id);
                    fx.body.word(self.glsl_ext_id);
                    fx.body.word(inst);
                    for &a in &args {
                        fx.body.word(a);
                    }
                    fx.body.end(header);
                }
                id
            }
            Expression::Read { variable } => {
                let (pointer, _) = self.resolve_variable(fx, *variable, false)?;
                let ty = graph.variable_type(*variable)?;
                let ty_id = self.type_id(&ty)?;
                let id = self.fresh_id();
                fx.body.instruction(op::LOAD, &[ty_id, id, pointer]);
                id
            }
            Expression::Sample { image, coords } => self.emit_sample(fx, *image, *coords)?,
        };
        fx.exprs.insert(handle, id);
        Ok(id)
    }

    fn emit_multiply(
        &mut self,
        fx: &mut FunctionState,
        ty_id: Word,
        id: Word,
        lt: &ShaderType,
        rt: &ShaderType,
        l: Word,
        r: Word,
    ) -> Result<(), CompileError> {
        let (opcode, a, b) = if !lt.is_matrix() && !rt.is_matrix() && lt.compatible(rt) {
            // Element-wise on equal shapes, scalar x scalar included.
            let opcode = match lt.scalar_kind() {
                Some(ScalarKind::Float) => op::F_MUL,
                _ => op::I_MUL,
            };
            (opcode, l, r)
        } else if lt.is_vector() && rt.is_scalar() {
            (op::VECTOR_TIMES_SCALAR, l, r)
        } else if lt.is_scalar() && rt.is_vector() {
            (op::VECTOR_TIMES_SCALAR, r, l)
        } else if lt.is_matrix() && rt.is_scalar() {
            (op::MATRIX_TIMES_SCALAR, l, r)
        } else if lt.is_scalar() && rt.is_matrix() {
            (op::MATRIX_TIMES_SCALAR, r, l)
        } else if lt.is_matrix() && rt.is_vector() {
            (op::MATRIX_TIMES_VECTOR, l, r)
        } else if lt.is_vector() && rt.is_matrix() {
            (op::VECTOR_TIMES_MATRIX, l, r)
        } else if lt.is_matrix() && rt.is_matrix() {
            (op::MATRIX_TIMES_MATRIX, l, r)
        } else {
            return Err(CompileError::UnsupportedOp(format!(
                "Multiply on {lt} and {rt}"
            )));
        };
        fx.body.instruction(opcode, &[ty_id, id, a, b]);
        Ok(())
    }

    fn emit_sample(
        &mut self,
        fx: &mut FunctionState,
        image: Handle<Variable>,
        coords: Handle<Expression>,
    ) -> Result<Word, CompileError> {
        let graph = self.graph;
        let Some(Variable::SampledImage { dims, ty, .. }) = graph.variables.try_get(image) else {
            return Err(CompileError::UnsupportedOp(
                "sample of a non-image variable".into(),
            ));
        };
        let kind = ty.scalar_kind().ok_or_else(|| {
            CompileError::UnsupportedType(format!("sample result type {ty}"))
        })?;
        let (image_pointer, _) = self.resolve_variable(fx, image, false)?;
        let sampled_ty = self.image_type_id(*dims, kind)?;
        let loaded = self.fresh_id();
        fx.body
            .instruction(op::LOAD, &[sampled_ty, loaded, image_pointer]);
        let coord_id = self.traverse_expression(fx, coords)?;
        // Sampling always yields four components; shrink afterwards to the
        // declared result type.
        let wide_ty = ShaderType::vector(kind, VectorSize::Quad, 16);
        let wide_ty_id = self.type_id(&wide_ty)?;
        let sampled = self.fresh_id();
        fx.body.instruction(
            op::IMAGE_SAMPLE_IMPLICIT_LOD,
            &[wide_ty_id, sampled, loaded, coord_id],
        );
        let count = ty.component_count().ok_or_else(|| {
            CompileError::UnsupportedType(format!("sample result type {ty}"))
        })?;
        Ok(match count {
            4 => sampled,
            1 => {
                let ty_id = self.type_id(&ShaderType::Scalar(kind))?;
                let id = self.fresh_id();
                fx.body
                    .instruction(op::COMPOSITE_EXTRACT, &[ty_id, id, sampled, 0]);
                id
            }
            n => {
                let ty_id = self.type_id(ty)?;
                let id = self.fresh_id();
                let header = fx.body.begin(op::VECTOR_SHUFFLE);
                fx.body.word(ty_id);
                fx.body.word(id);
                fx.body.word(sampled);
                fx.body.word(sampled);
                for component in 0..n {
                    fx.body.word(component);
                }
                fx.body.end(header);
                id
            }
        })
    }

    // ---- Variables ----

    /// Resolves a variable node to a pointer id and its storage class,
    /// declaring the `OpVariable` (or emitting the access chain) on first
    /// encounter.
    fn resolve_variable(
        &mut self,
        fx: &mut FunctionState,
        handle: Handle<Variable>,
        write: bool,
    ) -> Result<(Word, Word), CompileError> {
        let graph = self.graph;
        let var = graph
            .variables
            .try_get(handle)
            .ok_or_else(|| CompileError::UnsupportedOp(format!("dangling variable {handle:?}")))?;
        match var {
            Variable::Buffer { set, slot, kind, ty } => {
                let (class, descriptor) = match kind {
                    ir::BufferKind::Uniform => {
                        (storage_class::UNIFORM, DescriptorKind::UniformBuffer)
                    }
                    ir::BufferKind::Storage => {
                        self.extensions.insert(spv::EXT_STORAGE_BUFFER);
                        (storage_class::STORAGE_BUFFER, DescriptorKind::StorageBuffer)
                    }
                };
                // Register on every encounter so stage masks accumulate.
                self.bindings.register(*set, *slot, descriptor, fx.stage)?;
                if let Some(&id) = self.module_vars.get(&handle) {
                    return Ok((id, class));
                }
                log::trace!("declaring {descriptor:?} at (set {set}, binding {slot})");
                let ty_id = self.type_id(ty)?;
                let pointer_ty = self.pointer_type_id(ty_id, class);
                let id = self.fresh_id();
                self.declarations
                    .instruction(op::VARIABLE, &[pointer_ty, id, class]);
                self.annotations
                    .instruction(op::DECORATE, &[id, decoration::DESCRIPTOR_SET, *set]);
                self.annotations
                    .instruction(op::DECORATE, &[id, decoration::BINDING, *slot]);
                self.module_vars.insert(handle, id);
                Ok((id, class))
            }
            Variable::SampledImage { set, slot, dims, ty } => {
                let class = storage_class::UNIFORM_CONSTANT;
                self.bindings
                    .register(*set, *slot, DescriptorKind::SampledImage, fx.stage)?;
                if let Some(&id) = self.module_vars.get(&handle) {
                    return Ok((id, class));
                }
                let kind = ty.scalar_kind().ok_or_else(|| {
                    CompileError::UnsupportedType(format!("sample result type {ty}"))
                })?;
                let sampled_ty = self.image_type_id(*dims, kind)?;
                let pointer_ty = self.pointer_type_id(sampled_ty, class);
                let id = self.fresh_id();
                self.declarations
                    .instruction(op::VARIABLE, &[pointer_ty, id, class]);
                self.annotations
                    .instruction(op::DECORATE, &[id, decoration::DESCRIPTOR_SET, *set]);
                self.annotations
                    .instruction(op::DECORATE, &[id, decoration::BINDING, *slot]);
                self.module_vars.insert(handle, id);
                Ok((id, class))
            }
            Variable::Attribute { location, builtin: b, ty } => {
                let class = storage_class::INPUT;
                if let Some(&id) = fx.vars.get(&(handle, class)) {
                    return Ok((id, class));
                }
                let id = self.fresh_io_variable(fx, ty, class)?;
                match b {
                    Some(ir::AttributeBuiltin::VertexIndex) => self.decorate_builtin(id, builtin::VERTEX_INDEX),
                    Some(ir::AttributeBuiltin::InstanceIndex) => self.decorate_builtin(id, builtin::INSTANCE_INDEX),
                    None => self.decorate_location(id, *location),
                }
                fx.vars.insert((handle, class), id);
                Ok((id, class))
            }
            Variable::Interpolant { location, builtin: b, ty } => {
                let class = io_class(write);
                if let Some(&id) = fx.vars.get(&(handle, class)) {
                    return Ok((id, class));
                }
                let id = self.fresh_io_variable(fx, ty, class)?;
                match b {
                    Some(ir::InterpolantBuiltin::Position) => self.decorate_builtin(id, builtin::POSITION),
                    Some(ir::InterpolantBuiltin::PointSize) => self.decorate_builtin(id, builtin::POINT_SIZE),
                    Some(ir::InterpolantBuiltin::FragCoord) => self.decorate_builtin(id, builtin::FRAG_COORD),
                    None => self.decorate_location(id, *location),
                }
                fx.vars.insert((handle, class), id);
                Ok((id, class))
            }
            Variable::TessLevelInner | Variable::TessLevelOuter => {
                let class = io_class(write);
                if let Some(&id) = fx.vars.get(&(handle, class)) {
                    return Ok((id, class));
                }
                let ty = graph.variable_type(handle)?;
                let id = self.fresh_io_variable(fx, &ty, class)?;
                let b = if matches!(var, Variable::TessLevelInner) {
                    builtin::TESS_LEVEL_INNER
                } else {
                    builtin::TESS_LEVEL_OUTER
                };
                self.decorate_builtin(id, b);
                fx.vars.insert((handle, class), id);
                Ok((id, class))
            }
            Variable::Fragment { location, builtin: b, ty } => {
                let class = io_class(write);
                if let Some(&id) = fx.vars.get(&(handle, class)) {
                    return Ok((id, class));
                }
                let id = self.fresh_io_variable(fx, ty, class)?;
                match b {
                    Some(ir::FragmentBuiltin::FragDepth) => self.decorate_builtin(id, builtin::FRAG_DEPTH),
                    None => self.decorate_location(id, *location),
                }
                fx.vars.insert((handle, class), id);
                Ok((id, class))
            }
            Variable::StructMember { parent, index } => {
                let (parent_id, class) = self.resolve_variable(fx, *parent, write)?;
                if let Some(&id) = fx.vars.get(&(handle, class)) {
                    return Ok((id, class));
                }
                let ty = graph.variable_type(handle)?;
                let ty_id = self.type_id(&ty)?;
                let pointer_ty = self.pointer_type_id(ty_id, class);
                let index_id = self.const_u32(*index)?;
                let id = self.fresh_id();
                fx.body
                    .instruction(op::ACCESS_CHAIN, &[pointer_ty, id, parent_id, index_id]);
                fx.vars.insert((handle, class), id);
                Ok((id, class))
            }
            Variable::ArrayMember { parent, index } => {
                let (parent_id, class) = self.resolve_variable(fx, *parent, write)?;
                if let Some(&id) = fx.vars.get(&(handle, class)) {
                    return Ok((id, class));
                }
                let index_id = self.traverse_expression(fx, *index)?;
                let ty = graph.variable_type(handle)?;
                let ty_id = self.type_id(&ty)?;
                let pointer_ty = self.pointer_type_id(ty_id, class);
                let id = self.fresh_id();
                fx.body
                    .instruction(op::ACCESS_CHAIN, &[pointer_ty, id, parent_id, index_id]);
                fx.vars.insert((handle, class), id);
                Ok((id, class))
            }
        }
    }

    fn fresh_io_variable(
        &mut self,
        fx: &mut FunctionState,
        ty: &ShaderType,
        class: Word,
    ) -> Result<Word, CompileError> {
        let ty_id = self.type_id(ty)?;
        let pointer_ty = self.pointer_type_id(ty_id, class);
        let id = self.fresh_id();
        self.declarations
            .instruction(op::VARIABLE, &[pointer_ty, id, class]);
        fx.interface.push(id);
        Ok(id)
    }

    fn decorate_builtin(&mut self, id: Word, value: Word) {
        self.annotations
            .instruction(op::DECORATE, &[id, decoration::BUILT_IN, value]);
    }

    fn decorate_location(&mut self, id: Word, location: u32) {
        self.annotations
            .instruction(op::DECORATE, &[id, decoration::LOCATION, location]);
    }

    // ---- Types ----

    /// Returns the id of a lowered type, emitting its declaration (and
    /// any decorations) on first use. Non-aggregate types are keyed on
    /// their shape alone so a tightly packed and a std140-padded vector
    /// share one `OpTypeVector`.
    fn type_id(&mut self, ty: &ShaderType) -> Result<Word, CompileError> {
        let key = dedup_key(ty);
        if let Some(&id) = self.types.get(&key) {
            return Ok(id);
        }
        let id = match &key {
            ShaderType::Scalar(kind) => {
                let id = self.fresh_id();
                match kind {
                    ScalarKind::Float => {
                        self.declarations.instruction(op::TYPE_FLOAT, &[id, 32])
                    }
                    ScalarKind::Uint => {
                        self.declarations.instruction(op::TYPE_INT, &[id, 32, 0])
                    }
                    ScalarKind::Sint => {
                        self.declarations.instruction(op::TYPE_INT, &[id, 32, 1])
                    }
                    ScalarKind::Bool => self.declarations.instruction(op::TYPE_BOOL, &[id]),
                }
                id
            }
            ShaderType::Vector { scalar, size, .. } => {
                let element = self.type_id(&ShaderType::Scalar(*scalar))?;
                let id = self.fresh_id();
                self.declarations
                    .instruction(op::TYPE_VECTOR, &[id, element, size.count()]);
                id
            }
            ShaderType::Matrix {
                scalar, rows, columns, ..
            } => {
                let column =
                    self.type_id(&ShaderType::vector(*scalar, *rows, 4 * rows.count()))?;
                let id = self.fresh_id();
                self.declarations
                    .instruction(op::TYPE_MATRIX, &[id, column, columns.count()]);
                id
            }
            ShaderType::Array { base, len, .. } => {
                let element = self.type_id(base)?;
                let length = self.const_u32(*len)?;
                let id = self.fresh_id();
                self.declarations
                    .instruction(op::TYPE_ARRAY, &[id, element, length]);
                id
            }
            ShaderType::Struct { members, .. } => {
                let mut member_ids = Vec::with_capacity(members.len());
                for member in members {
                    member_ids.push(self.type_id(&member.ty)?);
                }
                let id = self.fresh_id();
                let header = self.declarations.begin(op::TYPE_STRUCT);
                self.declarations.word(id);
                for &member in &member_ids {
                    self.declarations.word(member);
                }
                self.declarations.end(header);
                self.annotations
                    .instruction(op::DECORATE, &[id, decoration::BLOCK]);
                for (index, member) in members.iter().enumerate() {
                    let index = index as Word;
                    self.annotations.instruction(
                        op::MEMBER_DECORATE,
                        &[id, index, decoration::OFFSET, member.offset],
                    );
                    match &*member.ty {
                        ShaderType::Matrix { row_stride, .. } => {
                            self.annotations.instruction(
                                op::MEMBER_DECORATE,
                                &[id, index, decoration::ROW_MAJOR],
                            );
                            self.annotations.instruction(
                                op::MEMBER_DECORATE,
                                &[id, index, decoration::MATRIX_STRIDE, *row_stride],
                            );
                        }
                        ShaderType::Array { base, .. } => {
                            self.annotations.instruction(
                                op::MEMBER_DECORATE,
                                &[id, index, decoration::ARRAY_STRIDE, base.size()],
                            );
                        }
                        _ => {}
                    }
                }
                id
            }
        };
        self.types.insert(key, id);
        Ok(id)
    }

    fn pointer_type_id(&mut self, pointee: Word, class: Word) -> Word {
        if let Some(&id) = self.pointer_types.get(&(pointee, class)) {
            return id;
        }
        let id = self.fresh_id();
        self.declarations
            .instruction(op::TYPE_POINTER, &[id, class, pointee]);
        self.pointer_types.insert((pointee, class), id);
        id
    }

    fn image_type_id(
        &mut self,
        dims: ir::ImageDims,
        kind: ScalarKind,
    ) -> Result<Word, CompileError> {
        if let Some(&id) = self.image_types.get(&(dims, kind)) {
            return Ok(id);
        }
        let sampled_ty = self.type_id(&ShaderType::Scalar(kind))?;
        let dim = match dims {
            ir::ImageDims::D1 => spv::dim::D1,
            ir::ImageDims::D2 => spv::dim::D2,
            ir::ImageDims::D3 => spv::dim::D3,
        };
        let image = self.fresh_id();
        // Not depth, not arrayed, single-sampled, usable with a sampler,
        // format unknown.
        self.declarations
            .instruction(op::TYPE_IMAGE, &[image, sampled_ty, dim, 0, 0, 0, 1, 0]);
        let id = self.fresh_id();
        self.declarations
            .instruction(op::TYPE_SAMPLED_IMAGE, &[id, image]);
        self.image_types.insert((dims, kind), id);
        Ok(id)
    }

    // ---- Constants ----

    fn constant_id(&mut self, constant: &ir::Constant) -> Result<Word, CompileError> {
        match constant {
            ir::Constant::Bool(v) => self.const_bool(*v),
            ir::Constant::U32(v) => self.const_u32(*v),
            ir::Constant::I32(v) => self.const_i32(*v),
            ir::Constant::F32(v) => self.const_f32(*v),
            ir::Constant::Composite { ty, components } => {
                let mut ids = Vec::with_capacity(components.len());
                for c in components {
                    ids.push(self.constant_id(c)?);
                }
                let ty_id = self.type_id(ty)?;
                let id = self.fresh_id();
                let header = self.declarations.begin(op::CONSTANT_COMPOSITE);
                self.declarations.word(ty_id);
                self.declarations.word(id);
                for &c in &ids {
                    self.declarations.word(c);
                }
                self.declarations.end(header);
                Ok(id)
            }
        }
    }

    fn const_f32(&mut self, value: f32) -> Result<Word, CompileError> {
        let bits = value.to_bits();
        if let Some(&id) = self.f32_consts.get(&bits) {
            return Ok(id);
        }
        let ty = self.type_id(&ShaderType::F32)?;
        let id = self.fresh_id();
        self.declarations.instruction(op::CONSTANT, &[ty, id, bits]);
        self.f32_consts.insert(bits, id);
        Ok(id)
    }

    fn const_u32(&mut self, value: u32) -> Result<Word, CompileError> {
        if let Some(&id) = self.u32_consts.get(&value) {
            return Ok(id);
        }
        let ty = self.type_id(&ShaderType::U32)?;
        let id = self.fresh_id();
        self.declarations.instruction(op::CONSTANT, &[ty, id, value]);
        self.u32_consts.insert(value, id);
        Ok(id)
    }

    fn const_i32(&mut self, value: i32) -> Result<Word, CompileError> {
        if let Some(&id) = self.i32_consts.get(&value) {
            return Ok(id);
        }
        let ty = self.type_id(&ShaderType::I32)?;
        let id = self.fresh_id();
        self.declarations
            .instruction(op::CONSTANT, &[ty, id, value as Word]);
        self.i32_consts.insert(value, id);
        Ok(id)
    }

    fn const_bool(&mut self, value: bool) -> Result<Word, CompileError> {
        if let Some(&id) = self.bool_consts.get(&value) {
            return Ok(id);
        }
        let ty = self.type_id(&ShaderType::BOOL)?;
        let id = self.fresh_id();
        let opcode = if value {
            op::CONSTANT_TRUE
        } else {
            op::CONSTANT_FALSE
        };
        self.declarations.instruction(opcode, &[ty, id]);
        self.bool_consts.insert(value, id);
        Ok(id)
    }

    // ---- Finalize ----

    /// Assembles the module in layout order and patches the id bound.
    pub fn finalize(mut self) -> (Vec<Word>, Vec<DescriptorSetLayout>) {
        let mut out = WordStream::new();
        out.word(spv::MAGIC);
        out.word(spv::VERSION_1_0);
        out.word(0); // generator
        out.word(0); // id bound, patched below
        out.word(0); // schema

        for &cap in &self.capabilities {
            out.instruction(op::CAPABILITY, &[cap]);
        }
        for ext in &self.extensions {
            let header = out.begin(op::EXTENSION);
            out.string(ext);
            out.end(header);
        }
        let header = out.begin(op::EXT_INST_IMPORT);
        out.word(self.glsl_ext_id);
        out.string(spv::GLSL_STD_450);
        out.end(header);
        out.instruction(
            op::MEMORY_MODEL,
            &[spv::memory_model::LOGICAL, spv::memory_model::SIMPLE],
        );

        let functions = std::mem::take(&mut self.functions);
        for f in &functions {
            let header = out.begin(op::ENTRY_POINT);
            out.word(f.execution_model);
            out.word(f.function_id);
            out.string(f.name);
            for &id in &f.interface {
                out.word(id);
            }
            out.end(header);
        }
        for f in &functions {
            match f.mode {
                ExecMode::None => {}
                ExecMode::OutputVertices(n) => out.instruction(
                    op::EXECUTION_MODE,
                    &[f.function_id, execution_mode::OUTPUT_VERTICES, n],
                ),
                ExecMode::OriginUpperLeft => out.instruction(
                    op::EXECUTION_MODE,
                    &[f.function_id, execution_mode::ORIGIN_UPPER_LEFT],
                ),
                ExecMode::LocalSize([x, y, z]) => out.instruction(
                    op::EXECUTION_MODE,
                    &[f.function_id, execution_mode::LOCAL_SIZE, x, y, z],
                ),
            }
        }

        out.append(&self.annotations);

        let void_ty = self.fresh_id();
        let fn_ty = self.fresh_id();
        out.instruction(op::TYPE_VOID, &[void_ty]);
        out.instruction(op::TYPE_FUNCTION, &[fn_ty, void_ty]);
        out.append(&self.declarations);

        for f in &functions {
            out.instruction(op::FUNCTION, &[void_ty, f.function_id, 0, fn_ty]);
            let label = self.fresh_id();
            out.instruction(op::LABEL, &[label]);
            out.append(&f.body);
            out.instruction(op::RETURN, &[]);
            out.instruction(op::FUNCTION_END, &[]);
        }

        out.patch(3, self.next_id);
        log::debug!(
            "emitted {} words across {} entry points, id bound {}",
            out.len(),
            functions.len(),
            self.next_id
        );
        (out.into_words(), self.bindings.flatten())
    }
}

fn io_class(write: bool) -> Word {
    if write {
        storage_class::OUTPUT
    } else {
        storage_class::INPUT
    }
}

/// The memo key for type deduplication. Layout fields are dropped from
/// non-aggregate types, which carry no decorations of their own.
fn dedup_key(ty: &ShaderType) -> ShaderType {
    match *ty {
        ShaderType::Vector { scalar, size, .. } => {
            ShaderType::vector(scalar, size, 4 * size.count())
        }
        ShaderType::Matrix {
            scalar, rows, columns, ..
        } => ShaderType::matrix(
            scalar,
            rows,
            columns,
            4 * columns.count(),
            rows.count() * 4 * columns.count(),
        ),
        _ => ty.clone(),
    }
}

/// Picks the `GLSL.std.450` instruction number, dispatching on the
/// element kind where the set splits into F/U/S variants.
fn glsl_instruction(fun: MathFunction, kind: ScalarKind) -> Result<Word, CompileError> {
    use crate::spv::glsl;
    let unsupported = || CompileError::UnsupportedOp(format!("{} on {kind:?}", fun.name()));
    Ok(match (fun, kind) {
        (MathFunction::Abs, ScalarKind::Float) => glsl::F_ABS,
        (MathFunction::Abs, ScalarKind::Sint) => glsl::S_ABS,
        (MathFunction::Abs, _) => return Err(unsupported()),
        (MathFunction::Floor, _) => glsl::FLOOR,
        (MathFunction::Ceil, _) => glsl::CEIL,
        (MathFunction::Fract, _) => glsl::FRACT,
        (MathFunction::Sqrt, _) => glsl::SQRT,
        (MathFunction::InverseSqrt, _) => glsl::INVERSE_SQRT,
        (MathFunction::Pow, _) => glsl::POW,
        (MathFunction::Exp, _) => glsl::EXP,
        (MathFunction::Log, _) => glsl::LOG,
        (MathFunction::Exp2, _) => glsl::EXP2,
        (MathFunction::Log2, _) => glsl::LOG2,
        (MathFunction::Sin, _) => glsl::SIN,
        (MathFunction::Cos, _) => glsl::COS,
        (MathFunction::Tan, _) => glsl::TAN,
        (MathFunction::Asin, _) => glsl::ASIN,
        (MathFunction::Acos, _) => glsl::ACOS,
        (MathFunction::Atan, _) => glsl::ATAN,
        (MathFunction::Min, ScalarKind::Float) => glsl::F_MIN,
        (MathFunction::Min, ScalarKind::Uint) => glsl::U_MIN,
        (MathFunction::Min, _) => glsl::S_MIN,
        (MathFunction::Max, ScalarKind::Float) => glsl::F_MAX,
        (MathFunction::Max, ScalarKind::Uint) => glsl::U_MAX,
        (MathFunction::Max, _) => glsl::S_MAX,
        (MathFunction::Clamp, ScalarKind::Float) => glsl::F_CLAMP,
        (MathFunction::Clamp, ScalarKind::Uint) => glsl::U_CLAMP,
        (MathFunction::Clamp, _) => glsl::S_CLAMP,
        (MathFunction::Mix, ScalarKind::Float) => glsl::F_MIX,
        (MathFunction::Mix, _) => return Err(unsupported()),
        (MathFunction::Length, _) => glsl::LENGTH,
        (MathFunction::Distance, _) => glsl::DISTANCE,
        (MathFunction::Cross, _) => glsl::CROSS,
        (MathFunction::Normalize, _) => glsl::NORMALIZE,
        (MathFunction::Dot, _) => return Err(unsupported()),
    })
}
