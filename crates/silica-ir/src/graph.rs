//! The shader graph: node arenas plus typed, validating constructors.
//!
//! All three node kinds live in append-only arenas, so children always
//! precede their parents and sharing a subexpression is just reusing its
//! handle. The constructors check the shape rules up front; the typing
//! queries (`expr_type`, `variable_type`) are also what the SPIR-V
//! backend calls while lowering.

use crate::arena::{Arena, Handle};
use crate::error::IrError;
use crate::expr::{
    swizzle_component_index, BinaryOp, Constant, Expression, MathFunction, UnaryOp,
};
use crate::stmt::Statement;
use crate::types::{ScalarKind, ShaderType, VectorSize};
use crate::variable::{
    AttributeBuiltin, BufferKind, FragmentBuiltin, ImageDims, InterpolantBuiltin, Variable,
};

/// An immutable-once-built graph of expressions, variables, and statements.
#[derive(Clone, Debug, Default)]
pub struct ShaderGraph {
    pub expressions: Arena<Expression>,
    pub variables: Arena<Variable>,
    pub statements: Arena<Statement>,
}

impl ShaderGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    // ---- Constant expressions ----

    pub fn const_f32(&mut self, value: f32) -> Handle<Expression> {
        self.expressions
            .append(Expression::Constant(Constant::F32(value)))
    }

    pub fn const_u32(&mut self, value: u32) -> Handle<Expression> {
        self.expressions
            .append(Expression::Constant(Constant::U32(value)))
    }

    pub fn const_i32(&mut self, value: i32) -> Handle<Expression> {
        self.expressions
            .append(Expression::Constant(Constant::I32(value)))
    }

    pub fn const_bool(&mut self, value: bool) -> Handle<Expression> {
        self.expressions
            .append(Expression::Constant(Constant::Bool(value)))
    }

    /// A composite (vector) constant. The component count must match the
    /// vector width and every component must be a scalar of the element kind.
    pub fn const_composite(
        &mut self,
        ty: ShaderType,
        components: Vec<Constant>,
    ) -> Result<Handle<Expression>, IrError> {
        let ShaderType::Vector { scalar, size, .. } = ty else {
            return Err(IrError::UnsupportedType(format!(
                "composite constant of type {ty}"
            )));
        };
        if components.len() != size.count() as usize {
            return Err(IrError::ArityMismatch {
                fun: "composite constant",
                expected: size.count() as usize,
                found: components.len(),
            });
        }
        for c in &components {
            if c.ty() != ShaderType::Scalar(scalar) {
                return Err(IrError::TypeMismatch {
                    expected: ShaderType::Scalar(scalar).to_string(),
                    found: c.ty().to_string(),
                });
            }
        }
        Ok(self.expressions.append(Expression::Constant(
            Constant::Composite { ty, components },
        )))
    }

    /// A `vec2<f32>` constant.
    pub fn const_vec2f(&mut self, x: f32, y: f32) -> Handle<Expression> {
        self.expressions
            .append(Expression::Constant(Constant::Composite {
                ty: ShaderType::vec2f(),
                components: vec![Constant::F32(x), Constant::F32(y)],
            }))
    }

    /// A `vec3<f32>` constant.
    pub fn const_vec3f(&mut self, x: f32, y: f32, z: f32) -> Handle<Expression> {
        self.expressions
            .append(Expression::Constant(Constant::Composite {
                ty: ShaderType::vec3f(),
                components: vec![Constant::F32(x), Constant::F32(y), Constant::F32(z)],
            }))
    }

    /// A `vec4<f32>` constant.
    pub fn const_vec4f(&mut self, x: f32, y: f32, z: f32, w: f32) -> Handle<Expression> {
        self.expressions
            .append(Expression::Constant(Constant::Composite {
                ty: ShaderType::vec4f(),
                components: vec![
                    Constant::F32(x),
                    Constant::F32(y),
                    Constant::F32(z),
                    Constant::F32(w),
                ],
            }))
    }

    // ---- Operation expressions ----

    /// Build a vector out of scalar and vector components.
    pub fn construct(
        &mut self,
        components: &[Handle<Expression>],
    ) -> Result<Handle<Expression>, IrError> {
        let expr = Expression::Construct {
            components: components.to_vec(),
        };
        self.typecheck_append(expr)
    }

    /// Select or reorder vector components.
    pub fn swizzle(
        &mut self,
        vector: Handle<Expression>,
        mask: &str,
    ) -> Result<Handle<Expression>, IrError> {
        let expr = Expression::Swizzle {
            vector,
            mask: mask.to_owned(),
        };
        self.typecheck_append(expr)
    }

    pub fn unary(
        &mut self,
        op: UnaryOp,
        expr: Handle<Expression>,
    ) -> Result<Handle<Expression>, IrError> {
        self.typecheck_append(Expression::Unary { op, expr })
    }

    pub fn negate(&mut self, expr: Handle<Expression>) -> Result<Handle<Expression>, IrError> {
        self.unary(UnaryOp::Negate, expr)
    }

    pub fn dpdx(&mut self, expr: Handle<Expression>) -> Result<Handle<Expression>, IrError> {
        self.unary(UnaryOp::Dpdx, expr)
    }

    pub fn dpdy(&mut self, expr: Handle<Expression>) -> Result<Handle<Expression>, IrError> {
        self.unary(UnaryOp::Dpdy, expr)
    }

    pub fn binary(
        &mut self,
        op: BinaryOp,
        left: Handle<Expression>,
        right: Handle<Expression>,
    ) -> Result<Handle<Expression>, IrError> {
        self.typecheck_append(Expression::Binary { op, left, right })
    }

    pub fn add(
        &mut self,
        left: Handle<Expression>,
        right: Handle<Expression>,
    ) -> Result<Handle<Expression>, IrError> {
        self.binary(BinaryOp::Add, left, right)
    }

    pub fn subtract(
        &mut self,
        left: Handle<Expression>,
        right: Handle<Expression>,
    ) -> Result<Handle<Expression>, IrError> {
        self.binary(BinaryOp::Subtract, left, right)
    }

    pub fn multiply(
        &mut self,
        left: Handle<Expression>,
        right: Handle<Expression>,
    ) -> Result<Handle<Expression>, IrError> {
        self.binary(BinaryOp::Multiply, left, right)
    }

    pub fn divide(
        &mut self,
        left: Handle<Expression>,
        right: Handle<Expression>,
    ) -> Result<Handle<Expression>, IrError> {
        self.binary(BinaryOp::Divide, left, right)
    }

    /// Call a built-in math function with the given operands.
    pub fn math(
        &mut self,
        fun: MathFunction,
        args: &[Handle<Expression>],
    ) -> Result<Handle<Expression>, IrError> {
        if args.len() != fun.argument_count() || args.is_empty() {
            return Err(IrError::ArityMismatch {
                fun: fun.name(),
                expected: fun.argument_count(),
                found: args.len(),
            });
        }
        let expr = Expression::Math {
            fun,
            arg: args[0],
            arg1: args.get(1).copied(),
            arg2: args.get(2).copied(),
        };
        self.typecheck_append(expr)
    }

    /// Load the value of a variable.
    pub fn read(&mut self, variable: Handle<Variable>) -> Result<Handle<Expression>, IrError> {
        self.typecheck_append(Expression::Read { variable })
    }

    /// Sample a sampled image at the given coordinates.
    pub fn sample(
        &mut self,
        image: Handle<Variable>,
        coords: Handle<Expression>,
    ) -> Result<Handle<Expression>, IrError> {
        self.typecheck_append(Expression::Sample { image, coords })
    }

    // ---- Variables ----

    pub fn buffer(
        &mut self,
        set: u32,
        slot: u32,
        kind: BufferKind,
        ty: ShaderType,
    ) -> Handle<Variable> {
        self.variables.append(Variable::Buffer { set, slot, kind, ty })
    }

    pub fn attribute(
        &mut self,
        location: u32,
        builtin: Option<AttributeBuiltin>,
        ty: ShaderType,
    ) -> Handle<Variable> {
        self.variables.append(Variable::Attribute {
            location,
            builtin,
            ty,
        })
    }

    pub fn interpolant(
        &mut self,
        location: u32,
        builtin: Option<InterpolantBuiltin>,
        ty: ShaderType,
    ) -> Handle<Variable> {
        self.variables.append(Variable::Interpolant {
            location,
            builtin,
            ty,
        })
    }

    pub fn fragment_output(
        &mut self,
        location: u32,
        builtin: Option<FragmentBuiltin>,
        ty: ShaderType,
    ) -> Handle<Variable> {
        self.variables.append(Variable::Fragment {
            location,
            builtin,
            ty,
        })
    }

    pub fn tess_level_inner(&mut self) -> Handle<Variable> {
        self.variables.append(Variable::TessLevelInner)
    }

    pub fn tess_level_outer(&mut self) -> Handle<Variable> {
        self.variables.append(Variable::TessLevelOuter)
    }

    /// Declare a sampled image. `ty` is the declared sample result type
    /// and must be a scalar or vector.
    pub fn sampled_image(
        &mut self,
        set: u32,
        slot: u32,
        dims: ImageDims,
        ty: ShaderType,
    ) -> Result<Handle<Variable>, IrError> {
        if ty.component_count().is_none() {
            return Err(IrError::UnsupportedType(format!(
                "sample result type {ty}"
            )));
        }
        Ok(self.variables.append(Variable::SampledImage {
            set,
            slot,
            dims,
            ty,
        }))
    }

    /// An access-chain step into a struct-typed parent.
    pub fn struct_member(
        &mut self,
        parent: Handle<Variable>,
        index: u32,
    ) -> Result<Handle<Variable>, IrError> {
        let node = Variable::StructMember { parent, index };
        self.type_of_variable(&node)?;
        Ok(self.variables.append(node))
    }

    /// An access-chain step into an array-typed parent.
    pub fn array_member(
        &mut self,
        parent: Handle<Variable>,
        index: Handle<Expression>,
    ) -> Result<Handle<Variable>, IrError> {
        let node = Variable::ArrayMember { parent, index };
        self.type_of_variable(&node)?;
        Ok(self.variables.append(node))
    }

    // ---- Statements ----

    /// Store `value` into `variable`. The value type must match the
    /// variable type (layout-insensitively).
    pub fn write(
        &mut self,
        variable: Handle<Variable>,
        value: Handle<Expression>,
    ) -> Result<Handle<Statement>, IrError> {
        let var_ty = self.variable_type(variable)?;
        let value_ty = self.expr_type(value)?;
        if !var_ty.compatible(&value_ty) {
            return Err(IrError::TypeMismatch {
                expected: var_ty.to_string(),
                found: value_ty.to_string(),
            });
        }
        Ok(self.statements.append(Statement::Write { variable, value }))
    }

    /// Execute `first`, then `second`.
    pub fn sequence(
        &mut self,
        first: Handle<Statement>,
        second: Handle<Statement>,
    ) -> Handle<Statement> {
        self.statements.append(Statement::Sequence { first, second })
    }

    /// Chain any number of statements left to right.
    pub fn sequence_all(
        &mut self,
        statements: &[Handle<Statement>],
    ) -> Result<Handle<Statement>, IrError> {
        let (&first, rest) = statements.split_first().ok_or(IrError::ArityMismatch {
            fun: "Sequence",
            expected: 1,
            found: 0,
        })?;
        Ok(rest.iter().fold(first, |acc, &s| self.sequence(acc, s)))
    }

    // ---- Typing ----

    /// The data type of an expression node.
    pub fn expr_type(&self, handle: Handle<Expression>) -> Result<ShaderType, IrError> {
        let expr = self
            .expressions
            .try_get(handle)
            .ok_or(IrError::BadHandle {
                index: handle.index(),
                size: self.expressions.len(),
            })?;
        self.type_of_expr(expr)
    }

    /// The data type of a variable node.
    pub fn variable_type(&self, handle: Handle<Variable>) -> Result<ShaderType, IrError> {
        let var = self.variables.try_get(handle).ok_or(IrError::BadHandle {
            index: handle.index(),
            size: self.variables.len(),
        })?;
        self.type_of_variable(var)
    }

    fn typecheck_append(&mut self, expr: Expression) -> Result<Handle<Expression>, IrError> {
        self.type_of_expr(&expr)?;
        Ok(self.expressions.append(expr))
    }

    fn type_of_expr(&self, expr: &Expression) -> Result<ShaderType, IrError> {
        match expr {
            Expression::Constant(c) => Ok(c.ty()),
            Expression::Construct { components } => self.construct_type(components),
            Expression::Swizzle { vector, mask } => self.swizzle_type(*vector, mask),
            Expression::Unary { op, expr } => self.unary_type(*op, *expr),
            Expression::Binary { op, left, right } => self.binary_type(*op, *left, *right),
            Expression::Math {
                fun,
                arg,
                arg1,
                arg2,
            } => self.math_type(*fun, *arg, *arg1, *arg2),
            Expression::Read { variable } => self.variable_type(*variable),
            Expression::Sample { image, coords } => self.sample_type(*image, *coords),
        }
    }

    fn construct_type(&self, components: &[Handle<Expression>]) -> Result<ShaderType, IrError> {
        if components.is_empty() {
            return Err(IrError::ArityMismatch {
                fun: "Construct",
                expected: 1,
                found: 0,
            });
        }
        let mut kind: Option<ScalarKind> = None;
        let mut total = 0u32;
        for &c in components {
            let ty = self.expr_type(c)?;
            let k = ty.scalar_kind().ok_or_else(|| IrError::UnsupportedType(
                format!("construct component of type {ty}"),
            ))?;
            let n = ty.component_count().ok_or_else(|| IrError::UnsupportedType(
                format!("construct component of type {ty}"),
            ))?;
            match kind {
                None => kind = Some(k),
                Some(prev) if prev == k => {}
                Some(prev) => {
                    return Err(IrError::TypeMismatch {
                        expected: ShaderType::Scalar(prev).to_string(),
                        found: ShaderType::Scalar(k).to_string(),
                    })
                }
            }
            total += n;
        }
        let kind = kind.unwrap_or(ScalarKind::Float);
        let size = VectorSize::from_count(total).ok_or_else(|| {
            IrError::UnsupportedType(format!("constructed vector of {total} components"))
        })?;
        Ok(ShaderType::vector(kind, size, 4 * total))
    }

    fn swizzle_type(
        &self,
        vector: Handle<Expression>,
        mask: &str,
    ) -> Result<ShaderType, IrError> {
        let src = self.expr_type(vector)?;
        let ShaderType::Vector { scalar, size, .. } = src else {
            return Err(IrError::UnsupportedOp(format!("swizzle of {src}")));
        };
        if mask.is_empty() || mask.len() > 4 {
            return Err(IrError::InvalidSwizzle {
                mask: mask.to_owned(),
            });
        }
        for c in mask.chars() {
            let index = swizzle_component_index(c).ok_or_else(|| IrError::InvalidSwizzle {
                mask: mask.to_owned(),
            })?;
            if index >= size.count() {
                return Err(IrError::InvalidSwizzle {
                    mask: mask.to_owned(),
                });
            }
        }
        let len = mask.len() as u32;
        if len == 1 {
            Ok(ShaderType::Scalar(scalar))
        } else {
            // from_count is infallible here: len is 2..=4.
            let size = VectorSize::from_count(len).ok_or_else(|| IrError::InvalidSwizzle {
                mask: mask.to_owned(),
            })?;
            Ok(ShaderType::vector(scalar, size, 4 * len))
        }
    }

    fn unary_type(&self, op: UnaryOp, expr: Handle<Expression>) -> Result<ShaderType, IrError> {
        let ty = self.expr_type(expr)?;
        let kind = ty.scalar_kind().filter(|_| !ty.is_matrix()).ok_or_else(|| {
            IrError::UnsupportedOp(format!("{op:?} on {ty}"))
        })?;
        match op {
            UnaryOp::Negate if kind != ScalarKind::Bool => Ok(ty),
            UnaryOp::Dpdx | UnaryOp::Dpdy if kind == ScalarKind::Float => Ok(ty),
            _ => Err(IrError::UnsupportedOp(format!("{op:?} on {ty}"))),
        }
    }

    fn binary_type(
        &self,
        op: BinaryOp,
        left: Handle<Expression>,
        right: Handle<Expression>,
    ) -> Result<ShaderType, IrError> {
        let lt = self.expr_type(left)?;
        let rt = self.expr_type(right)?;
        if op == BinaryOp::Multiply {
            return self.multiply_type(&lt, &rt);
        }
        let kind = lt.scalar_kind().filter(|_| !lt.is_matrix()).ok_or_else(|| {
            IrError::UnsupportedOp(format!("{op:?} on {lt}"))
        })?;
        if kind == ScalarKind::Bool {
            return Err(IrError::UnsupportedOp(format!("{op:?} on {lt}")));
        }
        if !lt.compatible(&rt) {
            return Err(IrError::TypeMismatch {
                expected: lt.to_string(),
                found: rt.to_string(),
            });
        }
        Ok(lt)
    }

    /// Multiplication is the one shape-polymorphic operator; see the
    /// operand table in the backend for the opcode selection.
    fn multiply_type(&self, lt: &ShaderType, rt: &ShaderType) -> Result<ShaderType, IrError> {
        use ShaderType as T;
        let err = || {
            IrError::UnsupportedOp(format!("Multiply on {lt} and {rt}"))
        };
        let float_only = |k: ScalarKind| (k == ScalarKind::Float).then_some(()).ok_or_else(err);
        match (lt, rt) {
            // Element-wise on equal shapes.
            (T::Scalar(k), _) | (T::Vector { scalar: k, .. }, _) if lt.compatible(rt) => {
                if *k == ScalarKind::Bool {
                    Err(err())
                } else {
                    Ok(lt.clone())
                }
            }
            // Vector scaled by scalar, either operand order.
            (T::Vector { scalar, .. }, T::Scalar(k))
            | (T::Scalar(k), T::Vector { scalar, .. })
                if scalar == k && *k != ScalarKind::Bool =>
            {
                Ok(if lt.is_vector() { lt.clone() } else { rt.clone() })
            }
            // Matrix scaled by scalar, either operand order.
            (T::Matrix { scalar, .. }, T::Scalar(k))
            | (T::Scalar(k), T::Matrix { scalar, .. })
                if scalar == k =>
            {
                float_only(*k)?;
                Ok(if lt.is_matrix() { lt.clone() } else { rt.clone() })
            }
            // Matrix × vector: vector width must equal the column count.
            (
                T::Matrix {
                    scalar,
                    rows,
                    columns,
                    ..
                },
                T::Vector {
                    scalar: vk,
                    size,
                    ..
                },
            ) if scalar == vk && size == columns => {
                float_only(*scalar)?;
                Ok(ShaderType::vector(*scalar, *rows, 4 * rows.count()))
            }
            // Vector × matrix: vector width must equal the row count.
            (
                T::Vector {
                    scalar: vk,
                    size,
                    ..
                },
                T::Matrix {
                    scalar,
                    rows,
                    columns,
                    ..
                },
            ) if scalar == vk && size == rows => {
                float_only(*scalar)?;
                Ok(ShaderType::vector(*scalar, *columns, 4 * columns.count()))
            }
            // Matrix × matrix: inner dimensions must agree.
            (
                T::Matrix {
                    scalar,
                    rows,
                    columns,
                    ..
                },
                T::Matrix {
                    scalar: k2,
                    rows: r2,
                    columns: c2,
                    ..
                },
            ) if scalar == k2 && columns == r2 => {
                float_only(*scalar)?;
                Ok(ShaderType::matrix(
                    *scalar,
                    *rows,
                    *c2,
                    4 * c2.count(),
                    rows.count() * 4 * c2.count(),
                ))
            }
            _ => Err(err()),
        }
    }

    fn math_type(
        &self,
        fun: MathFunction,
        arg: Handle<Expression>,
        arg1: Option<Handle<Expression>>,
        arg2: Option<Handle<Expression>>,
    ) -> Result<ShaderType, IrError> {
        let found = 1 + arg1.is_some() as usize + arg2.is_some() as usize;
        if found != fun.argument_count() {
            return Err(IrError::ArityMismatch {
                fun: fun.name(),
                expected: fun.argument_count(),
                found,
            });
        }
        let t0 = self.expr_type(arg)?;
        let kind = t0.scalar_kind().filter(|_| !t0.is_matrix()).ok_or_else(|| {
            IrError::UnsupportedOp(format!("{} on {t0}", fun.name()))
        })?;
        if !fun.accepts(kind) {
            return Err(IrError::UnsupportedOp(format!("{} on {t0}", fun.name())));
        }
        // The remaining operands must match the first.
        for h in [arg1, arg2].into_iter().flatten() {
            let t = self.expr_type(h)?;
            if !t0.compatible(&t) {
                return Err(IrError::TypeMismatch {
                    expected: t0.to_string(),
                    found: t.to_string(),
                });
            }
        }
        match fun {
            MathFunction::Dot | MathFunction::Length | MathFunction::Distance => {
                if !t0.is_vector() {
                    return Err(IrError::UnsupportedOp(format!("{} on {t0}", fun.name())));
                }
                Ok(ShaderType::Scalar(kind))
            }
            MathFunction::Cross => {
                if !matches!(
                    t0,
                    ShaderType::Vector {
                        size: VectorSize::Tri,
                        ..
                    }
                ) {
                    return Err(IrError::UnsupportedOp(format!("Cross on {t0}")));
                }
                Ok(t0)
            }
            MathFunction::Normalize => {
                if !t0.is_vector() {
                    return Err(IrError::UnsupportedOp(format!("Normalize on {t0}")));
                }
                Ok(t0)
            }
            _ => Ok(t0),
        }
    }

    fn sample_type(
        &self,
        image: Handle<Variable>,
        coords: Handle<Expression>,
    ) -> Result<ShaderType, IrError> {
        let var = self.variables.try_get(image).ok_or(IrError::BadHandle {
            index: image.index(),
            size: self.variables.len(),
        })?;
        let Variable::SampledImage { dims, ty, .. } = var else {
            return Err(IrError::UnsupportedOp(
                "sample of a non-image variable".into(),
            ));
        };
        ty.component_count().ok_or_else(|| {
            IrError::UnsupportedType(format!("sample result type {ty}"))
        })?;
        let ct = self.expr_type(coords)?;
        let ok = ct.scalar_kind() == Some(ScalarKind::Float)
            && ct.component_count() == Some(dims.coord_count());
        if !ok {
            return Err(IrError::TypeMismatch {
                expected: format!("{}-component float coordinates", dims.coord_count()),
                found: ct.to_string(),
            });
        }
        Ok(ty.clone())
    }

    fn type_of_variable(&self, var: &Variable) -> Result<ShaderType, IrError> {
        match var {
            Variable::Buffer { ty, .. }
            | Variable::Attribute { ty, .. }
            | Variable::Interpolant { ty, .. }
            | Variable::Fragment { ty, .. }
            | Variable::SampledImage { ty, .. } => Ok(ty.clone()),
            Variable::StructMember { parent, index } => {
                let parent_ty = self.variable_type(*parent)?;
                let ShaderType::Struct { members, .. } = parent_ty else {
                    return Err(IrError::TypeMismatch {
                        expected: "struct".into(),
                        found: parent_ty.to_string(),
                    });
                };
                let member = members.get(*index as usize).ok_or(IrError::BadHandle {
                    index: *index as usize,
                    size: members.len(),
                })?;
                Ok((*member.ty).clone())
            }
            Variable::ArrayMember { parent, index } => {
                let parent_ty = self.variable_type(*parent)?;
                let ShaderType::Array { base, .. } = parent_ty else {
                    return Err(IrError::TypeMismatch {
                        expected: "array".into(),
                        found: parent_ty.to_string(),
                    });
                };
                let index_ty = self.expr_type(*index)?;
                if !matches!(
                    index_ty,
                    ShaderType::Scalar(ScalarKind::Uint) | ShaderType::Scalar(ScalarKind::Sint)
                ) {
                    return Err(IrError::TypeMismatch {
                        expected: "integer index".into(),
                        found: index_ty.to_string(),
                    });
                }
                Ok((*base).clone())
            }
            Variable::TessLevelInner => Ok(ShaderType::array(ShaderType::F32, 2, 8)),
            Variable::TessLevelOuter => Ok(ShaderType::array(ShaderType::F32, 4, 16)),
        }
    }
}
