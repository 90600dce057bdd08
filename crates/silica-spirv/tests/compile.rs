//! End-to-end compilation tests over the public API.

mod common;

use silica_ir::*;
use silica_spirv::{
    compile, spv, CompileError, DescriptorBinding, DescriptorKind, GraphicsShaderRoots, StageMask,
};
use silica_spirv::spv::op;

fn camera_buffer(g: &mut ShaderGraph) -> Handle<Variable> {
    g.buffer(
        0,
        0,
        BufferKind::Uniform,
        ShaderType::structure(
            vec![(0, ShaderType::mat4f()), (64, ShaderType::vec4f())],
            80,
        ),
    )
}

#[test]
fn vertex_passthrough() {
    let mut g = ShaderGraph::new();
    let attr = g.attribute(0, None, ShaderType::vec3f());
    let position = g.interpolant(0, Some(InterpolantBuiltin::Position), ShaderType::vec4f());
    let read = g.read(attr).unwrap();
    let one = g.const_f32(1.0);
    let v4 = g.construct(&[read, one]).unwrap();
    let root = g.write(position, v4).unwrap();

    let module = compile(
        &g,
        &GraphicsShaderRoots {
            vertex: Some(root),
            ..Default::default()
        },
    )
    .unwrap();
    let insts = common::check_module(&module.words);

    let entry = common::find_one(&insts, op::ENTRY_POINT);
    assert_eq!(entry.operands[0], spv::execution_model::VERTEX);
    let (name, consumed) = common::decode_string(&entry.operands[2..]);
    assert_eq!(name, "mainVertex");
    let interface = &entry.operands[2 + consumed..];
    assert_eq!(interface.len(), 2);

    // The interface lists exactly the declared input and output.
    let variables = common::find(&insts, op::VARIABLE);
    assert_eq!(variables.len(), 2);
    let declared: Vec<u32> = variables.iter().map(|v| v.operands[1]).collect();
    for id in interface {
        assert!(declared.contains(id));
    }

    let caps: Vec<u32> = common::find(&insts, op::CAPABILITY)
        .iter()
        .map(|c| c.operands[0])
        .collect();
    assert!(caps.contains(&spv::capability::SHADER));
    assert!(caps.contains(&spv::capability::MATRIX));
    assert!(!caps.contains(&spv::capability::TESSELLATION));
    assert!(module.descriptor_sets.is_empty());
}

#[test]
fn uniform_buffer_layout_decorations() {
    let mut g = ShaderGraph::new();
    let camera = camera_buffer(&mut g);
    let view_proj = g.struct_member(camera, 0).unwrap();
    let position = g.interpolant(0, Some(InterpolantBuiltin::Position), ShaderType::vec4f());
    let m = g.read(view_proj).unwrap();
    let v = g.const_vec4f(0.0, 0.0, 0.0, 1.0);
    let clip = g.multiply(m, v).unwrap();
    let root = g.write(position, clip).unwrap();

    let module = compile(
        &g,
        &GraphicsShaderRoots {
            vertex: Some(root),
            ..Default::default()
        },
    )
    .unwrap();
    let insts = common::check_module(&module.words);

    let decorates = common::find(&insts, op::DECORATE);
    let descriptor_sets: Vec<_> = decorates
        .iter()
        .filter(|d| d.operands[1] == spv::decoration::DESCRIPTOR_SET)
        .collect();
    assert_eq!(descriptor_sets.len(), 1);
    assert_eq!(descriptor_sets[0].operands[2], 0);
    let bindings: Vec<_> = decorates
        .iter()
        .filter(|d| d.operands[1] == spv::decoration::BINDING)
        .collect();
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].operands[2], 0);
    assert_eq!(
        decorates
            .iter()
            .filter(|d| d.operands[1] == spv::decoration::BLOCK)
            .count(),
        1
    );

    let members: Vec<Vec<u32>> = common::find(&insts, op::MEMBER_DECORATE)
        .iter()
        .map(|d| d.operands[1..].to_vec())
        .collect();
    assert!(members.contains(&vec![0, spv::decoration::OFFSET, 0]));
    assert!(members.contains(&vec![1, spv::decoration::OFFSET, 64]));
    assert!(members.contains(&vec![0, spv::decoration::ROW_MAJOR]));
    assert!(members.contains(&vec![0, spv::decoration::MATRIX_STRIDE, 16]));

    common::find_one(&insts, op::MATRIX_TIMES_VECTOR);

    assert_eq!(module.descriptor_sets.len(), 1);
    assert_eq!(
        module.descriptor_sets[0].bindings[0],
        DescriptorBinding {
            kind: DescriptorKind::UniformBuffer,
            count: 1,
            stages: StageMask::VERTEX,
        }
    );
}

#[test]
fn cross_stage_binding_merge() {
    let mut g = ShaderGraph::new();
    let camera = camera_buffer(&mut g);
    let view_proj = g.struct_member(camera, 0).unwrap();
    let tint = g.struct_member(camera, 1).unwrap();

    let position = g.interpolant(0, Some(InterpolantBuiltin::Position), ShaderType::vec4f());
    let m = g.read(view_proj).unwrap();
    let v = g.const_vec4f(0.0, 0.0, 0.0, 1.0);
    let clip = g.multiply(m, v).unwrap();
    let vertex_root = g.write(position, clip).unwrap();

    let color = g.fragment_output(0, None, ShaderType::vec4f());
    let tint_value = g.read(tint).unwrap();
    let fragment_root = g.write(color, tint_value).unwrap();

    let module = compile(
        &g,
        &GraphicsShaderRoots {
            vertex: Some(vertex_root),
            fragment: Some(fragment_root),
            ..Default::default()
        },
    )
    .unwrap();
    let insts = common::check_module(&module.words);

    // One OpVariable in the Uniform class despite two referencing stages.
    let uniform_vars = common::find(&insts, op::VARIABLE)
        .iter()
        .filter(|v| v.operands[2] == spv::storage_class::UNIFORM)
        .count();
    assert_eq!(uniform_vars, 1);

    assert_eq!(module.descriptor_sets[0].bindings.len(), 1);
    assert_eq!(
        module.descriptor_sets[0].bindings[0].stages,
        StageMask::VERTEX | StageMask::FRAGMENT
    );
}

#[test]
fn compute_storage_buffer() {
    let mut g = ShaderGraph::new();
    let data = g.buffer(
        0,
        1,
        BufferKind::Storage,
        ShaderType::structure(vec![(0, ShaderType::F32)], 4),
    );
    let member = g.struct_member(data, 0).unwrap();
    let value = g.const_f32(2.0);
    let root = g.write(member, value).unwrap();

    let module = compile(
        &g,
        &GraphicsShaderRoots {
            compute: Some(root),
            compute_size: Some([8, 8, 1]),
            ..Default::default()
        },
    )
    .unwrap();
    let insts = common::check_module(&module.words);

    let mode = common::find_one(&insts, op::EXECUTION_MODE);
    assert_eq!(mode.operands[1], spv::execution_mode::LOCAL_SIZE);
    assert_eq!(&mode.operands[2..], &[8, 8, 1]);

    let ext = common::find_one(&insts, op::EXTENSION);
    let (name, _) = common::decode_string(&ext.operands);
    assert_eq!(name, spv::EXT_STORAGE_BUFFER);

    assert!(common::find(&insts, op::TYPE_POINTER)
        .iter()
        .any(|p| p.operands[1] == spv::storage_class::STORAGE_BUFFER));

    let set = &module.descriptor_sets[0];
    assert_eq!(set.bindings[0], DescriptorBinding::UNUSED);
    assert_eq!(
        set.bindings[1],
        DescriptorBinding {
            kind: DescriptorKind::StorageBuffer,
            count: 1,
            stages: StageMask::COMPUTE,
        }
    );
}

#[test]
fn descriptor_conflict_is_rejected() {
    let mut g = ShaderGraph::new();
    let buffer = g.buffer(
        0,
        0,
        BufferKind::Uniform,
        ShaderType::structure(vec![(0, ShaderType::vec4f())], 16),
    );
    let tint = g.struct_member(buffer, 0).unwrap();
    let image = g
        .sampled_image(0, 0, ImageDims::D2, ShaderType::vec4f())
        .unwrap();
    let uv = g.interpolant(0, None, ShaderType::vec2f());
    let color = g.fragment_output(0, None, ShaderType::vec4f());

    let coords = g.read(uv).unwrap();
    let texel = g.sample(image, coords).unwrap();
    let tint_value = g.read(tint).unwrap();
    let shaded = g.multiply(texel, tint_value).unwrap();
    let root = g.write(color, shaded).unwrap();

    let err = compile(
        &g,
        &GraphicsShaderRoots {
            fragment: Some(root),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert!(matches!(
        err,
        CompileError::DescriptorConflict { set: 0, slot: 0, .. }
    ));
}

#[test]
fn swizzle_two_components_shuffles() {
    let mut g = ShaderGraph::new();
    let v = g.const_vec4f(1.0, 2.0, 3.0, 4.0);
    let xz = g.swizzle(v, "xz").unwrap();
    let out = g.interpolant(0, None, ShaderType::vec2f());
    let root = g.write(out, xz).unwrap();

    let module = compile(
        &g,
        &GraphicsShaderRoots {
            vertex: Some(root),
            ..Default::default()
        },
    )
    .unwrap();
    let insts = common::check_module(&module.words);

    let shuffle = common::find_one(&insts, op::VECTOR_SHUFFLE);
    // Source listed twice, then the component indices.
    assert_eq!(shuffle.operands[2], shuffle.operands[3]);
    assert_eq!(&shuffle.operands[4..], &[0, 2]);
    // The result type is a two-component vector.
    let vec2_ty = common::find(&insts, op::TYPE_VECTOR)
        .iter()
        .find(|t| t.operands[0] == shuffle.operands[0])
        .map(|t| t.operands[2]);
    assert_eq!(vec2_ty, Some(2));
}

#[test]
fn swizzle_single_component_extracts() {
    let mut g = ShaderGraph::new();
    let v = g.const_vec4f(1.0, 2.0, 3.0, 4.0);
    let y = g.swizzle(v, "y").unwrap();
    let out = g.interpolant(0, None, ShaderType::F32);
    let root = g.write(out, y).unwrap();

    let module = compile(
        &g,
        &GraphicsShaderRoots {
            vertex: Some(root),
            ..Default::default()
        },
    )
    .unwrap();
    let insts = common::check_module(&module.words);

    let extract = common::find_one(&insts, op::COMPOSITE_EXTRACT);
    assert_eq!(extract.operands[3], 1);
    assert!(common::find(&insts, op::VECTOR_SHUFFLE).is_empty());
}

#[test]
fn sampling_emits_implicit_lod() {
    let mut g = ShaderGraph::new();
    let albedo = g
        .sampled_image(1, 0, ImageDims::D2, ShaderType::vec4f())
        .unwrap();
    let uv = g.interpolant(0, None, ShaderType::vec2f());
    let color = g.fragment_output(0, None, ShaderType::vec4f());
    let coords = g.read(uv).unwrap();
    let texel = g.sample(albedo, coords).unwrap();
    let root = g.write(color, texel).unwrap();

    let module = compile(
        &g,
        &GraphicsShaderRoots {
            fragment: Some(root),
            ..Default::default()
        },
    )
    .unwrap();
    let insts = common::check_module(&module.words);

    common::find_one(&insts, op::IMAGE_SAMPLE_IMPLICIT_LOD);
    common::find_one(&insts, op::TYPE_SAMPLED_IMAGE);
    // A four-component declared type needs no shrink.
    assert!(common::find(&insts, op::VECTOR_SHUFFLE).is_empty());

    assert_eq!(module.descriptor_sets.len(), 2);
    assert!(module.descriptor_sets[0].bindings.is_empty());
    assert_eq!(
        module.descriptor_sets[1].bindings[0],
        DescriptorBinding {
            kind: DescriptorKind::SampledImage,
            count: 1,
            stages: StageMask::FRAGMENT,
        }
    );
}

#[test]
fn narrow_sample_type_shrinks_result() {
    let mut g = ShaderGraph::new();
    let height = g
        .sampled_image(0, 0, ImageDims::D2, ShaderType::vec2f())
        .unwrap();
    let uv = g.interpolant(0, None, ShaderType::vec2f());
    let out = g.fragment_output(0, None, ShaderType::vec2f());
    let coords = g.read(uv).unwrap();
    let texel = g.sample(height, coords).unwrap();
    let root = g.write(out, texel).unwrap();

    let module = compile(
        &g,
        &GraphicsShaderRoots {
            fragment: Some(root),
            ..Default::default()
        },
    )
    .unwrap();
    let insts = common::check_module(&module.words);

    let shuffle = common::find_one(&insts, op::VECTOR_SHUFFLE);
    assert_eq!(&shuffle.operands[4..], &[0, 1]);
}

#[test]
fn tessellation_pipeline() {
    let mut g = ShaderGraph::new();
    let outer = g.tess_level_outer();
    let index = g.const_u32(0);
    let outer0 = g.array_member(outer, index).unwrap();
    let three = g.const_f32(3.0);
    let control_root = g.write(outer0, three).unwrap();

    let position = g.interpolant(0, Some(InterpolantBuiltin::Position), ShaderType::vec4f());
    let origin = g.const_vec4f(0.0, 0.0, 0.0, 1.0);
    let eval_root = g.write(position, origin).unwrap();

    let module = compile(
        &g,
        &GraphicsShaderRoots {
            tessellation_control: Some(control_root),
            tessellation_evaluation: Some(eval_root),
            tessellation_output_vertices: Some(3),
            ..Default::default()
        },
    )
    .unwrap();
    let insts = common::check_module(&module.words);

    let caps: Vec<u32> = common::find(&insts, op::CAPABILITY)
        .iter()
        .map(|c| c.operands[0])
        .collect();
    assert!(caps.contains(&spv::capability::TESSELLATION));

    let entries = common::find(&insts, op::ENTRY_POINT);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].operands[0], spv::execution_model::TESSELLATION_CONTROL);
    assert_eq!(
        entries[1].operands[0],
        spv::execution_model::TESSELLATION_EVALUATION
    );

    let mode = common::find_one(&insts, op::EXECUTION_MODE);
    assert_eq!(mode.operands[1], spv::execution_mode::OUTPUT_VERTICES);
    assert_eq!(mode.operands[2], 3);

    // The tessellation level builtin is decorated, not located.
    assert!(common::find(&insts, op::DECORATE).iter().any(|d| {
        d.operands[1] == spv::decoration::BUILT_IN
            && d.operands[2] == spv::builtin::TESS_LEVEL_OUTER
    }));
}

#[test]
fn matching_locations_across_stages() {
    let mut g = ShaderGraph::new();
    let varying = g.interpolant(3, None, ShaderType::vec2f());
    let half = g.const_vec2f(0.5, 0.5);
    let vertex_root = g.write(varying, half).unwrap();

    let out = g.fragment_output(0, None, ShaderType::vec2f());
    let value = g.read(varying).unwrap();
    let fragment_root = g.write(out, value).unwrap();

    let module = compile(
        &g,
        &GraphicsShaderRoots {
            vertex: Some(vertex_root),
            fragment: Some(fragment_root),
            ..Default::default()
        },
    )
    .unwrap();
    let insts = common::check_module(&module.words);

    let located: Vec<(u32, u32)> = common::find(&insts, op::DECORATE)
        .iter()
        .filter(|d| d.operands[1] == spv::decoration::LOCATION)
        .map(|d| (d.operands[0], d.operands[2]))
        .collect();
    let at_three: Vec<u32> = located
        .iter()
        .filter(|&&(_, loc)| loc == 3)
        .map(|&(id, _)| id)
        .collect();
    assert_eq!(at_three.len(), 2);

    // Output in the vertex stage, Input in the fragment stage, same
    // pointee type on both sides.
    let variables = common::find(&insts, op::VARIABLE);
    let pointers = common::find(&insts, op::TYPE_POINTER);
    let mut sides = Vec::new();
    for &id in &at_three {
        let var = variables.iter().find(|v| v.operands[1] == id).unwrap();
        let ptr = pointers
            .iter()
            .find(|p| p.operands[0] == var.operands[0])
            .unwrap();
        sides.push((ptr.operands[1], ptr.operands[2]));
    }
    sides.sort_unstable();
    assert_eq!(sides[0].0, spv::storage_class::INPUT);
    assert_eq!(sides[1].0, spv::storage_class::OUTPUT);
    assert_eq!(sides[0].1, sides[1].1);
}

#[test]
fn shared_subexpression_emits_once() {
    let mut g = ShaderGraph::new();
    let attr = g.attribute(0, None, ShaderType::F32);
    let x = g.read(attr).unwrap();
    let sum = g.add(x, x).unwrap();
    let a = g.interpolant(0, None, ShaderType::F32);
    let b = g.interpolant(1, None, ShaderType::F32);
    let first = g.write(a, sum).unwrap();
    let second = g.write(b, sum).unwrap();
    let root = g.sequence(first, second);

    let module = compile(
        &g,
        &GraphicsShaderRoots {
            vertex: Some(root),
            ..Default::default()
        },
    )
    .unwrap();
    let insts = common::check_module(&module.words);

    assert_eq!(common::find(&insts, op::F_ADD).len(), 1);
    assert_eq!(common::find(&insts, op::LOAD).len(), 1);
    assert_eq!(common::find(&insts, op::STORE).len(), 2);
}

#[test]
fn compilation_is_deterministic() {
    let build = || {
        let mut g = ShaderGraph::new();
        let camera = camera_buffer(&mut g);
        let view_proj = g.struct_member(camera, 0).unwrap();
        let attr = g.attribute(0, None, ShaderType::vec3f());
        let position = g.interpolant(0, Some(InterpolantBuiltin::Position), ShaderType::vec4f());
        let pos = g.read(attr).unwrap();
        let one = g.const_f32(1.0);
        let v4 = g.construct(&[pos, one]).unwrap();
        let m = g.read(view_proj).unwrap();
        let clip = g.multiply(m, v4).unwrap();
        let root = g.write(position, clip).unwrap();
        let roots = GraphicsShaderRoots {
            vertex: Some(root),
            ..Default::default()
        };
        compile(&g, &roots).unwrap()
    };
    let first = build();
    let second = build();
    assert_eq!(first.words, second.words);
    assert_eq!(first.bytes(), second.bytes());
}

#[test]
fn constant_only_body_compiles() {
    let mut g = ShaderGraph::new();
    let out = g.fragment_output(0, None, ShaderType::F32);
    let one = g.const_f32(1.0);
    let root = g.write(out, one).unwrap();

    let module = compile(
        &g,
        &GraphicsShaderRoots {
            fragment: Some(root),
            ..Default::default()
        },
    )
    .unwrap();
    let insts = common::check_module(&module.words);

    let entry = common::find_one(&insts, op::ENTRY_POINT);
    let (name, _) = common::decode_string(&entry.operands[2..]);
    assert_eq!(name, "mainFragment");
    let mode = common::find_one(&insts, op::EXECUTION_MODE);
    assert_eq!(mode.operands[1], spv::execution_mode::ORIGIN_UPPER_LEFT);
}

#[test]
fn math_functions_lower_to_ext_inst() {
    let mut g = ShaderGraph::new();
    let attr = g.attribute(0, None, ShaderType::vec3f());
    let n = g.read(attr).unwrap();
    let unit = g.math(MathFunction::Normalize, &[n]).unwrap();
    let light = g.const_vec3f(0.0, 1.0, 0.0);
    let lambert = g.math(MathFunction::Dot, &[unit, light]).unwrap();
    let zero = g.const_f32(0.0);
    let one = g.const_f32(1.0);
    let clamped = g.math(MathFunction::Clamp, &[lambert, zero, one]).unwrap();
    let out = g.interpolant(0, None, ShaderType::F32);
    let root = g.write(out, clamped).unwrap();

    let module = compile(
        &g,
        &GraphicsShaderRoots {
            vertex: Some(root),
            ..Default::default()
        },
    )
    .unwrap();
    let insts = common::check_module(&module.words);

    common::find_one(&insts, op::DOT);
    let ext_insts = common::find(&insts, op::EXT_INST);
    assert_eq!(ext_insts.len(), 2);
    let import = common::find_one(&insts, op::EXT_INST_IMPORT);
    let set_id = import.operands[0];
    let numbers: Vec<u32> = ext_insts
        .iter()
        .map(|e| {
            assert_eq!(e.operands[2], set_id);
            e.operands[3]
        })
        .collect();
    assert!(numbers.contains(&spv::glsl::NORMALIZE));
    assert!(numbers.contains(&spv::glsl::F_CLAMP));
}
