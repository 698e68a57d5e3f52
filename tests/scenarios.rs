//! End-to-end `recompile()` tests for the six concrete scenarios and the
//! universal properties named alongside them.
mod common;

use common::*;
use dxbc_spirv::dxbc::{
    AluOp, ComponentType, DstOperand, Instr, RegisterKind, ResourceDim, ShaderKind, ShaderModule,
    SrcOperand, SysValueSemantic, WriteMask,
};
use dxbc_spirv::root_signature::{RootParameter, RootSignatureDesc, Visibility};
use dxbc_spirv::{recompile, RecompilerConfig};
use spirv::{BuiltIn, Capability, Dim, ExecutionModel, Op};

fn module(kind: ShaderKind, instrs: Vec<Instr>) -> ShaderModule {
    ShaderModule { kind, instrs, input_sig: vec![], output_sig: vec![] }
}

#[test]
fn s1_trivial_compute() {
    let m = module(
        ShaderKind::Compute,
        vec![Instr::DclThreadGroup { x: 8, y: 8, z: 1 }, Instr::Ret],
    );
    let out = recompile(&m, &RootSignatureDesc::default(), RecompilerConfig::default()).unwrap();

    assert_eq!(out.spirv[0], 0x0723_0203, "missing SPIR-V magic number");
    let instrs = body_instrs(&out.spirv);

    let caps = find_opcode(&instrs, Op::Capability);
    assert!(caps.iter().any(|c| c.operands[0] == Capability::Shader as u32));

    let entry = find_opcode(&instrs, Op::EntryPoint);
    assert_eq!(entry.len(), 1);
    assert_eq!(entry[0].operands[0], ExecutionModel::GLCompute as u32);
    // exec-model + main-id + "main"'s 2 padded words, no interface ids.
    assert_eq!(entry[0].operands.len(), 4);

    let modes = find_opcode(&instrs, Op::ExecutionMode);
    assert_eq!(modes.len(), 1);
    assert_eq!(&modes[0].operands[1..5], &[spirv::ExecutionMode::LocalSize as u32, 8, 8, 1]);

    assert_eq!(count_opcode(&instrs, Op::Return), 1);
}

#[test]
fn s2_mov_between_vec4_temps() {
    let mov = Instr::Mov {
        dst: DstOperand::register(RegisterKind::Temp, 0, WriteMask::XYZW),
        src: SrcOperand::register(RegisterKind::Temp, 1),
    };
    let m = module(ShaderKind::Vertex, vec![Instr::DclTemps { count: 2 }, mov, Instr::Ret]);
    let out = recompile(&m, &RootSignatureDesc::default(), RecompilerConfig::default()).unwrap();
    let instrs = body_instrs(&out.spirv);

    assert_eq!(count_opcode(&instrs, Op::TypeFloat), 1);
    assert_eq!(count_opcode(&instrs, Op::TypeVector), 1);

    let vars = find_opcode(&instrs, Op::Variable);
    assert_eq!(vars.len(), 2, "one Private ptr<vec4<f32>> per declared temp");

    assert!(count_opcode(&instrs, Op::Load) >= 1);
    assert!(count_opcode(&instrs, Op::Store) >= 1);
}

#[test]
fn s3_constant_buffer_read() {
    let root_sig = RootSignatureDesc {
        parameters: vec![RootParameter::RootCbv { register: 0, space: 0, visibility: Visibility::All }],
        static_samplers: vec![],
    };
    let load = Instr::Mov {
        dst: DstOperand::register(RegisterKind::Temp, 0, WriteMask::X),
        src: {
            let mut s = SrcOperand::register(RegisterKind::ConstBuffer, 0);
            s.indices[1] = Some(3);
            s
        },
    };
    let m = module(ShaderKind::Vertex, vec![Instr::DclTemps { count: 1 }, Instr::DclConstantBuffer { reg: 0, space: 0, size_vec4: 4 }, load, Instr::Ret]);
    let out = recompile(&m, &root_sig, RecompilerConfig::default()).unwrap();
    let instrs = body_instrs(&out.spirv);

    let decos = find_opcode(&instrs, Op::Decorate);
    assert!(decos.iter().any(|d| d.operands[1] == spirv::Decoration::ArrayStride as u32 && d.operands[2] == 16));
    assert!(decos.iter().any(|d| d.operands[1] == spirv::Decoration::Block as u32));
    assert!(decos.iter().any(|d| d.operands[1] == spirv::Decoration::DescriptorSet as u32));
    assert!(decos.iter().any(|d| d.operands[1] == spirv::Decoration::Binding as u32));

    let member_decos = find_opcode(&instrs, Op::MemberDecorate);
    assert!(member_decos
        .iter()
        .any(|d| d.operands[2] == spirv::Decoration::Offset as u32 && d.operands[3] == 0));
}

#[test]
fn s3_root_cbv_size_mismatch_is_layout_mismatch() {
    let root_sig = RootSignatureDesc {
        parameters: vec![RootParameter::Constants32Bit { register: 0, space: 0, count: 4, visibility: Visibility::All }],
        static_samplers: vec![],
    };
    let m = module(
        ShaderKind::Vertex,
        vec![Instr::DclConstantBuffer { reg: 0, space: 0, size_vec4: 4 }, Instr::Ret],
    );
    let err = recompile(&m, &root_sig, RecompilerConfig::default()).unwrap_err();
    assert!(matches!(err, dxbc_spirv::Error::LayoutMismatch(_)));
}

#[test]
fn s4_if_else() {
    let if_nz = Instr::IfNz { cond: SrcOperand::register(RegisterKind::Temp, 0) };
    let mov_from_r2 = Instr::Mov {
        dst: DstOperand::register(RegisterKind::Temp, 1, WriteMask::XYZW),
        src: SrcOperand::register(RegisterKind::Temp, 2),
    };
    let mov_from_r3 = Instr::Mov {
        dst: DstOperand::register(RegisterKind::Temp, 1, WriteMask::XYZW),
        src: SrcOperand::register(RegisterKind::Temp, 3),
    };
    let m = module(
        ShaderKind::Vertex,
        vec![
            Instr::DclTemps { count: 4 },
            if_nz,
            mov_from_r2,
            Instr::Else,
            mov_from_r3,
            Instr::EndIf,
            Instr::Ret,
        ],
    );
    let out = recompile(&m, &RootSignatureDesc::default(), RecompilerConfig::default()).unwrap();
    let instrs = body_instrs(&out.spirv);

    assert_eq!(count_opcode(&instrs, Op::SelectionMerge), 1);
    assert_eq!(count_opcode(&instrs, Op::BranchConditional), 1);
    assert_eq!(count_opcode(&instrs, Op::Label), 3, "then, else, merge labels");
    assert_eq!(count_opcode(&instrs, Op::Store), 2, "r1 stored once per branch");
}

#[test]
fn s5_texture_sample() {
    let sample = Instr::Sample {
        dst: DstOperand::register(RegisterKind::Temp, 0, WriteMask::XYZW),
        coord: SrcOperand::register(RegisterKind::Input, 0),
        resource: SrcOperand::register(RegisterKind::Resource, 0),
        sampler: SrcOperand::register(RegisterKind::Sampler, 0),
        offset: None,
    };
    let m = module(
        ShaderKind::Fragment,
        vec![
            Instr::DclTemps { count: 1 },
            Instr::DclInput { reg: 0, mask: WriteMask::XYZW },
            Instr::DclResource { reg: 0, space: 0, dim: ResourceDim::Texture2D, sampled_kind: ComponentType::Float, rel_addr: false },
            Instr::DclSampler { reg: 0, space: 0 },
            sample,
            Instr::Ret,
        ],
    );
    let root_sig = RootSignatureDesc {
        parameters: vec![RootParameter::DescriptorTable(dxbc_spirv::root_signature::DescriptorTable {
            ranges: vec![
                dxbc_spirv::root_signature::DescriptorRange {
                    kind: dxbc_spirv::root_signature::RangeKind::Srv,
                    base_register: 0,
                    register_space: 0,
                    descriptor_count: 1,
                    offset_in_table: 0,
                    visibility: Visibility::Pixel,
                },
                dxbc_spirv::root_signature::DescriptorRange {
                    kind: dxbc_spirv::root_signature::RangeKind::Sampler,
                    base_register: 0,
                    register_space: 0,
                    descriptor_count: 1,
                    offset_in_table: 1,
                    visibility: Visibility::Pixel,
                },
            ],
        })],
        static_samplers: vec![],
    };
    let out = recompile(&m, &root_sig, RecompilerConfig::default()).unwrap();
    let instrs = body_instrs(&out.spirv);

    let images = find_opcode(&instrs, Op::TypeImage);
    assert_eq!(images.len(), 1);
    // operands: [result-id, sampled-type, Dim, Depth, Arrayed, MS, Sampled, Format]
    assert_eq!(images[0].operands[2], Dim::Dim2D as u32);
    assert_eq!(images[0].operands[6], 1, "sampled=1 for an SRV");

    assert_eq!(count_opcode(&instrs, Op::TypeSampledImage), 1);
    assert_eq!(count_opcode(&instrs, Op::SampledImage), 1);
    assert_eq!(count_opcode(&instrs, Op::ImageSampleImplicitLod), 1);
}

#[test]
fn s6_uav_typed_store() {
    let store = Instr::StoreUavTyped {
        uav: SrcOperand::register(RegisterKind::Uav, 0),
        coord: SrcOperand::register(RegisterKind::ThreadId, 0),
        value: SrcOperand::register(RegisterKind::Temp, 0),
    };
    let m = module(
        ShaderKind::Compute,
        vec![
            Instr::DclThreadGroup { x: 1, y: 1, z: 1 },
            Instr::DclTemps { count: 1 },
            Instr::DclUav { reg: 0, space: 0, dim: ResourceDim::Texture2D, sampled_kind: ComponentType::Float, has_counter: false, rel_addr: false },
            store,
            Instr::Ret,
        ],
    );
    let root_sig = RootSignatureDesc {
        parameters: vec![RootParameter::DescriptorTable(dxbc_spirv::root_signature::DescriptorTable {
            ranges: vec![dxbc_spirv::root_signature::DescriptorRange {
                kind: dxbc_spirv::root_signature::RangeKind::Uav,
                base_register: 0,
                register_space: 0,
                descriptor_count: 1,
                offset_in_table: 0,
                visibility: Visibility::All,
            }],
        })],
        static_samplers: vec![],
    };
    let out = recompile(&m, &root_sig, RecompilerConfig::default()).unwrap();
    let instrs = body_instrs(&out.spirv);

    let caps = find_opcode(&instrs, Op::Capability);
    assert!(caps.iter().any(|c| c.operands[0] == Capability::StorageImageWriteWithoutFormat as u32));

    let images = find_opcode(&instrs, Op::TypeImage);
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].operands[6], 2, "sampled=2 for a UAV");

    assert_eq!(count_opcode(&instrs, Op::ImageWrite), 1);
}

#[test]
fn sysval_input_and_output_round_trip_through_canonical_registers() {
    // A vertex shader forwarding its builtin vertex index into a scalar
    // output, exercising the declaration-time prologue copy queue and the
    // epilog's narrowing pack.
    let mov = Instr::Mov {
        dst: DstOperand::register(RegisterKind::Output, 0, WriteMask::X),
        src: SrcOperand::register(RegisterKind::Input, 0),
    };
    let m = module(
        ShaderKind::Vertex,
        vec![
            Instr::DclInputSv { reg: 0, mask: WriteMask::X, sysval: SysValueSemantic::VertexId },
            Instr::DclOutputSv { reg: 0, mask: WriteMask::X, sysval: SysValueSemantic::VertexId },
            mov,
            Instr::Ret,
        ],
    );
    let out = recompile(&m, &RootSignatureDesc::default(), RecompilerConfig::default()).unwrap();
    let instrs = body_instrs(&out.spirv);

    let builtins = find_opcode(&instrs, Op::Decorate)
        .into_iter()
        .filter(|d| d.operands[1] == spirv::Decoration::BuiltIn as u32)
        .count();
    assert_eq!(builtins, 2, "one BuiltIn decoration for the input, one for the output");

    // Two functions: `main` plus the `setup_output` epilog it calls.
    assert_eq!(count_opcode(&instrs, Op::Function), 2);
    assert_eq!(count_opcode(&instrs, Op::FunctionCall), 1);
}

#[test]
fn clip_and_cull_distance_become_shared_float_arrays() {
    // Two vertex output registers split across clip and cull: o1.xy feeds
    // two clip planes, o2.x feeds one cull plane. SPIR-V wants exactly one
    // `ClipDistance` array (sized 2) and one `CullDistance` array (sized 1),
    // not one array per register.
    let m = module(
        ShaderKind::Vertex,
        vec![
            Instr::DclOutputSv { reg: 1, mask: WriteMask::X | WriteMask::Y, sysval: SysValueSemantic::ClipDistance },
            Instr::DclOutputSv { reg: 2, mask: WriteMask::X, sysval: SysValueSemantic::CullDistance },
            Instr::Ret,
        ],
    );
    let out = recompile(&m, &RootSignatureDesc::default(), RecompilerConfig::default()).unwrap();
    let instrs = body_instrs(&out.spirv);

    let caps = find_opcode(&instrs, Op::Capability);
    assert!(caps.iter().any(|c| c.operands[0] == Capability::ClipDistance as u32));
    assert!(caps.iter().any(|c| c.operands[0] == Capability::CullDistance as u32));

    let builtin_decos: Vec<_> = find_opcode(&instrs, Op::Decorate)
        .into_iter()
        .filter(|d| d.operands[1] == spirv::Decoration::BuiltIn as u32)
        .collect();
    assert!(builtin_decos.iter().any(|d| d.operands[2] == BuiltIn::ClipDistance as u32));
    assert!(builtin_decos.iter().any(|d| d.operands[2] == BuiltIn::CullDistance as u32));
    assert_eq!(builtin_decos.len(), 2, "one shared array per builtin, not one per register");

    let arrays = find_opcode(&instrs, Op::TypeArray);
    assert_eq!(arrays.len(), 2);

    // decoded operands are [result_id, result_type, value] for a plain OpConstant.
    let consts = find_opcode(&instrs, Op::Constant);
    assert!(consts.iter().any(|c| c.operands[2] == 2), "ClipDistance array length 2");
    assert!(consts.iter().any(|c| c.operands[2] == 1), "CullDistance array length 1");
}

#[test]
fn determinism_across_repeated_recompiles() {
    let mov = Instr::Mov {
        dst: DstOperand::register(RegisterKind::Temp, 0, WriteMask::XYZW),
        src: SrcOperand::register(RegisterKind::Temp, 1),
    };
    let m = module(ShaderKind::Vertex, vec![Instr::DclTemps { count: 2 }, mov, Instr::Ret]);
    let a = recompile(&m, &RootSignatureDesc::default(), RecompilerConfig::default()).unwrap();
    let b = recompile(&m, &RootSignatureDesc::default(), RecompilerConfig::default()).unwrap();
    assert_eq!(a.spirv, b.spirv);
}

#[test]
fn id_density_has_no_gaps() {
    let alu = Instr::Alu {
        op: AluOp::Add,
        dst: DstOperand::register(RegisterKind::Temp, 0, WriteMask::XYZW),
        srcs: vec![SrcOperand::register(RegisterKind::Temp, 1), SrcOperand::register(RegisterKind::Temp, 2)],
        sat: false,
    };
    let m = module(ShaderKind::Vertex, vec![Instr::DclTemps { count: 3 }, alu, Instr::Ret]);
    let out = recompile(&m, &RootSignatureDesc::default(), RecompilerConfig::default()).unwrap();
    let bound = out.spirv[3];

    let instrs = body_instrs(&out.spirv);
    let mut max_id = 0u32;
    for i in &instrs {
        // Every instruction with a result lays its result id in operand 0
        // (no result type) or operand 1 (result type then id); over-scanning
        // a few non-id leading operands never under-counts the true max.
        for &w in i.operands.iter().take(2) {
            max_id = max_id.max(w);
        }
    }
    assert!(bound > max_id, "bound {} must exceed every id actually used ({})", bound, max_id);
    assert!(bound - max_id <= 2, "bound should sit right above the highest used id, not leave large gaps");
}

#[test]
fn type_deduplication_collapses_repeated_requests() {
    let alu = Instr::Alu {
        op: AluOp::Add,
        dst: DstOperand::register(RegisterKind::Temp, 0, WriteMask::XYZW),
        srcs: vec![SrcOperand::register(RegisterKind::Temp, 1), SrcOperand::register(RegisterKind::Temp, 2)],
        sat: false,
    };
    let mov = Instr::Mov {
        dst: DstOperand::register(RegisterKind::Temp, 0, WriteMask::XYZW),
        src: SrcOperand::register(RegisterKind::Temp, 1),
    };
    let m = module(ShaderKind::Vertex, vec![Instr::DclTemps { count: 3 }, mov, alu, Instr::Ret]);
    let out = recompile(&m, &RootSignatureDesc::default(), RecompilerConfig::default()).unwrap();
    let instrs = body_instrs(&out.spirv);

    assert_eq!(count_opcode(&instrs, Op::TypeFloat), 1);
    assert_eq!(count_opcode(&instrs, Op::TypeVector), 1);
    assert_eq!(count_opcode(&instrs, Op::TypeVoid), 1);
}

#[test]
fn zero_sized_shader_is_rejected() {
    let m = module(ShaderKind::Vertex, vec![]);
    let err = recompile(&m, &RootSignatureDesc::default(), RecompilerConfig::default()).unwrap_err();
    assert!(matches!(err, dxbc_spirv::Error::InvalidArgument(_)));
}
