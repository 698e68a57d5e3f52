//! `dxbc-spirv`: recompiles DXBC shader bytecode into SPIR-V modules for a
//! D3D12-on-Vulkan translation layer, resolving a host root signature into a
//! descriptor-set binding layout along the way (`spec.md` §1).
//!
//! [`recompile`] is the public entry point. A host builds a
//! [`dxbc::ShaderModule`] and a [`root_signature::RootSignatureDesc`] from
//! its own DXBC/root-signature parsing (that tokenization step is an
//! external collaborator, `spec.md` §1) and hands both to this crate.
mod binding;
mod cache;
mod compiler;
mod config;
mod control_flow;
mod decl;
pub mod dxbc;
mod entry_point;
mod expr;
pub mod error;
pub mod reflect;
pub mod root_signature;
mod scanner;
mod symbol;
mod ty;
mod writer;

pub use binding::BindingLayout;
pub use compiler::Recompiler;
pub use config::RecompilerConfig;
pub use error::{Error, Result};
pub use reflect::ReflectionOutput;
pub use scanner::ScanReport;

use dxbc::{Instr, ShaderModule};

/// Everything [`recompile`] hands back: the assembled module as
/// little-endian 32-bit words (ready for `vkCreateShaderModule`) plus the
/// reflection data the caller needs to finish wiring descriptor bindings
/// (`spec.md` §6).
#[derive(Clone, Debug)]
pub struct RecompileOutput {
    pub spirv: Vec<u32>,
    pub reflection: ReflectionOutput,
}

/// Recompiles one DXBC shader into one SPIR-V module (`spec.md` §1, §5).
///
/// Builds a fresh [`BindingLayout`] from `root_signature` for this call. A
/// host recompiling many entry points against the same root signature
/// should build the layout once with [`BindingLayout::build`] and call
/// [`recompile_with_layout`] instead, per `spec.md` §5's lifecycle rule that
/// a binding layout survives across recompiles that share a root signature.
pub fn recompile(
    module: &ShaderModule,
    root_signature: &root_signature::RootSignatureDesc,
    config: RecompilerConfig,
) -> error::Result<RecompileOutput> {
    module.validate()?;
    let scan = scanner::scan(module)?;
    let layout = BindingLayout::build(root_signature, &config, scan.uses_image_fetch)?;
    recompile_with_layout(module, &layout, scan, config)
}

/// As [`recompile`], but reusing an already-built [`BindingLayout`] and its
/// matching [`ScanReport`] (`spec.md` §5).
pub fn recompile_with_layout(
    module: &ShaderModule,
    layout: &BindingLayout,
    scan: scanner::ScanReport,
    config: RecompilerConfig,
) -> error::Result<RecompileOutput> {
    let mut rc = Recompiler::new(config, layout, scan, module.kind)?;

    // Declarations always precede the executable instruction stream in
    // DXBC; a single filtered pass resolves every register the body could
    // reference before any expression/control-flow emission runs.
    for instr in &module.instrs {
        emit_declaration(&mut rc, instr)?;
    }

    let epilog_id = rc.begin_function()?;

    for instr in &module.instrs {
        if is_declaration(instr) {
            continue;
        }
        emit_body(&mut rc, instr, epilog_id)?;
    }

    let reflection = rc.reflection();
    let spirv = rc.finalize("main")?;
    Ok(RecompileOutput { spirv, reflection })
}

fn is_declaration(instr: &Instr) -> bool {
    matches!(
        instr,
        Instr::DclGlobalFlags { .. }
            | Instr::DclTemps { .. }
            | Instr::DclThreadGroup { .. }
            | Instr::DclConstantBuffer { .. }
            | Instr::DclImmediateConstantBuffer { .. }
            | Instr::DclSampler { .. }
            | Instr::DclResource { .. }
            | Instr::DclUav { .. }
            | Instr::DclInput { .. }
            | Instr::DclInputSv { .. }
            | Instr::DclOutput { .. }
            | Instr::DclOutputSv { .. }
    )
}

fn emit_declaration(rc: &mut Recompiler, instr: &Instr) -> error::Result<()> {
    match instr {
        Instr::DclGlobalFlags { flags } => {
            rc.decl_global_flags(*flags);
            Ok(())
        }
        Instr::DclTemps { count } => rc.decl_temps(*count),
        Instr::DclThreadGroup { x, y, z } => rc.decl_thread_group(*x, *y, *z),
        Instr::DclConstantBuffer { reg, space, size_vec4 } => rc.decl_constant_buffer(*reg, *space, *size_vec4),
        Instr::DclImmediateConstantBuffer { data } => rc.decl_immediate_constant_buffer(data),
        Instr::DclSampler { reg, space } => rc.decl_sampler(*reg, *space),
        Instr::DclResource { reg, space, dim, sampled_kind, .. } => rc.decl_resource(*reg, *space, *dim, *sampled_kind),
        Instr::DclUav { reg, space, dim, sampled_kind, has_counter, .. } => {
            rc.decl_uav(*reg, *space, *dim, *sampled_kind, *has_counter)
        }
        Instr::DclInput { reg, mask } => rc.decl_input(*reg, *mask),
        Instr::DclInputSv { reg, mask, sysval } => rc.decl_input_sv(*reg, *mask, *sysval),
        Instr::DclOutput { reg, mask } => rc.decl_output(*reg, *mask),
        Instr::DclOutputSv { reg, mask, sysval } => rc.decl_output_sv(*reg, *mask, *sysval),
        _ => Ok(()),
    }
}

fn emit_body(rc: &mut Recompiler, instr: &Instr, epilog_id: Option<u32>) -> error::Result<()> {
    match instr {
        Instr::Mov { dst, src } => rc.emit_mov(dst, src),
        Instr::MovC { dst, cond, a, b } => rc.emit_movc(dst, cond, a, b),
        Instr::SwapC { dst0, dst1, cond, a, b } => rc.emit_swapc(dst0, dst1, cond, a, b),
        Instr::Alu { op, dst, srcs, sat } => rc.emit_alu(*op, dst, srcs, *sat),
        Instr::Dot { op, dst, a, b, sat } => rc.emit_dot(*op, dst, a, b, *sat),
        Instr::Bitfield { op, dst, srcs } => rc.emit_bitfield(*op, dst, srcs),
        Instr::HalfPack { op, dst, src } => rc.emit_half_pack(*op, dst, src),
        Instr::Udiv { quotient, remainder, a, b } => rc.emit_udiv(quotient, remainder, a, b),
        Instr::Umod { dst, a, b } => rc.emit_umod(dst, a, b),
        Instr::Sample { dst, coord, resource, sampler, offset } => {
            if offset.is_some() {
                crate::error::bail!(Unsupported, "texel offsets on sample instructions are not supported");
            }
            rc.emit_sample(dst, coord, resource, sampler)
        }
        Instr::Ld { dst, coord, resource } => rc.emit_ld(dst, coord, resource),
        Instr::StoreUavTyped { uav, coord, value } => rc.emit_store_uav_typed(uav, coord, value),
        Instr::ResInfo { dst, mip_level, resource } => rc.emit_resinfo(dst, mip_level, resource),
        Instr::SampleInfo { dst, resource } => rc.emit_sampleinfo(dst, resource),
        Instr::IfNz { cond } => {
            let cond_bool = rc.read_bool_cond(cond, false)?;
            rc.begin_if(cond_bool)
        }
        Instr::IfZ { cond } => {
            let cond_bool = rc.read_bool_cond(cond, true)?;
            rc.begin_if(cond_bool)
        }
        Instr::Else => rc.begin_else(),
        Instr::EndIf => rc.end_if(),
        Instr::Loop => rc.begin_loop(),
        Instr::EndLoop => rc.end_loop(),
        Instr::Break => rc.emit_break(),
        Instr::BreakCNz { cond } => {
            let cond_bool = rc.read_bool_cond(cond, false)?;
            rc.emit_breakc(cond_bool)
        }
        Instr::BreakCZ { cond } => {
            let cond_bool = rc.read_bool_cond(cond, true)?;
            rc.emit_breakc(cond_bool)
        }
        Instr::Discard { cond, invert } => {
            let cond_bool = match cond {
                Some(c) => Some(rc.read_bool_cond(c, *invert)?),
                None => None,
            };
            rc.emit_discard(cond_bool)
        }
        Instr::Ret => rc.emit_ret(epilog_id.map(|id| (id, Vec::new()))),
        _ => unreachable!("declaration instruction reached body dispatch"),
    }
}
