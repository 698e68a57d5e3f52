//! Entry-Point Synthesizer (component I, `spec.md` §4.I). Wraps the DXBC
//! instruction stream's straight-line translation (already emitted by
//! declaration/expression/control-flow emission into `function_body`) in a
//! real SPIR-V `main`, and — when any input or output needed a staging
//! variable because its natural type differs from the canonical
//! 4-component `f32` register — synthesizes the copy that bridges them.
//!
//! Ordering is what makes this component tricky rather than mechanical:
//! every `dcl_input_sv`/`dcl_output_sv`/`dcl_output` runs during
//! declaration processing, before `main`'s entry block even exists, so
//! their copies are queued (`Recompiler::input_prologue_copies`) and run
//! once `begin_function` opens the entry block. A directly-addressed
//! special register (`vThreadID`, ...) is first touched from inside the
//! body itself, where the entry block is already open — `expr.rs`'s
//! `ensure_special_register` calls `emit_prologue_copy` immediately rather
//! than queuing, so its copy lands in program order before its first read.
use spirv::{Capability, Decoration, ExecutionModel, Op, StorageClass};

use crate::compiler::{PrologueCopy, Recompiler};
use crate::dxbc::ShaderKind;
use crate::error::{bail, Result};
use crate::symbol::IoVariable;
use crate::ty::ScalarKind;
use crate::writer::{ModuleWriter, Stream, StreamSel};

fn exec_model(kind: ShaderKind) -> ExecutionModel {
    match kind {
        ShaderKind::Vertex => ExecutionModel::Vertex,
        ShaderKind::Fragment => ExecutionModel::Fragment,
        ShaderKind::TessControl => ExecutionModel::TessellationControl,
        ShaderKind::TessEval => ExecutionModel::TessellationEvaluation,
        ShaderKind::Geometry => ExecutionModel::Geometry,
        ShaderKind::Compute => ExecutionModel::GLCompute,
    }
}

impl<'a> Recompiler<'a> {
    /// Opens `main`: mints the `setup_output` epilog function (if the
    /// shader has any output register to pack), emits `main`'s `OpFunction`
    /// + entry `OpLabel`, then drains and runs every prologue copy queued
    /// by declaration processing. Returns the epilog function's id, which
    /// the caller threads into every `Ret` instruction's `emit_ret` call.
    pub fn begin_function(&mut self) -> Result<Option<u32>> {
        let epilog_id = self.build_setup_output()?;

        let void_ty = self.void_ty;
        let func_ty = self.cache.get_function_type(&mut self.writer, void_ty, &[])?;
        let main_id = self.main_id;
        self.writer.emit_op_raw(StreamSel::FunctionBody, Op::Function, &[void_ty, main_id, 0, func_ty])?;
        let entry_label = self.writer.alloc_id();
        self.writer.emit_op_raw(StreamSel::FunctionBody, Op::Label, &[entry_label])?;

        for copy in std::mem::take(&mut self.input_prologue_copies) {
            self.emit_prologue_copy(copy)?;
        }
        Ok(epilog_id)
    }

    /// Bridges one builtin/special-register input into its `vec4<f32>`
    /// staging variable (`spec.md` §4.I): load the natural-typed value,
    /// bitcast it component-wise to `f32`, zero-fill the unused lanes, and
    /// store the result into the canonical register.
    pub(crate) fn emit_prologue_copy(&mut self, copy: PrologueCopy) -> Result<()> {
        let (real_var, staging_var, scalar, width) = match copy {
            PrologueCopy::Builtin { real_var, staging_var, scalar, width } => (real_var, staging_var, scalar, width),
            PrologueCopy::ClipCullArray { array_var, offset, count, staging_var } => {
                return self.emit_clip_cull_prologue_copy(array_var, offset, count, staging_var);
            }
        };
        let scalar_ty = self.cache.get_scalar(&mut self.writer, scalar)?;
        let pointee_ty = if width == 1 { scalar_ty } else { self.cache.get_vector(&mut self.writer, scalar_ty, width)? };
        let loaded = self.writer.emit_tr(StreamSel::FunctionBody, Op::Load, pointee_ty, &[real_var])?;

        let f32_ty = self.f32_ty;
        let converted = if matches!(scalar, ScalarKind::F32) {
            loaded
        } else {
            let bitcast_ty = if width == 1 { f32_ty } else { self.cache.get_vector(&mut self.writer, f32_ty, width)? };
            self.writer.emit_tr(StreamSel::FunctionBody, Op::Bitcast, bitcast_ty, &[loaded])?
        };

        let vec4_value = match width {
            4 => converted,
            1 => {
                let zero = self.cache.get_constant(&mut self.writer, f32_ty, 0)?;
                self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeConstruct, self.vec4_f32_ty, &[converted, zero, zero, zero])?
            }
            3 => {
                let zero = self.cache.get_constant(&mut self.writer, f32_ty, 0)?;
                self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeConstruct, self.vec4_f32_ty, &[converted, zero])?
            }
            _ => bail!(MalformedBytecode, "builtin of width {} has no canonical-register mapping", width),
        };
        self.writer.emit_op_raw(StreamSel::FunctionBody, Op::Store, &[staging_var, vec4_value])?;
        Ok(())
    }

    /// Bridges one register's sub-range of the shared `ClipDistance`/
    /// `CullDistance` array into its `vec4<f32>` staging variable
    /// (`SPEC_FULL.md` §9): `count` scalar loads through individual
    /// `AccessChain`s, zero-filled to width 4.
    fn emit_clip_cull_prologue_copy(&mut self, array_var: u32, offset: u32, count: u32, staging_var: u32) -> Result<()> {
        let f32_ty = self.f32_ty;
        let u32_ty = self.u32_ty;
        let elem_ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::Input, f32_ty)?;
        let zero = self.cache.get_constant(&mut self.writer, f32_ty, 0)?;
        let mut lanes = [zero; 4];
        for lane in 0..count.min(4) {
            let idx_const = self.cache.get_constant(&mut self.writer, u32_ty, offset + lane)?;
            let elem_ptr = self.writer.emit_tr(StreamSel::FunctionBody, Op::AccessChain, elem_ptr_ty, &[array_var, idx_const])?;
            lanes[lane as usize] = self.writer.emit_tr(StreamSel::FunctionBody, Op::Load, f32_ty, &[elem_ptr])?;
        }
        let vec4_value = self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeConstruct, self.vec4_f32_ty, &lanes)?;
        self.writer.emit_op_raw(StreamSel::FunctionBody, Op::Store, &[staging_var, vec4_value])?;
        Ok(())
    }

    /// Mints the `setup_output` function that the last `Ret` of the shader
    /// calls before returning: packs every staged output register's
    /// canonical `vec4<f32>` value back into a real `Output`/builtin
    /// variable, narrowing to the semantic's natural type (`spec.md` §4.I).
    /// Iterates registers in index order so the emitted module is
    /// deterministic across runs.
    fn build_setup_output(&mut self) -> Result<Option<u32>> {
        let mut outs: Vec<(u32, IoVariable)> = self.symtab.outputs().map(|(r, v)| (*r, *v)).collect();
        if outs.is_empty() {
            return Ok(None);
        }
        outs.sort_by_key(|(reg, _)| *reg);

        let void_ty = self.void_ty;
        let func_ty = self.cache.get_function_type(&mut self.writer, void_ty, &[])?;
        let epilog_id = self.writer.alloc_id();
        self.writer.emit_op_raw(StreamSel::FunctionBody, Op::Function, &[void_ty, epilog_id, 0, func_ty])?;
        let label = self.writer.alloc_id();
        self.writer.emit_op_raw(StreamSel::FunctionBody, Op::Label, &[label])?;

        for (reg, io) in outs {
            self.pack_one_output(reg, &io)?;
        }

        self.writer.emit_op_raw(StreamSel::FunctionBody, Op::Return, &[])?;
        self.writer.emit_op_raw(StreamSel::FunctionBody, Op::FunctionEnd, &[])?;
        Ok(Some(epilog_id))
    }

    fn pack_one_output(&mut self, reg: u32, io: &IoVariable) -> Result<()> {
        if let Some(offset) = io.array_offset {
            return self.pack_clip_cull_output(io, offset);
        }

        let loaded = self.writer.emit_tr(StreamSel::FunctionBody, Op::Load, self.vec4_f32_ty, &[io.physical_id])?;

        if matches!(io.sysval, crate::dxbc::SysValueSemantic::None) {
            let ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::Output, self.vec4_f32_ty)?;
            let real_var = self.writer.emit_tr(StreamSel::Globals, Op::Variable, ptr_ty, &[StorageClass::Output as u32])?;
            self.cache.decorate(&mut self.writer, real_var, Decoration::Location, &[reg])?;
            self.interface_ids.push(real_var);
            self.writer.emit_op_raw(StreamSel::FunctionBody, Op::Store, &[real_var, loaded])?;
            return Ok(());
        }

        let (builtin, width, scalar) = self.sysval_builtin(io.sysval, false)?;
        let scalar_ty = self.cache.get_scalar(&mut self.writer, scalar)?;
        let natural_ty = if width == 1 { scalar_ty } else { self.cache.get_vector(&mut self.writer, scalar_ty, width)? };
        let ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::Output, natural_ty)?;
        let real_var = self.writer.emit_tr(StreamSel::Globals, Op::Variable, ptr_ty, &[StorageClass::Output as u32])?;
        self.cache.decorate(&mut self.writer, real_var, Decoration::BuiltIn, &[builtin as u32])?;
        self.interface_ids.push(real_var);

        let narrowed = match width {
            4 => loaded,
            1 => {
                let c0 = self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeExtract, self.f32_ty, &[loaded, 0])?;
                if matches!(scalar, ScalarKind::F32) {
                    c0
                } else {
                    self.writer.emit_tr(StreamSel::FunctionBody, Op::Bitcast, scalar_ty, &[c0])?
                }
            }
            3 => {
                let c0 = self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeExtract, self.f32_ty, &[loaded, 0])?;
                let c1 = self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeExtract, self.f32_ty, &[loaded, 1])?;
                let c2 = self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeExtract, self.f32_ty, &[loaded, 2])?;
                let vec3_f32_ty = self.cache.get_vector(&mut self.writer, self.f32_ty, 3)?;
                let v3 = self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeConstruct, vec3_f32_ty, &[c0, c1, c2])?;
                if matches!(scalar, ScalarKind::F32) {
                    v3
                } else {
                    self.writer.emit_tr(StreamSel::FunctionBody, Op::Bitcast, natural_ty, &[v3])?
                }
            }
            _ => bail!(MalformedBytecode, "output builtin of width {} has no canonical-register mapping", width),
        };
        self.writer.emit_op_raw(StreamSel::FunctionBody, Op::Store, &[real_var, narrowed])?;
        Ok(())
    }

    /// Packs one register's sub-range of the shared `ClipDistance`/
    /// `CullDistance` output array (`SPEC_FULL.md` §9): extracts each written
    /// lane from the canonical `vec4<f32>` and stores it through its own
    /// `AccessChain` into the array at `offset + lane`.
    fn pack_clip_cull_output(&mut self, io: &IoVariable, offset: u32) -> Result<()> {
        let array_var = match io.sysval {
            crate::dxbc::SysValueSemantic::ClipDistance => self
                .clip_cull
                .out_clip_var
                .ok_or_else(|| crate::error::Error::MalformedBytecode("clip-distance output packed before its array was minted".to_owned()))?,
            crate::dxbc::SysValueSemantic::CullDistance => self
                .clip_cull
                .out_cull_var
                .ok_or_else(|| crate::error::Error::MalformedBytecode("cull-distance output packed before its array was minted".to_owned()))?,
            _ => bail!(MalformedBytecode, "non clip/cull sysval carries an array offset"),
        };

        let loaded = self.writer.emit_tr(StreamSel::FunctionBody, Op::Load, self.vec4_f32_ty, &[io.physical_id])?;
        let f32_ty = self.f32_ty;
        let u32_ty = self.u32_ty;
        let elem_ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::Output, f32_ty)?;
        let count = io.write_mask.popcount();
        for lane in 0..count.min(4) {
            let c = self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeExtract, f32_ty, &[loaded, lane])?;
            let idx_const = self.cache.get_constant(&mut self.writer, u32_ty, offset + lane)?;
            let elem_ptr = self.writer.emit_tr(StreamSel::FunctionBody, Op::AccessChain, elem_ptr_ty, &[array_var, idx_const])?;
            self.writer.emit_op_raw(StreamSel::FunctionBody, Op::Store, &[elem_ptr, c])?;
        }
        Ok(())
    }

    /// Closes `main` (`OpFunctionEnd`) and assembles the final module:
    /// execution model/capabilities from `self.kind`, `ExecutionMode
    /// LocalSize` for compute, then `ModuleWriter::assemble`.
    pub fn finalize(&mut self, entry_name: &str) -> Result<Vec<u32>> {
        self.writer.emit_op_raw(StreamSel::FunctionBody, Op::FunctionEnd, &[])?;
        if self.config.debug_names {
            let main_id = self.main_id;
            self.writer.emit_name(main_id, entry_name)?;
        }

        self.writer.enable_capability(Capability::Shader);
        match self.kind {
            ShaderKind::TessControl | ShaderKind::TessEval => self.writer.enable_capability(Capability::Tessellation),
            ShaderKind::Geometry => self.writer.enable_capability(Capability::Geometry),
            _ => {}
        }

        let mut exec_modes = Stream::default();
        match self.kind {
            ShaderKind::Fragment => {
                ModuleWriter::emit_op(&mut exec_modes, Op::ExecutionMode, &[self.main_id, spirv::ExecutionMode::OriginUpperLeft as u32])?;
            }
            ShaderKind::Compute => {
                let (x, y, z) = self
                    .thread_group_size
                    .ok_or_else(|| crate::error::Error::MalformedBytecode("compute shader missing a thread-group size declaration".to_owned()))?;
                ModuleWriter::emit_op(
                    &mut exec_modes,
                    Op::ExecutionMode,
                    &[self.main_id, spirv::ExecutionMode::LocalSize as u32, x, y, z],
                )?;
            }
            _ => {}
        }

        self.writer.assemble(
            entry_name,
            exec_model(self.kind),
            self.main_id,
            &self.interface_ids,
            &exec_modes,
            self.config.target_spirv_version,
        )
    }
}
