//! Declaration Emitter (component F, `spec.md` §4.F). One method per DXBC
//! declaration opcode, run once each before the expression/control-flow
//! emitters see any ALU instruction. Grounded on the teacher's
//! `reflect/mod.rs` resource-table walk, generalized from "read an existing
//! `OpVariable`'s metadata" to "mint one".
use spirv::{BuiltIn, Capability, Decoration, Op, StorageClass};

use crate::binding::DescriptorKind;
use crate::compiler::{CounterBinding, PrologueCopy, Recompiler};
use crate::dxbc::{ComponentType, ResourceDim, ShaderKind, SysValueSemantic, WriteMask};
use crate::error::{bail, Error, Result};
use crate::symbol::{ConstBufferVariable, IoVariable, ResourceVariable, SamplerVariable};
use crate::ty::{DimKey, ImageFormatKey, ImageShape, ScalarKind};
use crate::writer::StreamSel;

fn component_scalar(t: ComponentType) -> ScalarKind {
    match t {
        ComponentType::Float => ScalarKind::F32,
        ComponentType::Int => ScalarKind::I32,
        ComponentType::Uint => ScalarKind::U32,
    }
}

/// Fixed resource-kind table (`spec.md` §4.F): dimension, array-ness,
/// multisample-ness, and the number of coordinate components a `sample`/`ld`
/// instruction addresses it with.
fn resource_shape(dim: ResourceDim) -> (DimKey, bool, bool, u32) {
    use ResourceDim::*;
    match dim {
        Buffer => (DimKey::Buffer, false, false, 1),
        Texture1D => (DimKey::Dim1D, false, false, 1),
        Texture1DArray => (DimKey::Dim1D, true, false, 2),
        Texture2D => (DimKey::Dim2D, false, false, 2),
        Texture2DArray => (DimKey::Dim2D, true, false, 3),
        Texture2DMs => (DimKey::Dim2D, false, true, 2),
        Texture2DMsArray => (DimKey::Dim2D, true, true, 3),
        Texture3D => (DimKey::Dim3D, false, false, 3),
        TextureCube => (DimKey::Cube, false, false, 3),
        TextureCubeArray => (DimKey::Cube, true, false, 4),
    }
}

fn mask_for_count(n: u32) -> WriteMask {
    match n {
        1 => WriteMask::X,
        2 => WriteMask::X | WriteMask::Y,
        3 => WriteMask::X | WriteMask::Y | WriteMask::Z,
        _ => WriteMask::XYZW,
    }
}

impl<'a> Recompiler<'a> {
    /// Emits `OpName` for `id` when `config.debug_names` is set
    /// (`SPEC_FULL.md` §6); a no-op otherwise.
    fn maybe_name(&mut self, id: u32, name: &str) -> Result<()> {
        if self.config.debug_names {
            self.writer.emit_name(id, name)?;
        }
        Ok(())
    }

    pub fn decl_global_flags(&mut self, flags: u32) {
        // `spec.md` §4.F: no construct in the target IR corresponds to this
        // bitmask (refactoring-allowed, early-depth-stencil, ...); it is
        // tolerated and logged rather than rejected.
        log::warn!("ignoring global flags bitmask {:#x}: no IR effect", flags);
    }

    pub fn decl_thread_group(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        if self.kind != ShaderKind::Compute {
            bail!(MalformedBytecode, "thread-group size declared on a non-compute shader");
        }
        self.thread_group_size = Some((x, y, z));
        Ok(())
    }

    pub fn decl_temps(&mut self, count: u32) -> Result<()> {
        if count == 0 {
            self.symtab.declare_temps(0, 0);
            return Ok(());
        }
        let ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::Private, self.vec4_f32_ty)?;
        let mut base = None;
        for i in 0..count {
            let var = self.writer.emit_tr(StreamSel::Globals, Op::Variable, ptr_ty, &[StorageClass::Private as u32])?;
            self.maybe_name(var, &format!("r{}", i))?;
            base.get_or_insert(var);
        }
        self.symtab.declare_temps(base.unwrap(), count);
        Ok(())
    }

    pub fn decl_immediate_constant_buffer(&mut self, data: &[[u32; 4]]) -> Result<()> {
        let u32_ty = self.u32_ty;
        let vec4_u32_ty = self.cache.get_vector(&mut self.writer, u32_ty, 4)?;
        let mut elems = Vec::with_capacity(data.len());
        for quad in data {
            let mut cs = [0u32; 4];
            for (i, w) in quad.iter().enumerate() {
                cs[i] = self.cache.get_constant(&mut self.writer, u32_ty, *w)?;
            }
            elems.push(self.cache.get_constant_composite(&mut self.writer, vec4_u32_ty, &cs)?);
        }
        let len_const = self.cache.get_constant(&mut self.writer, u32_ty, data.len() as u32)?;
        let array_ty = self.cache.get_array(&mut self.writer, vec4_u32_ty, len_const)?;
        let composite = self.cache.get_constant_composite(&mut self.writer, array_ty, &elems)?;
        let ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::Private, array_ty)?;
        let var = self.writer.emit_tr(
            StreamSel::Globals,
            Op::Variable,
            ptr_ty,
            &[StorageClass::Private as u32, composite],
        )?;
        self.maybe_name(var, "icb")?;
        self.symtab.set_icb(var);
        Ok(())
    }

    /// Lazily mints the single `PushConstant`-class struct backing every
    /// `cb#` register the Binding Layout routed into `push_constants`
    /// (`spec.md` §4.D rule 3 / §4.F). Sized once from the binding layout's
    /// already-computed total, independent of instruction-stream order.
    fn ensure_push_constant_block(&mut self) -> Result<u32> {
        if let Some(v) = self.push_const_var {
            return Ok(v);
        }
        let total_bytes: u32 = self.binding_layout.push_constants.iter().map(|r| r.byte_size).sum();
        let words = (total_bytes / 4).max(1);
        let u32_ty = self.u32_ty;
        let len_const = self.cache.get_constant(&mut self.writer, u32_ty, words)?;
        let array_ty = self.cache.get_array(&mut self.writer, u32_ty, len_const)?;
        let struct_ty = self.cache.get_struct(&mut self.writer, &[array_ty])?;
        self.cache.decorate(&mut self.writer, array_ty, Decoration::ArrayStride, &[4])?;
        self.cache.decorate(&mut self.writer, struct_ty, Decoration::Block, &[])?;
        self.cache.member_decorate(&mut self.writer, struct_ty, 0, Decoration::Offset, &[0])?;
        let ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::PushConstant, struct_ty)?;
        let var = self.writer.emit_tr(StreamSel::Globals, Op::Variable, ptr_ty, &[StorageClass::PushConstant as u32])?;
        self.maybe_name(var, "push_constants")?;
        self.push_const_var = Some(var);
        self.push_const_words = words;
        Ok(var)
    }

    pub fn decl_constant_buffer(&mut self, reg: u32, space: u32, size_vec4: u32) -> Result<()> {
        if let Some(rc) = self.binding_layout.root_constants.iter().find(|rc| rc.register_index == reg).cloned() {
            if size_vec4 * 16 != rc.byte_size {
                bail!(
                    LayoutMismatch,
                    "cb{} declares {} vec4s ({} bytes) but the root signature's 32-bit constants total {} bytes",
                    reg,
                    size_vec4,
                    size_vec4 * 16,
                    rc.byte_size
                );
            }
            let var = self.ensure_push_constant_block()?;
            self.symtab.insert_cbuffer(reg, ConstBufferVariable {
                var_id: var,
                storage_class: StorageClass::PushConstant,
                is_push_constant: true,
                member_index: rc.byte_offset / 4,
            });
            return Ok(());
        }

        let entry = self
            .binding_layout
            .find(DescriptorKind::Cbv, space, reg, true)
            .ok_or_else(|| Error::LayoutMismatch(format!("cb{} has no binding-layout entry", reg)))?
            .clone();

        let vec4_ty = self.vec4_f32_ty;
        let u32_ty = self.u32_ty;
        let len_const = self.cache.get_constant(&mut self.writer, u32_ty, size_vec4)?;
        let array_ty = self.cache.get_array(&mut self.writer, vec4_ty, len_const)?;
        let struct_ty = self.cache.get_struct(&mut self.writer, &[array_ty])?;
        self.cache.decorate(&mut self.writer, array_ty, Decoration::ArrayStride, &[16])?;
        self.cache.decorate(&mut self.writer, struct_ty, Decoration::Block, &[])?;
        self.cache.member_decorate(&mut self.writer, struct_ty, 0, Decoration::Offset, &[0])?;
        let ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::Uniform, struct_ty)?;
        let var = self.writer.emit_tr(StreamSel::Globals, Op::Variable, ptr_ty, &[StorageClass::Uniform as u32])?;
        self.maybe_name(var, &format!("cb{}", reg))?;
        self.cache.decorate(&mut self.writer, var, Decoration::DescriptorSet, &[entry.loc.set])?;
        self.cache.decorate(&mut self.writer, var, Decoration::Binding, &[entry.loc.binding])?;

        self.symtab.insert_cbuffer(reg, ConstBufferVariable {
            var_id: var,
            storage_class: StorageClass::Uniform,
            is_push_constant: false,
            member_index: 0,
        });
        Ok(())
    }

    pub fn decl_sampler(&mut self, reg: u32, space: u32) -> Result<()> {
        let sampler_ty = self.cache.get_sampler(&mut self.writer)?;
        let ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::UniformConstant, sampler_ty)?;
        let var = self.writer.emit_tr(StreamSel::Globals, Op::Variable, ptr_ty, &[StorageClass::UniformConstant as u32])?;
        self.maybe_name(var, &format!("s{}", reg))?;

        let loc = if let Some(s) = self
            .binding_layout
            .static_samplers
            .iter()
            .find(|s| s.register_index == reg && s.register_space == space)
        {
            s.loc
        } else if let Some(b) = self.binding_layout.find(DescriptorKind::Sampler, space, reg, true) {
            b.loc
        } else {
            bail!(LayoutMismatch, "sampler s{} has no binding-layout entry", reg);
        };
        self.cache.decorate(&mut self.writer, var, Decoration::DescriptorSet, &[loc.set])?;
        self.cache.decorate(&mut self.writer, var, Decoration::Binding, &[loc.binding])?;

        self.symtab.insert_sampler(reg, SamplerVariable { var_id: var });
        Ok(())
    }

    pub fn decl_resource(&mut self, reg: u32, space: u32, dim: ResourceDim, sampled_kind: ComponentType) -> Result<()> {
        let (dim_key, arrayed, multisampled, ncomp) = resource_shape(dim);
        let scalar = component_scalar(sampled_kind);
        let sampled_ty = self.cache.get_scalar(&mut self.writer, scalar)?;
        let shape = ImageShape { dim: dim_key, depth: false, arrayed, multisampled, sampled: 1, format: ImageFormatKey::Unknown };
        let image_ty = self.cache.get_image(&mut self.writer, sampled_ty, shape)?;
        let ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::UniformConstant, image_ty)?;
        let var = self.writer.emit_tr(StreamSel::Globals, Op::Variable, ptr_ty, &[StorageClass::UniformConstant as u32])?;
        self.maybe_name(var, &format!("t{}", reg))?;

        let is_buffer_view = matches!(dim, ResourceDim::Buffer);
        let entry = self
            .binding_layout
            .find(DescriptorKind::Srv, space, reg, is_buffer_view)
            .ok_or_else(|| Error::LayoutMismatch(format!("t{} has no binding-layout entry", reg)))?
            .clone();
        self.cache.decorate(&mut self.writer, var, Decoration::DescriptorSet, &[entry.loc.set])?;
        self.cache.decorate(&mut self.writer, var, Decoration::Binding, &[entry.loc.binding])?;
        if is_buffer_view {
            self.writer.enable_capability(Capability::SampledBuffer);
        }

        self.symtab.insert_resource(reg, ResourceVariable {
            var_id: var,
            sampled_scalar_kind: scalar,
            image_type_id: image_ty,
            coordinate_component_mask: mask_for_count(ncomp),
            is_storage_image: false,
        });
        Ok(())
    }

    pub fn decl_uav(
        &mut self,
        reg: u32,
        space: u32,
        dim: ResourceDim,
        sampled_kind: ComponentType,
        has_counter: bool,
    ) -> Result<()> {
        let (dim_key, arrayed, multisampled, ncomp) = resource_shape(dim);
        let scalar = component_scalar(sampled_kind);
        let sampled_ty = self.cache.get_scalar(&mut self.writer, scalar)?;
        let shape = ImageShape { dim: dim_key, depth: false, arrayed, multisampled, sampled: 2, format: ImageFormatKey::Unknown };
        let image_ty = self.cache.get_image(&mut self.writer, sampled_ty, shape)?;
        let ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::UniformConstant, image_ty)?;
        let var = self.writer.emit_tr(StreamSel::Globals, Op::Variable, ptr_ty, &[StorageClass::UniformConstant as u32])?;
        self.maybe_name(var, &format!("u{}", reg))?;

        let is_buffer_view = matches!(dim, ResourceDim::Buffer);
        let entry = self
            .binding_layout
            .find(DescriptorKind::Uav, space, reg, is_buffer_view)
            .ok_or_else(|| Error::LayoutMismatch(format!("u{} has no binding-layout entry", reg)))?
            .clone();
        self.cache.decorate(&mut self.writer, var, Decoration::DescriptorSet, &[entry.loc.set])?;
        self.cache.decorate(&mut self.writer, var, Decoration::Binding, &[entry.loc.binding])?;
        self.writer.enable_capability(Capability::StorageImageWriteWithoutFormat);
        if is_buffer_view {
            self.writer.enable_capability(Capability::ImageBuffer);
        }

        if has_counter {
            if let Some(c) = self.binding_layout.find_uav_counter(space, reg) {
                self.counter_bindings.push(CounterBinding { register_index: reg, set: c.loc.set, binding: c.loc.binding });
            }
        }

        self.symtab.insert_uav(reg, ResourceVariable {
            var_id: var,
            sampled_scalar_kind: scalar,
            image_type_id: image_ty,
            coordinate_component_mask: mask_for_count(ncomp),
            is_storage_image: true,
        });
        Ok(())
    }

    pub fn decl_input(&mut self, reg: u32, mask: WriteMask) -> Result<()> {
        let ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::Input, self.vec4_f32_ty)?;
        let var = self.writer.emit_tr(StreamSel::Globals, Op::Variable, ptr_ty, &[StorageClass::Input as u32])?;
        self.cache.decorate(&mut self.writer, var, Decoration::Location, &[reg])?;
        self.maybe_name(var, &format!("v{}", reg))?;
        self.interface_ids.push(var);
        self.symtab.insert_input(reg, IoVariable {
            physical_id: var,
            interface_id: None,
            storage_class: StorageClass::Input,
            sysval: SysValueSemantic::None,
            write_mask: mask,
            array_offset: None,
        });
        Ok(())
    }

    pub fn decl_output(&mut self, reg: u32, mask: WriteMask) -> Result<()> {
        let ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::Private, self.vec4_f32_ty)?;
        let var = self.writer.emit_tr(StreamSel::Globals, Op::Variable, ptr_ty, &[StorageClass::Private as u32])?;
        self.maybe_name(var, &format!("o{}", reg))?;
        self.symtab.insert_output(reg, IoVariable {
            physical_id: var,
            interface_id: None,
            storage_class: StorageClass::Private,
            sysval: SysValueSemantic::None,
            write_mask: mask,
            array_offset: None,
        });
        self.staged_outputs.push(reg);
        Ok(())
    }

    /// Builtin routing table (`spec.md` §4.F sysval table, supplemented with
    /// clip/cull distance per `SPEC_FULL.md` §9). Returns the natural
    /// `(BuiltIn, scalar-or-vector width, scalar kind)` triple; width 4 means
    /// "already the canonical shape, no staging variable needed".
    pub(crate) fn sysval_builtin(&self, sysval: SysValueSemantic, is_input: bool) -> Result<(BuiltIn, u32, ScalarKind)> {
        use SysValueSemantic::*;
        Ok(match sysval {
            Position if is_input && self.kind == ShaderKind::Fragment => (BuiltIn::FragCoord, 4, ScalarKind::F32),
            Position => (BuiltIn::Position, 4, ScalarKind::F32),
            VertexId => (BuiltIn::VertexIndex, 1, ScalarKind::I32),
            InstanceId => (BuiltIn::InstanceIndex, 1, ScalarKind::I32),
            ThreadId => (BuiltIn::GlobalInvocationId, 3, ScalarKind::U32),
            LocalThreadId => (BuiltIn::LocalInvocationId, 3, ScalarKind::U32),
            LocalThreadIndex => (BuiltIn::LocalInvocationIndex, 1, ScalarKind::U32),
            ThreadGroupId => (BuiltIn::WorkgroupId, 3, ScalarKind::U32),
            IsFrontFace => (BuiltIn::FrontFacing, 1, ScalarKind::U32),
            SampleIndex => (BuiltIn::SampleId, 1, ScalarKind::I32),
            ClipDistance | CullDistance => {
                unreachable!("clip/cull distance routes through decl_clip_cull_input/output, not sysval_builtin")
            }
            None => bail!(MalformedBytecode, "system-value declaration with semantic `none`"),
        })
    }

    pub fn decl_input_sv(&mut self, reg: u32, mask: WriteMask, sysval: SysValueSemantic) -> Result<()> {
        if matches!(sysval, SysValueSemantic::ClipDistance | SysValueSemantic::CullDistance) {
            return self.decl_clip_cull_input(reg, mask, sysval);
        }

        let (builtin, width, scalar) = self.sysval_builtin(sysval, true)?;
        let scalar_ty = self.cache.get_scalar(&mut self.writer, scalar)?;
        let natural_ty = if width == 1 {
            scalar_ty
        } else {
            self.cache.get_vector(&mut self.writer, scalar_ty, width)?
        };
        let ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::Input, natural_ty)?;
        let real_var = self.writer.emit_tr(StreamSel::Globals, Op::Variable, ptr_ty, &[StorageClass::Input as u32])?;
        self.cache.decorate(&mut self.writer, real_var, Decoration::BuiltIn, &[builtin as u32])?;
        self.maybe_name(real_var, &format!("{:?}", sysval))?;
        self.interface_ids.push(real_var);

        let (physical_id, interface_id) = if width == 4 && matches!(scalar, ScalarKind::F32) {
            (real_var, None)
        } else {
            let stage_ptr = self.cache.get_pointer(&mut self.writer, StorageClass::Private, self.vec4_f32_ty)?;
            let staging = self.writer.emit_tr(StreamSel::Globals, Op::Variable, stage_ptr, &[StorageClass::Private as u32])?;
            self.input_prologue_copies.push(PrologueCopy::Builtin {
                real_var,
                staging_var: staging,
                scalar,
                width,
            });
            (staging, Some(real_var))
        };

        self.symtab.insert_input(reg, IoVariable {
            physical_id,
            interface_id,
            storage_class: StorageClass::Input,
            sysval,
            write_mask: mask,
            array_offset: None,
        });
        Ok(())
    }

    pub fn decl_output_sv(&mut self, reg: u32, mask: WriteMask, sysval: SysValueSemantic) -> Result<()> {
        if matches!(sysval, SysValueSemantic::ClipDistance | SysValueSemantic::CullDistance) {
            return self.decl_clip_cull_output(reg, mask, sysval);
        }

        let ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::Private, self.vec4_f32_ty)?;
        let var = self.writer.emit_tr(StreamSel::Globals, Op::Variable, ptr_ty, &[StorageClass::Private as u32])?;
        self.symtab.insert_output(reg, IoVariable {
            physical_id: var,
            interface_id: None,
            storage_class: StorageClass::Private,
            sysval,
            write_mask: mask,
            array_offset: None,
        });
        self.staged_outputs.push(reg);
        Ok(())
    }

    /// Lazily mints the single shared `ClipDistance`/`CullDistance` array
    /// variable for one direction, sized from the scanner's pre-pass total
    /// (`SPEC_FULL.md` §9) — SPIR-V allows exactly one such builtin array per
    /// direction per entry point, never one per DXBC register.
    fn ensure_clip_cull_var(&mut self, sysval: SysValueSemantic, is_input: bool) -> Result<u32> {
        let (existing, total, builtin, capability, storage_class) = match (sysval, is_input) {
            (SysValueSemantic::ClipDistance, true) => {
                (self.clip_cull.in_clip_var, self.scan.clip_distance_in_total, BuiltIn::ClipDistance, Capability::ClipDistance, StorageClass::Input)
            }
            (SysValueSemantic::ClipDistance, false) => {
                (self.clip_cull.out_clip_var, self.scan.clip_distance_out_total, BuiltIn::ClipDistance, Capability::ClipDistance, StorageClass::Output)
            }
            (SysValueSemantic::CullDistance, true) => {
                (self.clip_cull.in_cull_var, self.scan.cull_distance_in_total, BuiltIn::CullDistance, Capability::CullDistance, StorageClass::Input)
            }
            (SysValueSemantic::CullDistance, false) => {
                (self.clip_cull.out_cull_var, self.scan.cull_distance_out_total, BuiltIn::CullDistance, Capability::CullDistance, StorageClass::Output)
            }
            _ => unreachable!("ensure_clip_cull_var called with a non-clip/cull semantic"),
        };
        if let Some(v) = existing {
            return Ok(v);
        }

        let f32_ty = self.f32_ty;
        let u32_ty = self.u32_ty;
        let len_const = self.cache.get_constant(&mut self.writer, u32_ty, total.max(1))?;
        let array_ty = self.cache.get_array(&mut self.writer, f32_ty, len_const)?;
        let ptr_ty = self.cache.get_pointer(&mut self.writer, storage_class, array_ty)?;
        let var = self.writer.emit_tr(StreamSel::Globals, Op::Variable, ptr_ty, &[storage_class as u32])?;
        self.cache.decorate(&mut self.writer, var, Decoration::BuiltIn, &[builtin as u32])?;
        self.maybe_name(var, &format!("{:?}", sysval))?;
        self.writer.enable_capability(capability);
        self.interface_ids.push(var);

        match (sysval, is_input) {
            (SysValueSemantic::ClipDistance, true) => self.clip_cull.in_clip_var = Some(var),
            (SysValueSemantic::ClipDistance, false) => self.clip_cull.out_clip_var = Some(var),
            (SysValueSemantic::CullDistance, true) => self.clip_cull.in_cull_var = Some(var),
            (SysValueSemantic::CullDistance, false) => self.clip_cull.out_cull_var = Some(var),
            _ => unreachable!(),
        }
        Ok(var)
    }

    fn next_clip_cull_offset(&mut self, sysval: SysValueSemantic, is_input: bool, count: u32) -> u32 {
        let counter = match (sysval, is_input) {
            (SysValueSemantic::ClipDistance, true) => &mut self.clip_cull.in_clip_next,
            (SysValueSemantic::ClipDistance, false) => &mut self.clip_cull.out_clip_next,
            (SysValueSemantic::CullDistance, true) => &mut self.clip_cull.in_cull_next,
            (SysValueSemantic::CullDistance, false) => &mut self.clip_cull.out_cull_next,
            _ => unreachable!("next_clip_cull_offset called with a non-clip/cull semantic"),
        };
        let offset = *counter;
        *counter += count;
        offset
    }

    fn decl_clip_cull_input(&mut self, reg: u32, mask: WriteMask, sysval: SysValueSemantic) -> Result<()> {
        let count = mask.popcount();
        let array_var = self.ensure_clip_cull_var(sysval, true)?;
        let offset = self.next_clip_cull_offset(sysval, true, count);

        let stage_ptr = self.cache.get_pointer(&mut self.writer, StorageClass::Private, self.vec4_f32_ty)?;
        let staging = self.writer.emit_tr(StreamSel::Globals, Op::Variable, stage_ptr, &[StorageClass::Private as u32])?;
        self.input_prologue_copies.push(PrologueCopy::ClipCullArray { array_var, offset, count, staging_var: staging });

        self.symtab.insert_input(reg, IoVariable {
            physical_id: staging,
            interface_id: Some(array_var),
            storage_class: StorageClass::Input,
            sysval,
            write_mask: mask,
            array_offset: Some(offset),
        });
        Ok(())
    }

    fn decl_clip_cull_output(&mut self, reg: u32, mask: WriteMask, sysval: SysValueSemantic) -> Result<()> {
        let count = mask.popcount();
        self.ensure_clip_cull_var(sysval, false)?;
        let offset = self.next_clip_cull_offset(sysval, false, count);

        let ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::Private, self.vec4_f32_ty)?;
        let var = self.writer.emit_tr(StreamSel::Globals, Op::Variable, ptr_ty, &[StorageClass::Private as u32])?;
        self.symtab.insert_output(reg, IoVariable {
            physical_id: var,
            interface_id: None,
            storage_class: StorageClass::Private,
            sysval,
            write_mask: mask,
            array_offset: Some(offset),
        });
        self.staged_outputs.push(reg);
        Ok(())
    }
}
