//! Expression Emitter (component G, `spec.md` §4.G). Register reads/writes,
//! the closed ALU opcode table, resource sampling/fetch/store, and the
//! `original_source`-only resource-query supplements (`SPEC_FULL.md` §9).
//! Every register the arithmetic path touches is treated as a physical
//! 4-component `f32` vector (`spec.md` §4.E); a typed read/write bitcasts
//! into and out of that canonical storage, mirroring how the real hardware
//! register file is an untyped bank of 32-bit lanes.
use spirv::{Capability, Op, StorageClass};

use crate::compiler::Recompiler;
use crate::dxbc::{
    AluOp, BitfieldOp, ComponentType, DotOp, DstOperand, HalfPackOp, RegisterKind, SourceModifier,
    SrcOperand,
};
use crate::error::{bail, Error, Result};
use crate::ty::ScalarKind;
use crate::writer::StreamSel;

fn component_scalar(t: ComponentType) -> ScalarKind {
    match t {
        ComponentType::Float => ScalarKind::F32,
        ComponentType::Int => ScalarKind::I32,
        ComponentType::Uint => ScalarKind::U32,
    }
}

/// GLSL.std.450 extended-instruction-set opcode numbers this emitter uses.
/// The `spirv` crate's own enums stop at core SPIR-V; these are the
/// extended set's stable numbering straight from its spec.
mod glsl_std {
    pub const ROUND_EVEN: u32 = 2;
    pub const TRUNC: u32 = 3;
    pub const FABS: u32 = 4;
    pub const SABS: u32 = 5;
    pub const FLOOR: u32 = 8;
    pub const CEIL: u32 = 9;
    pub const FRACT: u32 = 10;
    pub const EXP2: u32 = 29;
    pub const LOG2: u32 = 30;
    pub const SQRT: u32 = 31;
    pub const INVERSE_SQRT: u32 = 32;
    pub const FMIN: u32 = 37;
    pub const UMIN: u32 = 38;
    pub const SMIN: u32 = 39;
    pub const FMAX: u32 = 40;
    pub const UMAX: u32 = 41;
    pub const SMAX: u32 = 42;
    pub const FCLAMP: u32 = 43;
    pub const FMA: u32 = 50;
    pub const PACK_HALF_2X16: u32 = 58;
    pub const UNPACK_HALF_2X16: u32 = 62;
}

const IMAGE_OPERANDS_LOD: u32 = 0x0000_0002;

impl<'a> Recompiler<'a> {
    fn glsl1(&mut self, inst: u32, ty: u32, a: u32) -> Result<u32> {
        let set = self.writer.glsl_ext_inst();
        self.writer.emit_tr(StreamSel::FunctionBody, Op::ExtInst, ty, &[set, inst, a])
    }
    fn glsl2(&mut self, inst: u32, ty: u32, a: u32, b: u32) -> Result<u32> {
        let set = self.writer.glsl_ext_inst();
        self.writer.emit_tr(StreamSel::FunctionBody, Op::ExtInst, ty, &[set, inst, a, b])
    }
    fn glsl3(&mut self, inst: u32, ty: u32, a: u32, b: u32, c: u32) -> Result<u32> {
        let set = self.writer.glsl_ext_inst();
        self.writer.emit_tr(StreamSel::FunctionBody, Op::ExtInst, ty, &[set, inst, a, b, c])
    }

    fn scalar_ty(&mut self, kind: ScalarKind) -> Result<u32> {
        self.cache.get_scalar(&mut self.writer, kind)
    }
    fn vector_ty(&mut self, kind: ScalarKind, n: u32) -> Result<u32> {
        let s = self.scalar_ty(kind)?;
        if n == 1 {
            Ok(s)
        } else {
            self.cache.get_vector(&mut self.writer, s, n)
        }
    }

    fn load_vec4(&mut self, ptr: u32) -> Result<u32> {
        let ty = self.vec4_f32_ty;
        self.writer.emit_tr(StreamSel::FunctionBody, Op::Load, ty, &[ptr])
    }

    /// Builtin-to-canonical discriminant for the four compute-only special
    /// registers addressed directly by `RegisterKind` (`spec.md` §4.E).
    fn special_register_key(kind: RegisterKind) -> Option<u8> {
        match kind {
            RegisterKind::ThreadId => Some(0),
            RegisterKind::LocalThreadId => Some(1),
            RegisterKind::LocalThreadIndex => Some(2),
            RegisterKind::ThreadGroupId => Some(3),
            _ => None,
        }
    }

    fn ensure_special_register(&mut self, kind: RegisterKind) -> Result<u32> {
        let key = Self::special_register_key(kind).expect("checked by caller");
        if let Some(id) = self.special_registers.get(&key) {
            return Ok(*id);
        }
        use spirv::BuiltIn;
        let (builtin, width, scalar) = match kind {
            RegisterKind::ThreadId => (BuiltIn::GlobalInvocationId, 3, ScalarKind::U32),
            RegisterKind::LocalThreadId => (BuiltIn::LocalInvocationId, 3, ScalarKind::U32),
            RegisterKind::LocalThreadIndex => (BuiltIn::LocalInvocationIndex, 1, ScalarKind::U32),
            RegisterKind::ThreadGroupId => (BuiltIn::WorkgroupId, 3, ScalarKind::U32),
            _ => unreachable!(),
        };
        let natural_ty = self.vector_ty(scalar, width)?;
        let ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::Input, natural_ty)?;
        let real_var = self.writer.emit_tr(StreamSel::Globals, Op::Variable, ptr_ty, &[StorageClass::Input as u32])?;
        self.cache.decorate(&mut self.writer, real_var, spirv::Decoration::BuiltIn, &[builtin as u32])?;
        self.interface_ids.push(real_var);

        let stage_ptr = self.cache.get_pointer(&mut self.writer, StorageClass::Private, self.vec4_f32_ty)?;
        let staging = self.writer.emit_tr(StreamSel::Globals, Op::Variable, stage_ptr, &[StorageClass::Private as u32])?;
        // Unlike a `dcl_input_sv` copy (queued for the entry-point prologue
        // to run before the body starts), this register is first touched
        // from inside the body itself, at which point `main`'s entry block
        // is already open — so the copy is emitted right here, in program
        // order before its first use, rather than queued.
        self.emit_prologue_copy(crate::compiler::PrologueCopy::Builtin { real_var, staging_var: staging, scalar, width })?;
        self.special_registers.insert(key, staging);
        Ok(staging)
    }

    /// Resolves a register reference that is physically a 4-component `f32`
    /// vector variable: temps, plain inputs/outputs, and the compute
    /// special registers.
    fn vec4_ptr_for(&mut self, kind: RegisterKind, index: Option<u32>) -> Result<u32> {
        match kind {
            RegisterKind::Temp => self.symtab.temps.id_of(index.ok_or_else(missing_index)?),
            RegisterKind::Input => Ok(self.symtab.input(index.ok_or_else(missing_index)?)?.physical_id),
            RegisterKind::Output => Ok(self.symtab.output(index.ok_or_else(missing_index)?)?.physical_id),
            _ if Self::special_register_key(kind).is_some() => self.ensure_special_register(kind),
            _ => bail!(MalformedBytecode, "register kind {:?} is not a flat vector register", kind),
        }
    }

    /// `local_elem` is the vec4 row requested within this DXBC `cb#`
    /// register. A push-constant-routed cbuffer is backed by a flat
    /// `array<u32, N>` (`decl.rs::ensure_push_constant_block`), word-granular
    /// rather than vec4-granular, so four consecutive words are gathered and
    /// repacked into a vec4 here; an ordinary cbuffer's backing array is
    /// already `array<vec4<f32>, N>` and is addressed directly.
    fn read_cbuffer_vec4(&mut self, reg: u32, local_elem: u32) -> Result<u32> {
        let cb = self.symtab.cbuffer(reg)?.clone();
        let u32_ty = self.u32_ty;
        let zero = self.cache.get_constant(&mut self.writer, u32_ty, 0)?;
        if cb.is_push_constant {
            let base_word = cb.member_index + local_elem * 4;
            let ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::PushConstant, u32_ty)?;
            let mut words = [0u32; 4];
            for (i, w) in words.iter_mut().enumerate() {
                let idx_const = self.cache.get_constant(&mut self.writer, u32_ty, base_word + i as u32)?;
                let elem_ptr = self.writer.emit_tr(StreamSel::FunctionBody, Op::AccessChain, ptr_ty, &[cb.var_id, zero, idx_const])?;
                *w = self.writer.emit_tr(StreamSel::FunctionBody, Op::Load, u32_ty, &[elem_ptr])?;
            }
            let vec4_u32_ty = self.vector_ty(ScalarKind::U32, 4)?;
            let raw = self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeConstruct, vec4_u32_ty, &words[..])?;
            let vec4_f32 = self.vec4_f32_ty;
            self.writer.emit_tr(StreamSel::FunctionBody, Op::Bitcast, vec4_f32, &[raw])
        } else {
            let idx_const = self.cache.get_constant(&mut self.writer, u32_ty, local_elem)?;
            let vec4_f32 = self.vec4_f32_ty;
            let ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::Uniform, vec4_f32)?;
            let elem_ptr = self.writer.emit_tr(StreamSel::FunctionBody, Op::AccessChain, ptr_ty, &[cb.var_id, zero, idx_const])?;
            self.writer.emit_tr(StreamSel::FunctionBody, Op::Load, vec4_f32, &[elem_ptr])
        }
    }

    fn read_icb_vec4(&mut self, local_elem: u32) -> Result<u32> {
        let icb_var = self.symtab.icb()?;
        let u32_ty = self.u32_ty;
        let vec4_u32_ty = self.vector_ty(ScalarKind::U32, 4)?;
        let idx_const = self.cache.get_constant(&mut self.writer, u32_ty, local_elem)?;
        let ptr_ty = self.cache.get_pointer(&mut self.writer, StorageClass::Private, vec4_u32_ty)?;
        let elem_ptr = self.writer.emit_tr(StreamSel::FunctionBody, Op::AccessChain, ptr_ty, &[icb_var, idx_const])?;
        let raw = self.writer.emit_tr(StreamSel::FunctionBody, Op::Load, vec4_u32_ty, &[elem_ptr])?;
        let vec4_f32 = self.vec4_f32_ty;
        self.writer.emit_tr(StreamSel::FunctionBody, Op::Bitcast, vec4_f32, &[raw])
    }

    /// Extracts `arity` scalars from a 4-component value at `indices`,
    /// recombining them into a vector when `arity > 1` (`spec.md` §4.G
    /// swizzle/write-mask application).
    fn select_components(&mut self, vec4_value: u32, scalar_ty: u32, arity: u32, indices: &[u32]) -> Result<u32> {
        if arity == 1 {
            return self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeExtract, scalar_ty, &[vec4_value, indices[0]]);
        }
        let mut comps = Vec::with_capacity(arity as usize);
        for idx in indices {
            comps.push(self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeExtract, scalar_ty, &[vec4_value, *idx])?);
        }
        let vec_ty = self.cache.get_vector(&mut self.writer, scalar_ty, arity)?;
        self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeConstruct, vec_ty, &comps)
    }

    /// Reads a source operand as `arity` components of its tagged data type,
    /// applying swizzle then source modifier (`spec.md` §4.G).
    pub fn read_src(&mut self, src: &SrcOperand, arity: u32) -> Result<u32> {
        if src.rel_addr {
            bail!(Unsupported, "relative addressing on a general register read is not supported");
        }
        let arity = arity.clamp(1, 4);
        let scalar_kind = component_scalar(src.data_type);
        let scalar_ty = self.scalar_ty(scalar_kind)?;

        if let Some(imm) = src.immediate {
            let idxs: Vec<u32> = src.swizzle.0[..arity as usize].iter().map(|c| *c as u32).collect();
            let mut comps = Vec::with_capacity(arity as usize);
            for idx in &idxs {
                comps.push(self.cache.get_constant(&mut self.writer, scalar_ty, imm[*idx as usize])?);
            }
            let value = if arity == 1 {
                comps[0]
            } else {
                let vec_ty = self.cache.get_vector(&mut self.writer, scalar_ty, arity)?;
                self.cache.get_constant_composite(&mut self.writer, vec_ty, &comps)?
            };
            return self.apply_source_modifier(value, src.modifier, scalar_kind, arity);
        }

        let reg = src.indices[0];
        let vec4_f32 = match src.kind {
            RegisterKind::ConstBuffer => {
                let local = src.indices[1].unwrap_or(0);
                self.read_cbuffer_vec4(reg.ok_or_else(missing_index)?, local)?
            }
            RegisterKind::ImmConstBuffer => self.read_icb_vec4(reg.ok_or_else(missing_index)?)?,
            RegisterKind::Null => {
                let zero = self.cache.get_constant(&mut self.writer, self.f32_ty, 0)?;
                self.cache.get_constant_composite(&mut self.writer, self.vec4_f32_ty, &[zero, zero, zero, zero])?
            }
            _ => {
                let ptr = self.vec4_ptr_for(src.kind, reg)?;
                self.load_vec4(ptr)?
            }
        };

        let vec4_ty = self.vector_ty(scalar_kind, 4)?;
        let typed_vec4 = if matches!(scalar_kind, ScalarKind::F32) {
            vec4_f32
        } else {
            self.writer.emit_tr(StreamSel::FunctionBody, Op::Bitcast, vec4_ty, &[vec4_f32])?
        };
        let idxs: Vec<u32> = src.swizzle.0[..arity as usize].iter().map(|c| *c as u32).collect();
        let value = self.select_components(typed_vec4, scalar_ty, arity, &idxs)?;
        self.apply_source_modifier(value, src.modifier, scalar_kind, arity)
    }

    fn apply_source_modifier(&mut self, value: u32, modifier: SourceModifier, scalar_kind: ScalarKind, arity: u32) -> Result<u32> {
        if matches!(modifier, SourceModifier::None) {
            return Ok(value);
        }
        let ty = self.vector_ty(scalar_kind, arity)?;
        let is_float = matches!(scalar_kind, ScalarKind::F32);
        match modifier {
            SourceModifier::None => unreachable!(),
            SourceModifier::Neg => {
                let op = if is_float { Op::FNegate } else { Op::SNegate };
                self.writer.emit_tr(StreamSel::FunctionBody, op, ty, &[value])
            }
            SourceModifier::Abs => {
                if is_float {
                    self.glsl1(glsl_std::FABS, ty, value)
                } else {
                    self.glsl1(glsl_std::SABS, ty, value)
                }
            }
            SourceModifier::AbsNeg => {
                let abs = if is_float { self.glsl1(glsl_std::FABS, ty, value)? } else { self.glsl1(glsl_std::SABS, ty, value)? };
                let op = if is_float { Op::FNegate } else { Op::SNegate };
                self.writer.emit_tr(StreamSel::FunctionBody, op, ty, &[abs])
            }
        }
    }

    /// Writes `value` (already in `value_kind`, `arity` components) to the
    /// masked lanes of `dst`'s physical register, leaving the other lanes
    /// untouched (`spec.md` §4.G write-mask application).
    pub fn write_dst(&mut self, dst: &DstOperand, value: u32, value_kind: ScalarKind, arity: u32, sat: bool) -> Result<()> {
        if dst.rel_addr {
            bail!(Unsupported, "relative addressing on a general register write is not supported");
        }
        let mut v = value;
        if sat && matches!(value_kind, ScalarKind::F32) {
            let ty = self.vector_ty(ScalarKind::F32, arity)?;
            let zero = self.cache.get_constant(&mut self.writer, self.f32_ty, 0.0f32.to_bits())?;
            let one = self.cache.get_constant(&mut self.writer, self.f32_ty, 1.0f32.to_bits())?;
            let (zero_v, one_v) = if arity == 1 {
                (zero, one)
            } else {
                let vty = ty;
                let zs = vec![zero; arity as usize];
                let os = vec![one; arity as usize];
                (
                    self.cache.get_constant_composite(&mut self.writer, vty, &zs)?,
                    self.cache.get_constant_composite(&mut self.writer, vty, &os)?,
                )
            };
            v = self.glsl3(glsl_std::FCLAMP, ty, v, zero_v, one_v)?;
        }

        let f32_ty_n = self.vector_ty(ScalarKind::F32, arity)?;
        let v_f32 = if matches!(value_kind, ScalarKind::F32) {
            v
        } else {
            self.writer.emit_tr(StreamSel::FunctionBody, Op::Bitcast, f32_ty_n, &[v])?
        };

        let ptr = self.vec4_ptr_for(dst.kind, dst.indices[0])?;
        let old = self.load_vec4(ptr)?;
        let f32_scalar_ty = self.f32_ty;
        let lanes = dst.mask.component_indices();
        let mut result = old;
        for (i, lane) in lanes.iter().enumerate() {
            let comp = if arity == 1 {
                v_f32
            } else {
                self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeExtract, f32_scalar_ty, &[v_f32, i as u32])?
            };
            result = self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeInsert, self.vec4_f32_ty, &[comp, result, *lane])?;
        }
        crate::writer::ModuleWriter::emit_op(&mut self.writer.function_body, Op::Store, &[ptr, result])
    }

    pub fn emit_mov(&mut self, dst: &DstOperand, src: &SrcOperand) -> Result<()> {
        let arity = dst.mask.popcount();
        let kind = component_scalar(src.data_type);
        let v = self.read_src(src, arity)?;
        self.write_dst(dst, v, kind, arity, false)
    }

    pub fn emit_movc(&mut self, dst: &DstOperand, cond: &SrcOperand, a: &SrcOperand, b: &SrcOperand) -> Result<()> {
        let arity = dst.mask.popcount();
        let kind = component_scalar(dst.data_type);
        let cond_bits = self.read_src(cond, arity)?;
        let zero = self.cache.get_constant(&mut self.writer, self.u32_ty, 0)?;
        let bool_ty = self.cache.get_bool(&mut self.writer)?;
        let (bool_ty, zero_v) = if arity == 1 {
            (bool_ty, zero)
        } else {
            let bvec = self.cache.get_vector(&mut self.writer, bool_ty, arity)?;
            let zs = vec![zero; arity as usize];
            let zv = self.cache.get_constant_composite(&mut self.writer, self.vector_ty(ScalarKind::U32, arity)?, &zs)?;
            (bvec, zv)
        };
        let cond_bool = self.writer.emit_tr(StreamSel::FunctionBody, Op::INotEqual, bool_ty, &[cond_bits, zero_v])?;
        let av = self.read_src(a, arity)?;
        let bv = self.read_src(b, arity)?;
        let ty = self.vector_ty(kind, arity)?;
        let sel = self.writer.emit_tr(StreamSel::FunctionBody, Op::Select, ty, &[cond_bool, av, bv])?;
        self.write_dst(dst, sel, kind, arity, false)
    }

    pub fn emit_swapc(
        &mut self,
        dst0: &DstOperand,
        dst1: &DstOperand,
        cond: &SrcOperand,
        a: &SrcOperand,
        b: &SrcOperand,
    ) -> Result<()> {
        let arity = dst0.mask.popcount();
        let kind = component_scalar(dst0.data_type);
        let cond_bits = self.read_src(cond, arity)?;
        let zero = self.cache.get_constant(&mut self.writer, self.u32_ty, 0)?;
        let bool_scalar_ty = self.cache.get_bool(&mut self.writer)?;
        let (bool_ty, zero_v) = if arity == 1 {
            (bool_scalar_ty, zero)
        } else {
            let bvec = self.cache.get_vector(&mut self.writer, bool_scalar_ty, arity)?;
            let zs = vec![zero; arity as usize];
            let zv = self.cache.get_constant_composite(&mut self.writer, self.vector_ty(ScalarKind::U32, arity)?, &zs)?;
            (bvec, zv)
        };
        let cond_bool = self.writer.emit_tr(StreamSel::FunctionBody, Op::INotEqual, bool_ty, &[cond_bits, zero_v])?;
        let av = self.read_src(a, arity)?;
        let bv = self.read_src(b, arity)?;
        let ty = self.vector_ty(kind, arity)?;
        let sel0 = self.writer.emit_tr(StreamSel::FunctionBody, Op::Select, ty, &[cond_bool, av, bv])?;
        let sel1 = self.writer.emit_tr(StreamSel::FunctionBody, Op::Select, ty, &[cond_bool, bv, av])?;
        self.write_dst(dst0, sel0, kind, arity, false)?;
        self.write_dst(dst1, sel1, kind, arity, false)
    }

    fn alu_result_kind(op: AluOp) -> ScalarKind {
        use AluOp::*;
        match op {
            Add | Mul | Rsqrt | Sqrt | Exp | Log | Frc | RoundNe | RoundPi | RoundNi | RoundZ | Mad | ItoF | UtoF
            | Min | Max => ScalarKind::F32,
            IAdd | IMul | IMin | IMax | Ishr | Ishl | FtoI => ScalarKind::I32,
            And | Or | Xor | Not | Ushr | UMin | UMax | FtoU => ScalarKind::U32,
            Eq | Ne | Lt | Ge | IEq | INe | ILt | IGe | ULt | UGe => ScalarKind::U32,
        }
    }

    pub fn emit_alu(&mut self, op: AluOp, dst: &DstOperand, srcs: &[SrcOperand], sat: bool) -> Result<()> {
        let arity = dst.mask.popcount();
        let result_kind = Self::alu_result_kind(op);
        let operand_kind = match op {
            AluOp::IAdd | AluOp::IMul | AluOp::IMin | AluOp::IMax | AluOp::Ishr | AluOp::Ishl | AluOp::ItoF
            | AluOp::IEq | AluOp::INe | AluOp::ILt | AluOp::IGe => ScalarKind::I32,
            AluOp::And | AluOp::Or | AluOp::Xor | AluOp::Not | AluOp::Ushr | AluOp::UMin | AluOp::UMax
            | AluOp::UtoF | AluOp::ULt | AluOp::UGe => ScalarKind::U32,
            AluOp::FtoI | AluOp::FtoU => ScalarKind::F32,
            _ => ScalarKind::F32,
        };
        let mut reads = Vec::with_capacity(srcs.len());
        for s in srcs {
            reads.push(self.read_src_as(s, arity, operand_kind)?);
        }

        let bool_like = matches!(
            op,
            AluOp::Eq | AluOp::Ne | AluOp::Lt | AluOp::Ge | AluOp::IEq | AluOp::INe | AluOp::ILt | AluOp::IGe | AluOp::ULt | AluOp::UGe
        );
        let result_ty = self.vector_ty(result_kind, arity)?;

        let value = if bool_like {
            let bool_op = match op {
                AluOp::Eq => Op::FOrdEqual,
                AluOp::Ne => Op::FOrdNotEqual,
                AluOp::Lt => Op::FOrdLessThan,
                AluOp::Ge => Op::FOrdGreaterThanEqual,
                AluOp::IEq => Op::IEqual,
                AluOp::INe => Op::INotEqual,
                AluOp::ILt => Op::SLessThan,
                AluOp::IGe => Op::SGreaterThanEqual,
                AluOp::ULt => Op::ULessThan,
                AluOp::UGe => Op::UGreaterThanEqual,
                _ => unreachable!(),
            };
            let bool_ty = self.cache.get_bool(&mut self.writer)?;
            let bool_ty = if arity == 1 { bool_ty } else { self.cache.get_vector(&mut self.writer, bool_ty, arity)? };
            let cond = self.writer.emit_tr(StreamSel::FunctionBody, bool_op, bool_ty, &[reads[0], reads[1]])?;
            let true_c = self.cache.get_constant(&mut self.writer, self.u32_ty, 0xFFFF_FFFF)?;
            let false_c = self.cache.get_constant(&mut self.writer, self.u32_ty, 0)?;
            let (true_v, false_v) = if arity == 1 {
                (true_c, false_c)
            } else {
                let uvec = self.vector_ty(ScalarKind::U32, arity)?;
                let ts = vec![true_c; arity as usize];
                let fs = vec![false_c; arity as usize];
                (
                    self.cache.get_constant_composite(&mut self.writer, uvec, &ts)?,
                    self.cache.get_constant_composite(&mut self.writer, uvec, &fs)?,
                )
            };
            self.writer.emit_tr(StreamSel::FunctionBody, Op::Select, result_ty, &[cond, true_v, false_v])?
        } else {
            self.emit_alu_arith(op, result_ty, &reads)?
        };

        self.write_dst(dst, value, result_kind, arity, sat)
    }

    fn read_src_as(&mut self, src: &SrcOperand, arity: u32, want_kind: ScalarKind) -> Result<u32> {
        let mut retagged = src.clone();
        retagged.data_type = match want_kind {
            ScalarKind::F32 => ComponentType::Float,
            ScalarKind::I32 => ComponentType::Int,
            ScalarKind::U32 | ScalarKind::Bool => ComponentType::Uint,
        };
        self.read_src(&retagged, arity)
    }

    fn emit_alu_arith(&mut self, op: AluOp, ty: u32, r: &[u32]) -> Result<u32> {
        use AluOp::*;
        Ok(match op {
            Add => self.writer.emit_tr(StreamSel::FunctionBody, Op::FAdd, ty, &[r[0], r[1]])?,
            IAdd => self.writer.emit_tr(StreamSel::FunctionBody, Op::IAdd, ty, &[r[0], r[1]])?,
            And => self.writer.emit_tr(StreamSel::FunctionBody, Op::BitwiseAnd, ty, &[r[0], r[1]])?,
            Or => self.writer.emit_tr(StreamSel::FunctionBody, Op::BitwiseOr, ty, &[r[0], r[1]])?,
            Xor => self.writer.emit_tr(StreamSel::FunctionBody, Op::BitwiseXor, ty, &[r[0], r[1]])?,
            Not => self.writer.emit_tr(StreamSel::FunctionBody, Op::Not, ty, &[r[0]])?,
            Mul => self.writer.emit_tr(StreamSel::FunctionBody, Op::FMul, ty, &[r[0], r[1]])?,
            IMul => self.writer.emit_tr(StreamSel::FunctionBody, Op::IMul, ty, &[r[0], r[1]])?,
            Min => self.glsl2(glsl_std::FMIN, ty, r[0], r[1])?,
            IMin => self.glsl2(glsl_std::SMIN, ty, r[0], r[1])?,
            UMin => self.glsl2(glsl_std::UMIN, ty, r[0], r[1])?,
            Max => self.glsl2(glsl_std::FMAX, ty, r[0], r[1])?,
            IMax => self.glsl2(glsl_std::SMAX, ty, r[0], r[1])?,
            UMax => self.glsl2(glsl_std::UMAX, ty, r[0], r[1])?,
            FtoI => self.writer.emit_tr(StreamSel::FunctionBody, Op::ConvertFToS, ty, &[r[0]])?,
            FtoU => self.writer.emit_tr(StreamSel::FunctionBody, Op::ConvertFToU, ty, &[r[0]])?,
            ItoF => self.writer.emit_tr(StreamSel::FunctionBody, Op::ConvertSToF, ty, &[r[0]])?,
            UtoF => self.writer.emit_tr(StreamSel::FunctionBody, Op::ConvertUToF, ty, &[r[0]])?,
            Ushr => self.writer.emit_tr(StreamSel::FunctionBody, Op::ShiftRightLogical, ty, &[r[0], r[1]])?,
            Ishr => self.writer.emit_tr(StreamSel::FunctionBody, Op::ShiftRightArithmetic, ty, &[r[0], r[1]])?,
            Ishl => self.writer.emit_tr(StreamSel::FunctionBody, Op::ShiftLeftLogical, ty, &[r[0], r[1]])?,
            Rsqrt => self.glsl1(glsl_std::INVERSE_SQRT, ty, r[0])?,
            Sqrt => self.glsl1(glsl_std::SQRT, ty, r[0])?,
            Exp => self.glsl1(glsl_std::EXP2, ty, r[0])?,
            Log => self.glsl1(glsl_std::LOG2, ty, r[0])?,
            Frc => self.glsl1(glsl_std::FRACT, ty, r[0])?,
            RoundNe => self.glsl1(glsl_std::ROUND_EVEN, ty, r[0])?,
            RoundPi => self.glsl1(glsl_std::CEIL, ty, r[0])?,
            RoundNi => self.glsl1(glsl_std::FLOOR, ty, r[0])?,
            RoundZ => self.glsl1(glsl_std::TRUNC, ty, r[0])?,
            Mad => self.glsl3(glsl_std::FMA, ty, r[0], r[1], r[2])?,
            Eq | Ne | Lt | Ge | IEq | INe | ILt | IGe | ULt | UGe => unreachable!("handled by bool_like path"),
        })
    }

    pub fn emit_dot(&mut self, op: DotOp, dst: &DstOperand, a: &SrcOperand, b: &SrcOperand, sat: bool) -> Result<()> {
        let n = match op {
            DotOp::Dp2 => 2,
            DotOp::Dp3 => 3,
            DotOp::Dp4 => 4,
        };
        let av = self.read_src(a, n)?;
        let bv = self.read_src(b, n)?;
        let f32_ty = self.f32_ty;
        let dot = self.writer.emit_tr(StreamSel::FunctionBody, Op::Dot, f32_ty, &[av, bv])?;
        let arity = dst.mask.popcount();
        let splatted = if arity == 1 {
            dot
        } else {
            let ty = self.vector_ty(ScalarKind::F32, arity)?;
            let comps = vec![dot; arity as usize];
            self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeConstruct, ty, &comps)?
        };
        self.write_dst(dst, splatted, ScalarKind::F32, arity, sat)
    }

    /// `Offset`/`Count` in `OpBitFieldInsert`/`OpBitField{S,U}Extract` must be
    /// scalar even when the base operand is a vector (SPIR-V spec), so width
    /// and offset are always read as a single component regardless of the
    /// destination's write-mask arity.
    pub fn emit_bitfield(&mut self, op: BitfieldOp, dst: &DstOperand, srcs: &[SrcOperand]) -> Result<()> {
        let arity = dst.mask.popcount();
        let u32_ty = self.vector_ty(ScalarKind::U32, arity)?;
        let thirty_one = self.cache.get_constant(&mut self.writer, self.u32_ty, 31)?;
        let width = self.read_src_as(&srcs[0], 1, ScalarKind::U32)?;
        let width = self.writer.emit_tr(StreamSel::FunctionBody, Op::BitwiseAnd, self.u32_ty, &[width, thirty_one])?;
        let offset = self.read_src_as(&srcs[1], 1, ScalarKind::U32)?;
        let offset = self.writer.emit_tr(StreamSel::FunctionBody, Op::BitwiseAnd, self.u32_ty, &[offset, thirty_one])?;
        match op {
            BitfieldOp::Bfi => {
                let insert = self.read_src_as(&srcs[2], arity, ScalarKind::U32)?;
                let base = self.read_src_as(&srcs[3], arity, ScalarKind::U32)?;
                let v = self.writer.emit_tr(StreamSel::FunctionBody, Op::BitFieldInsert, u32_ty, &[base, insert, offset, width])?;
                self.write_dst(dst, v, ScalarKind::U32, arity, false)
            }
            BitfieldOp::Ibfe => {
                let i32_ty = self.vector_ty(ScalarKind::I32, arity)?;
                let base = self.read_src_as(&srcs[2], arity, ScalarKind::I32)?;
                let v = self.writer.emit_tr(StreamSel::FunctionBody, Op::BitFieldSExtract, i32_ty, &[base, offset, width])?;
                self.write_dst(dst, v, ScalarKind::I32, arity, false)
            }
            BitfieldOp::Ubfe => {
                let base = self.read_src_as(&srcs[2], arity, ScalarKind::U32)?;
                let v = self.writer.emit_tr(StreamSel::FunctionBody, Op::BitFieldUExtract, u32_ty, &[base, offset, width])?;
                self.write_dst(dst, v, ScalarKind::U32, arity, false)
            }
        }
    }

    pub fn emit_half_pack(&mut self, op: HalfPackOp, dst: &DstOperand, src: &SrcOperand) -> Result<()> {
        let arity = dst.mask.popcount();
        let f32_ty = self.f32_ty;
        let u32_ty = self.u32_ty;
        let vec2_f32 = self.cache.get_vector(&mut self.writer, f32_ty, 2)?;
        match op {
            HalfPackOp::F16ToF32 => {
                let src_words = self.read_src_as(src, arity, ScalarKind::U32)?;
                let mut lanes = Vec::with_capacity(arity as usize);
                for i in 0..arity {
                    let word = if arity == 1 {
                        src_words
                    } else {
                        self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeExtract, u32_ty, &[src_words, i])?
                    };
                    let pair = self.glsl1(glsl_std::UNPACK_HALF_2X16, vec2_f32, word)?;
                    lanes.push(self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeExtract, f32_ty, &[pair, 0])?);
                }
                let value = if arity == 1 {
                    lanes[0]
                } else {
                    let ty = self.vector_ty(ScalarKind::F32, arity)?;
                    self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeConstruct, ty, &lanes)?
                };
                self.write_dst(dst, value, ScalarKind::F32, arity, false)
            }
            HalfPackOp::F32ToF16 => {
                let src_floats = self.read_src(src, arity)?;
                let zero = self.cache.get_constant(&mut self.writer, f32_ty, 0)?;
                let mut lanes = Vec::with_capacity(arity as usize);
                for i in 0..arity {
                    let lane = if arity == 1 {
                        src_floats
                    } else {
                        self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeExtract, f32_ty, &[src_floats, i])?
                    };
                    let pair = self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeConstruct, vec2_f32, &[lane, zero])?;
                    lanes.push(self.glsl1(glsl_std::PACK_HALF_2X16, u32_ty, pair)?);
                }
                let value = if arity == 1 {
                    lanes[0]
                } else {
                    let ty = self.vector_ty(ScalarKind::U32, arity)?;
                    self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeConstruct, ty, &lanes)?
                };
                self.write_dst(dst, value, ScalarKind::U32, arity, false)
            }
        }
    }

    pub fn emit_udiv(&mut self, quotient: &DstOperand, remainder: &DstOperand, a: &SrcOperand, b: &SrcOperand) -> Result<()> {
        let arity = quotient.mask.popcount().max(remainder.mask.popcount());
        let av = self.read_src_as(a, arity, ScalarKind::U32)?;
        let bv = self.read_src_as(b, arity, ScalarKind::U32)?;
        let (q, r) = self.div_mod_with_zero_guard(av, bv, arity)?;
        if quotient.mask.popcount() > 0 {
            self.write_dst(quotient, q, ScalarKind::U32, quotient.mask.popcount(), false)?;
        }
        if remainder.mask.popcount() > 0 {
            self.write_dst(remainder, r, ScalarKind::U32, remainder.mask.popcount(), false)?;
        }
        Ok(())
    }

    pub fn emit_umod(&mut self, dst: &DstOperand, a: &SrcOperand, b: &SrcOperand) -> Result<()> {
        let arity = dst.mask.popcount();
        let av = self.read_src_as(a, arity, ScalarKind::U32)?;
        let bv = self.read_src_as(b, arity, ScalarKind::U32)?;
        let (_, r) = self.div_mod_with_zero_guard(av, bv, arity)?;
        self.write_dst(dst, r, ScalarKind::U32, arity, false)
    }

    /// Divide-by-zero lanes wrap to `0xFFFFFFFF` rather than producing a
    /// SPIR-V-undefined `OpUDiv`/`OpUMod` result (`spec.md` §4.G).
    fn div_mod_with_zero_guard(&mut self, a: u32, b: u32, arity: u32) -> Result<(u32, u32)> {
        let u32_ty = self.vector_ty(ScalarKind::U32, arity)?;
        let zero = self.cache.get_constant(&mut self.writer, self.u32_ty, 0)?;
        let all_ones = self.cache.get_constant(&mut self.writer, self.u32_ty, 0xFFFF_FFFF)?;
        let (zero_v, ones_v) = if arity == 1 {
            (zero, all_ones)
        } else {
            let zs = vec![zero; arity as usize];
            let os = vec![all_ones; arity as usize];
            (
                self.cache.get_constant_composite(&mut self.writer, u32_ty, &zs)?,
                self.cache.get_constant_composite(&mut self.writer, u32_ty, &os)?,
            )
        };
        let bool_ty = self.cache.get_bool(&mut self.writer)?;
        let bool_ty = if arity == 1 { bool_ty } else { self.cache.get_vector(&mut self.writer, bool_ty, arity)? };
        let is_zero = self.writer.emit_tr(StreamSel::FunctionBody, Op::IEqual, bool_ty, &[b, zero_v])?;
        let raw_q = self.writer.emit_tr(StreamSel::FunctionBody, Op::UDiv, u32_ty, &[a, b])?;
        let raw_r = self.writer.emit_tr(StreamSel::FunctionBody, Op::UMod, u32_ty, &[a, b])?;
        let q = self.writer.emit_tr(StreamSel::FunctionBody, Op::Select, u32_ty, &[is_zero, ones_v, raw_q])?;
        let r = self.writer.emit_tr(StreamSel::FunctionBody, Op::Select, u32_ty, &[is_zero, ones_v, raw_r])?;
        Ok((q, r))
    }

    pub fn emit_sample(&mut self, dst: &DstOperand, coord: &SrcOperand, resource: &SrcOperand, sampler: &SrcOperand) -> Result<()> {
        let res_reg = resource.indices[0].ok_or_else(missing_index)?;
        let smp_reg = sampler.indices[0].ok_or_else(missing_index)?;
        let res = self.symtab.resource(res_reg)?.clone();
        let smp = self.symtab.sampler(smp_reg)?.clone();

        let image_val = self.writer.emit_tr(StreamSel::FunctionBody, Op::Load, res.image_type_id, &[res.var_id])?;
        let sampler_ty = self.cache.get_sampler(&mut self.writer)?;
        let sampler_val = self.writer.emit_tr(StreamSel::FunctionBody, Op::Load, sampler_ty, &[smp.var_id])?;
        let sampled_image_ty = self.cache.get_sampled_image(&mut self.writer, res.image_type_id)?;
        let sampled_image = self.writer.emit_tr(StreamSel::FunctionBody, Op::SampledImage, sampled_image_ty, &[image_val, sampler_val])?;

        let coord_arity = res.coordinate_component_mask.popcount();
        let coord_val = self.read_src(coord, coord_arity)?;

        let result_scalar_ty = self.cache.get_scalar(&mut self.writer, res.sampled_scalar_kind)?;
        let vec4_result_ty = self.cache.get_vector(&mut self.writer, result_scalar_ty, 4)?;
        let sampled = self.writer.emit_tr(StreamSel::FunctionBody, Op::ImageSampleImplicitLod, vec4_result_ty, &[sampled_image, coord_val])?;

        let arity = dst.mask.popcount();
        let idxs = dst.mask.component_indices();
        let value = self.select_components(sampled, result_scalar_ty, arity, &idxs)?;
        self.write_dst(dst, value, res.sampled_scalar_kind, arity, false)
    }

    pub fn emit_ld(&mut self, dst: &DstOperand, coord: &SrcOperand, resource: &SrcOperand) -> Result<()> {
        let res_reg = resource.indices[0].ok_or_else(missing_index)?;
        let res = self.symtab.resource(res_reg)?.clone();
        let image_val = self.writer.emit_tr(StreamSel::FunctionBody, Op::Load, res.image_type_id, &[res.var_id])?;
        let coord_arity = res.coordinate_component_mask.popcount();
        let coord_val = self.read_src_as(coord, coord_arity, ScalarKind::I32)?;

        let result_scalar_ty = self.cache.get_scalar(&mut self.writer, res.sampled_scalar_kind)?;
        let vec4_result_ty = self.cache.get_vector(&mut self.writer, result_scalar_ty, 4)?;
        let lod = self.cache.get_constant(&mut self.writer, self.i32_ty, 0)?;
        let fetched = self.writer.emit_tr(
            StreamSel::FunctionBody,
            Op::ImageFetch,
            vec4_result_ty,
            &[image_val, coord_val, IMAGE_OPERANDS_LOD, lod],
        )?;

        let arity = dst.mask.popcount();
        let idxs = dst.mask.component_indices();
        let value = self.select_components(fetched, result_scalar_ty, arity, &idxs)?;
        self.write_dst(dst, value, res.sampled_scalar_kind, arity, false)
    }

    pub fn emit_store_uav_typed(&mut self, uav: &SrcOperand, coord: &SrcOperand, value: &SrcOperand) -> Result<()> {
        let reg = uav.indices[0].ok_or_else(missing_index)?;
        let u = self.symtab.uav(reg)?.clone();
        let image_val = self.writer.emit_tr(StreamSel::FunctionBody, Op::Load, u.image_type_id, &[u.var_id])?;
        let coord_arity = u.coordinate_component_mask.popcount();
        let coord_val = self.read_src_as(coord, coord_arity, ScalarKind::I32)?;
        let val = self.read_src_as(value, 4, u.sampled_scalar_kind)?;
        crate::writer::ModuleWriter::emit_op(&mut self.writer.function_body, Op::ImageWrite, &[image_val, coord_val, val])
    }

    pub fn emit_resinfo(&mut self, dst: &DstOperand, mip_level: &SrcOperand, resource: &SrcOperand) -> Result<()> {
        let reg = resource.indices[0].ok_or_else(missing_index)?;
        let res = self.symtab.resource(reg)?.clone();
        self.writer.enable_capability(Capability::ImageQuery);
        let image_val = self.writer.emit_tr(StreamSel::FunctionBody, Op::Load, res.image_type_id, &[res.var_id])?;
        let lod = self.read_src_as(mip_level, 1, ScalarKind::I32)?;
        let ncomp = res.coordinate_component_mask.popcount().min(3);
        let size_u32_ty = self.vector_ty(ScalarKind::U32, ncomp)?;
        let size = self.writer.emit_tr(StreamSel::FunctionBody, Op::ImageQuerySizeLod, size_u32_ty, &[image_val, lod])?;
        let levels = self.writer.emit_tr(StreamSel::FunctionBody, Op::ImageQueryLevels, self.i32_ty, &[image_val])?;

        let size_f32_ty = self.vector_ty(ScalarKind::F32, ncomp)?;
        let size_f32 = self.writer.emit_tr(StreamSel::FunctionBody, Op::ConvertUToF, size_f32_ty, &[size])?;
        let levels_f32 = self.writer.emit_tr(StreamSel::FunctionBody, Op::ConvertSToF, self.f32_ty, &[levels])?;

        let mut lanes = Vec::with_capacity(4);
        for i in 0..ncomp {
            lanes.push(if ncomp == 1 {
                size_f32
            } else {
                self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeExtract, self.f32_ty, &[size_f32, i])?
            });
        }
        while lanes.len() < 3 {
            lanes.push(self.cache.get_constant(&mut self.writer, self.f32_ty, 0)?);
        }
        lanes.push(levels_f32);
        let full = self.writer.emit_tr(StreamSel::FunctionBody, Op::CompositeConstruct, self.vec4_f32_ty, &lanes)?;

        let arity = dst.mask.popcount();
        let idxs = dst.mask.component_indices();
        let value = self.select_components(full, self.f32_ty, arity, &idxs)?;
        self.write_dst(dst, value, ScalarKind::F32, arity, false)
    }

    pub fn emit_sampleinfo(&mut self, dst: &DstOperand, resource: &SrcOperand) -> Result<()> {
        let reg = resource.indices[0].ok_or_else(missing_index)?;
        let res = self.symtab.resource(reg)?.clone();
        self.writer.enable_capability(Capability::ImageQuery);
        let image_val = self.writer.emit_tr(StreamSel::FunctionBody, Op::Load, res.image_type_id, &[res.var_id])?;
        let samples = self.writer.emit_tr(StreamSel::FunctionBody, Op::ImageQuerySamples, self.i32_ty, &[image_val])?;
        let samples_f32 = self.writer.emit_tr(StreamSel::FunctionBody, Op::ConvertSToF, self.f32_ty, &[samples])?;
        let zero = self.cache.get_constant(&mut self.writer, self.f32_ty, 0)?;
        let full = self.writer.emit_tr(
            StreamSel::FunctionBody,
            Op::CompositeConstruct,
            self.vec4_f32_ty,
            &[samples_f32, zero, zero, zero],
        )?;
        let arity = dst.mask.popcount();
        let idxs = dst.mask.component_indices();
        let value = self.select_components(full, self.f32_ty, arity, &idxs)?;
        self.write_dst(dst, value, ScalarKind::F32, arity, false)
    }

    /// Uniform condition lowering shared by `if`/`breakc`/`discard`
    /// (`spec.md` §4.H): `v != 0`, or `v == 0` when the opcode's `Z` variant
    /// is used.
    pub fn read_bool_cond(&mut self, src: &SrcOperand, zero_test: bool) -> Result<u32> {
        let v = self.read_src_as(src, 1, ScalarKind::U32)?;
        let zero = self.cache.get_constant(&mut self.writer, self.u32_ty, 0)?;
        let bool_ty = self.cache.get_bool(&mut self.writer)?;
        self.lower_condition(v, bool_ty, zero, zero_test)
    }
}

fn missing_index() -> Error {
    Error::MalformedBytecode("register reference missing its index".to_owned())
}
