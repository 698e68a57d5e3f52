//! DXBC instruction/operand data model (`spec.md` §6).
//!
//! The D3D12 runtime's own bytecode tokenizer — the stage that turns a raw
//! byte blob into a stream of typed instructions — sits outside this
//! crate's scope the same way the device/resource/pipeline wrappers do
//! (`spec.md` §1): it is an external collaborator. What this module owns is
//! the *shape* of an already-tokenized instruction (`spec.md` §6's
//! `{opcode, length, operands, source-params[*], dest-params[*]}`), encoded
//! here as a closed Rust enum rather than the source tokenizer's giant
//! opcode switch (`spec.md` §9 "Dynamic-dispatch-by-opcode").
pub mod signature;

use crate::error::{bail, Result};

pub use signature::{SignatureElement, SysValueSemantic};

/// Which DXBC register file an operand refers to.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum RegisterKind {
    Temp,
    Input,
    Output,
    ConstBuffer,
    ImmConstBuffer,
    Sampler,
    Resource,
    Uav,
    ThreadId,
    LocalThreadId,
    LocalThreadIndex,
    ThreadGroupId,
    ImmediateConstant,
    Null,
}

/// Component data type an operand is read or written as. DXBC's register
/// file is untyped storage; this tags how the bits are to be interpreted
/// for a particular use, matching `spec.md` §6's `data-type` field.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum ComponentType {
    Float,
    Int,
    Uint,
}

/// 4-bit destination write-mask.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Default)]
pub struct WriteMask(pub u8);
impl WriteMask {
    pub const X: WriteMask = WriteMask(0b0001);
    pub const Y: WriteMask = WriteMask(0b0010);
    pub const Z: WriteMask = WriteMask(0b0100);
    pub const W: WriteMask = WriteMask(0b1000);
    pub const XYZW: WriteMask = WriteMask(0b1111);

    pub fn popcount(&self) -> u32 {
        self.0.count_ones()
    }
    pub fn contains(&self, c: u8) -> bool {
        self.0 & (1 << c) != 0
    }
    /// Indices (0..4) of the components this mask touches, low to high.
    pub fn component_indices(&self) -> Vec<u32> {
        (0..4).filter(|c| self.contains(*c as u8)).collect()
    }
}
impl std::ops::BitOr for WriteMask {
    type Output = WriteMask;
    fn bitor(self, rhs: WriteMask) -> WriteMask {
        WriteMask(self.0 | rhs.0)
    }
}

/// Four 2-bit source-component selectors (`spec.md` glossary: swizzle).
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct Swizzle(pub [u8; 4]);
impl Swizzle {
    pub const IDENTITY: Swizzle = Swizzle([0, 1, 2, 3]);
    pub fn splat(c: u8) -> Swizzle {
        Swizzle([c, c, c, c])
    }
    /// The swizzle restricted to the components named by `mask`, in
    /// increasing component order (used for e.g. `dp3`'s implicit `xyz`).
    pub fn masked(mask: WriteMask) -> Swizzle {
        let idx = mask.component_indices();
        let mut out = [0u8; 4];
        for (i, c) in idx.iter().enumerate().take(4) {
            out[i] = *c as u8;
        }
        Swizzle(out)
    }
}

/// Source modifier dispatched on the operand's data type (`spec.md` §4.G).
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Default)]
pub enum SourceModifier {
    #[default]
    None,
    Neg,
    Abs,
    AbsNeg,
}

/// A register reference together with the selector/modifier/type that
/// qualifies how it is read (source operand) or written (destination
/// operand). `spec.md` §6: `{register-kind, index[0..1], swizzle-or-
/// write-mask, modifier-bits, data-type, optional-immediate-data}`.
#[derive(Clone, Debug)]
pub struct SrcOperand {
    pub kind: RegisterKind,
    pub indices: [Option<u32>; 2],
    pub swizzle: Swizzle,
    pub modifier: SourceModifier,
    pub data_type: ComponentType,
    pub immediate: Option<[u32; 4]>,
    /// Open question (b), `spec.md` §9: relative addressing on a resource
    /// or UAV register reference. Surfaced as `Unsupported` wherever it
    /// appears rather than silently ignored.
    pub rel_addr: bool,
}
impl SrcOperand {
    pub fn register(kind: RegisterKind, index: u32) -> Self {
        SrcOperand {
            kind,
            indices: [Some(index), None],
            swizzle: Swizzle::IDENTITY,
            modifier: SourceModifier::None,
            data_type: ComponentType::Float,
            immediate: None,
            rel_addr: false,
        }
    }
    pub fn with_swizzle(mut self, s: Swizzle) -> Self {
        self.swizzle = s;
        self
    }
    pub fn with_modifier(mut self, m: SourceModifier) -> Self {
        self.modifier = m;
        self
    }
    pub fn with_data_type(mut self, t: ComponentType) -> Self {
        self.data_type = t;
        self
    }
    pub fn immediate4(v: [u32; 4]) -> Self {
        SrcOperand {
            kind: RegisterKind::ImmediateConstant,
            indices: [None, None],
            swizzle: Swizzle::IDENTITY,
            modifier: SourceModifier::None,
            data_type: ComponentType::Float,
            immediate: Some(v),
            rel_addr: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DstOperand {
    pub kind: RegisterKind,
    pub indices: [Option<u32>; 2],
    pub mask: WriteMask,
    pub data_type: ComponentType,
    pub rel_addr: bool,
}
impl DstOperand {
    pub fn register(kind: RegisterKind, index: u32, mask: WriteMask) -> Self {
        DstOperand {
            kind,
            indices: [Some(index), None],
            mask,
            data_type: ComponentType::Float,
            rel_addr: false,
        }
    }
    pub fn with_data_type(mut self, t: ComponentType) -> Self {
        self.data_type = t;
        self
    }
}

/// Closed ALU opcode table (`spec.md` §4.G). Arity is implied per variant
/// and checked by the expression emitter.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum AluOp {
    Add,
    IAdd,
    And,
    Or,
    Xor,
    Not,
    Mul,
    IMul,
    Min,
    IMin,
    UMin,
    Max,
    IMax,
    UMax,
    FtoI,
    FtoU,
    ItoF,
    UtoF,
    Ushr,
    Ishr,
    Ishl,
    Rsqrt,
    Sqrt,
    Exp,
    Log,
    Frc,
    RoundNe,
    RoundPi,
    RoundNi,
    RoundZ,
    Mad,
    Eq,
    Ne,
    Lt,
    Ge,
    IEq,
    INe,
    ILt,
    IGe,
    ULt,
    UGe,
}

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum DotOp {
    Dp2,
    Dp3,
    Dp4,
}

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum BitfieldOp {
    Bfi,
    Ibfe,
    Ubfe,
}

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum HalfPackOp {
    F16ToF32,
    F32ToF16,
}

/// Resource dimension, keyed the same way the declaration emitter's fixed
/// table is keyed (`spec.md` §4.F).
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum ResourceDim {
    Buffer,
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture2DMs,
    Texture2DMsArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
}

/// A single DXBC instruction. Declarations are listed first, then the
/// opcode handlers enumerated in `spec.md` §4.G/§4.H, then the
/// `original_source`-only supplements named in `SPEC_FULL.md` §9.
#[derive(Clone, Debug)]
pub enum Instr {
    // -- Declarations (component F input) --
    DclGlobalFlags { flags: u32 },
    DclTemps { count: u32 },
    DclThreadGroup { x: u32, y: u32, z: u32 },
    DclConstantBuffer { reg: u32, space: u32, size_vec4: u32 },
    DclImmediateConstantBuffer { data: Vec<[u32; 4]> },
    DclSampler { reg: u32, space: u32 },
    DclResource { reg: u32, space: u32, dim: ResourceDim, sampled_kind: ComponentType, rel_addr: bool },
    DclUav { reg: u32, space: u32, dim: ResourceDim, sampled_kind: ComponentType, has_counter: bool, rel_addr: bool },
    DclInput { reg: u32, mask: WriteMask },
    DclInputSv { reg: u32, mask: WriteMask, sysval: SysValueSemantic },
    DclOutput { reg: u32, mask: WriteMask },
    DclOutputSv { reg: u32, mask: WriteMask, sysval: SysValueSemantic },

    // -- Data movement / ALU (component G) --
    Mov { dst: DstOperand, src: SrcOperand },
    MovC { dst: DstOperand, cond: SrcOperand, a: SrcOperand, b: SrcOperand },
    SwapC { dst0: DstOperand, dst1: DstOperand, cond: SrcOperand, a: SrcOperand, b: SrcOperand },
    Alu { op: AluOp, dst: DstOperand, srcs: Vec<SrcOperand>, sat: bool },
    Dot { op: DotOp, dst: DstOperand, a: SrcOperand, b: SrcOperand, sat: bool },
    Bitfield { op: BitfieldOp, dst: DstOperand, srcs: Vec<SrcOperand> },
    HalfPack { op: HalfPackOp, dst: DstOperand, src: SrcOperand },
    Udiv { quotient: DstOperand, remainder: DstOperand, a: SrcOperand, b: SrcOperand },
    Umod { dst: DstOperand, a: SrcOperand, b: SrcOperand },

    // -- Resources --
    Sample { dst: DstOperand, coord: SrcOperand, resource: SrcOperand, sampler: SrcOperand, offset: Option<[i32; 3]> },
    Ld { dst: DstOperand, coord: SrcOperand, resource: SrcOperand },
    StoreUavTyped { uav: SrcOperand, coord: SrcOperand, value: SrcOperand },
    ResInfo { dst: DstOperand, mip_level: SrcOperand, resource: SrcOperand },
    SampleInfo { dst: DstOperand, resource: SrcOperand },

    // -- Control flow (component H) --
    IfNz { cond: SrcOperand },
    IfZ { cond: SrcOperand },
    Else,
    EndIf,
    Loop,
    EndLoop,
    Break,
    BreakCNz { cond: SrcOperand },
    BreakCZ { cond: SrcOperand },
    Discard { cond: Option<SrcOperand>, invert: bool },
    Ret,
}

/// Shader execution model, selects SPIR-V's `ExecutionModel` (component I).
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ShaderKind {
    Vertex,
    Fragment,
    TessControl,
    TessEval,
    Geometry,
    Compute,
}

/// A decoded DXBC shader ready for recompilation: the typed instruction
/// stream plus its input/output signature tables (`spec.md` §6).
#[derive(Clone, Debug)]
pub struct ShaderModule {
    pub kind: ShaderKind,
    pub instrs: Vec<Instr>,
    pub input_sig: Vec<SignatureElement>,
    pub output_sig: Vec<SignatureElement>,
}
impl ShaderModule {
    pub fn validate(&self) -> Result<()> {
        if self.instrs.is_empty() {
            bail!(InvalidArgument, "zero-sized shader: no instructions");
        }
        Ok(())
    }
}
