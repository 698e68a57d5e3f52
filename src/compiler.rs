//! The recompiler's per-call state (`spec.md` §5): one `Recompiler` is
//! built, driven instruction-by-instruction, and torn down within a single
//! `recompile()` call. Declaration (`decl.rs`), expression (`expr.rs`),
//! control-flow (`control_flow.rs`) and entry-point (`entry_point.rs`)
//! emission are each implemented as an `impl<'a> Recompiler<'a>` block in
//! their own module, all operating on this shared state.
use crate::binding::BindingLayout;
use crate::config::RecompilerConfig;
use crate::control_flow::ControlFlowStack;
use crate::dxbc::ShaderKind;
use crate::cache::TypeCache;
use crate::scanner::ScanReport;
use crate::symbol::SymbolTable;
use crate::writer::ModuleWriter;

/// A `(register_index, set, binding)` triple for a UAV counter the shader
/// actually uses (`spec.md` §6 "Output: reflection data").
#[derive(Clone, Copy, Debug)]
pub struct CounterBinding {
    pub register_index: u32,
    pub set: u32,
    pub binding: u32,
}

/// A builtin-to-canonical-register copy the entry-point prologue
/// (`spec.md` §4.I) must perform before the shader body runs, because the
/// builtin's natural type is narrower than the 4-component `f32` every
/// register read/write otherwise assumes.
#[derive(Clone, Copy, Debug)]
pub enum PrologueCopy {
    /// A plain scalar/vector builtin (`VertexId`, `GlobalInvocationId`, ...):
    /// one `Load` of `real_var`, bitcast to `f32`, zero-filled to width 4.
    Builtin { real_var: u32, staging_var: u32, scalar: crate::ty::ScalarKind, width: u32 },
    /// A sub-range of the shared `ClipDistance`/`CullDistance` array
    /// (`SPEC_FULL.md` §9): `count` consecutive `f32` elements starting at
    /// `offset`, each loaded with its own `AccessChain`, then packed into
    /// the canonical vec4 with the unused lanes zero-filled.
    ClipCullArray { array_var: u32, offset: u32, count: u32, staging_var: u32 },
}

/// Lazily-minted shared `ClipDistance`/`CullDistance` builtin array
/// variables and the running plane-offset counters assigning each
/// contributing DXBC register its sub-range, one pair per direction
/// (`SPEC_FULL.md` §9 — SPIR-V has exactly one array per builtin per entry
/// point, not one per DXBC register).
#[derive(Default)]
pub struct ClipCullState {
    pub in_clip_var: Option<u32>,
    pub in_clip_next: u32,
    pub out_clip_var: Option<u32>,
    pub out_clip_next: u32,
    pub in_cull_var: Option<u32>,
    pub in_cull_next: u32,
    pub out_cull_var: Option<u32>,
    pub out_cull_next: u32,
}

pub struct Recompiler<'a> {
    pub config: RecompilerConfig,
    pub binding_layout: &'a BindingLayout,
    pub scan: ScanReport,
    pub kind: ShaderKind,

    pub writer: ModuleWriter,
    pub cache: TypeCache,
    pub symtab: SymbolTable,
    pub cf: ControlFlowStack,

    pub thread_group_size: Option<(u32, u32, u32)>,
    /// Input/Output variables allocated during declaration emission, in
    /// insertion order (`spec.md` §4.I, dedup not required).
    pub interface_ids: Vec<u32>,
    pub main_id: u32,
    /// Output register indices that were staged into a private variable and
    /// so need the epilog's packing treatment (`spec.md` §4.I).
    pub staged_outputs: Vec<u32>,
    pub counter_bindings: Vec<CounterBinding>,
    /// Lazily-created `PushConstant`-class struct variable backing every
    /// `cb#` register the Binding Layout routed to `push_constants`
    /// (`spec.md` §4.F). `None` until the first such register is declared.
    pub push_const_var: Option<u32>,
    pub push_const_words: u32,
    pub input_prologue_copies: Vec<PrologueCopy>,
    pub clip_cull: ClipCullState,
    /// Lazily-created physical ids for the compute-only special registers
    /// addressed directly by `RegisterKind` rather than through a `dcl_input`
    /// declaration (`vThreadID`, `vThreadIDInGroup`, ...), keyed by
    /// `RegisterKind as` discriminant via `crate::expr::special_register_key`.
    pub special_registers: fnv::FnvHashMap<u8, u32>,

    // Commonly reused type ids.
    pub void_ty: u32,
    pub f32_ty: u32,
    pub u32_ty: u32,
    pub i32_ty: u32,
    pub vec4_f32_ty: u32,
}
impl<'a> Recompiler<'a> {
    pub fn new(
        config: RecompilerConfig,
        binding_layout: &'a BindingLayout,
        scan: ScanReport,
        kind: ShaderKind,
    ) -> crate::error::Result<Self> {
        let mut writer = ModuleWriter::default();
        let mut cache = TypeCache::default();
        let void_ty = cache.get_void(&mut writer)?;
        let f32_ty = cache.get_scalar(&mut writer, crate::ty::ScalarKind::F32)?;
        let u32_ty = cache.get_scalar(&mut writer, crate::ty::ScalarKind::U32)?;
        let i32_ty = cache.get_scalar(&mut writer, crate::ty::ScalarKind::I32)?;
        let vec4_f32_ty = cache.get_vector(&mut writer, f32_ty, 4)?;
        let main_id = writer.alloc_id();

        Ok(Recompiler {
            config,
            binding_layout,
            scan,
            kind,
            writer,
            cache,
            symtab: SymbolTable::default(),
            cf: ControlFlowStack::default(),
            thread_group_size: None,
            interface_ids: Vec::new(),
            main_id,
            staged_outputs: Vec::new(),
            counter_bindings: Vec::new(),
            push_const_var: None,
            push_const_words: 0,
            input_prologue_copies: Vec::new(),
            clip_cull: ClipCullState::default(),
            special_registers: fnv::FnvHashMap::default(),
            void_ty,
            f32_ty,
            u32_ty,
            i32_ty,
            vec4_f32_ty,
        })
    }
}
