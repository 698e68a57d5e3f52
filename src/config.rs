//! Recompiler-wide tunables (`SPEC_FULL.md` §6 ambient addition).
#[derive(Clone, Debug)]
pub struct RecompilerConfig {
    /// Target SPIR-V version word, written into the assembled module's
    /// header. `spec.md` §6 requires `(1, 0)` output; kept configurable so a
    /// future target bump does not require touching every call site that
    /// assembles a module.
    pub target_spirv_version: (u8, u8),
    /// Whether the host exposes `VK_KHR_push_descriptor`-equivalent
    /// functionality, gating Binding Layout rule 1 (`spec.md` §4.D).
    pub push_descriptors_supported: bool,
    /// Binding-cost budget; `spec.md` §4.D rule 5 fixes this at 64.
    pub max_binding_cost: u32,
    /// When set, the declaration emitter names every variable it mints
    /// (`OpName`, register/sysval-keyed) into the debug stream. Off by
    /// default; `spec.md` §4.A's stream layout does not require it.
    pub debug_names: bool,
}
impl Default for RecompilerConfig {
    fn default() -> Self {
        RecompilerConfig {
            target_spirv_version: (1, 0),
            push_descriptors_supported: false,
            max_binding_cost: 64,
            debug_names: false,
        }
    }
}
