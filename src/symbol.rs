//! Symbol Table & Register File (component E, `spec.md` §4.E). Maps DXBC
//! register references to emitter state. Grounded on the teacher's
//! `var.rs` (`SpirvVariable`/`DescriptorType` carrying locator + type
//! metadata per variable) generalized from "one SPIR-V variable" to "one
//! DXBC register", and on `ty/reg.rs`'s registry-of-records shape.
use fnv::FnvHashMap as HashMap;
use spirv::StorageClass;

use crate::dxbc::{SysValueSemantic, WriteMask};
use crate::error::{bail, Result};
use crate::ty::ScalarKind;

/// Temps are a contiguous block of function-scope 4-component f32 vector
/// variables; temp `i` maps to `base + i` (`spec.md` §4.E), so they need no
/// per-register map entry.
#[derive(Default, Clone, Copy, Debug)]
pub struct TempBlock {
    pub base_id: u32,
    pub count: u32,
}
impl TempBlock {
    pub fn id_of(&self, index: u32) -> Result<u32> {
        if index >= self.count {
            bail!(MalformedBytecode, "temp r{} referenced but only {} declared", index, self.count);
        }
        Ok(self.base_id + index)
    }
}

/// An input or output register (`spec.md` §4.E). `physical_id` is the
/// 4-component `f32` vector ordinary ALU code loads or stores through. For a
/// plain input whose signature shape already is that canonical 4-component
/// float vector, `physical_id` directly names the real `Input` variable and
/// `interface_id` is `None`. For an output, or a system-value input whose
/// natural type differs (a scalar index, a `vec3<uint>`, `bool`, …),
/// `physical_id` names a `Private`-storage staging variable and
/// `interface_id` names the real `Input`/`Output`/builtin-decorated variable
/// the entry-point prologue/epilog (`spec.md` §4.I) copies to or from.
#[derive(Clone, Copy, Debug)]
pub struct IoVariable {
    pub physical_id: u32,
    pub interface_id: Option<u32>,
    pub storage_class: StorageClass,
    pub sysval: SysValueSemantic,
    pub write_mask: WriteMask,
    /// Plane offset into the shared `ClipDistance`/`CullDistance` array this
    /// register was assigned (`SPEC_FULL.md` §9); `None` for every other
    /// register, including every other sysval.
    pub array_offset: Option<u32>,
}

/// A constant-buffer register's binding: either a member of the
/// push-constant struct, or its own uniform-buffer struct
/// (`array<vec4, N>`, std140 stride 16) (`spec.md` §4.E).
#[derive(Clone, Copy, Debug)]
pub struct ConstBufferVariable {
    pub var_id: u32,
    pub storage_class: StorageClass,
    pub is_push_constant: bool,
    pub member_index: u32,
}

/// A resource (SRV/UAV) or sampler register (`spec.md` §3 "resource
/// symbols"): additionally carries the metadata the declaration emitter
/// computed from the fixed resource-kind table (`spec.md` §4.F).
#[derive(Clone, Copy, Debug)]
pub struct ResourceVariable {
    pub var_id: u32,
    pub sampled_scalar_kind: ScalarKind,
    pub image_type_id: u32,
    pub coordinate_component_mask: WriteMask,
    pub is_storage_image: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct SamplerVariable {
    pub var_id: u32,
}

#[derive(Default)]
pub struct SymbolTable {
    pub temps: TempBlock,
    inputs: HashMap<u32, IoVariable>,
    outputs: HashMap<u32, IoVariable>,
    cbuffers: HashMap<u32, ConstBufferVariable>,
    icb_var: Option<u32>,
    resources: HashMap<u32, ResourceVariable>,
    uavs: HashMap<u32, ResourceVariable>,
    samplers: HashMap<u32, SamplerVariable>,
}
impl SymbolTable {
    pub fn declare_temps(&mut self, base_id: u32, count: u32) {
        self.temps = TempBlock { base_id, count };
    }

    pub fn insert_input(&mut self, reg: u32, var: IoVariable) {
        self.inputs.insert(reg, var);
    }
    pub fn input(&self, reg: u32) -> Result<&IoVariable> {
        self.inputs
            .get(&reg)
            .ok_or_else(|| crate::error::Error::LayoutMismatch(format!("input v{} not declared", reg)))
    }

    pub fn insert_output(&mut self, reg: u32, var: IoVariable) {
        self.outputs.insert(reg, var);
    }
    pub fn output(&self, reg: u32) -> Result<&IoVariable> {
        self.outputs
            .get(&reg)
            .ok_or_else(|| crate::error::Error::LayoutMismatch(format!("output o{} not declared", reg)))
    }
    pub fn outputs(&self) -> impl Iterator<Item = (&u32, &IoVariable)> {
        self.outputs.iter()
    }

    pub fn insert_cbuffer(&mut self, reg: u32, var: ConstBufferVariable) {
        self.cbuffers.insert(reg, var);
    }
    pub fn cbuffer(&self, reg: u32) -> Result<&ConstBufferVariable> {
        self.cbuffers
            .get(&reg)
            .ok_or_else(|| crate::error::Error::LayoutMismatch(format!("cb{} not declared", reg)))
    }

    pub fn set_icb(&mut self, var_id: u32) {
        self.icb_var = Some(var_id);
    }
    pub fn icb(&self) -> Result<u32> {
        self.icb_var
            .ok_or_else(|| crate::error::Error::MalformedBytecode("immediate constant buffer read but never declared".to_owned()))
    }

    pub fn insert_resource(&mut self, reg: u32, var: ResourceVariable) {
        self.resources.insert(reg, var);
    }
    pub fn resource(&self, reg: u32) -> Result<&ResourceVariable> {
        self.resources
            .get(&reg)
            .ok_or_else(|| crate::error::Error::LayoutMismatch(format!("t{} not declared", reg)))
    }

    pub fn insert_uav(&mut self, reg: u32, var: ResourceVariable) {
        self.uavs.insert(reg, var);
    }
    pub fn uav(&self, reg: u32) -> Result<&ResourceVariable> {
        self.uavs
            .get(&reg)
            .ok_or_else(|| crate::error::Error::LayoutMismatch(format!("u{} not declared", reg)))
    }

    pub fn insert_sampler(&mut self, reg: u32, var: SamplerVariable) {
        self.samplers.insert(reg, var);
    }
    pub fn sampler(&self, reg: u32) -> Result<&SamplerVariable> {
        self.samplers
            .get(&reg)
            .ok_or_else(|| crate::error::Error::LayoutMismatch(format!("s{} not declared", reg)))
    }
}
