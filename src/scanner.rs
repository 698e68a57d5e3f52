//! DXBC Scanner (component C, `spec.md` §4.C). A pre-pass over the
//! instruction stream collecting facts the declaration emitter (F) needs
//! before it reaches the corresponding declaration — chiefly, whether a UAV
//! carries an atomic-counter use, since the counter-descriptor layout must
//! be decided before any IR is emitted.
use fnv::FnvHashSet as HashSet;

use crate::dxbc::{Instr, ResourceDim, ShaderModule, SysValueSemantic, WriteMask};
use crate::error::Result;

#[derive(Default, Debug, Clone)]
pub struct ScanReport {
    /// UAV register indices with an atomic-counter use.
    pub uav_counter_mask: HashSet<u32>,
    /// Resource dimension declared for each resource/UAV register index.
    pub resource_type_mask: fnv::FnvHashMap<u32, ResourceDim>,
    /// Whether any instruction in the entry point performs an
    /// `OpImageFetch`-class access without an explicit source-API sampler
    /// (`spec.md` §4.D rule 4 / `SPEC_FULL.md` §9).
    pub uses_image_fetch: bool,
    /// Total plane count declared across every `SV_ClipDistance`/
    /// `SV_CullDistance` input/output register (`SPEC_FULL.md` §9). SPIR-V
    /// has exactly one `ClipDistance`/`CullDistance` builtin array per
    /// direction per entry point, sized to the sum of every DXBC register's
    /// declared plane count; the declaration emitter needs this total before
    /// it can mint the array, which may happen before every contributing
    /// register has been declared.
    pub clip_distance_in_total: u32,
    pub clip_distance_out_total: u32,
    pub cull_distance_in_total: u32,
    pub cull_distance_out_total: u32,
}

/// Walks `module.instrs` once without emitting IR. Per `spec.md` §4.C,
/// malformed-instruction truncation is a decode-time failure; by the time a
/// `ShaderModule` exists its instructions are already well-typed, so the one
/// failure this pass can still raise is the relative-addressing rejection
/// below (open question (b), `spec.md` §9).
pub fn scan(module: &ShaderModule) -> Result<ScanReport> {
    let mut report = ScanReport::default();

    for instr in &module.instrs {
        match instr {
            Instr::DclResource { reg, dim, rel_addr, .. } => {
                reject_rel_addr(*rel_addr, "resource", *reg)?;
                report.resource_type_mask.insert(*reg, *dim);
            }
            Instr::DclUav { reg, dim, has_counter, rel_addr, .. } => {
                reject_rel_addr(*rel_addr, "UAV", *reg)?;
                report.resource_type_mask.insert(*reg, *dim);
                if *has_counter {
                    report.uav_counter_mask.insert(*reg);
                }
            }
            Instr::Ld { .. } | Instr::ResInfo { .. } | Instr::SampleInfo { .. } => {
                report.uses_image_fetch = true;
            }
            Instr::DclInputSv { mask, sysval: SysValueSemantic::ClipDistance, .. } => {
                report.clip_distance_in_total += plane_count(*mask);
            }
            Instr::DclOutputSv { mask, sysval: SysValueSemantic::ClipDistance, .. } => {
                report.clip_distance_out_total += plane_count(*mask);
            }
            Instr::DclInputSv { mask, sysval: SysValueSemantic::CullDistance, .. } => {
                report.cull_distance_in_total += plane_count(*mask);
            }
            Instr::DclOutputSv { mask, sysval: SysValueSemantic::CullDistance, .. } => {
                report.cull_distance_out_total += plane_count(*mask);
            }
            Instr::Sample { offset: Some(_), .. } => {
                // Open question (a), `spec.md` §9: the source silently
                // dropped texel offsets; we refuse to miscompile them.
                crate::error::bail!(
                    Unsupported,
                    "texel offsets on sample instructions are not supported"
                );
            }
            _ => {}
        }
    }

    Ok(report)
}

fn plane_count(mask: WriteMask) -> u32 {
    mask.popcount()
}

fn reject_rel_addr(rel_addr: bool, what: &str, reg: u32) -> Result<()> {
    if rel_addr {
        crate::error::bail!(
            Unsupported,
            "relative addressing on {} register {} declarations is not supported",
            what,
            reg
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dxbc::{ComponentType, ShaderKind};

    fn module(instrs: Vec<Instr>) -> ShaderModule {
        ShaderModule { kind: ShaderKind::Compute, instrs, input_sig: vec![], output_sig: vec![] }
    }

    #[test]
    fn uav_counter_flag_is_collected() {
        let m = module(vec![Instr::DclUav {
            reg: 0,
            space: 0,
            dim: ResourceDim::Buffer,
            sampled_kind: ComponentType::Uint,
            has_counter: true,
            rel_addr: false,
        }]);
        let report = scan(&m).unwrap();
        assert!(report.uav_counter_mask.contains(&0));
    }

    #[test]
    fn rel_addr_on_resource_is_rejected() {
        let m = module(vec![Instr::DclResource {
            reg: 0,
            space: 0,
            dim: ResourceDim::Texture2D,
            sampled_kind: ComponentType::Float,
            rel_addr: true,
        }]);
        assert!(matches!(
            scan(&m).unwrap_err(),
            crate::error::Error::Unsupported(_)
        ));
    }

    #[test]
    fn texel_offset_on_sample_is_rejected() {
        use crate::dxbc::{DstOperand, RegisterKind, SrcOperand, WriteMask};
        let m = module(vec![Instr::Sample {
            dst: DstOperand::register(RegisterKind::Temp, 0, WriteMask::XYZW),
            coord: SrcOperand::register(RegisterKind::Input, 0),
            resource: SrcOperand::register(RegisterKind::Resource, 0),
            sampler: SrcOperand::register(RegisterKind::Sampler, 0),
            offset: Some([1, 0, 0]),
        }]);
        assert!(matches!(
            scan(&m).unwrap_err(),
            crate::error::Error::Unsupported(_)
        ));
    }
}
