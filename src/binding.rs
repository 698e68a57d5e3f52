//! Binding Layout (component D, `spec.md` §4.D). Translates a
//! root-signature description into `(set, binding)` tuples, push-constant
//! ranges, and static-sampler bindings. Grounded on the teacher's
//! `locator.rs::DescriptorBinding` newtype for the `(set, binding)` pair
//! this component ultimately hands out.
use crate::config::RecompilerConfig;
use crate::error::{bail, Result};
use crate::root_signature::{
    CompareOp, DescriptorTable, Filter, RangeKind, RootParameter, RootSignatureDesc,
    StageMask, StaticSamplerDesc, Visibility,
};

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum DescriptorKind {
    Cbv,
    Srv,
    Uav,
    Sampler,
}

/// `(set, binding)` pair, mirroring the teacher's `DescriptorBinding`
/// newtype (`locator.rs`).
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct SetBinding {
    pub set: u32,
    pub binding: u32,
}

#[derive(Clone, Debug)]
pub struct BindingEntry {
    pub kind: DescriptorKind,
    pub register_space: u32,
    pub register_index: u32,
    pub loc: SetBinding,
    /// True for the buffer-view variant of an SRV/UAV that may be either a
    /// buffer or an image view (`spec.md` §4.D rule 2).
    pub is_buffer_view: bool,
    /// True for a UAV's auxiliary atomic-counter binding (`spec.md` §4.D
    /// rule 2, third binding). Never set for CBV/SRV/Sampler entries.
    pub is_counter: bool,
}

#[derive(Clone, Debug)]
pub struct PushConstantRange {
    pub stage_mask: StageMask,
    pub byte_offset: u32,
    pub byte_size: u32,
}

#[derive(Clone, Debug)]
pub struct RootConstant {
    pub register_index: u32,
    pub stage_visibility: Visibility,
    pub byte_offset: u32,
    pub byte_size: u32,
}

#[derive(Clone, Debug)]
pub struct StaticSamplerBinding {
    pub register_index: u32,
    pub register_space: u32,
    pub loc: SetBinding,
    pub filter: Filter,
    pub address_mode: crate::root_signature::AddressMode,
    pub compare_op: CompareOp,
}

#[derive(Clone, Debug, Default)]
pub struct BindingLayout {
    pub bindings: Vec<BindingEntry>,
    pub push_constants: Vec<PushConstantRange>,
    pub root_constants: Vec<RootConstant>,
    pub static_samplers: Vec<StaticSamplerBinding>,
}
impl BindingLayout {
    /// Looks up the entry for `(kind, space, index)`, returning the buffer
    /// or image variant as requested when the descriptor was doubled
    /// (`spec.md` §4.D rule 2).
    pub fn find(
        &self,
        kind: DescriptorKind,
        space: u32,
        index: u32,
        want_buffer_view: bool,
    ) -> Option<&BindingEntry> {
        self.bindings.iter().find(|b| {
            b.kind == kind
                && b.register_space == space
                && b.register_index == index
                && b.is_buffer_view == want_buffer_view
                && !b.is_counter
        })
    }

    /// The auxiliary atomic-counter binding for UAV `u#` register `index`,
    /// if that UAV declared one (`spec.md` §4.D rule 2, third binding).
    pub fn find_uav_counter(&self, space: u32, index: u32) -> Option<&BindingEntry> {
        self.bindings.iter().find(|b| {
            b.kind == DescriptorKind::Uav
                && b.register_space == space
                && b.register_index == index
                && b.is_counter
        })
    }

    pub fn build(
        desc: &RootSignatureDesc,
        config: &RecompilerConfig,
        uses_image_fetch: bool,
    ) -> Result<BindingLayout> {
        let mut layout = BindingLayout::default();
        let mut cost: u64 = 0;

        // Rule 1: set assignment.
        let (root_desc_set, table_set, counter_set) = if config.push_descriptors_supported {
            (0u32, 1u32, 2u32)
        } else {
            (0u32, 0u32, 0u32)
        };

        let mut next_table_binding = 0u32;
        let mut alloc_table_binding = |n: u32| {
            let b = next_table_binding;
            next_table_binding += n;
            b
        };

        // Root descriptors (root-CBV/SRV/UAV) and 32-bit constants.
        let mut any_visibility_all = false;
        let mut per_stage_constants: Vec<(Visibility, u32, u32)> = Vec::new(); // (stage, reg, nbytes)

        for param in &desc.parameters {
            match param {
                RootParameter::RootCbv { register, space, visibility }
                | RootParameter::RootSrv { register, space, visibility }
                | RootParameter::RootUav { register, space, visibility } => {
                    let kind = match param {
                        RootParameter::RootCbv { .. } => DescriptorKind::Cbv,
                        RootParameter::RootSrv { .. } => DescriptorKind::Srv,
                        RootParameter::RootUav { .. } => DescriptorKind::Uav,
                        _ => unreachable!(),
                    };
                    let _ = visibility;
                    let binding = alloc_table_binding(1);
                    layout.bindings.push(BindingEntry {
                        kind,
                        register_space: *space,
                        register_index: *register,
                        loc: SetBinding { set: root_desc_set, binding },
                        is_buffer_view: true,
                        is_counter: false,
                    });
                    cost += 2;
                }
                RootParameter::Constants32Bit { register, space: _, count, visibility } => {
                    if *visibility == Visibility::All {
                        any_visibility_all = true;
                    }
                    per_stage_constants.push((*visibility, *register, count * 4));
                    cost += *count as u64;
                }
                RootParameter::DescriptorTable(_) => {}
            }
        }

        // Rule 3: push-constant packing.
        if any_visibility_all || per_stage_constants.len() <= 1 {
            if let Some(total) = per_stage_constants.iter().map(|(_, _, n)| *n).reduce(|a, b| a + b)
            {
                layout.push_constants.push(PushConstantRange {
                    stage_mask: StageMask::ALL,
                    byte_offset: 0,
                    byte_size: total,
                });
            }
        } else {
            let mut offset = 0u32;
            for stage in Visibility::STAGE_ORDER {
                if let Some((_, _, nbytes)) = per_stage_constants.iter().find(|(v, _, _)| *v == stage)
                {
                    layout.push_constants.push(PushConstantRange {
                        stage_mask: StageMask::of(stage),
                        byte_offset: offset,
                        byte_size: *nbytes,
                    });
                    offset += nbytes;
                }
            }
        }
        if layout.push_constants.len() > Visibility::STAGE_ORDER.len() {
            bail!(
                CapacityExceeded,
                "{} push-constant ranges exceeds the {}-stage budget",
                layout.push_constants.len(),
                Visibility::STAGE_ORDER.len()
            );
        }
        {
            let mut offset = 0u32;
            for (vis, reg, nbytes) in &per_stage_constants {
                layout.root_constants.push(RootConstant {
                    register_index: *reg,
                    stage_visibility: *vis,
                    byte_offset: offset,
                    byte_size: *nbytes,
                });
                offset += nbytes;
            }
        }

        // Descriptor tables.
        for param in &desc.parameters {
            let table: &DescriptorTable = match param {
                RootParameter::DescriptorTable(t) => t,
                _ => continue,
            };
            cost += 1;
            for range in &table.ranges {
                if range.register_space != 0 {
                    bail!(
                        Unsupported,
                        "non-zero register space {} is not supported by this target",
                        range.register_space
                    );
                }
                match range.kind {
                    RangeKind::Cbv => {
                        let binding = alloc_table_binding(range.descriptor_count);
                        layout.bindings.push(BindingEntry {
                            kind: DescriptorKind::Cbv,
                            register_space: range.register_space,
                            register_index: range.base_register,
                            loc: SetBinding { set: table_set, binding },
                            is_buffer_view: true,
                            is_counter: false,
                        });
                    }
                    RangeKind::Sampler => {
                        let binding = alloc_table_binding(range.descriptor_count);
                        layout.bindings.push(BindingEntry {
                            kind: DescriptorKind::Sampler,
                            register_space: range.register_space,
                            register_index: range.base_register,
                            loc: SetBinding { set: table_set, binding },
                            is_buffer_view: true,
                            is_counter: false,
                        });
                    }
                    RangeKind::Srv | RangeKind::Uav => {
                        // Rule 2: binding doubling — buffer variant then
                        // image variant, two consecutive bindings.
                        let kind = if range.kind == RangeKind::Srv {
                            DescriptorKind::Srv
                        } else {
                            DescriptorKind::Uav
                        };
                        let buf_binding = alloc_table_binding(range.descriptor_count);
                        let img_binding = alloc_table_binding(range.descriptor_count);
                        layout.bindings.push(BindingEntry {
                            kind,
                            register_space: range.register_space,
                            register_index: range.base_register,
                            loc: SetBinding { set: table_set, binding: buf_binding },
                            is_buffer_view: true,
                            is_counter: false,
                        });
                        layout.bindings.push(BindingEntry {
                            kind,
                            register_space: range.register_space,
                            register_index: range.base_register,
                            loc: SetBinding { set: table_set, binding: img_binding },
                            is_buffer_view: false,
                            is_counter: false,
                        });
                        if range.kind == RangeKind::Uav {
                            // UAV atomic-counter auxiliary binding, one per
                            // UAV register, landing in the counter set.
                            let counter_binding = alloc_table_binding(range.descriptor_count);
                            layout.bindings.push(BindingEntry {
                                kind: DescriptorKind::Uav,
                                register_space: range.register_space,
                                register_index: range.base_register,
                                loc: SetBinding { set: counter_set, binding: counter_binding },
                                is_buffer_view: true,
                                is_counter: true,
                            });
                        }
                    }
                }
            }
        }

        // Rule 4: static samplers.
        for sampler in &desc.static_samplers {
            let binding = alloc_table_binding(1);
            layout.static_samplers.push(StaticSamplerBinding {
                register_index: sampler.register,
                register_space: sampler.space,
                loc: SetBinding { set: table_set, binding },
                filter: sampler.filter,
                address_mode: sampler.address_mode,
                compare_op: sampler.compare_op,
            });
            cost += 1;
        }
        if uses_image_fetch {
            let binding = alloc_table_binding(1);
            layout.static_samplers.push(default_point_clamp_sampler(table_set, binding));
            cost += 1;
        }

        if cost > config.max_binding_cost as u64 {
            bail!(
                InvalidArgument,
                "root-signature cost {} exceeds the {}-slot budget",
                cost,
                config.max_binding_cost
            );
        }

        Ok(layout)
    }
}

fn default_point_clamp_sampler(set: u32, binding: u32) -> StaticSamplerBinding {
    StaticSamplerBinding {
        register_index: u32::MAX,
        register_space: u32::MAX,
        loc: SetBinding { set, binding },
        filter: Filter::Point,
        address_mode: crate::root_signature::AddressMode::Clamp,
        compare_op: CompareOp::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root_signature::{DescriptorRange, RangeKind};

    #[test]
    fn root_cbv_costs_two_slots() {
        let desc = RootSignatureDesc {
            parameters: vec![RootParameter::RootCbv {
                register: 0,
                space: 0,
                visibility: Visibility::All,
            }],
            static_samplers: vec![],
        };
        let layout = BindingLayout::build(&desc, &RecompilerConfig::default(), false).unwrap();
        assert_eq!(layout.bindings.len(), 1);
        assert!(layout
            .find(DescriptorKind::Cbv, 0, 0, true)
            .is_some());
    }

    #[test]
    fn srv_in_table_gets_two_bindings() {
        let desc = RootSignatureDesc {
            parameters: vec![RootParameter::DescriptorTable(DescriptorTable {
                ranges: vec![DescriptorRange {
                    kind: RangeKind::Srv,
                    base_register: 0,
                    register_space: 0,
                    descriptor_count: 1,
                    offset_in_table: 0,
                    visibility: Visibility::Pixel,
                }],
            })],
            static_samplers: vec![],
        };
        let layout = BindingLayout::build(&desc, &RecompilerConfig::default(), false).unwrap();
        let buf = layout.find(DescriptorKind::Srv, 0, 0, true).unwrap();
        let img = layout.find(DescriptorKind::Srv, 0, 0, false).unwrap();
        assert_ne!(buf.loc.binding, img.loc.binding);
    }

    #[test]
    fn cost_overrun_is_rejected() {
        let params: Vec<_> = (0..40)
            .map(|i| RootParameter::RootCbv {
                register: i,
                space: 0,
                visibility: Visibility::All,
            })
            .collect();
        let desc = RootSignatureDesc { parameters: params, static_samplers: vec![] };
        let err = BindingLayout::build(&desc, &RecompilerConfig::default(), false).unwrap_err();
        assert!(matches!(err, crate::error::Error::InvalidArgument(_)));
    }

    #[test]
    fn image_fetch_appends_default_sampler() {
        let desc = RootSignatureDesc::default();
        let layout = BindingLayout::build(&desc, &RecompilerConfig::default(), true).unwrap();
        assert_eq!(layout.static_samplers.len(), 1);
    }
}
