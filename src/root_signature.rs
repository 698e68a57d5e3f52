//! Root-signature description: the input to the Binding Layout translator
//! (component D, `spec.md` §4.D).
use std::ops::BitOr;

/// A shader stage, or all of them. Mirrors D3D12's
/// `D3D12_SHADER_VISIBILITY` enum.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Visibility {
    All,
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
}
impl Visibility {
    /// Enumeration order used by push-constant-range packing
    /// (`spec.md` §4.D rule 3, "per-stage in order of enum").
    pub const STAGE_ORDER: [Visibility; 5] = [
        Visibility::Vertex,
        Visibility::Hull,
        Visibility::Domain,
        Visibility::Geometry,
        Visibility::Pixel,
    ];
    fn stage_bit(self) -> StageMask {
        match self {
            Visibility::All => StageMask::ALL,
            Visibility::Vertex => StageMask::VERTEX,
            Visibility::Hull => StageMask::HULL,
            Visibility::Domain => StageMask::DOMAIN,
            Visibility::Geometry => StageMask::GEOMETRY,
            Visibility::Pixel => StageMask::PIXEL,
        }
    }
}

/// Bitmask over shader stages, used to decide push-constant range overlap
/// (`spec.md` §4.D rule 3, Vulkan's "no stage overlap" rule).
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub struct StageMask(pub u32);
impl StageMask {
    pub const VERTEX: StageMask = StageMask(1 << 0);
    pub const HULL: StageMask = StageMask(1 << 1);
    pub const DOMAIN: StageMask = StageMask(1 << 2);
    pub const GEOMETRY: StageMask = StageMask(1 << 3);
    pub const PIXEL: StageMask = StageMask(1 << 4);
    pub const COMPUTE: StageMask = StageMask(1 << 5);
    pub const ALL: StageMask = StageMask(0b11_1111);

    pub fn of(vis: Visibility) -> StageMask {
        vis.stage_bit()
    }
    pub fn is_all(&self) -> bool {
        *self == StageMask::ALL
    }
}
impl BitOr for StageMask {
    type Output = StageMask;
    fn bitor(self, rhs: StageMask) -> StageMask {
        StageMask(self.0 | rhs.0)
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum RangeKind {
    Srv,
    Uav,
    Cbv,
    Sampler,
}

#[derive(Clone, Debug)]
pub struct DescriptorRange {
    pub kind: RangeKind,
    pub base_register: u32,
    pub register_space: u32,
    pub descriptor_count: u32,
    pub offset_in_table: u32,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, Default)]
pub struct DescriptorTable {
    pub ranges: Vec<DescriptorRange>,
}

#[derive(Clone, Debug)]
pub enum RootParameter {
    DescriptorTable(DescriptorTable),
    RootCbv { register: u32, space: u32, visibility: Visibility },
    RootSrv { register: u32, space: u32, visibility: Visibility },
    RootUav { register: u32, space: u32, visibility: Visibility },
    Constants32Bit { register: u32, space: u32, count: u32, visibility: Visibility },
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Filter {
    Point,
    Linear,
    Anisotropic,
}
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum AddressMode {
    Wrap,
    Mirror,
    Clamp,
    Border,
}
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum CompareOp {
    None,
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Clone, Debug)]
pub struct StaticSamplerDesc {
    pub register: u32,
    pub space: u32,
    pub visibility: Visibility,
    pub filter: Filter,
    pub address_mode: AddressMode,
    pub compare_op: CompareOp,
}

#[derive(Clone, Debug, Default)]
pub struct RootSignatureDesc {
    pub parameters: Vec<RootParameter>,
    pub static_samplers: Vec<StaticSamplerDesc>,
}
