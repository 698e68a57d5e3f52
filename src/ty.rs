//! SPIR-V-side type vocabulary used as dedup-cache keys (component B).
use spirv::{Dim, ImageFormat};

/// Scalar kinds the cache and register file deal in. DXBC's register file is
/// untyped (everything is a 32-bit word reinterpreted per-instruction); this
/// enum only ever takes the three forms the recompiler materializes as
/// `OpType{Int,Float}` declarations.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum ScalarKind {
    I32,
    U32,
    F32,
    Bool,
}
impl ScalarKind {
    pub fn is_signed(&self) -> bool {
        matches!(self, ScalarKind::I32)
    }
}

/// Key shape for the image type cache entry, mirroring `OpTypeImage`'s fixed
/// operand order (sampled-type is carried alongside, not part of this key,
/// since it is itself a cached id).
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct ImageShape {
    pub dim: DimKey,
    pub depth: bool,
    pub arrayed: bool,
    pub multisampled: bool,
    /// 1 = sampled (texture), 2 = storage (UAV).
    pub sampled: u32,
    pub format: ImageFormatKey,
}

/// `spirv::Dim` does not implement `Hash`/`Eq` in every released version; we
/// keep our own small mirror so the cache key stays structural.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum DimKey {
    Dim1D,
    Dim2D,
    Dim3D,
    Cube,
    Buffer,
    SubpassData,
}
impl DimKey {
    pub fn to_spirv(self) -> Dim {
        match self {
            DimKey::Dim1D => Dim::Dim1D,
            DimKey::Dim2D => Dim::Dim2D,
            DimKey::Dim3D => Dim::Dim3D,
            DimKey::Cube => Dim::DimCube,
            DimKey::Buffer => Dim::DimBuffer,
            DimKey::SubpassData => Dim::DimSubpassData,
        }
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum ImageFormatKey {
    Unknown,
}
impl ImageFormatKey {
    pub fn to_spirv(self) -> ImageFormat {
        match self {
            ImageFormatKey::Unknown => ImageFormat::Unknown,
        }
    }
}
