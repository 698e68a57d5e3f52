//! Type/Constant/Decoration Cache (component B). Grounded on the teacher's
//! `ty/reg.rs::TypeRegistry`, but inverted: the teacher's registry maps an
//! id to a type it already read off the wire; ours maps a structural key to
//! an id it is about to mint, so that repeated requests for "the same"
//! declaration collapse onto one `OpType*`/`OpConstant*` instruction.
use fnv::FnvHashMap as HashMap;
use spirv::{Decoration, Op, StorageClass};

use crate::error::Result;
use crate::ty::{ImageShape, ScalarKind};
use crate::writer::{ModuleWriter, StreamSel};

/// Cache key: `(opcode, operand-ids…)`, `n <= 7` per `spec.md` §3. Operand
/// ids are themselves canonicalized (they came out of this same cache), so
/// structural equality over the tuple is sufficient.
type CacheKey = (u32, [u32; 7], u8);

fn key(opcode: Op, operands: &[u32]) -> CacheKey {
    assert!(operands.len() <= 7, "cache key only supports <= 7 operands");
    let mut arr = [0u32; 7];
    arr[..operands.len()].copy_from_slice(operands);
    (opcode as u32, arr, operands.len() as u8)
}

#[derive(Default)]
pub struct TypeCache {
    decls: HashMap<CacheKey, u32>,
    decorated: std::collections::HashSet<(u32, u32, Decoration)>,
}
impl TypeCache {
    fn get_or_build(
        &mut self,
        writer: &mut ModuleWriter,
        opcode: Op,
        operands: &[u32],
    ) -> Result<u32> {
        let k = key(opcode, operands);
        if let Some(id) = self.decls.get(&k) {
            return Ok(*id);
        }
        let id = writer.emit_r(StreamSel::Globals, opcode, operands)?;
        self.decls.insert(k, id);
        Ok(id)
    }

    pub fn get_void(&mut self, writer: &mut ModuleWriter) -> Result<u32> {
        self.get_or_build(writer, Op::TypeVoid, &[])
    }

    pub fn get_bool(&mut self, writer: &mut ModuleWriter) -> Result<u32> {
        self.get_or_build(writer, Op::TypeBool, &[])
    }

    pub fn get_scalar(&mut self, writer: &mut ModuleWriter, kind: ScalarKind) -> Result<u32> {
        match kind {
            ScalarKind::Bool => self.get_bool(writer),
            ScalarKind::F32 => self.get_or_build(writer, Op::TypeFloat, &[32]),
            ScalarKind::I32 => self.get_or_build(writer, Op::TypeInt, &[32, 1]),
            ScalarKind::U32 => self.get_or_build(writer, Op::TypeInt, &[32, 0]),
        }
    }

    pub fn get_vector(
        &mut self,
        writer: &mut ModuleWriter,
        element: u32,
        count: u32,
    ) -> Result<u32> {
        debug_assert!((2..=4).contains(&count));
        self.get_or_build(writer, Op::TypeVector, &[element, count])
    }

    pub fn get_array(
        &mut self,
        writer: &mut ModuleWriter,
        element: u32,
        length_const: u32,
    ) -> Result<u32> {
        self.get_or_build(writer, Op::TypeArray, &[element, length_const])
    }

    pub fn get_struct(&mut self, writer: &mut ModuleWriter, members: &[u32]) -> Result<u32> {
        self.get_or_build(writer, Op::TypeStruct, members)
    }

    pub fn get_pointer(
        &mut self,
        writer: &mut ModuleWriter,
        storage_class: StorageClass,
        pointee: u32,
    ) -> Result<u32> {
        self.get_or_build(writer, Op::TypePointer, &[storage_class as u32, pointee])
    }

    pub fn get_image(
        &mut self,
        writer: &mut ModuleWriter,
        sampled_kind: u32,
        shape: ImageShape,
    ) -> Result<u32> {
        let operands = [
            sampled_kind,
            shape.dim.to_spirv() as u32,
            shape.depth as u32,
            shape.arrayed as u32,
            shape.multisampled as u32,
            shape.sampled,
            shape.format.to_spirv() as u32,
        ];
        self.get_or_build(writer, Op::TypeImage, &operands)
    }

    pub fn get_sampled_image(&mut self, writer: &mut ModuleWriter, image: u32) -> Result<u32> {
        self.get_or_build(writer, Op::TypeSampledImage, &[image])
    }

    pub fn get_sampler(&mut self, writer: &mut ModuleWriter) -> Result<u32> {
        self.get_or_build(writer, Op::TypeSampler, &[])
    }

    pub fn get_function_type(&mut self, writer: &mut ModuleWriter, ret_ty: u32, params: &[u32]) -> Result<u32> {
        let mut operands = Vec::with_capacity(1 + params.len());
        operands.push(ret_ty);
        operands.extend_from_slice(params);
        self.get_or_build(writer, Op::TypeFunction, &operands)
    }

    /// `value_word` is the constant's raw bit pattern reinterpreted as `u32`
    /// (DXBC immediates are already 32-bit words; this cache does not widen
    /// or narrow them).
    pub fn get_constant(&mut self, writer: &mut ModuleWriter, ty: u32, value_word: u32) -> Result<u32> {
        self.get_or_build(writer, Op::Constant, &[ty, value_word])
    }

    pub fn get_constant_composite(
        &mut self,
        writer: &mut ModuleWriter,
        ty: u32,
        constituents: &[u32],
    ) -> Result<u32> {
        let mut operands = Vec::with_capacity(1 + constituents.len());
        operands.push(ty);
        operands.extend_from_slice(constituents);
        self.get_or_build(writer, Op::ConstantComposite, &operands)
    }

    /// Emits `OpDecorate target deco params…` at most once per
    /// `(target, deco)` pair; later calls with the same pair are no-ops.
    /// This is the "Decoration" half of the cache's name: multiple emitter
    /// call sites can request the same decoration on the same id without
    /// the module growing a duplicate annotation.
    pub fn decorate(
        &mut self,
        writer: &mut ModuleWriter,
        target: u32,
        deco: Decoration,
        params: &[u32],
    ) -> Result<()> {
        if !self.decorated.insert((target, 0, deco)) {
            return Ok(());
        }
        let mut operands = Vec::with_capacity(2 + params.len());
        operands.push(target);
        operands.push(deco as u32);
        operands.extend_from_slice(params);
        ModuleWriter::emit_op(&mut writer.annotations, Op::Decorate, &operands)
    }

    pub fn member_decorate(
        &mut self,
        writer: &mut ModuleWriter,
        target: u32,
        member: u32,
        deco: Decoration,
        params: &[u32],
    ) -> Result<()> {
        if !self.decorated.insert((target, member + 1, deco)) {
            return Ok(());
        }
        let mut operands = Vec::with_capacity(3 + params.len());
        operands.push(target);
        operands.push(member);
        operands.push(deco as u32);
        operands.extend_from_slice(params);
        ModuleWriter::emit_op(&mut writer.annotations, Op::MemberDecorate, &operands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_requests_dedup_to_one_id() {
        let mut writer = ModuleWriter::default();
        let mut cache = TypeCache::default();
        let a = cache.get_scalar(&mut writer, ScalarKind::F32).unwrap();
        let b = cache.get_scalar(&mut writer, ScalarKind::F32).unwrap();
        assert_eq!(a, b);
        let c = cache.get_scalar(&mut writer, ScalarKind::I32).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn vector_of_distinct_elements_get_distinct_ids() {
        let mut writer = ModuleWriter::default();
        let mut cache = TypeCache::default();
        let f32_ty = cache.get_scalar(&mut writer, ScalarKind::F32).unwrap();
        let u32_ty = cache.get_scalar(&mut writer, ScalarKind::U32).unwrap();
        let v1 = cache.get_vector(&mut writer, f32_ty, 4).unwrap();
        let v2 = cache.get_vector(&mut writer, f32_ty, 4).unwrap();
        let v3 = cache.get_vector(&mut writer, u32_ty, 4).unwrap();
        assert_eq!(v1, v2);
        assert_ne!(v1, v3);
    }

    #[test]
    fn decorate_is_idempotent_per_target_and_kind() {
        let mut writer = ModuleWriter::default();
        let mut cache = TypeCache::default();
        cache
            .decorate(&mut writer, 7, Decoration::Location, &[2])
            .unwrap();
        cache
            .decorate(&mut writer, 7, Decoration::Location, &[2])
            .unwrap();
        // Only one OpDecorate instruction header word should be present.
        let header_count = writer
            .annotations
            .words()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i == 0)
            .count();
        assert_eq!(header_count, 1);
        assert_eq!(writer.annotations.words().len(), 4);
    }
}
