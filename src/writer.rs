//! Module Writer (component A): append-only word streams plus final
//! assembly into a SPIR-V binary at the configured target version. Grounded
//! on the teacher's `parse/bin.rs::SpirvHeader`, inverted from a structure
//! that is read to one that is produced.
use std::collections::BTreeSet;

use spirv::{AddressingModel, Capability, ExecutionModel, MemoryModel, Op};

use crate::error::{bail, Result};

/// One of the four append-only word sequences described in `spec.md` §3.
#[derive(Default, Clone, Debug)]
pub struct Stream(Vec<u32>);
impl Stream {
    pub fn words(&self) -> &[u32] {
        &self.0
    }
    /// Amortized-O(1) push, per `spec.md` §4.A.
    pub fn append_word(&mut self, w: u32) {
        self.0.push(w);
    }
    fn append_words(&mut self, ws: &[u32]) {
        self.0.extend_from_slice(ws);
    }
}

/// Packs a UTF-8, NUL-terminated string into little-endian 32-bit words,
/// zero-padding the final word (`spec.md` §4.A `string-encode`).
pub fn string_encode(s: &str) -> Vec<u32> {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Mutable recompile-scoped state: the id counter, the enabled-capability
/// mask, the optional GLSL.std.450 extended-instruction-set id, and the four
/// ordered word streams.
pub struct ModuleWriter {
    next_id: u32,
    capabilities: BTreeSet<Capability>,
    glsl_ext_inst_id: Option<u32>,
    pub debug: Stream,
    pub annotations: Stream,
    pub globals: Stream,
    pub function_body: Stream,
}
impl Default for ModuleWriter {
    fn default() -> Self {
        ModuleWriter {
            // Id 0 is reserved (`spec.md` §3).
            next_id: 1,
            capabilities: BTreeSet::new(),
            glsl_ext_inst_id: None,
            debug: Stream::default(),
            annotations: Stream::default(),
            globals: Stream::default(),
            function_body: Stream::default(),
        }
    }
}
impl ModuleWriter {
    pub fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Current value the assembled module's `bound` word must take.
    pub fn bound(&self) -> u32 {
        self.next_id
    }

    pub fn enable_capability(&mut self, cap: Capability) {
        self.capabilities.insert(cap);
    }

    /// Id of the `GLSL.std.450` extended-instruction-set import, importing
    /// it into `globals` on first use.
    pub fn glsl_ext_inst(&mut self) -> u32 {
        if let Some(id) = self.glsl_ext_inst_id {
            return id;
        }
        let id = self.alloc_id();
        self.glsl_ext_inst_id = Some(id);
        id
    }

    /// Compute the word-count header and append it followed by `operands`.
    pub fn emit_op(stream: &mut Stream, opcode: Op, operands: &[u32]) -> Result<()> {
        let word_count = operands.len() + 1;
        if word_count > u16::MAX as usize {
            bail!(MalformedBytecode, "instruction word count {} overflows SPIR-V's 16-bit field", word_count);
        }
        let header = ((word_count as u32) << 16) | (opcode as u32);
        stream.append_word(header);
        stream.append_words(operands);
        Ok(())
    }

    /// `emit-r`: allocate and return a fresh result id, operands given
    /// without the id (it is appended first).
    pub fn emit_r(&mut self, stream_sel: StreamSel, opcode: Op, operands: &[u32]) -> Result<u32> {
        let id = self.alloc_id();
        let mut full = Vec::with_capacity(operands.len() + 1);
        full.push(id);
        full.extend_from_slice(operands);
        Self::emit_op(self.stream_mut(stream_sel), opcode, &full)?;
        Ok(id)
    }

    /// `emit-tr`: result-type then result id, both prepended to `operands`.
    pub fn emit_tr(
        &mut self,
        stream_sel: StreamSel,
        opcode: Op,
        result_ty: u32,
        operands: &[u32],
    ) -> Result<u32> {
        let id = self.alloc_id();
        let mut full = Vec::with_capacity(operands.len() + 2);
        full.push(result_ty);
        full.push(id);
        full.extend_from_slice(operands);
        Self::emit_op(self.stream_mut(stream_sel), opcode, &full)?;
        Ok(id)
    }

    /// Emits an instruction with no result (or whose result id is already
    /// fixed, e.g. `main`'s own id) directly into the named stream.
    pub fn emit_op_raw(&mut self, stream_sel: StreamSel, opcode: Op, operands: &[u32]) -> Result<()> {
        Self::emit_op(self.stream_mut(stream_sel), opcode, operands)
    }

    /// Emits `OpName` into the debug stream (`SPEC_FULL.md` §6
    /// `debug_names`). Callers are expected to only call this when the
    /// config flag is set; the writer itself has no opinion on the knob.
    pub fn emit_name(&mut self, target: u32, name: &str) -> Result<()> {
        let words = string_encode(name);
        let mut operands = Vec::with_capacity(1 + words.len());
        operands.push(target);
        operands.extend_from_slice(&words);
        Self::emit_op(&mut self.debug, Op::Name, &operands)
    }

    /// Emits `OpMemberName` into the debug stream (`SPEC_FULL.md` §6).
    pub fn emit_member_name(&mut self, struct_ty: u32, member: u32, name: &str) -> Result<()> {
        let words = string_encode(name);
        let mut operands = Vec::with_capacity(2 + words.len());
        operands.push(struct_ty);
        operands.push(member);
        operands.extend_from_slice(&words);
        Self::emit_op(&mut self.debug, Op::MemberName, &operands)
    }

    fn stream_mut(&mut self, sel: StreamSel) -> &mut Stream {
        match sel {
            StreamSel::Debug => &mut self.debug,
            StreamSel::Annotations => &mut self.annotations,
            StreamSel::Globals => &mut self.globals,
            StreamSel::FunctionBody => &mut self.function_body,
        }
    }

    /// Assemble the final little-endian SPIR-V word stream at `target_version`.
    ///
    /// Invariant upheld by construction: every id referenced in
    /// `function_body` is defined in `globals` (or earlier in
    /// `function_body` itself), since types/constants only ever land in
    /// `globals` and the function body stream is appended last.
    pub fn assemble(
        &self,
        entry_name: &str,
        exec_model: ExecutionModel,
        main_id: u32,
        interface_ids: &[u32],
        exec_mode_instrs: &Stream,
        target_version: (u8, u8),
    ) -> Result<Vec<u32>> {
        let mut out = Vec::new();

        // 5-word header: magic, version, generator=0, bound, reserved=0.
        out.push(0x0723_0203);
        out.push((target_version.0 as u32) << 16 | (target_version.1 as u32) << 8);
        out.push(0); // generator
        out.push(self.bound());
        out.push(0); // reserved / schema

        for cap in &self.capabilities {
            out.push((2u32 << 16) | (Op::Capability as u32));
            out.push(*cap as u32);
        }

        if let Some(ext_id) = self.glsl_ext_inst_id {
            let words = string_encode("GLSL.std.450");
            let word_count = 2 + words.len();
            out.push((word_count as u32) << 16 | (Op::ExtInstImport as u32));
            out.push(ext_id);
            out.extend_from_slice(&words);
        }

        out.push((3u32 << 16) | (Op::MemoryModel as u32));
        out.push(AddressingModel::Logical as u32);
        out.push(MemoryModel::GLSL450 as u32);

        let name_words = string_encode(entry_name);
        let mut entry_point_operands = Vec::new();
        entry_point_operands.push(exec_model as u32);
        entry_point_operands.push(main_id);
        entry_point_operands.extend_from_slice(&name_words);
        entry_point_operands.extend_from_slice(interface_ids);
        let word_count = entry_point_operands.len() + 1;
        out.push((word_count as u32) << 16 | (Op::EntryPoint as u32));
        out.extend_from_slice(&entry_point_operands);

        out.extend_from_slice(exec_mode_instrs.words());

        out.extend_from_slice(self.debug.words());
        out.extend_from_slice(self.annotations.words());
        out.extend_from_slice(self.globals.words());
        out.extend_from_slice(self.function_body.words());

        Ok(out)
    }
}

/// Selects which of the four ordered streams an instruction lands in.
#[derive(Clone, Copy, Debug)]
pub enum StreamSel {
    Debug,
    Annotations,
    Globals,
    FunctionBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_encode_pads_to_word_boundary() {
        assert_eq!(string_encode("").len(), 1);
        assert_eq!(string_encode("abc").len(), 1);
        assert_eq!(string_encode("abcd").len(), 2);
    }

    #[test]
    fn alloc_id_starts_at_one_and_increments() {
        let mut w = ModuleWriter::default();
        assert_eq!(w.alloc_id(), 1);
        assert_eq!(w.alloc_id(), 2);
        assert_eq!(w.bound(), 3);
    }

    #[test]
    fn emit_op_header_encodes_word_count() {
        let mut s = Stream::default();
        ModuleWriter::emit_op(&mut s, Op::Nop, &[0xAAAA, 0xBBBB]).unwrap();
        let header = s.words()[0];
        assert_eq!(header >> 16, 3);
        assert_eq!(header & 0xFFFF, Op::Nop as u32);
    }
}
