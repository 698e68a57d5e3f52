//! Control-Flow Emitter (component H, `spec.md` §4.H). DXBc is already
//! structured; this is a pushdown automaton translating it into SPIR-V's
//! structured blocks with explicit merge/continue targets
//! (`spec.md` §9 "Coroutine-like structured control flow" design note).
use spirv::Op;

use crate::compiler::Recompiler;
use crate::error::{bail, Result};
use crate::writer::StreamSel;

#[derive(Clone, Copy, Debug)]
pub enum Phase {
    If,
    Else,
}

#[derive(Clone, Copy, Debug)]
pub enum Frame {
    Branch { merge_id: u32, else_id: u32, phase: Phase },
    Loop { header_id: u32, continue_id: u32, merge_id: u32 },
}

/// Which SPIR-V block is currently open. `None` means "unreachable after a
/// terminator" — the next structural instruction must open a fresh block
/// before anything else can be emitted (`spec.md` §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CurrentBlock {
    #[default]
    Main,
    If,
    Else,
    Loop,
    None,
}

#[derive(Default)]
pub struct ControlFlowStack {
    stack: Vec<Frame>,
    pub current_block: CurrentBlock,
}
impl ControlFlowStack {
    fn innermost_loop(&self) -> Option<Frame> {
        self.stack.iter().rev().find_map(|f| match f {
            Frame::Loop { .. } => Some(*f),
            _ => None,
        })
    }
}

impl<'a> Recompiler<'a> {
    fn open_block(&mut self, label_id: u32) -> Result<()> {
        crate::writer::ModuleWriter::emit_op(&mut self.writer.function_body, Op::Label, &[label_id])
    }
    fn terminate_with_branch(&mut self, target: u32) -> Result<()> {
        if self.cf.current_block != crate::control_flow::CurrentBlock::None {
            crate::writer::ModuleWriter::emit_op(
                &mut self.writer.function_body,
                Op::Branch,
                &[target],
            )?;
        }
        Ok(())
    }

    /// `if_nz`/`if_z` (condition already lowered to a bool value id by the
    /// caller per `spec.md` §4.H's uniform `v != 0` rule).
    pub fn begin_if(&mut self, cond_bool: u32) -> Result<()> {
        let true_label = self.writer.alloc_id();
        let false_label = self.writer.alloc_id();
        let merge_label = self.writer.alloc_id();

        crate::writer::ModuleWriter::emit_op(
            &mut self.writer.function_body,
            Op::SelectionMerge,
            &[merge_label, 0],
        )?;
        crate::writer::ModuleWriter::emit_op(
            &mut self.writer.function_body,
            Op::BranchConditional,
            &[cond_bool, true_label, false_label],
        )?;
        self.open_block(true_label)?;

        self.cf.stack.push(Frame::Branch { merge_id: merge_label, else_id: false_label, phase: Phase::If });
        self.cf.current_block = crate::control_flow::CurrentBlock::If;
        Ok(())
    }

    pub fn begin_else(&mut self) -> Result<()> {
        let (merge_id, else_id) = match self.cf.stack.last_mut() {
            Some(Frame::Branch { merge_id, else_id, phase }) => {
                *phase = Phase::Else;
                (*merge_id, *else_id)
            }
            _ => bail!(MalformedBytecode, "`else` with no matching `if`"),
        };
        self.terminate_with_branch(merge_id)?;
        self.open_block(else_id)?;
        self.cf.current_block = crate::control_flow::CurrentBlock::Else;
        Ok(())
    }

    pub fn end_if(&mut self) -> Result<()> {
        let frame = match self.cf.stack.pop() {
            Some(f @ Frame::Branch { .. }) => f,
            _ => bail!(MalformedBytecode, "`endif` with no matching `if`"),
        };
        let (merge_id, else_id, phase) = match frame {
            Frame::Branch { merge_id, else_id, phase } => (merge_id, else_id, phase),
            _ => unreachable!(),
        };
        self.terminate_with_branch(merge_id)?;
        if matches!(phase, Phase::If) {
            // `else` was never seen: open and immediately terminate it.
            self.open_block(else_id)?;
            crate::writer::ModuleWriter::emit_op(&mut self.writer.function_body, Op::Branch, &[merge_id])?;
        }
        self.open_block(merge_id)?;
        self.cf.current_block = crate::control_flow::CurrentBlock::Main;
        Ok(())
    }

    pub fn begin_loop(&mut self) -> Result<()> {
        let header = self.writer.alloc_id();
        let body = self.writer.alloc_id();
        let continue_label = self.writer.alloc_id();
        let merge = self.writer.alloc_id();

        self.terminate_with_branch(header)?;
        self.open_block(header)?;
        crate::writer::ModuleWriter::emit_op(
            &mut self.writer.function_body,
            Op::LoopMerge,
            &[merge, continue_label, 0],
        )?;
        crate::writer::ModuleWriter::emit_op(&mut self.writer.function_body, Op::Branch, &[body])?;
        self.open_block(body)?;

        self.cf.stack.push(Frame::Loop { header_id: header, continue_id: continue_label, merge_id: merge });
        self.cf.current_block = crate::control_flow::CurrentBlock::Loop;
        Ok(())
    }

    pub fn end_loop(&mut self) -> Result<()> {
        let frame = match self.cf.stack.pop() {
            Some(f @ Frame::Loop { .. }) => f,
            _ => bail!(MalformedBytecode, "`endloop` with no matching `loop`"),
        };
        let (continue_id, header_id, merge_id) = match frame {
            Frame::Loop { header_id, continue_id, merge_id } => (continue_id, header_id, merge_id),
            _ => unreachable!(),
        };
        self.terminate_with_branch(continue_id)?;
        self.open_block(continue_id)?;
        crate::writer::ModuleWriter::emit_op(&mut self.writer.function_body, Op::Branch, &[header_id])?;
        self.open_block(merge_id)?;
        self.cf.current_block = crate::control_flow::CurrentBlock::Main;
        Ok(())
    }

    pub fn emit_break(&mut self) -> Result<()> {
        let merge_id = match self.cf.innermost_loop() {
            Some(Frame::Loop { merge_id, .. }) => merge_id,
            _ => bail!(MalformedBytecode, "`break` outside a loop"),
        };
        self.terminate_with_branch(merge_id)?;
        self.cf.current_block = crate::control_flow::CurrentBlock::None;
        Ok(())
    }

    /// `breakc`: a micro-selection around the loop's merge (`spec.md`
    /// §4.H). `cond_bool` is already lowered.
    pub fn emit_breakc(&mut self, cond_bool: u32) -> Result<()> {
        let loop_merge = match self.cf.innermost_loop() {
            Some(Frame::Loop { merge_id, .. }) => merge_id,
            _ => bail!(MalformedBytecode, "`breakc` outside a loop"),
        };
        let merge = self.writer.alloc_id();
        let continue_here = self.writer.alloc_id();
        crate::writer::ModuleWriter::emit_op(
            &mut self.writer.function_body,
            Op::SelectionMerge,
            &[merge, 0],
        )?;
        crate::writer::ModuleWriter::emit_op(
            &mut self.writer.function_body,
            Op::BranchConditional,
            &[cond_bool, loop_merge, continue_here],
        )?;
        self.open_block(continue_here)?;
        crate::writer::ModuleWriter::emit_op(&mut self.writer.function_body, Op::Branch, &[merge])?;
        self.open_block(merge)?;
        Ok(())
    }

    /// `ret`: calls the output-packing epilog (if one was synthesized) with
    /// all live private-output variables, then `OpReturn`. Following a
    /// `ret` inside an `if`, the surrounding branch frame's else-label is
    /// opened immediately so the structural `endif` still finds a live
    /// block (`spec.md` §4.H / §9).
    pub fn emit_ret(&mut self, epilog_call: Option<(u32, Vec<u32>)>) -> Result<()> {
        if let Some((epilog_fn, args)) = epilog_call {
            let void_ty = self.void_ty;
            self.writer.emit_tr(StreamSel::FunctionBody, Op::FunctionCall, void_ty, &{
                let mut ops = vec![epilog_fn];
                ops.extend(args);
                ops
            })?;
        }
        crate::writer::ModuleWriter::emit_op(&mut self.writer.function_body, Op::Return, &[])?;
        self.cf.current_block = crate::control_flow::CurrentBlock::None;
        if let Some(Frame::Branch { else_id, phase: Phase::If, .. }) = self.cf.stack.last_mut() {
            let else_id = *else_id;
            self.open_block(else_id)?;
            if let Some(Frame::Branch { phase, .. }) = self.cf.stack.last_mut() {
                *phase = Phase::Else;
            }
            self.cf.current_block = crate::control_flow::CurrentBlock::Else;
        }
        Ok(())
    }

    /// `discard` (`SPEC_FULL.md` §9 supplement). Unconditional form lowers
    /// to a terminating `OpKill`; the conditional form branches around a
    /// kill block since `OpKill` must terminate a block.
    pub fn emit_discard(&mut self, cond_bool: Option<u32>) -> Result<()> {
        match cond_bool {
            None => {
                crate::writer::ModuleWriter::emit_op(&mut self.writer.function_body, Op::Kill, &[])?;
                self.cf.current_block = crate::control_flow::CurrentBlock::None;
            }
            Some(cond) => {
                let kill_label = self.writer.alloc_id();
                let after_label = self.writer.alloc_id();
                crate::writer::ModuleWriter::emit_op(
                    &mut self.writer.function_body,
                    Op::SelectionMerge,
                    &[after_label, 0],
                )?;
                crate::writer::ModuleWriter::emit_op(
                    &mut self.writer.function_body,
                    Op::BranchConditional,
                    &[cond, kill_label, after_label],
                )?;
                self.open_block(kill_label)?;
                crate::writer::ModuleWriter::emit_op(&mut self.writer.function_body, Op::Kill, &[])?;
                self.open_block(after_label)?;
            }
        }
        Ok(())
    }

    /// Condition lowering is uniform across `if`/`breakc`/`discard`: `v` to
    /// `v != 0`, or `v == 0` when the source's `Z` flag is set
    /// (`spec.md` §4.H).
    pub fn lower_condition(&mut self, cond_value: u32, bool_ty: u32, zero: u32, invert_z: bool) -> Result<u32> {
        let op = if invert_z { Op::IEqual } else { Op::INotEqual };
        self.writer.emit_tr(StreamSel::FunctionBody, op, bool_ty, &[cond_value, zero])
    }
}

// Re-export so `compiler.rs` can name `ControlFlowStack` without reaching
// into this module's private items.
pub use self::CurrentBlock as CfCurrentBlock;
