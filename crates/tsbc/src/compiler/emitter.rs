// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bytecode emitter.
//!
//! Instructions are appended to a buffer indexed by instruction number.
//! Branches name a [`Label`] instead of a byte offset, since offsets are
//! only known once every branch has chosen its encoding:
//!
//! - short: 3 bytes, 16-bit displacement;
//! - wide unconditional: `goto_w`, 5 bytes;
//! - wide conditional: the inverted short branch jumping over a `goto_w`,
//!   8 bytes.
//!
//! [`Emitter::finish`] starts every branch short, measures, promotes the
//! branches whose displacement does not fit, and measures again until no
//! branch changes. Promotion only ever grows the code, so the loop ends.

use num_bigint::BigInt;
use tracing::{debug, trace};

use super::bytecode::{
    CompiledMethod, Cond, Constant, ConstantPool, MethodDescriptor, Op,
};
use crate::error::{CompileError, Result};
use crate::options::CompilerOptions;

/// A jump target inside one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

#[derive(Debug, Clone, Copy)]
enum Insn {
    Op(Op),
    Branch { cond: Option<Cond>, target: Label },
}

#[derive(Debug, Clone, Copy)]
struct JumpPatch {
    /// Instruction index of the branch
    at: usize,
    target: Label,
    /// Set once the target label is bound
    resolved: bool,
}

struct Layout {
    /// Byte offset of every instruction, plus the end of the method
    offsets: Vec<usize>,
    /// Whether the instruction at each index is a promoted branch
    wide: Vec<bool>,
}

/// Builds the code of one method.
pub struct Emitter {
    insns: Vec<Insn>,
    labels: Vec<Option<usize>>,
    /// Patches waiting for each label to bind
    pending: Vec<Vec<usize>>,
    patches: Vec<JumpPatch>,
    pool: ConstantPool,
    rebound: Option<Label>,
    short_limit: i64,
    max_constants: usize,
    max_locals: usize,
    max_code_size: usize,
}

impl Emitter {
    /// Creates an empty emitter.
    pub fn new(options: &CompilerOptions) -> Self {
        Self {
            insns: Vec::new(),
            labels: Vec::new(),
            pending: Vec::new(),
            patches: Vec::new(),
            pool: ConstantPool::new(),
            rebound: None,
            short_limit: i64::from(options.effective_short_branch_limit()),
            max_constants: options.max_constants,
            max_locals: options.max_locals,
            max_code_size: options.max_code_size,
        }
    }

    /// Allocates an unbound label.
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.labels.len() as u32);
        self.labels.push(None);
        self.pending.push(Vec::new());
        label
    }

    /// Binds `label` to the next instruction.
    pub fn bind(&mut self, label: Label) {
        let Some(slot) = self.labels.get_mut(label.0 as usize) else {
            self.rebound = Some(label);
            return;
        };
        if slot.is_some() {
            self.rebound = Some(label);
            return;
        }
        *slot = Some(self.insns.len());
        for patch in std::mem::take(&mut self.pending[label.0 as usize]) {
            self.patches[patch].resolved = true;
        }
    }

    /// Allocates a label bound to the next instruction.
    pub fn here(&mut self) -> Label {
        let label = self.new_label();
        self.bind(label);
        label
    }

    /// Appends an instruction.
    pub fn emit(&mut self, op: Op) {
        self.insns.push(Insn::Op(op));
    }

    fn push_branch(&mut self, cond: Option<Cond>, target: Label) {
        let at = self.insns.len();
        self.insns.push(Insn::Branch { cond, target });
        let resolved = matches!(self.labels.get(target.0 as usize), Some(Some(_)));
        let patch = self.patches.len();
        self.patches.push(JumpPatch {
            at,
            target,
            resolved,
        });
        if !resolved {
            if let Some(waiting) = self.pending.get_mut(target.0 as usize) {
                waiting.push(patch);
            }
        }
    }

    /// Appends a conditional branch.
    pub fn branch(&mut self, cond: Cond, target: Label) {
        self.push_branch(Some(cond), target);
    }

    /// Appends an unconditional branch.
    pub fn goto(&mut self, target: Label) {
        self.push_branch(None, target);
    }

    /// Adds a constant to the pool.
    pub fn constant(&mut self, constant: Constant) -> Result<u16> {
        self.pool
            .insert(constant, self.max_constants)
            .ok_or(CompileError::LimitExceeded {
                what: "constant pool",
                limit: self.max_constants,
            })
    }

    /// Pushes a constant.
    pub fn ldc(&mut self, constant: Constant) -> Result<()> {
        let index = self.constant(constant)?;
        self.emit(Op::Ldc(index));
        Ok(())
    }

    /// Pushes an int, as an immediate when it fits in 16 bits.
    pub fn push_int(&mut self, value: i32) -> Result<()> {
        match i16::try_from(value) {
            Ok(small) => {
                self.emit(Op::IConst(small));
                Ok(())
            }
            Err(_) => self.ldc(Constant::Int(value)),
        }
    }

    /// Pushes a long.
    pub fn push_long(&mut self, value: i64) -> Result<()> {
        self.ldc(Constant::Long(value))
    }

    /// Pushes a bigint.
    pub fn push_bigint(&mut self, value: BigInt) -> Result<()> {
        self.ldc(Constant::BigInt(value))
    }

    /// Pushes a string.
    pub fn push_string(&mut self, value: &str) -> Result<()> {
        self.ldc(Constant::String(value.to_string()))
    }

    fn target_index(&self, label: Label) -> Result<usize> {
        self.labels
            .get(label.0 as usize)
            .copied()
            .flatten()
            .ok_or_else(|| CompileError::Internal(format!("label L{} is never bound", label.0)))
    }

    fn insn_len(insn: &Insn, wide: bool) -> usize {
        match insn {
            Insn::Op(op) => op.encoded_len(),
            Insn::Branch { cond: None, .. } => {
                if wide {
                    5
                } else {
                    3
                }
            }
            Insn::Branch { cond: Some(_), .. } => {
                if wide {
                    8
                } else {
                    3
                }
            }
        }
    }

    fn measure(&self, wide: &[bool]) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.insns.len() + 1);
        let mut pc = 0;
        for (insn, wide) in self.insns.iter().zip(wide) {
            offsets.push(pc);
            pc += Self::insn_len(insn, *wide);
        }
        offsets.push(pc);
        offsets
    }

    fn fits_short(&self, displacement: i64) -> bool {
        displacement >= -self.short_limit - 1 && displacement <= self.short_limit
    }

    /// Chooses an encoding for every branch.
    fn layout(&self) -> Result<Layout> {
        let mut wide = vec![false; self.insns.len()];
        let mut iteration = 0usize;
        loop {
            iteration += 1;
            let offsets = self.measure(&wide);
            let mut promoted = 0usize;
            for patch in &self.patches {
                if wide[patch.at] {
                    continue;
                }
                let target = self.target_index(patch.target)?;
                let displacement = offsets[target] as i64 - offsets[patch.at] as i64;
                if !self.fits_short(displacement) {
                    trace!(at = patch.at, displacement, "promoting branch to wide form");
                    wide[patch.at] = true;
                    promoted += 1;
                }
            }
            if promoted == 0 {
                debug!(
                    iterations = iteration,
                    branches = self.patches.len(),
                    wide = wide.iter().filter(|w| **w).count(),
                    bytes = offsets.last().copied().unwrap_or(0),
                    "branch layout settled"
                );
                return Ok(Layout { offsets, wide });
            }
        }
    }

    fn encode(&self, layout: &Layout) -> Result<Vec<u8>> {
        let total = layout.offsets.last().copied().unwrap_or(0);
        let mut code = Vec::with_capacity(total);
        for (index, insn) in self.insns.iter().enumerate() {
            match *insn {
                Insn::Op(op) => op.encode(&mut code),
                Insn::Branch { cond, target } => {
                    let here = layout.offsets[index] as i64;
                    let dest = layout.offsets[self.target_index(target)?] as i64;
                    match (cond, layout.wide[index]) {
                        (None, false) => Op::Goto(short(dest - here)?).encode(&mut code),
                        (None, true) => Op::GotoW(long(dest - here)?).encode(&mut code),
                        (Some(cond), false) => Op::If(cond, short(dest - here)?).encode(&mut code),
                        (Some(cond), true) => {
                            // Skip the goto_w when the original condition fails.
                            Op::If(cond.negate(), 8).encode(&mut code);
                            Op::GotoW(long(dest - (here + 3))?).encode(&mut code);
                        }
                    }
                }
            }
            debug_assert_eq!(code.len(), layout.offsets[index + 1]);
        }
        Ok(code)
    }

    /// Computes the deepest operand stack over every reachable path.
    fn max_stack(&self) -> Result<u16> {
        let count = self.insns.len();
        let mut depth: Vec<Option<u32>> = vec![None; count + 1];
        let mut work = vec![0usize];
        depth[0] = Some(0);
        let mut max = 0u32;

        while let Some(index) = work.pop() {
            if index >= count {
                continue;
            }
            let current = depth[index].unwrap_or(0);
            let (pops, pushes, falls_through, jumps_to) = match self.insns[index] {
                Insn::Op(op) => {
                    let (pops, pushes) = op.stack_effect(&self.pool).ok_or_else(|| {
                        CompileError::Internal(format!("bad pool reference in {op}"))
                    })?;
                    (pops, pushes, !op.is_terminal(), None)
                }
                Insn::Branch { cond, target } => (
                    cond.map_or(0, Cond::operands),
                    0,
                    cond.is_some(),
                    Some(self.target_index(target)?),
                ),
            };
            let pops = u32::from(pops);
            if current < pops {
                return Err(CompileError::Internal(format!(
                    "operand stack underflow at instruction {index}"
                )));
            }
            let next = current - pops + u32::from(pushes);
            max = max.max(current).max(next);

            let fall = falls_through.then_some(index + 1);
            for successor in fall.into_iter().chain(jumps_to) {
                match depth[successor] {
                    None => {
                        depth[successor] = Some(next);
                        work.push(successor);
                    }
                    Some(existing) if existing != next => {
                        return Err(CompileError::Internal(format!(
                            "operand stack depth {existing} and {next} meet at instruction {successor}"
                        )));
                    }
                    Some(_) => {}
                }
            }
        }

        u16::try_from(max).map_err(|_| CompileError::LimitExceeded {
            what: "operand stack",
            limit: u16::MAX as usize,
        })
    }

    fn max_locals(&self, descriptor: &MethodDescriptor) -> usize {
        let highest = self
            .insns
            .iter()
            .filter_map(|insn| match insn {
                Insn::Op(Op::Load(_, slot) | Op::Store(_, slot)) => Some(*slot as usize + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        highest.max(descriptor.arg_slots() as usize)
    }

    /// Resolves every branch and produces the finished method.
    pub fn finish(self, name: &str, descriptor: MethodDescriptor) -> Result<CompiledMethod> {
        if let Some(label) = self.rebound {
            return Err(CompileError::Internal(format!("label L{} bound twice", label.0)));
        }
        if let Some(patch) = self.patches.iter().find(|patch| !patch.resolved) {
            return Err(CompileError::Internal(format!(
                "branch at instruction {} targets unbound label L{}",
                patch.at, patch.target.0
            )));
        }

        let layout = self.layout()?;
        let code = self.encode(&layout)?;
        if code.len() > self.max_code_size {
            return Err(CompileError::LimitExceeded {
                what: "code size",
                limit: self.max_code_size,
            });
        }
        let max_stack = self.max_stack()?;
        let max_locals = self.max_locals(&descriptor);
        if max_locals > self.max_locals {
            return Err(CompileError::LimitExceeded {
                what: "local slot",
                limit: self.max_locals,
            });
        }

        debug!(
            method = name,
            instructions = self.insns.len(),
            bytes = code.len(),
            constants = self.pool.len(),
            max_stack,
            max_locals,
            "method finished"
        );

        Ok(CompiledMethod {
            name: name.to_string(),
            descriptor,
            code,
            constants: self.pool,
            max_stack,
            max_locals: max_locals as u16,
        })
    }
}

fn short(displacement: i64) -> Result<i16> {
    i16::try_from(displacement).map_err(|_| {
        CompileError::Internal(format!("short branch displacement {displacement} out of range"))
    })
}

fn long(displacement: i64) -> Result<i32> {
    i32::try_from(displacement).map_err(|_| {
        CompileError::Internal(format!("wide branch displacement {displacement} out of range"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bytecode::ArithOp;
    use crate::types::{NumKind, StackKind, Ty};

    fn descriptor() -> MethodDescriptor {
        MethodDescriptor {
            params: vec![],
            ret: Ty::INT,
            is_static: true,
        }
    }

    fn options(limit: i32) -> CompilerOptions {
        CompilerOptions::default().with_short_branch_limit(limit)
    }

    fn ops(method: &CompiledMethod) -> Vec<(usize, Op)> {
        method.instructions().unwrap()
    }

    #[test]
    fn test_forward_and_backward_branches() {
        let mut em = Emitter::new(&CompilerOptions::default());
        let top = em.here();
        let end = em.new_label();
        em.emit(Op::IConst(0));
        em.branch(Cond::Ne, end);
        em.goto(top);
        em.bind(end);
        em.emit(Op::IConst(1));
        em.emit(Op::Return(Some(StackKind::Num(NumKind::Int))));
        let method = em.finish("f", descriptor()).unwrap();

        assert_eq!(
            ops(&method),
            vec![
                (0, Op::IConst(0)),
                (3, Op::If(Cond::Ne, 6)),
                (6, Op::Goto(-6)),
                (9, Op::IConst(1)),
                (12, Op::Return(Some(StackKind::Num(NumKind::Int)))),
            ]
        );
    }

    #[test]
    fn test_unbound_label_is_an_error() {
        let mut em = Emitter::new(&CompilerOptions::default());
        let nowhere = em.new_label();
        em.goto(nowhere);
        let err = em.finish("f", descriptor()).unwrap_err();
        assert!(matches!(err, CompileError::Internal(msg) if msg.contains("unbound label")));
    }

    #[test]
    fn test_double_bind_is_an_error() {
        let mut em = Emitter::new(&CompilerOptions::default());
        let label = em.here();
        em.emit(Op::Nop);
        em.bind(label);
        em.emit(Op::Return(None));
        assert!(matches!(
            em.finish("f", descriptor()),
            Err(CompileError::Internal(_))
        ));
    }

    #[test]
    fn test_unconditional_promotion() {
        let mut em = Emitter::new(&options(10));
        let end = em.new_label();
        em.goto(end);
        for _ in 0..20 {
            em.emit(Op::Nop);
        }
        em.bind(end);
        em.emit(Op::Return(None));
        let method = em.finish("f", descriptor()).unwrap();

        let ops = ops(&method);
        assert_eq!(ops[0], (0, Op::GotoW(25)));
        assert_eq!(ops.last(), Some(&(25, Op::Return(None))));
    }

    #[test]
    fn test_conditional_promotion_inverts_and_skips() {
        let mut em = Emitter::new(&options(10));
        let end = em.new_label();
        em.emit(Op::IConst(1));
        em.branch(Cond::Eq, end);
        for _ in 0..20 {
            em.emit(Op::Nop);
        }
        em.bind(end);
        em.emit(Op::Return(None));
        let method = em.finish("f", descriptor()).unwrap();

        let ops = ops(&method);
        assert_eq!(ops[1], (3, Op::If(Cond::Ne, 8)));
        // goto_w sits at 6, the target at 3 + 8 + 20 = 31
        assert_eq!(ops[2], (6, Op::GotoW(25)));
        assert_eq!(ops.last(), Some(&(31, Op::Return(None))));
    }

    #[test]
    fn test_promotion_cascades_until_stable() {
        // The inner branch fits until the outer one grows in front of its target.
        let mut em = Emitter::new(&options(10));
        let near = em.new_label();
        let far = em.new_label();
        em.goto(near);
        em.goto(far);
        for _ in 0..4 {
            em.emit(Op::Nop);
        }
        em.bind(near);
        for _ in 0..10 {
            em.emit(Op::Nop);
        }
        em.bind(far);
        em.emit(Op::Return(None));
        let method = em.finish("f", descriptor()).unwrap();

        let ops = ops(&method);
        assert_eq!(ops[0], (0, Op::GotoW(14)));
        assert_eq!(ops[1], (5, Op::GotoW(19)));
        assert_eq!(ops.last(), Some(&(24, Op::Return(None))));
    }

    #[test]
    fn test_short_range_boundaries() {
        let em = Emitter::new(&CompilerOptions::default());
        assert!(em.fits_short(32767));
        assert!(em.fits_short(-32768));
        assert!(!em.fits_short(32768));
        assert!(!em.fits_short(-32769));
    }

    #[test]
    fn test_max_stack_and_locals() {
        let mut em = Emitter::new(&CompilerOptions::default());
        em.emit(Op::IConst(1));
        em.emit(Op::IConst(2));
        em.emit(Op::Arith(ArithOp::Add, NumKind::Int));
        em.emit(Op::Store(StackKind::Num(NumKind::Int), 4));
        em.emit(Op::Load(StackKind::Num(NumKind::Int), 4));
        em.emit(Op::Return(Some(StackKind::Num(NumKind::Int))));
        let method = em.finish("f", descriptor()).unwrap();
        assert_eq!(method.max_stack, 2);
        assert_eq!(method.max_locals, 5);
    }

    #[test]
    fn test_inconsistent_depth_is_detected() {
        let mut em = Emitter::new(&CompilerOptions::default());
        let join = em.new_label();
        em.emit(Op::IConst(0));
        em.branch(Cond::Eq, join);
        em.emit(Op::IConst(7));
        em.bind(join);
        em.emit(Op::Return(None));
        assert!(matches!(
            em.finish("f", descriptor()),
            Err(CompileError::Internal(msg)) if msg.contains("meet")
        ));
    }

    #[test]
    fn test_constants_are_shared() {
        let mut em = Emitter::new(&CompilerOptions::default());
        em.push_long(9).unwrap();
        em.emit(Op::Pop);
        em.push_long(9).unwrap();
        em.emit(Op::Pop);
        em.push_int(100_000).unwrap();
        em.emit(Op::Pop);
        em.push_int(-5).unwrap();
        em.emit(Op::Pop);
        em.emit(Op::Return(None));
        let method = em.finish("f", descriptor()).unwrap();
        assert_eq!(method.constants.len(), 2);
        assert_eq!(ops(&method)[6], (12, Op::IConst(-5)));
    }
}
