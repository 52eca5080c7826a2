//! Executable images
//!
//! A program is a flat list of operations plus a data segment holding
//! NUL-terminated strings. Instruction `i` lives at byte address
//! `i * INSTRUCTION_BYTES`; the data segment starts at `DATA_BASE`.

use std::sync::Arc;

use hashbrown::HashMap;

use super::addrspace::DATA_BASE;
use crate::config::USER_TICK;
use crate::error::{KernelError, KernelResult};
use crate::machine::registers::{INSTRUCTION_BYTES, NUM_GP_REGS};
use crate::syscall::Syscall;

/// One user-mode operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `n` instructions of straight-line work
    Compute(u32),
    LoadImm { reg: usize, value: i32 },
    Move { dst: usize, src: usize },
    AddImm { reg: usize, value: i32 },
    /// Continue at instruction index
    Jump(usize),
    JumpIfZero { reg: usize, target: usize },
    /// Load the call number into the result register and trap
    Syscall(Syscall),
    /// Trap with whatever the result register holds
    Trap,
}

impl Op {
    /// Instructions this op stands for
    pub fn instructions(&self) -> u64 {
        match self {
            Op::Compute(n) => u64::from(*n).max(1),
            _ => 1,
        }
    }

    /// User ticks charged for executing this op
    pub fn ticks(&self) -> u64 {
        self.instructions() * USER_TICK
    }

    fn registers(&self) -> [Option<usize>; 2] {
        match *self {
            Op::LoadImm { reg, .. } | Op::AddImm { reg, .. } | Op::JumpIfZero { reg, .. } => {
                [Some(reg), None]
            }
            Op::Move { dst, src } => [Some(dst), Some(src)],
            _ => [None, None],
        }
    }

    fn target(&self) -> Option<usize> {
        match *self {
            Op::Jump(target) | Op::JumpIfZero { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// Validated executable image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    name: String,
    code: Vec<Op>,
    data: Vec<u8>,
}

impl Program {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &[Op] {
        &self.code
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size of the code segment in bytes
    pub fn code_bytes(&self) -> usize {
        self.code.len() * INSTRUCTION_BYTES as usize
    }

    pub fn op(&self, index: usize) -> Option<Op> {
        self.code.get(index).copied()
    }
}

/// Assembles a `Program`
#[derive(Debug, Clone)]
pub struct ProgramBuilder {
    name: String,
    code: Vec<Op>,
    data: Vec<u8>,
}

impl ProgramBuilder {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_owned(), code: Vec::new(), data: Vec::new() }
    }

    /// Index the next op will get; use as a jump target
    pub fn label(&self) -> usize {
        self.code.len()
    }

    pub fn op(&mut self, op: Op) -> &mut Self {
        self.code.push(op);
        self
    }

    pub fn compute(&mut self, ticks: u32) -> &mut Self {
        self.op(Op::Compute(ticks))
    }

    pub fn load_imm(&mut self, reg: usize, value: i32) -> &mut Self {
        self.op(Op::LoadImm { reg, value })
    }

    pub fn mov(&mut self, dst: usize, src: usize) -> &mut Self {
        self.op(Op::Move { dst, src })
    }

    pub fn add_imm(&mut self, reg: usize, value: i32) -> &mut Self {
        self.op(Op::AddImm { reg, value })
    }

    pub fn jump(&mut self, target: usize) -> &mut Self {
        self.op(Op::Jump(target))
    }

    pub fn jump_if_zero(&mut self, reg: usize, target: usize) -> &mut Self {
        self.op(Op::JumpIfZero { reg, target })
    }

    pub fn syscall(&mut self, call: Syscall) -> &mut Self {
        self.op(Op::Syscall(call))
    }

    /// Place a NUL-terminated string in the data segment and return its
    /// user address
    pub fn string(&mut self, text: &str) -> i32 {
        let vaddr = DATA_BASE + self.data.len() as i32;
        self.data.extend_from_slice(text.as_bytes());
        self.data.push(0);
        vaddr
    }

    pub fn build(&self) -> KernelResult<Program> {
        let reject = |reason| KernelError::InvalidProgram { name: self.name.clone(), reason };
        if self.code.is_empty() {
            return Err(reject("empty code segment"));
        }
        if self.code.len() * INSTRUCTION_BYTES as usize > DATA_BASE as usize {
            return Err(reject("code segment overlaps data"));
        }
        for op in &self.code {
            if op.registers().iter().flatten().any(|reg| *reg >= NUM_GP_REGS) {
                return Err(reject("register out of range"));
            }
            if op.target().is_some_and(|target| target > self.code.len()) {
                return Err(reject("jump target out of range"));
            }
        }
        Ok(Program { name: self.name.clone(), code: self.code.clone(), data: self.data.clone() })
    }
}

/// Registry of executables by path
#[derive(Debug, Default)]
pub struct ProgramLoader {
    programs: HashMap<String, Arc<Program>>,
}

impl ProgramLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `program` under `path`, replacing any previous image
    pub fn register(&mut self, path: &str, program: Program) {
        log::debug!("loader: {} -> '{}' ({} ops)", path, program.name(), program.code().len());
        self.programs.insert(path.to_owned(), Arc::new(program));
    }

    pub fn load(&self, path: &str) -> KernelResult<Arc<Program>> {
        self.programs
            .get(path)
            .cloned()
            .ok_or_else(|| KernelError::ProgramNotFound { path: path.to_owned() })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.programs.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}
