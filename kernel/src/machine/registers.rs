//! User register file
//!
//! MIPS-style numbering: 32 general registers followed by the special
//! registers. The syscall code arrives in r2 and the result leaves in r2;
//! arguments are passed in r4..r7.

use core::fmt;

use static_assertions::const_assert;

use crate::error::{KernelError, KernelResult};

pub const NUM_GP_REGS: usize = 32;
/// Syscall code in, result out
pub const RESULT_REG: usize = 2;
pub const ARG1_REG: usize = 4;
pub const ARG2_REG: usize = 5;
pub const ARG3_REG: usize = 6;
pub const ARG4_REG: usize = 7;
pub const STACK_REG: usize = 29;
pub const RET_ADDR_REG: usize = 31;
pub const HI_REG: usize = 32;
pub const LO_REG: usize = 33;
pub const PC_REG: usize = 34;
pub const NEXT_PC_REG: usize = 35;
pub const PREV_PC_REG: usize = 36;
pub const LOAD_REG: usize = 37;
pub const LOAD_VALUE_REG: usize = 38;
pub const BAD_VADDR_REG: usize = 39;
pub const NUM_TOTAL_REGS: usize = 40;

/// Width of one instruction slot
pub const INSTRUCTION_BYTES: i32 = 4;

const_assert!(RESULT_REG < NUM_GP_REGS);
const_assert!(ARG4_REG < STACK_REG);
const_assert!(BAD_VADDR_REG < NUM_TOTAL_REGS);

/// Register snapshot
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    regs: [i32; NUM_TOTAL_REGS],
}

impl Registers {
    pub const fn new() -> Self {
        Self { regs: [0; NUM_TOTAL_REGS] }
    }

    /// Initial state of a fresh program image
    pub fn for_entry(stack_top: i32) -> Self {
        let mut registers = Self::new();
        registers.regs[PC_REG] = 0;
        registers.regs[NEXT_PC_REG] = INSTRUCTION_BYTES;
        registers.regs[STACK_REG] = stack_top;
        registers
    }

    /// Unchecked access for register numbers the kernel itself supplies
    pub(crate) fn read(&self, reg: usize) -> i32 {
        self.regs[reg]
    }

    pub(crate) fn write(&mut self, reg: usize, value: i32) {
        self.regs[reg] = value;
    }

    pub fn get(&self, reg: usize) -> KernelResult<i32> {
        self.regs.get(reg).copied().ok_or(KernelError::InvalidRegister { reg })
    }

    pub fn set(&mut self, reg: usize, value: i32) -> KernelResult<()> {
        let slot = self.regs.get_mut(reg).ok_or(KernelError::InvalidRegister { reg })?;
        *slot = value;
        Ok(())
    }

    pub fn pc(&self) -> i32 {
        self.regs[PC_REG]
    }

    /// Step past the current instruction: PrevPC = PC, PC = NextPC, NextPC += 4
    pub fn advance_pc(&mut self) {
        self.regs[PREV_PC_REG] = self.regs[PC_REG];
        self.regs[PC_REG] = self.regs[NEXT_PC_REG];
        self.regs[NEXT_PC_REG] = self.regs[PC_REG] + INSTRUCTION_BYTES;
    }

    /// Transfer control to `target` (a byte address)
    pub fn jump(&mut self, target: i32) {
        self.regs[PREV_PC_REG] = self.regs[PC_REG];
        self.regs[PC_REG] = target;
        self.regs[NEXT_PC_REG] = target + INSTRUCTION_BYTES;
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registers")
            .field("pc", &self.regs[PC_REG])
            .field("next_pc", &self.regs[NEXT_PC_REG])
            .field("prev_pc", &self.regs[PREV_PC_REG])
            .field("r2", &self.regs[RESULT_REG])
            .field("r4", &self.regs[ARG1_REG])
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_pc_triple() {
        let mut regs = Registers::for_entry(1024);
        regs.advance_pc();
        assert_eq!((regs.read(PREV_PC_REG), regs.pc(), regs.read(NEXT_PC_REG)), (0, 4, 8));
        regs.advance_pc();
        assert_eq!((regs.read(PREV_PC_REG), regs.pc(), regs.read(NEXT_PC_REG)), (4, 8, 12));
    }

    #[test]
    fn test_jump_resets_next_pc() {
        let mut regs = Registers::for_entry(0);
        regs.advance_pc();
        regs.jump(40);
        assert_eq!((regs.read(PREV_PC_REG), regs.pc(), regs.read(NEXT_PC_REG)), (4, 40, 44));
    }

    #[test]
    fn test_out_of_range_register_is_an_error() {
        let mut regs = Registers::new();
        assert_eq!(regs.get(NUM_TOTAL_REGS), Err(KernelError::InvalidRegister { reg: NUM_TOTAL_REGS }));
        assert_eq!(regs.set(64, 1), Err(KernelError::InvalidRegister { reg: 64 }));
        regs.set(BAD_VADDR_REG, 5).unwrap();
        assert_eq!(regs.get(BAD_VADDR_REG), Ok(5));
    }
}
