//! User address space
//!
//! Pages are brought in on first touch. The program image itself is shared
//! between a parent and its forked children; only residency and the
//! per-space counters are private.
//!
//! Layout: code from 0, data from `DATA_BASE`, then `USER_STACK_BYTES` of
//! stack at the top.

use std::sync::Arc;

use super::program::{Op, Program};
use crate::error::{KernelError, KernelResult};
use crate::machine::registers::INSTRUCTION_BYTES;

/// Bytes per virtual page
pub const PAGE_SIZE: usize = 128;

pub const USER_STACK_BYTES: usize = 1024;

/// First byte of the data segment
pub const DATA_BASE: i32 = 4096;

/// Program image plus its paging state
#[derive(Debug)]
pub struct AddressSpace {
    program: Arc<Program>,
    resident: Vec<bool>,
    page_faults: u64,
    saves: u64,
    restores: u64,
}

impl AddressSpace {
    /// Fresh space for `program`; nothing resident yet
    pub fn create(program: Arc<Program>) -> KernelResult<Self> {
        let data_end = DATA_BASE as usize + program.data().len();
        let size = data_end.max(program.code_bytes()) + USER_STACK_BYTES;
        let pages = size.div_ceil(PAGE_SIZE);
        log::debug!("addrspace: '{}' {} pages", program.name(), pages);
        Ok(Self { program, resident: vec![false; pages], page_faults: 0, saves: 0, restores: 0 })
    }

    /// Child copy for fork. Shares the image; inherits residency.
    pub fn duplicate(&self) -> Self {
        Self {
            program: Arc::clone(&self.program),
            resident: self.resident.clone(),
            page_faults: 0,
            saves: 0,
            restores: 0,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn num_pages(&self) -> usize {
        self.resident.len()
    }

    pub fn size_bytes(&self) -> usize {
        self.resident.len() * PAGE_SIZE
    }

    pub fn resident_pages(&self) -> usize {
        self.resident.iter().filter(|page| **page).count()
    }

    pub fn page_faults(&self) -> u64 {
        self.page_faults
    }

    pub fn saves(&self) -> u64 {
        self.saves
    }

    pub fn restores(&self) -> u64 {
        self.restores
    }

    /// Initial stack pointer
    pub fn stack_top(&self) -> i32 {
        (self.size_bytes() - 16) as i32
    }

    pub fn save_context_on_switch(&mut self) {
        self.saves += 1;
    }

    pub fn restore_context_on_switch(&mut self) {
        self.restores += 1;
    }

    /// Make the page holding `vaddr` resident
    pub fn service_page_fault(&mut self, vaddr: i32) -> KernelResult<()> {
        let page = self.page_of(vaddr)?;
        if !self.resident[page] {
            self.resident[page] = true;
            self.page_faults += 1;
            log::trace!("page fault: vaddr {:#x} page {}", vaddr, page);
        }
        Ok(())
    }

    fn page_of(&self, vaddr: i32) -> KernelResult<usize> {
        usize::try_from(vaddr)
            .ok()
            .map(|addr| addr / PAGE_SIZE)
            .filter(|page| *page < self.resident.len())
            .ok_or(KernelError::AddressError { vaddr })
    }

    /// Op at byte address `pc`; `None` once execution runs off the end
    pub fn fetch(&mut self, pc: i32) -> KernelResult<Option<Op>> {
        if pc < 0 || pc % INSTRUCTION_BYTES != 0 {
            return Err(KernelError::AddressError { vaddr: pc });
        }
        let index = (pc / INSTRUCTION_BYTES) as usize;
        if index >= self.program.code().len() {
            return Ok(None);
        }
        self.service_page_fault(pc)?;
        Ok(self.program.op(index))
    }

    /// NUL-terminated string at `vaddr` in the data segment
    pub fn read_c_string(&mut self, vaddr: i32) -> KernelResult<String> {
        let start = vaddr
            .checked_sub(DATA_BASE)
            .and_then(|offset| usize::try_from(offset).ok())
            .filter(|offset| *offset < self.program.data().len())
            .ok_or(KernelError::AddressError { vaddr })?;
        let len = self.program.data()[start..]
            .iter()
            .position(|byte| *byte == 0)
            .ok_or(KernelError::AddressError { vaddr })?;
        for offset in [0, len] {
            self.service_page_fault(vaddr + offset as i32)?;
        }
        let bytes = &self.program.data()[start..start + len];
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn destroy(self) {
        log::trace!(
            "addrspace: '{}' released ({} faults, {} resident)",
            self.program.name(),
            self.page_faults,
            self.resident_pages()
        );
    }
}
