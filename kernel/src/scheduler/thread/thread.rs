//! Thread Control Block
//!
//! Identity, state, stack and saved contexts, scheduling inputs and the
//! parent/child bookkeeping of one schedulable thread. Parents and children
//! refer to each other by pid only; the TCBs themselves live in the
//! `ThreadTable` arena.

use super::stack::ThreadStack;
use super::state::ThreadState;
use super::statistics::ThreadStatistics;
use crate::error::{KernelError, KernelResult};
use crate::machine::Registers;
use crate::scheduler::switch::{Context, ContextHandle, MachineContext};
use crate::userprog::AddressSpace;
use crate::{kernel_assert, ExitCode, Pid};

/// Exit status slot for one forked child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildRecord {
    pub pid: Pid,
    /// Recorded once the child exits
    pub exit_code: Option<ExitCode>,
}

/// Construction parameters shared by every new TCB
#[derive(Debug, Clone, Copy)]
pub struct ThreadParams {
    pub now: u64,
    pub base_priority: i64,
    pub initial_burst_estimate: f64,
    pub max_children: usize,
}

/// Thread control block
pub struct Thread {
    pid: Pid,
    ppid: Option<Pid>,
    name: String,
    state: ThreadState,
    exited: bool,

    // Execution context
    stack: Option<ThreadStack>,
    context: Option<Context>,
    user_registers: Registers,
    /// True while `user_registers` mirrors the live machine registers
    state_restored: bool,
    space: Option<AddressSpace>,

    // Scheduling inputs
    base_priority: i64,
    priority: i64,
    cpu_credit: u64,
    stats: ThreadStatistics,
    /// Inside a timer-forced yield; further timer requests are dropped
    preempting: bool,

    // Child bookkeeping
    children: Vec<ChildRecord>,
    max_children: usize,
    joining: Option<usize>,
}

impl Thread {
    pub fn new(pid: Pid, name: &str, ppid: Option<Pid>, params: &ThreadParams) -> Self {
        Self {
            pid,
            ppid,
            name: name.to_owned(),
            state: ThreadState::JustCreated,
            exited: false,
            stack: None,
            context: None,
            user_registers: Registers::new(),
            state_restored: true,
            space: None,
            base_priority: params.base_priority,
            priority: params.base_priority,
            cpu_credit: 0,
            stats: ThreadStatistics::new(params.now, params.initial_burst_estimate),
            preempting: false,
            children: Vec::new(),
            max_children: params.max_children,
            joining: None,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn ppid(&self) -> Option<Pid> {
        self.ppid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Change state; an illegal transition aborts the machine
    pub(crate) fn set_state(&mut self, to: ThreadState) {
        kernel_assert!(
            self.state.can_transition(to),
            KernelError::InvalidStateTransition { pid: self.pid, from: self.state, to }
        );
        self.state = to;
    }

    /// Logically terminated, waiting for destruction
    pub fn is_exited(&self) -> bool {
        self.exited
    }

    pub(crate) fn mark_exited(&mut self) {
        self.exited = true;
    }

    pub fn is_preempting(&self) -> bool {
        self.preempting
    }

    pub(crate) fn set_preempting(&mut self, preempting: bool) {
        self.preempting = preempting;
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn base_priority(&self) -> i64 {
        self.base_priority
    }

    pub fn cpu_credit(&self) -> u64 {
        self.cpu_credit
    }

    pub(crate) fn add_cpu_credit(&mut self, ticks: u64) {
        self.cpu_credit += ticks;
    }

    /// Halve the CPU credit and recompute the UNIX-style priority
    pub(crate) fn decay_priority(&mut self) {
        self.cpu_credit >>= 1;
        self.priority = self.base_priority + (self.cpu_credit >> 1) as i64;
    }

    pub fn stats(&self) -> &ThreadStatistics {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut ThreadStatistics {
        &mut self.stats
    }

    // ── Execution context ──────────────────────────────────────────

    /// Install the stack and the continuation built on it
    pub(crate) fn attach(&mut self, stack: ThreadStack, context: Context) {
        self.stack = Some(stack);
        self.context = Some(context);
    }

    pub fn has_stack(&self) -> bool {
        self.stack.is_some()
    }

    pub(crate) fn stack_mut(&mut self) -> Option<&mut ThreadStack> {
        self.stack.as_mut()
    }

    pub(crate) fn context_handle(&self) -> Option<ContextHandle> {
        self.context.as_ref().map(MachineContext::handle)
    }

    /// Verify the stack fencepost; corruption aborts the machine
    pub(crate) fn check_stack_overflow(&self) {
        if let Some(stack) = &self.stack {
            kernel_assert!(stack.is_intact(), KernelError::StackOverflow { pid: self.pid });
        }
    }

    pub fn space(&self) -> Option<&AddressSpace> {
        self.space.as_ref()
    }

    pub(crate) fn space_mut(&mut self) -> Option<&mut AddressSpace> {
        self.space.as_mut()
    }

    /// Swap in a new program image, returning the old one
    pub(crate) fn replace_space(&mut self, space: AddressSpace) -> Option<AddressSpace> {
        self.space.replace(space)
    }

    /// Seed the saved user registers of a thread that has not run yet
    pub(crate) fn set_user_registers(&mut self, registers: Registers) {
        self.user_registers = registers;
        self.state_restored = false;
    }

    pub fn user_registers(&self) -> &Registers {
        &self.user_registers
    }

    /// Copy the live registers out, unless a saved copy is already newer
    pub(crate) fn save_user_state(&mut self, live: &Registers) {
        if self.state_restored {
            self.user_registers = *live;
            self.state_restored = false;
        }
    }

    pub(crate) fn restore_user_state(&mut self, live: &mut Registers) {
        *live = self.user_registers;
        self.state_restored = true;
    }

    // ── Children ───────────────────────────────────────────────────

    pub fn children(&self) -> &[ChildRecord] {
        &self.children
    }

    pub fn child(&self, slot: usize) -> Option<&ChildRecord> {
        self.children.get(slot)
    }

    pub fn child_slot(&self, pid: Pid) -> Option<usize> {
        self.children.iter().position(|child| child.pid == pid)
    }

    pub(crate) fn register_child(&mut self, pid: Pid) -> KernelResult<usize> {
        if self.children.len() >= self.max_children {
            return Err(KernelError::ChildTableFull { pid: self.pid, max: self.max_children });
        }
        self.children.push(ChildRecord { pid, exit_code: None });
        Ok(self.children.len() - 1)
    }

    /// Drop the record of a child whose creation failed
    pub(crate) fn forget_child(&mut self, pid: Pid) {
        if let Some(slot) = self.child_slot(pid) {
            self.children.remove(slot);
        }
    }

    /// Slot this thread is blocked joining on
    pub fn joining(&self) -> Option<usize> {
        self.joining
    }

    pub(crate) fn begin_join(&mut self, slot: usize) {
        self.joining = Some(slot);
    }

    /// Record a child's exit status. Returns true when the parent was
    /// joined on that child and must be woken.
    pub(crate) fn set_child_exit_code(&mut self, child: Pid, code: ExitCode) -> bool {
        let Some(slot) = self.child_slot(child) else {
            return false;
        };
        self.children[slot].exit_code = Some(code);
        if self.joining == Some(slot) {
            self.joining = None;
            true
        } else {
            false
        }
    }

    /// Release every resource the TCB owns. The host context is reaped
    /// last, so this must not run under the kernel state lock.
    pub(crate) fn destroy(mut self) {
        if let Some(space) = self.space.take() {
            space.destroy();
        }
        self.stack = None;
        if let Some(context) = self.context.take() {
            context.reap();
        }
    }
}

impl core::fmt::Debug for Thread {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Thread")
            .field("pid", &self.pid)
            .field("ppid", &self.ppid)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("exited", &self.exited)
            .field("priority", &self.priority)
            .finish()
    }
}
