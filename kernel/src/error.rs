//! Kernel Error Handling
//!
//! Typed errors for every kernel-core operation, plus the fatal path used
//! when a caller breaks a scheduler contract. Fatal errors never reach user
//! code: they stop the whole simulated machine.

use core::fmt;

use crate::scheduler::thread::ThreadState;
use crate::Pid;

/// Kernel error types with detailed context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    // ═══════════════════════════════════════════════════════════════
    // Configuration / boot
    // ═══════════════════════════════════════════════════════════════
    /// A configuration field is out of range
    InvalidConfig { field: &'static str, reason: &'static str },

    /// `Kernel::run` called a second time
    AlreadyBooted,

    /// The machine could not dispatch its first thread
    BootFailed { reason: &'static str },

    // ═══════════════════════════════════════════════════════════════
    // Thread table
    // ═══════════════════════════════════════════════════════════════
    /// No free TCB slot for a new thread
    PidPoolExhausted { live: usize, max: usize },

    /// A thread already owns the maximum number of children
    ChildTableFull { pid: Pid, max: usize },

    /// No live thread with this pid
    ThreadNotFound { pid: Pid },

    /// A `ThreadId` whose slot has been recycled
    StaleThreadId { index: u32, generation: u32 },

    // ═══════════════════════════════════════════════════════════════
    // Scheduler invariants (always fatal)
    // ═══════════════════════════════════════════════════════════════
    /// Join on a slot that does not address a child of the caller
    UnknownChild { pid: Pid, slot: usize },

    /// Attempt to free the TCB the CPU is executing on
    DestroyCurrentThread { pid: Pid },

    /// A second TCB marked for destruction before the first was freed
    DestructionPending { pending: Pid, requested: Pid },

    /// Scheduler state touched with interrupts enabled
    PreemptionEnabled { operation: &'static str },

    /// Operation that needs a running thread invoked without one
    NoCurrentThread { operation: &'static str },

    /// Stack fencepost overwritten
    StackOverflow { pid: Pid },

    /// Illegal thread state change
    InvalidStateTransition { pid: Pid, from: ThreadState, to: ThreadState },

    /// Explicit wake of a thread parked in the sleep queue
    AlreadyQueued { pid: Pid },

    /// Wake of a thread that is not waiting
    NotBlocked { pid: Pid, state: ThreadState },

    /// Register number outside the register file
    InvalidRegister { reg: usize },

    // ═══════════════════════════════════════════════════════════════
    // Platform
    // ═══════════════════════════════════════════════════════════════
    /// The host could not provide an execution context
    ContextBuild { name: String, reason: String },

    /// A simulated thread panicked outside the kernel's control
    ThreadPanicked { pid: Option<Pid>, message: String },

    // ═══════════════════════════════════════════════════════════════
    // User programs
    // ═══════════════════════════════════════════════════════════════
    /// No executable registered under this path
    ProgramNotFound { path: String },

    /// Executable image failed validation
    InvalidProgram { name: String, reason: &'static str },

    /// User address outside the address space
    AddressError { vaddr: i32 },

    /// User-mode operation on a thread without a program image
    NoAddressSpace { pid: Pid },

    /// Unknown syscall number or unhandled trap
    UnexpectedException { code: i32 },
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { field, reason } => {
                write!(f, "invalid configuration: {} {}", field, reason)
            }
            Self::AlreadyBooted => write!(f, "kernel already booted"),
            Self::BootFailed { reason } => write!(f, "boot failed: {}", reason),
            Self::PidPoolExhausted { live, max } => {
                write!(f, "pid pool exhausted: {}/{} live threads", live, max)
            }
            Self::ChildTableFull { pid, max } => {
                write!(f, "thread {} already has {} children", pid, max)
            }
            Self::ThreadNotFound { pid } => write!(f, "thread {} not found", pid),
            Self::StaleThreadId { index, generation } => {
                write!(f, "stale thread id {}#{}", index, generation)
            }
            Self::UnknownChild { pid, slot } => {
                write!(f, "thread {} has no child in slot {}", pid, slot)
            }
            Self::DestroyCurrentThread { pid } => {
                write!(f, "thread {} would be destroyed while running", pid)
            }
            Self::DestructionPending { pending, requested } => write!(
                f,
                "thread {} marked for destruction while {} is still pending",
                requested, pending
            ),
            Self::PreemptionEnabled { operation } => {
                write!(f, "{} entered with interrupts enabled", operation)
            }
            Self::NoCurrentThread { operation } => {
                write!(f, "{} requires a running thread", operation)
            }
            Self::StackOverflow { pid } => {
                write!(f, "stack fencepost of thread {} overwritten", pid)
            }
            Self::InvalidStateTransition { pid, from, to } => {
                write!(f, "thread {}: illegal transition {} -> {}", pid, from, to)
            }
            Self::AlreadyQueued { pid } => {
                write!(f, "thread {} is waiting in the sleep queue", pid)
            }
            Self::NotBlocked { pid, state } => {
                write!(f, "thread {} cannot be woken while {}", pid, state)
            }
            Self::InvalidRegister { reg } => write!(f, "no register {}", reg),
            Self::ContextBuild { name, reason } => {
                write!(f, "cannot build context for '{}': {}", name, reason)
            }
            Self::ThreadPanicked { pid: Some(pid), message } => {
                write!(f, "thread {} panicked: {}", pid, message)
            }
            Self::ThreadPanicked { pid: None, message } => {
                write!(f, "thread panicked: {}", message)
            }
            Self::ProgramNotFound { path } => write!(f, "no executable at '{}'", path),
            Self::InvalidProgram { name, reason } => {
                write!(f, "program '{}' rejected: {}", name, reason)
            }
            Self::AddressError { vaddr } => write!(f, "bad user address {:#x}", vaddr),
            Self::NoAddressSpace { pid } => {
                write!(f, "thread {} has no address space", pid)
            }
            Self::UnexpectedException { code } => {
                write!(f, "unexpected user mode exception {}", code)
            }
        }
    }
}

impl std::error::Error for KernelError {}

impl KernelError {
    /// Does this error stop the machine when raised inside the kernel?
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::AlreadyBooted
                | Self::ThreadNotFound { .. }
                | Self::NotBlocked { .. }
                | Self::InvalidRegister { .. }
                | Self::ProgramNotFound { .. }
                | Self::InvalidProgram { .. }
                | Self::AddressError { .. }
        )
    }

    /// Get error severity (0-3)
    pub fn severity(&self) -> u8 {
        match self {
            Self::StackOverflow { .. }
            | Self::DestroyCurrentThread { .. }
            | Self::DestructionPending { .. }
            | Self::PreemptionEnabled { .. } => 3,
            Self::PidPoolExhausted { .. }
            | Self::ChildTableFull { .. }
            | Self::UnknownChild { .. }
            | Self::ThreadPanicked { .. } => 2,
            Self::AddressError { .. } | Self::ProgramNotFound { .. } => 1,
            _ => 0,
        }
    }
}

/// Result type for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

/// Abort the simulated machine.
///
/// Logs the violation and unwinds with the error as payload; the thread
/// trampoline turns it into `HaltReason::Fatal`.
#[cold]
#[track_caller]
pub fn fatal(err: KernelError) -> ! {
    log::error!("[KERNEL CRITICAL] Invariant violated: {}", err);
    std::panic::panic_any(err)
}

/// Escalate a kernel result to a machine abort
pub trait OrFatal<T> {
    fn or_fatal(self) -> T;
}

impl<T> OrFatal<T> for KernelResult<T> {
    #[track_caller]
    fn or_fatal(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => fatal(err),
        }
    }
}

/// Macro for critical kernel assertions
#[macro_export]
macro_rules! kernel_assert {
    ($cond:expr, $err:expr) => {
        if !$cond {
            $crate::error::fatal($err);
        }
    };
}
