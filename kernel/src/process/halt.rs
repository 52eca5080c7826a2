//! Machine power-off and end-of-run reporting

use core::fmt;
use std::sync::{Condvar, Mutex, PoisonError};

use crate::error::KernelError;
use crate::scheduler::StatsReport;
use crate::{ExitCode, Pid};

/// Why the machine stopped
#[derive(Debug, Clone, PartialEq)]
pub enum HaltReason {
    /// The last thread exited
    AllThreadsExited,
    /// Nothing ready and nothing that could ever wake
    NoRunnableThreads,
    /// Halt syscall or `Kernel::halt`
    Requested,
    /// Invariant violation or an uncaught panic in a thread
    Fatal(KernelError),
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllThreadsExited => write!(f, "all threads exited"),
            Self::NoRunnableThreads => write!(f, "no runnable threads"),
            Self::Requested => write!(f, "halt requested"),
            Self::Fatal(err) => write!(f, "fatal: {}", err),
        }
    }
}

/// One thread's exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitRecord {
    pub pid: Pid,
    pub code: ExitCode,
    pub tick: u64,
}

/// What `Kernel::run` hands back after a clean halt
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub reason: HaltReason,
    pub stats: StatsReport,
    pub exits: Vec<ExitRecord>,
}

impl RunReport {
    /// Exit status recorded for `pid`
    pub fn exit_code(&self, pid: Pid) -> Option<ExitCode> {
        self.exits.iter().find(|record| record.pid == pid).map(|record| record.code)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Machine halting: {}", self.reason)?;
        for record in &self.exits {
            writeln!(f, "[pid {}]: exit status {} at tick {}", record.pid, record.code, record.tick)?;
        }
        write!(f, "{}", self.stats)
    }
}

/// Unwind payloads that end a host thread without being an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unwind {
    /// The thread exited and handed the CPU on
    Retired,
    /// The machine powered off
    Halted,
}

pub(crate) fn unwind(marker: Unwind) -> ! {
    std::panic::resume_unwind(Box::new(marker))
}

/// Wakes the boot thread once the machine halts
#[derive(Debug, Default)]
pub(crate) struct PowerSwitch {
    reason: Mutex<Option<HaltReason>>,
    cv: Condvar,
}

impl PowerSwitch {
    pub fn signal(&self, reason: HaltReason) {
        let mut slot = self.reason.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(reason);
        }
        self.cv.notify_all();
    }

    pub fn wait(&self) -> HaltReason {
        let mut slot = self.reason.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(reason) = slot.take() {
                return reason;
            }
            slot = self.cv.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }
}
