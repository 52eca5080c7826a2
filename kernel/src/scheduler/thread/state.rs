//! State - Thread state machine
//!
//! `JustCreated → Ready → Running → {Ready, Blocked} → … → Blocked (exited)`.
//! An exited thread stays `Blocked` until its TCB is destroyed.

use core::fmt;

/// Thread state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadState {
    /// TCB built, never enqueued
    JustCreated,

    /// Waiting in the ready queue
    Ready,

    /// Owns the CPU
    Running,

    /// Waiting for an external wake (timer, join signal, semaphore) or exited
    Blocked,
}

impl ThreadState {
    /// Check if a state transition is legal
    pub fn can_transition(self, to: ThreadState) -> bool {
        use ThreadState::*;
        matches!(
            (self, to),
            (JustCreated, Ready) | (Ready, Running) | (Running, Ready) | (Running, Blocked) | (Blocked, Ready)
        )
    }

    /// Check if state is schedulable
    pub fn is_schedulable(self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::JustCreated => write!(f, "JustCreated"),
            Self::Ready => write!(f, "Ready"),
            Self::Running => write!(f, "Running"),
            Self::Blocked => write!(f, "Blocked"),
        }
    }
}
