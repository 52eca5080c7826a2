//! Context switch platform boundary
//!
//! A `MachineContext` is the saved execution state of one thread. It is
//! built from a continuation: the first time the thread is dispatched it
//! enters that continuation instead of returning from a switch. Only one
//! module implements the trait; everything above it is platform-neutral.

pub mod hosted;

use crate::error::KernelResult;
use crate::scheduler::thread::ThreadStack;

/// Code a new thread starts in
pub type Continuation = Box<dyn FnOnce() + Send + 'static>;

/// How a parked thread was resumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resumed {
    /// Granted the CPU
    Dispatched,
    /// Machine powered off; the thread must unwind
    Halted,
}

pub trait MachineContext: Sized + Send {
    /// Cheap reference used to transfer control while the owning TCB
    /// stays in the thread table
    type Handle: Clone + Send;

    /// Build a context that starts in `entry` on its first dispatch
    fn build(name: &str, stack: &ThreadStack, entry: Continuation) -> KernelResult<Self>;

    fn handle(&self) -> Self::Handle;

    /// Give the CPU to `to` and park the caller until it is granted back
    fn switch(from: &Self::Handle, to: &Self::Handle) -> Resumed;

    /// Give the CPU to `to`; the caller never runs again
    fn hand_off(to: &Self::Handle);

    /// Wake a parked context so that it unwinds
    fn halt(handle: &Self::Handle);

    /// Release the platform resources once the thread is gone
    fn reap(self);
}

/// Active platform
pub type Context = hosted::HostContext;
pub type ContextHandle = <Context as MachineContext>::Handle;
