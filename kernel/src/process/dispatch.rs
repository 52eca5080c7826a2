//! Dispatch protocol
//!
//! `dispatch` is the only place where control moves between threads. The
//! outgoing thread parks inside `Context::switch`; when it is granted the
//! CPU again it runs the dispatch tail: free the TCB marked for destruction
//! and reload its own user state. A brand-new thread never returns from a
//! switch, so its trampoline runs the same tail through
//! `resume_after_first_dispatch`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use super::halt::HaltReason;
use super::lifecycle::ThreadEntry;
use super::{unwind, Kernel, Unwind};
use crate::error::{fatal, KernelError};
use crate::machine::IntStatus;
use crate::scheduler::switch::{Context, ContextHandle, MachineContext, Resumed};
use crate::scheduler::ThreadId;

impl Kernel {
    /// Switch from the running thread to `next`; returns once the caller
    /// is dispatched again
    pub(crate) fn dispatch(&self, next: ThreadId) {
        let switch = self.lock().prepare_dispatch(next);
        let Some(from) = switch.from else {
            fatal(KernelError::NoCurrentThread { operation: "dispatch" });
        };
        if Context::switch(&from, &switch.to) == Resumed::Halted {
            unwind(Unwind::Halted);
        }
        self.finish_switch();
    }

    /// Final transfer away from an exiting thread. Its host stack unwinds
    /// and the next thread frees the TCB.
    pub(crate) fn dispatch_final(&self, next: ThreadId) -> ! {
        let switch = self.lock().prepare_dispatch(next);
        Context::hand_off(&switch.to);
        unwind(Unwind::Retired)
    }

    /// Dispatch tail for a thread entering its continuation
    pub(crate) fn resume_after_first_dispatch(&self) {
        self.finish_switch();
    }

    fn finish_switch(&self) {
        let carcass = {
            let mut st = self.lock();
            let carcass = st.take_pending_destruction();
            st.restore_current_user_state();
            carcass
        };
        // joins the retired host thread; must run without the state lock
        if let Some(thread) = carcass {
            thread.destroy();
        }
    }

    /// Stop the machine: record the reason, wake every parked context so it
    /// unwinds, and release `run`. Idempotent.
    pub(crate) fn power_off(&self, reason: HaltReason) {
        let handles: Vec<ContextHandle> = {
            let mut st = self.lock();
            if st.halted.is_some() {
                return;
            }
            log::info!("halt: {} at tick {}", reason, st.now());
            st.halted = Some(reason.clone());
            st.threads.iter().filter_map(|(_, thread)| thread.context_handle()).collect()
        };
        for handle in &handles {
            Context::halt(handle);
        }
        self.inner.power.signal(reason);
    }

    /// Power off and end the calling thread
    pub(crate) fn shutdown(&self, reason: HaltReason) -> ! {
        self.power_off(reason);
        unwind(Unwind::Halted)
    }

    /// Halt the machine from a running thread
    pub fn halt(&self) -> ! {
        self.shutdown(HaltReason::Requested)
    }

    pub fn is_halted(&self) -> bool {
        self.lock().halted.is_some()
    }
}

/// Body of every simulated thread
pub(crate) fn thread_root(kernel: Kernel, entry: ThreadEntry, arg: isize) {
    let outcome: std::thread::Result<()> = panic::catch_unwind(AssertUnwindSafe(|| {
        kernel.resume_after_first_dispatch();
        kernel.set_level(IntStatus::On);
        entry(&kernel, arg);
        kernel.exit(0, true)
    }));
    let Err(payload) = outcome else {
        return;
    };
    if payload.downcast_ref::<Unwind>().is_some() {
        return;
    }
    let err = match payload.downcast::<KernelError>() {
        Ok(err) => *err,
        Err(other) => KernelError::ThreadPanicked {
            pid: kernel.try_current_pid(),
            message: panic_message(other.as_ref()),
        },
    };
    kernel.power_off(HaltReason::Fatal(err));
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
