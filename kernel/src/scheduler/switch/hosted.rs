//! Hosted context switch
//!
//! Every simulated thread runs on its own host thread. A per-thread baton
//! decides which one may execute: granting a baton wakes its owner, and the
//! switching thread then parks on its own baton. At most one baton is in the
//! `Run` state outside the short grant/park window, so the simulated machine
//! stays a uniprocessor.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use super::{Continuation, MachineContext, Resumed};
use crate::error::{KernelError, KernelResult};
use crate::scheduler::thread::ThreadStack;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Turn {
    Parked,
    Run,
    Halt,
}

/// Run permission of one host thread
#[derive(Debug)]
pub struct Baton {
    turn: Mutex<Turn>,
    cv: Condvar,
}

impl Baton {
    fn new() -> Self {
        Self { turn: Mutex::new(Turn::Parked), cv: Condvar::new() }
    }

    fn lock(&self) -> MutexGuard<'_, Turn> {
        self.turn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn grant(&self) {
        let mut turn = self.lock();
        if *turn != Turn::Halt {
            *turn = Turn::Run;
        }
        self.cv.notify_one();
    }

    fn halt(&self) {
        *self.lock() = Turn::Halt;
        self.cv.notify_all();
    }

    /// Block until granted or halted
    fn wait_turn(&self) -> Resumed {
        let mut turn = self.lock();
        loop {
            match *turn {
                Turn::Run => {
                    *turn = Turn::Parked;
                    return Resumed::Dispatched;
                }
                Turn::Halt => return Resumed::Halted,
                Turn::Parked => {
                    turn = self.cv.wait(turn).unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }
}

/// Host-thread-backed execution context
pub struct HostContext {
    baton: Arc<Baton>,
    host: Option<JoinHandle<()>>,
}

impl MachineContext for HostContext {
    type Handle = Arc<Baton>;

    fn build(name: &str, stack: &ThreadStack, entry: Continuation) -> KernelResult<Self> {
        let baton = Arc::new(Baton::new());
        let gate = Arc::clone(&baton);
        let host = thread::Builder::new()
            .name(name.to_owned())
            .stack_size(stack.size_bytes())
            .spawn(move || {
                if gate.wait_turn() == Resumed::Dispatched {
                    entry();
                }
            })
            .map_err(|err| KernelError::ContextBuild { name: name.to_owned(), reason: err.to_string() })?;
        Ok(Self { baton, host: Some(host) })
    }

    fn handle(&self) -> Self::Handle {
        Arc::clone(&self.baton)
    }

    fn switch(from: &Self::Handle, to: &Self::Handle) -> Resumed {
        to.grant();
        from.wait_turn()
    }

    fn hand_off(to: &Self::Handle) {
        to.grant();
    }

    fn halt(handle: &Self::Handle) {
        handle.halt();
    }

    fn reap(mut self) {
        if let Some(host) = self.host.take() {
            // the thread body catches its own unwinds
            let _ = host.join();
        }
    }
}
