//! Process management
//!
//! The `Kernel` is the single context object of the simulated machine: it
//! owns the scheduler state (ready queue, sleep queue, TCB arena, current
//! thread, pending destruction), the interrupt controller and the program
//! loader. Every simulated thread receives a `&Kernel` and drives the
//! lifecycle through it.
//!
//! # Concurrency
//! One simulated thread executes at a time. Scheduler state is guarded by
//! the simulated interrupt level; the `spin::Mutex` around it only makes the
//! hand-over between host threads sound and is never held across a switch.

mod dispatch;
mod halt;
mod interrupts;
mod lifecycle;
mod snapshot;
pub(crate) mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use spin::{Mutex, MutexGuard, RwLock, RwLockReadGuard};

use crate::config::KernelConfig;
use crate::error::{KernelError, KernelResult};
use crate::scheduler::switch::{Context, MachineContext};
use crate::scheduler::Statistics;
use crate::userprog::{Program, ProgramLoader};
use crate::Pid;

pub use halt::{ExitRecord, HaltReason, RunReport};
pub use interrupts::InterruptGuard;
pub use lifecycle::ThreadEntry;
pub(crate) use lifecycle::UserImage;
pub use snapshot::{SchedulerSnapshot, ThreadInfo};

pub(crate) use halt::{unwind, Unwind};
use halt::PowerSwitch;
use state::KernelState;

struct KernelInner {
    config: KernelConfig,
    state: Mutex<KernelState>,
    loader: RwLock<ProgramLoader>,
    power: PowerSwitch,
    booted: AtomicBool,
}

/// Handle to the simulated machine
#[derive(Clone)]
pub struct Kernel {
    inner: Arc<KernelInner>,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Self {
        let state = KernelState::new(&config);
        Self {
            inner: Arc::new(KernelInner {
                config,
                state: Mutex::new(state),
                loader: RwLock::new(ProgramLoader::new()),
                power: PowerSwitch::default(),
                booted: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.inner.config
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, KernelState> {
        self.inner.state.lock()
    }

    pub(crate) fn loader(&self) -> RwLockReadGuard<'_, ProgramLoader> {
        self.inner.loader.read()
    }

    /// Make an executable available to Exec under `path`
    pub fn register_program(&self, path: &str, program: Program) {
        self.inner.loader.write().register(path, program);
    }

    /// Boot the machine with `main` as its first thread and block until it
    /// halts.
    ///
    /// Returns `Err` when the configuration is invalid or the machine
    /// stopped on a fatal error.
    pub fn run<F>(&self, main: F) -> KernelResult<RunReport>
    where
        F: FnOnce(&Kernel) + Send + 'static,
    {
        self.inner.config.validate()?;
        if self.inner.booted.swap(true, Ordering::SeqCst) {
            return Err(KernelError::AlreadyBooted);
        }
        log::info!(
            "boot: policy {} timer period {} max threads {}",
            self.inner.config.policy,
            self.inner.config.timer_period(),
            self.inner.config.max_threads
        );

        self.spawn("main", Box::new(move |kernel: &Kernel, _: isize| main(kernel)), 0, None)?;
        let first = {
            let mut st = self.lock();
            st.stats.simulation_start = st.now();
            let Some(first) = st.scheduler.select_next_ready() else {
                return Err(KernelError::BootFailed { reason: "ready queue empty after boot" });
            };
            st.prepare_dispatch(first)
        };
        Context::hand_off(&first.to);

        let reason = self.inner.power.wait();
        let carcasses = {
            let mut st = self.lock();
            st.to_be_destroyed = None;
            st.threads.drain()
        };
        for thread in carcasses {
            thread.destroy();
        }

        let report = {
            let st = self.lock();
            RunReport { reason: reason.clone(), stats: st.stats.report(), exits: st.exits.clone() }
        };
        log::info!("Machine halting: {}\n{}", report.reason, report.stats);
        match reason {
            HaltReason::Fatal(err) => Err(err),
            _ => Ok(report),
        }
    }

    /// Boot with the registered executable at `path` as the first process
    pub fn run_program(&self, path: &str) -> KernelResult<RunReport> {
        self.loader().load(path)?;
        let path = path.to_owned();
        self.run(move |kernel| kernel.exec_and_run(&path))
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Simulated clock
    pub fn now(&self) -> u64 {
        self.lock().now()
    }

    /// Pid of the running thread. Only meaningful from inside a thread.
    pub fn current_pid(&self) -> Pid {
        let st = self.lock();
        let id = st.current_id("current_pid");
        st.pid_of(id)
    }

    pub(crate) fn try_current_pid(&self) -> Option<Pid> {
        self.lock().current_thread().map(|thread| thread.pid())
    }

    /// Parent recorded when the running thread was forked
    pub fn parent_pid(&self) -> Option<Pid> {
        self.lock().current_thread().and_then(|thread| thread.ppid())
    }

    /// Child slot of `pid` in the running thread's child table
    pub fn child_slot(&self, pid: Pid) -> Option<usize> {
        self.lock().current_thread().and_then(|thread| thread.child_slot(pid))
    }

    /// Threads that have not exited
    pub fn active_threads(&self) -> usize {
        self.lock().threads.active_count()
    }

    pub fn statistics(&self) -> Statistics {
        self.lock().stats.clone()
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

impl core::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Kernel").field("config", &self.inner.config).finish_non_exhaustive()
    }
}
