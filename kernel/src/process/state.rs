//! Process-wide scheduler state
//!
//! Everything the dispatcher and the lifecycle operations mutate. Owned by
//! the `Kernel`; only touched by the thread that holds the CPU, with the
//! simulated interrupt level off for any change to the ready queue, the
//! sleep queue or a TCB's scheduling fields.

use super::halt::{ExitRecord, HaltReason};
use crate::config::KernelConfig;
use crate::error::{fatal, KernelError};
use crate::machine::{IntStatus, Interrupt, Registers};
use crate::scheduler::prediction::{decay_priorities, BurstEstimator};
use crate::scheduler::switch::ContextHandle;
use crate::scheduler::thread::{Thread, ThreadParams, ThreadState};
use crate::scheduler::{Scheduler, SleepQueue, Statistics, ThreadId, ThreadTable};
use crate::{kernel_assert, Pid};

/// Control transfer prepared under the state lock
pub(crate) struct Switch {
    pub from: Option<ContextHandle>,
    pub to: ContextHandle,
}

pub(crate) struct KernelState {
    pub threads: ThreadTable,
    pub scheduler: Scheduler,
    pub sleepers: SleepQueue,
    pub interrupt: Interrupt,
    /// Live user registers of the running thread
    pub machine: Registers,
    pub stats: Statistics,
    pub current: Option<ThreadId>,
    pub to_be_destroyed: Option<ThreadId>,
    pub exits: Vec<ExitRecord>,
    pub halted: Option<HaltReason>,
    params: ThreadParams,
}

impl KernelState {
    pub fn new(config: &KernelConfig) -> Self {
        Self {
            threads: ThreadTable::new(config.max_threads),
            scheduler: Scheduler::new(config.policy, BurstEstimator::new(config.burst_smoothing)),
            sleepers: SleepQueue::new(),
            interrupt: Interrupt::new(config.timer_period()),
            machine: Registers::new(),
            stats: Statistics::new(),
            current: None,
            to_be_destroyed: None,
            exits: Vec::new(),
            halted: None,
            params: ThreadParams {
                now: 0,
                base_priority: config.base_priority,
                initial_burst_estimate: config.initial_burst_estimate,
                max_children: config.max_children,
            },
        }
    }

    pub fn now(&self) -> u64 {
        self.stats.total_ticks
    }

    /// Parameters for a TCB created at the current tick
    pub fn thread_params(&self) -> ThreadParams {
        ThreadParams { now: self.now(), ..self.params }
    }

    pub fn thread(&self, id: ThreadId) -> &Thread {
        match self.threads.get(id) {
            Some(thread) => thread,
            None => fatal(stale(id)),
        }
    }

    pub fn thread_mut(&mut self, id: ThreadId) -> &mut Thread {
        match self.threads.get_mut(id) {
            Some(thread) => thread,
            None => fatal(stale(id)),
        }
    }

    pub fn current_id(&self, operation: &'static str) -> ThreadId {
        match self.current {
            Some(id) => id,
            None => fatal(KernelError::NoCurrentThread { operation }),
        }
    }

    pub fn current_thread(&self) -> Option<&Thread> {
        self.current.and_then(|id| self.threads.get(id))
    }

    pub fn require_interrupts_off(&self, operation: &'static str) {
        kernel_assert!(
            self.interrupt.level() == IntStatus::Off,
            KernelError::PreemptionEnabled { operation }
        );
    }

    /// Put a thread on the ready queue
    pub fn ready_to_run(&mut self, id: ThreadId) {
        self.require_interrupts_off("enqueue_ready");
        let now = self.now();
        let thread = match self.threads.get_mut(id) {
            Some(thread) => thread,
            None => fatal(stale(id)),
        };
        self.scheduler.enqueue_ready(id, thread, now);
    }

    /// Close the running burst of `id` and feed the estimators
    pub fn end_burst(&mut self, id: ThreadId) {
        let now = self.now();
        let thread = match self.threads.get_mut(id) {
            Some(thread) => thread,
            None => fatal(stale(id)),
        };
        let burst = thread.stats_mut().end_burst(now);
        self.scheduler.end_burst(thread, burst, &mut self.stats);
        if self.scheduler.policy().decays_priority() {
            decay_priorities(self.threads.iter_mut());
        }
    }

    /// Everything `dispatch` does before control physically moves
    pub fn prepare_dispatch(&mut self, next: ThreadId) -> Switch {
        self.require_interrupts_off("dispatch");
        let now = self.now();

        let from = match self.current {
            Some(old) => {
                let machine = self.machine;
                let outgoing = self.thread_mut(old);
                if outgoing.space().is_some() {
                    outgoing.save_user_state(&machine);
                    if let Some(space) = outgoing.space_mut() {
                        space.save_context_on_switch();
                    }
                }
                outgoing.check_stack_overflow();
                outgoing.context_handle()
            }
            None => None,
        };

        let incoming = self.thread_mut(next);
        incoming.set_state(ThreadState::Running);
        let waited = incoming.stats_mut().begin_burst(now);
        let pid = incoming.pid();
        let to = match incoming.context_handle() {
            Some(handle) => handle,
            None => fatal(KernelError::BootFailed { reason: "dispatch target has no context" }),
        };
        self.stats.track_wait_time(waited);
        self.stats.context_switches += 1;
        log::debug!(
            "dispatch: {:?} -> {} at tick {} (waited {})",
            self.current_thread().map(Thread::pid),
            pid,
            now,
            waited
        );
        self.current = Some(next);
        Switch { from, to }
    }

    /// Detach the TCB marked for destruction. Runs on the incoming thread,
    /// so the marked thread is never the current one.
    pub fn take_pending_destruction(&mut self) -> Option<Thread> {
        let id = self.to_be_destroyed.take()?;
        let pid = self.thread(id).pid();
        kernel_assert!(self.current != Some(id), KernelError::DestroyCurrentThread { pid });
        log::debug!("destroy: thread {}", pid);
        self.threads.remove(id)
    }

    pub fn mark_for_destruction(&mut self, id: ThreadId) {
        if let Some(pending) = self.to_be_destroyed {
            fatal(KernelError::DestructionPending {
                pending: self.thread(pending).pid(),
                requested: self.thread(id).pid(),
            });
        }
        self.to_be_destroyed = Some(id);
    }

    /// Reload the running thread's user registers and address space
    pub fn restore_current_user_state(&mut self) {
        let Some(id) = self.current else {
            return;
        };
        let mut machine = self.machine;
        let thread = self.thread_mut(id);
        if thread.space().is_some() {
            thread.restore_user_state(&mut machine);
            if let Some(space) = thread.space_mut() {
                space.restore_context_on_switch();
            }
        }
        self.machine = machine;
    }

    /// Fire the timer if due: wake sleepers, request a forced yield
    pub fn service_timer(&mut self) {
        let now = self.now();
        if !self.interrupt.timer_due(now) {
            return;
        }
        self.interrupt.acknowledge_timer(now);
        log::trace!("timer: tick {}", now);
        for entry in self.sleepers.pop_due(now) {
            log::debug!("wake: thread {} (due {}, now {})", entry.pid, entry.wake_tick, now);
            self.ready_to_run(entry.id);
        }
        if self.scheduler.policy().is_preemptive()
            && self.interrupt.status() != crate::machine::MachineStatus::Idle
        {
            self.interrupt.request_yield();
        }
    }

    pub fn pid_of(&self, id: ThreadId) -> Pid {
        self.thread(id).pid()
    }
}

fn stale(id: ThreadId) -> KernelError {
    KernelError::StaleThreadId { index: id.index(), generation: id.generation() }
}
