//! Thread lifecycle: fork, yield, block, wake, exit, join, sleep
//!
//! Every operation that touches the ready queue, the sleep queue or a TCB
//! runs with interrupts off and restores the caller's level on the way out.

use super::dispatch::thread_root;
use super::halt::{ExitRecord, HaltReason};
use super::interrupts::InterruptGuard;
use super::Kernel;
use crate::error::{fatal, KernelError, KernelResult, OrFatal};
use crate::machine::{IntStatus, Registers};
use crate::scheduler::switch::{Context, MachineContext};
use crate::scheduler::thread::{Thread, ThreadStack, ThreadState};
use crate::scheduler::ThreadId;
use crate::userprog::AddressSpace;
use crate::{kernel_assert, ExitCode, Pid};

/// Body of a kernel-level thread: receives the kernel and its argument
pub type ThreadEntry = Box<dyn FnOnce(&Kernel, isize) + Send + 'static>;

/// Program image a forked user process starts with
pub(crate) struct UserImage {
    pub space: AddressSpace,
    pub registers: Registers,
}

impl Kernel {
    /// Create a thread running `entry(arg)` and make it ready
    ///
    /// The new thread is a child of the caller. Running out of TCBs or
    /// child slots is fatal; see `try_fork` for the fallible form.
    pub fn fork<F>(&self, name: &str, entry: F, arg: isize) -> Pid
    where
        F: FnOnce(&Kernel, isize) + Send + 'static,
    {
        self.spawn(name, Box::new(entry), arg, None).or_fatal()
    }

    pub fn try_fork<F>(&self, name: &str, entry: F, arg: isize) -> KernelResult<Pid>
    where
        F: FnOnce(&Kernel, isize) + Send + 'static,
    {
        self.spawn(name, Box::new(entry), arg, None)
    }

    pub(crate) fn spawn(
        &self,
        name: &str,
        entry: ThreadEntry,
        arg: isize,
        user: Option<UserImage>,
    ) -> KernelResult<Pid> {
        let _guard = InterruptGuard::new(self);
        let mut st = self.lock();

        let params = st.thread_params();
        let parent = st.current;
        let ppid = parent.map(|id| st.pid_of(id));
        let id = st.threads.allocate(|pid| Thread::new(pid, name, ppid, &params))?;
        let pid = st.pid_of(id);
        if let Some(parent) = parent {
            if let Err(err) = st.thread_mut(parent).register_child(pid) {
                st.threads.remove(id);
                return Err(err);
            }
        }

        let stack = ThreadStack::allocate(self.inner.config.stack_words);
        let kernel = self.clone();
        let built = Context::build(
            &format!("{}-{}", name, pid),
            &stack,
            Box::new(move || thread_root(kernel, entry, arg)),
        );
        let context = match built {
            Ok(context) => context,
            Err(err) => {
                st.threads.remove(id);
                if let Some(parent) = parent {
                    st.thread_mut(parent).forget_child(pid);
                }
                return Err(err);
            }
        };

        let thread = st.thread_mut(id);
        thread.attach(stack, context);
        if let Some(image) = user {
            thread.replace_space(image.space);
            thread.set_user_registers(image.registers);
        }
        st.ready_to_run(id);
        log::debug!("fork: thread {} ({}) parent {:?}", pid, name, ppid);
        drop(st);
        Ok(pid)
    }

    /// Give up the CPU if another thread is ready
    ///
    /// Returns at once, without a switch, when the ready queue is empty.
    pub fn yield_cpu(&self) {
        let _guard = InterruptGuard::new(self);
        let next = {
            let mut st = self.lock();
            let id = st.current_id("yield");
            st.end_burst(id);
            st.stats.yields += 1;
            let next = st.scheduler.select_next_ready();
            if next.is_some() {
                st.ready_to_run(id);
            }
            next
        };
        if let Some(next) = next {
            self.dispatch(next);
        }
    }

    /// Block the running thread until someone makes it ready again
    ///
    /// The caller must have disabled interrupts. Idles while nothing is
    /// ready; that may halt the machine.
    pub fn block_and_sleep(&self) {
        let next = {
            let mut st = self.lock();
            st.require_interrupts_off("block_and_sleep");
            let id = st.current_id("block_and_sleep");
            st.end_burst(id);
            let now = st.now();
            let thread = st.thread_mut(id);
            thread.set_state(ThreadState::Blocked);
            thread.stats_mut().note_blocked();
            log::debug!("block: thread {} at tick {}", thread.pid(), now);
            st.scheduler.select_next_ready()
        };
        let next = match next {
            Some(next) => next,
            None => self.wait_for_ready(),
        };
        self.dispatch(next);
    }

    fn wait_for_ready(&self) -> ThreadId {
        loop {
            self.idle();
            if let Some(next) = self.lock().scheduler.select_next_ready() {
                return next;
            }
        }
    }

    /// Make a blocked thread ready
    ///
    /// Only a `Blocked` thread can be woken; anything else is an error.
    /// Sleepers belong to the timer: waking one explicitly is fatal.
    pub fn wake(&self, pid: Pid) -> KernelResult<()> {
        let _guard = InterruptGuard::new(self);
        let mut st = self.lock();
        let id = st
            .threads
            .lookup(pid)
            .filter(|id| !st.thread(*id).is_exited())
            .ok_or(KernelError::ThreadNotFound { pid })?;
        let state = st.thread(id).state();
        if state != ThreadState::Blocked {
            return Err(KernelError::NotBlocked { pid, state });
        }
        kernel_assert!(!st.sleepers.contains(id), KernelError::AlreadyQueued { pid });
        st.ready_to_run(id);
        log::debug!("wake: thread {}", pid);
        drop(st);
        Ok(())
    }

    /// Terminate the running thread
    ///
    /// Records `code` for the parent, wakes it if it is joined on this
    /// thread, and leaves the TCB for the next thread to destroy. With
    /// `terminate_if_last` the machine halts once nothing else can run.
    pub fn exit(&self, code: ExitCode, terminate_if_last: bool) -> ! {
        self.set_level(IntStatus::Off);
        {
            let mut st = self.lock();
            let id = st.current_id("exit");
            st.end_burst(id);
            let now = st.now();

            let thread = st.thread_mut(id);
            thread.set_state(ThreadState::Blocked);
            let lifetime = thread.stats_mut().finish(now);
            thread.mark_exited();
            let pid = thread.pid();
            let ppid = thread.ppid();

            st.stats.track_finish_time(lifetime);
            st.exits.push(ExitRecord { pid, code, tick: now });
            log::debug!("exit: thread {} status {} at tick {}", pid, code, now);

            if let Some(parent) = ppid.and_then(|ppid| st.threads.lookup(ppid)) {
                let parent_thread = st.thread_mut(parent);
                if !parent_thread.is_exited() && parent_thread.set_child_exit_code(pid, code) {
                    st.ready_to_run(parent);
                }
            }
            st.mark_for_destruction(id);
        }

        let next = loop {
            let reason = {
                let mut st = self.lock();
                if let Some(next) = st.scheduler.select_next_ready() {
                    break next;
                }
                if !terminate_if_last || !st.sleepers.is_empty() {
                    None
                } else if st.threads.active_count() == 0 {
                    Some(HaltReason::AllThreadsExited)
                } else {
                    Some(HaltReason::NoRunnableThreads)
                }
            };
            match reason {
                Some(reason) => self.shutdown(reason),
                None => self.idle(),
            }
        };
        self.dispatch_final(next)
    }

    /// Wait for the child in `slot` to exit and return its status
    ///
    /// Returns immediately when the child already exited. A slot that is
    /// not one of the caller's children is fatal.
    pub fn join(&self, slot: usize) -> ExitCode {
        let _guard = InterruptGuard::new(self);
        let must_block = {
            let mut st = self.lock();
            let id = st.current_id("join");
            let thread = st.thread_mut(id);
            let pid = thread.pid();
            let Some(child) = thread.child(slot).copied() else {
                fatal(KernelError::UnknownChild { pid, slot });
            };
            let pending = child.exit_code.is_none();
            if pending {
                thread.begin_join(slot);
                log::debug!("join: thread {} waits on child {}", pid, child.pid);
            }
            pending
        };
        if must_block {
            self.block_and_sleep();
        }

        let st = self.lock();
        let id = st.current_id("join");
        let thread = st.thread(id);
        match thread.child(slot).and_then(|child| child.exit_code) {
            Some(code) => code,
            None => fatal(KernelError::UnknownChild { pid: thread.pid(), slot }),
        }
    }

    /// Join by child pid; `None` when `pid` is not a child of the caller
    pub fn join_pid(&self, pid: Pid) -> Option<ExitCode> {
        let slot = self.child_slot(pid)?;
        Some(self.join(slot))
    }

    /// Sleep for `ticks`; zero just yields
    pub fn sleep(&self, ticks: u64) {
        if ticks == 0 {
            self.yield_cpu();
            return;
        }
        let wake_tick = self.now() + ticks;
        self.sleep_until(wake_tick);
    }

    /// Block until the first timer event at or after `wake_tick`
    pub fn sleep_until(&self, wake_tick: u64) {
        let _guard = InterruptGuard::new(self);
        {
            let mut st = self.lock();
            let id = st.current_id("sleep_until");
            let pid = st.pid_of(id);
            st.sleepers.insert(id, pid, wake_tick);
            log::debug!("sleep: thread {} until tick {} (now {})", pid, wake_tick, st.now());
        }
        self.block_and_sleep();
    }

    /// Verify the running thread's stack fencepost
    pub fn check_stack_overflow(&self) {
        let st = self.lock();
        let id = st.current_id("check_stack_overflow");
        st.thread(id).check_stack_overflow();
    }

    /// Store a word on the running thread's stack; offset 0 is the guard end.
    /// Lets tests corrupt the fencepost.
    #[doc(hidden)]
    pub fn write_stack_word(&self, offset: usize, value: u32) {
        let mut st = self.lock();
        let id = st.current_id("write_stack_word");
        if let Some(stack) = st.thread_mut(id).stack_mut() {
            stack.write_word(offset, value);
        }
    }
}
