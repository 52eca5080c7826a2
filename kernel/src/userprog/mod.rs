//! User programs
//!
//! The address-space collaborator, executable images and the loop that runs
//! a program on the simulated CPU. User code reaches the kernel only
//! through `syscall::handle_syscall`.

pub mod addrspace;
pub mod program;
mod runner;

pub use addrspace::{AddressSpace, DATA_BASE, PAGE_SIZE, USER_STACK_BYTES};
pub use program::{Op, Program, ProgramBuilder, ProgramLoader};
pub(crate) use runner::run_user;

use crate::error::{fatal, KernelError, KernelResult, OrFatal};
use crate::machine::Registers;
use crate::machine::registers::RESULT_REG;
use crate::process::{Kernel, UserImage};
use crate::Pid;

impl Kernel {
    /// Replace the running thread's program image with the executable at
    /// `path` and reset its registers to the entry point
    pub fn exec(&self, path: &str) -> KernelResult<()> {
        let program = self.loader().load(path)?;
        let space = AddressSpace::create(program)?;
        let registers = Registers::for_entry(space.stack_top());
        let old = {
            let mut st = self.lock();
            let id = st.current_id("exec");
            st.machine = registers;
            let thread = st.thread_mut(id);
            log::debug!("exec: thread {} runs '{}'", thread.pid(), space.program().name());
            thread.replace_space(space)
        };
        if let Some(old) = old {
            old.destroy();
        }
        Ok(())
    }

    /// Fork the running user process. The child resumes at the current
    /// user PC with 0 in the result register.
    pub(crate) fn fork_process(&self) -> KernelResult<Pid> {
        let (name, image) = {
            let st = self.lock();
            let id = st.current_id("fork");
            let thread = st.thread(id);
            let Some(space) = thread.space() else {
                fatal(KernelError::NoAddressSpace { pid: thread.pid() });
            };
            let mut registers = st.machine;
            registers.write(RESULT_REG, 0);
            (thread.name().to_owned(), UserImage { space: space.duplicate(), registers })
        };
        self.spawn(&name, Box::new(|kernel: &Kernel, _: isize| run_user(kernel)), 0, Some(image))
    }

    /// Run `f` on the live user registers
    pub(crate) fn with_registers<R>(&self, f: impl FnOnce(&mut Registers) -> R) -> R {
        f(&mut self.lock().machine)
    }

    pub fn read_register(&self, reg: usize) -> KernelResult<i32> {
        self.lock().machine.get(reg)
    }

    pub fn write_register(&self, reg: usize, value: i32) -> KernelResult<()> {
        self.lock().machine.set(reg, value)
    }

    /// NUL-terminated string from the running thread's address space
    pub fn read_user_string(&self, vaddr: i32) -> KernelResult<String> {
        let mut st = self.lock();
        let id = st.current_id("read_user_string");
        let thread = st.thread_mut(id);
        let pid = thread.pid();
        thread.space_mut().ok_or(KernelError::NoAddressSpace { pid })?.read_c_string(vaddr)
    }

    /// User instructions the running thread has executed
    pub fn instruction_count(&self) -> u64 {
        let st = self.lock();
        st.thread(st.current_id("instruction_count")).stats().instructions()
    }

    /// Boot helper for kernel threads that become user processes
    pub fn exec_and_run(&self, path: &str) -> ! {
        self.exec(path).or_fatal();
        run_user(self)
    }
}
