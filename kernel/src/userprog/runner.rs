//! User-mode run loop
//!
//! Executes the running thread's program one op at a time. Each op is
//! decoded under the state lock; the clock only advances after the lock is
//! released, since a timer tick may switch threads.

use crate::config::USER_TICK;
use crate::error::{fatal, KernelError};
use crate::machine::registers::{INSTRUCTION_BYTES, RESULT_REG};
use crate::machine::TickKind;
use crate::process::Kernel;
use crate::syscall::handle_syscall;

use super::program::Op;

enum Step {
    /// Op retired; charge this many user ticks
    Ran(u64),
    /// Enter the kernel through the syscall path
    Trap,
    /// PC ran past the last op
    Finished,
}

/// Run the current thread's program until it exits
pub(crate) fn run_user(kernel: &Kernel) -> ! {
    loop {
        match step(kernel) {
            Step::Ran(ticks) => kernel.one_tick(TickKind::User, ticks),
            Step::Trap => {
                kernel.one_tick(TickKind::User, USER_TICK);
                handle_syscall(kernel);
            }
            Step::Finished => {
                log::debug!("user: thread {} ran off its program", kernel.current_pid());
                kernel.exit(0, true)
            }
        }
    }
}

fn step(kernel: &Kernel) -> Step {
    let mut st = kernel.lock();
    let id = st.current_id("run_user");
    let pc = st.machine.pc();
    let thread = st.thread_mut(id);
    let pid = thread.pid();
    let Some(space) = thread.space_mut() else {
        fatal(KernelError::NoAddressSpace { pid });
    };
    let op = match space.fetch(pc) {
        Ok(Some(op)) => op,
        Ok(None) => return Step::Finished,
        Err(err) => fatal(err),
    };
    let ticks = op.ticks();
    thread.stats_mut().add_instructions(op.instructions());

    let regs = &mut st.machine;
    match op {
        Op::Compute(_) => regs.advance_pc(),
        Op::LoadImm { reg, value } => {
            regs.write(reg, value);
            regs.advance_pc();
        }
        Op::Move { dst, src } => {
            let value = regs.read(src);
            regs.write(dst, value);
            regs.advance_pc();
        }
        Op::AddImm { reg, value } => {
            let sum = regs.read(reg).wrapping_add(value);
            regs.write(reg, sum);
            regs.advance_pc();
        }
        Op::Jump(target) => regs.jump(target as i32 * INSTRUCTION_BYTES),
        Op::JumpIfZero { reg, target } => {
            if regs.read(reg) == 0 {
                regs.jump(target as i32 * INSTRUCTION_BYTES);
            } else {
                regs.advance_pc();
            }
        }
        Op::Syscall(call) => {
            regs.write(RESULT_REG, call as i32);
            return Step::Trap;
        }
        Op::Trap => return Step::Trap,
    }
    Step::Ran(ticks)
}
