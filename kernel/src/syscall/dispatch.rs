//! Syscall Dispatcher

use super::Syscall;
use crate::error::{fatal, KernelError, OrFatal};
use crate::machine::registers::{ARG1_REG, RESULT_REG};
use crate::process::Kernel;

/// Service the trap the running user thread just raised
pub(crate) fn handle_syscall(kernel: &Kernel) {
    let (code, arg) = kernel.with_registers(|regs| (regs.read(RESULT_REG), regs.read(ARG1_REG)));
    let Some(call) = Syscall::from_raw(code) else {
        fatal(KernelError::UnexpectedException { code });
    };
    log::trace!("syscall: {} ({}) from thread {}", call.name(), arg, kernel.current_pid());

    match call {
        Syscall::Halt => {
            log::info!("Shutdown, initiated by user program");
            kernel.halt()
        }
        Syscall::Exit => {
            log::info!("[pid {}]: exit status {}", kernel.current_pid(), arg);
            kernel.exit(arg, true)
        }
        Syscall::Exec => {
            let loaded = kernel.read_user_string(arg).and_then(|path| kernel.exec(&path));
            // a successful Exec starts the new image at its entry point
            if let Err(err) = loaded {
                log::warn!("Exec failed: {}", err);
                return_value(kernel, -1);
            }
        }
        Syscall::Join => match kernel.join_pid(arg) {
            Some(code) => return_value(kernel, code),
            None => {
                log::warn!("Join: {} is not a child of {}", arg, kernel.current_pid());
                return_value(kernel, -1);
            }
        },
        Syscall::Fork => {
            // the child resumes after the Fork
            kernel.with_registers(|regs| regs.advance_pc());
            let child = kernel.fork_process().or_fatal();
            kernel.with_registers(|regs| regs.write(RESULT_REG, child));
        }
        Syscall::Yield => {
            kernel.yield_cpu();
            kernel.with_registers(|regs| regs.advance_pc());
        }
        Syscall::Sleep => {
            kernel.sleep(u64::try_from(arg).unwrap_or(0));
            kernel.with_registers(|regs| regs.advance_pc());
        }
        Syscall::GetPid => return_value(kernel, kernel.current_pid()),
        Syscall::GetPpid => return_value(kernel, kernel.parent_pid().unwrap_or(-1)),
        Syscall::Time => return_value(kernel, saturate(kernel.now())),
        Syscall::NumInstr => return_value(kernel, saturate(kernel.instruction_count())),
    }
}

fn return_value(kernel: &Kernel, value: i32) {
    kernel.with_registers(|regs| {
        regs.write(RESULT_REG, value);
        regs.advance_pc();
    });
}

fn saturate(value: u64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
