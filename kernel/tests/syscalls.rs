//! Tests des appels système exécutés par des programmes utilisateur

mod common;

use common::{kernel, program};
use exo_proc_kernel::machine::registers::{ARG1_REG, RESULT_REG};
use exo_proc_kernel::{HaltReason, KernelError, SchedulingPolicy, Syscall};
use exo_proc_kernel::userprog::Op;

const R2: usize = RESULT_REG;
const A0: usize = ARG1_REG;

#[test]
fn test_fork_join_passes_exit_code() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    kernel.register_program(
        "/bin/parent",
        program("parent", |p| {
            p.syscall(Syscall::Fork)
                .jump_if_zero(R2, 6)
                .mov(A0, R2)
                .syscall(Syscall::Join)
                .mov(A0, R2)
                .syscall(Syscall::Exit);
            // child
            p.load_imm(A0, 7).syscall(Syscall::Exit);
        }),
    );
    let report = kernel.run_program("/bin/parent").unwrap();
    assert_eq!(report.reason, HaltReason::AllThreadsExited);
    assert_eq!(report.exit_code(2), Some(7));
    assert_eq!(report.exit_code(1), Some(7));
}

#[test]
fn test_yield_advances_pc() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    kernel.register_program(
        "/bin/yield",
        program("yield", |p| {
            p.syscall(Syscall::Yield)
                .syscall(Syscall::Yield)
                .syscall(Syscall::GetPid)
                .mov(A0, R2)
                .syscall(Syscall::Exit);
        }),
    );
    let report = kernel.run_program("/bin/yield").unwrap();
    assert_eq!(report.exit_code(1), Some(1));
    assert_eq!(report.stats.yields, 2);
}

#[test]
fn test_exec_replaces_image() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    kernel.register_program(
        "/bin/a",
        program("a", |p| {
            let path = p.string("/bin/b");
            p.load_imm(A0, path).syscall(Syscall::Exec).load_imm(A0, 99).syscall(Syscall::Exit);
        }),
    );
    kernel.register_program(
        "/bin/b",
        program("b", |p| {
            p.load_imm(A0, 5).syscall(Syscall::Exit);
        }),
    );
    let report = kernel.run_program("/bin/a").unwrap();
    assert_eq!(report.exit_code(1), Some(5));
}

#[test]
fn test_exec_of_unknown_path_returns_error() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    kernel.register_program(
        "/bin/a",
        program("a", |p| {
            let path = p.string("/bin/missing");
            p.load_imm(A0, path).syscall(Syscall::Exec).mov(A0, R2).syscall(Syscall::Exit);
        }),
    );
    let report = kernel.run_program("/bin/a").unwrap();
    assert_eq!(report.exit_code(1), Some(-1));
}

#[test]
fn test_parent_pids() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    kernel.register_program(
        "/bin/family",
        program("family", |p| {
            p.syscall(Syscall::Fork)
                .jump_if_zero(R2, 7)
                .mov(A0, R2)
                .syscall(Syscall::Join)
                .syscall(Syscall::GetPpid)
                .mov(A0, R2)
                .syscall(Syscall::Exit);
            // child exits with its parent's pid
            p.syscall(Syscall::GetPpid).mov(A0, R2).syscall(Syscall::Exit);
        }),
    );
    let report = kernel.run_program("/bin/family").unwrap();
    assert_eq!(report.exit_code(2), Some(1));
    assert_eq!(report.exit_code(1), Some(-1));
}

#[test]
fn test_join_on_stranger_returns_error() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    kernel.register_program(
        "/bin/lonely",
        program("lonely", |p| {
            p.load_imm(A0, 12).syscall(Syscall::Join).mov(A0, R2).syscall(Syscall::Exit);
        }),
    );
    let report = kernel.run_program("/bin/lonely").unwrap();
    assert_eq!(report.exit_code(1), Some(-1));
}

#[test]
fn test_num_instr_counts_user_instructions() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    kernel.register_program(
        "/bin/count",
        program("count", |p| {
            p.compute(5).syscall(Syscall::NumInstr).mov(A0, R2).syscall(Syscall::Exit);
        }),
    );
    let report = kernel.run_program("/bin/count").unwrap();
    assert_eq!(report.exit_code(1), Some(6));
}

#[test]
fn test_sleep_and_time() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    kernel.register_program(
        "/bin/nap",
        program("nap", |p| {
            p.syscall(Syscall::Time)
                .load_imm(A0, 250)
                .syscall(Syscall::Sleep)
                .syscall(Syscall::Time)
                .mov(A0, R2)
                .syscall(Syscall::Exit);
        }),
    );
    let report = kernel.run_program("/bin/nap").unwrap();
    let woke = report.exit_code(1).unwrap();
    assert!(woke >= 250);
    assert!(report.stats.idle_ticks > 0);
}

#[test]
fn test_countdown_loop() {
    let kernel = kernel(SchedulingPolicy::RoundRobin);
    kernel.register_program(
        "/bin/loop",
        program("loop", |p| {
            p.load_imm(8, 300);
            let top = p.label();
            p.jump_if_zero(8, top + 4).compute(2).add_imm(8, -1).jump(top);
            p.load_imm(A0, 3).syscall(Syscall::Exit);
        }),
    );
    let report = kernel.run_program("/bin/loop").unwrap();
    assert_eq!(report.exit_code(1), Some(3));
    assert!(report.stats.preemptions > 0);
}

#[test]
fn test_running_off_the_end_exits_cleanly() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    kernel.register_program("/bin/short", program("short", |p| {
        p.compute(3);
    }));
    let report = kernel.run_program("/bin/short").unwrap();
    assert_eq!(report.exit_code(1), Some(0));
}

#[test]
fn test_halt_syscall() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    kernel.register_program("/bin/halt", program("halt", |p| {
        p.syscall(Syscall::Halt).load_imm(A0, 1).syscall(Syscall::Exit);
    }));
    let report = kernel.run_program("/bin/halt").unwrap();
    assert_eq!(report.reason, HaltReason::Requested);
    assert!(report.exits.is_empty());
}

#[test]
fn test_unknown_syscall_is_fatal() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    kernel.register_program("/bin/bogus", program("bogus", |p| {
        p.load_imm(R2, 42).op(Op::Trap);
    }));
    let err = kernel.run_program("/bin/bogus").unwrap_err();
    assert_eq!(err, KernelError::UnexpectedException { code: 42 });
}

#[test]
fn test_missing_program_rejected_before_boot() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    assert_eq!(
        kernel.run_program("/bin/none").unwrap_err(),
        KernelError::ProgramNotFound { path: "/bin/none".into() }
    );
}

#[test]
fn test_address_space_switches_are_counted() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    kernel.register_program(
        "/bin/pingpong",
        program("pingpong", |p| {
            p.syscall(Syscall::Fork)
                .syscall(Syscall::Yield)
                .syscall(Syscall::Yield)
                .load_imm(A0, 0)
                .syscall(Syscall::Exit);
        }),
    );
    let report = kernel.run_program("/bin/pingpong").unwrap();
    assert_eq!(report.exits.len(), 2);
    assert!(report.stats.context_switches >= 4);
}

#[test]
fn test_register_access_is_bounds_checked() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    let report = kernel
        .run(|k| {
            assert_eq!(k.read_register(40), Err(KernelError::InvalidRegister { reg: 40 }));
            assert_eq!(k.write_register(usize::MAX, 1), Err(KernelError::InvalidRegister { reg: usize::MAX }));
            k.write_register(A0, 17).unwrap();
            assert_eq!(k.read_register(A0), Ok(17));
        })
        .unwrap();
    assert_eq!(report.reason, HaltReason::AllThreadsExited);
}
