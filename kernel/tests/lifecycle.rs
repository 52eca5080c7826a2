//! Tests du cycle de vie des threads: fork, join, exit, sleep, destruction

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::{kernel, kernel_with, Trace};
use exo_proc_kernel::{
    HaltReason, InterruptGuard, KernelConfig, KernelError, SchedulingPolicy, Semaphore,
    ThreadState,
};

#[test]
fn test_join_after_child_exit_does_not_block() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    let seen = Trace::new();
    let trace = seen.clone();
    let report = kernel
        .run(move |k| {
            let child = k.fork("child", |k, _| k.exit(7, false), 0);
            // let the child run to completion first
            k.yield_cpu();
            let slot = k.child_slot(child).unwrap();
            trace.push(k.join(slot));
            let me = k.thread_info(k.current_pid()).unwrap();
            trace.push(me.stats.blocked() as i32);
        })
        .unwrap();
    assert_eq!(seen.events(), vec![7, 0]);
    assert_eq!(report.reason, HaltReason::AllThreadsExited);
    assert_eq!(report.exit_code(2), Some(7));
    assert_eq!(report.exit_code(1), Some(0));
}

#[test]
fn test_join_before_child_exit_blocks_once() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    let seen = Trace::new();
    let trace = seen.clone();
    kernel
        .run(move |k| {
            let child = k.fork("child", |k, _| k.exit(7, false), 0);
            let slot = k.child_slot(child).unwrap();
            let code = k.join(slot);
            let me = k.thread_info(k.current_pid()).unwrap();
            trace.push((code, me.stats.blocked(), me.state));
        })
        .unwrap();
    assert_eq!(seen.events(), vec![(7, 1, ThreadState::Running)]);
}

#[test]
fn test_join_pid_of_stranger_returns_none() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    let seen = Trace::new();
    let trace = seen.clone();
    kernel
        .run(move |k| {
            trace.push(k.join_pid(42));
        })
        .unwrap();
    assert_eq!(seen.events(), vec![None]);
}

#[test]
fn test_trampoline_exits_with_zero() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    let report = kernel
        .run(|k| {
            let child = k.fork("worker", |k, n| k.cpu_work(n as u64), 25);
            assert_eq!(k.join_pid(child), Some(0));
        })
        .unwrap();
    assert_eq!(report.exits.len(), 2);
    assert_eq!(report.stats.completed, 2);
}

#[test]
fn test_exactly_one_running_thread() {
    let kernel = kernel(SchedulingPolicy::RoundRobin);
    let violations = Trace::new();
    let check = violations.clone();
    kernel
        .run(move |k| {
            let mut children = Vec::new();
            for n in 0..4 {
                let check = check.clone();
                children.push(k.fork(
                    "spinner",
                    move |k, n| {
                        for _ in 0..20 {
                            k.cpu_work(15 + n as u64);
                            let snap = k.snapshot();
                            if snap.running != vec![k.current_pid()]
                                || snap.current != Some(k.current_pid())
                                || !snap.queues_disjoint()
                            {
                                check.push(snap);
                            }
                            if n % 2 == 0 {
                                k.sleep(30);
                            } else {
                                k.yield_cpu();
                            }
                        }
                    },
                    n,
                ));
            }
            for child in children {
                k.join_pid(child);
            }
        })
        .unwrap();
    assert!(violations.events().is_empty(), "{:?}", violations.events());
}

#[test]
fn test_exited_thread_destroyed_by_next_dispatch() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    let seen = Trace::new();
    let trace = seen.clone();
    kernel
        .run(move |k| {
            let child = k.fork("child", |k, _| k.exit(3, false), 0);
            k.yield_cpu();
            let snap = k.snapshot();
            trace.push((snap.pending_destruction, k.thread_info(child).is_none()));
            // exit status survives the TCB
            trace.push((k.join_pid(child), true));
        })
        .unwrap();
    assert_eq!(seen.events(), vec![(None, true), (Some(3), true)]);
}

#[test]
fn test_sleepers_wake_in_tick_order() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    let woken = Trace::new();
    let trace = woken.clone();
    kernel
        .run(move |k| {
            let mut children = Vec::new();
            for wake in [500u64, 200, 300] {
                let trace = trace.clone();
                children.push(k.fork(
                    "sleeper",
                    move |k, _| {
                        k.sleep_until(wake);
                        trace.push((wake, k.now() >= wake));
                    },
                    0,
                ));
            }
            for child in children {
                k.join_pid(child);
            }
        })
        .unwrap();
    assert_eq!(woken.events(), vec![(200, true), (300, true), (500, true)]);
}

#[test]
fn test_sleep_zero_is_a_yield() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    let seen = Trace::new();
    let trace = seen.clone();
    kernel
        .run(move |k| {
            let child = k.fork("other", |_, _| {}, 0);
            let yields = k.statistics().yields;
            k.sleep(0);
            trace.push(k.statistics().yields > yields);
            trace.push(k.snapshot().sleeping.is_empty());
            k.join_pid(child);
        })
        .unwrap();
    assert_eq!(seen.events(), vec![true, true]);
}

#[test]
fn test_semaphore_blocks_until_signalled() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    let order = Trace::new();
    let sem = Arc::new(Semaphore::new("items", 0));
    let (trace, shared) = (order.clone(), Arc::clone(&sem));
    kernel
        .run(move |k| {
            let consumer = {
                let (trace, sem) = (trace.clone(), Arc::clone(&shared));
                k.fork(
                    "consumer",
                    move |k, _| {
                        sem.p(k);
                        trace.push("consumed");
                    },
                    0,
                )
            };
            k.yield_cpu();
            assert_eq!(shared.waiters(), 1);
            let info = k.thread_info(consumer).unwrap();
            assert_eq!(info.state, ThreadState::Blocked);
            trace.push("produced");
            shared.v(k);
            k.join_pid(consumer);
        })
        .unwrap();
    assert_eq!(order.events(), vec!["produced", "consumed"]);
    assert_eq!(sem.value(), 0);
}

#[test]
fn test_wake_rejects_sleeping_thread() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    let err = kernel
        .run(|k| {
            let child = k.fork("sleeper", |k, _| k.sleep(1000), 0);
            k.yield_cpu();
            let _ = k.wake(child);
        })
        .unwrap_err();
    assert_eq!(err, KernelError::AlreadyQueued { pid: 2 });
}

#[test]
fn test_wake_of_running_thread_is_refused() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    let seen = Trace::new();
    let trace = seen.clone();
    kernel
        .run(move |k| {
            let me = k.current_pid();
            trace.push(k.wake(me));
            let snapshot = k.snapshot();
            assert!(snapshot.ready.is_empty());
            assert_eq!(k.thread_info(me).unwrap().state, ThreadState::Running);
        })
        .unwrap();
    assert_eq!(
        seen.events(),
        vec![Err(KernelError::NotBlocked { pid: 1, state: ThreadState::Running })]
    );
}

#[test]
fn test_wake_of_ready_thread_is_refused() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    let seen = Trace::new();
    let trace = seen.clone();
    let report = kernel
        .run(move |k| {
            let child = k.fork("ready", |_, _| {}, 0);
            trace.push(k.wake(child));
            assert_eq!(k.snapshot().ready, vec![child]);
            assert_eq!(k.join_pid(child), Some(0));
        })
        .unwrap();
    assert_eq!(
        seen.events(),
        vec![Err(KernelError::NotBlocked { pid: 2, state: ThreadState::Ready })]
    );
    assert_eq!(report.reason, HaltReason::AllThreadsExited);
}

#[test]
fn test_join_unknown_slot_is_fatal() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    let err = kernel.run(|k| {
        k.join(3);
    });
    assert_eq!(err.unwrap_err(), KernelError::UnknownChild { pid: 1, slot: 3 });
}

#[test]
fn test_stack_overflow_detected_on_switch_out() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    let err = kernel
        .run(|k| {
            k.fork("bystander", |_, _| {}, 0);
            k.write_stack_word(0, 0);
            k.yield_cpu();
        })
        .unwrap_err();
    assert_eq!(err, KernelError::StackOverflow { pid: 1 });
}

#[test]
fn test_pid_pool_bound() {
    let kernel = kernel_with(KernelConfig::new(SchedulingPolicy::Fifo).with_max_threads(2));
    let seen = Trace::new();
    let trace = seen.clone();
    kernel
        .run(move |k| {
            let child = k.fork("one", |_, _| {}, 0);
            trace.push(k.try_fork("two", |_, _| {}, 0).err());
            k.join_pid(child);
            // the slot frees up once the child is destroyed
            trace.push(k.try_fork("three", |_, _| {}, 0).err());
        })
        .unwrap();
    assert_eq!(
        seen.events(),
        vec![Some(KernelError::PidPoolExhausted { live: 2, max: 2 }), None]
    );
}

#[test]
fn test_blocking_with_nothing_to_wake_halts() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    let resumed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&resumed);
    let report = kernel
        .run(move |k| {
            let _guard = InterruptGuard::new(k);
            k.block_and_sleep();
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();
    assert_eq!(report.reason, HaltReason::NoRunnableThreads);
    assert!(!resumed.load(Ordering::SeqCst));
}

#[test]
fn test_halt_stops_every_thread() {
    let kernel = kernel(SchedulingPolicy::RoundRobin);
    let after = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&after);
    let report = kernel
        .run(move |k| {
            for _ in 0..3 {
                let flag = Arc::clone(&flag);
                k.fork(
                    "worker",
                    move |k, _| {
                        k.sleep(10_000);
                        flag.store(true, Ordering::SeqCst);
                    },
                    0,
                );
            }
            k.yield_cpu();
            k.halt();
        })
        .unwrap();
    assert_eq!(report.reason, HaltReason::Requested);
    assert!(!after.load(Ordering::SeqCst));
}

#[test]
fn test_kernel_boots_once() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    kernel.run(|_| {}).unwrap();
    assert_eq!(kernel.run(|_| {}).unwrap_err(), KernelError::AlreadyBooted);
}

#[test]
fn test_invalid_config_refused_before_boot() {
    let kernel = kernel_with(KernelConfig::new(SchedulingPolicy::RoundRobin).with_quantum(0));
    assert!(matches!(
        kernel.run(|_| {}),
        Err(KernelError::InvalidConfig { field: "quantum", .. })
    ));
}

#[test]
fn test_panicking_thread_aborts_the_machine() {
    let kernel = kernel(SchedulingPolicy::Fifo);
    let err = kernel
        .run(|k| {
            k.fork("bad", |_, _| panic!("boom"), 0);
            k.yield_cpu();
        })
        .unwrap_err();
    assert_eq!(err, KernelError::ThreadPanicked { pid: Some(2), message: "boom".into() });
}
