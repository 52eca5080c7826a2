// src/lib.rs
// Point d'entrée de la bibliothèque du noyau

//! Exo-OS process-management core
//!
//! A uniprocessor teaching kernel hosted on std: a policy-driven scheduler
//! (FIFO, shortest-next-burst, round-robin, UNIX priority), the thread
//! lifecycle (fork, yield, block, exit, join, sleep), deferred thread
//! destruction and the syscall layer user programs drive it through.
//!
//! ```no_run
//! use exo_proc_kernel::{Kernel, KernelConfig, SchedulingPolicy};
//!
//! let kernel = Kernel::new(KernelConfig::new(SchedulingPolicy::RoundRobin));
//! let report = kernel
//!     .run(|k| {
//!         let child = k.fork("worker", |k, n| k.cpu_work(n as u64), 250);
//!         let slot = k.child_slot(child).unwrap_or(0);
//!         k.join(slot);
//!     })
//!     .expect("machine aborted");
//! println!("{}", report);
//! ```

// Modules du noyau
pub mod config;
pub mod error;
pub mod machine;
pub mod process;
pub mod scheduler;
pub mod sync;
pub mod syscall;
pub mod userprog;

/// Thread identifier visible to user programs
pub type Pid = i32;

/// Status a thread hands its parent on exit
pub type ExitCode = i32;

pub use config::KernelConfig;
pub use error::{KernelError, KernelResult};
pub use machine::IntStatus;
pub use process::{
    ExitRecord, HaltReason, InterruptGuard, Kernel, RunReport, SchedulerSnapshot, ThreadInfo,
};
pub use scheduler::{SchedulingPolicy, Statistics, StatsReport, ThreadState};
pub use sync::Semaphore;
pub use syscall::Syscall;
pub use userprog::{Program, ProgramBuilder};
