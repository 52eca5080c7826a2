//! Helpers partagés par les tests d'intégration

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use exo_proc_kernel::{Kernel, KernelConfig, Program, ProgramBuilder, SchedulingPolicy};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn kernel(policy: SchedulingPolicy) -> Kernel {
    init_logging();
    Kernel::new(KernelConfig::new(policy))
}

pub fn kernel_with(config: KernelConfig) -> Kernel {
    init_logging();
    Kernel::new(config)
}

/// Shared event log written from inside simulated threads
#[derive(Clone, Default)]
pub struct Trace<T>(Arc<Mutex<Vec<T>>>);

impl<T: Clone> Trace<T> {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn push(&self, event: T) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<T> {
        self.0.lock().unwrap().clone()
    }
}

pub fn program(name: &str, build: impl FnOnce(&mut ProgramBuilder)) -> Program {
    let mut builder = ProgramBuilder::new(name);
    build(&mut builder);
    builder.build().unwrap()
}
