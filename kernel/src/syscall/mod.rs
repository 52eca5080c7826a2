//! # Interface des Appels Système
//!
//! User programs enter the kernel with the call number in the result
//! register and up to four arguments in `ARG1_REG..=ARG4_REG`. The result,
//! if any, goes back into the result register. Every call that returns to
//! user code advances the PC triple by one instruction slot.

mod dispatch;

pub(crate) use dispatch::handle_syscall;

/// System call numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Syscall {
    Halt = 0,
    Exit = 1,
    Exec = 2,
    Join = 3,
    Fork = 4,
    Yield = 5,
    Sleep = 6,
    GetPid = 7,
    GetPpid = 8,
    Time = 9,
    NumInstr = 10,
}

impl Syscall {
    pub const ALL: [Syscall; 11] = [
        Syscall::Halt,
        Syscall::Exit,
        Syscall::Exec,
        Syscall::Join,
        Syscall::Fork,
        Syscall::Yield,
        Syscall::Sleep,
        Syscall::GetPid,
        Syscall::GetPpid,
        Syscall::Time,
        Syscall::NumInstr,
    ];

    pub fn from_raw(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|call| *call as i32 == code)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Syscall::Halt => "Halt",
            Syscall::Exit => "Exit",
            Syscall::Exec => "Exec",
            Syscall::Join => "Join",
            Syscall::Fork => "Fork",
            Syscall::Yield => "Yield",
            Syscall::Sleep => "Sleep",
            Syscall::GetPid => "GetPID",
            Syscall::GetPpid => "GetPPID",
            Syscall::Time => "Time",
            Syscall::NumInstr => "NumInstr",
        }
    }
}
