//! Machine collaborator
//!
//! The narrow slice of the simulated hardware the process core consumes:
//! interrupt level / processor status, the periodic timer, and the user
//! register file with its PC triple.

pub mod interrupt;
pub mod registers;

pub use interrupt::{IntStatus, Interrupt, MachineStatus, TickKind};
pub use registers::Registers;
