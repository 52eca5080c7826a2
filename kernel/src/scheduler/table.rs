//! Thread table - generation-checked TCB arena
//!
//! Slots are recycled once a TCB is destroyed; each recycle bumps the slot
//! generation so a `ThreadId` held past its thread's lifetime no longer
//! resolves. Pids are never reused.

use hashbrown::HashMap;

use super::thread::Thread;
use crate::error::{KernelError, KernelResult};
use crate::Pid;

/// First pid handed out; 0 is the value Fork returns to the child
pub const FIRST_PID: Pid = 1;

/// Arena index of a TCB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId {
    index: u32,
    generation: u32,
}

impl ThreadId {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

struct Slot {
    generation: u32,
    thread: Option<Thread>,
}

/// All live TCBs
pub struct ThreadTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_pid: HashMap<Pid, ThreadId>,
    next_pid: Pid,
    capacity: usize,
}

impl ThreadTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_pid: HashMap::new(),
            next_pid: FIRST_PID,
            capacity,
        }
    }

    /// Assign the next pid and store the TCB `build` makes for it
    pub fn allocate(&mut self, build: impl FnOnce(Pid) -> Thread) -> KernelResult<ThreadId> {
        if self.by_pid.len() >= self.capacity {
            return Err(KernelError::PidPoolExhausted { live: self.by_pid.len(), max: self.capacity });
        }
        let pid = self.next_pid;
        self.next_pid += 1;
        let thread = build(pid);

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.thread = Some(thread);
                ThreadId { index, generation: slot.generation }
            }
            None => {
                self.slots.push(Slot { generation: 0, thread: Some(thread) });
                ThreadId { index: (self.slots.len() - 1) as u32, generation: 0 }
            }
        };
        self.by_pid.insert(pid, id);
        Ok(id)
    }

    pub fn get(&self, id: ThreadId) -> Option<&Thread> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.thread.as_ref())
    }

    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.thread.as_mut())
    }

    /// Take a TCB out of the arena and retire its id
    pub fn remove(&mut self, id: ThreadId) -> Option<Thread> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let thread = slot.thread.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.by_pid.remove(&thread.pid());
        Some(thread)
    }

    pub fn lookup(&self, pid: Pid) -> Option<ThreadId> {
        self.by_pid.get(&pid).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ThreadId, &Thread)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.thread.as_ref().map(|thread| {
                (ThreadId { index: index as u32, generation: slot.generation }, thread)
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Thread> {
        self.slots.iter_mut().filter_map(|slot| slot.thread.as_mut())
    }

    /// Live TCBs, exited-but-undestroyed included
    pub fn len(&self) -> usize {
        self.by_pid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_pid.is_empty()
    }

    /// TCBs that have not exited
    pub fn active_count(&self) -> usize {
        self.iter().filter(|(_, thread)| !thread.is_exited()).count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove every TCB (shutdown)
    pub fn drain(&mut self) -> Vec<Thread> {
        self.by_pid.clear();
        self.free.clear();
        self.slots
            .iter_mut()
            .filter_map(|slot| {
                slot.generation = slot.generation.wrapping_add(1);
                slot.thread.take()
            })
            .collect()
    }
}
