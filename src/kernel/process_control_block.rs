use std::fmt;
use std::ops::{Index, IndexMut, Range};

use serde::Serialize;

use super::{Memory, Pid, PCB_FIELDS, VAR_SLOTS};

use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub(crate) enum ProcessState {
    New,
    Ready,
    Running,
    Blocked,
    Terminated,
}

impl ProcessState {
    /// NEW -> READY -> RUNNING -> {READY, BLOCKED, TERMINATED}, BLOCKED -> READY.
    /// Re-asserting the current state is always allowed.
    pub fn can_transition_to(self, next: ProcessState) -> bool {
        use ProcessState::*;

        self == next
            || matches!(
                (self, next),
                (New, Ready)
                    | (Ready, Running)
                    | (Running, Ready)
                    | (Running, Blocked)
                    | (Running, Terminated)
                    | (Blocked, Ready)
            )
    }

    pub fn is_runnable(self) -> bool {
        matches!(self, ProcessState::Ready | ProcessState::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessState::New => "NEW",
            ProcessState::Ready => "READY",
            ProcessState::Running => "RUNNING",
            ProcessState::Blocked => "BLOCKED",
            ProcessState::Terminated => "TERMINATED",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layout of a process's private region, computed once at creation.
/// `[low, code_base)` holds variables, `[code_base, pcb_base)` holds code,
/// `[pcb_base, high]` holds the PCB mirror.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct AddressSpace {
    pub low: usize,
    pub high: usize,
    pub code_base: usize,
    pub pcb_base: usize,
}

impl AddressSpace {
    pub fn new(low: usize, instruction_count: usize) -> AddressSpace {
        let code_base = low + VAR_SLOTS;
        let pcb_base = code_base + instruction_count;

        AddressSpace {
            low,
            high: pcb_base + PCB_FIELDS - 1,
            code_base,
            pcb_base,
        }
    }

    pub fn size_for(instruction_count: usize) -> usize {
        VAR_SLOTS + instruction_count + PCB_FIELDS
    }

    pub fn len(&self) -> usize {
        self.high - self.low + 1
    }

    pub fn variables(&self) -> Range<usize> {
        self.low..self.code_base
    }

    pub fn code(&self) -> Range<usize> {
        self.code_base..self.pcb_base
    }
}

pub(crate) struct ProcessControlBlock {
    pub pc: usize,
    pub priority: u32,
    pub time_in_queue: u64,
    /// Set when a file operation blocked on the "file" resource; the op is
    /// retried on wake and must release the hold it was handed.
    pub resumes_file_op: bool,

    pid: Pid,
    state: ProcessState,
    arrival_tick: u64,
    address_space: AddressSpace,
    memory_reclaimed: bool,
}

impl ProcessControlBlock {
    pub fn new(pid: Pid, arrival_tick: u64, address_space: AddressSpace) -> ProcessControlBlock {
        ProcessControlBlock {
            pc: address_space.code_base,
            priority: 0,
            time_in_queue: 0,
            resumes_file_op: false,
            pid,
            state: ProcessState::New,
            arrival_tick,
            address_space,
            memory_reclaimed: false,
        }
    }

    pub fn get_pid(&self) -> Pid {
        self.pid
    }

    pub fn get_state(&self) -> ProcessState {
        self.state
    }

    pub fn set_state(&mut self, next: ProcessState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {} for process {}",
            self.state,
            next,
            self.pid
        );
        self.state = next;
    }

    pub fn get_arrival_tick(&self) -> u64 {
        self.arrival_tick
    }

    pub fn get_address_space(&self) -> &AddressSpace {
        &self.address_space
    }

    pub fn is_memory_reclaimed(&self) -> bool {
        self.memory_reclaimed
    }

    pub fn mark_memory_reclaimed(&mut self) {
        self.memory_reclaimed = true;
    }

    /// The named words persisted at `pcb_base`, in mirror order.
    pub fn mirror_fields(&self) -> [(&'static str, String); PCB_FIELDS] {
        [
            ("pid", self.pid.to_string()),
            ("state", self.state.to_string()),
            ("priority", self.priority.to_string()),
            ("pc", self.pc.to_string()),
            ("mem_low", self.address_space.low.to_string()),
            ("mem_high", self.address_space.high.to_string()),
            ("pcb_index", self.address_space.pcb_base.to_string()),
            ("time_in_queue", self.time_in_queue.to_string()),
            ("arrival_time", self.arrival_tick.to_string()),
        ]
    }

    /// Rewrites the mirror words from the live fields.
    pub fn persist(&self, memory: &mut Memory) -> Result<()> {
        for (offset, (name, value)) in self.mirror_fields().iter().enumerate() {
            memory.write(self.address_space.pcb_base + offset, name, value)?;
        }
        Ok(())
    }
}

/// Stable index into the process table. Schedulers and semaphores hold
/// these instead of the PCBs themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ProcessHandle(usize);

#[derive(Default)]
pub(crate) struct ProcessTable {
    pcbs: Vec<ProcessControlBlock>,
}

impl ProcessTable {
    pub fn new() -> ProcessTable {
        ProcessTable { pcbs: Vec::new() }
    }

    /// Pids are handed out sequentially from 1.
    pub fn next_pid(&self) -> Pid {
        self.pcbs.len() as Pid + 1
    }

    pub fn insert(&mut self, pcb: ProcessControlBlock) -> ProcessHandle {
        self.pcbs.push(pcb);
        ProcessHandle(self.pcbs.len() - 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessControlBlock> {
        self.pcbs.iter()
    }

    pub fn all_terminated(&self) -> bool {
        self.pcbs.iter().all(|pcb| pcb.state == ProcessState::Terminated)
    }

    pub fn clear(&mut self) {
        self.pcbs.clear();
    }
}

impl Index<ProcessHandle> for ProcessTable {
    type Output = ProcessControlBlock;

    fn index(&self, handle: ProcessHandle) -> &ProcessControlBlock {
        &self.pcbs[handle.0]
    }
}

impl IndexMut<ProcessHandle> for ProcessTable {
    fn index_mut(&mut self, handle: ProcessHandle) -> &mut ProcessControlBlock {
        &mut self.pcbs[handle.0]
    }
}
