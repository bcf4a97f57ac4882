mod auto_runner;
mod cpu;
mod long_term_scheduler;
mod memory;
mod process_control_block;
mod resource_manager;
mod short_term_scheduler;

pub(crate) mod driver;

pub type Pid = u32;

/// Words in the shared pool.
pub(crate) const MEMORY_SIZE: usize = 60;
/// Variable slots at the bottom of every process region.
pub(crate) const VAR_SLOTS: usize = 3;
/// Named words in a PCB mirror.
pub(crate) const PCB_FIELDS: usize = 9;
pub(crate) const MAX_RESOURCES: usize = 3;
pub(crate) const MLFQ_LEVELS: usize = 4;
pub(crate) const MAX_HISTORY: usize = 100;

pub(crate) use auto_runner::AutoRunner;
pub(crate) use cpu::Cpu;
pub(crate) use driver::{Driver, SystemState};
pub(crate) use long_term_scheduler::LongTermScheduler;
pub(crate) use memory::Memory;
pub(crate) use process_control_block::{
    AddressSpace, ProcessControlBlock, ProcessHandle, ProcessState, ProcessTable,
};
pub(crate) use resource_manager::ResourceManager;
pub(crate) use short_term_scheduler::{SchedulingAlgorithm, ShortTermScheduler};
