use std::collections::VecDeque;

use log::info;

use super::{AddressSpace, Memory, ProcessControlBlock, ProcessHandle, ProcessTable, ShortTermScheduler};

use crate::error::Result;
use crate::io::Program;

/// Loads programs into memory as NEW processes and admits them to the
/// short-term scheduler once their arrival tick comes up.
pub(crate) struct LongTermScheduler {
    arrival_queue: VecDeque<ProcessHandle>,
}

impl LongTermScheduler {
    pub fn new() -> LongTermScheduler {
        LongTermScheduler {
            arrival_queue: VecDeque::new(),
        }
    }

    /// Reserves variables + code + PCB mirror as one block. On failure
    /// neither memory nor the process table is changed.
    pub fn create_process(
        &mut self,
        program: &Program,
        memory: &mut Memory,
        procs: &mut ProcessTable,
    ) -> Result<ProcessHandle> {
        let instruction_count = program.instructions.len();
        let size = AddressSpace::size_for(instruction_count);
        let low = memory.alloc(size)?;

        let pcb = ProcessControlBlock::new(
            procs.next_pid(),
            program.arrival_tick,
            AddressSpace::new(low, instruction_count),
        );

        let loaded = Self::load_image(program, &pcb, memory);
        if let Err(err) = loaded {
            memory.free(low, size);
            return Err(err);
        }

        info!(
            "created process {} from '{}' at mem[{}..={}], arrives at tick {}",
            pcb.get_pid(),
            program.name,
            low,
            pcb.get_address_space().high,
            program.arrival_tick
        );

        let handle = procs.insert(pcb);
        self.arrival_queue.push_back(handle);

        Ok(handle)
    }

    fn load_image(program: &Program, pcb: &ProcessControlBlock, memory: &mut Memory) -> Result<()> {
        let code_base = pcb.get_address_space().code_base;

        for (offset, line) in program.instructions.iter().enumerate() {
            memory.write(code_base + offset, "instruction", line)?;
        }

        pcb.persist(memory)
    }

    /// Moves every NEW process whose arrival tick has passed into the ready
    /// structures, in creation order.
    pub fn admit(
        &mut self,
        clock: u64,
        procs: &mut ProcessTable,
        sts: &mut ShortTermScheduler,
    ) -> Vec<ProcessHandle> {
        let (arrived, waiting): (VecDeque<_>, VecDeque<_>) = self
            .arrival_queue
            .drain(..)
            .partition(|&handle| procs[handle].get_arrival_tick() <= clock);
        self.arrival_queue = waiting;

        for &handle in &arrived {
            sts.enqueue(handle, procs);
            info!("process {} arrived at tick {}", procs[handle].get_pid(), clock);
        }

        arrived.into_iter().collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.arrival_queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.arrival_queue.clear();
    }
}
