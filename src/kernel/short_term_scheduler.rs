mod fcfs;
mod mlfq;
mod round_robin;

use std::num::NonZeroUsize;

use serde::Serialize;

use super::{ProcessHandle, ProcessState, ProcessTable};

pub(crate) use fcfs::Fcfs;
pub(crate) use mlfq::Mlfq;
pub(crate) use round_robin::RoundRobin;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub(crate) enum SchedulingAlgorithm {
    Fcfs,
    RoundRobin { quantum: NonZeroUsize },
    Mlfq { levels: NonZeroUsize },
}

/// The active ready structure. Holds handles only; the process table owns
/// the PCBs.
pub(crate) enum ShortTermScheduler {
    Fcfs(Fcfs),
    RoundRobin(RoundRobin),
    Mlfq(Mlfq),
}

impl ShortTermScheduler {
    pub fn new(scheduling_alg: SchedulingAlgorithm) -> ShortTermScheduler {
        match scheduling_alg {
            SchedulingAlgorithm::Fcfs => ShortTermScheduler::Fcfs(Fcfs::new()),
            SchedulingAlgorithm::RoundRobin { quantum } => {
                ShortTermScheduler::RoundRobin(RoundRobin::new(quantum))
            }
            SchedulingAlgorithm::Mlfq { levels } => ShortTermScheduler::Mlfq(Mlfq::new(levels)),
        }
    }

    pub fn algorithm(&self) -> SchedulingAlgorithm {
        match self {
            ShortTermScheduler::Fcfs(_) => SchedulingAlgorithm::Fcfs,
            ShortTermScheduler::RoundRobin(rr) => SchedulingAlgorithm::RoundRobin {
                quantum: rr.quantum(),
            },
            ShortTermScheduler::Mlfq(mlfq) => SchedulingAlgorithm::Mlfq {
                levels: mlfq.levels(),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ShortTermScheduler::Fcfs(_) => "FCFS",
            ShortTermScheduler::RoundRobin(_) => "Round Robin",
            ShortTermScheduler::Mlfq(_) => "MLFQ",
        }
    }

    /// Marks the process READY and inserts it per policy.
    pub fn enqueue(&mut self, handle: ProcessHandle, procs: &mut ProcessTable) {
        let pcb = &mut procs[handle];
        pcb.set_state(ProcessState::Ready);
        pcb.time_in_queue = 0;

        match self {
            ShortTermScheduler::Fcfs(fcfs) => fcfs.enqueue(handle),
            ShortTermScheduler::RoundRobin(rr) => rr.enqueue(handle),
            ShortTermScheduler::Mlfq(mlfq) => mlfq.enqueue(handle, pcb.priority),
        }
    }

    /// Picks the process to run this tick and ages everyone left waiting.
    pub fn next(&mut self, procs: &mut ProcessTable) -> Option<ProcessHandle> {
        let selected = match self {
            ShortTermScheduler::Fcfs(fcfs) => fcfs.next(),
            ShortTermScheduler::RoundRobin(rr) => rr.next(),
            ShortTermScheduler::Mlfq(mlfq) => mlfq.next(),
        }?;

        for waiting in self.ready_queue() {
            procs[waiting].time_in_queue += 1;
        }
        procs[selected].time_in_queue = 0;

        Some(selected)
    }

    /// Called after a tick on a process that is still runnable.
    pub fn preempt(&mut self, handle: ProcessHandle, procs: &mut ProcessTable) {
        let rotated = match self {
            ShortTermScheduler::Fcfs(fcfs) => fcfs.preempt(handle),
            ShortTermScheduler::RoundRobin(rr) => rr.preempt(handle),
            ShortTermScheduler::Mlfq(mlfq) => mlfq.preempt(handle, &mut procs[handle].priority),
        };

        if rotated {
            procs[handle].time_in_queue = 0;
        }
    }

    /// Drops a process from every ready structure, including the running slot.
    pub fn remove(&mut self, handle: ProcessHandle, procs: &mut ProcessTable) {
        procs[handle].time_in_queue = 0;

        match self {
            ShortTermScheduler::Fcfs(fcfs) => fcfs.remove(handle),
            ShortTermScheduler::RoundRobin(rr) => rr.remove(handle),
            ShortTermScheduler::Mlfq(mlfq) => mlfq.remove(handle),
        }
    }

    pub fn current(&self) -> Option<ProcessHandle> {
        match self {
            ShortTermScheduler::Fcfs(fcfs) => fcfs.current(),
            ShortTermScheduler::RoundRobin(rr) => rr.current(),
            ShortTermScheduler::Mlfq(mlfq) => mlfq.current(),
        }
    }

    /// Waiting processes in selection order, excluding the current one.
    pub fn ready_queue(&self) -> Vec<ProcessHandle> {
        match self {
            ShortTermScheduler::Fcfs(fcfs) => fcfs.ready_queue().collect(),
            ShortTermScheduler::RoundRobin(rr) => rr.ready_queue().collect(),
            ShortTermScheduler::Mlfq(mlfq) => mlfq.ready_queue().collect(),
        }
    }
}
