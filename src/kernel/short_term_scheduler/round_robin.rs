use std::collections::VecDeque;
use std::num::NonZeroUsize;

use crate::kernel::ProcessHandle;

pub(crate) struct RoundRobin {
    fifo_queue: VecDeque<ProcessHandle>,
    quantum: NonZeroUsize,
    ticks_used: usize,
    current: Option<ProcessHandle>,
}

impl RoundRobin {
    pub fn new(quantum: NonZeroUsize) -> RoundRobin {
        RoundRobin {
            fifo_queue: VecDeque::new(),
            quantum,
            ticks_used: 0,
            current: None,
        }
    }

    pub fn quantum(&self) -> NonZeroUsize {
        self.quantum
    }

    pub fn enqueue(&mut self, handle: ProcessHandle) {
        self.fifo_queue.push_back(handle);
    }

    /// Continues the current process, otherwise starts a fresh slice for the head.
    pub fn next(&mut self) -> Option<ProcessHandle> {
        if self.current.is_none() {
            self.current = self.fifo_queue.pop_front();
            self.ticks_used = 0;
        }

        self.current
    }

    /// Returns true when the quantum ran out and the process went to the tail.
    pub fn preempt(&mut self, handle: ProcessHandle) -> bool {
        self.ticks_used += 1;

        if self.ticks_used >= self.quantum.get() {
            self.fifo_queue.push_back(handle);
            self.current = None;
            self.ticks_used = 0;
            true
        } else {
            self.current = Some(handle);
            false
        }
    }

    pub fn remove(&mut self, handle: ProcessHandle) {
        if self.current == Some(handle) {
            self.current = None;
            self.ticks_used = 0;
        }
        self.fifo_queue.retain(|&queued| queued != handle);
    }

    pub fn current(&self) -> Option<ProcessHandle> {
        self.current
    }

    pub fn ready_queue(&self) -> impl Iterator<Item = ProcessHandle> + '_ {
        self.fifo_queue.iter().copied()
    }
}
