use std::collections::VecDeque;
use std::num::NonZeroUsize;

use crate::kernel::ProcessHandle;

/// Multilevel feedback queue. Level 0 is the highest priority; the quantum
/// doubles per level (1, 2, 4, 8 for the default four levels). Demotion is
/// one-way: nothing ever moves a process back up.
pub(crate) struct Mlfq {
    queues: Vec<VecDeque<ProcessHandle>>,
    quantums: Vec<usize>,
    ticks_used: usize,
    current: Option<ProcessHandle>,
}

impl Mlfq {
    pub fn new(levels: NonZeroUsize) -> Mlfq {
        Mlfq {
            queues: vec![VecDeque::new(); levels.get()],
            quantums: (0..levels.get())
                .map(|level| 1usize.checked_shl(level as u32).unwrap_or(usize::MAX))
                .collect(),
            ticks_used: 0,
            current: None,
        }
    }

    pub fn levels(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.queues.len()).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn quantum_for(&self, level: usize) -> usize {
        self.quantums[self.level_for(level as u32)]
    }

    fn lowest_level(&self) -> usize {
        self.queues.len() - 1
    }

    /// Out-of-range priorities land on the lowest level.
    fn level_for(&self, priority: u32) -> usize {
        (priority as usize).min(self.lowest_level())
    }

    pub fn enqueue(&mut self, handle: ProcessHandle, priority: u32) {
        let level = self.level_for(priority);
        self.queues[level].push_back(handle);
    }

    pub fn next(&mut self) -> Option<ProcessHandle> {
        if self.current.is_none() {
            self.current = self.queues.iter_mut().find_map(|queue| queue.pop_front());
            self.ticks_used = 0;
        }

        self.current
    }

    /// On quantum exhaustion the process is demoted one level (unless already
    /// at the bottom) and re-enqueued there. Returns true in that case.
    pub fn preempt(&mut self, handle: ProcessHandle, priority: &mut u32) -> bool {
        self.ticks_used += 1;

        if self.ticks_used < self.quantum_for(*priority as usize) {
            self.current = Some(handle);
            return false;
        }

        if (*priority as usize) < self.lowest_level() {
            *priority += 1;
        }
        self.enqueue(handle, *priority);
        self.current = None;
        self.ticks_used = 0;

        true
    }

    pub fn remove(&mut self, handle: ProcessHandle) {
        if self.current == Some(handle) {
            self.current = None;
            self.ticks_used = 0;
        }
        for queue in &mut self.queues {
            queue.retain(|&queued| queued != handle);
        }
    }

    pub fn current(&self) -> Option<ProcessHandle> {
        self.current
    }

    pub fn ready_queue(&self) -> impl Iterator<Item = ProcessHandle> + '_ {
        self.queues.iter().flat_map(|queue| queue.iter().copied())
    }
}
