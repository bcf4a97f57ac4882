use std::collections::VecDeque;

use crate::kernel::ProcessHandle;

/// Non-preemptive first-come-first-served. The head keeps the CPU until it
/// blocks or terminates.
pub(crate) struct Fcfs {
    fifo_queue: VecDeque<ProcessHandle>,
    current: Option<ProcessHandle>,
}

impl Fcfs {
    pub fn new() -> Fcfs {
        Fcfs {
            fifo_queue: VecDeque::new(),
            current: None,
        }
    }

    pub fn enqueue(&mut self, handle: ProcessHandle) {
        self.fifo_queue.push_back(handle);
    }

    pub fn next(&mut self) -> Option<ProcessHandle> {
        if self.current.is_none() {
            self.current = self.fifo_queue.pop_front();
        }

        self.current
    }

    /// Never rotates; the process stays in front.
    pub fn preempt(&mut self, handle: ProcessHandle) -> bool {
        self.current = Some(handle);
        false
    }

    pub fn remove(&mut self, handle: ProcessHandle) {
        if self.current == Some(handle) {
            self.current = None;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::short_term_scheduler::test_support::table_with;

    #[test]
    fn test_fcfs_keeps_selecting_head() {
        let (_, handles) = table_with(3);
        let mut fcfs = Fcfs::new();
        handles.iter().for_each(|&h| fcfs.enqueue(h));

        for _ in 0..5 {
            assert_eq!(fcfs.next(), Some(handles[0]));
            assert!(!fcfs.preempt(handles[0]));
        }
        assert_eq!(fcfs.ready_queue().collect::<Vec<_>>(), handles[1..].to_vec());
    }

    #[test]
    fn test_fcfs_moves_on_after_remove() {
        let (_, handles) = table_with(3);
        let mut fcfs = Fcfs::new();
        handles.iter().for_each(|&h| fcfs.enqueue(h));

        fcfs.next();
        fcfs.remove(handles[0]);

        assert_eq!(fcfs.next(), Some(handles[1]));
        assert_eq!(fcfs.current(), Some(handles[1]));
    }

    #[test]
    fn test_fcfs_reenqueued_process_goes_to_tail() {
        let (_, handles) = table_with(2);
        let mut fcfs = Fcfs::new();
        handles.iter().for_each(|&h| fcfs.enqueue(h));

        fcfs.next();
        fcfs.remove(handles[0]);
        fcfs.enqueue(handles[0]);

        assert_eq!(fcfs.next(), Some(handles[1]));
        assert_eq!(fcfs.ready_queue().collect::<Vec<_>>(), vec![handles[0]]);
    }

    #[test]
    fn test_fcfs_remove_waiting_process() {
        let (_, handles) = table_with(3);
        let mut fcfs = Fcfs::new();
        handles.iter().for_each(|&h| fcfs.enqueue(h));

        fcfs.remove(handles[1]);

        assert_eq!(fcfs.ready_queue().collect::<Vec<_>>(), vec![handles[0], handles[2]]);
    }
}
