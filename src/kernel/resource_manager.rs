use std::collections::VecDeque;

use log::{debug, warn};
use serde::Serialize;

use super::{Pid, ProcessHandle, ProcessState, ProcessTable, ShortTermScheduler, MAX_RESOURCES};

use crate::error::{Result, SimError};

pub(crate) const RESOURCE_USER_INPUT: &str = "userInput";
pub(crate) const RESOURCE_USER_OUTPUT: &str = "userOutput";
pub(crate) const RESOURCE_FILE: &str = "file";

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    Acquired,
    Blocked,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SignalOutcome {
    /// Ownership passed straight to the head waiter.
    HandedOff(Pid),
    Released,
}

/// Read-only view of one semaphore for reporting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct ResourceStatus {
    pub name: String,
    pub value: u8,
    pub queue_size: usize,
    pub current_holder: Option<Pid>,
    pub waiting_pids: Vec<Pid>,
}

struct Semaphore {
    name: String,
    value: u8,
    queue: VecDeque<ProcessHandle>,
    current_holder: Option<Pid>,
}

impl Semaphore {
    fn new(name: &str) -> Semaphore {
        Semaphore {
            name: name.to_string(),
            value: 1,
            queue: VecDeque::new(),
            current_holder: None,
        }
    }
}

/// Binary semaphores guarding the simulated devices.
pub(crate) struct ResourceManager {
    semaphores: Vec<Semaphore>,
}

impl ResourceManager {
    pub fn new() -> ResourceManager {
        let mut manager = ResourceManager {
            semaphores: Vec::with_capacity(MAX_RESOURCES),
        };
        manager.reset();
        manager
    }

    /// Recreates the three resources, free and with empty queues.
    pub fn reset(&mut self) {
        self.semaphores = [RESOURCE_USER_INPUT, RESOURCE_USER_OUTPUT, RESOURCE_FILE]
            .into_iter()
            .map(Semaphore::new)
            .collect();
    }

    fn get_or_register(&mut self, name: &str) -> Result<&mut Semaphore> {
        let index = match self.semaphores.iter().position(|sem| sem.name == name) {
            Some(index) => index,
            None if self.semaphores.len() < MAX_RESOURCES => {
                self.semaphores.push(Semaphore::new(name));
                self.semaphores.len() - 1
            }
            None => {
                return Err(SimError::TooManyResources {
                    name: name.to_string(),
                })
            }
        };

        Ok(&mut self.semaphores[index])
    }

    /// Acquires `name` for the process, or blocks it in FIFO order and
    /// pulls it out of the scheduler.
    pub fn wait(
        &mut self,
        name: &str,
        handle: ProcessHandle,
        procs: &mut ProcessTable,
        sts: &mut ShortTermScheduler,
    ) -> Result<WaitOutcome> {
        let sem = self.get_or_register(name)?;
        let pid = procs[handle].get_pid();

        if sem.value > 0 {
            sem.value -= 1;
            sem.current_holder = Some(pid);
            debug!("process {} acquired '{}'", pid, name);
            return Ok(WaitOutcome::Acquired);
        }

        sem.queue.push_back(handle);
        procs[handle].set_state(ProcessState::Blocked);
        sts.remove(handle, procs);
        debug!("process {} blocked on '{}'", pid, name);

        Ok(WaitOutcome::Blocked)
    }

    /// Wakes the head waiter and hands it the resource, or frees the resource
    /// when nobody waits. Never does both.
    pub fn signal(
        &mut self,
        name: &str,
        procs: &mut ProcessTable,
        sts: &mut ShortTermScheduler,
    ) -> Result<SignalOutcome> {
        let sem = self.get_or_register(name)?;

        match sem.queue.pop_front() {
            Some(handle) => {
                let pid = procs[handle].get_pid();
                sem.current_holder = Some(pid);
                sts.enqueue(handle, procs);
                debug!("'{}' handed off to process {}", name, pid);
                Ok(SignalOutcome::HandedOff(pid))
            }
            None => {
                if sem.value > 0 {
                    warn!("signal on '{}' which is not held", name);
                }
                sem.value = 1;
                sem.current_holder = None;
                Ok(SignalOutcome::Released)
            }
        }
    }

    /// Signals every resource still held by `pid` so a process that ends
    /// inside a critical section does not strand its waiters.
    pub fn release_held(
        &mut self,
        pid: Pid,
        procs: &mut ProcessTable,
        sts: &mut ShortTermScheduler,
    ) -> Vec<String> {
        let held: Vec<String> = self
            .semaphores
            .iter()
            .filter(|sem| sem.current_holder == Some(pid))
            .map(|sem| sem.name.clone())
            .collect();

        for name in &held {
            warn!("process {} ended holding '{}', releasing it", pid, name);
            if let Err(err) = self.signal(name, procs, sts) {
                warn!("could not release '{}': {}", name, err);
            }
        }

        held
    }

    pub fn holder(&self, name: &str) -> Option<Pid> {
        self.semaphores
            .iter()
            .find(|sem| sem.name == name)
            .and_then(|sem| sem.current_holder)
    }

    pub fn status(&self, procs: &ProcessTable) -> Vec<ResourceStatus> {
        self.semaphores
            .iter()
            .map(|sem| ResourceStatus {
                name: sem.name.clone(),
                value: sem.value,
                queue_size: sem.queue.len(),
                current_holder: sem.current_holder,
                waiting_pids: sem.queue.iter().map(|&h| procs[h].get_pid()).collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::short_term_scheduler::test_support::table_with;
    use crate::kernel::SchedulingAlgorithm;

    fn running(
        count: usize,
    ) -> (ProcessTable, Vec<ProcessHandle>, ShortTermScheduler) {
        let (mut procs, handles) = table_with(count);
        let mut sts = ShortTermScheduler::new(SchedulingAlgorithm::Fcfs);
        for &handle in &handles {
            sts.enqueue(handle, &mut procs);
            procs[handle].set_state(ProcessState::Running);
        }
        (procs, handles, sts)
    }

    fn status_of(manager: &ResourceManager, procs: &ProcessTable, name: &str) -> ResourceStatus {
        manager.status(procs).into_iter().find(|s| s.name == name).unwrap()
    }

    #[test]
    fn test_initial_status() {
        let manager = ResourceManager::new();
        let (procs, _) = table_with(0);
        let names: Vec<_> = manager.status(&procs).into_iter().map(|s| s.name).collect();

        assert_eq!(names, vec!["userInput", "userOutput", "file"]);
        assert!(manager.status(&procs).iter().all(|s| s.value == 1 && s.current_holder.is_none()));
    }

    #[test]
    fn test_wait_acquires_free_resource() {
        let (mut procs, handles, mut sts) = running(1);
        let mut manager = ResourceManager::new();

        let outcome = manager.wait(RESOURCE_FILE, handles[0], &mut procs, &mut sts).unwrap();

        assert_eq!(outcome, WaitOutcome::Acquired);
        assert_eq!(manager.holder(RESOURCE_FILE), Some(1));
        assert_eq!(status_of(&manager, &procs, RESOURCE_FILE).value, 0);
        assert_eq!(procs[handles[0]].get_state(), ProcessState::Running);
    }

    #[test]
    fn test_wait_blocks_and_removes_from_scheduler() {
        let (mut procs, handles, mut sts) = running(2);
        let mut manager = ResourceManager::new();

        manager.wait(RESOURCE_FILE, handles[0], &mut procs, &mut sts).unwrap();
        let outcome = manager.wait(RESOURCE_FILE, handles[1], &mut procs, &mut sts).unwrap();

        assert_eq!(outcome, WaitOutcome::Blocked);
        assert_eq!(procs[handles[1]].get_state(), ProcessState::Blocked);
        assert!(!sts.ready_queue().contains(&handles[1]));

        let status = status_of(&manager, &procs, RESOURCE_FILE);
        assert_eq!(status.value, 0);
        assert_eq!(status.waiting_pids, vec![2]);
        assert_eq!(status.current_holder, Some(1));
    }

    #[test]
    fn test_signal_hands_off_in_fifo_order() {
        let (mut procs, handles, mut sts) = running(3);
        let mut manager = ResourceManager::new();

        manager.wait(RESOURCE_FILE, handles[0], &mut procs, &mut sts).unwrap();
        manager.wait(RESOURCE_FILE, handles[2], &mut procs, &mut sts).unwrap();
        manager.wait(RESOURCE_FILE, handles[1], &mut procs, &mut sts).unwrap();

        let outcome = manager.signal(RESOURCE_FILE, &mut procs, &mut sts).unwrap();

        assert_eq!(outcome, SignalOutcome::HandedOff(3));
        assert_eq!(procs[handles[2]].get_state(), ProcessState::Ready);
        assert_eq!(procs[handles[1]].get_state(), ProcessState::Blocked);
        assert!(sts.ready_queue().contains(&handles[2]));

        let status = status_of(&manager, &procs, RESOURCE_FILE);
        assert_eq!(status.value, 0);
        assert_eq!(status.current_holder, Some(3));
        assert_eq!(status.waiting_pids, vec![2]);
    }

    #[test]
    fn test_signal_without_waiters_releases() {
        let (mut procs, handles, mut sts) = running(1);
        let mut manager = ResourceManager::new();

        manager.wait(RESOURCE_USER_INPUT, handles[0], &mut procs, &mut sts).unwrap();
        let outcome = manager.signal(RESOURCE_USER_INPUT, &mut procs, &mut sts).unwrap();

        assert_eq!(outcome, SignalOutcome::Released);
        let status = status_of(&manager, &procs, RESOURCE_USER_INPUT);
        assert_eq!(status.value, 1);
        assert_eq!(status.current_holder, None);
    }

    #[test]
    fn test_release_held_passes_resources_on() {
        let (mut procs, handles, mut sts) = running(2);
        let mut manager = ResourceManager::new();
        manager.wait(RESOURCE_FILE, handles[0], &mut procs, &mut sts).unwrap();
        manager.wait(RESOURCE_USER_OUTPUT, handles[0], &mut procs, &mut sts).unwrap();
        manager.wait(RESOURCE_FILE, handles[1], &mut procs, &mut sts).unwrap();

        let released = manager.release_held(1, &mut procs, &mut sts);

        assert_eq!(released, vec!["userOutput".to_string(), "file".to_string()]);
        assert_eq!(manager.holder(RESOURCE_FILE), Some(2));
        assert_eq!(procs[handles[1]].get_state(), ProcessState::Ready);
        assert_eq!(status_of(&manager, &procs, RESOURCE_USER_OUTPUT).value, 1);
        assert!(manager.release_held(1, &mut procs, &mut sts).is_empty());
    }

    #[test]
    fn test_value_stays_binary() {
        let (mut procs, _, mut sts) = running(0);
        let mut manager = ResourceManager::new();

        manager.signal(RESOURCE_USER_OUTPUT, &mut procs, &mut sts).unwrap();
        manager.signal(RESOURCE_USER_OUTPUT, &mut procs, &mut sts).unwrap();

        assert_eq!(status_of(&manager, &procs, RESOURCE_USER_OUTPUT).value, 1);
    }

    #[test]
    fn test_unknown_resource_is_rejected() {
        let (mut procs, handles, mut sts) = running(1);
        let mut manager = ResourceManager::new();

        let err = manager.wait("printer", handles[0], &mut procs, &mut sts).unwrap_err();

        assert!(matches!(err, SimError::TooManyResources { ref name } if name == "printer"));
        assert!(manager.signal("printer", &mut procs, &mut sts).is_err());
        assert_eq!(manager.status(&procs).len(), MAX_RESOURCES);
        assert_eq!(procs[handles[0]].get_state(), ProcessState::Running);
    }

    #[test]
    fn test_reset_frees_everything() {
        let (mut procs, handles, mut sts) = running(2);
        let mut manager = ResourceManager::new();
        manager.wait(RESOURCE_FILE, handles[0], &mut procs, &mut sts).unwrap();
        manager.wait(RESOURCE_FILE, handles[1], &mut procs, &mut sts).unwrap();

        manager.reset();

        let status = status_of(&manager, &procs, RESOURCE_FILE);
        assert_eq!(status.value, 1);
        assert!(status.waiting_pids.is_empty());
        assert_eq!(manager.holder(RESOURCE_FILE), None);
    }
}
