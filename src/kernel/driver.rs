use std::collections::VecDeque;

use log::{debug, error, info, warn};
use serde::Serialize;

use super::cpu::Execution;
use super::memory::MemoryWord;
use super::resource_manager::ResourceStatus;
use super::*;

use crate::error::{Result, SimError};
use crate::io::{Devices, Program};

/// Everything a tick mutates. Owned by the driver and lent to the CPU for
/// the duration of one instruction.
pub(crate) struct SystemState {
    pub clock: u64,
    pub memory: Memory,
    pub resources: ResourceManager,
    pub sts: ShortTermScheduler,
    pub lts: LongTermScheduler,
    pub procs: ProcessTable,
}

impl SystemState {
    pub fn new(scheduling_alg: SchedulingAlgorithm) -> SystemState {
        SystemState {
            clock: 0,
            memory: Memory::new(),
            resources: ResourceManager::new(),
            sts: ShortTermScheduler::new(scheduling_alg),
            lts: LongTermScheduler::new(),
            procs: ProcessTable::new(),
        }
    }

    pub fn create_process(&mut self, program: &Program) -> Result<ProcessHandle> {
        self.lts.create_process(program, &mut self.memory, &mut self.procs)
    }

    /// Reinitializes every component in one step, keeping the policy.
    pub fn reset(&mut self) {
        self.clock = 0;
        self.memory.init();
        self.resources.reset();
        self.sts = ShortTermScheduler::new(self.sts.algorithm());
        self.lts.clear();
        self.procs.clear();
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// Every process has terminated. Later ticks do nothing.
    Halted,
    Idle,
    Skipped(Pid),
    Executed(Pid),
    Blocked(Pid),
    Terminated(Pid),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct HistoryEntry {
    pub tick: u64,
    pub pid: Pid,
    pub state: ProcessState,
    pub priority: u32,
    pub pc: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct ProcessView {
    pub pid: Pid,
    pub state: ProcessState,
    pub priority: u32,
    pub pc: usize,
    pub mem_low: usize,
    pub mem_high: usize,
    pub time_in_queue: u64,
    pub arrival_tick: u64,
}

/// What an observer sees between ticks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct Snapshot {
    pub clock: u64,
    pub scheduler: &'static str,
    pub running: Option<Pid>,
    pub ready: Vec<Pid>,
    pub blocked: Vec<Pid>,
    pub processes: Vec<ProcessView>,
    pub resources: Vec<ResourceStatus>,
}

impl Snapshot {
    fn capture(state: &SystemState) -> Snapshot {
        let procs = &state.procs;

        Snapshot {
            clock: state.clock,
            scheduler: state.sts.name(),
            running: state.sts.current().map(|handle| procs[handle].get_pid()),
            ready: state.sts.ready_queue().into_iter().map(|h| procs[h].get_pid()).collect(),
            blocked: procs
                .iter()
                .filter(|pcb| pcb.get_state() == ProcessState::Blocked)
                .map(|pcb| pcb.get_pid())
                .collect(),
            processes: procs
                .iter()
                .map(|pcb| ProcessView {
                    pid: pcb.get_pid(),
                    state: pcb.get_state(),
                    priority: pcb.priority,
                    pc: pcb.pc,
                    mem_low: pcb.get_address_space().low,
                    mem_high: pcb.get_address_space().high,
                    time_in_queue: pcb.time_in_queue,
                    arrival_tick: pcb.get_arrival_tick(),
                })
                .collect(),
            resources: state.resources.status(procs),
        }
    }
}

pub(crate) struct Driver {
    state: SystemState,
    devices: Devices,
    halted: bool,
    reclaim_terminated_memory: bool,
    history: VecDeque<HistoryEntry>,
    snapshot: Snapshot,
}

impl Driver {
    pub fn new(scheduling_alg: SchedulingAlgorithm, devices: Devices) -> Driver {
        let state = SystemState::new(scheduling_alg);
        let snapshot = Snapshot::capture(&state);

        Driver {
            state,
            devices,
            halted: false,
            reclaim_terminated_memory: false,
            history: VecDeque::with_capacity(MAX_HISTORY),
            snapshot,
        }
    }

    /// Frees a process's region as soon as it terminates instead of keeping
    /// it until reset.
    pub fn with_memory_reclamation(mut self, reclaim: bool) -> Driver {
        self.reclaim_terminated_memory = reclaim;
        self
    }

    /// Loads a program as a NEW process. A failed creation leaves the
    /// system untouched.
    pub fn add_process(&mut self, program: &Program) -> Result<Pid> {
        let handle = self.state.create_process(program).map_err(|err| {
            error!("could not create process for '{}': {}", program.name, err);
            err
        })?;

        self.halted = false;
        self.snapshot = Snapshot::capture(&self.state);

        Ok(self.state.procs[handle].get_pid())
    }

    /// Runs one tick. The clock advances exactly once unless the
    /// simulation had already halted.
    pub fn tick(&mut self) -> TickOutcome {
        if self.halted {
            return TickOutcome::Halted;
        }

        let tick = self.state.clock;
        let outcome = self.step(tick);
        self.state.clock += 1;
        self.refresh(tick);

        debug!("tick {}: {:?}", tick, outcome);
        outcome
    }

    /// Ticks until halted or `max_ticks` ticks have run. Returns the number
    /// of ticks run.
    pub fn run(&mut self, max_ticks: u64) -> u64 {
        let mut ticks = 0;

        while ticks < max_ticks && !self.halted {
            self.tick();
            ticks += 1;
        }

        if !self.halted {
            warn!("stopped after {} ticks without finishing", ticks);
        }

        ticks
    }

    /// Returns the driver to its freshly built state under the same policy.
    /// The command line runs one workload per process, so only embedders and
    /// tests reach this.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn reset(&mut self) {
        self.state.reset();
        self.halted = false;
        self.history.clear();
        self.snapshot = Snapshot::capture(&self.state);
        info!("system reset, scheduler {}", self.state.sts.name());
    }

    fn step(&mut self, tick: u64) -> TickOutcome {
        let state = &mut self.state;
        state.lts.admit(tick, &mut state.procs, &mut state.sts);

        let handle = match state.sts.next(&mut state.procs) {
            Some(handle) => handle,
            None if state.procs.all_terminated() => {
                info!("all processes finished at tick {}", tick);
                self.halted = true;
                return TickOutcome::Halted;
            }
            None => {
                if state.lts.has_pending() {
                    debug!("cpu idle at tick {}, waiting for arrivals", tick);
                }
                return TickOutcome::Idle;
            }
        };

        let pid = state.procs[handle].get_pid();
        let current_state = state.procs[handle].get_state();
        if !current_state.is_runnable() {
            warn!("scheduler returned process {} in state {}, skipping tick", pid, current_state);
            return TickOutcome::Skipped(pid);
        }

        state.procs[handle].set_state(ProcessState::Running);

        let instruction = match self.fetch(handle).and_then(|line| Cpu::decode(&line)) {
            Ok(instruction) => instruction,
            Err(err) => {
                error!("terminating process {}: {}", pid, err);
                self.terminate(handle);
                return TickOutcome::Terminated(pid);
            }
        };

        match Cpu::new(&mut self.state, &mut self.devices, handle).execute(&instruction) {
            Ok(Execution::Completed) => {}
            Ok(Execution::Retry) => {
                debug!("process {} blocked before finishing {:?}", pid, instruction);
                return TickOutcome::Blocked(pid);
            }
            Err(err) => warn!("process {}: {}", pid, err),
        }

        let pcb = &mut self.state.procs[handle];
        pcb.pc += 1;

        if pcb.get_state() == ProcessState::Blocked {
            debug!("process {} is now blocked", pid);
            return TickOutcome::Blocked(pid);
        }

        if pcb.pc >= pcb.get_address_space().pcb_base {
            info!("process {} finished at tick {}", pid, tick);
            self.terminate(handle);
            return TickOutcome::Terminated(pid);
        }

        pcb.set_state(ProcessState::Ready);
        self.state.sts.preempt(handle, &mut self.state.procs);

        TickOutcome::Executed(pid)
    }

    /// Bounds-checks pc against the code region and reads the instruction text.
    fn fetch(&self, handle: ProcessHandle) -> Result<String> {
        let pcb = &self.state.procs[handle];
        let space = pcb.get_address_space();

        if !space.code().contains(&pcb.pc) {
            return Err(SimError::PcOutOfRange {
                pid: pcb.get_pid(),
                pc: pcb.pc,
                code_start: space.code_base,
                code_end: space.pcb_base,
            });
        }

        let line = self
            .state
            .memory
            .read(pcb.pc, pcb.pc, "instruction")
            .ok_or(SimError::InstructionFetch {
                pid: pcb.get_pid(),
                pc: pcb.pc,
            })?;

        debug!("process {} fetched mem[{}]: {}", pcb.get_pid(), pcb.pc, line);
        Ok(line.to_string())
    }

    fn terminate(&mut self, handle: ProcessHandle) {
        let state = &mut self.state;
        state.procs[handle].set_state(ProcessState::Terminated);
        state.sts.remove(handle, &mut state.procs);

        let pid = state.procs[handle].get_pid();
        state.resources.release_held(pid, &mut state.procs, &mut state.sts);

        if self.reclaim_terminated_memory {
            let space = *state.procs[handle].get_address_space();
            state.memory.free(space.low, space.len());
            state.procs[handle].mark_memory_reclaimed();
            debug!("freed mem[{}..={}]", space.low, space.high);
        }
    }

    /// Persists every live PCB mirror, records history and rebuilds the
    /// observer snapshot.
    fn refresh(&mut self, tick: u64) {
        let state = &mut self.state;

        for pcb in state.procs.iter().filter(|pcb| !pcb.is_memory_reclaimed()) {
            if let Err(err) = pcb.persist(&mut state.memory) {
                warn!("could not persist pcb of process {}: {}", pcb.get_pid(), err);
            }

            self.history.push_back(HistoryEntry {
                tick,
                pid: pcb.get_pid(),
                state: pcb.get_state(),
                priority: pcb.priority,
                pc: pcb.pc,
            });
        }

        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }

        self.snapshot = Snapshot::capture(state);
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn clock(&self) -> u64 {
        self.state.clock
    }

    pub fn scheduler_name(&self) -> &'static str {
        self.state.sts.name()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    pub fn memory_view(&self) -> &[MemoryWord] {
        self.state.memory.words()
    }

    pub fn resource_status(&self) -> Vec<ResourceStatus> {
        self.state.resources.status(&self.state.procs)
    }
}
