use log::debug;

use super::resource_manager::{WaitOutcome, RESOURCE_FILE};
use super::{AddressSpace, Pid, ProcessHandle, SystemState};

use crate::error::{Result, SimError};
use crate::io::Devices;

/// Variable that `readFile` stores its result under.
pub(crate) const FILE_CONTENT_VAR: &str = "file_content";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Instruction {
    Assign { var: String, source: String },
    Print { var: String },
    PrintRange { from: String, to: String },
    WriteFile { name: String, content: String },
    ReadFile { name: String },
    SemWait { resource: String },
    SemSignal { resource: String },
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Execution {
    Completed,
    /// The instruction blocked before doing its work and must run again
    /// once the process is woken.
    Retry,
}

/// Executes one instruction on behalf of the running process.
pub(crate) struct Cpu<'a> {
    state: &'a mut SystemState,
    devices: &'a mut Devices,
    running: ProcessHandle,
}

impl<'a> Cpu<'a> {
    pub fn new(state: &'a mut SystemState, devices: &'a mut Devices, running: ProcessHandle) -> Cpu<'a> {
        Cpu {
            state,
            devices,
            running,
        }
    }

    /// Tokenizes `opcode arg1 [arg2]`. The second operand is the rest of the
    /// line, so `assign b readFile a` keeps `readFile a` intact.
    pub fn decode(line: &str) -> Result<Instruction> {
        let decode_error = |reason| SimError::InstructionDecode {
            line: line.trim().to_string(),
            reason,
        };

        let (opcode, rest) = split_operand(line.trim());
        let (arg1, arg2) = split_operand(rest);

        let one = |arg1: &str, arg2: &str| -> Result<String> {
            match (arg1.is_empty(), arg2.is_empty()) {
                (true, _) => Err(decode_error("missing operand")),
                (false, false) => Err(decode_error("too many operands")),
                (false, true) => Ok(arg1.to_string()),
            }
        };
        let two = |arg1: &str, arg2: &str| -> Result<(String, String)> {
            if arg1.is_empty() || arg2.is_empty() {
                return Err(decode_error("missing operand"));
            }
            Ok((arg1.to_string(), arg2.to_string()))
        };

        let instruction = match opcode {
            "" => return Err(decode_error("empty instruction")),
            "assign" => {
                let (var, source) = two(arg1, arg2)?;
                Instruction::Assign { var, source }
            }
            "print" => Instruction::Print { var: one(arg1, arg2)? },
            "printFromTo" => {
                let (from, to) = two(arg1, arg2)?;
                Instruction::PrintRange { from, to }
            }
            "writeFile" => {
                let (name, content) = two(arg1, arg2)?;
                Instruction::WriteFile { name, content }
            }
            "readFile" => Instruction::ReadFile { name: one(arg1, arg2)? },
            "semWait" => Instruction::SemWait { resource: one(arg1, arg2)? },
            "semSignal" => Instruction::SemSignal { resource: one(arg1, arg2)? },
            _ => return Err(decode_error("unknown opcode")),
        };

        Ok(instruction)
    }

    pub fn execute(&mut self, instruction: &Instruction) -> Result<Execution> {
        debug!("process {} executing {:?}", self.pid(), instruction);

        match instruction {
            Instruction::Assign { var, source } => {
                let value = self.resolve_source(source)?;
                self.store_variable(var, &value)?;
            }
            Instruction::Print { var } => {
                let pid = self.pid();
                let value = self.lookup(var).ok_or_else(|| SimError::VariableNotFound {
                    pid,
                    name: var.clone(),
                })?;
                self.devices.console.log(pid, &value);
            }
            Instruction::PrintRange { from, to } => {
                let from = self.resolve_integer(from)?;
                let to = self.resolve_integer(to)?;
                let sequence: Vec<String> = if from > to {
                    (to..=from).rev().map(|n| n.to_string()).collect()
                } else {
                    (from..=to).map(|n| n.to_string()).collect()
                };
                let pid = self.pid();
                self.devices.console.log(pid, &sequence.join(" "));
            }
            Instruction::WriteFile { name, content } => {
                return self.with_file_resource(|cpu| {
                    let name = cpu.lookup_or_literal(name);
                    let content = cpu.lookup_or_literal(content);
                    cpu.devices
                        .files
                        .write_file(&name, &content)
                        .map_err(|source| SimError::FileIo { name, source })
                });
            }
            Instruction::ReadFile { name } => {
                return self.with_file_resource(|cpu| {
                    let name = cpu.lookup_or_literal(name);
                    let content = cpu
                        .devices
                        .files
                        .read_file(&name)
                        .map_err(|source| SimError::FileIo { name, source })?;
                    cpu.store_variable(FILE_CONTENT_VAR, &content)
                });
            }
            Instruction::SemWait { resource } => {
                let state = &mut *self.state;
                state.resources.wait(resource, self.running, &mut state.procs, &mut state.sts)?;
            }
            Instruction::SemSignal { resource } => {
                let state = &mut *self.state;
                state.resources.signal(resource, &mut state.procs, &mut state.sts)?;
            }
        }

        Ok(Execution::Completed)
    }

    fn pid(&self) -> Pid {
        self.state.procs[self.running].get_pid()
    }

    fn address_space(&self) -> AddressSpace {
        *self.state.procs[self.running].get_address_space()
    }

    /// Variable lookup always scans the caller's whole region.
    fn lookup(&self, name: &str) -> Option<String> {
        let space = self.address_space();
        self.state.memory.read(space.low, space.high, name).map(str::to_string)
    }

    fn lookup_or_literal(&self, operand: &str) -> String {
        self.lookup(operand).unwrap_or_else(|| operand.to_string())
    }

    fn resolve_source(&mut self, source: &str) -> Result<String> {
        if source == "input" {
            let pid = self.pid();
            return Ok(self.devices.console.get_input(pid).to_string());
        }

        if let Some(var) = source.strip_prefix("readFile ") {
            let var = var.trim();
            let name = self.lookup(var).ok_or_else(|| SimError::VariableNotFound {
                pid: self.pid(),
                name: var.to_string(),
            })?;
            return self
                .devices
                .files
                .read_file(&name)
                .map_err(|source| SimError::FileIo { name, source });
        }

        Ok(self.lookup_or_literal(source))
    }

    fn resolve_integer(&self, operand: &str) -> Result<i64> {
        let raw = self.lookup_or_literal(operand);
        raw.trim().parse().map_err(|_| SimError::InvalidOperand { operand: raw })
    }

    /// Writes into the first variable slot that is unnamed or already holds `var`.
    fn store_variable(&mut self, var: &str, value: &str) -> Result<()> {
        let space = self.address_space();
        let slot = space.variables().find(|&index| {
            self.state
                .memory
                .read_from(index)
                .map_or(false, |word| word.name.as_deref().map_or(true, |name| name == var))
        });

        match slot {
            Some(index) => self.state.memory.write(index, var, value),
            None => Err(SimError::VariableSlotExhausted {
                pid: self.pid(),
                name: var.to_string(),
            }),
        }
    }

    /// Runs a file operation under the "file" resource. A hold taken by an
    /// enclosing `semWait file` is reused and left alone; otherwise the
    /// resource is acquired here and released afterwards even when the
    /// operation fails.
    fn with_file_resource<F>(&mut self, op: F) -> Result<Execution>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let pid = self.pid();
        let resumed = std::mem::take(&mut self.state.procs[self.running].resumes_file_op);

        let release = if resumed {
            true
        } else if self.state.resources.holder(RESOURCE_FILE) == Some(pid) {
            false
        } else {
            let state = &mut *self.state;
            match state.resources.wait(RESOURCE_FILE, self.running, &mut state.procs, &mut state.sts)? {
                WaitOutcome::Acquired => true,
                WaitOutcome::Blocked => {
                    state.procs[self.running].resumes_file_op = true;
                    return Ok(Execution::Retry);
                }
            }
        };

        let result = op(self);

        if release {
            let state = &mut *self.state;
            state.resources.signal(RESOURCE_FILE, &mut state.procs, &mut state.sts)?;
        }

        result.map(|_| Execution::Completed)
    }
}

fn split_operand(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (text, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{Disk, Program, ScriptedConsole};
    use crate::kernel::{ProcessState, SchedulingAlgorithm};

    struct Fixture {
        state: SystemState,
        devices: Devices,
        console: ScriptedConsole,
        disk: Disk,
    }

    impl Fixture {
        fn new(inputs: &[&str]) -> Fixture {
            let console = ScriptedConsole::new(inputs.iter().copied());
            let disk = Disk::new().with_file("notes.txt", "hello");
            let devices = Devices::new(console.clone(), disk.clone());

            Fixture {
                state: SystemState::new(SchedulingAlgorithm::Fcfs),
                devices,
                console,
                disk,
            }
        }

        /// Creates a process and makes it RUNNING, as the driver would.
        fn spawn(&mut self, instructions: &[&str]) -> ProcessHandle {
            let program = Program {
                name: "test".to_string(),
                instructions: instructions.iter().map(|s| s.to_string()).collect(),
                arrival_tick: 0,
            };
            let handle = self.state.create_process(&program).unwrap();
            self.state.sts.enqueue(handle, &mut self.state.procs);
            self.state.procs[handle].set_state(ProcessState::Running);
            handle
        }

        fn run(&mut self, handle: ProcessHandle, line: &str) -> Result<Execution> {
            let instruction = Cpu::decode(line)?;
            Cpu::new(&mut self.state, &mut self.devices, handle).execute(&instruction)
        }

        fn var(&self, handle: ProcessHandle, name: &str) -> Option<String> {
            let space = self.state.procs[handle].get_address_space();
            self.state.memory.read(space.low, space.high, name).map(str::to_string)
        }

        fn output(&self) -> Vec<String> {
            self.console.transcript().into_iter().map(|(_, line)| line).collect()
        }
    }

    #[test]
    fn test_decode_all_opcodes() {
        assert_eq!(
            Cpu::decode("assign b readFile a").unwrap(),
            Instruction::Assign { var: "b".into(), source: "readFile a".into() }
        );
        assert_eq!(Cpu::decode("print x\n").unwrap(), Instruction::Print { var: "x".into() });
        assert_eq!(
            Cpu::decode("printFromTo 1 5").unwrap(),
            Instruction::PrintRange { from: "1".into(), to: "5".into() }
        );
        assert_eq!(
            Cpu::decode("writeFile a b").unwrap(),
            Instruction::WriteFile { name: "a".into(), content: "b".into() }
        );
        assert_eq!(Cpu::decode("readFile a").unwrap(), Instruction::ReadFile { name: "a".into() });
        assert_eq!(
            Cpu::decode("  semWait   file ").unwrap(),
            Instruction::SemWait { resource: "file".into() }
        );
        assert_eq!(
            Cpu::decode("semSignal userInput").unwrap(),
            Instruction::SemSignal { resource: "userInput".into() }
        );
    }

    #[test]
    fn test_decode_failures() {
        for line in ["", "jump 4", "assign x", "print", "print x y", "semWait"] {
            assert!(
                matches!(Cpu::decode(line), Err(SimError::InstructionDecode { .. })),
                "'{}' should not decode",
                line
            );
        }
    }

    #[test]
    fn test_assign_literal_and_variable() {
        let mut fx = Fixture::new(&[]);
        let p = fx.spawn(&["assign x 5"]);

        fx.run(p, "assign x 5").unwrap();
        fx.run(p, "assign y x").unwrap();

        assert_eq!(fx.var(p, "x").as_deref(), Some("5"));
        assert_eq!(fx.var(p, "y").as_deref(), Some("5"));
    }

    #[test]
    fn test_assign_overwrites_existing_slot() {
        let mut fx = Fixture::new(&[]);
        let p = fx.spawn(&["assign x 5"]);

        fx.run(p, "assign x 5").unwrap();
        fx.run(p, "assign x 6").unwrap();
        fx.run(p, "assign y 7").unwrap();
        fx.run(p, "assign z 8").unwrap();

        assert_eq!(fx.var(p, "x").as_deref(), Some("6"));
        assert_eq!(fx.var(p, "z").as_deref(), Some("8"));
    }

    #[test]
    fn test_assign_without_free_slot() {
        let mut fx = Fixture::new(&[]);
        let p = fx.spawn(&["assign x 5"]);
        for line in ["assign a 1", "assign b 2", "assign c 3"] {
            fx.run(p, line).unwrap();
        }

        let err = fx.run(p, "assign d 4").unwrap_err();

        assert!(matches!(err, SimError::VariableSlotExhausted { .. }));
        assert_eq!(fx.var(p, "d"), None);
        assert_eq!(fx.var(p, "a").as_deref(), Some("1"));
    }

    #[test]
    fn test_assign_input() {
        let mut fx = Fixture::new(&["42", "notes.txt"]);
        let p = fx.spawn(&["assign x input"]);

        fx.run(p, "assign x input").unwrap();
        fx.run(p, "assign f input").unwrap();

        assert_eq!(fx.var(p, "x").as_deref(), Some("42"));
        assert_eq!(fx.var(p, "f").as_deref(), Some("notes.txt"));
    }

    #[test]
    fn test_assign_read_file() {
        let mut fx = Fixture::new(&[]);
        let p = fx.spawn(&["assign b readFile a"]);

        fx.run(p, "assign a notes.txt").unwrap();
        fx.run(p, "assign b readFile a").unwrap();
        let err = fx.run(p, "assign c readFile missing").unwrap_err();

        assert_eq!(fx.var(p, "b").as_deref(), Some("hello"));
        assert!(matches!(err, SimError::VariableNotFound { .. }));
    }

    #[test]
    fn test_print() {
        let mut fx = Fixture::new(&[]);
        let p = fx.spawn(&["print x"]);

        fx.run(p, "assign x 5").unwrap();
        fx.run(p, "print x").unwrap();
        let err = fx.run(p, "print nope").unwrap_err();

        assert_eq!(fx.output(), vec!["5"]);
        assert!(matches!(err, SimError::VariableNotFound { ref name, .. } if name == "nope"));
    }

    #[test]
    fn test_print_range_both_directions() {
        let mut fx = Fixture::new(&[]);
        let p = fx.spawn(&["printFromTo a b"]);

        fx.run(p, "assign a 3").unwrap();
        fx.run(p, "printFromTo a 6").unwrap();
        fx.run(p, "printFromTo 6 a").unwrap();
        fx.run(p, "printFromTo 2 2").unwrap();

        assert_eq!(fx.output(), vec!["3 4 5 6", "6 5 4 3", "2"]);
        assert!(matches!(
            fx.run(p, "printFromTo 1 q"),
            Err(SimError::InvalidOperand { .. })
        ));
    }

    #[test]
    fn test_write_and_read_file_release_resource() {
        let mut fx = Fixture::new(&[]);
        let p = fx.spawn(&["writeFile f c"]);

        fx.run(p, "assign f out.txt").unwrap();
        fx.run(p, "assign c data").unwrap();
        assert_eq!(fx.run(p, "writeFile f c").unwrap(), Execution::Completed);
        assert_eq!(fx.disk.get("out.txt").as_deref(), Some("data"));
        assert_eq!(fx.state.resources.holder(RESOURCE_FILE), None);

        fx.run(p, "readFile f").unwrap();
        assert_eq!(fx.var(p, FILE_CONTENT_VAR).as_deref(), Some("data"));
        assert_eq!(fx.state.resources.holder(RESOURCE_FILE), None);
    }

    #[test]
    fn test_read_file_failure_still_releases() {
        let mut fx = Fixture::new(&[]);
        let p = fx.spawn(&["readFile ghost.txt"]);

        let err = fx.run(p, "readFile ghost.txt").unwrap_err();

        assert!(matches!(err, SimError::FileIo { .. }));
        assert_eq!(fx.state.resources.holder(RESOURCE_FILE), None);
        assert_eq!(fx.state.procs[p].get_state(), ProcessState::Running);
    }

    #[test]
    fn test_file_op_reuses_enclosing_hold() {
        let mut fx = Fixture::new(&[]);
        let p = fx.spawn(&["semWait file"]);

        fx.run(p, "semWait file").unwrap();
        fx.run(p, "writeFile out.txt x").unwrap();

        assert_eq!(fx.state.resources.holder(RESOURCE_FILE), Some(1));
        fx.run(p, "semSignal file").unwrap();
        assert_eq!(fx.state.resources.holder(RESOURCE_FILE), None);
    }

    #[test]
    fn test_file_op_blocks_when_held_elsewhere() {
        let mut fx = Fixture::new(&[]);
        let holder = fx.spawn(&["semWait file"]);
        let writer = fx.spawn(&["writeFile out.txt x"]);

        fx.run(holder, "semWait file").unwrap();
        assert_eq!(fx.run(writer, "writeFile out.txt x").unwrap(), Execution::Retry);
        assert_eq!(fx.state.procs[writer].get_state(), ProcessState::Blocked);
        assert_eq!(fx.disk.get("out.txt"), None);

        fx.run(holder, "semSignal file").unwrap();
        assert_eq!(fx.state.resources.holder(RESOURCE_FILE), Some(2));

        fx.state.procs[writer].set_state(ProcessState::Running);
        assert_eq!(fx.run(writer, "writeFile out.txt x").unwrap(), Execution::Completed);
        assert_eq!(fx.disk.get("out.txt").as_deref(), Some("x"));
        assert_eq!(fx.state.resources.holder(RESOURCE_FILE), None);
    }

    #[test]
    fn test_sem_on_unknown_resource() {
        let mut fx = Fixture::new(&[]);
        let p = fx.spawn(&["semWait printer"]);

        let err = fx.run(p, "semWait printer").unwrap_err();

        assert!(matches!(err, SimError::TooManyResources { .. }));
        assert_eq!(fx.state.procs[p].get_state(), ProcessState::Running);
    }
}
