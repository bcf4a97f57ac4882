use std::collections::VecDeque;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex, PoisonError};

use log::warn;

use crate::kernel::Pid;

/// A value typed in for an `assign x input` instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputValue {
    Number(i64),
    Text(String),
}

impl InputValue {
    pub fn parse(raw: &str) -> InputValue {
        let raw = raw.trim();
        raw.parse()
            .map(InputValue::Number)
            .unwrap_or_else(|_| InputValue::Text(raw.to_string()))
    }
}

impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputValue::Number(n) => write!(f, "{}", n),
            InputValue::Text(text) => f.write_str(text),
        }
    }
}

/// Program-visible output and user input.
pub trait Console: Send {
    fn log(&mut self, pid: Pid, message: &str);
    fn get_input(&mut self, pid: Pid) -> InputValue;
}

/// Talks to the terminal.
pub struct StdConsole;

impl Console for StdConsole {
    fn log(&mut self, pid: Pid, message: &str) {
        println!("Process {}: {}", pid, message);
    }

    fn get_input(&mut self, pid: Pid) -> InputValue {
        print!("Please enter a value for process {}: ", pid);
        let _ = io::stdout().flush();

        let mut line = String::new();
        if let Err(err) = io::stdin().lock().read_line(&mut line) {
            warn!("failed to read input for process {}: {}", pid, err);
        }

        InputValue::parse(&line)
    }
}

/// Replays queued inputs and records output. Clones share the transcript.
#[derive(Clone, Default)]
pub struct ScriptedConsole {
    inputs: Arc<Mutex<VecDeque<InputValue>>>,
    transcript: Arc<Mutex<Vec<(Pid, String)>>>,
}

impl ScriptedConsole {
    pub fn new<I, S>(inputs: I) -> ScriptedConsole
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ScriptedConsole {
            inputs: Arc::new(Mutex::new(
                inputs.into_iter().map(|raw| InputValue::parse(raw.as_ref())).collect(),
            )),
            transcript: Arc::default(),
        }
    }

    pub fn transcript(&self) -> Vec<(Pid, String)> {
        self.transcript.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Console for ScriptedConsole {
    fn log(&mut self, pid: Pid, message: &str) {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((pid, message.to_string()));
    }

    fn get_input(&mut self, pid: Pid) -> InputValue {
        let next = self.inputs.lock().unwrap_or_else(PoisonError::into_inner).pop_front();

        next.unwrap_or_else(|| {
            warn!("no scripted input left for process {}", pid);
            InputValue::Text(String::new())
        })
    }
}
