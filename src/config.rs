use std::error::Error;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;

use crate::kernel::{SchedulingAlgorithm, MLFQ_LEVELS};

const DEFAULT_QUANTUM: usize = 2;

pub const USAGE: &str = "\
usage: process-scheduler-simulator [OPTIONS] PROGRAM[@ARRIVAL]...

options:
  --policy fcfs|rr|mlfq   scheduling policy (default fcfs)
  --quantum N             round robin quantum (default 2)
  --max-ticks N           stop after N ticks (default 1000)
  --reclaim               free a process's memory when it terminates
  --log-level LEVEL       off, error, warn, info, debug or trace (default info)
  --interval-ms N         tick from a background thread every N ms
  --input a,b,c           answer input prompts from this list";

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    UnknownFlag(String),
    MissingValue(&'static str),
    BadNumber { flag: &'static str, value: String },
    BadPolicy(String),
    BadLogLevel(String),
    BadProgramSpec(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownFlag(flag) => write!(f, "unknown option '{}'", flag),
            ConfigError::MissingValue(flag) => write!(f, "option '{}' needs a value", flag),
            ConfigError::BadNumber { flag, value } => {
                write!(f, "option '{}' expects a positive number, got '{}'", flag, value)
            }
            ConfigError::BadPolicy(policy) => {
                write!(f, "unknown policy '{}', expected fcfs, rr or mlfq", policy)
            }
            ConfigError::BadLogLevel(level) => write!(f, "unknown log level '{}'", level),
            ConfigError::BadProgramSpec(spec) => {
                write!(f, "cannot read program argument '{}', expected PATH[@ARRIVAL]", spec)
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Policy {
    Fcfs,
    RoundRobin,
    Mlfq,
}

impl FromStr for Policy {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Policy, ConfigError> {
        match raw.to_ascii_lowercase().as_str() {
            "fcfs" => Ok(Policy::Fcfs),
            "rr" | "round-robin" => Ok(Policy::RoundRobin),
            "mlfq" => Ok(Policy::Mlfq),
            _ => Err(ConfigError::BadPolicy(raw.to_string())),
        }
    }
}

/// A program file to load and the tick it arrives at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ProgramSpec {
    pub path: PathBuf,
    pub arrival_tick: u64,
}

impl FromStr for ProgramSpec {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<ProgramSpec, ConfigError> {
        let bad_spec = || ConfigError::BadProgramSpec(raw.to_string());

        let (path, arrival_tick) = match raw.rsplit_once('@') {
            Some((path, arrival)) => (path, arrival.parse().map_err(|_| bad_spec())?),
            None => (raw, 0),
        };

        if path.is_empty() {
            return Err(bad_spec());
        }

        Ok(ProgramSpec {
            path: PathBuf::from(path),
            arrival_tick,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SimConfig {
    pub policy: Policy,
    pub quantum: NonZeroUsize,
    pub mlfq_levels: NonZeroUsize,
    pub max_ticks: u64,
    pub reclaim_terminated_memory: bool,
    pub log_level: LevelFilter,
    pub interval: Option<Duration>,
    pub programs: Vec<ProgramSpec>,
    pub scripted_input: Option<Vec<String>>,
}

impl Default for SimConfig {
    fn default() -> SimConfig {
        SimConfig {
            policy: Policy::Fcfs,
            quantum: NonZeroUsize::new(DEFAULT_QUANTUM).unwrap_or(NonZeroUsize::MIN),
            mlfq_levels: NonZeroUsize::new(MLFQ_LEVELS).unwrap_or(NonZeroUsize::MIN),
            max_ticks: 1000,
            reclaim_terminated_memory: false,
            log_level: LevelFilter::Info,
            interval: None,
            programs: Vec::new(),
            scripted_input: None,
        }
    }
}

impl SimConfig {
    /// Parses the arguments that follow the binary name.
    pub fn from_args<I>(args: I) -> Result<SimConfig, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = SimConfig::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let mut value = |flag: &'static str| args.next().ok_or(ConfigError::MissingValue(flag));

            match arg.as_str() {
                "--policy" => config.policy = value("--policy")?.parse()?,
                "--quantum" => config.quantum = parse_number("--quantum", &value("--quantum")?)?,
                "--max-ticks" => {
                    let max_ticks: NonZeroUsize = parse_number("--max-ticks", &value("--max-ticks")?)?;
                    config.max_ticks = max_ticks.get() as u64;
                }
                "--reclaim" => config.reclaim_terminated_memory = true,
                "--log-level" => {
                    let raw = value("--log-level")?;
                    config.log_level = raw.parse().map_err(|_| ConfigError::BadLogLevel(raw))?;
                }
                "--interval-ms" => {
                    let millis: NonZeroUsize = parse_number("--interval-ms", &value("--interval-ms")?)?;
                    config.interval = Some(Duration::from_millis(millis.get() as u64));
                }
                "--input" => {
                    let raw = value("--input")?;
                    config.scripted_input = Some(raw.split(',').map(|item| item.trim().to_string()).collect());
                }
                flag if flag.starts_with("--") => return Err(ConfigError::UnknownFlag(flag.to_string())),
                _ => config.programs.push(arg.parse()?),
            }
        }

        Ok(config)
    }

    pub fn scheduling_algorithm(&self) -> SchedulingAlgorithm {
        match self.policy {
            Policy::Fcfs => SchedulingAlgorithm::Fcfs,
            Policy::RoundRobin => SchedulingAlgorithm::RoundRobin {
                quantum: self.quantum,
            },
            Policy::Mlfq => SchedulingAlgorithm::Mlfq {
                levels: self.mlfq_levels,
            },
        }
    }
}

fn parse_number<T: FromStr>(flag: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::BadNumber {
        flag,
        value: raw.to_string(),
    })
}
