use std::error::Error;
use std::fmt;
use std::io;

use crate::kernel::Pid;

pub type Result<T> = std::result::Result<T, SimError>;

/// Every failure the simulated kernel can report.
/// The driver decides how far each one is allowed to spread.
#[derive(Debug)]
pub enum SimError {
    MemoryExhausted { requested: usize, free: usize },
    AddressOutOfRange { index: usize },
    PcOutOfRange { pid: Pid, pc: usize, code_start: usize, code_end: usize },
    InstructionFetch { pid: Pid, pc: usize },
    InstructionDecode { line: String, reason: &'static str },
    VariableNotFound { pid: Pid, name: String },
    VariableSlotExhausted { pid: Pid, name: String },
    InvalidOperand { operand: String },
    FileIo { name: String, source: io::Error },
    TooManyResources { name: String },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::MemoryExhausted { requested, free } => {
                write!(f, "memory exhausted: need {} contiguous words, {} free", requested, free)
            }
            SimError::AddressOutOfRange { index } => {
                write!(f, "memory index {} is outside the pool", index)
            }
            SimError::PcOutOfRange { pid, pc, code_start, code_end } => write!(
                f,
                "pc {} of process {} is outside its code range [{}, {})",
                pc, pid, code_start, code_end
            ),
            SimError::InstructionFetch { pid, pc } => {
                write!(f, "no instruction at mem[{}] for process {}", pc, pid)
            }
            SimError::InstructionDecode { line, reason } => {
                write!(f, "cannot decode '{}': {}", line, reason)
            }
            SimError::VariableNotFound { pid, name } => {
                write!(f, "variable '{}' not found in memory of process {}", name, pid)
            }
            SimError::VariableSlotExhausted { pid, name } => {
                write!(f, "no space to assign variable '{}' for process {}", name, pid)
            }
            SimError::InvalidOperand { operand } => {
                write!(f, "operand '{}' is not an integer", operand)
            }
            SimError::FileIo { name, source } => write!(f, "file '{}': {}", name, source),
            SimError::TooManyResources { name } => {
                write!(f, "cannot register resource '{}': resource table is full", name)
            }
        }
    }
}

impl Error for SimError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SimError::FileIo { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_memory_exhausted() {
        let err = SimError::MemoryExhausted { requested: 21, free: 4 };
        assert_eq!(err.to_string(), "memory exhausted: need 21 contiguous words, 4 free");
    }

    #[test]
    fn test_file_io_exposes_source() {
        let err = SimError::FileIo {
            name: "a.txt".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.source().is_some());
        assert!(SimError::TooManyResources { name: "disk".to_string() }.source().is_none());
    }
}
