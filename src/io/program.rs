/// Admission descriptor for one process: its instruction lines and the
/// tick at which it arrives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    pub name: String,
    pub instructions: Vec<String>,
    pub arrival_tick: u64,
}

impl Program {
    /// One instruction per non-blank line.
    pub fn from_source(name: &str, source: &str, arrival_tick: u64) -> Program {
        Program {
            name: name.to_string(),
            instructions: source
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            arrival_tick,
        }
    }
}
