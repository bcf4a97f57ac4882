use std::fs;
use std::path::Path;

use super::Program;

/// Reads a program file into an admission descriptor.
pub fn load_program(path: &Path, arrival_tick: u64) -> std::io::Result<Program> {
    let source = fs::read_to_string(path)?;

    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(Program::from_source(&name, &source, arrival_tick))
}
