pub mod console;
pub mod disk;
pub mod loader;
pub mod program;

pub use console::{Console, ScriptedConsole, StdConsole};
#[cfg(test)]
pub use disk::Disk;
pub use disk::{FileStore, HostFileSystem};
pub use program::Program;

/// The collaborators a running program can reach.
pub struct Devices {
    pub console: Box<dyn Console>,
    pub files: Box<dyn FileStore>,
}

impl Devices {
    pub fn new(console: impl Console + 'static, files: impl FileStore + 'static) -> Devices {
        Devices {
            console: Box::new(console),
            files: Box::new(files),
        }
    }
}
