#[cfg(test)]
use std::collections::HashMap;
use std::fs;
use std::io;
#[cfg(test)]
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Storage behind `readFile`/`writeFile`.
pub trait FileStore: Send {
    fn read_file(&mut self, name: &str) -> io::Result<String>;
    fn write_file(&mut self, name: &str, content: &str) -> io::Result<()>;
}

/// In-memory file store for tests. Clones share the same files, so a test
/// can keep a handle after giving one to the driver.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct Disk {
    files: Arc<Mutex<HashMap<String, String>>>,
}

#[cfg(test)]
impl Disk {
    pub fn new() -> Disk {
        Disk::default()
    }

    pub fn with_file(self, name: &str, content: &str) -> Disk {
        self.lock().insert(name.to_string(), content.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.lock().get(name).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
impl FileStore for Disk {
    fn read_file(&mut self, name: &str) -> io::Result<String> {
        self.get(name).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no file named '{}' on disk", name))
        })
    }

    fn write_file(&mut self, name: &str, content: &str) -> io::Result<()> {
        self.lock().insert(name.to_string(), content.to_string());
        Ok(())
    }
}

/// Passes file operations through to the host file system.
pub struct HostFileSystem;

impl FileStore for HostFileSystem {
    fn read_file(&mut self, name: &str) -> io::Result<String> {
        fs::read_to_string(name)
    }

    fn write_file(&mut self, name: &str, content: &str) -> io::Result<()> {
        fs::write(name, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_write_then_read() {
        let mut disk = Disk::new();
        disk.write_file("notes.txt", "hello").unwrap();
        assert_eq!(disk.read_file("notes.txt").unwrap(), "hello");
    }

    #[test]
    fn test_disk_clones_share_files() {
        let disk = Disk::new();
        let mut handle = disk.clone();
        handle.write_file("a", "1").unwrap();
        assert_eq!(disk.get("a").as_deref(), Some("1"));
    }

    #[test]
    fn test_disk_missing_file() {
        let mut disk = Disk::new().with_file("present", "x");
        assert_eq!(disk.read_file("absent").unwrap_err().kind(), io::ErrorKind::NotFound);
        assert_eq!(disk.read_file("present").unwrap(), "x");
    }
}
