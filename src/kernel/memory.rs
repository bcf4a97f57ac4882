use serde::Serialize;

use super::MEMORY_SIZE;

use crate::error::{Result, SimError};

const MAX_NAME_LEN: usize = 31;
const MAX_VALUE_LEN: usize = 63;

/// One word of the shared pool. `allocated` is the free/used flag;
/// `name` is `None` for an allocated word nobody has written yet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub(crate) struct MemoryWord {
    pub allocated: bool,
    pub name: Option<String>,
    pub value: String,
}

pub(crate) struct Memory {
    words: Vec<MemoryWord>,
}

impl Memory {
    pub fn new() -> Memory {
        Memory {
            words: vec![MemoryWord::default(); MEMORY_SIZE],
        }
    }

    /// Clears every word, invalidating all prior allocations.
    pub fn init(&mut self) {
        self.words.iter_mut().for_each(|word| *word = MemoryWord::default());
    }

    /// First-fit search for `n_words` consecutive free words. The block is
    /// reserved before returning.
    pub fn alloc(&mut self, n_words: usize) -> Result<usize> {
        let exhausted = SimError::MemoryExhausted {
            requested: n_words,
            free: self.get_remaining_memory(),
        };

        if n_words == 0 || n_words > MEMORY_SIZE {
            return Err(exhausted);
        }

        let start = (0..=MEMORY_SIZE - n_words)
            .find(|&start| self.words[start..start + n_words].iter().all(|word| !word.allocated))
            .ok_or(exhausted)?;

        for word in &mut self.words[start..start + n_words] {
            word.allocated = true;
            word.name = None;
        }

        Ok(start)
    }

    /// Releases a block. Values are left in place.
    pub fn free(&mut self, start: usize, n_words: usize) {
        let end = (start + n_words).min(MEMORY_SIZE);

        for word in &mut self.words[start.min(end)..end] {
            word.allocated = false;
            word.name = None;
        }
    }

    pub fn write(&mut self, index: usize, name: &str, value: &str) -> Result<()> {
        let word = self
            .words
            .get_mut(index)
            .ok_or(SimError::AddressOutOfRange { index })?;

        word.allocated = true;
        word.name = Some(truncate(name, MAX_NAME_LEN));
        word.value = truncate(value, MAX_VALUE_LEN);

        Ok(())
    }

    /// Value of the first word named `name` in the inclusive range `[low, high]`.
    pub fn read(&self, low: usize, high: usize, name: &str) -> Option<&str> {
        if low >= MEMORY_SIZE || low > high {
            return None;
        }

        self.words[low..=high.min(MEMORY_SIZE - 1)]
            .iter()
            .find(|word| word.name.as_deref() == Some(name))
            .map(|word| word.value.as_str())
    }

    pub fn read_from(&self, index: usize) -> Option<&MemoryWord> {
        self.words.get(index)
    }

    pub fn words(&self) -> &[MemoryWord] {
        &self.words
    }

    pub fn get_remaining_memory(&self) -> usize {
        self.words.iter().filter(|word| !word.allocated).count()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
