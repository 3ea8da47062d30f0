use std::io;

use tracing::trace;

use super::console::Console;
use crate::constants::{
    Address, Word, KEYBOARD_DATA, KEYBOARD_READY, KEYBOARD_STATUS, MEMORY_SIZE,
};

/// Holds the memory words of the computer.
///
/// It has 65536 words, so every [`Address`] is valid. Two of them are the
/// keyboard registers, see [`Memory::read`].
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    inner: Box<[Word]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            inner: vec![0; MEMORY_SIZE].into_boxed_slice(),
        }
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let used = self.inner.iter().filter(|w| **w != 0).count();
        write!(f, "Memory {{ {used} non-zero words }}")
    }
}

impl Memory {
    /// Get a word, without any device side effect
    #[must_use]
    pub fn get(&self, address: Address) -> Word {
        self.inner[usize::from(address)]
    }

    /// Set a word, without any device side effect
    pub fn set(&mut self, address: Address, value: Word) {
        self.inner[usize::from(address)] = value;
    }

    /// Read a word as the processor does.
    ///
    /// Reading the keyboard status register polls the console first: if a key
    /// is available, the status gets its ready bit set and the character is
    /// stored in the keyboard data register. Otherwise the status is cleared.
    ///
    /// # Errors
    ///
    /// Fails if a pending character could not be read from the console.
    pub fn read<C: Console + ?Sized>(
        &mut self,
        address: Address,
        console: &mut C,
    ) -> io::Result<Word> {
        if address == KEYBOARD_STATUS {
            if console.poll_key() {
                let key = console.read_byte()?;
                trace!(key, "Key available");
                self.set(KEYBOARD_STATUS, KEYBOARD_READY);
                self.set(KEYBOARD_DATA, Word::from(key));
            } else {
                self.set(KEYBOARD_STATUS, 0);
            }
        }

        Ok(self.get(address))
    }

    pub fn write(&mut self, address: Address, value: Word) {
        self.set(address, value);
    }

    /// Copy `words` to contiguous addresses starting at `origin`
    pub fn load(&mut self, origin: Address, words: &[Word]) {
        let mut address = origin;
        for word in words {
            self.set(address, *word);
            address = address.wrapping_add(1);
        }
    }
}
