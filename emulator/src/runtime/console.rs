//! Character I/O seen by the machine.
//!
//! The keyboard registers and the console traps go through the [`Console`]
//! trait. Setting up the actual terminal is left to the embedder.

use std::collections::VecDeque;
use std::io;

pub trait Console {
    /// Check, without blocking, whether a byte can be read
    fn poll_key(&mut self) -> bool;

    /// Read one byte, blocking until one is available.
    ///
    /// # Errors
    ///
    /// An error of kind [`io::ErrorKind::Interrupted`] means an external interrupt was
    /// requested while waiting. Any other error is an I/O failure.
    fn read_byte(&mut self) -> io::Result<u8>;

    /// Write raw bytes to the output
    ///
    /// # Errors
    ///
    /// Fails if the underlying output does.
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// # Errors
    ///
    /// Fails if the underlying output does.
    fn flush(&mut self) -> io::Result<()>;

    /// Whether an external interrupt was requested
    fn interrupted(&self) -> bool {
        false
    }
}

impl<C: Console + ?Sized> Console for &mut C {
    fn poll_key(&mut self) -> bool {
        (**self).poll_key()
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        (**self).read_byte()
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_bytes(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn interrupted(&self) -> bool {
        (**self).interrupted()
    }
}

/// A console backed by memory buffers
///
/// Input is consumed from a queue filled up-front, and everything written is
/// kept in [`BufferedConsole::output`].
#[derive(Debug, Default, Clone)]
pub struct BufferedConsole {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl BufferedConsole {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a console with some pending input
    #[must_use]
    pub fn with_input(input: impl AsRef<[u8]>) -> Self {
        Self {
            input: input.as_ref().iter().copied().collect(),
            output: Vec::new(),
        }
    }

    /// Queue more input bytes
    pub fn push_input(&mut self, input: impl AsRef<[u8]>) {
        self.input.extend(input.as_ref());
    }

    /// Everything written so far
    #[must_use]
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Everything written so far, lossily decoded as UTF-8
    #[must_use]
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Number of input bytes not consumed yet
    #[must_use]
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }
}

impl Console for BufferedConsole {
    fn poll_key(&mut self) -> bool {
        !self.input.is_empty()
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        self.input
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no more input"))
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.output.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
