//! Plumbing between the machine console and the controlling terminal.
//!
//! Programs read keys one at a time, so stdin is switched out of canonical
//! mode for the duration of a run. Reads go straight to a duplicate of the
//! stdin descriptor: going through [`std::io::Stdin`] would buffer input that
//! `select` can no longer see.

use std::fs::File;
use std::io::{self, IsTerminal, Read, Stdout, Write};
use std::os::fd::AsFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lc3_emulator::runtime::Console;
use nix::sys::select::{select, FdSet};
use nix::sys::termios::{tcgetattr, tcsetattr, LocalFlags, SetArg, Termios};
use nix::sys::time::{TimeVal, TimeValLike};
use signal_hook::consts::SIGINT;
use tracing::{debug, warn};

/// How long a blocking read sleeps before looking at the interrupt flag again
const READ_SLICE_MS: i64 = 100;

/// Install a SIGINT handler that raises the returned flag
pub fn register_interrupt() -> io::Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&flag))?;
    Ok(flag)
}

/// Keeps stdin unbuffered and silent while alive, and restores it on drop.
///
/// When stdin is not a terminal (a pipe, a file) this does nothing.
pub struct RawMode {
    original: Option<Termios>,
}

impl RawMode {
    pub fn enable() -> nix::Result<Self> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            debug!("stdin is not a terminal, leaving it untouched");
            return Ok(Self { original: None });
        }

        let original = tcgetattr(stdin.as_fd())?;
        let mut raw = original.clone();
        raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
        tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &raw)?;
        debug!("Switched terminal to raw input");

        Ok(Self {
            original: Some(original),
        })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let Some(original) = self.original.take() else {
            return;
        };

        match tcsetattr(io::stdin().as_fd(), SetArg::TCSANOW, &original) {
            Ok(()) => debug!("Restored terminal settings"),
            Err(e) => warn!(error = %e, "Could not restore terminal settings"),
        }
    }
}

/// A [`Console`] backed by the process' stdin and stdout
pub struct TerminalConsole {
    input: File,
    stdout: Stdout,
    interrupt: Arc<AtomicBool>,

    /// Byte read by a poll, handed out by the next read
    lookahead: Option<u8>,

    /// Input reached end of file, no key will ever be available
    closed: bool,
}

impl TerminalConsole {
    pub fn new(interrupt: Arc<AtomicBool>) -> io::Result<Self> {
        let stdin = io::stdin().as_fd().try_clone_to_owned()?;
        Ok(Self::with_input(File::from(stdin), interrupt))
    }

    /// A console reading keys from `input` instead of stdin
    fn with_input(input: File, interrupt: Arc<AtomicBool>) -> Self {
        Self {
            input,
            stdout: io::stdout(),
            interrupt,
            lookahead: None,
            closed: false,
        }
    }

    /// Whether the input becomes readable within `timeout`
    fn wait_for_input(&self, timeout: &mut TimeVal) -> bool {
        let mut fds = FdSet::new();
        fds.insert(self.input.as_fd());
        // A signal landing during the wait shows up as EINTR, treated as "nothing yet"
        matches!(select(None, &mut fds, None, None, timeout), Ok(ready) if ready > 0)
    }

    /// Read the byte `select` announced. `None` at end of file.
    fn read_ready(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0; 1];
        if self.input.read(&mut buf)? == 0 {
            debug!("Input is closed");
            self.closed = true;
            return Ok(None);
        }
        Ok(Some(buf[0]))
    }
}

impl Console for TerminalConsole {
    fn poll_key(&mut self) -> bool {
        if self.lookahead.is_some() {
            return true;
        }
        if self.closed || !self.wait_for_input(&mut TimeVal::zero()) {
            return false;
        }

        // A readable descriptor may only mean end of file
        match self.read_ready() {
            Ok(key) => {
                self.lookahead = key;
                key.is_some()
            }
            Err(e) => {
                warn!(error = %e, "Could not poll input");
                false
            }
        }
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        if let Some(key) = self.lookahead.take() {
            return Ok(key);
        }

        // Prompts must be visible before blocking on the answer
        self.stdout.flush()?;

        loop {
            if self.interrupted() {
                return Err(io::ErrorKind::Interrupted.into());
            }
            if self.closed {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "standard input is closed",
                ));
            }

            if self.wait_for_input(&mut TimeVal::milliseconds(READ_SLICE_MS)) {
                if let Some(key) = self.read_ready()? {
                    return Ok(key);
                }
            }
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stdout.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }
}
