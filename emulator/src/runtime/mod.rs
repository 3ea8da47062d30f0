use std::io;

use thiserror::Error;
use tracing::{debug, info, trace};

use crate::codec::format_bits;
use crate::constants::{Address, Word};
use crate::image::Image;

mod console;
mod instructions;
mod memory;
mod registers;
mod traps;

pub use self::console::{BufferedConsole, Console};
pub use self::instructions::{DecodeError, Instruction, JsrTarget, Opcode, Operand, TrapVector};
pub use self::memory::Memory;
pub use self::registers::{Condition, Reg, Registers};

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("could not decode instruction {word:#06x} at address {address:#06x}")]
    Decode {
        address: Address,
        word: Word,
        #[source]
        source: DecodeError,
    },

    #[error("console I/O failed")]
    Io(#[source] io::Error),

    #[error("execution interrupted")]
    Interrupted,
}

// An interrupted console read is how an external interrupt shows up while waiting for input
impl From<io::Error> for ProcessorError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::Interrupted {
            Self::Interrupted
        } else {
            Self::Io(e)
        }
    }
}

type Result<T> = std::result::Result<T, ProcessorError>;

/// Whether the machine still executes instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Alive,

    /// Reached through the `HALT` trap only. There is no way back.
    Dead,
}

pub struct Computer<C> {
    pub registers: Registers,
    pub memory: Memory,
    pub status: Status,

    /// Number of instructions executed so far
    pub steps: usize,

    console: C,
}

impl<C> std::fmt::Debug for Computer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Computer {{ registers: {:?}, status: {:?}, memory: [...] }}",
            self.registers, self.status
        )
    }
}

impl<C: Console> Computer<C> {
    /// A computer with zeroed registers and memory.
    ///
    /// No condition code is set until an instruction writes a register, so
    /// even `BRnzp` falls through before that.
    #[must_use]
    pub fn new(console: C) -> Self {
        Self {
            registers: Registers::default(),
            memory: Memory::default(),
            status: Status::Alive,
            steps: 0,
            console,
        }
    }

    /// A computer with a program loaded, ready to execute its first word
    #[must_use]
    pub fn with_image(image: &Image, console: C) -> Self {
        let mut computer = Self::new(console);
        computer.memory.load(image.origin, &image.words);
        computer.registers.pc = image.origin;
        debug!(
            origin = image.origin,
            words = image.words.len(),
            "Loaded program"
        );
        computer
    }

    #[must_use]
    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    #[must_use]
    pub fn into_console(self) -> C {
        self.console
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == Status::Alive
    }

    /// Read memory as the processor does, with the keyboard side effects
    pub(crate) fn read(&mut self, address: Address) -> Result<Word> {
        Ok(self.memory.read(address, &mut self.console)?)
    }

    pub(crate) fn write(&mut self, address: Address, value: Word) {
        trace!(address, value, "Writing memory");
        self.memory.write(address, value);
    }

    #[tracing::instrument(skip(self), err, level = "trace")]
    fn decode_instruction(&mut self) -> Result<Instruction> {
        let address = self.registers.pc;
        let word = self.read(address)?;
        self.registers.pc = address.wrapping_add(1);
        trace!(address, bits = %format_bits(word), "Fetched instruction");
        Instruction::decode(word).map_err(|source| ProcessorError::Decode {
            address,
            word,
            source,
        })
    }

    /// Fetch, decode and execute one instruction.
    ///
    /// Does nothing once the machine is halted.
    ///
    /// # Errors
    ///
    /// Fails if the instruction cannot be decoded, on console errors and when
    /// interrupted while waiting for input.
    pub fn step(&mut self) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        let inst = self.decode_instruction()?;
        debug!("Executing instruction \"{}\"", inst);
        inst.execute(self)?;
        self.steps += 1;
        trace!("Register state {}", self.registers);
        Ok(())
    }

    /// Run until the program halts.
    ///
    /// # Errors
    ///
    /// Stops at the first error, see [`Computer::step`], or with
    /// [`ProcessorError::Interrupted`] when the console reports an interrupt.
    #[tracing::instrument(skip(self))]
    pub fn run(&mut self) -> Result<()> {
        info!(pc = self.registers.pc, "Starting execution");
        while self.is_running() {
            if self.console.interrupted() {
                return Err(ProcessorError::Interrupted);
            }
            self.step()?;
        }
        info!(steps = self.steps, "Machine halted");
        Ok(())
    }
}
