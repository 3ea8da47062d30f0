//! System calls, executed natively instead of through a trap table in memory.

use tracing::debug;

use super::{
    console::Console, instructions::TrapVector, registers::Reg, Computer, ProcessorError, Status,
};
use crate::constants::{Address, Word, MEMORY_SIZE};

const IN_PROMPT: &[u8] = b"Enter a character: ";
const HALT_NOTICE: &[u8] = b"HALT\n";

/// Low byte of a word, where characters live
fn low_byte(word: Word) -> u8 {
    word.to_le_bytes()[0]
}

impl<C: Console> Computer<C> {
    #[tracing::instrument(skip(self), level = "debug")]
    pub(crate) fn trap(&mut self, vector: TrapVector) -> Result<(), ProcessorError> {
        match vector {
            TrapVector::Getc => {
                let key = self.console.read_byte()?;
                debug!(key, "Read character");
                self.registers[Reg::R0] = Word::from(key);
            }

            TrapVector::Out => {
                self.console
                    .write_bytes(&[low_byte(self.registers[Reg::R0])])?;
                self.console.flush()?;
            }

            TrapVector::Puts => {
                let bytes: Vec<u8> = self.string_at(self.registers[Reg::R0]).map(low_byte).collect();
                self.console.write_bytes(&bytes)?;
                self.console.flush()?;
            }

            TrapVector::In => {
                self.console.write_bytes(IN_PROMPT)?;
                self.console.flush()?;
                let key = self.console.read_byte()?;
                self.console.write_bytes(&[key])?;
                self.console.flush()?;
                self.registers[Reg::R0] = Word::from(key);
            }

            TrapVector::Putsp => {
                let mut bytes = Vec::new();
                for word in self.string_at(self.registers[Reg::R0]) {
                    let [low, high] = word.to_le_bytes();
                    bytes.push(low);
                    if high != 0 {
                        bytes.push(high);
                    }
                }
                self.console.write_bytes(&bytes)?;
                self.console.flush()?;
            }

            TrapVector::Halt => {
                self.console.write_bytes(HALT_NOTICE)?;
                self.console.flush()?;
                self.status = Status::Dead;
            }
        }

        Ok(())
    }

    /// Words starting at `start`, up to (excluding) the first zero word.
    ///
    /// The scan gives up after going once around the whole address space.
    fn string_at(&self, start: Address) -> impl Iterator<Item = Word> + '_ {
        (0..MEMORY_SIZE)
            .scan(start, |address, _| {
                let word = self.memory.get(*address);
                *address = address.wrapping_add(1);
                Some(word)
            })
            .take_while(|word| *word != 0)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::constants::PROGRAM_START;
    use crate::image::Image;
    use crate::runtime::{BufferedConsole, Instruction, Operand};

    fn trap(vector: TrapVector) -> Word {
        Instruction::Trap(vector).encode()
    }

    fn computer_with(words: &[Word], input: &str) -> Computer<BufferedConsole> {
        let image = Image::new(PROGRAM_START, words.to_vec());
        Computer::with_image(&image, BufferedConsole::with_input(input))
    }

    fn chars(text: &str) -> Vec<Word> {
        text.bytes().map(Word::from).collect()
    }

    #[test]
    fn puts_test() {
        let mut computer = computer_with(&[trap(TrapVector::Puts)], "");
        computer.memory.load(0x4000, &[Word::from(b'H'), Word::from(b'I'), 0, Word::from(b'!')]);
        computer.registers[Reg::R0] = 0x4000;

        computer.step().unwrap();
        assert_eq!(computer.console().output(), b"HI");
        assert!(computer.registers.cond.is_empty(), "traps do not set flags");
    }

    #[test]
    fn puts_uses_low_byte_test() {
        let mut computer = computer_with(&[trap(TrapVector::Puts)], "");
        computer.memory.load(0x4000, &[0xFF41, 0x0142, 0]);
        computer.registers[Reg::R0] = 0x4000;

        computer.step().unwrap();
        assert_eq!(computer.console().output(), b"AB");
    }

    #[test]
    fn putsp_test() {
        let mut computer = computer_with(&[trap(TrapVector::Putsp)], "");
        // "Hello" packed two characters per word, low byte first
        computer
            .memory
            .load(0x5000, &[0x6548, 0x6C6C, 0x006F, 0, 0x2121]);
        computer.registers[Reg::R0] = 0x5000;

        computer.step().unwrap();
        assert_eq!(computer.console().output_string(), "Hello");
    }

    #[test]
    fn out_test() {
        let mut computer = computer_with(&[trap(TrapVector::Out), trap(TrapVector::Out)], "");
        computer.registers[Reg::R0] = 0x1241;

        computer.step().unwrap();
        computer.registers[Reg::R0] = Word::from(b'\n');
        computer.step().unwrap();
        assert_eq!(computer.console().output(), b"A\n");
    }

    #[test]
    fn getc_test() {
        let mut computer = computer_with(&[trap(TrapVector::Getc)], "z");

        computer.step().unwrap();
        assert_eq!(computer.registers[Reg::R0], Word::from(b'z'));
        assert!(computer.console().output().is_empty(), "GETC does not echo");
    }

    #[test]
    fn getc_without_input_test() {
        let mut computer = computer_with(&[trap(TrapVector::Getc)], "");

        let err = computer.step().unwrap_err();
        assert!(matches!(err, ProcessorError::Io(_)));
    }

    #[test]
    fn in_test() {
        let mut computer = computer_with(&[trap(TrapVector::In)], "q");

        computer.step().unwrap();
        assert_eq!(computer.registers[Reg::R0], Word::from(b'q'));
        assert_eq!(computer.console().output_string(), "Enter a character: q");
    }

    #[test]
    fn echo_program_test() {
        // Read two characters, print them back with a greeting, then halt
        let mut program = vec![
            trap(TrapVector::In),
            trap(TrapVector::Out),
            trap(TrapVector::Getc),
            trap(TrapVector::Out),
            Instruction::Lea {
                dr: Reg::R0,
                offset: 3,
            }
            .encode(),
            trap(TrapVector::Puts),
            trap(TrapVector::Halt),
            // Never executed
            Instruction::Add {
                dr: Reg::R1,
                sr1: Reg::R1,
                operand: Operand::Imm(1),
            }
            .encode(),
        ];
        program.extend(chars("\nbye\n"));
        program.push(0);

        let mut computer = computer_with(&program, "ab");
        computer.run().unwrap();

        assert_eq!(computer.status, Status::Dead);
        assert_eq!(computer.registers[Reg::R1], 0);
        assert_eq!(
            computer.console().output_string(),
            indoc! {"
                Enter a character: aab
                bye
                HALT
            "}
        );
    }
}
