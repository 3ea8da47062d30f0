use parse_display::Display;
use thiserror::Error;
use tracing::debug;

use super::{
    console::Console,
    registers::{Condition, Reg, Registers},
    Computer, ProcessorError,
};
use crate::codec;
use crate::constants::{Address, Word};

/// The 16 values of the opcode field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "UPPERCASE")]
#[repr(u16)]
pub enum Opcode {
    Br = 0b0000,
    Add = 0b0001,
    Ld = 0b0010,
    St = 0b0011,
    Jsr = 0b0100,
    And = 0b0101,
    Ldr = 0b0110,
    Str = 0b0111,
    /// Return from interrupt, not supported
    Rti = 0b1000,
    Not = 0b1001,
    Ldi = 0b1010,
    Sti = 0b1011,
    Jmp = 0b1100,
    /// Reserved
    Res = 0b1101,
    Lea = 0b1110,
    Trap = 0b1111,
}

impl Opcode {
    /// Opcode of an instruction word
    #[must_use]
    pub const fn of(word: Word) -> Self {
        match codec::OPCODE.get(word) {
            0b0000 => Self::Br,
            0b0001 => Self::Add,
            0b0010 => Self::Ld,
            0b0011 => Self::St,
            0b0100 => Self::Jsr,
            0b0101 => Self::And,
            0b0110 => Self::Ldr,
            0b0111 => Self::Str,
            0b1000 => Self::Rti,
            0b1001 => Self::Not,
            0b1010 => Self::Ldi,
            0b1011 => Self::Sti,
            0b1100 => Self::Jmp,
            0b1101 => Self::Res,
            0b1110 => Self::Lea,
            _ => Self::Trap,
        }
    }
}

/// System calls reachable through `TRAP`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "UPPERCASE")]
#[repr(u16)]
pub enum TrapVector {
    /// Read a character into R0, without echo
    Getc = 0x20,

    /// Write the character in R0
    Out = 0x21,

    /// Write the string pointed by R0, one character per word
    Puts = 0x22,

    /// Prompt for a character, echo it and store it in R0
    In = 0x23,

    /// Write the string pointed by R0, two characters per word
    Putsp = 0x24,

    /// Stop the machine
    Halt = 0x25,
}

impl TryFrom<Word> for TrapVector {
    type Error = DecodeError;

    fn try_from(value: Word) -> Result<Self, Self::Error> {
        match value {
            0x20 => Ok(Self::Getc),
            0x21 => Ok(Self::Out),
            0x22 => Ok(Self::Puts),
            0x23 => Ok(Self::In),
            0x24 => Ok(Self::Putsp),
            0x25 => Ok(Self::Halt),
            _ => Err(DecodeError::UnknownTrap(value)),
        }
    }
}

/// Second operand of `ADD` and `AND`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Operand {
    #[display("{0}")]
    Reg(Reg),

    /// A 5-bit signed immediate
    #[display("#{0}")]
    Imm(i16),
}

impl Operand {
    fn decode(word: Word) -> Self {
        if codec::IMM_FLAG.is_set(word) {
            Self::Imm(codec::IMM5.get_signed(word))
        } else {
            Self::Reg(Reg::from_bits(codec::SR2.get(word)))
        }
    }

    fn encode(self, word: Word) -> Word {
        match self {
            Self::Reg(reg) => codec::SR2.set(codec::IMM_FLAG.set_flag(word, false), reg.bits()),
            Self::Imm(imm) => codec::IMM5.set_signed(codec::IMM_FLAG.set_flag(word, true), imm),
        }
    }

    #[allow(clippy::cast_sign_loss)]
    fn value(self, registers: &Registers) -> Word {
        match self {
            Self::Reg(reg) => registers[reg],
            Self::Imm(imm) => imm as Word,
        }
    }
}

/// Where `JSR` jumps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum JsrTarget {
    /// `JSR`, relative to the incremented PC
    #[display("JSR #{0}")]
    Offset(i16),

    /// `JSRR`, address held in a register
    #[display("JSRR {0}")]
    Register(Reg),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("reserved opcode {0}")]
    ReservedOpcode(Opcode),

    #[error("unknown trap vector {0:#04x}")]
    UnknownTrap(Word),
}

/// A decoded instruction. Offsets are already sign-extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Instruction {
    /// Branch if any of the `nzp` condition codes is set
    #[display("BR{nzp} #{offset}")]
    Br { nzp: Condition, offset: i16 },

    #[display("ADD {dr}, {sr1}, {operand}")]
    Add { dr: Reg, sr1: Reg, operand: Operand },

    /// Load a word at a PC-relative address
    #[display("LD {dr}, #{offset}")]
    Ld { dr: Reg, offset: i16 },

    /// Store a register at a PC-relative address
    #[display("ST {sr}, #{offset}")]
    St { sr: Reg, offset: i16 },

    /// Save the return address in R7 and call a subroutine
    #[display("{0}")]
    Jsr(JsrTarget),

    #[display("AND {dr}, {sr1}, {operand}")]
    And { dr: Reg, sr1: Reg, operand: Operand },

    /// Load a word at a register-relative address
    #[display("LDR {dr}, {base}, #{offset}")]
    Ldr { dr: Reg, base: Reg, offset: i16 },

    /// Store a register at a register-relative address
    #[display("STR {sr}, {base}, #{offset}")]
    Str { sr: Reg, base: Reg, offset: i16 },

    /// Bitwise complement
    #[display("NOT {dr}, {sr}")]
    Not { dr: Reg, sr: Reg },

    /// Load through a pointer stored at a PC-relative address
    #[display("LDI {dr}, #{offset}")]
    Ldi { dr: Reg, offset: i16 },

    /// Store through a pointer stored at a PC-relative address
    #[display("STI {sr}, #{offset}")]
    Sti { sr: Reg, offset: i16 },

    /// Unconditional jump. `JMP R7` is the usual return from subroutine.
    #[display("JMP {base}")]
    Jmp { base: Reg },

    /// Load a PC-relative address
    #[display("LEA {dr}, #{offset}")]
    Lea { dr: Reg, offset: i16 },

    #[display("TRAP {0}")]
    Trap(TrapVector),
}

impl Instruction {
    /// Decode an instruction word
    ///
    /// # Errors
    ///
    /// Fails on the reserved opcodes (`RTI` and the unnamed one) and on trap
    /// vectors with no system call behind them.
    pub fn decode(word: Word) -> Result<Self, DecodeError> {
        use Instruction as I;

        let dr = Reg::from_bits(codec::DR.get(word));
        let sr1 = Reg::from_bits(codec::SR1.get(word));
        let pc_offset = codec::PC_OFFSET9.get_signed(word);

        let instruction = match Opcode::of(word) {
            Opcode::Br => I::Br {
                nzp: Condition::from_bits_truncate(codec::NZP.get(word)),
                offset: pc_offset,
            },
            Opcode::Add => I::Add {
                dr,
                sr1,
                operand: Operand::decode(word),
            },
            Opcode::Ld => I::Ld {
                dr,
                offset: pc_offset,
            },
            Opcode::St => I::St {
                sr: dr,
                offset: pc_offset,
            },
            Opcode::Jsr => I::Jsr(if codec::JSR_RELATIVE.is_set(word) {
                JsrTarget::Offset(codec::PC_OFFSET11.get_signed(word))
            } else {
                JsrTarget::Register(sr1)
            }),
            Opcode::And => I::And {
                dr,
                sr1,
                operand: Operand::decode(word),
            },
            Opcode::Ldr => I::Ldr {
                dr,
                base: sr1,
                offset: codec::OFFSET6.get_signed(word),
            },
            Opcode::Str => I::Str {
                sr: dr,
                base: sr1,
                offset: codec::OFFSET6.get_signed(word),
            },
            Opcode::Not => I::Not { dr, sr: sr1 },
            Opcode::Ldi => I::Ldi {
                dr,
                offset: pc_offset,
            },
            Opcode::Sti => I::Sti {
                sr: dr,
                offset: pc_offset,
            },
            Opcode::Jmp => I::Jmp { base: sr1 },
            Opcode::Lea => I::Lea {
                dr,
                offset: pc_offset,
            },
            Opcode::Trap => I::Trap(TrapVector::try_from(codec::TRAP_VECTOR.get(word))?),
            opcode @ (Opcode::Rti | Opcode::Res) => {
                return Err(DecodeError::ReservedOpcode(opcode));
            }
        };

        Ok(instruction)
    }

    /// Encode the instruction back to a word.
    ///
    /// Offsets and immediates are truncated to the width of their field.
    #[must_use]
    pub fn encode(&self) -> Word {
        use codec::{BASE, DR, NZP, OFFSET6, PC_OFFSET11, PC_OFFSET9, SR1};
        use Instruction as I;

        let word = codec::OPCODE.set(0, self.opcode() as Word);
        match *self {
            I::Br { nzp, offset } => PC_OFFSET9.set_signed(NZP.set(word, nzp.bits()), offset),
            I::Add { dr, sr1, operand } | I::And { dr, sr1, operand } => {
                operand.encode(SR1.set(DR.set(word, dr.bits()), sr1.bits()))
            }
            I::Ld { dr: reg, offset }
            | I::St { sr: reg, offset }
            | I::Ldi { dr: reg, offset }
            | I::Sti { sr: reg, offset }
            | I::Lea { dr: reg, offset } => PC_OFFSET9.set_signed(DR.set(word, reg.bits()), offset),
            I::Jsr(JsrTarget::Offset(offset)) => {
                PC_OFFSET11.set_signed(codec::JSR_RELATIVE.set_flag(word, true), offset)
            }
            I::Jsr(JsrTarget::Register(base)) | I::Jmp { base } => BASE.set(word, base.bits()),
            I::Ldr {
                dr: reg,
                base,
                offset,
            }
            | I::Str {
                sr: reg,
                base,
                offset,
            } => OFFSET6.set_signed(BASE.set(DR.set(word, reg.bits()), base.bits()), offset),
            // The unused offset field of NOT is all ones
            I::Not { dr, sr } => OFFSET6.set(SR1.set(DR.set(word, dr.bits()), sr.bits()), OFFSET6.mask()),
            I::Trap(vector) => codec::TRAP_VECTOR.set(word, vector as Word),
        }
    }

    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Br { .. } => Opcode::Br,
            Self::Add { .. } => Opcode::Add,
            Self::Ld { .. } => Opcode::Ld,
            Self::St { .. } => Opcode::St,
            Self::Jsr(_) => Opcode::Jsr,
            Self::And { .. } => Opcode::And,
            Self::Ldr { .. } => Opcode::Ldr,
            Self::Str { .. } => Opcode::Str,
            Self::Not { .. } => Opcode::Not,
            Self::Ldi { .. } => Opcode::Ldi,
            Self::Sti { .. } => Opcode::Sti,
            Self::Jmp { .. } => Opcode::Jmp,
            Self::Lea { .. } => Opcode::Lea,
            Self::Trap(_) => Opcode::Trap,
        }
    }

    /// Whether executing the instruction recomputes the condition codes
    #[must_use]
    pub const fn sets_flags(&self) -> bool {
        matches!(
            self,
            Self::Add { .. }
                | Self::And { .. }
                | Self::Ld { .. }
                | Self::Ldi { .. }
                | Self::Ldr { .. }
                | Self::Lea { .. }
                | Self::Not { .. }
        )
    }

    /// Execute the instruction.
    ///
    /// The PC must already point past the instruction.
    #[tracing::instrument(skip(computer), level = "trace")]
    pub(crate) fn execute<C: Console>(
        &self,
        computer: &mut Computer<C>,
    ) -> Result<(), ProcessorError> {
        use Instruction as I;

        let pc = computer.registers.pc;
        let relative = |offset: i16| -> Address { pc.wrapping_add_signed(offset) };

        // Value written to a destination register, if any
        let written = match *self {
            I::Br { nzp, offset } => {
                if nzp.intersects(computer.registers.cond) {
                    let target = relative(offset);
                    debug!("Branching to address {:#06x}", target);
                    computer.registers.pc = target;
                }
                None
            }

            I::Add { dr, sr1, operand } => {
                let a = computer.registers[sr1];
                let b = operand.value(&computer.registers);
                let res = a.wrapping_add(b);
                debug!("{:#06x} + {:#06x} = {:#06x}", a, b, res);
                Some((dr, res))
            }

            I::And { dr, sr1, operand } => {
                let a = computer.registers[sr1];
                let b = operand.value(&computer.registers);
                let res = a & b;
                debug!("{:#06x} & {:#06x} = {:#06x}", a, b, res);
                Some((dr, res))
            }

            I::Ld { dr, offset } => Some((dr, computer.read(relative(offset))?)),

            I::St { sr, offset } => {
                computer.write(relative(offset), computer.registers[sr]);
                None
            }

            I::Jsr(target) => {
                // The target is resolved before R7 gets overwritten, so `JSRR R7` works
                let address = match target {
                    JsrTarget::Offset(offset) => relative(offset),
                    JsrTarget::Register(base) => computer.registers[base],
                };
                computer.registers[Reg::R7] = pc;
                debug!("Calling subroutine at {:#06x}", address);
                computer.registers.pc = address;
                None
            }

            I::Ldr { dr, base, offset } => {
                let address = computer.registers[base].wrapping_add_signed(offset);
                Some((dr, computer.read(address)?))
            }

            I::Str { sr, base, offset } => {
                let address = computer.registers[base].wrapping_add_signed(offset);
                computer.write(address, computer.registers[sr]);
                None
            }

            I::Not { dr, sr } => Some((dr, !computer.registers[sr])),

            I::Ldi { dr, offset } => {
                let pointer = computer.read(relative(offset))?;
                Some((dr, computer.read(pointer)?))
            }

            I::Sti { sr, offset } => {
                let pointer = computer.read(relative(offset))?;
                computer.write(pointer, computer.registers[sr]);
                None
            }

            I::Jmp { base } => {
                let address = computer.registers[base];
                debug!("Jumping to address {:#06x}", address);
                computer.registers.pc = address;
                None
            }

            I::Lea { dr, offset } => Some((dr, relative(offset))),

            I::Trap(vector) => {
                computer.trap(vector)?;
                None
            }
        };

        if let Some((dr, value)) = written {
            computer.registers[dr] = value;
            if self.sets_flags() {
                computer.registers.set_flags(dr);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::codec::format_bits;
    use crate::runtime::BufferedConsole;

    fn any_reg() -> impl Strategy<Value = Reg> {
        (0u16..8).prop_map(Reg::from_bits)
    }

    fn any_operand() -> impl Strategy<Value = Operand> {
        prop_oneof![
            any_reg().prop_map(Operand::Reg),
            (-16i16..=15).prop_map(Operand::Imm),
        ]
    }

    fn any_trap() -> impl Strategy<Value = TrapVector> {
        prop_oneof![
            Just(TrapVector::Getc),
            Just(TrapVector::Out),
            Just(TrapVector::Puts),
            Just(TrapVector::In),
            Just(TrapVector::Putsp),
            Just(TrapVector::Halt),
        ]
    }

    fn any_instruction() -> impl Strategy<Value = Instruction> {
        use Instruction as I;

        let offset9 = -256i16..=255;
        let offset6 = -32i16..=31;
        prop_oneof![
            (0u16..8, offset9.clone()).prop_map(|(nzp, offset)| I::Br {
                nzp: Condition::from_bits_truncate(nzp),
                offset
            }),
            (any_reg(), any_reg(), any_operand())
                .prop_map(|(dr, sr1, operand)| I::Add { dr, sr1, operand }),
            (any_reg(), any_reg(), any_operand())
                .prop_map(|(dr, sr1, operand)| I::And { dr, sr1, operand }),
            (any_reg(), offset9.clone()).prop_map(|(dr, offset)| I::Ld { dr, offset }),
            (any_reg(), offset9.clone()).prop_map(|(sr, offset)| I::St { sr, offset }),
            (any_reg(), offset9.clone()).prop_map(|(dr, offset)| I::Ldi { dr, offset }),
            (any_reg(), offset9.clone()).prop_map(|(sr, offset)| I::Sti { sr, offset }),
            (any_reg(), offset9).prop_map(|(dr, offset)| I::Lea { dr, offset }),
            (-1024i16..=1023).prop_map(|offset| I::Jsr(JsrTarget::Offset(offset))),
            any_reg().prop_map(|base| I::Jsr(JsrTarget::Register(base))),
            (any_reg(), any_reg(), offset6.clone())
                .prop_map(|(dr, base, offset)| I::Ldr { dr, base, offset }),
            (any_reg(), any_reg(), offset6)
                .prop_map(|(sr, base, offset)| I::Str { sr, base, offset }),
            (any_reg(), any_reg()).prop_map(|(dr, sr)| I::Not { dr, sr }),
            any_reg().prop_map(|base| I::Jmp { base }),
            any_trap().prop_map(I::Trap),
        ]
    }

    proptest! {
        #[test]
        fn instruction_roundtrip(instruction in any_instruction()) {
            let word = instruction.encode();
            prop_assert_eq!(Opcode::of(word), instruction.opcode());
            prop_assert_eq!(Instruction::decode(word), Ok(instruction));
        }

        #[test]
        fn decode_never_panics(word in any::<u16>()) {
            match Instruction::decode(word) {
                Ok(instruction) => prop_assert_eq!(instruction.opcode(), Opcode::of(word)),
                Err(DecodeError::ReservedOpcode(opcode)) => {
                    prop_assert!(matches!(opcode, Opcode::Rti | Opcode::Res));
                }
                Err(DecodeError::UnknownTrap(vector)) => {
                    prop_assert_eq!(Opcode::of(word), Opcode::Trap);
                    prop_assert!(!(0x20..=0x25).contains(&vector));
                }
            }
        }
    }

    #[test]
    fn encode_bits_test() {
        use Instruction as I;

        let cases = [
            (
                I::Br {
                    nzp: Condition::NEGATIVE,
                    offset: -7,
                },
                "0000 1001 1111 1001",
            ),
            (
                I::Add {
                    dr: Reg::R3,
                    sr1: Reg::R5,
                    operand: Operand::Reg(Reg::R7),
                },
                "0001 0111 0100 0111",
            ),
            (
                I::Add {
                    dr: Reg::R5,
                    sr1: Reg::R3,
                    operand: Operand::Imm(-15),
                },
                "0001 1010 1111 0001",
            ),
            (
                I::Str {
                    sr: Reg::R2,
                    base: Reg::R3,
                    offset: -29,
                },
                "0111 0100 1110 0011",
            ),
            (
                I::Not {
                    dr: Reg::R5,
                    sr: Reg::R4,
                },
                "1001 1011 0011 1111",
            ),
            (
                I::Lea {
                    dr: Reg::R1,
                    offset: -195,
                },
                "1110 0011 0011 1101",
            ),
            (
                I::Jsr(JsrTarget::Register(Reg::R6)),
                "0100 0001 1000 0000",
            ),
            (I::Jmp { base: Reg::R7 }, "1100 0001 1100 0000"),
            (I::Trap(TrapVector::Halt), "1111 0000 0010 0101"),
        ];

        for (instruction, bits) in cases {
            assert_eq!(format_bits(instruction.encode()), bits, "{instruction}");
        }
    }

    #[test]
    fn decode_reserved_test() {
        assert_eq!(
            Instruction::decode(0x8000),
            Err(DecodeError::ReservedOpcode(Opcode::Rti))
        );
        assert_eq!(
            Instruction::decode(0xD123),
            Err(DecodeError::ReservedOpcode(Opcode::Res))
        );
        assert_eq!(
            Instruction::decode(0xF0FF),
            Err(DecodeError::UnknownTrap(0xFF))
        );
    }

    #[test]
    fn display_test() {
        let program = [0x1025, 0x0BFD, 0x5260, 0x6E7F, 0x4801, 0xC1C0, 0xE1FE, 0xF022];
        let listing: Vec<String> = program
            .into_iter()
            .map(|word| Instruction::decode(word).unwrap().to_string())
            .collect();

        insta::assert_snapshot!(listing.join("\n"), @r"
        ADD R0, R0, #5
        BRnp #-3
        AND R1, R1, #0
        LDR R7, R1, #-1
        JSR #1
        JMP R7
        LEA R0, #-2
        TRAP PUTS
        ");
    }

    #[test]
    fn sets_flags_test() {
        use Instruction as I;

        let instructions = [
            I::Add {
                dr: Reg::R0,
                sr1: Reg::R1,
                operand: Operand::Imm(-1),
            },
            I::And {
                dr: Reg::R0,
                sr1: Reg::R1,
                operand: Operand::Reg(Reg::R1),
            },
            I::Not {
                dr: Reg::R0,
                sr: Reg::R1,
            },
            I::Ld {
                dr: Reg::R0,
                offset: 0,
            },
            I::Ldi {
                dr: Reg::R0,
                offset: 0,
            },
            I::Ldr {
                dr: Reg::R0,
                base: Reg::R1,
                offset: 0,
            },
            I::Lea {
                dr: Reg::R0,
                offset: 0,
            },
            I::St {
                sr: Reg::R0,
                offset: 0,
            },
            I::Sti {
                sr: Reg::R0,
                offset: 0,
            },
            I::Str {
                sr: Reg::R0,
                base: Reg::R1,
                offset: 0,
            },
            I::Jsr(JsrTarget::Offset(0)),
            I::Jmp { base: Reg::R1 },
            I::Br {
                nzp: Condition::all(),
                offset: 0,
            },
        ];

        for instruction in instructions {
            let mut computer = Computer::new(BufferedConsole::new());
            computer.registers.pc = 0x3000;
            computer.registers[Reg::R1] = 0x4000;
            computer.memory.set(0x3000, 0x4000);
            computer.memory.set(0x4000, 0x1234);

            instruction.execute(&mut computer).unwrap();
            assert_eq!(
                !computer.registers.cond.is_empty(),
                instruction.sets_flags(),
                "{instruction}"
            );
        }
    }
}
