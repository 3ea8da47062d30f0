use std::ops::{Index, IndexMut};

use bitflags::bitflags;
use parse_display::Display;

use crate::constants::{Address, Word};

bitflags! {
    /// Condition codes, as set by the last instruction that wrote a register
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct Condition: Word {
        const POSITIVE = 0b001;
        const ZERO     = 0b010;
        const NEGATIVE = 0b100;
    }
}

impl Condition {
    /// Condition flag describing a freshly written value
    #[must_use]
    pub const fn from_value(value: Word) -> Self {
        if value == 0 {
            Self::ZERO
        } else if value >> 15 == 1 {
            Self::NEGATIVE
        } else {
            Self::POSITIVE
        }
    }
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#05b}", self.bits())
    }
}

/// Shown as the `nzp` letters of the set flags, like in `BRnz`
impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (flag, letter) in [
            (Self::NEGATIVE, 'n'),
            (Self::ZERO, 'z'),
            (Self::POSITIVE, 'p'),
        ] {
            if self.contains(flag) {
                write!(f, "{letter}")?;
            }
        }
        Ok(())
    }
}

/// General purpose register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Reg {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    /// Holds the return address of `JSR`
    R7,
}

impl Reg {
    pub const ALL: [Reg; 8] = [
        Reg::R0,
        Reg::R1,
        Reg::R2,
        Reg::R3,
        Reg::R4,
        Reg::R5,
        Reg::R6,
        Reg::R7,
    ];

    /// Register designated by a 3-bit field. Upper bits are ignored.
    #[must_use]
    pub const fn from_bits(bits: Word) -> Self {
        Self::ALL[(bits & 0b111) as usize]
    }

    #[must_use]
    pub const fn bits(self) -> Word {
        self as Word
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registers {
    /// R0 to R7
    pub general: [Word; 8],

    /// Program counter, points to the next instruction to fetch
    pub pc: Address,

    /// Condition codes
    pub cond: Condition,
}

impl Registers {
    /// Recompute the condition codes from the value held by `reg`
    pub fn set_flags(&mut self, reg: Reg) {
        self.cond = Condition::from_value(self[reg]);
    }

    /// Write a register and update the condition codes accordingly
    pub fn set_with_flags(&mut self, reg: Reg, value: Word) {
        self[reg] = value;
        self.set_flags(reg);
    }
}

impl Index<Reg> for Registers {
    type Output = Word;

    fn index(&self, reg: Reg) -> &Self::Output {
        &self.general[reg as usize]
    }
}

impl IndexMut<Reg> for Registers {
    fn index_mut(&mut self, reg: Reg) -> &mut Self::Output {
        &mut self.general[reg as usize]
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (reg, value) in Reg::ALL.iter().zip(self.general) {
            write!(f, "{reg} = {value:#06x} | ")?;
        }
        write!(f, "PC = {:#06x} | COND = {}", self.pc, self.cond)
    }
}
