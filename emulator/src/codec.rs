//! Bit-level access to the fields of an instruction word.
//!
//! Every LC-3 instruction is a single 16-bit word. The top four bits hold the
//! opcode; the meaning of the twelve remaining bits depends on it:
//!
//! ```text
//! | 15 14 13 12 | 11 10 9 | 8 7 6 | 5 | 4 3 | 2 1 0 |
//! |   opcode    | DR/NZP  | SR1   | i | imm5 / SR2  |
//! |   opcode    | DR/NZP  |      PCoffset9          |
//! |   opcode    | r |         PCoffset11            |
//! |   opcode    |   DR    | BaseR |    offset6      |
//! |   opcode    | 0 0 0 0 |       trapvect8         |
//! ```
//!
//! Nothing in here knows about opcodes: picking which fields to read for a
//! given word is the job of [`crate::runtime::Instruction::decode`].

use crate::constants::Word;

/// Extend the two's-complement sign of a `bit_count`-wide value to a full word.
///
/// The caller is expected to have masked `value` to `bit_count` bits already.
#[must_use]
pub const fn sign_extend(value: Word, bit_count: u32) -> Word {
    if bit_count == 0 || bit_count >= Word::BITS {
        return value;
    }

    if (value >> (bit_count - 1)) & 1 == 1 {
        value | (Word::MAX << bit_count)
    } else {
        value
    }
}

/// A contiguous group of bits inside an instruction word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    shift: u32,
    width: u32,
}

impl Field {
    const fn new(shift: u32, width: u32) -> Self {
        Self { shift, width }
    }

    /// Number of bits in this field
    #[must_use]
    pub const fn width(self) -> u32 {
        self.width
    }

    /// Mask of the field, before shifting it in place
    #[must_use]
    pub const fn mask(self) -> Word {
        Word::MAX >> (Word::BITS - self.width)
    }

    /// Extract the raw, unsigned value of the field
    #[must_use]
    pub const fn get(self, word: Word) -> Word {
        (word >> self.shift) & self.mask()
    }

    /// Extract the field as a two's-complement value
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn get_signed(self, word: Word) -> i16 {
        sign_extend(self.get(word), self.width) as i16
    }

    #[must_use]
    pub const fn is_set(self, word: Word) -> bool {
        self.get(word) != 0
    }

    /// Place `value` in the field, replacing what was there.
    ///
    /// Bits of `value` that do not fit in the field are dropped.
    #[must_use]
    pub const fn set(self, word: Word, value: Word) -> Word {
        let mask = self.mask();
        (word & !(mask << self.shift)) | ((value & mask) << self.shift)
    }

    /// Place a two's-complement value in the field
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn set_signed(self, word: Word, value: i16) -> Word {
        self.set(word, value as Word)
    }

    #[must_use]
    pub const fn set_flag(self, word: Word, flag: bool) -> Word {
        self.set(word, flag as Word)
    }

    /// Smallest signed value the field can hold
    #[must_use]
    pub const fn signed_min(self) -> i16 {
        -(1 << (self.width - 1))
    }

    /// Largest signed value the field can hold
    #[must_use]
    pub const fn signed_max(self) -> i16 {
        (1 << (self.width - 1)) - 1
    }
}

pub const OPCODE: Field = Field::new(12, 4);

/// Destination register of data instructions, source register of stores
pub const DR: Field = Field::new(9, 3);

/// Condition mask of `BR`. Same bits as [`DR`].
pub const NZP: Field = Field::new(9, 3);

pub const SR1: Field = Field::new(6, 3);

/// Base register of `LDR`, `STR`, `JMP` and `JSRR`. Same bits as [`SR1`].
pub const BASE: Field = Field::new(6, 3);

pub const SR2: Field = Field::new(0, 3);

/// Selects the immediate form of `ADD` and `AND`
pub const IMM_FLAG: Field = Field::new(5, 1);

pub const IMM5: Field = Field::new(0, 5);

pub const PC_OFFSET9: Field = Field::new(0, 9);

pub const PC_OFFSET11: Field = Field::new(0, 11);

pub const OFFSET6: Field = Field::new(0, 6);

/// Selects the PC-relative form of `JSR`
pub const JSR_RELATIVE: Field = Field::new(11, 1);

pub const TRAP_VECTOR: Field = Field::new(0, 8);

/// Render a word as four groups of four binary digits, most significant first.
#[must_use]
pub fn format_bits(word: Word) -> String {
    (0..4)
        .rev()
        .map(|nibble| format!("{:04b}", (word >> (nibble * 4)) & 0xF))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn sign_extend_test() {
        assert_eq!(sign_extend(0b11111, 5), 0xFFFF);
        assert_eq!(sign_extend(0b01111, 5), 15);
        assert_eq!(sign_extend(0b10000, 5), 0xFFF0);
        assert_eq!(sign_extend(0x100, 9), 0xFF00);
        assert_eq!(sign_extend(0x0FF, 9), 0x00FF);
        assert_eq!(sign_extend(0x8000, 16), 0x8000);
    }

    #[test]
    fn field_get_test() {
        // ADD R3, R5, #-9
        let word = 0x1777;
        assert_eq!(OPCODE.get(word), 0b0001);
        assert_eq!(DR.get(word), 3);
        assert_eq!(SR1.get(word), 5);
        assert!(IMM_FLAG.is_set(word));
        assert_eq!(IMM5.get(word), 0b10111);
        assert_eq!(IMM5.get_signed(word), -9);
    }

    #[test]
    fn field_set_replaces_previous_bits() {
        let word = DR.set(0xFFFF, 0);
        assert_eq!(word, 0xF1FF);

        let word = DR.set(word, 0b1010);
        assert_eq!(DR.get(word), 0b010, "value is truncated to the field width");
        assert_eq!(word, 0xF5FF);
    }

    #[test]
    fn field_bounds_test() {
        assert_eq!((IMM5.signed_min(), IMM5.signed_max()), (-16, 15));
        assert_eq!((OFFSET6.signed_min(), OFFSET6.signed_max()), (-32, 31));
        assert_eq!((PC_OFFSET9.signed_min(), PC_OFFSET9.signed_max()), (-256, 255));
        assert_eq!(
            (PC_OFFSET11.signed_min(), PC_OFFSET11.signed_max()),
            (-1024, 1023)
        );
    }

    #[test]
    fn format_bits_test() {
        insta::assert_snapshot!(format_bits(0xF025), @"1111 0000 0010 0101");
        insta::assert_snapshot!(format_bits(0x0000), @"0000 0000 0000 0000");
        insta::assert_snapshot!(format_bits(0x74E3), @"0111 0100 1110 0011");
    }

    proptest! {
        #[test]
        fn imm5_roundtrip(value in -16i16..=15, noise in any::<u16>()) {
            prop_assert_eq!(IMM5.get_signed(IMM5.set_signed(noise, value)), value);
        }

        #[test]
        fn offset6_roundtrip(value in -32i16..=31, noise in any::<u16>()) {
            prop_assert_eq!(OFFSET6.get_signed(OFFSET6.set_signed(noise, value)), value);
        }

        #[test]
        fn pc_offset9_roundtrip(value in -256i16..=255, noise in any::<u16>()) {
            let word = PC_OFFSET9.set_signed(noise, value);
            prop_assert_eq!(PC_OFFSET9.get_signed(word), value);
            // Bits outside of the field are left alone
            prop_assert_eq!(word & !0x1FF, noise & !0x1FF);
        }

        #[test]
        fn pc_offset11_roundtrip(value in -1024i16..=1023, noise in any::<u16>()) {
            prop_assert_eq!(PC_OFFSET11.get_signed(PC_OFFSET11.set_signed(noise, value)), value);
        }
    }
}
