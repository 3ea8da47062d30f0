pub type Address = u16;
pub type Word = u16;

/// Total size of the computer memory, in words
pub const MEMORY_SIZE: usize = 1 << 16;

/// Conventional place to load the beginning of the program
pub const PROGRAM_START: Address = 0x3000;

/// Keyboard status register. Reading it polls the keyboard.
pub const KEYBOARD_STATUS: Address = 0xFE00;

/// Keyboard data register, holds the last polled character
pub const KEYBOARD_DATA: Address = 0xFE02;

/// Bit set in the keyboard status register when a character is ready
pub const KEYBOARD_READY: Word = 1 << 15;
