//! Program images, as produced by LC-3 assemblers.
//!
//! An image is a sequence of big-endian words. The first one is the address
//! where the program is loaded, the rest is the program itself.

use std::io::{self, Read};

use byteorder::{BigEndian, ReadBytesExt};
use thiserror::Error;
use tracing::debug;

use crate::constants::{Address, Word, MEMORY_SIZE};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read program image")]
    Io(#[from] io::Error),

    #[error("program image is empty")]
    Empty,

    #[error("program image has an origin ({origin:#06x}) but no program")]
    NoProgram { origin: Address },

    #[error("program image is truncated: {len} bytes is not a whole number of words")]
    Truncated { len: usize },

    #[error("program of {words} words does not fit in memory when loaded at {origin:#06x}")]
    TooLarge { origin: Address, words: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Where the program is loaded, and where execution starts
    pub origin: Address,

    /// The program, in native byte order
    pub words: Vec<Word>,
}

impl Image {
    #[must_use]
    pub fn new(origin: Address, words: Vec<Word>) -> Self {
        Self { origin, words }
    }

    /// Parse an image from its raw bytes
    ///
    /// # Errors
    ///
    /// Fails if there is no origin, no program after it, a dangling byte at the
    /// end, or more words than memory holds past the origin.
    #[tracing::instrument(skip(bytes), fields(len = bytes.len()), err)]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        let len = bytes.len();
        if len < 2 {
            return Err(LoadError::Empty);
        }
        if len % 2 != 0 {
            return Err(LoadError::Truncated { len });
        }

        let mut reader = bytes;
        let origin = reader.read_u16::<BigEndian>()?;
        let mut words = vec![0; reader.len() / 2];
        reader.read_u16_into::<BigEndian>(&mut words)?;

        if words.is_empty() {
            return Err(LoadError::NoProgram { origin });
        }
        if words.len() > MEMORY_SIZE - usize::from(origin) {
            return Err(LoadError::TooLarge {
                origin,
                words: words.len(),
            });
        }

        debug!(origin, words = words.len(), "Parsed program image");
        Ok(Self { origin, words })
    }

    /// Read a whole image from a stream
    ///
    /// # Errors
    ///
    /// Fails if the stream cannot be read, or if its content is not a valid
    /// image (see [`Image::from_bytes`]).
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self, LoadError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }
}
