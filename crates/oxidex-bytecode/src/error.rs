//! Error type for malformed program images and opcode streams.

use std::fmt;

/// Errors produced while parsing a program image or decoding its code
/// section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The image is shorter than its own `data_section_size` header claims.
    TruncatedImage {
        /// Bytes the header promised.
        expected: usize,
        /// Bytes actually present.
        found: usize,
    },

    /// Dispatch read a byte with no matching opcode.
    UnknownOpcode(u8),

    /// An opcode's immediate parameters ran past the end of the code
    /// section.
    TruncatedInstruction {
        /// Opcode byte being decoded.
        opcode: u8,
    },

    /// Reserved for opcodes parameterized by an element/operand size the
    /// decoder does not know how to handle.
    UnsupportedImmediateSize {
        /// Opcode byte being decoded.
        opcode: u8,
        /// The unsupported size that was requested.
        size: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TruncatedImage { expected, found } => write!(
                f,
                "truncated program image: data section header claims {expected} bytes, only {found} present"
            ),
            Error::UnknownOpcode(byte) => write!(f, "unknown opcode byte {byte:#04x}"),
            Error::TruncatedInstruction { opcode } => write!(
                f,
                "truncated instruction: opcode {opcode:#04x} ran past end of code section"
            ),
            Error::UnsupportedImmediateSize { opcode, size } => write!(
                f,
                "opcode {opcode:#04x} does not support immediate size {size}"
            ),
        }
    }
}

impl std::error::Error for Error {}

/// Result type for bytecode parsing and decoding.
pub type Result<T> = std::result::Result<T, Error>;
