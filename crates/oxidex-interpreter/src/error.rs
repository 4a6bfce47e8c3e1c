//! Error type for the interpreter: wraps the lower crates' errors and adds
//! the failure modes specific to opcode dispatch, the handler scheduler,
//! and the async stdin bridge.

use std::fmt;

/// Errors produced while driving a program to completion.
///
/// Every variant here is fatal: §7 of the design notes routes all of these
/// to a process exit with status 1 rather than partial recovery. A future
/// compiler hook may route some of these to a user exception handler
/// instead; the runtime does not attempt that today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A region or stack operation failed (use-after-free, allocation
    /// failure, stack traversal overflow, stack underflow).
    Mem(oxidex_mem::Error),

    /// The program image or an opcode stream was malformed.
    Bytecode(oxidex_bytecode::Error),

    /// `post_task` was called with the scheduler already at capacity.
    SchedulerFull,

    /// `write`'s mode byte was neither `0` (stdout) nor `1` (stderr).
    WriteModeInvalid(u8),

    /// `copy-n` was asked to copy a negative number of elements.
    NegativeCopyLength(i32),

    /// An array index was negative or at/past the array's element count.
    ArrayIndexOutOfBounds {
        /// The index the program attempted to use.
        index: i32,
        /// The array's length in bytes (the stored length prefix).
        len: usize,
    },

    /// Dispatch fell through to no matching opcode handler. This should be
    /// unreachable given `oxidex_bytecode::decode` already rejects unknown
    /// bytes, but is retained as a defensive catch-all.
    UnknownOpcode(u8),

    /// A region handle referred to a slot that was never allocated or has
    /// already been freed.
    InvalidRegionHandle(u64),

    /// A `poll`/`read` against stdin failed; carries the raw OS error code.
    Io(i32),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Mem(e) => write!(f, "{e}"),
            Error::Bytecode(e) => write!(f, "{e}"),
            Error::SchedulerFull => write!(f, "handler scheduler is full"),
            Error::WriteModeInvalid(mode) => write!(f, "invalid write mode byte {mode}"),
            Error::NegativeCopyLength(n) => write!(f, "copy-n called with negative length {n}"),
            Error::ArrayIndexOutOfBounds { index, len } => {
                write!(f, "array index {index} out of bounds for array of {len} bytes")
            }
            Error::UnknownOpcode(byte) => write!(f, "unknown opcode byte {byte:#04x}"),
            Error::InvalidRegionHandle(handle) => {
                write!(f, "region handle {handle} does not name a live region")
            }
            Error::Io(code) => write!(f, "stdin I/O failure (os error {code})"),
        }
    }
}

impl std::error::Error for Error {}

impl From<oxidex_mem::Error> for Error {
    fn from(e: oxidex_mem::Error) -> Self {
        Error::Mem(e)
    }
}

impl From<oxidex_bytecode::Error> for Error {
    fn from(e: oxidex_bytecode::Error) -> Self {
        Error::Bytecode(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.raw_os_error().unwrap_or(-1))
    }
}

/// Result type for interpreter operations.
pub type Result<T> = std::result::Result<T, Error>;
