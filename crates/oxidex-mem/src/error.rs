//! Error types for the region allocator and segmented stack.
//!
//! A flat, `Display`-backed enum rather than a dedicated error-derive crate,
//! since there's only a handful of variants.

use std::fmt;

/// Errors produced by [`crate::region`] and [`crate::stack`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No bump slot and no reusable freed slot could satisfy the request.
    AllocationTooLarge {
        /// Bytes requested (payload only, header excluded).
        requested: usize,
        /// Total capacity of the region that rejected the request.
        capacity: usize,
    },

    /// A pointer's generation didn't match the generation stored at its
    /// allocation header: the object has already been freed.
    UseAfterFree,

    /// `get` walked more chunks than `MAX_STACK_WALK` permits while
    /// resolving a cross-chunk read; the program is malformed.
    StackTraversalOverflow,

    /// A `pop`/`get` asked for more bytes than the stack holds.
    StackUnderflow,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AllocationTooLarge { requested, capacity } => write!(
                f,
                "allocation too large: requested {requested} bytes, region capacity {capacity} bytes"
            ),
            Error::UseAfterFree => {
                write!(f, "use after free: pointer generation does not match allocation header")
            }
            Error::StackTraversalOverflow => {
                write!(f, "stack traversal overflow: get walked too many chunks")
            }
            Error::StackUnderflow => write!(f, "stack underflow: not enough bytes on the stack"),
        }
    }
}

impl std::error::Error for Error {}

/// Result type for region/stack operations.
pub type Result<T> = std::result::Result<T, Error>;
