//! The `OxideX` VM's program image format and instruction set.
//!
//! This crate owns the data format only, not execution semantics:
//!
//! - [`image`]: the `data_section_size` header, the read-only data
//!   section, and the code section of a parsed [`image::ProgramImage`].
//! - [`opcode`]: the [`opcode::Opcode`] sum type and its little-endian
//!   [`opcode::decode`] function.
//!
//! `oxidex-interpreter` is the crate that actually executes a decoded
//! [`opcode::Opcode`] against a running [`oxidex_mem`] stack and region
//! set.

pub mod error;
pub mod image;
pub mod opcode;

pub use error::{Error, Result};
pub use opcode::{decode, Opcode};
