//! `OxideX` Interpreter: opcode dispatch, the handler scheduler, and the
//! async stdin bridge.
//!
//! This crate composes [`oxidex_bytecode`]'s decoder and [`oxidex_mem`]'s
//! region allocator and segmented stack into a [`runtime::Runtime`] that
//! can drive a parsed program image to completion:
//!
//! - [`dispatch`]: the opcode-by-opcode execution semantics (§4.5 of the
//!   design notes).
//! - [`handler`]: the bounded LIFO [`handler::Scheduler`] of pending
//!   continuation tasks (§4.6).
//! - [`stdio`]: non-blocking stdin polling and synchronous stdout/stderr
//!   writes (§4.7).
//! - [`runtime`]: the [`runtime::Runtime`] context tying the above
//!   together and the drive loop described in the system overview.
//!
//! # Example
//!
//! ```
//! use oxidex_bytecode::image::ProgramImage;
//! use oxidex_interpreter::runtime::{Config, Runtime};
//!
//! // literal 42, u8 literal 0 (exit status), halt
//! let mut bytes = 0u32.to_le_bytes().to_vec();
//! bytes.extend_from_slice(&[9, 42, 0, 0, 0, 25, 0, 11]);
//! let image = ProgramImage::parse(bytes).unwrap();
//!
//! let mut runtime = Runtime::new(image, Config::default());
//! assert_eq!(runtime.run().unwrap(), 0);
//! ```

mod dispatch;
pub mod error;
pub mod handler;
pub mod runtime;
pub mod stdio;

pub use error::{Error, Result};
pub use runtime::{Config, Runtime};
