//! The `Opcode` sum type and its little-endian decoder.
//!
//! Each opcode byte is followed by a fixed, opcode-specific run of
//! immediate parameter bytes (see the table in the workspace-level design
//! notes). `usize` parameters are encoded as 8-byte little-endian words,
//! `i32`/`u32` as 4 bytes, `u8` as 1 byte — the same widths this family of
//! virtual machines has always used on 64-bit little-endian hosts.

use crate::error::{Error, Result};

/// A single decoded instruction, opcode byte plus its immediate
/// parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Copy `size` bytes from `sp - offset - size` to `sp`.
    Get { offset: usize, size: usize },
    /// Pop `size` bytes and write them into the tuple at `sp - tpl_size + offset`.
    Init {
        offset: usize,
        size: usize,
        tpl_size: usize,
    },
    /// Write the top `size` bytes into `ptr.reference + offset`, leaving `ptr`.
    InitInPlace { offset: usize, size: usize },
    /// Pop a region, allocate `size` bytes in it, push the pointer.
    Malloc { size: usize },
    /// Reserve `size` uninitialized bytes on the stack.
    Alloca { size: usize },
    /// Destructive projection: copy `size` bytes from `sp + offset`, pop `tpl_size`.
    Projection {
        offset: usize,
        size: usize,
        tpl_size: usize,
    },
    /// Pop a pointer, push `size` bytes from `ptr.reference + offset`.
    ProjectionInPlace { offset: usize, size: usize },
    /// Pop a `u32` code offset and jump to it.
    Call,
    /// Pop a pointer and print the string it addresses.
    PrintString,
    /// Push an `i32` literal.
    Literal(i32),
    /// Push a `u32` code offset as a literal value.
    GlobalFunction(u32),
    /// Pop a `u8` status code and terminate the current task.
    Halt,
    /// Create a region of the given capacity and push it.
    NewRegion { size: usize },
    /// Pop a region and free its backing storage.
    FreeRegion,
    /// Pop a pointer, push `size` bytes read from it.
    Dereference { size: usize },
    /// Pop a region and an `i32` length, allocate and push a new array.
    NewArray { elem_size: usize },
    /// Pop an index and an element, mutate the array the pointer beneath addresses.
    MutateArray { elem_size: usize },
    /// Pop an index and a pointer, push the addressed array element.
    ProjectArray { elem_size: usize },
    /// `i32` addition: pop `a` then `b`, push `b + a`.
    I32Add,
    /// `i32` multiplication: pop `a` then `b`, push `b * a`.
    I32Mul,
    /// `i32` division: pop `a` then `b`, push `b / a`.
    I32Div,
    /// `i32` modulo: pop `a` then `b`, push `b % a`.
    I32Mod,
    /// Pop `cond`, `g`, `f`; jump to `g` if `cond != 0`, else `f`.
    CallIfNotZero,
    /// Push a sentinel pointer into the data section at `offset`.
    LoadFromDataSection { offset: usize },
    /// Pop an index and a sentinel pointer, push the addressed data-section element.
    ProjectFromDataSectionArray { elem_size: usize },
    /// Copy up to `n` elements from a source pointer into a destination array.
    CopyN { elem_size: usize },
    /// Push a `u8` literal.
    U8Literal(u8),
    /// `u8` addition: pop `a` then `b`, push `b + a`.
    U8Add,
    /// `u8` multiplication: pop `a` then `b`, push `b * a`.
    U8Mul,
    /// `u8` division: pop `a` then `b`, push `b / a`.
    U8Div,
    /// `u8` modulo: pop `a` then `b`, push `b % a`.
    U8Mod,
    /// Widen a `u8` to `i32`.
    U8ToI32,
    /// Narrow an `i32` to `u8`.
    I32ToU8,
    /// Register a stdin continuation and yield.
    Read { channel: u8 },
    /// Write a string to the given output channel and post its completion handler.
    Write { channel: u8 },
}

/// Decodes a single instruction from `code` at `*pc`, advancing `*pc` past
/// the opcode byte and all of its immediate parameters.
///
/// # Errors
///
/// Returns [`Error::UnknownOpcode`] for an unrecognized opcode byte, or
/// [`Error::TruncatedInstruction`] if an immediate parameter runs past the
/// end of `code`.
pub fn decode(code: &[u8], pc: &mut usize) -> Result<Opcode> {
    let opcode = *code.get(*pc).ok_or(Error::TruncatedInstruction { opcode: 0 })?;
    *pc += 1;

    macro_rules! usize_param {
        () => {
            read_usize(code, pc, opcode)?
        };
    }
    macro_rules! u8_param {
        () => {
            read_u8(code, pc, opcode)?
        };
    }

    Ok(match opcode {
        0 => Opcode::Get {
            offset: usize_param!(),
            size: usize_param!(),
        },
        1 => Opcode::Init {
            offset: usize_param!(),
            size: usize_param!(),
            tpl_size: usize_param!(),
        },
        2 => Opcode::InitInPlace {
            offset: usize_param!(),
            size: usize_param!(),
        },
        3 => Opcode::Malloc { size: usize_param!() },
        4 => Opcode::Alloca { size: usize_param!() },
        5 => Opcode::Projection {
            offset: usize_param!(),
            size: usize_param!(),
            tpl_size: usize_param!(),
        },
        6 => Opcode::ProjectionInPlace {
            offset: usize_param!(),
            size: usize_param!(),
        },
        7 => Opcode::Call,
        8 => Opcode::PrintString,
        9 => Opcode::Literal(read_i32(code, pc, opcode)?),
        10 => Opcode::GlobalFunction(read_u32(code, pc, opcode)?),
        11 => Opcode::Halt,
        12 => Opcode::NewRegion { size: usize_param!() },
        13 => Opcode::FreeRegion,
        14 => Opcode::Dereference { size: usize_param!() },
        15 => Opcode::NewArray {
            elem_size: usize_param!(),
        },
        16 => Opcode::MutateArray {
            elem_size: usize_param!(),
        },
        17 => Opcode::ProjectArray {
            elem_size: usize_param!(),
        },
        18 => Opcode::I32Add,
        19 => Opcode::I32Mul,
        20 => Opcode::I32Div,
        21 => Opcode::CallIfNotZero,
        22 => Opcode::LoadFromDataSection {
            offset: usize_param!(),
        },
        23 => Opcode::ProjectFromDataSectionArray {
            elem_size: usize_param!(),
        },
        24 => Opcode::CopyN {
            elem_size: usize_param!(),
        },
        25 => Opcode::U8Literal(u8_param!()),
        26 => Opcode::U8Add,
        27 => Opcode::U8Mul,
        28 => Opcode::U8Div,
        29 => Opcode::U8ToI32,
        30 => Opcode::I32Mod,
        31 => Opcode::U8Mod,
        32 => Opcode::I32ToU8,
        33 => Opcode::Read { channel: u8_param!() },
        34 => Opcode::Write { channel: u8_param!() },
        other => return Err(Error::UnknownOpcode(other)),
    })
}

fn read_usize(code: &[u8], pc: &mut usize, opcode: u8) -> Result<usize> {
    let bytes: [u8; 8] = code
        .get(*pc..*pc + 8)
        .ok_or(Error::TruncatedInstruction { opcode })?
        .try_into()
        .unwrap();
    *pc += 8;
    Ok(u64::from_le_bytes(bytes) as usize)
}

fn read_i32(code: &[u8], pc: &mut usize, opcode: u8) -> Result<i32> {
    let bytes: [u8; 4] = code
        .get(*pc..*pc + 4)
        .ok_or(Error::TruncatedInstruction { opcode })?
        .try_into()
        .unwrap();
    *pc += 4;
    Ok(i32::from_le_bytes(bytes))
}

fn read_u32(code: &[u8], pc: &mut usize, opcode: u8) -> Result<u32> {
    let bytes: [u8; 4] = code
        .get(*pc..*pc + 4)
        .ok_or(Error::TruncatedInstruction { opcode })?
        .try_into()
        .unwrap();
    *pc += 4;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u8(code: &[u8], pc: &mut usize, opcode: u8) -> Result<u8> {
    let byte = *code.get(*pc).ok_or(Error::TruncatedInstruction { opcode })?;
    *pc += 1;
    Ok(byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_literal_and_halt() {
        let code = [9u8, 42, 0, 0, 0, 25, 0, 11];
        let mut pc = 0;
        assert_eq!(decode(&code, &mut pc).unwrap(), Opcode::Literal(42));
        assert_eq!(pc, 5);
        assert_eq!(decode(&code, &mut pc).unwrap(), Opcode::U8Literal(0));
        assert_eq!(pc, 7);
        assert_eq!(decode(&code, &mut pc).unwrap(), Opcode::Halt);
        assert_eq!(pc, 8);
    }

    #[test]
    fn decodes_usize_params() {
        let mut code = vec![0u8];
        code.extend_from_slice(&16u64.to_le_bytes());
        code.extend_from_slice(&4u64.to_le_bytes());
        let mut pc = 0;
        assert_eq!(
            decode(&code, &mut pc).unwrap(),
            Opcode::Get { offset: 16, size: 4 }
        );
        assert_eq!(pc, code.len());
    }

    #[test]
    fn unknown_opcode_errors() {
        let code = [200u8];
        let mut pc = 0;
        assert_eq!(decode(&code, &mut pc).unwrap_err(), Error::UnknownOpcode(200));
    }

    #[test]
    fn truncated_instruction_errors() {
        let code = [3u8, 1, 2, 3];
        let mut pc = 0;
        assert_eq!(
            decode(&code, &mut pc).unwrap_err(),
            Error::TruncatedInstruction { opcode: 3 }
        );
    }
}
