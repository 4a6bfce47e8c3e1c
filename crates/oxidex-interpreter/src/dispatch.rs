//! Opcode execution: one arm per [`Opcode`] variant, each the direct
//! translation of its entry in the opcode table. This module only
//! executes already-decoded instructions; [`oxidex_bytecode::decode`]
//! owns turning bytes into an [`Opcode`] and [`crate::runtime::Runtime`]
//! owns the dispatch loop that feeds this function one instruction at a
//! time.

use oxidex_bytecode::Opcode;
use oxidex_mem::region::Pointer;
use oxidex_log::trace;

use crate::error::{Error, Result};
use crate::handler::Handler;
use crate::runtime::Runtime;
use crate::stdio;

/// What happened after executing one instruction.
pub(crate) enum Step {
    /// Keep decoding at the (possibly updated) `pc`.
    Continue,
    /// The current task suspended; the drive loop moves on to the next
    /// ready task.
    Yield,
    /// `halt` was executed; the whole machine should exit with this
    /// status.
    Halt(u8),
}

/// Executes a single decoded instruction against `rt`, advancing `*pc`
/// for control-flow opcodes (`call`, `call-if-not-zero`).
pub(crate) fn execute(rt: &mut Runtime, opcode: Opcode, pc: &mut usize) -> Result<Step> {
    trace!("dispatch {opcode:?} at pc={pc}");
    match opcode {
        Opcode::Get { offset, size } => {
            let mut buf = vec![0u8; size];
            rt.stack.get(offset, &mut buf)?;
            rt.stack.push(&buf)?;
        }

        Opcode::Init { offset, size, tpl_size } => {
            let mut value = vec![0u8; size];
            rt.stack.pop(&mut value)?;
            let put_offset = tpl_size - offset - size;
            rt.stack.put(put_offset, &value)?;
        }

        Opcode::InitInPlace { offset, size } => {
            let mut value = vec![0u8; size];
            rt.stack.pop(&mut value)?;
            let ptr = rt.pop_ptr()?;
            ptr.check()?;
            // SAFETY: `check` confirmed `ptr.reference` addresses a live
            // allocation; the compiler sized it to hold `offset + size`.
            unsafe { std::ptr::copy_nonoverlapping(value.as_ptr(), ptr.reference.add(offset), size) };
            rt.push_ptr(ptr)?;
        }

        Opcode::Malloc { size } => {
            let handle = rt.pop_region_handle()?;
            let ptr = rt.region_mut(handle)?.alloc_object(size)?;
            rt.push_ptr(ptr)?;
        }

        Opcode::Alloca { size } => {
            rt.stack.push(&vec![0u8; size])?;
        }

        Opcode::Projection { offset, size, tpl_size } => {
            let get_offset = tpl_size - offset - size;
            let mut saved = vec![0u8; size];
            rt.stack.get(get_offset, &mut saved)?;
            let mut discard = vec![0u8; tpl_size];
            rt.stack.pop(&mut discard)?;
            rt.stack.push(&saved)?;
        }

        Opcode::ProjectionInPlace { offset, size } => {
            let ptr = rt.pop_ptr()?;
            ptr.check()?;
            let mut buf = vec![0u8; size];
            // SAFETY: see `InitInPlace`.
            unsafe { std::ptr::copy_nonoverlapping(ptr.reference.add(offset), buf.as_mut_ptr(), size) };
            rt.stack.push(&buf)?;
        }

        Opcode::Call => {
            let target = rt.pop_u32()?;
            *pc = target as usize;
        }

        Opcode::PrintString => {
            let ptr = rt.pop_ptr()?;
            let bytes = rt.read_string_bytes(ptr)?;
            let _ = stdio::write_channel(0, &bytes);
        }

        Opcode::Literal(value) => rt.push_i32(value)?,

        Opcode::GlobalFunction(offset) => rt.push_u32(offset)?,

        Opcode::Halt => {
            let status = rt.pop_u8()?;
            return Ok(Step::Halt(status));
        }

        Opcode::NewRegion { size } => {
            let handle = rt.new_region(size);
            rt.push_region_handle(handle)?;
        }

        Opcode::FreeRegion => {
            let handle = rt.pop_region_handle()?;
            rt.free_region(handle)?;
        }

        Opcode::Dereference { size } => {
            let ptr = rt.pop_ptr()?;
            ptr.check()?;
            let mut buf = vec![0u8; size];
            // SAFETY: see `InitInPlace`.
            unsafe { std::ptr::copy_nonoverlapping(ptr.reference, buf.as_mut_ptr(), size) };
            rt.stack.push(&buf)?;
        }

        Opcode::NewArray { elem_size } => {
            let len = rt.pop_i32()?;
            let handle = rt.pop_region_handle()?;
            let payload_len = elem_size * (len as usize);
            let ptr = rt.region_mut(handle)?.alloc_object(8 + payload_len)?;
            // SAFETY: `alloc_object` returned `8 + payload_len` fresh,
            // uniquely-owned bytes.
            unsafe {
                std::ptr::write_bytes(ptr.reference, 0, 8 + payload_len);
                std::ptr::copy_nonoverlapping(
                    (payload_len as u64).to_le_bytes().as_ptr(),
                    ptr.reference,
                    8,
                );
            }
            rt.push_ptr(ptr)?;
        }

        Opcode::MutateArray { elem_size } => {
            let index = rt.pop_i32()?;
            let mut elem = vec![0u8; elem_size];
            rt.stack.pop(&mut elem)?;
            let ptr = rt.peek_ptr()?;
            ptr.check()?;
            let array_len = array_length(ptr);
            bounds_check(index, elem_size, array_len)?;
            // SAFETY: bounds checked above; `ptr` checked live above.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    elem.as_ptr(),
                    ptr.reference.add(8 + index as usize * elem_size),
                    elem_size,
                )
            };
        }

        Opcode::ProjectArray { elem_size } => {
            let index = rt.pop_i32()?;
            let ptr = rt.pop_ptr()?;
            ptr.check()?;
            let array_len = array_length(ptr);
            bounds_check(index, elem_size, array_len)?;
            let mut buf = vec![0u8; elem_size];
            // SAFETY: bounds checked above; `ptr` checked live above.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    ptr.reference.add(8 + index as usize * elem_size),
                    buf.as_mut_ptr(),
                    elem_size,
                )
            };
            rt.stack.push(&buf)?;
        }

        Opcode::I32Add => {
            let a = rt.pop_i32()?;
            let b = rt.pop_i32()?;
            rt.push_i32(b.wrapping_add(a))?;
        }
        Opcode::I32Mul => {
            let a = rt.pop_i32()?;
            let b = rt.pop_i32()?;
            rt.push_i32(b.wrapping_mul(a))?;
        }
        Opcode::I32Div => {
            let a = rt.pop_i32()?;
            let b = rt.pop_i32()?;
            rt.push_i32(b / a)?;
        }
        Opcode::I32Mod => {
            let a = rt.pop_i32()?;
            let b = rt.pop_i32()?;
            rt.push_i32(b % a)?;
        }

        Opcode::CallIfNotZero => {
            let f = rt.pop_u32()?;
            let g = rt.pop_u32()?;
            let cond = rt.pop_i32()?;
            *pc = if cond != 0 { g as usize } else { f as usize };
        }

        Opcode::LoadFromDataSection { offset } => {
            let ptr = Pointer {
                generation: oxidex_mem::region::STATIC_GENERATION,
                reference: rt.data_section_ptr_at(offset),
            };
            rt.push_ptr(ptr)?;
        }

        Opcode::ProjectFromDataSectionArray { elem_size } => {
            let index = rt.pop_i32()?;
            let ptr = rt.pop_ptr()?;
            let data = rt.data_section();
            let end = data.as_ptr() as usize + data.len();
            let start = ptr.reference as usize;
            let remaining = end.saturating_sub(start);
            bounds_check(index, elem_size, remaining as u64)?;
            let mut buf = vec![0u8; elem_size];
            // SAFETY: bounds checked above against the data section end.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    ptr.reference.add(index as usize * elem_size),
                    buf.as_mut_ptr(),
                    elem_size,
                )
            };
            rt.stack.push(&buf)?;
        }

        Opcode::CopyN { elem_size } => {
            let n = rt.pop_i32()?;
            if n < 0 {
                return Err(Error::NegativeCopyLength(n));
            }
            let src = rt.pop_ptr()?;
            let dest = rt.pop_ptr()?;
            dest.check()?;

            let (src_payload, available) = if src.generation < 0 {
                let data = rt.data_section();
                let end = data.as_ptr() as usize + data.len();
                let start = src.reference as usize;
                (src.reference, end.saturating_sub(start) / elem_size)
            } else {
                src.check()?;
                let len = array_length(src) as usize;
                // SAFETY: `check` above confirmed `src.reference` is live.
                (unsafe { src.reference.add(8) }, len / elem_size)
            };

            let count = (n as usize).min(available);
            // SAFETY: `dest` checked live above; `count * elem_size` is
            // bounded by the smaller of the source's available elements
            // and the program-supplied `n`.
            unsafe {
                std::ptr::copy_nonoverlapping(src_payload, dest.reference.add(8), count * elem_size)
            };
            rt.push_ptr(dest)?;
        }

        Opcode::U8Literal(value) => rt.push_u8(value)?,
        Opcode::U8Add => {
            let a = rt.pop_u8()?;
            let b = rt.pop_u8()?;
            rt.push_u8(b.wrapping_add(a))?;
        }
        Opcode::U8Mul => {
            let a = rt.pop_u8()?;
            let b = rt.pop_u8()?;
            rt.push_u8(b.wrapping_mul(a))?;
        }
        Opcode::U8Div => {
            let a = rt.pop_u8()?;
            let b = rt.pop_u8()?;
            rt.push_u8(b / a)?;
        }
        Opcode::U8Mod => {
            let a = rt.pop_u8()?;
            let b = rt.pop_u8()?;
            rt.push_u8(b % a)?;
        }
        Opcode::U8ToI32 => {
            let value = rt.pop_u8()?;
            rt.push_i32(i32::from(value))?;
        }
        Opcode::I32ToU8 => {
            let value = rt.pop_i32()?;
            rt.push_u8(value as u8)?;
        }

        Opcode::Read { channel: _ } => {
            let handler_code = rt.pop_u32()?;
            let env = rt.pop_ptr()?;
            let region = rt.pop_region_handle()?;
            rt.register_stdin(region, handler_code, env);
            return Ok(Step::Yield);
        }

        Opcode::Write { channel: _ } => {
            let str_ptr = rt.pop_ptr()?;
            let handler_code = rt.pop_u32()?;
            let env = rt.pop_ptr()?;
            let mode = rt.pop_u8()?;
            let _region = rt.pop_region_handle()?;
            let bytes = rt.read_string_bytes(str_ptr)?;
            stdio::write_channel(mode, &bytes)?;
            rt.post_task(Handler::new(handler_code, &[], env))?;
        }
    }
    Ok(Step::Continue)
}

/// Reads the 8-byte little-endian length prefix stored at the start of a
/// heap array's payload.
fn array_length(ptr: Pointer) -> u64 {
    let mut buf = [0u8; 8];
    // SAFETY: caller has already called `ptr.check()`, and every array
    // produced by `new-array` carries this 8-byte length prefix.
    unsafe { std::ptr::copy_nonoverlapping(ptr.reference, buf.as_mut_ptr(), 8) };
    u64::from_le_bytes(buf)
}

fn bounds_check(index: i32, elem_size: usize, array_len: u64) -> Result<()> {
    if index < 0 || (index as usize) * elem_size + elem_size > array_len as usize {
        return Err(Error::ArrayIndexOutOfBounds {
            index,
            len: array_len as usize,
        });
    }
    Ok(())
}
