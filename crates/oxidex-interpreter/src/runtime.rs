//! The `Runtime` context: owns the program image, the segmented stack,
//! the slab of open regions, the handler scheduler, and the stdin
//! continuation while a program is running. Global mutable state that a
//! C-shaped implementation would keep as process-wide statics is kept
//! here instead, passed by `&mut self` into every opcode handler, per the
//! "encapsulate globals in a context struct" guidance in the design notes.

use std::io;

use oxidex_bytecode::decode;
use oxidex_bytecode::image::ProgramImage;
use oxidex_mem::region::{Pointer, Region, STATIC_GENERATION};
use oxidex_mem::stack::Stack;
use oxidex_log::{debug, info, trace};

use crate::dispatch::{self, Step};
use crate::error::{Error, Result};
use crate::handler::{Handler, Scheduler, DEFAULT_MAX_HANDLERS};
use crate::stdio::{self, DEFAULT_POLL_MS};

/// Tunable knobs for a `Runtime`, surfaced by the CLI as `--max-handlers`
/// and `--stdin-poll-ms`.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Capacity of the handler scheduler.
    pub max_handlers: usize,
    /// How long the drive loop waits between stdin polls while idle.
    pub stdin_poll_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_handlers: DEFAULT_MAX_HANDLERS,
            stdin_poll_ms: DEFAULT_POLL_MS,
        }
    }
}

/// The registered continuation for the next batch of stdin bytes: which
/// region to allocate the byte array in and which handler to post once
/// data arrives.
struct StdinRegistration {
    region: u64,
    code_offset: u32,
    env: Pointer,
}

/// The running machine: program image, operand stack, open regions,
/// handler queue, and stdin bridge state.
pub struct Runtime {
    image: ProgramImage,
    pub(crate) stack: Stack,
    regions: Vec<Option<Region>>,
    scheduler: Scheduler,
    stdin_waiting: bool,
    stdin_registration: Option<StdinRegistration>,
    stdin_poll_ms: u64,
}

/// Outcome of running a single task to its next suspension point.
enum TaskOutcome {
    Yielded,
    Halted(u8),
}

impl Runtime {
    /// Builds a runtime over a parsed program image.
    #[must_use]
    pub fn new(image: ProgramImage, config: Config) -> Self {
        Runtime {
            image,
            stack: Stack::new(),
            regions: Vec::new(),
            scheduler: Scheduler::new(config.max_handlers),
            stdin_waiting: false,
            stdin_registration: None,
            stdin_poll_ms: config.stdin_poll_ms,
        }
    }

    /// Runs the program to completion, returning the `halt` status code
    /// (or `0` if the scheduler simply drains with nothing left to do).
    ///
    /// # Errors
    ///
    /// Returns any fatal interpreter error; the caller (`oxidex-cli`) is
    /// expected to report it and exit with status `1`.
    pub fn run(&mut self) -> Result<u8> {
        if let Err(e) = stdio::set_nonblocking(libc::STDIN_FILENO) {
            debug!("stdin does not support non-blocking mode: {e}");
        }

        let initial_env = Pointer {
            generation: STATIC_GENERATION,
            reference: self.image.data_section_ptr().cast_mut(),
        };
        self.scheduler.post_task(Handler::new(0, &[], initial_env))?;
        info!("seeded initial task at code offset 0");

        loop {
            if let Some(handler) = self.scheduler.pop_task() {
                trace!("resuming task at code offset {}", handler.code_offset);
                match self.run_task(handler)? {
                    TaskOutcome::Yielded => {}
                    TaskOutcome::Halted(status) => {
                        info!("halt requested with status {status}");
                        return Ok(status);
                    }
                }
            } else if self.stdin_waiting {
                self.poll_stdin()?;
            } else {
                info!("scheduler empty and nothing waiting, exiting");
                return Ok(0);
            }
        }
    }

    /// Pushes a task's parameter and environment onto the stack and
    /// interprets opcodes from its code offset until it yields or halts.
    fn run_task(&mut self, handler: Handler) -> Result<TaskOutcome> {
        if !handler.param_bytes().is_empty() {
            self.stack.push(handler.param_bytes())?;
        }
        self.push_ptr(handler.env)?;

        let mut pc = handler.code_offset as usize;
        loop {
            let opcode = decode(self.image.code(), &mut pc)?;
            match dispatch::execute(self, opcode, &mut pc)? {
                Step::Continue => {}
                Step::Yield => return Ok(TaskOutcome::Yielded),
                Step::Halt(status) => return Ok(TaskOutcome::Halted(status)),
            }
        }
    }

    /// Polls stdin once; if data is available, allocates it as a
    /// length-prefixed array in the registered region and posts the
    /// registered handler. Otherwise this is a no-op (the caller is the
    /// drive loop, which will come back around and poll again).
    fn poll_stdin(&mut self) -> Result<()> {
        let readable = stdio::poll_readable(libc::STDIN_FILENO, self.stdin_poll_ms as i32)?;
        if !readable {
            return Ok(());
        }
        let bytes = stdio::read_available(io::stdin().lock())?;
        if bytes.is_empty() {
            return Ok(());
        }

        let registration = self
            .stdin_registration
            .take()
            .expect("stdin_waiting implies a registered continuation");
        let ptr = self.alloc_array_from_bytes(registration.region, &bytes)?;
        let param = self.encode_ptr(ptr);
        self.scheduler
            .post_task(Handler::new(registration.code_offset, &param, registration.env))?;
        self.stdin_waiting = false;
        Ok(())
    }

    /// Registers a pending stdin continuation and marks the runtime as
    /// waiting on input. Used by the `read` opcode.
    pub(crate) fn register_stdin(&mut self, region: u64, code_offset: u32, env: Pointer) {
        self.stdin_registration = Some(StdinRegistration {
            region,
            code_offset,
            env,
        });
        self.stdin_waiting = true;
    }

    /// Allocates a length-prefixed byte array in `region` and copies
    /// `bytes` into its payload, mirroring the layout `new-array` builds.
    fn alloc_array_from_bytes(&mut self, region: u64, bytes: &[u8]) -> Result<Pointer> {
        let r = self.region_mut(region)?;
        let ptr = r.alloc_object(8 + bytes.len())?;
        // SAFETY: `alloc_object` just returned a fresh, uniquely-owned
        // payload of exactly `8 + bytes.len()` writable bytes.
        unsafe {
            std::ptr::copy_nonoverlapping((bytes.len() as u64).to_le_bytes().as_ptr(), ptr.reference, 8);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.reference.add(8), bytes.len());
        }
        Ok(ptr)
    }

    // --- region slab -----------------------------------------------------

    /// Creates a fresh region of `capacity` bytes, returning its handle.
    pub(crate) fn new_region(&mut self, capacity: usize) -> u64 {
        self.regions.push(Some(Region::new(capacity)));
        (self.regions.len() - 1) as u64
    }

    /// Drops the backing storage for `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRegionHandle`] if `handle` is out of range
    /// or already freed.
    pub(crate) fn free_region(&mut self, handle: u64) -> Result<()> {
        let slot = self
            .regions
            .get_mut(handle as usize)
            .ok_or(Error::InvalidRegionHandle(handle))?;
        if slot.take().is_none() {
            return Err(Error::InvalidRegionHandle(handle));
        }
        Ok(())
    }

    pub(crate) fn region_mut(&mut self, handle: u64) -> Result<&mut Region> {
        self.regions
            .get_mut(handle as usize)
            .and_then(|slot| slot.as_mut())
            .ok_or(Error::InvalidRegionHandle(handle))
    }

    // --- stack encoding helpers -------------------------------------------

    pub(crate) fn encode_ptr(&self, ptr: Pointer) -> [u8; 16] {
        let mut buf = [0u8; 16];
        buf[0..8].copy_from_slice(&ptr.generation.to_le_bytes());
        buf[8..16].copy_from_slice(&(ptr.reference as u64).to_le_bytes());
        buf
    }

    pub(crate) fn decode_ptr(&self, buf: &[u8; 16]) -> Pointer {
        let generation = i64::from_le_bytes(buf[0..8].try_into().unwrap());
        let address = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        Pointer {
            generation,
            reference: address as *mut u8,
        }
    }

    pub(crate) fn push_ptr(&mut self, ptr: Pointer) -> Result<()> {
        let buf = self.encode_ptr(ptr);
        self.stack.push(&buf)?;
        Ok(())
    }

    pub(crate) fn pop_ptr(&mut self) -> Result<Pointer> {
        let mut buf = [0u8; 16];
        self.stack.pop(&mut buf)?;
        Ok(self.decode_ptr(&buf))
    }

    /// Reads the top-of-stack pointer without popping it, for opcodes
    /// (such as `mutate-array`) that leave their pointer operand in place.
    pub(crate) fn peek_ptr(&self) -> Result<Pointer> {
        let mut buf = [0u8; 16];
        self.stack.get(0, &mut buf)?;
        Ok(self.decode_ptr(&buf))
    }

    pub(crate) fn push_region_handle(&mut self, handle: u64) -> Result<()> {
        self.stack.push(&handle.to_le_bytes())?;
        Ok(())
    }

    pub(crate) fn pop_region_handle(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.stack.pop(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    pub(crate) fn push_i32(&mut self, value: i32) -> Result<()> {
        self.stack.push(&value.to_le_bytes())?;
        Ok(())
    }

    pub(crate) fn pop_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.stack.pop(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    pub(crate) fn push_u32(&mut self, value: u32) -> Result<()> {
        self.stack.push(&value.to_le_bytes())?;
        Ok(())
    }

    pub(crate) fn pop_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.stack.pop(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub(crate) fn push_u8(&mut self, value: u8) -> Result<()> {
        self.stack.push(&[value])?;
        Ok(())
    }

    pub(crate) fn pop_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.stack.pop(&mut buf)?;
        Ok(buf[0])
    }

    /// The program image's data section, for bounds-checking sentinel
    /// pointer reads.
    pub(crate) fn data_section(&self) -> &[u8] {
        self.image.data_section()
    }

    /// Address of byte `offset` within the data section, as used by
    /// `load-from-data-section` to mint a sentinel pointer.
    pub(crate) fn data_section_ptr_at(&self, offset: usize) -> *mut u8 {
        // SAFETY: every caller (only `load-from-data-section`) passes an
        // `offset` the compiler has already proven lies within the data
        // section; `add` here never leaves the image's backing buffer.
        unsafe { self.image.data_section_ptr().cast_mut().add(offset) }
    }

    /// Posts a task directly, for opcodes (`write`) whose completion
    /// handler is ready immediately rather than gated on an external
    /// event.
    pub(crate) fn post_task(&mut self, handler: Handler) -> Result<()> {
        self.scheduler.post_task(handler)
    }

    /// Reads a length-prefixed string's payload bytes: a heap pointer's
    /// leading 8-byte length followed by that many bytes, or (for a
    /// sentinel pointer) every byte from the pointer through the end of
    /// the data section.
    pub(crate) fn read_string_bytes(&self, ptr: Pointer) -> Result<Vec<u8>> {
        if ptr.generation < 0 {
            let data = self.image.data_section();
            let end = data.as_ptr() as usize + data.len();
            let start = ptr.reference as usize;
            let len = end.saturating_sub(start);
            // SAFETY: `start` lies within `data` (sentinel pointers are
            // only ever minted from `data_section_ptr_at`), so `len` bytes
            // from it never run past the buffer's end.
            return Ok(unsafe { std::slice::from_raw_parts(ptr.reference, len) }.to_vec());
        }
        ptr.check()?;
        let mut len_buf = [0u8; 8];
        // SAFETY: `check` confirmed `ptr.reference` addresses a live
        // allocation, which always carries at least an 8-byte length
        // prefix for a string object.
        unsafe { std::ptr::copy_nonoverlapping(ptr.reference, len_buf.as_mut_ptr(), 8) };
        let len = u64::from_le_bytes(len_buf) as usize;
        // SAFETY: the allocation's payload is `len + 8` bytes by
        // construction of whatever opcode produced it.
        Ok(unsafe { std::slice::from_raw_parts(ptr.reference.add(8), len) }.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_with_code(code: &[u8]) -> ProgramImage {
        let mut bytes = 0u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(code);
        ProgramImage::parse(bytes).unwrap()
    }

    #[test]
    fn literal_and_halt_exits_with_status() {
        // literal 42, u8 literal 0, halt
        let code = [9u8, 42, 0, 0, 0, 25, 0, 11];
        let mut rt = Runtime::new(image_with_code(&code), Config::default());
        assert_eq!(rt.run().unwrap(), 0);
    }

    #[test]
    fn halt_propagates_nonzero_status() {
        let code = [25u8, 7, 11];
        let mut rt = Runtime::new(image_with_code(&code), Config::default());
        assert_eq!(rt.run().unwrap(), 7);
    }

    #[test]
    fn region_round_trip_allocates_and_frees() {
        let mut rt = Runtime::new(image_with_code(&[25, 0, 11]), Config::default());
        let handle = rt.new_region(64);
        let ptr = rt.region_mut(handle).unwrap().alloc_object(4).unwrap();
        ptr.check().unwrap();
        rt.free_region(handle).unwrap();
        assert!(matches!(
            rt.region_mut(handle),
            Err(Error::InvalidRegionHandle(_))
        ));
    }

    #[test]
    fn pointer_stack_round_trip() {
        let mut rt = Runtime::new(image_with_code(&[25, 0, 11]), Config::default());
        let handle = rt.new_region(64);
        let ptr = rt.region_mut(handle).unwrap().alloc_object(4).unwrap();
        rt.push_ptr(ptr).unwrap();
        let popped = rt.pop_ptr().unwrap();
        assert_eq!(popped, ptr);
    }
}
