//! The handler scheduler: a bounded LIFO queue of continuation tasks.
//!
//! A [`Handler`] is "resume at `code_offset` with these parameter bytes
//! pushed, then `env` pushed on top" — the whole of what it takes to
//! re-enter a suspended task. The [`Scheduler`] holding them is a plain
//! bounded stack: `post_task` appends, the drive loop in
//! [`crate::runtime::Runtime::run`] pops the most recently posted task
//! first. There is no fairness guarantee; the source language treats
//! handlers as callbacks, not coroutines.

use oxidex_mem::region::Pointer;

use crate::error::{Error, Result};

/// Default capacity of a [`Scheduler`]'s task queue, overridable by the
/// embedding CLI's `--max-handlers` flag.
pub const DEFAULT_MAX_HANDLERS: usize = 255;

/// Largest parameter a [`Handler`] can carry inline. The widest value ever
/// pushed as a task parameter is a generational [`Pointer`] (16 bytes); a
/// fixed buffer avoids a heap allocation per posted task.
pub const MAX_PARAM_BYTES: usize = 16;

/// A resumable continuation: where to resume, what to push first, and the
/// environment pointer to push after it.
#[derive(Debug, Clone, Copy)]
pub struct Handler {
    /// Code offset (relative to the start of the code section) to resume
    /// execution at.
    pub code_offset: u32,
    /// Inline storage for the parameter bytes; only the first
    /// [`Handler::param_size`] bytes are meaningful.
    param: [u8; MAX_PARAM_BYTES],
    /// How many bytes of `param` are valid.
    param_size: usize,
    /// The captured environment pointer, pushed after the parameter.
    pub env: Pointer,
}

impl Handler {
    /// Builds a handler from a parameter slice of at most
    /// [`MAX_PARAM_BYTES`] bytes.
    ///
    /// # Panics
    ///
    /// Panics if `param.len() > MAX_PARAM_BYTES`; every caller in this
    /// crate passes a size fixed by the opcode that produced it, never
    /// program-controlled.
    #[must_use]
    pub fn new(code_offset: u32, param: &[u8], env: Pointer) -> Self {
        assert!(param.len() <= MAX_PARAM_BYTES, "handler parameter too large");
        let mut buf = [0u8; MAX_PARAM_BYTES];
        buf[..param.len()].copy_from_slice(param);
        Handler {
            code_offset,
            param: buf,
            param_size: param.len(),
            env,
        }
    }

    /// The valid prefix of the inline parameter buffer.
    #[must_use]
    pub fn param_bytes(&self) -> &[u8] {
        &self.param[..self.param_size]
    }
}

/// A bounded LIFO queue of pending [`Handler`] tasks.
pub struct Scheduler {
    tasks: Vec<Handler>,
    capacity: usize,
}

impl Scheduler {
    /// Creates an empty scheduler that rejects `post_task` once `capacity`
    /// tasks are queued.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Scheduler {
            tasks: Vec::new(),
            capacity,
        }
    }

    /// Appends a task to the queue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchedulerFull`] if the queue already holds
    /// `capacity` tasks.
    pub fn post_task(&mut self, handler: Handler) -> Result<()> {
        if self.tasks.len() >= self.capacity {
            return Err(Error::SchedulerFull);
        }
        self.tasks.push(handler);
        Ok(())
    }

    /// Removes and returns the most recently posted task, if any.
    pub fn pop_task(&mut self) -> Option<Handler> {
        self.tasks.pop()
    }

    /// Whether the queue currently holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of tasks currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxidex_mem::region::STATIC_GENERATION;
    use std::ptr;

    fn sentinel_env() -> Pointer {
        Pointer {
            generation: STATIC_GENERATION,
            reference: ptr::null_mut(),
        }
    }

    #[test]
    fn post_and_pop_is_lifo() {
        let mut sched = Scheduler::new(4);
        sched.post_task(Handler::new(1, &[], sentinel_env())).unwrap();
        sched.post_task(Handler::new(2, &[], sentinel_env())).unwrap();
        sched.post_task(Handler::new(3, &[], sentinel_env())).unwrap();

        assert_eq!(sched.pop_task().unwrap().code_offset, 3);
        assert_eq!(sched.pop_task().unwrap().code_offset, 2);
        assert_eq!(sched.pop_task().unwrap().code_offset, 1);
        assert!(sched.pop_task().is_none());
    }

    #[test]
    fn post_task_fails_when_full() {
        let mut sched = Scheduler::new(2);
        sched.post_task(Handler::new(1, &[], sentinel_env())).unwrap();
        sched.post_task(Handler::new(2, &[], sentinel_env())).unwrap();
        assert_eq!(
            sched.post_task(Handler::new(3, &[], sentinel_env())).unwrap_err(),
            Error::SchedulerFull
        );
    }

    #[test]
    fn handler_carries_param_bytes() {
        let h = Handler::new(0, &[1, 2, 3, 4], sentinel_env());
        assert_eq!(h.param_bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn default_capacity_matches_spec() {
        assert_eq!(DEFAULT_MAX_HANDLERS, 255);
    }
}
