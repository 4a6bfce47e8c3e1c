//! The host side of the async stdin bridge (§4.7): putting standard input
//! into non-blocking mode, polling it for readiness, and draining
//! whatever is currently available without blocking. Standard output and
//! standard error writes are synchronous `write(2)` calls; their
//! completion handlers are posted immediately by the caller.

use std::io::{self, Read, Write};
use std::os::unix::io::RawFd;

use crate::error::{Error, Result};

/// Default interval, in milliseconds, the drive loop waits between polls
/// of stdin while a task is waiting on it and the scheduler is otherwise
/// idle. Overridable by the embedding CLI's `--stdin-poll-ms` flag.
pub const DEFAULT_POLL_MS: u64 = 10;

/// Puts `fd` into non-blocking mode.
///
/// # Errors
///
/// Propagates whatever `fcntl` reports.
pub fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    // SAFETY: `fd` is a valid, open file descriptor for the lifetime of
    // this call; `fcntl` with `F_GETFL`/`F_SETFL` neither reads nor writes
    // through any pointer we own.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Polls `fd` for readability, waiting at most `timeout_ms` milliseconds.
///
/// # Errors
///
/// Propagates whatever `poll(2)` reports, other than being interrupted by
/// a signal (treated as "not yet readable").
pub fn poll_readable(fd: RawFd, timeout_ms: i32) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: `pfd` is a single, stack-local, correctly initialized
    // `pollfd` and `1` is its element count.
    let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(rc > 0 && pfd.revents & libc::POLLIN != 0)
}

/// Drains every byte currently available on a non-blocking reader without
/// blocking once it would need to wait for more.
///
/// # Errors
///
/// Propagates any I/O error other than `WouldBlock`.
pub fn read_available(mut reader: impl Read) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => return Err(e),
        }
    }
    Ok(out)
}

/// Writes `bytes` to the channel named by `write`'s mode byte: `0` for
/// stdout, `1` for stderr.
///
/// # Errors
///
/// Returns [`Error::WriteModeInvalid`] for any other mode byte.
pub fn write_channel(mode: u8, bytes: &[u8]) -> Result<()> {
    match mode {
        0 => {
            let _ = io::stdout().write_all(bytes);
        }
        1 => {
            let _ = io::stderr().write_all(bytes);
        }
        other => return Err(Error::WriteModeInvalid(other)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_available_drains_a_plain_reader() {
        let cursor = Cursor::new(b"hello".to_vec());
        let bytes = read_available(cursor).unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn write_channel_rejects_unknown_mode() {
        assert_eq!(write_channel(7, b"x").unwrap_err(), Error::WriteModeInvalid(7));
    }
}
