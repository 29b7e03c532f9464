use anyhow::{anyhow, Result};
use std::io::{self, ErrorKind};
use std::os::unix::io::RawFd;
use std::time::Duration;

use crate::log_debug;

/// Result of a single read from the PTY or the real stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Data(usize),
    /// Nothing to read right now (spurious wakeup, EINTR or EAGAIN).
    Pending,
    /// End of stream or an OS error; the other side is gone.
    Closed,
}

fn should_retry_read_error(err: &io::Error) -> bool {
    err.kind() == ErrorKind::Interrupted || err.kind() == ErrorKind::WouldBlock
}

/// One `read(2)` into `buffer`.
pub fn read_fd(fd: RawFd, buffer: &mut [u8]) -> ReadOutcome {
    // SAFETY: buffer is valid for writes of buffer.len() bytes.
    let n = unsafe { libc::read(fd, buffer.as_mut_ptr() as *mut libc::c_void, buffer.len()) };
    if n > 0 {
        return ReadOutcome::Data(n as usize);
    }
    if n == 0 {
        return ReadOutcome::Closed;
    }
    let err = io::Error::last_os_error();
    if should_retry_read_error(&err) {
        return ReadOutcome::Pending;
    }
    // Linux reports EIO on the controller once the child side is closed.
    if err.raw_os_error() != Some(libc::EIO) {
        log_debug(&format!("read({fd}) failed: {err}"));
    }
    ReadOutcome::Closed
}

/// One non-blocking `write(2)`. Returns how many bytes the kernel took; 0 when it would block.
pub fn write_some(fd: RawFd, data: &[u8]) -> Result<usize> {
    if data.is_empty() {
        return Ok(0);
    }
    // SAFETY: data is valid for reads of data.len() bytes.
    let written = unsafe { libc::write(fd, data.as_ptr() as *const libc::c_void, data.len()) };
    if written >= 0 {
        return Ok(written as usize);
    }
    let err = io::Error::last_os_error();
    if should_retry_read_error(&err) {
        return Ok(0);
    }
    Err(anyhow!("write to PTY failed: {err}"))
}

/// What a descriptor handed to [`poll_fds`] is waited on for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write,
}

/// Readiness of the fds handed to [`poll_fds`], in the same order.
pub type Readiness = Vec<bool>;

/// Wait up to `timeout` for any entry to become ready. Hangup and error count as ready so
/// the caller's next read or write observes them.
///
/// EINTR (for example from SIGWINCH) counts as "nothing ready".
pub fn poll_fds(entries: &[(RawFd, Interest)], timeout: Duration) -> Result<Readiness> {
    let mut pollfds: Vec<libc::pollfd> = entries
        .iter()
        .map(|&(fd, interest)| libc::pollfd {
            fd,
            events: match interest {
                Interest::Read => libc::POLLIN,
                Interest::Write => libc::POLLOUT,
            },
            revents: 0,
        })
        .collect();
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
    // SAFETY: pollfds is a valid array of pollfd for its whole length.
    let ready = unsafe {
        libc::poll(
            pollfds.as_mut_ptr(),
            pollfds.len() as libc::nfds_t,
            timeout_ms,
        )
    };
    if ready < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == ErrorKind::Interrupted {
            return Ok(vec![false; entries.len()]);
        }
        return Err(anyhow!("poll failed: {err}"));
    }
    Ok(pollfds
        .iter()
        .map(|pfd| pfd.revents & (pfd.events | libc::POLLHUP | libc::POLLERR) != 0)
        .collect())
}

/// [`poll_fds`] with every descriptor waited on for input.
pub fn poll_readable(fds: &[RawFd], timeout: Duration) -> Result<Readiness> {
    let entries: Vec<(RawFd, Interest)> = fds.iter().map(|&fd| (fd, Interest::Read)).collect();
    poll_fds(&entries, timeout)
}
