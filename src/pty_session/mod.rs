//! Minimal PTY layer: allocate a pair, run the child on it, and move bytes with plain
//! `read`/`write`/`poll`. Everything OS-specific about the child lives here.

mod io;
mod pty;


pub use io::{poll_fds, poll_readable, read_fd, write_some, Interest, ReadOutcome, Readiness};
pub use pty::{allocate_pty, PtyPair, PtySession};
