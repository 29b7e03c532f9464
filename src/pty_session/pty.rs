//! Pseudo-terminal allocation and the supervised child process.

use anyhow::{anyhow, Context, Result};
use std::ffi::CString;
use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::ptr;

use super::io::{read_fd, write_some, ReadOutcome};
use crate::log_debug;

/// Controller and child ends of a freshly opened PTY. Both ends close on drop.
pub struct PtyPair {
    pub controller: RawFd,
    pub child: RawFd,
}

impl PtyPair {
    fn take_child(&mut self) -> RawFd {
        mem::replace(&mut self.child, -1)
    }

    fn take_controller(&mut self) -> RawFd {
        mem::replace(&mut self.controller, -1)
    }
}

impl Drop for PtyPair {
    fn drop(&mut self) {
        // SAFETY: both fds come from openpty and are only closed here or after take_*.
        unsafe {
            close_fd(self.controller);
            close_fd(self.child);
        }
    }
}

/// Open a PTY pair sized `rows` x `cols`.
pub fn allocate_pty(rows: u16, cols: u16) -> Result<PtyPair> {
    let mut controller: RawFd = -1;
    let mut child: RawFd = -1;

    // SAFETY: libc::winsize is a plain C struct; zeroed is a valid baseline.
    let mut winsize: libc::winsize = unsafe { mem::zeroed() };
    winsize.ws_row = rows.max(1);
    winsize.ws_col = cols.max(1);

    #[allow(clippy::unnecessary_mut_passed)]
    // SAFETY: openpty expects valid pointers for controller/child/winsize; we pass stack locals.
    let result = unsafe {
        libc::openpty(
            &mut controller,
            &mut child,
            ptr::null_mut(),
            ptr::null_mut(),
            &mut winsize,
        )
    };
    if result != 0 {
        return Err(errno_error("openpty failed"));
    }
    Ok(PtyPair { controller, child })
}

/// A child process whose stdio is the child side of a PTY we own.
pub struct PtySession {
    controller_fd: RawFd,
    child_pid: i32,
    exit_status: Option<ExitStatus>,
}

impl PtySession {
    /// Spawn `argv` on a new PTY. Exec failures are reported here, not as a dead child.
    pub fn spawn(argv: &[String], rows: u16, cols: u16) -> Result<Self> {
        let program = argv
            .first()
            .ok_or_else(|| anyhow!("no command to spawn"))?;
        let c_argv = argv
            .iter()
            .map(|arg| {
                CString::new(arg.as_str())
                    .with_context(|| format!("command argument contains NUL byte: {arg}"))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut argv_ptrs: Vec<*const libc::c_char> = c_argv.iter().map(|s| s.as_ptr()).collect();
        argv_ptrs.push(ptr::null());

        let mut pair = allocate_pty(rows, cols)?;
        let (status_read, status_write) = cloexec_pipe()?;

        // SAFETY: the loop is single-threaded when we fork; the child only calls
        // async-signal-safe functions before exec.
        let pid = unsafe { libc::fork() };
        if pid < 0 {
            // SAFETY: both pipe ends are open and owned here.
            unsafe {
                close_fd(status_read);
                close_fd(status_write);
            }
            return Err(errno_error("fork failed"));
        }

        if pid == 0 {
            // SAFETY: we are in the forked child.
            unsafe {
                close_fd(status_read);
                child_exec(pair.child, pair.controller, &argv_ptrs, status_write);
            }
        }

        // SAFETY: the parent no longer needs the write end or the child side.
        unsafe {
            close_fd(status_write);
            close_fd(pair.take_child());
        }
        let exec_errno = read_exec_status(status_read);
        // SAFETY: status_read is open and owned here.
        unsafe { close_fd(status_read) };

        if let Some(errno) = exec_errno {
            let mut status = 0;
            // SAFETY: pid is our child; it has already called _exit.
            unsafe { libc::waitpid(pid, &mut status, 0) };
            return Err(anyhow!(
                "failed to start {program}: {}",
                io::Error::from_raw_os_error(errno)
            ));
        }

        let controller_fd = pair.take_controller();
        // SAFETY: controller_fd is open and owned by the session from here on.
        let configured =
            unsafe { set_nonblocking(controller_fd).and_then(|()| set_cloexec(controller_fd)) };
        if let Err(err) = configured {
            unsafe { close_fd(controller_fd) };
            return Err(err);
        }
        log_debug(&format!("spawned {program} as pid {pid} ({cols}x{rows})"));
        Ok(Self {
            controller_fd,
            child_pid: pid,
            exit_status: None,
        })
    }

    pub fn controller_fd(&self) -> RawFd {
        self.controller_fd
    }

    pub fn child_pid(&self) -> i32 {
        self.child_pid
    }

    pub fn read_chunk(&self, buffer: &mut [u8]) -> ReadOutcome {
        read_fd(self.controller_fd, buffer)
    }

    /// Offer bytes to the child's input side without blocking. Returns how many the
    /// kernel accepted, which is 0 while the PTY input queue is full.
    pub fn try_send(&self, bytes: &[u8]) -> Result<usize> {
        write_some(self.controller_fd, bytes)
    }

    /// Update the PTY window size; the kernel notifies the child's foreground group.
    pub fn set_winsize(&self, rows: u16, cols: u16) -> Result<()> {
        // SAFETY: libc::winsize is a plain C struct; zeroed is a valid baseline.
        let mut ws: libc::winsize = unsafe { mem::zeroed() };
        ws.ws_row = rows.max(1);
        ws.ws_col = cols.max(1);
        // SAFETY: ioctl reads ws and targets the controller fd owned by this session.
        let result = unsafe { libc::ioctl(self.controller_fd, libc::TIOCSWINSZ, &ws) };
        if result != 0 {
            return Err(errno_error("ioctl(TIOCSWINSZ) failed"));
        }
        Ok(())
    }

    /// Current PTY size as (rows, cols).
    pub fn winsize(&self) -> Option<(u16, u16)> {
        // SAFETY: libc::winsize is a plain C struct; zeroed is a valid baseline.
        let mut ws: libc::winsize = unsafe { mem::zeroed() };
        // SAFETY: ioctl writes into ws for the controller fd owned by this session.
        let result = unsafe { libc::ioctl(self.controller_fd, libc::TIOCGWINSZ, &mut ws) };
        (result == 0).then_some((ws.ws_row, ws.ws_col))
    }

    /// Non-blocking check for child exit; reaps the child on completion.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        if let Some(status) = self.exit_status {
            return Ok(Some(status));
        }
        let mut status = 0;
        // SAFETY: child_pid is owned by this session; WNOHANG never blocks.
        let ret = unsafe { libc::waitpid(self.child_pid, &mut status, libc::WNOHANG) };
        if ret == 0 {
            return Ok(None);
        }
        if ret < 0 {
            return Err(errno_error("waitpid failed"));
        }
        let status = ExitStatus::from_raw(status);
        self.exit_status = Some(status);
        Ok(Some(status))
    }

    /// Block until the child exits. Returns the cached status if already reaped.
    pub fn wait(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }
        let mut status = 0;
        loop {
            // SAFETY: child_pid is owned by this session.
            let ret = unsafe { libc::waitpid(self.child_pid, &mut status, 0) };
            if ret >= 0 {
                break;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(anyhow!("waitpid({}) failed: {err}", self.child_pid));
            }
        }
        let status = ExitStatus::from_raw(status);
        self.exit_status = Some(status);
        Ok(status)
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        // SAFETY: controller_fd is owned by this session. Closing it hangs up the child side.
        unsafe { close_fd(self.controller_fd) };
        if self.exit_status.is_none() {
            let mut status = 0;
            // SAFETY: best-effort, non-blocking reap of our own child.
            let ret = unsafe { libc::waitpid(self.child_pid, &mut status, libc::WNOHANG) };
            if ret == 0 {
                log_debug(&format!(
                    "pid {} still running after PTY closed",
                    self.child_pid
                ));
            }
        }
    }
}

/// Child process setup after fork: takes the PTY as controlling terminal and execs.
///
/// # Safety
///
/// Must only be called in the child process after `fork()`. Never returns: it either
/// replaces the process image or reports errno on `status_fd` and calls `_exit(127)`.
unsafe fn child_exec(
    child_fd: RawFd,
    controller_fd: RawFd,
    argv: &[*const libc::c_char],
    status_fd: RawFd,
) -> ! {
    close_fd(controller_fd);
    if libc::setsid() == -1 {
        report_exec_failure(status_fd);
    }
    if libc::ioctl(child_fd, libc::TIOCSCTTY as libc::c_ulong, 0) == -1 {
        report_exec_failure(status_fd);
    }
    if libc::dup2(child_fd, libc::STDIN_FILENO) < 0
        || libc::dup2(child_fd, libc::STDOUT_FILENO) < 0
        || libc::dup2(child_fd, libc::STDERR_FILENO) < 0
    {
        report_exec_failure(status_fd);
    }
    if child_fd > libc::STDERR_FILENO {
        close_fd(child_fd);
    }
    // The Rust runtime ignores SIGPIPE; the child should get the default.
    libc::signal(libc::SIGPIPE, libc::SIG_DFL);

    libc::execvp(argv[0], argv.as_ptr());
    report_exec_failure(status_fd);
}

/// Send errno to the parent and exit without running any Rust cleanup.
///
/// # Safety
///
/// Only for the forked child; `status_fd` must be the write end of the status pipe.
unsafe fn report_exec_failure(status_fd: RawFd) -> ! {
    let errno = io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO);
    let bytes = errno.to_ne_bytes();
    let _ = libc::write(status_fd, bytes.as_ptr() as *const libc::c_void, bytes.len());
    libc::_exit(127);
}

/// Pipe whose ends close on exec, so a successful exec reads as EOF in the parent.
fn cloexec_pipe() -> Result<(RawFd, RawFd)> {
    let mut fds = [-1; 2];
    // SAFETY: fds is a two-element array as pipe() requires.
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(errno_error("pipe failed"));
    }
    for fd in fds {
        // SAFETY: fd was just returned by pipe().
        if let Err(err) = unsafe { set_cloexec(fd) } {
            unsafe {
                close_fd(fds[0]);
                close_fd(fds[1]);
            }
            return Err(err);
        }
    }
    Ok((fds[0], fds[1]))
}

/// Errno written by a child whose exec failed, or `None` once exec succeeded.
fn read_exec_status(fd: RawFd) -> Option<i32> {
    let mut bytes = [0u8; mem::size_of::<i32>()];
    let mut filled = 0;
    while filled < bytes.len() {
        // SAFETY: the destination range lies inside `bytes`.
        let n = unsafe {
            libc::read(
                fd,
                bytes[filled..].as_mut_ptr() as *mut libc::c_void,
                bytes.len() - filled,
            )
        };
        if n > 0 {
            filled += n as usize;
            continue;
        }
        if n < 0 && io::Error::last_os_error().kind() == io::ErrorKind::Interrupted {
            continue;
        }
        break;
    }
    (filled == bytes.len()).then(|| i32::from_ne_bytes(bytes))
}

/// Configure an fd for non-blocking reads.
///
/// # Safety
///
/// `fd` must be a valid, open file descriptor.
pub(super) unsafe fn set_nonblocking(fd: RawFd) -> Result<()> {
    let flags = libc::fcntl(fd, libc::F_GETFL, 0);
    if flags < 0 {
        return Err(errno_error("fcntl(F_GETFL) failed"));
    }
    if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
        return Err(errno_error("fcntl(F_SETFL) failed"));
    }
    Ok(())
}

/// Keep `fd` out of processes we exec later, such as indicator commands.
///
/// # Safety
///
/// `fd` must be a valid, open file descriptor.
unsafe fn set_cloexec(fd: RawFd) -> Result<()> {
    let flags = libc::fcntl(fd, libc::F_GETFD, 0);
    if flags < 0 || libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) < 0 {
        return Err(errno_error("fcntl(FD_CLOEXEC) failed"));
    }
    Ok(())
}

/// Helper that formats OS errors with additional context.
pub(super) fn errno_error(context: &str) -> anyhow::Error {
    anyhow!("{context}: {}", io::Error::last_os_error())
}

/// Close a file descriptor while ignoring errors.
///
/// # Safety
///
/// `fd` must be a valid, open file descriptor (or negative to ignore).
pub(super) unsafe fn close_fd(fd: RawFd) {
    if fd >= 0 {
        let _ = libc::close(fd);
    }
}
