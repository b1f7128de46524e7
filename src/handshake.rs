//! Liveness handshake between the launcher and the init process.
//!
//! The launcher creates a pipe before cloning. Once the init process has asked to be killed
//! with its parent it writes a single byte and closes both ends; the launcher blocks on its
//! read end until the byte (or end-of-file) arrives. Either way the launcher then knows that
//! it was still alive after the registration, so the sandbox can never outlive it.

use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::prctl;
use nix::sys::signal::Signal;
use nix::unistd::{close, pipe2, read, write};

use error::*;

/// Both ends of the synchronisation pipe.
#[derive(Debug)]
pub struct SyncPipe {
    read: OwnedFd,
    write: OwnedFd,
}

impl SyncPipe {
    /// Create a new pipe.
    ///
    /// Both ends are close-on-exec so the sandboxed command never sees them.
    pub fn new() -> Result<SyncPipe> {
        let (read, write) = pipe2(OFlag::O_CLOEXEC)?;
        Ok(SyncPipe { read, write })
    }

    /// The raw descriptors of the read and write ends.
    pub fn raw_fds(&self) -> (RawFd, RawFd) {
        (self.read.as_raw_fd(), self.write.as_raw_fd())
    }

    /// Take ownership of a pipe from raw descriptors.
    ///
    /// This is how the init process adopts its copy of the pipe after `clone`.
    pub unsafe fn from_raw_fds((read, write): (RawFd, RawFd)) -> SyncPipe {
        SyncPipe {
            read: OwnedFd::from_raw_fd(read),
            write: OwnedFd::from_raw_fd(write),
        }
    }

    /// Tell the launcher that the init process is alive.
    ///
    /// Called from inside the sandbox. Any failure is fatal.
    pub fn signal_alive(self) {
        close(self.read.into_raw_fd()).or_die("close");
        write(&self.write, &[0]).or_die("write");
        close(self.write.into_raw_fd()).or_die("close");
    }

    /// Block until the init process has written its byte or closed the pipe.
    pub fn wait_alive(self) -> Result<()> {
        close(self.write.into_raw_fd())?;
        let read_fd = self.read.into_raw_fd();
        let mut buf = [0; 1];
        let received = loop {
            match read(read_fd, &mut buf) {
                Err(Errno::EINTR) => continue,
                result => break result,
            }
        };
        close(read_fd)?;
        received?;
        Ok(())
    }
}

/// Ask the kernel to kill this process when its parent dies.
pub fn die_with_parent() -> ::nix::Result<()> {
    prctl::set_pdeathsig(Signal::SIGKILL)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread::sleep;
    use std::time::Duration;

    use libc;
    use nix::sys::wait::{waitpid, WaitStatus};
    use nix::unistd::{fork, ForkResult};

    #[test]
    fn parent_sees_liveness() {
        let pipe = SyncPipe::new().unwrap();
        let fds = pipe.raw_fds();

        match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                let pipe = unsafe { SyncPipe::from_raw_fds(fds) };
                pipe.signal_alive();
                exit_now(0);
            }
            ForkResult::Parent { child } => {
                pipe.wait_alive().unwrap();
                assert_eq!(waitpid(child, None).unwrap(), WaitStatus::Exited(child, 0));
            }
        }
    }

    extern "C" fn interrupt(_: libc::c_int) {}

    #[test]
    fn interrupted_wait_keeps_waiting() {
        // No SA_RESTART, so the blocked read fails with EINTR.
        let mut action: libc::sigaction = unsafe { ::std::mem::zeroed() };
        action.sa_sigaction = interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t;
        assert_eq!(unsafe { libc::sigaction(libc::SIGUSR1, &action, ::std::ptr::null_mut()) }, 0);

        let pipe = SyncPipe::new().unwrap();
        let fds = pipe.raw_fds();
        let parent = unsafe { libc::getpid() };
        let waiter = unsafe { libc::gettid() };

        match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                let pipe = unsafe { SyncPipe::from_raw_fds(fds) };
                sleep(Duration::from_millis(100));
                unsafe { libc::syscall(libc::SYS_tgkill, parent, waiter, libc::SIGUSR1) };
                sleep(Duration::from_millis(50));
                pipe.signal_alive();
                exit_now(0);
            }
            ForkResult::Parent { child } => {
                pipe.wait_alive().unwrap();
                assert_eq!(waitpid(child, None).unwrap(), WaitStatus::Exited(child, 0));
            }
        }
    }

    #[test]
    fn eof_counts_as_alive() {
        let pipe = SyncPipe::new().unwrap();
        match unsafe { fork() }.unwrap() {
            ForkResult::Child => exit_now(0),
            ForkResult::Parent { child } => {
                waitpid(child, None).unwrap();
                pipe.wait_alive().unwrap();
            }
        }
    }
}
