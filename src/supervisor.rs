//! Spawning and reaping the sandboxed command.
//!
//! The command is the only process the init process ever creates. After it is
//! spawned the init process does nothing but wait: for the command, and for
//! every orphan in the sandbox that gets reparented to PID 1. Only the
//! command's termination matters; once it is gone the init process exits
//! with a matching code and the kernel tears down the rest of the namespace.

use std::ffi::CString;
use std::os::unix::io::BorrowedFd;

use libc::{self, c_int};
use nix::errno::Errno;
use nix::sys::stat::{umask, Mode};
use nix::unistd::{execvp, fork, getpgrp, setpgid, tcsetpgrp, ForkResult, Pid};

use error::*;
use signal::{self, ForwardTarget};

/// File creation mask of the command: output is readable by everyone.
const COMMAND_UMASK: u32 = 0o022;

/// How the command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// It exited with a status code.
    Exited(c_int),
    /// It was killed by a signal.
    Signaled(c_int),
}

impl Termination {
    /// Decode a raw `wait(2)` status.
    ///
    /// Returns `None` for statuses that do not mean the process is gone.
    pub fn from_status(status: c_int) -> Option<Termination> {
        if libc::WIFEXITED(status) {
            Some(Termination::Exited(libc::WEXITSTATUS(status)))
        } else if libc::WIFSIGNALED(status) {
            Some(Termination::Signaled(libc::WTERMSIG(status)))
        } else {
            None
        }
    }

    /// The exit code the init process passes on: the command's own code, or
    /// `128 + N` for a command killed by signal `N`.
    pub fn exit_code(&self) -> c_int {
        match *self {
            Termination::Exited(code) => code,
            Termination::Signaled(signal) => 128 + signal,
        }
    }
}

/// The running command.
///
/// Holding one of these means the command has been spawned; [`Child::supervise`]
/// is the only way to get rid of it and it does not return.
#[derive(Debug)]
pub struct Child {
    pid: Pid,
}

impl Child {
    /// The PID of the command.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Reap everything until the command terminates, then exit accordingly.
    pub fn supervise(self) -> ! {
        if let Some(leader) = ForwardTarget::get().leader() {
            debug!("forwarding signals to process group {}", leader);
        }
        let termination = reap_until(self.pid(), wait_any);
        match termination {
            Termination::Signaled(signal) => debug!("child died due to signal {}", signal),
            Termination::Exited(code) => debug!("child exited with code {}", code),
        }
        exit_now(termination.exit_code())
    }
}

/// Spawn `command` as the leader of a new process group.
///
/// Returns in the init process only. The forked side either becomes the
/// command or dies.
pub fn spawn(command: &[String], target: &'static ForwardTarget) -> Child {
    // Everything the forked side needs is prepared before the fork.
    let argv = command
        .iter()
        .map(|arg| CString::new(arg.as_str()))
        .collect::<::std::result::Result<Vec<_>, _>>()
        .unwrap_or_else(|_| fatal!("argument contains a NUL byte: {:?}", command));
    if argv.is_empty() {
        fatal!("no command to run");
    }

    match unsafe { fork() }.or_die("fork()") {
        ForkResult::Child => exec_command(&argv),
        ForkResult::Parent { child } => {
            target.set(child);
            Child { pid: child }
        }
    }
}

/// Turn the forked process into the command.
fn exec_command(argv: &[CString]) -> ! {
    let zero = Pid::from_raw(0);
    setpgid(zero, zero).or_die("setpgid");

    // There is no terminal to take over when stdin is not one.
    let stdin = unsafe { BorrowedFd::borrow_raw(libc::STDIN_FILENO) };
    tcsetpgrp(stdin, getpgrp()).tolerate(&[Errno::ENOTTY], "tcsetpgrp");

    signal::restore_defaults();
    umask(Mode::from_bits_truncate(COMMAND_UMASK));

    let never = execvp(&argv[0], argv).or_die(format_args!("execvp({:?})", argv[0]));
    match never {}
}

/// Wait for any child process to change state.
fn wait_any() -> ::nix::Result<(Pid, c_int)> {
    let mut status = 0;
    let pid = Errno::result(unsafe { libc::waitpid(-1, &mut status, 0) })?;
    Ok((Pid::from_raw(pid), status))
}

/// Reap children with `wait` until `primary` terminates.
///
/// Other children are reaped and otherwise ignored. Interrupted waits are
/// retried; any other failure is fatal.
pub fn reap_until<W>(primary: Pid, mut wait: W) -> Termination
where
    W: FnMut() -> ::nix::Result<(Pid, c_int)>,
{
    loop {
        let (pid, status) = match wait() {
            Ok(reaped) => reaped,
            // A forwarded or ignored signal interrupted us.
            Err(Errno::EINTR) => continue,
            Err(errno) => die(::std::panic::Location::caller(), &"waitpid", Some(&errno)),
        };
        debug!("waitpid returned {}", pid);

        if pid == primary {
            if let Some(termination) = Termination::from_status(status) {
                return termination;
            }
        }
    }
}
