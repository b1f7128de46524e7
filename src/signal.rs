//! Signal routing for the init process.
//!
//! As PID 1 the init process gets no default signal handling from the kernel:
//! a signal without a handler is simply dropped. Instead of letting `SIGTERM`
//! and friends vanish, almost every signal is forwarded to the process group
//! of the sandboxed command. The exceptions are crash signals, which should
//! still kill the init process, the signals that cannot be caught, and the
//! terminal I/O signals, which are ignored since the command owns the
//! terminal.

use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};

use libc::{self, c_int};
use nix::errno::Errno;
use nix::sys::signal::{sigprocmask, SigSet, SigmaskHow, Signal};
use nix::unistd::Pid;

use error::*;

/// Signals left at their default disposition.
///
/// Crash signals must still kill us, `SIGKILL` and `SIGSTOP` cannot be
/// handled at all, and children are reaped by waiting instead of on
/// `SIGCHLD`.
const KEEP_DEFAULT: &[Signal] = &[
    Signal::SIGABRT,
    Signal::SIGBUS,
    Signal::SIGFPE,
    Signal::SIGILL,
    Signal::SIGSEGV,
    Signal::SIGSYS,
    Signal::SIGTRAP,
    Signal::SIGCHLD,
    Signal::SIGKILL,
    Signal::SIGSTOP,
];

/// Signals ignored outright.
const IGNORE: &[Signal] = &[Signal::SIGTTIN, Signal::SIGTTOU];

/// What happens to a signal delivered to the init process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Whatever the kernel does by default.
    Default,
    /// Discarded.
    Ignore,
    /// Sent on to the process group of the command.
    Forward,
}

impl Disposition {
    fn of(signum: c_int) -> Disposition {
        let listed = |signals: &[Signal]| signals.iter().any(|&signal| signal as c_int == signum);

        if listed(KEEP_DEFAULT) {
            Disposition::Default
        } else if listed(IGNORE) {
            Disposition::Ignore
        } else {
            Disposition::Forward
        }
    }
}

/// The process group that forwarded signals go to.
///
/// Signal handlers cannot capture anything, so the handler reads the one
/// instance of this, returned by [`ForwardTarget::get`]. It is written once,
/// when the command is spawned, and only read afterwards.
#[derive(Debug)]
pub struct ForwardTarget {
    pgid: AtomicI32,
}

static FORWARD_TARGET: ForwardTarget = ForwardTarget {
    pgid: AtomicI32::new(0),
};

impl ForwardTarget {
    /// The target read by the forwarding handler.
    pub fn get() -> &'static ForwardTarget {
        &FORWARD_TARGET
    }

    /// Forward from now on to the process group led by `leader`.
    pub fn set(&self, leader: Pid) {
        self.pgid.store(leader.as_raw(), Ordering::SeqCst);
    }

    /// The process group leader signals are forwarded to, if there is one yet.
    pub fn leader(&self) -> Option<Pid> {
        match self.pgid.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(Pid::from_raw(pid)),
        }
    }

    /// Send `signum` to the whole target process group.
    ///
    /// Signals that arrive before a target exists are dropped; `kill(0, ...)`
    /// would otherwise deliver them to our own group.
    fn forward(&self, signum: c_int) {
        let pgid = self.pgid.load(Ordering::SeqCst);
        if pgid > 0 {
            unsafe {
                libc::kill(-pgid, signum);
            }
        }
    }
}

extern "C" fn forward_signal(signum: c_int) {
    FORWARD_TARGET.forward(signum);
}

/// The largest valid signal number, including real-time signals.
fn max_signal() -> c_int {
    libc::SIGRTMAX()
}

/// The disposition of every signal number, decided once at startup.
#[derive(Debug, Clone)]
pub struct DispositionTable {
    entries: Vec<(c_int, Disposition)>,
}

impl DispositionTable {
    /// Build the table for every signal the kernel knows.
    pub fn new() -> DispositionTable {
        let entries = (1..max_signal() + 1)
            .map(|signum| (signum, Disposition::of(signum)))
            .collect();

        DispositionTable { entries }
    }

    /// The disposition of `signum`, if it is a valid signal number.
    pub fn get(&self, signum: c_int) -> Option<Disposition> {
        self.entries
            .iter()
            .find(|&&(number, _)| number == signum)
            .map(|&(_, disposition)| disposition)
    }

    /// Reset everything and apply the table, forwarding to `target`.
    ///
    /// Handlers that cannot be installed are skipped; many signal numbers are
    /// reserved by the C library.
    pub fn install(&self, target: &'static ForwardTarget) {
        debug_assert!(ptr::eq(target, ForwardTarget::get()));
        restore_defaults();

        for &(signum, disposition) in &self.entries {
            let result = match disposition {
                Disposition::Default => continue,
                Disposition::Ignore => set_action(signum, libc::SIG_IGN, &SigSet::empty()),
                Disposition::Forward => set_action(
                    signum,
                    forward_signal as extern "C" fn(c_int) as libc::sighandler_t,
                    &SigSet::all(),
                ),
            };

            if let Err(errno) = result {
                debug!("sigaction({}, {:?}) failed: {}", signum, disposition, errno);
            }
        }
    }
}

/// Unblock every signal and restore every default handler.
///
/// Used for a clean start before installing the table, and again in the
/// spawned command so that it sees ordinary signal semantics.
pub fn restore_defaults() {
    sigprocmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None)
        .or_die("sigprocmask(SIG_SETMASK, <empty set>, NULL)");

    let empty = SigSet::empty();
    for signum in 1..max_signal() + 1 {
        // Some handlers cannot be changed; try them all anyway.
        let _ = set_action(signum, libc::SIG_DFL, &empty);
    }
}

/// Install `handler` for `signum`, blocking `mask` while it runs.
fn set_action(signum: c_int, handler: libc::sighandler_t, mask: &SigSet) -> ::nix::Result<()> {
    let mut action: libc::sigaction = unsafe { mem::zeroed() };
    action.sa_sigaction = handler;
    action.sa_mask = *mask.as_ref();

    let ret = unsafe { libc::sigaction(signum, &action, ptr::null_mut()) };
    Errno::result(ret).map(drop)
}
