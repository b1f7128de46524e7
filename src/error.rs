//! Error handling.
//!
//! There are two kinds of failure in this crate. Errors that happen before the sandbox exists
//! (loading options, cloning the init process) are ordinary `error-chain` errors and are
//! reported by the caller. Everything that runs inside the sandbox as PID 1 has nobody to report
//! to, so a failed system call there ends the process on the spot through [`Fatal`].

use std::fmt::Display;
use std::io::{self, Write};
use std::panic::Location;

use libc;
use nix::errno::Errno;

error_chain! {
    foreign_links {
        Io(::std::io::Error);
        Nix(::nix::Error);
        Toml(::toml::de::Error);
    }

    errors {
        EmptyCommand {
            description("no command given")
            display("no command was given to run in the sandbox")
        }
        ConflictingIdentity {
            description("conflicting identities")
            display("cannot run as both root and nobody")
        }
        MissingWorkingDirectory {
            description("no working directory")
            display("no working directory was given")
        }
        UnpairedBindMount(sources: usize, targets: usize) {
            description("unpaired bind mount")
            display("{} bind mount sources given for {} targets", sources, targets)
        }
        Clone {
            description("clone failed")
            display("could not create the sandbox init process")
        }
    }
}

/// Exit code used whenever setup inside the sandbox fails.
pub const FATAL_EXIT_CODE: i32 = 1;

/// Report a failed operation and leave immediately.
///
/// The message has the form `<file>:<line>: "<operation>": <error>`. The process exits without
/// unwinding; nothing inside the sandbox needs cleaning up once PID 1 is gone.
pub fn die(location: &Location, operation: &Display, error: Option<&Display>) -> ! {
    let stderr = io::stderr();
    let mut stderr = stderr.lock();
    let _ = match error {
        Some(error) => writeln!(
            stderr,
            "{}:{}: \"{}\": {}",
            location.file(),
            location.line(),
            operation,
            error,
        ),
        None => writeln!(
            stderr,
            "{}:{}: \"{}\"",
            location.file(),
            location.line(),
            operation,
        ),
    };
    exit_now(FATAL_EXIT_CODE)
}

/// Terminate the calling process without running any destructors or exit handlers.
pub fn exit_now(code: i32) -> ! {
    unsafe { libc::_exit(code) }
}

/// Die with a formatted message from the calling location.
macro_rules! fatal {
    ($($arg:tt)*) => {
        $crate::error::die(
            ::std::panic::Location::caller(),
            &format_args!($($arg)*),
            None,
        )
    }
}

/// Failures that carry an `errno`.
pub trait SystemError: Display {
    /// The underlying error number, if there is one.
    fn errno(&self) -> Option<Errno>;
}

impl SystemError for Errno {
    fn errno(&self) -> Option<Errno> {
        Some(*self)
    }
}

impl SystemError for io::Error {
    fn errno(&self) -> Option<Errno> {
        self.raw_os_error().map(Errno::from_raw)
    }
}

/// Conversion of a failed system call into process termination.
///
/// Every operation run as PID 1 goes through one of these. Either it succeeds, fails in one of
/// the narrow ways the caller explicitly accepts, or the process dies with a diagnostic naming
/// the operation and the call site.
pub trait Fatal<T> {
    /// Unwrap the result or die.
    fn or_die<D: Display>(self, operation: D) -> T;

    /// Unwrap the result, accepting the listed error numbers as `None`.
    ///
    /// Accepted failures are only logged at debug level.
    fn tolerate<D: Display>(self, tolerated: &[Errno], operation: D) -> Option<T>;
}

impl<T, E: SystemError> Fatal<T> for ::std::result::Result<T, E> {
    #[track_caller]
    fn or_die<D: Display>(self, operation: D) -> T {
        match self {
            Ok(value) => value,
            Err(error) => die(Location::caller(), &operation, Some(&error)),
        }
    }

    #[track_caller]
    fn tolerate<D: Display>(self, tolerated: &[Errno], operation: D) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(ref error) if error.errno().map_or(false, |e| tolerated.contains(&e)) => {
                debug!("{}: ignoring {}", operation, error);
                None
            }
            Err(error) => die(Location::caller(), &operation, Some(&error)),
        }
    }
}
