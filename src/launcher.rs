//! The outside half of a sandbox.
//!
//! The launcher clones the init process into fresh namespaces, waits until it
//! has checked in over the synchronisation pipe and then waits for it to exit.
//! It does nothing inside the sandbox itself.

use libc::{self, c_int};
use nix::errno::Errno;
use nix::sched::clone;
use nix::unistd::{getuid, setuid, Pid};

use error::*;
use handshake::{self, SyncPipe};
use namespace::Namespaces;
use options::{Identity, Options};
use pid1;
use supervisor::Termination;

/// Stack size of the cloned init process.
const STACK_SIZE: usize = 1024 * 1024;

/// A running sandbox, as seen from the launcher.
#[derive(Debug)]
pub struct Sandbox {
    pid: Pid,
}

impl Sandbox {
    /// Create the namespaces and start the init process in them.
    ///
    /// Returns once the init process is known to be alive.
    pub fn spawn(options: &Options) -> Result<Sandbox> {
        options.validate()?;

        handshake::die_with_parent()?;
        // Never act on a setuid bit; user namespaces are all we need.
        setuid(getuid())?;

        let outer = Identity::current();
        let flags = Namespaces::new(options, outer).clone_flags();
        let pipe = SyncPipe::new()?;
        let fds = pipe.raw_fds();

        let mut stack = vec![0u8; STACK_SIZE];
        let init = Box::new(move || -> isize {
            let pipe = unsafe { SyncPipe::from_raw_fds(fds) };
            pid1::run(options, outer, pipe)
        });

        let pid = unsafe { clone(init, &mut stack, flags, Some(libc::SIGCHLD)) }
            .chain_err(|| ErrorKind::Clone)?;
        debug!("sandbox init process has PID {}", pid);

        pipe.wait_alive()?;

        Ok(Sandbox { pid })
    }

    /// The PID of the init process, outside the sandbox.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Wait for the sandbox to finish and return the exit code to pass on.
    pub fn wait(self) -> Result<c_int> {
        loop {
            let mut status = 0;
            let ret = unsafe { libc::waitpid(self.pid.as_raw(), &mut status, 0) };
            match Errno::result(ret) {
                Ok(_) => if let Some(termination) = Termination::from_status(status) {
                    match termination {
                        Termination::Signaled(signal) => {
                            debug!("sandbox exited due to receiving signal {}", signal)
                        }
                        Termination::Exited(code) => {
                            debug!("sandbox exited normally with exit code {}", code)
                        }
                    }
                    return Ok(termination.exit_code());
                },
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(errno.into()),
            }
        }
    }
}

/// Run a sandbox to completion, returning its exit code.
pub fn run(options: &Options) -> Result<c_int> {
    let sandbox = Sandbox::spawn(options)?;
    debug!("waiting for sandbox {}", sandbox.pid());
    sandbox.wait()
}
