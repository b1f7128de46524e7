//! The init process of the sandbox.
//!
//! This runs as PID 1 in the namespaces created by the launcher. It finishes
//! building the sandbox from the inside, one stage after the other, then runs
//! the command and stays around only to pass on signals and reap orphans.
//! Every stage depends on the state left by the previous one, so the order
//! below is not arbitrary.

use nix::unistd::{chdir, getpid, Pid};

use error::*;
use filesystem::Isolator;
use handshake::{self, SyncPipe};
use namespace::{Namespace, Namespaces};
use options::{Identity, Options};
use signal::{DispositionTable, ForwardTarget};
use supervisor;

/// Set up the sandbox and run the command in it.
///
/// `outer` is the identity the launcher ran as. Never returns: the process
/// exits with the command's status, or with [`FATAL_EXIT_CODE`] if anything
/// goes wrong before the command starts.
pub fn run(options: &Options, outer: Identity, pipe: SyncPipe) -> ! {
    if getpid() != Pid::from_raw(1) {
        fatal!("Using PID namespaces, but we are not PID 1");
    }

    // Registered before the handshake so the launcher cannot die unnoticed.
    handshake::die_with_parent().or_die("prctl(PR_SET_PDEATHSIG, SIGKILL)");
    pipe.signal_alive();

    let namespaces = Namespaces::new(options, outer);
    namespaces.mount.configure();
    namespaces.user.configure();
    if let Some(ref uts) = namespaces.uts {
        uts.configure();
    }

    let isolator = Isolator::new(options);
    isolator.mount_filesystems();
    isolator.make_mostly_read_only();
    isolator.mount_proc();

    if let Some(ref network) = namespaces.network {
        network.configure();
    }

    chdir(options.working_directory.as_path())
        .or_die(format_args!("chdir({})", options.working_directory.display()));

    let target = ForwardTarget::get();
    DispositionTable::new().install(target);

    supervisor::spawn(&options.command, target).supervise()
}
