//! Namespace representations and implementations.
//!
//! Linux provides a namespaces API. This allows for a process to place itself
//! (and its children) into a context isolated from other processes in some
//! respect. The sandbox init process always lives in new user, mount, PID and
//! IPC namespaces, and optionally in new UTS and network namespaces.
//!
//! The launcher asks each namespace for its `clone` flag; the init process then
//! finishes setting each one up from the inside.
//!
//! * [Inter-Process Communication](struct.Ipc.html)
//! * [Networking](struct.Network.html)
//! * [Mounts](struct.Mount.html)
//! * [Process IDs](struct.Pid.html)
//! * [Users and Groups](struct.User.html)
//! * [Unix Timesharing System](struct.Uts.html)

mod ipc;
mod mount;
mod network;
mod pid;
mod user;
mod uts;

use nix::sched::CloneFlags;

pub use self::ipc::Ipc;
pub use self::mount::Mount;
pub use self::network::Network;
pub use self::pid::Pid;
pub use self::user::{InnerIdentity, User};
pub use self::uts::Uts;

use options::{Identity, Options};

mod prelude {
    pub(super) use super::CloneFlags;
    pub(super) use super::Namespace;
}

/// A trait that represents a namespace that can be created and entered.
///
/// This provides the flag for the `clone` syscall to create a new instance of
/// a given namespace and configures it once the init process is inside.
pub trait Namespace: ::std::fmt::Debug {
    /// Get the flag needed for clone to create new namespace.
    ///
    /// See `clone(2)` and `namespaces(7)` for more information.
    fn clone_flag(&self) -> Option<CloneFlags> {
        None
    }

    /// Configure the system from within the namespace after creation.
    ///
    /// This runs as PID 1 of the sandbox. A failure here leaves the sandbox
    /// in an unknown state, so it ends the process.
    fn configure(&self) {}
}

/// Every namespace a sandbox is made of.
#[derive(Debug)]
pub struct Namespaces {
    /// Private mount tree.
    pub mount: Mount,
    /// Identity mapping.
    pub user: User,
    /// Process IDs; the init process is PID 1 of this.
    pub pid: Pid,
    /// System-V IPC and message queues.
    pub ipc: Ipc,
    /// Host and domain name, if faked.
    pub uts: Option<Uts>,
    /// Loopback-only network, if requested.
    pub network: Option<Network>,
}

impl Namespaces {
    /// Describe the namespaces needed for `options`.
    pub fn new(options: &Options, outer: Identity) -> Namespaces {
        let inner = if options.fake_root {
            InnerIdentity::Root
        } else if options.fake_username {
            InnerIdentity::Nobody
        } else {
            InnerIdentity::Preserved
        };

        Namespaces {
            mount: Mount::new(),
            user: User::new(inner, outer),
            pid: Pid::new(),
            ipc: Ipc::new(),
            uts: if options.fake_hostname { Some(Uts::new()) } else { None },
            network: if options.create_network_namespace { Some(Network::new()) } else { None },
        }
    }

    /// All namespaces, in the order they are configured.
    fn all(&self) -> Vec<&Namespace> {
        let mut all: Vec<&Namespace> = Vec::new();
        all.push(&self.mount);
        all.push(&self.user);
        all.push(&self.pid);
        all.push(&self.ipc);
        if let Some(ref uts) = self.uts {
            all.push(uts);
        }
        if let Some(ref network) = self.network {
            all.push(network);
        }
        all
    }

    /// The flags `clone` needs to create every namespace.
    pub fn clone_flags(&self) -> CloneFlags {
        self.all()
            .into_iter()
            .flat_map(|ns| ns.clone_flag())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Options {
        Options {
            working_directory: "/work".into(),
            command: vec!["true".to_string()],
            ..Options::default()
        }
    }

    const OUTER: Identity = Identity { uid: 1000, gid: 100 };

    #[test]
    fn always_created() {
        let flags = Namespaces::new(&options(), OUTER).clone_flags();
        assert_eq!(
            flags,
            CloneFlags::CLONE_NEWUSER
                | CloneFlags::CLONE_NEWNS
                | CloneFlags::CLONE_NEWPID
                | CloneFlags::CLONE_NEWIPC
        );
    }

    #[test]
    fn optional_namespaces() {
        let options = Options {
            fake_hostname: true,
            create_network_namespace: true,
            ..options()
        };
        let flags = Namespaces::new(&options, OUTER).clone_flags();
        assert!(flags.contains(CloneFlags::CLONE_NEWUTS));
        assert!(flags.contains(CloneFlags::CLONE_NEWNET));
    }

    #[test]
    fn identity_selection() {
        let root = Options { fake_root: true, ..options() };
        assert_eq!(Namespaces::new(&root, OUTER).user.inner(), InnerIdentity::Root);

        let nobody = Options { fake_username: true, ..options() };
        assert_eq!(Namespaces::new(&nobody, OUTER).user.inner(), InnerIdentity::Nobody);

        assert_eq!(Namespaces::new(&options(), OUTER).user.inner(), InnerIdentity::Preserved);
    }
}
