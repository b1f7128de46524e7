use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;

use nix::errno::Errno;
use nix::unistd::User as Passwd;

use error::*;
use options::Identity;
use super::prelude::*;

const SETGROUPS: &str = "/proc/self/setgroups";
const UID_MAP: &str = "/proc/self/uid_map";
const GID_MAP: &str = "/proc/self/gid_map";

/// The account the sandbox is seen as running under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InnerIdentity {
    /// User and group 0.
    Root,
    /// The `nobody` account of the host.
    Nobody,
    /// The same user and group as outside.
    Preserved,
}

/// Users and Groups
///
/// User namespaces control the access privileges of UIDs and GIDs. When a new
/// user namespace is created, the initial process in that namespace has every
/// capability within it but no mapping for any ID until one is written.
///
/// The sandbox maps exactly one user and one group: the IDs of the user who
/// launched it, seen from the inside as root, as `nobody`, or as themselves.
#[derive(Debug, Clone)]
pub struct User {
    inner: InnerIdentity,
    outer: Identity,
}

impl User {
    /// Configure a new user namespace for creation.
    pub fn new(inner: InnerIdentity, outer: Identity) -> User {
        User { inner, outer }
    }

    /// The identity seen inside the sandbox.
    pub fn inner(&self) -> InnerIdentity {
        self.inner
    }

    /// Resolve the inner identity into numeric IDs.
    fn inner_ids(&self) -> Identity {
        match self.inner {
            InnerIdentity::Root => Identity { uid: 0, gid: 0 },
            InnerIdentity::Nobody => match Passwd::from_name("nobody") {
                Ok(Some(nobody)) => Identity {
                    uid: nobody.uid.as_raw(),
                    gid: nobody.gid.as_raw(),
                },
                _ => fatal!("unable to find passwd entry for user nobody"),
            },
            InnerIdentity::Preserved => self.outer,
        }
    }
}

impl Namespace for User {
    fn clone_flag(&self) -> Option<CloneFlags> {
        Some(CloneFlags::CLONE_NEWUSER)
    }

    fn configure(&self) {
        // Older kernels have no setgroups file and do not need it written.
        let setgroups = OpenOptions::new()
            .write(true)
            .open(SETGROUPS)
            .tolerate(&[Errno::ENOENT], format_args!("open({})", SETGROUPS));
        if let Some(mut setgroups) = setgroups {
            write!(setgroups, "{}", SetGroups::Deny).or_die(format_args!("write({})", SETGROUPS));
        }

        let inner = self.inner_ids();
        write_control_file(UID_MAP, &id_map(inner.uid, self.outer.uid));
        write_control_file(GID_MAP, &id_map(inner.gid, self.outer.gid));
    }
}

/// A single-entry ID map: `inner` inside is `outer` outside.
fn id_map(inner: u32, outer: u32) -> String {
    format!("{} {} 1\n", inner, outer)
}

/// Write `contents` to a procfs control file in one go.
fn write_control_file(path: &str, contents: &str) {
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .or_die(format_args!("open({})", path));
    file.write_all(contents.as_bytes())
        .or_die(format_args!("write({})", path));
}

/// Whether processes in the namespace may call `setgroups(2)`.
///
/// It has to be denied before an unprivileged process can write a GID map.
enum SetGroups {
    Deny,
}

impl fmt::Display for SetGroups {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SetGroups::Deny => write!(f, "deny"),
        }
    }
}
