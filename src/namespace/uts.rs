use libc;
use nix::errno::Errno;
use nix::unistd::sethostname;

use error::*;
use super::prelude::*;

/// Host name seen inside the sandbox.
pub const HOSTNAME: &str = "localhost";

/// Domain name seen inside the sandbox.
pub const DOMAINNAME: &str = "localdomain";

/// Unix Timesharing System (UTS)
///
/// The Unix Timesharing System provides the domain and hostname of the system.
/// This is given its own namespace and can be changed within that namespace
/// without affecting the host.
#[derive(Debug, Clone)]
pub struct Uts {}

impl Uts {
    /// Configure a new UTS namespace for creation.
    pub fn new() -> Uts {
        Uts {}
    }
}

impl Namespace for Uts {
    fn clone_flag(&self) -> Option<CloneFlags> {
        Some(CloneFlags::CLONE_NEWUTS)
    }

    fn configure(&self) {
        sethostname(HOSTNAME).or_die("sethostname");
        setdomainname(DOMAINNAME).or_die("setdomainname");
    }
}

fn setdomainname(name: &str) -> ::nix::Result<()> {
    let ret = unsafe { libc::setdomainname(name.as_ptr() as *const libc::c_char, name.len()) };
    Errno::result(ret).map(drop)
}
