use nix::mount::{mount, MsFlags};

use error::*;
use super::prelude::*;

/// Mounts
///
/// Each process exists in a particular mount namespace which specifies which
/// *additional* mount mappings exist over the base file-system. A new mount
/// namespace starts as a copy of its parent's, but the copies still share
/// propagation with the outside until the tree is made private.
///
/// Configuring the namespace marks the whole tree recursively private, so no
/// mount or unmount crosses the boundary in either direction. This has to
/// happen before any other mount inside the sandbox.
#[derive(Debug, Clone)]
pub struct Mount {}

impl Mount {
    /// Configure a new mount namespace for creation.
    pub fn new() -> Mount {
        Mount {}
    }
}

impl Namespace for Mount {
    fn clone_flag(&self) -> Option<CloneFlags> {
        Some(CloneFlags::CLONE_NEWNS)
    }

    fn configure(&self) {
        mount(
            None::<&str>,
            "/",
            None::<&str>,
            MsFlags::MS_REC | MsFlags::MS_PRIVATE,
            None::<&str>,
        ).or_die("mount(NULL, /, NULL, MS_REC | MS_PRIVATE, NULL)");
    }
}
