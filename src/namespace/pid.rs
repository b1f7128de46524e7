use super::prelude::*;

/// Process IDs
///
/// Process IDs are unique and specific to a PID namespace. The init process is
/// PID 1 of the new namespace: orphans are reparented to it, and when it exits
/// the kernel kills every process left in the namespace.
#[derive(Debug, Clone)]
pub struct Pid {}

impl Pid {
    /// Configure a new PID namespace to for creation.
    pub fn new() -> Pid {
        Pid {}
    }
}

impl Namespace for Pid {
    fn clone_flag(&self) -> Option<CloneFlags> {
        Some(CloneFlags::CLONE_NEWPID)
    }
}
