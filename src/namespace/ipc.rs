use super::prelude::*;

/// Inter-Process Communication.
///
/// There are two global IPC mechanisms that Linux supports; System-V IPC and
/// POSIX message queues. A new IPC namespace keeps the sandboxed command from
/// reaching any queue or shared memory segment created outside of it.
#[derive(Debug, Clone)]
pub struct Ipc {}

impl Ipc {
    /// Configure a new IPC namespace for creation.
    pub fn new() -> Ipc {
        Ipc {}
    }
}

impl Namespace for Ipc {
    fn clone_flag(&self) -> Option<CloneFlags> {
        Some(CloneFlags::CLONE_NEWIPC)
    }
}
