use std::mem;
use std::os::unix::io::{AsRawFd, IntoRawFd};

use libc;
use nix::net::if_::{if_nametoindex, InterfaceFlags};
use nix::sys::socket::{socket, AddressFamily, SockFlag, SockType};
use nix::unistd::close;

use error::*;
use super::prelude::*;

/// Name of the loopback interface.
const LOOPBACK: &str = "lo";

ioctl_write_ptr_bad!(set_interface_flags, libc::SIOCSIFFLAGS, libc::ifreq);

/// Networking
///
/// The networking namespace encapsulates an entire network stack shared between
/// processes. A fresh namespace has no devices but a loopback interface, and even
/// that starts out down.
///
/// Configuring the namespace brings the loopback interface up, since plenty of
/// programs expect to reach `localhost`. Nothing else is set up.
#[derive(Debug, Clone)]
pub struct Network {}

impl Network {
    /// Configure a new network namespace for creation.
    pub fn new() -> Network {
        Network {}
    }
}

impl Namespace for Network {
    fn clone_flag(&self) -> Option<CloneFlags> {
        Some(CloneFlags::CLONE_NEWNET)
    }

    fn configure(&self) {
        // Only used as a handle for interface ioctls.
        let socket = socket(
            AddressFamily::Inet,
            SockType::Datagram,
            SockFlag::SOCK_CLOEXEC,
            None,
        ).or_die("socket");

        if_nametoindex(LOOPBACK).or_die("if_nametoindex");

        let request = interface_request(LOOPBACK, InterfaceFlags::IFF_UP);
        unsafe { set_interface_flags(socket.as_raw_fd(), &request) }.or_die("ioctl");

        close(socket.into_raw_fd()).or_die("close");
    }
}

/// Build an `ifreq` naming `name` and carrying `flags`.
fn interface_request(name: &str, flags: InterfaceFlags) -> libc::ifreq {
    let mut request: libc::ifreq = unsafe { mem::zeroed() };
    for (dst, src) in request.ifr_name.iter_mut().zip(name.bytes()) {
        *dst = src as libc::c_char;
    }
    request.ifr_ifru.ifru_flags = flags.bits() as libc::c_short;
    request
}
