//! Init process for namespace sandboxes.
//!
//! A sandbox is a set of fresh namespaces whose first process is the init
//! process in [`pid1`]. It finishes the isolation from the inside, confines
//! the filesystem to a mostly read-only view, runs exactly one command and
//! relays signals to it. When the command ends, so does the sandbox.
//!
//! The [`launcher`] is the side that stays outside and creates it.

#![warn(missing_docs)]
#![deny(unused_must_use)]
#![warn(missing_debug_implementations)]

#[macro_use]
extern crate error_chain;
extern crate libc;
#[macro_use]
extern crate log;
#[macro_use]
extern crate nix;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate toml;

#[cfg(test)]
extern crate tempfile;

#[macro_use]
mod error;
pub mod filesystem;
pub mod handshake;
pub mod launcher;
pub mod namespace;
pub mod options;
pub mod pid1;
pub mod signal;
pub mod supervisor;

pub use error::*;
pub use launcher::Sandbox;
pub use options::{BindMount, Identity, Options, WritableSet};
