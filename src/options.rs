//! The description of a sandbox.
//!
//! Options are produced before the sandbox is created, either from a configuration file or the
//! command line, and are only ever read from then on. Nothing here checks that the paths exist;
//! a bad path will surface as a failed mount inside the sandbox.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use nix::unistd::{getgid, getuid};
use toml;

use error::*;

/// Configuration of a single sandbox run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Appear as root inside the sandbox.
    pub fake_root: bool,
    /// Appear as `nobody` inside the sandbox.
    pub fake_username: bool,
    /// Give the sandbox its own host and domain name.
    pub fake_hostname: bool,
    /// Run the sandbox with only a loopback network.
    pub create_network_namespace: bool,
    /// Directory the command runs in. It stays writable.
    pub working_directory: PathBuf,
    /// Directories that get an empty tmpfs mounted over them.
    pub tmpfs_directories: Vec<PathBuf>,
    /// Bind mounts, applied in order.
    pub bind_mounts: Vec<BindMount>,
    /// Paths that stay writable when everything else is made read-only.
    pub writable_paths: Vec<PathBuf>,
    /// The command to run, starting with the program.
    pub command: Vec<String>,
}

/// A single bind mount of `source` onto `target`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BindMount {
    /// The existing path to mount.
    pub source: PathBuf,
    /// Where it appears.
    pub target: PathBuf,
}

impl BindMount {
    /// Mount `source` at `target`.
    pub fn new<S, T>(source: S, target: T) -> BindMount
    where
        S: Into<PathBuf>,
        T: Into<PathBuf>,
    {
        BindMount {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl Options {
    /// Parse options from the text of a TOML configuration file.
    pub fn from_toml(text: &str) -> Result<Options> {
        Ok(toml::de::from_str(text)?)
    }

    /// Check that the options describe something that can be run.
    pub fn validate(&self) -> Result<()> {
        if self.command.is_empty() {
            bail!(ErrorKind::EmptyCommand);
        }

        if self.fake_root && self.fake_username {
            bail!(ErrorKind::ConflictingIdentity);
        }

        if self.working_directory.as_os_str().is_empty() {
            bail!(ErrorKind::MissingWorkingDirectory);
        }

        Ok(())
    }

    /// Mount points that are left writable by the read-only pass.
    pub fn writable_set(&self) -> WritableSet {
        let paths = Some(&self.working_directory)
            .into_iter()
            .chain(self.writable_paths.iter())
            .chain(self.tmpfs_directories.iter())
            .cloned()
            .collect();

        WritableSet(paths)
    }
}

/// The set of mount points that keep write access.
///
/// Membership is exact: a mount at `/work/sub` is not writable because `/work` is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritableSet(BTreeSet<PathBuf>);

impl WritableSet {
    /// Whether the mount at `mount_dir` stays writable.
    pub fn contains<P: AsRef<Path>>(&self, mount_dir: P) -> bool {
        self.0.contains(mount_dir.as_ref())
    }
}

/// A user and group pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// User ID.
    pub uid: u32,
    /// Group ID.
    pub gid: u32,
}

impl Identity {
    /// The real user and group of the calling process.
    pub fn current() -> Identity {
        Identity {
            uid: getuid().as_raw(),
            gid: getgid().as_raw(),
        }
    }
}
