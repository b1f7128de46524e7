//! Confinement of the filesystem view.
//!
//! The sandbox sees the same filesystem as its launcher, with three changes:
//!
//! 1. tmpfs and bind mounts requested in the options are added on top;
//! 2. every mount is remounted read-only, except the working directory, the
//!    tmpfs directories and the explicitly writable paths;
//! 3. `/proc` is replaced with one that belongs to the new PID namespace.
//!
//! The order of these steps matters, and so does the order of the bind mounts
//! themselves since a later bind may land inside an earlier one.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::mount::{mount, MsFlags};

use error::*;
use options::{Options, WritableSet};

/// The live mount table of the calling process.
pub const MOUNT_TABLE: &str = "/proc/self/mounts";

/// Mount options that a remount drops unless they are passed again.
const PRESERVED_OPTIONS: &[(&str, MsFlags)] = &[
    ("nodev", MsFlags::MS_NODEV),
    ("noexec", MsFlags::MS_NOEXEC),
    ("nosuid", MsFlags::MS_NOSUID),
    ("noatime", MsFlags::MS_NOATIME),
    ("nodiratime", MsFlags::MS_NODIRATIME),
    ("relatime", MsFlags::MS_RELATIME),
];

/// Failures that the read-only pass skips over.
///
/// `EACCES` and `EPERM` come from mounts we have no access to, `EINVAL` and
/// `ENOENT` from mounts hidden under a later mount at the same place, and
/// `ESTALE` from broken network filesystems.
const TOLERATED_REMOUNT_ERRORS: &[Errno] = &[
    Errno::EACCES,
    Errno::EPERM,
    Errno::EINVAL,
    Errno::ENOENT,
    Errno::ESTALE,
];

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Where the filesystem is mounted.
    pub directory: PathBuf,
    /// The comma-separated mount options, split.
    pub options: Vec<String>,
}

impl MountEntry {
    /// Parse a line in `fstab(5)` format.
    ///
    /// Mount points are taken as raw bytes; they need not be valid UTF-8.
    /// Returns `None` for lines that have too few fields to be a mount.
    pub fn parse<L: AsRef<[u8]>>(line: L) -> Option<MountEntry> {
        let mut fields = line
            .as_ref()
            .split(|byte| byte.is_ascii_whitespace())
            .filter(|field| !field.is_empty());
        let _source = fields.next()?;
        let directory = fields.next()?;
        let _fstype = fields.next()?;
        let options = fields.next()?;

        Some(MountEntry {
            directory: PathBuf::from(OsStr::from_bytes(&unescape(directory))),
            options: String::from_utf8_lossy(options)
                .split(',')
                .map(str::to_string)
                .collect(),
        })
    }

    /// Whether the entry carries the option `name`, with or without a value.
    pub fn has_option(&self, name: &str) -> bool {
        self.options.iter().any(|option| {
            option == name
                || (option.starts_with(name) && option[name.len()..].starts_with('='))
        })
    }

    /// Flags currently in effect that must be passed again on remount.
    pub fn preserved_flags(&self) -> MsFlags {
        PRESERVED_OPTIONS
            .iter()
            .filter(|&&(name, _)| self.has_option(name))
            .fold(MsFlags::empty(), |flags, &(_, flag)| flags | flag)
    }

    /// The flags to remount this entry with.
    pub fn remount_flags(&self, writable: bool) -> MsFlags {
        let mut flags = MsFlags::MS_BIND | MsFlags::MS_REMOUNT | self.preserved_flags();
        if !writable {
            flags |= MsFlags::MS_RDONLY;
        }
        flags
    }
}

/// Undo the octal escapes the kernel uses for whitespace and backslashes.
fn unescape(field: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(field.len());
    let mut i = 0;

    while i < field.len() {
        let escape = field.get(i + 1..i + 4).and_then(|digits| {
            if field[i] != b'\\' || !digits.iter().all(|d| b'0' <= *d && *d <= b'7') {
                return None;
            }
            digits.iter().fold(Some(0u8), |acc, d| {
                acc.and_then(|acc| acc.checked_mul(8)).and_then(|acc| acc.checked_add(d - b'0'))
            })
        });

        match escape {
            Some(byte) => {
                out.push(byte);
                i += 4;
            }
            None => {
                out.push(field[i]);
                i += 1;
            }
        }
    }

    out
}

/// Read every entry of a mount table.
pub fn read_mount_table<P: AsRef<Path>>(path: P) -> ::std::io::Result<Vec<MountEntry>> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();

    for line in reader.split(b'\n') {
        if let Some(entry) = MountEntry::parse(line?) {
            entries.push(entry);
        }
    }

    Ok(entries)
}

/// A planned remount of a single mount point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remount {
    /// The mount point.
    pub directory: PathBuf,
    /// Flags to pass to `mount(2)`.
    pub flags: MsFlags,
}

impl Remount {
    /// Whether the mount point ends up read-only.
    pub fn is_read_only(&self) -> bool {
        self.flags.contains(MsFlags::MS_RDONLY)
    }
}

/// Plan one remount for every entry, read-only unless it is in `writable`.
pub fn plan_remounts(entries: &[MountEntry], writable: &WritableSet) -> Vec<Remount> {
    entries
        .iter()
        .map(|entry| Remount {
            directory: entry.directory.clone(),
            flags: entry.remount_flags(writable.contains(&entry.directory)),
        })
        .collect()
}

/// Applies the filesystem part of a sandbox's options.
#[derive(Debug)]
pub struct Isolator<'a> {
    options: &'a Options,
}

impl<'a> Isolator<'a> {
    /// Isolate according to `options`.
    pub fn new(options: &'a Options) -> Isolator<'a> {
        Isolator { options }
    }

    /// Create the tmpfs and bind mounts.
    pub fn mount_filesystems(&self) {
        for dir in &self.options.tmpfs_directories {
            debug!("tmpfs: {}", dir.display());
            mount(
                Some("tmpfs"),
                dir.as_path(),
                Some("tmpfs"),
                MsFlags::MS_NOSUID | MsFlags::MS_NODEV | MsFlags::MS_NOATIME,
                None::<&str>,
            ).or_die(format_args!(
                "mount(tmpfs, {}, tmpfs, MS_NOSUID | MS_NODEV | MS_NOATIME, NULL)",
                dir.display(),
            ));
        }

        // The working directory has to be a mount point of its own to be
        // singled out by the read-only pass.
        debug!("working dir: {}", self.options.working_directory.display());
        bind(&self.options.working_directory, &self.options.working_directory);

        for bind_mount in &self.options.bind_mounts {
            debug!(
                "bind mount: {} -> {}",
                bind_mount.source.display(),
                bind_mount.target.display(),
            );
            bind(&bind_mount.source, &bind_mount.target);
        }

        for path in &self.options.writable_paths {
            debug!("writable: {}", path.display());
            bind(path, path);
        }
    }

    /// Remount everything read-only, except the writable set.
    pub fn make_mostly_read_only(&self) {
        let entries = read_mount_table(MOUNT_TABLE)
            .or_die(format_args!("read({})", MOUNT_TABLE));
        let writable = self.options.writable_set();

        for remount in plan_remounts(&entries, &writable) {
            debug!(
                "remount {}: {}",
                if remount.is_read_only() { "ro" } else { "rw" },
                remount.directory.display(),
            );
            mount(
                None::<&str>,
                remount.directory.as_path(),
                None::<&str>,
                remount.flags,
                None::<&str>,
            ).tolerate(TOLERATED_REMOUNT_ERRORS, format_args!(
                "remount(NULL, {}, NULL, {:?}, NULL)",
                remount.directory.display(),
                remount.flags,
            ));
        }
    }

    /// Mount a `/proc` that reflects the sandbox's PID namespace.
    pub fn mount_proc(&self) {
        mount(
            Some("/proc"),
            "/proc",
            Some("proc"),
            MsFlags::MS_NODEV | MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID,
            None::<&str>,
        ).or_die("mount(/proc, /proc, proc, MS_NODEV | MS_NOEXEC | MS_NOSUID, NULL)");
    }
}

/// Bind-mount `source` onto `target`.
fn bind(source: &Path, target: &Path) {
    mount(
        Some(source),
        target,
        None::<&str>,
        MsFlags::MS_BIND,
        None::<&str>,
    ).or_die(format_args!(
        "mount({}, {}, NULL, MS_BIND, NULL)",
        source.display(),
        target.display(),
    ));
}
