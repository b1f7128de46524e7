//! `sandbox-init` runs a single command in a sandbox built from Linux
//! namespaces.
//!
//! Inside the sandbox the whole filesystem is read-only except for the working
//! directory, any tmpfs directories and any paths explicitly made writable. The
//! command runs in its own PID namespace and the sandbox ends when it does.
//!
//! # Configuration file
//!
//! The sandbox can be described in a TOML file given with `-f` or
//! `--config-file`. Otherwise, the following locations are searched in order:
//!
//! 1. `./sandbox.toml`
//! 1. `./.sandbox.toml`
//! 1. `~/.config/sandbox.toml`
//! 1. `/etc/sandbox.toml`
//!
//! Flags given on the command line are added to what the file describes.
//!
//! # Usage
//!
//! `sandbox-init [options] [--] <program> [<args>...]`

extern crate docopt;
extern crate env_logger;
#[macro_use]
extern crate error_chain;
extern crate log;
extern crate sandbox_init;
extern crate serde;
#[macro_use]
extern crate serde_derive;

use std::env;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::exit;

use docopt::Docopt;
use env_logger::{Builder, Env};
use log::LevelFilter;

use sandbox_init::{BindMount, ErrorKind, Options, Result, ResultExt};

fn main() {
    let args = Arguments::load();
    init_logger(args.flag_debug);

    match args.into_options().and_then(|options| sandbox_init::launcher::run(&options)) {
        Ok(code) => exit(code),
        Err(err) => {
            eprintln!("sandbox-init: {}", err);
            for cause in err.iter().skip(1) {
                eprintln!("  caused by: {}", cause);
            }
            exit(sandbox_init::FATAL_EXIT_CODE);
        }
    }
}

const USAGE: &'static str = "
Usage:
    sandbox-init [options] [--tmpfs <dir>]... [--bind-source <src> --bind-target <dst>]... [--writable <path>]... [--] [<program> [<args>...]]
    sandbox-init (-h | --help)
    sandbox-init (-v | --version)

Options:
    -f <file>, --config-file <file>  Location of configuration file to use.
    -W <dir>, --working-dir <dir>    Working directory; stays writable.
    -e <dir>, --tmpfs <dir>          Mount an empty tmpfs over a directory.
    -M <src>, --bind-source <src>    Source of a bind mount.
    -m <dst>, --bind-target <dst>    Target of the preceding bind mount source.
    -w <path>, --writable <path>     Keep a path writable.
    -R, --fake-root                  Run as root inside the sandbox.
    -U, --fake-username              Run as nobody inside the sandbox.
    -H, --fake-hostname              Use a fixed host and domain name.
    -N, --create-netns               Use a network namespace with only loopback.
    -D, --debug                      Print debug messages.
    -h, --help                       Show this help.
    -v, --version                    Show the version.
";

#[derive(Deserialize)]
struct Arguments {
    flag_config_file: Option<String>,
    flag_working_dir: Option<String>,
    flag_tmpfs: Vec<String>,
    flag_bind_source: Vec<String>,
    flag_bind_target: Vec<String>,
    flag_writable: Vec<String>,
    flag_fake_root: bool,
    flag_fake_username: bool,
    flag_fake_hostname: bool,
    flag_create_netns: bool,
    flag_debug: bool,
    arg_program: Option<String>,
    arg_args: Vec<String>,
}

impl Arguments {
    /// Load arguments from the command line.
    fn load() -> Arguments {
        Docopt::new(USAGE)
            .and_then(|d| d.help(true).version(Some(version())).deserialize())
            .unwrap_or_else(|e| e.exit())
    }

    /// Combine the configuration file with the command line.
    fn into_options(self) -> Result<Options> {
        let mut options = match self.find_config_path() {
            Some(path) => load_config(&path)?,
            None => Options::default(),
        };

        if self.flag_bind_source.len() != self.flag_bind_target.len() {
            bail!(ErrorKind::UnpairedBindMount(
                self.flag_bind_source.len(),
                self.flag_bind_target.len(),
            ));
        }

        options.fake_root |= self.flag_fake_root;
        options.fake_username |= self.flag_fake_username;
        options.fake_hostname |= self.flag_fake_hostname;
        options.create_network_namespace |= self.flag_create_netns;

        options.tmpfs_directories.extend(self.flag_tmpfs.into_iter().map(PathBuf::from));
        options.writable_paths.extend(self.flag_writable.into_iter().map(PathBuf::from));
        options.bind_mounts.extend(
            self.flag_bind_source
                .into_iter()
                .zip(self.flag_bind_target)
                .map(|(source, target)| BindMount::new(source, target)),
        );

        if let Some(dir) = self.flag_working_dir {
            options.working_directory = dir.into();
        }
        if options.working_directory.as_os_str().is_empty() {
            options.working_directory = env::current_dir()?;
        }

        if let Some(program) = self.arg_program {
            options.command = Some(program).into_iter().chain(self.arg_args).collect();
        }

        options.validate()?;
        Ok(options)
    }

    /// Determine the path of the configuration file.
    fn find_config_path(&self) -> Option<String> {
        if let Some(ref path) = self.flag_config_file {
            Some(path.clone())
        } else {
            default_config_paths()
                .into_iter()
                .find(|path| Path::new(path).exists())
        }
    }
}

/// Read and parse a configuration file.
fn load_config(path: &str) -> Result<Options> {
    let mut text = String::new();
    File::open(path)
        .and_then(|mut file| file.read_to_string(&mut text))
        .chain_err(|| format!("could not read configuration file {}", path))?;

    Options::from_toml(&text)
        .chain_err(|| format!("could not parse configuration file {}", path))
}

/// Default configuration path list.
fn default_config_paths() -> Vec<String> {
    let mut paths = vec![
        "sandbox.toml".to_string(),
        ".sandbox.toml".to_string(),
    ];

    if let Ok(path) = env::var("HOME") {
        paths.push(format!("{}/.config/sandbox.toml", path));
    }

    paths.push("/etc/sandbox.toml".to_string());

    paths
}

/// Log to stderr, at debug level if asked to.
fn init_logger(debug: bool) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("warn"));
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

/// Construct the version string for the program.
fn version() -> String {
    format!(
        "{} - {}\n{}\n\n{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_AUTHORS"),
        env!("CARGO_PKG_DESCRIPTION"),
    )
}
