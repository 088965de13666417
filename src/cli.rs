//! Command-line argument definitions.
use std::path::PathBuf;

use clap::Parser;

use crate::target::DEFAULT_SSH_PORT;

/// Command-line interface of `install-if-changed`.
#[derive(Parser, Debug)]
#[command(
    name = "install-if-changed",
    about = "Install a file with the given owner, group, and mode only if it differs",
    version = option_env!("INSTALL_IF_CHANGED_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
)]
pub struct Cli {
    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Report what would change without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Port used for remote destinations
    #[arg(long, value_name = "PORT", default_value_t = DEFAULT_SSH_PORT)]
    pub ssh_port: u16,

    /// Print each step of the comparison and install
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Local file to install
    pub source: PathBuf,

    /// Local path or [user]@host:path
    pub dest: String,

    /// Owner name of the installed file
    pub owner: String,

    /// Group name of the installed file
    pub group: String,

    /// Octal permission bits, e.g. 0644
    pub mode: String,
}
