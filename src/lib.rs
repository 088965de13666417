//! Install a file only if it differs.
//!
//! Copies a source file to a local path or to `[user]@host:path` over secure
//! shell, but only when the destination's content, mode, owner, or group
//! differ from what was requested.  Replacement is atomic: the new file is
//! staged next to the destination with its final metadata and then renamed
//! into place.
//!
//! The public API is organised into layers:
//!
//! - **[`target`]**: parse destinations into local or remote targets
//! - **[`resources`]**: compare and install files (`check + apply`)
//! - **[`transport`]**: `scp`/`ssh` plumbing for remote destinations
//! - **[`commands`]**: the decision driver mapping outcomes to exit codes
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod exec;
pub mod identity;
pub mod logging;
pub mod mode;
pub mod resources;
pub mod target;
pub mod transport;
