//! The install decision driver.
//!
//! Resolves the destination, asks the resource whether it is up to date,
//! short-circuits on dry-run, and otherwise applies the install.  Every error
//! raised along the way ends here and becomes [`InstallOutcome::Failed`].
use std::path::PathBuf;

use anyhow::Result;

use crate::cli::Cli;
use crate::error::InstallError;
use crate::identity::{self, IdentityResolver};
use crate::logging::Log;
use crate::mode::Mode;
use crate::resources::local_file::LocalFileResource;
use crate::resources::remote_file::RemoteFileResource;
use crate::resources::{Resource, ResourceState};
use crate::target::Target;
use crate::transport::Transport;

/// Validated install parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Local file to install.
    pub source: PathBuf,
    /// Raw destination, local path or `[user]@host:path`.
    pub dest: String,
    /// Owner name.
    pub owner: String,
    /// Group name.
    pub group: String,
    /// Requested permission bits.
    pub mode: Mode,
    /// Report instead of mutate.
    pub dry_run: bool,
    /// Port for remote destinations.
    pub ssh_port: u16,
}

impl InstallRequest {
    /// Build a request from parsed arguments.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::InvalidMode`] if the mode is not an octal
    /// value no greater than `7777`.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        Ok(Self {
            source: cli.source.clone(),
            dest: cli.dest.clone(),
            owner: cli.owner.clone(),
            group: cli.group.clone(),
            mode: cli.mode.parse()?,
            dry_run: cli.dry_run,
            ssh_port: cli.ssh_port,
        })
    }
}

/// Result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Destination already matched.
    Unchanged,
    /// Destination was replaced.
    Changed,
    /// Destination differs; nothing was done because of dry-run.
    WouldChange,
    /// The install could not be completed.
    Failed(String),
}

impl InstallOutcome {
    /// Process exit status for this outcome.
    ///
    /// # Examples
    ///
    /// ```
    /// use install_if_changed::commands::install::InstallOutcome;
    ///
    /// assert_eq!(InstallOutcome::Unchanged.exit_code(), 0);
    /// assert_eq!(InstallOutcome::WouldChange.exit_code(), 3);
    /// assert_eq!(InstallOutcome::Failed("boom".into()).exit_code(), 1);
    /// ```
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Unchanged => 0,
            Self::Changed | Self::WouldChange => 3,
            Self::Failed(_) => 1,
        }
    }

    /// Status line for `dest`; `None` for failures, which go to the error stream.
    #[must_use]
    pub fn status_line(&self, dest: &str) -> Option<String> {
        match self {
            Self::Unchanged => Some(format!("⚪ {dest} unchanged")),
            Self::Changed => Some(format!("🔄 {dest} updated")),
            Self::WouldChange => Some(format!("🔍 {dest} would be updated (dry-run)")),
            Self::Failed(_) => None,
        }
    }
}

/// Validate the parsed arguments and run the install.
#[must_use]
pub fn run_cli(
    cli: &Cli,
    identity: &dyn IdentityResolver,
    transport: &dyn Transport,
    log: &dyn Log,
) -> InstallOutcome {
    match InstallRequest::from_cli(cli) {
        Ok(request) => run(&request, identity, transport, log),
        Err(e) => fail(&e, log),
    }
}

/// Install `request.source` at `request.dest` if anything differs.
///
/// Reports exactly one line through `log`: a status line, or an error.
#[must_use]
pub fn run(
    request: &InstallRequest,
    identity: &dyn IdentityResolver,
    transport: &dyn Transport,
    log: &dyn Log,
) -> InstallOutcome {
    match install(request, identity, transport, log) {
        Ok(outcome) => {
            if let Some(line) = outcome.status_line(&request.dest) {
                log.status(&line);
            }
            outcome
        }
        Err(e) => fail(&e, log),
    }
}

fn fail(err: &anyhow::Error, log: &dyn Log) -> InstallOutcome {
    if err
        .downcast_ref::<InstallError>()
        .is_some_and(InstallError::is_input_error)
    {
        log.debug("rejected before any change was attempted");
    }
    let reason = format!("{err:#}");
    log.error(&reason);
    InstallOutcome::Failed(reason)
}

fn install(
    request: &InstallRequest,
    identity: &dyn IdentityResolver,
    transport: &dyn Transport,
    log: &dyn Log,
) -> Result<InstallOutcome> {
    if !request.source.is_file() {
        return Err(InstallError::SourceNotFound(request.source.clone()).into());
    }

    match Target::parse(&request.dest, request.ssh_port) {
        Target::Local(path) => {
            let owner = identity::resolve(identity, &request.owner, &request.group)?;
            log.debug(&format!(
                "{}:{} resolved to {}:{}",
                request.owner, request.group, owner.uid, owner.gid
            ));
            let resource = LocalFileResource::new(request.source.clone(), path, owner, request.mode);
            converge(&resource, request.dry_run, log)
        }
        Target::Remote(remote) => {
            remote.validate()?;
            let resource = RemoteFileResource::new(
                request.source.clone(),
                remote,
                request.owner.clone(),
                request.group.clone(),
                request.mode,
                transport,
                log,
            );
            converge(&resource, request.dry_run, log)
        }
    }
}

fn converge(resource: &dyn Resource, dry_run: bool, log: &dyn Log) -> Result<InstallOutcome> {
    match resource.current_state()? {
        ResourceState::Correct => {
            log.debug(&format!("{}: up to date", resource.description()));
            return Ok(InstallOutcome::Unchanged);
        }
        ResourceState::Missing => {
            log.debug(&format!("{}: missing", resource.description()));
        }
        ResourceState::Incorrect { current } => {
            log.debug(&format!("{}: {current}", resource.description()));
        }
    }

    if dry_run {
        return Ok(InstallOutcome::WouldChange);
    }
    resource.apply()?;
    Ok(InstallOutcome::Changed)
}
