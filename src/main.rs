//! Command-line entry point for `install-if-changed`.
use std::process::ExitCode;

use clap::Parser;

use install_if_changed::cli::Cli;
use install_if_changed::commands::install;
use install_if_changed::exec::SystemExecutor;
use install_if_changed::identity::SystemIdentity;
use install_if_changed::logging::{self, Logger, Verbosity};
use install_if_changed::transport::SshTransport;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // --help and --version are reported on stdout and are not failures.
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    logging::init_subscriber(Verbosity::from_flags(cli.quiet, cli.verbose));
    let transport = SshTransport::new(SystemExecutor);
    let outcome = install::run_cli(&cli, &SystemIdentity, &transport, &Logger);
    ExitCode::from(outcome.exit_code())
}
