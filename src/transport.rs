//! Secure-shell transport: file copy and remote command execution.
use std::path::Path;
use std::sync::OnceLock;

use anyhow::Result;

use crate::error::InstallError;
use crate::exec::{ExecResult, Executor};
use crate::target::RemoteTarget;

/// Copy files to and from a remote host and run commands on it.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Upload the local file at `local` to `remote_path` on the host.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Transport`] if the copy fails.
    fn upload(&self, remote: &RemoteTarget, local: &Path, remote_path: &str) -> Result<()>;

    /// Download `remote_path` from the host into the local file `local`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Transport`] if the copy fails, including when
    /// the remote file does not exist.
    fn download(&self, remote: &RemoteTarget, remote_path: &str, local: &Path) -> Result<()>;

    /// Run a shell command on the host and capture its result.
    ///
    /// A non-zero exit is reported through [`ExecResult::success`], not as an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the command cannot be started.
    fn execute(&self, remote: &RemoteTarget, command: &str) -> Result<ExecResult>;
}

/// [`Transport`] that shells out to the OpenSSH `scp` and `ssh` clients.
///
/// Logins starting with `-` must be rejected beforehand by
/// [`RemoteTarget::validate`].
///
/// Authentication, host-key checking, and connection timeouts are whatever
/// the user's ssh configuration provides.
#[derive(Debug)]
pub struct SshTransport<E: Executor> {
    exec: E,
    tools_checked: OnceLock<()>,
}

impl<E: Executor> SshTransport<E> {
    /// Create a transport that runs `scp`/`ssh` through `exec`.
    #[must_use]
    pub const fn new(exec: E) -> Self {
        Self {
            exec,
            tools_checked: OnceLock::new(),
        }
    }

    /// Verify `ssh` and `scp` are on `PATH`; checked once per transport.
    fn ensure_tools(&self) -> Result<()> {
        if self.tools_checked.get().is_some() {
            return Ok(());
        }
        for tool in ["scp", "ssh"] {
            if !self.exec.which(tool) {
                return Err(InstallError::ToolNotFound(tool.to_string()).into());
            }
        }
        let _ = self.tools_checked.set(());
        Ok(())
    }

    /// Run `scp` from `from` to `to`; `addressed` names the remote side in errors.
    fn copy(
        &self,
        operation: &str,
        from: &str,
        to: &str,
        port: u16,
        addressed: &str,
    ) -> Result<()> {
        self.ensure_tools()?;
        let port = port.to_string();
        let result = self.exec.run_unchecked("scp", &["-q", "-P", &port, "--", from, to])?;
        if !result.success {
            return Err(InstallError::Transport {
                operation: operation.to_string(),
                destination: addressed.to_string(),
                detail: failure_detail(&result),
            }
            .into());
        }
        Ok(())
    }
}

impl<E: Executor> Transport for SshTransport<E> {
    fn upload(&self, remote: &RemoteTarget, local: &Path, remote_path: &str) -> Result<()> {
        let to = remote.address(remote_path);
        let from = local.to_string_lossy();
        self.copy("upload", &from, &to, remote.port, &to)
    }

    fn download(&self, remote: &RemoteTarget, remote_path: &str, local: &Path) -> Result<()> {
        let from = remote.address(remote_path);
        let to = local.to_string_lossy();
        self.copy("download", &from, &to, remote.port, &from)
    }

    fn execute(&self, remote: &RemoteTarget, command: &str) -> Result<ExecResult> {
        self.ensure_tools()?;
        let port = remote.port.to_string();
        let login = remote.login();
        self.exec.run_unchecked("ssh", &["-p", &port, &login, command])
    }
}

/// Single-quote `s` for a POSIX shell.
///
/// # Examples
///
/// ```
/// use install_if_changed::transport::shell_quote;
///
/// assert_eq!(shell_quote("/etc/app.conf"), "'/etc/app.conf'");
/// assert_eq!(shell_quote("it's"), r"'it'\''s'");
/// ```
#[must_use]
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Best description of why a command failed: its stderr, or its exit code.
pub(crate) fn failure_detail(result: &ExecResult) -> String {
    let stderr = result.stderr.trim();
    if stderr.is_empty() {
        format!("exit {}", result.code.unwrap_or(-1))
    } else {
        stderr.to_string()
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::unreachable
)]
mod tests {
    use super::*;
    use crate::resources::test_helpers::MockExecutor;
    use crate::target::Target;

    fn remote(raw: &str, port: u16) -> RemoteTarget {
        match Target::parse(raw, port) {
            Target::Remote(r) => r,
            Target::Local(_) => unreachable!("test target must be remote"),
        }
    }

    #[test]
    fn upload_builds_scp_argv() {
        let exec = MockExecutor::ok("").with_which(true);
        let transport = SshTransport::new(exec);
        let target = remote("deploy@host1:/etc/app/config.yml", 2222);

        transport
            .upload(&target, Path::new("/tmp/src.yml"), "/etc/app/.tmp")
            .unwrap();

        let calls = transport.exec.calls();
        assert_eq!(
            calls,
            vec![vec![
                "scp",
                "-q",
                "-P",
                "2222",
                "--",
                "/tmp/src.yml",
                "deploy@host1:/etc/app/.tmp"
            ]]
        );
    }

    #[test]
    fn download_reverses_direction() {
        let exec = MockExecutor::ok("").with_which(true);
        let transport = SshTransport::new(exec);
        let target = remote("@host1:/etc/motd", 22);

        transport
            .download(&target, "/etc/motd", Path::new("/tmp/cmp"))
            .unwrap();

        let calls = transport.exec.calls();
        assert_eq!(calls[0][5], "host1:/etc/motd");
        assert_eq!(calls[0][6], "/tmp/cmp");
    }

    #[test]
    fn failed_copy_is_transport_error() {
        let exec = MockExecutor::fail().with_which(true);
        let transport = SshTransport::new(exec);
        let target = remote("deploy@host1:/etc/x", 22);

        let err = transport
            .upload(&target, Path::new("/tmp/x"), "/etc/.tmp")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::Transport { operation, .. }) if operation == "upload"
        ));
    }

    #[test]
    fn execute_passes_command_as_single_argument() {
        let exec = MockExecutor::ok("644 0 0\n").with_which(true);
        let transport = SshTransport::new(exec);
        let target = remote("root@db:/etc/my.cnf", 22);

        let result = transport.execute(&target, "stat -c '%a' '/etc/my.cnf'").unwrap();
        assert!(result.success);
        assert_eq!(
            transport.exec.calls(),
            vec![vec!["ssh", "-p", "22", "root@db", "stat -c '%a' '/etc/my.cnf'"]]
        );
    }

    #[test]
    fn missing_tools_fail_before_running() {
        let exec = MockExecutor::ok("");
        let transport = SshTransport::new(exec);
        let target = remote("root@db:/etc/x", 22);

        let err = transport.execute(&target, "true").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::ToolNotFound(tool)) if tool == "scp"
        ));
        assert_eq!(transport.exec.call_count(), 0);
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("o'brien"), r"'o'\''brien'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn failure_detail_prefers_stderr() {
        let result = ExecResult {
            stdout: String::new(),
            stderr: "  Permission denied\n".to_string(),
            success: false,
            code: Some(1),
        };
        assert_eq!(failure_detail(&result), "Permission denied");

        let result = ExecResult {
            stdout: String::new(),
            stderr: String::new(),
            success: false,
            code: Some(255),
        };
        assert_eq!(failure_detail(&result), "exit 255");
    }
}
