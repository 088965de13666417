//! Remote file resource: upload-to-temp, then chown/chmod/rename over ssh.
//!
//! Ownership and mode are applied to the uploaded temp artifact before it is
//! renamed, so the destination never appears with the wrong owner.  If that
//! command chain fails a best-effort `rm -f` removes the artifact; when the
//! removal fails too, the returned error names the orphaned path on the host.
use std::fmt;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use rand::Rng as _;
use rand::distr::Alphanumeric;
use tempfile::NamedTempFile;

use super::compare::{self, RemoteMetadata};
use super::{Resource, ResourceState, TEMP_PREFIX};
use crate::error::InstallError;
use crate::logging::Log;
use crate::mode::Mode;
use crate::target::RemoteTarget;
use crate::transport::{Transport, failure_detail, shell_quote};

/// A file on a remote host that should mirror the local `source`.
pub struct RemoteFileResource<'a> {
    /// Local file whose bytes are installed.
    pub source: PathBuf,
    /// Destination host and path.
    pub remote: RemoteTarget,
    /// Owner name, resolved by the remote host.
    pub owner: String,
    /// Group name, resolved by the remote host.
    pub group: String,
    /// Permission bits the destination must carry.
    pub mode: Mode,
    transport: &'a dyn Transport,
    log: &'a dyn Log,
}

impl fmt::Debug for RemoteFileResource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFileResource")
            .field("source", &self.source)
            .field("remote", &self.remote)
            .field("owner", &self.owner)
            .field("group", &self.group)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl<'a> RemoteFileResource<'a> {
    /// Create a new remote file resource.
    #[must_use]
    pub const fn new(
        source: PathBuf,
        remote: RemoteTarget,
        owner: String,
        group: String,
        mode: Mode,
        transport: &'a dyn Transport,
        log: &'a dyn Log,
    ) -> Self {
        Self {
            source,
            remote,
            owner,
            group,
            mode,
            transport,
            log,
        }
    }

    /// Unique temp artifact path in the destination's remote directory.
    fn temp_path(&self) -> String {
        let suffix: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        let parent = self.remote.parent_dir();
        if parent.ends_with('/') {
            format!("{parent}{TEMP_PREFIX}{suffix}")
        } else {
            format!("{parent}/{TEMP_PREFIX}{suffix}")
        }
    }

    /// `chown && chmod && mv` as a single remote shell command.
    fn install_command(&self, temp: &str) -> String {
        let temp = shell_quote(temp);
        format!(
            "chown {}:{} {temp} && chmod {} {temp} && mv -f {temp} {}",
            shell_quote(&self.owner),
            shell_quote(&self.group),
            self.mode,
            shell_quote(&self.remote.path),
        )
    }

    /// Try to delete an orphaned temp artifact after a failed install.
    ///
    /// Returns the `login:path` of the artifact when it could not be removed.
    fn cleanup(&self, temp: &str) -> Option<String> {
        let command = format!("rm -f -- {}", shell_quote(temp));
        match self.transport.execute(&self.remote, &command) {
            Ok(result) if result.success => {
                self.log.debug(&format!("removed temp artifact {temp}"));
                None
            }
            _ => {
                let orphan = self.remote.address(temp);
                self.log
                    .warn(&format!("temp artifact left on remote host: {orphan}"));
                Some(orphan)
            }
        }
    }

    /// Compare remote mode and ownership; any failure counts as a difference.
    fn metadata_state(&self) -> ResourceState {
        let command =
            compare::remote_metadata_command(&self.remote.path, &self.owner, &self.group);
        let result = match self.transport.execute(&self.remote, &command) {
            Ok(result) if result.success => result,
            Ok(result) => {
                return ResourceState::Incorrect {
                    current: format!("metadata unavailable: {}", failure_detail(&result)),
                };
            }
            Err(e) => {
                return ResourceState::Incorrect {
                    current: format!("metadata unavailable: {e:#}"),
                };
            }
        };
        RemoteMetadata::parse(&result.stdout).map_or_else(
            || ResourceState::Incorrect {
                current: format!("unparseable metadata: {}", result.stdout.trim()),
            },
            |meta| meta.state(self.mode),
        )
    }
}

impl Resource for RemoteFileResource<'_> {
    fn description(&self) -> String {
        self.remote.to_string()
    }

    fn current_state(&self) -> Result<ResourceState> {
        let scratch = NamedTempFile::new().context("create local scratch file")?;
        if let Err(e) = self
            .transport
            .download(&self.remote, &self.remote.path, scratch.path())
        {
            if matches!(
                e.downcast_ref::<InstallError>(),
                Some(InstallError::ToolNotFound(_))
            ) {
                return Err(e);
            }
            self.log
                .debug(&format!("cannot retrieve {}: {e:#}", self.remote));
            return Ok(ResourceState::Missing);
        }

        if !compare::files_identical(&self.source, scratch.path())? {
            return Ok(ResourceState::Incorrect {
                current: "content differs".to_string(),
            });
        }
        Ok(self.metadata_state())
    }

    fn apply(&self) -> Result<()> {
        self.remote.validate()?;
        let temp = self.temp_path();

        self.log.debug(&format!("uploading to {}", self.remote.address(&temp)));
        self.transport.upload(&self.remote, &self.source, &temp)?;

        let mut detail = match self
            .transport
            .execute(&self.remote, &self.install_command(&temp))
        {
            Ok(result) if result.success => return Ok(()),
            Ok(result) => failure_detail(&result),
            Err(e) => format!("{e:#}"),
        };
        if let Some(orphan) = self.cleanup(&temp) {
            detail = format!("{detail} (temp artifact left at {orphan})");
        }
        Err(InstallError::Transport {
            operation: "chown/chmod/rename".to_string(),
            destination: self.remote.to_string(),
            detail,
        }
        .into())
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
    use crate::exec::ExecResult;
    use crate::logging::{LogEntry, RecordingLog};
    use crate::target::Target;
    use crate::transport::MockTransport;
    use mockall::Sequence;

    fn exec_result(success: bool, stdout: &str) -> ExecResult {
        ExecResult {
            stdout: stdout.to_string(),
            stderr: if success { String::new() } else { "denied".to_string() },
            success,
            code: Some(i32::from(!success)),
        }
    }

    fn remote(raw: &str) -> RemoteTarget {
        match Target::parse(raw, 22) {
            Target::Remote(r) => r,
            Target::Local(_) => unreachable!("test target must be remote"),
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        source: PathBuf,
        log: RecordingLog,
    }

    impl Fixture {
        fn new(content: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let source = dir.path().join("config.yml");
            std::fs::write(&source, content).unwrap();
            Self {
                _dir: dir,
                source,
                log: RecordingLog::default(),
            }
        }

        fn resource<'a>(&'a self, transport: &'a MockTransport) -> RemoteFileResource<'a> {
            RemoteFileResource::new(
                self.source.clone(),
                remote("deploy@host1:/etc/app/config.yml"),
                "root".to_string(),
                "www-data".to_string(),
                Mode::from_bits(0o644),
                transport,
                &self.log,
            )
        }
    }

    fn download_writes(
        content: &'static str,
    ) -> impl Fn(&RemoteTarget, &str, &std::path::Path) -> Result<()> + Send + 'static {
        move |_, _, local| {
            std::fs::write(local, content)?;
            Ok(())
        }
    }

    #[test]
    fn failed_download_means_missing() {
        let fx = Fixture::new("a: 1\n");
        let mut transport = MockTransport::new();
        transport.expect_download().returning(|_, _, _| {
            Err(InstallError::Transport {
                operation: "download".to_string(),
                destination: "deploy@host1:/etc/app/config.yml".to_string(),
                detail: "No such file or directory".to_string(),
            }
            .into())
        });
        transport.expect_execute().never();

        let state = fx.resource(&transport).current_state().unwrap();
        assert_eq!(state, ResourceState::Missing);
        assert!(matches!(&fx.log.entries()[0], LogEntry::Debug(msg) if msg.contains("No such file")));
    }

    #[test]
    fn content_difference_skips_metadata_check() {
        let fx = Fixture::new("a: 1\n");
        let mut transport = MockTransport::new();
        transport.expect_download().returning(download_writes("a: 2\n"));
        transport.expect_execute().never();

        let state = fx.resource(&transport).current_state().unwrap();
        assert_eq!(
            state,
            ResourceState::Incorrect {
                current: "content differs".to_string()
            }
        );
    }

    #[test]
    fn matching_content_and_metadata_is_correct() {
        let fx = Fixture::new("a: 1\n");
        let mut transport = MockTransport::new();
        transport.expect_download().returning(download_writes("a: 1\n"));
        transport
            .expect_execute()
            .withf(|_, cmd| cmd.starts_with("stat -c '%a %u %g' -- '/etc/app/config.yml'"))
            .returning(|_, _| Ok(exec_result(true, "644 0 33\n0\nwww-data:x:33:\n")));

        let state = fx.resource(&transport).current_state().unwrap();
        assert_eq!(state, ResourceState::Correct);
    }

    #[test]
    fn mode_difference_is_incorrect() {
        let fx = Fixture::new("hello\n");
        let mut transport = MockTransport::new();
        transport.expect_download().returning(download_writes("hello\n"));
        transport
            .expect_execute()
            .returning(|_, _| Ok(exec_result(true, "600 0 33\n0\nwww-data:x:33:\n")));

        let state = fx.resource(&transport).current_state().unwrap();
        assert_eq!(
            state,
            ResourceState::Incorrect {
                current: "mode 0600".to_string()
            }
        );
    }

    #[test]
    fn failing_stat_is_incorrect() {
        let fx = Fixture::new("hello\n");
        let mut transport = MockTransport::new();
        transport.expect_download().returning(download_writes("hello\n"));
        transport
            .expect_execute()
            .returning(|_, _| Ok(exec_result(false, "")));

        let state = fx.resource(&transport).current_state().unwrap();
        assert!(matches!(state, ResourceState::Incorrect { .. }));
    }

    #[test]
    fn garbage_stat_output_is_incorrect() {
        let fx = Fixture::new("hello\n");
        let mut transport = MockTransport::new();
        transport.expect_download().returning(download_writes("hello\n"));
        transport
            .expect_execute()
            .returning(|_, _| Ok(exec_result(true, "stat: weird\n")));

        let state = fx.resource(&transport).current_state().unwrap();
        assert!(matches!(
            state,
            ResourceState::Incorrect { current } if current.starts_with("unparseable")
        ));
    }

    #[test]
    fn temp_path_is_adjacent_and_unique() {
        let fx = Fixture::new("x");
        let transport = MockTransport::new();
        let r = fx.resource(&transport);

        let a = r.temp_path();
        let b = r.temp_path();
        assert!(a.starts_with("/etc/app/.install_if_changed_tmp_"), "{a}");
        assert_eq!(a.len(), "/etc/app/.install_if_changed_tmp_".len() + 8);
        assert_ne!(a, b);
    }

    #[test]
    fn install_command_orders_chown_chmod_mv() {
        let fx = Fixture::new("x");
        let transport = MockTransport::new();
        let r = fx.resource(&transport);

        insta::assert_snapshot!(
            r.install_command("/etc/app/.install_if_changed_tmp_abcdefgh"),
            @"chown 'root':'www-data' '/etc/app/.install_if_changed_tmp_abcdefgh' && chmod 0644 '/etc/app/.install_if_changed_tmp_abcdefgh' && mv -f '/etc/app/.install_if_changed_tmp_abcdefgh' '/etc/app/config.yml'"
        );
    }

    #[test]
    fn apply_uploads_then_runs_chain() {
        let fx = Fixture::new("x");
        let mut seq = Sequence::new();
        let mut transport = MockTransport::new();
        let source = fx.source.clone();
        transport
            .expect_upload()
            .times(1)
            .in_sequence(&mut seq)
            .withf(move |_, local, tmp| {
                local == source && tmp.starts_with("/etc/app/.install_if_changed_tmp_")
            })
            .returning(|_, _, _| Ok(()));
        transport
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|_, cmd| cmd.starts_with("chown ") && cmd.ends_with("'/etc/app/config.yml'"))
            .returning(|_, _| Ok(exec_result(true, "")));

        fx.resource(&transport).apply().unwrap();
    }

    #[test]
    fn failed_upload_is_fatal_and_runs_nothing_remote() {
        let fx = Fixture::new("x");
        let mut transport = MockTransport::new();
        transport
            .expect_upload()
            .returning(|_, _, _| Err(anyhow::anyhow!("lost connection")));
        transport.expect_execute().never();

        let err = fx.resource(&transport).apply().unwrap_err();
        assert!(err.to_string().contains("lost connection"));
    }

    #[test]
    fn failed_chain_cleans_up_temp_artifact() {
        let fx = Fixture::new("x");
        let mut seq = Sequence::new();
        let mut transport = MockTransport::new();
        transport.expect_upload().returning(|_, _, _| Ok(()));
        transport
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(exec_result(false, "")));
        transport
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|_, cmd| cmd.starts_with("rm -f -- '/etc/app/.install_if_changed_tmp_"))
            .returning(|_, _| Ok(exec_result(true, "")));

        let err = fx.resource(&transport).apply().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::Transport { detail, .. }) if detail == "denied"
        ));
        assert!(
            !fx.log
                .entries()
                .iter()
                .any(|e| matches!(e, LogEntry::Warn(_)))
        );
    }

    #[test]
    fn failed_cleanup_warns_about_orphan() {
        let fx = Fixture::new("x");
        let mut transport = MockTransport::new();
        transport.expect_upload().returning(|_, _, _| Ok(()));
        transport
            .expect_execute()
            .times(2)
            .returning(|_, _| Ok(exec_result(false, "")));

        let err = fx.resource(&transport).apply().unwrap_err();
        let orphan = "deploy@host1:/etc/app/.install_if_changed_tmp_";
        assert!(
            err.to_string().contains(&format!("temp artifact left at {orphan}")),
            "{err}"
        );
        let warned = fx
            .log
            .entries()
            .into_iter()
            .any(|e| matches!(e, LogEntry::Warn(msg) if msg.contains(orphan)));
        assert!(warned, "expected orphan warning in {:?}", fx.log.entries());
    }

    #[test]
    fn unstartable_chain_still_cleans_up() {
        let fx = Fixture::new("x");
        let mut seq = Sequence::new();
        let mut transport = MockTransport::new();
        transport.expect_upload().returning(|_, _, _| Ok(()));
        transport
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(anyhow::anyhow!("failed to execute: ssh")));
        transport
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|_, cmd| cmd.starts_with("rm -f -- "))
            .returning(|_, _| Err(anyhow::anyhow!("failed to execute: ssh")));

        let err = fx.resource(&transport).apply().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::Transport { detail, .. })
                if detail.starts_with("failed to execute: ssh (temp artifact left at ")
        ));
    }

    #[test]
    fn missing_tools_are_not_a_missing_destination() {
        let fx = Fixture::new("x");
        let mut transport = MockTransport::new();
        transport
            .expect_download()
            .returning(|_, _, _| Err(InstallError::ToolNotFound("scp".to_string()).into()));
        transport.expect_execute().never();

        let err = fx.resource(&transport).current_state().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::ToolNotFound(tool)) if tool == "scp"
        ));
    }

    #[test]
    fn apply_rejects_missing_host() {
        let fx = Fixture::new("x");
        let transport = MockTransport::new();
        let mut r = fx.resource(&transport);
        r.remote = remote("deploy@:/etc/x");

        let err = r.apply().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::InvalidRemoteSyntax(_))
        ));
    }
}
