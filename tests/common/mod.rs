// Shared helpers for integration tests.
//
// Provides a temporary directory plus the names of the account that owns it,
// so installs can request an owner and group the test process may assign
// without privileges.
#![allow(dead_code, clippy::expect_used)]

use std::os::unix::fs::{MetadataExt as _, PermissionsExt as _};
use std::path::{Path, PathBuf};

use install_if_changed::commands::install::{self, InstallOutcome, InstallRequest};
use install_if_changed::exec::SystemExecutor;
use install_if_changed::identity::SystemIdentity;
use install_if_changed::logging::Logger;
use install_if_changed::mode::Mode;
use install_if_changed::transport::SshTransport;
use nix::unistd::{Gid, Group, Uid, User};

/// An isolated scratch directory backed by a [`tempfile::TempDir`].
#[derive(Debug)]
pub struct Sandbox {
    dir: tempfile::TempDir,
    /// Name of the directory's owner.
    pub owner: String,
    /// Name of the directory's group.
    pub group: String,
}

impl Sandbox {
    /// Create a sandbox, or `None` when the current ids have no names
    /// (e.g. a container without passwd entries).
    pub fn new() -> Option<Self> {
        let dir = tempfile::tempdir().expect("create temp dir");
        let meta = std::fs::metadata(dir.path()).expect("stat temp dir");
        let owner = User::from_uid(Uid::from_raw(meta.uid())).ok()??.name;
        let group = Group::from_gid(Gid::from_raw(meta.gid())).ok()??.name;
        Some(Self { dir, owner, group })
    }

    /// Root of the sandbox.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to `name` inside the sandbox.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).expect("write file");
        path
    }

    /// Set the permission bits of `path`.
    pub fn chmod(path: &Path, mode: u32) {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).expect("chmod");
    }

    /// Permission bits of `path`.
    pub fn mode_of(path: &Path) -> u32 {
        std::fs::metadata(path).expect("stat").mode() & 0o7777
    }

    /// A request installing `source` at `dest` owned by the sandbox account.
    pub fn request(&self, source: &Path, dest: &Path, mode: u32) -> InstallRequest {
        InstallRequest {
            source: source.to_path_buf(),
            dest: dest.to_string_lossy().to_string(),
            owner: self.owner.clone(),
            group: self.group.clone(),
            mode: Mode::from_bits(mode),
            dry_run: false,
            ssh_port: 22,
        }
    }
}

/// Run the driver with the real system collaborators.
pub fn run(request: &InstallRequest) -> InstallOutcome {
    let transport = SshTransport::new(SystemExecutor);
    install::run(request, &SystemIdentity, &transport, &Logger)
}
