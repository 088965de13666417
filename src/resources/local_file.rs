//! Local file resource: atomic temp-file-then-rename install.
use std::fs::{File, FileTimes, Permissions};
use std::io::{self, BufReader};
use std::os::unix::fs::{PermissionsExt as _, fchown};
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use tempfile::NamedTempFile;

use super::{Resource, ResourceState, TEMP_PREFIX, compare};
use crate::identity::Ownership;
use crate::mode::Mode;

/// A file on the local filesystem that should mirror `source`.
#[derive(Debug, Clone)]
pub struct LocalFileResource {
    /// File whose bytes are installed.
    pub source: PathBuf,
    /// Destination path.
    pub target: PathBuf,
    /// Numeric owner and group the destination must carry.
    pub owner: Ownership,
    /// Permission bits the destination must carry.
    pub mode: Mode,
}

impl LocalFileResource {
    /// Create a new local file resource.
    #[must_use]
    pub const fn new(source: PathBuf, target: PathBuf, owner: Ownership, mode: Mode) -> Self {
        Self {
            source,
            target,
            owner,
            mode,
        }
    }

    /// Directory that receives the temp artifact; same filesystem as the target.
    fn staging_dir(&self) -> &Path {
        match self.target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Stage a fully prepared copy of the source next to the target.
    ///
    /// The returned temp file already carries the final bytes, timestamps,
    /// ownership, and mode.  It is unlinked when dropped.
    fn stage(&self) -> Result<NamedTempFile> {
        let dir = self.staging_dir();
        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(dir)
            .with_context(|| format!("create temp file in {}", dir.display()))?;

        let source = File::open(&self.source)
            .with_context(|| format!("open source: {}", self.source.display()))?;
        let src_meta = source.metadata()?;
        io::copy(&mut BufReader::new(source), temp.as_file_mut()).with_context(|| {
            format!(
                "copy {} to {}",
                self.source.display(),
                temp.path().display()
            )
        })?;

        let file = temp.as_file();
        let times = FileTimes::new()
            .set_accessed(src_meta.accessed()?)
            .set_modified(src_meta.modified()?);
        file.set_times(times)
            .with_context(|| format!("set times: {}", temp.path().display()))?;

        // chown clears setuid/setgid, so permissions are applied afterwards.
        fchown(file, Some(self.owner.uid), Some(self.owner.gid)).with_context(|| {
            format!(
                "chown {}:{} {}",
                self.owner.uid,
                self.owner.gid,
                temp.path().display()
            )
        })?;
        file.set_permissions(Permissions::from_mode(self.mode.bits()))
            .with_context(|| format!("chmod {} {}", self.mode, temp.path().display()))?;
        file.sync_all()
            .with_context(|| format!("sync {}", temp.path().display()))?;

        Ok(temp)
    }
}

impl Resource for LocalFileResource {
    fn description(&self) -> String {
        self.target.display().to_string()
    }

    fn current_state(&self) -> Result<ResourceState> {
        compare::local_state(&self.source, &self.target, self.owner, self.mode)
    }

    fn apply(&self) -> Result<()> {
        let temp = self.stage()?;
        // A failed persist hands the temp file back inside the error; dropping
        // it unlinks the artifact.
        temp.persist(&self.target)
            .map_err(|e| e.error)
            .with_context(|| format!("rename into place: {}", self.target.display()))?;
        Ok(())
    }
}
