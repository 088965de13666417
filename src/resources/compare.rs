//! Content and metadata comparison between a source and a destination.
//!
//! Content is always compared byte for byte; size and timestamps are never
//! trusted as evidence of equality.
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use anyhow::{Context as _, Result};

use super::ResourceState;
use crate::identity::Ownership;
use crate::mode::Mode;
use crate::transport::shell_quote;

const CHUNK: usize = 64 * 1024;

/// Compare two files byte for byte.
///
/// A length mismatch short-circuits to `false`; equal lengths are always
/// followed by a full read of both files.
///
/// # Errors
///
/// Returns an error if either file cannot be opened or read.
pub fn files_identical(a: &Path, b: &Path) -> Result<bool> {
    let fa = File::open(a).with_context(|| format!("open {}", a.display()))?;
    let fb = File::open(b).with_context(|| format!("open {}", b.display()))?;
    if fa.metadata()?.len() != fb.metadata()?.len() {
        return Ok(false);
    }

    let mut ra = BufReader::with_capacity(CHUNK, fa);
    let mut rb = BufReader::with_capacity(CHUNK, fb);
    let mut buf_a = vec![0u8; CHUNK];
    let mut buf_b = vec![0u8; CHUNK];
    loop {
        let n = read_full(&mut ra, &mut buf_a).with_context(|| format!("read {}", a.display()))?;
        let m = read_full(&mut rb, &mut buf_b).with_context(|| format!("read {}", b.display()))?;
        if buf_a.get(..n) != buf_b.get(..m) {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as the reader allows; returns the number of bytes read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let Some(rest) = buf.get_mut(filled..) else {
            break;
        };
        match reader.read(rest) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Determine whether the local `dest` matches `source` in content and carries
/// the requested `mode` and `owner`.
///
/// # Errors
///
/// Returns an error if `source` cannot be read or `dest` exists but cannot be
/// inspected.
pub fn local_state(
    source: &Path,
    dest: &Path,
    owner: Ownership,
    mode: Mode,
) -> Result<ResourceState> {
    use std::os::unix::fs::MetadataExt as _;

    let meta = match std::fs::metadata(dest) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ResourceState::Missing),
        Err(e) => return Err(e).with_context(|| format!("stat {}", dest.display())),
    };
    if !meta.is_file() {
        return Ok(ResourceState::Incorrect {
            current: "not a regular file".to_string(),
        });
    }
    if !files_identical(source, dest)? {
        return Ok(ResourceState::Incorrect {
            current: "content differs".to_string(),
        });
    }
    Ok(metadata_state(
        Mode::from_bits(meta.mode()),
        meta.uid(),
        meta.gid(),
        owner,
        mode,
    ))
}

/// Compare observed metadata with the desired mode and ownership.
fn metadata_state(
    current_mode: Mode,
    uid: u32,
    gid: u32,
    owner: Ownership,
    mode: Mode,
) -> ResourceState {
    if current_mode != mode {
        return ResourceState::Incorrect {
            current: format!("mode {current_mode}"),
        };
    }
    if uid != owner.uid || gid != owner.gid {
        return ResourceState::Incorrect {
            current: format!("owner {uid}:{gid}"),
        };
    }
    ResourceState::Correct
}

/// Shell command that reports a remote file's metadata and the ids of the
/// requested owner and group as seen by the remote host.
///
/// Output is three lines: `<octal mode> <uid> <gid>`, `<owner uid>`, and the
/// `getent` entry of the group.
#[must_use]
pub fn remote_metadata_command(path: &str, owner: &str, group: &str) -> String {
    format!(
        "stat -c '%a %u %g' -- {} && id -u -- {} && getent group -- {}",
        shell_quote(path),
        shell_quote(owner),
        shell_quote(group),
    )
}

/// Metadata of a remote file plus the remote ids of the requested owner and group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteMetadata {
    /// Permission bits of the destination.
    pub mode: Mode,
    /// Owner uid of the destination.
    pub uid: u32,
    /// Group gid of the destination.
    pub gid: u32,
    /// Requested owner and group, resolved on the remote host.
    pub expected: Ownership,
}

impl RemoteMetadata {
    /// Parse the output of [`remote_metadata_command`].
    ///
    /// Returns `None` on any malformed or missing token.
    #[must_use]
    pub fn parse(output: &str) -> Option<Self> {
        let mut lines = output.lines().map(str::trim).filter(|l| !l.is_empty());

        let mut stat = lines.next()?.split_whitespace();
        let mode = u32::from_str_radix(stat.next()?, 8).ok()?;
        let uid = stat.next()?.parse().ok()?;
        let gid = stat.next()?.parse().ok()?;
        if stat.next().is_some() {
            return None;
        }

        let expected_uid = lines.next()?.parse().ok()?;
        let expected_gid = lines.next()?.split(':').nth(2)?.parse().ok()?;

        Some(Self {
            mode: Mode::from_bits(mode),
            uid,
            gid,
            expected: Ownership {
                uid: expected_uid,
                gid: expected_gid,
            },
        })
    }

    /// Compare against the requested `mode` and the remotely resolved owner.
    #[must_use]
    pub fn state(&self, mode: Mode) -> ResourceState {
        metadata_state(self.mode, self.uid, self.gid, self.expected, mode)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::os::unix::fs::{MetadataExt as _, PermissionsExt as _};

    fn current_owner(path: &Path) -> Ownership {
        let meta = std::fs::metadata(path).unwrap();
        Ownership {
            uid: meta.uid(),
            gid: meta.gid(),
        }
    }

    #[test]
    fn identical_files_compare_equal() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, "hello\n").unwrap();
        std::fs::write(&b, "hello\n").unwrap();
        assert!(files_identical(&a, &b).unwrap());
    }

    #[test]
    fn same_length_different_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, "hello\n").unwrap();
        std::fs::write(&b, "jello\n").unwrap();
        assert!(!files_identical(&a, &b).unwrap());
    }

    #[test]
    fn difference_beyond_first_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let mut data = vec![b'x'; CHUNK * 2 + 17];
        std::fs::write(&a, &data).unwrap();
        if let Some(last) = data.last_mut() {
            *last = b'y';
        }
        std::fs::write(&b, &data).unwrap();
        assert!(!files_identical(&a, &b).unwrap());
        std::fs::write(&b, std::fs::read(&a).unwrap()).unwrap();
        assert!(files_identical(&a, &b).unwrap());
    }

    #[test]
    fn empty_files_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, "").unwrap();
        std::fs::write(&b, "").unwrap();
        assert!(files_identical(&a, &b).unwrap());
    }

    #[test]
    fn local_state_missing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::write(&src, "x").unwrap();
        let owner = current_owner(&src);
        let state = local_state(&src, &dir.path().join("absent"), owner, Mode::from_bits(0o644))
            .unwrap();
        assert_eq!(state, ResourceState::Missing);
    }

    #[test]
    fn local_state_directory_is_incorrect() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::write(&src, "x").unwrap();
        let owner = current_owner(&src);
        let state = local_state(&src, dir.path(), owner, Mode::from_bits(0o644)).unwrap();
        assert!(matches!(state, ResourceState::Incorrect { .. }));
    }

    #[test]
    fn local_state_detects_mode_difference() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        std::fs::write(&src, "hello\n").unwrap();
        std::fs::write(&dst, "hello\n").unwrap();
        std::fs::set_permissions(&dst, std::fs::Permissions::from_mode(0o600)).unwrap();
        let owner = current_owner(&dst);

        let state = local_state(&src, &dst, owner, Mode::from_bits(0o644)).unwrap();
        assert_eq!(
            state,
            ResourceState::Incorrect {
                current: "mode 0600".to_string()
            }
        );
    }

    #[test]
    fn local_state_detects_owner_difference() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        std::fs::write(&src, "hello\n").unwrap();
        std::fs::write(&dst, "hello\n").unwrap();
        std::fs::set_permissions(&dst, std::fs::Permissions::from_mode(0o644)).unwrap();
        let mut owner = current_owner(&dst);
        owner.gid = owner.gid.wrapping_add(1);

        let state = local_state(&src, &dst, owner, Mode::from_bits(0o644)).unwrap();
        assert!(
            matches!(&state, ResourceState::Incorrect { current } if current.starts_with("owner")),
            "unexpected state: {state:?}"
        );
    }

    #[test]
    fn local_state_correct_when_everything_matches() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        std::fs::write(&src, "hello\n").unwrap();
        std::fs::write(&dst, "hello\n").unwrap();
        std::fs::set_permissions(&dst, std::fs::Permissions::from_mode(0o640)).unwrap();
        let owner = current_owner(&dst);

        let state = local_state(&src, &dst, owner, Mode::from_bits(0o640)).unwrap();
        assert_eq!(state, ResourceState::Correct);
    }

    #[test]
    fn remote_command_quotes_every_argument() {
        let cmd = remote_metadata_command("/etc/app/my file.yml", "deploy", "www-data");
        assert_eq!(
            cmd,
            "stat -c '%a %u %g' -- '/etc/app/my file.yml' && id -u -- 'deploy' && getent group -- 'www-data'"
        );
    }

    #[test]
    fn parses_remote_metadata() {
        let meta = RemoteMetadata::parse("644 0 33\n0\nwww-data:x:33:\n").unwrap();
        assert_eq!(meta.mode, Mode::from_bits(0o644));
        assert_eq!(meta.uid, 0);
        assert_eq!(meta.gid, 33);
        assert_eq!(meta.expected, Ownership { uid: 0, gid: 33 });
        assert_eq!(meta.state(Mode::from_bits(0o644)), ResourceState::Correct);
    }

    #[test]
    fn remote_mode_mismatch_is_incorrect() {
        let meta = RemoteMetadata::parse("600 0 0\n0\nroot:x:0:\n").unwrap();
        assert!(matches!(
            meta.state(Mode::from_bits(0o644)),
            ResourceState::Incorrect { .. }
        ));
    }

    #[test]
    fn remote_special_bits_are_kept() {
        let meta = RemoteMetadata::parse("4755 0 0\n0\nroot:x:0:\n").unwrap();
        assert_eq!(meta.mode.bits(), 0o4755);
    }

    #[test]
    fn rejects_malformed_remote_metadata() {
        assert!(RemoteMetadata::parse("").is_none());
        assert!(RemoteMetadata::parse("644 0\n0\nroot:x:0:\n").is_none());
        assert!(RemoteMetadata::parse("abc 0 0\n0\nroot:x:0:\n").is_none());
        assert!(RemoteMetadata::parse("644 0 0 9\n0\nroot:x:0:\n").is_none());
        assert!(RemoteMetadata::parse("644 0 0\n").is_none());
        assert!(RemoteMetadata::parse("644 0 0\n0\nroot\n").is_none());
    }
}
