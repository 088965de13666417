//! Destination parsing: local paths and `[user@]host:/path` remote targets.
use std::fmt;
use std::path::PathBuf;

use crate::error::InstallError;

/// Default secure-shell port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Where a file should be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A path on the local filesystem.
    Local(PathBuf),
    /// A path on a host reachable over secure shell.
    Remote(RemoteTarget),
}

/// A remote destination addressed over secure shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    /// Login name; `None` uses the transport's ambient identity.
    pub user: Option<String>,
    /// Host name or address.
    pub host: String,
    /// Absolute or login-relative path on the host.
    pub path: String,
    /// Port for both copy and command execution.
    pub port: u16,
}

impl Target {
    /// Parse a raw destination string.
    ///
    /// A string is remote iff it contains `:` and the text before the first
    /// `:` contains `@`; everything else is a local path.  Parsing never fails:
    /// a remote target with an empty host or path is rejected later by
    /// [`RemoteTarget::validate`].
    ///
    /// # Examples
    ///
    /// ```
    /// use install_if_changed::target::Target;
    ///
    /// let t = Target::parse("deploy@host1:/etc/app/config.yml", 22);
    /// assert!(matches!(t, Target::Remote(ref r) if r.host == "host1"));
    ///
    /// let t = Target::parse("/etc/app/config.yml", 22);
    /// assert!(matches!(t, Target::Local(_)));
    /// ```
    #[must_use]
    pub fn parse(raw: &str, port: u16) -> Self {
        let Some((authority, path)) = raw.split_once(':') else {
            return Self::Local(PathBuf::from(raw));
        };
        let Some((user, host)) = authority.split_once('@') else {
            return Self::Local(PathBuf::from(raw));
        };

        Self::Remote(RemoteTarget {
            user: (!user.is_empty()).then(|| user.to_string()),
            host: host.to_string(),
            path: path.to_string(),
            port,
        })
    }
}

impl RemoteTarget {
    /// Ensure both a host and a path were supplied and the login cannot be
    /// mistaken for a command-line option.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::InvalidRemoteSyntax`] if the host or path is
    /// empty, or the login starts with `-`.
    pub fn validate(&self) -> Result<(), InstallError> {
        if self.host.is_empty() || self.path.is_empty() || self.login().starts_with('-') {
            return Err(InstallError::InvalidRemoteSyntax(self.to_string()));
        }
        Ok(())
    }

    /// The `user@host` (or bare `host`) login address.
    #[must_use]
    pub fn login(&self) -> String {
        self.user
            .as_ref()
            .map_or_else(|| self.host.clone(), |user| format!("{user}@{}", self.host))
    }

    /// The `login:path` form understood by `scp` for an arbitrary remote path.
    #[must_use]
    pub fn address(&self, path: &str) -> String {
        format!("{}:{path}", self.login())
    }

    /// Directory on the host that holds the destination.
    ///
    /// Returns `"."` when the path has no directory component so that temp
    /// artifacts still land next to the destination.
    #[must_use]
    pub fn parent_dir(&self) -> &str {
        match self.path.rsplit_once('/') {
            Some(("", _)) => "/",
            Some((parent, _)) => parent,
            None => ".",
        }
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address(&self.path))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn remote(raw: &str) -> RemoteTarget {
        match Target::parse(raw, DEFAULT_SSH_PORT) {
            Target::Remote(r) => r,
            Target::Local(p) => panic!("expected remote target, got local {}", p.display()),
        }
    }

    #[test]
    fn parses_user_host_path() {
        let r = remote("deploy@host1:/etc/app/config.yml");
        assert_eq!(r.user.as_deref(), Some("deploy"));
        assert_eq!(r.host, "host1");
        assert_eq!(r.path, "/etc/app/config.yml");
        assert_eq!(r.port, 22);
    }

    #[test]
    fn absolute_path_is_local() {
        assert_eq!(
            Target::parse("/etc/app/config.yml", 22),
            Target::Local(PathBuf::from("/etc/app/config.yml"))
        );
    }

    #[test]
    fn colon_without_at_is_local() {
        assert_eq!(
            Target::parse("host1:/etc/app.conf", 22),
            Target::Local(PathBuf::from("host1:/etc/app.conf"))
        );
    }

    #[test]
    fn at_after_colon_is_local() {
        assert!(matches!(
            Target::parse("/srv/a:b@c", 22),
            Target::Local(_)
        ));
    }

    #[test]
    fn splits_on_first_colon_only() {
        let r = remote("u@h:/opt/a:b");
        assert_eq!(r.path, "/opt/a:b");
    }

    #[test]
    fn empty_user_becomes_ambient_identity() {
        let r = remote("@host1:/etc/x");
        assert_eq!(r.user, None);
        assert_eq!(r.login(), "host1");
    }

    #[test]
    fn carries_port() {
        match Target::parse("u@h:/x", 2222) {
            Target::Remote(r) => assert_eq!(r.port, 2222),
            Target::Local(_) => panic!("expected remote"),
        }
    }

    #[test]
    fn validate_rejects_missing_host() {
        let r = remote("deploy@:/etc/x");
        assert!(matches!(
            r.validate(),
            Err(InstallError::InvalidRemoteSyntax(_))
        ));
    }

    #[test]
    fn validate_rejects_missing_path() {
        assert!(remote("deploy@host1:").validate().is_err());
        assert!(remote("deploy@host1:/etc/x").validate().is_ok());
    }

    #[test]
    fn validate_rejects_option_like_login() {
        let r = remote("-oProxyCommand=touch /tmp/x@host1:/etc/x");
        assert!(matches!(
            r.validate(),
            Err(InstallError::InvalidRemoteSyntax(_))
        ));
        assert!(remote("@-host1:/etc/x").validate().is_err());
        assert!(remote("de-ploy@host1:/etc/x").validate().is_ok());
    }

    #[test]
    fn parent_dir_variants() {
        assert_eq!(remote("u@h:/etc/app/config.yml").parent_dir(), "/etc/app");
        assert_eq!(remote("u@h:/config.yml").parent_dir(), "/");
        assert_eq!(remote("u@h:config.yml").parent_dir(), ".");
        assert_eq!(remote("u@h:conf/app.yml").parent_dir(), "conf");
    }

    #[test]
    fn display_round_trips_login_and_path() {
        assert_eq!(
            remote("deploy@host1:/etc/app/config.yml").to_string(),
            "deploy@host1:/etc/app/config.yml"
        );
    }
}
