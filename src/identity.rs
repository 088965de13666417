//! Owner and group name resolution against the local account databases.
use anyhow::{Context as _, Result};
use nix::unistd::{Group, User};

use crate::error::InstallError;

/// Looks up numeric ids for user and group names.
#[cfg_attr(test, mockall::automock)]
pub trait IdentityResolver {
    /// Return the uid for `name`, or `None` if no such user exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the user database cannot be queried.
    fn user_id(&self, name: &str) -> Result<Option<u32>>;

    /// Return the gid for `name`, or `None` if no such group exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the group database cannot be queried.
    fn group_id(&self, name: &str) -> Result<Option<u32>>;
}

/// [`IdentityResolver`] backed by the system passwd and group databases
/// (including any NSS sources such as LDAP).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemIdentity;

impl IdentityResolver for SystemIdentity {
    fn user_id(&self, name: &str) -> Result<Option<u32>> {
        let user = User::from_name(name).with_context(|| format!("looking up user {name}"))?;
        Ok(user.map(|u| u.uid.as_raw()))
    }

    fn group_id(&self, name: &str) -> Result<Option<u32>> {
        let group = Group::from_name(name).with_context(|| format!("looking up group {name}"))?;
        Ok(group.map(|g| g.gid.as_raw()))
    }
}

/// Numeric owner and group a destination should carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    /// Owner uid.
    pub uid: u32,
    /// Group gid.
    pub gid: u32,
}

/// Resolve `owner` and `group` names to an [`Ownership`].
///
/// # Errors
///
/// Returns [`InstallError::UnknownUser`] or [`InstallError::UnknownGroup`] if
/// either name is missing, or the lookup error itself.
pub fn resolve(resolver: &dyn IdentityResolver, owner: &str, group: &str) -> Result<Ownership> {
    let uid = resolver
        .user_id(owner)?
        .ok_or_else(|| InstallError::UnknownUser(owner.to_string()))?;
    let gid = resolver
        .group_id(group)?
        .ok_or_else(|| InstallError::UnknownGroup(group.to_string()))?;
    Ok(Ownership { uid, gid })
}
