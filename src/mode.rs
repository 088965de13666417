//! Octal permission modes.
use std::fmt;
use std::str::FromStr;

use crate::error::InstallError;

/// Mask selecting the permission bits plus setuid, setgid, and sticky.
pub const PERMISSION_MASK: u32 = 0o7777;

/// A 12-bit file permission mode parsed from an octal string such as `"0644"`.
///
/// # Examples
///
/// ```
/// use install_if_changed::mode::Mode;
///
/// let mode: Mode = "0644".parse().unwrap();
/// assert_eq!(mode.bits(), 0o644);
/// assert_eq!(mode.to_string(), "0644");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode(u32);

impl Mode {
    /// Build a mode from raw bits, discarding anything above the 12-bit mask.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & PERMISSION_MASK)
    }

    /// Return the raw permission bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl FromStr for Mode {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let bits = u32::from_str_radix(trimmed, 8)
            .map_err(|_| InstallError::InvalidMode(s.to_string()))?;
        if trimmed.is_empty() || bits > PERMISSION_MASK {
            return Err(InstallError::InvalidMode(s.to_string()));
        }
        Ok(Self(bits))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o}", self.0)
    }
}
