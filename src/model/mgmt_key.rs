//! Management key type for PIV administrative operations
//!
//! The management key is a 24-byte symmetric credential authorizing key
//! generation and other administrative commands on the card.

use std::fmt;

use thiserror::Error;
use yubikey::MgmKey;

/// 24-byte PIV management key, length-checked at construction.
#[derive(Clone, PartialEq, Eq)]
pub struct ManagementKey([u8; 24]);

impl ManagementKey {
    /// Management key length in bytes
    pub const LENGTH: usize = 24;

    /// Factory-default management key defined by the PIV specification.
    pub const DEFAULT: ManagementKey = ManagementKey([
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07,
        0x08, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08,
    ]);

    pub const fn new(key: [u8; 24]) -> Self {
        Self(key)
    }

    /// Creates a management key from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly 24 bytes.
    pub fn from_slice(key: &[u8]) -> Result<Self, ManagementKeyError> {
        if key.len() != Self::LENGTH {
            return Err(ManagementKeyError::InvalidLength {
                expected: Self::LENGTH,
                actual: key.len(),
            });
        }
        let mut bytes = [0u8; 24];
        bytes.copy_from_slice(key);
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_array(&self) -> &[u8; 24] {
        &self.0
    }
}

impl Default for ManagementKey {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Debug for ManagementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ManagementKey([REDACTED])")
    }
}

/// Errors that can occur when creating or converting a management key
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManagementKeyError {
    #[error("management key must be exactly {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Underlying yubikey crate rejected the key material
    #[error("invalid management key material: {reason}")]
    InvalidMaterial { reason: String },
}

impl TryFrom<&ManagementKey> for MgmKey {
    type Error = ManagementKeyError;

    fn try_from(key: &ManagementKey) -> Result<Self, Self::Error> {
        MgmKey::from_bytes(key.as_bytes()).map_err(|e| ManagementKeyError::InvalidMaterial {
            reason: e.to_string(),
        })
    }
}
