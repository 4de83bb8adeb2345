//! Asymmetric key algorithm tags for PIV slots

use std::fmt;

/// Asymmetric key algorithm of a slot key.
///
/// `Unknown` is the zero value; it is used for slots without a key and for
/// key types outside the classified set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Unclassified or absent key
    #[default]
    Unknown,
    /// ECDSA over NIST P-256
    Ec256,
    /// ECDSA over NIST P-384
    Ec384,
    /// Ed25519
    Ed25519,
    /// RSA 1024-bit
    Rsa1024,
    /// RSA 2048-bit
    Rsa2048,
}

impl Algorithm {
    /// Canonical display name. Empty for `Unknown`.
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Ec256 => "p256",
            Algorithm::Ec384 => "p384",
            Algorithm::Ed25519 => "ed25519",
            Algorithm::Rsa1024 => "rsa1024",
            Algorithm::Rsa2048 => "rsa2048",
            Algorithm::Unknown => "",
        }
    }

    /// PIV algorithm reference byte used by the card driver.
    ///
    /// Total: `Unknown` maps to the zero identifier, never an error.
    pub fn piv_id(self) -> u8 {
        match self {
            Algorithm::Ec256 => 0x11,
            Algorithm::Ec384 => 0x14,
            Algorithm::Ed25519 => 0xe0,
            Algorithm::Rsa1024 => 0x06,
            Algorithm::Rsa2048 => 0x07,
            Algorithm::Unknown => 0x00,
        }
    }

    /// Converts a PIV algorithm reference byte back to the tag.
    ///
    /// Unrecognized identifiers map to `Unknown`.
    pub fn from_piv_id(id: u8) -> Self {
        match id {
            0x11 => Algorithm::Ec256,
            0x14 => Algorithm::Ec384,
            0xe0 => Algorithm::Ed25519,
            0x06 => Algorithm::Rsa1024,
            0x07 => Algorithm::Rsa2048,
            _ => Algorithm::Unknown,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
