//! Elliptic-curve public key wrapper
//!
//! Slot public keys and ECDH peer keys travel as compressed SEC1 points;
//! the curve is selected by the encoding length.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use thiserror::Error;

use crate::model::Algorithm;

/// Compressed point length for P-256
pub const COMPRESSED_P256_LEN: usize = 33;
/// Compressed point length for P-384
pub const COMPRESSED_P384_LEN: usize = 49;

/// A public key on one of the supported curves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcPublicKey {
    P256(p256::PublicKey),
    P384(p384::PublicKey),
}

impl EcPublicKey {
    /// Parses a compressed SEC1 point, selecting the curve from the length
    /// (33 bytes for P-256, 49 for P-384).
    ///
    /// # Errors
    ///
    /// `Unsupported` for any other length; `Invalid` when the bytes do not
    /// decode to a point on the selected curve.
    pub fn from_compressed(bytes: &[u8]) -> Result<Self, PublicKeyError> {
        match bytes.len() {
            COMPRESSED_P256_LEN => p256::PublicKey::from_sec1_bytes(bytes)
                .map(EcPublicKey::P256)
                .map_err(|_| PublicKeyError::Invalid),
            COMPRESSED_P384_LEN => p384::PublicKey::from_sec1_bytes(bytes)
                .map(EcPublicKey::P384)
                .map_err(|_| PublicKeyError::Invalid),
            _ => Err(PublicKeyError::Unsupported),
        }
    }

    /// Compressed SEC1 encoding.
    pub fn to_compressed(&self) -> Vec<u8> {
        match self {
            EcPublicKey::P256(key) => key.to_encoded_point(true).as_bytes().to_vec(),
            EcPublicKey::P384(key) => key.to_encoded_point(true).as_bytes().to_vec(),
        }
    }

    /// Uncompressed SEC1 encoding, the form the card expects for the
    /// KEY AGREEMENT payload.
    pub fn to_uncompressed(&self) -> Vec<u8> {
        match self {
            EcPublicKey::P256(key) => key.to_encoded_point(false).as_bytes().to_vec(),
            EcPublicKey::P384(key) => key.to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    /// Algorithm tag derived from the curve.
    pub fn algorithm(&self) -> Algorithm {
        match self {
            EcPublicKey::P256(_) => Algorithm::Ec256,
            EcPublicKey::P384(_) => Algorithm::Ec384,
        }
    }
}

/// Peer public key validation errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicKeyError {
    /// The encoding length matches no supported curve
    #[error("unsupported public key")]
    Unsupported,

    /// The bytes are not a valid point on the curve
    #[error("invalid public key size")]
    Invalid,
}
