//! Error types for pivkit operations
//!
//! Errors are values organized by recovery strategy: card/transport errors
//! and corrupt slot state are fatal for the operation, authentication errors
//! are caller-recoverable (re-prompt and retry), lookup and precondition
//! errors indicate bad arguments. There is no retry logic anywhere in this
//! crate; every failure is surfaced immediately.

use thiserror::Error;

use crate::model::PublicKeyError;
use crate::ports::DriverError;

/// Result type alias for pivkit operations
pub type PivkitResult<T> = Result<T, PivkitError>;

/// Top-level error type for all pivkit operations
#[derive(Error, Debug)]
pub enum PivkitError {
    /// Card transport and session errors
    #[error("card error: {0}")]
    Card(#[from] CardError),

    /// PIN, touch and management key failures classified from card status
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Slot state and precondition errors
    #[error("slot error: {0}")]
    Slot(#[from] SlotError),

    /// Serial/slot lookup errors
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// Peer public key validation errors
    #[error("public key error: {0}")]
    PublicKey(#[from] PublicKeyError),

    /// Unclassified driver failure, surfaced unchanged
    #[error("card driver error: {0}")]
    Driver(#[from] DriverError),
}

/// Transport and session errors
#[derive(Error, Debug)]
pub enum CardError {
    #[error("couldn't get the smart card list: {reason}")]
    ListFailed { reason: String },

    #[error("couldn't connect to the YubiKey smart card ({card}): {reason}")]
    ConnectionFailed { card: String, reason: String },

    #[error("version of the YubiKey ({serial}) is not supported: {version}")]
    UnsupportedVersion { serial: String, version: String },
}

/// Authentication errors classified from card status words.
///
/// These are recoverable by the caller: re-prompt for a credential and call
/// again. They are distinct kinds so callers can match on them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// PIN verification failed (status `63cX`)
    #[error("invalid PIN")]
    InvalidPin { retries: u8 },

    /// A PIN was required but none was available
    #[error("missing PIN")]
    MissingPin,

    /// Security status not satisfied (status `6982`)
    #[error("authentication error")]
    Failed,

    /// Authentication method blocked (status `6983`)
    #[error("authentication method blocked")]
    Blocked,
}

/// Slot state and precondition errors
#[derive(Error, Debug)]
pub enum SlotError {
    #[error("couldn't access to the key slot ({slot}): {reason}")]
    AccessFailed { slot: String, reason: String },

    /// The slot certificate carries no public key; the slot cannot be
    /// trusted.
    #[error("slot certificate has no public key ({slot})")]
    MissingPublicKey { slot: String },

    #[error("couldn't access to the key attestation certificate ({slot}): {reason}")]
    AttestationCertificate { slot: String, reason: String },

    /// Attestation chain verification failed; the slot cannot be trusted.
    #[error("couldn't access to the slot attestation ({slot}): {reason}")]
    AttestationFailed { slot: String, reason: String },

    #[error("couldn't get the slot key ({slot}): {reason}")]
    KeyUnavailable { slot: String, reason: String },

    #[error("slot has no key")]
    NoKey,

    #[error("slot has already a key")]
    AlreadyHasKey,

    #[error("slot doesn't have an ECDSA key")]
    NotEcdsa,
}

/// Serial/slot lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("missing key serial or slot")]
    MissingSerialOrSlot,

    #[error("key not found: {serial}")]
    SerialNotFound { serial: String },

    #[error("key slot not found: {serial}:{slot}")]
    SlotNotFound { serial: String, slot: String },
}

/// Maps a status-bearing driver failure to its semantic error.
///
/// Centralized so ECDH and key generation classify identically:
///
/// | card status                                  | classified error      |
/// |----------------------------------------------|-----------------------|
/// | `63cX` verification failed, X retries left   | `AuthError::InvalidPin` |
/// | `6982` security status not satisfied         | `AuthError::Failed`   |
/// | `6983` authentication method blocked         | `AuthError::Blocked`  |
/// | pin required but wasn't provided             | `AuthError::MissingPin` |
///
/// Anything else is surfaced unchanged.
pub(crate) fn classify_driver_error(err: DriverError) -> PivkitError {
    match err {
        DriverError::Status { sw, .. } if sw & 0xfff0 == 0x63c0 => AuthError::InvalidPin {
            retries: (sw & 0x000f) as u8,
        }
        .into(),
        DriverError::Status { sw: 0x6982, .. } => AuthError::Failed.into(),
        DriverError::Status { sw: 0x6983, .. } => AuthError::Blocked.into(),
        DriverError::PinRequired => AuthError::MissingPin.into(),
        other => PivkitError::Driver(other),
    }
}
