use std::fmt;

use thiserror::Error;

use crate::model::{Algorithm, EcPublicKey, ManagementKey, PinPolicy, SlotRef, TouchPolicy};

/// Structured failure reported by the card driver.
///
/// Card status words arrive as a structured field so callers classify on
/// `sw`, never on message text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The requested data object or application is absent on the card
    #[error("data object or application not found")]
    NotFound,

    /// The card answered with an error status word
    #[error("smart card error {sw:04x}: {message}")]
    Status { sw: u16, message: String },

    /// A private-key operation needed a PIN and none was available
    #[error("pin required but wasn't provided")]
    PinRequired,

    /// The driver cannot express the requested algorithm
    #[error("algorithm not supported by the card driver: {0:?}")]
    UnsupportedAlgorithm(Algorithm),

    /// Transport-level failure
    #[error("{0}")]
    Transport(String),
}

/// Card firmware version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl FirmwareVersion {
    /// First firmware with PIV attestation support.
    /// Ref: https://developers.yubico.com/PIV/Introduction/PIV_attestation.html
    pub const MIN_ATTESTATION: FirmwareVersion = FirmwareVersion {
        major: 4,
        minor: 3,
        patch: 0,
    };

    pub fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn supports_attestation(self) -> bool {
        self >= Self::MIN_ATTESTATION
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Certificate material read from a slot, as surfaced by the driver.
#[derive(Debug, Clone)]
pub struct SlotCertificate {
    /// Raw DER, consumed by attestation chain verification
    pub der: Vec<u8>,
    /// Subject public key, `None` when the certificate carries none the
    /// driver could parse
    pub public_key: Option<CertPublicKey>,
}

/// Public key embedded in a slot certificate.
#[derive(Debug, Clone)]
pub enum CertPublicKey {
    /// A key on one of the supported curves
    Ec(EcPublicKey),
    /// RSA or Ed25519 keys, not classified further
    Other,
}

/// Handle to a slot's private key, classified by key family.
#[derive(Debug, Clone)]
pub enum KeyHandle {
    /// An ECDSA key together with its public half
    Ecdsa(EcPublicKey),
    /// A key family without a key-agreement path here
    Unsupported,
}

/// Result of verifying a slot certificate against the device attestation
/// certificate. Policies are in the driver's representation; callers map
/// them into the model tags explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attestation {
    pub pin_policy: yubikey::PinPolicy,
    pub touch_policy: yubikey::TouchPolicy,
}

/// Credentials supplied to private-key operations.
///
/// The PIN is resolved from the card's credential state at call time, so a
/// `set_pin` between resolution and use takes effect.
#[derive(Clone, Default)]
pub struct KeyAuth {
    pub pin: Option<String>,
    /// Known PIN policy for the slot, letting the driver skip a metadata
    /// lookup and fail fast when a required PIN is missing
    pub pin_policy: Option<PinPolicy>,
}

impl fmt::Debug for KeyAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyAuth")
            .field("pin", &self.pin.as_ref().map(|_| "[REDACTED]"))
            .field("pin_policy", &self.pin_policy)
            .finish()
    }
}

/// Parameters for on-card key generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub algorithm: Algorithm,
    pub pin_policy: PinPolicy,
    pub touch_policy: TouchPolicy,
}

/// One open session to a card. Sessions close when dropped; at most one is
/// open per process (enforced by [`super::SessionGate`]).
pub trait CardSession {
    /// Serial number, read once at open.
    fn serial(&self) -> u32;

    /// Firmware version, read once at open.
    fn version(&self) -> FirmwareVersion;

    /// Fetches the attestation statement for a slot, proving its key was
    /// generated on-device. `DriverError::NotFound` means no generated key.
    fn attest(&mut self, slot: SlotRef) -> Result<SlotCertificate, DriverError>;

    /// Reads the plain certificate object for a slot. Present for imported
    /// keys/certificates, which may not be secure.
    fn certificate(&mut self, slot: SlotRef) -> Result<SlotCertificate, DriverError>;

    /// Reads the device attestation certificate (the chain root for
    /// [`CardDriver::verify_attestation`]).
    fn attestation_certificate(&mut self) -> Result<SlotCertificate, DriverError>;

    /// Obtains a private-key handle for the slot, classified by key family.
    fn private_key(
        &mut self,
        slot: SlotRef,
        public_key: &CertPublicKey,
        auth: &KeyAuth,
    ) -> Result<KeyHandle, DriverError>;

    /// Performs ECDH between the slot's private key and the peer's public
    /// key. PIN and touch policies are enforced inside this call.
    fn shared_key(
        &mut self,
        slot: SlotRef,
        auth: &KeyAuth,
        peer: &EcPublicKey,
    ) -> Result<Vec<u8>, DriverError>;

    /// Generates an asymmetric key in the slot, replacing any existing key.
    fn generate_key(
        &mut self,
        mgmt_key: &ManagementKey,
        slot: SlotRef,
        spec: KeySpec,
    ) -> Result<(), DriverError>;

    /// Verifies the card PIN.
    fn verify_pin(&mut self, pin: &str) -> Result<(), DriverError>;

    /// Unblocks the PIN with the PUK, setting it to a new value.
    fn unblock(&mut self, puk: &str, new_pin: &str) -> Result<(), DriverError>;
}

/// Driver for a family of PIV cards.
pub trait CardDriver: Send + Sync {
    type Session: CardSession;

    /// Names of the connected cards.
    fn token_names(&self) -> Result<Vec<String>, DriverError>;

    /// Opens a session to the named card.
    fn open(&self, name: &str) -> Result<Self::Session, DriverError>;

    /// Verifies that `leaf` is signed by the device attestation certificate
    /// `intermediate` and extracts the enforced policies.
    fn verify_attestation(
        &self,
        intermediate: &SlotCertificate,
        leaf: &SlotCertificate,
    ) -> Result<Attestation, DriverError>;
}
