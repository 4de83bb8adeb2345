//! PIV smart card interface for YubiKey security keys
//!
//! Discovers connected cards, classifies their key slots through PIV
//! attestation (generated on-device versus imported, enforced PIN and touch
//! policies, public key and algorithm), generates new asymmetric keys, and
//! derives ECDH shared secrets against a slot's private key.
//!
//! The core is driver-agnostic: it talks to the card through the traits in
//! [`ports`], with the PC/SC implementation wired up by [`api`]. Session
//! access is serialized process-wide; every operation opens and closes its
//! own session.

mod adapters;
pub mod api;
mod card;
pub mod discovery;
pub mod error;
pub mod model;
pub mod ports;
mod slot;

pub use adapters::PcscDriver;
pub use api::{card_slot, card_slots, cards};
pub use card::Card;
pub use error::{AuthError, CardError, LookupError, PivkitError, PivkitResult, SlotError};
pub use model::{
    Algorithm, EcPublicKey, ManagementKey, PinPolicy, PublicKeyError, SlotRef, TouchPolicy,
};
pub use ports::FirmwareVersion;
pub use slot::{GenerateKeyOpts, Slot};

/// Factory-default card PIN defined by the PIV specification.
pub const DEFAULT_PIN: &str = "123456";

/// Factory-default card PUK defined by the PIV specification.
pub const DEFAULT_PUK: &str = "12345678";

/// Factory-default card management key defined by the PIV specification.
pub const DEFAULT_MANAGEMENT_KEY: ManagementKey = ManagementKey::DEFAULT;
