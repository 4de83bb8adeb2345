//! Ports (traits) for the PIV card driver collaborator
//!
//! The core depends on these abstractions, not on the PC/SC stack. The
//! production adapter lives in `crate::adapters::pcsc`; tests drive the
//! core through an in-memory mock.

mod driver;
mod gate;

pub use driver::{
    Attestation, CardDriver, CardSession, CertPublicKey, DriverError, FirmwareVersion, KeyAuth,
    KeyHandle, KeySpec, SlotCertificate,
};
pub use gate::SessionGate;
