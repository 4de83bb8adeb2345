//! Slot resolution and key operations
//!
//! A [`Slot`] is a snapshot of one key slot: whether a key exists, whether
//! it was generated on-device or imported, the enforced PIN/touch policies,
//! and the public key. Snapshots are built fresh on every resolution and
//! never mutated afterwards; operations that change card state require a
//! new resolution to observe the result.

use std::fmt;

use tracing::{debug, info};

use crate::card::Card;
use crate::error::{classify_driver_error, PivkitResult, SlotError};
use crate::model::{Algorithm, EcPublicKey, ManagementKey, PinPolicy, SlotRef, TouchPolicy};
use crate::ports::{CardDriver, CardSession, CertPublicKey, DriverError, KeyAuth, KeyHandle, KeySpec};

/// One classified key slot of a card.
pub struct Slot<D: CardDriver> {
    key: &'static str,
    card: Card<D>,
    slot: SlotRef,
    pin_policy: PinPolicy,
    touch_policy: TouchPolicy,
    has_key: bool,
    is_generated: bool,
    is_imported: bool,
    public_key: Vec<u8>,
    public_key_algorithm: Algorithm,
    ec_public_key: Option<EcPublicKey>,
}

impl<D: CardDriver> fmt::Debug for Slot<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("key", &self.key)
            .field("has_key", &self.has_key)
            .field("is_generated", &self.is_generated)
            .field("is_imported", &self.is_imported)
            .field("pin_policy", &self.pin_policy)
            .field("touch_policy", &self.touch_policy)
            .field("public_key_algorithm", &self.public_key_algorithm)
            .finish_non_exhaustive()
    }
}

impl<D: CardDriver> Slot<D> {
    fn new(key: &'static str, card: Card<D>, slot: SlotRef) -> Self {
        Self {
            key,
            card,
            slot,
            pin_policy: PinPolicy::Unknown,
            touch_policy: TouchPolicy::Unknown,
            has_key: false,
            is_generated: false,
            is_imported: false,
            public_key: Vec::new(),
            public_key_algorithm: Algorithm::Unknown,
            ec_public_key: None,
        }
    }

    /// The slot key (`"9a"`, `"82"`, ...).
    pub fn key(&self) -> &str {
        self.key
    }

    /// PIN policy enforced for the slot key. `Unknown` when no key is
    /// present.
    pub fn pin_policy(&self) -> PinPolicy {
        self.pin_policy
    }

    /// Touch policy enforced for the slot key. `Unknown` when no key is
    /// present.
    pub fn touch_policy(&self) -> TouchPolicy {
        self.touch_policy
    }

    /// Whether the slot holds a key.
    pub fn has_key(&self) -> bool {
        self.has_key
    }

    /// Whether the slot key was generated on-device (secure).
    pub fn is_generated(&self) -> bool {
        self.is_generated
    }

    /// Whether the slot key was imported (may not be secure).
    pub fn is_imported(&self) -> bool {
        self.is_imported
    }

    /// Compressed public key of the slot, empty when absent or not an
    /// EC256/EC384 key.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Public key algorithm of the slot.
    pub fn public_key_algorithm(&self) -> Algorithm {
        self.public_key_algorithm
    }

    /// Derives a shared key from the slot's private key and the given peer
    /// public key (compressed). PIN and touch policies are enforced by the
    /// card during the key agreement, not here.
    pub fn shared_key(&self, peer_public_key: &[u8]) -> PivkitResult<Vec<u8>> {
        if !self.has_key {
            return Err(SlotError::NoKey.into());
        }

        // Validated before any card contact.
        let peer = EcPublicKey::from_compressed(peer_public_key)?;

        self.card.with_session(|_, session| {
            let auth = self.key_auth();
            let cert_public_key = match &self.ec_public_key {
                Some(key) => CertPublicKey::Ec(key.clone()),
                None => CertPublicKey::Other,
            };
            let handle = session
                .private_key(self.slot, &cert_public_key, &auth)
                .map_err(|e| SlotError::KeyUnavailable {
                    slot: self.key.to_string(),
                    reason: e.to_string(),
                })?;
            match handle {
                KeyHandle::Ecdsa(_) => {}
                KeyHandle::Unsupported => return Err(SlotError::NotEcdsa.into()),
            }

            debug!(slot = self.key, "deriving shared key");
            session
                .shared_key(self.slot, &auth, &peer)
                .map_err(classify_driver_error)
        })
    }

    /// Generates an asymmetric key in the slot.
    ///
    /// Fails with `slot has already a key` when a key exists and
    /// `overwrite` was not requested; no card contact happens in that case.
    /// The snapshot is not updated: resolve again to observe the new state.
    pub fn generate_key(&self, opts: GenerateKeyOpts) -> PivkitResult<()> {
        if self.has_key && !opts.overwrite {
            return Err(SlotError::AlreadyHasKey.into());
        }

        let mgmt_key = opts
            .management_key
            .unwrap_or_else(|| self.card.management_key());

        self.card.with_session(|_, session| {
            session
                .generate_key(
                    &mgmt_key,
                    self.slot,
                    KeySpec {
                        algorithm: opts.algorithm,
                        pin_policy: opts.pin_policy,
                        touch_policy: opts.touch_policy,
                    },
                )
                .map_err(classify_driver_error)
        })?;

        info!(
            slot = self.key,
            algorithm = %opts.algorithm,
            "generated key"
        );
        Ok(())
    }

    fn key_auth(&self) -> KeyAuth {
        let mut auth = self.card.key_auth();
        auth.pin_policy = Some(self.pin_policy);
        auth
    }
}

/// Options for generating a key.
#[derive(Debug, Clone, Default)]
pub struct GenerateKeyOpts {
    /// Allow replacing an existing key
    pub overwrite: bool,
    pub algorithm: Algorithm,
    pub pin_policy: PinPolicy,
    pub touch_policy: TouchPolicy,
    /// Management key override; the card's stored key is used when absent
    pub management_key: Option<ManagementKey>,
}

/// Resolves the given slot keys against an open session.
///
/// Unknown slot keys are silently skipped, duplicates resolve once, and the
/// result is sorted ascending by slot key. Slot-not-found and non-EC key
/// types yield absent or partial records; everything else aborts the whole
/// resolution.
pub(crate) fn resolve_slots<D: CardDriver, S: AsRef<str>>(
    card: &Card<D>,
    driver: &D,
    session: &mut D::Session,
    keys: &[S],
) -> PivkitResult<Vec<Slot<D>>> {
    let mut slots: Vec<Slot<D>> = Vec::new();
    for key in keys {
        let Some((key, slot_ref)) = SlotRef::lookup(key.as_ref()) else {
            continue;
        };
        if slots.iter().any(|s| s.key == key) {
            continue;
        }

        let mut slot = Slot::new(key, card.clone(), slot_ref);

        // Attestation proves a generated key; fall back to the plain
        // certificate object, which covers imported keys/certificates.
        let cert = match session.attest(slot_ref) {
            Ok(cert) => {
                slot.is_generated = true;
                Some(cert)
            }
            Err(DriverError::NotFound) => match session.certificate(slot_ref) {
                Ok(cert) => {
                    slot.is_imported = true;
                    Some(cert)
                }
                Err(DriverError::NotFound) => None,
                Err(e) => {
                    return Err(SlotError::AccessFailed {
                        slot: key.to_string(),
                        reason: e.to_string(),
                    }
                    .into())
                }
            },
            Err(e) => {
                return Err(SlotError::AccessFailed {
                    slot: key.to_string(),
                    reason: e.to_string(),
                }
                .into())
            }
        };

        let Some(cert) = cert else {
            slots.push(slot);
            continue;
        };
        let Some(cert_public_key) = cert.public_key.clone() else {
            return Err(SlotError::MissingPublicKey {
                slot: key.to_string(),
            }
            .into());
        };
        slot.has_key = true;

        // A slot certificate that does not verify against the device
        // attestation certificate cannot be trusted.
        let attestation_cert =
            session
                .attestation_certificate()
                .map_err(|e| SlotError::AttestationCertificate {
                    slot: key.to_string(),
                    reason: e.to_string(),
                })?;
        let attestation = driver
            .verify_attestation(&attestation_cert, &cert)
            .map_err(|e| SlotError::AttestationFailed {
                slot: key.to_string(),
                reason: e.to_string(),
            })?;
        slot.pin_policy = PinPolicy::from_yubikey_pin_policy(attestation.pin_policy);
        slot.touch_policy = TouchPolicy::from_yubikey_touch_policy(attestation.touch_policy);

        let auth = slot.key_auth();
        let handle = session
            .private_key(slot_ref, &cert_public_key, &auth)
            .map_err(|e| SlotError::KeyUnavailable {
                slot: key.to_string(),
                reason: e.to_string(),
            })?;
        match handle {
            KeyHandle::Ecdsa(public_key) => {
                slot.public_key = public_key.to_compressed();
                slot.public_key_algorithm = public_key.algorithm();
                slot.ec_public_key = Some(public_key);
            }
            // Only EC keys are classified further; the slot keeps a
            // partial record without a public key.
            KeyHandle::Unsupported => {
                debug!(slot = key, "slot key is not an ECDSA key");
            }
        }

        slots.push(slot);
    }
    slots.sort_by(|a, b| a.key.cmp(b.key));

    Ok(slots)
}
