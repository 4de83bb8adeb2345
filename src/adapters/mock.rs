//! Mock card driver for testing the core against the ports
//!
//! The mock keeps real P-256/P-384 key material so shared-key tests assert
//! actual curve math, emits the same status words a card would, and
//! instruments session opens so tests can assert the single-session
//! property.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::model::{EcPublicKey, ManagementKey, SlotRef};
use crate::ports::{
    Attestation, CardDriver, CardSession, CertPublicKey, DriverError, FirmwareVersion, KeyAuth,
    KeyHandle, KeySpec, SlotCertificate,
};

/// Stand-in DER for the device attestation certificate.
const ATTESTATION_CERT_DER: [u8; 4] = [0xf9, 0x00, 0x00, 0x00];

/// Private key material held by a mock slot.
#[derive(Clone)]
pub enum MockKeyMaterial {
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    Rsa,
}

impl MockKeyMaterial {
    pub fn random_p256() -> Self {
        MockKeyMaterial::P256(p256::SecretKey::random(&mut rand_core::OsRng))
    }

    pub fn random_p384() -> Self {
        MockKeyMaterial::P384(p384::SecretKey::random(&mut rand_core::OsRng))
    }

    pub fn public_key(&self) -> Option<EcPublicKey> {
        match self {
            MockKeyMaterial::P256(secret) => Some(EcPublicKey::P256(secret.public_key())),
            MockKeyMaterial::P384(secret) => Some(EcPublicKey::P384(secret.public_key())),
            MockKeyMaterial::Rsa => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum KeyOrigin {
    Generated,
    Imported,
}

/// One occupied slot on a mock card.
#[derive(Clone)]
pub struct MockSlotState {
    material: MockKeyMaterial,
    origin: KeyOrigin,
    pin_policy: yubikey::PinPolicy,
    touch_policy: yubikey::TouchPolicy,
    cert_missing_public_key: bool,
    broken_attestation: bool,
    fail_with: Option<u16>,
}

impl MockSlotState {
    pub fn generated(material: MockKeyMaterial) -> Self {
        Self {
            material,
            origin: KeyOrigin::Generated,
            pin_policy: yubikey::PinPolicy::Once,
            touch_policy: yubikey::TouchPolicy::Never,
            cert_missing_public_key: false,
            broken_attestation: false,
            fail_with: None,
        }
    }

    pub fn imported(material: MockKeyMaterial) -> Self {
        Self {
            origin: KeyOrigin::Imported,
            ..Self::generated(material)
        }
    }

    pub fn pin_policy(mut self, policy: yubikey::PinPolicy) -> Self {
        self.pin_policy = policy;
        self
    }

    pub fn touch_policy(mut self, policy: yubikey::TouchPolicy) -> Self {
        self.touch_policy = policy;
        self
    }

    /// The slot certificate will carry no parsable public key.
    pub fn without_certificate_key(mut self) -> Self {
        self.cert_missing_public_key = true;
        self
    }

    /// Chain verification against this slot's certificate will fail.
    pub fn broken_attestation(mut self) -> Self {
        self.broken_attestation = true;
        self
    }

    /// Key agreement on this slot fails with the given status word.
    pub fn fail_with_status(mut self, sw: u16) -> Self {
        self.fail_with = Some(sw);
        self
    }
}

/// Scriptable state of one mock card.
#[derive(Clone)]
pub struct MockCardState {
    name: String,
    serial: u32,
    version: FirmwareVersion,
    pin: String,
    puk: String,
    mgmt_key: ManagementKey,
    slots: HashMap<u8, MockSlotState>,
}

impl MockCardState {
    pub fn new(name: &str, serial: u32) -> Self {
        Self {
            name: name.to_string(),
            serial,
            version: FirmwareVersion::new(5, 4, 3),
            pin: crate::DEFAULT_PIN.to_string(),
            puk: crate::DEFAULT_PUK.to_string(),
            mgmt_key: ManagementKey::DEFAULT,
            slots: HashMap::new(),
        }
    }

    pub fn with_version(mut self, major: u8, minor: u8, patch: u8) -> Self {
        self.version = FirmwareVersion::new(major, minor, patch);
        self
    }

    pub fn with_pin(mut self, pin: &str) -> Self {
        self.pin = pin.to_string();
        self
    }

    pub fn with_slot(mut self, key: &str, slot: MockSlotState) -> Self {
        let (_, slot_ref) = SlotRef::lookup(key).expect("well-known slot key");
        self.slots.insert(slot_ref.key, slot);
        self
    }
}

struct SharedState {
    cards: Mutex<Vec<MockCardState>>,
    open_sessions: AtomicUsize,
    max_open_sessions: AtomicUsize,
    ecdh_calls: AtomicUsize,
    generate_calls: AtomicUsize,
}

/// In-memory card driver.
#[derive(Clone)]
pub struct MockDriver {
    state: Arc<SharedState>,
}

impl MockDriver {
    pub fn with_card(card: MockCardState) -> Self {
        Self::with_cards(vec![card])
    }

    pub fn with_cards(cards: Vec<MockCardState>) -> Self {
        Self {
            state: Arc::new(SharedState {
                cards: Mutex::new(cards),
                open_sessions: AtomicUsize::new(0),
                max_open_sessions: AtomicUsize::new(0),
                ecdh_calls: AtomicUsize::new(0),
                generate_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// High-water mark of simultaneously open sessions.
    pub fn max_open_sessions(&self) -> usize {
        self.state.max_open_sessions.load(Ordering::SeqCst)
    }

    /// Number of key-agreement operations that reached the driver.
    pub fn ecdh_calls(&self) -> usize {
        self.state.ecdh_calls.load(Ordering::SeqCst)
    }

    /// Number of generate operations that reached the driver.
    pub fn generate_calls(&self) -> usize {
        self.state.generate_calls.load(Ordering::SeqCst)
    }
}

impl CardDriver for MockDriver {
    type Session = MockSession;

    fn token_names(&self) -> Result<Vec<String>, DriverError> {
        let cards = self.state.cards.lock().unwrap();
        Ok(cards.iter().map(|c| c.name.clone()).collect())
    }

    fn open(&self, name: &str) -> Result<MockSession, DriverError> {
        let (index, serial, version) = {
            let cards = self.state.cards.lock().unwrap();
            let index = cards
                .iter()
                .position(|c| c.name == name)
                .ok_or_else(|| DriverError::Transport(format!("no card named {name}")))?;
            (index, cards[index].serial, cards[index].version)
        };

        let open = self.state.open_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        self.state
            .max_open_sessions
            .fetch_max(open, Ordering::SeqCst);

        Ok(MockSession {
            state: Arc::clone(&self.state),
            index,
            serial,
            version,
        })
    }

    fn verify_attestation(
        &self,
        intermediate: &SlotCertificate,
        leaf: &SlotCertificate,
    ) -> Result<Attestation, DriverError> {
        if intermediate.der != ATTESTATION_CERT_DER {
            return Err(DriverError::Transport(
                "unknown attestation certificate".to_string(),
            ));
        }
        if leaf.der.len() != 4 {
            return Err(DriverError::Transport("malformed certificate".to_string()));
        }
        if leaf.der[3] != 1 {
            return Err(DriverError::Transport(
                "certificate signature mismatch".to_string(),
            ));
        }
        Ok(Attestation {
            pin_policy: pin_policy_from_byte(leaf.der[1]),
            touch_policy: touch_policy_from_byte(leaf.der[2]),
        })
    }
}

pub struct MockSession {
    state: Arc<SharedState>,
    index: usize,
    serial: u32,
    version: FirmwareVersion,
}

impl MockSession {
    fn with_card<T>(&self, f: impl FnOnce(&mut MockCardState) -> T) -> T {
        let mut cards = self.state.cards.lock().unwrap();
        f(&mut cards[self.index])
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.state.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CardSession for MockSession {
    fn serial(&self) -> u32 {
        self.serial
    }

    fn version(&self) -> FirmwareVersion {
        self.version
    }

    fn attest(&mut self, slot: SlotRef) -> Result<SlotCertificate, DriverError> {
        self.with_card(|card| match card.slots.get(&slot.key) {
            Some(state) if state.origin == KeyOrigin::Generated => {
                Ok(certificate_for(slot.key, state))
            }
            _ => Err(DriverError::NotFound),
        })
    }

    fn certificate(&mut self, slot: SlotRef) -> Result<SlotCertificate, DriverError> {
        self.with_card(|card| match card.slots.get(&slot.key) {
            Some(state) if state.origin == KeyOrigin::Imported => {
                Ok(certificate_for(slot.key, state))
            }
            _ => Err(DriverError::NotFound),
        })
    }

    fn attestation_certificate(&mut self) -> Result<SlotCertificate, DriverError> {
        Ok(SlotCertificate {
            der: ATTESTATION_CERT_DER.to_vec(),
            public_key: Some(CertPublicKey::Other),
        })
    }

    fn private_key(
        &mut self,
        slot: SlotRef,
        _public_key: &CertPublicKey,
        _auth: &KeyAuth,
    ) -> Result<KeyHandle, DriverError> {
        self.with_card(|card| {
            let state = card.slots.get(&slot.key).ok_or(DriverError::NotFound)?;
            Ok(match state.material.public_key() {
                Some(public_key) => KeyHandle::Ecdsa(public_key),
                None => KeyHandle::Unsupported,
            })
        })
    }

    fn shared_key(
        &mut self,
        slot: SlotRef,
        auth: &KeyAuth,
        peer: &EcPublicKey,
    ) -> Result<Vec<u8>, DriverError> {
        self.state.ecdh_calls.fetch_add(1, Ordering::SeqCst);
        self.with_card(|card| {
            let state = card.slots.get(&slot.key).ok_or(DriverError::NotFound)?;

            if let Some(sw) = state.fail_with {
                return Err(DriverError::Status {
                    sw,
                    message: format!("smart card error {sw:04x}"),
                });
            }

            if !matches!(state.pin_policy, yubikey::PinPolicy::Never) {
                match &auth.pin {
                    None => return Err(DriverError::PinRequired),
                    Some(pin) if *pin != card.pin => {
                        return Err(DriverError::Status {
                            sw: 0x63c2,
                            message: "verification failed (2 retries remaining)".to_string(),
                        })
                    }
                    Some(_) => {}
                }
            }

            match (&state.material, peer) {
                (MockKeyMaterial::P256(secret), EcPublicKey::P256(peer)) => {
                    let shared =
                        p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
                    Ok(shared.raw_secret_bytes().to_vec())
                }
                (MockKeyMaterial::P384(secret), EcPublicKey::P384(peer)) => {
                    let shared =
                        p384::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
                    Ok(shared.raw_secret_bytes().to_vec())
                }
                (MockKeyMaterial::Rsa, _) => {
                    Err(DriverError::Transport("not an EC key".to_string()))
                }
                _ => Err(DriverError::Transport("curve mismatch".to_string())),
            }
        })
    }

    fn generate_key(
        &mut self,
        mgmt_key: &ManagementKey,
        slot: SlotRef,
        spec: KeySpec,
    ) -> Result<(), DriverError> {
        self.state.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.with_card(|card| {
            if *mgmt_key != card.mgmt_key {
                return Err(DriverError::Status {
                    sw: 0x6982,
                    message: "security status not satisfied".to_string(),
                });
            }

            let material = match spec.algorithm {
                crate::model::Algorithm::Ec256 => MockKeyMaterial::random_p256(),
                crate::model::Algorithm::Ec384 => MockKeyMaterial::random_p384(),
                crate::model::Algorithm::Rsa1024 | crate::model::Algorithm::Rsa2048 => {
                    MockKeyMaterial::Rsa
                }
                other => return Err(DriverError::UnsupportedAlgorithm(other)),
            };

            card.slots.insert(
                slot.key,
                MockSlotState::generated(material)
                    .pin_policy(spec.pin_policy.to_yubikey_pin_policy())
                    .touch_policy(spec.touch_policy.to_yubikey_touch_policy()),
            );
            Ok(())
        })
    }

    fn verify_pin(&mut self, pin: &str) -> Result<(), DriverError> {
        self.with_card(|card| {
            if pin == card.pin {
                Ok(())
            } else {
                Err(DriverError::Status {
                    sw: 0x63c2,
                    message: "verification failed (2 retries remaining)".to_string(),
                })
            }
        })
    }

    fn unblock(&mut self, puk: &str, new_pin: &str) -> Result<(), DriverError> {
        self.with_card(|card| {
            if puk == card.puk {
                card.pin = new_pin.to_string();
                Ok(())
            } else {
                Err(DriverError::Status {
                    sw: 0x63c2,
                    message: "verification failed (2 retries remaining)".to_string(),
                })
            }
        })
    }
}

fn certificate_for(key: u8, state: &MockSlotState) -> SlotCertificate {
    let der = vec![
        key,
        pin_policy_byte(state.pin_policy),
        touch_policy_byte(state.touch_policy),
        u8::from(!state.broken_attestation),
    ];
    let public_key = if state.cert_missing_public_key {
        None
    } else {
        Some(match state.material.public_key() {
            Some(public_key) => CertPublicKey::Ec(public_key),
            None => CertPublicKey::Other,
        })
    };
    SlotCertificate { der, public_key }
}

fn pin_policy_byte(policy: yubikey::PinPolicy) -> u8 {
    match policy {
        yubikey::PinPolicy::Never => 1,
        yubikey::PinPolicy::Once => 2,
        yubikey::PinPolicy::Always => 3,
        _ => 0,
    }
}

fn pin_policy_from_byte(byte: u8) -> yubikey::PinPolicy {
    match byte {
        1 => yubikey::PinPolicy::Never,
        2 => yubikey::PinPolicy::Once,
        3 => yubikey::PinPolicy::Always,
        _ => yubikey::PinPolicy::Default,
    }
}

fn touch_policy_byte(policy: yubikey::TouchPolicy) -> u8 {
    match policy {
        yubikey::TouchPolicy::Never => 1,
        yubikey::TouchPolicy::Always => 2,
        yubikey::TouchPolicy::Cached => 3,
        _ => 0,
    }
}

fn touch_policy_from_byte(byte: u8) -> yubikey::TouchPolicy {
    match byte {
        1 => yubikey::TouchPolicy::Never,
        2 => yubikey::TouchPolicy::Always,
        3 => yubikey::TouchPolicy::Cached,
        _ => yubikey::TouchPolicy::Default,
    }
}
