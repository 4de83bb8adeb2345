//! PC/SC card driver adapter over the `yubikey` crate
//!
//! Implements the driver ports against real hardware: reader enumeration,
//! PIV attest/certificate reads, attestation chain verification, key
//! agreement and key generation. Model types convert to the crate's types
//! at this boundary, and `yubikey::Error` values map onto the structured
//! [`DriverError`].

use der::{oid::ObjectIdentifier, Decode, Encode};
use rsa::pkcs1::DecodeRsaPublicKey;
use signature::Verifier;
use tracing::debug;
use x509_cert::Certificate as X509Certificate;
use yubikey::certificate::Certificate;
use yubikey::piv::{self, AlgorithmId, SlotId};
use yubikey::reader::Context;
use yubikey::{MgmKey, YubiKey};

use crate::model::{Algorithm, EcPublicKey, ManagementKey, PinPolicy, SlotRef};
use crate::ports::{
    Attestation, CardDriver, CardSession, CertPublicKey, DriverError, FirmwareVersion, KeyAuth,
    KeyHandle, KeySpec, SlotCertificate,
};

const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");

/// Yubico PIV attestation extension carrying the PIN and touch policy.
/// Ref: https://developers.yubico.com/PIV/Introduction/PIV_attestation.html
const YUBICO_POLICY_EXTENSION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.41482.3.8");

/// Card driver backed by the PC/SC stack.
#[derive(Debug, Clone, Default)]
pub struct PcscDriver;

impl PcscDriver {
    pub fn new() -> Self {
        Self
    }
}

impl CardDriver for PcscDriver {
    type Session = PcscSession;

    fn token_names(&self) -> Result<Vec<String>, DriverError> {
        let mut context = Context::open().map_err(transport)?;
        let readers = context.iter().map_err(transport)?;
        Ok(readers.map(|reader| reader.name().to_string()).collect())
    }

    fn open(&self, name: &str) -> Result<PcscSession, DriverError> {
        let mut context = Context::open().map_err(transport)?;
        for reader in context.iter().map_err(transport)? {
            if reader.name() != name {
                continue;
            }
            let yubikey = reader.open().map_err(driver_error)?;
            let serial = yubikey.serial().0;
            let version = yubikey.version();
            debug!(card = name, "connected");
            return Ok(PcscSession {
                yubikey,
                serial,
                version: FirmwareVersion::new(version.major, version.minor, version.patch),
            });
        }
        Err(DriverError::Transport(format!(
            "no smart card reader named {name}"
        )))
    }

    fn verify_attestation(
        &self,
        intermediate: &SlotCertificate,
        leaf: &SlotCertificate,
    ) -> Result<Attestation, DriverError> {
        verify_attestation(intermediate, leaf)
    }
}

/// One open PC/SC session. Dropping it closes the underlying connection.
pub struct PcscSession {
    yubikey: YubiKey,
    serial: u32,
    version: FirmwareVersion,
}

impl CardSession for PcscSession {
    fn serial(&self) -> u32 {
        self.serial
    }

    fn version(&self) -> FirmwareVersion {
        self.version
    }

    fn attest(&mut self, slot: SlotRef) -> Result<SlotCertificate, DriverError> {
        let der = piv::attest(&mut self.yubikey, slot_id(slot)?).map_err(driver_error)?;
        parse_certificate(&der)
    }

    fn certificate(&mut self, slot: SlotRef) -> Result<SlotCertificate, DriverError> {
        let cert = Certificate::read(&mut self.yubikey, slot_id(slot)?).map_err(driver_error)?;
        let der = cert.cert.to_der().map_err(|e| transport_str(e.to_string()))?;
        parse_certificate(&der)
    }

    fn attestation_certificate(&mut self) -> Result<SlotCertificate, DriverError> {
        let cert =
            Certificate::read(&mut self.yubikey, SlotId::Attestation).map_err(driver_error)?;
        let der = cert.cert.to_der().map_err(|e| transport_str(e.to_string()))?;
        parse_certificate(&der)
    }

    fn private_key(
        &mut self,
        _slot: SlotRef,
        public_key: &CertPublicKey,
        _auth: &KeyAuth,
    ) -> Result<KeyHandle, DriverError> {
        // PIV cannot read a public key back from a slot; the handle is
        // classified from the certificate's key, like the card tooling does.
        Ok(match public_key {
            CertPublicKey::Ec(key) => KeyHandle::Ecdsa(key.clone()),
            CertPublicKey::Other => KeyHandle::Unsupported,
        })
    }

    fn shared_key(
        &mut self,
        slot: SlotRef,
        auth: &KeyAuth,
        peer: &EcPublicKey,
    ) -> Result<Vec<u8>, DriverError> {
        // The card enforces the PIN policy; the PIN itself is presented
        // here, ahead of the key operation.
        match auth.pin_policy {
            Some(PinPolicy::Never) => {}
            _ => match &auth.pin {
                Some(pin) => self.verify_pin(pin)?,
                None if matches!(auth.pin_policy, Some(PinPolicy::Once | PinPolicy::Always)) => {
                    return Err(DriverError::PinRequired)
                }
                None => {}
            },
        }

        let algorithm = match peer {
            EcPublicKey::P256(_) => AlgorithmId::EccP256,
            EcPublicKey::P384(_) => AlgorithmId::EccP384,
        };
        let shared = piv::decrypt_data(
            &mut self.yubikey,
            &peer.to_uncompressed(),
            algorithm,
            slot_id(slot)?,
        )
        .map_err(driver_error)?;
        Ok(shared.to_vec())
    }

    fn generate_key(
        &mut self,
        mgmt_key: &ManagementKey,
        slot: SlotRef,
        spec: KeySpec,
    ) -> Result<(), DriverError> {
        let mgm = MgmKey::try_from(mgmt_key).map_err(|e| transport_str(e.to_string()))?;
        self.yubikey.authenticate(mgm).map_err(driver_error)?;

        piv::generate(
            &mut self.yubikey,
            slot_id(slot)?,
            algorithm_id(spec.algorithm)?,
            spec.pin_policy.to_yubikey_pin_policy(),
            spec.touch_policy.to_yubikey_touch_policy(),
        )
        .map_err(driver_error)?;
        Ok(())
    }

    fn verify_pin(&mut self, pin: &str) -> Result<(), DriverError> {
        self.yubikey
            .verify_pin(pin.as_bytes())
            .map_err(driver_error)
    }

    fn unblock(&mut self, puk: &str, new_pin: &str) -> Result<(), DriverError> {
        self.yubikey
            .unblock_pin(puk.as_bytes(), new_pin.as_bytes())
            .map_err(driver_error)
    }
}

/// Maps the crate's error onto the structured driver error. Status-bearing
/// conditions keep their status word so classification never needs the
/// message text.
fn driver_error(err: yubikey::Error) -> DriverError {
    match err {
        yubikey::Error::NotFound => DriverError::NotFound,
        yubikey::Error::WrongPin { tries } => DriverError::Status {
            sw: 0x63c0 | (u16::from(tries) & 0x000f),
            message: format!("verification failed ({tries} retries remaining)"),
        },
        yubikey::Error::AuthenticationError => DriverError::Status {
            sw: 0x6982,
            message: "security status not satisfied".to_string(),
        },
        yubikey::Error::PinLocked => DriverError::Status {
            sw: 0x6983,
            message: "authentication method blocked".to_string(),
        },
        other => DriverError::Transport(other.to_string()),
    }
}

fn transport(err: yubikey::Error) -> DriverError {
    DriverError::Transport(err.to_string())
}

fn transport_str(message: String) -> DriverError {
    DriverError::Transport(message)
}

fn slot_id(slot: SlotRef) -> Result<SlotId, DriverError> {
    slot.to_yubikey_slot_id()
        .ok_or_else(|| transport_str(format!("unknown slot key reference {:02x}", slot.key)))
}

fn algorithm_id(algorithm: Algorithm) -> Result<AlgorithmId, DriverError> {
    match algorithm {
        Algorithm::Ec256 => Ok(AlgorithmId::EccP256),
        Algorithm::Ec384 => Ok(AlgorithmId::EccP384),
        Algorithm::Rsa1024 => Ok(AlgorithmId::Rsa1024),
        Algorithm::Rsa2048 => Ok(AlgorithmId::Rsa2048),
        other => Err(DriverError::UnsupportedAlgorithm(other)),
    }
}

/// Parses certificate DER into the driver's certificate shape, classifying
/// the subject public key by algorithm and curve.
fn parse_certificate(der: &[u8]) -> Result<SlotCertificate, DriverError> {
    let cert = X509Certificate::from_der(der)
        .map_err(|e| transport_str(format!("malformed certificate: {e}")))?;
    let spki = &cert.tbs_certificate.subject_public_key_info;

    let public_key = if spki.algorithm.oid == ID_EC_PUBLIC_KEY {
        let curve = spki
            .algorithm
            .parameters
            .as_ref()
            .and_then(|params| params.decode_as::<ObjectIdentifier>().ok());
        let point = spki.subject_public_key.as_bytes().unwrap_or_default();
        match curve {
            Some(oid) if oid == SECP256R1 => p256::PublicKey::from_sec1_bytes(point)
                .ok()
                .map(|key| CertPublicKey::Ec(EcPublicKey::P256(key))),
            Some(oid) if oid == SECP384R1 => p384::PublicKey::from_sec1_bytes(point)
                .ok()
                .map(|key| CertPublicKey::Ec(EcPublicKey::P384(key))),
            // EC key on an unsupported curve
            _ => Some(CertPublicKey::Other),
        }
    } else {
        Some(CertPublicKey::Other)
    };

    Ok(SlotCertificate {
        der: der.to_vec(),
        public_key,
    })
}

/// Verifies that `leaf` is signed by `intermediate` and extracts the
/// enforced policies from the Yubico attestation extension.
fn verify_attestation(
    intermediate: &SlotCertificate,
    leaf: &SlotCertificate,
) -> Result<Attestation, DriverError> {
    let signer = X509Certificate::from_der(&intermediate.der)
        .map_err(|e| transport_str(format!("malformed attestation certificate: {e}")))?;
    let leaf = X509Certificate::from_der(&leaf.der)
        .map_err(|e| transport_str(format!("malformed slot certificate: {e}")))?;

    let message = leaf
        .tbs_certificate
        .to_der()
        .map_err(|e| transport_str(e.to_string()))?;
    let signature = leaf
        .signature
        .as_bytes()
        .ok_or_else(|| transport_str("malformed certificate signature".to_string()))?;
    let signer_key = signer
        .tbs_certificate
        .subject_public_key_info
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| transport_str("attestation certificate has no public key".to_string()))?;

    let sig_oid = leaf.signature_algorithm.oid;
    if sig_oid == ECDSA_WITH_SHA256 {
        let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(signer_key)
            .map_err(|e| transport_str(format!("bad attestation key: {e}")))?;
        let sig = p256::ecdsa::Signature::from_der(signature)
            .map_err(|e| transport_str(format!("bad signature encoding: {e}")))?;
        key.verify(&message, &sig)
            .map_err(|_| transport_str("certificate signature mismatch".to_string()))?;
    } else if sig_oid == ECDSA_WITH_SHA384 {
        let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(signer_key)
            .map_err(|e| transport_str(format!("bad attestation key: {e}")))?;
        let sig = p384::ecdsa::Signature::from_der(signature)
            .map_err(|e| transport_str(format!("bad signature encoding: {e}")))?;
        key.verify(&message, &sig)
            .map_err(|_| transport_str("certificate signature mismatch".to_string()))?;
    } else if sig_oid == SHA256_WITH_RSA {
        let key = rsa::RsaPublicKey::from_pkcs1_der(signer_key)
            .map_err(|e| transport_str(format!("bad attestation key: {e}")))?;
        let key = rsa::pkcs1v15::VerifyingKey::<sha2::Sha256>::new(key);
        let sig = rsa::pkcs1v15::Signature::try_from(signature)
            .map_err(|e| transport_str(format!("bad signature encoding: {e}")))?;
        key.verify(&message, &sig)
            .map_err(|_| transport_str("certificate signature mismatch".to_string()))?;
    } else {
        return Err(transport_str(format!(
            "unsupported signature algorithm: {sig_oid}"
        )));
    }

    Ok(policies_from_extension(&leaf))
}

fn policies_from_extension(cert: &X509Certificate) -> Attestation {
    let mut attestation = Attestation {
        pin_policy: yubikey::PinPolicy::Default,
        touch_policy: yubikey::TouchPolicy::Default,
    };

    let Some(extensions) = &cert.tbs_certificate.extensions else {
        return attestation;
    };
    for extension in extensions {
        if extension.extn_id != YUBICO_POLICY_EXTENSION {
            continue;
        }
        let value = extension.extn_value.as_bytes();
        if value.len() < 2 {
            continue;
        }
        attestation.pin_policy = match value[0] {
            0x01 => yubikey::PinPolicy::Never,
            0x02 => yubikey::PinPolicy::Once,
            0x03 => yubikey::PinPolicy::Always,
            _ => yubikey::PinPolicy::Default,
        };
        attestation.touch_policy = match value[1] {
            0x01 => yubikey::TouchPolicy::Never,
            0x02 => yubikey::TouchPolicy::Always,
            0x03 => yubikey::TouchPolicy::Cached,
            _ => yubikey::TouchPolicy::Default,
        };
    }

    attestation
}
