//! End-to-end tests against a physical YubiKey.
//!
//! These exercise the real PC/SC driver and are ignored unless built with
//! `--features hardware-tests`. They assume a factory-default card and may
//! mutate slot contents.

use pivkit::{Algorithm, EcPublicKey, PinPolicy, TouchPolicy};

#[test]
#[cfg_attr(not(feature = "hardware-tests"), ignore)]
fn test_cards_report_identity() {
    let cards = pivkit::cards().expect("card enumeration failed");
    for card in &cards {
        assert!(!card.name().is_empty());
        assert!(!card.serial().is_empty());
        assert!(card.version().supports_attestation());
        assert!(!card.slot_keys().is_empty());
    }
}

#[test]
#[cfg_attr(not(feature = "hardware-tests"), ignore)]
fn test_verify_default_pin() {
    for card in pivkit::cards().expect("card enumeration failed") {
        card.verify_pin(pivkit::DEFAULT_PIN)
            .expect("default PIN rejected");
    }
}

#[test]
#[cfg_attr(not(feature = "hardware-tests"), ignore)]
fn test_resolve_slots_and_derive_shared_key() {
    for card in pivkit::cards().expect("card enumeration failed") {
        let slots = card
            .slots_by_key(&["82", "9e"])
            .expect("slot resolution failed");
        assert!(!slots.is_empty());

        for slot in &slots {
            assert!(!(slot.is_generated() && slot.is_imported()));
            if !slot.has_key() {
                assert_eq!(slot.pin_policy(), PinPolicy::Unknown);
                assert_eq!(slot.touch_policy(), TouchPolicy::Unknown);
                assert!(slot.public_key().is_empty());
                continue;
            }
            if slot.public_key_algorithm() != Algorithm::Ec256 {
                continue;
            }
            assert_ne!(slot.pin_policy(), PinPolicy::Unknown);
            assert_ne!(slot.touch_policy(), TouchPolicy::Unknown);

            let peer_secret = p256::SecretKey::random(&mut rand_core::OsRng);
            let peer = EcPublicKey::P256(peer_secret.public_key()).to_compressed();
            let shared = slot.shared_key(&peer).expect("shared key failed");
            assert!(!shared.is_empty());
        }
    }
}

#[test]
#[cfg_attr(not(feature = "hardware-tests"), ignore)]
fn test_card_slots_lookup() {
    for card in pivkit::cards().expect("card enumeration failed") {
        let result = pivkit::card_slots(&[card.serial()], &["82", "9e"], &[] as &[&str])
            .expect("lookup failed");
        let by_key = &result[card.serial()];
        for key in ["82", "9e"] {
            assert_eq!(by_key[key].key(), key);
        }
    }
}
