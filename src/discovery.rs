//! Card discovery and serial/slot lookup

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::card::Card;
use crate::error::{CardError, LookupError, PivkitError, PivkitResult};
use crate::ports::{CardDriver, CardSession, SessionGate};
use crate::slot::Slot;

/// Enumerates the connected cards.
///
/// Each card is probed once for serial and firmware version; any card below
/// the attestation-capable firmware (4.3.0) fails the whole enumeration.
pub fn cards<D: CardDriver>(gate: &Arc<SessionGate<D>>) -> PivkitResult<Vec<Card<D>>> {
    let names = gate
        .driver()
        .token_names()
        .map_err(|e| CardError::ListFailed {
            reason: e.to_string(),
        })?;

    let mut cards = Vec::with_capacity(names.len());
    for name in names {
        let (serial, version) =
            gate.with_session(&name, |_, session| Ok((session.serial(), session.version())))?;
        let serial = serial.to_string();

        if !version.supports_attestation() {
            return Err(CardError::UnsupportedVersion {
                serial,
                version: version.to_string(),
            }
            .into());
        }

        debug!(card = %name, serial = %serial, version = %version, "discovered card");
        cards.push(Card::new(Arc::clone(gate), name, serial, version));
    }

    Ok(cards)
}

/// Resolves slots across cards by serial, as a `serial → slot key → Slot`
/// mapping.
///
/// PINs are assigned to serials by position; missing positions leave the
/// card's stored PIN in place. Serials and slot keys without a match are
/// not errors, they simply produce no entry.
pub fn card_slots<D, S1, S2, S3>(
    gate: &Arc<SessionGate<D>>,
    serials: &[S1],
    slots: &[S2],
    pins: &[S3],
) -> PivkitResult<HashMap<String, HashMap<String, Slot<D>>>>
where
    D: CardDriver,
    S1: AsRef<str>,
    S2: AsRef<str>,
    S3: AsRef<str>,
{
    let cards = cards(gate)?;

    let mut result: HashMap<String, HashMap<String, Slot<D>>> = HashMap::new();
    for (i, serial) in serials.iter().enumerate() {
        let serial = serial.as_ref();
        for card in &cards {
            if card.serial() != serial {
                continue;
            }
            if let Some(pin) = pins.get(i) {
                card.set_pin(pin.as_ref());
            }
            let entry = result.entry(serial.to_string()).or_default();
            for slot in card.slots_by_key(slots)? {
                entry.insert(slot.key().to_string(), slot);
            }
        }
    }

    Ok(result)
}

/// Resolves a single slot by serial and slot key.
///
/// Unlike [`card_slots`], absence is an error here, distinguishing an
/// unknown serial from an unknown slot under a known serial.
pub fn card_slot<D: CardDriver>(
    gate: &Arc<SessionGate<D>>,
    serial: &str,
    slot: &str,
    pin: &str,
) -> PivkitResult<Slot<D>> {
    if serial.is_empty() || slot.is_empty() {
        return Err(LookupError::MissingSerialOrSlot.into());
    }

    let mut result = card_slots(gate, &[serial], &[slot], &[pin])?;
    let Some(mut by_key) = result.remove(serial) else {
        return Err(LookupError::SerialNotFound {
            serial: serial.to_string(),
        }
        .into());
    };
    by_key.remove(slot).ok_or_else(|| {
        PivkitError::from(LookupError::SlotNotFound {
            serial: serial.to_string(),
            slot: slot.to_string(),
        })
    })
}
