//! Convenience API bound to the PC/SC driver
//!
//! These functions construct the production composition root: one
//! [`SessionGate`] owning the PC/SC driver, shared by every card so session
//! access stays serialized process-wide. Callers composing their own driver
//! use [`crate::discovery`] directly with their own gate.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::adapters::PcscDriver;
use crate::card::Card;
use crate::discovery;
use crate::error::PivkitResult;
use crate::ports::SessionGate;
use crate::slot::Slot;

fn gate() -> &'static Arc<SessionGate<PcscDriver>> {
    static GATE: OnceLock<Arc<SessionGate<PcscDriver>>> = OnceLock::new();
    GATE.get_or_init(|| Arc::new(SessionGate::new(PcscDriver::new())))
}

/// Returns the connected YubiKey smart cards.
pub fn cards() -> PivkitResult<Vec<Card<PcscDriver>>> {
    discovery::cards(gate())
}

/// Returns card slots by serial, slot keys and per-serial PINs. Absent
/// serials or slots are not errors.
pub fn card_slots<S1, S2, S3>(
    serials: &[S1],
    slots: &[S2],
    pins: &[S3],
) -> PivkitResult<HashMap<String, HashMap<String, Slot<PcscDriver>>>>
where
    S1: AsRef<str>,
    S2: AsRef<str>,
    S3: AsRef<str>,
{
    discovery::card_slots(gate(), serials, slots, pins)
}

/// Returns a single card slot by serial and slot key.
pub fn card_slot(serial: &str, slot: &str, pin: &str) -> PivkitResult<Slot<PcscDriver>> {
    discovery::card_slot(gate(), serial, slot, pin)
}
