//! Card facade
//!
//! A [`Card`] holds the identity and credential state for one token and
//! mediates every session-scoped call. It owns no long-lived session: each
//! operation opens a session through the shared [`SessionGate`] and closes
//! it before returning.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::{PivkitError, PivkitResult};
use crate::model::{ManagementKey, SlotRef};
use crate::ports::{CardDriver, CardSession, FirmwareVersion, KeyAuth, SessionGate};
use crate::slot::{self, Slot};
use crate::{DEFAULT_PIN, DEFAULT_PUK};

/// Mutable credential state, shared with the slots resolved from this card
/// so in-flight operations observe later `set_pin` calls.
struct Credentials {
    pin: String,
    puk: String,
    mgmt_key: ManagementKey,
}

pub(crate) struct CardInner<D: CardDriver> {
    name: String,
    serial: String,
    version: FirmwareVersion,
    gate: Arc<SessionGate<D>>,
    creds: Mutex<Credentials>,
}

/// A PIV smart card.
///
/// Cheap to clone; clones share credential state. Created by discovery
/// after a successful session probe and firmware gate check.
pub struct Card<D: CardDriver> {
    inner: Arc<CardInner<D>>,
}

impl<D: CardDriver> Clone for Card<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: CardDriver> fmt::Debug for Card<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Card")
            .field("name", &self.inner.name)
            .field("serial", &self.inner.serial)
            .field("version", &self.inner.version)
            .finish_non_exhaustive()
    }
}

impl<D: CardDriver> Card<D> {
    pub(crate) fn new(
        gate: Arc<SessionGate<D>>,
        name: String,
        serial: String,
        version: FirmwareVersion,
    ) -> Self {
        Self {
            inner: Arc::new(CardInner {
                name,
                serial,
                version,
                gate,
                creds: Mutex::new(Credentials {
                    pin: DEFAULT_PIN.to_string(),
                    puk: DEFAULT_PUK.to_string(),
                    mgmt_key: ManagementKey::DEFAULT,
                }),
            }),
        }
    }

    /// Transport-level card name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Card serial number.
    pub fn serial(&self) -> &str {
        &self.inner.serial
    }

    /// Card firmware version.
    pub fn version(&self) -> FirmwareVersion {
        self.inner.version
    }

    /// Sets the PIN used by subsequent operations. Not validated here.
    pub fn set_pin(&self, pin: impl Into<String>) {
        self.creds().pin = pin.into();
    }

    /// Sets the PUK used by subsequent operations. Not validated here.
    pub fn set_puk(&self, puk: impl Into<String>) {
        self.creds().puk = puk.into();
    }

    /// Sets the management key used by subsequent operations.
    pub fn set_management_key(&self, key: ManagementKey) {
        self.creds().mgmt_key = key;
    }

    /// The well-known slot keys.
    pub fn slot_keys(&self) -> Vec<&'static str> {
        SlotRef::well_known_keys()
    }

    /// Resolves every well-known slot.
    pub fn slots(&self) -> PivkitResult<Vec<Slot<D>>> {
        self.slots_by_key(&self.slot_keys())
    }

    /// Resolves the slots for the given slot keys. Unknown keys are
    /// silently skipped; the result is unique and sorted by slot key.
    pub fn slots_by_key<S: AsRef<str>>(&self, keys: &[S]) -> PivkitResult<Vec<Slot<D>>> {
        debug!(card = self.name(), count = keys.len(), "resolving slots");
        self.with_session(|driver, session| slot::resolve_slots(self, driver, session, keys))
    }

    /// Verifies the card PIN. The driver's result is propagated unchanged.
    pub fn verify_pin(&self, pin: &str) -> PivkitResult<()> {
        self.with_session(|_, session| session.verify_pin(pin).map_err(PivkitError::Driver))
    }

    /// Unblocks the PIN with the given PUK, setting it to a new value. The
    /// driver's result is propagated unchanged.
    pub fn unblock(&self, puk: &str, new_pin: &str) -> PivkitResult<()> {
        self.with_session(|_, session| {
            session.unblock(puk, new_pin).map_err(PivkitError::Driver)
        })
    }

    /// Unblocks the PIN using the stored PUK.
    pub fn unblock_with_stored_puk(&self, new_pin: &str) -> PivkitResult<()> {
        let puk = self.creds().puk.clone();
        self.unblock(&puk, new_pin)
    }

    /// Credential source for private-key operations, reading the PIN
    /// stored at call time. An empty PIN counts as absent.
    pub(crate) fn key_auth(&self) -> KeyAuth {
        let pin = self.creds().pin.clone();
        KeyAuth {
            pin: (!pin.is_empty()).then_some(pin),
            pin_policy: None,
        }
    }

    pub(crate) fn management_key(&self) -> ManagementKey {
        self.creds().mgmt_key.clone()
    }

    pub(crate) fn with_session<T>(
        &self,
        f: impl FnOnce(&D, &mut D::Session) -> PivkitResult<T>,
    ) -> PivkitResult<T> {
        self.inner.gate.with_session(&self.inner.name, f)
    }

    fn creds(&self) -> std::sync::MutexGuard<'_, Credentials> {
        self.inner
            .creds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
