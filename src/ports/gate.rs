use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::error::{CardError, PivkitResult};
use crate::ports::CardDriver;

/// Serializes session access to the card transport.
///
/// The transport is a singular resource: only one session may be open at a
/// time across the whole process. Every session-opening operation runs
/// through [`SessionGate::with_session`], which holds the lock for exactly
/// the session lifetime and closes the session on every exit path.
///
/// The gate is owned by whichever component constructs the driver adapter
/// and injected (via `Arc`) into every card needing session access.
pub struct SessionGate<D: CardDriver> {
    driver: D,
    lock: Mutex<()>,
}

impl<D: CardDriver> SessionGate<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            lock: Mutex::new(()),
        }
    }

    /// The wrapped driver, for session-free calls (enumeration, chain
    /// verification).
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Opens a session to the named card and runs `f` with it, serialized
    /// against every other session in the process.
    ///
    /// The session is dropped (closed) before the lock is released,
    /// including on error paths. A poisoned lock is recovered: it guards a
    /// transport handle, not invariant-bearing data.
    pub fn with_session<T>(
        &self,
        name: &str,
        f: impl FnOnce(&D, &mut D::Session) -> PivkitResult<T>,
    ) -> PivkitResult<T> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(card = name, "opening card session");
        let mut session = self.driver.open(name).map_err(|e| CardError::ConnectionFailed {
            card: name.to_string(),
            reason: e.to_string(),
        })?;
        // Drop order: `session` closes before `_guard` releases the lock.
        f(&self.driver, &mut session)
    }
}
