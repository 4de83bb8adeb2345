//! Well-known PIV slot locations
//!
//! Each slot is addressed by a two-character key (`"9a"`, `"82"`, ...) and
//! maps to a protocol-level descriptor: the key reference byte and, for the
//! retired range, the associated certificate object id.
//!
//! Ref:
//!     https://developers.yubico.com/PIV/Introduction/Certificate_slots.html
//!     https://nvlpubs.nist.gov/nistpubs/SpecialPublications/NIST.SP.800-73-4.pdf

use yubikey::piv::{RetiredSlotId, SlotId};

/// Protocol-level slot descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef {
    /// Key reference byte
    pub key: u8,
    /// Certificate data object id
    pub object: u32,
}

/// Well-known slot keys and their descriptors, ascending by key.
///
/// `9b` (management) and `f9` (attestation) are deliberately absent: neither
/// holds a user key.
const SLOT_TABLE: &[(&str, SlotRef)] = &[
    ("82", SlotRef { key: 0x82, object: 0x5fc10d }),
    ("83", SlotRef { key: 0x83, object: 0x5fc10e }),
    ("84", SlotRef { key: 0x84, object: 0x5fc10f }),
    ("85", SlotRef { key: 0x85, object: 0x5fc110 }),
    ("86", SlotRef { key: 0x86, object: 0x5fc111 }),
    ("87", SlotRef { key: 0x87, object: 0x5fc112 }),
    ("88", SlotRef { key: 0x88, object: 0x5fc113 }),
    ("89", SlotRef { key: 0x89, object: 0x5fc114 }),
    ("8a", SlotRef { key: 0x8a, object: 0x5fc115 }),
    ("8b", SlotRef { key: 0x8b, object: 0x5fc116 }),
    ("8c", SlotRef { key: 0x8c, object: 0x5fc117 }),
    ("8d", SlotRef { key: 0x8d, object: 0x5fc118 }),
    ("8e", SlotRef { key: 0x8e, object: 0x5fc119 }),
    ("8f", SlotRef { key: 0x8f, object: 0x5fc11a }),
    ("90", SlotRef { key: 0x90, object: 0x5fc11b }),
    ("91", SlotRef { key: 0x91, object: 0x5fc11c }),
    ("92", SlotRef { key: 0x92, object: 0x5fc11d }),
    ("93", SlotRef { key: 0x93, object: 0x5fc11e }),
    ("94", SlotRef { key: 0x94, object: 0x5fc11f }),
    ("95", SlotRef { key: 0x95, object: 0x5fc120 }),
    ("9a", SlotRef { key: 0x9a, object: 0x5fc105 }),
    ("9c", SlotRef { key: 0x9c, object: 0x5fc10a }),
    ("9d", SlotRef { key: 0x9d, object: 0x5fc10b }),
    ("9e", SlotRef { key: 0x9e, object: 0x5fc101 }),
];

impl SlotRef {
    /// Looks up a well-known slot by its string key. Unknown keys yield
    /// `None`; callers treat that as "skip", not as an error.
    pub fn lookup(key: &str) -> Option<(&'static str, SlotRef)> {
        SLOT_TABLE
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(k, slot)| (*k, *slot))
    }

    /// All well-known slot keys, ascending.
    pub fn well_known_keys() -> Vec<&'static str> {
        SLOT_TABLE.iter().map(|(k, _)| *k).collect()
    }

    /// Converts to the driver's slot type. `None` for a key reference
    /// outside the well-known set (unreachable for table-built values).
    pub fn to_yubikey_slot_id(self) -> Option<SlotId> {
        match self.key {
            0x9a => Some(SlotId::Authentication),
            0x9c => Some(SlotId::Signature),
            0x9d => Some(SlotId::KeyManagement),
            0x9e => Some(SlotId::CardAuthentication),
            key => RetiredSlotId::try_from(key).ok().map(SlotId::Retired),
        }
    }
}
