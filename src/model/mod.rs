mod algorithm;
mod mgmt_key;
mod policy;
mod public_key;
mod slot_id;

pub use algorithm::Algorithm;
pub use mgmt_key::{ManagementKey, ManagementKeyError};
pub use policy::{PinPolicy, TouchPolicy};
pub use public_key::{EcPublicKey, PublicKeyError, COMPRESSED_P256_LEN, COMPRESSED_P384_LEN};
pub use slot_id::SlotRef;
