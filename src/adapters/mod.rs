//! Adapters - concrete implementations of the driver ports

mod pcsc;

#[cfg(test)]
pub mod mock;

pub use pcsc::PcscDriver;
