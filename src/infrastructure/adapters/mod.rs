//! Platform adapters - concrete messaging transports

pub mod console;
pub mod telegram;
