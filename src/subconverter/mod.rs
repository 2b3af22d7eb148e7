//! subconverter integration: liveness probing and format conversion.

pub mod client;

pub use client::{SubconverterClient, Target};
