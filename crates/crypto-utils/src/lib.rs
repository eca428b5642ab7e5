//! # crypto-utils
//!
//! Hash primitives, secure random generation and memory-safety helpers shared
//! by the key derivation, address and transaction code.

pub mod error;
pub mod hash;
pub mod random;
pub mod zeroizing;

pub use error::CryptoError;
