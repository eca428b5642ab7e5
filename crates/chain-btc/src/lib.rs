//! Bitcoin-family chain support for the signing engine.
//!
//! Provides per-network parameters, BIP32 key derivation, P2PKH /
//! P2SH-P2WPKH / P2WPKH address encoding, transaction building with fee and
//! change computation, and BIP143 signing.

pub mod address;
pub mod bech32;
pub mod error;
pub mod hd;
pub mod params;
pub mod sign;
pub mod transaction;
pub mod utxo;

pub use address::{AddressEncoding, Payload};
pub use error::{BtcError, DecodeError};
pub use hd::ExtendedKey;
pub use params::{ChainParams, ChainRegistry, NetworkId};
pub use transaction::{RawTransaction, TransactionBuild, TxRequest};
